//! Built-in functions callable from generated code via `Call_Builtin`.
//! Each intrinsic pops its arguments in reverse declaration order and
//! pushes any return value; none of them allocate call frames.

use std::io::Write;

use fox_compiler::builtins::Builtin;
use fox_compiler::definitions::Types;
use fox_compiler::value::{TypeKind, ValueType};

use crate::{RuntimeError, Vm};

unsafe fn read<T: Copy>(ptr: *const u8) -> T {
    (ptr as *const T).read_unaligned()
}

pub(crate) fn run_builtin(
    vm: &mut Vm,
    builtin: Builtin,
    _arg_start: usize,
) -> Result<(), RuntimeError> {
    match builtin {
        Builtin::Alloc => {
            let size: i64 = vm.stack.pop_value();
            let ptr = unsafe { libc::malloc((size.max(1)) as usize) };
            vm.stack.push(ptr as u64)?;
            Ok(())
        }
        Builtin::Panic => {
            let len: i64 = vm.stack.pop_value();
            let ptr: u64 = vm.stack.pop_value();
            let message = unsafe {
                let bytes = std::slice::from_raw_parts(ptr as *const u8, len as usize);
                String::from_utf8_lossy(bytes).into_owned()
            };
            Err(RuntimeError::Panic(message))
        }
        Builtin::FreePtr => {
            let ptr: u64 = vm.stack.pop_value();
            unsafe { libc::free(ptr as *mut libc::c_void) };
            Ok(())
        }
        Builtin::FreeSlice => {
            let _count: i64 = vm.stack.pop_value();
            let data: u64 = vm.stack.pop_value();
            unsafe { libc::free(data as *mut libc::c_void) };
            Ok(())
        }
        Builtin::FreeStr => {
            let _len: i64 = vm.stack.pop_value();
            let ptr: u64 = vm.stack.pop_value();
            unsafe { libc::free(ptr as *mut libc::c_void) };
            Ok(())
        }
        Builtin::PutsBool | Builtin::PrintBool => {
            let value: u8 = vm.stack.pop_value();
            write_scalar(vm, builtin, |out| {
                write!(out, "{}", if value != 0 { "true" } else { "false" })
            })
        }
        Builtin::PutsChar | Builtin::PrintChar => {
            let value: u32 = vm.stack.pop_value();
            let c = char::from_u32(value).unwrap_or(char::REPLACEMENT_CHARACTER);
            write_scalar(vm, builtin, |out| write!(out, "{}", c))
        }
        Builtin::PutsInt | Builtin::PrintInt => {
            let value: i64 = vm.stack.pop_value();
            write_scalar(vm, builtin, |out| write!(out, "{}", value))
        }
        Builtin::PutsFloat | Builtin::PrintFloat => {
            let value: f64 = vm.stack.pop_value();
            write_scalar(vm, builtin, |out| write!(out, "{:.6}", value))
        }
        Builtin::PutsStr | Builtin::PrintStr => {
            let len: i64 = vm.stack.pop_value();
            let ptr: u64 = vm.stack.pop_value();
            let bytes =
                unsafe { std::slice::from_raw_parts(ptr as *const u8, len as usize) }.to_vec();
            write_scalar(vm, builtin, |out| {
                out.write_all(&bytes)
            })
        }
        Builtin::PutsStruct | Builtin::PrintStruct => {
            let uuid: u64 = vm.stack.pop_value();
            let types = vm.types();
            let defn = types.get_struct_by_uuid(uuid).ok_or_else(|| {
                RuntimeError::Internal(format!("print of unknown struct #{}", uuid))
            })?;
            let at = vm.stack.pop(defn.size as usize);
            let ptr = vm.stack.ptr_at(at) as *const u8;
            let out = vm.out();
            print_struct(types, out, uuid, ptr)?;
            if builtin == Builtin::PrintStruct {
                writeln!(out)?;
            }
            Ok(())
        }
        Builtin::PutsEnum | Builtin::PrintEnum => {
            let uuid: u64 = vm.stack.pop_value();
            let types = vm.types();
            let defn = types.get_enum_by_uuid(uuid).ok_or_else(|| {
                RuntimeError::Internal(format!("print of unknown enum #{}", uuid))
            })?;
            let at = vm.stack.pop(defn.size as usize);
            let ptr = vm.stack.ptr_at(at) as *const u8;
            let out = vm.out();
            print_enum(types, out, uuid, ptr)?;
            if builtin == Builtin::PrintEnum {
                writeln!(out)?;
            }
            Ok(())
        }
    }
}

fn write_scalar<F>(vm: &mut Vm, builtin: Builtin, body: F) -> Result<(), RuntimeError>
where
    F: FnOnce(&mut dyn Write) -> std::io::Result<()>,
{
    let out = vm.out();
    body(out)?;
    if matches!(
        builtin,
        Builtin::PrintBool
            | Builtin::PrintChar
            | Builtin::PrintInt
            | Builtin::PrintFloat
            | Builtin::PrintStr
    ) {
        writeln!(out)?;
    }
    Ok(())
}

/// Print any value by its static type, reading through a raw pointer.
/// Structs and enums recurse field by field.
fn print_value(
    types: &Types,
    out: &mut dyn Write,
    ty: &ValueType,
    ptr: *const u8,
) -> Result<(), RuntimeError> {
    match &ty.kind {
        TypeKind::Bool => {
            let v: u8 = unsafe { read(ptr) };
            write!(out, "{}", if v != 0 { "true" } else { "false" })?;
        }
        TypeKind::Char => {
            let v: u32 = unsafe { read(ptr) };
            let c = char::from_u32(v).unwrap_or(char::REPLACEMENT_CHARACTER);
            write!(out, "{}", c)?;
        }
        TypeKind::Int => {
            let v: i64 = unsafe { read(ptr) };
            write!(out, "{}", v)?;
        }
        TypeKind::Float => {
            let v: f64 = unsafe { read(ptr) };
            write!(out, "{:.6}", v)?;
        }
        TypeKind::Str => {
            let data: u64 = unsafe { read(ptr) };
            let len: i64 = unsafe { read(ptr.add(8)) };
            let bytes = unsafe { std::slice::from_raw_parts(data as *const u8, len as usize) };
            out.write_all(bytes)?;
        }
        TypeKind::Struct(handle) => print_struct(types, out, handle.uuid, ptr)?,
        TypeKind::Enum(handle) => print_enum(types, out, handle.uuid, ptr)?,
        _ => {
            write!(out, "{}", ty)?;
        }
    }
    Ok(())
}

fn print_struct(
    types: &Types,
    out: &mut dyn Write,
    uuid: u64,
    ptr: *const u8,
) -> Result<(), RuntimeError> {
    let defn = types
        .get_struct_by_uuid(uuid)
        .ok_or_else(|| RuntimeError::Internal(format!("print of unknown struct #{}", uuid)))?;

    write!(out, "{}{{ ", defn.name)?;
    for (i, field) in defn.fields.iter().enumerate() {
        write!(out, "{}: ", field.name)?;
        let field_ptr = unsafe { ptr.add(field.offset as usize) };
        print_value(types, out, &field.ty, field_ptr)?;
        if i + 1 < defn.fields.len() {
            write!(out, ", ")?;
        }
    }
    write!(out, " }}")?;
    Ok(())
}

fn print_enum(
    types: &Types,
    out: &mut dyn Write,
    uuid: u64,
    ptr: *const u8,
) -> Result<(), RuntimeError> {
    let defn = types
        .get_enum_by_uuid(uuid)
        .ok_or_else(|| RuntimeError::Internal(format!("print of unknown enum #{}", uuid)))?;

    let tag: i64 = unsafe { read(ptr) };
    let variant = defn.find_variant_by_tag(tag).ok_or_else(|| {
        RuntimeError::Internal(format!(
            "Invalid variant tag for type `{}`: {}.",
            defn.name, tag
        ))
    })?;

    write!(out, "{}", variant.name)?;
    if !variant.payload.is_empty() {
        write!(out, "(")?;
        for (i, field) in variant.payload.iter().enumerate() {
            let field_ptr = unsafe { ptr.add(field.offset as usize) };
            print_value(types, out, &field.ty, field_ptr)?;
            if i + 1 < variant.payload.len() {
                write!(out, ", ")?;
            }
        }
        write!(out, ")")?;
    }
    Ok(())
}
