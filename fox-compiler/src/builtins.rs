//! The intrinsic function inventory. The compiler emits a `Builtin`
//! identifier as the inline operand of `Call_Builtin`; the VM dispatches
//! on the same enum, so the two sides can never disagree on an index.

use crate::value::ValueType;

macro_rules! builtins {
    ($($variant:ident = $id:expr, $name:expr;)*) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        #[repr(u32)]
        pub enum Builtin {
            $($variant = $id,)*
        }

        impl Builtin {
            pub fn from_u32(value: u32) -> Option<Builtin> {
                match value {
                    $($id => Some(Builtin::$variant),)*
                    _ => None,
                }
            }

            /// The name the definition is registered under. Bracketed
            /// names are not reachable from source; the type checker
            /// dispatches to them from `print`/`puts`/`free`.
            pub fn name(&self) -> &'static str {
                match self {
                    $(Builtin::$variant => $name,)*
                }
            }
        }
    };
}

builtins! {
    Alloc = 0, "alloc";
    Panic = 1, "panic";
    FreePtr = 2, "<free-ptr>";
    FreeSlice = 3, "<free-slice>";
    FreeStr = 4, "<free-str>";
    PutsBool = 5, "<puts-bool>";
    PutsChar = 6, "<puts-char>";
    PutsInt = 7, "<puts-int>";
    PutsFloat = 8, "<puts-float>";
    PutsStr = 9, "<puts-str>";
    PutsStruct = 10, "<puts-struct>";
    PutsEnum = 11, "<puts-enum>";
    PrintBool = 12, "<print-bool>";
    PrintChar = 13, "<print-char>";
    PrintInt = 14, "<print-int>";
    PrintFloat = 15, "<print-float>";
    PrintStr = 16, "<print-str>";
    PrintStruct = 17, "<print-struct>";
    PrintEnum = 18, "<print-enum>";
}

impl Builtin {
    /// Signature of the user-callable intrinsics; the print and free
    /// families are dispatched by argument type instead.
    pub fn signature(&self) -> Option<ValueType> {
        match self {
            Builtin::Alloc => Some(ValueType::func(
                vec![ValueType::INT],
                ValueType::ptr_to(ValueType::VOID.with_mut(true)),
                false,
            )),
            Builtin::Panic => Some(ValueType::func(
                vec![ValueType::STR],
                ValueType::VOID,
                false,
            )),
            _ => None,
        }
    }

    /// Resolve a source-level identifier to a directly callable intrinsic.
    pub fn by_source_name(name: &str) -> Option<Builtin> {
        match name {
            "alloc" => Some(Builtin::Alloc),
            "panic" => Some(Builtin::Panic),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roundtrip_through_u32() {
        for b in [Builtin::Alloc, Builtin::Panic, Builtin::PrintEnum] {
            assert_eq!(Builtin::from_u32(b as u32), Some(b));
        }
        assert_eq!(Builtin::from_u32(999), None);
    }

    #[test]
    fn test_source_names() {
        assert_eq!(Builtin::by_source_name("alloc"), Some(Builtin::Alloc));
        assert_eq!(Builtin::by_source_name("<puts-int>"), None);
    }
}
