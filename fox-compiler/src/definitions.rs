//! Struct, enum, function and module records, keyed by process-scoped
//! UUIDs and shared between the type checker, the code generator and the
//! VM.

use std::collections::{HashMap, HashSet};

use crate::error::CompileError;
use crate::value::{Size, Uuid, ValueType};

#[derive(Debug, Clone)]
pub struct StructField {
    pub offset: Size,
    pub name: String,
    pub ty: ValueType,
}

#[derive(Debug, Clone, Copy)]
pub struct Method {
    pub is_static: bool,
    pub uuid: Uuid,
}

#[derive(Debug, Clone)]
pub struct StructDefinition {
    pub size: Size,
    pub uuid: Uuid,
    pub module: Uuid,
    pub name: String,
    pub fields: Vec<StructField>,
    pub methods: HashMap<String, Method>,
}

impl StructDefinition {
    pub fn has_field(&self, name: &str) -> bool {
        self.find_field(name).is_some()
    }

    pub fn find_field(&self, name: &str) -> Option<&StructField> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn find_method(&self, name: &str) -> Option<Method> {
        self.methods.get(name).copied()
    }
}

#[derive(Debug, Clone)]
pub struct EnumPayloadField {
    pub offset: Size,
    pub ty: ValueType,
}

#[derive(Debug, Clone)]
pub struct EnumVariant {
    pub tag: i64,
    pub name: String,
    pub payload: Vec<EnumPayloadField>,
}

#[derive(Debug, Clone)]
pub struct EnumDefinition {
    pub is_sumtype: bool,
    pub size: Size,
    pub uuid: Uuid,
    pub module: Uuid,
    pub name: String,
    pub variants: Vec<EnumVariant>,
    pub methods: HashMap<String, Method>,
}

impl EnumDefinition {
    pub fn find_variant(&self, name: &str) -> Option<&EnumVariant> {
        self.variants.iter().find(|v| v.name == name)
    }

    /// Total over legal tags; a miss is the caller's internal error.
    pub fn find_variant_by_tag(&self, tag: i64) -> Option<&EnumVariant> {
        self.variants.iter().find(|v| v.tag == tag)
    }

    pub fn find_method(&self, name: &str) -> Option<Method> {
        self.methods.get(name).copied()
    }
}

#[derive(Debug, Clone)]
pub struct FunctionDefinition {
    pub varargs: bool,
    pub uuid: Uuid,
    pub module: Uuid,
    pub name: String,
    /// Function-kind value type: parameter types, return type, varargs bit
    pub ty: ValueType,
    pub param_names: Vec<String>,
    /// Flat bytecode, append-only during generation, immutable afterwards
    pub code: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct Module {
    pub uuid: Uuid,
    pub source_path: String,
    pub structs: HashSet<Uuid>,
    pub enums: HashSet<Uuid>,
    pub funcs: HashSet<Uuid>,
}

impl Module {
    pub fn new(uuid: Uuid, source_path: String) -> Self {
        Self {
            uuid,
            source_path,
            structs: HashSet::new(),
            enums: HashSet::new(),
            funcs: HashSet::new(),
        }
    }
}

/// Struct and enum definitions, looked up by UUID.
#[derive(Debug, Default)]
pub struct Types {
    structs: HashMap<Uuid, StructDefinition>,
    enums: HashMap<Uuid, EnumDefinition>,
}

impl Types {
    pub fn add_struct(&mut self, defn: StructDefinition) -> Result<(), CompileError> {
        if self.structs.contains_key(&defn.uuid) {
            return Err(CompileError::Internal(format!(
                "Struct with duplicate UUID detected: #{}",
                defn.uuid
            )));
        }
        self.structs.insert(defn.uuid, defn);
        Ok(())
    }

    pub fn add_enum(&mut self, defn: EnumDefinition) -> Result<(), CompileError> {
        if self.enums.contains_key(&defn.uuid) {
            return Err(CompileError::Internal(format!(
                "Enum with duplicate UUID detected: #{}",
                defn.uuid
            )));
        }
        self.enums.insert(defn.uuid, defn);
        Ok(())
    }

    pub fn get_struct_by_uuid(&self, uuid: Uuid) -> Option<&StructDefinition> {
        self.structs.get(&uuid)
    }

    pub fn get_struct_mut(&mut self, uuid: Uuid) -> Option<&mut StructDefinition> {
        self.structs.get_mut(&uuid)
    }

    pub fn get_enum_by_uuid(&self, uuid: Uuid) -> Option<&EnumDefinition> {
        self.enums.get(&uuid)
    }

    pub fn get_enum_mut(&mut self, uuid: Uuid) -> Option<&mut EnumDefinition> {
        self.enums.get_mut(&uuid)
    }
}

/// Function definitions, looked up by UUID.
#[derive(Debug, Default)]
pub struct Functions {
    funcs: HashMap<Uuid, FunctionDefinition>,
}

impl Functions {
    pub fn add_func(&mut self, defn: FunctionDefinition) -> Result<(), CompileError> {
        if self.funcs.contains_key(&defn.uuid) {
            return Err(CompileError::Internal(format!(
                "Function with duplicate UUID detected: #{}",
                defn.uuid
            )));
        }
        self.funcs.insert(defn.uuid, defn);
        Ok(())
    }

    pub fn get_func_by_uuid(&self, uuid: Uuid) -> Option<&FunctionDefinition> {
        self.funcs.get(&uuid)
    }

    pub fn get_func_mut(&mut self, uuid: Uuid) -> Option<&mut FunctionDefinition> {
        self.funcs.get_mut(&uuid)
    }

    pub fn iter(&self) -> impl Iterator<Item = &FunctionDefinition> {
        self.funcs.values()
    }
}

#[derive(Debug, Default)]
pub struct Modules {
    modules: HashMap<Uuid, Module>,
}

impl Modules {
    pub fn add_module(&mut self, module: Module) -> Result<(), CompileError> {
        if self.modules.contains_key(&module.uuid) {
            return Err(CompileError::Internal(format!(
                "Module with duplicate UUID detected: #{}",
                module.uuid
            )));
        }
        self.modules.insert(module.uuid, module);
        Ok(())
    }

    pub fn get_module_by_uuid(&self, uuid: Uuid) -> Option<&Module> {
        self.modules.get(&uuid)
    }

    pub fn get_module_mut(&mut self, uuid: Uuid) -> Option<&mut Module> {
        self.modules.get_mut(&uuid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dummy_struct(uuid: Uuid) -> StructDefinition {
        StructDefinition {
            size: 16,
            uuid,
            module: 0,
            name: "P".to_string(),
            fields: vec![
                StructField {
                    offset: 0,
                    name: "x".to_string(),
                    ty: ValueType::INT,
                },
                StructField {
                    offset: 8,
                    name: "y".to_string(),
                    ty: ValueType::INT,
                },
            ],
            methods: HashMap::new(),
        }
    }

    #[test]
    fn test_duplicate_uuid_is_rejected() {
        let mut types = Types::default();
        types.add_struct(dummy_struct(1)).unwrap();
        assert!(types.add_struct(dummy_struct(1)).is_err());
    }

    #[test]
    fn test_field_lookup() {
        let defn = dummy_struct(1);
        assert!(defn.has_field("x"));
        assert_eq!(defn.find_field("y").map(|f| f.offset), Some(8));
        assert!(defn.find_field("z").is_none());
    }

    #[test]
    fn test_variant_lookup_by_tag() {
        let defn = EnumDefinition {
            is_sumtype: true,
            size: 16,
            uuid: 2,
            module: 0,
            name: "E".to_string(),
            variants: vec![
                EnumVariant {
                    tag: 0,
                    name: "A".to_string(),
                    payload: vec![],
                },
                EnumVariant {
                    tag: 1,
                    name: "B".to_string(),
                    payload: vec![EnumPayloadField {
                        offset: 8,
                        ty: ValueType::INT,
                    }],
                },
            ],
            methods: HashMap::new(),
        };
        assert_eq!(defn.find_variant_by_tag(1).map(|v| v.name.as_str()), Some("B"));
        assert!(defn.find_variant_by_tag(7).is_none());
    }
}
