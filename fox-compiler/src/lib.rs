//! The Fox compiler: value type model, definition registries, type
//! checker and bytecode generator, plus the pipeline driver that strings
//! them together.

pub mod builtins;
pub mod bytecode;
pub mod codegen;
pub mod definitions;
pub mod error;
pub mod interp;
pub mod typer;
pub mod value;

pub use builtins::Builtin;
pub use bytecode::Opcode;
pub use definitions::{
    EnumDefinition, EnumVariant, FunctionDefinition, Functions, Module, Modules,
    StructDefinition, Types,
};
pub use error::CompileError;
pub use interp::Interpreter;
pub use value::{Address, Size, TypeKind, Uuid, ValueType};
