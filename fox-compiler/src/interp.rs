//! The pipeline driver: owns the UUID counter, the definition registries
//! and the constant data sections, and runs source text through
//! parse → typecheck → codegen.

use crate::bytecode;
use crate::codegen;
use crate::definitions::{FunctionDefinition, Functions, Module, Modules, Types};
use crate::error::CompileError;
use crate::typer;
use crate::value::Uuid;

pub struct Interpreter {
    current_uuid: Uuid,
    pub types: Types,
    pub functions: Functions,
    pub modules: Modules,
    /// Flat constant pool, 8-byte aligned entries, append-only
    pub constants: Vec<u8>,
    /// Length-prefixed string constants, append-only
    pub str_constants: Vec<u8>,
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

impl Interpreter {
    pub fn new() -> Self {
        Self {
            // UUIDs start at 1 so registered definitions are never zero.
            current_uuid: 1,
            types: Types::default(),
            functions: Functions::default(),
            modules: Modules::default(),
            constants: Vec::new(),
            str_constants: Vec::new(),
        }
    }

    pub fn next_uuid(&mut self) -> Uuid {
        let uuid = self.current_uuid;
        self.current_uuid += 1;
        uuid
    }

    /// Compile a source file down to the root function. All supporting
    /// functions land in `self.functions`; the constant sections are ready
    /// for the VM afterwards.
    pub fn compile_source(
        &mut self,
        path: &str,
        source: &str,
    ) -> Result<FunctionDefinition, CompileError> {
        let mut parser = fox_parser::Parser::new(source)?;
        let program = parser.parse_program()?;

        let module_uuid = self.next_uuid();
        self.modules
            .add_module(Module::new(module_uuid, path.to_string()))?;

        let typed = typer::typecheck(self, module_uuid, &program)?;
        let root = codegen::generate(self, module_uuid, &typed)?;

        if log::log_enabled!(log::Level::Debug) {
            log::debug!(
                "<main>:\n{}",
                bytecode::disassemble(&root.code, &self.str_constants)
            );
            for func in self.functions.iter() {
                log::debug!(
                    "{}#{} {}:\n{}",
                    func.name,
                    func.uuid,
                    func.ty,
                    bytecode::disassemble(&func.code, &self.str_constants)
                );
            }
        }

        Ok(root)
    }
}
