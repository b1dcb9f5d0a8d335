use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;

use fox_compiler::Interpreter;
use fox_diagnostics::{Diagnostic, Span};
use fox_vm::Vm;

#[derive(Parser)]
#[command(name = "fox")]
#[command(version = "0.2.0")]
#[command(about = "Fox Programming Language", long_about = None)]
struct Cli {
    /// Input .fox source file
    #[arg(value_name = "SOURCE")]
    source: PathBuf,
}

fn main() -> Result<()> {
    env_logger::init();

    let cli = Cli::parse();
    let path = cli.source.display().to_string();
    let source = std::fs::read_to_string(&cli.source)
        .map_err(|e| anyhow::anyhow!("'{}' could not be opened: {}", path, e))?;

    log::info!("Compiling: {}", path);

    let mut interp = Interpreter::new();
    let program = match interp.compile_source(&path, &source) {
        Ok(program) => program,
        Err(error) => {
            let span = error
                .span()
                .map(|range| Span::from_file_and_range(&path, &source, range))
                .unwrap_or_else(Span::unknown);
            let diagnostic = Diagnostic::error(error.to_string(), span);
            eprint!("{}", diagnostic.render(&source));
            std::process::exit(1);
        }
    };

    log::info!("Running: {}", path);

    let mut vm = Vm::new(&interp);
    vm.call(&program, 0)
        .and_then(|_| vm.run())
        .unwrap_or_else(|error| {
            eprintln!("error: {}", error);
            std::process::exit(1);
        });

    Ok(())
}
