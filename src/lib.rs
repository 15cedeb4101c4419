//! xasm: a stack-based bytecode virtual machine.
//!
//! Programs are written in a small line-oriented assembly language, turned
//! into a [`bytecode::Chunk`] by the [`bytecode::Assembler`] and executed by
//! the [`bytecode::Vm`].
//!
//! ```
//! let value = xasm::run("constant 2\nconstant 3\nadd\nret").unwrap();
//! assert_eq!(value, xasm::bytecode::Value::Int(5));
//! ```

#![allow(clippy::new_without_default)]

pub mod bytecode;
pub mod config;
pub mod error;
pub mod repl;

use std::path::Path;

use bytecode::{StringTable, Value, Vm};
use config::VmConfig;
use error::{InterpretError, XasmError};

/// Run a program from source with the default configuration.
pub fn run(source: &str) -> Result<Value, InterpretError> {
    run_with_config(source, VmConfig::default())
}

/// Run a program from source on a fresh VM built from `config`.
pub fn run_with_config(source: &str, config: VmConfig) -> Result<Value, InterpretError> {
    Vm::new(config).interpret(source)
}

/// Run a program from a file.
pub fn run_file(path: &Path, config: VmConfig) -> Result<Value, XasmError> {
    let source = read_source(path)?;
    Ok(run_with_config(&source, config)?)
}

/// Assemble a file and return its disassembly listing.
pub fn disassemble_file(path: &Path) -> Result<String, XasmError> {
    let source = read_source(path)?;
    let mut strings = StringTable::new();
    let chunk = bytecode::assemble(&source, &mut strings)?;
    let name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    Ok(bytecode::disassemble_chunk(&chunk, &name))
}

fn read_source(path: &Path) -> Result<String, XasmError> {
    std::fs::read_to_string(path).map_err(|source| XasmError::Io {
        path: path.to_path_buf(),
        source,
    })
}
