//! Bytecode virtual machine.
//!
//! # Architecture
//!
//! - `buffer`: growable array with the doubling capacity policy
//! - `value`: tagged runtime values, heap strings and numeric promotion
//! - `table`: open-addressing string table (interning pool and globals)
//! - `instruction`: OpCode definitions for the instruction set
//! - `chunk`: bytecode, line table and constant pool
//! - `assembler`: the `Compiler` boundary and a text assembler implementing it
//! - `disassembler`: debug output for bytecode inspection
//! - `host`: hooks for the `call`/`brp`/`req`/`host` opcodes
//! - `vm`: the dispatch loop

pub mod assembler;
pub mod buffer;
pub mod chunk;
pub mod disassembler;
pub mod host;
pub mod instruction;
pub mod table;
pub mod value;
pub mod vm;

pub use assembler::{assemble, Assembler, Compiler};
pub use buffer::Buffer;
pub use chunk::Chunk;
pub use disassembler::{disassemble_chunk, disassemble_instruction};
pub use host::{Host, HostHook, NoopHost};
pub use instruction::OpCode;
pub use table::StringTable;
pub use value::{HeapString, Number, ObjectRef, Value};
pub use vm::Vm;
