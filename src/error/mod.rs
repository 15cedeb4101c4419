//! Error types for assembling and executing bytecode.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while turning source into a chunk. The VM is untouched.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CompileError {
    #[error("[line {line}] Error: Unknown instruction '{name}'.")]
    UnknownInstruction { name: String, line: u32 },

    #[error("[line {line}] Error: '{name}' expects {expected}.")]
    MissingOperand {
        name: String,
        expected: &'static str,
        line: u32,
    },

    #[error("[line {line}] Error: Unexpected operand '{found}'.")]
    UnexpectedOperand { found: String, line: u32 },

    #[error("[line {line}] Error: Undefined label '{label}'.")]
    UndefinedLabel { label: String, line: u32 },

    #[error("[line {line}] Error: Label '{label}' is already defined.")]
    DuplicateLabel { label: String, line: u32 },

    #[error("[line {line}] Error: Too many constants in one chunk.")]
    TooManyConstants { line: u32 },

    #[error("[line {line}] Error: Too much code to jump over.")]
    JumpTooLarge { line: u32 },

    #[error("[line {line}] Error: {message}")]
    General { message: String, line: u32 },
}

impl CompileError {
    pub fn new(message: impl Into<String>, line: u32) -> Self {
        Self::General {
            message: message.into(),
            line,
        }
    }

    pub fn line(&self) -> u32 {
        match self {
            Self::UnknownInstruction { line, .. } => *line,
            Self::MissingOperand { line, .. } => *line,
            Self::UnexpectedOperand { line, .. } => *line,
            Self::UndefinedLabel { line, .. } => *line,
            Self::DuplicateLabel { line, .. } => *line,
            Self::TooManyConstants { line } => *line,
            Self::JumpTooLarge { line } => *line,
            Self::General { line, .. } => *line,
        }
    }
}

/// Runtime errors. Each carries the source line of the failing instruction.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RuntimeError {
    #[error("{message}\n[line {line}] in script")]
    TypeMismatch { message: String, line: u32 },

    #[error("Undefined variable '{name}'.\n[line {line}] in script")]
    UndefinedVariable { name: String, line: u32 },

    #[error("Stack overflow.\n[line {line}] in script")]
    StackOverflow { line: u32 },

    #[error("Stack underflow.\n[line {line}] in script")]
    StackUnderflow { line: u32 },

    #[error("Division by zero.\n[line {line}] in script")]
    DivisionByZero { line: u32 },

    #[error("Unknown opcode {byte}.\n[line {line}] in script")]
    UnknownOpcode { byte: u8, line: u32 },

    #[error("{message}\n[line {line}] in script")]
    General { message: String, line: u32 },
}

impl RuntimeError {
    pub fn new(message: impl Into<String>, line: u32) -> Self {
        Self::General {
            message: message.into(),
            line,
        }
    }

    pub fn type_mismatch(message: impl Into<String>, line: u32) -> Self {
        Self::TypeMismatch {
            message: message.into(),
            line,
        }
    }

    pub fn undefined_variable(name: impl Into<String>, line: u32) -> Self {
        Self::UndefinedVariable {
            name: name.into(),
            line,
        }
    }

    pub fn line(&self) -> u32 {
        match self {
            Self::TypeMismatch { line, .. } => *line,
            Self::UndefinedVariable { line, .. } => *line,
            Self::StackOverflow { line } => *line,
            Self::StackUnderflow { line } => *line,
            Self::DivisionByZero { line } => *line,
            Self::UnknownOpcode { line, .. } => *line,
            Self::General { line, .. } => *line,
        }
    }

    /// The cause without the line annotation.
    pub fn message(&self) -> String {
        let full = self.to_string();
        match full.split_once('\n') {
            Some((message, _)) => message.to_string(),
            None => full,
        }
    }
}

/// Outcome of a failed `interpret` call.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InterpretError {
    #[error("{0}")]
    Compile(#[from] CompileError),

    #[error("{0}")]
    Runtime(#[from] RuntimeError),
}

impl InterpretError {
    /// Conventional process exit code (sysexits) for this failure.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Compile(_) => 65,
            Self::Runtime(_) => 70,
        }
    }
}

/// Top-level error for the file-driven entry points.
#[derive(Debug, Error)]
pub enum XasmError {
    #[error("Could not read '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Interpret(#[from] InterpretError),
}

impl XasmError {
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Io { .. } => 74,
            Self::Interpret(e) => e.exit_code(),
        }
    }
}

impl From<CompileError> for XasmError {
    fn from(error: CompileError) -> Self {
        Self::Interpret(error.into())
    }
}

impl From<RuntimeError> for XasmError {
    fn from(error: RuntimeError) -> Self {
        Self::Interpret(error.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_runtime_error_is_line_annotated() {
        let err = RuntimeError::undefined_variable("x", 3);
        assert_eq!(err.to_string(), "Undefined variable 'x'.\n[line 3] in script");
        assert_eq!(err.message(), "Undefined variable 'x'.");
        assert_eq!(err.line(), 3);
    }

    #[test]
    fn test_interpret_error_exit_codes() {
        let compile: InterpretError = CompileError::new("bad", 1).into();
        let runtime: InterpretError = RuntimeError::StackOverflow { line: 1 }.into();
        assert_eq!(compile.exit_code(), 65);
        assert_eq!(runtime.exit_code(), 70);
    }

    #[test]
    fn test_io_error_exit_code() {
        let err = XasmError::Io {
            path: PathBuf::from("missing.xasm"),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "not found"),
        };
        assert_eq!(err.exit_code(), 74);
        assert_eq!(err.to_string(), "Could not read 'missing.xasm': not found");
        let wrapped: XasmError = CompileError::new("bad", 2).into();
        assert_eq!(wrapped.exit_code(), 65);
    }
}
