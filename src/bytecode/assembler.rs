//! Line-oriented assembler: the reference `Compiler` for the VM.
//!
//! ```text
//! ; comments run to the end of the line
//!         constant 10
//!         define_global n
//! top:    get_global n
//!         jump_if_false done
//!         pop
//!         get_global n
//!         dec
//!         set_global n
//!         pop
//!         loop top
//! done:   ret
//! ```
//!
//! `constant` accepts `nil`, `true`, `false`, ints (`42`), bytes (`42b`),
//! floats (`1.5`, `2e3`, `3f`) and strings (`"hi\n"`). Global opcodes take a
//! bare or quoted name. Jumps take a label or a raw 16-bit offset.

use std::collections::HashMap;
use std::rc::Rc;

use crate::bytecode::chunk::Chunk;
use crate::bytecode::instruction::OpCode;
use crate::bytecode::table::StringTable;
use crate::bytecode::value::Value;
use crate::error::CompileError;

/// Result type for compilation.
pub type CompileResult<T> = Result<T, CompileError>;

/// Turns source text into a chunk.
///
/// On success the chunk holds the complete program; on failure its contents
/// are unspecified and it must not be executed. String constants should be
/// interned through `strings` so they are canonical for the VM that runs them.
pub trait Compiler {
    fn compile(
        &mut self,
        source: &str,
        chunk: &mut Chunk,
        strings: &mut StringTable,
    ) -> CompileResult<()>;
}

/// A forward jump waiting for its label.
#[derive(Debug)]
struct PendingJump {
    label: String,
    operand: usize,
    line: u32,
}

/// The assembler. Reusable: state is reset on every `compile`.
#[derive(Debug, Default)]
pub struct Assembler {
    labels: HashMap<String, usize>,
    pending: Vec<PendingJump>,
}

impl Assembler {
    pub fn new() -> Self {
        Self::default()
    }

    fn assemble_line(
        &mut self,
        text: &str,
        line: u32,
        chunk: &mut Chunk,
        strings: &mut StringTable,
    ) -> CompileResult<()> {
        let mut rest = strip_comment(text).trim();

        // Leading `label:` definitions
        while let Some((label, tail)) = split_label(rest) {
            if self.labels.insert(label.to_string(), chunk.len()).is_some() {
                return Err(CompileError::DuplicateLabel {
                    label: label.to_string(),
                    line,
                });
            }
            rest = tail.trim_start();
        }
        if rest.is_empty() {
            return Ok(());
        }

        let (name, operand) = match rest.split_once(char::is_whitespace) {
            Some((name, operand)) => (name, operand.trim()),
            None => (rest, ""),
        };
        let op = OpCode::from_mnemonic(&name.to_ascii_lowercase()).ok_or_else(|| {
            CompileError::UnknownInstruction {
                name: name.to_string(),
                line,
            }
        })?;

        if op.operand_size() == 0 {
            if !operand.is_empty() {
                return Err(CompileError::UnexpectedOperand {
                    found: operand.to_string(),
                    line,
                });
            }
            chunk.write_op(op, line);
            return Ok(());
        }

        if operand.is_empty() {
            let expected = match op {
                OpCode::Constant => "a literal",
                _ if op.takes_global_name() => "a variable name",
                _ if op.is_jump() => "a label or offset",
                _ => "a slot number",
            };
            return Err(CompileError::MissingOperand {
                name: name.to_string(),
                expected,
                line,
            });
        }

        match op {
            OpCode::Constant => {
                let value = parse_literal(operand, line, strings)?;
                let index = make_constant(chunk, value, line)?;
                chunk.write_op(op, line);
                chunk.write(index, line);
            }
            _ if op.takes_global_name() => {
                let name = parse_name(operand, line)?;
                let index = make_constant(chunk, Value::Object(strings.intern(&name)), line)?;
                chunk.write_op(op, line);
                chunk.write(index, line);
            }
            _ if op.is_jump() => self.emit_jump(op, operand, line, chunk)?,
            _ => {
                let slot = operand.parse::<u8>().map_err(|_| {
                    CompileError::new(format!("Invalid slot number '{}'.", operand), line)
                })?;
                chunk.write_op(op, line);
                chunk.write(slot, line);
            }
        }
        Ok(())
    }

    fn emit_jump(
        &mut self,
        op: OpCode,
        operand: &str,
        line: u32,
        chunk: &mut Chunk,
    ) -> CompileResult<()> {
        chunk.write_op(op, line);
        let operand_offset = chunk.len();

        if let Ok(raw) = operand.parse::<u16>() {
            chunk.write_u16(raw, line);
            return Ok(());
        }
        if !is_identifier(operand) {
            return Err(CompileError::new(
                format!("Invalid jump target '{}'.", operand),
                line,
            ));
        }

        let after_operand = operand_offset + 2;
        match (op, self.labels.get(operand)) {
            (OpCode::Loop, Some(&target)) => {
                let distance = u16::try_from(after_operand - target)
                    .map_err(|_| CompileError::JumpTooLarge { line })?;
                chunk.write_u16(distance, line);
            }
            (OpCode::Loop, None) => {
                return Err(CompileError::new(
                    format!("Loop target '{}' must be defined before the loop.", operand),
                    line,
                ));
            }
            (_, Some(_)) => {
                return Err(CompileError::new(
                    format!("Cannot jump backward to '{}'; use loop.", operand),
                    line,
                ));
            }
            (_, None) => {
                chunk.write_u16(0xFFFF, line);
                self.pending.push(PendingJump {
                    label: operand.to_string(),
                    operand: operand_offset,
                    line,
                });
            }
        }
        Ok(())
    }

    fn patch_pending(&mut self, chunk: &mut Chunk) -> CompileResult<()> {
        for jump in self.pending.drain(..) {
            let target = *self
                .labels
                .get(&jump.label)
                .ok_or_else(|| CompileError::UndefinedLabel {
                    label: jump.label.clone(),
                    line: jump.line,
                })?;
            chunk
                .patch_jump_to(jump.operand, target)
                .ok_or(CompileError::JumpTooLarge { line: jump.line })?;
        }
        Ok(())
    }
}

impl Compiler for Assembler {
    fn compile(
        &mut self,
        source: &str,
        chunk: &mut Chunk,
        strings: &mut StringTable,
    ) -> CompileResult<()> {
        self.labels.clear();
        self.pending.clear();

        for (index, text) in source.lines().enumerate() {
            let line = index as u32 + 1;
            self.assemble_line(text, line, chunk, strings)?;
        }
        self.patch_pending(chunk)
    }
}

/// Assemble `source` into a fresh chunk.
pub fn assemble(source: &str, strings: &mut StringTable) -> CompileResult<Chunk> {
    let mut chunk = Chunk::new();
    Assembler::new().compile(source, &mut chunk, strings)?;
    Ok(chunk)
}

/// Reuse an existing slot for an identical string, otherwise append.
fn make_constant(chunk: &mut Chunk, value: Value, line: u32) -> CompileResult<u8> {
    if let Value::Object(ref s) = value {
        let existing = chunk
            .constants
            .iter()
            .position(|c| matches!(c, Value::Object(o) if Rc::ptr_eq(o, s)));
        if let Some(index) = existing {
            return Ok(index as u8);
        }
    }
    let index = chunk.add_constant(value);
    u8::try_from(index).map_err(|_| CompileError::TooManyConstants { line })
}

fn strip_comment(text: &str) -> &str {
    let mut in_string = false;
    let mut escaped = false;
    for (i, c) in text.char_indices() {
        match c {
            _ if escaped => escaped = false,
            '\\' if in_string => escaped = true,
            '"' => in_string = !in_string,
            ';' if !in_string => return &text[..i],
            _ => {}
        }
    }
    text
}

fn split_label(text: &str) -> Option<(&str, &str)> {
    let (label, tail) = text.split_once(':')?;
    if is_identifier(label) {
        Some((label, tail))
    } else {
        None
    }
}

fn is_identifier(text: &str) -> bool {
    let mut chars = text.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.')
}

fn parse_name(operand: &str, line: u32) -> CompileResult<String> {
    if operand.starts_with('"') {
        return parse_string(operand, line);
    }
    if is_identifier(operand) {
        Ok(operand.to_string())
    } else {
        Err(CompileError::new(
            format!("Invalid variable name '{}'.", operand),
            line,
        ))
    }
}

fn parse_literal(operand: &str, line: u32, strings: &mut StringTable) -> CompileResult<Value> {
    match operand {
        "nil" => return Ok(Value::Nil),
        "true" => return Ok(Value::Bool(true)),
        "false" => return Ok(Value::Bool(false)),
        _ => {}
    }
    if operand.starts_with('"') {
        let text = parse_string(operand, line)?;
        return Ok(Value::Object(strings.intern_owned(text)));
    }

    let invalid = || CompileError::new(format!("Invalid literal '{}'.", operand), line);

    if let Some(digits) = operand.strip_suffix('b') {
        return digits.parse::<i8>().map(Value::Byte).map_err(|_| invalid());
    }
    if let Some(digits) = operand.strip_suffix('f') {
        return digits.parse::<f32>().map(Value::Float).map_err(|_| invalid());
    }
    if let Ok(n) = operand.parse::<i32>() {
        return Ok(Value::Int(n));
    }
    let unsigned = operand.strip_prefix('-').unwrap_or(operand);
    if !unsigned.is_empty() && unsigned.bytes().all(|b| b.is_ascii_digit()) {
        return Err(CompileError::new(
            format!("Integer literal '{}' is out of range.", operand),
            line,
        ));
    }
    if unsigned.starts_with(|c: char| c.is_ascii_digit() || c == '.') {
        if let Ok(n) = operand.parse::<f32>() {
            return Ok(Value::Float(n));
        }
    }
    Err(invalid())
}

fn parse_string(operand: &str, line: u32) -> CompileResult<String> {
    let unterminated = || CompileError::new("Unterminated string.", line);
    let body = operand.strip_prefix('"').ok_or_else(unterminated)?;

    let mut out = String::with_capacity(body.len());
    let mut chars = body.chars();
    while let Some(c) = chars.next() {
        match c {
            '"' => {
                let trailing = chars.as_str().trim();
                if !trailing.is_empty() {
                    return Err(CompileError::UnexpectedOperand {
                        found: trailing.to_string(),
                        line,
                    });
                }
                return Ok(out);
            }
            '\\' => match chars.next() {
                Some('n') => out.push('\n'),
                Some('t') => out.push('\t'),
                Some('r') => out.push('\r'),
                Some('0') => out.push('\0'),
                Some('"') => out.push('"'),
                Some('\\') => out.push('\\'),
                Some(other) => {
                    return Err(CompileError::new(
                        format!("Invalid escape sequence '\\{}'.", other),
                        line,
                    ))
                }
                None => return Err(unterminated()),
            },
            _ => out.push(c),
        }
    }
    Err(unterminated())
}
