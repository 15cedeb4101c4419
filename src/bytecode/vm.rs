//! Stack-based virtual machine for executing bytecode chunks.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::bytecode::assembler::{Assembler, Compiler};
use crate::bytecode::chunk::Chunk;
use crate::bytecode::disassembler::disassemble_instruction;
use crate::bytecode::host::{Host, HostHook, NoopHost};
use crate::bytecode::instruction::OpCode;
use crate::bytecode::table::StringTable;
use crate::bytecode::value::{binary_op, hash_str, ArithError, BinaryOp, Number, ObjectRef, Value};
use crate::config::{VmConfig, STACK_MAX};
use crate::error::{InterpretError, RuntimeError};

/// Result type for VM operations.
pub type VmResult<T> = Result<T, RuntimeError>;

/// What the dispatch loop does after an instruction.
enum Flow {
    Continue,
    Return(Value),
}

/// The virtual machine.
///
/// Globals and interned strings persist across `interpret` calls until
/// `teardown` (or drop). The operand stack is reset at the start of every
/// session and after every runtime error.
pub struct Vm {
    config: VmConfig,
    stack: Vec<Value>,
    ip: usize,
    /// Source line of the instruction being executed.
    line: u32,
    /// Set by a push at capacity; checked after each instruction.
    overflow: bool,
    globals: StringTable,
    strings: StringTable,
    rng: StdRng,
    host: Box<dyn Host>,
    /// Everything written by `print` (and by `ret` when printing on return).
    pub output: Vec<String>,
}

impl Vm {
    pub fn new(config: VmConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            stack: Vec::with_capacity(config.stack_max.min(STACK_MAX)),
            ip: 0,
            line: 0,
            overflow: false,
            globals: StringTable::new(),
            strings: StringTable::new(),
            rng,
            host: Box::new(NoopHost),
            output: Vec::new(),
            config,
        }
    }

    /// Replace the handler for the hook opcodes.
    pub fn with_host(mut self, host: impl Host + 'static) -> Self {
        self.host = Box::new(host);
        self
    }

    /// Assemble and run `source`.
    pub fn interpret(&mut self, source: &str) -> Result<Value, InterpretError> {
        let mut assembler = Assembler::new();
        self.interpret_with(&mut assembler, source)
    }

    /// Compile `source` with `compiler` and run the result.
    ///
    /// A compile failure never executes anything; globals are unchanged.
    pub fn interpret_with(
        &mut self,
        compiler: &mut dyn Compiler,
        source: &str,
    ) -> Result<Value, InterpretError> {
        let mut chunk = Chunk::new();
        compiler.compile(source, &mut chunk, &mut self.strings)?;
        self.interpret_chunk(&chunk)
    }

    /// Run an already compiled chunk.
    pub fn interpret_chunk(&mut self, chunk: &Chunk) -> Result<Value, InterpretError> {
        tracing::debug!(
            bytes = chunk.len(),
            constants = chunk.constants.len(),
            "session started"
        );
        self.reset_stack();
        self.ip = 0;

        match self.run(chunk) {
            Ok(value) => {
                tracing::debug!(result = %value.tagged(), "session finished");
                Ok(value)
            }
            Err(error) => {
                tracing::debug!(line = error.line(), error = %error.message(), "runtime error");
                self.reset_stack();
                Err(error.into())
            }
        }
    }

    /// Release globals, interned strings and the stack. The VM can be reused
    /// afterwards as if freshly created.
    pub fn teardown(&mut self) {
        self.reset_stack();
        self.globals.clear();
        self.strings.clear();
        self.output.clear();
    }

    /// The canonical string for `chars` in this VM's pool.
    pub fn intern(&mut self, chars: &str) -> ObjectRef {
        self.strings.intern(chars)
    }

    /// Look a global up by name without going through bytecode.
    pub fn get_global(&self, name: &str) -> Option<Value> {
        let key = self.strings.find_string(name, hash_str(name))?;
        self.globals.get(&key)
    }

    pub fn globals(&self) -> &StringTable {
        &self.globals
    }

    pub fn strings(&self) -> &StringTable {
        &self.strings
    }

    pub fn stack(&self) -> &[Value] {
        &self.stack
    }

    /// Drain everything printed so far.
    pub fn take_output(&mut self) -> Vec<String> {
        std::mem::take(&mut self.output)
    }

    fn reset_stack(&mut self) {
        self.stack.clear();
        self.overflow = false;
    }

    /// Main execution loop.
    fn run(&mut self, chunk: &Chunk) -> VmResult<Value> {
        loop {
            if self.ip >= chunk.code.len() {
                return Ok(Value::Nil);
            }
            let start = self.ip;
            self.line = chunk.line(start);

            if self.config.trace_execution {
                self.trace_instruction(chunk, start);
            }

            let flow = self.step(chunk)?;
            if self.overflow {
                return Err(RuntimeError::StackOverflow { line: self.line });
            }
            if let Flow::Return(value) = flow {
                return Ok(value);
            }
        }
    }

    fn step(&mut self, chunk: &Chunk) -> VmResult<Flow> {
        let line = self.line;
        let byte = self.read_byte(chunk)?;
        let opcode = OpCode::from_u8(byte).ok_or(RuntimeError::UnknownOpcode { byte, line })?;

        match opcode {
            OpCode::Jump => {
                let offset = self.read_u16(chunk)?;
                self.ip += offset as usize;
            }
            OpCode::JumpIfTrue => {
                let offset = self.read_u16(chunk)?;
                if !self.peek(0)?.is_falsey() {
                    self.ip += offset as usize;
                }
            }
            OpCode::JumpIfFalse => {
                let offset = self.read_u16(chunk)?;
                if self.peek(0)?.is_falsey() {
                    self.ip += offset as usize;
                }
            }
            OpCode::Loop => {
                let offset = self.read_u16(chunk)?;
                self.ip = self
                    .ip
                    .checked_sub(offset as usize)
                    .ok_or_else(|| RuntimeError::new("Loop target out of range.", line))?;
            }

            OpCode::Exit | OpCode::Halt => return Ok(Flow::Return(Value::Nil)),
            OpCode::Nop => {}

            OpCode::Add => self.add()?,
            OpCode::Subtract => self.arithmetic(BinaryOp::Subtract)?,
            OpCode::Multiply => self.arithmetic(BinaryOp::Multiply)?,
            OpCode::Divide => self.arithmetic(BinaryOp::Divide)?,
            OpCode::Modulo => self.arithmetic(BinaryOp::Modulo)?,
            OpCode::Greater => self.arithmetic(BinaryOp::Greater)?,
            OpCode::Less => self.arithmetic(BinaryOp::Less)?,
            OpCode::Decrement => self.unary(|n| n.step(-1))?,
            OpCode::Increment => self.unary(|n| n.step(1))?,
            OpCode::Negate => self.unary(Number::negate)?,

            OpCode::Equal => {
                let b = self.peek(0)?.clone();
                let a = self.peek(1)?.clone();
                self.drop_top(2);
                self.push(Value::Bool(a == b));
            }
            OpCode::Not => {
                let value = self.pop()?;
                self.push(Value::Bool(value.is_falsey()));
            }

            OpCode::Nil => self.push(Value::Nil),
            OpCode::True => self.push(Value::Bool(true)),
            OpCode::False => self.push(Value::Bool(false)),

            OpCode::GetLocal => {
                let slot = self.read_byte(chunk)? as usize;
                let value = self
                    .stack
                    .get(slot)
                    .cloned()
                    .ok_or_else(|| invalid_slot(slot, line))?;
                self.push(value);
            }
            OpCode::SetLocal => {
                let slot = self.read_byte(chunk)? as usize;
                let value = self.peek(0)?.clone();
                match self.stack.get_mut(slot) {
                    Some(target) => *target = value,
                    None => return Err(invalid_slot(slot, line)),
                }
            }

            OpCode::GetGlobal => {
                let name = self.read_name(chunk)?;
                let value = self
                    .globals
                    .get(&name)
                    .ok_or_else(|| RuntimeError::undefined_variable(name.as_str(), line))?;
                self.push(value);
            }
            OpCode::SetGlobal => {
                let name = self.read_name(chunk)?;
                let value = self.peek(0)?.clone();
                if !self.globals.set(name.clone(), value) {
                    self.globals.delete(&name);
                    return Err(RuntimeError::undefined_variable(name.as_str(), line));
                }
            }
            OpCode::DefineGlobal => {
                let name = self.read_name(chunk)?;
                let value = self.pop()?;
                self.globals.set(name, value);
            }

            OpCode::Constant => {
                let value = self.read_constant(chunk)?;
                self.push(value);
            }
            OpCode::Pop => {
                self.pop()?;
            }
            OpCode::Copy => {
                let distance = self.read_byte(chunk)? as usize;
                let value = self.peek(distance)?.clone();
                self.push(value);
            }
            OpCode::Dup => {
                let value = self.peek(0)?.clone();
                self.push(value);
            }
            OpCode::Swap => {
                self.peek(1)?;
                let len = self.stack.len();
                self.stack.swap(len - 1, len - 2);
            }
            OpCode::Remove => {
                let distance = self.read_byte(chunk)? as usize;
                self.peek(distance)?;
                let index = self.stack.len() - 1 - distance;
                self.stack.remove(index);
            }

            OpCode::Rand => {
                // a full stack must not advance the generator
                if self.is_full() {
                    self.overflow = true;
                } else {
                    let value = self.rng.gen::<f32>();
                    self.push(Value::Float(value));
                }
            }
            OpCode::RandSeed => {
                let seed = self.peek_number(0)?;
                self.drop_top(1);
                self.rng = StdRng::seed_from_u64(seed.to_f64() as i64 as u64);
            }
            OpCode::RandMax => {
                let max = self.peek_number(0)?.to_f64() as i32;
                if max <= 0 {
                    return Err(RuntimeError::new("Invalid random range.", line));
                }
                self.drop_top(1);
                let value = self.rng.gen_range(0..max);
                self.push(Value::Int(value));
            }
            OpCode::RandRange => {
                let hi = self.peek_number(0)?.to_f64() as i32;
                let lo = self.peek_number(1)?.to_f64() as i32;
                if lo >= hi {
                    return Err(RuntimeError::new("Invalid random range.", line));
                }
                self.drop_top(2);
                let value = self.rng.gen_range(lo..hi);
                self.push(Value::Int(value));
            }

            OpCode::Call | OpCode::Breakpoint | OpCode::Request | OpCode::Host => {
                if let Some(hook) = HostHook::from_opcode(opcode) {
                    self.host.hook(hook, line, &self.stack);
                }
            }
            OpCode::Return => {
                let value = self.stack.pop().unwrap_or_default();
                if self.config.print_on_return {
                    self.print_value(&value);
                }
                return Ok(Flow::Return(value));
            }
            OpCode::Print => {
                let value = self.pop()?;
                self.print_value(&value);
            }
        }

        Ok(Flow::Continue)
    }

    fn read_byte(&mut self, chunk: &Chunk) -> VmResult<u8> {
        let byte = chunk
            .code
            .get(self.ip)
            .copied()
            .ok_or_else(|| RuntimeError::new("Unexpected end of bytecode.", self.line))?;
        self.ip += 1;
        Ok(byte)
    }

    fn read_u16(&mut self, chunk: &Chunk) -> VmResult<u16> {
        let value = chunk
            .read_u16(self.ip)
            .ok_or_else(|| RuntimeError::new("Unexpected end of bytecode.", self.line))?;
        self.ip += 2;
        Ok(value)
    }

    /// Read a constant, canonicalizing strings through this VM's pool so that
    /// chunks built elsewhere still compare by identity.
    fn read_constant(&mut self, chunk: &Chunk) -> VmResult<Value> {
        let index = self.read_byte(chunk)? as usize;
        match chunk.constants.get(index) {
            Some(Value::Object(string)) => Ok(Value::Object(self.strings.adopt(string))),
            Some(value) => Ok(value.clone()),
            None => Err(RuntimeError::new(
                format!("Invalid constant index {}.", index),
                self.line,
            )),
        }
    }

    fn read_name(&mut self, chunk: &Chunk) -> VmResult<ObjectRef> {
        match self.read_constant(chunk)? {
            Value::Object(name) => Ok(name),
            other => Err(RuntimeError::type_mismatch(
                format!("Variable name must be a string, not {}.", other.type_name()),
                self.line,
            )),
        }
    }

    fn is_full(&self) -> bool {
        self.stack.len() >= self.config.stack_max
    }

    fn push(&mut self, value: Value) {
        if self.is_full() {
            self.overflow = true;
            return;
        }
        self.stack.push(value);
    }

    fn pop(&mut self) -> VmResult<Value> {
        self.stack
            .pop()
            .ok_or(RuntimeError::StackUnderflow { line: self.line })
    }

    fn peek(&self, distance: usize) -> VmResult<&Value> {
        self.stack
            .len()
            .checked_sub(1 + distance)
            .and_then(|index| self.stack.get(index))
            .ok_or(RuntimeError::StackUnderflow { line: self.line })
    }

    fn peek_number(&self, distance: usize) -> VmResult<Number> {
        self.peek(distance)?
            .as_number()
            .ok_or_else(|| RuntimeError::type_mismatch("Operand must be a number.", self.line))
    }

    /// Discard `count` values already checked to exist.
    fn drop_top(&mut self, count: usize) {
        let len = self.stack.len().saturating_sub(count);
        self.stack.truncate(len);
    }

    /// `add` doubles as string concatenation.
    fn add(&mut self) -> VmResult<()> {
        let joined = match (self.peek(1)?, self.peek(0)?) {
            (Value::Object(a), Value::Object(b)) => {
                let mut joined = String::with_capacity(a.len() + b.len());
                joined.push_str(a.as_str());
                joined.push_str(b.as_str());
                Some(joined)
            }
            _ => None,
        };
        match joined {
            Some(joined) => {
                let result = self.strings.intern_owned(joined);
                self.drop_top(2);
                self.push(Value::Object(result));
                Ok(())
            }
            None => self.arithmetic(BinaryOp::Add),
        }
    }

    fn arithmetic(&mut self, op: BinaryOp) -> VmResult<()> {
        let (a, b) = match (self.peek(1)?.as_number(), self.peek(0)?.as_number()) {
            (Some(a), Some(b)) => (a, b),
            _ => {
                let message = match op {
                    BinaryOp::Add => "Operands must be two numbers or two strings.",
                    _ => "Operands must be numbers.",
                };
                return Err(RuntimeError::type_mismatch(message, self.line));
            }
        };
        let result = binary_op(op, a, b).map_err(|error| match error {
            ArithError::DivisionByZero => RuntimeError::DivisionByZero { line: self.line },
        })?;
        self.drop_top(2);
        self.push(result);
        Ok(())
    }

    fn unary(&mut self, op: impl FnOnce(Number) -> Number) -> VmResult<()> {
        let operand = self.peek_number(0)?;
        if let Some(top) = self.stack.last_mut() {
            *top = op(operand).into();
        }
        Ok(())
    }

    fn print_value(&mut self, value: &Value) {
        let text = value.to_string();
        println!("{}", text);
        self.output.push(text);
    }

    fn trace_instruction(&self, chunk: &Chunk, offset: usize) {
        let stack: String = self
            .stack
            .iter()
            .map(|value| format!("[ {} ]", value.tagged()))
            .collect();
        let mut instruction = String::new();
        disassemble_instruction(chunk, offset, &mut instruction);
        tracing::trace!(stack = %stack, "{}", instruction.trim_end());
    }
}

impl Default for Vm {
    fn default() -> Self {
        Self::new(VmConfig::default())
    }
}

impl Drop for Vm {
    fn drop(&mut self) {
        self.teardown();
    }
}

fn invalid_slot(slot: usize, line: u32) -> RuntimeError {
    RuntimeError::new(format!("Invalid local slot {}.", slot), line)
}
