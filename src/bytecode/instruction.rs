//! Bytecode instruction definitions.

/// Opcodes for the bytecode virtual machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum OpCode {
    // ============ Control Flow ============
    /// Unconditional forward jump: JUMP <offset:u16>
    Jump = 0,
    /// Jump forward if the top is truthy, no pop: JUMP_IF_TRUE <offset:u16>
    JumpIfTrue,
    /// Jump forward if the top is falsey, no pop: JUMP_IF_FALSE <offset:u16>
    JumpIfFalse,
    /// Jump backward: LOOP <offset:u16>
    Loop,

    // ============ Halting ============
    /// Stop execution successfully
    Exit,
    /// Stop execution successfully
    Halt,
    /// Do nothing
    Nop,

    // ============ Arithmetic ============
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
    /// Subtract one, keeping the variant
    Decrement,
    /// Add one, keeping the variant
    Increment,
    Negate,

    // ============ Comparison & Logic ============
    /// Strict equality: a == b
    Equal,
    Greater,
    Less,
    Not,

    // ============ Literals ============
    Nil,
    True,
    False,

    // ============ Variables ============
    /// Get a stack slot: GET_LOCAL <slot:u8>
    GetLocal,
    /// Overwrite a stack slot with the top: SET_LOCAL <slot:u8>
    SetLocal,
    /// GET_GLOBAL <name_index:u8>
    GetGlobal,
    /// SET_GLOBAL <name_index:u8>
    SetGlobal,
    /// DEFINE_GLOBAL <name_index:u8>
    DefineGlobal,

    // ============ Constants & Stack ============
    /// Load a constant from the constant pool: CONSTANT <index:u8>
    Constant,
    /// Pop the top value
    Pop,
    /// Push a copy of the value `distance` below the top: COPY <distance:u8>
    Copy,
    /// Duplicate the top value
    Dup,
    /// Swap the top two values
    Swap,
    /// Delete the value `distance` below the top: REMOVE <distance:u8>
    Remove,

    // ============ Randomness ============
    /// Push a float in [0, 1)
    Rand,
    /// Pop a number and reseed the generator
    RandSeed,
    /// Pop max, push an int in [0, max)
    RandMax,
    /// Pop hi then lo, push an int in [lo, hi)
    RandRange,

    // ============ Calls & System ============
    /// Host hook
    Call,
    /// Return: pop the top and stop
    Return,
    /// Breakpoint host hook
    Breakpoint,
    /// Request host hook
    Request,
    /// Generic host hook
    Host,
    /// Pop and print the top value
    Print,
}

impl OpCode {
    /// Get the number of operand bytes for this opcode.
    pub fn operand_size(self) -> usize {
        match self {
            OpCode::Jump | OpCode::JumpIfTrue | OpCode::JumpIfFalse | OpCode::Loop => 2,

            OpCode::GetLocal
            | OpCode::SetLocal
            | OpCode::GetGlobal
            | OpCode::SetGlobal
            | OpCode::DefineGlobal
            | OpCode::Constant
            | OpCode::Copy
            | OpCode::Remove => 1,

            _ => 0,
        }
    }

    /// Convert from u8 to OpCode.
    pub fn from_u8(byte: u8) -> Option<OpCode> {
        ALL.get(byte as usize).copied()
    }

    /// Assembly mnemonic.
    pub fn mnemonic(self) -> &'static str {
        match self {
            OpCode::Jump => "jump",
            OpCode::JumpIfTrue => "jump_if_true",
            OpCode::JumpIfFalse => "jump_if_false",
            OpCode::Loop => "loop",
            OpCode::Exit => "exit",
            OpCode::Halt => "halt",
            OpCode::Nop => "nop",
            OpCode::Add => "add",
            OpCode::Subtract => "sub",
            OpCode::Multiply => "mul",
            OpCode::Divide => "div",
            OpCode::Modulo => "mod",
            OpCode::Decrement => "dec",
            OpCode::Increment => "inc",
            OpCode::Negate => "neg",
            OpCode::Equal => "eq",
            OpCode::Greater => "gt",
            OpCode::Less => "lt",
            OpCode::Not => "not",
            OpCode::Nil => "nil",
            OpCode::True => "true",
            OpCode::False => "false",
            OpCode::GetLocal => "get_local",
            OpCode::SetLocal => "set_local",
            OpCode::GetGlobal => "get_global",
            OpCode::SetGlobal => "set_global",
            OpCode::DefineGlobal => "define_global",
            OpCode::Constant => "constant",
            OpCode::Pop => "pop",
            OpCode::Copy => "copy",
            OpCode::Dup => "dup",
            OpCode::Swap => "swap",
            OpCode::Remove => "remove",
            OpCode::Rand => "rand",
            OpCode::RandSeed => "randseed",
            OpCode::RandMax => "randmax",
            OpCode::RandRange => "randrange",
            OpCode::Call => "call",
            OpCode::Return => "ret",
            OpCode::Breakpoint => "brp",
            OpCode::Request => "req",
            OpCode::Host => "host",
            OpCode::Print => "print",
        }
    }

    /// Parse a mnemonic, accepting the short jump aliases `jmp`, `jt` and `jf`.
    pub fn from_mnemonic(name: &str) -> Option<OpCode> {
        match name {
            "jmp" => Some(OpCode::Jump),
            "jt" => Some(OpCode::JumpIfTrue),
            "jf" => Some(OpCode::JumpIfFalse),
            "yeet" | "const" => Some(OpCode::Constant),
            "return" => Some(OpCode::Return),
            _ => ALL.iter().copied().find(|op| op.mnemonic() == name),
        }
    }

    pub fn is_jump(self) -> bool {
        matches!(
            self,
            OpCode::Jump | OpCode::JumpIfTrue | OpCode::JumpIfFalse | OpCode::Loop
        )
    }

    /// Operand names a global through the constant pool.
    pub fn takes_global_name(self) -> bool {
        matches!(
            self,
            OpCode::GetGlobal | OpCode::SetGlobal | OpCode::DefineGlobal
        )
    }
}

/// Every opcode, indexed by its byte value.
const ALL: [OpCode; 43] = [
    OpCode::Jump,
    OpCode::JumpIfTrue,
    OpCode::JumpIfFalse,
    OpCode::Loop,
    OpCode::Exit,
    OpCode::Halt,
    OpCode::Nop,
    OpCode::Add,
    OpCode::Subtract,
    OpCode::Multiply,
    OpCode::Divide,
    OpCode::Modulo,
    OpCode::Decrement,
    OpCode::Increment,
    OpCode::Negate,
    OpCode::Equal,
    OpCode::Greater,
    OpCode::Less,
    OpCode::Not,
    OpCode::Nil,
    OpCode::True,
    OpCode::False,
    OpCode::GetLocal,
    OpCode::SetLocal,
    OpCode::GetGlobal,
    OpCode::SetGlobal,
    OpCode::DefineGlobal,
    OpCode::Constant,
    OpCode::Pop,
    OpCode::Copy,
    OpCode::Dup,
    OpCode::Swap,
    OpCode::Remove,
    OpCode::Rand,
    OpCode::RandSeed,
    OpCode::RandMax,
    OpCode::RandRange,
    OpCode::Call,
    OpCode::Return,
    OpCode::Breakpoint,
    OpCode::Request,
    OpCode::Host,
    OpCode::Print,
];
