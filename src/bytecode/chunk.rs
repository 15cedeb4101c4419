//! Bytecode chunk containing instructions, line numbers and constants.

use crate::bytecode::buffer::Buffer;
use crate::bytecode::instruction::OpCode;
use crate::bytecode::value::Value;

/// A chunk of bytecode: instructions + constant pool + line info.
///
/// `lines[i]` is the source line of `code[i]`; the two always have the same
/// length.
#[derive(Debug, Clone, Default)]
pub struct Chunk {
    /// The bytecode instructions and their operands.
    pub code: Buffer<u8>,
    /// Source line numbers, parallel to `code`.
    pub lines: Buffer<u32>,
    /// Constant pool.
    pub constants: Buffer<Value>,
}

impl Chunk {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a raw byte and its source line.
    pub fn write(&mut self, byte: u8, line: u32) {
        self.code.push(byte);
        self.lines.push(line);
    }

    /// Write an opcode, returning its offset.
    pub fn write_op(&mut self, op: OpCode, line: u32) -> usize {
        let offset = self.code.len();
        self.write(op as u8, line);
        offset
    }

    /// Write a 16-bit operand (big-endian).
    pub fn write_u16(&mut self, value: u16, line: u32) {
        let [hi, lo] = value.to_be_bytes();
        self.write(hi, line);
        self.write(lo, line);
    }

    /// Read a 16-bit operand at offset, if both bytes are present.
    pub fn read_u16(&self, offset: usize) -> Option<u16> {
        let hi = *self.code.get(offset)?;
        let lo = *self.code.get(offset + 1)?;
        Some(u16::from_be_bytes([hi, lo]))
    }

    /// Add a constant to the pool and return its index. Duplicates get their
    /// own slot.
    pub fn add_constant(&mut self, value: Value) -> usize {
        self.constants.push(value);
        self.constants.len() - 1
    }

    /// Get the current offset in the code.
    pub fn len(&self) -> usize {
        self.code.len()
    }

    pub fn is_empty(&self) -> bool {
        self.code.is_empty()
    }

    /// Patch the 16-bit jump operand at `offset` so it lands on the current end
    /// of the code. Returns `None` if the distance does not fit.
    pub fn patch_jump(&mut self, offset: usize) -> Option<()> {
        self.patch_jump_to(offset, self.code.len())
    }

    /// Patch the 16-bit jump operand at `offset` so it lands on `target`,
    /// which must not precede the end of the operand.
    pub fn patch_jump_to(&mut self, offset: usize, target: usize) -> Option<()> {
        let distance = target.checked_sub(offset + 2)?;
        let distance = u16::try_from(distance).ok()?;
        let [hi, lo] = distance.to_be_bytes();
        *self.code.get_mut(offset)? = hi;
        *self.code.get_mut(offset + 1)? = lo;
        Some(())
    }

    /// Get the line number at a given offset.
    pub fn line(&self, offset: usize) -> u32 {
        self.lines.get(offset).copied().unwrap_or(0)
    }

    /// Release all three buffers.
    pub fn free(&mut self) {
        self.code.free();
        self.lines.free();
        self.constants.free();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_basics() {
        let mut chunk = Chunk::new();
        chunk.write_op(OpCode::Constant, 1);
        chunk.write(0, 1);
        chunk.write_op(OpCode::Return, 2);

        assert_eq!(chunk.code.len(), 3);
        assert_eq!(chunk.lines.len(), chunk.code.len());
        assert_eq!(chunk.code[0], OpCode::Constant as u8);
        assert_eq!(chunk.line(2), 2);
    }

    #[test]
    fn test_constant_pool_keeps_duplicates() {
        let mut chunk = Chunk::new();
        let idx1 = chunk.add_constant(Value::Int(42));
        let idx2 = chunk.add_constant(Value::Int(42));
        assert_eq!(idx1, 0);
        assert_eq!(idx2, 1);
        assert_eq!(chunk.constants.len(), 2);
    }

    #[test]
    fn test_u16_is_big_endian() {
        let mut chunk = Chunk::new();
        chunk.write_u16(0x0102, 7);
        assert_eq!(chunk.code.as_slice(), &[0x01, 0x02]);
        assert_eq!(chunk.read_u16(0), Some(0x0102));
        assert_eq!(chunk.read_u16(1), None);
    }

    #[test]
    fn test_jump_patching() {
        let mut chunk = Chunk::new();
        chunk.write_op(OpCode::JumpIfFalse, 1);
        let jump_offset = chunk.len();
        chunk.write_u16(0xFFFF, 1);

        chunk.write_op(OpCode::Pop, 1);
        chunk.write_op(OpCode::Pop, 1);

        chunk.patch_jump(jump_offset).expect("jump fits");

        // Should jump over 2 Pop instructions (2 bytes)
        assert_eq!(chunk.read_u16(jump_offset), Some(2));
    }

    #[test]
    fn test_free_resets_everything() {
        let mut chunk = Chunk::new();
        chunk.write_op(OpCode::Nil, 1);
        chunk.add_constant(Value::Nil);
        chunk.free();
        assert!(chunk.is_empty());
        assert!(chunk.lines.is_empty());
        assert!(chunk.constants.is_empty());
        assert_eq!(chunk.code.capacity(), 0);
    }
}
