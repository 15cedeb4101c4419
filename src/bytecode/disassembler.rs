//! Bytecode disassembler for debugging.

use crate::bytecode::chunk::Chunk;
use crate::bytecode::instruction::OpCode;
use crate::bytecode::value::Value;

/// Disassemble a whole chunk into human-readable output.
pub fn disassemble_chunk(chunk: &Chunk, name: &str) -> String {
    let mut output = format!("== {} ==\n", name);
    let mut offset = 0;
    while offset < chunk.code.len() {
        offset = disassemble_instruction(chunk, offset, &mut output);
    }
    output
}

/// Offsets of every instruction in the chunk, in execution-decoding order.
pub fn instruction_offsets(chunk: &Chunk) -> Vec<usize> {
    let mut offsets = Vec::new();
    let mut offset = 0;
    while offset < chunk.code.len() {
        offsets.push(offset);
        offset = next_offset(chunk, offset);
    }
    offsets
}

/// Offset of the instruction following the one at `offset`.
pub fn next_offset(chunk: &Chunk, offset: usize) -> usize {
    match OpCode::from_u8(chunk.code[offset]) {
        Some(op) => offset + 1 + op.operand_size(),
        None => offset + 1,
    }
}

/// Disassemble a single instruction, returning the offset of the next one.
pub fn disassemble_instruction(chunk: &Chunk, offset: usize, output: &mut String) -> usize {
    output.push_str(&format!("{:04} ", offset));

    let line = chunk.line(offset);
    if offset > 0 && line == chunk.line(offset - 1) {
        output.push_str("   | ");
    } else {
        output.push_str(&format!("{:4} ", line));
    }

    let byte = chunk.code[offset];
    let opcode = match OpCode::from_u8(byte) {
        Some(op) => op,
        None => {
            output.push_str(&format!("Unknown opcode {}\n", byte));
            return offset + 1;
        }
    };
    let name = format!("OP_{}", opcode.mnemonic().to_uppercase());
    let next = offset + 1 + opcode.operand_size();

    match opcode.operand_size() {
        0 => output.push_str(&format!("{}\n", name)),
        1 => {
            let Some(&operand) = chunk.code.get(offset + 1) else {
                output.push_str(&format!("{} <truncated>\n", name));
                return chunk.code.len();
            };
            if matches!(opcode, OpCode::Constant) || opcode.takes_global_name() {
                let constant = chunk.constants.get(operand as usize);
                output.push_str(&format!(
                    "{:<16} {:4} '{}'\n",
                    name,
                    operand,
                    format_constant(constant)
                ));
            } else {
                output.push_str(&format!("{:<16} {:4}\n", name, operand));
            }
        }
        _ => {
            let Some(jump) = chunk.read_u16(offset + 1) else {
                output.push_str(&format!("{} <truncated>\n", name));
                return chunk.code.len();
            };
            let target = if opcode == OpCode::Loop {
                next as i64 - jump as i64
            } else {
                next as i64 + jump as i64
            };
            output.push_str(&format!("{:<16} {:4} -> {}\n", name, offset, target));
        }
    }

    next
}

fn format_constant(constant: Option<&Value>) -> String {
    match constant {
        Some(value) => value.tagged(),
        None => "???".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sample_chunk() -> Chunk {
        let mut chunk = Chunk::new();
        let idx = chunk.add_constant(Value::Int(7));
        chunk.write_op(OpCode::Constant, 1);
        chunk.write(idx as u8, 1);
        chunk.write_op(OpCode::JumpIfFalse, 2);
        chunk.write_u16(1, 2);
        chunk.write_op(OpCode::Negate, 2);
        chunk.write_op(OpCode::Loop, 3);
        chunk.write_u16(9, 3);
        chunk.write_op(OpCode::Return, 4);
        chunk
    }

    #[test]
    fn test_disassemble_chunk() {
        let text = disassemble_chunk(&sample_chunk(), "test");
        let expected = "\
== test ==
0000    1 OP_CONSTANT         0 '<int|7>'
0002    2 OP_JUMP_IF_FALSE    2 -> 6
0005    | OP_NEG
0006    3 OP_LOOP             6 -> 0
0009    4 OP_RET
";
        assert_eq!(text, expected);
    }

    #[test]
    fn test_offsets_follow_operand_widths() {
        let chunk = sample_chunk();
        assert_eq!(instruction_offsets(&chunk), vec![0, 2, 5, 6, 9]);
        let ops: Vec<u8> = instruction_offsets(&chunk)
            .into_iter()
            .map(|offset| chunk.code[offset])
            .collect();
        assert_eq!(
            ops,
            vec![
                OpCode::Constant as u8,
                OpCode::JumpIfFalse as u8,
                OpCode::Negate as u8,
                OpCode::Loop as u8,
                OpCode::Return as u8,
            ]
        );
    }

    #[test]
    fn test_unknown_opcode_advances_one_byte() {
        let mut chunk = Chunk::new();
        chunk.write(250, 1);
        let mut out = String::new();
        assert_eq!(disassemble_instruction(&chunk, 0, &mut out), 1);
        assert_eq!(out, "0000    1 Unknown opcode 250\n");
    }
}
