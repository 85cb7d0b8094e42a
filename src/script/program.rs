//! NCS container serialisation (§4.7, §6 "Bytecode file").
//!
//! `8-byte signature "NCS V1.0" + 4-byte big-endian total size + instruction
//! stream`. Each instruction is `opcode byte, qualifier byte,` then operand
//! bytes whose shape depends on the opcode (§4.7): jump opcodes carry a
//! signed 32-bit relative offset, `ACTION` carries a 16-bit routine id plus
//! an 8-bit argument count, the stack-copy family carries a stack offset
//! and a byte count, `CONST` carries its literal. Multi-byte fields are
//! big-endian throughout, matching the container's own size prefix.

use std::io::{Cursor, Read, Write};

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};

use crate::error::{Error, Result};
use crate::script::opcode::{Constant, Instruction, Opcode, Operand, Program, Qualifier};

pub const Signature: &str = "NCS V1.0";

impl Program
{
	/// Serialise into the on-disk NCS container. Jump operands are patched
	/// to their final relative-offset form during this pass, since only
	/// here are every instruction's final byte offsets known.
	pub fn write(&self) -> Result<Vec<u8>>
	{
		let encoded = self.encodeInstructions()?;

		let mut out = Vec::with_capacity(encoded.len() + 12);
		out.write_all(Signature.as_bytes())?;
		out.write_u32::<BigEndian>((encoded.len() + 12) as u32)?;
		out.write_all(&encoded)?;

		return Ok(out);
	}

	fn encodeInstructions(&self) -> Result<Vec<u8>>
	{
		// First pass: compute each instruction's starting byte offset
		// relative to the start of the instruction stream.
		let mut offsets = Vec::with_capacity(self.instructions.len());
		let mut cursorOffset: i64 = 0;
		for instruction in &self.instructions
		{
			offsets.push(cursorOffset);
			cursorOffset += instructionSize(instruction) as i64;
		}

		let mut out = Vec::new();
		for (index, instruction) in self.instructions.iter().enumerate()
		{
			out.push(instruction.opcode as u8);
			out.push(instruction.qualifier as u8);

			match &instruction.operand
			{
				Operand::None => {},
				Operand::StackOffset { offset, size } =>
				{
					out.write_i32::<BigEndian>(*offset)?;
					if requiresCopySize(instruction.opcode)
					{
						out.write_i16::<BigEndian>(*size as i16)?;
					}
				},
				Operand::Constant(constant) => writeConstant(&mut out, constant)?,
				Operand::Action { routineId, argumentCount } =>
				{
					out.write_u16::<BigEndian>(*routineId)?;
					out.write_u8(*argumentCount)?;
				},
				Operand::Jump(targetIndex) =>
				{
					let targetOffset = *offsets
						.get(*targetIndex)
						.ok_or_else(|| Error::compileError(0, String::new(), format!("jump target {targetIndex} out of range")))?;
					let relative = targetOffset - offsets[index];
					out.write_i32::<BigEndian>(relative as i32)?;
				},
			}
		}

		return Ok(out);
	}

	pub fn fromCursor(cursor: &mut Cursor<Vec<u8>>) -> Result<Self>
	{
		let mut signature = [0u8; 8];
		cursor.read_exact(&mut signature)?;
		if signature != Signature.as_bytes()
		{
			return Err(Error::invalidArchive(None, "bad NCS signature"));
		}

		let totalSize = cursor.read_u32::<BigEndian>()?;
		let streamStart = cursor.position();

		// First pass: decode every instruction, recording byte offsets so
		// relative jump operands can be resolved into instruction indices.
		let mut rawInstructions = Vec::new();
		let mut byteOffsetToIndex = std::collections::HashMap::new();

		while cursor.position() < streamStart + (totalSize as u64 - 8)
		{
			let instructionOffset = (cursor.position() - streamStart) as i64;
			byteOffsetToIndex.insert(instructionOffset, rawInstructions.len());

			let opcodeByte = cursor.read_u8()?;
			let qualifierByte = cursor.read_u8()?;
			let opcode = Opcode::from_repr(opcodeByte).ok_or_else(|| Error::invalidArchive(None, format!("unknown opcode byte 0x{opcodeByte:02x}")))?;
			let qualifier = Qualifier::from_repr(qualifierByte).unwrap_or(Qualifier::None);

			let operand = readOperand(cursor, opcode, qualifier)?;
			rawInstructions.push((instructionOffset, opcode, qualifier, operand));
		}

		let instructions = rawInstructions
			.into_iter()
			.map(|(offset, opcode, qualifier, operand)| -> Result<Instruction> {
				let resolvedOperand = match operand
				{
					RawOperand::Jump(relative) =>
					{
						let targetOffset = offset + relative as i64;
						let targetIndex = *byteOffsetToIndex
							.get(&targetOffset)
							.ok_or_else(|| Error::invalidArchive(None, "jump target does not land on an instruction boundary"))?;
						Operand::Jump(targetIndex)
					},
					RawOperand::Direct(direct) => direct,
				};
				Ok(Instruction::new(opcode, qualifier, resolvedOperand))
			})
			.collect::<Result<Vec<_>>>()?;

		return Ok(Program { instructions });
	}
}

enum RawOperand
{
	Direct(Operand),
	Jump(i32),
}

fn readOperand(cursor: &mut Cursor<Vec<u8>>, opcode: Opcode, qualifier: Qualifier) -> Result<RawOperand>
{
	use Opcode::*;

	return Ok(match opcode
	{
		Jump | JumpToSubroutine | JumpIfZero | JumpIfNonZero => RawOperand::Jump(cursor.read_i32::<BigEndian>()?),

		Const => RawOperand::Direct(Operand::Constant(readConstant(cursor, qualifier)?)),

		Action =>
		{
			let routineId = cursor.read_u16::<BigEndian>()?;
			let argumentCount = cursor.read_u8()?;
			RawOperand::Direct(Operand::Action { routineId, argumentCount })
		},

		CpDownSp | CpTopSp | CpDownBp | CpTopBp | Destruct =>
		{
			let offset = cursor.read_i32::<BigEndian>()?;
			let size = cursor.read_i16::<BigEndian>()? as i32;
			RawOperand::Direct(Operand::StackOffset { offset, size })
		},

		MoveSp | DecrementSp | IncrementSp | DecrementBp | IncrementBp | RsAdd =>
		{
			let offset = cursor.read_i32::<BigEndian>()?;
			RawOperand::Direct(Operand::StackOffset { offset, size: 0 })
		},

		_ => RawOperand::Direct(Operand::None),
	});
}

fn readConstant(cursor: &mut Cursor<Vec<u8>>, qualifier: Qualifier) -> Result<Constant>
{
	return Ok(match qualifier
	{
		Qualifier::Int => Constant::Int(cursor.read_i32::<BigEndian>()?),
		Qualifier::Float => Constant::Float(cursor.read_f32::<BigEndian>()?),
		Qualifier::Object => Constant::Object(cursor.read_i32::<BigEndian>()?),
		Qualifier::String =>
		{
			let length = cursor.read_u16::<BigEndian>()?;
			let mut bytes = vec![0u8; length as usize];
			cursor.read_exact(&mut bytes)?;
			Constant::String(String::from_utf8_lossy(&bytes).to_string())
		},
		_ => return Err(Error::invalidArchive(None, "CONST instruction with unsupported qualifier")),
	});
}

fn writeConstant(out: &mut Vec<u8>, constant: &Constant) -> Result<()>
{
	match constant
	{
		Constant::Int(value) => out.write_i32::<BigEndian>(*value)?,
		Constant::Float(value) => out.write_f32::<BigEndian>(*value)?,
		Constant::Object(value) => out.write_i32::<BigEndian>(*value)?,
		Constant::String(value) =>
		{
			out.write_u16::<BigEndian>(value.len() as u16)?;
			out.write_all(value.as_bytes())?;
		},
	}
	return Ok(());
}

fn requiresCopySize(opcode: Opcode) -> bool
{
	return matches!(opcode, Opcode::CpDownSp | Opcode::CpTopSp | Opcode::CpDownBp | Opcode::CpTopBp | Opcode::Destruct);
}

fn instructionSize(instruction: &Instruction) -> usize
{
	let operandSize = match &instruction.operand
	{
		Operand::None => 0,
		Operand::StackOffset { .. } => if requiresCopySize(instruction.opcode) { 6 } else { 4 },
		Operand::Constant(constant) => match constant
		{
			Constant::Int(_) | Constant::Float(_) | Constant::Object(_) => 4,
			Constant::String(value) => 2 + value.len(),
		},
		Operand::Action { .. } => 3,
		Operand::Jump(_) => 4,
	};

	return 2 + operandSize;
}

#[cfg(test)]
mod tests
{
	use super::*;

	#[test]
	fn EmptyProgramRoundTrips()
	{
		let program = Program::new();
		let bytes = program.write().unwrap();
		let mut cursor = Cursor::new(bytes);
		let reparsed = Program::fromCursor(&mut cursor).unwrap();
		assert!(reparsed.instructions.is_empty());
	}

	#[test]
	fn JumpResolvesToCorrectInstructionIndexAfterRoundTrip()
	{
		let mut program = Program::new();
		program.push(Instruction::new(Opcode::Jump, Qualifier::None, Operand::Jump(2)));
		program.push(Instruction::new(Opcode::Nop, Qualifier::None, Operand::None));
		program.push(Instruction::new(Opcode::Return, Qualifier::None, Operand::None));

		let bytes = program.write().unwrap();
		let mut cursor = Cursor::new(bytes);
		let reparsed = Program::fromCursor(&mut cursor).unwrap();

		assert_eq!(Some(2), reparsed.instructions[0].jumpTarget());
	}

	#[test]
	fn ConstAndActionRoundTrip()
	{
		let mut program = Program::new();
		program.push(Instruction::new(Opcode::Const, Qualifier::Int, Operand::Constant(Constant::Int(14))));
		program.push(Instruction::new(Opcode::Action, Qualifier::None, Operand::Action { routineId: 1, argumentCount: 1 }));

		let bytes = program.write().unwrap();
		let mut cursor = Cursor::new(bytes);
		let reparsed = Program::fromCursor(&mut cursor).unwrap();

		assert_eq!(Operand::Constant(Constant::Int(14)), reparsed.instructions[0].operand);
		assert_eq!(Operand::Action { routineId: 1, argumentCount: 1 }, reparsed.instructions[1].operand);
	}
}
