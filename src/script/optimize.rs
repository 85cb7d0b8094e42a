//! Post-lowering optimisers (§4.8): remove-NOP and dead-code-elimination
//! after an unconditional return. Both operate purely on [`Program`]'s
//! index-based jump operands (the lowering pass never resolves a jump to a
//! byte offset — only [`crate::script::program`] does that at serialisation
//! time), which makes rewiring a deleted instruction's incoming jumps a
//! matter of remapping indices rather than patching byte math.
//!
//! Grounded on PyKotor's `ncs_optimizers.py` (`RemoveNopOptimizer`,
//! `RemoveUnusedBlocksOptimizer`-equivalent dead-code-after-return pass);
//! this crate keeps the same two named passes.

use crate::script::opcode::{Instruction, Opcode, Operand, Program};

/// Delete every `NOP` instruction, rewiring jumps that targeted one to the
/// next surviving instruction. A `NOP` that is itself a jump target *and*
/// the last instruction in the program (the Design Notes' "one particular
/// unreachable NOP at the end of every program" quirk) has no successor to
/// rewire to and is left in place, since removing it would leave no
/// instruction for a same-index jump to land on.
pub fn removeNop(program: &Program) -> Program
{
	let instructions = &program.instructions;
	let mut keep = vec![true; instructions.len()];
	for (index, instruction) in instructions.iter().enumerate()
	{
		if instruction.opcode == Opcode::Nop && index + 1 < instructions.len()
		{
			keep[index] = false;
		}
	}

	return rebuild(instructions, &keep);
}

/// Delete instructions in a basic block that follow an unconditional
/// `RETN` up to (but not including) the next jump target, since an
/// unconditional return makes that code unreachable. A jump-target index
/// is any index a surviving `Operand::Jump` still points at after the
/// pass's own deletions are folded in.
pub fn removeDeadCodeAfterReturn(program: &Program) -> Program
{
	let instructions = &program.instructions;
	let targets: std::collections::HashSet<usize> = instructions
		.iter()
		.filter_map(|instruction| match &instruction.operand
		{
			Operand::Jump(target) => Some(*target),
			_ => None,
		})
		.collect();

	let mut keep = vec![true; instructions.len()];
	let mut unreachable = false;
	for (index, instruction) in instructions.iter().enumerate()
	{
		if targets.contains(&index)
		{
			unreachable = false;
		}
		if unreachable
		{
			keep[index] = false;
			continue;
		}
		if instruction.opcode == Opcode::Return
		{
			unreachable = true;
		}
	}

	return rebuild(instructions, &keep);
}

/// Drop every instruction whose `keep` slot is `false`, remapping jump
/// operands from old indices to new ones. A jump whose original target was
/// itself removed is rewired forward to the nearest surviving instruction
/// at or after that target, preserving "every jump in the original program
/// reaches the same logical successor" (§8).
fn rebuild(instructions: &[Instruction], keep: &[bool]) -> Program
{
	let mut oldToNew = vec![0usize; instructions.len()];
	let mut newIndex = 0;
	for (index, kept) in keep.iter().enumerate()
	{
		oldToNew[index] = newIndex;
		if *kept
		{
			newIndex += 1;
		}
	}

	let remapTarget = |target: usize| -> usize
	{
		let mut cursor = target;
		while cursor < keep.len() && !keep[cursor]
		{
			cursor += 1;
		}
		return if cursor < keep.len() { oldToNew[cursor] } else { newIndex };
	};

	let mut result = Program::new();
	for (index, instruction) in instructions.iter().enumerate()
	{
		if !keep[index]
		{
			continue;
		}

		let operand = match &instruction.operand
		{
			Operand::Jump(target) => Operand::Jump(remapTarget(*target)),
			other => other.clone(),
		};

		result.push(Instruction::new(instruction.opcode, instruction.qualifier, operand));
	}

	return result;
}
