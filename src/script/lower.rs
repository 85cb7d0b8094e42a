//! AST → bytecode lowering (§4.7–§4.8): the `Compiler` walks a parsed
//! [`CodeRoot`] and emits a [`Program`] of [`Instruction`]s, tracking a
//! simulated running stack depth (`stackTop`) so every `CPTOPSP`/`CPDOWNSP`
//! offset can be computed relative to the current stack pointer without a
//! second pass.
//!
//! `original_source/`'s `classes.py` stub does not carry real codegen (see
//! its module doc in the PyKotor tree), so the calling convention here is
//! built from the NWScript VM's documented stack-machine semantics rather
//! than ported line-for-line: a function's return slot and parameters are
//! pushed by the *caller* before `JSR`, the callee copies its result down
//! into the reserved slot and cleans up its own locals/parameters before
//! `RETN`, and the program entry point pushes globals, `SAVEBP`s, and `JSR`s
//! into the named entry function (conventionally `main`).
//!
//! Jump targets are instruction indices, resolved to byte offsets only by
//! [`crate::script::program`] at serialisation time, same as
//! [`crate::script::optimize`]. Calls to not-yet-compiled functions are
//! recorded in `pendingCalls` and patched once every function has been
//! compiled, so forward, mutual, and recursive calls all resolve correctly
//! regardless of declaration order.

use std::collections::{HashMap, HashSet};

use crate::error::{Error, Result};
use crate::script::ast::{
	BinaryOperator, CodeRoot, CompoundAssignmentOperator, ConditionalBlock, DataType, Expression, FieldAccess, FunctionDefinition, IncrementDecrementOperator,
	Parameter, Statement, StructDefinition, SwitchBlock, TopLevel, UnaryOperator,
};
use crate::script::opcode::{Constant, Instruction, Opcode, Operand, Program, Qualifier};
use crate::script::routines::{EngineRoutine, EngineRoutineTable};

/// Size in bytes of one stack slot of `dataType` (§4.7 "every stack slot is
/// a fixed number of bytes for its type"). A `Vector` is three floats; a
/// `Struct` is the sum of its members', looked up recursively.
fn sizeOfDataType(dataType: &DataType, structs: &HashMap<String, StructDefinition>) -> i32
{
	return match dataType
	{
		DataType::Void => 0,
		DataType::Vector => 12,
		DataType::Struct(name) => structs
			.get(name)
			.map(|definition| definition.members.iter().map(|member| sizeOfDataType(&member.dataType, structs)).sum())
			.unwrap_or(4),
		_ => 4,
	};
}

/// The `CONST`/`RSADD` type-qualifier byte for a primitive type. Aggregate
/// types (`Vector`, `Struct`) are assembled from primitive slots elsewhere
/// and never reach here directly.
fn qualifierForType(dataType: &DataType) -> Qualifier
{
	return match dataType
	{
		DataType::Int => Qualifier::Int,
		DataType::Float => Qualifier::Float,
		DataType::String => Qualifier::String,
		DataType::Object => Qualifier::Object,
		DataType::Event => Qualifier::Event,
		DataType::Effect => Qualifier::Effect,
		DataType::Location => Qualifier::Location,
		DataType::Talent => Qualifier::Talent,
		_ => Qualifier::None,
	};
}

fn opcodeForBinary(operator: BinaryOperator) -> Opcode
{
	use BinaryOperator::*;
	return match operator
	{
		Add => Opcode::Add,
		Subtract => Opcode::Subtract,
		Multiply => Opcode::Multiply,
		Divide => Opcode::Divide,
		Modulo => Opcode::Modulo,
		Equal => Opcode::Equal,
		NotEqual => Opcode::NotEqual,
		Greater => Opcode::Greater,
		GreaterEqual => Opcode::GreaterEqual,
		Less => Opcode::Less,
		LessEqual => Opcode::LessEqual,
		LogicalAnd => Opcode::LogicalAnd,
		LogicalOr => Opcode::LogicalOr,
		BitwiseAnd => Opcode::BitwiseAnd,
		BitwiseOr => Opcode::InclusiveOr,
		BitwiseXor => Opcode::ExclusiveOr,
		ShiftLeft => Opcode::ShiftLeft,
		ShiftRight => Opcode::ShiftRight,
	};
}

fn noOverload(operator: &str, left: &DataType, right: &DataType) -> Error
{
	return Error::compileError(0, operator, format!("no overload for {operator} with ({left:?}, {right:?})"));
}

/// Qualifier and result type for every arithmetic/relational/bitwise
/// operator other than `==`/`!=` (which go through [`pairQualifierForEquality`])
/// and `&&`/`||` (short-circuited, never reach a binary opcode directly).
fn arithmeticQualifierAndType(operator: BinaryOperator, left: &DataType, right: &DataType) -> Result<(Qualifier, DataType)>
{
	use BinaryOperator::*;
	use DataType::*;
	return match (operator, left, right)
	{
		(Add, Int, Int) => Ok((Qualifier::IntInt, Int)),
		(Add, Float, Float) => Ok((Qualifier::FloatFloat, Float)),
		(Add, Int, Float) => Ok((Qualifier::IntFloat, Float)),
		(Add, Float, Int) => Ok((Qualifier::FloatInt, Float)),
		(Add, String, String) => Ok((Qualifier::StringString, String)),
		(Add, Vector, Vector) => Ok((Qualifier::VectorVector, Vector)),
		(Subtract, Int, Int) => Ok((Qualifier::IntInt, Int)),
		(Subtract, Float, Float) => Ok((Qualifier::FloatFloat, Float)),
		(Subtract, Int, Float) => Ok((Qualifier::IntFloat, Float)),
		(Subtract, Float, Int) => Ok((Qualifier::FloatInt, Float)),
		(Subtract, Vector, Vector) => Ok((Qualifier::VectorVector, Vector)),
		(Multiply, Int, Int) => Ok((Qualifier::IntInt, Int)),
		(Multiply, Float, Float) => Ok((Qualifier::FloatFloat, Float)),
		(Multiply, Int, Float) => Ok((Qualifier::IntFloat, Float)),
		(Multiply, Float, Int) => Ok((Qualifier::FloatInt, Float)),
		(Multiply, Vector, Float) => Ok((Qualifier::VectorFloat, Vector)),
		(Multiply, Float, Vector) => Ok((Qualifier::FloatVector, Vector)),
		(Divide, Int, Int) => Ok((Qualifier::IntInt, Int)),
		(Divide, Float, Float) => Ok((Qualifier::FloatFloat, Float)),
		(Divide, Int, Float) => Ok((Qualifier::IntFloat, Float)),
		(Divide, Float, Int) => Ok((Qualifier::FloatInt, Float)),
		(Divide, Vector, Float) => Ok((Qualifier::VectorFloat, Vector)),
		(Modulo, Int, Int) => Ok((Qualifier::IntInt, Int)),
		(Greater, Int, Int) | (GreaterEqual, Int, Int) | (Less, Int, Int) | (LessEqual, Int, Int) => Ok((Qualifier::IntInt, Int)),
		(Greater, Float, Float) | (GreaterEqual, Float, Float) | (Less, Float, Float) | (LessEqual, Float, Float) => Ok((Qualifier::FloatFloat, Int)),
		(BitwiseAnd, Int, Int) => Ok((Qualifier::IntInt, Int)),
		(BitwiseOr, Int, Int) => Ok((Qualifier::IntInt, Int)),
		(BitwiseXor, Int, Int) => Ok((Qualifier::IntInt, Int)),
		(ShiftLeft, Int, Int) => Ok((Qualifier::IntInt, Int)),
		(ShiftRight, Int, Int) => Ok((Qualifier::IntInt, Int)),
		_ => Err(noOverload(&format!("{operator:?}"), left, right)),
	};
}

/// Qualifier for `==`/`!=`, which (unlike the other relational operators)
/// are defined over every type, including vectors, structs, and engine
/// handle types, provided both sides agree.
fn pairQualifierForEquality(left: &DataType, right: &DataType) -> Result<Qualifier>
{
	use DataType::*;
	return match (left, right)
	{
		(Int, Int) => Ok(Qualifier::IntInt),
		(Float, Float) => Ok(Qualifier::FloatFloat),
		(String, String) => Ok(Qualifier::StringString),
		(Object, Object) => Ok(Qualifier::ObjectObject),
		(Vector, Vector) => Ok(Qualifier::VectorVector),
		(Event, Event) => Ok(Qualifier::EventEvent),
		(Effect, Effect) => Ok(Qualifier::EffectEffect),
		(Location, Location) => Ok(Qualifier::LocationLocation),
		(Talent, Talent) => Ok(Qualifier::TalentTalent),
		(Struct(a), Struct(b)) if a == b => Ok(Qualifier::StructStruct),
		_ => Err(noOverload("==", left, right)),
	};
}

/// Inline every `#include`d [`CodeRoot`] (looked up by name in `library`)
/// into a flat object list, depth-first, skipping an include already seen
/// so a diamond or cyclic include graph terminates instead of looping.
fn flattenIncludes(root: &CodeRoot, library: &HashMap<String, CodeRoot>, seen: &mut HashSet<String>) -> Result<Vec<TopLevel>>
{
	let mut objects = Vec::new();
	for object in &root.objects
	{
		match object
		{
			TopLevel::Include(name) =>
			{
				if !seen.insert(name.clone())
				{
					continue;
				}
				let included = library.get(name).ok_or_else(|| Error::compileError(0, name, "include not found in library"))?;
				objects.extend(flattenIncludes(included, library, seen)?);
			}
			other => objects.push(other.clone()),
		}
	}
	return Ok(objects);
}

#[derive(Clone, Debug)]
struct LocalVar
{
	name: String,
	dataType: DataType,
	/// The stack depth (in the function's own zero-based coordinate system)
	/// at which this variable's bytes *begin*; combined with the current
	/// `stackTop` this gives the negative `CPTOPSP`/`CPDOWNSP` offset.
	frameOffset: i32,
}

#[derive(Clone, Copy, Debug)]
enum VarLocation
{
	/// SP-relative: a parameter or a local declared in the current function.
	Local(i32),
	/// BP-relative: a global, fixed for the program's whole lifetime once
	/// `SAVEBP` runs in the entry preamble.
	Global(i32),
}

#[derive(Clone, Debug)]
struct ResolvedAccess
{
	location: VarLocation,
	/// Byte offset of a field/vector-component within the variable's own
	/// aggregate, accumulated while walking a [`FieldAccess`] chain.
	delta: i32,
	size: i32,
	dataType: DataType,
}

impl ResolvedAccess
{
	fn offset(&self, stackTop: i32) -> i32
	{
		return match self.location
		{
			VarLocation::Local(frameOffset) => frameOffset - stackTop + self.delta,
			VarLocation::Global(bpOffset) => bpOffset + self.delta,
		};
	}
}

#[derive(Clone, Debug)]
enum Frame
{
	Loop { breakPatches: Vec<usize>, continuePatches: Vec<usize>, stackDepthAtEntry: i32 },
	Switch { breakPatches: Vec<usize>, stackDepthAtEntry: i32 },
}

#[derive(Clone, Debug)]
struct FunctionSignature
{
	returnType: DataType,
	parameters: Vec<Parameter>,
}

/// Lowers one [`CodeRoot`] (plus, transitively, any flattened includes)
/// into a [`Program`]. One `Compiler` compiles one program; build a fresh
/// one per compilation.
pub struct Compiler<'a>
{
	routines: &'a EngineRoutineTable,
	structs: HashMap<String, StructDefinition>,
	functions: HashMap<String, FunctionSignature>,
	functionEntry: HashMap<String, usize>,
	pendingCalls: Vec<(usize, String)>,
	globals: HashMap<String, (DataType, i32)>,
	scopes: Vec<Vec<LocalVar>>,
	frames: Vec<Frame>,
	stackTop: i32,
	returnSlotTop: i32,
	returnSize: i32,
	paramsTotal: i32,
	program: Program,
}

impl<'a> Compiler<'a>
{
	pub fn new(routines: &'a EngineRoutineTable) -> Self
	{
		return Self {
			routines,
			structs: HashMap::new(),
			functions: HashMap::new(),
			functionEntry: HashMap::new(),
			pendingCalls: Vec::new(),
			globals: HashMap::new(),
			scopes: Vec::new(),
			frames: Vec::new(),
			stackTop: 0,
			returnSlotTop: 0,
			returnSize: 0,
			paramsTotal: 0,
			program: Program::new(),
		};
	}

	/// Compile with `main` as the entry point (§4.6's conventional default).
	pub fn compile(&mut self, codeRoot: &CodeRoot) -> Result<Program>
	{
		return self.compileEntryPoint(codeRoot, "main");
	}

	pub fn compileEntryPoint(&mut self, codeRoot: &CodeRoot, entry: &str) -> Result<Program>
	{
		self.collectSignatures(codeRoot)?;
		self.emitEntryProgram(codeRoot, entry)?;
		for object in &codeRoot.objects
		{
			if let TopLevel::Function(definition) = object
			{
				self.compileFunction(definition)?;
			}
		}
		if !self.functionEntry.contains_key(entry)
		{
			return Err(Error::EntryPointError(entry.to_string()));
		}
		self.resolvePendingCalls()?;
		return Ok(std::mem::take(&mut self.program));
	}

	/// Resolve `#include`s against `library` before compiling, per
	/// `ast::TopLevel::Include`'s doc comment ("resolution happens during
	/// compilation, not parsing").
	pub fn compileWithIncludes(&mut self, codeRoot: &CodeRoot, library: &HashMap<String, CodeRoot>, entry: &str) -> Result<Program>
	{
		let mut seen = HashSet::new();
		let flattened = flattenIncludes(codeRoot, library, &mut seen)?;
		let merged = CodeRoot { objects: flattened };
		return self.compileEntryPoint(&merged, entry);
	}

	/// Compile every function in `codeRoot` as a library of JSR targets,
	/// without an entry preamble or an entry-point requirement — useful for
	/// a `#include`d header compiled standalone, or for isolating a single
	/// function's generated code in a test.
	pub fn compileLibrary(&mut self, codeRoot: &CodeRoot) -> Result<Program>
	{
		self.collectSignatures(codeRoot)?;
		for object in &codeRoot.objects
		{
			if let TopLevel::Function(definition) = object
			{
				self.compileFunction(definition)?;
			}
		}
		self.resolvePendingCalls()?;
		return Ok(std::mem::take(&mut self.program));
	}

	fn collectSignatures(&mut self, codeRoot: &CodeRoot) -> Result<()>
	{
		for object in &codeRoot.objects
		{
			if let TopLevel::Struct(definition) = object
			{
				self.structs.insert(definition.name.clone(), definition.clone());
			}
		}

		for object in &codeRoot.objects
		{
			match object
			{
				TopLevel::ForwardDeclaration(declaration) =>
				{
					self.functions.insert(
						declaration.name.clone(),
						FunctionSignature { returnType: declaration.returnType.clone(), parameters: declaration.parameters.clone() },
					);
				}
				TopLevel::Function(definition) =>
				{
					self.functions
						.insert(definition.name.clone(), FunctionSignature { returnType: definition.returnType.clone(), parameters: definition.parameters.clone() });
				}
				_ => {}
			}
		}

		let mut totalGlobalsSize = 0;
		for object in &codeRoot.objects
		{
			if let TopLevel::Global(global) = object
			{
				totalGlobalsSize += sizeOfDataType(&global.dataType, &self.structs);
			}
		}
		let mut cursor = -totalGlobalsSize;
		for object in &codeRoot.objects
		{
			if let TopLevel::Global(global) = object
			{
				let size = sizeOfDataType(&global.dataType, &self.structs);
				self.globals.insert(global.name.clone(), (global.dataType.clone(), cursor));
				cursor += size;
			}
		}

		return Ok(());
	}

	/// Push every global's initial value, `SAVEBP` (fixing every global's
	/// BP-relative offset for the rest of the program), `JSR` into `entry`
	/// (patched later, once `entry` is known to exist), then pop the
	/// globals and `RETN`.
	fn emitEntryProgram(&mut self, codeRoot: &CodeRoot, entry: &str) -> Result<()>
	{
		self.stackTop = 0;
		for object in &codeRoot.objects
		{
			if let TopLevel::Global(global) = object
			{
				match &global.initializer
				{
					Some(initializer) =>
					{
						let valueType = self.compileExpression(initializer)?;
						if valueType != global.dataType
						{
							return Err(Error::compileError(0, &global.name, format!("global '{}' expects {:?}, initializer is {:?}", global.name, global.dataType, valueType)));
						}
					}
					None =>
					{
						self.emitReserve(&global.dataType);
					}
				}
			}
		}

		self.program.push(Instruction::new(Opcode::SaveBp, Qualifier::None, Operand::None));
		let callIndex = self.program.push(Instruction::new(Opcode::JumpToSubroutine, Qualifier::None, Operand::Jump(0)));
		self.pendingCalls.push((callIndex, entry.to_string()));

		let totalGlobalsSize = self.stackTop;
		self.emitRawMoveSp(-totalGlobalsSize);
		self.program.push(Instruction::new(Opcode::Return, Qualifier::None, Operand::None));
		return Ok(());
	}

	fn resolvePendingCalls(&mut self) -> Result<()>
	{
		for (index, name) in self.pendingCalls.clone()
		{
			let target = *self.functionEntry.get(&name).ok_or_else(|| Error::compileError(0, &name, "call to a function that was never defined"))?;
			self.program.instructions[index].operand = Operand::Jump(target);
		}
		return Ok(());
	}

	/// Compile one function's body. The caller has already pushed a return
	/// slot (if any) and the arguments before `JSR`ing here, so `stackTop`
	/// resets to zero at the first instruction *after* those — parameters
	/// are registered as locals at negative offsets below that baseline.
	fn compileFunction(&mut self, definition: &FunctionDefinition) -> Result<()>
	{
		let startIndex = self.program.len();
		self.functionEntry.insert(definition.name.clone(), startIndex);

		self.paramsTotal = definition.parameters.iter().map(|parameter| sizeOfDataType(&parameter.dataType, &self.structs)).sum();
		self.returnSize = sizeOfDataType(&definition.returnType, &self.structs);
		self.returnSlotTop = -(self.paramsTotal + self.returnSize);
		self.stackTop = 0;
		self.frames.clear();

		let mut cursor = -self.paramsTotal;
		let mut paramScope = Vec::new();
		for parameter in &definition.parameters
		{
			let size = sizeOfDataType(&parameter.dataType, &self.structs);
			paramScope.push(LocalVar { name: parameter.name.clone(), dataType: parameter.dataType.clone(), frameOffset: cursor });
			cursor += size;
		}
		self.scopes = vec![paramScope, Vec::new()];

		self.compileStatements(&definition.body)?;

		if definition.returnType == DataType::Void
		{
			let cleanup = self.stackTop + self.paramsTotal;
			self.emitRawMoveSp(-cleanup);
			self.program.push(Instruction::new(Opcode::Return, Qualifier::None, Operand::None));
		}

		self.scopes.clear();
		return Ok(());
	}

	fn compileStatements(&mut self, statements: &[Statement]) -> Result<()>
	{
		for statement in statements
		{
			self.compileStatement(statement)?;
		}
		return Ok(());
	}

	fn compileStatement(&mut self, statement: &Statement) -> Result<()>
	{
		return match statement
		{
			Statement::Declaration { dataType, name, initializer } => self.compileDeclaration(dataType, name, initializer),
			Statement::Expression(expr) => self.compileExpressionStatement(expr),
			Statement::If(block) => self.compileConditional(block),
			Statement::Switch { subject, blocks } => self.compileSwitch(subject, blocks),
			Statement::While { condition, body } => self.compileWhile(condition, body),
			Statement::DoWhile { condition, body } => self.compileDoWhile(condition, body),
			Statement::For { initializer, condition, increment, body } => self.compileFor(initializer, condition, increment, body),
			Statement::Return(expr) => self.compileReturn(expr),
			Statement::Break => self.compileBreak(),
			Statement::Continue => self.compileContinue(),
			Statement::Empty => Ok(()),
			Statement::Scoped(statements) => self.compileScopedBlock(statements),
		};
	}

	fn compileDeclaration(&mut self, dataType: &DataType, name: &str, initializer: &Option<Expression>) -> Result<()>
	{
		let frameOffset = self.stackTop;
		let actualType = match initializer
		{
			Some(expr) =>
			{
				let valueType = self.compileExpression(expr)?;
				if &valueType != dataType
				{
					return Err(Error::compileError(0, name, format!("cannot initialize {dataType:?} '{name}' with {valueType:?}")));
				}
				valueType
			}
			None =>
			{
				self.emitReserve(dataType);
				dataType.clone()
			}
		};
		self.scopes
			.last_mut()
			.ok_or_else(|| Error::compileError(0, name, "declaration outside any scope"))?
			.push(LocalVar { name: name.to_string(), dataType: actualType, frameOffset });
		return Ok(());
	}

	/// A statement list that owns its own scope: locals declared inside are
	/// invisible (and their stack space reclaimed) once it closes, via a
	/// single `MOVSP` sized to whatever was actually declared.
	fn compileScopedBlock(&mut self, statements: &[Statement]) -> Result<()>
	{
		let saved = self.stackTop;
		self.scopes.push(Vec::new());
		self.compileStatements(statements)?;
		self.scopes.pop();
		self.emitMoveSp(saved - self.stackTop);
		return Ok(());
	}

	fn compileExpressionStatement(&mut self, expr: &Expression) -> Result<()>
	{
		let resultType = self.compileExpression(expr)?;
		let size = sizeOfDataType(&resultType, &self.structs);
		if size > 0
		{
			self.emitMoveSp(-size);
		}
		return Ok(());
	}

	fn compileConditional(&mut self, block: &ConditionalBlock) -> Result<()>
	{
		let mut exitPatches = Vec::new();
		for branch in &block.branches
		{
			let conditionType = self.compileExpression(&branch.condition)?;
			requireBool(&conditionType)?;
			let jzIndex = self.program.push(Instruction::new(Opcode::JumpIfZero, Qualifier::None, Operand::Jump(0)));
			self.stackTop -= 4;

			self.compileScopedBlock(&branch.body)?;
			exitPatches.push(self.program.push(Instruction::new(Opcode::Jump, Qualifier::None, Operand::Jump(0))));

			let nextTest = self.program.len();
			self.program.instructions[jzIndex].operand = Operand::Jump(nextTest);
		}

		if let Some(elseBody) = &block.elseBody
		{
			self.compileScopedBlock(elseBody)?;
		}

		let end = self.program.len();
		for index in exitPatches
		{
			self.program.instructions[index].operand = Operand::Jump(end);
		}
		return Ok(());
	}

	fn compileWhile(&mut self, condition: &Expression, body: &[Statement]) -> Result<()>
	{
		let stackDepthAtEntry = self.stackTop;
		let loopStart = self.program.len();

		let conditionType = self.compileExpression(condition)?;
		requireBool(&conditionType)?;
		let exitIndex = self.program.push(Instruction::new(Opcode::JumpIfZero, Qualifier::None, Operand::Jump(0)));
		self.stackTop -= 4;

		self.frames.push(Frame::Loop { breakPatches: vec![exitIndex], continuePatches: Vec::new(), stackDepthAtEntry });
		self.compileScopedBlock(body)?;

		if let Frame::Loop { continuePatches, .. } = self.frames.last().unwrap()
		{
			for index in continuePatches.clone()
			{
				self.program.instructions[index].operand = Operand::Jump(loopStart);
			}
		}
		self.program.push(Instruction::new(Opcode::Jump, Qualifier::None, Operand::Jump(loopStart)));

		let loopEnd = self.program.len();
		if let Frame::Loop { breakPatches, .. } = self.frames.pop().unwrap()
		{
			for index in breakPatches
			{
				self.program.instructions[index].operand = Operand::Jump(loopEnd);
			}
		}
		return Ok(());
	}

	fn compileDoWhile(&mut self, condition: &Expression, body: &[Statement]) -> Result<()>
	{
		let stackDepthAtEntry = self.stackTop;
		let bodyStart = self.program.len();

		self.frames.push(Frame::Loop { breakPatches: Vec::new(), continuePatches: Vec::new(), stackDepthAtEntry });
		self.compileScopedBlock(body)?;

		let conditionStart = self.program.len();
		if let Frame::Loop { continuePatches, .. } = self.frames.last().unwrap()
		{
			for index in continuePatches.clone()
			{
				self.program.instructions[index].operand = Operand::Jump(conditionStart);
			}
		}

		let conditionType = self.compileExpression(condition)?;
		requireBool(&conditionType)?;
		self.program.push(Instruction::new(Opcode::JumpIfNonZero, Qualifier::None, Operand::Jump(bodyStart)));
		self.stackTop -= 4;

		let loopEnd = self.program.len();
		if let Frame::Loop { breakPatches, .. } = self.frames.pop().unwrap()
		{
			for index in breakPatches
			{
				self.program.instructions[index].operand = Operand::Jump(loopEnd);
			}
		}
		return Ok(());
	}

	fn compileFor(&mut self, initializer: &Expression, condition: &Expression, increment: &Expression, body: &[Statement]) -> Result<()>
	{
		let stackDepthAtEntry = self.stackTop;
		self.compileExpressionStatement(initializer)?;

		let conditionStart = self.program.len();
		let conditionType = self.compileExpression(condition)?;
		requireBool(&conditionType)?;
		let exitIndex = self.program.push(Instruction::new(Opcode::JumpIfZero, Qualifier::None, Operand::Jump(0)));
		self.stackTop -= 4;

		self.frames.push(Frame::Loop { breakPatches: vec![exitIndex], continuePatches: Vec::new(), stackDepthAtEntry });
		self.compileScopedBlock(body)?;

		let continueTarget = self.program.len();
		if let Frame::Loop { continuePatches, .. } = self.frames.last().unwrap()
		{
			for index in continuePatches.clone()
			{
				self.program.instructions[index].operand = Operand::Jump(continueTarget);
			}
		}
		self.compileExpressionStatement(increment)?;
		self.program.push(Instruction::new(Opcode::Jump, Qualifier::None, Operand::Jump(conditionStart)));

		let loopEnd = self.program.len();
		if let Frame::Loop { breakPatches, .. } = self.frames.pop().unwrap()
		{
			for index in breakPatches
			{
				self.program.instructions[index].operand = Operand::Jump(loopEnd);
			}
		}
		return Ok(());
	}

	/// Label tests are emitted first (each a dup of the subject, the label
	/// value, an `EQUAL`, and a `JNZ` to that block's body), then every
	/// block's statements are laid out back to back in source order —
	/// fallthrough is free, since it is nothing but falling into the next
	/// instruction. A `default:` label's block gets the final unconditional
	/// jump once every other test has failed; with no `default`, that jump
	/// instead exits the switch entirely.
	fn compileSwitch(&mut self, subject: &Expression, blocks: &[SwitchBlock]) -> Result<()>
	{
		let stackDepthAtEntry = self.stackTop;
		let subjectType = self.compileExpression(subject)?;
		let subjectSize = sizeOfDataType(&subjectType, &self.structs);
		let subjectDepth = self.stackTop;

		let mut dispatchPatches: Vec<(usize, usize)> = Vec::new();
		let mut defaultBlock: Option<usize> = None;
		for (blockIndex, block) in blocks.iter().enumerate()
		{
			for label in &block.labels
			{
				match &label.value
				{
					Some(valueExpr) =>
					{
						self.emitDuplicateTop(subjectSize);
						let labelType = self.compileExpression(valueExpr)?;
						let qualifier = pairQualifierForEquality(&subjectType, &labelType)?;
						self.program.push(Instruction::new(Opcode::Equal, qualifier, Operand::None));
						let index = self.program.push(Instruction::new(Opcode::JumpIfNonZero, Qualifier::None, Operand::Jump(0)));
						self.stackTop = subjectDepth;
						dispatchPatches.push((index, blockIndex));
					}
					None => defaultBlock = Some(blockIndex),
				}
			}
		}

		let mut fallthroughEndPatch: Option<usize> = None;
		match defaultBlock
		{
			Some(blockIndex) =>
			{
				let index = self.program.push(Instruction::new(Opcode::Jump, Qualifier::None, Operand::Jump(0)));
				dispatchPatches.push((index, blockIndex));
			}
			None => fallthroughEndPatch = Some(self.program.push(Instruction::new(Opcode::Jump, Qualifier::None, Operand::Jump(0)))),
		}

		self.frames.push(Frame::Switch { breakPatches: Vec::new(), stackDepthAtEntry });
		self.scopes.push(Vec::new());

		for (blockIndex, block) in blocks.iter().enumerate()
		{
			let blockStart = self.program.len();
			for (patchIndex, targetBlock) in &dispatchPatches
			{
				if *targetBlock == blockIndex
				{
					self.program.instructions[*patchIndex].operand = Operand::Jump(blockStart);
				}
			}
			self.compileStatements(&block.statements)?;
		}

		let end = self.program.len();
		if let Some(index) = fallthroughEndPatch
		{
			self.program.instructions[index].operand = Operand::Jump(end);
		}

		self.scopes.pop();
		let frame = self.frames.pop().unwrap();
		self.emitMoveSp(stackDepthAtEntry - self.stackTop);
		let exitPoint = self.program.len();
		if let Frame::Switch { breakPatches, .. } = frame
		{
			for index in breakPatches
			{
				self.program.instructions[index].operand = Operand::Jump(exitPoint);
			}
		}
		return Ok(());
	}

	/// `break`/`continue`/`return` each emit a raw (non-simulating) cleanup
	/// `MOVSP` and jump, then restore `stackTop` to exactly what it was
	/// before the statement. The statement's *own* instructions are correct
	/// either way; restoring the simulation afterward only matters for
	/// whatever unreachable code textually follows in the same block, which
	/// [`crate::script::optimize::removeDeadCodeAfterReturn`] deletes anyway.
	fn compileBreak(&mut self) -> Result<()>
	{
		let stackDepthAtEntry = match self.frames.last()
		{
			Some(Frame::Loop { stackDepthAtEntry, .. }) | Some(Frame::Switch { stackDepthAtEntry, .. }) => *stackDepthAtEntry,
			None => return Err(Error::compileError(0, "break", "break outside a loop or switch")),
		};
		let saved = self.stackTop;
		self.emitRawMoveSp(stackDepthAtEntry - self.stackTop);
		let index = self.program.push(Instruction::new(Opcode::Jump, Qualifier::None, Operand::Jump(0)));
		match self.frames.last_mut().unwrap()
		{
			Frame::Loop { breakPatches, .. } | Frame::Switch { breakPatches, .. } => breakPatches.push(index),
		}
		self.stackTop = saved;
		return Ok(());
	}

	/// `continue` sees through an enclosing `switch` to the nearest `Loop`
	/// frame, matching C-family semantics where `continue` inside a `switch`
	/// inside a loop continues the loop, not the switch.
	fn compileContinue(&mut self) -> Result<()>
	{
		let position = self
			.frames
			.iter()
			.rposition(|frame| matches!(frame, Frame::Loop { .. }))
			.ok_or_else(|| Error::compileError(0, "continue", "continue outside a loop"))?;
		let stackDepthAtEntry = match &self.frames[position]
		{
			Frame::Loop { stackDepthAtEntry, .. } => *stackDepthAtEntry,
			Frame::Switch { .. } => unreachable!(),
		};
		let saved = self.stackTop;
		self.emitRawMoveSp(stackDepthAtEntry - self.stackTop);
		let index = self.program.push(Instruction::new(Opcode::Jump, Qualifier::None, Operand::Jump(0)));
		if let Frame::Loop { continuePatches, .. } = &mut self.frames[position]
		{
			continuePatches.push(index);
		}
		self.stackTop = saved;
		return Ok(());
	}

	fn compileReturn(&mut self, expr: &Option<Expression>) -> Result<()>
	{
		let saved = self.stackTop;
		match expr
		{
			Some(expr) =>
			{
				if self.returnSize == 0
				{
					return Err(Error::compileError(0, "return", "function returns void but a value was given"));
				}
				self.compileExpression(expr)?;
				let offset = self.returnSlotTop - self.stackTop;
				self.program.push(Instruction::new(Opcode::CpDownSp, Qualifier::None, Operand::StackOffset { offset, size: self.returnSize }));
				self.emitRawMoveSp(-self.returnSize);
			}
			None =>
			{
				if self.returnSize != 0
				{
					return Err(Error::compileError(0, "return", "function must return a value"));
				}
			}
		}

		let totalCleanup = saved + self.paramsTotal;
		self.emitRawMoveSp(-totalCleanup);
		self.program.push(Instruction::new(Opcode::Return, Qualifier::None, Operand::None));
		self.stackTop = saved;
		return Ok(());
	}

	fn compileExpression(&mut self, expr: &Expression) -> Result<DataType>
	{
		return match expr
		{
			Expression::IntegerLiteral(value) =>
			{
				self.emitConst(Constant::Int(*value), Qualifier::Int);
				Ok(DataType::Int)
			}
			Expression::FloatLiteral(value) =>
			{
				self.emitConst(Constant::Float(*value), Qualifier::Float);
				Ok(DataType::Float)
			}
			Expression::StringLiteral(value) =>
			{
				self.emitConst(Constant::String(value.clone()), Qualifier::String);
				Ok(DataType::String)
			}
			Expression::VectorLiteral(x, y, z) =>
			{
				self.compileVectorComponent(x)?;
				self.compileVectorComponent(y)?;
				self.compileVectorComponent(z)?;
				Ok(DataType::Vector)
			}
			Expression::FieldAccess(access) => self.compileRead(access),
			Expression::Unary(operator, inner) => self.compileUnary(*operator, inner),
			Expression::Binary(operator, left, right) => self.compileBinary(*operator, left, right),
			Expression::Call { name, arguments } => self.compileCall(name, arguments),
			Expression::Assignment { target, value } => self.compileAssignment(target, value),
			Expression::CompoundAssignment { target, operator, value } => self.compileCompoundAssignment(target, *operator, value),
			Expression::IncrementDecrement { target, operator } => self.compileIncrementDecrement(target, *operator),
		};
	}

	/// An integer literal as a vector component is promoted to float at
	/// compile time (there being no runtime int→float cast opcode); any
	/// other non-float component is an error.
	fn compileVectorComponent(&mut self, expr: &Expression) -> Result<()>
	{
		if let Expression::IntegerLiteral(value) = expr
		{
			self.emitConst(Constant::Float(*value as f32), Qualifier::Float);
			return Ok(());
		}
		let dataType = self.compileExpression(expr)?;
		if dataType != DataType::Float
		{
			return Err(Error::compileError(0, "vector component", format!("vector components must be float, got {dataType:?}")));
		}
		return Ok(());
	}

	fn compileRead(&mut self, access: &FieldAccess) -> Result<DataType>
	{
		let resolved = self.resolveFieldAccess(access)?;
		let offset = resolved.offset(self.stackTop);
		self.emitCpTop(resolved.location, offset, resolved.size);
		return Ok(resolved.dataType);
	}

	fn compileUnary(&mut self, operator: UnaryOperator, inner: &Expression) -> Result<DataType>
	{
		let dataType = self.compileExpression(inner)?;
		return match (operator, &dataType)
		{
			(UnaryOperator::Negate, DataType::Int) =>
			{
				self.program.push(Instruction::new(Opcode::Negate, Qualifier::Int, Operand::None));
				Ok(DataType::Int)
			}
			(UnaryOperator::Negate, DataType::Float) =>
			{
				self.program.push(Instruction::new(Opcode::Negate, Qualifier::Float, Operand::None));
				Ok(DataType::Float)
			}
			(UnaryOperator::BitwiseNot, DataType::Int) =>
			{
				self.program.push(Instruction::new(Opcode::Complement, Qualifier::Int, Operand::None));
				Ok(DataType::Int)
			}
			(UnaryOperator::LogicalNot, DataType::Int) =>
			{
				self.program.push(Instruction::new(Opcode::Not, Qualifier::Int, Operand::None));
				Ok(DataType::Int)
			}
			_ => Err(noOverload(&format!("{operator:?}"), &dataType, &dataType)),
		};
	}

	fn compileBinary(&mut self, operator: BinaryOperator, left: &Expression, right: &Expression) -> Result<DataType>
	{
		if matches!(operator, BinaryOperator::LogicalAnd | BinaryOperator::LogicalOr)
		{
			return self.compileShortCircuit(operator, left, right);
		}

		let leftType = self.compileExpression(left)?;
		let rightType = self.compileExpression(right)?;
		let leftSize = sizeOfDataType(&leftType, &self.structs);
		let rightSize = sizeOfDataType(&rightType, &self.structs);

		let (qualifier, resultType) = if matches!(operator, BinaryOperator::Equal | BinaryOperator::NotEqual)
		{
			(pairQualifierForEquality(&leftType, &rightType)?, DataType::Int)
		}
		else
		{
			arithmeticQualifierAndType(operator, &leftType, &rightType)?
		};

		self.program.push(Instruction::new(opcodeForBinary(operator), qualifier, Operand::None));
		let resultSize = sizeOfDataType(&resultType, &self.structs);
		self.stackTop = self.stackTop - leftSize - rightSize + resultSize;
		return Ok(resultType);
	}

	/// `&&`/`||` short-circuit: the right operand is only compiled (and its
	/// side effects only run) along the path where it can change the
	/// result. Either way the left operand's own bool value is left on the
	/// stack as the answer on the short-circuited path, so no extra
	/// instructions are needed there.
	fn compileShortCircuit(&mut self, operator: BinaryOperator, left: &Expression, right: &Expression) -> Result<DataType>
	{
		let leftType = self.compileExpression(left)?;
		requireBool(&leftType)?;

		self.emitDuplicateTop(4);
		let shortCircuitIndex = match operator
		{
			BinaryOperator::LogicalAnd => self.program.push(Instruction::new(Opcode::JumpIfZero, Qualifier::None, Operand::Jump(0))),
			BinaryOperator::LogicalOr => self.program.push(Instruction::new(Opcode::JumpIfNonZero, Qualifier::None, Operand::Jump(0))),
			_ => unreachable!("compileShortCircuit only called for && and ||"),
		};
		self.stackTop -= 4;

		let rightType = self.compileExpression(right)?;
		requireBool(&rightType)?;
		let opcode = if operator == BinaryOperator::LogicalAnd { Opcode::LogicalAnd } else { Opcode::LogicalOr };
		self.program.push(Instruction::new(opcode, Qualifier::IntInt, Operand::None));
		self.stackTop -= 4;

		let endIndex = self.program.push(Instruction::new(Opcode::Jump, Qualifier::None, Operand::Jump(0)));
		let shortCircuitTarget = self.program.len();
		self.program.instructions[shortCircuitIndex].operand = Operand::Jump(shortCircuitTarget);
		self.program.instructions[endIndex].operand = Operand::Jump(shortCircuitTarget);
		return Ok(DataType::Int);
	}

	fn compileAssignment(&mut self, target: &FieldAccess, value: &Expression) -> Result<DataType>
	{
		let resolved = self.resolveFieldAccess(target)?;
		let valueType = self.compileExpression(value)?;
		if valueType != resolved.dataType
		{
			return Err(Error::compileError(0, &target.path.join("."), format!("cannot assign {:?} to {:?}", valueType, resolved.dataType)));
		}
		let offset = resolved.offset(self.stackTop);
		self.emitCpDown(resolved.location, offset, resolved.size);
		return Ok(resolved.dataType);
	}

	fn compileCompoundAssignment(&mut self, target: &FieldAccess, operator: CompoundAssignmentOperator, value: &Expression) -> Result<DataType>
	{
		let resolved = self.resolveFieldAccess(target)?;
		let readOffset = resolved.offset(self.stackTop);
		self.emitCpTop(resolved.location, readOffset, resolved.size);
		let currentType = resolved.dataType.clone();

		let valueType = self.compileExpression(value)?;
		let mappedOperator = match operator
		{
			CompoundAssignmentOperator::Add => BinaryOperator::Add,
			CompoundAssignmentOperator::Subtract => BinaryOperator::Subtract,
			CompoundAssignmentOperator::Multiply => BinaryOperator::Multiply,
			CompoundAssignmentOperator::Divide => BinaryOperator::Divide,
		};
		let (qualifier, resultType) = arithmeticQualifierAndType(mappedOperator, &currentType, &valueType)?;
		if resultType != resolved.dataType
		{
			return Err(Error::compileError(0, &target.path.join("."), format!("cannot compound-assign {resultType:?} into {:?}", resolved.dataType)));
		}

		let leftSize = sizeOfDataType(&currentType, &self.structs);
		let rightSize = sizeOfDataType(&valueType, &self.structs);
		self.program.push(Instruction::new(opcodeForBinary(mappedOperator), qualifier, Operand::None));
		self.stackTop = self.stackTop - leftSize - rightSize + sizeOfDataType(&resultType, &self.structs);

		let storeOffset = resolved.offset(self.stackTop);
		self.emitCpDown(resolved.location, storeOffset, resolved.size);
		return Ok(resolved.dataType);
	}

	/// Pre-forms compile down to "read, push one literal, combine" — the
	/// combined result is both the new stored value and the expression's
	/// own value. Post-forms additionally duplicate the read value before
	/// combining, so the original can be left behind as the expression's
	/// value once the computed one has been stored and discarded.
	fn compileIncrementDecrement(&mut self, target: &FieldAccess, operator: IncrementDecrementOperator) -> Result<DataType>
	{
		let resolved = self.resolveFieldAccess(target)?;
		if resolved.dataType != DataType::Int && resolved.dataType != DataType::Float
		{
			return Err(noOverload(&format!("{operator:?}"), &resolved.dataType, &resolved.dataType));
		}
		let size = resolved.size;
		let isIncrement = matches!(operator, IncrementDecrementOperator::PreIncrement | IncrementDecrementOperator::PostIncrement);
		let isPost = matches!(operator, IncrementDecrementOperator::PostIncrement | IncrementDecrementOperator::PostDecrement);

		let readOffset = resolved.offset(self.stackTop);
		self.emitCpTop(resolved.location, readOffset, size);

		if isPost
		{
			self.emitDuplicateTop(size);
		}

		match resolved.dataType
		{
			DataType::Int => self.emitConst(Constant::Int(1), Qualifier::Int),
			DataType::Float => self.emitConst(Constant::Float(1.0), Qualifier::Float),
			_ => unreachable!(),
		}

		let opcode = if isIncrement { Opcode::Add } else { Opcode::Subtract };
		let qualifier = if resolved.dataType == DataType::Int { Qualifier::IntInt } else { Qualifier::FloatFloat };
		self.program.push(Instruction::new(opcode, qualifier, Operand::None));
		self.stackTop -= size;

		let storeOffset = resolved.offset(self.stackTop);
		self.emitCpDown(resolved.location, storeOffset, size);

		if isPost
		{
			self.emitMoveSp(-size);
		}
		return Ok(resolved.dataType);
	}

	fn compileCall(&mut self, name: &str, arguments: &[Expression]) -> Result<DataType>
	{
		if let Some(signature) = self.functions.get(name).cloned()
		{
			return self.compileUserCall(name, &signature, arguments);
		}
		if let Some(routine) = self.routines.get(name).cloned()
		{
			return self.compileEngineCall(&routine, arguments);
		}
		return Err(Error::compileError(0, name, "call to undeclared function"));
	}

	/// Arguments are pushed in reverse (rightmost first), matching the
	/// NWScript VM's documented `ACTION` calling convention; trailing
	/// omitted arguments are filled in from their declared defaults.
	fn compileEngineCall(&mut self, routine: &EngineRoutine, arguments: &[Expression]) -> Result<DataType>
	{
		let minimum = routine.minimumArguments();
		if arguments.len() < minimum || arguments.len() > routine.parameters.len()
		{
			return Err(Error::compileError(
				0,
				&routine.name,
				format!("expected {}..={} arguments, got {}", minimum, routine.parameters.len(), arguments.len()),
			));
		}

		for index in (0..routine.parameters.len()).rev()
		{
			let parameter = &routine.parameters[index];
			let argumentType = if index < arguments.len()
			{
				self.compileExpression(&arguments[index])?
			}
			else
			{
				let default = parameter.default.as_ref().expect("defaulted parameter must carry a default expression");
				self.compileExpression(default)?
			};
			if argumentType != parameter.dataType
			{
				return Err(Error::compileError(0, &routine.name, format!("argument {index} expected {:?}, got {argumentType:?}", parameter.dataType)));
			}
		}

		self.program
			.push(Instruction::new(Opcode::Action, Qualifier::None, Operand::Action { routineId: routine.id, argumentCount: routine.parameters.len() as u8 }));

		let argumentBytes: i32 = routine.parameters.iter().map(|parameter| sizeOfDataType(&parameter.dataType, &self.structs)).sum();
		self.stackTop -= argumentBytes;
		self.stackTop += sizeOfDataType(&routine.returnType, &self.structs);
		return Ok(routine.returnType.clone());
	}

	/// Arguments are pushed in declaration order, matching the order their
	/// callee registers them as locals. The return slot (if any) is
	/// reserved before any argument is pushed, so it ends up below them on
	/// the stack — exactly where the callee's own cleanup leaves it.
	fn compileUserCall(&mut self, name: &str, signature: &FunctionSignature, arguments: &[Expression]) -> Result<DataType>
	{
		let minimum = signature.parameters.iter().take_while(|parameter| parameter.default.is_none()).count();
		if arguments.len() < minimum || arguments.len() > signature.parameters.len()
		{
			return Err(Error::compileError(0, name, format!("expected {}..={} arguments, got {}", minimum, signature.parameters.len(), arguments.len())));
		}

		if signature.returnType != DataType::Void
		{
			self.emitReserve(&signature.returnType);
		}

		for index in 0..signature.parameters.len()
		{
			let parameter = &signature.parameters[index];
			let argumentType = if index < arguments.len()
			{
				self.compileExpression(&arguments[index])?
			}
			else
			{
				let default = parameter.default.as_ref().expect("defaulted parameter must carry a default expression");
				self.compileExpression(default)?
			};
			if argumentType != parameter.dataType
			{
				return Err(Error::compileError(0, name, format!("argument {index} expected {:?}, got {argumentType:?}", parameter.dataType)));
			}
		}

		let callIndex = self.program.push(Instruction::new(Opcode::JumpToSubroutine, Qualifier::None, Operand::Jump(0)));
		self.pendingCalls.push((callIndex, name.to_string()));

		let argumentBytes: i32 = signature.parameters.iter().map(|parameter| sizeOfDataType(&parameter.dataType, &self.structs)).sum();
		self.stackTop -= argumentBytes;
		return Ok(signature.returnType.clone());
	}

	fn resolveFieldAccess(&self, access: &FieldAccess) -> Result<ResolvedAccess>
	{
		let mut iter = access.path.iter();
		let headName = iter.next().ok_or_else(|| Error::compileError(0, "", "empty field access"))?;
		let mut resolved = self.resolveName(headName)?;
		for segment in iter
		{
			resolved = self.resolveMember(resolved, segment)?;
		}
		return Ok(resolved);
	}

	fn resolveName(&self, name: &str) -> Result<ResolvedAccess>
	{
		for scope in self.scopes.iter().rev()
		{
			if let Some(local) = scope.iter().rev().find(|local| local.name == name)
			{
				return Ok(ResolvedAccess {
					location: VarLocation::Local(local.frameOffset),
					delta: 0,
					size: sizeOfDataType(&local.dataType, &self.structs),
					dataType: local.dataType.clone(),
				});
			}
		}
		if let Some((dataType, bpOffset)) = self.globals.get(name)
		{
			return Ok(ResolvedAccess { location: VarLocation::Global(*bpOffset), delta: 0, size: sizeOfDataType(dataType, &self.structs), dataType: dataType.clone() });
		}
		return Err(Error::compileError(0, name, "undeclared identifier"));
	}

	fn resolveMember(&self, base: ResolvedAccess, segment: &str) -> Result<ResolvedAccess>
	{
		return match &base.dataType
		{
			DataType::Vector =>
			{
				let subDelta = match segment
				{
					"x" => 0,
					"y" => 4,
					"z" => 8,
					_ => return Err(Error::compileError(0, segment, "vector has no such component")),
				};
				Ok(ResolvedAccess { location: base.location, delta: base.delta + subDelta, size: 4, dataType: DataType::Float })
			}
			DataType::Struct(structName) =>
			{
				let definition = self.structs.get(structName).ok_or_else(|| Error::compileError(0, structName, "unknown struct type"))?;
				let mut cursor = 0;
				for member in &definition.members
				{
					let memberSize = sizeOfDataType(&member.dataType, &self.structs);
					if member.name == segment
					{
						return Ok(ResolvedAccess { location: base.location, delta: base.delta + cursor, size: memberSize, dataType: member.dataType.clone() });
					}
					cursor += memberSize;
				}
				Err(Error::compileError(0, segment, format!("struct '{structName}' has no member '{segment}'")))
			}
			other => Err(Error::compileError(0, segment, format!("type {other:?} has no members"))),
		};
	}

	/// Reserve (and zero-initialise) one declaration's worth of stack slots.
	/// A struct reserves each member individually in declared order, since
	/// there is no aggregate `RSADD`; a vector reserves three floats.
	fn emitReserve(&mut self, dataType: &DataType) -> i32
	{
		return match dataType
		{
			DataType::Struct(name) =>
			{
				let definition = self.structs.get(name).cloned();
				let mut total = 0;
				if let Some(definition) = definition
				{
					for member in &definition.members
					{
						total += self.emitReserve(&member.dataType);
					}
				}
				total
			}
			DataType::Vector =>
			{
				for _ in 0..3
				{
					self.program.push(Instruction::new(Opcode::RsAdd, Qualifier::Float, Operand::None));
				}
				self.stackTop += 12;
				12
			}
			DataType::Void => 0,
			other =>
			{
				self.program.push(Instruction::new(Opcode::RsAdd, qualifierForType(other), Operand::None));
				self.stackTop += 4;
				4
			}
		};
	}

	fn emitConst(&mut self, constant: Constant, qualifier: Qualifier)
	{
		self.program.push(Instruction::new(Opcode::Const, qualifier, Operand::Constant(constant)));
		self.stackTop += 4;
	}

	fn emitCpTop(&mut self, location: VarLocation, offset: i32, size: i32)
	{
		let opcode = match location
		{
			VarLocation::Local(_) => Opcode::CpTopSp,
			VarLocation::Global(_) => Opcode::CpTopBp,
		};
		self.program.push(Instruction::new(opcode, Qualifier::None, Operand::StackOffset { offset, size }));
		self.stackTop += size;
	}

	fn emitCpDown(&mut self, location: VarLocation, offset: i32, size: i32)
	{
		let opcode = match location
		{
			VarLocation::Local(_) => Opcode::CpDownSp,
			VarLocation::Global(_) => Opcode::CpDownBp,
		};
		self.program.push(Instruction::new(opcode, Qualifier::None, Operand::StackOffset { offset, size }));
	}

	fn emitDuplicateTop(&mut self, size: i32)
	{
		self.program.push(Instruction::new(Opcode::CpTopSp, Qualifier::None, Operand::StackOffset { offset: -size, size }));
		self.stackTop += size;
	}

	/// Pops/pushes `delta` bytes and updates the running simulation —
	/// used for every mainline (always-executed) stack adjustment.
	fn emitMoveSp(&mut self, delta: i32)
	{
		if delta != 0
		{
			self.program.push(Instruction::new(Opcode::MoveSp, Qualifier::None, Operand::StackOffset { offset: delta, size: 0 }));
			self.stackTop += delta;
		}
	}

	/// Emits the same `MOVSP` as [`Self::emitMoveSp`] but leaves `stackTop`
	/// untouched — for `break`/`continue`/`return`, whose cleanup only
	/// happens along a path this simulation isn't otherwise following.
	fn emitRawMoveSp(&mut self, delta: i32)
	{
		if delta != 0
		{
			self.program.push(Instruction::new(Opcode::MoveSp, Qualifier::None, Operand::StackOffset { offset: delta, size: 0 }));
		}
	}
}

fn requireBool(dataType: &DataType) -> Result<()>
{
	if *dataType != DataType::Int
	{
		return Err(Error::compileError(0, "condition", format!("expected int (boolean), got {dataType:?}")));
	}
	return Ok(());
}

#[cfg(test)]
mod tests
{
	use super::*;
	use crate::script::opcode::Opcode;
	use crate::script::parser::Parser;

	fn compileSource(source: &str) -> Program
	{
		let codeRoot = Parser::parse(source).expect("parse");
		let routines = EngineRoutineTable::new();
		let mut compiler = Compiler::new(&routines);
		return compiler.compile(&codeRoot).expect("compile");
	}

	fn opcodeCounts(program: &Program, opcode: Opcode) -> usize
	{
		return program.instructions.iter().filter(|instruction| instruction.opcode == opcode).count();
	}

	#[test]
	fn ArithmeticExpressionCompilesConstAndAddInIntInt()
	{
		let program = compileSource("void main() { int n = 1 + 2; }");
		assert_eq!(2, opcodeCounts(&program, Opcode::Const));
		assert_eq!(1, opcodeCounts(&program, Opcode::Add));
		let add = program.instructions.iter().find(|instruction| instruction.opcode == Opcode::Add).unwrap();
		assert_eq!(Qualifier::IntInt, add.qualifier);
	}

	#[test]
	fn MissingEntryPointIsAnError()
	{
		let codeRoot = Parser::parse("void helper() { }").unwrap();
		let routines = EngineRoutineTable::new();
		let mut compiler = Compiler::new(&routines);
		let error = compiler.compile(&codeRoot).unwrap_err();
		assert!(matches!(error, Error::EntryPointError(name) if name == "main"));
	}

	#[test]
	fn CompileLibraryDoesNotRequireMain()
	{
		let codeRoot = Parser::parse("int Square(int n) { return n * n; }").unwrap();
		let routines = EngineRoutineTable::new();
		let mut compiler = Compiler::new(&routines);
		let program = compiler.compileLibrary(&codeRoot).expect("compile library");
		assert!(opcodeCounts(&program, Opcode::Multiply) >= 1);
		assert!(opcodeCounts(&program, Opcode::Return) >= 1);
	}

	#[test]
	fn RecursiveCallResolvesViaPendingCalls()
	{
		let program = compileSource("int fib(int n) { if (n < 2) return n; return fib(n - 1) + fib(n - 2); } void main() { fib(5); }");
		let jsrCount = opcodeCounts(&program, Opcode::JumpToSubroutine);
		assert!(jsrCount >= 3); // entry -> main, main -> fib, fib -> fib (twice, at least one patched)
		for instruction in &program.instructions
		{
			if instruction.opcode == Opcode::JumpToSubroutine
			{
				assert!(instruction.jumpTarget().unwrap() < program.len());
			}
		}
	}

	#[test]
	fn SwitchFallthroughSharesBlockAndEmitsOneActionPerReachableCase()
	{
		let program = compileSource(
			"void Noop(int n);\n\
			 void main() { int n = 2; switch (n) { case 1: case 2: Noop(1); break; case 3: Noop(2); break; default: Noop(3); break; } }",
		);
		assert_eq!(3, opcodeCounts(&program, Opcode::Action));
		assert!(opcodeCounts(&program, Opcode::Equal) >= 3);
	}

	#[test]
	fn DefaultArgumentsAreMaterializedAtCallSite()
	{
		let program = compileSource("void Greet(string sName, int nTimes = 1); void main() { Greet(\"hi\"); }");
		let constStrings = program
			.instructions
			.iter()
			.filter(|instruction| matches!(&instruction.operand, Operand::Constant(Constant::String(_))))
			.count();
		let constInts = program.instructions.iter().filter(|instruction| matches!(&instruction.operand, Operand::Constant(Constant::Int(_)))).count();
		assert_eq!(1, constStrings);
		assert!(constInts >= 1);
	}

	#[test]
	fn VectorFieldAccessReadsComponentAtExpectedByteOffset()
	{
		let program = compileSource("void main() { vector v = [1.0, 2.0, 3.0]; float z = v.z; }");
		let read = program.instructions.iter().rev().find(|instruction| instruction.opcode == Opcode::CpTopSp).unwrap();
		if let Operand::StackOffset { size, .. } = read.operand
		{
			assert_eq!(4, size);
		}
		else
		{
			panic!("expected a stack-offset operand");
		}
	}

	#[test]
	fn StructFieldAssignmentCompiles()
	{
		let program = compileSource(
			"struct Pair { int a; int b; }; void main() { struct Pair p; p.a = 1; p.b = 2; }",
		);
		assert!(opcodeCounts(&program, Opcode::CpDownSp) >= 2);
	}

	#[test]
	fn ShortCircuitAndSkipsRightOperandInstructionsOnFalsePath()
	{
		let program = compileSource("int Side(int n); void main() { if (0 && Side(1)) { } }");
		assert_eq!(1, opcodeCounts(&program, Opcode::LogicalAnd));
		assert_eq!(1, opcodeCounts(&program, Opcode::Action));
	}

	#[test]
	fn BreakInsideLoopJumpsPastEnd()
	{
		let program = compileSource("void main() { int i = 0; while (i < 10) { if (i == 5) break; i++; } }");
		let jumps: Vec<usize> = program.instructions.iter().filter_map(|instruction| if instruction.opcode == Opcode::Jump { instruction.jumpTarget() } else { None }).collect();
		assert!(jumps.iter().any(|&target| target == program.len()));
	}

	#[test]
	fn ContinueInsideForSkipsToIncrement()
	{
		let program = compileSource("void main() { int i = 0; for (i = 0; i < 10; i++) { if (i == 1) continue; } }");
		assert!(opcodeCounts(&program, Opcode::Jump) >= 2);
	}

	#[test]
	fn PostIncrementLeavesOldValueAsExpressionResult()
	{
		let program = compileSource("void main() { int i = 0; int j = i++; }");
		assert_eq!(1, opcodeCounts(&program, Opcode::Add));
		assert!(opcodeCounts(&program, Opcode::MoveSp) >= 1);
	}
}
