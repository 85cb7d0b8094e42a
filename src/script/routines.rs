//! Engine-routine table: the caller-supplied list of built-in functions a
//! script may invoke via the `ACTION` opcode (§3 "engine function by numeric
//! routine id", §4.8 "Engine calls emit `ACTION` with the function's routine
//! id and argument count").
//!
//! `original_source/` does not ship the NWScript routine-signature table
//! itself (the real compiler reads it out of a separate `nwscript.nss`
//! stub at compile time rather than hard-coding it); this crate follows the
//! same shape rather than baking in a fixed, game-specific routine list.
//! `EngineRoutineTable::fromForwardDeclarations` assigns routine ids by
//! forward-declaration order, exactly like parsing the real `nwscript.nss`
//! (id 0 is the first declared routine, id 1 the second, and so on); callers
//! that only need a handful of routines for a focused compilation can build
//! a table directly with [`EngineRoutineTable::insert`].

use std::collections::HashMap;

use crate::script::ast::{CodeRoot, DataType, Parameter, TopLevel};

/// One built-in engine function's compile-time signature.
#[derive(Clone, Debug, PartialEq)]
pub struct EngineRoutine
{
	pub id: u16,
	pub name: String,
	pub returnType: DataType,
	pub parameters: Vec<Parameter>,
}

impl EngineRoutine
{
	/// Number of trailing parameters that carry a default value, i.e. the
	/// number of arguments a call may legally omit (§4.6).
	pub fn minimumArguments(&self) -> usize
	{
		return self.parameters.iter().take_while(|parameter| parameter.default.is_none()).count();
	}
}

/// The set of engine routines visible to a compilation, keyed by name.
#[derive(Clone, Debug, Default)]
pub struct EngineRoutineTable
{
	routines: HashMap<String, EngineRoutine>,
}

impl EngineRoutineTable
{
	pub fn new() -> Self
	{
		return Self::default();
	}

	pub fn insert(&mut self, id: u16, name: impl Into<String>, returnType: DataType, parameters: Vec<Parameter>) -> &mut Self
	{
		let name = name.into();
		self.routines.insert(name.clone(), EngineRoutine { id, name, returnType, parameters });
		return self;
	}

	pub fn get(&self, name: &str) -> Option<&EngineRoutine>
	{
		return self.routines.get(name);
	}

	pub fn len(&self) -> usize
	{
		return self.routines.len();
	}

	pub fn isEmpty(&self) -> bool
	{
		return self.routines.is_empty();
	}

	/// Build a table from a `nwscript.nss`-shaped code root: every
	/// forward-declared function becomes a routine, numbered by declaration
	/// order starting at 0. Function definitions and other top-level objects
	/// in the stub are ignored (a real `nwscript.nss` contains only
	/// forward declarations and a handful of `#define`-free constants, which
	/// the parser surfaces as globals and is likewise not a routine).
	pub fn fromForwardDeclarations(stub: &CodeRoot) -> Self
	{
		let mut table = Self::new();
		let mut nextId: u16 = 0;
		for object in &stub.objects
		{
			if let TopLevel::ForwardDeclaration(declaration) = object
			{
				table.insert(nextId, declaration.name.clone(), declaration.returnType.clone(), declaration.parameters.clone());
				nextId += 1;
			}
		}
		return table;
	}
}

#[cfg(test)]
mod tests
{
	use super::*;
	use crate::script::parser::Parser;

	#[test]
	fn ForwardDeclarationsNumberedByOrder()
	{
		let stub = Parser::parse("void Random(int nMaxInteger); void PrintString(string sString); void PrintInteger(int nInteger);").unwrap();
		let table = EngineRoutineTable::fromForwardDeclarations(&stub);

		assert_eq!(0, table.get("Random").unwrap().id);
		assert_eq!(1, table.get("PrintString").unwrap().id);
		assert_eq!(2, table.get("PrintInteger").unwrap().id);
	}

	#[test]
	fn MinimumArgumentsCountsNonDefaultedPrefix()
	{
		let stub = Parser::parse("void f(int a, int b = 7, int c = 8);").unwrap();
		let table = EngineRoutineTable::fromForwardDeclarations(&stub);
		assert_eq!(1, table.get("f").unwrap().minimumArguments());
	}
}
