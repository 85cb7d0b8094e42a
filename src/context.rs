//! Explicit process context, replacing the module-level statics the
//! reference implementation threads through several layers (Design Notes,
//! "Global state"). Every public operation that needs an install root, a
//! scratch directory, or a string table takes a `&Context` rather than
//! reaching for global state.

use std::path::{Path, PathBuf};

use crate::platform::Generation;

/// Process-wide settings passed explicitly into core operations.
///
/// `Context` itself holds no logic; it is a bag of the handful of values
/// that would otherwise live in globals. Constructing one is cheap and
/// cloning is intentionally shallow (`PathBuf` clones, nothing opens a
/// file handle).
#[derive(Clone, Debug, Default)]
pub struct Context
{
	/// Root of the game installation currently being operated on, if any.
	pub installRoot: Option<PathBuf>,
	/// Scratch directory for intermediate artifacts (decompressed BIFs,
	/// temporary capsules). Defaults to the platform temp directory.
	pub tempRoot: Option<PathBuf>,
	/// Which engine generation's formats/bytecode layout callers should be
	/// honoured for, per the Design Notes' instruction not to guess when the
	/// source is itself inconsistent (`SoundSetFile`, `OpenLockDiffMod`).
	pub generation: Option<Generation>,
}

impl Context
{
	pub fn new() -> Self
	{
		return Self::default();
	}

	pub fn withInstallRoot(mut self, path: impl Into<PathBuf>) -> Self
	{
		self.installRoot = Some(path.into());
		return self;
	}

	pub fn withTempRoot(mut self, path: impl Into<PathBuf>) -> Self
	{
		self.tempRoot = Some(path.into());
		return self;
	}

	pub fn withGeneration(mut self, generation: Generation) -> Self
	{
		self.generation = Some(generation);
		return self;
	}

	pub fn installRoot(&self) -> Option<&Path>
	{
		return self.installRoot.as_deref();
	}

	pub fn tempRoot(&self) -> PathBuf
	{
		return self.tempRoot.clone().unwrap_or_else(std::env::temp_dir);
	}
}

#[cfg(test)]
mod tests
{
	use super::*;

	#[test]
	fn BuilderSetsFields()
	{
		let context = Context::new()
			.withInstallRoot("/games/kotor")
			.withGeneration(Generation::K1);

		assert_eq!(Some(Path::new("/games/kotor")), context.installRoot());
		assert_eq!(Some(Generation::K1), context.generation);
	}

	#[test]
	fn TempRootDefaultsToSystemTemp()
	{
		let context = Context::new();
		assert_eq!(std::env::temp_dir(), context.tempRoot());
	}
}
