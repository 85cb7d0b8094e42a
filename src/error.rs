//! The typed error taxonomy shared by every subsystem.
//!
//! `anyhow::{Result, Context}` stays the idiom for *internal* call sites
//! (adding context to a read failure as it propagates), but every public
//! boundary surfaces this closed, `thiserror`-derived enum instead.
//! `anyhow::Error` values are folded into `Error::Io` / `Error::InvalidArchive`
//! at the point they'd otherwise escape as opaque errors.

use std::path::PathBuf;

use thiserror::Error as ThisError;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, ThisError)]
pub enum Error
{
	#[error("invalid resource identity '{name}': {reason}")]
	InvalidIdentity { name: String, reason: String },

	#[error("invalid archive at {path:?}: {reason}")]
	InvalidArchive { path: Option<PathBuf>, reason: String },

	#[error("resource not found: {0}")]
	ResourceNotFound(String),

	#[error("compile error at line {line}: {message} (near '{lexeme}')")]
	CompileError { line: usize, lexeme: String, message: String },

	#[error("script has no entry point function '{0}'")]
	EntryPointError(String),

	#[error("model structure error: {0}")]
	ModelStructureError(String),

	#[error("I/O error: {0}")]
	Io(#[from] std::io::Error),
}

impl Error
{
	pub fn invalidIdentity(name: impl Into<String>, reason: impl Into<String>) -> Self
	{
		return Error::InvalidIdentity { name: name.into(), reason: reason.into() };
	}

	pub fn invalidArchive(path: Option<PathBuf>, reason: impl Into<String>) -> Self
	{
		return Error::InvalidArchive { path, reason: reason.into() };
	}

	pub fn compileError(line: usize, lexeme: impl Into<String>, message: impl Into<String>) -> Self
	{
		return Error::CompileError { line, lexeme: lexeme.into(), message: message.into() };
	}

	/// Folds an `anyhow::Error` produced by a parsing helper into the typed
	/// `InvalidArchive` variant, preserving the chain as the reason string.
	pub fn fromAnyhow(path: Option<PathBuf>, err: anyhow::Error) -> Self
	{
		return Error::invalidArchive(path, format!("{err:#}"));
	}
}

#[cfg(test)]
mod tests
{
	use super::*;

	#[test]
	fn DisplayIncludesContext()
	{
		let err = Error::invalidIdentity("toolongresourcename12345", "exceeds 16 ASCII characters");
		let message = err.to_string();
		assert!(message.contains("toolongresourcename12345"));
		assert!(message.contains("exceeds 16"));
	}
}
