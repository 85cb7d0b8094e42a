//! Resource identity: a case-insensitive *(name, type)* pair (§3, §4.1).
//!
//! Generalizes an Infinity-Engine-style `Identity` struct (`Readable` impl
//! for reading the 4-byte signature/version pair out of a cursor) into the
//! name+type identity this format family wants, and is grounded on
//! PyKotor's `pykotor.extract.file.ResourceIdentifier.from_path` for the
//! exact multi-dot split algorithm used to parse a filename.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::resource::restype::ResourceType;

pub const MaxNameLength: usize = 16;

/// The canonical *(name, type)* pair naming a resource. Equality, hashing,
/// and the canonical string form are all derived case-insensitively from the
/// lowercased name (§3: "Identities compare case-insensitively. ... Hashing
/// is derived from that canonical form").
#[derive(Clone, Debug, Eq, Serialize, Deserialize)]
pub struct Identity
{
	name: String,
	resType: ResourceType,
}

impl Identity
{
	/// Construct directly from a name and type, validating in loose mode
	/// (trims whitespace, does not enforce the 16-character limit).
	pub fn new(name: impl Into<String>, resType: ResourceType) -> Result<Self>
	{
		return Self::validate(name.into(), resType, false);
	}

	pub fn name(&self) -> &str
	{
		return &self.name;
	}

	pub fn resType(&self) -> ResourceType
	{
		return self.resType;
	}

	/// Case-insensitive canonical form: `lowercase(name) + "." + extension`.
	pub fn canonical(&self) -> String
	{
		return format!("{}.{}", self.name.to_ascii_lowercase(), self.resType.extension());
	}

	/// `validate(identity, strict)` (§4.1). Strict mode additionally enforces
	/// the 16-character ASCII limit and rejects the unknown-type marker.
	pub fn validate(name: String, resType: ResourceType, strict: bool) -> Result<Self>
	{
		let trimmed = name.trim().to_string();

		if !trimmed.is_ascii()
		{
			return Err(Error::invalidIdentity(trimmed, "name is not ASCII"));
		}

		if strict && trimmed.len() > MaxNameLength
		{
			return Err(Error::invalidIdentity(trimmed, format!("exceeds {MaxNameLength} ASCII characters")));
		}

		if strict && resType == ResourceType::Invalid
		{
			return Err(Error::invalidIdentity(trimmed, "unknown resource type in strict mode"));
		}

		let truncated = if trimmed.len() > MaxNameLength
		{
			trimmed[..MaxNameLength].to_string()
		}
		else
		{
			trimmed
		};

		return Ok(Self { name: truncated, resType });
	}

	/// *identify(string-or-path) → identity* (§4.1).
	///
	/// Take the basename, count the dots, and starting from the rightmost
	/// dot moving left, try each (name, ext) split against the extension
	/// table. The first split whose `ext` resolves to a known type wins,
	/// which is what makes `foo.bar.uti` parse as *(name="foo.bar",
	/// type=UTI)* rather than splitting at the first dot.
	pub fn identify(path: impl AsRef<Path>) -> Result<Self>
	{
		let path = path.as_ref();
		let basename = path
			.file_name()
			.and_then(|name| name.to_str())
			.ok_or_else(|| Error::invalidIdentity(path.display().to_string(), "path has no file name"))?;

		let dotPositions: Vec<usize> = basename
			.char_indices()
			.filter(|(_, character)| *character == '.')
			.map(|(index, _)| index)
			.collect();

		for &dotIndex in dotPositions.iter().rev()
		{
			let candidateName = &basename[..dotIndex];
			let candidateExt = &basename[dotIndex + 1..];
			let resType = ResourceType::fromExtension(candidateExt);

			if resType != ResourceType::Invalid
			{
				return Self::validate(candidateName.to_string(), resType, false);
			}
		}

		// No dot resolved to a known extension: fall back to stem + final
		// extension string, carrying the unknown-type marker.
		return match basename.rsplit_once('.')
		{
			Some((stem, _ext)) => Self::validate(stem.to_string(), ResourceType::Invalid, false),
			None => Self::validate(basename.to_string(), ResourceType::Invalid, false),
		};
	}

	/// *stringify(identity) → string* (§4.1). Alias of [`Self::canonical`].
	pub fn stringify(&self) -> String
	{
		return self.canonical();
	}
}

impl PartialEq for Identity
{
	fn eq(&self, other: &Self) -> bool
	{
		return self.canonical() == other.canonical();
	}
}

impl std::hash::Hash for Identity
{
	fn hash<H: std::hash::Hasher>(&self, state: &mut H)
	{
		self.canonical().hash(state);
	}
}

impl std::fmt::Display for Identity
{
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result
	{
		return write!(f, "{}", self.canonical());
	}
}

#[cfg(test)]
mod tests
{
	use super::*;

	#[test]
	fn MultiDotNameParsesAtTheRightSplit()
	{
		let identity = Identity::identify("Foo.BAR.uti").unwrap();
		assert_eq!("Foo.BAR", identity.name());
		assert_eq!(ResourceType::Uti, identity.resType());
		assert_eq!("foo.bar.uti", identity.stringify());
	}

	#[test]
	fn RoundTripIsCaseInsensitive()
	{
		let identity = Identity::identify("Player.UTC").unwrap();
		let reparsed = Identity::identify(identity.stringify()).unwrap();
		assert_eq!(identity, reparsed);
	}

	#[test]
	fn SixteenCharactersAcceptedSeventeenRejectedStrict()
	{
		let sixteen = "a".repeat(16);
		let seventeen = "a".repeat(17);

		assert!(Identity::validate(sixteen, ResourceType::Txt, true).is_ok());
		assert!(Identity::validate(seventeen, ResourceType::Txt, true).is_err());
	}

	#[test]
	fn SeventeenCharactersTruncatedInLooseMode()
	{
		let seventeen = "a".repeat(17);
		let identity = Identity::validate(seventeen, ResourceType::Txt, false).unwrap();
		assert_eq!(16, identity.name().len());
	}

	#[test]
	fn UnknownExtensionFallsBackToStem()
	{
		let identity = Identity::identify("readme.xyz123").unwrap();
		assert_eq!("readme", identity.name());
		assert_eq!(ResourceType::Invalid, identity.resType());
	}
}
