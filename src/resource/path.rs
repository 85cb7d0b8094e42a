//! Case-insensitive path canonicalisation (§4.1, supplemented per
//! SPEC_FULL.md §3 "Case-aware path canonicalisation").
//!
//! Grounded on PyKotor's `pykotor.tools.path.CaseAwarePath`:
//! `get_case_sensitive_path` walks the path segment by segment, and for any
//! segment that doesn't exist verbatim, `find_closest_match` scores every
//! sibling by `get_matching_characters_count` (count of characters equal at
//! the same position, compared case-insensitively) and keeps the
//! highest-scoring sibling, first hit wins on a tie.

use std::fs;
use std::path::{Path, PathBuf};

/// Score two names by how many characters match at the same position,
/// case-insensitively. This is deliberately not edit distance: PyKotor's
/// `get_matching_characters_count` is a simple positional comparison, and
/// matching its exact tie-breaking behavior matters more than being a
/// "better" similarity metric.
fn matchingCharacterCount(candidate: &str, target: &str) -> usize
{
	return candidate
		.chars()
		.zip(target.chars())
		.filter(|(left, right)| left.to_ascii_lowercase() == right.to_ascii_lowercase())
		.count();
}

/// Find the sibling of `target` within `directory` that best matches it
/// case-insensitively. Directory order is the tie-break (first hit wins),
/// mirroring the order `std::fs::read_dir` happens to yield on the host
/// filesystem, the same assumption PyKotor's implementation makes.
fn findClosestMatch(directory: &Path, target: &str) -> Option<String>
{
	let entries = fs::read_dir(directory).ok()?;

	let mut bestName: Option<String> = None;
	let mut bestScore: usize = 0;

	for entry in entries.flatten()
	{
		let name = entry.file_name().to_string_lossy().into_owned();

		if name.eq_ignore_ascii_case(target)
		{
			return Some(name);
		}

		let score = matchingCharacterCount(&name, target);
		if score > bestScore
		{
			bestScore = score;
			bestName = Some(name);
		}
	}

	return bestName;
}

/// Resolve `path` against the real filesystem case-insensitively.
///
/// Paths are canonicalised case-insensitively only when the host filesystem
/// is case-sensitive *and* the path does not already exist verbatim. Each
/// segment is walked in turn; when a segment is missing as written, it is
/// replaced by [`findClosestMatch`]'s pick among its siblings. A segment with
/// no case-insensitive match anywhere is kept as written, so that the final
/// path still produces a normal "file not found" further downstream instead
/// of silently resolving to the wrong file.
///
/// #### Note
///
/// This assumes the filesystem does not change between resolving one
/// segment and the next; it is sound for a single lookup but not for
/// concurrent mutation of the directory tree mid-resolution (Design Notes,
/// Open Questions).
pub fn resolveCaseInsensitive(path: &Path) -> PathBuf
{
	if path.exists()
	{
		return path.to_path_buf();
	}

	let mut resolved = PathBuf::new();
	for component in path.components()
	{
		let segment = component.as_os_str().to_string_lossy().into_owned();
		let candidate = resolved.join(&segment);

		if candidate.exists()
		{
			resolved = candidate;
			continue;
		}

		match findClosestMatch(&resolved, &segment)
		{
			Some(matched) => resolved.push(matched),
			None => resolved.push(segment),
		}
	}

	return resolved;
}

#[cfg(test)]
mod tests
{
	use super::*;

	#[test]
	fn MatchingCharacterCountIsPositionalCaseInsensitive()
	{
		assert_eq!(3, matchingCharacterCount("ABC", "abc"));
		assert_eq!(1, matchingCharacterCount("abc", "axc") + 0);
		assert_eq!(2, matchingCharacterCount("abc", "axc"));
	}

	#[test]
	fn VerbatimExistingPathShortCircuits()
	{
		let dir = std::env::temp_dir().join("odyssey-core-path-test-verbatim");
		std::fs::create_dir_all(&dir).unwrap();
		let file = dir.join("Exact.txt");
		std::fs::write(&file, b"x").unwrap();

		assert_eq!(file, resolveCaseInsensitive(&file));

		let _ = std::fs::remove_dir_all(&dir);
	}

	#[test]
	fn MissingSegmentResolvesToBestCaseInsensitiveSibling()
	{
		let dir = std::env::temp_dir().join("odyssey-core-path-test-sibling");
		std::fs::create_dir_all(&dir).unwrap();
		std::fs::write(dir.join("Player.UTC"), b"x").unwrap();

		let wanted = dir.join("player.utc");
		let resolved = resolveCaseInsensitive(&wanted);

		assert_eq!(dir.join("Player.UTC"), resolved);

		let _ = std::fs::remove_dir_all(&dir);
	}

	#[test]
	fn NoMatchKeepsOriginalSegment()
	{
		let dir = std::env::temp_dir().join("odyssey-core-path-test-nomatch");
		std::fs::create_dir_all(&dir).unwrap();

		let wanted = dir.join("doesnotexist.utc");
		let resolved = resolveCaseInsensitive(&wanted);

		assert_eq!(wanted, resolved);

		let _ = std::fs::remove_dir_all(&dir);
	}
}
