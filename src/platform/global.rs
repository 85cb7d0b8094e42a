use std::path::Path;

use serde::{Deserialize, Serialize};
use strum::FromRepr;

/// One of the two game generations sharing this file-format family.
///
/// A per-title `Games` enum would carry one variant per shipped title; this
/// crate only ever needs to distinguish the two binary-format generations
/// the model/bytecode converters bridge (never infer a generation, always
/// take one explicitly from the caller via [`crate::Context`]).
#[derive(Clone, Copy, Debug, Deserialize, Eq, FromRepr, Hash, PartialEq, Serialize)]
#[repr(i32)]
pub enum Generation
{
	K1,
	K2,
}

/// The canonical keyed-archive filename for a generation (case as shipped).
pub fn KeyFileName(generation: Generation) -> &'static str
{
	return match generation
	{
		Generation::K1 => "chitin.key",
		Generation::K2 => "chitin.key",
	};
}

/// Marker paths used by the installation-root detection heuristic (§4.4):
/// relative paths that, if present under a candidate root, count as evidence
/// for that generation. Grounded on PyKotor's `tools/path.py::get_default_paths`
/// list of generation-specific giveaway files.
pub fn MarkerPaths(generation: Generation) -> &'static [&'static str]
{
	return match generation
	{
		Generation::K1 => &[
			"chitin.key",
			"dialog.tlk",
			"streamwaves",
			"modules/danm13.rim",
			"rims/danm13.rim",
		],
		Generation::K2 => &[
			"chitin.key",
			"dialog.tlk",
			"streamvoice",
			"modules/001ebo.rim",
			"override/appearance.2da",
		],
	};
}

/// Score-based probe (§4.4): count how many of each generation's marker
/// paths exist under `root`, and return whichever generation scores higher.
/// A tie (including 0-0) returns `None`, leaving the caller to ask the user
/// rather than guess (Open Questions: never guess a generation).
pub fn detectGeneration(root: &Path) -> Option<Generation>
{
	let scoreOf = |generation: Generation| -> usize
	{
		return MarkerPaths(generation)
			.iter()
			.filter(|marker| root.join(marker).exists())
			.count();
	};

	let k1Score = scoreOf(Generation::K1);
	let k2Score = scoreOf(Generation::K2);

	return match k1Score.cmp(&k2Score)
	{
		std::cmp::Ordering::Greater => Some(Generation::K1),
		std::cmp::Ordering::Less => Some(Generation::K2),
		std::cmp::Ordering::Equal => None,
	};
}
