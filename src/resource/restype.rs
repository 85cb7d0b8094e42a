#![allow(non_snake_case, non_upper_case_globals)]

//! The closed resource-type enumeration (§6 "Resource type table").
//!
//! A flat list of loose `i16` consts (`ResourceType_ARE`, `ResourceType_BAM`,
//! ...) would work but loses the exhaustiveness a match gives; preferring a
//! tagged variant over a bag of loose constants, this crate uses a single
//! closed `enum` with a `strum`-derived numeric round-trip, mirroring how
//! `fuel-asm` models its opcode table.

use std::fmt;

use strum::{EnumIter, FromRepr};

/// A resource's on-disk/in-archive numeric type id and its canonical file
/// extension. The id/extension pairs mirror the Aurora/Odyssey engine family
/// table shared by every per-record parser that consumes this crate's output.
#[derive(Clone, Copy, Debug, EnumIter, Eq, FromRepr, Hash, PartialEq)]
#[repr(i16)]
pub enum ResourceType
{
	Res = 0,
	Bmp = 1,
	Mve = 2,
	Tga = 3,
	Wav = 4,
	Wfx = 5,
	Plt = 6,
	Ini = 7,
	Mp3 = 8,
	Mpg = 9,
	Txt = 10,
	Plh = 2000,
	Tex = 2001,
	Mdl = 2002,
	Thg = 2003,
	Fnt = 2005,
	Lua = 2007,
	Slt = 2008,
	Nss = 2009,
	Ncs = 2010,
	Mod = 2011,
	Are = 2012,
	Set = 2013,
	Ifo = 2014,
	Bic = 2015,
	Wok = 2016,
	TwoDA = 2017,
	Tlk = 2018,
	Txi = 2022,
	Git = 2023,
	Bti = 2024,
	Uti = 2025,
	Btc = 2026,
	Utc = 2027,
	Dlg = 2029,
	Itp = 2030,
	Utt = 2032,
	Dds = 2033,
	Uts = 2035,
	Ltr = 2036,
	Gff = 2037,
	Fac = 2038,
	Ute = 2039,
	Utd = 2040,
	Utp = 2041,
	Dft = 2042,
	Gic = 2043,
	Gui = 2044,
	Utm = 2051,
	Dwk = 2052,
	Pwk = 2053,
	Jrl = 2056,
	Sav = 2057,
	Utw = 2058,
	FourPc = 2059,
	Ssf = 2060,
	Hak = 2061,
	Nwm = 2062,
	Bik = 2063,
	Ndb = 2064,
	Ptm = 2065,
	Ptt = 2066,
	Lyt = 3000,
	Vis = 3001,
	Rim = 3002,
	Pth = 3003,
	Lip = 3004,
	Bwm = 3005,
	Txb = 3006,
	Tpc = 3007,
	Mdx = 3008,
	Rsv = 3009,
	Sig = 3010,
	Xbx = 3011,
	Erf = 9997,
	Bif = 9998,
	Key = 9999,
	Invalid = -1,
}

impl ResourceType
{
	/// The canonical lowercase extension (no leading dot) used in an
	/// identity's string form (§3, §6).
	pub fn extension(self) -> &'static str
	{
		return match self
		{
			ResourceType::Res => "res",
			ResourceType::Bmp => "bmp",
			ResourceType::Mve => "mve",
			ResourceType::Tga => "tga",
			ResourceType::Wav => "wav",
			ResourceType::Wfx => "wfx",
			ResourceType::Plt => "plt",
			ResourceType::Ini => "ini",
			ResourceType::Mp3 => "mp3",
			ResourceType::Mpg => "mpg",
			ResourceType::Txt => "txt",
			ResourceType::Plh => "plh",
			ResourceType::Tex => "tex",
			ResourceType::Mdl => "mdl",
			ResourceType::Thg => "thg",
			ResourceType::Fnt => "fnt",
			ResourceType::Lua => "lua",
			ResourceType::Slt => "slt",
			ResourceType::Nss => "nss",
			ResourceType::Ncs => "ncs",
			ResourceType::Mod => "mod",
			ResourceType::Are => "are",
			ResourceType::Set => "set",
			ResourceType::Ifo => "ifo",
			ResourceType::Bic => "bic",
			ResourceType::Wok => "wok",
			ResourceType::TwoDA => "2da",
			ResourceType::Tlk => "tlk",
			ResourceType::Txi => "txi",
			ResourceType::Git => "git",
			ResourceType::Bti => "bti",
			ResourceType::Uti => "uti",
			ResourceType::Btc => "btc",
			ResourceType::Utc => "utc",
			ResourceType::Dlg => "dlg",
			ResourceType::Itp => "itp",
			ResourceType::Utt => "utt",
			ResourceType::Dds => "dds",
			ResourceType::Uts => "uts",
			ResourceType::Ltr => "ltr",
			ResourceType::Gff => "gff",
			ResourceType::Fac => "fac",
			ResourceType::Ute => "ute",
			ResourceType::Utd => "utd",
			ResourceType::Utp => "utp",
			ResourceType::Dft => "dft",
			ResourceType::Gic => "gic",
			ResourceType::Gui => "gui",
			ResourceType::Utm => "utm",
			ResourceType::Dwk => "dwk",
			ResourceType::Pwk => "pwk",
			ResourceType::Jrl => "jrl",
			ResourceType::Sav => "sav",
			ResourceType::Utw => "utw",
			ResourceType::FourPc => "4pc",
			ResourceType::Ssf => "ssf",
			ResourceType::Hak => "hak",
			ResourceType::Nwm => "nwm",
			ResourceType::Bik => "bik",
			ResourceType::Ndb => "ndb",
			ResourceType::Ptm => "ptm",
			ResourceType::Ptt => "ptt",
			ResourceType::Lyt => "lyt",
			ResourceType::Vis => "vis",
			ResourceType::Rim => "rim",
			ResourceType::Pth => "pth",
			ResourceType::Lip => "lip",
			ResourceType::Bwm => "bwm",
			ResourceType::Txb => "txb",
			ResourceType::Tpc => "tpc",
			ResourceType::Mdx => "mdx",
			ResourceType::Rsv => "rsv",
			ResourceType::Sig => "sig",
			ResourceType::Xbx => "xbx",
			ResourceType::Erf => "erf",
			ResourceType::Bif => "bif",
			ResourceType::Key => "key",
			ResourceType::Invalid => "",
		};
	}

	/// The numeric type id as stored in KEY/BIF/ERF/RIM resource tables.
	pub fn id(self) -> i16
	{
		return self as i16;
	}

	/// Reverse lookup by extension, case-insensitively. Returns
	/// [`ResourceType::Invalid`] for anything not in the closed table, which
	/// is how unknown-type filenames are represented rather than an `Option`
	/// — §4.1 says loose-mode identification still produces an identity, just
	/// one carrying the "unknown type" marker.
	pub fn fromExtension(extension: &str) -> ResourceType
	{
		let lowered = extension.to_ascii_lowercase();
		return Self::all()
			.into_iter()
			.find(|candidate| candidate.extension() == lowered)
			.unwrap_or(ResourceType::Invalid);
	}

	pub fn fromId(id: i16) -> ResourceType
	{
		return ResourceType::from_repr(id).unwrap_or(ResourceType::Invalid);
	}

	fn all() -> Vec<ResourceType>
	{
		use strum::IntoEnumIterator;
		return ResourceType::iter().collect();
	}
}

impl fmt::Display for ResourceType
{
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
	{
		return write!(f, "{}", self.extension());
	}
}

#[cfg(test)]
mod tests
{
	use super::*;

	#[test]
	fn ExtensionRoundTripsThroughId()
	{
		assert_eq!(ResourceType::Utc, ResourceType::fromId(ResourceType::Utc.id()));
	}

	#[test]
	fn ExtensionLookupIsCaseInsensitive()
	{
		assert_eq!(ResourceType::Uti, ResourceType::fromExtension("UTI"));
		assert_eq!(ResourceType::Uti, ResourceType::fromExtension("uti"));
	}

	#[test]
	fn UnknownExtensionIsInvalidNotPanic()
	{
		assert_eq!(ResourceType::Invalid, ResourceType::fromExtension("notarealtype"));
	}
}
