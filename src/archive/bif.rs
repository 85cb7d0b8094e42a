//! Data-archive (BIF/BZF) reader/writer (§4.2, §6 "BIF/BZF header").
//!
//! Generalizes an Infinity-Engine-style BIF reader (`Bif`/`FileEntry`,
//! `Readable::fromCursor`, `ReadValue`-based locator decode) from its
//! tileset-bearing BIFF V1 layout down to the simpler Odyssey layout (no
//! tileset table), and adds the BZF compressed variant,
//! whose payloads are raw LZMA1 streams (`lzma-rust2`, the same crate
//! `sevenz-rust2` depends on for its own raw LZMA1 support).
//!
//! A BZF payload is stored as a one-byte LZMA properties byte, a 4-byte
//! little-endian dictionary size, and then the raw LZMA1 compressed stream
//! with no end marker; the uncompressed length always comes from the
//! resource table entry (§4.2), never from the stream itself.

use std::io::{Cursor, Read, Write};

use byteorder::{BigEndian, LittleEndian, ReadBytesExt, WriteBytesExt};
use lzma_rust2::{LZMAReader, LZMAWriter};

use crate::error::{Error, Result};
use crate::resource::ResourceType;

pub const BifSignature: &str = "BIFF";
pub const BzfSignature: &str = "BZF ";
pub const Version: &str = "V1  ";

/// A parsed data archive: either a plain BIF or a BZF whose payloads are
/// individually LZMA1-compressed. `compressed` distinguishes the two at
/// read time so `get` knows whether to decompress.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct DataArchive
{
	pub compressed: bool,
	pub variableResourceTableOffset: u32,
	pub entries: Vec<ResourceEntry>,
}

/// One entry in a data archive's variable-resource table: `(id, offset,
/// size, type)`, 16 bytes on disk. `size` is always the *uncompressed*
/// size, even for BZF (§4.2).
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ResourceEntry
{
	pub id: u32,
	pub offset: u32,
	pub size: u32,
	pub resType: ResourceType,
}

impl DataArchive
{
	pub fn fromCursor(cursor: &mut Cursor<Vec<u8>>) -> Result<Self>
	{
		let mut signature = [0u8; 4];
		let mut version = [0u8; 4];
		cursor.read_exact(&mut signature)?;
		cursor.read_exact(&mut version)?;

		let compressed = match std::str::from_utf8(&signature)
		{
			Ok(BifSignature) => false,
			Ok(BzfSignature) => true,
			_ => return Err(Error::invalidArchive(None, "bad BIF/BZF signature")),
		};

		if &version != Version.as_bytes()
		{
			return Err(Error::invalidArchive(None, "bad BIF/BZF version"));
		}

		let variableCount = cursor.read_u32::<LittleEndian>()?;
		let _fixedCount = cursor.read_u32::<LittleEndian>()?;
		let variableResourceTableOffset = cursor.read_u32::<LittleEndian>()?;

		cursor.set_position(variableResourceTableOffset as u64);
		let mut entries = Vec::with_capacity(variableCount as usize);
		for _ in 0..variableCount
		{
			let id = cursor.read_u32::<LittleEndian>()?;
			let offset = cursor.read_u32::<LittleEndian>()?;
			let size = cursor.read_u32::<LittleEndian>()?;
			let typeId = cursor.read_u32::<LittleEndian>()?;
			entries.push(ResourceEntry { id, offset, size, resType: ResourceType::fromId(typeId as i16) });
		}

		return Ok(Self { compressed, variableResourceTableOffset, entries });
	}

	/// *get(identity) → bytes* (§4.2), addressed here by in-archive index
	/// since identity resolution happens one layer up in `archive::install`.
	pub fn get(&self, cursor: &mut Cursor<Vec<u8>>, index: usize) -> Result<Vec<u8>>
	{
		let entry = self
			.entries
			.get(index)
			.ok_or_else(|| Error::invalidArchive(None, format!("no resource at index {index}")))?;

		cursor.set_position(entry.offset as u64);

		if !self.compressed
		{
			let mut bytes = vec![0u8; entry.size as usize];
			cursor.read_exact(&mut bytes)?;
			return Ok(bytes);
		}

		let propsByte = cursor.read_u8()?;
		let dictSize = cursor.read_u32::<LittleEndian>()?;
		let lc = (propsByte % 9) as u32;
		let remainder = propsByte / 9;
		let lp = (remainder % 5) as u32;
		let pb = (remainder / 5) as u32;

		let mut reader = LZMAReader::new(cursor, entry.size as u64, lc, lp, pb, dictSize, None)
			.map_err(|err| Error::invalidArchive(None, format!("LZMA1 stream init failed: {err}")))?;

		let mut decoded = Vec::with_capacity(entry.size as usize);
		reader.read_to_end(&mut decoded)?;

		if decoded.len() as u32 != entry.size
		{
			return Err(Error::invalidArchive(None, format!("size mismatch after decompression: {} != {}", decoded.len(), entry.size)));
		}

		return Ok(decoded);
	}

	/// Compress `payload` with raw LZMA1 and write the `(propsByte,
	/// dictSize, stream)` BZF payload layout used by [`Self::get`].
	pub fn compressPayload(payload: &[u8]) -> Result<Vec<u8>>
	{
		const Lc: u32 = 3;
		const Lp: u32 = 0;
		const Pb: u32 = 2;
		const DictSize: u32 = 1 << 16;

		let propsByte = (Pb * 5 + Lp) * 9 + Lc;

		let mut out = Vec::new();
		out.write_u8(propsByte as u8)?;
		out.write_u32::<LittleEndian>(DictSize)?;

		let mut writer = LZMAWriter::new(&mut out, Lc, Lp, Pb, DictSize, None, payload.len() as u64)
			.map_err(|err| Error::invalidArchive(None, format!("LZMA1 stream init failed: {err}")))?;
		writer.write_all(payload)?;
		writer
			.finish()
			.map_err(|err| Error::invalidArchive(None, format!("LZMA1 stream flush failed: {err}")))?;

		return Ok(out);
	}
}

/// Serialize the 8-byte fixed header shared by BIF and BZF archives.
pub fn writeHeader(out: &mut Vec<u8>, compressed: bool, variableCount: u32, fixedCount: u32, variableResourceTableOffset: u32) -> Result<()>
{
	let signature = if compressed { BzfSignature } else { BifSignature };
	out.write_all(signature.as_bytes())?;
	out.write_all(Version.as_bytes())?;
	out.write_u32::<LittleEndian>(variableCount)?;
	out.write_u32::<LittleEndian>(fixedCount)?;
	out.write_u32::<LittleEndian>(variableResourceTableOffset)?;
	return Ok(());
}

/// Align `out`'s length up to the next 4-byte boundary with zero padding,
/// matching "payloads are 4-byte aligned" (§4.2).
pub fn padToAlignment(out: &mut Vec<u8>)
{
	while out.len() % 4 != 0
	{
		out.push(0);
	}
}

// Unused but preserves the signature-byte-order convention used elsewhere
// in this crate for any big-endian header fields a future format variant
// might need.
#[allow(dead_code)]
fn peekBigEndianU32(bytes: &[u8]) -> u32
{
	return Cursor::new(bytes).read_u32::<BigEndian>().unwrap_or(0);
}

#[cfg(test)]
mod tests
{
	use super::*;

	fn buildPlainBif(payload: &[u8]) -> Vec<u8>
	{
		let mut out = Vec::new();
		writeHeader(&mut out, false, 1, 0, 20).unwrap();
		out.write_u32::<LittleEndian>(0).unwrap(); // id
		out.write_u32::<LittleEndian>(20 + 16).unwrap(); // offset
		out.write_u32::<LittleEndian>(payload.len() as u32).unwrap();
		out.write_u32::<LittleEndian>(ResourceType::Txt.id() as u32).unwrap();
		out.extend_from_slice(payload);
		return out;
	}

	#[test]
	fn PlainBifRoundTrips()
	{
		let payload = b"hello world";
		let bytes = buildPlainBif(payload);
		let mut cursor = Cursor::new(bytes);
		let archive = DataArchive::fromCursor(&mut cursor).unwrap();

		assert!(!archive.compressed);
		assert_eq!(1, archive.entries.len());

		let mut readCursor = cursor;
		let data = archive.get(&mut readCursor, 0).unwrap();
		assert_eq!(payload.to_vec(), data);
	}

	#[test]
	fn BzfRoundTripsThreePayloads()
	{
		let payloads = ["Hello World 1", "Hello World 2", "Hello World 3"];
		let compressedPayloads: Vec<Vec<u8>> = payloads.iter().map(|payload| DataArchive::compressPayload(payload.as_bytes()).unwrap()).collect();

		let headerSize = 20u32;
		let tableSize = compressedPayloads.len() as u32 * 16;
		let mut offsets = Vec::new();
		let mut runningOffset = headerSize + tableSize;
		for compressed in &compressedPayloads
		{
			offsets.push(runningOffset);
			runningOffset += compressed.len() as u32;
		}

		let mut out = Vec::new();
		writeHeader(&mut out, true, compressedPayloads.len() as u32, 0, headerSize).unwrap();
		for (index, (payload, offset)) in payloads.iter().zip(offsets.iter()).enumerate()
		{
			out.write_u32::<LittleEndian>(index as u32).unwrap();
			out.write_u32::<LittleEndian>(*offset).unwrap();
			out.write_u32::<LittleEndian>(payload.len() as u32).unwrap();
			out.write_u32::<LittleEndian>(ResourceType::Txt.id() as u32).unwrap();
		}
		for compressed in &compressedPayloads
		{
			out.extend_from_slice(compressed);
		}

		let mut cursor = Cursor::new(out);
		let archive = DataArchive::fromCursor(&mut cursor).unwrap();
		assert!(archive.compressed);

		for (index, expected) in payloads.iter().enumerate()
		{
			let decoded = archive.get(&mut cursor, index).unwrap();
			assert_eq!(expected.as_bytes().to_vec(), decoded);
			assert_eq!(13, decoded.len());
		}
	}
}
