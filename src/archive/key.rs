//! KEY file reader/writer (§4.2, §6 "KEY header").
//!
//! Generalizes an Infinity-Engine-style KEY reader (`Key`/`BifEntry`/
//! `ResourceEntry`, `Readable::fromCursor`, bit-packed locator via
//! `ReadValue`) from its 8-byte RESREF + separate 32-bit locator layout to
//! the Odyssey layout: a 16-byte resource name and a 32-bit packed id of
//! `archive-index<<20 | in-archive-index`, per §4.2/§6. The write half is
//! grounded on PyKotor's `pykotor.extract.keywriter.KEYWriter.write`, which
//! lays the same four sections out in the same order (header, file table,
//! filename table, key table).

use std::io::{Cursor, Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::bits::ReadValue;
use crate::bytes::{padAscii, readToReal, MaxNameLength};
use crate::error::{Error, Result};
use crate::resource::ResourceType;

pub const Signature: &str = "KEY ";
pub const Version: &str = "V1  ";
const HeaderSize: u32 = 64;

/// A fully parsed KEY V1 file: the directory of data archives and the table
/// mapping each resource identity to (data-archive index, in-archive index).
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Key
{
	pub dataArchiveCount: u32,
	pub resourceCount: u32,
	pub fileTableOffset: u32,
	pub keyTableOffset: u32,
	pub creationYear: u32,
	pub creationDayOfYear: u32,
	pub dataArchives: Vec<DataArchiveEntry>,
	pub resources: Vec<KeyResourceEntry>,
}

/// One data-archive (BIF/BZF) descriptor in the KEY's file table.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct DataArchiveEntry
{
	pub fileSize: u32,
	pub fileNameOffset: u32,
	pub fileNameLength: u16,
	pub fileName: String,
}

/// One resource entry in the KEY's key table: an identity plus the packed
/// locator pointing at a data archive and an in-archive index.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct KeyResourceEntry
{
	pub name: String,
	pub resType: ResourceType,
	pub locator: u32,
}

impl KeyResourceEntry
{
	const ArchiveIndexShift: u64 = 20;
	const InArchiveIndexBits: u64 = 20;

	pub fn archiveIndex(&self) -> u32
	{
		return ReadValue(self.locator.into(), 12, Self::ArchiveIndexShift) as u32;
	}

	pub fn inArchiveIndex(&self) -> u32
	{
		return ReadValue(self.locator.into(), Self::InArchiveIndexBits, 0) as u32;
	}

	pub fn packLocator(archiveIndex: u32, inArchiveIndex: u32) -> u32
	{
		return (archiveIndex << Self::ArchiveIndexShift) | (inArchiveIndex & 0x000f_ffff);
	}
}

impl Key
{
	pub fn fromCursor(cursor: &mut Cursor<Vec<u8>>) -> Result<Self>
	{
		let mut signature = [0u8; 4];
		let mut version = [0u8; 4];
		cursor.read_exact(&mut signature)?;
		cursor.read_exact(&mut version)?;

		if &signature != Signature.as_bytes() || &version != Version.as_bytes()
		{
			return Err(Error::invalidArchive(None, "bad KEY signature or version"));
		}

		let dataArchiveCount = cursor.read_u32::<LittleEndian>()?;
		let resourceCount = cursor.read_u32::<LittleEndian>()?;
		let fileTableOffset = cursor.read_u32::<LittleEndian>()?;
		let keyTableOffset = cursor.read_u32::<LittleEndian>()?;
		let creationYear = cursor.read_u32::<LittleEndian>()?;
		let creationDayOfYear = cursor.read_u32::<LittleEndian>()?;
		cursor.set_position(cursor.position() + 32); // reserved

		cursor.set_position(fileTableOffset as u64);
		let mut dataArchives = Vec::with_capacity(dataArchiveCount as usize);
		for _ in 0..dataArchiveCount
		{
			let fileSize = cursor.read_u32::<LittleEndian>()?;
			let fileNameOffset = cursor.read_u32::<LittleEndian>()?;
			let fileNameLength = cursor.read_u16::<LittleEndian>()?;
			dataArchives.push(DataArchiveEntry { fileSize, fileNameOffset, fileNameLength, fileName: String::new() });
		}

		for entry in dataArchives.iter_mut()
		{
			cursor.set_position(entry.fileNameOffset as u64);
			let mut nameBytes = vec![0u8; entry.fileNameLength as usize];
			cursor.read_exact(&mut nameBytes)?;
			entry.fileName = String::from_utf8_lossy(&nameBytes).trim_end_matches('\0').to_string();
		}

		cursor.set_position(keyTableOffset as u64);
		let mut resources = Vec::with_capacity(resourceCount as usize);
		for _ in 0..resourceCount
		{
			let mut nameBytes = [0u8; MaxNameLength];
			cursor.read_exact(&mut nameBytes)?;
			let mut realBytes = [0u8; MaxNameLength];
			readToReal(&nameBytes, &mut realBytes)?;
			let name = String::from_utf8_lossy(&realBytes).trim_end_matches('\0').to_string();

			let typeId = cursor.read_u16::<LittleEndian>()?;
			let locator = cursor.read_u32::<LittleEndian>()?;

			resources.push(KeyResourceEntry { name, resType: ResourceType::fromId(typeId as i16), locator });
		}

		return Ok(Self
		{
			dataArchiveCount,
			resourceCount,
			fileTableOffset,
			keyTableOffset,
			creationYear,
			creationDayOfYear,
			dataArchives,
			resources,
		});
	}

	/// *write(keyed-archive, key-stream, data-streams)* (§4.2). Emits the
	/// four sections in the same order as PyKotor's `KEYWriter`: header, file
	/// table, filename table, key table.
	pub fn write(&self) -> Result<Vec<u8>>
	{
		let fileTableOffset = HeaderSize;
		let filenameTableOffset =
			fileTableOffset + (self.dataArchives.len() as u32) * 12;
		let filenameBytes: Vec<&str> = self.dataArchives.iter().map(|entry| entry.fileName.as_str()).collect();
		let mut filenameOffsets = Vec::with_capacity(filenameBytes.len());
		let mut runningOffset = filenameTableOffset;
		for name in &filenameBytes
		{
			filenameOffsets.push(runningOffset);
			runningOffset += name.len() as u32 + 1; // NUL terminated
		}
		let keyTableOffset = runningOffset;

		let mut out = Vec::new();
		out.write_all(Signature.as_bytes())?;
		out.write_all(Version.as_bytes())?;
		out.write_u32::<LittleEndian>(self.dataArchives.len() as u32)?;
		out.write_u32::<LittleEndian>(self.resources.len() as u32)?;
		out.write_u32::<LittleEndian>(fileTableOffset)?;
		out.write_u32::<LittleEndian>(keyTableOffset)?;
		out.write_u32::<LittleEndian>(self.creationYear)?;
		out.write_u32::<LittleEndian>(self.creationDayOfYear)?;
		out.write_all(&[0u8; 32])?;

		for (entry, &offset) in self.dataArchives.iter().zip(filenameOffsets.iter())
		{
			out.write_u32::<LittleEndian>(entry.fileSize)?;
			out.write_u32::<LittleEndian>(offset)?;
			out.write_u16::<LittleEndian>(entry.fileName.len() as u16 + 1)?;
		}

		for name in &filenameBytes
		{
			out.write_all(name.as_bytes())?;
			out.write_u8(0)?;
		}

		for resource in &self.resources
		{
			out.write_all(&padAscii(&resource.name, MaxNameLength))?;
			out.write_u16::<LittleEndian>(resource.resType.id() as u16)?;
			out.write_u32::<LittleEndian>(resource.locator)?;
		}

		return Ok(out);
	}
}

#[cfg(test)]
mod tests
{
	use super::*;

	fn sampleKey() -> Key
	{
		return Key
		{
			dataArchiveCount: 1,
			resourceCount: 1,
			fileTableOffset: HeaderSize,
			keyTableOffset: 0,
			creationYear: 2026,
			creationDayOfYear: 1,
			dataArchives: vec![DataArchiveEntry
			{
				fileSize: 100,
				fileNameOffset: 0,
				fileNameLength: 9,
				fileName: "data.bif".to_string(),
			}],
			resources: vec![KeyResourceEntry
			{
				name: "player".to_string(),
				resType: ResourceType::Utc,
				locator: KeyResourceEntry::packLocator(0, 5),
			}],
		};
	}

	#[test]
	fn WriteThenReadRoundTrips()
	{
		let key = sampleKey();
		let bytes = key.write().unwrap();
		let mut cursor = Cursor::new(bytes);
		let reparsed = Key::fromCursor(&mut cursor).unwrap();

		assert_eq!(key.dataArchives[0].fileName, reparsed.dataArchives[0].fileName);
		assert_eq!(key.resources[0].name, reparsed.resources[0].name);
		assert_eq!(key.resources[0].resType, reparsed.resources[0].resType);
		assert_eq!(0, reparsed.resources[0].archiveIndex());
		assert_eq!(5, reparsed.resources[0].inArchiveIndex());
	}

	#[test]
	fn LocatorPacksAndUnpacksArchiveAndIndex()
	{
		let entry = KeyResourceEntry { name: String::new(), resType: ResourceType::Invalid, locator: KeyResourceEntry::packLocator(15, 40) };
		assert_eq!(15, entry.archiveIndex());
		assert_eq!(40, entry.inArchiveIndex());
	}

	#[test]
	fn BadSignatureIsRejected()
	{
		let mut cursor = Cursor::new(vec![0u8; 64]);
		assert!(Key::fromCursor(&mut cursor).is_err());
	}
}
