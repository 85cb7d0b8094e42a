//! RIM capsule reader/writer (§4.3, §6 "RIM uses its own 4-byte signature
//! and a simpler flat resource table").
//!
//! Grounded on PyKotor's `pykotor.resource.formats.rim.rim_data.RIM`
//! (`set_data`/`get`/`remove`/`to_erf`), reusing
//! [`crate::archive::capsule::CapsuleIndex`] for the in-memory shape and
//! adding the on-disk 120-byte-header, 32-byte-entry RIM V1.0 layout.

use std::io::{Cursor, Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::archive::capsule::{CapsuleIndex, CapsuleResource};
use crate::archive::erf::Erf;
use crate::bytes::{padAscii, readToReal, MaxNameLength};
use crate::error::{Error, Result};
use crate::resource::{Identity, ResourceType};

pub const Signature: &str = "RIM ";
pub const Version: &str = "V1.0";
const HeaderSize: u32 = 120;
const EntrySize: u32 = 32;

#[derive(Clone, Debug, Default)]
pub struct Rim
{
	pub index: CapsuleIndex,
}

impl Rim
{
	pub fn new() -> Self
	{
		return Self::default();
	}

	pub fn fromCursor(cursor: &mut Cursor<Vec<u8>>) -> Result<Self>
	{
		let mut signature = [0u8; 4];
		let mut version = [0u8; 4];
		cursor.read_exact(&mut signature)?;
		cursor.read_exact(&mut version)?;

		if &signature != Signature.as_bytes()
		{
			return Err(Error::invalidArchive(None, "bad RIM signature"));
		}
		if &version != Version.as_bytes()
		{
			return Err(Error::invalidArchive(None, "bad RIM version"));
		}

		cursor.set_position(cursor.position() + 4); // reserved
		let entryCount = cursor.read_u32::<LittleEndian>()?;
		let offsetToEntryTable = cursor.read_u32::<LittleEndian>()?;
		cursor.set_position(cursor.position() + 100); // reserved

		cursor.set_position(offsetToEntryTable as u64);
		let mut entries = Vec::with_capacity(entryCount as usize);
		for _ in 0..entryCount
		{
			let mut nameBytes = [0u8; MaxNameLength];
			cursor.read_exact(&mut nameBytes)?;
			let mut realBytes = [0u8; MaxNameLength];
			readToReal(&nameBytes, &mut realBytes)?;
			let name = String::from_utf8_lossy(&realBytes).trim_end_matches('\0').to_string();

			let typeId = cursor.read_u16::<LittleEndian>()?;
			let _unused = cursor.read_u16::<LittleEndian>()?;
			let _resId = cursor.read_u32::<LittleEndian>()?;
			let offset = cursor.read_u32::<LittleEndian>()?;
			let size = cursor.read_u32::<LittleEndian>()?;

			entries.push((Identity::new(name, ResourceType::fromId(typeId as i16))?, offset, size));
		}

		let mut resources = Vec::with_capacity(entries.len());
		for (identity, offset, size) in entries
		{
			cursor.set_position(offset as u64);
			let mut data = vec![0u8; size as usize];
			cursor.read_exact(&mut data)?;
			resources.push(CapsuleResource { identity, data });
		}

		return Ok(Self { index: CapsuleIndex::fromResources(resources) });
	}

	pub fn write(&self) -> Result<Vec<u8>>
	{
		let entryCount = self.index.len() as u32;
		let offsetToEntryTable = HeaderSize;
		let payloadStart = offsetToEntryTable + entryCount * EntrySize;

		let mut out = Vec::new();
		out.write_all(Signature.as_bytes())?;
		out.write_all(Version.as_bytes())?;
		out.write_u32::<LittleEndian>(0)?; // reserved
		out.write_u32::<LittleEndian>(entryCount)?;
		out.write_u32::<LittleEndian>(offsetToEntryTable)?;
		out.write_all(&[0u8; 100])?;

		let mut runningOffset = payloadStart;
		for (index, resource) in self.index.iter().enumerate()
		{
			out.write_all(&padAscii(resource.identity.name(), MaxNameLength))?;
			out.write_u16::<LittleEndian>(resource.identity.resType().id() as u16)?;
			out.write_u16::<LittleEndian>(0)?;
			out.write_u32::<LittleEndian>(index as u32)?;
			out.write_u32::<LittleEndian>(runningOffset)?;
			out.write_u32::<LittleEndian>(resource.data.len() as u32)?;
			runningOffset += resource.data.len() as u32;
		}

		for resource in self.index.iter()
		{
			out.write_all(&resource.data)?;
		}

		return Ok(out);
	}

	/// *convert to the other variant* (§4.3): RIMs carry no data an ERF
	/// cannot hold, so conversion is a straight re-index.
	pub fn toErf(&self) -> Erf
	{
		return self.toErfWithSignature("ERF ");
	}

	pub fn toErfWithSignature(&self, signature: impl Into<String>) -> Erf
	{
		let mut erf = Erf::new(signature);
		for resource in self.index.iter()
		{
			erf.index.set(resource.identity.clone(), resource.data.clone());
		}
		return erf;
	}
}

#[cfg(test)]
mod tests
{
	use super::*;

	#[test]
	fn EmptyRimWritesValidFile()
	{
		let rim = Rim::new();
		let bytes = rim.write().unwrap();
		let mut cursor = Cursor::new(bytes);
		let reparsed = Rim::fromCursor(&mut cursor).unwrap();
		assert_eq!(0, reparsed.index.len());
	}

	#[test]
	fn RoundTripsResourcesUnchanged()
	{
		let mut rim = Rim::new();
		rim.index.set(Identity::new("module", ResourceType::Ifo).unwrap(), b"ifo bytes".to_vec());

		let bytes = rim.write().unwrap();
		let mut cursor = Cursor::new(bytes);
		let reparsed = Rim::fromCursor(&mut cursor).unwrap();

		assert_eq!(b"ifo bytes".to_vec(), reparsed.index.get(&Identity::new("module", ResourceType::Ifo).unwrap()).unwrap().to_vec());
	}

	#[test]
	fn ConvertsToErfPreservingResources()
	{
		let mut rim = Rim::new();
		rim.index.set(Identity::new("module", ResourceType::Ifo).unwrap(), b"ifo bytes".to_vec());

		let erf = rim.toErf();
		assert_eq!(b"ifo bytes".to_vec(), erf.index.get(&Identity::new("module", ResourceType::Ifo).unwrap()).unwrap().to_vec());
	}
}
