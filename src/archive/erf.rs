//! ERF capsule reader/writer (§4.3, §6 "ERF header").
//!
//! No Infinity Engine equivalent exists (no capsule format there); built
//! against [`crate::archive::capsule::CapsuleIndex`] using the same
//! `Readable`-free, explicit `fromCursor`/`write` pairing `Key`/`DataArchive`
//! use. The on-disk layout (160-byte header, 24-byte key-list
//! entries, 8-byte resource-list entries) is the standard Aurora-engine ERF
//! V1.0 layout; PyKotor's higher-level `ERF`/`set_data`/`get`/`remove` shape
//! (`resource/formats/erf/erf_data.py`) is what `CapsuleIndex` mirrors.

use std::io::{Cursor, Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::archive::capsule::{CapsuleIndex, CapsuleResource};
use crate::archive::rim::Rim;
use crate::bytes::{padAscii, readToReal, MaxNameLength};
use crate::error::{Error, Result};
use crate::resource::{Identity, ResourceType};

const HeaderSize: u32 = 160;
const KeyEntrySize: u32 = 24;
const ResourceEntrySize: u32 = 8;

/// ERF ("ERF ") and module ("MOD ") share this exact layout; the signature
/// is preserved through read/write so a MOD round-trips as a MOD.
#[derive(Clone, Debug)]
pub struct Erf
{
	pub signature: String,
	pub buildYear: u32,
	pub buildDay: u32,
	pub descriptionStrRef: u32,
	pub index: CapsuleIndex,
}

impl Erf
{
	pub fn new(signature: impl Into<String>) -> Self
	{
		return Self { signature: signature.into(), buildYear: 0, buildDay: 0, descriptionStrRef: 0, index: CapsuleIndex::new() };
	}

	pub fn fromCursor(cursor: &mut Cursor<Vec<u8>>) -> Result<Self>
	{
		let mut signatureBytes = [0u8; 4];
		let mut versionBytes = [0u8; 4];
		cursor.read_exact(&mut signatureBytes)?;
		cursor.read_exact(&mut versionBytes)?;
		let signature = String::from_utf8_lossy(&signatureBytes).to_string();

		let _languageCount = cursor.read_u32::<LittleEndian>()?;
		let _localizedStringSize = cursor.read_u32::<LittleEndian>()?;
		let entryCount = cursor.read_u32::<LittleEndian>()?;
		let _offsetToLocalizedString = cursor.read_u32::<LittleEndian>()?;
		let offsetToKeyList = cursor.read_u32::<LittleEndian>()?;
		let offsetToResourceList = cursor.read_u32::<LittleEndian>()?;
		let buildYear = cursor.read_u32::<LittleEndian>()?;
		let buildDay = cursor.read_u32::<LittleEndian>()?;
		let descriptionStrRef = cursor.read_u32::<LittleEndian>()?;

		cursor.set_position(offsetToKeyList as u64);
		let mut identities = Vec::with_capacity(entryCount as usize);
		for _ in 0..entryCount
		{
			let mut nameBytes = [0u8; MaxNameLength];
			cursor.read_exact(&mut nameBytes)?;
			let mut realBytes = [0u8; MaxNameLength];
			readToReal(&nameBytes, &mut realBytes)?;
			let name = String::from_utf8_lossy(&realBytes).trim_end_matches('\0').to_string();

			let _resId = cursor.read_u32::<LittleEndian>()?;
			let typeId = cursor.read_u16::<LittleEndian>()?;
			let _unused = cursor.read_u16::<LittleEndian>()?;

			identities.push(Identity::new(name, ResourceType::fromId(typeId as i16))?);
		}

		cursor.set_position(offsetToResourceList as u64);
		let mut spans = Vec::with_capacity(entryCount as usize);
		for _ in 0..entryCount
		{
			let offset = cursor.read_u32::<LittleEndian>()?;
			let size = cursor.read_u32::<LittleEndian>()?;
			spans.push((offset, size));
		}

		let mut resources = Vec::with_capacity(entryCount as usize);
		for (identity, (offset, size)) in identities.into_iter().zip(spans.into_iter())
		{
			cursor.set_position(offset as u64);
			let mut data = vec![0u8; size as usize];
			cursor.read_exact(&mut data)?;
			resources.push(CapsuleResource { identity, data });
		}

		return Ok(Self
		{
			signature,
			buildYear,
			buildDay,
			descriptionStrRef,
			index: CapsuleIndex::fromResources(resources),
		});
	}

	pub fn write(&self) -> Result<Vec<u8>>
	{
		let entryCount = self.index.len() as u32;
		let offsetToKeyList = HeaderSize;
		let offsetToResourceList = offsetToKeyList + entryCount * KeyEntrySize;
		let payloadStart = offsetToResourceList + entryCount * ResourceEntrySize;

		let mut out = Vec::new();
		out.write_all(self.signature.as_bytes())?;
		out.write_all(b"V1.0")?;
		out.write_u32::<LittleEndian>(0)?; // language count
		out.write_u32::<LittleEndian>(0)?; // localized string size
		out.write_u32::<LittleEndian>(entryCount)?;
		out.write_u32::<LittleEndian>(offsetToKeyList)?; // localized string table placed at key list start (empty)
		out.write_u32::<LittleEndian>(offsetToKeyList)?;
		out.write_u32::<LittleEndian>(offsetToResourceList)?;
		out.write_u32::<LittleEndian>(self.buildYear)?;
		out.write_u32::<LittleEndian>(self.buildDay)?;
		out.write_u32::<LittleEndian>(self.descriptionStrRef)?;
		out.write_all(&[0u8; 116])?;

		for (index, resource) in self.index.iter().enumerate()
		{
			out.write_all(&padAscii(resource.identity.name(), MaxNameLength))?;
			out.write_u32::<LittleEndian>(index as u32)?;
			out.write_u16::<LittleEndian>(resource.identity.resType().id() as u16)?;
			out.write_u16::<LittleEndian>(0)?;
		}

		let mut runningOffset = payloadStart;
		for resource in self.index.iter()
		{
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

	/// *convert to the other variant* (§4.3): an ERF carries no data RIM
	/// cannot represent, so conversion is a straight re-index.
	pub fn toRim(&self) -> Rim
	{
		let mut rim = Rim::new();
		for resource in self.index.iter()
		{
			rim.index.set(resource.identity.clone(), resource.data.clone());
		}
		return rim;
	}
}

#[cfg(test)]
mod tests
{
	use super::*;

	#[test]
	fn EmptyErfWritesAndReadsBack()
	{
		let erf = Erf::new("ERF ");
		let bytes = erf.write().unwrap();
		let mut cursor = Cursor::new(bytes);
		let reparsed = Erf::fromCursor(&mut cursor).unwrap();

		assert_eq!(0, reparsed.index.len());
		assert_eq!("ERF ", reparsed.signature);
	}

	#[test]
	fn RoundTripsResourcesUnchanged()
	{
		let mut erf = Erf::new("MOD ");
		erf.index.set(Identity::new("player", ResourceType::Utc).unwrap(), b"payload bytes".to_vec());
		erf.index.set(Identity::new("door01", ResourceType::Utd).unwrap(), Vec::new());

		let bytes = erf.write().unwrap();
		let mut cursor = Cursor::new(bytes);
		let reparsed = Erf::fromCursor(&mut cursor).unwrap();

		assert_eq!(2, reparsed.index.len());
		assert_eq!(b"payload bytes".to_vec(), reparsed.index.get(&Identity::new("player", ResourceType::Utc).unwrap()).unwrap().to_vec());
		assert_eq!(Vec::<u8>::new(), reparsed.index.get(&Identity::new("door01", ResourceType::Utd).unwrap()).unwrap().to_vec());
	}
}
