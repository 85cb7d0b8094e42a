//! Installation lookup layer (§4.4).
//!
//! A single-title resource cache would look up resources directly; this
//! crate instead separates "find the install root"
//! ([`crate::platform::detectGeneration`]) from "merge every source under
//! it", following PyKotor's `tools/path.py::get_default_paths` idea of a
//! fixed set of well-known subdirectories searched in priority order.

use std::path::{Path, PathBuf};

use glob::glob;
use tracing::{debug, warn};

use crate::archive::bif::DataArchive;
use crate::archive::erf::Erf;
use crate::archive::key::Key;
use crate::archive::rim::Rim;
use crate::error::{Error, Result};
use crate::resource::{Identity, ResourceRecord, ResourceType, SourceDescriptor};

#[derive(Clone, Copy, Debug, Eq, PartialEq, PartialOrd, Ord)]
enum LayerKind
{
	Override,
	Modules,
	Lips,
	Rims,
	Texturepacks,
	KeyedArchives,
}

struct Layer
{
	kind: LayerKind,
	records: Vec<ResourceRecord>,
}

/// A record returned by [`Installation::enumerate`], annotated with whether
/// a higher-priority layer already shadows it.
pub struct EnumeratedResource<'a>
{
	pub record: &'a ResourceRecord,
	pub shadowed: bool,
}

/// The merged, priority-ordered view over every resource source under an
/// install root (§4.4): override directory highest, keyed archives lowest.
pub struct Installation
{
	root: PathBuf,
	layers: Vec<Layer>,
}

impl Installation
{
	/// Open every well-known subdirectory/archive under `root` and build the
	/// merged layer set. Missing subdirectories are treated as empty layers,
	/// not errors — not every installation has every layer populated.
	pub fn open(root: impl Into<PathBuf>) -> Result<Self>
	{
		let root = root.into();
		let mut installation = Self { root, layers: Vec::new() };
		installation.reload()?;
		return Ok(installation);
	}

	pub fn root(&self) -> &Path
	{
		return &self.root;
	}

	/// *reload()* (§4.4): rescan the mutable layers (override, modules);
	/// keyed archives, once opened, are treated as immutable for the
	/// installation's lifetime, so they are rebuilt too only because this
	/// simple implementation rebuilds every layer from scratch on `open`
	/// and `reload` alike — callers that want true immutability should keep
	/// their own handle to a previously-read keyed archive layer.
	pub fn reload(&mut self) -> Result<()>
	{
		let mut layers = Vec::new();

		layers.push(Layer { kind: LayerKind::Override, records: self.scanOverrideDirectory() });
		layers.push(Layer { kind: LayerKind::Modules, records: self.scanCapsuleDirectory("modules") });
		layers.push(Layer { kind: LayerKind::Lips, records: self.scanCapsuleDirectory("lips") });
		layers.push(Layer { kind: LayerKind::Rims, records: self.scanCapsuleDirectory("rims") });
		layers.push(Layer { kind: LayerKind::Texturepacks, records: self.scanCapsuleDirectory("texturepacks") });
		layers.push(Layer { kind: LayerKind::KeyedArchives, records: self.scanKeyedArchives()? });

		self.layers = layers;
		return Ok(());
	}

	fn scanOverrideDirectory(&self) -> Vec<ResourceRecord>
	{
		let overrideDir = self.root.join("override");
		if !overrideDir.is_dir()
		{
			return Vec::new();
		}

		let mut records = Vec::new();
		let Ok(entries) = std::fs::read_dir(&overrideDir) else { return records; };
		for entry in entries.flatten()
		{
			let path = entry.path();
			if !path.is_file()
			{
				continue;
			}

			match Identity::identify(&path)
			{
				Ok(identity) => records.push(ResourceRecord::fromFile(identity, path)),
				Err(error) => warn!(?path, %error, "skipping unidentifiable override file"),
			}
		}

		return records;
	}

	fn scanCapsuleDirectory(&self, subdirectory: &str) -> Vec<ResourceRecord>
	{
		let directory = self.root.join(subdirectory);
		if !directory.is_dir()
		{
			return Vec::new();
		}

		let pattern = directory.join("*.{erf,mod,rim,sav}");
		let mut records = Vec::new();

		let Ok(paths) = glob(&pattern.to_string_lossy()) else { return records; };
		for path in paths.flatten()
		{
			debug!(?path, "indexing capsule");
			match self.recordsFromCapsuleFile(&path)
			{
				Ok(mut capsuleRecords) => records.append(&mut capsuleRecords),
				Err(error) => warn!(?path, %error, "skipping unreadable capsule"),
			}
		}

		return records;
	}

	fn recordsFromCapsuleFile(&self, path: &Path) -> Result<Vec<ResourceRecord>>
	{
		let bytes = std::fs::read(path)?;
		let extension = path.extension().and_then(|ext| ext.to_str()).unwrap_or("").to_ascii_lowercase();

		let resources: Vec<(Identity, Vec<u8>)> = if extension == "rim"
		{
			let mut cursor = std::io::Cursor::new(bytes);
			let rim = Rim::fromCursor(&mut cursor)?;
			rim.index.iter().map(|resource| (resource.identity.clone(), resource.data.clone())).collect()
		}
		else
		{
			let mut cursor = std::io::Cursor::new(bytes);
			let erf = Erf::fromCursor(&mut cursor)?;
			erf.index.iter().map(|resource| (resource.identity.clone(), resource.data.clone())).collect()
		};

		let path = path.to_path_buf();
		return Ok(resources
			.into_iter()
			.map(|(identity, data)| ResourceRecord::new(identity, SourceDescriptor::Capsule { path: path.clone(), offset: 0, size: data.len() as u64 }, std::sync::Arc::new(move || Ok(data.clone()))))
			.collect());
	}

	fn scanKeyedArchives(&self) -> Result<Vec<ResourceRecord>>
	{
		let keyPath = self.root.join("chitin.key");
		if !keyPath.is_file()
		{
			return Ok(Vec::new());
		}

		let keyBytes = std::fs::read(&keyPath)?;
		let mut keyCursor = std::io::Cursor::new(keyBytes);
		let key = Key::fromCursor(&mut keyCursor)?;

		let mut dataArchives = Vec::new();
		for entry in &key.dataArchives
		{
			let archivePath = self.root.join(&entry.fileName);
			match std::fs::read(&archivePath)
			{
				Ok(bytes) =>
				{
					let mut cursor = std::io::Cursor::new(bytes.clone());
					match DataArchive::fromCursor(&mut cursor)
					{
						Ok(archive) => dataArchives.push(Some((archive, bytes))),
						Err(error) =>
						{
							warn!(?archivePath, %error, "unreadable data archive");
							dataArchives.push(None);
						},
					}
				},
				Err(_) =>
				{
					warn!(?archivePath, "missing data archive referenced by KEY");
					dataArchives.push(None);
				},
			}
		}

		let dataArchives = std::sync::Arc::new(dataArchives);
		let mut records = Vec::new();
		for resource in key.resources
		{
			let archiveIndex = resource.archiveIndex() as usize;
			let inArchiveIndex = resource.inArchiveIndex() as usize;
			let identity = match Identity::new(resource.name.clone(), resource.resType)
			{
				Ok(identity) => identity,
				Err(error) =>
				{
					warn!(name = %resource.name, %error, "skipping invalid resource name in KEY");
					continue;
				},
			};

			let archives = dataArchives.clone();
			let archiveId = key.dataArchives.get(archiveIndex).map(|entry| entry.fileName.clone()).unwrap_or_default();
			let size = archives
				.get(archiveIndex)
				.and_then(|entry| entry.as_ref())
				.and_then(|(archive, _)| archive.entries.get(inArchiveIndex))
				.map(|entry| entry.size as u64)
				.unwrap_or(0);

			let loader = std::sync::Arc::new(move || -> Result<Vec<u8>> {
				let Some((archive, bytes)) = archives.get(archiveIndex).and_then(|entry| entry.as_ref()) else
				{
					return Err(Error::invalidArchive(None, "data archive unavailable"));
				};
				let mut cursor = std::io::Cursor::new(bytes.clone());
				return archive.get(&mut cursor, inArchiveIndex);
			});

			records.push(ResourceRecord::new(identity, SourceDescriptor::KeyedArchive { archiveId, offset: 0, size }, loader));
		}

		return Ok(records);
	}

	/// *resource(identity) → record* (§4.4): first hit across layers in
	/// priority order.
	pub fn resource(&self, identity: &Identity) -> Option<&ResourceRecord>
	{
		for layer in &self.layers
		{
			if let Some(found) = layer.records.iter().find(|record| record.identity() == identity)
			{
				return Some(found);
			}
		}
		return None;
	}

	/// *resources(identity) → ordered list of records* (§4.4): every hit,
	/// including shadowed ones, in priority order.
	pub fn resources(&self, identity: &Identity) -> Vec<&ResourceRecord>
	{
		return self.layers.iter().flat_map(|layer| layer.records.iter()).filter(|record| record.identity() == identity).collect();
	}

	/// *enumerate(restype) → iterator* (§4.4): every record of the requested
	/// type across all layers in priority order, with shadowing reported
	/// rather than hidden.
	pub fn enumerate(&self, resType: ResourceType) -> Vec<EnumeratedResource<'_>>
	{
		let mut seen = std::collections::HashSet::new();
		let mut out = Vec::new();

		for layer in &self.layers
		{
			for record in &layer.records
			{
				if record.identity().resType() != resType
				{
					continue;
				}
				let key = record.identity().canonical();
				let shadowed = !seen.insert(key);
				out.push(EnumeratedResource { record, shadowed });
			}
		}

		return out;
	}
}

#[cfg(test)]
mod tests
{
	use super::*;

	#[test]
	fn OverrideShadowsKeyedArchiveForSameIdentity()
	{
		let root = std::env::temp_dir().join("odyssey-core-install-test-shadow");
		let overrideDir = root.join("override");
		std::fs::create_dir_all(&overrideDir).unwrap();
		std::fs::write(overrideDir.join("player.utc"), b"override bytes").unwrap();

		let installation = Installation::open(&root).unwrap();
		let identity = Identity::new("player", ResourceType::Utc).unwrap();
		let found = installation.resource(&identity).unwrap();

		assert_eq!(b"override bytes".to_vec(), found.data().unwrap());

		let _ = std::fs::remove_dir_all(&root);
	}

	#[test]
	fn MissingLayersProduceEmptyNotError()
	{
		let root = std::env::temp_dir().join("odyssey-core-install-test-empty");
		let _ = std::fs::remove_dir_all(&root);
		std::fs::create_dir_all(&root).unwrap();

		let installation = Installation::open(&root).unwrap();
		let identity = Identity::new("nothing", ResourceType::Utc).unwrap();
		assert!(installation.resource(&identity).is_none());

		let _ = std::fs::remove_dir_all(&root);
	}
}
