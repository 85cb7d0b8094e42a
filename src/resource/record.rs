//! Resource records (§3 "Resource record").
//!
//! Grounded on PyKotor's `pykotor.extract.file.FileResource`: a record knows
//! where its bytes live but does not read them at construction, caches its
//! sha256 only once bytes have actually been pulled (`get_sha256_hash`), and
//! defines equality by that cached hash when available, falling back to
//! identity otherwise (`FileResource.__eq__`). A plain resource manager that
//! reads straight into owned structs has no equivalent type, so this
//! byte-locator abstraction is new, built in the same
//! `RefCell`-for-interior-mutable-cache idiom (`RefCell<HashMap<..>>`) this
//! crate's archive readers already use for their own caches.

use std::cell::RefCell;
use std::path::PathBuf;
use std::sync::Arc;

use sha2::{Digest, Sha256};

use crate::error::Result;
use crate::resource::identity::Identity;

/// Where a resource's bytes physically live (§3 "source-descriptor").
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum SourceDescriptor
{
	/// A raw file on disk (override directory entry).
	FileSystem(PathBuf),
	/// An entry inside a self-contained ERF/RIM capsule.
	Capsule { path: PathBuf, offset: u64, size: u64 },
	/// An entry inside a keyed archive's data archive (BIF/BZF).
	KeyedArchive { archiveId: String, offset: u64, size: u64 },
}

type Loader = Arc<dyn Fn() -> Result<Vec<u8>> + Send + Sync>;

/// A lazily-read resource: identity plus where to find it plus (once read)
/// a cached content hash. Constructing one never touches the filesystem.
#[derive(Clone)]
pub struct ResourceRecord
{
	identity: Identity,
	source: SourceDescriptor,
	loader: Loader,
	hash: Arc<RefCell<Option<[u8; 32]>>>,
}

impl ResourceRecord
{
	pub fn new(identity: Identity, source: SourceDescriptor, loader: Loader) -> Self
	{
		return Self { identity, source, loader, hash: Arc::new(RefCell::new(None)) };
	}

	/// Convenience constructor for override-directory entries: reads the
	/// whole file from disk on demand.
	pub fn fromFile(identity: Identity, path: PathBuf) -> Self
	{
		let readPath = path.clone();
		let loader: Loader = Arc::new(move || Ok(std::fs::read(&readPath)?));
		return Self::new(identity, SourceDescriptor::FileSystem(path), loader);
	}

	pub fn identity(&self) -> &Identity
	{
		return &self.identity;
	}

	pub fn source(&self) -> &SourceDescriptor
	{
		return &self.source;
	}

	/// Produce the resource's bytes. Not cached itself — only the content
	/// hash is cached (§3: "may be cached (by 256-bit content hash) for
	/// later equality comparisons").
	pub fn data(&self) -> Result<Vec<u8>>
	{
		return (self.loader)();
	}

	/// The 256-bit content hash, computed and cached on first call.
	pub fn contentHash(&self) -> Result<[u8; 32]>
	{
		if let Some(cached) = *self.hash.borrow()
		{
			return Ok(cached);
		}

		let bytes = self.data()?;
		let digest: [u8; 32] = Sha256::digest(&bytes).into();
		*self.hash.borrow_mut() = Some(digest);

		return Ok(digest);
	}

	/// Equality is by content hash when both records' bytes are readable,
	/// falling back to identity equality when either read fails (§3).
	pub fn contentEquals(&self, other: &Self) -> bool
	{
		match (self.contentHash(), other.contentHash())
		{
			(Ok(left), Ok(right)) => left == right,
			_ => self.identity == other.identity,
		}
	}
}

impl std::fmt::Debug for ResourceRecord
{
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result
	{
		return f
			.debug_struct("ResourceRecord")
			.field("identity", &self.identity)
			.field("source", &self.source)
			.finish();
	}
}
