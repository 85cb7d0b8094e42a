//! Shared ERF/RIM capsule model (§4.3).
//!
//! Grounded on PyKotor's `pykotor.resource.bioware_archive.BiowareArchive`:
//! an ordered list of resources plus a canonical-identity → index map,
//! `set` replaces in place if present and otherwise appends,
//! `remove` preserves the relative order of what's left, and equality is set
//! equality over `(identity, content-hash)` rather than positional order.
//! ERF and RIM ([`crate::archive::erf`], [`crate::archive::rim`]) both wrap
//! this index and differ only in their on-disk header layout.

use std::collections::HashMap;

use sha2::{Digest, Sha256};

use crate::resource::Identity;

/// One resource stored inside a capsule: an identity plus its owned bytes.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CapsuleResource
{
	pub identity: Identity,
	pub data: Vec<u8>,
}

/// Insertion-ordered resource list plus a canonical-identity lookup index,
/// shared by the ERF and RIM readers/writers.
#[derive(Clone, Debug, Default)]
pub struct CapsuleIndex
{
	resources: Vec<CapsuleResource>,
	indexByIdentity: HashMap<String, usize>,
}

impl CapsuleIndex
{
	pub fn new() -> Self
	{
		return Self::default();
	}

	pub fn fromResources(resources: Vec<CapsuleResource>) -> Self
	{
		let mut index = Self::new();
		for resource in resources
		{
			index.set(resource.identity, resource.data);
		}
		return index;
	}

	pub fn len(&self) -> usize
	{
		return self.resources.len();
	}

	pub fn isEmpty(&self) -> bool
	{
		return self.resources.is_empty();
	}

	/// *get(identity) → bytes*.
	pub fn get(&self, identity: &Identity) -> Option<&[u8]>
	{
		let index = *self.indexByIdentity.get(&identity.canonical())?;
		return Some(self.resources[index].data.as_slice());
	}

	/// *iter → sequence of (identity, offset, size)*, here yielded as
	/// `(identity, data)` since offsets are an on-disk concern owned by the
	/// format-specific writer, not this in-memory index. Order is insertion
	/// order, matching the on-disk order an ERF/RIM reader would see.
	pub fn iter(&self) -> impl Iterator<Item = &CapsuleResource>
	{
		return self.resources.iter();
	}

	/// *set(identity, bytes)*: replace in place if present, append otherwise.
	pub fn set(&mut self, identity: Identity, data: Vec<u8>)
	{
		let key = identity.canonical();
		match self.indexByIdentity.get(&key)
		{
			Some(&index) => self.resources[index].data = data,
			None =>
			{
				self.indexByIdentity.insert(key, self.resources.len());
				self.resources.push(CapsuleResource { identity, data });
			},
		}
	}

	/// *remove(identity)*: preserves the relative order of the remaining
	/// records.
	pub fn remove(&mut self, identity: &Identity) -> bool
	{
		let key = identity.canonical();
		let Some(index) = self.indexByIdentity.remove(&key) else { return false; };

		self.resources.remove(index);
		for (_, slot) in self.indexByIdentity.iter_mut()
		{
			if *slot > index
			{
				*slot -= 1;
			}
		}

		return true;
	}

	/// Set equality over `(identity, content-hash)` (§4.3).
	pub fn contentEquals(&self, other: &Self) -> bool
	{
		let hashOf = |resource: &CapsuleResource| -> (String, [u8; 32])
		{
			let digest: [u8; 32] = Sha256::digest(&resource.data).into();
			return (resource.identity.canonical(), digest);
		};

		let mut leftSet: Vec<_> = self.resources.iter().map(hashOf).collect();
		let mut rightSet: Vec<_> = other.resources.iter().map(hashOf).collect();
		leftSet.sort();
		rightSet.sort();

		return leftSet == rightSet;
	}
}

#[cfg(test)]
mod tests
{
	use super::*;
	use crate::resource::ResourceType;

	fn identity(name: &str) -> Identity
	{
		return Identity::new(name, ResourceType::Utc).unwrap();
	}

	#[test]
	fn SetAppendsNewAndReplacesExisting()
	{
		let mut index = CapsuleIndex::new();
		index.set(identity("a"), b"1".to_vec());
		index.set(identity("b"), b"2".to_vec());
		index.set(identity("a"), b"updated".to_vec());

		assert_eq!(2, index.len());
		assert_eq!(b"updated".to_vec(), index.get(&identity("a")).unwrap().to_vec());

		let order: Vec<_> = index.iter().map(|r| r.identity.name().to_string()).collect();
		assert_eq!(vec!["a", "b"], order);
	}

	#[test]
	fn RemovePreservesRelativeOrder()
	{
		let mut index = CapsuleIndex::new();
		index.set(identity("a"), b"1".to_vec());
		index.set(identity("b"), b"2".to_vec());
		index.set(identity("c"), b"3".to_vec());

		assert!(index.remove(&identity("b")));

		let order: Vec<_> = index.iter().map(|r| r.identity.name().to_string()).collect();
		assert_eq!(vec!["a", "c"], order);
	}

	#[test]
	fn EmptyCapsuleWritesAsValidZeroResourceIndex()
	{
		let index = CapsuleIndex::new();
		assert!(index.isEmpty());
		assert!(index.contentEquals(&CapsuleIndex::new()));
	}

	#[test]
	fn ContentEqualityIgnoresInsertionOrder()
	{
		let mut first = CapsuleIndex::new();
		first.set(identity("a"), b"1".to_vec());
		first.set(identity("b"), b"2".to_vec());

		let mut second = CapsuleIndex::new();
		second.set(identity("b"), b"2".to_vec());
		second.set(identity("a"), b"1".to_vec());

		assert!(first.contentEquals(&second));
	}
}
