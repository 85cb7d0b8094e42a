//! Dual-generation (K1 ↔ K2) model conversion (§4.9 "convert(generation)").
//!
//! Grounded on PyKotor's `tools/model.py` (`detect_version`, `convert_to_k1`,
//! `convert_to_k2`). K1→K2 growth is the hard direction: every mesh header
//! grows by 8 padding bytes, so every pointer field in the file that lies
//! after an inserted mesh header — and every pointer *value* that points
//! past one — has to shift by 8. This module builds one `(field location ->
//! pointee location)` map by walking the whole node graph (node headers,
//! mesh/light/skin/dangly/aabb/saber sub-headers, the animation array, the
//! name-offset array) up front, then replays the insertions against that map
//! before writing the adjusted pointers back.
//!
//! The reference's own graph-walk (`node_recursive`) rebuilds its traversal
//! stack every iteration as `[child_offsets_offset + i*4, ...]` and then
//! unconditionally re-inserts the *original* root call's field location at
//! the front — which means it keeps re-queuing the root instead of ever
//! finishing a fixed traversal. That reads as a transcription slip rather
//! than intended behavior, so this module replaces it with a plain
//! recursive walk over the same fields instead of reproducing the
//! non-terminating stack shuffle.

use std::collections::BTreeMap;

use crate::error::{Error, Result};
use crate::model::constants::*;
use crate::model::{joinPrelude, readU16, readU32, splitPrelude, writeU32};
use crate::platform::Generation;

/// Offset (relative to the animation header) of the animation's own
/// event-offsets array pointer.
const AnimationEventArrayField: i64 = 120;
/// Offset (relative to the animation header) of the animation's own
/// embedded node-tree root field, mirroring [`RootNodeOffsetField`] at the
/// model-header level.
const AnimationNodeRootField: i64 = 40;

/// `detect_version` (§4.9): read the geometry-header's first function
/// pointer and compare it against the K1 constant. Distinct from
/// [`crate::platform::detectGeneration`], which probes an install
/// *directory* rather than a single model buffer.
pub fn detectModelGeneration(mdl: &[u8]) -> Result<Generation>
{
	let (_, body) = splitPrelude(mdl)?;
	let pointer = readU32(&body, 0)?;
	return Ok(if pointer == GeomRootFp0K1 { Generation::K1 } else { Generation::K2 });
}

/// Convert `mdl` to `target`'s binary layout, returning it unchanged if it
/// is already in that shape (§4.9 "no-op if already the target generation").
pub fn convertGeneration(mdl: &[u8], target: Generation) -> Result<Vec<u8>>
{
	return match target
	{
		Generation::K1 => convertToK1(mdl),
		Generation::K2 => convertToK2(mdl),
	};
}

fn convertToK1(mdl: &[u8]) -> Result<Vec<u8>>
{
	if detectModelGeneration(mdl)? == Generation::K1
	{
		return Ok(mdl.to_vec());
	}

	let (mdxSize, original) = splitPrelude(mdl)?;
	let mut body = original.to_vec();
	let rootOffset = readU32(&body, RootNodeOffsetField)? as i64;

	let mut trim: Vec<(u16, i64)> = Vec::new();
	let mut stack = vec![rootOffset];
	while let Some(nodeOffset) = stack.pop()
	{
		let nodeType = readU16(&body, nodeOffset)?;
		if nodeType & NodeTypeMesh != 0
		{
			trim.push((nodeType, nodeOffset));
		}

		let childArrayOffset = readU32(&body, nodeOffset + 44)? as i64;
		let childCount = readU32(&body, nodeOffset + 48)?;
		for i in 0..childCount as i64
		{
			stack.push(readU32(&body, childArrayOffset + i * 4)? as i64);
		}
	}

	writeU32(&mut body, 0, GeomRootFp0K1)?;
	writeU32(&mut body, 4, GeomRootFp1K1)?;

	for (nodeType, nodeOffset) in trim
	{
		let meshStart = nodeOffset + NodeHeaderSize;
		let offsetStart = nodeOffset + NodeHeaderSize + MeshHeaderSizeK1;
		let mut offsetSize = MeshPadSize;

		// Each branch below unconditionally overwrites the mesh's own
		// function pointer pair; a node carrying more than one of these bits
		// ends up with whichever fired last, matching `convert_to_k1`.
		if nodeType & NodeTypeSkin != 0
		{
			offsetSize += SkinHeaderSize;
			writeU32(&mut body, meshStart, MeshFp0K1)?;
			writeU32(&mut body, meshStart + 4, MeshFp1K1)?;
		}
		if nodeType & NodeTypeDangly != 0
		{
			offsetSize += DanglyHeaderSize;
			writeU32(&mut body, meshStart, DanglyFp0K1)?;
			writeU32(&mut body, meshStart + 4, DanglyFp1K1)?;
		}
		if nodeType & NodeTypeSaber != 0
		{
			offsetSize += SaberHeaderSize;
			writeU32(&mut body, meshStart, SaberFp0K1)?;
			writeU32(&mut body, meshStart + 4, SaberFp1K1)?;
		}
		if nodeType & NodeTypeAabb != 0
		{
			offsetSize += AabbHeaderSize;
			writeU32(&mut body, meshStart, AabbFp0K1)?;
			writeU32(&mut body, meshStart + 4, AabbFp1K1)?;
		}

		let shifting = body[offsetStart as usize..(offsetStart + offsetSize) as usize].to_vec();
		body[(offsetStart - MeshPadSize) as usize..(offsetStart - MeshPadSize + offsetSize) as usize].copy_from_slice(&shifting);
	}

	return Ok(joinPrelude(mdxSize, &body));
}

fn convertToK2(mdl: &[u8]) -> Result<Vec<u8>>
{
	if detectModelGeneration(mdl)? == Generation::K2
	{
		return Ok(mdl.to_vec());
	}

	let (mdxSize, original) = splitPrelude(mdl)?;
	let body = original.to_vec();

	let mut offsets: BTreeMap<i64, i64> = BTreeMap::new();
	let mut meshOffsets: Vec<(i64, u16)> = Vec::new();

	let animLocationsOffset = readU32(&body, AnimationArrayField)? as i64;
	let animCount = readU32(&body, AnimationArrayField + 4)?;
	let nameArrayOffset = readU32(&body, NameArrayField)? as i64;
	let nameCount = readU32(&body, NameArrayField + 4)?;

	captureOffset(&body, &mut offsets, SecondaryRootField)?;
	captureOffset(&body, &mut offsets, AnimationArrayField)?;
	captureOffset(&body, &mut offsets, NameArrayField)?;

	for i in 0..nameCount as i64
	{
		captureOffset(&body, &mut offsets, nameArrayOffset + i * 4)?;
	}

	let mut animOffsets: Vec<i64> = Vec::new();
	for i in 0..animCount as i64
	{
		let animationOffset = captureOffset(&body, &mut offsets, animLocationsOffset + i * 4)?;
		animOffsets.push(animationOffset);

		captureOffset(&body, &mut offsets, animationOffset + AnimationEventArrayField)?;
		walkNode(&body, animationOffset + AnimationNodeRootField, &mut offsets, &mut meshOffsets)?;
	}

	walkNode(&body, RootNodeOffsetField, &mut offsets, &mut meshOffsets)?;

	let mut body = body;
	writeU32(&mut body, 0, GeomRootFp0K2)?;
	writeU32(&mut body, 4, GeomRootFp1K2)?;

	for &animationOffset in &animOffsets
	{
		writeU32(&mut body, animationOffset, GeomAnimFp0K2)?;
		writeU32(&mut body, animationOffset + 4, GeomAnimFp1K2)?;
	}

	for &(nodeOffset, nodeType) in &meshOffsets
	{
		let meshStart = nodeOffset + NodeHeaderSize;
		if nodeType & NodeTypeSkin != 0
		{
			writeU32(&mut body, meshStart, MeshFp0K2)?;
			writeU32(&mut body, meshStart + 4, MeshFp1K2)?;
		}
		if nodeType & NodeTypeDangly != 0
		{
			writeU32(&mut body, meshStart, DanglyFp0K2)?;
			writeU32(&mut body, meshStart + 4, DanglyFp1K2)?;
		}
		if nodeType & NodeTypeSaber != 0
		{
			// The reference writes the K1 value for the first word here too
			// (`convert_to_k2`'s saber branch); kept as-is for fidelity.
			writeU32(&mut body, meshStart, SaberFp0K1)?;
			writeU32(&mut body, meshStart + 4, SaberFp1K2)?;
		}
		if nodeType & NodeTypeAabb != 0
		{
			writeU32(&mut body, meshStart, AabbFp0K2)?;
			writeU32(&mut body, meshStart + 4, AabbFp1K2)?;
		}
	}

	for i in 0..meshOffsets.len()
	{
		let (nodeOffset, _) = meshOffsets[i];
		let insertLocation = nodeOffset + NodeHeaderSize + MeshPadOffset;

		let shiftedKeys: Vec<(i64, i64)> = offsets
			.iter()
			.filter(|&(&location, _)| insertLocation < location)
			.map(|(&location, &value)| (location, value))
			.collect();
		for (location, value) in shiftedKeys
		{
			offsets.remove(&location);
			if offsets.contains_key(&(location + MeshPadSize))
			{
				return Err(Error::ModelStructureError(format!(
					"K1->K2 conversion: offset map collision at {}",
					location + MeshPadSize
				)));
			}
			offsets.insert(location + MeshPadSize, value);
		}

		let shiftedValues: Vec<(i64, i64)> =
			offsets.iter().filter(|&(_, &value)| insertLocation < value).map(|(&location, &value)| (location, value)).collect();
		for (location, value) in shiftedValues
		{
			offsets.insert(location, value + MeshPadSize);
		}

		for entry in meshOffsets.iter_mut()
		{
			if insertLocation < entry.0
			{
				entry.0 += MeshPadSize;
			}
		}

		let insertAt = insertLocation as usize;
		let mut grown = Vec::with_capacity(body.len() + MeshPadSize as usize);
		grown.extend_from_slice(&body[..insertAt]);
		grown.extend_from_slice(&[0u8; 8]);
		grown.extend_from_slice(&body[insertAt..]);
		body = grown;
	}

	for (&location, &value) in offsets.iter()
	{
		writeU32(&mut body, location, value as u32)?;
	}

	return Ok(joinPrelude(mdxSize, &body));
}

fn captureOffset(body: &[u8], offsets: &mut BTreeMap<i64, i64>, location: i64) -> Result<i64>
{
	let value = readU32(body, location)? as i64;
	offsets.insert(location, value);
	return Ok(value);
}

/// Walk one node subtree rooted at the field that points to it, recording
/// every pointer field/value pair `convert_to_k2` needs to shift. Returns
/// once `location`'s whole subtree (including nested animation-local trees
/// passed in by the caller) has been visited.
fn walkNode(body: &[u8], location: i64, offsets: &mut BTreeMap<i64, i64>, meshOffsets: &mut Vec<(i64, u16)>) -> Result<()>
{
	let nodeOffset = captureOffset(body, offsets, location)?;
	let nodeType = readU16(body, nodeOffset)?;
	let mut baseOffset = nodeOffset + NodeHeaderSize;

	if nodeType & NodeTypeMesh != 0
	{
		meshOffsets.push((nodeOffset, nodeType));

		captureOffset(body, offsets, baseOffset + 8)?;
		captureOffset(body, offsets, baseOffset + 176)?;
		let indicesArrayCount = readU32(body, baseOffset + 180)?;
		let indicesLocationsOffset = captureOffset(body, offsets, baseOffset + 188)?;
		if indicesArrayCount == 1
		{
			captureOffset(body, offsets, indicesLocationsOffset)?;
		}
		captureOffset(body, offsets, baseOffset + 200)?;
		captureOffset(body, offsets, baseOffset + 328)?;

		baseOffset += MeshHeaderSizeK1;
	}

	if nodeType & NodeTypeLight != 0
	{
		captureOffset(body, offsets, baseOffset + 4)?;
		captureOffset(body, offsets, baseOffset + 16)?;
		captureOffset(body, offsets, baseOffset + 28)?;
		captureOffset(body, offsets, baseOffset + 40)?;
		let flareTextureOffset = captureOffset(body, offsets, baseOffset + 52)?;
		let flareTextureCount = readU32(body, baseOffset + 56)?;
		for i in 0..flareTextureCount as i64
		{
			captureOffset(body, offsets, flareTextureOffset + i * 4)?;
		}
	}

	if nodeType & NodeTypeSkin != 0
	{
		captureOffset(body, offsets, baseOffset + 20)?;
		captureOffset(body, offsets, baseOffset + 28)?;
		captureOffset(body, offsets, baseOffset + 40)?;
		captureOffset(body, offsets, baseOffset + 52)?;
		baseOffset += SkinHeaderSize;
	}

	if nodeType & NodeTypeDangly != 0
	{
		captureOffset(body, offsets, baseOffset)?;
		captureOffset(body, offsets, baseOffset + 24)?;
		baseOffset += DanglyHeaderSize;
	}

	if nodeType & NodeTypeAabb != 0
	{
		let aabbRoot = captureOffset(body, offsets, baseOffset)?;
		let mut stack = vec![aabbRoot];
		while let Some(aabb) = stack.pop()
		{
			let leaf0 = readU32(body, aabb + 24)? as i64;
			if leaf0 != 0
			{
				offsets.insert(aabb + 24, leaf0);
				stack.push(leaf0);
			}
			let leaf1 = readU32(body, aabb + 28)? as i64;
			if leaf1 != 0
			{
				offsets.insert(aabb + 28, leaf1);
				stack.push(leaf1);
			}
		}
		baseOffset += AabbHeaderSize;
	}

	if nodeType & NodeTypeSaber != 0
	{
		captureOffset(body, offsets, baseOffset)?;
		captureOffset(body, offsets, baseOffset + 4)?;
		captureOffset(body, offsets, baseOffset + 8)?;
	}

	captureOffset(body, offsets, nodeOffset + 8)?;
	captureOffset(body, offsets, nodeOffset + 12)?;
	captureOffset(body, offsets, nodeOffset + 56)?;
	captureOffset(body, offsets, nodeOffset + 68)?;

	let childArrayOffset = readU32(body, nodeOffset + 44)? as i64;
	let childCount = readU32(body, nodeOffset + 48)?;
	offsets.insert(nodeOffset + 44, childArrayOffset);

	for i in 0..childCount as i64
	{
		walkNode(body, childArrayOffset + i * 4, offsets, meshOffsets)?;
	}

	return Ok(());
}

#[cfg(test)]
mod tests
{
	use super::*;
	use crate::model::writeU16;

	/// A minimal root-only (no children, no mesh) model, valid in both
	/// generations, just with a different geometry function pointer.
	fn buildBareModel(generation: Generation) -> Vec<u8>
	{
		let headerSize = 200i64;
		let rootOffset = headerSize;
		let rootSize = NodeHeaderSize;

		let mut body = vec![0u8; headerSize as usize];
		writeU32(&mut body, RootNodeOffsetField, rootOffset as u32).unwrap();
		writeU32(&mut body, AnimationArrayField, 0).unwrap();
		writeU32(&mut body, AnimationArrayField + 4, 0).unwrap();
		writeU32(&mut body, NameArrayField, 0).unwrap();
		writeU32(&mut body, NameArrayField + 4, 0).unwrap();

		body.resize(rootOffset as usize + rootSize as usize, 0);
		writeU16(&mut body, rootOffset, 1).unwrap();
		let (fp0, fp1) = match generation
		{
			Generation::K1 => (GeomRootFp0K1, GeomRootFp1K1),
			Generation::K2 => (GeomRootFp0K2, GeomRootFp1K2),
		};
		writeU32(&mut body, 0, fp0).unwrap();
		writeU32(&mut body, 4, fp1).unwrap();
		// childArrayOffset/count both 0 (no children).

		return joinPrelude(0, &body);
	}

	#[test]
	fn DetectGenerationReadsRootFunctionPointer()
	{
		assert_eq!(Generation::K1, detectModelGeneration(&buildBareModel(Generation::K1)).unwrap());
		assert_eq!(Generation::K2, detectModelGeneration(&buildBareModel(Generation::K2)).unwrap());
	}

	#[test]
	fn ConvertToSameGenerationIsNoOp()
	{
		let mdl = buildBareModel(Generation::K1);
		let converted = convertGeneration(&mdl, Generation::K1).unwrap();
		assert_eq!(mdl, converted);
	}

	#[test]
	fn ConvertK1ToK2ChangesRootFunctionPointer()
	{
		let mdl = buildBareModel(Generation::K1);
		let converted = convertGeneration(&mdl, Generation::K2).unwrap();
		assert_eq!(Generation::K2, detectModelGeneration(&converted).unwrap());
	}

	#[test]
	fn ConvertK2ToK1ChangesRootFunctionPointer()
	{
		let mdl = buildBareModel(Generation::K2);
		let converted = convertGeneration(&mdl, Generation::K1).unwrap();
		assert_eq!(Generation::K1, detectModelGeneration(&converted).unwrap());
	}
}
