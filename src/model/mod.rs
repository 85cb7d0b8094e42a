#![allow(non_snake_case, non_upper_case_globals)]
#![cfg_attr(debug_assertions, allow(dead_code))]

//! The binary model rewriter: a walker over the engine's MDL/MDX node
//! graph, texture/lightmap renaming, the synthetic-root transform, the
//! vertex-flip operation, and dual-generation (K1/K2) conversion (§4.9).
//!
//! Every field offset named across this module's children is grounded on
//! PyKotor's `pykotor.tools.model`, whose functions this module generalizes
//! from free functions over `bytes`/`bytearray` into typed Rust operations
//! over `&[u8]`/`Vec<u8>`, per the Design Notes' "Offset graphs" guidance:
//! build one canonical `(pointer-location -> pointee-location)` map during
//! a walk, then apply every mutation as a pair of coordinated updates.

pub mod constants;
pub mod convert;
pub mod transform;
pub mod walker;
pub mod mdx;

pub use walker::ModelWalker;
pub use convert::convertGeneration;
pub use transform::transform;
pub use mdx::flip;

use crate::error::{Error, Result};

/// Split a raw MDL file into its 12-byte prelude (4 zero bytes, MDL body
/// size, MDX size) and the node-graph body that follows it (§6 "Model file
/// pair"). Every offset elsewhere in this module is relative to the start
/// of `body`, i.e. minus this fixed 12-byte prelude.
pub fn splitPrelude(mdl: &[u8]) -> Result<(u32, &[u8])>
{
	if mdl.len() < constants::PreludeSize
	{
		return Err(Error::ModelStructureError("MDL shorter than the 12-byte prelude".into()));
	}
	let mdxSize = readU32(mdl, 8)?;
	return Ok((mdxSize, &mdl[constants::PreludeSize..]));
}

/// Reassemble a prelude + body pair into a complete MDL file buffer.
pub fn joinPrelude(mdxSize: u32, body: &[u8]) -> Vec<u8>
{
	let mut out = Vec::with_capacity(constants::PreludeSize + body.len());
	out.extend_from_slice(&[0u8; 4]);
	out.extend_from_slice(&(body.len() as u32).to_le_bytes());
	out.extend_from_slice(&mdxSize.to_le_bytes());
	out.extend_from_slice(body);
	return out;
}

pub(crate) fn boundsError(offset: i64) -> Error
{
	return Error::ModelStructureError(format!("node offset {offset} is out of bounds"));
}

/// Breadth-first node offsets reachable from `rootOffset` (§4.9 "performs a
/// BFS over the node tree"). Shared by [`walker::ModelWalker`],
/// [`mdx::flip`] and [`convert::convertGeneration`] so the three rewriters
/// agree on traversal order.
pub(crate) fn nodeOffsets(body: &[u8], rootOffset: i64) -> Result<Vec<i64>>
{
	let mut offsets = Vec::new();
	let mut queue = std::collections::VecDeque::new();
	queue.push_back(rootOffset);

	while let Some(nodeOffset) = queue.pop_front()
	{
		offsets.push(nodeOffset);

		let childArrayOffset = readU32(body, nodeOffset + 44)? as i64;
		let childCount = readU32(body, nodeOffset + 48)?;
		for i in 0..childCount
		{
			let childOffset = readU32(body, childArrayOffset + (i as i64) * 4)? as i64;
			queue.push_back(childOffset);
		}
	}

	return Ok(offsets);
}

pub(crate) fn meshNodeOffsets(body: &[u8], rootOffset: i64) -> Result<Vec<i64>>
{
	let mut meshes = Vec::new();
	for nodeOffset in nodeOffsets(body, rootOffset)?
	{
		let nodeType = readU16(body, nodeOffset)?;
		if nodeType & constants::NodeTypeMesh != 0
		{
			meshes.push(nodeOffset);
		}
	}
	return Ok(meshes);
}

pub(crate) fn readU16(buf: &[u8], offset: i64) -> Result<u16>
{
	if offset < 0
	{
		return Err(boundsError(offset));
	}
	let start = offset as usize;
	let bytes = buf.get(start..start + 2).ok_or_else(|| boundsError(offset))?;
	return Ok(u16::from_le_bytes([bytes[0], bytes[1]]));
}

pub(crate) fn readU32(buf: &[u8], offset: i64) -> Result<u32>
{
	if offset < 0
	{
		return Err(boundsError(offset));
	}
	let start = offset as usize;
	let bytes = buf.get(start..start + 4).ok_or_else(|| boundsError(offset))?;
	return Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]));
}

pub(crate) fn readF32(buf: &[u8], offset: i64) -> Result<f32>
{
	return Ok(f32::from_bits(readU32(buf, offset)?));
}

pub(crate) fn writeU16(buf: &mut [u8], offset: i64, value: u16) -> Result<()>
{
	let start = offset as usize;
	let slot = buf.get_mut(start..start + 2).ok_or_else(|| boundsError(offset))?;
	slot.copy_from_slice(&value.to_le_bytes());
	return Ok(());
}

pub(crate) fn writeU32(buf: &mut [u8], offset: i64, value: u32) -> Result<()>
{
	let start = offset as usize;
	let slot = buf.get_mut(start..start + 4).ok_or_else(|| boundsError(offset))?;
	slot.copy_from_slice(&value.to_le_bytes());
	return Ok(());
}

pub(crate) fn writeF32(buf: &mut [u8], offset: i64, value: f32) -> Result<()>
{
	return writeU32(buf, offset, value.to_bits());
}

#[cfg(test)]
mod tests
{
	use super::*;

	#[test]
	fn PreludeRoundTrips()
	{
		let body = vec![1u8, 2, 3, 4, 5];
		let mdl = joinPrelude(99, &body);
		let (mdxSize, parsedBody) = splitPrelude(&mdl).unwrap();
		assert_eq!(99, mdxSize);
		assert_eq!(body, parsedBody);
	}

	#[test]
	fn ReadWriteU32RoundTrips()
	{
		let mut buf = vec![0u8; 8];
		writeU32(&mut buf, 2, 0xdead_beef).unwrap();
		assert_eq!(0xdead_beef, readU32(&buf, 2).unwrap());
	}
}
