//! Vertex-flip operation (§4.9 `flip`).
//!
//! Grounded on PyKotor's `pykotor.tools.model.flip`: walk every node once to
//! collect every MDL-resident vertex-shaped field (node positions, position
//! controller keyframes, mesh vertex arrays) and every MDX-resident stream
//! (vertex positions, normals) together with their stride/offset, negate the
//! requested axis on each, and — for an odd flip (`flip_x != flip_y`) —
//! reverse triangle winding in both the elements array and the face table so
//! the mesh doesn't turn inside out.

use crate::error::Result;
use crate::model::constants::*;
use crate::model::{joinPrelude, nodeOffsets, readF32, readU16, readU32, splitPrelude, writeF32, writeU16};

struct VertexRun
{
	count: u32,
	offset: i64,
	stride: i64,
	position: i64,
}

/// `flip(flip-x, flip-y)` (§4.9, §8 "flip(true, true) ∘ flip(true, true) ==
/// identity"). Returns the rewritten `(mdl, mdx)` pair; if neither axis is
/// requested the inputs are returned unchanged, matching the reference's
/// early-out.
pub fn flip(mdl: &[u8], mdx: &[u8], flipX: bool, flipY: bool) -> Result<(Vec<u8>, Vec<u8>)>
{
	if !flipX && !flipY
	{
		return Ok((mdl.to_vec(), mdx.to_vec()));
	}

	let (mdxSize, original) = splitPrelude(mdl)?;
	let mut body = original.to_vec();
	let mut mdxBody = mdx.to_vec();

	let rootOffset = readU32(&body, RootNodeOffsetField)? as i64;

	let mut mdlVertexRuns: Vec<(u32, i64)> = Vec::new();
	let mut mdxVertexRuns: Vec<VertexRun> = Vec::new();
	let mut mdxNormalRuns: Vec<VertexRun> = Vec::new();
	let mut elementsOffsets: Vec<(u32, i64)> = Vec::new();
	let mut facesOffsets: Vec<(u32, i64)> = Vec::new();

	for nodeOffset in nodeOffsets(&body, rootOffset)?
	{
		mdlVertexRuns.push((1, nodeOffset + 16));

		let controllersOffset = readU32(&body, nodeOffset + 56)? as i64;
		let controllersCount = readU32(&body, nodeOffset + 60)?;
		let controllerDataOffset = readU32(&body, nodeOffset + 68)? as i64;

		for i in 0..controllersCount as i64
		{
			let entry = controllersOffset + i * ControllerEntrySize;
			let controllerType = readU32(&body, entry)?;
			if controllerType == PositionControllerType
			{
				let dataOffset = readU16(&body, entry + 10)? as i64;
				mdlVertexRuns.push((1, controllerDataOffset + dataOffset * 4));
			}
		}

		let nodeType = readU16(&body, nodeOffset)?;
		if nodeType & NodeTypeMesh != 0
		{
			let meshStart = nodeOffset + NodeHeaderSize;

			let fp = readU32(&body, meshStart + MeshFunctionPointerField)?;
			let tsl = !matches!(fp, MeshFp0K1 | SkinFp0K1 | DanglyFp0K2 | AabbFp0K1 | SaberFp0K1);

			let facesOffset = readU32(&body, meshStart + MeshFacesOffsetField)? as i64;
			let facesCount = readU32(&body, meshStart + MeshFacesCountField)?;
			facesOffsets.push((facesCount, facesOffset));

			let elementsPointerOffset = readU32(&body, meshStart + MeshElementsPointerField)? as i64;
			let elementsOffset = readU32(&body, elementsPointerOffset)? as i64;
			elementsOffsets.push((facesCount, elementsOffset));

			let vertexCount = readU16(&body, meshStart + MeshVertexCountField)? as u32;
			let vertexArrayField = if tsl { MeshVertexArrayFieldK2 } else { MeshVertexArrayFieldK1 };
			let vertexOffset = readU32(&body, meshStart + vertexArrayField)? as i64;
			mdlVertexRuns.push((vertexCount, vertexOffset));

			let mdxStride = readU32(&body, meshStart + MeshMdxStrideField)? as i64;
			let mdxOffsetPos = readU32(&body, meshStart + MeshMdxVertexOffsetField)? as i64;
			let mdxOffsetNorm = readU32(&body, meshStart + MeshMdxNormalOffsetField)? as i64;
			let mdxDataField = if tsl { MeshMdxDataOffsetFieldK2 } else { MeshMdxDataOffsetFieldK1 };
			let mdxStart = readU32(&body, meshStart + mdxDataField)? as i64;

			mdxVertexRuns.push(VertexRun { count: vertexCount, offset: mdxStart, stride: mdxStride, position: mdxOffsetPos });
			mdxNormalRuns.push(VertexRun { count: vertexCount, offset: mdxStart, stride: mdxStride, position: mdxOffsetNorm });
		}
	}

	// An odd flip mirrors the mesh, so every triangle's winding must reverse
	// to keep front faces front-facing (§4.9 "reverse triangle winding").
	if flipX != flipY
	{
		for &(count, startOffset) in &elementsOffsets
		{
			for i in 0..count as i64
			{
				reverseWinding(&mut body, startOffset + i * 6, 2)?;
			}
		}
		for &(count, startOffset) in &facesOffsets
		{
			for i in 0..count as i64
			{
				reverseWinding(&mut body, startOffset + i * FaceRecordSize + FaceVertexIndicesOffset, 2)?;
			}
		}
	}

	for &(count, startOffset) in &mdlVertexRuns
	{
		for i in 0..count as i64
		{
			let offset = startOffset + i * 12;
			if flipX
			{
				let x = readF32(&body, offset)?;
				writeF32(&mut body, offset, -x)?;
			}
			if flipY
			{
				let y = readF32(&body, offset + 4)?;
				writeF32(&mut body, offset + 4, -y)?;
			}
		}
	}

	for run in &mdxVertexRuns
	{
		negateMdxAxes(&mut mdxBody, run, flipX, flipY)?;
	}
	for run in &mdxNormalRuns
	{
		negateMdxAxes(&mut mdxBody, run, flipX, flipY)?;
	}

	return Ok((joinPrelude(mdxSize, &body), mdxBody));
}

/// Swap the last two u16s of a 3-index run (reversing `(v1, v2, v3)` into
/// `(v1, v3, v2)`), matching `tools/model.py::flip`'s winding-reversal loop.
fn reverseWinding(buf: &mut [u8], offset: i64, _width: i64) -> Result<()>
{
	let v2 = readU16(buf, offset + 2)?;
	let v3 = readU16(buf, offset + 4)?;
	writeU16(buf, offset + 2, v3)?;
	writeU16(buf, offset + 4, v2)?;
	return Ok(());
}

fn negateMdxAxes(mdx: &mut [u8], run: &VertexRun, flipX: bool, flipY: bool) -> Result<()>
{
	for i in 0..run.count as i64
	{
		let offset = run.offset + i * run.stride + run.position;
		if flipX
		{
			let x = readF32(mdx, offset)?;
			writeF32(mdx, offset, -x)?;
		}
		if flipY
		{
			let y = readF32(mdx, offset + 4)?;
			writeF32(mdx, offset + 4, -y)?;
		}
	}
	return Ok(());
}

#[cfg(test)]
mod tests
{
	use super::*;
	use crate::model::writeU32;

	/// A minimal one-mesh-node model with a single triangle: root at a fixed
	/// offset, mesh node as its only child, MDX stream holding one vertex.
	fn buildFlippableModel() -> (Vec<u8>, Vec<u8>)
	{
		let headerSize = 200i64;
		let rootOffset = headerSize;
		let rootSize = NodeHeaderSize;
		let childArrayOffset = rootOffset + rootSize;
		let meshOffset = childArrayOffset + 4;
		let meshHeaderSize = MeshHeaderSizeK1 + 16;

		let mut body = vec![0u8; headerSize as usize];
		writeU32(&mut body, RootNodeOffsetField, rootOffset as u32).unwrap();

		body.resize(rootOffset as usize + rootSize as usize, 0);
		writeU32(&mut body, rootOffset + 44, childArrayOffset as u32).unwrap();
		writeU32(&mut body, rootOffset + 48, 1).unwrap();

		body.resize(childArrayOffset as usize + 4, 0);
		writeU32(&mut body, childArrayOffset, meshOffset as u32).unwrap();

		body.resize(meshOffset as usize + meshHeaderSize as usize, 0);
		writeU16(&mut body, meshOffset, NodeTypeMesh).unwrap();
		// No children, no controllers on the mesh node itself.
		writeU32(&mut body, meshOffset + 44, (meshOffset + meshHeaderSize) as u32).unwrap();
		writeU32(&mut body, meshOffset + 48, 0).unwrap();
		writeU32(&mut body, meshOffset + 60, 0).unwrap();

		let meshStart = meshOffset + NodeHeaderSize;
		writeU32(&mut body, meshStart + MeshFunctionPointerField, MeshFp0K1).unwrap();

		let facesOffset = meshStart + MeshHeaderSizeK1;
		body.resize(facesOffset as usize + FaceRecordSize as usize, 0);
		writeU32(&mut body, meshStart + MeshFacesOffsetField, facesOffset as u32).unwrap();
		writeU32(&mut body, meshStart + MeshFacesCountField, 1).unwrap();
		writeU16(&mut body, facesOffset + FaceVertexIndicesOffset, 0).unwrap();
		writeU16(&mut body, facesOffset + FaceVertexIndicesOffset + 2, 1).unwrap();
		writeU16(&mut body, facesOffset + FaceVertexIndicesOffset + 4, 2).unwrap();

		let elementsPointerOffset = facesOffset + FaceRecordSize;
		let elementsOffset = elementsPointerOffset + 4;
		body.resize(elementsOffset as usize + 6, 0);
		writeU32(&mut body, meshStart + MeshElementsPointerField, elementsPointerOffset as u32).unwrap();
		writeU32(&mut body, elementsPointerOffset, elementsOffset as u32).unwrap();
		writeU16(&mut body, elementsOffset, 0).unwrap();
		writeU16(&mut body, elementsOffset + 2, 1).unwrap();
		writeU16(&mut body, elementsOffset + 4, 2).unwrap();

		let vertexArrayOffset = elementsOffset + 6;
		body.resize(vertexArrayOffset as usize + 12, 0);
		writeU16(&mut body, meshStart + MeshVertexCountField, 1).unwrap();
		writeU32(&mut body, meshStart + MeshVertexArrayFieldK1, vertexArrayOffset as u32).unwrap();
		writeF32(&mut body, vertexArrayOffset, 1.0).unwrap();
		writeF32(&mut body, vertexArrayOffset + 4, 2.0).unwrap();
		writeF32(&mut body, vertexArrayOffset + 8, 3.0).unwrap();

		writeU32(&mut body, meshStart + MeshMdxStrideField, 24).unwrap();
		writeU32(&mut body, meshStart + MeshMdxVertexOffsetField, 0).unwrap();
		writeU32(&mut body, meshStart + MeshMdxNormalOffsetField, 12).unwrap();
		writeU32(&mut body, meshStart + MeshMdxDataOffsetFieldK1, 0).unwrap();

		let mut mdx = vec![0u8; 24];
		mdx[0..4].copy_from_slice(&1.0f32.to_le_bytes());
		mdx[4..8].copy_from_slice(&2.0f32.to_le_bytes());
		mdx[8..12].copy_from_slice(&3.0f32.to_le_bytes());
		mdx[12..16].copy_from_slice(&0.0f32.to_le_bytes());
		mdx[16..20].copy_from_slice(&0.0f32.to_le_bytes());
		mdx[20..24].copy_from_slice(&1.0f32.to_le_bytes());

		(joinPrelude(24, &body), mdx)
	}

	#[test]
	fn FlipNegatesMdlAndMdxVertexPositions()
	{
		let (mdl, mdx) = buildFlippableModel();
		let (flippedMdl, flippedMdx) = flip(&mdl, &mdx, true, true).unwrap();

		let (_, body) = splitPrelude(&flippedMdl).unwrap();
		let rootOffset = readU32(&body, RootNodeOffsetField).unwrap() as i64;
		let childArrayOffset = readU32(&body, rootOffset + 44).unwrap() as i64;
		let meshOffset = readU32(&body, childArrayOffset).unwrap() as i64;
		let meshStart = meshOffset + NodeHeaderSize;
		let vertexOffset = readU32(&body, meshStart + MeshVertexArrayFieldK1).unwrap() as i64;

		assert_eq!(-1.0, readF32(&body, vertexOffset).unwrap());
		assert_eq!(-2.0, readF32(&body, vertexOffset + 4).unwrap());
		assert_eq!(3.0, readF32(&body, vertexOffset + 8).unwrap());

		assert_eq!(-1.0, f32::from_le_bytes(flippedMdx[0..4].try_into().unwrap()));
		assert_eq!(-2.0, f32::from_le_bytes(flippedMdx[4..8].try_into().unwrap()));
	}

	#[test]
	fn DoubleFlipIsIdentity()
	{
		let (mdl, mdx) = buildFlippableModel();
		let (onceMdl, onceMdx) = flip(&mdl, &mdx, true, true).unwrap();
		let (twiceMdl, twiceMdx) = flip(&onceMdl, &onceMdx, true, true).unwrap();

		assert_eq!(mdl, twiceMdl);
		assert_eq!(mdx, twiceMdx);
	}

	#[test]
	fn OddFlipReversesTriangleWinding()
	{
		let (mdl, mdx) = buildFlippableModel();
		let (flippedMdl, _) = flip(&mdl, &mdx, true, false).unwrap();

		let (_, body) = splitPrelude(&flippedMdl).unwrap();
		let rootOffset = readU32(&body, RootNodeOffsetField).unwrap() as i64;
		let childArrayOffset = readU32(&body, rootOffset + 44).unwrap() as i64;
		let meshOffset = readU32(&body, childArrayOffset).unwrap() as i64;
		let meshStart = meshOffset + NodeHeaderSize;
		let facesOffset = readU32(&body, meshStart + MeshFacesOffsetField).unwrap() as i64;

		let v1 = readU16(&body, facesOffset + FaceVertexIndicesOffset).unwrap();
		let v2 = readU16(&body, facesOffset + FaceVertexIndicesOffset + 2).unwrap();
		let v3 = readU16(&body, facesOffset + FaceVertexIndicesOffset + 4).unwrap();
		assert_eq!((0, 2, 1), (v1, v2, v3));
	}

	#[test]
	fn NoFlipReturnsInputUnchanged()
	{
		let (mdl, mdx) = buildFlippableModel();
		let (sameMdl, sameMdx) = flip(&mdl, &mdx, false, false).unwrap();
		assert_eq!(mdl, sameMdl);
		assert_eq!(mdx, sameMdx);
	}
}
