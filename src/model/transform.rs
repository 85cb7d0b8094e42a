//! Synthetic-root wrapping (§4.9 `transform`).
//!
//! Grounded on PyKotor's `pykotor.tools.model.transform`: a new dummy node
//! carrying the requested translation and a pure-Z-axis rotation quaternion
//! is appended to the body, the model header's root-node field is
//! repointed at it, and the previous root becomes its sole child. Two
//! controller entries (position, orientation) are appended alongside it so
//! animation-aware readers see the same transform the fixed header fields
//! carry (§4.9: "whose position and orientation carry the transform").

use crate::error::Result;
use crate::model::constants::*;
use crate::model::{joinPrelude, readU32, splitPrelude, writeU32};

/// Translation + rotation-around-Z applied by wrapping the model's root
/// node inside a new synthetic root (§4.9, §8 "For any transform (Δp, θ)").
///
/// `rotationDegrees` matches the reference's `transform(data, translation,
/// rotation)`, which converts degrees to radians internally.
pub fn transform(mdl: &[u8], translation: (f32, f32, f32), rotationDegrees: f32) -> Result<Vec<u8>>
{
	let (mdxSize, original) = splitPrelude(mdl)?;
	let mut body = original.to_vec();

	let nodeCount = readU32(&body, NodeCountField)?;
	let rootOffset = readU32(&body, RootNodeOffsetField)? as i64;

	let half = rotationDegrees.to_radians() / 2.0;
	let (qx, qy, qz, qw) = (0.0f32, 0.0f32, half.sin(), half.cos());
	let (tx, ty, tz) = translation;

	let childArrayOffset = body.len() as i64;
	body.extend_from_slice(&(rootOffset as u32).to_le_bytes());

	let newNodeOffset = body.len() as i64;
	let controllerOffset = newNodeOffset + NodeHeaderSize;
	let controllerDataOffset = controllerOffset + 32;

	body.resize(body.len() + NodeHeaderSize as usize, 0);
	crate::model::writeU16(&mut body, newNodeOffset, 1)?; // DUMMY node type
	crate::model::writeU16(&mut body, newNodeOffset + 2, (nodeCount + 1) as u16)?;
	crate::model::writeU16(&mut body, newNodeOffset + 4, 1)?; // reuse label index 1
	crate::model::writeU16(&mut body, newNodeOffset + 6, 0)?;
	writeU32(&mut body, newNodeOffset + 8, 0)?;
	writeU32(&mut body, newNodeOffset + 12, 0)?; // no parent: this is now the root
	crate::model::writeF32(&mut body, newNodeOffset + 16, tx)?;
	crate::model::writeF32(&mut body, newNodeOffset + 20, ty)?;
	crate::model::writeF32(&mut body, newNodeOffset + 24, tz)?;
	crate::model::writeF32(&mut body, newNodeOffset + 28, qw)?;
	crate::model::writeF32(&mut body, newNodeOffset + 32, qx)?;
	crate::model::writeF32(&mut body, newNodeOffset + 36, qy)?;
	crate::model::writeF32(&mut body, newNodeOffset + 40, qz)?;
	writeU32(&mut body, newNodeOffset + 44, childArrayOffset as u32)?;
	writeU32(&mut body, newNodeOffset + 48, 1)?;
	writeU32(&mut body, newNodeOffset + 52, 1)?;
	writeU32(&mut body, newNodeOffset + 56, controllerOffset as u32)?;
	writeU32(&mut body, newNodeOffset + 60, 2)?;
	writeU32(&mut body, newNodeOffset + 64, 2)?;
	writeU32(&mut body, newNodeOffset + 68, controllerDataOffset as u32)?;
	writeU32(&mut body, newNodeOffset + 72, 9)?;
	writeU32(&mut body, newNodeOffset + 76, 9)?;

	// Position controller: type=8, unknown=0xFFFF, rows=1, timeIndex=0, dataIndex=1, columns=3.
	body.extend_from_slice(&PositionControllerType.to_le_bytes());
	body.extend_from_slice(&0xFFFFu16.to_le_bytes());
	body.extend_from_slice(&1u16.to_le_bytes());
	body.extend_from_slice(&0u16.to_le_bytes());
	body.extend_from_slice(&1u16.to_le_bytes());
	body.extend_from_slice(&[3u8, 0, 0, 0]);

	// Orientation controller: type=20, unknown=0xFFFF, rows=1, timeIndex=4, dataIndex=5, columns=4.
	body.extend_from_slice(&20u32.to_le_bytes());
	body.extend_from_slice(&0xFFFFu16.to_le_bytes());
	body.extend_from_slice(&1u16.to_le_bytes());
	body.extend_from_slice(&4u16.to_le_bytes());
	body.extend_from_slice(&5u16.to_le_bytes());
	body.extend_from_slice(&[4u8, 0, 0, 0]);

	for value in [0.0f32, tx, ty, tz]
	{
		body.extend_from_slice(&value.to_le_bytes());
	}
	for value in [0.0f32, qx, qy, qz, qw]
	{
		body.extend_from_slice(&value.to_le_bytes());
	}

	// The previous root becomes the synthetic root's sole child.
	writeU32(&mut body, rootOffset + 12, newNodeOffset as u32)?;

	writeU32(&mut body, RootNodeOffsetField, newNodeOffset as u32)?;
	writeU32(&mut body, NodeCountField, nodeCount + 1)?;

	return Ok(joinPrelude(mdxSize, &body));
}

#[cfg(test)]
mod tests
{
	use super::*;

	fn minimalRootOnlyModel() -> Vec<u8>
	{
		let headerSize = 200i64;
		let rootOffset = headerSize;
		let mut body = vec![0u8; headerSize as usize];
		writeU32(&mut body, RootNodeOffsetField, rootOffset as u32).unwrap();
		writeU32(&mut body, NodeCountField, 1).unwrap();
		body.resize((rootOffset + NodeHeaderSize) as usize, 0);
		return joinPrelude(0, &body);
	}

	#[test]
	fn TransformWritesExpectedTranslationAndQuaternion()
	{
		let mdl = minimalRootOnlyModel();
		let out = transform(&mdl, (1.0, 2.0, 3.0), 90.0).unwrap();

		let (_, body) = splitPrelude(&out).unwrap();
		let newRootOffset = readU32(&body, RootNodeOffsetField).unwrap() as i64;

		let tx = crate::model::readF32(&body, newRootOffset + 16).unwrap();
		let ty = crate::model::readF32(&body, newRootOffset + 20).unwrap();
		let tz = crate::model::readF32(&body, newRootOffset + 24).unwrap();
		assert_eq!((1.0, 2.0, 3.0), (tx, ty, tz));

		let qw = crate::model::readF32(&body, newRootOffset + 28).unwrap();
		let qx = crate::model::readF32(&body, newRootOffset + 32).unwrap();
		let qy = crate::model::readF32(&body, newRootOffset + 36).unwrap();
		let qz = crate::model::readF32(&body, newRootOffset + 40).unwrap();

		let half = (90.0f32).to_radians() / 2.0;
		assert!((qz - half.sin()).abs() < 1e-6);
		assert!((qw - half.cos()).abs() < 1e-6);
		assert_eq!(0.0, qx);
		assert_eq!(0.0, qy);
	}

	#[test]
	fn TransformIncrementsNodeCountAndRewiresOldRoot()
	{
		let mdl = minimalRootOnlyModel();
		let oldRootOffset = 200i64;
		let out = transform(&mdl, (0.0, 0.0, 0.0), 0.0).unwrap();
		let (_, body) = splitPrelude(&out).unwrap();

		assert_eq!(2, readU32(&body, NodeCountField).unwrap());
		let newRootOffset = readU32(&body, RootNodeOffsetField).unwrap() as i64;
		assert_ne!(oldRootOffset, newRootOffset);
		assert_eq!(newRootOffset as u32, readU32(&body, oldRootOffset + 12).unwrap());
	}
}
