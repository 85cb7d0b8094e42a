//! Node-graph walker: texture/lightmap iteration and renaming, and the
//! single-node rename operation (§4.9).
//!
//! Grounded on PyKotor's `pykotor.tools.model` (`iterate_textures_and_lightmaps`,
//! `iterate_textures`, `iterate_lightmaps`, `change_textures`,
//! `change_lightmaps`, `rename`), generalized from free functions over
//! `bytes` into methods on an owned [`ModelWalker`] buffer.

use std::collections::BTreeSet;

use crate::bytes::{padAscii, LabelLength};
use crate::error::Result;
use crate::model::constants::*;
use crate::model::{joinPrelude, readU32, splitPrelude, writeU32};

/// Relative offset of a mesh node's texture-name field (§4.9: "32 ASCII
/// bytes at node+80+88").
const TextureNameField: i64 = NodeHeaderSize + 88;
/// Relative offset of a mesh node's lightmap-name field (node+80+120).
const LightmapNameField: i64 = NodeHeaderSize + 120;
/// Relative offset of a node's children array pointer + count (node+44/+48,
/// §4.9: "children-offsets pointer and count").
const ChildArrayField: i64 = 44;
const ChildCountField: i64 = 48;

/// An owned MDL body (prelude stripped) ready for texture/lightmap
/// iteration, renaming, or re-serialisation.
pub struct ModelWalker
{
	mdxSize: u32,
	body: Vec<u8>,
}

impl ModelWalker
{
	pub fn new(mdl: &[u8]) -> Result<Self>
	{
		let (mdxSize, body) = splitPrelude(mdl)?;
		return Ok(Self { mdxSize, body: body.to_vec() });
	}

	pub fn toBytes(&self) -> Vec<u8>
	{
		return joinPrelude(self.mdxSize, &self.body);
	}

	fn rootOffset(&self) -> Result<i64>
	{
		return Ok(readU32(&self.body, RootNodeOffsetField)? as i64);
	}

	fn nodeOffsets(&self) -> Result<Vec<i64>>
	{
		return crate::model::nodeOffsets(&self.body, self.rootOffset()?);
	}

	fn meshNodeOffsets(&self) -> Result<Vec<i64>>
	{
		return crate::model::meshNodeOffsets(&self.body, self.rootOffset()?);
	}

	fn readLabel(&self, offset: i64) -> Result<String>
	{
		let start = offset as usize;
		let bytes = self.body.get(start..start + LabelLength).ok_or_else(|| super::boundsError(offset))?;
		let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
		return Ok(String::from_utf8_lossy(&bytes[..end]).trim().to_string());
	}

	fn writeLabel(&mut self, offset: i64, value: &str) -> Result<()>
	{
		let bytes = padAscii(value, LabelLength);
		let start = offset as usize;
		let slot = self.body.get_mut(start..start + LabelLength).ok_or_else(|| super::boundsError(offset))?;
		slot.copy_from_slice(&bytes);
		return Ok(());
	}

	/// Unique, lowercased, non-empty texture names, skipping the sentinel
	/// `"null"` and the literal `"dirt"` (§4.9 `iter-textures`).
	pub fn iterTextures(&self) -> Result<Vec<String>>
	{
		let mut seen = BTreeSet::new();
		let mut names = Vec::new();
		for nodeOffset in self.meshNodeOffsets()?
		{
			let name = self.readLabel(nodeOffset + TextureNameField)?.to_lowercase();
			if !name.is_empty() && name != "null" && name != "dirt" && seen.insert(name.clone())
			{
				names.push(name);
			}
		}
		return Ok(names);
	}

	/// Unique, lowercased, non-empty lightmap names, skipping `"null"`
	/// (§4.9 `iter-lightmaps`).
	pub fn iterLightmaps(&self) -> Result<Vec<String>>
	{
		let mut seen = BTreeSet::new();
		let mut names = Vec::new();
		for nodeOffset in self.meshNodeOffsets()?
		{
			let name = self.readLabel(nodeOffset + LightmapNameField)?.to_lowercase();
			if !name.is_empty() && name != "null" && seen.insert(name.clone())
			{
				names.push(name);
			}
		}
		return Ok(names);
	}

	/// Rewrite every mesh node's texture name per `map` (keyed
	/// case-insensitively), padding/truncating to 32 bytes (§4.9
	/// `rename-textures`).
	pub fn renameTextures(&mut self, map: &std::collections::HashMap<String, String>) -> Result<()>
	{
		let lowered: std::collections::HashMap<String, String> =
			map.iter().map(|(k, v)| (k.to_lowercase(), v.to_lowercase())).collect();

		for nodeOffset in self.meshNodeOffsets()?
		{
			let field = nodeOffset + TextureNameField;
			let current = self.readLabel(field)?.to_lowercase();
			if let Some(replacement) = lowered.get(&current)
			{
				self.writeLabel(field, replacement)?;
			}
		}
		return Ok(());
	}

	/// Rewrite every mesh node's lightmap name per `map` (§4.9
	/// `rename-lightmaps`).
	pub fn renameLightmaps(&mut self, map: &std::collections::HashMap<String, String>) -> Result<()>
	{
		let lowered: std::collections::HashMap<String, String> =
			map.iter().map(|(k, v)| (k.to_lowercase(), v.to_lowercase())).collect();

		for nodeOffset in self.meshNodeOffsets()?
		{
			let field = nodeOffset + LightmapNameField;
			let current = self.readLabel(field)?.to_lowercase();
			if let Some(replacement) = lowered.get(&current)
			{
				self.writeLabel(field, replacement)?;
			}
		}
		return Ok(());
	}
}

/// Replace the 32-byte label at the fixed node-header position (relative
/// offset 20, §4.9 `rename-node`) of a single node's own byte buffer.
/// Grounded on PyKotor's `rename(data, name)`: `data[:20] + name.ljust(32) +
/// data[52:]`, which is itself node-relative offset 8 (the name/label
/// field inside an 80-byte node header) plus the 12-byte whole-file
/// prelude convention reused for a standalone node buffer.
pub fn renameNode(nodeBytes: &mut [u8], newName: &str) -> Result<()>
{
	const LabelOffset: usize = 20;
	let bytes = padAscii(newName, LabelLength);
	let slot = nodeBytes
		.get_mut(LabelOffset..LabelOffset + LabelLength)
		.ok_or_else(|| super::boundsError(LabelOffset as i64))?;
	slot.copy_from_slice(&bytes);
	return Ok(());
}

#[cfg(test)]
mod tests
{
	use super::*;

	fn buildSingleMeshModel(textureName: &str, lightmapName: &str) -> Vec<u8>
	{
		// A model with one dummy root (no mesh flag) whose single child is a
		// mesh node carrying the texture/lightmap fields. Node header is 80
		// bytes; the mesh node's texture/lightmap fields sit at node+168/+200
		// respectively, so the node buffer must extend at least that far.
		let meshNodeSize = 240usize;
		let rootNodeSize = 80usize;

		// Layout: [modelHeaderPad][rootNode][childArray][meshNode]
		let headerSize = 200usize;
		let rootOffset = headerSize as i64;
		let childArrayOffset = rootOffset + rootNodeSize as i64;
		let meshOffset = childArrayOffset + 4;

		let mut body = vec![0u8; headerSize];
		writeU32(&mut body, RootNodeOffsetField, rootOffset as u32).unwrap();
		body.resize(rootOffset as usize + rootNodeSize, 0);
		writeU32(&mut body, rootOffset + ChildArrayField, childArrayOffset as u32).unwrap();
		writeU32(&mut body, rootOffset + ChildCountField, 1).unwrap();

		body.resize(childArrayOffset as usize + 4, 0);
		writeU32(&mut body, childArrayOffset, meshOffset as u32).unwrap();

		body.resize(meshOffset as usize + meshNodeSize, 0);
		crate::model::writeU16(&mut body, meshOffset, NodeTypeMesh).unwrap();
		writeU32(&mut body, meshOffset + ChildArrayField, (meshOffset + meshNodeSize as i64) as u32).unwrap();
		writeU32(&mut body, meshOffset + ChildCountField, 0).unwrap();

		let textureBytes = padAscii(textureName, LabelLength);
		body[(meshOffset + TextureNameField) as usize..(meshOffset + TextureNameField) as usize + LabelLength]
			.copy_from_slice(&textureBytes);
		let lightmapBytes = padAscii(lightmapName, LabelLength);
		body[(meshOffset + LightmapNameField) as usize..(meshOffset + LightmapNameField) as usize + LabelLength]
			.copy_from_slice(&lightmapBytes);

		return joinPrelude(0, &body);
	}

	#[test]
	fn IterTexturesSkipsNullAndDirt()
	{
		let mdl = buildSingleMeshModel("OLD_TEX", "lm_01");
		let walker = ModelWalker::new(&mdl).unwrap();
		assert_eq!(vec!["old_tex".to_string()], walker.iterTextures().unwrap());
		assert_eq!(vec!["lm_01".to_string()], walker.iterLightmaps().unwrap());
	}

	#[test]
	fn IterTexturesSkipsSentinelNames()
	{
		let mdl = buildSingleMeshModel("dirt", "null");
		let walker = ModelWalker::new(&mdl).unwrap();
		assert!(walker.iterTextures().unwrap().is_empty());
		assert!(walker.iterLightmaps().unwrap().is_empty());
	}

	#[test]
	fn RenameTexturesRewritesFieldOnly()
	{
		let mdl = buildSingleMeshModel("old_tex", "lm_01");
		let mut walker = ModelWalker::new(&mdl).unwrap();

		let mut map = std::collections::HashMap::new();
		map.insert("old_tex".to_string(), "new_tex".to_string());
		walker.renameTextures(&map).unwrap();

		assert_eq!(vec!["new_tex".to_string()], walker.iterTextures().unwrap());
		assert_eq!(vec!["lm_01".to_string()], walker.iterLightmaps().unwrap());

		let before = ModelWalker::new(&mdl).unwrap().toBytes();
		let after = walker.toBytes();
		assert_eq!(before.len(), after.len());
	}

	#[test]
	fn RenameNodeReplacesLabelField()
	{
		let mut nodeBytes = vec![0u8; 52];
		renameNode(&mut nodeBytes, "newlabel").unwrap();
		let label = String::from_utf8(nodeBytes[20..28].to_vec()).unwrap();
		assert_eq!("newlabel", label);
	}
}
