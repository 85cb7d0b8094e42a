//! Binary layout constants for the MDL/MDX walker and converter (§4.9, §6
//! "Model file pair").
//!
//! Every numeric value here is taken from PyKotor's
//! `pykotor.tools.model` (`_GEOM_ROOT_FP0_K1`, `_MESH_HEADER_SIZE_K1`, node
//! type flag bits, sub-header sizes) and `pykotor.resource.formats.mdl.mdl_types`
//! (`MDLNodeFlags`). Field offsets that are not named constants below (node
//! header field positions, mesh sub-header field positions) are documented
//! inline at their use site in [`crate::model::walker`] and
//! [`crate::model::convert`], matching the offsets `tools/model.py` reads at.

/// Width, in bytes, of the MDL/MDX file-pair prelude (§6): 4 zero bytes, a
/// 4-byte MDL body size, a 4-byte MDX size. Every offset named elsewhere in
/// this module is relative to the first byte *after* this prelude.
pub const PreludeSize: usize = 12;

/// Fixed width of a node header (§3 "absolute file offset"): type/id/name
/// fields, parent pointer, position, orientation, and the three array
/// descriptors (children, controllers, controller data).
pub const NodeHeaderSize: i64 = 80;

/// Model-header field: offset of the root node's own storage location (i.e.
/// the header slot that stores the root node's file offset), at header byte
/// 168, matching `tools/model.py`'s `iterate_textures`/`flip`
/// (`reader.seek(168)`).
pub const RootNodeOffsetField: i64 = 168;

/// Model-header field: additional root-node-shaped slot `convert_to_k2`
/// also walks and shifts (`tools/model.py::convert_to_k2`, `offsets[40]`).
pub const SecondaryRootField: i64 = 40;
/// Model-header field: animation-offsets-array location + count.
pub const AnimationArrayField: i64 = 88;
/// Model-header field: name-offsets-array location + count.
pub const NameArrayField: i64 = 184;
/// Model-header field: total node count (§4.9 "update the global node count").
pub const NodeCountField: i64 = 44;

pub const NodeTypeLight: u16 = 2;
pub const NodeTypeEmitter: u16 = 4;
pub const NodeTypeMesh: u16 = 32;
pub const NodeTypeSkin: u16 = 64;
pub const NodeTypeDangly: u16 = 256;
pub const NodeTypeAabb: u16 = 512;
pub const NodeTypeSaber: u16 = 2048;

pub const MeshHeaderSizeK1: i64 = 332;
pub const MeshHeaderSizeK2: i64 = 340;
pub const SkinHeaderSize: i64 = 108;
pub const DanglyHeaderSize: i64 = 28;
pub const AabbHeaderSize: i64 = 4;
pub const SaberHeaderSize: i64 = 20;

/// Relative offset, inside a K2-shaped mesh header, where the zero-padding
/// inserted by K1→K2 conversion lives (§4.9 step 3: "insert 8 bytes of zero
/// padding at a fixed offset inside every mesh header"). Equivalently: the
/// offset inside a K1-shaped mesh header past which every field shifts by
/// 8 bytes when growing to K2.
pub const MeshPadOffset: i64 = 324;
pub const MeshPadSize: i64 = 8;

pub const GeomRootFp0K1: u32 = 4_273_776;
pub const GeomRootFp1K1: u32 = 4_216_096;
pub const GeomRootFp0K2: u32 = 4_285_200;
pub const GeomRootFp1K2: u32 = 4_216_320;

pub const GeomAnimFp0K1: u32 = 4_273_392;
pub const GeomAnimFp1K1: u32 = 4_451_552;
pub const GeomAnimFp0K2: u32 = 4_284_816;
pub const GeomAnimFp1K2: u32 = 4_522_928;

pub const MeshFp0K1: u32 = 4_216_656;
pub const MeshFp1K1: u32 = 4_216_672;
pub const MeshFp0K2: u32 = 4_216_880;
pub const MeshFp1K2: u32 = 4_216_896;

pub const SkinFp0K1: u32 = 4_216_592;
pub const SkinFp1K1: u32 = 4_216_608;
#[allow(dead_code)]
pub const SkinFp0K2: u32 = 4_216_816;
#[allow(dead_code)]
pub const SkinFp1K2: u32 = 4_216_832;

pub const DanglyFp0K1: u32 = 4_216_640;
pub const DanglyFp1K1: u32 = 4_216_624;
pub const DanglyFp0K2: u32 = 4_216_864;
pub const DanglyFp1K2: u32 = 4_216_848;

pub const SaberFp0K1: u32 = 4_216_656;
pub const SaberFp1K1: u32 = 4_216_672;
pub const SaberFp0K2: u32 = 4_216_880;
pub const SaberFp1K2: u32 = 4_216_896;

pub const AabbFp0K1: u32 = 4_216_656;
pub const AabbFp1K1: u32 = 4_216_672;
pub const AabbFp0K2: u32 = 4_216_880;
pub const AabbFp1K2: u32 = 4_216_896;

/// Engine routine `POSITION` controller type (`MDLControllerType.POSITION`
/// in `mdl_types.py`), used by [`crate::model::mdx::flip`] to also negate
/// a node's animated position keyframes, not just its rest position.
pub const PositionControllerType: u32 = 8;

/// Mesh-header field: this mesh's own copy of the geometry function
/// pointer, read to tell a K1-shaped header from a K2 (`tsl`)-shaped one by
/// comparing against the `*Fp0*` constants above (`tools/model.py::flip`'s
/// `fp` / `tsl` check).
pub const MeshFunctionPointerField: i64 = 0;
/// Mesh-header field: offset (relative to the MDL body) of this mesh's
/// face-index array.
pub const MeshFacesOffsetField: i64 = 8;
/// Mesh-header field: face count.
pub const MeshFacesCountField: i64 = 12;
/// Mesh-header field: pointer-to-pointer for the vertex-indices ("elements")
/// array; the array at this offset holds a single absolute offset to the
/// actual elements array when there is exactly one index group.
pub const MeshElementsPointerField: i64 = 188;
/// Mesh-header field: vertex count (u16).
pub const MeshVertexCountField: i64 = 304;
/// Mesh-header field: bytes per vertex record in the paired MDX stream.
pub const MeshMdxStrideField: i64 = 252;
/// Mesh-header field: byte offset of the position floats within a single
/// MDX vertex record.
pub const MeshMdxVertexOffsetField: i64 = 260;
/// Mesh-header field: byte offset of the normal floats within a single MDX
/// vertex record.
pub const MeshMdxNormalOffsetField: i64 = 264;
/// Mesh-header field (K1 layout): absolute byte offset, into the paired MDX
/// buffer, where this mesh's vertex block begins. The K2 (`tsl`) layout
/// carries the same field 8 bytes later, at [`MeshMdxDataOffsetFieldK2`] —
/// the same byte position where K1→K2 conversion inserts its padding
/// ([`MeshPadOffset`]), which is why the insertion point and this field
/// coincide.
pub const MeshMdxDataOffsetFieldK1: i64 = 324;
pub const MeshMdxDataOffsetFieldK2: i64 = 332;
/// Mesh-header field: offset (relative to the MDL body) of this mesh's own
/// vertex-position array, K1 layout. K2 carries it 8 bytes later.
pub const MeshVertexArrayFieldK1: i64 = 328;
pub const MeshVertexArrayFieldK2: i64 = 336;
/// Bytes per face record: a normal (3f), a plane distance (1f), a material
/// id (u32), three adjacent-face indices (3×u16) and three vertex indices
/// (3×u16), matching the commonly documented Aurora-engine trimesh face
/// layout.
pub const FaceRecordSize: i64 = 32;
/// Relative offset, inside a face record, of its three vertex indices.
pub const FaceVertexIndicesOffset: i64 = 26;

/// Controller-entry field widths shared by [`crate::model::transform`] and
/// [`crate::model::mdx::flip`]: a 16-byte header (type, unknown, rows,
/// timeIndex, dataIndex, columns, 3×padding) per entry.
pub const ControllerEntrySize: i64 = 16;
