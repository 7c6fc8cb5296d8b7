//! Normalized per-submesh storage shared by the importer path and the
//! procedural generators.

use std::mem::size_of;

use corelib::{Aabb, BoundingSphere, Vec2, Vec3};

use crate::error::{MeshError, MeshResult};

/// Upper bound on texture-coordinate sets kept per record.
pub const MAX_TEXCOORD_SETS: usize = 2;

/// Byte size of one index element.
pub const INDEX_STRIDE: usize = size_of::<u32>();

/// Per-vertex stream selector for byte-level access.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Attribute {
    Position,
    Normal,
    Tangent,
    Bitangent,
    TexCoord(usize),
}

impl Attribute {
    /// Size in bytes of one element of this stream.
    pub const fn stride(self) -> usize {
        match self {
            Attribute::TexCoord(_) => size_of::<Vec2>(),
            _ => size_of::<Vec3>(),
        }
    }
}

/// Tangents and bitangents always travel together.
#[derive(Clone, Debug, PartialEq)]
pub struct TangentFrame {
    tangents: Vec<Vec3>,
    bitangents: Vec<Vec3>,
}

impl TangentFrame {
    pub fn new(tangents: Vec<Vec3>, bitangents: Vec<Vec3>) -> MeshResult<Self> {
        if tangents.len() != bitangents.len() {
            return Err(MeshError::InvalidRecord(format!(
                "{} tangents but {} bitangents",
                tangents.len(),
                bitangents.len()
            )));
        }
        Ok(Self {
            tangents,
            bitangents,
        })
    }

    #[inline]
    pub fn tangents(&self) -> &[Vec3] {
        &self.tangents
    }

    #[inline]
    pub fn bitangents(&self) -> &[Vec3] {
        &self.bitangents
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.tangents.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.tangents.is_empty()
    }
}

/// Immutable, validated geometry for one submesh.
///
/// Optional streams are `None` when the source did not provide them; when
/// present they hold exactly one element per vertex.
#[derive(Clone, Debug, PartialEq)]
pub struct MeshRecord {
    name: String,
    positions: Vec<Vec3>,
    normals: Option<Vec<Vec3>>,
    tangent_frame: Option<TangentFrame>,
    /// Contiguous from set 0, at most [`MAX_TEXCOORD_SETS`] entries.
    texcoords: Vec<Vec<Vec2>>,
    indices: Option<Vec<u32>>,
    bounds: Aabb,
}

impl MeshRecord {
    /// Start building a record around its position stream.
    pub fn builder(positions: Vec<Vec3>) -> MeshRecordBuilder {
        MeshRecordBuilder {
            name: String::new(),
            positions,
            normals: None,
            tangent_frame: None,
            texcoords: Vec::new(),
            indices: None,
            bounds: None,
        }
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn positions(&self) -> &[Vec3] {
        &self.positions
    }

    #[inline]
    pub fn normals(&self) -> Option<&[Vec3]> {
        self.normals.as_deref()
    }

    #[inline]
    pub fn tangent_frame(&self) -> Option<&TangentFrame> {
        self.tangent_frame.as_ref()
    }

    #[inline]
    pub fn tangents(&self) -> Option<&[Vec3]> {
        self.tangent_frame.as_ref().map(TangentFrame::tangents)
    }

    #[inline]
    pub fn bitangents(&self) -> Option<&[Vec3]> {
        self.tangent_frame.as_ref().map(TangentFrame::bitangents)
    }

    /// Texture coordinates of `set`, or `None` past the last populated set.
    #[inline]
    pub fn texcoords(&self, set: usize) -> Option<&[Vec2]> {
        self.texcoords.get(set).map(Vec::as_slice)
    }

    /// Number of populated texture-coordinate sets.
    #[inline]
    pub fn texcoord_set_count(&self) -> usize {
        self.texcoords.len()
    }

    /// `None` for non-indexed geometry.
    #[inline]
    pub fn indices(&self) -> Option<&[u32]> {
        self.indices.as_deref()
    }

    #[inline]
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    #[inline]
    pub fn index_count(&self) -> usize {
        self.indices.as_ref().map_or(0, Vec::len)
    }

    #[inline]
    pub fn local_bounding_box(&self) -> Aabb {
        self.bounds
    }

    /// See [`Aabb::bounding_sphere`] for the meaning of `center`.
    #[inline]
    pub fn local_bounding_sphere(&self) -> BoundingSphere {
        self.bounds.bounding_sphere()
    }

    /// Raw bytes of one vertex stream, ready for a vertex buffer upload.
    pub fn attribute_bytes(&self, attribute: Attribute) -> Option<&[u8]> {
        match attribute {
            Attribute::Position => Some(bytemuck::cast_slice(&self.positions)),
            Attribute::Normal => self.normals().map(bytemuck::cast_slice),
            Attribute::Tangent => self.tangents().map(bytemuck::cast_slice),
            Attribute::Bitangent => self.bitangents().map(bytemuck::cast_slice),
            Attribute::TexCoord(set) => self.texcoords(set).map(bytemuck::cast_slice),
        }
    }

    /// Raw bytes of the index stream (`u32` elements).
    pub fn index_bytes(&self) -> Option<&[u8]> {
        self.indices().map(bytemuck::cast_slice)
    }
}

/// Collects the streams of a [`MeshRecord`] and validates them in
/// [`MeshRecordBuilder::build`].
#[derive(Clone, Debug)]
pub struct MeshRecordBuilder {
    name: String,
    positions: Vec<Vec3>,
    normals: Option<Vec<Vec3>>,
    tangent_frame: Option<TangentFrame>,
    texcoords: Vec<Vec<Vec2>>,
    indices: Option<Vec<u32>>,
    bounds: Option<Aabb>,
}

impl MeshRecordBuilder {
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn normals(mut self, normals: Vec<Vec3>) -> Self {
        self.normals = Some(normals);
        self
    }

    pub fn tangent_frame(mut self, frame: TangentFrame) -> Self {
        self.tangent_frame = Some(frame);
        self
    }

    /// Append the next texture-coordinate set.
    pub fn texcoords(mut self, set: Vec<Vec2>) -> Self {
        self.texcoords.push(set);
        self
    }

    pub fn indices(mut self, indices: Vec<u32>) -> Self {
        self.indices = Some(indices);
        self
    }

    /// Use precomputed bounds instead of scanning the positions.
    pub fn bounds(mut self, bounds: Aabb) -> Self {
        self.bounds = Some(bounds);
        self
    }

    pub fn build(self) -> MeshResult<MeshRecord> {
        let vertex_count = self.positions.len();
        let bounds = match self.bounds {
            Some(bounds) => bounds,
            None => Aabb::from_points(self.positions.iter().copied())
                .ok_or_else(|| MeshError::InvalidRecord("no positions".into()))?,
        };
        if vertex_count == 0 {
            return Err(MeshError::InvalidRecord("no positions".into()));
        }

        check_len("normals", self.normals.as_ref().map(Vec::len), vertex_count)?;
        check_len(
            "tangents",
            self.tangent_frame.as_ref().map(TangentFrame::len),
            vertex_count,
        )?;

        if self.texcoords.len() > MAX_TEXCOORD_SETS {
            return Err(MeshError::InvalidRecord(format!(
                "{} texcoord sets, at most {} supported",
                self.texcoords.len(),
                MAX_TEXCOORD_SETS
            )));
        }
        for (set, coords) in self.texcoords.iter().enumerate() {
            check_len(&format!("texcoord set {set}"), Some(coords.len()), vertex_count)?;
        }

        if let Some(&bad) = self
            .indices
            .iter()
            .flatten()
            .find(|&&i| i as usize >= vertex_count)
        {
            return Err(MeshError::InvalidRecord(format!(
                "index {bad} out of range for {vertex_count} vertices"
            )));
        }

        Ok(MeshRecord {
            name: self.name,
            positions: self.positions,
            normals: self.normals,
            tangent_frame: self.tangent_frame,
            texcoords: self.texcoords,
            indices: self.indices.filter(|i| !i.is_empty()),
            bounds,
        })
    }
}

fn check_len(what: &str, len: Option<usize>, vertex_count: usize) -> MeshResult<()> {
    match len {
        Some(len) if len != vertex_count => Err(MeshError::InvalidRecord(format!(
            "{what} has {len} elements, expected {vertex_count}"
        ))),
        _ => Ok(()),
    }
}
