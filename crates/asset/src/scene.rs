//! Scene graph handed over by a [`SceneImporter`].
//!
//! The importer owns file parsing; everything here is plain data so the
//! normalizer can be exercised with hand-built scenes.

use std::path::Path;

use corelib::{Aabb, Vec2, Vec3};

/// Processing options forwarded to the importer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ImportFlags {
    /// Split polygons into triangles.
    pub triangulate: bool,
    /// Generate tangents and bitangents where UVs and normals allow it.
    pub calc_tangent_space: bool,
    /// Keep the source right-handed; when `false` the importer converts to a
    /// left-handed system.
    pub right_handed: bool,
}

impl Default for ImportFlags {
    fn default() -> Self {
        Self {
            triangulate: true,
            calc_tangent_space: true,
            right_handed: false,
        }
    }
}

/// One polygon; indices point into the owning submesh's vertex arrays.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Face {
    pub indices: Vec<u32>,
}

impl Face {
    pub fn new(indices: impl Into<Vec<u32>>) -> Self {
        Self {
            indices: indices.into(),
        }
    }
}

/// Submesh exactly as the importer produced it. Nothing is validated yet.
#[derive(Clone, Debug, Default)]
pub struct RawSubmesh {
    pub name: String,
    /// Empty means the submesh has no position stream.
    pub positions: Vec<Vec3>,
    pub normals: Option<Vec<Vec3>>,
    pub tangents: Option<Vec<Vec3>>,
    pub bitangents: Option<Vec<Vec3>>,
    /// Texture-coordinate channels in importer order; `None` marks an unused
    /// channel.
    pub texcoords: Vec<Option<Vec<Vec2>>>,
    pub faces: Vec<Face>,
    /// Precomputed local bounds, if the importer provides them.
    pub aabb: Option<Aabb>,
}

impl RawSubmesh {
    #[inline]
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }
}

/// Node of the scene hierarchy.
#[derive(Clone, Debug, Default)]
pub struct SceneNode {
    pub name: String,
    /// Indices into [`Scene::meshes`].
    pub meshes: Vec<usize>,
    pub children: Vec<SceneNode>,
}

impl SceneNode {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            meshes: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn with_meshes(mut self, meshes: impl Into<Vec<usize>>) -> Self {
        self.meshes = meshes.into();
        self
    }

    pub fn with_child(mut self, child: SceneNode) -> Self {
        self.children.push(child);
        self
    }
}

impl Drop for SceneNode {
    // Tear the subtree down level by level so chains of any depth drop in
    // constant stack space.
    fn drop(&mut self) {
        let mut pending = std::mem::take(&mut self.children);
        while let Some(mut node) = pending.pop() {
            pending.append(&mut node.children);
        }
    }
}

/// Imported scene: a node tree plus the submeshes it references.
#[derive(Clone, Debug, Default)]
pub struct Scene {
    pub root: SceneNode,
    pub meshes: Vec<RawSubmesh>,
}

/// Turns a file on disk into a [`Scene`].
///
/// Implementations must be callable from several threads at once; the cache
/// only guarantees that one path is not imported twice concurrently.
pub trait SceneImporter: Send + Sync {
    fn import(&self, path: &Path, flags: ImportFlags) -> anyhow::Result<Scene>;
}
