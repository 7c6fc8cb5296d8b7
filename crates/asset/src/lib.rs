//! Mesh assets: scene import, normalization into [`MeshRecord`]s, procedural
//! shapes, and the deduplicating [`MeshCache`].

pub mod cache;
pub mod error;
pub mod mesh;
pub mod normalize;
pub mod obj;
pub mod procedural;
pub mod scene;

pub use cache::{MeshCache, MeshRef, Signature};
pub use error::{MeshError, MeshResult};
pub use mesh::{Attribute, INDEX_STRIDE, MAX_TEXCOORD_SETS, MeshRecord, MeshRecordBuilder, TangentFrame};
pub use obj::ObjImporter;
pub use scene::{Face, ImportFlags, RawSubmesh, Scene, SceneImporter, SceneNode};
