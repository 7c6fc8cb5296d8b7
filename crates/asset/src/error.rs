//! Errors surfaced by record construction and the mesh cache.

use thiserror::Error;

/// Reasons a mesh request or record construction fails.
#[derive(Debug, Error)]
pub enum MeshError {
    /// The scene importer could not open or parse the file.
    #[error("failed to import '{path}': {reason:#}")]
    Import {
        path: String,
        reason: anyhow::Error,
    },

    /// Import succeeded but every submesh was dropped.
    #[error("'{0}' contained no usable submeshes")]
    NoSubmeshes(String),

    /// A record would violate one of the data model invariants.
    #[error("invalid mesh record: {0}")]
    InvalidRecord(String),
}

pub type MeshResult<T> = Result<T, MeshError>;
