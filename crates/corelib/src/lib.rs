//! Core types: math re-exports and bounding volumes.

pub use glam::{Vec2, Vec3, vec2, vec3};

pub mod bounds;

pub use bounds::{Aabb, BoundingSphere};
