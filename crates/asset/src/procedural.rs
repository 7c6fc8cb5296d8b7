//! Parametric shapes built without an importer.

use corelib::{Aabb, Vec3, vec2, vec3};

use crate::error::MeshResult;
use crate::mesh::{MeshRecord, TangentFrame};

/// Per-axis magnitude of the box corner normals. Kept unnormalized.
const BOX_CORNER_NORMAL: f32 = 1.732;

/// Which side of the box each corner sits on, in corner order.
const CORNER_SIGNS: [(f32, f32, f32); 8] = [
    (-1.0, -1.0, -1.0),
    (1.0, -1.0, -1.0),
    (1.0, -1.0, 1.0),
    (-1.0, -1.0, 1.0),
    (-1.0, 1.0, -1.0),
    (1.0, 1.0, -1.0),
    (1.0, 1.0, 1.0),
    (-1.0, 1.0, 1.0),
];

/// Quad centred on the origin in the XY plane, facing -Z.
///
/// Vertex order: top-left, top-right, bottom-right, bottom-left; two triangles
/// `0 1 2` and `0 2 3`.
pub fn plane(width: f32, height: f32) -> MeshResult<MeshRecord> {
    let (hw, hh) = (width / 2.0, height / 2.0);
    let positions = vec![
        vec3(-hw, hh, 0.0),
        vec3(hw, hh, 0.0),
        vec3(hw, -hh, 0.0),
        vec3(-hw, -hh, 0.0),
    ];
    let texcoords = vec![
        vec2(0.0, 0.0),
        vec2(1.0, 0.0),
        vec2(1.0, 1.0),
        vec2(0.0, 1.0),
    ];

    MeshRecord::builder(positions)
        .name("plane")
        .normals(vec![Vec3::NEG_Z; 4])
        .tangent_frame(TangentFrame::new(vec![Vec3::X; 4], vec![Vec3::Y; 4])?)
        .texcoords(texcoords)
        .indices(vec![0, 1, 2, 0, 2, 3])
        .bounds(Aabb::new(vec3(-hw, -hh, 0.0), vec3(hw, hh, 0.0)))
        .build()
}

/// Eight-corner box spanning `min..max`.
///
/// Normals point along the corner diagonals, so lighting is only a coarse
/// approximation. No texcoords or tangents are generated.
pub fn cuboid(min: Vec3, max: Vec3) -> MeshResult<MeshRecord> {
    //    7------6
    //   /|     /|
    //  4------5 |
    //  | 3----|-2
    //  |/     |/
    //  0------1
    let positions = vec![
        min,
        vec3(max.x, min.y, min.z),
        vec3(max.x, min.y, max.z),
        vec3(min.x, min.y, max.z),
        vec3(min.x, max.y, min.z),
        vec3(max.x, max.y, min.z),
        max,
        vec3(min.x, max.y, max.z),
    ];
    let normals = CORNER_SIGNS
        .iter()
        .map(|&(x, y, z)| vec3(x, y, z) * BOX_CORNER_NORMAL)
        .collect();

    #[rustfmt::skip]
    let indices = vec![
        0, 4, 5, 0, 5, 1,
        1, 5, 6, 1, 6, 2,
        2, 6, 7, 2, 7, 3,
        3, 7, 4, 3, 4, 0,
        4, 7, 6, 4, 6, 5,
        1, 2, 3, 1, 3, 0,
    ];

    MeshRecord::builder(positions)
        .name("box")
        .normals(normals)
        .indices(indices)
        .bounds(Aabb::new(min, max))
        .build()
}
