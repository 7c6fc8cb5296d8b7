//! Scene graph -> [`MeshRecord`] conversion.
//!
//! Per-submesh problems never abort the walk: a submesh without positions (or
//! with unusable indices) is dropped, missing optional streams are logged and
//! left absent.

use crate::error::MeshResult;
use crate::mesh::{MAX_TEXCOORD_SETS, MeshRecord, TangentFrame};
use crate::scene::{RawSubmesh, Scene, SceneNode};

/// Convert every submesh reachable from `scene.root`.
///
/// Order is depth-first: a node's own submeshes, then each child subtree in
/// order. `label` only feeds log messages (usually the source path).
pub fn normalize(scene: &Scene, label: &str) -> Vec<MeshRecord> {
    let mut output = Vec::new();
    let mut pending: Vec<&SceneNode> = vec![&scene.root];

    while let Some(node) = pending.pop() {
        for (slot, &mesh_index) in node.meshes.iter().enumerate() {
            let Some(raw) = scene.meshes.get(mesh_index) else {
                log::error!(
                    "{label}: node '{}' references submesh {mesh_index}, scene has {}",
                    node.name,
                    scene.meshes.len()
                );
                continue;
            };
            match normalize_submesh(raw, label) {
                Ok(Some(record)) => output.push(record),
                Ok(None) => {}
                Err(e) => {
                    log::error!(
                        "{label}: submesh {slot} of node '{}' dropped: {e}",
                        node.name
                    );
                }
            }
        }
        // Reverse so the first child is popped first.
        pending.extend(node.children.iter().rev());
    }

    output
}

/// Build one record. `Ok(None)` means the submesh has no positions.
pub fn normalize_submesh(raw: &RawSubmesh, label: &str) -> MeshResult<Option<MeshRecord>> {
    let name = display_name(raw);
    if raw.positions.is_empty() {
        log::error!("{label}: submesh '{name}' has no position data, skipping");
        return Ok(None);
    }
    let vertex_count = raw.vertex_count();

    let mut builder = MeshRecord::builder(raw.positions.clone()).name(raw.name.clone());
    if let Some(aabb) = raw.aabb {
        builder = builder.bounds(aabb);
    }

    match raw.normals.as_ref() {
        Some(normals) if normals.len() == vertex_count => {
            builder = builder.normals(normals.clone());
        }
        Some(normals) => log::warn!(
            "{label}: submesh '{name}' has {} normals for {vertex_count} vertices, ignoring",
            normals.len()
        ),
        None => log::warn!("{label}: submesh '{name}' has no normal data"),
    }

    match (raw.tangents.as_ref(), raw.bitangents.as_ref()) {
        (Some(t), Some(b)) if t.len() == vertex_count && b.len() == vertex_count => {
            builder = builder.tangent_frame(TangentFrame::new(t.clone(), b.clone())?);
        }
        (None, None) => log::warn!("{label}: submesh '{name}' has no tangent data"),
        _ => log::warn!("{label}: submesh '{name}' has an incomplete tangent frame, ignoring"),
    }

    let mut sets = 0;
    for channel in raw.texcoords.iter().take(MAX_TEXCOORD_SETS) {
        match channel {
            Some(coords) if coords.len() == vertex_count => {
                builder = builder.texcoords(coords.clone());
                sets += 1;
            }
            _ => break,
        }
    }
    log::debug!("{label}: submesh '{name}' has {sets} set(s) of texcoords");

    if raw.faces.is_empty() {
        log::info!("{label}: submesh '{name}' doesn't use indices");
    } else {
        let indices: Vec<u32> = raw
            .faces
            .iter()
            .flat_map(|face| face.indices.iter().copied())
            .collect();
        builder = builder.indices(indices);
    }

    builder.build().map(Some)
}

fn display_name(raw: &RawSubmesh) -> &str {
    if raw.name.is_empty() { "<unnamed>" } else { &raw.name }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::Face;
    use corelib::{Aabb, Vec2, Vec3, vec3};

    fn tri(name: &str) -> RawSubmesh {
        RawSubmesh {
            name: name.into(),
            positions: vec![
                vec3(0.0, 0.0, 0.0),
                vec3(1.0, 0.0, 0.0),
                vec3(0.0, 1.0, 0.0),
            ],
            faces: vec![Face::new([0, 1, 2])],
            ..RawSubmesh::default()
        }
    }

    fn names(records: &[MeshRecord]) -> Vec<&str> {
        records.iter().map(MeshRecord::name).collect()
    }

    #[test]
    fn traversal_is_depth_first_own_meshes_first() {
        let meshes = ["root", "a", "a1", "a2", "b"]
            .iter()
            .map(|n| tri(n))
            .collect();
        let root = SceneNode::new("root")
            .with_meshes([0])
            .with_child(
                SceneNode::new("a")
                    .with_meshes([1])
                    .with_child(SceneNode::new("a1").with_meshes([2]))
                    .with_child(SceneNode::new("a2").with_meshes([3])),
            )
            .with_child(SceneNode::new("b").with_meshes([4]));
        let scene = Scene { root, meshes };

        let out = normalize(&scene, "test");
        assert_eq!(names(&out), ["root", "a", "a1", "a2", "b"]);
    }

    #[test]
    fn deep_chain_does_not_recurse() {
        let depth = 100_000;
        let mut node = SceneNode::new("leaf").with_meshes([0]);
        for _ in 0..depth {
            node = SceneNode::new("n").with_child(node);
        }
        let scene = Scene {
            root: node,
            meshes: vec![tri("deep")],
        };
        let out = normalize(&scene, "deep");
        assert_eq!(names(&out), ["deep"]);
    }

    #[test]
    fn submesh_without_positions_is_skipped() {
        let empty = RawSubmesh {
            name: "empty".into(),
            ..RawSubmesh::default()
        };
        let scene = Scene {
            root: SceneNode::new("root").with_meshes([0, 1, 2]),
            meshes: vec![tri("first"), empty, tri("last")],
        };
        let out = normalize(&scene, "test");
        assert_eq!(names(&out), ["first", "last"]);
        assert!(out.iter().all(|r| r.vertex_count() > 0));
    }

    #[test]
    fn dangling_mesh_reference_is_skipped() {
        let scene = Scene {
            root: SceneNode::new("root").with_meshes([7, 0]),
            meshes: vec![tri("only")],
        };
        assert_eq!(names(&normalize(&scene, "test")), ["only"]);
    }

    #[test]
    fn out_of_range_face_drops_submesh() {
        let mut bad = tri("bad");
        bad.faces.push(Face::new([0, 2, 9]));
        let scene = Scene {
            root: SceneNode::new("root").with_meshes([0, 1]),
            meshes: vec![bad, tri("good")],
        };
        let out = normalize(&scene, "test");
        assert_eq!(names(&out), ["good"]);
    }

    #[test]
    fn optional_streams_stay_absent() {
        let rec = normalize_submesh(&tri("plain"), "test")
            .expect("valid")
            .expect("has positions");
        assert!(rec.normals().is_none());
        assert!(rec.tangent_frame().is_none());
        assert_eq!(rec.texcoord_set_count(), 0);
        assert_eq!(rec.indices(), Some(&[0, 1, 2][..]));
    }

    #[test]
    fn faces_flatten_in_order() {
        let mut raw = tri("quad");
        raw.positions.push(vec3(1.0, 1.0, 0.0));
        raw.faces = vec![Face::new([0, 1, 3, 2]), Face::new([2, 1, 0])];
        let rec = normalize_submesh(&raw, "test").expect("valid").expect("some");
        assert_eq!(rec.indices(), Some(&[0, 1, 3, 2, 2, 1, 0][..]));
    }

    #[test]
    fn no_faces_means_non_indexed() {
        let mut raw = tri("soup");
        raw.faces.clear();
        let rec = normalize_submesh(&raw, "test").expect("valid").expect("some");
        assert!(rec.indices().is_none());
    }

    #[test]
    fn texcoord_sets_stop_at_first_gap() {
        let uv = vec![Vec2::ZERO; 3];
        let mut raw = tri("uv");
        raw.texcoords = vec![None, Some(uv.clone())];
        let rec = normalize_submesh(&raw, "test").expect("valid").expect("some");
        assert_eq!(rec.texcoord_set_count(), 0);
        assert!(rec.texcoords(1).is_none());

        raw.texcoords = vec![Some(uv.clone()), None, Some(uv.clone())];
        let rec = normalize_submesh(&raw, "test").expect("valid").expect("some");
        assert_eq!(rec.texcoord_set_count(), 1);

        raw.texcoords = vec![Some(uv.clone()); MAX_TEXCOORD_SETS + 3];
        let rec = normalize_submesh(&raw, "test").expect("valid").expect("some");
        assert_eq!(rec.texcoord_set_count(), MAX_TEXCOORD_SETS);
        for k in 0..MAX_TEXCOORD_SETS + 3 {
            let present = rec.texcoords(k).is_some();
            let earlier_present = (0..k).all(|j| rec.texcoords(j).is_some());
            assert!(!present || earlier_present);
        }
    }

    #[test]
    fn tangents_need_bitangents() {
        let mut raw = tri("half");
        raw.tangents = Some(vec![Vec3::X; 3]);
        let rec = normalize_submesh(&raw, "test").expect("valid").expect("some");
        assert!(rec.tangent_frame().is_none());

        raw.bitangents = Some(vec![Vec3::Y; 3]);
        let rec = normalize_submesh(&raw, "test").expect("valid").expect("some");
        assert_eq!(rec.tangents().map(<[Vec3]>::len), Some(3));
    }

    #[test]
    fn mis_sized_normals_are_ignored() {
        let mut raw = tri("n");
        raw.normals = Some(vec![Vec3::Z; 2]);
        let rec = normalize_submesh(&raw, "test").expect("valid").expect("some");
        assert!(rec.normals().is_none());
    }

    #[test]
    fn importer_bounds_win_over_scan() {
        let mut raw = tri("boxed");
        let aabb = Aabb::new(vec3(-1.0, -1.0, -1.0), vec3(2.0, 2.0, 2.0));
        raw.aabb = Some(aabb);
        let rec = normalize_submesh(&raw, "test").expect("valid").expect("some");
        assert_eq!(rec.local_bounding_box(), aabb);

        raw.aabb = None;
        let rec = normalize_submesh(&raw, "test").expect("valid").expect("some");
        assert_eq!(rec.local_bounding_box().max, vec3(1.0, 1.0, 0.0));
    }
}
