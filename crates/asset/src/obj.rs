//! Wavefront OBJ importer producing a [`Scene`].
//!
//! Supports positions, normals, texture coordinates and `o`/`g` grouping.
//! Every group becomes a child node of the root holding one submesh; faces that
//! appear before the first group belong to the root node itself.

use std::{
    collections::HashMap,
    ffi::OsStr,
    fs::File,
    io::{self, BufRead, BufReader},
    path::Path,
    str::SplitWhitespace,
};

use anyhow::{Context, Result, anyhow};
use corelib::{Vec2, Vec3, vec2, vec3};

use crate::scene::{Face, ImportFlags, RawSubmesh, Scene, SceneImporter, SceneNode};

/// Scene importer for `.obj` files.
#[derive(Clone, Copy, Debug, Default)]
pub struct ObjImporter;

impl SceneImporter for ObjImporter {
    fn import(&self, path: &Path, flags: ImportFlags) -> Result<Scene> {
        let is_obj = path
            .extension()
            .and_then(OsStr::to_str)
            .is_some_and(|ext| ext.eq_ignore_ascii_case("obj"));
        if !is_obj {
            anyhow::bail!("unsupported mesh format: {}", path.display());
        }
        scene_from_file(path, flags)
    }
}

/// Open `path` and read it as an OBJ scene.
pub fn scene_from_file(path: impl AsRef<Path>, flags: ImportFlags) -> Result<Scene> {
    let path = path.as_ref();
    let file = File::open(path).with_context(|| format!("cannot open scene {}", path.display()))?;
    read_scene(BufReader::new(file), flags)
}

/// Read an OBJ scene from in-memory text.
pub fn scene_from_str(contents: &str, flags: ImportFlags) -> Result<Scene> {
    read_scene(io::Cursor::new(contents), flags)
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
struct Key(usize, Option<usize>, Option<usize>);

/// Vertices and faces collected for one `o`/`g` block.
#[derive(Default)]
struct Group {
    name: String,
    unique: HashMap<Key, u32>,
    positions: Vec<Vec3>,
    normals: Vec<Option<Vec3>>,
    uvs: Vec<Option<Vec2>>,
    faces: Vec<Face>,
}

impl Group {
    fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Self::default()
        }
    }

    fn finish(self, flags: ImportFlags) -> Option<RawSubmesh> {
        if self.faces.is_empty() {
            return None;
        }
        let normals: Option<Vec<Vec3>> = self.normals.into_iter().collect();
        let uvs: Option<Vec<Vec2>> = self.uvs.into_iter().collect();

        let (tangents, bitangents) = match (&normals, &uvs) {
            (Some(n), Some(uv)) if flags.calc_tangent_space => {
                let (t, b) = tangent_space(&self.positions, n, uv, &self.faces);
                (Some(t), Some(b))
            }
            _ => (None, None),
        };

        Some(RawSubmesh {
            name: self.name,
            positions: self.positions,
            normals,
            tangents,
            bitangents,
            texcoords: vec![uvs],
            faces: self.faces,
            aabb: None,
        })
    }
}

/// Read OBJ text into a scene: faces before the first `o`/`g` go to the root
/// node, each later group becomes a child node with one submesh.
pub fn read_scene<R: BufRead>(reader: R, flags: ImportFlags) -> Result<Scene> {
    let mut positions: Vec<Vec3> = Vec::new();
    let mut normals: Vec<Vec3> = Vec::new();
    let mut texcoords: Vec<Vec2> = Vec::new();

    // Left-handed output mirrors Z and flips V.
    let flip = !flags.right_handed;

    let mut root_mesh: Option<RawSubmesh> = None;
    let mut groups: Vec<RawSubmesh> = Vec::new();
    let mut current = Group::default();
    let mut in_named_group = false;

    for (index, text) in reader.lines().enumerate() {
        let line = index + 1;
        let text = text.with_context(|| format!("scene text unreadable at line {line}"))?;
        let mut parts = text.split_whitespace();
        let Some(tag) = parts.next() else {
            continue;
        };
        if tag.starts_with('#') {
            continue;
        }

        match tag {
            "v" => {
                let [x, y, z] = components::<3>(&mut parts, "position", line)?;
                positions.push(vec3(x, y, if flip { -z } else { z }));
            }
            "vt" => {
                let [u, v] = components::<2>(&mut parts, "texcoord", line)?;
                texcoords.push(vec2(u, if flip { 1.0 - v } else { v }));
            }
            "vn" => {
                let [x, y, z] = components::<3>(&mut parts, "normal", line)?;
                normals.push(vec3(x, y, if flip { -z } else { z }));
            }
            "o" | "g" => {
                let name = parts.collect::<Vec<_>>().join(" ");
                let finished = std::mem::replace(&mut current, Group::named(&name));
                if let Some(mesh) = finished.finish(flags) {
                    if in_named_group {
                        groups.push(mesh);
                    } else {
                        root_mesh = Some(mesh);
                    }
                }
                in_named_group = true;
            }
            "f" => {
                let mut face_indices: Vec<u32> = Vec::new();
                let counts = [positions.len(), texcoords.len(), normals.len()];
                for token in parts {
                    let key = face_corner(token, counts, line)?;
                    let vertex = match current.unique.get(&key) {
                        Some(&vertex) => vertex,
                        None => {
                            let vertex = u32::try_from(current.positions.len()).map_err(|_| {
                                anyhow!("line {line}: submesh '{}' exceeds u32 vertices", current.name)
                            })?;
                            let Key(p, uv, n) = key;
                            current.positions.push(positions[p]);
                            current.uvs.push(uv.map(|i| texcoords[i]));
                            current.normals.push(n.map(|i| normals[i]));
                            current.unique.insert(key, vertex);
                            vertex
                        }
                    };
                    face_indices.push(vertex);
                }

                if face_indices.len() < 3 {
                    continue;
                }
                let polygons: Vec<Vec<u32>> = if flags.triangulate {
                    // Fan around the first corner.
                    (1..face_indices.len() - 1)
                        .map(|tri| {
                            vec![face_indices[0], face_indices[tri], face_indices[tri + 1]]
                        })
                        .collect()
                } else {
                    vec![face_indices]
                };
                for mut polygon in polygons {
                    if flip {
                        polygon.reverse();
                    }
                    current.faces.push(Face::new(polygon));
                }
            }
            _ => {
                // Materials, smoothing groups and the like carry no geometry.
            }
        }
    }

    let last = current.finish(flags);
    match last {
        Some(mesh) if in_named_group => groups.push(mesh),
        Some(mesh) => root_mesh = Some(mesh),
        None => {}
    }

    let mut scene = Scene {
        root: SceneNode::new("root"),
        meshes: Vec::with_capacity(groups.len() + 1),
    };
    if let Some(mesh) = root_mesh {
        scene.root.meshes.push(0);
        scene.meshes.push(mesh);
    }
    for mesh in groups {
        let node = SceneNode::new(mesh.name.clone()).with_meshes([scene.meshes.len()]);
        scene.root.children.push(node);
        scene.meshes.push(mesh);
    }
    Ok(scene)
}

/// Per-vertex tangents and bitangents from triangle UV gradients,
/// orthogonalized against the vertex normal.
fn tangent_space(
    positions: &[Vec3],
    normals: &[Vec3],
    uvs: &[Vec2],
    faces: &[Face],
) -> (Vec<Vec3>, Vec<Vec3>) {
    let mut tan = vec![Vec3::ZERO; positions.len()];
    let mut bitan = vec![Vec3::ZERO; positions.len()];

    for face in faces {
        let idx = &face.indices;
        for k in 1..idx.len().saturating_sub(1) {
            let [a, b, c] = [idx[0], idx[k], idx[k + 1]].map(|i| i as usize);
            let e1 = positions[b] - positions[a];
            let e2 = positions[c] - positions[a];
            let d1 = uvs[b] - uvs[a];
            let d2 = uvs[c] - uvs[a];
            let det = d1.x * d2.y - d2.x * d1.y;
            if det.abs() <= f32::EPSILON {
                continue;
            }
            let r = 1.0 / det;
            let t = (e1 * d2.y - e2 * d1.y) * r;
            let bt = (e2 * d1.x - e1 * d2.x) * r;
            for v in [a, b, c] {
                tan[v] += t;
                bitan[v] += bt;
            }
        }
    }

    for ((t, b), n) in tan.iter_mut().zip(bitan.iter_mut()).zip(normals) {
        let n = n.try_normalize().unwrap_or(Vec3::Z);
        let ortho = (*t - n * n.dot(*t)).normalize_or_zero();
        let ortho = if ortho == Vec3::ZERO {
            n.any_orthonormal_vector()
        } else {
            ortho
        };
        let sign = if n.cross(ortho).dot(*b) < 0.0 { -1.0 } else { 1.0 };
        *t = ortho;
        *b = n.cross(ortho) * sign;
    }

    (tan, bitan)
}

/// Read the `N` numeric components of a `v`/`vt`/`vn` record.
fn components<const N: usize>(
    parts: &mut SplitWhitespace<'_>,
    stream: &str,
    line: usize,
) -> Result<[f32; N]> {
    let mut out = [0.0; N];
    for (read, value) in out.iter_mut().enumerate() {
        let token = parts
            .next()
            .ok_or_else(|| anyhow!("line {line}: {stream} has {read} of {N} components"))?;
        *value = token
            .parse()
            .with_context(|| format!("line {line}: {stream} component '{token}' is not a number"))?;
    }
    Ok(out)
}

/// Resolve one `p[/uv][/n]` face corner against the stream lengths
/// `[positions, texcoords, normals]` read so far.
fn face_corner(token: &str, counts: [usize; 3], line: usize) -> Result<Key> {
    let mut fields = token.split('/');
    let position = fields.next().unwrap_or_default();
    let position = stream_index(position, counts[0], "position", line)?;
    let mut optional = |len: usize, stream: &str| -> Result<Option<usize>> {
        match fields.next() {
            Some(field) if !field.is_empty() => stream_index(field, len, stream, line).map(Some),
            _ => Ok(None),
        }
    };
    let uv = optional(counts[1], "texcoord")?;
    let normal = optional(counts[2], "normal")?;
    Ok(Key(position, uv, normal))
}

/// Map a 1-based reference, or a negative one counted back from the end,
/// onto `0..len`.
fn stream_index(token: &str, len: usize, stream: &str, line: usize) -> Result<usize> {
    let raw: i64 = token
        .parse()
        .with_context(|| format!("line {line}: {stream} reference '{token}' is not an integer"))?;
    let resolved = match raw {
        0 => anyhow::bail!("line {line}: {stream} references start at 1, got 0"),
        r if r > 0 => r - 1,
        r => len as i64 + r,
    };
    usize::try_from(resolved)
        .ok()
        .filter(|&i| i < len)
        .ok_or_else(|| anyhow!("line {line}: {stream} {raw} is outside the {len} defined so far"))
}

#[cfg(test)]
mod tests {
    use super::*;

    const RIGHT_HANDED: ImportFlags = ImportFlags {
        triangulate: true,
        calc_tangent_space: true,
        right_handed: true,
    };

    const TRIANGLE: &str = r#"
        v 0.0 0.0 0.0
        v 1.0 0.0 0.0
        v 0.0 1.0 0.0
        vn 0.0 0.0 1.0
        vt 0.0 0.0
        vt 1.0 0.0
        vt 0.0 1.0
        f 1/1/1 2/2/1 3/3/1
    "#;

    #[test]
    fn parse_simple_triangle() {
        let scene = scene_from_str(TRIANGLE, RIGHT_HANDED).expect("parse triangle");
        assert_eq!(scene.meshes.len(), 1);
        assert_eq!(scene.root.meshes, [0]);
        assert!(scene.root.children.is_empty());

        let mesh = &scene.meshes[0];
        assert_eq!(mesh.positions.len(), 3);
        assert_eq!(mesh.faces, [Face::new([0, 1, 2])]);
        assert_eq!(mesh.normals.as_ref().map(Vec::len), Some(3));
        assert!(matches!(mesh.texcoords.as_slice(), [Some(uv)] if uv.len() == 3));
    }

    #[test]
    fn tangent_frame_follows_uv_gradient() {
        let scene = scene_from_str(TRIANGLE, RIGHT_HANDED).expect("parse");
        let mesh = &scene.meshes[0];
        let tangents = mesh.tangents.as_ref().expect("tangents");
        let bitangents = mesh.bitangents.as_ref().expect("bitangents");
        for (t, b) in tangents.iter().zip(bitangents) {
            assert!((*t - Vec3::X).length() < 1e-5);
            assert!((*b - Vec3::Y).length() < 1e-5);
        }
    }

    #[test]
    fn no_tangents_when_disabled() {
        let flags = ImportFlags {
            calc_tangent_space: false,
            ..RIGHT_HANDED
        };
        let scene = scene_from_str(TRIANGLE, flags).expect("parse");
        assert!(scene.meshes[0].tangents.is_none());
        assert!(scene.meshes[0].bitangents.is_none());
    }

    #[test]
    fn left_handed_conversion_mirrors_z_and_winding() {
        let src = "v 0 0 1\nv 1 0 1\nv 0 1 1\nvt 0 0.25\nf 1/1 2/1 3/1\n";
        let scene = scene_from_str(src, ImportFlags::default()).expect("parse");
        let mesh = &scene.meshes[0];
        assert!(mesh.positions.iter().all(|p| p.z == -1.0));
        assert_eq!(mesh.faces, [Face::new([2, 1, 0])]);
        let uv = mesh.texcoords[0].as_ref().expect("uv");
        assert!((uv[0].y - 0.75).abs() < 1e-6);
    }

    #[test]
    fn quads_are_fanned_or_kept() {
        let src = "v 0 0 0\nv 1 0 0\nv 1 1 0\nv 0 1 0\nf 1 2 3 4\n";
        let scene = scene_from_str(src, RIGHT_HANDED).expect("parse");
        assert_eq!(
            scene.meshes[0].faces,
            [Face::new([0, 1, 2]), Face::new([0, 2, 3])]
        );

        let flags = ImportFlags {
            triangulate: false,
            ..RIGHT_HANDED
        };
        let scene = scene_from_str(src, flags).expect("parse");
        assert_eq!(scene.meshes[0].faces, [Face::new([0, 1, 2, 3])]);
    }

    #[test]
    fn groups_become_child_nodes() {
        let src = r#"
            v 0 0 0
            v 1 0 0
            v 0 1 0
            v 1 1 0
            f 1 2 3
            o first
            f 2 4 3
            g empty
            g second
            f -4 -3 -1
        "#;
        let scene = scene_from_str(src, RIGHT_HANDED).expect("parse");
        assert_eq!(scene.meshes.len(), 3);
        assert_eq!(scene.root.meshes, [0]);
        let children: Vec<_> = scene.root.children.iter().map(|n| n.name.as_str()).collect();
        assert_eq!(children, ["first", "second"]);
        assert_eq!(scene.root.children[1].meshes, [2]);
        assert_eq!(scene.meshes[2].positions[2], vec3(1.0, 1.0, 0.0));
    }

    #[test]
    fn missing_normals_leave_stream_absent() {
        let src = "v 0 0 0\nv 1 0 0\nv 0 1 0\nvn 0 0 1\nf 1//1 2//1 3\n";
        let scene = scene_from_str(src, RIGHT_HANDED).expect("parse");
        assert!(scene.meshes[0].normals.is_none());
        assert!(matches!(scene.meshes[0].texcoords.as_slice(), [None]));
    }

    #[test]
    fn out_of_range_index_is_an_error() {
        let src = "v 0 0 0\nf 1 2 3\n";
        let err = scene_from_str(src, RIGHT_HANDED).unwrap_err();
        assert_eq!(err.to_string(), "line 2: position 2 is outside the 1 defined so far");
    }

    #[test]
    fn malformed_records_name_stream_and_line() {
        let err = scene_from_str("v 0 0 0\nvt 0.5\n", RIGHT_HANDED).unwrap_err();
        assert_eq!(err.to_string(), "line 2: texcoord has 1 of 2 components");

        let err = scene_from_str("v 0 0 0\nv 1 0 0\nv 0 1 0\nf 1/0 2 3\n", RIGHT_HANDED)
            .unwrap_err();
        assert!(err.to_string().contains("texcoord references start at 1"));

        let err = scene_from_str("vn 0 x 1\n", RIGHT_HANDED).unwrap_err();
        assert!(err.to_string().starts_with("line 1: normal component 'x'"));
    }

    #[test]
    fn comments_and_blank_lines_are_skipped() {
        let src = "# header\n\n   \nv 0 0 0\nv 1 0 0\nv 0 1 0\n  # indented\nf 1 2 3\n";
        let scene = scene_from_str(src, RIGHT_HANDED).expect("parse");
        assert_eq!(scene.meshes[0].faces, [Face::new([0, 1, 2])]);
    }

    #[test]
    fn importer_rejects_other_extensions() {
        let err = ObjImporter
            .import(Path::new("mesh.fbx"), RIGHT_HANDED)
            .unwrap_err();
        assert!(err.to_string().contains("unsupported"));
    }
}
