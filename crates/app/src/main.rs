//! Entry point: load one mesh file through the cache and report what came out.

use anyhow::Result;
use asset::{ImportFlags, MeshCache, MeshRef, ObjImporter};

const DEFAULT_MESH: &str = "../Meshes/bunny_norm.obj";

fn parse_mesh_arg() -> String {
    // --mesh=PATH
    std::env::args()
        .find_map(|arg| arg.strip_prefix("--mesh=").map(str::to_owned))
        .unwrap_or_else(|| DEFAULT_MESH.to_owned())
}

fn parse_switch(name: &str) -> Option<bool> {
    // --name[=on|off]
    let bare = format!("--{name}");
    let prefixed = format!("--{name}=");
    for arg in std::env::args() {
        if arg == bare {
            return Some(true);
        }
        if let Some(val) = arg.strip_prefix(&prefixed) {
            return Some(matches!(
                val.to_ascii_lowercase().as_str(),
                "1" | "true" | "on" | "yes"
            ));
        }
    }
    None
}

fn parse_flags() -> ImportFlags {
    let mut flags = ImportFlags::default();
    if let Some(right_handed) = parse_switch("right-handed") {
        flags.right_handed = right_handed;
    }
    if parse_switch("no-tangents").unwrap_or(false) {
        flags.calc_tangent_space = false;
    }
    if parse_switch("no-triangulate").unwrap_or(false) {
        flags.triangulate = false;
    }
    flags
}

/// Load `path` and print how many submeshes came out; zero is an error.
fn load_meshes(cache: &MeshCache, path: &str) -> Result<Vec<MeshRef>> {
    let meshes = cache.load(path);
    println!("{}", meshes.len());
    anyhow::ensure!(!meshes.is_empty(), "no meshes loaded from '{}'", path);
    Ok(meshes)
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let path = parse_mesh_arg();
    let flags = parse_flags();
    log::info!("Loading '{}' with {:?}", path, flags);

    let cache = MeshCache::new(ObjImporter, flags);
    let meshes = load_meshes(&cache, &path)?;

    for (i, mesh) in meshes.iter().enumerate() {
        let sphere = mesh.local_bounding_sphere();
        log::info!(
            "submesh {} '{}': {} vertices, {} indices, {} texcoord set(s), radius {:.3}",
            i,
            mesh.name(),
            mesh.vertex_count(),
            mesh.index_count(),
            mesh.texcoord_set_count(),
            sphere.radius
        );
    }

    Ok(())
}
