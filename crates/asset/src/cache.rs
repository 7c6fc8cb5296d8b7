//! Deduplicating store for imported and generated meshes.
//!
//! Each signature owns its own slot lock, held for the whole
//! lookup -> load -> insert sequence. At most one load runs per signature;
//! distinct signatures load in parallel. The map lock is only held long enough
//! to fetch or create a slot.
//!
//! There is no timeout: an import that never returns blocks every caller
//! waiting on the same signature.

use std::{
    collections::HashMap,
    fmt,
    path::{Path, PathBuf},
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
};

use corelib::Vec3;
use parking_lot::Mutex;

use crate::error::{MeshError, MeshResult};
use crate::mesh::MeshRecord;
use crate::normalize::normalize;
use crate::obj::ObjImporter;
use crate::procedural;
use crate::scene::{ImportFlags, SceneImporter};

/// Shared handle to a cached record. Two handles for the same cached record
/// are `Arc::ptr_eq`.
pub type MeshRef = Arc<MeshRecord>;

type Entry = Arc<[MeshRef]>;
type Slot = Arc<Mutex<Option<Entry>>>;

/// Cache key derived from request parameters.
///
/// File keys hold the exact path, so paths that only differ in bytes which do
/// not survive display (invalid UTF-8) stay distinct. Shape floats are written
/// with six fractional digits, so parameters that only differ beyond that
/// precision map to the same signature.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Signature {
    File(PathBuf),
    Shape(String),
}

impl Signature {
    pub fn for_path(path: impl AsRef<Path>) -> Self {
        Self::File(path.as_ref().to_path_buf())
    }

    pub fn for_plane(width: f32, height: f32) -> Self {
        Self::Shape(format!("plane:width={width:.6}:height={height:.6}"))
    }

    pub fn for_box(min: Vec3, max: Vec3) -> Self {
        Self::Shape(format!(
            "box:min={:.6},{:.6},{:.6}:max={:.6},{:.6},{:.6}",
            min.x, min.y, min.z, max.x, max.y, max.z
        ))
    }
}

/// Lossy for file keys; only meant for logs.
impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::File(path) => write!(f, "file:{}", path.display()),
            Self::Shape(params) => f.write_str(params),
        }
    }
}

/// Thread-safe mesh cache. Share it by reference or wrap it in an `Arc`.
pub struct MeshCache {
    importer: Box<dyn SceneImporter>,
    flags: ImportFlags,
    slots: Mutex<HashMap<Signature, Slot>>,
    loaded: AtomicUsize,
}

impl MeshCache {
    pub fn new(importer: impl SceneImporter + 'static, flags: ImportFlags) -> Self {
        log::debug!("MeshCache created with {:?}", flags);
        Self {
            importer: Box::new(importer),
            flags,
            slots: Mutex::new(HashMap::new()),
            loaded: AtomicUsize::new(0),
        }
    }

    #[inline]
    pub fn flags(&self) -> ImportFlags {
        self.flags
    }

    /// Submeshes of `path`, in scene traversal order.
    ///
    /// Returns an empty `Vec` when the import fails or yields nothing usable.
    /// Failures are logged and not cached; the next call imports again.
    pub fn load(&self, path: impl AsRef<Path>) -> Vec<MeshRef> {
        match self.try_load(path) {
            Ok(meshes) => meshes,
            Err(e) => {
                log::error!("{e}");
                Vec::new()
            }
        }
    }

    /// Like [`MeshCache::load`] but reports why nothing was loaded.
    pub fn try_load(&self, path: impl AsRef<Path>) -> MeshResult<Vec<MeshRef>> {
        let path = path.as_ref();
        let label = path.display().to_string();
        let entry = self.get_or_try_insert(Signature::for_path(path), || {
            let scene = self
                .importer
                .import(path, self.flags)
                .map_err(|reason| MeshError::Import {
                    path: label.clone(),
                    reason,
                })?;
            let records = normalize(&scene, &label);
            if records.is_empty() {
                return Err(MeshError::NoSubmeshes(label.clone()));
            }
            log::info!("Loaded {} submesh(es) from {}", records.len(), label);
            Ok(records)
        })?;
        Ok(entry.to_vec())
    }

    /// Plane of `width` x `height`, generated once per signature.
    pub fn create_plane(&self, width: f32, height: f32) -> MeshResult<MeshRef> {
        self.single(Signature::for_plane(width, height), || {
            procedural::plane(width, height)
        })
    }

    /// Box spanning `min..max`, generated once per signature.
    pub fn create_box(&self, min: Vec3, max: Vec3) -> MeshResult<MeshRef> {
        self.single(Signature::for_box(min, max), || procedural::cuboid(min, max))
    }

    /// Whether `signature` currently has a stored entry.
    ///
    /// Blocks while a load for that signature is in progress.
    pub fn contains(&self, signature: &Signature) -> bool {
        let slot = self.slots.lock().get(signature).cloned();
        slot.is_some_and(|slot| slot.lock().is_some())
    }

    /// Number of stored entries.
    #[inline]
    pub fn len(&self) -> usize {
        self.loaded.load(Ordering::Acquire)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn single<F>(&self, signature: Signature, build: F) -> MeshResult<MeshRef>
    where
        F: FnOnce() -> MeshResult<MeshRecord>,
    {
        let entry = self.get_or_try_insert(signature, || build().map(|record| vec![record]))?;
        entry
            .first()
            .cloned()
            .ok_or_else(|| MeshError::InvalidRecord("empty procedural entry".into()))
    }

    fn get_or_try_insert<F>(&self, signature: Signature, build: F) -> MeshResult<Entry>
    where
        F: FnOnce() -> MeshResult<Vec<MeshRecord>>,
    {
        let slot = {
            let mut slots = self.slots.lock();
            Arc::clone(slots.entry(signature.clone()).or_default())
        };

        let mut entry = slot.lock();
        if let Some(records) = &*entry {
            log::debug!("Cache hit: {signature}");
            return Ok(Arc::clone(records));
        }

        log::debug!("Cache miss: {signature}");
        let records: Entry = match build() {
            Ok(records) => records.into_iter().map(Arc::new).collect(),
            Err(e) => {
                drop(entry);
                self.discard_empty(&signature, &slot);
                return Err(e);
            }
        };
        *entry = Some(Arc::clone(&records));
        self.loaded.fetch_add(1, Ordering::AcqRel);
        Ok(records)
    }

    /// Forget a slot left empty by a failed load, unless another caller is
    /// already queued on it. The map holds one reference and `slot` the other.
    fn discard_empty(&self, signature: &Signature, slot: &Slot) {
        let mut slots = self.slots.lock();
        if Arc::strong_count(slot) == 2 && slot.lock().is_none() {
            slots.remove(signature);
        }
    }

    #[cfg(test)]
    fn slot_count(&self) -> usize {
        self.slots.lock().len()
    }
}

impl Default for MeshCache {
    /// OBJ importer with default processing flags.
    fn default() -> Self {
        Self::new(ObjImporter, ImportFlags::default())
    }
}

impl fmt::Debug for MeshCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MeshCache")
            .field("flags", &self.flags)
            .field("entries", &self.len())
            .finish_non_exhaustive()
    }
}
