use crate::{
    adjacency::Adjacency,
    error::Error,
    layout::MAX_SLOTS,
    mesh::{MeshId, RestMesh},
};
use parking_lot::Mutex;
use std::{collections::HashMap, sync::Arc};

/// Process-wide memoization of adjacency tables, keyed by mesh identity and
/// matching tolerance, so multiple deforming instances of one source mesh
/// share a single precompute.
///
/// The cache never evicts on its own; entries live as long as the cache. The
/// lock only serializes the check-and-insert, matching the single-consumer
/// assumption of the precompute stage. If rest geometry, topology or skin
/// weights behind a [`MeshId`] change, the caller must call [`invalidate`]
/// before the next build; the cache performs no staleness detection itself.
///
/// [`invalidate`]: AdjacencyCache::invalidate
#[derive(Default)]
pub struct AdjacencyCache {
    entries: Mutex<HashMap<(MeshId, u32), Arc<Adjacency>>>,
}

impl AdjacencyCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached adjacency for `(mesh id, tolerance)`, building it
    /// on first request. Repeated calls with the same key return the
    /// identical `Arc`; a different tolerance triggers a fresh build. The
    /// tolerance is squared before the coincidence test, matching how the
    /// tunable is supplied.
    pub fn get_or_build(&self, mesh: &RestMesh, tolerance: f32) -> Result<Arc<Adjacency>, Error> {
        let key = (mesh.id(), tolerance.to_bits());
        let mut entries = self.entries.lock();
        if let Some(adjacency) = entries.get(&key) {
            log::debug!("adjacency cache hit for mesh {:?}", mesh.id());
            return Ok(adjacency.clone());
        }
        let adjacency = Arc::new(Adjacency::build(
            mesh.positions(),
            mesh.triangles(),
            MAX_SLOTS,
            tolerance * tolerance,
        )?);
        entries.insert(key, adjacency.clone());
        Ok(adjacency)
    }

    /// Drops every entry for `mesh_id`, across all tolerances. The caller's
    /// contract for topology or weight changes.
    pub fn invalidate(&self, mesh_id: MeshId) {
        self.entries.lock().retain(|(id, _), _| *id != mesh_id);
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}
