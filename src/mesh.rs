use crate::error::Error;

/// Caller-supplied mesh identity, used as the adjacency cache key. Two
/// deforming instances sharing one source mesh should pass the same id so
/// they share one precompute.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MeshId(pub u64);

/// Rest-pose triangle mesh input. Immutable once constructed; the deformer
/// and the adjacency cache assume the geometry behind a [`MeshId`] never
/// changes (see [`crate::AdjacencyCache::invalidate`] for the escape hatch).
#[derive(Clone, Debug)]
pub struct RestMesh {
    id: MeshId,
    positions: Vec<glam::Vec3>,
    normals: Vec<glam::Vec3>,
    triangles: Vec<[u32; 3]>,
}

impl RestMesh {
    /// Positions and normals must be the same length and non-empty. Triangle
    /// indices are validated later, when the adjacency graph is built.
    pub fn new(
        id: MeshId,
        positions: Vec<glam::Vec3>,
        normals: Vec<glam::Vec3>,
        triangles: Vec<[u32; 3]>,
    ) -> Result<Self, Error> {
        if positions.is_empty() {
            return Err(Error::EmptyMesh);
        }
        if positions.len() != normals.len() {
            return Err(Error::MismatchedArrayLengths(
                positions.len(),
                normals.len(),
            ));
        }
        Ok(RestMesh {
            id,
            positions,
            normals,
            triangles,
        })
    }

    pub fn id(&self) -> MeshId {
        self.id
    }

    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    pub fn positions(&self) -> &[glam::Vec3] {
        &self.positions
    }

    pub fn normals(&self) -> &[glam::Vec3] {
        &self.normals
    }

    pub fn triangles(&self) -> &[[u32; 3]] {
        &self.triangles
    }
}
