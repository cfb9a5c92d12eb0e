use crate::{
    cache::AdjacencyCache,
    error::Error,
    laplacian::Laplacian,
    layout::{OmegaSlot, ResourceLayout, VertexWeights},
    mesh::RestMesh,
    omega::{OmegaMatrix, OmegaSet},
    rigid,
};
use glam::{Mat4, Vec3};
use rayon::prelude::*;

/// Tunables for the precompute stage, with the conventional defaults: 5
/// smoothing passes, 0.9 damping, 1e-4 vertex matching tolerance.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DeformParams {
    /// Laplacian smoothing pass count.
    pub iterations: usize,
    /// Damping factor in (0, 1]: how far each pass moves toward the
    /// neighbor average.
    pub smooth_lambda: f32,
    /// Coincident-vertex matching tolerance; squared before use.
    pub vertex_tolerance: f32,
}

impl Default for DeformParams {
    fn default() -> Self {
        DeformParams {
            iterations: 5,
            smooth_lambda: 0.9,
            vertex_tolerance: 1e-4,
        }
    }
}

impl DeformParams {
    pub fn validate(&self) -> Result<(), Error> {
        if !(self.smooth_lambda > 0.0 && self.smooth_lambda <= 1.0) {
            return Err(Error::InvalidParameter("smooth_lambda"));
        }
        if !self.vertex_tolerance.is_finite() || self.vertex_tolerance < 0.0 {
            return Err(Error::InvalidParameter("vertex_tolerance"));
        }
        Ok(())
    }
}

/// Per-frame output: deformed positions and normals, same order and count as
/// the rest mesh. Reusable across frames to avoid reallocation.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DeformedMesh {
    pub positions: Vec<Vec3>,
    pub normals: Vec<Vec3>,
}

impl DeformedMesh {
    pub fn with_vertex_count(n: usize) -> Self {
        DeformedMesh {
            positions: vec![Vec3::ZERO; n],
            normals: vec![Vec3::ZERO; n],
        }
    }
}

/// Per-frame diagnostics. Degenerate vertices fell back to the identity
/// transform; they are counted, never fatal.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DeformStats {
    pub degenerate_vertices: usize,
}

/// Composes per-frame bone current-to-rest transforms from world transforms
/// and inverse bind matrices (`world * inverse_bind` per bone).
pub fn compose_bone_transforms(
    world: &[Mat4],
    inverse_bind: &[Mat4],
) -> Result<Vec<Mat4>, Error> {
    if world.len() != inverse_bind.len() {
        return Err(Error::MismatchedArrayLengths(
            world.len(),
            inverse_bind.len(),
        ));
    }
    Ok(world
        .iter()
        .zip(inverse_bind.iter())
        .map(|(w, ib)| *w * *ib)
        .collect())
}

/// One deforming instance of a mesh: owns the rest geometry, the smoothed
/// omega set and the buffer layout, and turns per-frame bone transforms into
/// deformed positions and normals.
///
/// The deformation itself is a pure per-vertex function; [`deform`] runs it
/// over a rayon partition of the vertex range (no cross-vertex dependency,
/// joined before returning) and [`deform_sequential`] runs the same function
/// one vertex at a time as the reference path. Both are synchronous within a
/// frame and agree within numerical tolerance.
///
/// [`deform`]: Deformer::deform
/// [`deform_sequential`]: Deformer::deform_sequential
pub struct Deformer {
    rest_positions: Vec<Vec3>,
    rest_normals: Vec<Vec3>,
    weights: Vec<VertexWeights>,
    omegas: OmegaSet,
    layout: ResourceLayout,
}

impl Deformer {
    /// Runs the whole precompute for one mesh instance: adjacency (through
    /// the shared cache), Laplacian weights, then omega smoothing. Weights
    /// must be one record per vertex; bone indices must be below
    /// `bone_count`.
    pub fn new(
        mesh: &RestMesh,
        weights: &[VertexWeights],
        bone_count: usize,
        params: DeformParams,
        cache: &AdjacencyCache,
    ) -> Result<Self, Error> {
        params.validate()?;
        if weights.len() != mesh.vertex_count() {
            return Err(Error::MismatchedArrayLengths(
                weights.len(),
                mesh.vertex_count(),
            ));
        }
        let adjacency = cache.get_or_build(mesh, params.vertex_tolerance)?;
        let laplacian = Laplacian::from_adjacency(&adjacency);
        let omegas = OmegaSet::compute(
            mesh.positions(),
            weights,
            &laplacian,
            bone_count,
            params.iterations,
            params.smooth_lambda,
        )?;
        Ok(Deformer {
            rest_positions: mesh.positions().to_vec(),
            rest_normals: mesh.normals().to_vec(),
            weights: weights.to_vec(),
            omegas,
            layout: ResourceLayout::new(mesh.vertex_count(), bone_count),
        })
    }

    pub fn layout(&self) -> &ResourceLayout {
        &self.layout
    }

    pub fn omegas(&self) -> &OmegaSet {
        &self.omegas
    }

    fn check_bones(&self, bones: &[Mat4]) -> Result<(), Error> {
        if bones.len() != self.layout.bone_count() {
            return Err(Error::MismatchedArrayLengths(
                bones.len(),
                self.layout.bone_count(),
            ));
        }
        Ok(())
    }

    /// Data-parallel deformation, the production path.
    pub fn deform(&self, bones: &[Mat4]) -> Result<(DeformedMesh, DeformStats), Error> {
        let mut out = DeformedMesh::with_vertex_count(self.rest_positions.len());
        let stats = self.deform_into(bones, &mut out)?;
        Ok((out, stats))
    }

    /// Data-parallel deformation into a caller-owned output buffer.
    pub fn deform_into(
        &self,
        bones: &[Mat4],
        out: &mut DeformedMesh,
    ) -> Result<DeformStats, Error> {
        self.check_bones(bones)?;
        let n = self.rest_positions.len();
        out.positions.resize(n, Vec3::ZERO);
        out.normals.resize(n, Vec3::ZERO);
        let degenerate_vertices = out
            .positions
            .par_iter_mut()
            .zip(out.normals.par_iter_mut())
            .enumerate()
            .map(|(v, (pos, norm))| {
                let (p, nrm, degenerate) = deform_vertex(
                    self.rest_positions[v],
                    self.rest_normals[v],
                    self.omegas.slots(v),
                    bones,
                );
                *pos = p;
                *norm = nrm;
                usize::from(degenerate)
            })
            .sum();
        let stats = DeformStats {
            degenerate_vertices,
        };
        log_degenerate(stats);
        Ok(stats)
    }

    /// One-vertex-at-a-time reference path; also the fallback when parallel
    /// dispatch is unavailable or being debugged.
    pub fn deform_sequential(&self, bones: &[Mat4]) -> Result<(DeformedMesh, DeformStats), Error> {
        self.check_bones(bones)?;
        let n = self.rest_positions.len();
        let mut out = DeformedMesh::with_vertex_count(n);
        let mut degenerate_vertices = 0usize;
        for v in 0..n {
            let (p, nrm, degenerate) = deform_vertex(
                self.rest_positions[v],
                self.rest_normals[v],
                self.omegas.slots(v),
                bones,
            );
            out.positions[v] = p;
            out.normals[v] = nrm;
            degenerate_vertices += usize::from(degenerate);
        }
        let stats = DeformStats {
            degenerate_vertices,
        };
        log_degenerate(stats);
        Ok((out, stats))
    }

    /// Plain linear blend skinning from the raw vertex weights, bypassing
    /// the delta mush reconstruction. A debug/comparison policy switch, not
    /// part of the production path. Vertices with no influence pass through
    /// at rest.
    pub fn linear_blend(&self, bones: &[Mat4]) -> Result<DeformedMesh, Error> {
        self.check_bones(bones)?;
        let n = self.rest_positions.len();
        let mut out = DeformedMesh::with_vertex_count(n);
        for v in 0..n {
            let rest = self.rest_positions[v];
            let rest_normal = self.rest_normals[v];
            let mut pos = Vec3::ZERO;
            let mut norm = Vec3::ZERO;
            let mut total = 0.0f32;
            for (bone, w) in self.weights[v].influences() {
                let m = &bones[bone];
                pos += m.transform_point3(rest) * w;
                norm += m.transform_vector3(rest_normal) * w;
                total += w;
            }
            if total > 0.0 {
                out.positions[v] = pos / total;
                out.normals[v] = norm.normalize_or_zero();
            } else {
                out.positions[v] = rest;
                out.normals[v] = rest_normal;
            }
        }
        Ok(out)
    }
}

fn log_degenerate(stats: DeformStats) {
    if stats.degenerate_vertices > 0 {
        log::debug!(
            "{} vertices had degenerate transforms and kept their rest pose",
            stats.degenerate_vertices
        );
    }
}

/// The delta mush reconstruction for one vertex: accumulate `Σ B_b Ω_b`
/// over the vertex's omega slots, extract the best-fit rigid transform, and
/// apply it to the rest position and normal. Pure; both execution strategies
/// call this.
fn deform_vertex(
    position: Vec3,
    normal: Vec3,
    slots: &[OmegaSlot],
    bones: &[Mat4],
) -> (Vec3, Vec3, bool) {
    let mut m = Mat4::ZERO;
    for slot in slots {
        m += bones[slot.bone as usize] * OmegaMatrix::from_components(slot.matrix).to_mat4();
    }
    match rigid::extract_rigid(&m) {
        Some(t) => (t.apply_point(position), t.apply_vector(normal), false),
        None => (position, normal, true),
    }
}
