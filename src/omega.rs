use crate::{
    error::Error,
    laplacian::Laplacian,
    layout::{MAX_SLOTS, OmegaSlot, VertexWeights},
};
use arrayvec::ArrayVec;
use serde::{Deserialize, Serialize};
use std::ops::{Add, AddAssign, Mul};

/// Symmetric 4x4 quadratic form stored as its 10 upper-triangle components
/// (row major). Seeded per vertex and bone as `w * [p; 1][p; 1]^T` from the
/// bind-pose position `p` and skin weight `w`, then diffused over the
/// adjacency graph. `m33` carries the accumulated weight.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct OmegaMatrix {
    pub m00: f32,
    pub m01: f32,
    pub m02: f32,
    pub m03: f32,
    pub m11: f32,
    pub m12: f32,
    pub m13: f32,
    pub m22: f32,
    pub m23: f32,
    pub m33: f32,
}

impl OmegaMatrix {
    /// The weighted outer product `w * [p; 1][p; 1]^T`.
    pub fn weighted_outer(p: glam::Vec3, w: f32) -> Self {
        OmegaMatrix {
            m00: w * p.x * p.x,
            m01: w * p.x * p.y,
            m02: w * p.x * p.z,
            m03: w * p.x,
            m11: w * p.y * p.y,
            m12: w * p.y * p.z,
            m13: w * p.y,
            m22: w * p.z * p.z,
            m23: w * p.z,
            m33: w,
        }
    }

    pub fn from_components(c: [f32; 10]) -> Self {
        OmegaMatrix {
            m00: c[0],
            m01: c[1],
            m02: c[2],
            m03: c[3],
            m11: c[4],
            m12: c[5],
            m13: c[6],
            m22: c[7],
            m23: c[8],
            m33: c[9],
        }
    }

    pub fn components(&self) -> [f32; 10] {
        [
            self.m00, self.m01, self.m02, self.m03, self.m11, self.m12, self.m13, self.m22,
            self.m23, self.m33,
        ]
    }

    /// The accumulated skin weight behind this form.
    pub fn total_weight(&self) -> f32 {
        self.m33
    }

    pub fn to_mat4(self) -> glam::Mat4 {
        glam::Mat4::from_cols(
            glam::vec4(self.m00, self.m01, self.m02, self.m03),
            glam::vec4(self.m01, self.m11, self.m12, self.m13),
            glam::vec4(self.m02, self.m12, self.m22, self.m23),
            glam::vec4(self.m03, self.m13, self.m23, self.m33),
        )
    }
}

impl Add for OmegaMatrix {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        OmegaMatrix {
            m00: self.m00 + rhs.m00,
            m01: self.m01 + rhs.m01,
            m02: self.m02 + rhs.m02,
            m03: self.m03 + rhs.m03,
            m11: self.m11 + rhs.m11,
            m12: self.m12 + rhs.m12,
            m13: self.m13 + rhs.m13,
            m22: self.m22 + rhs.m22,
            m23: self.m23 + rhs.m23,
            m33: self.m33 + rhs.m33,
        }
    }
}

impl AddAssign for OmegaMatrix {
    fn add_assign(&mut self, rhs: Self) {
        self.m00 += rhs.m00;
        self.m01 += rhs.m01;
        self.m02 += rhs.m02;
        self.m03 += rhs.m03;
        self.m11 += rhs.m11;
        self.m12 += rhs.m12;
        self.m13 += rhs.m13;
        self.m22 += rhs.m22;
        self.m23 += rhs.m23;
        self.m33 += rhs.m33;
    }
}

impl Mul<f32> for OmegaMatrix {
    type Output = Self;

    fn mul(self, rhs: f32) -> Self::Output {
        OmegaMatrix {
            m00: self.m00 * rhs,
            m01: self.m01 * rhs,
            m02: self.m02 * rhs,
            m03: self.m03 * rhs,
            m11: self.m11 * rhs,
            m12: self.m12 * rhs,
            m13: self.m13 * rhs,
            m22: self.m22 * rhs,
            m23: self.m23 * rhs,
            m33: self.m33 * rhs,
        }
    }
}

#[derive(Clone, Copy)]
struct Entry {
    bone: i32,
    matrix: OmegaMatrix,
}

type Slots = ArrayVec<Entry, MAX_SLOTS>;

/// Adds a contribution for `bone` into the slot list. When the list is full,
/// the slot with the smallest accumulated weight is replaced only if the
/// incoming contribution carries strictly more weight; ties keep the
/// incumbent at the lowest slot position. Scanning in slot order makes the
/// policy independent of neighbor iteration order.
fn accumulate(slots: &mut Slots, bone: i32, matrix: OmegaMatrix, evictions: &mut usize) {
    if let Some(entry) = slots.iter_mut().find(|e| e.bone == bone) {
        entry.matrix += matrix;
        return;
    }
    if slots.len() < MAX_SLOTS {
        slots.push(Entry { bone, matrix });
        return;
    }
    let (weakest, weakest_weight) = slots
        .iter()
        .enumerate()
        .map(|(i, e)| (i, e.matrix.m33))
        .fold((0, f32::MAX), |acc, (i, w)| if w < acc.1 { (i, w) } else { acc });
    if matrix.m33 > weakest_weight {
        slots[weakest] = Entry { bone, matrix };
    }
    *evictions += 1;
}

/// The per-mesh precompute artifact: for every vertex, up to 32 (bone, omega
/// matrix) slots in a fixed-stride arena. Valid until rest geometry, topology
/// or skin weights change.
#[derive(Debug, PartialEq, Serialize, Deserialize)]
pub struct OmegaSet {
    counts: Vec<u32>,
    slots: Vec<OmegaSlot>,
}

impl OmegaSet {
    /// Seeds a weighted outer-product form per vertex and influencing bone,
    /// then runs `iterations` Laplacian smoothing passes damped by `lambda`:
    /// `new = (1 - lambda) * old + lambda * weighted neighbor average`. Each
    /// pass reads the previous pass's full snapshot and writes a fresh
    /// array, so results do not depend on vertex visiting order. With
    /// `iterations == 0` the result is exactly the unsmoothed seed.
    ///
    /// This is the expensive precompute: `O(iterations * vertices * slots *
    /// neighbors)`. It runs once per mesh, off the per-frame path.
    pub fn compute(
        positions: &[glam::Vec3],
        weights: &[VertexWeights],
        laplacian: &Laplacian,
        bone_count: usize,
        iterations: usize,
        lambda: f32,
    ) -> Result<Self, Error> {
        if positions.len() != weights.len() {
            return Err(Error::MismatchedArrayLengths(
                positions.len(),
                weights.len(),
            ));
        }
        if positions.len() != laplacian.vertex_count() {
            return Err(Error::MismatchedArrayLengths(
                positions.len(),
                laplacian.vertex_count(),
            ));
        }
        for (vertex, vw) in weights.iter().enumerate() {
            for (bone, _) in vw.influences() {
                if bone >= bone_count {
                    return Err(Error::InvalidBoneIndex { vertex, bone });
                }
            }
        }
        let nverts = positions.len();
        let mut evictions = 0usize;
        // Seed.
        let mut current: Vec<Slots> = vec![Slots::new(); nverts];
        for (v, vw) in weights.iter().enumerate() {
            for (bone, w) in vw.influences() {
                accumulate(
                    &mut current[v],
                    bone as i32,
                    OmegaMatrix::weighted_outer(positions[v], w),
                    &mut evictions,
                );
            }
        }
        // Diffuse.
        let keep = 1.0 - lambda;
        for _ in 0..iterations {
            let mut next: Vec<Slots> = Vec::with_capacity(nverts);
            for v in 0..nverts {
                let mut slots = Slots::new();
                for e in &current[v] {
                    accumulate(&mut slots, e.bone, e.matrix * keep, &mut evictions);
                }
                for ls in laplacian.slots(v) {
                    let scale = lambda * ls.weight;
                    for e in &current[ls.index as usize] {
                        accumulate(&mut slots, e.bone, e.matrix * scale, &mut evictions);
                    }
                }
                next.push(slots);
            }
            current = next;
        }
        if evictions > 0 {
            log::debug!("omega slot cap hit {evictions} times across {nverts} vertices");
        }
        // Pack into the fixed-stride arena.
        let mut counts = vec![0u32; nverts];
        let mut packed = vec![OmegaSlot::EMPTY; nverts * MAX_SLOTS];
        for (v, slots) in current.iter().enumerate() {
            let base = v * MAX_SLOTS;
            for (i, e) in slots.iter().enumerate() {
                packed[base + i] = OmegaSlot {
                    bone: e.bone,
                    matrix: e.matrix.components(),
                };
            }
            counts[v] = slots.len() as u32;
        }
        Ok(OmegaSet {
            counts,
            slots: packed,
        })
    }

    pub fn vertex_count(&self) -> usize {
        self.counts.len()
    }

    /// The occupied omega slots for vertex `v`.
    pub fn slots(&self, v: usize) -> &[OmegaSlot] {
        let base = v * MAX_SLOTS;
        &self.slots[base..(base + self.counts[v] as usize)]
    }

    /// Serializes the set for out-of-process reuse. The encoding preserves
    /// f32 bit patterns, so a decode returns the set exactly.
    pub fn to_bytes(&self) -> Result<Vec<u8>, Error> {
        bincode::serialize(self).map_err(|e| Error::OmegaEncodeFailed(e.to_string()))
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, Error> {
        let set: OmegaSet =
            bincode::deserialize(bytes).map_err(|e| Error::OmegaDecodeFailed(e.to_string()))?;
        if set.counts.len() * MAX_SLOTS != set.slots.len() {
            return Err(Error::OmegaDecodeFailed(format!(
                "slot arena length {} does not match {} vertices",
                set.slots.len(),
                set.counts.len()
            )));
        }
        Ok(set)
    }
}

#[cfg(test)]
mod test {
    use super::{OmegaMatrix, OmegaSet};
    use crate::{
        adjacency::Adjacency,
        laplacian::Laplacian,
        layout::{MAX_SLOTS, VertexWeights},
        mesh::samples,
    };

    fn strip_laplacian() -> (crate::mesh::RestMesh, Laplacian) {
        let strip = samples::strip(1);
        let adj = Adjacency::build(strip.positions(), strip.triangles(), MAX_SLOTS, 0.0)
            .expect("Cannot build adjacency");
        let laplacian = Laplacian::from_adjacency(&adj);
        (strip, laplacian)
    }

    #[test]
    fn t_zero_iterations_is_the_seed() {
        let (strip, laplacian) = strip_laplacian();
        let weights = samples::strip_weights(&strip);
        let omegas = OmegaSet::compute(strip.positions(), &weights, &laplacian, 2, 0, 0.9)
            .expect("Cannot compute omegas");
        for (v, vw) in weights.iter().enumerate() {
            let expected: Vec<_> = vw
                .influences()
                .map(|(bone, w)| {
                    (
                        bone as i32,
                        OmegaMatrix::weighted_outer(strip.positions()[v], w).components(),
                    )
                })
                .collect();
            let actual: Vec<_> = omegas
                .slots(v)
                .iter()
                .map(|s| (s.bone, s.matrix))
                .collect();
            assert_eq!(expected, actual);
        }
    }

    #[test]
    fn t_smoothing_reaches_neighbor_bones_and_conserves_weight() {
        let cube = samples::cube(1);
        let adj = Adjacency::build(cube.positions(), cube.triangles(), MAX_SLOTS, 0.0)
            .expect("Cannot build adjacency");
        let laplacian = Laplacian::from_adjacency(&adj);
        let weights = samples::cube_weights_two(&cube);
        let omegas = OmegaSet::compute(cube.positions(), &weights, &laplacian, 2, 1, 0.9)
            .expect("Cannot compute omegas");
        for v in 0..omegas.vertex_count() {
            // One smoothing pass pulls the opposite bone across the split.
            let bones: Vec<i32> = omegas.slots(v).iter().map(|s| s.bone).collect();
            assert!(bones.contains(&0) && bones.contains(&1));
            // Every vertex and all its neighbors start with total weight 1,
            // and the damped average preserves it.
            let total: f32 = omegas.slots(v).iter().map(|s| s.matrix[9]).sum();
            assert!((total - 1.0).abs() < 1e-5);
        }
    }

    #[test]
    fn t_slot_cap_is_respected() {
        // A 40-spoke fan where every spoke is bound to its own bone; the
        // center vertex sees more bones than it has slots.
        let mut positions = vec![glam::Vec3::ZERO];
        let mut triangles = Vec::new();
        let mut weights = vec![VertexWeights::single(0)];
        for i in 0..40u32 {
            let angle = i as f32 * 0.1;
            positions.push(glam::vec3(angle.cos(), angle.sin(), 0.0));
            weights.push(VertexWeights::single(i + 1));
            if i > 0 {
                triangles.push([0, i, i + 1]);
            }
        }
        let adj = Adjacency::build(&positions, &triangles, MAX_SLOTS, 0.0)
            .expect("Cannot build adjacency");
        let laplacian = Laplacian::from_adjacency(&adj);
        let omegas = OmegaSet::compute(&positions, &weights, &laplacian, 41, 2, 0.9)
            .expect("Cannot compute omegas");
        for v in 0..omegas.vertex_count() {
            assert!(omegas.slots(v).len() <= MAX_SLOTS);
        }
        assert_eq!(MAX_SLOTS, omegas.slots(0).len());
    }

    #[test]
    fn t_bone_index_validation() {
        let (strip, laplacian) = strip_laplacian();
        let weights = samples::strip_weights(&strip);
        assert!(matches!(
            OmegaSet::compute(strip.positions(), &weights, &laplacian, 1, 0, 0.9),
            Err(crate::error::Error::InvalidBoneIndex { bone: 1, .. })
        ));
    }

    #[test]
    fn t_bytes_round_trip_exactly() {
        let (strip, laplacian) = strip_laplacian();
        let weights = samples::strip_weights(&strip);
        let omegas = OmegaSet::compute(strip.positions(), &weights, &laplacian, 2, 5, 0.9)
            .expect("Cannot compute omegas");
        let bytes = omegas.to_bytes().expect("Cannot encode omegas");
        let decoded = OmegaSet::from_bytes(&bytes).expect("Cannot decode omegas");
        assert_eq!(omegas, decoded);
    }
}
