use bytemuck::{Pod, Zeroable};
use serde::{Deserialize, Serialize};

/// Fixed per-vertex slot capacity shared by the adjacency, Laplacian and
/// omega buffers. Entries beyond this cap are dropped by the deterministic
/// eviction policies documented on [`crate::Adjacency`] and
/// [`crate::OmegaSet`].
pub const MAX_SLOTS: usize = 32;

/// Up to four (bone, weight) influences for one vertex. Unused slots hold
/// bone `-1` and weight `0`. Weights are not required to sum to one.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct VertexWeights {
    pub weights: [f32; 4],
    pub bones: [i32; 4],
}

impl Default for VertexWeights {
    fn default() -> Self {
        Self::NONE
    }
}

impl VertexWeights {
    pub const NONE: Self = VertexWeights {
        weights: [0.0; 4],
        bones: [-1; 4],
    };

    /// Takes up to the first four influences.
    pub fn new(influences: &[(u32, f32)]) -> Self {
        let mut vw = Self::NONE;
        for (slot, &(bone, weight)) in influences.iter().take(4).enumerate() {
            vw.bones[slot] = bone as i32;
            vw.weights[slot] = weight;
        }
        vw
    }

    /// A vertex fully bound to a single bone.
    pub fn single(bone: u32) -> Self {
        Self::new(&[(bone, 1.0)])
    }

    /// The occupied (bone, weight) pairs, skipping empty and zero-weight
    /// slots.
    pub fn influences(&self) -> impl Iterator<Item = (usize, f32)> + '_ {
        self.bones
            .iter()
            .zip(self.weights.iter())
            .filter(|&(&b, &w)| b >= 0 && w != 0.0)
            .map(|(&b, &w)| (b as usize, w))
    }
}

/// One omega slot: a bone index and the 10 upper-triangle components of its
/// symmetric 4x4 omega matrix. Bone `-1` marks an empty slot.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable, Serialize, Deserialize)]
pub struct OmegaSlot {
    pub bone: i32,
    pub matrix: [f32; 10],
}

impl OmegaSlot {
    pub const EMPTY: Self = OmegaSlot {
        bone: -1,
        matrix: [0.0; 10],
    };
}

/// One smoothing slot: a neighbor vertex index and its Laplacian weight.
/// Index `-1` marks an empty slot.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct LaplacianSlot {
    pub index: i32,
    pub weight: f32,
}

impl LaplacianSlot {
    pub const EMPTY: Self = LaplacianSlot {
        index: -1,
        weight: 0.0,
    };
}

/// One deformed output vertex.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct DeformedVertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
}

/// Sizing table for the fixed-capacity buffers shared by the precompute and
/// runtime stages. All sizes are fixed when the mesh is loaded; only buffer
/// contents change per frame (bone transforms in, positions and normals out).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ResourceLayout {
    vertex_count: usize,
    bone_count: usize,
}

impl ResourceLayout {
    pub fn new(vertex_count: usize, bone_count: usize) -> Self {
        ResourceLayout {
            vertex_count,
            bone_count,
        }
    }

    pub fn vertex_count(&self) -> usize {
        self.vertex_count
    }

    pub fn bone_count(&self) -> usize {
        self.bone_count
    }

    /// Rest positions, one `[f32; 3]` per vertex.
    pub fn vertices_bytes(&self) -> usize {
        self.vertex_count * 3 * size_of::<f32>()
    }

    /// Rest normals, same shape as positions.
    pub fn normals_bytes(&self) -> usize {
        self.vertices_bytes()
    }

    pub fn weights_bytes(&self) -> usize {
        self.vertex_count * size_of::<VertexWeights>()
    }

    /// Bone current-to-rest transforms, one 4x4 matrix per bone.
    pub fn bones_bytes(&self) -> usize {
        self.bone_count * 16 * size_of::<f32>()
    }

    pub fn omega_slot_count(&self) -> usize {
        self.vertex_count * MAX_SLOTS
    }

    pub fn omegas_bytes(&self) -> usize {
        self.omega_slot_count() * size_of::<OmegaSlot>()
    }

    pub fn laplacian_slot_count(&self) -> usize {
        self.vertex_count * MAX_SLOTS
    }

    pub fn laplacian_bytes(&self) -> usize {
        self.laplacian_slot_count() * size_of::<LaplacianSlot>()
    }

    pub fn output_bytes(&self) -> usize {
        self.vertex_count * size_of::<DeformedVertex>()
    }
}

#[cfg(test)]
mod test {
    use super::{DeformedVertex, LaplacianSlot, OmegaSlot, ResourceLayout, VertexWeights};

    #[test]
    fn t_record_strides() {
        // The records must match the strides of the shared buffer schema:
        // weights 4 floats + 4 ints, omega 1 int + 10 floats, laplacian 1 int
        // + 1 float, output 6 floats.
        assert_eq!(32, size_of::<VertexWeights>());
        assert_eq!(44, size_of::<OmegaSlot>());
        assert_eq!(8, size_of::<LaplacianSlot>());
        assert_eq!(24, size_of::<DeformedVertex>());
    }

    #[test]
    fn t_layout_sizes() {
        let layout = ResourceLayout::new(100, 4);
        assert_eq!(1200, layout.vertices_bytes());
        assert_eq!(1200, layout.normals_bytes());
        assert_eq!(3200, layout.weights_bytes());
        assert_eq!(256, layout.bones_bytes());
        assert_eq!(3200, layout.omega_slot_count());
        assert_eq!(140800, layout.omegas_bytes());
        assert_eq!(25600, layout.laplacian_bytes());
        assert_eq!(2400, layout.output_bytes());
    }

    #[test]
    fn t_vertex_weights_influences() {
        let vw = VertexWeights::new(&[(0, 0.5), (3, 0.25), (7, 0.0)]);
        assert_eq!(
            vec![(0usize, 0.5f32), (3, 0.25)],
            vw.influences().collect::<Vec<_>>()
        );
        assert_eq!(0, VertexWeights::NONE.influences().count());
    }
}
