use crate::{adjacency::Adjacency, layout::LaplacianSlot};

/// Normalized smoothing weights over the adjacency graph, one slot per
/// neighbor, fixed stride. Uniform `1/k` weighting is used instead of
/// cotangent or distance weights: the omega diffusion only needs a smooth
/// average, and uniform weights stay stable on thin or irregular triangles.
pub struct Laplacian {
    stride: usize,
    counts: Vec<u32>,
    slots: Vec<LaplacianSlot>,
}

impl Laplacian {
    pub fn from_adjacency(adjacency: &Adjacency) -> Self {
        let stride = adjacency.max_neighbors();
        let nverts = adjacency.vertex_count();
        let mut counts = vec![0u32; nverts];
        let mut slots = vec![LaplacianSlot::EMPTY; nverts * stride];
        for v in 0..nverts {
            let degree = adjacency.degree(v);
            if degree == 0 {
                continue;
            }
            let weight = 1.0 / degree as f32;
            let base = v * stride;
            for (slot, n) in adjacency.neighbors(v).enumerate() {
                slots[base + slot] = LaplacianSlot {
                    index: n as i32,
                    weight,
                };
            }
            counts[v] = degree as u32;
        }
        Laplacian {
            stride,
            counts,
            slots,
        }
    }

    pub fn vertex_count(&self) -> usize {
        self.counts.len()
    }

    /// The occupied smoothing slots for vertex `v`.
    pub fn slots(&self, v: usize) -> &[LaplacianSlot] {
        let base = v * self.stride;
        &self.slots[base..(base + self.counts[v] as usize)]
    }
}
