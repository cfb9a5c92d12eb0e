use crate::error::Error;
use std::collections::BTreeSet;

/// Per-vertex neighbor lists derived from triangle topology, stored in a
/// fixed-stride arena (`max_neighbors` slots per vertex, `-1` padding) so the
/// same table can back both execution strategies.
///
/// Two distinct vertices whose squared distance is within the matching
/// tolerance are treated as coincident: they become mutually adjacent and
/// every triangle-edge neighbor of one is shared with all of its coincident
/// partners. This lets smoothing propagate across UV and normal seams, where
/// the same geometric point is duplicated under multiple indices.
///
/// When a vertex has more true neighbors than slots, the lowest vertex
/// indices are kept. The choice is arbitrary but deterministic; it does not
/// depend on triangle order or floating point ties.
pub struct Adjacency {
    max_neighbors: usize,
    counts: Vec<u32>,
    entries: Vec<i32>,
    capped_vertices: usize,
}

impl Adjacency {
    /// Builds the neighbor table. Fails with [`Error::InvalidTopology`] if a
    /// triangle references a vertex outside `positions`, before any other
    /// work is done. `tolerance_sq` is the squared coincidence tolerance; a
    /// non-positive value disables vertex merging.
    pub fn build(
        positions: &[glam::Vec3],
        triangles: &[[u32; 3]],
        max_neighbors: usize,
        tolerance_sq: f32,
    ) -> Result<Self, Error> {
        let nverts = positions.len();
        for (ti, tri) in triangles.iter().enumerate() {
            for &i in tri {
                if i as usize >= nverts {
                    return Err(Error::InvalidTopology {
                        triangle: ti,
                        index: i as usize,
                    });
                }
            }
        }
        // Group coincident vertices. The first matching representative wins,
        // which keeps the grouping deterministic.
        let mut group = vec![0u32; nverts];
        let mut members: Vec<Vec<u32>> = Vec::new();
        if tolerance_sq > 0.0 {
            for (i, p) in positions.iter().enumerate() {
                match members
                    .iter()
                    .position(|m| positions[m[0] as usize].distance_squared(*p) <= tolerance_sq)
                {
                    Some(g) => {
                        group[i] = g as u32;
                        members[g].push(i as u32);
                    }
                    None => {
                        group[i] = members.len() as u32;
                        members.push(vec![i as u32]);
                    }
                }
            }
        } else {
            group = (0..nverts as u32).collect();
            members = group.iter().map(|&i| vec![i]).collect();
        }
        let mut sets: Vec<BTreeSet<u32>> = vec![BTreeSet::new(); nverts];
        // Coincident duplicates are mutually adjacent.
        for m in members.iter().filter(|m| m.len() > 1) {
            for &a in m {
                for &b in m {
                    if a != b {
                        sets[a as usize].insert(b);
                    }
                }
            }
        }
        // Triangle edges, expanded across the coincident groups of both
        // endpoints.
        for tri in triangles {
            for (a, b) in [(tri[0], tri[1]), (tri[1], tri[2]), (tri[2], tri[0])] {
                for &m in &members[group[a as usize] as usize] {
                    for &t in &members[group[b as usize] as usize] {
                        if m != t {
                            sets[m as usize].insert(t);
                            sets[t as usize].insert(m);
                        }
                    }
                }
            }
        }
        // Pack into the fixed-stride arena, ascending index order.
        let mut counts = vec![0u32; nverts];
        let mut entries = vec![-1i32; nverts * max_neighbors];
        let mut capped_vertices = 0usize;
        for (i, set) in sets.iter().enumerate() {
            if set.len() > max_neighbors {
                capped_vertices += 1;
            }
            let base = i * max_neighbors;
            for (slot, &nb) in set.iter().take(max_neighbors).enumerate() {
                entries[base + slot] = nb as i32;
                counts[i] += 1;
            }
        }
        if capped_vertices > 0 {
            log::debug!(
                "adjacency neighbor cap ({max_neighbors}) hit for {capped_vertices} of {nverts} vertices"
            );
        }
        Ok(Adjacency {
            max_neighbors,
            counts,
            entries,
            capped_vertices,
        })
    }

    pub fn vertex_count(&self) -> usize {
        self.counts.len()
    }

    pub fn max_neighbors(&self) -> usize {
        self.max_neighbors
    }

    pub fn degree(&self, v: usize) -> usize {
        self.counts[v] as usize
    }

    /// Neighbor vertex indices of `v`, in ascending order.
    pub fn neighbors(&self, v: usize) -> impl Iterator<Item = usize> + '_ {
        let base = v * self.max_neighbors;
        self.entries[base..(base + self.counts[v] as usize)]
            .iter()
            .map(|&i| i as usize)
    }

    /// Number of vertices whose true neighbor count exceeded the slot cap.
    pub fn capped_vertices(&self) -> usize {
        self.capped_vertices
    }
}

#[cfg(test)]
mod test {
    use super::Adjacency;
    use crate::{error::Error, layout::MAX_SLOTS, mesh::samples};

    #[test]
    fn t_cube_adjacency() {
        let cube = samples::cube(1);
        let adj = Adjacency::build(cube.positions(), cube.triangles(), MAX_SLOTS, 0.0)
            .expect("Cannot build adjacency");
        assert_eq!(8, adj.vertex_count());
        assert_eq!(vec![1, 2, 3, 4, 5], adj.neighbors(0).collect::<Vec<_>>());
        for v in 0..adj.vertex_count() {
            // Triangulated cube corners have 4 to 6 neighbors, and the
            // relation is symmetric.
            assert!(adj.degree(v) >= 4 && adj.degree(v) <= 6);
            for n in adj.neighbors(v) {
                assert!(adj.neighbors(n).any(|m| m == v));
            }
        }
        assert_eq!(0, adj.capped_vertices());
    }

    #[test]
    fn t_seam_merging() {
        // Two triangles meeting at x = 1, with the shared corner duplicated
        // as vertices 1 and 3 (a typical UV seam).
        let positions = vec![
            glam::vec3(0.0, 0.0, 0.0),
            glam::vec3(1.0, 0.0, 0.0),
            glam::vec3(0.5, 1.0, 0.0),
            glam::vec3(1.0, 0.0, 0.0),
            glam::vec3(2.0, 0.0, 0.0),
        ];
        let triangles = vec![[0, 1, 2], [3, 4, 2]];
        let merged = Adjacency::build(&positions, &triangles, MAX_SLOTS, 1e-8)
            .expect("Cannot build adjacency");
        // Both copies see the full neighborhood on either side of the seam.
        assert_eq!(vec![0, 2, 3, 4], merged.neighbors(1).collect::<Vec<_>>());
        assert_eq!(vec![0, 1, 2, 4], merged.neighbors(3).collect::<Vec<_>>());
        // Without the tolerance the seam splits the neighborhoods.
        let split = Adjacency::build(&positions, &triangles, MAX_SLOTS, 0.0)
            .expect("Cannot build adjacency");
        assert_eq!(vec![0, 2], split.neighbors(1).collect::<Vec<_>>());
        assert_eq!(vec![2, 4], split.neighbors(3).collect::<Vec<_>>());
    }

    #[test]
    fn t_neighbor_cap_keeps_lowest_indices() {
        // A fan with 40 spokes around vertex 0.
        let mut positions = vec![glam::Vec3::ZERO];
        let mut triangles = Vec::new();
        for i in 0..40u32 {
            let angle = i as f32 * 0.1;
            positions.push(glam::vec3(angle.cos(), angle.sin(), 0.0));
            if i > 0 {
                triangles.push([0, i, i + 1]);
            }
        }
        let adj = Adjacency::build(&positions, &triangles, MAX_SLOTS, 0.0)
            .expect("Cannot build adjacency");
        assert_eq!(MAX_SLOTS, adj.degree(0));
        assert_eq!(
            (1..=MAX_SLOTS).collect::<Vec<_>>(),
            adj.neighbors(0).collect::<Vec<_>>()
        );
        assert_eq!(1, adj.capped_vertices());
    }

    #[test]
    fn t_out_of_range_index() {
        let positions = vec![glam::Vec3::ZERO, glam::Vec3::X, glam::Vec3::Y];
        assert!(matches!(
            Adjacency::build(&positions, &[[0, 1, 2], [1, 2, 7]], MAX_SLOTS, 0.0),
            Err(Error::InvalidTopology {
                triangle: 1,
                index: 7
            })
        ));
    }
}
