/*!
# Delta Mush

Direct delta mush skinning: a smooth-skinning pipeline that bakes Laplacian
smoothing of the skinning weights into per-vertex matrices at load time, then
reconstructs a best-fit rigid transform per vertex at runtime. The result has
the quality of iterative delta mush without any per-frame smoothing.

The pipeline splits into a precompute stage and a runtime stage:

- [`Adjacency`](adjacency::Adjacency) builds vertex neighborhoods from
  triangles, welding coincident vertices across UV or normal seams, and
  [`AdjacencyCache`](cache::AdjacencyCache) shares them between instances of
  the same mesh.
- [`Laplacian`](laplacian::Laplacian) derives the per-vertex smoothing
  weights from the adjacency.
- [`OmegaSet`](omega::OmegaSet) runs the smoothing iterations over weighted
  outer-product matrices, one sparse slot arena for the whole mesh.
- [`Deformer`](deform::Deformer) applies per-frame bone transforms to the
  precomputed set, in parallel or sequentially.

```rust
use delta_mush::{AdjacencyCache, DeformParams, Deformer, MeshId, RestMesh, VertexWeights};
use glam::{Mat4, Vec3};

let mesh = RestMesh::new(
    MeshId(1),
    vec![Vec3::ZERO, Vec3::X, Vec3::Y],
    vec![Vec3::Z, Vec3::Z, Vec3::Z],
    vec![[0, 1, 2]],
)?;
let weights = vec![VertexWeights::single(0); 3];
let cache = AdjacencyCache::new();
let deformer = Deformer::new(&mesh, &weights, 1, DeformParams::default(), &cache)?;
let (deformed, stats) = deformer.deform(&[Mat4::IDENTITY])?;
assert_eq!(mesh.positions(), &deformed.positions[..]);
assert_eq!(0, stats.degenerate_vertices);
# Ok::<(), delta_mush::Error>(())
```
*/

pub mod adjacency;
pub mod cache;
pub mod deform;
pub mod error;
pub mod laplacian;
pub mod layout;
pub mod mesh;
pub mod omega;
pub mod rigid;

pub use adjacency::Adjacency;
pub use cache::AdjacencyCache;
pub use deform::{DeformParams, DeformStats, DeformedMesh, Deformer, compose_bone_transforms};
pub use error::Error;
pub use laplacian::Laplacian;
pub use layout::{DeformedVertex, LaplacianSlot, MAX_SLOTS, OmegaSlot, ResourceLayout, VertexWeights};
pub use mesh::{MeshId, RestMesh};
pub use omega::{OmegaMatrix, OmegaSet};
pub use rigid::{RigidTransform, extract_rigid};
