#[derive(Debug)]
pub enum Error {
    // Topology.
    /// A triangle references a vertex index outside the mesh.
    InvalidTopology { triangle: usize, index: usize },
    EmptyMesh,
    MismatchedArrayLengths(usize, usize),
    // Skinning inputs.
    InvalidBoneIndex { vertex: usize, bone: usize },
    /// A tunable is outside its valid range. The payload names the parameter.
    InvalidParameter(&'static str),
    // Omega persistence.
    OmegaEncodeFailed(String),
    OmegaDecodeFailed(String),
}
