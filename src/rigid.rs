use glam::{Mat3, Mat4, Quat, Vec3, Vec4};

/// Influence below which a vertex is treated as unskinned.
const WEIGHT_EPS: f32 = 1e-9;

/// Fixed power-iteration count. The shift keeps the leading eigenvalue
/// dominant in magnitude, so convergence is geometric and this is plenty for
/// f32 precision.
const POWER_ITERATIONS: usize = 32;

/// A proper rotation plus translation, the per-vertex result of the delta
/// mush reconstruction.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RigidTransform {
    pub rotation: Mat3,
    pub translation: Vec3,
}

impl RigidTransform {
    pub const IDENTITY: Self = RigidTransform {
        rotation: Mat3::IDENTITY,
        translation: Vec3::ZERO,
    };

    pub fn apply_point(&self, p: Vec3) -> Vec3 {
        self.rotation * p + self.translation
    }

    /// Rotation only; normals must not receive translation.
    pub fn apply_vector(&self, v: Vec3) -> Vec3 {
        self.rotation * v
    }
}

/// Extracts the best-fit rigid transform from an accumulated `Σ B_b Ω_b`
/// matrix.
///
/// The affine bottom row of each bone transform leaves the rest-pose moments
/// in the last row of `m`, while the last column holds the posed moments.
/// Subtracting the centroid outer product leaves the rest-to-posed
/// cross-covariance, whose nearest proper rotation is recovered as the
/// dominant eigenvector of the symmetric 4x4 quaternion matrix (Horn's
/// method). The translation then maps the rest centroid onto the posed one.
///
/// Returns `None` when the accumulated weight is near zero (a vertex with no
/// influence); callers substitute the identity and count the vertex as
/// degenerate.
pub fn extract_rigid(m: &Mat4) -> Option<RigidTransform> {
    let s = m.w_axis.w;
    if s.abs() <= WEIGHT_EPS {
        return None;
    }
    let inv = 1.0 / s;
    // Rest centroid (last row) and posed centroid (last column).
    let p = Vec3::new(m.x_axis.w, m.y_axis.w, m.z_axis.w) * inv;
    let q = m.w_axis.truncate() * inv;
    let cross = Mat3::from_mat4(*m) * inv - outer(q, p);
    let rotation = nearest_rotation(&cross);
    Some(RigidTransform {
        rotation,
        translation: q - rotation * p,
    })
}

/// Column `j` of the result is `a * b[j]`, i.e. `a b^T`.
fn outer(a: Vec3, b: Vec3) -> Mat3 {
    Mat3::from_cols(a * b.x, a * b.y, a * b.z)
}

/// The proper rotation nearest to `c` (a rest-to-posed cross-covariance) by
/// Horn's quaternion formulation: the optimal quaternion is the dominant
/// eigenvector of a symmetric 4x4 built from `c`. A Gershgorin shift makes
/// that eigenvalue the largest in magnitude, then plain power iteration
/// converges to it. A fully degenerate covariance (e.g. all mass at a single
/// point) zeroes the whole matrix and falls back to the identity rotation,
/// which is the right answer: any rotation fits, so none is applied.
fn nearest_rotation(c: &Mat3) -> Mat3 {
    let t = c.transpose();
    let (sxx, sxy, sxz) = (t.x_axis.x, t.y_axis.x, t.z_axis.x);
    let (syx, syy, syz) = (t.x_axis.y, t.y_axis.y, t.z_axis.y);
    let (szx, szy, szz) = (t.x_axis.z, t.y_axis.z, t.z_axis.z);
    let k = Mat4::from_cols(
        Vec4::new(sxx + syy + szz, syz - szy, szx - sxz, sxy - syx),
        Vec4::new(syz - szy, sxx - syy - szz, sxy + syx, szx + sxz),
        Vec4::new(szx - sxz, sxy + syx, syy - sxx - szz, syz + szy),
        Vec4::new(sxy - syx, szx + sxz, syz + szy, szz - sxx - syy),
    );
    let shift = [k.x_axis, k.y_axis, k.z_axis, k.w_axis]
        .iter()
        .map(|col| col.abs().dot(Vec4::ONE))
        .fold(0.0f32, f32::max);
    let shifted = k + Mat4::from_diagonal(Vec4::splat(shift));
    // Quaternion component order here is (w, x, y, z). Start from the
    // largest-norm column of the shifted matrix: it always overlaps the
    // dominant eigenvector, where a fixed start can be exactly orthogonal to
    // it (a 180 degree rotation is orthogonal to the identity quaternion and
    // would leave the iteration stuck on the wrong eigenvector).
    let mut v = [shifted.x_axis, shifted.y_axis, shifted.z_axis, shifted.w_axis]
        .into_iter()
        .fold(Vec4::ZERO, |best, col| {
            if col.length_squared() > best.length_squared() {
                col
            } else {
                best
            }
        })
        .normalize_or_zero();
    if v == Vec4::ZERO {
        return Mat3::IDENTITY;
    }
    for _ in 0..POWER_ITERATIONS {
        let next = (shifted * v).normalize_or_zero();
        if next == Vec4::ZERO {
            return Mat3::IDENTITY;
        }
        v = next;
    }
    Mat3::from_quat(Quat::from_xyzw(v.y, v.z, v.w, v.x).normalize())
}
