//! Small fixed-size matrix helpers backed by `faer`.

use faer::prelude::SolverCore;

/// Dot product of two 4-vectors.
#[inline]
pub fn dot_product4(a: &[f64; 4], b: &[f64; 4]) -> f64 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2] + a[3] * b[3]
}

/// Multiply a row-major `R x 4` matrix by a 4-vector.
#[inline]
pub fn matvec4<const R: usize>(m: &[[f64; 4]; R], v: &[f64; 4]) -> [f64; R] {
    let mut out = [0.0; R];
    for (o, row) in out.iter_mut().zip(m.iter()) {
        *o = dot_product4(row, v);
    }
    out
}

/// Transform a 3D point with a 4x4 homogeneous matrix.
///
/// The point is extended with a unit fourth component, multiplied by `m`, and
/// the homogeneous component of the result is dropped.
///
/// Example:
///
/// ```
/// use kornia_bev::linalg::transform_point_homogeneous;
///
/// let m = [
///     [1.0, 0.0, 0.0, 1.0],
///     [0.0, 1.0, 0.0, 2.0],
///     [0.0, 0.0, 1.0, 3.0],
///     [0.0, 0.0, 0.0, 1.0],
/// ];
/// let p = transform_point_homogeneous(&m, &[1.0, 1.0, 1.0]);
/// assert_eq!(p, [2.0, 3.0, 4.0]);
/// ```
#[inline]
pub fn transform_point_homogeneous(m: &[[f64; 4]; 4], p: &[f64; 3]) -> [f64; 3] {
    let h = matvec4(m, &[p[0], p[1], p[2], 1.0]);
    [h[0], h[1], h[2]]
}

/// Transform a set of points with a 4x4 homogeneous matrix.
///
/// # Arguments
///
/// * `src_points` - The points to transform.
/// * `m` - The homogeneous transform.
/// * `dst_points` - A pre-allocated slice receiving the transformed points.
///
/// PRECONDITION: `dst_points` has the same length as `src_points`.
pub fn transform_points_homogeneous(
    src_points: &[[f64; 3]],
    m: &[[f64; 4]; 4],
    dst_points: &mut [[f64; 3]],
) {
    assert_eq!(src_points.len(), dst_points.len());
    for (dst, src) in dst_points.iter_mut().zip(src_points.iter()) {
        *dst = transform_point_homogeneous(m, src);
    }
}

/// Copy a row-major array matrix into an owned faer matrix.
pub fn array_to_faer_mat<const R: usize, const C: usize>(m: &[[f64; C]; R]) -> faer::Mat<f64> {
    faer::Mat::<f64>::from_fn(R, C, |i, j| m[i][j])
}

/// Copy a faer matrix into a row-major array matrix.
///
/// PRECONDITION: `m` has shape `R x C`.
pub fn faer_mat_to_array<const R: usize, const C: usize>(
    m: faer::MatRef<'_, f64>,
) -> [[f64; C]; R] {
    assert_eq!((m.nrows(), m.ncols()), (R, C));
    let mut out = [[0.0; C]; R];
    for (i, row) in out.iter_mut().enumerate() {
        for (j, val) in row.iter_mut().enumerate() {
            *val = m.read(i, j);
        }
    }
    out
}

/// Determinant and inverse of a 4x4 matrix computed with a partial pivoting LU.
///
/// Returns the determinant together with the inverse. The inverse is only
/// meaningful when the determinant is finite and bounded away from zero;
/// callers decide the threshold.
///
/// For an exactly singular matrix the LU pivot is zero, so the determinant
/// comes back as NaN rather than as zero and the inverse holds NaN entries.
pub fn determinant_and_inverse4(m: &[[f64; 4]; 4]) -> (f64, [[f64; 4]; 4]) {
    let mat = array_to_faer_mat(m);
    let det = mat.determinant();
    let inv = mat.partial_piv_lu().inverse();
    (det, faer_mat_to_array(inv.as_ref()))
}

/// Singular value decomposition products of a 3x4 projection matrix.
#[derive(Debug, Clone)]
pub struct ProjectionSvd {
    /// Moore-Penrose pseudo-inverse, shape 4x3.
    pub pinv: [[f64; 3]; 4],
    /// Singular values in decreasing order.
    pub singular_values: [f64; 3],
    /// Numerical rank.
    pub rank: usize,
    /// Right singular vector of the smallest singular value, i.e. the
    /// homogeneous null vector of the matrix when the rank is 3.
    pub null_vector: [f64; 4],
}

/// Compute the pseudo-inverse, rank and null vector of a 3x4 matrix via SVD.
///
/// Singular values below `rcond * s_max` are treated as zero, matching the
/// usual `pinv` cutoff.
///
/// Example:
///
/// ```
/// use kornia_bev::linalg::projection_svd;
///
/// let p = [
///     [1.0, 0.0, 0.0, 0.0],
///     [0.0, 1.0, 0.0, 0.0],
///     [0.0, 0.0, 1.0, 0.0],
/// ];
/// let svd = projection_svd(&p, 1e-15);
/// assert_eq!(svd.rank, 3);
/// ```
pub fn projection_svd(m: &[[f64; 4]; 3], rcond: f64) -> ProjectionSvd {
    let mat = array_to_faer_mat(m);
    let svd = mat.svd();
    let (u, s, v) = (svd.u(), svd.s_diagonal(), svd.v());

    let mut singular_values = [0.0; 3];
    for (k, val) in singular_values.iter_mut().enumerate() {
        *val = s.read(k);
    }

    let cutoff = rcond * singular_values[0];
    let mut rank = 0;
    let mut pinv = [[0.0; 3]; 4];
    for (k, &sigma) in singular_values.iter().enumerate() {
        if sigma <= cutoff {
            continue;
        }
        rank += 1;
        // pinv += v_k * (1 / s_k) * u_k^T
        let inv_sigma = 1.0 / sigma;
        for (i, row) in pinv.iter_mut().enumerate() {
            let vik = v.read(i, k) * inv_sigma;
            for (j, val) in row.iter_mut().enumerate() {
                *val += vik * u.read(j, k);
            }
        }
    }

    let mut null_vector = [0.0; 4];
    for (i, val) in null_vector.iter_mut().enumerate() {
        *val = v.read(i, 3);
    }

    ProjectionSvd {
        pinv,
        singular_values,
        rank,
        null_vector,
    }
}
