//! # LiDAR to image calibration
//!
//! A [`CalibrationSet`] chains three frames:
//!
//! ```text
//! velodyne --velo_to_cam--> camera --rect--> rectified camera --proj--> image
//! ```
//!
//! Every step is a homogeneous matrix product. The rigid and rectifying
//! transforms are square and inverted exactly; the projection is 3x4 and can
//! only be inverted up to the unknown depth along the viewing ray, so it is
//! paired with its Moore-Penrose pseudo-inverse.
//!
//! The primitives are kept separate so callers can skip rectification when
//! their camera does not need it. [`CalibrationSet::velo_to_image`] and
//! [`CalibrationSet::image_to_velo_approx`] chain the full pipeline.

use crate::error::CalibrationError;
use crate::linalg;

/// Smallest accepted `|det|` for the matrices that must be inverted.
const DETERMINANT_EPSILON: f64 = 1e-9;

/// Smallest accepted homogeneous component in a perspective division.
const PROJECTION_EPSILON: f64 = 1e-6;

/// Relative singular value cutoff for the projection rank and pseudo-inverse.
const PINV_RCOND: f64 = 1e-12;

/// Average KITTI velodyne to reference camera transform.
pub const KITTI_VELO_TO_CAM: [[f64; 4]; 4] = [
    [7.49916597e-03, -9.99971248e-01, -8.65110297e-04, -6.71807577e-03],
    [1.18652889e-02, 9.54520517e-04, -9.99910318e-01, -7.33152811e-02],
    [9.99882833e-01, 7.49141178e-03, 1.18719929e-02, -2.78557062e-01],
    [0.0, 0.0, 0.0, 1.0],
];

/// Average KITTI rectifying rotation, padded to 4x4.
pub const KITTI_RECT: [[f64; 4]; 4] = [
    [0.99992475, 0.00975976, -0.00734152, 0.0],
    [-0.0097913, 0.99994262, -0.00430371, 0.0],
    [0.00729911, 0.0043753, 0.99996319, 0.0],
    [0.0, 0.0, 0.0, 1.0],
];

/// Average KITTI projection matrix of the left color camera (P2).
pub const KITTI_PROJ: [[f64; 4]; 3] = [
    [719.787081, 0.0, 608.463003, 44.9538775],
    [0.0, 719.787081, 174.545111, 0.1066855],
    [0.0, 0.0, 1.0, 3.0106472e-03],
];

/// Fixed calibration between a LiDAR, a camera and its image plane.
///
/// All inverses are computed once in [`CalibrationSet::new`]; afterwards the
/// set is read-only and can be shared freely between threads.
#[derive(Debug, Clone, PartialEq)]
pub struct CalibrationSet {
    velo_to_cam: [[f64; 4]; 4],
    velo_to_cam_inv: [[f64; 4]; 4],
    rect: [[f64; 4]; 4],
    rect_inv: [[f64; 4]; 4],
    proj: [[f64; 4]; 3],
    proj_pinv: [[f64; 3]; 4],
    // homogeneous camera center, the right null vector of `proj`
    proj_null: [f64; 4],
}

impl CalibrationSet {
    /// Create a calibration set and derive the inverse transforms.
    ///
    /// # Arguments
    ///
    /// * `velo_to_cam` - Rigid transform from the LiDAR to the reference camera.
    /// * `rect` - Rectifying rotation padded to 4x4.
    /// * `proj` - Projection from the rectified camera to pixels.
    ///
    /// # Errors
    ///
    /// [`CalibrationError::NonFiniteMatrix`] if any matrix holds a NaN or
    /// infinite entry, [`CalibrationError::DegenerateTransform`] if
    /// `velo_to_cam` or `rect` is singular,
    /// [`CalibrationError::RankDeficientProjection`] if `proj` does not have
    /// rank 3.
    pub fn new(
        velo_to_cam: [[f64; 4]; 4],
        rect: [[f64; 4]; 4],
        proj: [[f64; 4]; 3],
    ) -> Result<Self, CalibrationError> {
        check_finite("velo_to_cam", &velo_to_cam)?;
        check_finite("rect", &rect)?;
        check_finite("proj", &proj)?;

        let velo_to_cam_inv = invert("velo_to_cam", &velo_to_cam)?;
        let rect_inv = invert("rect", &rect)?;

        let svd = linalg::projection_svd(&proj, PINV_RCOND);
        if svd.rank != 3 {
            return Err(CalibrationError::RankDeficientProjection { rank: svd.rank });
        }

        log::debug!(
            "calibration ready, projection singular values {:?}",
            svd.singular_values
        );

        Ok(Self {
            velo_to_cam,
            velo_to_cam_inv,
            rect,
            rect_inv,
            proj,
            proj_pinv: svd.pinv,
            proj_null: svd.null_vector,
        })
    }

    /// Calibration averaged over the KITTI training set.
    pub fn kitti() -> Result<Self, CalibrationError> {
        Self::new(KITTI_VELO_TO_CAM, KITTI_RECT, KITTI_PROJ)
    }

    /// LiDAR to reference camera transform.
    pub fn velo_to_cam_matrix(&self) -> &[[f64; 4]; 4] {
        &self.velo_to_cam
    }

    /// Reference camera to LiDAR transform.
    pub fn cam_to_velo_matrix(&self) -> &[[f64; 4]; 4] {
        &self.velo_to_cam_inv
    }

    /// Rectifying rotation.
    pub fn rect_matrix(&self) -> &[[f64; 4]; 4] {
        &self.rect
    }

    /// Inverse of the rectifying rotation.
    pub fn rect_inv_matrix(&self) -> &[[f64; 4]; 4] {
        &self.rect_inv
    }

    /// Projection matrix.
    pub fn proj_matrix(&self) -> &[[f64; 4]; 3] {
        &self.proj
    }

    /// Pseudo-inverse of the projection matrix.
    pub fn proj_pinv_matrix(&self) -> &[[f64; 3]; 4] {
        &self.proj_pinv
    }

    /// Camera center in the rectified frame, `None` for a camera at infinity.
    pub fn camera_center(&self) -> Option<[f64; 3]> {
        let n = &self.proj_null;
        if n[3].abs() < PROJECTION_EPSILON {
            return None;
        }
        Some([n[0] / n[3], n[1] / n[3], n[2] / n[3]])
    }

    /// Convert a point from the LiDAR frame to the reference camera frame.
    pub fn velo_to_cam(&self, p: &[f64; 3]) -> [f64; 3] {
        linalg::transform_point_homogeneous(&self.velo_to_cam, p)
    }

    /// Convert a point from the reference camera frame to the LiDAR frame.
    pub fn cam_to_velo(&self, p: &[f64; 3]) -> [f64; 3] {
        linalg::transform_point_homogeneous(&self.velo_to_cam_inv, p)
    }

    /// Convert a point from the reference camera frame to the rectified frame.
    pub fn rectify(&self, p: &[f64; 3]) -> [f64; 3] {
        linalg::transform_point_homogeneous(&self.rect, p)
    }

    /// Convert a point from the rectified frame to the reference camera frame.
    pub fn unrectify(&self, p: &[f64; 3]) -> [f64; 3] {
        linalg::transform_point_homogeneous(&self.rect_inv, p)
    }

    /// Project a point in the rectified camera frame to pixel coordinates.
    ///
    /// # Errors
    ///
    /// [`CalibrationError::InvalidProjection`] when the point lies on the
    /// camera's principal plane, where the perspective division is undefined.
    /// Points behind the camera still project; callers that care must check
    /// the depth themselves.
    pub fn project(&self, p: &[f64; 3]) -> Result<[f64; 2], CalibrationError> {
        let h = linalg::matvec4(&self.proj, &[p[0], p[1], p[2], 1.0]);
        let w = h[2];
        if w.abs() < PROJECTION_EPSILON {
            return Err(CalibrationError::InvalidProjection { w });
        }
        Ok([h[0] / w, h[1] / w])
    }

    /// Approximate inverse of [`CalibrationSet::project`].
    ///
    /// The projection discards depth, so a pixel only determines a viewing
    /// ray. Without a depth the minimum-norm solution of the pseudo-inverse is
    /// returned, which is *some* point on that ray and not a true round-trip.
    /// With `depth`, the point on the ray whose rectified-frame `z` equals the
    /// depth is returned, e.g. using the range of a paired LiDAR point.
    ///
    /// # Errors
    ///
    /// [`CalibrationError::InvalidProjection`] when the minimum-norm solution
    /// is a point at infinity, or when the ray is parallel to the requested
    /// depth plane.
    pub fn unproject_approx(
        &self,
        pixel: &[f64; 2],
        depth: Option<f64>,
    ) -> Result<[f64; 3], CalibrationError> {
        let h: [f64; 4] = {
            let m = [pixel[0], pixel[1], 1.0];
            let mut h = [0.0; 4];
            for (hi, row) in h.iter_mut().zip(self.proj_pinv.iter()) {
                *hi = row[0] * m[0] + row[1] * m[1] + row[2] * m[2];
            }
            h
        };
        if h[3].abs() < PROJECTION_EPSILON {
            return Err(CalibrationError::InvalidProjection { w: h[3] });
        }
        let on_ray = [h[0] / h[3], h[1] / h[3], h[2] / h[3]];

        let Some(depth) = depth else {
            return Ok(on_ray);
        };

        let direction = match self.camera_center() {
            Some(c) => [on_ray[0] - c[0], on_ray[1] - c[1], on_ray[2] - c[2]],
            None => [self.proj_null[0], self.proj_null[1], self.proj_null[2]],
        };
        if direction[2].abs() < PROJECTION_EPSILON {
            return Err(CalibrationError::InvalidProjection { w: direction[2] });
        }

        let t = (depth - on_ray[2]) / direction[2];
        Ok([
            on_ray[0] + t * direction[0],
            on_ray[1] + t * direction[1],
            depth,
        ])
    }

    /// Project a LiDAR point into the image: `project(rectify(velo_to_cam(p)))`.
    pub fn velo_to_image(&self, p: &[f64; 3]) -> Result<[f64; 2], CalibrationError> {
        self.project(&self.rectify(&self.velo_to_cam(p)))
    }

    /// Approximate inverse of [`CalibrationSet::velo_to_image`].
    ///
    /// `depth` is the rectified-frame depth of the point, see
    /// [`CalibrationSet::unproject_approx`].
    pub fn image_to_velo_approx(
        &self,
        pixel: &[f64; 2],
        depth: Option<f64>,
    ) -> Result<[f64; 3], CalibrationError> {
        let rectified = self.unproject_approx(pixel, depth)?;
        Ok(self.cam_to_velo(&self.unrectify(&rectified)))
    }

    /// Project a batch of LiDAR points into the image.
    ///
    /// Points that cannot be projected map to `None` so a single bad point
    /// never fails the batch.
    pub fn velo_to_image_points(&self, points: &[[f64; 3]]) -> Vec<Option<[f64; 2]>> {
        let mut in_cam = vec![[0.0; 3]; points.len()];
        linalg::transform_points_homogeneous(points, &self.velo_to_cam, &mut in_cam);
        in_cam
            .iter()
            .map(|p| self.project(&self.rectify(p)).ok())
            .collect()
    }
}

fn check_finite<const R: usize>(
    name: &'static str,
    m: &[[f64; 4]; R],
) -> Result<(), CalibrationError> {
    if m.iter().flatten().all(|v| v.is_finite()) {
        Ok(())
    } else {
        Err(CalibrationError::NonFiniteMatrix { name })
    }
}

fn invert(name: &'static str, m: &[[f64; 4]; 4]) -> Result<[[f64; 4]; 4], CalibrationError> {
    let (determinant, inv) = linalg::determinant_and_inverse4(m);
    if !determinant.is_finite() || determinant.abs() < DETERMINANT_EPSILON {
        return Err(CalibrationError::DegenerateTransform { name, determinant });
    }
    Ok(inv)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const POINTS: [[f64; 3]; 4] = [
        [10.0, 1.0, -1.0],
        [20.0, -3.0, 0.5],
        [5.0, 0.0, 0.0],
        [-12.5, 7.25, 1.1],
    ];

    #[test]
    fn test_velo_cam_roundtrip() -> Result<(), CalibrationError> {
        let calib = CalibrationSet::kitti()?;
        for p in POINTS {
            let q = calib.cam_to_velo(&calib.velo_to_cam(&p));
            for i in 0..3 {
                assert_relative_eq!(q[i], p[i], epsilon = 1e-9, max_relative = 1e-6);
            }
        }
        Ok(())
    }

    #[test]
    fn test_rectify_roundtrip() -> Result<(), CalibrationError> {
        let calib = CalibrationSet::kitti()?;
        for p in POINTS {
            let q = calib.unrectify(&calib.rectify(&p));
            for i in 0..3 {
                assert_relative_eq!(q[i], p[i], epsilon = 1e-9, max_relative = 1e-6);
            }
        }
        Ok(())
    }

    #[test]
    fn test_velo_to_cam_known_value() -> Result<(), CalibrationError> {
        let calib = CalibrationSet::kitti()?;
        let cam = calib.velo_to_cam(&[10.0, 1.0, -1.0]);
        assert_relative_eq!(cam[0], -0.930832554, epsilon = 1e-8);
        assert_relative_eq!(cam[1], 1.046202446, epsilon = 1e-8);
        assert_relative_eq!(cam[2], 9.715890687, epsilon = 1e-8);
        Ok(())
    }

    #[test]
    fn test_singular_velo_to_cam() {
        let mut velo_to_cam = KITTI_VELO_TO_CAM;
        velo_to_cam[1] = velo_to_cam[0];
        let res = CalibrationSet::new(velo_to_cam, KITTI_RECT, KITTI_PROJ);
        assert!(matches!(
            res,
            Err(CalibrationError::DegenerateTransform {
                name: "velo_to_cam",
                ..
            })
        ));
    }

    #[test]
    fn test_singular_rect() {
        let mut rect = KITTI_RECT;
        rect[2] = [0.0; 4];
        let res = CalibrationSet::new(KITTI_VELO_TO_CAM, rect, KITTI_PROJ);
        assert!(matches!(
            res,
            Err(CalibrationError::DegenerateTransform { name: "rect", .. })
        ));
    }

    #[test]
    fn test_rank_deficient_projection() {
        let mut proj = KITTI_PROJ;
        proj[2] = [0.0; 4];
        let res = CalibrationSet::new(KITTI_VELO_TO_CAM, KITTI_RECT, proj);
        assert!(matches!(
            res,
            Err(CalibrationError::RankDeficientProjection { rank: 2 })
        ));
    }

    #[test]
    fn test_non_finite_matrices() {
        let mut proj = KITTI_PROJ;
        proj[0][0] = f64::NAN;
        let res = CalibrationSet::new(KITTI_VELO_TO_CAM, KITTI_RECT, proj);
        assert!(matches!(
            res,
            Err(CalibrationError::NonFiniteMatrix { name: "proj" })
        ));

        let mut proj = KITTI_PROJ;
        proj[1][1] = f64::INFINITY;
        let res = CalibrationSet::new(KITTI_VELO_TO_CAM, KITTI_RECT, proj);
        assert!(matches!(
            res,
            Err(CalibrationError::NonFiniteMatrix { name: "proj" })
        ));

        let mut rect = KITTI_RECT;
        rect[2][1] = f64::NEG_INFINITY;
        let res = CalibrationSet::new(KITTI_VELO_TO_CAM, rect, KITTI_PROJ);
        assert!(matches!(
            res,
            Err(CalibrationError::NonFiniteMatrix { name: "rect" })
        ));
    }

    #[test]
    fn test_project_principal_plane() -> Result<(), CalibrationError> {
        let calib = CalibrationSet::kitti()?;
        // w = z + 3.0106472e-03 vanishes on the principal plane
        let res = calib.project(&[1.0, 1.0, -3.0106472e-03]);
        assert!(matches!(res, Err(CalibrationError::InvalidProjection { .. })));
        Ok(())
    }

    #[test]
    fn test_unproject_without_depth_lies_on_ray() -> Result<(), CalibrationError> {
        let calib = CalibrationSet::kitti()?;
        let pixel = [600.0, 200.0];
        let p = calib.unproject_approx(&pixel, None)?;
        let reprojected = calib.project(&p)?;
        assert_relative_eq!(reprojected[0], pixel[0], epsilon = 1e-6);
        assert_relative_eq!(reprojected[1], pixel[1], epsilon = 1e-6);
        Ok(())
    }

    #[test]
    fn test_unproject_with_depth_recovers_point() -> Result<(), CalibrationError> {
        let calib = CalibrationSet::kitti()?;
        let p = [2.5, -0.75, 18.0];
        let pixel = calib.project(&p)?;
        let q = calib.unproject_approx(&pixel, Some(p[2]))?;
        for i in 0..3 {
            assert_relative_eq!(q[i], p[i], epsilon = 1e-6);
        }
        Ok(())
    }

    #[test]
    fn test_camera_center_projects_nowhere() -> Result<(), CalibrationError> {
        let calib = CalibrationSet::kitti()?;
        let Some(c) = calib.camera_center() else {
            panic!("the KITTI camera center is finite");
        };
        assert!(calib.project(&c).is_err());
        Ok(())
    }

    // orthographic camera: pixels are the rectified x and y, depth is lost
    fn orthographic() -> Result<CalibrationSet, CalibrationError> {
        let identity = [
            [1.0, 0.0, 0.0, 0.0],
            [0.0, 1.0, 0.0, 0.0],
            [0.0, 0.0, 1.0, 0.0],
            [0.0, 0.0, 0.0, 1.0],
        ];
        let proj = [
            [1.0, 0.0, 0.0, 0.0],
            [0.0, 1.0, 0.0, 0.0],
            [0.0, 0.0, 0.0, 1.0],
        ];
        CalibrationSet::new(identity, identity, proj)
    }

    #[test]
    fn test_camera_at_infinity() -> Result<(), CalibrationError> {
        let calib = orthographic()?;
        assert_eq!(calib.camera_center(), None);

        let pixel = [3.5, -2.0];
        let p = calib.unproject_approx(&pixel, None)?;
        assert_relative_eq!(p[0], 3.5, epsilon = 1e-12);
        assert_relative_eq!(p[1], -2.0, epsilon = 1e-12);
        assert_relative_eq!(p[2], 0.0, epsilon = 1e-12);

        // the viewing ray runs along z, so sliding to a depth keeps x and y
        let q = calib.unproject_approx(&pixel, Some(7.25))?;
        assert_relative_eq!(q[0], 3.5, epsilon = 1e-12);
        assert_relative_eq!(q[1], -2.0, epsilon = 1e-12);
        assert_relative_eq!(q[2], 7.25, epsilon = 1e-12);

        let reprojected = calib.project(&q)?;
        assert_relative_eq!(reprojected[0], pixel[0], epsilon = 1e-12);
        assert_relative_eq!(reprojected[1], pixel[1], epsilon = 1e-12);
        Ok(())
    }

    #[test]
    fn test_image_to_velo_without_depth() -> Result<(), CalibrationError> {
        let calib = CalibrationSet::kitti()?;
        let pixel = [540.0, 250.0];
        let p = calib.image_to_velo_approx(&pixel, None)?;
        let reprojected = calib.velo_to_image(&p)?;
        assert_relative_eq!(reprojected[0], pixel[0], epsilon = 1e-6);
        assert_relative_eq!(reprojected[1], pixel[1], epsilon = 1e-6);
        Ok(())
    }

    #[test]
    fn test_velo_to_image_points_skips_invalid() -> Result<(), CalibrationError> {
        let calib = CalibrationSet::kitti()?;
        // find a LiDAR point on the principal plane by inverting a rectified one
        let on_plane = calib.cam_to_velo(&calib.unrectify(&[1.0, 1.0, -3.0106472e-03]));
        let projected = calib.velo_to_image_points(&[[10.0, 1.0, -1.0], on_plane]);
        assert_eq!(projected.len(), 2);
        assert!(projected[0].is_some());
        assert!(projected[1].is_none());
        Ok(())
    }
}
