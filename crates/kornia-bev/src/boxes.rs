//! Oriented 3D detection boxes and their image projection.

use crate::calibration::CalibrationSet;
use crate::error::CalibrationError;

/// An oriented 3D box in the rectified camera frame, KITTI label convention.
///
/// `(x, y, z)` is the center of the bottom face. The camera Y axis points
/// down, so the box extends from `y - h` to `y`. `ry` is the rotation around
/// the camera Y axis; `ry = 0` aligns the length with the X axis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Box3d {
    /// Height.
    pub h: f64,
    /// Width.
    pub w: f64,
    /// Length.
    pub l: f64,
    /// Bottom center X.
    pub x: f64,
    /// Bottom center Y.
    pub y: f64,
    /// Bottom center Z.
    pub z: f64,
    /// Yaw around the camera Y axis.
    pub ry: f64,
}

impl Box3d {
    /// The eight corners of the box.
    ///
    /// Corners 0..4 form the bottom face and 4..8 the top face, both in the
    /// same winding order so that corner `i + 4` is above corner `i`.
    pub fn corners(&self) -> [[f64; 3]; 8] {
        let (l2, w2) = (self.l / 2.0, self.w / 2.0);
        let xs = [l2, l2, -l2, -l2, l2, l2, -l2, -l2];
        let ys = [0.0, 0.0, 0.0, 0.0, -self.h, -self.h, -self.h, -self.h];
        let zs = [w2, -w2, -w2, w2, w2, -w2, -w2, w2];

        let (s, c) = self.ry.sin_cos();
        let mut corners = [[0.0; 3]; 8];
        for (i, corner) in corners.iter_mut().enumerate() {
            *corner = [
                c * xs[i] + s * zs[i] + self.x,
                ys[i] + self.y,
                -s * xs[i] + c * zs[i] + self.z,
            ];
        }
        corners
    }
}

/// Project the corners of a box into the image.
///
/// # Errors
///
/// [`CalibrationError::InvalidProjection`] if any corner cannot be projected.
pub fn project_box(
    calib: &CalibrationSet,
    bbox: &Box3d,
) -> Result<[[f64; 2]; 8], CalibrationError> {
    let mut pixels = [[0.0; 2]; 8];
    for (pixel, corner) in pixels.iter_mut().zip(bbox.corners().iter()) {
        *pixel = calib.project(corner)?;
    }
    Ok(pixels)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_corners_axis_aligned() {
        let bbox = Box3d {
            h: 1.5,
            w: 1.6,
            l: 4.0,
            x: 1.0,
            y: 1.7,
            z: 10.0,
            ry: 0.0,
        };
        let corners = bbox.corners();
        for (got, expected) in [(corners[0], [3.0, 1.7, 10.8]), (corners[6], [-1.0, 0.2, 9.2])] {
            for i in 0..3 {
                assert_relative_eq!(got[i], expected[i], epsilon = 1e-12);
            }
        }
        for i in 0..4 {
            assert_relative_eq!(corners[i + 4][1], corners[i][1] - 1.5);
        }
    }

    #[test]
    fn test_corners_rotated() {
        let bbox = Box3d {
            h: 1.0,
            w: 2.0,
            l: 4.0,
            x: 0.0,
            y: 0.0,
            z: 0.0,
            ry: std::f64::consts::FRAC_PI_2,
        };
        // a quarter turn maps the length onto -Z
        let corners = bbox.corners();
        assert_relative_eq!(corners[0][0], 1.0, epsilon = 1e-12);
        assert_relative_eq!(corners[0][2], -2.0, epsilon = 1e-12);
    }

    #[test]
    fn test_project_box() -> Result<(), CalibrationError> {
        let calib = CalibrationSet::kitti()?;
        let bbox = Box3d {
            h: 1.5,
            w: 1.6,
            l: 4.0,
            x: 0.0,
            y: 1.7,
            z: 15.0,
            ry: 0.3,
        };
        let pixels = project_box(&calib, &bbox)?;
        for (pixel, corner) in pixels.iter().zip(bbox.corners().iter()) {
            let expected = calib.project(corner)?;
            assert_eq!(*pixel, expected);
        }
        // the top face is above the bottom face in the image
        for i in 0..4 {
            assert!(pixels[i + 4][1] < pixels[i][1]);
        }
        Ok(())
    }

    #[test]
    fn test_project_box_on_principal_plane() -> Result<(), CalibrationError> {
        let calib = CalibrationSet::kitti()?;
        let bbox = Box3d {
            h: 1.0,
            w: 2.0,
            l: 2.0,
            x: 0.0,
            y: 0.0,
            z: -3.0106472e-03 - 1.0,
            ry: 0.0,
        };
        assert!(project_box(&calib, &bbox).is_err());
        Ok(())
    }
}
