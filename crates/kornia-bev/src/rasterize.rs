//! Bird's-eye-view rasterization of LiDAR sweeps into detector input channels.

use crate::grid::BevGridSpec;

/// Number of points at which a cell saturates the density channel.
const DENSITY_SATURATION: f64 = 64.0;

/// Bird's-eye-view feature map of a LiDAR sweep.
///
/// Every channel is a row-major `height x width` buffer laid out like the
/// grid it was built from, see [`BevGridSpec::cell_index`].
#[derive(Debug, Clone, PartialEq)]
pub struct BevFeatureMap {
    width: usize,
    height: usize,
    height_map: Vec<f32>,
    intensity_map: Vec<f32>,
    density_map: Vec<f32>,
    points_in_grid: usize,
}

impl BevFeatureMap {
    /// Rasterize LiDAR returns `(x, y, z, intensity)` into a feature map.
    ///
    /// For every cell:
    ///
    /// - height: `(z_top - min_z) / (max_z - min_z)` of its highest point;
    /// - intensity: reflectance of that highest point;
    /// - density: `min(1, ln(n + 1) / ln(64))` for the `n` points it holds.
    ///
    /// Points outside the grid boundary are skipped.
    ///
    /// Example:
    ///
    /// ```
    /// use kornia_bev::grid::BevGridSpec;
    /// use kornia_bev::rasterize::BevFeatureMap;
    ///
    /// let grid = BevGridSpec::kitti_front().unwrap();
    /// let points = vec![[10.0, 0.0, -1.0, 0.5], [-10.0, 0.0, -1.0, 0.5]];
    /// let bev = BevFeatureMap::from_points(&grid, &points);
    /// assert_eq!(bev.points_in_grid(), 1);
    /// ```
    pub fn from_points(grid: &BevGridSpec, points: &[[f64; 4]]) -> Self {
        let num_cells = grid.width() * grid.height();
        let mut counts = vec![0u32; num_cells];
        // height and intensity of the highest point seen so far
        let mut top: Vec<Option<(f64, f64)>> = vec![None; num_cells];
        let mut points_in_grid = 0;

        for p in points {
            let Some((row, col)) = grid.to_cell(&[p[0], p[1], p[2]]) else {
                continue;
            };
            let idx = grid.cell_index(row, col);
            counts[idx] += 1;
            match top[idx] {
                Some((z, _)) if z >= p[2] => {}
                _ => top[idx] = Some((p[2], p[3])),
            }
            points_in_grid += 1;
        }

        let boundary = grid.boundary();
        let z_range = boundary.max_z - boundary.min_z;
        let log_saturation = DENSITY_SATURATION.ln();

        let mut height_map = vec![0.0f32; num_cells];
        let mut intensity_map = vec![0.0f32; num_cells];
        let mut density_map = vec![0.0f32; num_cells];
        for idx in 0..num_cells {
            let Some((z, intensity)) = top[idx] else {
                continue;
            };
            height_map[idx] = ((z - boundary.min_z) / z_range) as f32;
            intensity_map[idx] = intensity as f32;
            density_map[idx] = (((counts[idx] as f64 + 1.0).ln() / log_saturation).min(1.0)) as f32;
        }

        log::debug!(
            "rasterized {points_in_grid} of {} points into a {}x{} grid",
            points.len(),
            grid.height(),
            grid.width()
        );

        Self {
            width: grid.width(),
            height: grid.height(),
            height_map,
            intensity_map,
            density_map,
            points_in_grid,
        }
    }

    /// Number of columns.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Number of rows.
    pub fn height(&self) -> usize {
        self.height
    }

    /// Number of input points that fell inside the grid.
    pub fn points_in_grid(&self) -> usize {
        self.points_in_grid
    }

    /// Normalized height of the highest point per cell.
    pub fn height_map(&self) -> &[f32] {
        &self.height_map
    }

    /// Intensity of the highest point per cell.
    pub fn intensity_map(&self) -> &[f32] {
        &self.intensity_map
    }

    /// Log-scaled point density per cell.
    pub fn density_map(&self) -> &[f32] {
        &self.density_map
    }

    /// Interleave the channels as `[intensity, height, density]` per cell, the
    /// channel-last layout consumed by the detector input.
    pub fn to_interleaved(&self) -> Vec<f32> {
        let mut out = Vec::with_capacity(self.height_map.len() * 3);
        for ((&intensity, &height), &density) in self
            .intensity_map
            .iter()
            .zip(self.height_map.iter())
            .zip(self.density_map.iter())
        {
            out.extend_from_slice(&[intensity, height, density]);
        }
        out
    }
}

/// Keep the LiDAR returns that fall inside the grid boundary.
pub fn filter_points(grid: &BevGridSpec, points: &[[f64; 4]]) -> Vec<[f64; 4]> {
    points
        .iter()
        .filter(|p| grid.to_cell(&[p[0], p[1], p[2]]).is_some())
        .copied()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GridError;
    use crate::grid::Boundary;
    use approx::assert_relative_eq;

    #[test]
    fn test_from_points_channels() -> Result<(), GridError> {
        let grid = BevGridSpec::new(Boundary::new(0.0, 4.0, -2.0, 2.0, -1.0, 1.0)?, 4, 4)?;
        let points = vec![
            // two points in cell (0, 2)
            [3.5, 0.5, 0.0, 0.25],
            [3.6, 0.6, 0.5, 0.75],
            // one point in cell (3, 0)
            [0.5, -1.5, -1.0, 0.1],
            // outside
            [5.0, 0.0, 0.0, 1.0],
        ];
        let bev = BevFeatureMap::from_points(&grid, &points);
        assert_eq!(bev.points_in_grid(), 3);

        let idx = grid.cell_index(0, 2);
        assert_relative_eq!(bev.height_map()[idx], 0.75);
        assert_relative_eq!(bev.intensity_map()[idx], 0.75);
        assert_relative_eq!(bev.density_map()[idx], (3.0f64.ln() / 64.0f64.ln()) as f32);

        let idx = grid.cell_index(3, 0);
        assert_relative_eq!(bev.height_map()[idx], 0.0);
        assert_relative_eq!(bev.intensity_map()[idx], 0.1);
        assert_relative_eq!(bev.density_map()[idx], (2.0f64.ln() / 64.0f64.ln()) as f32);

        let occupied = bev.density_map().iter().filter(|&&d| d > 0.0).count();
        assert_eq!(occupied, 2);
        Ok(())
    }

    #[test]
    fn test_density_saturates() -> Result<(), GridError> {
        let grid = BevGridSpec::new(Boundary::new(0.0, 1.0, 0.0, 1.0, 0.0, 1.0)?, 1, 1)?;
        let points = vec![[0.5, 0.5, 0.5, 0.0]; 100];
        let bev = BevFeatureMap::from_points(&grid, &points);
        assert_eq!(bev.density_map(), &[1.0]);
        Ok(())
    }

    #[test]
    fn test_interleaved_layout() -> Result<(), GridError> {
        let grid = BevGridSpec::new(Boundary::new(0.0, 2.0, 0.0, 2.0, 0.0, 1.0)?, 2, 2)?;
        let bev = BevFeatureMap::from_points(&grid, &[[1.5, 1.5, 1.0, 0.5]]);
        let data = bev.to_interleaved();
        assert_eq!(data.len(), 12);
        let idx = grid.cell_index(0, 1) * 3;
        assert_eq!(&data[idx..idx + 2], &[0.5, 1.0]);
        Ok(())
    }

    #[test]
    fn test_filter_points() -> Result<(), GridError> {
        let grid = BevGridSpec::kitti_front()?;
        let points = vec![[10.0, 0.0, 0.0, 0.3], [10.0, 30.0, 0.0, 0.3], [-5.0, 0.0, 0.0, 0.3]];
        assert_eq!(filter_points(&grid, &points), vec![[10.0, 0.0, 0.0, 0.3]]);
        Ok(())
    }
}
