//! # Bird's-eye-view grid
//!
//! A [`BevGridSpec`] discretizes an axis-aligned box of the LiDAR frame into a
//! `height x width` grid seen from above. Rows run along X and columns along
//! Y, both with the same cell size:
//!
//! ```text
//! discretization = (max_x - min_x) / height
//! row = floor((max_x - x) / discretization)
//! col = floor((y - min_y) / discretization)
//! ```
//!
//! Row 0 is the `max_x` edge. To keep every in-boundary point on a valid
//! cell, the boundary is half-open on the two edges that would otherwise land
//! one past the last row or column: `x` in `(min_x, max_x]`, `y` in
//! `[min_y, max_y)` and `z` in `[min_z, max_z]`.

use serde::{Deserialize, Serialize};

use crate::error::GridError;

/// Relative slack allowed when checking the grid extent against the boundary.
const EXTENT_TOLERANCE: f64 = 1e-9;

/// Axis-aligned region of the LiDAR frame covered by a grid.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Boundary {
    /// Lower bound along X.
    pub min_x: f64,
    /// Upper bound along X.
    pub max_x: f64,
    /// Lower bound along Y.
    pub min_y: f64,
    /// Upper bound along Y.
    pub max_y: f64,
    /// Lower bound along Z.
    pub min_z: f64,
    /// Upper bound along Z.
    pub max_z: f64,
}

impl Boundary {
    /// KITTI region in front of the vehicle.
    pub const KITTI_FRONT: Boundary = Boundary {
        min_x: 0.0,
        max_x: 50.0,
        min_y: -25.0,
        max_y: 25.0,
        min_z: -2.73,
        max_z: 1.27,
    };

    /// KITTI region behind the vehicle.
    pub const KITTI_BACK: Boundary = Boundary {
        min_x: -50.0,
        max_x: 0.0,
        min_y: -25.0,
        max_y: 25.0,
        min_z: -2.73,
        max_z: 1.27,
    };

    /// Create a boundary, checking that every axis has a non-empty range.
    pub fn new(
        min_x: f64,
        max_x: f64,
        min_y: f64,
        max_y: f64,
        min_z: f64,
        max_z: f64,
    ) -> Result<Self, GridError> {
        let boundary = Self {
            min_x,
            max_x,
            min_y,
            max_y,
            min_z,
            max_z,
        };
        boundary.validate()?;
        Ok(boundary)
    }

    /// Check that every axis has a finite, non-empty range.
    pub fn validate(&self) -> Result<(), GridError> {
        for (axis, min, max) in [
            ('x', self.min_x, self.max_x),
            ('y', self.min_y, self.max_y),
            ('z', self.min_z, self.max_z),
        ] {
            if !(min.is_finite() && max.is_finite() && max > min) {
                return Err(GridError::InvalidBoundary { axis, min, max });
            }
        }
        Ok(())
    }

    /// Whether `x` lies in `(min_x, max_x]`.
    #[inline]
    pub fn contains_x(&self, x: f64) -> bool {
        x > self.min_x && x <= self.max_x
    }

    /// Whether the point lies inside the boundary.
    #[inline]
    pub fn contains(&self, p: &[f64; 3]) -> bool {
        self.contains_x(p[0])
            && p[1] >= self.min_y
            && p[1] < self.max_y
            && p[2] >= self.min_z
            && p[2] <= self.max_z
    }
}

/// Discretization of a [`Boundary`] into a bird's-eye-view grid.
#[derive(Debug, Clone, PartialEq)]
pub struct BevGridSpec {
    boundary: Boundary,
    width: usize,
    height: usize,
    discretization: f64,
}

impl BevGridSpec {
    /// Create a grid over `boundary` with `width` columns (across Y) and
    /// `height` rows (across X).
    ///
    /// # Errors
    ///
    /// Fails if the boundary is invalid, if either dimension is zero, or if
    /// the columns would extend past `max_y`.
    pub fn new(boundary: Boundary, width: usize, height: usize) -> Result<Self, GridError> {
        boundary.validate()?;
        if width == 0 || height == 0 {
            return Err(GridError::InvalidGridSize { width, height });
        }

        let discretization = (boundary.max_x - boundary.min_x) / height as f64;

        let extent = width as f64 * discretization;
        let span = boundary.max_y - boundary.min_y;
        if extent > span * (1.0 + EXTENT_TOLERANCE) {
            return Err(GridError::GridExceedsBoundary { extent, span });
        }

        log::debug!(
            "bev grid {width}x{height} over x ({}, {}], cell size {discretization}",
            boundary.min_x,
            boundary.max_x
        );

        Ok(Self {
            boundary,
            width,
            height,
            discretization,
        })
    }

    /// The 608x608 KITTI grid in front of the vehicle.
    pub fn kitti_front() -> Result<Self, GridError> {
        Self::new(Boundary::KITTI_FRONT, 608, 608)
    }

    /// The 608x608 KITTI grid behind the vehicle.
    pub fn kitti_back() -> Result<Self, GridError> {
        Self::new(Boundary::KITTI_BACK, 608, 608)
    }

    /// The covered boundary.
    pub fn boundary(&self) -> &Boundary {
        &self.boundary
    }

    /// Number of columns.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Number of rows.
    pub fn height(&self) -> usize {
        self.height
    }

    /// Size of a cell in LiDAR frame units.
    pub fn discretization(&self) -> f64 {
        self.discretization
    }

    /// Map a point to its `(row, col)` cell.
    ///
    /// Returns `None` for points outside the boundary. Cells are never
    /// clamped: an out-of-boundary point does not map to an edge cell.
    pub fn to_cell(&self, p: &[f64; 3]) -> Option<(usize, usize)> {
        if !self.boundary.contains(p) {
            return None;
        }
        let row = ((self.boundary.max_x - p[0]) / self.discretization).floor();
        let col = ((p[1] - self.boundary.min_y) / self.discretization).floor();

        // the boundary check keeps both indices non-negative; rounding at the
        // open edges can still land one past the end
        let (row, col) = (row as usize, col as usize);
        if row >= self.height || col >= self.width {
            return None;
        }
        Some((row, col))
    }

    /// Continuous coordinates of the center of cell `(row, col)`.
    ///
    /// The grid is two-dimensional, so `z` is passed through unchanged. For
    /// any cell inside the grid and `z` inside the boundary,
    /// `to_cell(&cell_center(row, col, z)) == Some((row, col))`.
    pub fn cell_center(&self, row: usize, col: usize, z: f64) -> [f64; 3] {
        [
            self.boundary.max_x - (row as f64 + 0.5) * self.discretization,
            self.boundary.min_y + (col as f64 + 0.5) * self.discretization,
            z,
        ]
    }

    /// Index of cell `(row, col)` in a row-major `height x width` buffer.
    #[inline]
    pub fn cell_index(&self, row: usize, col: usize) -> usize {
        row * self.width + col
    }
}

/// Which of the two grid regions a point belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BevRegion {
    /// In front of the vehicle.
    Front,
    /// Behind the vehicle.
    Back,
}

/// The front and back grids of a vehicle.
///
/// The two grids are kept separate; a point is routed to the grid whose X
/// range contains it before it is rasterized.
#[derive(Debug, Clone, PartialEq)]
pub struct BevRegions {
    front: BevGridSpec,
    back: BevGridSpec,
}

impl BevRegions {
    /// Pair a front and a back grid.
    ///
    /// Mixing points of one region with the cell size of the other is only
    /// safe when both grids share the same dimensions; a mismatch is logged
    /// but not rejected.
    pub fn new(front: BevGridSpec, back: BevGridSpec) -> Self {
        if front.width != back.width
            || front.height != back.height
            || front.discretization != back.discretization
        {
            log::warn!(
                "front grid {}x{} (cell {}) and back grid {}x{} (cell {}) differ",
                front.width,
                front.height,
                front.discretization,
                back.width,
                back.height,
                back.discretization
            );
        }
        Self { front, back }
    }

    /// The KITTI front and back grids.
    pub fn kitti() -> Result<Self, GridError> {
        Ok(Self::new(
            BevGridSpec::kitti_front()?,
            BevGridSpec::kitti_back()?,
        ))
    }

    /// The grid in front of the vehicle.
    pub fn front(&self) -> &BevGridSpec {
        &self.front
    }

    /// The grid behind the vehicle.
    pub fn back(&self) -> &BevGridSpec {
        &self.back
    }

    /// The grid of a region.
    pub fn grid(&self, region: BevRegion) -> &BevGridSpec {
        match region {
            BevRegion::Front => &self.front,
            BevRegion::Back => &self.back,
        }
    }

    /// Route a point to the region whose X range contains it.
    pub fn region_for(&self, p: &[f64; 3]) -> Option<BevRegion> {
        if self.front.boundary.contains_x(p[0]) {
            Some(BevRegion::Front)
        } else if self.back.boundary.contains_x(p[0]) {
            Some(BevRegion::Back)
        } else {
            None
        }
    }

    /// Route a point and map it to a cell of its region.
    pub fn to_cell(&self, p: &[f64; 3]) -> Option<(BevRegion, usize, usize)> {
        let region = self.region_for(p)?;
        let (row, col) = self.grid(region).to_cell(p)?;
        Some((region, row, col))
    }
}
