//! Error types of the crate.

/// Errors raised while building or using a [`CalibrationSet`](crate::CalibrationSet).
#[derive(Debug, thiserror::Error)]
pub enum CalibrationError {
    /// A transform that must be inverted is singular.
    #[error("The {name} transform is degenerate (determinant {determinant:e})")]
    DegenerateTransform {
        /// Name of the offending matrix.
        name: &'static str,
        /// Determinant of the matrix.
        determinant: f64,
    },

    /// A calibration matrix holds a NaN or infinite entry.
    #[error("The {name} matrix has a non-finite entry")]
    NonFiniteMatrix {
        /// Name of the offending matrix.
        name: &'static str,
    },

    /// The projection matrix does not have full row rank.
    #[error("The projection matrix must have rank 3, got rank {rank}")]
    RankDeficientProjection {
        /// Numerical rank of the projection matrix.
        rank: usize,
    },

    /// The homogeneous component of a projection is too close to zero.
    #[error("Invalid projection: homogeneous component {w:e} is too close to zero")]
    InvalidProjection {
        /// The homogeneous component that was rejected.
        w: f64,
    },
}

/// Errors raised while building a bird's-eye-view grid.
#[derive(Debug, thiserror::Error)]
pub enum GridError {
    /// The boundary has an empty or non-finite range on some axis.
    #[error("Invalid boundary on the {axis} axis: min {min} must be finite and below max {max}")]
    InvalidBoundary {
        /// Axis name.
        axis: char,
        /// Lower bound.
        min: f64,
        /// Upper bound.
        max: f64,
    },

    /// The grid has zero rows or columns.
    #[error("Invalid grid size {width}x{height}")]
    InvalidGridSize {
        /// Number of columns.
        width: usize,
        /// Number of rows.
        height: usize,
    },

    /// The grid columns extend past the boundary along Y.
    #[error("The grid spans {extent} along Y but the boundary only spans {span}")]
    GridExceedsBoundary {
        /// Extent covered by the grid columns.
        extent: f64,
        /// Extent of the boundary along Y.
        span: f64,
    },
}

/// Errors raised by the [`ClassRegistry`](crate::ClassRegistry).
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// The class id is outside the registry.
    #[error("Class id {id} is out of range for a registry with {len} classes")]
    IndexOutOfRange {
        /// Requested class id.
        id: usize,
        /// Number of classes in the registry.
        len: usize,
    },

    /// The color list does not have one entry per class.
    #[error("Expected {names} colors, got {colors}")]
    ColorCountMismatch {
        /// Number of class names.
        names: usize,
        /// Number of colors.
        colors: usize,
    },

    /// An alias points to a class id outside the registry.
    #[error("Alias {alias} maps to class id {id} but only {len} classes exist")]
    AliasOutOfRange {
        /// The alias name.
        alias: String,
        /// The class id it maps to.
        id: usize,
        /// Number of classes in the registry.
        len: usize,
    },
}

/// Top-level error for the crate.
#[derive(Debug, thiserror::Error)]
pub enum BevError {
    /// Calibration error.
    #[error(transparent)]
    Calibration(#[from] CalibrationError),

    /// Grid error.
    #[error(transparent)]
    Grid(#[from] GridError),

    /// Class registry error.
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// Failed to read a configuration file.
    #[error("Failed to read the configuration")]
    Io(#[from] std::io::Error),

    /// Failed to parse a configuration file.
    #[error("Failed to parse the configuration")]
    Json(#[from] serde_json::Error),
}
