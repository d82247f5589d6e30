#![deny(missing_docs)]
#![doc = env!("CARGO_PKG_DESCRIPTION")]

/// 3D detection boxes and their projection into the image.
pub mod boxes;

/// LiDAR, rectified camera and image plane transforms.
pub mod calibration;

/// Semantic class names, ids and display colors.
pub mod classes;

/// Sensor configuration loading and validation.
pub mod config;

/// Error types.
pub mod error;

/// Bird's-eye-view grid geometry.
pub mod grid;

/// Linear algebra utilities.
pub mod linalg;

/// Rasterization of point clouds into bird's-eye-view feature maps.
pub mod rasterize;

pub use calibration::CalibrationSet;
pub use classes::{ClassId, ClassRegistry};
pub use config::{SensorConfig, SensorSetup};
pub use error::BevError;
pub use grid::{BevGridSpec, BevRegion, BevRegions, Boundary};
