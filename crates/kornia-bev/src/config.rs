//! # Sensor configuration
//!
//! [`SensorConfig`] holds the raw calibration, grid and class values as they
//! appear in a JSON file. [`SensorConfig::build`] validates them once and
//! returns the immutable [`SensorSetup`] shared by the rest of the pipeline.
//!
//! Every section falls back to the KITTI values when omitted, so an empty
//! JSON object `{}` describes the default KITTI setup.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::calibration::{CalibrationSet, KITTI_PROJ, KITTI_RECT, KITTI_VELO_TO_CAM};
use crate::classes::{ClassId, ClassRegistry};
use crate::error::BevError;
use crate::grid::{BevGridSpec, BevRegions, Boundary};

/// Raw calibration matrices, row-major.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalibrationConfig {
    /// LiDAR to reference camera transform.
    pub velo_to_cam: [[f64; 4]; 4],
    /// Rectifying rotation padded to 4x4.
    pub rect: [[f64; 4]; 4],
    /// Camera projection matrix.
    pub proj: [[f64; 4]; 3],
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            velo_to_cam: KITTI_VELO_TO_CAM,
            rect: KITTI_RECT,
            proj: KITTI_PROJ,
        }
    }
}

/// Raw bird's-eye-view grid parameters shared by both regions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BevConfig {
    /// Region in front of the vehicle.
    pub front: Boundary,
    /// Region behind the vehicle.
    pub back: Boundary,
    /// Number of columns, across Y.
    pub width: usize,
    /// Number of rows, across X.
    pub height: usize,
}

impl Default for BevConfig {
    fn default() -> Self {
        Self {
            front: Boundary::KITTI_FRONT,
            back: Boundary::KITTI_BACK,
            width: 608,
            height: 608,
        }
    }
}

/// Raw class registry values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassConfig {
    /// Canonical class names ordered by id.
    pub names: Vec<String>,
    /// Extra names and the class id they resolve to.
    pub aliases: HashMap<String, ClassId>,
    /// BGR color per class.
    pub colors: Vec<[u8; 3]>,
}

impl Default for ClassConfig {
    fn default() -> Self {
        Self {
            names: vec!["Car".into(), "Pedestrian".into(), "Cyclist".into()],
            aliases: HashMap::from([("Van".to_string(), 0), ("Person_sitting".to_string(), 1)]),
            colors: vec![[0, 255, 255], [0, 0, 255], [255, 0, 0]],
        }
    }
}

/// Complete sensor configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SensorConfig {
    /// Calibration matrices.
    pub calibration: CalibrationConfig,
    /// Grid parameters.
    pub bev: BevConfig,
    /// Class registry.
    pub classes: ClassConfig,
}

/// Validated, immutable sensor metadata built from a [`SensorConfig`].
#[derive(Debug, Clone)]
pub struct SensorSetup {
    /// LiDAR, camera and image transforms.
    pub calibration: CalibrationSet,
    /// Front and back grids.
    pub regions: BevRegions,
    /// Class names, ids and colors.
    pub classes: ClassRegistry,
}

impl SensorConfig {
    /// Parse a configuration from a JSON string.
    pub fn from_json(json: &str) -> Result<Self, BevError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Read a configuration from a JSON file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, BevError> {
        let path = path.as_ref();
        log::info!("loading sensor configuration from {}", path.display());
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Serialize the configuration to pretty-printed JSON.
    pub fn to_json(&self) -> Result<String, BevError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Validate the configuration and build the sensor setup.
    ///
    /// Any error here means the configuration cannot be used and the caller
    /// should stop before processing data.
    pub fn build(&self) -> Result<SensorSetup, BevError> {
        let calibration = CalibrationSet::new(
            self.calibration.velo_to_cam,
            self.calibration.rect,
            self.calibration.proj,
        )?;

        let front = BevGridSpec::new(self.bev.front, self.bev.width, self.bev.height)?;
        let back = BevGridSpec::new(self.bev.back, self.bev.width, self.bev.height)?;
        let regions = BevRegions::new(front, back);

        let classes = ClassRegistry::new(
            self.classes.names.clone(),
            self.classes.aliases.clone(),
            self.classes.colors.clone(),
        )?;

        Ok(SensorSetup {
            calibration,
            regions,
            classes,
        })
    }
}
