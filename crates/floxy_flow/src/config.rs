// SPDX-License-Identifier: MIT OR Apache-2.0
//! Flow configuration.
//!
//! Options are plain serde data with a default for every field, so a partial
//! RON file only needs to name what it changes:
//!
//! ```ron
//! (
//!     zoom: 1.5,
//!     connection: (path_type: "bezier"),
//! )
//! ```

use crate::geometry::Point;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Capabilities a node declares when neither its config nor its view say otherwise
pub const DEFAULT_NODE_CAPABILITIES: &[&str] = &[
    "movable",
    "selectable",
    "editable-label",
    "resizable",
    "removable",
];

/// Capabilities a committed connection declares by default
pub const DEFAULT_CONNECTION_CAPABILITIES: &[&str] = &[
    "selectable",
    "hoverable",
    "removable",
    "path:straight",
    "path:bezier",
    "path:orthogonal",
    "path:step",
];

/// Error loading or saving options
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File could not be read or written
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// RON text could not be parsed
    #[error("Invalid options: {0}")]
    Parse(#[from] ron::error::SpannedError),

    /// Options could not be serialized
    #[error("Serialization error: {0}")]
    Serialize(#[from] ron::Error),

    /// Options parsed but hold values the flow cannot run with
    #[error("Invalid options: {0}")]
    Invalid(String),
}

/// Top-level flow options
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlowOptions {
    /// Initial zoom factor
    pub zoom: f64,
    /// Initial pan offset (screen pixels)
    pub canvas: Point,
    /// Lower zoom bound
    pub min_zoom: f64,
    /// Upper zoom bound
    pub max_zoom: f64,
    /// Zoom change per wheel notch
    pub zoom_step: f64,
    /// Whether the cycle validator rejects cyclic edges
    pub cycle_validation: bool,
    /// Node defaults
    pub node: NodeOptions,
    /// Connection defaults
    pub connection: ConnectionOptions,
}

impl Default for FlowOptions {
    fn default() -> Self {
        Self {
            zoom: 1.0,
            canvas: Point::ZERO,
            min_zoom: 0.1,
            max_zoom: 3.0,
            zoom_step: 0.1,
            cycle_validation: true,
            node: NodeOptions::default(),
            connection: ConnectionOptions::default(),
        }
    }
}

impl FlowOptions {
    /// Parse options from RON text
    pub fn from_ron_str(text: &str) -> Result<Self, ConfigError> {
        let options: Self = ron::from_str(text)?;
        options.validate()?;
        Ok(options)
    }

    /// Check the zoom settings.
    ///
    /// Bounds must be finite with `0 < min_zoom <= max_zoom`, and the wheel
    /// step and initial zoom must be finite with a positive step.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let finite = [self.zoom, self.min_zoom, self.max_zoom, self.zoom_step]
            .iter()
            .all(|v| v.is_finite());
        if !finite {
            return Err(ConfigError::Invalid("zoom settings must be finite".to_string()));
        }
        if self.min_zoom <= 0.0 {
            return Err(ConfigError::Invalid(format!(
                "min_zoom must be positive, got {}",
                self.min_zoom
            )));
        }
        if self.min_zoom > self.max_zoom {
            return Err(ConfigError::Invalid(format!(
                "min_zoom {} exceeds max_zoom {}",
                self.min_zoom, self.max_zoom
            )));
        }
        if self.zoom_step <= 0.0 {
            return Err(ConfigError::Invalid(format!(
                "zoom_step must be positive, got {}",
                self.zoom_step
            )));
        }
        Ok(())
    }

    /// Load options from a RON file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_ron_str(&content)
    }

    /// Serialize to pretty RON
    pub fn to_ron(&self) -> Result<String, ConfigError> {
        let config = ron::ser::PrettyConfig::default().struct_names(false);
        Ok(ron::ser::to_string_pretty(self, config)?)
    }

    /// Write options to a RON file
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        std::fs::write(path, self.to_ron()?)?;
        Ok(())
    }

    /// Clamp a zoom value to the configured bounds. NaN maps to `min_zoom`.
    pub fn clamp_zoom(&self, zoom: f64) -> f64 {
        clamp_zoom(zoom, self.min_zoom, self.max_zoom)
    }
}

pub(crate) fn clamp_zoom(zoom: f64, min: f64, max: f64) -> f64 {
    zoom.max(min).min(max)
}

/// Node defaults applied when neither the config nor the view supply a value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeOptions {
    /// Default width
    pub width: f64,
    /// Default height
    pub height: f64,
    /// Smallest width reachable by resizing
    pub min_width: f64,
    /// Smallest height reachable by resizing
    pub min_height: f64,
    /// Default capability list
    pub capabilities: Vec<String>,
}

impl Default for NodeOptions {
    fn default() -> Self {
        Self {
            width: 200.0,
            height: 100.0,
            min_width: 80.0,
            min_height: 40.0,
            capabilities: DEFAULT_NODE_CAPABILITIES.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// Connection defaults
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionOptions {
    /// Path strategy name
    pub path_type: String,
    /// Stroke color (host-defined string, e.g. a CSS color)
    pub stroke: Option<String>,
    /// Stroke width
    pub width: f64,
    /// Dash pattern
    pub dash: Option<String>,
    /// Animated stroke
    pub animated: bool,
    /// Arrow head at the source end
    pub arrow_start: bool,
    /// Arrow head at the target end
    pub arrow_end: bool,
    /// Bezier control point factor
    pub curvature: f64,
    /// Orthogonal routing clearance from the source port
    pub clearance: f64,
    /// Route orthogonal paths top-to-bottom instead of left-to-right
    pub vertical: bool,
    /// Default capability list for committed connections
    pub capabilities: Vec<String>,
}

impl Default for ConnectionOptions {
    fn default() -> Self {
        Self {
            path_type: "orthogonal".to_string(),
            stroke: None,
            width: 2.0,
            dash: None,
            animated: false,
            arrow_start: false,
            arrow_end: true,
            curvature: 0.7,
            clearance: 60.0,
            vertical: false,
            capabilities: DEFAULT_CONNECTION_CAPABILITIES
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_ron_keeps_defaults() {
        let options = FlowOptions::from_ron_str("(zoom: 1.5, connection: (path_type: \"bezier\"))").unwrap();
        assert_eq!(options.zoom, 1.5);
        assert_eq!(options.connection.path_type, "bezier");
        assert_eq!(options.connection.width, 2.0);
        assert_eq!(options.node.width, 200.0);
        assert!(options.cycle_validation);
    }

    #[test]
    fn test_serialization() {
        let mut options = FlowOptions::default();
        options.canvas = Point::new(12.0, -4.0);
        options.node.capabilities = vec!["movable".to_string()];
        let text = options.to_ron().unwrap();
        let loaded = FlowOptions::from_ron_str(&text).unwrap();
        assert_eq!(loaded, options);
    }

    #[test]
    fn test_invalid_ron_is_an_error() {
        assert!(matches!(
            FlowOptions::from_ron_str("(zoom: \"high\")"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_clamp_zoom() {
        let options = FlowOptions::default();
        assert_eq!(options.clamp_zoom(0.01), 0.1);
        assert_eq!(options.clamp_zoom(5.0), 3.0);
        assert_eq!(options.clamp_zoom(f64::NAN), 0.1);
    }

    #[test]
    fn test_rejects_bad_zoom_bounds() {
        assert!(matches!(
            FlowOptions::from_ron_str("(min_zoom: 3.0, max_zoom: 0.5)"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            FlowOptions::from_ron_str("(min_zoom: 0.0)"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            FlowOptions::from_ron_str("(zoom_step: -0.1)"),
            Err(ConfigError::Invalid(_))
        ));
        let options = FlowOptions {
            max_zoom: f64::NAN,
            ..FlowOptions::default()
        };
        assert!(matches!(options.validate(), Err(ConfigError::Invalid(_))));
        assert!(FlowOptions::from_ron_str("(min_zoom: 0.5, max_zoom: 0.5)").is_ok());
    }
}
