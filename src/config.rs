//! Pipeline settings
//!
//! Knobs that shape generated columns and requests. Loaded from YAML or
//! JSON through `parser`, every field has a default.

use serde::{Deserialize, Serialize};
use std::path::Path;
use crate::dsl::DEFAULT_TIME_FORMAT;
use crate::error::ParseError;

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct PipelineSettings {
    /// Approximate bucket count an `auto` date histogram aims for
    pub histogram_bar_target: u32,
    /// Size of newly built terms columns
    pub default_terms_size: u32,
    /// Time zone written into date histograms without one
    pub default_time_zone: String,
    /// `format` of range filters on time fields
    pub time_format: String,
    /// Window of newly built moving averages
    pub moving_average_window: u32,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            histogram_bar_target: 50,
            default_terms_size: 3,
            default_time_zone: "UTC".to_string(),
            time_format: DEFAULT_TIME_FORMAT.to_string(),
            moving_average_window: 5,
        }
    }
}

impl PipelineSettings {
    /// Load settings from a YAML (or JSON) file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ParseError> {
        crate::parser::parse_settings_file(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_override_keeps_defaults() {
        let settings: PipelineSettings = serde_yaml::from_str("histogram_bar_target: 100").unwrap();
        assert_eq!(settings.histogram_bar_target, 100);
        assert_eq!(settings.default_terms_size, 3);
        assert_eq!(settings.time_format, "strict_date_optional_time");
    }
}
