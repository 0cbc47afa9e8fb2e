//! Document parser (verb module)
//!
//! Loads persisted layers, data views and pipeline settings. Documents are
//! YAML; anything that starts with `{` is read as JSON instead so saved
//! state from other tools loads with precise error positions.

use serde::de::DeserializeOwned;
use std::path::Path;
use crate::column::PersistedLayer;
use crate::config::PipelineSettings;
use crate::data_view::DataView;
use crate::error::ParseError;

fn read_file<P: AsRef<Path>>(path: P) -> Result<String, ParseError> {
    let path_str = path.as_ref().display().to_string();
    std::fs::read_to_string(&path).map_err(|e| ParseError::Io {
        path: path_str,
        source: e,
    })
}

fn parse_document<T: DeserializeOwned>(text: &str) -> Result<T, ParseError> {
    if text.trim_start().starts_with('{') {
        serde_json::from_str(text).map_err(ParseError::from)
    } else {
        serde_yaml::from_str(text).map_err(ParseError::from)
    }
}

/// Parse a persisted layer from a file
pub fn parse_layer_file<P: AsRef<Path>>(path: P) -> Result<PersistedLayer, ParseError> {
    parse_layer_str(&read_file(path)?)
}

/// Parse a persisted layer from YAML or JSON text
pub fn parse_layer_str(text: &str) -> Result<PersistedLayer, ParseError> {
    parse_document(text)
}

/// Parse a data view from a file
pub fn parse_data_view_file<P: AsRef<Path>>(path: P) -> Result<DataView, ParseError> {
    parse_data_view_str(&read_file(path)?)
}

pub fn parse_data_view_str(text: &str) -> Result<DataView, ParseError> {
    parse_document(text)
}

/// Parse pipeline settings from a file. Missing keys take their defaults.
pub fn parse_settings_file<P: AsRef<Path>>(path: P) -> Result<PipelineSettings, ParseError> {
    parse_settings_str(&read_file(path)?)
}

pub fn parse_settings_str(text: &str) -> Result<PipelineSettings, ParseError> {
    parse_document(text)
}
