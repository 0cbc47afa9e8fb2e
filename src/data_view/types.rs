//! Field type definitions

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Field types exposed by a data view
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FieldType {
    /// Keyword or text
    String,
    /// Any numeric type
    Number,
    /// Date or date_nanos
    Date,
    Boolean,
    Ip,
    GeoPoint,
    /// Pre-aggregated histogram field
    Histogram,
    /// Anything the pipeline does not know how to aggregate
    #[default]
    Unknown,
}

impl FieldType {
    /// Whether values of this type have a natural numeric order
    pub fn is_numeric(&self) -> bool {
        matches!(self, FieldType::Number | FieldType::Histogram)
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FieldType::String => "string",
            FieldType::Number => "number",
            FieldType::Date => "date",
            FieldType::Boolean => "boolean",
            FieldType::Ip => "ip",
            FieldType::GeoPoint => "geo_point",
            FieldType::Histogram => "histogram",
            FieldType::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

impl FromStr for FieldType {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.to_lowercase().as_str() {
            "string" | "keyword" | "text" => FieldType::String,
            "number" | "long" | "integer" | "short" | "byte" | "double" | "float"
            | "half_float" | "scaled_float" => FieldType::Number,
            "date" | "date_nanos" => FieldType::Date,
            "boolean" | "bool" => FieldType::Boolean,
            "ip" => FieldType::Ip,
            "geo_point" => FieldType::GeoPoint,
            "histogram" => FieldType::Histogram,
            _ => FieldType::Unknown,
        })
    }
}

impl<'de> Deserialize<'de> for FieldType {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        FieldType::from_str(&s).map_err(serde::de::Error::custom)
    }
}

impl Serialize for FieldType {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}
