//! Pluggable body serializers.
//!
//! The simulator never picks a wire format on its own: serialization helpers
//! such as [`Route::responds_with`](crate::Route::responds_with) and
//! [`RecordedRequest::body_as`](crate::RecordedRequest::body_as) fail with a
//! configuration error unless a serializer was supplied.

use crate::simulator::SimulatorError;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;

pub(crate) const MISSING_SERIALIZER: &str = "No serializer has been provided. Configure one with \
     `Simulator::with_serializer` before using the serialization methods";

/// Converts between text bodies and structured values.
///
/// The trait works on `serde_json::Value` so it stays object safe; typed
/// helpers convert through it.
pub trait BodySerializer: Send + Sync + fmt::Debug {
    fn serialize(&self, value: &serde_json::Value) -> anyhow::Result<String>;

    fn deserialize(&self, text: &str) -> anyhow::Result<serde_json::Value>;
}

/// Compact JSON via `serde_json`.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonSerializer;

impl BodySerializer for JsonSerializer {
    fn serialize(&self, value: &serde_json::Value) -> anyhow::Result<String> {
        Ok(serde_json::to_string(value)?)
    }

    fn deserialize(&self, text: &str) -> anyhow::Result<serde_json::Value> {
        Ok(serde_json::from_str(text)?)
    }
}

/// YAML via `serde_yaml`.
#[derive(Debug, Clone, Copy, Default)]
pub struct YamlSerializer;

impl BodySerializer for YamlSerializer {
    fn serialize(&self, value: &serde_json::Value) -> anyhow::Result<String> {
        Ok(serde_yaml::to_string(value)?)
    }

    fn deserialize(&self, text: &str) -> anyhow::Result<serde_json::Value> {
        Ok(serde_yaml::from_str(text)?)
    }
}

pub(crate) fn require(
    serializer: Option<&Arc<dyn BodySerializer>>,
) -> Result<&Arc<dyn BodySerializer>, SimulatorError> {
    serializer.ok_or_else(|| SimulatorError::Configuration(MISSING_SERIALIZER.to_string()))
}

/// Serialize a typed value with the configured serializer.
pub(crate) fn to_text<T: Serialize + ?Sized>(
    serializer: Option<&Arc<dyn BodySerializer>>,
    value: &T,
) -> Result<String, SimulatorError> {
    let serializer = require(serializer)?;
    let value =
        serde_json::to_value(value).map_err(|e| SimulatorError::Serialization(e.to_string()))?;
    serializer
        .serialize(&value)
        .map_err(|e| SimulatorError::Serialization(format!("{e:#}")))
}

/// Deserialize text into a typed value with the configured serializer.
pub(crate) fn from_text<T: DeserializeOwned>(
    serializer: Option<&Arc<dyn BodySerializer>>,
    text: &str,
) -> Result<T, SimulatorError> {
    let serializer = require(serializer)?;
    let value = serializer
        .deserialize(text)
        .map_err(|e| SimulatorError::Serialization(format!("{e:#}")))?;
    serde_json::from_value(value).map_err(|e| SimulatorError::Serialization(e.to_string()))
}
