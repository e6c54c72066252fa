//! Status frame decoding.
//!
//! Turns raw text frames from the streaming channel into typed
//! [`StatusEvent`]s. Decoding never touches connection or snapshot state; a
//! frame that fails validation is reported as a [`DecodeError`] and nothing
//! else happens to it.
//!
//! ## Wire format
//!
//! ```text
//! {
//!   "status"?:                       "initialized" | "running" | "paused" | "completed" | "error",
//!   "pipelineId" | "pipeline_id"?:   string,
//!   "components"?:                   [{ "name": string, "order"?: integral number, "execution_time"?: number }],
//!   "pipelineData" | "pipeline_data"?: { string: string }
//! }
//! ```
//!
//! A frame whose only recognized field is `"status": "connected"` is a
//! handshake acknowledgment.

use std::collections::HashSet;

use serde::Deserialize;
use serde_json::{Map, Value};
use thiserror::Error;

use pipewatch_types::{PipelineComponent, PipelineData, PipelineStatus, StatusEvent};

/// Status marker the backend sends to acknowledge the handshake.
pub const ACK_MARKER: &str = "connected";

/// Object keys that make a frame a status frame.
const RECOGNIZED_KEYS: &[&str] = &[
    "status",
    "pipelineId",
    "pipeline_id",
    "components",
    "pipelineData",
    "pipeline_data",
];

/// A successfully decoded inbound frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    /// Handshake acknowledgment; carries no state.
    Ack,
    /// Partial update to merge into the snapshot.
    Update(StatusEvent),
}

/// Why an inbound frame was rejected.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The payload is not JSON.
    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// The payload is JSON but not an object.
    #[error("Frame is not a JSON object")]
    NotAnObject,

    /// The object has none of the status fields.
    #[error("Frame has no recognized status field")]
    NoRecognizedFields,

    /// The `status` value is not a pipeline status.
    #[error("Unknown pipeline status '{0}'")]
    UnknownStatus(String),

    /// A recognized field has the wrong shape.
    #[error("Invalid '{field}' field: {reason}")]
    InvalidField {
        /// Field name as it appeared on the wire.
        field: &'static str,
        /// What was wrong with it.
        reason: String,
    },

    /// Two components in one frame share a name.
    #[error("Duplicate component name '{0}'")]
    DuplicateComponent(String),

    /// A component reported a negative or non-finite execution time.
    #[error("Component '{component}' has invalid execution time {value}")]
    InvalidExecutionTime {
        /// Component name.
        component: String,
        /// Offending value in seconds.
        value: f64,
    },
}

#[derive(Debug, Deserialize)]
struct RawFrame {
    #[serde(default)]
    status: Option<String>,
    #[serde(default, rename = "pipelineId", alias = "pipeline_id")]
    pipeline_id: Option<String>,
    #[serde(default)]
    components: Option<Vec<RawComponent>>,
    #[serde(default, rename = "pipelineData", alias = "pipeline_data")]
    pipeline_data: Option<PipelineData>,
}

#[derive(Debug, Deserialize)]
struct RawComponent {
    name: String,
    #[serde(default)]
    order: Option<f64>,
    #[serde(default, alias = "executionTime")]
    execution_time: Option<f64>,
}

/// Decode one inbound text frame.
///
/// # Example
///
/// ```
/// use pipewatch::codec::{decode, Frame};
/// use pipewatch::PipelineStatus;
///
/// assert_eq!(decode(r#"{"status":"connected"}"#).unwrap(), Frame::Ack);
///
/// let Frame::Update(event) = decode(r#"{"status":"running"}"#).unwrap() else {
///     panic!("expected an update");
/// };
/// assert_eq!(event.status, Some(PipelineStatus::Running));
/// assert!(event.components.is_none());
///
/// assert!(decode("not json").is_err());
/// ```
pub fn decode(text: &str) -> Result<Frame, DecodeError> {
    let value: Value = serde_json::from_str(text)?;
    let Value::Object(object) = value else {
        return Err(DecodeError::NotAnObject);
    };

    if !RECOGNIZED_KEYS.iter().any(|key| object.contains_key(*key)) {
        return Err(DecodeError::NoRecognizedFields);
    }

    let only_status = !has_state_fields(&object);
    let raw: RawFrame = serde_json::from_value(Value::Object(object)).map_err(|e| {
        DecodeError::InvalidField {
            field: "frame",
            reason: e.to_string(),
        }
    })?;

    let status = match raw.status.as_deref() {
        None => None,
        Some(ACK_MARKER) if only_status => return Ok(Frame::Ack),
        // The marker next to real fields carries no status of its own
        Some(ACK_MARKER) => None,
        Some(other) => Some(
            other
                .parse::<PipelineStatus>()
                .map_err(|_| DecodeError::UnknownStatus(other.to_string()))?,
        ),
    };

    let components = raw.components.map(validate_components).transpose()?;

    Ok(Frame::Update(StatusEvent {
        status,
        pipeline_id: raw.pipeline_id,
        components,
        data: raw.pipeline_data,
    }))
}

/// Build the identity handshake sent when a socket opens.
pub fn encode_handshake(pipeline_id: &str) -> String {
    serde_json::json!({ "pipeline_id": pipeline_id }).to_string()
}

fn has_state_fields(object: &Map<String, Value>) -> bool {
    RECOGNIZED_KEYS
        .iter()
        .filter(|key| **key != "status")
        .any(|key| object.get(*key).is_some_and(|v| !v.is_null()))
}

fn validate_components(raw: Vec<RawComponent>) -> Result<Vec<PipelineComponent>, DecodeError> {
    let mut seen = HashSet::with_capacity(raw.len());
    let mut components = Vec::with_capacity(raw.len());

    for (index, component) in raw.into_iter().enumerate() {
        if component.name.is_empty() {
            return Err(DecodeError::InvalidField {
                field: "components",
                reason: format!("component {} has an empty name", index),
            });
        }
        if !seen.insert(component.name.clone()) {
            return Err(DecodeError::DuplicateComponent(component.name));
        }
        if let Some(value) = component.execution_time {
            if !value.is_finite() || value < 0.0 {
                return Err(DecodeError::InvalidExecutionTime {
                    component: component.name,
                    value,
                });
            }
        }

        let order = match component.order {
            Some(value) => integral_order(&component.name, value)?,
            None => index as i64,
        };

        components.push(PipelineComponent {
            order,
            name: component.name,
            execution_time: component.execution_time,
        });
    }

    Ok(components)
}

/// Accept `2` and `2.0` alike, reject anything that is not a whole i64.
fn integral_order(component: &str, value: f64) -> Result<i64, DecodeError> {
    // i64::MAX rounds up to 2^63 as f64, so the upper bound is exclusive
    let in_range = value >= i64::MIN as f64 && value < i64::MAX as f64;
    if value.is_finite() && value.fract() == 0.0 && in_range {
        Ok(value as i64)
    } else {
        Err(DecodeError::InvalidField {
            field: "components",
            reason: format!("component '{}' has a non-integral order {}", component, value),
        })
    }
}
