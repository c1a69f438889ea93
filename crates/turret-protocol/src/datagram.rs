//! The datagram command set: one JSON object per UDP datagram.
//!
//! | `"type"` | Fields | Effect |
//! |---|---|---|
//! | `stepper` | `target`: `"base"` / `"elevation"`, `angle` (or a field named after the target) | Move one axis. |
//! | `fire` | `count` | Fire `count` shots. |
//! | `status` | | Reply with `{"type":"status","base":…,"elevation":…,"shots":…}`. |
//! | `stop` | | End the datagram service. |

use serde::Serialize;
use serde_json::Value;
use turret_types::{AxisTarget, StatusReport, TurretError};

/// A decoded datagram command.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DatagramRequest {
    Stepper { target: AxisTarget, angle: f32 },
    Fire { count: u32 },
    Status,
    Stop,
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum DatagramReply {
    Status {
        base: f32,
        elevation: f32,
        shots: u64,
    },
}

fn field<'a>(json: &'a Value, name: &str) -> Result<&'a Value, TurretError> {
    json.get(name)
        .ok_or_else(|| TurretError::Codec(format!("missing field `{name}`")))
}

/// Decode one datagram.
///
/// # Errors
///
/// - [`TurretError::Codec`] for malformed JSON or a known command with
///   missing or mistyped fields.
/// - [`TurretError::UnsupportedMessage`] for a missing or unknown `"type"`.
pub fn decode_datagram(bytes: &[u8]) -> Result<DatagramRequest, TurretError> {
    let json: Value =
        serde_json::from_slice(bytes).map_err(|e| TurretError::Codec(e.to_string()))?;

    match json.get("type").and_then(Value::as_str) {
        Some("stepper") => {
            let target: AxisTarget = serde_json::from_value(field(&json, "target")?.clone())
                .map_err(|e| TurretError::Codec(format!("bad stepper target: {e}")))?;
            let fallback = match target {
                AxisTarget::Base => "base",
                AxisTarget::Elevation => "elevation",
            };
            let angle = json
                .get("angle")
                .or_else(|| json.get(fallback))
                .and_then(Value::as_f64)
                .map(|a| a as f32)
                .filter(|a| a.is_finite())
                .ok_or_else(|| TurretError::Codec("stepper command without a finite angle".into()))?;
            Ok(DatagramRequest::Stepper { target, angle })
        }
        Some("fire") => {
            let count = field(&json, "count")?
                .as_u64()
                .and_then(|n| u32::try_from(n).ok())
                .ok_or_else(|| TurretError::Codec("fire count must be a u32".into()))?;
            Ok(DatagramRequest::Fire { count })
        }
        Some("status") => Ok(DatagramRequest::Status),
        Some("stop") => Ok(DatagramRequest::Stop),
        _ => Err(TurretError::UnsupportedMessage),
    }
}

/// Encode the reply to a `status` datagram.
///
/// # Errors
///
/// Returns [`TurretError::Codec`] if the report cannot be serialized.
pub fn encode_status_reply(report: &StatusReport) -> Result<Vec<u8>, TurretError> {
    let reply = DatagramReply::Status {
        base: report.base_angle,
        elevation: report.elev_angle,
        shots: report.shots,
    };
    serde_json::to_vec(&reply).map_err(|e| TurretError::Codec(e.to_string()))
}
