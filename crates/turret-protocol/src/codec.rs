//! Strict JSON encoding of [`Message`].
//!
//! Replies are always produced here. Incoming stream payloads go through
//! [`classify`][crate::classify::classify] instead, which is more lenient.

use turret_types::{Message, TurretError};

/// Serialize `msg` to its tagged JSON form.
///
/// # Errors
///
/// Returns [`TurretError::Codec`] if a field cannot be represented (a
/// non-finite angle, for instance).
pub fn encode(msg: &Message) -> Result<Vec<u8>, TurretError> {
    if let Message::Move {
        base_angle,
        elev_angle,
    }
    | Message::StatusResponse {
        base_angle,
        elev_angle,
        ..
    } = msg
    {
        if !base_angle.is_finite() || !elev_angle.is_finite() {
            return Err(TurretError::Codec(format!(
                "non-finite angle in {msg:?}"
            )));
        }
    }
    serde_json::to_vec(msg).map_err(|e| TurretError::Codec(e.to_string()))
}

/// Parse a tagged JSON [`Message`].
///
/// # Errors
///
/// Returns [`TurretError::Codec`] for malformed JSON, an unknown `"type"`
/// or missing fields.
pub fn decode(bytes: &[u8]) -> Result<Message, TurretError> {
    serde_json::from_slice(bytes).map_err(|e| TurretError::Codec(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_response_survives_a_round_trip() {
        let msg = Message::StatusResponse {
            base_angle: 279.76,
            elev_angle: -12.5,
            shots: 42,
        };
        assert_eq!(decode(&encode(&msg).unwrap()).unwrap(), msg);
    }

    #[test]
    fn ack_encodes_as_bare_tag() {
        assert_eq!(encode(&Message::Ack).unwrap(), br#"{"type":"ack"}"#);
    }

    #[test]
    fn non_finite_angle_is_rejected() {
        let msg = Message::StatusResponse {
            base_angle: f32::NAN,
            elev_angle: 0.0,
            shots: 0,
        };
        assert!(matches!(encode(&msg), Err(TurretError::Codec(_))));
    }

    #[test]
    fn decode_rejects_unknown_type_and_garbage() {
        assert!(decode(br#"{"type":"launch"}"#).is_err());
        assert!(decode(b"\xff\xfe").is_err());
        assert!(decode(br#"{"type":"shoot"}"#).is_err());
    }
}
