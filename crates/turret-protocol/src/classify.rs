//! Shape-based classification of stream payloads.
//!
//! A payload is matched against each request shape in turn and the first
//! match wins:
//!
//! | Priority | Request | Required fields |
//! |---|---|---|
//! | 1 | `Move` | `base_angle`, `elev_angle`: finite numbers |
//! | 2 | `Shoot` | `count` (or `times`): integer in `0..=u32::MAX` |
//! | 3 | `StatusRequest` | `"type"`: `"status_request"` or `"request_status"` |
//! | 4 | `Reset` | `"type"`: `"reset"` |
//!
//! Extra fields are ignored, so `{"base_angle":1,"elev_angle":2,"count":3}`
//! is a `Move`.

use serde_json::{Map, Value};
use turret_types::Request;

type Object = Map<String, Value>;

/// Request shapes in priority order.
const SHAPES: [fn(&Object) -> Option<Request>; 4] =
    [as_move, as_shoot, as_status_request, as_reset];

/// Classify `bytes` into a [`Request`], or `None` when no shape matches
/// (including payloads that are not a JSON object at all).
pub fn classify(bytes: &[u8]) -> Option<Request> {
    let Ok(Value::Object(object)) = serde_json::from_slice::<Value>(bytes) else {
        return None;
    };
    SHAPES.iter().find_map(|shape| shape(&object))
}

fn finite_angle(object: &Object, field: &str) -> Option<f32> {
    let angle = object.get(field)?.as_f64()? as f32;
    angle.is_finite().then_some(angle)
}

fn as_move(object: &Object) -> Option<Request> {
    Some(Request::Move {
        base_angle: finite_angle(object, "base_angle")?,
        elev_angle: finite_angle(object, "elev_angle")?,
    })
}

fn as_shoot(object: &Object) -> Option<Request> {
    let count = object
        .get("count")
        .or_else(|| object.get("times"))
        .and_then(Value::as_u64)?;
    let count = u32::try_from(count).ok()?;
    Some(Request::Shoot { count })
}

fn type_tag(object: &Object) -> Option<&str> {
    object.get("type").and_then(Value::as_str)
}

fn as_status_request(object: &Object) -> Option<Request> {
    matches!(type_tag(object)?, "status_request" | "request_status").then_some(Request::StatusRequest)
}

fn as_reset(object: &Object) -> Option<Request> {
    (type_tag(object)? == "reset").then_some(Request::Reset)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tagged_messages_classify_by_shape() {
        assert_eq!(
            classify(br#"{"type":"move","base_angle":45.0,"elev_angle":10}"#),
            Some(Request::Move {
                base_angle: 45.0,
                elev_angle: 10.0
            })
        );
        assert_eq!(
            classify(br#"{"type":"shoot","count":3}"#),
            Some(Request::Shoot { count: 3 })
        );
        assert_eq!(
            classify(br#"{"type":"status_request"}"#),
            Some(Request::StatusRequest)
        );
        assert_eq!(classify(br#"{"type":"reset"}"#), Some(Request::Reset));
    }

    #[test]
    fn untagged_legacy_payloads_are_accepted() {
        assert_eq!(
            classify(br#"{"base_angle":1,"elev_angle":2}"#),
            Some(Request::Move {
                base_angle: 1.0,
                elev_angle: 2.0
            })
        );
        assert_eq!(
            classify(br#"{"times":2}"#),
            Some(Request::Shoot { count: 2 })
        );
        assert_eq!(
            classify(br#"{"type":"request_status"}"#),
            Some(Request::StatusRequest)
        );
    }

    #[test]
    fn move_wins_over_shoot() {
        assert!(matches!(
            classify(br#"{"type":"shoot","count":5,"base_angle":1.5,"elev_angle":0}"#),
            Some(Request::Move { .. })
        ));
    }

    #[test]
    fn shoot_wins_over_reset() {
        assert_eq!(
            classify(br#"{"type":"reset","count":1}"#),
            Some(Request::Shoot { count: 1 })
        );
    }

    #[test]
    fn partial_move_falls_through_to_next_shape() {
        assert_eq!(
            classify(br#"{"base_angle":10,"type":"reset"}"#),
            Some(Request::Reset)
        );
    }

    #[test]
    fn invalid_field_types_do_not_match() {
        assert_eq!(classify(br#"{"base_angle":"10","elev_angle":0}"#), None);
        assert_eq!(classify(br#"{"count":-1}"#), None);
        assert_eq!(classify(br#"{"count":1.5}"#), None);
        assert_eq!(classify(br#"{"count":4294967296}"#), None);
        assert_eq!(classify(br#"{"base_angle":1e300,"elev_angle":0}"#), None);
    }

    #[test]
    fn unsupported_payloads_yield_none() {
        assert_eq!(classify(b"not json"), None);
        assert_eq!(classify(b"[1,2,3]"), None);
        assert_eq!(classify(br#"{"type":"dance"}"#), None);
        assert_eq!(classify(b""), None);
    }
}
