//! Request dispatch: bytes in, reply out.
//!
//! The dispatcher holds no state of its own. [`handle`] serves the stream
//! dialect, [`handle_datagram`] the datagram dialect; both execute against
//! the caller's [`TurretState`].

use tracing::debug;
use turret_protocol::datagram::{DatagramRequest, decode_datagram, encode_status_reply};
use turret_protocol::classify;
use turret_types::{AxisTarget, Message, Request, TurretError};

use crate::state::TurretState;

/// Classify `bytes` and execute the request.
///
/// Replies with [`Message::Ack`], or [`Message::StatusResponse`] for a
/// status request.
///
/// # Errors
///
/// - [`TurretError::UnsupportedMessage`] when no request shape matches; the
///   state is untouched.
/// - Any hardware error raised while executing the request.
pub fn handle(state: &mut TurretState, bytes: &[u8]) -> Result<Message, TurretError> {
    let request = classify(bytes).ok_or(TurretError::UnsupportedMessage)?;
    execute(state, request)
}

/// Execute an already classified request.
///
/// # Errors
///
/// Any hardware error raised while executing the request.
pub fn execute(state: &mut TurretState, request: Request) -> Result<Message, TurretError> {
    debug!(?request, "executing request");
    match request {
        Request::Move {
            base_angle,
            elev_angle,
        } => {
            state.move_to(base_angle, elev_angle)?;
            Ok(Message::Ack)
        }
        Request::Shoot { count } => {
            state.shoot(count)?;
            Ok(Message::Ack)
        }
        Request::StatusRequest => Ok(state.status()?.into()),
        Request::Reset => {
            state.reset()?;
            Ok(Message::Ack)
        }
    }
}

/// What the datagram server should do after a datagram was handled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatagramOutcome {
    /// Send these bytes back to the sender.
    Reply(Vec<u8>),
    NoReply,
    /// Stop serving.
    Stop,
}

/// Decode and execute one datagram.
///
/// # Errors
///
/// Decoding errors from [`decode_datagram`] and any hardware error.
pub fn handle_datagram(
    state: &mut TurretState,
    bytes: &[u8],
) -> Result<DatagramOutcome, TurretError> {
    let request = decode_datagram(bytes)?;
    debug!(?request, "executing datagram");
    match request {
        DatagramRequest::Stepper {
            target: AxisTarget::Base,
            angle,
        } => {
            state.move_base(angle)?;
            Ok(DatagramOutcome::NoReply)
        }
        DatagramRequest::Stepper {
            target: AxisTarget::Elevation,
            angle,
        } => {
            state.set_elevation(angle)?;
            Ok(DatagramOutcome::NoReply)
        }
        DatagramRequest::Fire { count } => {
            state.shoot(count)?;
            Ok(DatagramOutcome::NoReply)
        }
        DatagramRequest::Status => {
            let report = state.status()?;
            Ok(DatagramOutcome::Reply(encode_status_reply(&report)?))
        }
        DatagramRequest::Stop => Ok(DatagramOutcome::Stop),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::tests::sim_state;
    use turret_hal::SimRig;

    #[test]
    fn status_request_replies_with_status_response() {
        let rig = SimRig::builder().base_angle(180.0).build();
        let mut state = sim_state(&rig);
        let reply = handle(&mut state, br#"{"type":"status_request"}"#).unwrap();
        assert_eq!(
            reply,
            Message::StatusResponse {
                base_angle: 180.0,
                elev_angle: 0.0,
                shots: 0
            }
        );
    }

    #[test]
    fn commands_reply_with_ack() {
        let rig = SimRig::builder().build();
        let mut state = sim_state(&rig);
        assert_eq!(
            handle(&mut state, br#"{"type":"shoot","count":1}"#).unwrap(),
            Message::Ack
        );
        assert_eq!(
            handle(&mut state, br#"{"type":"move","base_angle":20,"elev_angle":5}"#).unwrap(),
            Message::Ack
        );
        assert_eq!(handle(&mut state, br#"{"type":"reset"}"#).unwrap(), Message::Ack);
        assert_eq!(state.shots(), 0);
    }

    #[test]
    fn unsupported_payload_leaves_state_untouched() {
        let rig = SimRig::builder().build();
        let mut state = sim_state(&rig);
        state.shoot(1).unwrap();
        rig.bus.clear_transactions();

        assert!(matches!(
            handle(&mut state, b"\x00garbage"),
            Err(TurretError::UnsupportedMessage)
        ));
        assert_eq!(state.shots(), 1);
        assert!(rig.bus.transactions().is_empty());
        assert_eq!(rig.shaft.pulses(), 0);
    }

    #[test]
    fn datagram_stepper_moves_one_axis() {
        let rig = SimRig::builder().build();
        let mut state = sim_state(&rig);

        let outcome =
            handle_datagram(&mut state, br#"{"type":"stepper","target":"elevation","angle":30}"#)
                .unwrap();
        assert_eq!(outcome, DatagramOutcome::NoReply);
        assert_eq!(rig.elevation.history(), vec![30.0]);
        assert_eq!(rig.shaft.pulses(), 0);

        handle_datagram(&mut state, br#"{"type":"stepper","target":"base","base":20}"#).unwrap();
        assert!((rig.shaft.angle() - 20.0).abs() <= 1.8);
    }

    #[test]
    fn datagram_fire_then_status() {
        let rig = SimRig::builder().build();
        let mut state = sim_state(&rig);
        handle_datagram(&mut state, br#"{"type":"fire","count":2}"#).unwrap();

        let DatagramOutcome::Reply(bytes) =
            handle_datagram(&mut state, br#"{"type":"status"}"#).unwrap()
        else {
            panic!("status must reply");
        };
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(json["type"], "status");
        assert_eq!(json["shots"], 2);
    }

    #[test]
    fn datagram_stop_requests_shutdown() {
        let rig = SimRig::builder().build();
        let mut state = sim_state(&rig);
        assert_eq!(
            handle_datagram(&mut state, br#"{"type":"stop"}"#).unwrap(),
            DatagramOutcome::Stop
        );
    }
}
