//! Shared value types and the workspace-wide [`TurretError`].
//!
//! Everything that crosses a crate boundary lives here: the tagged
//! [`Message`] set spoken on the wire, the [`Request`] kinds the dispatcher
//! classifies incoming bytes into, and the rotation [`Direction`] of the
//! azimuth stepper.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Number of channels behind the encoder multiplexer.
pub const MUX_CHANNELS: u8 = 8;

/// Rotation direction of a stepper shaft.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Clockwise,
    CounterClockwise,
}

impl Direction {
    /// Direction-pin level for this direction (`true` = high = clockwise).
    pub fn pin_level(self) -> bool {
        matches!(self, Direction::Clockwise)
    }
}

/// Axis addressed by a single-axis `stepper` datagram.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AxisTarget {
    Base,
    Elevation,
}

/// The complete tagged message set of the stream protocol.
///
/// The serde representation is internally tagged by `"type"`, e.g.
/// `{"type":"move","base_angle":45.0,"elev_angle":10.0}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Message {
    /// Drive the azimuth to `base_angle` and the elevation to `elev_angle`.
    Move { base_angle: f32, elev_angle: f32 },
    /// Fire `count` shots.
    Shoot { count: u32 },
    /// Ask for a [`Message::StatusResponse`].
    StatusRequest,
    /// Snapshot of the turret.
    StatusResponse {
        base_angle: f32,
        elev_angle: f32,
        shots: u64,
    },
    /// Return to `(0, 0)` and clear the shot counter.
    Reset,
    /// Generic acknowledgement for commands without a payload reply.
    Ack,
}

/// The request kinds a client may send, in classification priority order.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Request {
    Move { base_angle: f32, elev_angle: f32 },
    Shoot { count: u32 },
    StatusRequest,
    Reset,
}

impl From<Request> for Message {
    fn from(request: Request) -> Self {
        match request {
            Request::Move {
                base_angle,
                elev_angle,
            } => Message::Move {
                base_angle,
                elev_angle,
            },
            Request::Shoot { count } => Message::Shoot { count },
            Request::StatusRequest => Message::StatusRequest,
            Request::Reset => Message::Reset,
        }
    }
}

/// Point-in-time turret snapshot returned by a status query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StatusReport {
    pub base_angle: f32,
    pub elev_angle: f32,
    pub shots: u64,
}

impl From<StatusReport> for Message {
    fn from(report: StatusReport) -> Self {
        Message::StatusResponse {
            base_angle: report.base_angle,
            elev_angle: report.elev_angle,
            shots: report.shots,
        }
    }
}

/// Workspace-wide error type spanning bus faults, motion faults, protocol
/// rejections and transport failures.
#[derive(Error, Debug)]
pub enum TurretError {
    #[error("invalid mux channel {0} (expected 0..8)")]
    InvalidChannel(u8),

    #[error("bus error at 0x{addr:02X}: {details}")]
    Bus { addr: u8, details: String },

    #[error("stepper fault on channel {channel}: encoder stuck at {angle:.2}° after a step")]
    StepperFault { channel: u8, angle: f32 },

    #[error(
        "motion timeout: target {target:.2}°, last reading {last_angle:.2}° after {steps} steps ({elapsed:?})"
    )]
    MotionTimeout {
        target: f32,
        last_angle: f32,
        steps: u32,
        elapsed: Duration,
    },

    #[error("servo '{id}' cannot reach {angle:.2}° (range {min:.1}°..{max:.1}°)")]
    ServoRange {
        id: String,
        angle: f32,
        min: f32,
        max: f32,
    },

    #[error("hardware fault on {component}: {details}")]
    HardwareFault { component: String, details: String },

    #[error("unsupported message")]
    UnsupportedMessage,

    #[error("codec error: {0}")]
    Codec(String),

    #[error("frame of {len} bytes exceeds the {max}-byte limit")]
    FrameTooLarge { len: usize, max: usize },

    #[error("configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
