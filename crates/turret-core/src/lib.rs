//! `turret-core` – the turret as one owned object, and the request
//! dispatcher in front of it.
//!
//! # Modules
//!
//! - [`state`] – [`TurretState`]: owns the azimuth axis, both servos and the
//!   launcher relay, and keeps the shot counter.
//! - [`dispatcher`] – classifies raw payloads, executes them against a
//!   [`TurretState`] and encodes the reply.

pub mod dispatcher;
pub mod state;

pub use dispatcher::{DatagramOutcome, execute, handle, handle_datagram};
pub use state::{FiringParams, TurretHardware, TurretState};
