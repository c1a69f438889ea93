//! `turret-protocol` – wire formats spoken by `turretd`.
//!
//! Two client dialects share the daemon:
//!
//! 1. **Stream** (TCP): tagged JSON [`Message`]s, one per frame. Incoming
//!    payloads are not decoded strictly; [`classify`] matches them by shape
//!    in a fixed priority order so older clients that omit the `"type"` tag
//!    keep working.
//! 2. **Datagram** (UDP): the `stepper` / `fire` / `status` / `stop`
//!    commands in [`datagram`], one JSON object per datagram.
//!
//! # Modules
//!
//! - [`codec`] – strict encode/decode of [`Message`].
//! - [`classify`] – shape-based, priority-ordered request classification.
//! - [`datagram`] – the datagram command set and its status reply.
//! - [`framing`] – length-prefixed and legacy stream framing.
//!
//! [`Message`]: turret_types::Message

pub mod classify;
pub mod codec;
pub mod datagram;
pub mod framing;

pub use classify::classify;
pub use codec::{decode, encode};
pub use datagram::{DatagramRequest, decode_datagram, encode_status_reply};
pub use framing::{Framing, MAX_FRAME_LEN};
