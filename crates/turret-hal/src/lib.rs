//! `turret-hal` – hardware abstraction for the turret rig.
//!
//! # Modules
//!
//! - [`bus`] – [`I2cBus`][bus::I2cBus]: the byte-level bus the encoder bank
//!   and its multiplexer hang off.
//! - [`gpio`] – [`OutputPin`][gpio::OutputPin]: binary outputs (step and
//!   direction lines).
//! - [`servo`] – [`Servo`][servo::Servo] and the pulse-width
//!   [`ServoCalibration`][servo::ServoCalibration].
//! - [`relay`] – [`Relay`][relay::Relay]: the launcher power switch.
//! - [`register_map`] – the fixed bus addresses and the two supported
//!   encoder register layouts.
//! - [`mux`] – [`AngleMux`][mux::AngleMux]: exclusive channel selection with
//!   guaranteed restoration to the idle channel.
//! - [`sensor`] – [`AngleSensor`][sensor::AngleSensor]: the scoped handle
//!   that turns a register pair into a normalized angle.
//! - [`stepper`] – [`MotionAxis`][stepper::MotionAxis]: the closed-loop
//!   stepper controller.
//! - [`sim`] / [`sim_rig`] – simulated drivers for headless tests and
//!   development without a Raspberry Pi.
//! - `rpi` (feature `rpi`, Linux only) – `rppal`-backed drivers.

pub mod bus;
pub mod gpio;
pub mod mux;
pub mod register_map;
pub mod relay;
pub mod sensor;
pub mod servo;
pub mod sim;
pub mod sim_rig;
pub mod stepper;

#[cfg(all(feature = "rpi", target_os = "linux"))]
pub mod rpi;

pub use bus::I2cBus;
pub use gpio::OutputPin;
pub use mux::{AngleMux, MuxConfig};
pub use register_map::{RegisterMap, RegisterMapKind};
pub use relay::Relay;
pub use sensor::{AngleSensor, angle_from_raw, normalize_degrees};
pub use servo::{Servo, ServoCalibration};
pub use sim_rig::SimRig;
pub use stepper::{MotionAxis, MotionLimits, MoveReport, StepTiming, StepperPins};
