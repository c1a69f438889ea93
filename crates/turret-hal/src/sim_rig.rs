//! [`SimRig`] – a complete simulated turret for tests and `backend = "sim"`.
//!
//! The builder wires one [`SimShaft`] to the step and direction pins and to
//! an encoder on the base channel, and adds the elevation servo, trigger
//! servo and motor relay. Every part is a clonable handle, so a test can
//! hand boxed clones to the code under test and still assert on the
//! originals.
//!
//! # Example
//!
//! ```rust
//! use turret_hal::SimRig;
//! use turret_hal::stepper::MotionAxis;
//!
//! let rig = SimRig::builder().base_angle(90.0).build();
//! let axis = MotionAxis::new("base", rig.mux(), rig.base_channel, Some(rig.stepper_pins()))
//!     .unwrap();
//! assert!((axis.angle().unwrap() - 90.0).abs() < 0.1);
//! ```

use std::sync::Arc;

use tracing::warn;

use crate::mux::{AngleMux, MuxConfig};
use crate::register_map::RegisterMap;
use crate::servo::ServoCalibration;
use crate::sim::{PinRole, SimEncoderBus, SimPin, SimRelay, SimServo, SimShaft};
use crate::stepper::StepperPins;

/// Builder for [`SimRig`].
pub struct SimRigBuilder {
    base_channel: u8,
    base_angle: f32,
    step_degrees: f32,
    register_map: RegisterMap,
    stalled: bool,
    servo_calibration: ServoCalibration,
}

impl Default for SimRigBuilder {
    fn default() -> Self {
        Self {
            base_channel: 0,
            base_angle: 0.0,
            step_degrees: 1.8,
            register_map: RegisterMap::default(),
            stalled: false,
            servo_calibration: ServoCalibration::default(),
        }
    }
}

impl SimRigBuilder {
    /// Mux channel of the base encoder. An out-of-range channel leaves the
    /// encoder unattached, and building an axis on it fails.
    pub fn base_channel(mut self, channel: u8) -> Self {
        self.base_channel = channel;
        self
    }

    /// Starting shaft angle in degrees.
    pub fn base_angle(mut self, angle: f32) -> Self {
        self.base_angle = angle;
        self
    }

    pub fn step_degrees(mut self, degrees: f32) -> Self {
        self.step_degrees = degrees;
        self
    }

    pub fn register_map(mut self, map: RegisterMap) -> Self {
        self.register_map = map;
        self
    }

    /// Start with the shaft stalled.
    pub fn stalled(mut self, stalled: bool) -> Self {
        self.stalled = stalled;
        self
    }

    pub fn servo_calibration(mut self, calibration: ServoCalibration) -> Self {
        self.servo_calibration = calibration;
        self
    }

    pub fn build(self) -> SimRig {
        let shaft = SimShaft::new(self.base_angle, self.step_degrees);
        shaft.set_stalled(self.stalled);

        let bus = SimEncoderBus::new(self.register_map);
        if let Err(e) = bus.attach(self.base_channel, shaft.clone()) {
            warn!(error = %e, "base encoder not attached");
        }

        SimRig {
            base_channel: self.base_channel,
            register_map: self.register_map,
            step_pin: SimPin::new("base_step", PinRole::Step(shaft.clone())),
            dir_pin: SimPin::new("base_dir", PinRole::Direction(shaft.clone())),
            elevation: SimServo::new("elevation", self.servo_calibration),
            trigger: SimServo::new("trigger", self.servo_calibration),
            relay: SimRelay::new("motor_relay"),
            bus,
            shaft,
        }
    }
}

/// Handles to every simulated part of the turret.
pub struct SimRig {
    pub base_channel: u8,
    pub register_map: RegisterMap,
    pub bus: SimEncoderBus,
    pub shaft: SimShaft,
    pub step_pin: SimPin,
    pub dir_pin: SimPin,
    pub elevation: SimServo,
    pub trigger: SimServo,
    pub relay: SimRelay,
}

impl SimRig {
    pub fn builder() -> SimRigBuilder {
        SimRigBuilder::default()
    }

    /// A fresh [`AngleMux`] over the simulated bus with the rig's register
    /// map and default addresses.
    pub fn mux(&self) -> Arc<AngleMux> {
        self.mux_with(MuxConfig {
            register_map: self.register_map,
            ..MuxConfig::default()
        })
    }

    /// Like [`mux`][Self::mux] with an explicit configuration; the register
    /// map should match the one the rig was built with.
    pub fn mux_with(&self, config: MuxConfig) -> Arc<AngleMux> {
        Arc::new(AngleMux::new(Box::new(self.bus.clone()), config))
    }

    pub fn stepper_pins(&self) -> StepperPins {
        StepperPins {
            step: Box::new(self.step_pin.clone()),
            direction: Box::new(self.dir_pin.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::servo::Servo;

    #[test]
    fn default_rig_reads_zero_on_channel_zero() {
        let rig = SimRig::builder().build();
        assert_eq!(rig.mux().read(0).unwrap(), 0.0);
    }

    #[test]
    fn base_channel_and_register_map_are_honoured() {
        let rig = SimRig::builder()
            .base_channel(6)
            .base_angle(123.0)
            .register_map(RegisterMap::ANGLE_UNSCALED)
            .build();
        let mux = rig.mux();
        assert!((mux.read(6).unwrap() - 123.0).abs() < f32::EPSILON);
        assert!(mux.read(0).is_err());
    }

    #[test]
    fn servo_handles_share_state() {
        let rig = SimRig::builder().build();
        let mut boxed: Box<dyn Servo> = Box::new(rig.elevation.clone());
        boxed.set_angle(15.0).unwrap();
        assert_eq!(rig.elevation.angle(), 15.0);
    }

    #[test]
    fn out_of_range_base_channel_builds_without_encoder() {
        use crate::stepper::MotionAxis;
        use turret_types::TurretError;

        let rig = SimRig::builder().base_channel(9).build();
        assert!(matches!(
            MotionAxis::new("base", rig.mux(), rig.base_channel, Some(rig.stepper_pins())),
            Err(TurretError::InvalidChannel(9))
        ));
    }
}
