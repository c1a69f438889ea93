//! [`TurretState`] – exclusive owner of the turret hardware.
//!
//! Created once at daemon start. Dropping it de-energises the launcher
//! relay and returns the trigger to rest.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use tracing::{info, instrument, warn};
use turret_hal::stepper::DEFAULT_TOLERANCE;
use turret_hal::{AngleMux, MotionAxis, MoveReport, Relay, Servo, SimRig};
use turret_types::{StatusReport, TurretError};

/// Timing and trigger angles of the firing sequence.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FiringParams {
    /// Wait after energising the launcher motors.
    pub relay_settle: Duration,
    /// Hold after each trigger movement.
    pub hold: Duration,
    /// Trigger angle that releases a dart.
    pub extended_angle: f32,
    pub rest_angle: f32,
}

impl Default for FiringParams {
    fn default() -> Self {
        Self {
            relay_settle: Duration::from_millis(500),
            hold: Duration::from_millis(1000),
            extended_angle: -33.0,
            rest_angle: 0.0,
        }
    }
}

/// The devices a [`TurretState`] takes ownership of.
pub struct TurretHardware {
    pub base: MotionAxis,
    pub elevation: Box<dyn Servo>,
    pub trigger: Box<dyn Servo>,
    pub relay: Box<dyn Relay>,
}

impl TurretHardware {
    /// Hardware backed by the parts of `rig`, with the azimuth reading
    /// `mux` on the rig's base channel. A `headless` axis gets no step or
    /// direction pins.
    ///
    /// # Errors
    ///
    /// Returns [`TurretError::InvalidChannel`] if the rig's base channel is
    /// out of range.
    pub fn simulated(rig: &SimRig, mux: Arc<AngleMux>, headless: bool) -> Result<Self, TurretError> {
        let pins = (!headless).then(|| rig.stepper_pins());
        Ok(Self {
            base: MotionAxis::new("base", mux, rig.base_channel, pins)?,
            elevation: Box::new(rig.elevation.clone()),
            trigger: Box::new(rig.trigger.clone()),
            relay: Box::new(rig.relay.clone()),
        })
    }
}

pub struct TurretState {
    hw: TurretHardware,
    firing: FiringParams,
    tolerance: f32,
    shots: u64,
}

impl TurretState {
    pub fn new(hw: TurretHardware) -> Self {
        Self {
            hw,
            firing: FiringParams::default(),
            tolerance: DEFAULT_TOLERANCE,
            shots: 0,
        }
    }

    pub fn with_firing(mut self, firing: FiringParams) -> Self {
        self.firing = firing;
        self
    }

    /// Azimuth convergence tolerance in degrees.
    pub fn with_tolerance(mut self, tolerance: f32) -> Self {
        self.tolerance = tolerance;
        self
    }

    pub fn shots(&self) -> u64 {
        self.shots
    }

    /// Drive the azimuth closed-loop to `base_angle`, then set the
    /// elevation servo to `elev_angle`. An unreachable elevation is
    /// rejected before either axis moves.
    ///
    /// # Errors
    ///
    /// Propagates [`MotionAxis::move_to`] failures; returns
    /// [`TurretError::ServoRange`] for an unreachable elevation.
    #[instrument(skip(self))]
    pub fn move_to(&mut self, base_angle: f32, elev_angle: f32) -> Result<MoveReport, TurretError> {
        self.hw.elevation.check(elev_angle)?;
        let report = self.move_base(base_angle)?;
        self.set_elevation(elev_angle)?;
        Ok(report)
    }

    /// Drive only the azimuth axis.
    ///
    /// # Errors
    ///
    /// Propagates [`MotionAxis::move_to`] failures.
    pub fn move_base(&mut self, angle: f32) -> Result<MoveReport, TurretError> {
        self.hw.base.move_to(angle, self.tolerance)
    }

    /// Set only the elevation servo (open loop).
    ///
    /// # Errors
    ///
    /// Returns [`TurretError::ServoRange`] for an unreachable elevation.
    pub fn set_elevation(&mut self, angle: f32) -> Result<(), TurretError> {
        self.hw.elevation.set_angle(angle)
    }

    /// Fire `count` shots: relay on, settle, `count` trigger cycles, relay
    /// off. The counter only advances once the full sequence succeeded; the
    /// relay is released even when a trigger movement fails.
    ///
    /// # Errors
    ///
    /// Propagates relay and trigger servo failures.
    #[instrument(skip(self))]
    pub fn shoot(&mut self, count: u32) -> Result<(), TurretError> {
        self.hw.relay.engage()?;
        thread::sleep(self.firing.relay_settle);
        let cycles = self.trigger_cycles(count);
        let released = self.hw.relay.release();
        cycles?;
        released?;

        self.shots += u64::from(count);
        info!(count, total = self.shots, "fired");
        Ok(())
    }

    fn trigger_cycles(&mut self, count: u32) -> Result<(), TurretError> {
        let FiringParams {
            hold,
            extended_angle,
            rest_angle,
            ..
        } = self.firing;
        for _ in 0..count {
            self.hw.trigger.set_angle(extended_angle)?;
            thread::sleep(hold);
            self.hw.trigger.set_angle(rest_angle)?;
            thread::sleep(hold);
        }
        Ok(())
    }

    /// Fresh azimuth reading, last commanded elevation and the shot count.
    ///
    /// # Errors
    ///
    /// Returns [`TurretError::Bus`] if the encoder read fails.
    pub fn status(&self) -> Result<StatusReport, TurretError> {
        Ok(StatusReport {
            base_angle: self.hw.base.angle()?,
            elev_angle: self.hw.elevation.angle(),
            shots: self.shots,
        })
    }

    /// Return to `(0, 0)` and clear the shot counter.
    ///
    /// # Errors
    ///
    /// Propagates [`move_to`][Self::move_to] failures; the counter is left
    /// untouched in that case.
    pub fn reset(&mut self) -> Result<(), TurretError> {
        self.move_to(0.0, 0.0)?;
        self.shots = 0;
        info!("turret reset");
        Ok(())
    }

    /// Set the zero offset of an encoder channel.
    ///
    /// # Errors
    ///
    /// Returns [`TurretError::InvalidChannel`] for `channel >= 8`.
    pub fn calibrate_zero(&self, channel: u8, offset: f32) -> Result<(), TurretError> {
        self.hw.base.mux().set_offset(channel, offset)
    }

    /// Current zero offset of an encoder channel.
    ///
    /// # Errors
    ///
    /// Returns [`TurretError::InvalidChannel`] for `channel >= 8`.
    pub fn offset(&self, channel: u8) -> Result<f32, TurretError> {
        self.hw.base.mux().offset(channel)
    }
}

impl Drop for TurretState {
    fn drop(&mut self) {
        if let Err(e) = self.hw.relay.release() {
            warn!(error = %e, "failed to release launcher relay");
        }
        if let Err(e) = self.hw.trigger.set_angle(self.firing.rest_angle) {
            warn!(error = %e, "failed to return trigger to rest");
        }
    }
}
