//! Positional hobby servos (elevation and trigger) and their pulse-width
//! calibration.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use turret_types::TurretError;

/// PWM period for standard 50 Hz hobby servos.
pub const SERVO_PERIOD: Duration = Duration::from_millis(20);

/// Linear mapping from an angular range to a pulse-width range.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ServoCalibration {
    #[serde(default = "default_min_angle")]
    pub min_angle: f32,
    #[serde(default = "default_max_angle")]
    pub max_angle: f32,
    #[serde(default = "default_min_pulse_us")]
    pub min_pulse_us: u32,
    #[serde(default = "default_max_pulse_us")]
    pub max_pulse_us: u32,
}

fn default_min_angle() -> f32 {
    -90.0
}
fn default_max_angle() -> f32 {
    90.0
}
fn default_min_pulse_us() -> u32 {
    500
}
fn default_max_pulse_us() -> u32 {
    2500
}

impl Default for ServoCalibration {
    fn default() -> Self {
        Self {
            min_angle: default_min_angle(),
            max_angle: default_max_angle(),
            min_pulse_us: default_min_pulse_us(),
            max_pulse_us: default_max_pulse_us(),
        }
    }
}

impl ServoCalibration {
    /// Reject angles outside `[min_angle, max_angle]`.
    ///
    /// # Errors
    ///
    /// Returns [`TurretError::ServoRange`] naming the servo `id`.
    pub fn check(&self, id: &str, angle: f32) -> Result<(), TurretError> {
        if angle.is_finite() && (self.min_angle..=self.max_angle).contains(&angle) {
            Ok(())
        } else {
            Err(TurretError::ServoRange {
                id: id.to_string(),
                angle,
                min: self.min_angle,
                max: self.max_angle,
            })
        }
    }

    /// Pulse width that positions the servo at `angle` (clamped to range).
    pub fn pulse_width(&self, angle: f32) -> Duration {
        let span = f64::from(self.max_angle - self.min_angle);
        let fraction = if span > 0.0 {
            (f64::from(angle - self.min_angle) / span).clamp(0.0, 1.0)
        } else {
            0.0
        };
        let min = f64::from(self.min_pulse_us);
        let max = f64::from(self.max_pulse_us);
        let micros = min + fraction * (max - min);
        Duration::from_nanos((micros * 1_000.0).round() as u64)
    }
}

/// A position-controlled servo addressed in degrees.
pub trait Servo: Send {
    /// Stable identifier, e.g. `"elevation"` or `"trigger"`.
    fn id(&self) -> &str;

    /// Command the servo to `degrees`.
    ///
    /// # Errors
    ///
    /// Returns [`TurretError::ServoRange`] for angles outside the servo's
    /// calibration, or [`TurretError::HardwareFault`] if the PWM output
    /// cannot be updated.
    fn set_angle(&mut self, degrees: f32) -> Result<(), TurretError>;

    /// Most recently commanded angle (servos have no position feedback).
    fn angle(&self) -> f32;

    fn calibration(&self) -> ServoCalibration;

    /// Validate `degrees` against the calibration without moving.
    ///
    /// # Errors
    ///
    /// Returns [`TurretError::ServoRange`] for angles the servo would
    /// reject.
    fn check(&self, degrees: f32) -> Result<(), TurretError> {
        self.calibration().check(self.id(), degrees)
    }
}
