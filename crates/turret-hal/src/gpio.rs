//! Binary output lines (stepper step and direction pins).

use turret_types::TurretError;

/// A push-pull digital output.
pub trait OutputPin: Send {
    /// Stable identifier for this line, e.g. `"base_step"`.
    fn id(&self) -> &str;

    /// Drive the line high (`true`) or low (`false`).
    ///
    /// # Errors
    ///
    /// Returns [`TurretError::HardwareFault`] if the level cannot be applied.
    fn set_level(&mut self, high: bool) -> Result<(), TurretError>;

    fn set_high(&mut self) -> Result<(), TurretError> {
        self.set_level(true)
    }

    fn set_low(&mut self) -> Result<(), TurretError> {
        self.set_level(false)
    }
}
