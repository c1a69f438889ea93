//! Generic `Relay` trait for the launcher's motor power switch.

use turret_types::TurretError;

/// Coil of the launcher motor power switch.
pub trait Relay: Send {
    /// Stable identifier for this relay, e.g. `"motor_relay"`.
    fn id(&self) -> &str;

    /// Energise the coil when `active`, de-energise it otherwise.
    ///
    /// # Errors
    ///
    /// Returns [`TurretError::HardwareFault`] if the command cannot be applied.
    fn set_state(&mut self, active: bool) -> Result<(), TurretError>;

    /// Last commanded coil state.
    fn state(&self) -> bool;

    /// Energise the relay.
    fn engage(&mut self) -> Result<(), TurretError> {
        self.set_state(true)
    }

    /// De-energise the relay if it is on. Releasing an idle relay issues
    /// no command.
    fn release(&mut self) -> Result<(), TurretError> {
        if self.state() {
            self.set_state(false)
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct MockRelay {
        id: String,
        state: bool,
        commands: usize,
    }

    impl Relay for MockRelay {
        fn id(&self) -> &str {
            &self.id
        }

        fn set_state(&mut self, active: bool) -> Result<(), TurretError> {
            self.state = active;
            self.commands += 1;
            Ok(())
        }

        fn state(&self) -> bool {
            self.state
        }
    }

    fn relay() -> MockRelay {
        MockRelay {
            id: "motor_relay".to_string(),
            state: false,
            commands: 0,
        }
    }

    #[test]
    fn engage_then_release() {
        let mut relay = relay();
        assert_eq!(relay.id(), "motor_relay");

        relay.engage().unwrap();
        assert!(relay.state());

        relay.release().unwrap();
        assert!(!relay.state());
        assert_eq!(relay.commands, 2);
    }

    #[test]
    fn release_of_idle_relay_is_silent() {
        let mut relay = relay();
        relay.release().unwrap();
        assert_eq!(relay.commands, 0);
    }
}
