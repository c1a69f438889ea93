//! Raspberry Pi drivers over `rppal`.
//!
//! Only built with the `rpi` feature on Linux. Servos use `rppal`'s
//! software PWM on the output pin, so any GPIO line works.

use rppal::gpio::{Gpio, OutputPin as GpioOutputPin};
use rppal::i2c::I2c;
use tracing::debug;
use turret_types::TurretError;

use crate::bus::I2cBus;
use crate::gpio::OutputPin;
use crate::relay::Relay;
use crate::servo::{SERVO_PERIOD, Servo, ServoCalibration};

fn fault(component: &str, err: impl std::fmt::Display) -> TurretError {
    TurretError::HardwareFault {
        component: component.to_string(),
        details: err.to_string(),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// I2C
// ─────────────────────────────────────────────────────────────────────────────

/// SMBus access to `/dev/i2c-<bus>`.
pub struct RpiI2cBus {
    i2c: I2c,
    slave: Option<u8>,
}

impl RpiI2cBus {
    /// Open I2C bus `bus` (bus 1 on every Pi since the model B rev 2).
    ///
    /// # Errors
    ///
    /// Returns [`TurretError::HardwareFault`] if the bus device cannot be
    /// opened.
    pub fn open(bus: u8) -> Result<Self, TurretError> {
        let i2c = I2c::with_bus(bus).map_err(|e| fault("i2c", e))?;
        debug!(bus, "opened i2c bus");
        Ok(Self { i2c, slave: None })
    }

    fn address(&mut self, addr: u8) -> Result<(), TurretError> {
        if self.slave != Some(addr) {
            self.i2c
                .set_slave_address(u16::from(addr))
                .map_err(|e| bus_error(addr, e))?;
            self.slave = Some(addr);
        }
        Ok(())
    }
}

fn bus_error(addr: u8, err: rppal::i2c::Error) -> TurretError {
    TurretError::Bus {
        addr,
        details: err.to_string(),
    }
}

impl I2cBus for RpiI2cBus {
    fn write_byte(&mut self, addr: u8, value: u8) -> Result<(), TurretError> {
        self.address(addr)?;
        self.i2c.smbus_send_byte(value).map_err(|e| bus_error(addr, e))
    }

    fn read_byte_data(&mut self, addr: u8, register: u8) -> Result<u8, TurretError> {
        self.address(addr)?;
        self.i2c
            .smbus_read_byte(register)
            .map_err(|e| bus_error(addr, e))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// GPIO outputs
// ─────────────────────────────────────────────────────────────────────────────

/// A BCM-numbered output line.
pub struct RpiPin {
    id: String,
    pin: GpioOutputPin,
}

impl OutputPin for RpiPin {
    fn id(&self) -> &str {
        &self.id
    }

    fn set_level(&mut self, high: bool) -> Result<(), TurretError> {
        if high {
            self.pin.set_high();
        } else {
            self.pin.set_low();
        }
        Ok(())
    }
}

/// Servo driven by software PWM at 50 Hz.
pub struct RpiServo {
    id: String,
    pin: GpioOutputPin,
    calibration: ServoCalibration,
    angle: f32,
}

impl Servo for RpiServo {
    fn id(&self) -> &str {
        &self.id
    }

    fn set_angle(&mut self, degrees: f32) -> Result<(), TurretError> {
        self.calibration.check(&self.id, degrees)?;
        let pulse = self.calibration.pulse_width(degrees);
        self.pin
            .set_pwm(SERVO_PERIOD, pulse)
            .map_err(|e| fault(&self.id, e))?;
        self.angle = degrees;
        Ok(())
    }

    fn angle(&self) -> f32 {
        self.angle
    }

    fn calibration(&self) -> ServoCalibration {
        self.calibration
    }
}

/// Relay on a GPIO line (high = energised).
pub struct RpiRelay {
    id: String,
    pin: GpioOutputPin,
}

impl Relay for RpiRelay {
    fn id(&self) -> &str {
        &self.id
    }

    fn set_state(&mut self, active: bool) -> Result<(), TurretError> {
        if active {
            self.pin.set_high();
        } else {
            self.pin.set_low();
        }
        Ok(())
    }

    fn state(&self) -> bool {
        self.pin.is_set_high()
    }
}

/// Entry point for claiming GPIO lines.
pub struct RpiGpio {
    gpio: Gpio,
}

impl RpiGpio {
    /// # Errors
    ///
    /// Returns [`TurretError::HardwareFault`] if `/dev/gpiomem` is
    /// unavailable.
    pub fn open() -> Result<Self, TurretError> {
        let gpio = Gpio::new().map_err(|e| fault("gpio", e))?;
        Ok(Self { gpio })
    }

    fn output(&self, id: &str, bcm: u8) -> Result<GpioOutputPin, TurretError> {
        let pin = self.gpio.get(bcm).map_err(|e| fault(id, e))?;
        Ok(pin.into_output_low())
    }

    /// Claim `bcm` as a plain output, initially low.
    ///
    /// # Errors
    ///
    /// Returns [`TurretError::HardwareFault`] if the line is busy or absent.
    pub fn pin(&self, id: impl Into<String>, bcm: u8) -> Result<RpiPin, TurretError> {
        let id = id.into();
        let pin = self.output(&id, bcm)?;
        Ok(RpiPin { id, pin })
    }

    /// Claim `bcm` for a servo and drive it to `initial_angle`, so the
    /// reported angle matches the horn from the start.
    ///
    /// # Errors
    ///
    /// - [`TurretError::HardwareFault`] if the line is busy or absent, or
    ///   PWM cannot be started.
    /// - [`TurretError::ServoRange`] if `initial_angle` is outside
    ///   `calibration`.
    pub fn servo(
        &self,
        id: impl Into<String>,
        bcm: u8,
        calibration: ServoCalibration,
        initial_angle: f32,
    ) -> Result<RpiServo, TurretError> {
        let id = id.into();
        let pin = self.output(&id, bcm)?;
        let mut servo = RpiServo {
            id,
            pin,
            calibration,
            angle: initial_angle,
        };
        servo.set_angle(initial_angle)?;
        Ok(servo)
    }

    /// Claim `bcm` for a relay, initially de-energised.
    ///
    /// # Errors
    ///
    /// Returns [`TurretError::HardwareFault`] if the line is busy or absent.
    pub fn relay(&self, id: impl Into<String>, bcm: u8) -> Result<RpiRelay, TurretError> {
        let id = id.into();
        let pin = self.output(&id, bcm)?;
        Ok(RpiRelay { id, pin })
    }
}
