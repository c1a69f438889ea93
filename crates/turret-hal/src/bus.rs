//! Byte-level I2C bus used by the encoder multiplexer and the encoders.

use turret_types::TurretError;

/// The two SMBus primitives the encoder bank needs.
///
/// Implementations own the bus exclusively; sharing across threads goes
/// through [`AngleMux`][crate::mux::AngleMux], which serialises access.
pub trait I2cBus: Send {
    /// Send a single byte to the device at `addr` (SMBus "send byte").
    ///
    /// # Errors
    ///
    /// Returns [`TurretError::Bus`] if the device does not acknowledge.
    fn write_byte(&mut self, addr: u8, value: u8) -> Result<(), TurretError>;

    /// Read the byte stored in `register` of the device at `addr`
    /// (SMBus "read byte data").
    ///
    /// # Errors
    ///
    /// Returns [`TurretError::Bus`] if the transaction fails.
    fn read_byte_data(&mut self, addr: u8, register: u8) -> Result<u8, TurretError>;
}

/// One recorded bus transaction, used by the simulated bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusTransaction {
    WriteByte { addr: u8, value: u8 },
    ReadByteData { addr: u8, register: u8 },
}
