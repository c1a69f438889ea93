//! [`AngleMux`] – exclusive access to the eight encoders behind one bus
//! multiplexer.
//!
//! Every encoder answers on the same address, so a read is only meaningful
//! while its channel is selected. [`AngleMux::select`] validates the channel,
//! takes the bus lock, writes the channel index to the multiplexer and hands
//! out an [`AngleSensor`] that keeps the lock for the whole read sequence.
//! Dropping the sensor writes the idle value back, whether or not the read
//! succeeded.
//!
//! ```text
//! select(3) ──► lock ──► 0x70 ← 3 ──► read 0x0C, 0x0D ──► drop ──► 0x70 ← 0 ──► unlock
//! ```

use std::sync::{Mutex, MutexGuard, PoisonError};

use turret_types::{MUX_CHANNELS, TurretError};

use crate::bus::I2cBus;
use crate::register_map::{ENCODER_ADDRESS, MUX_ADDRESS, MUX_IDLE, RegisterMap};
use crate::sensor::AngleSensor;

/// Addresses and register layout used by an [`AngleMux`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MuxConfig {
    pub mux_address: u8,
    pub encoder_address: u8,
    /// Control byte restored after every read sequence.
    pub idle_value: u8,
    pub register_map: RegisterMap,
}

impl Default for MuxConfig {
    fn default() -> Self {
        Self {
            mux_address: MUX_ADDRESS,
            encoder_address: ENCODER_ADDRESS,
            idle_value: MUX_IDLE,
            register_map: RegisterMap::default(),
        }
    }
}

/// Bus handle and per-channel offsets, guarded together.
pub(crate) struct MuxInner {
    pub(crate) bus: Box<dyn I2cBus>,
    pub(crate) offsets: [f32; MUX_CHANNELS as usize],
}

/// Serialises channel selection on a shared encoder bus.
pub struct AngleMux {
    config: MuxConfig,
    inner: Mutex<MuxInner>,
}

impl AngleMux {
    /// Wrap `bus` with all channel offsets at zero.
    pub fn new(bus: Box<dyn I2cBus>, config: MuxConfig) -> Self {
        Self {
            config,
            inner: Mutex::new(MuxInner {
                bus,
                offsets: [0.0; MUX_CHANNELS as usize],
            }),
        }
    }

    /// Seed the offset table from `offsets`; entries beyond the eighth are
    /// ignored, missing entries stay at zero.
    pub fn with_offsets(self, offsets: &[f32]) -> Self {
        {
            let mut inner = self.lock();
            for (slot, offset) in inner.offsets.iter_mut().zip(offsets) {
                *slot = *offset;
            }
        }
        self
    }

    pub fn config(&self) -> &MuxConfig {
        &self.config
    }

    /// Select `channel` and return a sensor handle bound to it.
    ///
    /// The handle holds the bus lock until dropped; drop it before selecting
    /// again on the same thread.
    ///
    /// # Errors
    ///
    /// - [`TurretError::InvalidChannel`] for `channel >= 8`, before any bus
    ///   traffic.
    /// - [`TurretError::Bus`] if the multiplexer rejects the control byte
    ///   (the idle value is still written back).
    pub fn select(&self, channel: u8) -> Result<AngleSensor<'_>, TurretError> {
        check_channel(channel)?;
        let mut sensor = AngleSensor::new(self.lock(), channel, &self.config);
        sensor.bus().write_byte(self.config.mux_address, channel)?;
        Ok(sensor)
    }

    /// Convenience for `select(channel)?.read()`.
    ///
    /// # Errors
    ///
    /// Propagates [`select`][Self::select] and
    /// [`AngleSensor::read`] failures.
    pub fn read(&self, channel: u8) -> Result<f32, TurretError> {
        self.select(channel)?.read()
    }

    /// Calibration offset of `channel` in degrees.
    ///
    /// # Errors
    ///
    /// Returns [`TurretError::InvalidChannel`] for `channel >= 8`.
    pub fn offset(&self, channel: u8) -> Result<f32, TurretError> {
        check_channel(channel)?;
        Ok(self.lock().offsets[usize::from(channel)])
    }

    /// Replace the calibration offset of `channel`; applies to later reads.
    ///
    /// # Errors
    ///
    /// Returns [`TurretError::InvalidChannel`] for `channel >= 8`.
    pub fn set_offset(&self, channel: u8, offset: f32) -> Result<(), TurretError> {
        check_channel(channel)?;
        self.lock().offsets[usize::from(channel)] = offset;
        Ok(())
    }

    // A panic mid-read leaves the bus usable; the next select rewrites the
    // control byte anyway.
    fn lock(&self) -> MutexGuard<'_, MuxInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Reject channels the multiplexer does not have.
///
/// # Errors
///
/// Returns [`TurretError::InvalidChannel`] for `channel >= 8`.
pub fn check_channel(channel: u8) -> Result<(), TurretError> {
    if channel < MUX_CHANNELS {
        Ok(())
    } else {
        Err(TurretError::InvalidChannel(channel))
    }
}
