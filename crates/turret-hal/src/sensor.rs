//! [`AngleSensor`] – a selected encoder channel, valid for one read
//! sequence.

use std::sync::MutexGuard;

use tracing::warn;
use turret_types::TurretError;

use crate::bus::I2cBus;
use crate::mux::{MuxConfig, MuxInner};
use crate::register_map::RegisterMap;

/// Normalize any finite angle into `[0, 360)`.
///
/// `rem_euclid` can round up to exactly `360.0` for tiny negative inputs;
/// that case folds back to `0.0`.
pub fn normalize_degrees(degrees: f32) -> f32 {
    let wrapped = degrees.rem_euclid(360.0);
    if wrapped >= 360.0 { 0.0 } else { wrapped }
}

/// Convert a raw register count into a calibrated angle in `[0, 360)`.
pub fn angle_from_raw(raw: u16, map: &RegisterMap, offset: f32) -> f32 {
    normalize_degrees(map.to_degrees(raw) - offset)
}

/// Scoped handle to the encoder on one multiplexer channel.
///
/// Holds the [`AngleMux`][crate::mux::AngleMux] lock; dropping it writes the
/// idle value back to the multiplexer.
pub struct AngleSensor<'a> {
    inner: MutexGuard<'a, MuxInner>,
    channel: u8,
    config: &'a MuxConfig,
}

impl<'a> AngleSensor<'a> {
    pub(crate) fn new(inner: MutexGuard<'a, MuxInner>, channel: u8, config: &'a MuxConfig) -> Self {
        Self {
            inner,
            channel,
            config,
        }
    }

    pub(crate) fn bus(&mut self) -> &mut dyn I2cBus {
        self.inner.bus.as_mut()
    }

    pub fn channel(&self) -> u8 {
        self.channel
    }

    /// Masked register count, high byte read first.
    ///
    /// # Errors
    ///
    /// Returns [`TurretError::Bus`] if either register read fails.
    pub fn read_raw(&mut self) -> Result<u16, TurretError> {
        let map = self.config.register_map;
        let addr = self.config.encoder_address;
        let high = self.bus().read_byte_data(addr, map.high_register)?;
        let low = self.bus().read_byte_data(addr, map.low_register)?;
        Ok(map.combine(high, low))
    }

    /// Calibrated angle in `[0, 360)`. Never cached.
    ///
    /// # Errors
    ///
    /// Returns [`TurretError::Bus`] if either register read fails.
    pub fn read(&mut self) -> Result<f32, TurretError> {
        let raw = self.read_raw()?;
        Ok(angle_from_raw(raw, &self.config.register_map, self.offset()))
    }

    pub fn offset(&self) -> f32 {
        self.inner.offsets[usize::from(self.channel)]
    }

    /// Replace this channel's offset; later reads on any handle use it.
    pub fn set_offset(&mut self, offset: f32) {
        self.inner.offsets[usize::from(self.channel)] = offset;
    }
}

impl Drop for AngleSensor<'_> {
    fn drop(&mut self) {
        let (addr, idle) = (self.config.mux_address, self.config.idle_value);
        if let Err(err) = self.inner.bus.write_byte(addr, idle) {
            warn!(channel = self.channel, error = %err, "failed to restore mux idle channel");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mux::AngleMux;
    use crate::sim::{SimEncoderBus, SimShaft};

    #[test]
    fn half_scale_raw_count_is_180_degrees() {
        assert_eq!(angle_from_raw(2048, &RegisterMap::RAW_ANGLE, 0.0), 180.0);
    }

    #[test]
    fn offset_is_subtracted_and_wrapped() {
        let map = RegisterMap::RAW_ANGLE;
        assert_eq!(angle_from_raw(0, &map, 10.0), 350.0);
        assert_eq!(angle_from_raw(2048, &map, -200.0), 20.0);
        assert_eq!(angle_from_raw(2048, &map, 540.0), 0.0);
    }

    #[test]
    fn unscaled_fixture_subtracts_mounting_offset() {
        let map = RegisterMap::ANGLE_UNSCALED;
        assert!((angle_from_raw(300, &map, 279.76) - 20.24).abs() < 1e-3);
        assert!((angle_from_raw(100, &map, 279.76) - 180.24).abs() < 1e-3);
    }

    #[test]
    fn normalize_handles_negative_and_boundary_values() {
        assert_eq!(normalize_degrees(-90.0), 270.0);
        assert_eq!(normalize_degrees(360.0), 0.0);
        assert_eq!(normalize_degrees(725.0), 5.0);
        let tiny = normalize_degrees(-1e-7);
        assert!((0.0..360.0).contains(&tiny));
    }

    #[test]
    fn sensor_offset_applies_to_later_reads() {
        let bus = SimEncoderBus::new(RegisterMap::RAW_ANGLE);
        bus.attach(0, SimShaft::new(90.0, 1.8)).unwrap();
        let mux = AngleMux::new(Box::new(bus), MuxConfig::default());

        {
            let mut sensor = mux.select(0).unwrap();
            assert_eq!(sensor.channel(), 0);
            assert_eq!(sensor.offset(), 0.0);
            sensor.set_offset(100.0);
        }
        assert!((mux.read(0).unwrap() - 350.0).abs() < 0.1);
        assert_eq!(mux.offset(0).unwrap(), 100.0);
    }

    #[test]
    fn unscaled_register_map_reads_from_0x0e() {
        let bus = SimEncoderBus::new(RegisterMap::ANGLE_UNSCALED);
        bus.attach(3, SimShaft::new(42.0, 1.0)).unwrap();
        let mux = AngleMux::new(
            Box::new(bus.clone()),
            MuxConfig {
                register_map: RegisterMap::ANGLE_UNSCALED,
                ..MuxConfig::default()
            },
        );
        let raw = mux.select(3).unwrap().read_raw().unwrap();
        assert_eq!(raw, 42);
        assert!(bus.transactions().iter().any(|t| matches!(
            t,
            crate::bus::BusTransaction::ReadByteData { register: 0x0E, .. }
        )));
    }
}
