//! Turret assembly from the `[hardware]`, `[pins]`, `[motion]`, `[servo]`
//! and `[firing]` sections.

use std::sync::Arc;

use tracing::info;
use turret_core::{TurretHardware, TurretState};
use turret_hal::mux::check_channel;
use turret_hal::{AngleMux, MuxConfig, SimRig};
use turret_types::TurretError;

use crate::config::{Backend, Config};

/// Build the turret the configuration describes.
///
/// # Errors
///
/// - [`TurretError::Config`] for `backend = "rpi"` in a build without the
///   `rpi` feature.
/// - Any error raised while opening the hardware or validating the base
///   channel.
pub fn build_state(cfg: &Config) -> Result<TurretState, TurretError> {
    let mut hw = match cfg.hardware.backend {
        Backend::Sim => simulated(cfg, false)?,
        Backend::Headless => simulated(cfg, true)?,
        Backend::Rpi => raspberry_pi(cfg)?,
    };
    hw.base = hw
        .base
        .with_timing(cfg.motion.timing())
        .with_limits(cfg.motion.limits());

    info!(
        backend = ?cfg.hardware.backend,
        channel = cfg.hardware.base_channel,
        register_map = ?cfg.hardware.register_map,
        "turret assembled"
    );
    Ok(TurretState::new(hw)
        .with_firing(cfg.firing.params())
        .with_tolerance(cfg.motion.tolerance))
}

fn simulated(cfg: &Config, headless: bool) -> Result<TurretHardware, TurretError> {
    let hw_cfg = &cfg.hardware;
    check_channel(hw_cfg.base_channel)?;
    let rig = SimRig::builder()
        .base_channel(hw_cfg.base_channel)
        .register_map(hw_cfg.register_map.into())
        .step_degrees(cfg.motion.step_degrees)
        .servo_calibration(cfg.servo)
        .build();
    // The simulated bus answers on the standard addresses only.
    let mux_config = MuxConfig {
        idle_value: hw_cfg.mux_idle,
        register_map: hw_cfg.register_map.into(),
        ..MuxConfig::default()
    };
    let mux = AngleMux::new(Box::new(rig.bus.clone()), mux_config).with_offsets(&hw_cfg.offsets);
    TurretHardware::simulated(&rig, Arc::new(mux), headless)
}

#[cfg(all(feature = "rpi", target_os = "linux"))]
fn raspberry_pi(cfg: &Config) -> Result<TurretHardware, TurretError> {
    use turret_hal::rpi::{RpiGpio, RpiI2cBus};
    use turret_hal::{MotionAxis, StepperPins};

    let hw_cfg = &cfg.hardware;
    let pins = &cfg.pins;
    let bus = RpiI2cBus::open(hw_cfg.i2c_bus)?;
    let mux = AngleMux::new(Box::new(bus), hw_cfg.mux_config()).with_offsets(&hw_cfg.offsets);

    let gpio = RpiGpio::open()?;
    let stepper_pins = StepperPins {
        step: Box::new(gpio.pin("base_step", pins.base_step)?),
        direction: Box::new(gpio.pin("base_dir", pins.base_dir)?),
    };
    Ok(TurretHardware {
        base: MotionAxis::new("base", Arc::new(mux), hw_cfg.base_channel, Some(stepper_pins))?,
        elevation: Box::new(gpio.servo("elevation", pins.elevation_servo, cfg.servo, 0.0)?),
        trigger: Box::new(gpio.servo(
            "trigger",
            pins.trigger_servo,
            cfg.servo,
            cfg.firing.rest_angle,
        )?),
        relay: Box::new(gpio.relay("motor_relay", pins.motor_relay)?),
    })
}

#[cfg(not(all(feature = "rpi", target_os = "linux")))]
fn raspberry_pi(_cfg: &Config) -> Result<TurretHardware, TurretError> {
    Err(TurretError::Config(
        "backend \"rpi\" needs a Linux build with the `rpi` feature".to_string(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use turret_hal::RegisterMapKind;

    fn fast_config() -> Config {
        let mut cfg = Config::default();
        cfg.motion.step_delay_ms = 0;
        cfg.firing.relay_settle_ms = 0;
        cfg.firing.hold_ms = 0;
        cfg
    }

    #[test]
    fn default_config_builds_a_working_sim() {
        let mut state = build_state(&fast_config()).unwrap();
        state.move_to(30.0, 15.0).unwrap();
        state.shoot(1).unwrap();
        let status = state.status().unwrap();
        assert!((status.base_angle - 30.0).abs() <= 1.8);
        assert_eq!(status.elev_angle, 15.0);
        assert_eq!(status.shots, 1);
    }

    #[test]
    fn configured_offsets_apply_to_the_base_channel() {
        let mut cfg = fast_config();
        cfg.hardware.base_channel = 2;
        cfg.hardware.register_map = RegisterMapKind::AngleUnscaled;
        cfg.hardware.offsets = vec![0.0, 0.0, 10.0];
        let state = build_state(&cfg).unwrap();
        assert_eq!(state.offset(2).unwrap(), 10.0);
        // Shaft at 0°, offset 10° → 350°.
        assert!((state.status().unwrap().base_angle - 350.0).abs() < 1e-3);
    }

    #[test]
    fn headless_backend_does_not_move_the_base() {
        let mut cfg = fast_config();
        cfg.hardware.backend = Backend::Headless;
        let mut state = build_state(&cfg).unwrap();
        state.move_to(90.0, 0.0).unwrap();
        assert_eq!(state.status().unwrap().base_angle, 0.0);
    }

    #[test]
    fn out_of_range_base_channel_is_rejected() {
        for backend in [Backend::Sim, Backend::Headless] {
            let mut cfg = fast_config();
            cfg.hardware.backend = backend;
            cfg.hardware.base_channel = 9;
            assert!(matches!(
                build_state(&cfg),
                Err(TurretError::InvalidChannel(9))
            ));
        }
    }

    #[cfg(not(all(feature = "rpi", target_os = "linux")))]
    #[test]
    fn rpi_backend_requires_the_feature() {
        let mut cfg = fast_config();
        cfg.hardware.backend = Backend::Rpi;
        assert!(matches!(build_state(&cfg), Err(TurretError::Config(_))));
    }
}
