//! Daemon configuration – reads `~/.turretd/config.toml`.
//!
//! Every field has a default, so a missing file (or a missing section)
//! yields a daemon serving a simulated turret on port 12345.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use turret_core::FiringParams;
use turret_hal::register_map::{ENCODER_ADDRESS, MUX_ADDRESS, MUX_IDLE};
use turret_hal::stepper::DEFAULT_TOLERANCE;
use turret_hal::{MotionLimits, MuxConfig, RegisterMapKind, ServoCalibration, StepTiming};
use turret_protocol::Framing;
use turret_types::TurretError;

// ─────────────────────────────────────────────────────────────────────────────
// Choices
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Transport {
    /// TCP, framed tagged JSON.
    #[default]
    Stream,
    /// UDP, one JSON command per datagram.
    Datagram,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// I2C and GPIO on a Raspberry Pi (needs the `rpi` feature).
    Rpi,
    /// Simulated rig.
    #[default]
    Sim,
    /// Simulated encoders and servos, no step pulses.
    Headless,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Compact,
    Json,
}

// ─────────────────────────────────────────────────────────────────────────────
// Sections
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default)]
    pub transport: Transport,
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Stream transport only.
    #[serde(default)]
    pub framing: Framing,
}

fn default_bind() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    turret_daemon::DEFAULT_PORT
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            transport: Transport::default(),
            bind: default_bind(),
            port: default_port(),
            framing: Framing::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HardwareConfig {
    #[serde(default)]
    pub backend: Backend,
    #[serde(default = "default_i2c_bus")]
    pub i2c_bus: u8,
    #[serde(default = "default_mux_address")]
    pub mux_address: u8,
    #[serde(default = "default_encoder_address")]
    pub encoder_address: u8,
    #[serde(default = "default_mux_idle")]
    pub mux_idle: u8,
    #[serde(default)]
    pub register_map: RegisterMapKind,
    #[serde(default)]
    pub base_channel: u8,
    /// Initial per-channel zero offsets in degrees, channel 0 first.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub offsets: Vec<f32>,
}

fn default_i2c_bus() -> u8 {
    1
}
fn default_mux_address() -> u8 {
    MUX_ADDRESS
}
fn default_encoder_address() -> u8 {
    ENCODER_ADDRESS
}
fn default_mux_idle() -> u8 {
    MUX_IDLE
}

impl Default for HardwareConfig {
    fn default() -> Self {
        Self {
            backend: Backend::default(),
            i2c_bus: default_i2c_bus(),
            mux_address: default_mux_address(),
            encoder_address: default_encoder_address(),
            mux_idle: default_mux_idle(),
            register_map: RegisterMapKind::default(),
            base_channel: 0,
            offsets: Vec::new(),
        }
    }
}

impl HardwareConfig {
    pub fn mux_config(&self) -> MuxConfig {
        MuxConfig {
            mux_address: self.mux_address,
            encoder_address: self.encoder_address,
            idle_value: self.mux_idle,
            register_map: self.register_map.into(),
        }
    }
}

/// BCM pin numbers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PinsConfig {
    #[serde(default = "default_base_step")]
    pub base_step: u8,
    #[serde(default = "default_base_dir")]
    pub base_dir: u8,
    #[serde(default = "default_elevation_servo")]
    pub elevation_servo: u8,
    #[serde(default = "default_trigger_servo")]
    pub trigger_servo: u8,
    #[serde(default = "default_motor_relay")]
    pub motor_relay: u8,
}

fn default_base_step() -> u8 {
    23
}
fn default_base_dir() -> u8 {
    24
}
fn default_elevation_servo() -> u8 {
    21
}
fn default_trigger_servo() -> u8 {
    4
}
fn default_motor_relay() -> u8 {
    17
}

impl Default for PinsConfig {
    fn default() -> Self {
        Self {
            base_step: default_base_step(),
            base_dir: default_base_dir(),
            elevation_servo: default_elevation_servo(),
            trigger_servo: default_trigger_servo(),
            motor_relay: default_motor_relay(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MotionConfig {
    #[serde(default = "default_step_delay_ms")]
    pub step_delay_ms: u64,
    #[serde(default = "default_step_degrees")]
    pub step_degrees: f32,
    #[serde(default = "default_tolerance")]
    pub tolerance: f32,
    /// Unbounded when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_steps: Option<u32>,
    /// Unbounded when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
}

fn default_step_delay_ms() -> u64 {
    10
}
fn default_step_degrees() -> f32 {
    1.8
}
fn default_tolerance() -> f32 {
    DEFAULT_TOLERANCE
}

impl Default for MotionConfig {
    fn default() -> Self {
        Self {
            step_delay_ms: default_step_delay_ms(),
            step_degrees: default_step_degrees(),
            tolerance: default_tolerance(),
            max_steps: None,
            timeout_ms: None,
        }
    }
}

impl MotionConfig {
    pub fn timing(&self) -> StepTiming {
        StepTiming {
            delay: Duration::from_millis(self.step_delay_ms),
            step_degrees: self.step_degrees,
        }
    }

    pub fn limits(&self) -> MotionLimits {
        MotionLimits {
            max_steps: self.max_steps,
            timeout: self.timeout_ms.map(Duration::from_millis),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FiringConfig {
    #[serde(default = "default_relay_settle_ms")]
    pub relay_settle_ms: u64,
    #[serde(default = "default_hold_ms")]
    pub hold_ms: u64,
    #[serde(default = "default_extended_angle")]
    pub extended_angle: f32,
    #[serde(default)]
    pub rest_angle: f32,
}

fn default_relay_settle_ms() -> u64 {
    500
}
fn default_hold_ms() -> u64 {
    1000
}
fn default_extended_angle() -> f32 {
    -33.0
}

impl Default for FiringConfig {
    fn default() -> Self {
        Self {
            relay_settle_ms: default_relay_settle_ms(),
            hold_ms: default_hold_ms(),
            extended_angle: default_extended_angle(),
            rest_angle: 0.0,
        }
    }
}

impl FiringConfig {
    pub fn params(&self) -> FiringParams {
        FiringParams {
            relay_settle: Duration::from_millis(self.relay_settle_ms),
            hold: Duration::from_millis(self.hold_ms),
            extended_angle: self.extended_angle,
            rest_angle: self.rest_angle,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter when `RUST_LOG` is unset.
    #[serde(default = "default_level")]
    pub level: String,
    #[serde(default)]
    pub format: LogFormat,
    /// OTLP/HTTP collector; `OTEL_EXPORTER_OTLP_ENDPOINT` takes precedence.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub otlp_endpoint: Option<String>,
}

fn default_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            format: LogFormat::default(),
            otlp_endpoint: None,
        }
    }
}

/// Complete daemon configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub hardware: HardwareConfig,
    #[serde(default)]
    pub pins: PinsConfig,
    #[serde(default)]
    pub motion: MotionConfig,
    #[serde(default)]
    pub servo: ServoCalibration,
    #[serde(default)]
    pub firing: FiringConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

// ─────────────────────────────────────────────────────────────────────────────
// Loading
// ─────────────────────────────────────────────────────────────────────────────

/// `TURRETD_CONFIG`, or `~/.turretd/config.toml`.
pub fn config_path() -> PathBuf {
    if let Ok(path) = std::env::var("TURRETD_CONFIG") {
        return PathBuf::from(path);
    }
    config_path_for_home(
        &std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string()),
    )
}

pub(crate) fn config_path_for_home(home: &str) -> PathBuf {
    PathBuf::from(home).join(".turretd").join("config.toml")
}

/// Load `path` (or [`config_path`]), fall back to defaults when the file is
/// absent, then apply `TURRETD_*` overrides.
///
/// # Errors
///
/// Returns [`TurretError::Config`] if the file exists but cannot be read or
/// parsed.
pub fn load(path: Option<&Path>) -> Result<Config, TurretError> {
    let path = path.map_or_else(config_path, Path::to_path_buf);
    let mut cfg = load_from(&path)?.unwrap_or_default();
    apply_env_overrides(&mut cfg);
    Ok(cfg)
}

/// Parse the file at `path`. Returns `None` if it does not exist.
pub(crate) fn load_from(path: &Path) -> Result<Option<Config>, TurretError> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path).map_err(|e| {
        TurretError::Config(format!("failed to read {}: {e}", path.display()))
    })?;
    let cfg = toml::from_str(&raw).map_err(|e| {
        TurretError::Config(format!("failed to parse {}: {e}", path.display()))
    })?;
    Ok(Some(cfg))
}

/// Render `cfg` as TOML.
///
/// # Errors
///
/// Returns [`TurretError::Config`] if serialization fails.
pub fn to_toml(cfg: &Config) -> Result<String, TurretError> {
    toml::to_string_pretty(cfg).map_err(|e| TurretError::Config(e.to_string()))
}

/// Parse an enum from its config-file spelling, e.g. `"datagram"`.
fn parse_choice<T: DeserializeOwned>(value: String) -> Option<T> {
    toml::Value::String(value).try_into().ok()
}

/// Apply `TURRETD_*` environment overrides to `cfg`. Unparseable values
/// are ignored.
///
/// | Variable | Config field |
/// |---|---|
/// | `TURRETD_PORT` | `server.port` |
/// | `TURRETD_TRANSPORT` | `server.transport` |
/// | `TURRETD_BACKEND` | `hardware.backend` |
/// | `TURRETD_LOG_FORMAT` | `logging.format` |
pub fn apply_env_overrides(cfg: &mut Config) {
    if let Ok(v) = std::env::var("TURRETD_PORT")
        && let Ok(port) = v.parse::<u16>()
    {
        cfg.server.port = port;
    }
    if let Some(transport) = std::env::var("TURRETD_TRANSPORT").ok().and_then(parse_choice) {
        cfg.server.transport = transport;
    }
    if let Some(backend) = std::env::var("TURRETD_BACKEND").ok().and_then(parse_choice) {
        cfg.hardware.backend = backend;
    }
    if let Some(format) = std::env::var("TURRETD_LOG_FORMAT").ok().and_then(parse_choice) {
        cfg.logging.format = format;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_describe_a_simulated_stream_daemon() {
        let cfg = Config::default();
        assert_eq!(cfg.server.port, 12345);
        assert_eq!(cfg.server.transport, Transport::Stream);
        assert_eq!(cfg.server.framing, Framing::LengthPrefixed);
        assert_eq!(cfg.hardware.backend, Backend::Sim);
        assert_eq!(cfg.hardware.i2c_bus, 1);
        assert_eq!(cfg.hardware.register_map, RegisterMapKind::RawAngle);
        assert_eq!(cfg.pins.base_step, 23);
        assert_eq!(cfg.pins.motor_relay, 17);
        assert_eq!(cfg.motion.timing().delay, Duration::from_millis(10));
        assert_eq!(cfg.motion.limits(), MotionLimits::default());
        assert_eq!(cfg.firing.params(), FiringParams::default());
    }

    #[test]
    fn partial_file_keeps_remaining_defaults() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            r#"
[server]
transport = "datagram"
framing = "legacy"

[hardware]
register_map = "angle-unscaled"
offsets = [279.76]

[motion]
max_steps = 400
timeout_ms = 30000
"#,
        )
        .expect("write");

        let cfg = load_from(&path).expect("load ok").expect("some");
        assert_eq!(cfg.server.transport, Transport::Datagram);
        assert_eq!(cfg.server.framing, Framing::Legacy);
        assert_eq!(cfg.server.port, 12345);
        assert_eq!(cfg.hardware.register_map, RegisterMapKind::AngleUnscaled);
        assert_eq!(cfg.hardware.offsets.len(), 1);
        assert!((cfg.hardware.offsets[0] - 279.76).abs() < 1e-4);
        assert_eq!(
            cfg.motion.limits(),
            MotionLimits {
                max_steps: Some(400),
                timeout: Some(Duration::from_secs(30)),
            }
        );
        assert_eq!(cfg.servo, ServoCalibration::default());
    }

    #[test]
    fn rendered_config_parses_back() {
        let mut cfg = Config::default();
        cfg.logging.otlp_endpoint = Some("http://localhost:4318".to_string());
        cfg.motion.max_steps = Some(200);
        let parsed: Config = toml::from_str(&to_toml(&cfg).unwrap()).unwrap();
        assert_eq!(parsed, cfg);
    }

    #[test]
    fn malformed_file_is_a_config_error() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = dir.path().join("config.toml");
        fs::write(&path, "[server]\nport = \"twelve\"\n").expect("write");
        assert!(matches!(load_from(&path), Err(TurretError::Config(_))));
    }

    #[test]
    fn load_from_returns_none_when_missing() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = config_path_for_home(&dir.path().to_string_lossy());
        assert!(load_from(&path).expect("no error").is_none());
    }

    #[test]
    fn config_path_points_to_turretd_dir() {
        let p = config_path_for_home("/home/pi");
        assert_eq!(p, PathBuf::from("/home/pi/.turretd/config.toml"));
    }

    #[test]
    fn mux_config_follows_hardware_section() {
        let hw = HardwareConfig {
            mux_idle: 7,
            register_map: RegisterMapKind::AngleUnscaled,
            ..HardwareConfig::default()
        };
        let mux = hw.mux_config();
        assert_eq!(mux.idle_value, 7);
        assert_eq!(mux.mux_address, 0x70);
        assert_eq!(mux.register_map.high_register, 0x0E);
    }

    #[test]
    fn apply_env_overrides_changes_port() {
        // SAFETY: single-threaded test; no data races on env vars.
        unsafe { std::env::set_var("TURRETD_PORT", "2000") };
        let mut cfg = Config::default();
        apply_env_overrides(&mut cfg);
        assert_eq!(cfg.server.port, 2000);
        unsafe { std::env::remove_var("TURRETD_PORT") };
    }

    #[test]
    fn apply_env_overrides_changes_backend() {
        // SAFETY: single-threaded test; no data races on env vars.
        unsafe { std::env::set_var("TURRETD_BACKEND", "headless") };
        let mut cfg = Config::default();
        apply_env_overrides(&mut cfg);
        assert_eq!(cfg.hardware.backend, Backend::Headless);
        unsafe { std::env::remove_var("TURRETD_BACKEND") };
    }

    #[test]
    fn apply_env_overrides_changes_transport() {
        // SAFETY: single-threaded test; no data races on env vars.
        unsafe { std::env::set_var("TURRETD_TRANSPORT", "datagram") };
        let mut cfg = Config::default();
        apply_env_overrides(&mut cfg);
        assert_eq!(cfg.server.transport, Transport::Datagram);
        unsafe { std::env::remove_var("TURRETD_TRANSPORT") };
    }

    #[test]
    fn apply_env_overrides_ignores_unknown_log_format() {
        // SAFETY: single-threaded test; no data races on env vars.
        unsafe { std::env::set_var("TURRETD_LOG_FORMAT", "yaml") };
        let mut cfg = Config::default();
        apply_env_overrides(&mut cfg);
        assert_eq!(cfg.logging.format, LogFormat::Compact);
        unsafe { std::env::remove_var("TURRETD_LOG_FORMAT") };
    }
}
