//! Simulated drivers for headless tests and development off the Pi.
//!
//! Each driver is a cheap clonable handle over shared state: hand one clone
//! to the code under test (boxed as a trait object) and keep another to
//! inspect what happened.
//!
//! | Driver | Behaviour |
//! |---|---|
//! | [`SimShaft`] | A stepper shaft: each step pulse moves it `step_degrees` in the current direction unless stalled. |
//! | [`SimEncoderBus`] | Emulates the multiplexer and one encoder per attached shaft; logs every [`BusTransaction`]. |
//! | [`SimPin`] | Output line; step pins pulse a shaft on the rising edge, direction pins set its direction. |
//! | [`SimServo`] | Validates against its [`ServoCalibration`] and records commanded angles. |
//! | [`SimRelay`] | Tracks its state and records state changes. |
//!
//! Recordings keep the most recent [`RECORD_LIMIT`] entries, so a
//! long-running `backend = "sim"` daemon stays at a fixed footprint.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use turret_types::{MUX_CHANNELS, TurretError};

use crate::bus::{BusTransaction, I2cBus};
use crate::gpio::OutputPin;
use crate::mux::check_channel;
use crate::register_map::{ENCODER_ADDRESS, MUX_ADDRESS, RegisterMap};
use crate::relay::Relay;
use crate::sensor::normalize_degrees;
use crate::servo::{Servo, ServoCalibration};

/// Entries each recording keeps before dropping the oldest.
pub const RECORD_LIMIT: usize = 1024;

fn lock<T>(state: &Mutex<T>) -> MutexGuard<'_, T> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Ring of the last [`RECORD_LIMIT`] events.
struct Recording<T>(VecDeque<T>);

impl<T: Clone> Recording<T> {
    fn new() -> Self {
        Self(VecDeque::new())
    }

    fn push(&mut self, event: T) {
        if self.0.len() == RECORD_LIMIT {
            self.0.pop_front();
        }
        self.0.push_back(event);
    }

    fn to_vec(&self) -> Vec<T> {
        self.0.iter().cloned().collect()
    }

    fn clear(&mut self) {
        self.0.clear();
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Shaft
// ─────────────────────────────────────────────────────────────────────────────

struct ShaftState {
    angle: f32,
    clockwise: bool,
    step_degrees: f32,
    stalled: bool,
    pulses: u64,
}

/// A simulated stepper shaft with an encoder magnet on it.
///
/// Clockwise steps increase the encoder reading.
#[derive(Clone)]
pub struct SimShaft {
    state: Arc<Mutex<ShaftState>>,
}

impl SimShaft {
    pub fn new(angle: f32, step_degrees: f32) -> Self {
        Self {
            state: Arc::new(Mutex::new(ShaftState {
                angle: normalize_degrees(angle),
                clockwise: true,
                step_degrees,
                stalled: false,
                pulses: 0,
            })),
        }
    }

    pub fn angle(&self) -> f32 {
        lock(&self.state).angle
    }

    pub fn set_angle(&self, angle: f32) {
        lock(&self.state).angle = normalize_degrees(angle);
    }

    pub fn is_clockwise(&self) -> bool {
        lock(&self.state).clockwise
    }

    /// A stalled shaft counts pulses but does not move.
    pub fn set_stalled(&self, stalled: bool) {
        lock(&self.state).stalled = stalled;
    }

    /// Step pulses received so far, including those lost to a stall.
    pub fn pulses(&self) -> u64 {
        lock(&self.state).pulses
    }

    pub fn pulse(&self) {
        let mut state = lock(&self.state);
        state.pulses += 1;
        if !state.stalled {
            let delta = if state.clockwise {
                state.step_degrees
            } else {
                -state.step_degrees
            };
            state.angle = normalize_degrees(state.angle + delta);
        }
    }

    pub fn set_direction_level(&self, high: bool) {
        lock(&self.state).clockwise = high;
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Encoder bus
// ─────────────────────────────────────────────────────────────────────────────

struct BusState {
    register_map: RegisterMap,
    control: Option<u8>,
    last_mux_write: Option<u8>,
    shafts: [Option<SimShaft>; MUX_CHANNELS as usize],
    log: Recording<BusTransaction>,
    failing_writes: usize,
    failing_reads: usize,
}

/// Simulated multiplexer at `0x70` and encoders at `0x36`.
///
/// Reads go to the shaft attached to the channel most recently written to
/// the multiplexer. A channel without a shaft NACKs.
#[derive(Clone)]
pub struct SimEncoderBus {
    state: Arc<Mutex<BusState>>,
}

impl SimEncoderBus {
    pub fn new(register_map: RegisterMap) -> Self {
        Self {
            state: Arc::new(Mutex::new(BusState {
                register_map,
                control: None,
                last_mux_write: None,
                shafts: Default::default(),
                log: Recording::new(),
                failing_writes: 0,
                failing_reads: 0,
            })),
        }
    }

    /// Put an encoder reading `shaft` behind `channel`.
    ///
    /// # Errors
    ///
    /// Returns [`TurretError::InvalidChannel`] for `channel >= 8`.
    pub fn attach(&self, channel: u8, shaft: SimShaft) -> Result<(), TurretError> {
        check_channel(channel)?;
        lock(&self.state).shafts[usize::from(channel)] = Some(shaft);
        Ok(())
    }

    /// The most recent transactions, oldest first.
    pub fn transactions(&self) -> Vec<BusTransaction> {
        lock(&self.state).log.to_vec()
    }

    pub fn clear_transactions(&self) {
        lock(&self.state).log.clear();
    }

    /// Last control byte the multiplexer accepted.
    pub fn last_mux_write(&self) -> Option<u8> {
        lock(&self.state).last_mux_write
    }

    /// Fail the next `count` writes.
    pub fn fail_next_writes(&self, count: usize) {
        lock(&self.state).failing_writes = count;
    }

    /// Fail the next `count` register reads.
    pub fn fail_next_reads(&self, count: usize) {
        lock(&self.state).failing_reads = count;
    }
}

fn nack(addr: u8, details: impl Into<String>) -> TurretError {
    TurretError::Bus {
        addr,
        details: details.into(),
    }
}

impl I2cBus for SimEncoderBus {
    fn write_byte(&mut self, addr: u8, value: u8) -> Result<(), TurretError> {
        let mut state = lock(&self.state);
        state.log.push(BusTransaction::WriteByte { addr, value });
        if state.failing_writes > 0 {
            state.failing_writes -= 1;
            return Err(nack(addr, "injected write failure"));
        }
        if addr != MUX_ADDRESS {
            return Err(nack(addr, "no device"));
        }
        state.control = Some(value);
        state.last_mux_write = Some(value);
        Ok(())
    }

    fn read_byte_data(&mut self, addr: u8, register: u8) -> Result<u8, TurretError> {
        let mut state = lock(&self.state);
        state.log.push(BusTransaction::ReadByteData { addr, register });
        if state.failing_reads > 0 {
            state.failing_reads -= 1;
            return Err(nack(addr, "injected read failure"));
        }
        if addr != ENCODER_ADDRESS {
            return Err(nack(addr, "no device"));
        }
        let shaft = state
            .control
            .and_then(|channel| state.shafts.get(usize::from(channel)).cloned().flatten())
            .ok_or_else(|| nack(addr, "no encoder on the selected channel"))?;

        let map = state.register_map;
        let [high, low] = map.to_counts(shaft.angle()).to_be_bytes();
        if register == map.high_register {
            Ok(high)
        } else if register == map.low_register {
            Ok(low)
        } else {
            Ok(0)
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Output pin
// ─────────────────────────────────────────────────────────────────────────────

/// What a [`SimPin`] is wired to.
#[derive(Clone, Default)]
pub enum PinRole {
    #[default]
    Plain,
    /// Rising edges pulse the shaft.
    Step(SimShaft),
    /// The level sets the shaft direction (high = clockwise).
    Direction(SimShaft),
}

struct PinState {
    level: bool,
    writes: usize,
    rising_edges: usize,
}

#[derive(Clone)]
pub struct SimPin {
    id: String,
    role: PinRole,
    state: Arc<Mutex<PinState>>,
}

impl SimPin {
    pub fn new(id: impl Into<String>, role: PinRole) -> Self {
        Self {
            id: id.into(),
            role,
            state: Arc::new(Mutex::new(PinState {
                level: false,
                writes: 0,
                rising_edges: 0,
            })),
        }
    }

    pub fn level(&self) -> bool {
        lock(&self.state).level
    }

    /// Number of `set_level` calls, including ones that kept the level.
    pub fn writes(&self) -> usize {
        lock(&self.state).writes
    }

    pub fn rising_edges(&self) -> usize {
        lock(&self.state).rising_edges
    }
}

impl OutputPin for SimPin {
    fn id(&self) -> &str {
        &self.id
    }

    fn set_level(&mut self, high: bool) -> Result<(), TurretError> {
        let rising = {
            let mut state = lock(&self.state);
            let rising = high && !state.level;
            state.level = high;
            state.writes += 1;
            if rising {
                state.rising_edges += 1;
            }
            rising
        };
        match &self.role {
            PinRole::Plain => {}
            PinRole::Step(shaft) => {
                if rising {
                    shaft.pulse();
                }
            }
            PinRole::Direction(shaft) => shaft.set_direction_level(high),
        }
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Servo
// ─────────────────────────────────────────────────────────────────────────────

struct ServoState {
    angle: f32,
    history: Recording<f32>,
}

#[derive(Clone)]
pub struct SimServo {
    id: String,
    calibration: ServoCalibration,
    state: Arc<Mutex<ServoState>>,
}

impl SimServo {
    pub fn new(id: impl Into<String>, calibration: ServoCalibration) -> Self {
        Self {
            id: id.into(),
            calibration,
            state: Arc::new(Mutex::new(ServoState {
                angle: 0.0,
                history: Recording::new(),
            })),
        }
    }

    /// The most recent accepted commands, oldest first.
    pub fn history(&self) -> Vec<f32> {
        lock(&self.state).history.to_vec()
    }
}

impl Servo for SimServo {
    fn id(&self) -> &str {
        &self.id
    }

    fn set_angle(&mut self, degrees: f32) -> Result<(), TurretError> {
        self.calibration.check(&self.id, degrees)?;
        let mut state = lock(&self.state);
        state.angle = degrees;
        state.history.push(degrees);
        Ok(())
    }

    fn angle(&self) -> f32 {
        lock(&self.state).angle
    }

    fn calibration(&self) -> ServoCalibration {
        self.calibration
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Relay
// ─────────────────────────────────────────────────────────────────────────────

struct RelayState {
    active: bool,
    engaged: usize,
    released: usize,
    transitions: Recording<bool>,
}

#[derive(Clone)]
pub struct SimRelay {
    id: String,
    state: Arc<Mutex<RelayState>>,
}

impl SimRelay {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            state: Arc::new(Mutex::new(RelayState {
                active: false,
                engaged: 0,
                released: 0,
                transitions: Recording::new(),
            })),
        }
    }

    /// The most recent commanded states, oldest first.
    pub fn transitions(&self) -> Vec<bool> {
        lock(&self.state).transitions.to_vec()
    }

    pub fn times_engaged(&self) -> usize {
        lock(&self.state).engaged
    }

    pub fn times_released(&self) -> usize {
        lock(&self.state).released
    }
}

impl Relay for SimRelay {
    fn id(&self) -> &str {
        &self.id
    }

    fn set_state(&mut self, active: bool) -> Result<(), TurretError> {
        let mut state = lock(&self.state);
        state.active = active;
        if active {
            state.engaged += 1;
        } else {
            state.released += 1;
        }
        state.transitions.push(active);
        Ok(())
    }

    fn state(&self) -> bool {
        lock(&self.state).active
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shaft_steps_follow_direction_and_wrap() {
        let shaft = SimShaft::new(359.0, 1.8);
        shaft.pulse();
        assert!((shaft.angle() - 0.8).abs() < 1e-3);

        shaft.set_direction_level(false);
        shaft.pulse();
        shaft.pulse();
        assert!((shaft.angle() - 357.2).abs() < 1e-3);
        assert_eq!(shaft.pulses(), 3);
    }

    #[test]
    fn stalled_shaft_counts_pulses_without_moving() {
        let shaft = SimShaft::new(10.0, 1.8);
        shaft.set_stalled(true);
        shaft.pulse();
        assert_eq!(shaft.angle(), 10.0);
        assert_eq!(shaft.pulses(), 1);
    }

    #[test]
    fn step_pin_pulses_on_rising_edge_only() {
        let shaft = SimShaft::new(0.0, 1.8);
        let mut pin = SimPin::new("base_step", PinRole::Step(shaft.clone()));
        pin.set_high().unwrap();
        pin.set_high().unwrap();
        pin.set_low().unwrap();
        assert_eq!(shaft.pulses(), 1);
        assert_eq!(pin.rising_edges(), 1);
        assert_eq!(pin.writes(), 3);
    }

    #[test]
    fn direction_pin_sets_shaft_direction() {
        let shaft = SimShaft::new(0.0, 1.8);
        let mut pin = SimPin::new("base_dir", PinRole::Direction(shaft.clone()));
        pin.set_low().unwrap();
        assert!(!shaft.is_clockwise());
        pin.set_high().unwrap();
        assert!(shaft.is_clockwise());
    }

    #[test]
    fn bus_reads_selected_shaft() {
        let mut bus = SimEncoderBus::new(RegisterMap::RAW_ANGLE);
        bus.attach(4, SimShaft::new(180.0, 1.8)).unwrap();
        bus.write_byte(MUX_ADDRESS, 4).unwrap();
        assert_eq!(bus.read_byte_data(ENCODER_ADDRESS, 0x0C).unwrap(), 0x08);
        assert_eq!(bus.read_byte_data(ENCODER_ADDRESS, 0x0D).unwrap(), 0x00);
    }

    #[test]
    fn bus_without_selection_nacks() {
        let mut bus = SimEncoderBus::new(RegisterMap::RAW_ANGLE);
        bus.attach(0, SimShaft::new(0.0, 1.8)).unwrap();
        assert!(bus.read_byte_data(ENCODER_ADDRESS, 0x0C).is_err());
        assert!(bus.write_byte(0x21, 0).is_err());
    }

    #[test]
    fn injected_read_failure_is_one_shot() {
        let mut bus = SimEncoderBus::new(RegisterMap::RAW_ANGLE);
        bus.attach(0, SimShaft::new(0.0, 1.8)).unwrap();
        bus.write_byte(MUX_ADDRESS, 0).unwrap();
        bus.fail_next_reads(1);
        assert!(bus.read_byte_data(ENCODER_ADDRESS, 0x0C).is_err());
        assert!(bus.read_byte_data(ENCODER_ADDRESS, 0x0C).is_ok());
    }

    #[test]
    fn servo_rejects_out_of_range_command() {
        let mut servo = SimServo::new("elevation", ServoCalibration::default());
        servo.set_angle(30.0).unwrap();
        assert!(servo.set_angle(120.0).is_err());
        assert_eq!(servo.angle(), 30.0);
        assert_eq!(servo.history(), vec![30.0]);

        assert!(servo.check(-90.0).is_ok());
        assert!(matches!(
            servo.check(95.0),
            Err(TurretError::ServoRange { .. })
        ));
        assert_eq!(servo.history(), vec![30.0]);
    }

    #[test]
    fn relay_records_transitions() {
        let mut relay = SimRelay::new("motor_relay");
        assert!(!relay.state());
        relay.engage().unwrap();
        relay.release().unwrap();
        relay.release().unwrap();
        assert_eq!(relay.transitions(), vec![true, false]);
        assert_eq!(relay.times_engaged(), 1);
        assert_eq!(relay.times_released(), 1);
    }

    #[test]
    fn attach_rejects_missing_channel() {
        let bus = SimEncoderBus::new(RegisterMap::RAW_ANGLE);
        assert!(matches!(
            bus.attach(8, SimShaft::new(0.0, 1.8)),
            Err(TurretError::InvalidChannel(8))
        ));
    }

    #[test]
    fn recordings_keep_only_the_latest_entries() {
        let mut bus = SimEncoderBus::new(RegisterMap::RAW_ANGLE);
        bus.attach(0, SimShaft::new(0.0, 1.8)).unwrap();
        for _ in 0..RECORD_LIMIT {
            bus.write_byte(MUX_ADDRESS, 0).unwrap();
        }
        bus.read_byte_data(ENCODER_ADDRESS, 0x0D).unwrap();
        let log = bus.transactions();
        assert_eq!(log.len(), RECORD_LIMIT);
        assert_eq!(
            log.last(),
            Some(&BusTransaction::ReadByteData {
                addr: ENCODER_ADDRESS,
                register: 0x0D
            })
        );

        let mut servo = SimServo::new("trigger", ServoCalibration::default());
        for i in 0..RECORD_LIMIT + 10 {
            servo.set_angle((i % 90) as f32).unwrap();
        }
        assert_eq!(servo.history().len(), RECORD_LIMIT);
    }

    #[test]
    fn relay_state_survives_a_full_recording() {
        let mut relay = SimRelay::new("motor_relay");
        for _ in 0..RECORD_LIMIT {
            relay.engage().unwrap();
            relay.release().unwrap();
        }
        relay.engage().unwrap();
        assert!(relay.state());
        assert_eq!(relay.transitions().len(), RECORD_LIMIT);
        assert_eq!(relay.times_engaged(), RECORD_LIMIT + 1);
        assert_eq!(relay.times_released(), RECORD_LIMIT);
    }
}
