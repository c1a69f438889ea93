//! [`MotionAxis`] – closed-loop stepper control against a multiplexed
//! angle encoder.
//!
//! The loop picks a direction from the sign of the error, emits one step,
//! re-reads the encoder and repeats until the error is inside the
//! tolerance. The direction is re-evaluated before every step, so an axis
//! that overshoots turns back instead of running on around the circle. The
//! error is the plain difference of two readings in `[0, 360)`, so the
//! axis never takes the short way across 0°.
//!
//! With a uniform step the axis ends up bracketing the target between two
//! positions one step apart, so it settles whenever `tolerance` is at least
//! half a step. A finer tolerance makes it oscillate until a
//! [`MotionLimits`] bound stops it.
//!
//! An axis built without [`StepperPins`] is *headless*: encoder reads work,
//! but [`MotionAxis::step`] and [`MotionAxis::move_to`] do nothing.

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, instrument, warn};
use turret_types::{Direction, TurretError};

use crate::gpio::OutputPin;
use crate::mux::{AngleMux, check_channel};
use crate::sensor::normalize_degrees;

/// Default convergence tolerance: one full step of a 200-step motor.
pub const DEFAULT_TOLERANCE: f32 = 1.8;

/// Step and direction lines of a stepper driver.
pub struct StepperPins {
    pub step: Box<dyn OutputPin>,
    pub direction: Box<dyn OutputPin>,
}

/// Pulse timing of one step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepTiming {
    /// Held after asserting and again after deasserting the step line.
    pub delay: Duration,
    /// Shaft rotation produced by one pulse.
    pub step_degrees: f32,
}

impl Default for StepTiming {
    fn default() -> Self {
        Self {
            delay: Duration::from_millis(10),
            step_degrees: 1.8,
        }
    }
}

/// Optional bounds on a single [`MotionAxis::move_to`] call. Both `None`
/// (the default) means the loop runs until it converges.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MotionLimits {
    pub max_steps: Option<u32>,
    pub timeout: Option<Duration>,
}

/// Outcome of a [`MotionAxis::move_to`] call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MoveReport {
    pub steps: u32,
    /// Last encoder reading; `None` for a headless axis.
    pub final_angle: Option<f32>,
    /// The first step left the encoder reading unchanged.
    pub stalled: bool,
}

impl MoveReport {
    fn idle(final_angle: Option<f32>) -> Self {
        Self {
            steps: 0,
            final_angle,
            stalled: false,
        }
    }
}

pub struct MotionAxis {
    id: String,
    mux: Arc<AngleMux>,
    channel: u8,
    pins: Option<StepperPins>,
    direction: Direction,
    timing: StepTiming,
    limits: MotionLimits,
}

impl MotionAxis {
    /// Create an axis reading `channel` of `mux`. With pins present the
    /// direction line is driven to its clockwise level immediately.
    ///
    /// # Errors
    ///
    /// - [`TurretError::InvalidChannel`] for `channel >= 8`.
    /// - [`TurretError::HardwareFault`] if the direction line cannot be set.
    pub fn new(
        id: impl Into<String>,
        mux: Arc<AngleMux>,
        channel: u8,
        mut pins: Option<StepperPins>,
    ) -> Result<Self, TurretError> {
        check_channel(channel)?;
        let direction = Direction::Clockwise;
        if let Some(pins) = pins.as_mut() {
            pins.direction.set_level(direction.pin_level())?;
        }
        Ok(Self {
            id: id.into(),
            mux,
            channel,
            pins,
            direction,
            timing: StepTiming::default(),
            limits: MotionLimits::default(),
        })
    }

    pub fn with_timing(mut self, timing: StepTiming) -> Self {
        self.timing = timing;
        self
    }

    pub fn with_limits(mut self, limits: MotionLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn channel(&self) -> u8 {
        self.channel
    }

    pub fn mux(&self) -> &Arc<AngleMux> {
        &self.mux
    }

    pub fn is_headless(&self) -> bool {
        self.pins.is_none()
    }

    pub fn timing(&self) -> StepTiming {
        self.timing
    }

    /// Whether a uniform-step shaft can settle within `tolerance`.
    pub fn settles_within(&self, tolerance: f32) -> bool {
        tolerance * 2.0 >= self.timing.step_degrees
    }

    /// Current encoder angle; a fresh mux-scoped read on every call.
    ///
    /// # Errors
    ///
    /// Returns [`TurretError::Bus`] on a failed read.
    pub fn angle(&self) -> Result<f32, TurretError> {
        self.mux.read(self.channel)
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Change direction; the direction line is written only when the
    /// direction actually changes.
    ///
    /// # Errors
    ///
    /// Returns [`TurretError::HardwareFault`] if the line cannot be set.
    pub fn set_direction(&mut self, direction: Direction) -> Result<(), TurretError> {
        if direction == self.direction {
            return Ok(());
        }
        if let Some(pins) = self.pins.as_mut() {
            pins.direction.set_level(direction.pin_level())?;
        }
        self.direction = direction;
        Ok(())
    }

    /// Emit one step pulse: assert, hold, deassert, hold.
    ///
    /// # Errors
    ///
    /// Returns [`TurretError::HardwareFault`] if the step line cannot be
    /// driven.
    pub fn step(&mut self) -> Result<(), TurretError> {
        let delay = self.timing.delay;
        let Some(pins) = self.pins.as_mut() else {
            return Ok(());
        };
        pins.step.set_high()?;
        thread::sleep(delay);
        pins.step.set_low()?;
        thread::sleep(delay);
        Ok(())
    }

    /// Step toward `target` (normalized into `[0, 360)`) until the encoder
    /// reads within `tolerance` of it.
    ///
    /// A first step that leaves the reading unchanged is logged as a
    /// [`TurretError::StepperFault`] and reported in
    /// [`MoveReport::stalled`]; motion continues regardless.
    ///
    /// # Errors
    ///
    /// - [`TurretError::Bus`] on a failed encoder read.
    /// - [`TurretError::MotionTimeout`] when a configured [`MotionLimits`]
    ///   bound is exceeded.
    #[instrument(skip(self), fields(axis = %self.id, channel = self.channel))]
    pub fn move_to(&mut self, target: f32, tolerance: f32) -> Result<MoveReport, TurretError> {
        if self.pins.is_none() {
            debug!("headless axis, move ignored");
            return Ok(MoveReport::idle(None));
        }
        let target = normalize_degrees(target);
        if !self.settles_within(tolerance) {
            warn!(
                tolerance,
                step_degrees = self.timing.step_degrees,
                "tolerance is finer than half a step; the axis may not settle"
            );
        }
        let started = Instant::now();

        let start = self.angle()?;
        if start == target {
            return Ok(MoveReport::idle(Some(start)));
        }

        self.set_direction(direction_toward(start, target))?;
        self.step()?;
        let mut steps = 1;
        let mut current = self.angle()?;

        let stalled = current == start;
        if stalled {
            let fault = TurretError::StepperFault {
                channel: self.channel,
                angle: current,
            };
            warn!(error = %fault, "encoder reading unchanged after first step");
        }

        while (current - target).abs() > tolerance {
            self.check_limits(target, current, steps, started)?;
            self.set_direction(direction_toward(current, target))?;
            self.step()?;
            steps += 1;
            current = self.angle()?;
        }

        debug!(steps, angle = current, "axis converged");
        Ok(MoveReport {
            steps,
            final_angle: Some(current),
            stalled,
        })
    }

    fn check_limits(
        &self,
        target: f32,
        last_angle: f32,
        steps: u32,
        started: Instant,
    ) -> Result<(), TurretError> {
        let elapsed = started.elapsed();
        let over_steps = self.limits.max_steps.is_some_and(|max| steps >= max);
        let over_time = self.limits.timeout.is_some_and(|timeout| elapsed >= timeout);
        if over_steps || over_time {
            return Err(TurretError::MotionTimeout {
                target,
                last_angle,
                steps,
                elapsed,
            });
        }
        Ok(())
    }
}

fn direction_toward(current: f32, target: f32) -> Direction {
    if current < target {
        Direction::Clockwise
    } else {
        Direction::CounterClockwise
    }
}
