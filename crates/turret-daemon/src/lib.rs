//! `turret-daemon` – network front ends for a shared [`TurretState`].
//!
//! Both servers own one listening socket, hand every request to
//! [`turret_core`]'s dispatcher on a blocking thread, and stop when the
//! shutdown future passed to `serve` resolves.
//!
//! - [`stream`] – [`StreamServer`]: TCP, one session at a time, framed
//!   tagged JSON.
//! - [`datagram`] – [`DatagramServer`]: UDP, one JSON command per datagram.
//!
//! # Usage
//!
//! ```rust,no_run
//! use std::sync::{Arc, Mutex};
//! use turret_core::{TurretHardware, TurretState};
//! use turret_daemon::StreamServer;
//! use turret_hal::SimRig;
//! use turret_protocol::Framing;
//!
//! #[tokio::main]
//! async fn main() {
//!     let rig = SimRig::builder().build();
//!     let hw = TurretHardware::simulated(&rig, rig.mux(), false).unwrap();
//!     let state = Arc::new(Mutex::new(TurretState::new(hw)));
//!     StreamServer::bind("0.0.0.0:12345", state, Framing::default())
//!         .await
//!         .expect("bind failed")
//!         .serve(std::future::pending())
//!         .await
//!         .expect("stream server failed");
//! }
//! ```
//!
//! [`TurretState`]: turret_core::TurretState

use std::sync::{Arc, Mutex, PoisonError};

use turret_core::TurretState;
use turret_types::TurretError;

pub mod datagram;
pub mod stream;

pub use datagram::DatagramServer;
pub use stream::StreamServer;

/// Default listening port of both servers.
pub const DEFAULT_PORT: u16 = 12345;

/// Turret shared between the server task and its blocking dispatch jobs.
pub type SharedState = Arc<Mutex<TurretState>>;

/// Run `job` against the locked turret on tokio's blocking pool.
///
/// Motion and firing sleep between pulses, so they never run on the async
/// workers.
pub(crate) async fn with_state<T, F>(state: &SharedState, job: F) -> Result<T, TurretError>
where
    F: FnOnce(&mut TurretState) -> Result<T, TurretError> + Send + 'static,
    T: Send + 'static,
{
    let state = Arc::clone(state);
    tokio::task::spawn_blocking(move || {
        let mut state = state.lock().unwrap_or_else(PoisonError::into_inner);
        job(&mut state)
    })
    .await
    .map_err(|e| TurretError::HardwareFault {
        component: "dispatch".to_string(),
        details: e.to_string(),
    })?
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::time::Duration;

    use turret_core::{FiringParams, TurretHardware, TurretState};
    use turret_hal::SimRig;
    use turret_hal::stepper::StepTiming;

    use super::SharedState;

    pub(crate) fn shared_sim_state(rig: &SimRig) -> SharedState {
        let mut hw = TurretHardware::simulated(rig, rig.mux(), false).unwrap();
        hw.base = hw.base.with_timing(StepTiming {
            delay: Duration::ZERO,
            step_degrees: 1.8,
        });
        let state = TurretState::new(hw).with_firing(FiringParams {
            relay_settle: Duration::ZERO,
            hold: Duration::ZERO,
            ..FiringParams::default()
        });
        std::sync::Arc::new(std::sync::Mutex::new(state))
    }
}
