//! `turretd` – the turret control daemon.
//!
//! ```text
//! turretd [CONFIG] [--print-config]
//! ```
//!
//! 1. Loads `CONFIG`, `$TURRETD_CONFIG` or `~/.turretd/config.toml`
//!    (defaults when absent) and applies `TURRETD_*` overrides.
//! 2. Installs the tracing subscriber described by `[logging]`.
//! 3. Assembles the turret for `hardware.backend` and serves it over the
//!    configured transport until Ctrl-C / SIGTERM.

mod config;
mod rig;
mod telemetry;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::{Arc, Mutex};

use tokio::sync::Notify;
use tracing::{error, info, warn};
use turret_daemon::{DatagramServer, StreamServer};
use turret_types::TurretError;

use crate::config::{Config, Transport};

fn main() -> ExitCode {
    let mut path: Option<PathBuf> = None;
    let mut print_config = false;
    for arg in std::env::args().skip(1) {
        match arg.as_str() {
            "--print-config" => print_config = true,
            flag if flag.starts_with("--") => {
                eprintln!("turretd: unknown flag {flag}");
                return ExitCode::FAILURE;
            }
            _ if path.is_none() => path = Some(PathBuf::from(arg)),
            _ => {
                eprintln!("turretd: unexpected argument {arg}");
                return ExitCode::FAILURE;
            }
        }
    }

    let cfg = match config::load(path.as_deref()) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("turretd: {e}");
            return ExitCode::FAILURE;
        }
    };

    if print_config {
        return match config::to_toml(&cfg) {
            Ok(text) => {
                print!("{text}");
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("turretd: {e}");
                ExitCode::FAILURE
            }
        };
    }

    let _tracing = telemetry::init_tracing("turretd", &cfg.logging);

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            error!(error = %e, "failed to start the tokio runtime");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(cfg)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "turretd stopped");
            ExitCode::FAILURE
        }
    }
}

async fn run(cfg: Config) -> Result<(), TurretError> {
    // ── Shutdown signal ───────────────────────────────────────────────────
    let shutdown = Arc::new(Notify::new());
    let notifier = shutdown.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        info!("shutdown signal received");
        notifier.notify_one();
    }) {
        warn!(error = %e, "could not install the Ctrl-C handler");
    }

    // ── Turret ────────────────────────────────────────────────────────────
    let state = Arc::new(Mutex::new(rig::build_state(&cfg)?));
    let addr = (cfg.server.bind.as_str(), cfg.server.port);
    let stop = async move { shutdown.notified().await };

    // ── Server ────────────────────────────────────────────────────────────
    match cfg.server.transport {
        Transport::Stream => {
            StreamServer::bind(addr, state, cfg.server.framing)
                .await?
                .serve(stop)
                .await
        }
        Transport::Datagram => DatagramServer::bind(addr, state).await?.serve(stop).await,
    }
}
