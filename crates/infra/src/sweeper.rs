//! Background reservation sweeper.
//!
//! Expiry is cooperative: nothing rolls a hold back automatically, so a
//! dedicated worker polls for `expires_at < now` and pushes each hit through
//! the same release path a normal cancellation uses.

use std::sync::{mpsc, Arc, Mutex};
use std::thread;
use std::time::Duration;

use chrono::Utc;
use tracing::{error, info};

use crate::reservations::ReservationManager;
use crate::stores::{ReservationStore, StockStore};

/// Sweeper runtime statistics.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct SweeperStats {
    pub sweeps_run: u64,
    pub reservations_released: u64,
}

/// Handle to control a running sweeper.
#[derive(Debug)]
pub struct SweeperHandle {
    shutdown: mpsc::Sender<()>,
    join: Option<thread::JoinHandle<()>>,
    stats: Arc<Mutex<SweeperStats>>,
}

impl SweeperHandle {
    /// Request graceful shutdown and wait for the worker to exit.
    pub fn shutdown(mut self) {
        let _ = self.shutdown.send(());
        if let Some(j) = self.join.take() {
            let _ = j.join();
        }
    }

    /// Current sweeper statistics.
    pub fn stats(&self) -> SweeperStats {
        self.stats.lock().expect("sweeper stats poisoned").clone()
    }
}

/// Spawns and owns the sweep loop.
pub struct ReservationSweeper;

impl ReservationSweeper {
    /// Start sweeping every `interval` until the handle is shut down.
    pub fn spawn<S, R>(
        manager: Arc<ReservationManager<S, R>>,
        interval: Duration,
    ) -> SweeperHandle
    where
        S: StockStore + 'static,
        R: ReservationStore + 'static,
    {
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();
        let stats = Arc::new(Mutex::new(SweeperStats::default()));
        let stats_inner = stats.clone();

        let join = thread::Builder::new()
            .name("reservation-sweeper".to_string())
            .spawn(move || {
                info!(?interval, "reservation sweeper started");
                loop {
                    match shutdown_rx.recv_timeout(interval) {
                        // Shutdown requested, or the handle was dropped.
                        Ok(()) | Err(mpsc::RecvTimeoutError::Disconnected) => break,
                        Err(mpsc::RecvTimeoutError::Timeout) => {
                            match manager.sweep_expired(Utc::now()) {
                                Ok(released) => {
                                    let mut s =
                                        stats_inner.lock().expect("sweeper stats poisoned");
                                    s.sweeps_run += 1;
                                    s.reservations_released += released as u64;
                                }
                                Err(err) => {
                                    error!(%err, "reservation sweep failed");
                                }
                            }
                        }
                    }
                }
                info!("reservation sweeper stopped");
            })
            .expect("failed to spawn sweeper thread");

        SweeperHandle {
            shutdown: shutdown_tx,
            join: Some(join),
            stats,
        }
    }
}
