//! Submit/complete simulation
//!
//! Drives a descriptor pool the way a management frame path does: transmit
//! tasks lease a descriptor per frame, and completions arrive later on a
//! different task, which releases the descriptor and checks that the
//! payload it gets back belongs to the frame being completed.

use crate::config::SimulationConfig;
use crate::desc_pool::{DescId, DescPool, PoolStats};
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, info, instrument};

/// What a transmit task tracks for one in-flight frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameMeta {
    pub worker: usize,
    pub seq: usize,
}

/// Outcome of a simulation run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationReport {
    /// Frames that obtained a descriptor
    pub submitted: u64,
    pub completed: u64,
    /// Frames dropped because the pool was exhausted
    pub dropped: u64,
    /// Completions whose payload did not match the frame
    pub mismatched: u64,
    pub elapsed_ms: u128,
    pub pool: PoolStats,
}

fn join_error(e: tokio::task::JoinError) -> Error {
    Error::Internal(format!("simulation task failed: {}", e))
}

/// Run the simulation against `pool`
#[instrument(skip(pool, config), fields(pool = %pool.name()))]
pub async fn run(pool: Arc<DescPool<FrameMeta>>, config: &SimulationConfig) -> Result<SimulationReport> {
    let started = Instant::now();
    let delay = Duration::from_micros(config.completion_delay_us);
    let (tx, mut rx) = mpsc::unbounded_channel::<(DescId, FrameMeta)>();
    let submitted = Arc::new(AtomicU64::new(0));
    let dropped = Arc::new(AtomicU64::new(0));

    info!(
        workers = config.workers,
        frames_per_worker = config.frames_per_worker,
        "Starting mgmt frame simulation"
    );

    let mut workers = JoinSet::new();
    for worker in 0..config.workers {
        let pool = Arc::clone(&pool);
        let tx = tx.clone();
        let submitted = Arc::clone(&submitted);
        let dropped = Arc::clone(&dropped);
        let frames = config.frames_per_worker;

        workers.spawn(async move {
            for seq in 0..frames {
                let meta = FrameMeta { worker, seq };
                match pool.acquire_with(meta) {
                    Ok(id) => {
                        submitted.fetch_add(1, Ordering::Relaxed);
                        if tx.send((id, meta)).is_err() {
                            break;
                        }
                    }
                    Err(e) if e.is_exhausted() => {
                        dropped.fetch_add(1, Ordering::Relaxed);
                    }
                    Err(e) => return Err(e),
                }
                tokio::task::yield_now().await;
            }
            Ok::<(), Error>(())
        });
    }
    drop(tx);

    let completion_pool = Arc::clone(&pool);
    let completer = tokio::spawn(async move {
        let mut pending = JoinSet::new();
        while let Some((id, meta)) = rx.recv().await {
            let pool = Arc::clone(&completion_pool);
            pending.spawn(async move {
                tokio::time::sleep(delay).await;
                let returned = pool.release(id)?;
                Ok::<bool, Error>(returned == Some(meta))
            });
        }

        let (mut completed, mut mismatched) = (0u64, 0u64);
        while let Some(res) = pending.join_next().await {
            if res.map_err(join_error)?? {
                completed += 1;
            } else {
                mismatched += 1;
            }
        }
        Ok::<_, Error>((completed, mismatched))
    });

    while let Some(res) = workers.join_next().await {
        res.map_err(join_error)??;
    }
    let (completed, mismatched) = completer.await.map_err(join_error)??;

    let report = SimulationReport {
        submitted: submitted.load(Ordering::Relaxed),
        completed,
        dropped: dropped.load(Ordering::Relaxed),
        mismatched,
        elapsed_ms: started.elapsed().as_millis(),
        pool: pool.stats(),
    };
    debug!(?report, "Simulation finished");
    Ok(report)
}
