// src/jobs/mod.rs
// =============================================================================
// This module runs our two background jobs.
//
// Submodules:
// - scrape: walks listing pages and records every link it finds
// - visit: opens due links one per tick and stamps them visited
// - controller: start/stop toggles, one Idle/Running state machine per job
//
// Every job is a value with a tick() method. run_loop() drives it on a fixed
// period inside its own tokio task:
//
//   wait for the period (or cancellation) -> tick -> repeat
//
// A job never overlaps its own ticks: the next wait only starts after the
// previous tick returned. Cancellation is only observed between ticks, so a
// tick that is already running always finishes.
//
// Rust concepts:
// - tokio::select!: wait on whichever of two futures finishes first
// - CancellationToken: a cloneable "please stop" flag with an async wait
// =============================================================================

mod controller;
mod scrape;
mod visit;

pub use controller::{JobController, JobKind, JobSettings, StartOutcome};
pub use scrape::ScrapeJob;
pub use visit::VisitJob;

use async_trait::async_trait;
use std::time::Duration;
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::store::StoreError;

const MIN_PERIOD: Duration = Duration::from_millis(1);

/// What a single tick decided.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Keep ticking.
    Continue,
    /// No more work; the job stops itself.
    Finished,
}

/// Why a job's task ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobExit {
    /// Someone toggled it off.
    Stopped,
    /// It ran out of work (pagination ended, or nothing is due for a visit).
    Exhausted,
    /// A storage fault; the job stopped rather than tick on unknown state.
    Failed(String),
}

#[async_trait]
pub trait Job: Send + 'static {
    fn name(&self) -> &'static str;

    /// One step of the job.
    ///
    /// Err means the persisted state can't be trusted any more and the job
    /// must not tick again.
    async fn tick(&mut self) -> Result<TickOutcome, StoreError>;
}

/// Ticks `job` every `period` until it finishes, fails, or `cancel` fires.
///
/// The first tick happens one full period after start.
pub(crate) async fn run_loop<J: Job>(mut job: J, period: Duration, cancel: CancellationToken) -> JobExit {
    // tokio panics on a zero period
    let period = period.max(MIN_PERIOD);
    let mut ticker = time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    info!(job = job.name(), period_ms = period.as_millis() as u64, "job started");

    let exit = loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break JobExit::Stopped,
            _ = ticker.tick() => {}
        }

        match job.tick().await {
            Ok(TickOutcome::Continue) => {}
            Ok(TickOutcome::Finished) => break JobExit::Exhausted,
            Err(e) => {
                error!(job = job.name(), error = %e, "job stopped on storage fault");
                break JobExit::Failed(e.to_string());
            }
        }
    };

    info!(job = job.name(), exit = ?exit, "job stopped");
    exit
}
