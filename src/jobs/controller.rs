// src/jobs/controller.rs
// =============================================================================
// JobController: the start/stop switches for the scrape and visit jobs.
//
// Each job has its own slot holding an explicit state machine:
//
//   Idle --start--> Running --stop--------------> Idle
//                   Running --(job finished)----> Idle
//
// Running owns the job's tokio task and the CancellationToken that stops it.
// Stopping cancels the token and waits for the task: a tick that is already
// in flight completes, and no new tick is scheduled.
//
// A job that stops on its own (no more work, or a storage fault) leaves its
// task finished; the slot notices on the next status query and goes Idle,
// keeping the exit reason around for display.
// =============================================================================

use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::{run_loop, Job, JobExit, ScrapeJob, VisitJob};
use crate::page::{PageAdapter, PageLoader};
use crate::store::{LinkStore, StoreError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobKind {
    Scrape,
    Visit,
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobKind::Scrape => write!(f, "scrape"),
            JobKind::Visit => write!(f, "visit"),
        }
    }
}

/// Timings the controller hands to the jobs it starts.
#[derive(Debug, Clone, Copy)]
pub struct JobSettings {
    /// Tick period of the scrape job; also its per-page settle wait.
    pub scrape_interval: Duration,
    /// Tick period of the visit job.
    pub visit_interval: Duration,
    /// Longest we wait for one page to load during a visit.
    pub load_timeout: Duration,
}

/// What a start request did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    Started,
    AlreadyRunning,
    /// Visits only: nothing is due, so the job was never started.
    NothingToDo,
}

struct RunningJob {
    cancel: CancellationToken,
    task: JoinHandle<JobExit>,
}

enum JobState {
    Idle,
    Running(RunningJob),
}

struct JobSlot {
    kind: JobKind,
    state: JobState,
    last_exit: Option<JobExit>,
}

impl JobSlot {
    fn new(kind: JobKind) -> Self {
        Self {
            kind,
            state: JobState::Idle,
            last_exit: None,
        }
    }

    fn is_running(&self) -> bool {
        matches!(&self.state, JobState::Running(job) if !job.task.is_finished())
    }

    fn start<J: Job>(&mut self, job: J, period: Duration) {
        // One token per run: a stopped job's token is never reused
        let cancel = CancellationToken::new();
        let task = tokio::spawn(run_loop(job, period, cancel.clone()));
        self.state = JobState::Running(RunningJob { cancel, task });
        info!(job = %self.kind, "job toggled on");
    }

    /// Moves a self-finished job to Idle.
    async fn reap(&mut self) {
        let finished = matches!(&self.state, JobState::Running(job) if job.task.is_finished());
        if finished {
            self.wait().await;
        }
    }

    /// Waits for the running task (if any) to end on its own, then goes Idle.
    async fn wait(&mut self) -> Option<JobExit> {
        let JobState::Running(job) = &mut self.state else {
            return None;
        };

        let exit = match (&mut job.task).await {
            Ok(exit) => exit,
            Err(e) => {
                warn!(job = %self.kind, error = %e, "job task ended abnormally");
                JobExit::Failed(e.to_string())
            }
        };

        self.state = JobState::Idle;
        self.last_exit = Some(exit.clone());
        Some(exit)
    }

    /// Cancels the running task and waits for its in-flight tick to finish.
    async fn stop(&mut self) -> Option<JobExit> {
        if let JobState::Running(job) = &self.state {
            job.cancel.cancel();
            info!(job = %self.kind, "job toggled off");
        }
        self.wait().await
    }
}

/// Owns both jobs and the shared link store they work on.
pub struct JobController {
    store: LinkStore,
    loader: Arc<dyn PageLoader>,
    settings: JobSettings,
    scrape: JobSlot,
    visit: JobSlot,
}

impl JobController {
    pub fn new(store: LinkStore, loader: Arc<dyn PageLoader>, settings: JobSettings) -> Self {
        Self {
            store,
            loader,
            settings,
            scrape: JobSlot::new(JobKind::Scrape),
            visit: JobSlot::new(JobKind::Visit),
        }
    }

    pub fn store(&self) -> &LinkStore {
        &self.store
    }

    fn slot_mut(&mut self, kind: JobKind) -> &mut JobSlot {
        match kind {
            JobKind::Scrape => &mut self.scrape,
            JobKind::Visit => &mut self.visit,
        }
    }

    /// Starts scraping the listing behind `adapter`.
    ///
    /// The first page is read one scrape interval from now, then one page
    /// per interval until the listing runs out.
    pub async fn start_scrape(&mut self, adapter: Arc<dyn PageAdapter>) -> StartOutcome {
        self.scrape.reap().await;
        if self.scrape.is_running() {
            return StartOutcome::AlreadyRunning;
        }

        let job = ScrapeJob::new(adapter, self.store.clone(), self.settings.scrape_interval);
        self.scrape.start(job, self.settings.scrape_interval);
        StartOutcome::Started
    }

    /// Starts visiting due links.
    ///
    /// The queue is regenerated first; if nothing is due the job stays Idle.
    ///
    /// Returns:
    ///   Started = the job is ticking on the fresh queue
    ///   AlreadyRunning = left untouched, the running job keeps its queue
    ///   NothingToDo = no link is past its cooldown
    pub async fn start_visits(&mut self) -> Result<StartOutcome, StoreError> {
        self.visit.reap().await;
        if self.visit.is_running() {
            return Ok(StartOutcome::AlreadyRunning);
        }

        let queued = self.store.visit_queue().generate().await?;
        if queued.is_empty() {
            info!("no links are due for a visit, not starting");
            return Ok(StartOutcome::NothingToDo);
        }

        let job = VisitJob::new(self.store.clone(), self.loader.clone(), self.settings.load_timeout);
        self.visit.start(job, self.settings.visit_interval);
        Ok(StartOutcome::Started)
    }

    /// Stops a job. Returns its exit reason, or None if it wasn't running.
    pub async fn stop(&mut self, kind: JobKind) -> Option<JobExit> {
        self.slot_mut(kind).stop().await
    }

    /// Flips the scrape job: stops it if running, otherwise starts it.
    /// Returns whether it is running afterwards.
    pub async fn toggle_scrape(&mut self, adapter: Arc<dyn PageAdapter>) -> bool {
        if self.is_running(JobKind::Scrape).await {
            self.stop(JobKind::Scrape).await;
            false
        } else {
            self.start_scrape(adapter).await == StartOutcome::Started
        }
    }

    /// Flips the visit job. Returns whether it is running afterwards.
    pub async fn toggle_visits(&mut self) -> Result<bool, StoreError> {
        if self.is_running(JobKind::Visit).await {
            self.stop(JobKind::Visit).await;
            Ok(false)
        } else {
            Ok(self.start_visits().await? == StartOutcome::Started)
        }
    }

    pub async fn is_running(&mut self, kind: JobKind) -> bool {
        let slot = self.slot_mut(kind);
        slot.reap().await;
        slot.is_running()
    }

    /// Why the job last stopped, if it has run at all.
    pub async fn last_exit(&mut self, kind: JobKind) -> Option<JobExit> {
        let slot = self.slot_mut(kind);
        slot.reap().await;
        slot.last_exit.clone()
    }

    /// Waits until both jobs have stopped on their own.
    pub async fn wait_idle(&mut self) {
        tokio::join!(self.scrape.wait(), self.visit.wait());
    }

    /// Waits for both jobs to go Idle, starting visits as links become due.
    ///
    /// While the scrape job runs, an Idle visit job is retried once per visit
    /// interval, and once more after scraping ends, so links found on the
    /// first pages get visited in the same run. A visit job that stopped on a
    /// storage fault stays stopped.
    ///
    /// Returns: Err only if regenerating the visit queue hit a storage fault
    pub async fn run_until_idle(&mut self) -> Result<(), StoreError> {
        loop {
            // Read this before retrying visits so the last scraped page is seen
            let scraping = self.is_running(JobKind::Scrape).await;

            let visit_failed = matches!(self.last_exit(JobKind::Visit).await, Some(JobExit::Failed(_)));
            if !visit_failed && !self.is_running(JobKind::Visit).await {
                self.start_visits().await?;
            }

            if !scraping {
                break;
            }
            time::sleep(self.settings.visit_interval).await;
        }

        self.wait_idle().await;
        Ok(())
    }

    pub async fn stop_all(&mut self) {
        tokio::join!(self.scrape.stop(), self.visit.stop());
    }

    /// Clears every discovered link and the visit queue.
    ///
    /// Running jobs keep running; a visit in flight for a cleared link is
    /// logged and skipped.
    pub async fn clear(&self) -> Result<(), StoreError> {
        self.store.clear().await
    }

    /// The discovered-link counter.
    pub async fn link_count(&self) -> Result<usize, StoreError> {
        self.store.count().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::scrape::tests::{Ending, FakeListing, ReadOnlyStore};
    use crate::jobs::visit::tests::RecordingLoader;
    use crate::store::{ManualClock, MemoryStore, DEFAULT_COOLDOWN};

    const NOW: i64 = 1_700_000_000_000;

    fn settings() -> JobSettings {
        JobSettings {
            scrape_interval: Duration::from_secs(2),
            visit_interval: Duration::from_secs(4),
            load_timeout: Duration::from_secs(30),
        }
    }

    fn controller() -> (JobController, Arc<RecordingLoader>) {
        let store = LinkStore::new(
            Arc::new(MemoryStore::new()),
            Arc::new(ManualClock::new(NOW)),
            DEFAULT_COOLDOWN,
        );
        let loader = Arc::new(RecordingLoader::default());
        (JobController::new(store, loader.clone(), settings()), loader)
    }

    fn listing(pages: &[&[&str]]) -> Arc<FakeListing> {
        Arc::new(FakeListing::new(pages, Ending::Disabled))
    }

    #[tokio::test(start_paused = true)]
    async fn test_scrape_runs_to_exhaustion_then_goes_idle() {
        let (mut controller, _) = controller();

        let outcome = controller.start_scrape(listing(&[&["A"], &["B"]])).await;
        assert_eq!(outcome, StartOutcome::Started);
        assert!(controller.is_running(JobKind::Scrape).await);

        controller.wait_idle().await;
        assert!(!controller.is_running(JobKind::Scrape).await);
        assert_eq!(controller.last_exit(JobKind::Scrape).await, Some(JobExit::Exhausted));
        assert_eq!(controller.link_count().await.unwrap(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_scrape_twice_is_a_no_op() {
        let (mut controller, _) = controller();
        let pages = listing(&[&["A"], &["B"], &["C"]]);

        assert_eq!(controller.start_scrape(pages.clone()).await, StartOutcome::Started);
        assert_eq!(controller.start_scrape(pages).await, StartOutcome::AlreadyRunning);
        controller.stop_all().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_prevents_further_ticks() {
        let (mut controller, _) = controller();
        let pages = listing(&[&["A"], &["B"], &["C"], &["D"]]);
        controller.start_scrape(pages.clone()).await;

        // First tick fires at 2s and settles until 4s
        time::sleep(Duration::from_millis(4500)).await;
        assert_eq!(controller.stop(JobKind::Scrape).await, Some(JobExit::Stopped));
        let settles = *pages.settle_calls.lock().await;
        let count = controller.link_count().await.unwrap();

        time::sleep(Duration::from_secs(60)).await;
        assert_eq!(*pages.settle_calls.lock().await, settles);
        assert_eq!(controller.link_count().await.unwrap(), count);
        assert!(!controller.is_running(JobKind::Scrape).await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_lets_in_flight_tick_finish() {
        let (mut controller, _) = controller();
        controller.start_scrape(listing(&[&["A"], &["B"]])).await;

        // 3s: the first tick is in its settle wait
        time::sleep(Duration::from_secs(3)).await;
        assert_eq!(controller.stop(JobKind::Scrape).await, Some(JobExit::Stopped));
        assert_eq!(controller.link_count().await.unwrap(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_scrape_can_restart_after_stop() {
        let (mut controller, _) = controller();
        let pages = listing(&[&["A"], &["B"], &["C"]]);

        assert!(controller.toggle_scrape(pages.clone()).await);
        assert!(!controller.toggle_scrape(pages.clone()).await);
        assert!(controller.toggle_scrape(pages).await);
        controller.wait_idle().await;
        assert_eq!(controller.link_count().await.unwrap(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_visits_refuse_to_start_when_nothing_is_due() {
        let (mut controller, _) = controller();
        assert_eq!(controller.start_visits().await.unwrap(), StartOutcome::NothingToDo);
        assert!(!controller.is_running(JobKind::Visit).await);
        assert!(!controller.toggle_visits().await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn test_visits_drain_queue_then_go_idle() {
        let (mut controller, loader) = controller();
        controller.store().append_discovered(["A", "B"]).await.unwrap();

        assert_eq!(controller.start_visits().await.unwrap(), StartOutcome::Started);
        controller.wait_idle().await;

        assert_eq!(*loader.opened.lock().await, vec!["A", "B"]);
        assert_eq!(controller.last_exit(JobKind::Visit).await, Some(JobExit::Exhausted));
        assert!(!controller.is_running(JobKind::Visit).await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_both_jobs_share_the_store() {
        let (mut controller, loader) = controller();

        controller.start_scrape(listing(&[&["A", "B"], &["C"]])).await;
        // Let the first page land so there is something to visit
        time::sleep(Duration::from_secs(5)).await;
        assert_eq!(controller.start_visits().await.unwrap(), StartOutcome::Started);

        controller.wait_idle().await;

        let all = controller.store().get_all().await.unwrap();
        assert_eq!(all.len(), 3);
        let opened = loader.opened.lock().await.clone();
        // Every discovered link was visited exactly once
        let mut sorted = opened.clone();
        sorted.sort();
        sorted.dedup();
        assert_eq!(sorted.len(), opened.len());
        assert_eq!(sorted, vec!["A", "B", "C"]);
        assert!(all.values().all(|ts| *ts == NOW));
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_on_empty_store_visits_scraped_links() {
        let (mut controller, loader) = controller();

        controller.start_scrape(listing(&[&["A", "B"], &["C"]])).await;
        // Nothing has been scraped yet
        assert_eq!(controller.start_visits().await.unwrap(), StartOutcome::NothingToDo);

        controller.run_until_idle().await.unwrap();

        let mut opened = loader.opened.lock().await.clone();
        opened.sort();
        assert_eq!(opened, vec!["A", "B", "C"]);
        assert!(!controller.is_running(JobKind::Scrape).await);
        assert!(!controller.is_running(JobKind::Visit).await);
        assert_eq!(controller.last_exit(JobKind::Visit).await, Some(JobExit::Exhausted));
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_until_idle_with_nothing_running_returns() {
        let (mut controller, loader) = controller();
        controller.run_until_idle().await.unwrap();
        assert!(loader.opened.lock().await.is_empty());
        assert_eq!(controller.last_exit(JobKind::Visit).await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_storage_fault_leaves_job_failed() {
        let store = LinkStore::new(
            Arc::new(ReadOnlyStore),
            Arc::new(ManualClock::new(NOW)),
            DEFAULT_COOLDOWN,
        );
        let mut controller = JobController::new(store, Arc::new(RecordingLoader::default()), settings());

        controller.start_scrape(listing(&[&["A"], &["B"]])).await;
        controller.wait_idle().await;

        assert!(matches!(
            controller.last_exit(JobKind::Scrape).await,
            Some(JobExit::Failed(_))
        ));
        assert!(!controller.is_running(JobKind::Scrape).await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_clear_resets_counter() {
        let (mut controller, _) = controller();
        controller.start_scrape(listing(&[&["A", "B"]])).await;
        controller.wait_idle().await;
        assert_eq!(controller.link_count().await.unwrap(), 2);

        controller.clear().await.unwrap();
        assert_eq!(controller.link_count().await.unwrap(), 0);
        assert_eq!(controller.start_visits().await.unwrap(), StartOutcome::NothingToDo);
    }
}
