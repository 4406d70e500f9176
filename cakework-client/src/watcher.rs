//! Multiplexed job watcher
//!
//! A single background task polls every pending job on one fixed-interval
//! ticker, so waiting on many jobs does not require one sleeping task per
//! job. Each watched job resolves through a [`WatchHandle`].

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use cakework_core::domain::job::JobId;
use cakework_core::domain::run::RunOutput;
use futures::future::join_all;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::PollConfig;
use crate::error::{ClientError, Result};
use crate::poller::{StatusTracker, is_past, resolve_terminal};
use crate::service::JobService;

/// Shortest tick the watcher loop will use
const MIN_TICK: Duration = Duration::from_millis(1);

/// Watches many jobs from one polling loop
pub struct JobWatcher {
    registrations: mpsc::UnboundedSender<Registration>,
    pending: Arc<AtomicUsize>,
    config: PollConfig,
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

/// Pending outcome of one watched job
#[derive(Debug)]
pub struct WatchHandle {
    job_id: JobId,
    receiver: oneshot::Receiver<Result<RunOutput>>,
}

struct Registration {
    job_id: JobId,
    deadline: Option<Instant>,
    reply: oneshot::Sender<Result<RunOutput>>,
}

struct Watched {
    tracker: StatusTracker,
    deadline: Option<Instant>,
    transient_failures: u32,
    reply: oneshot::Sender<Result<RunOutput>>,
}

impl From<Registration> for Watched {
    fn from(registration: Registration) -> Self {
        Self {
            tracker: StatusTracker::new(registration.job_id),
            deadline: registration.deadline,
            transient_failures: 0,
            reply: registration.reply,
        }
    }
}

impl JobWatcher {
    /// Starts the watcher loop
    ///
    /// The loop ticks every `config.poll_interval`; `config.timeout` is the
    /// default budget of [`watch`](Self::watch). Cancelling `cancel` stops the
    /// loop and resolves every pending handle with [`ClientError::Cancelled`].
    pub fn spawn(
        service: Arc<dyn JobService>,
        config: PollConfig,
        cancel: CancellationToken,
    ) -> Self {
        let (registrations, receiver) = mpsc::unbounded_channel();
        let pending = Arc::new(AtomicUsize::new(0));

        let handle = tokio::spawn(run_loop(
            service,
            config,
            receiver,
            Arc::clone(&pending),
            cancel.clone(),
        ));

        Self {
            registrations,
            pending,
            config,
            cancel,
            handle,
        }
    }

    /// Watches `job_id` with the configured timeout
    pub fn watch(&self, job_id: JobId) -> WatchHandle {
        self.watch_with_timeout(job_id, self.config.timeout)
    }

    /// Watches `job_id`, giving up after `timeout`
    pub fn watch_with_timeout(&self, job_id: JobId, timeout: Duration) -> WatchHandle {
        let (reply, receiver) = oneshot::channel();
        let registration = Registration {
            job_id: job_id.clone(),
            deadline: Instant::now().checked_add(timeout),
            reply,
        };

        if let Err(mpsc::error::SendError(registration)) = self.registrations.send(registration) {
            // Loop already stopped
            let _ = registration.reply.send(Err(ClientError::Cancelled {
                job_id: registration.job_id,
                last_status: None,
            }));
        }

        WatchHandle { job_id, receiver }
    }

    /// Number of jobs still being watched
    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::Relaxed)
    }

    /// Stops the loop, resolving pending handles as cancelled
    pub async fn shutdown(self) {
        self.cancel.cancel();
        if let Err(e) = self.handle.await {
            warn!("Watcher task panicked: {}", e);
        }
    }
}

impl WatchHandle {
    pub fn job_id(&self) -> &JobId {
        &self.job_id
    }

    /// Waits for the watched job's outcome
    pub async fn wait(self) -> Result<RunOutput> {
        match self.receiver.await {
            Ok(outcome) => outcome,
            Err(_) => Err(ClientError::Cancelled {
                job_id: self.job_id,
                last_status: None,
            }),
        }
    }
}

async fn run_loop(
    service: Arc<dyn JobService>,
    config: PollConfig,
    mut registrations: mpsc::UnboundedReceiver<Registration>,
    pending: Arc<AtomicUsize>,
    cancel: CancellationToken,
) {
    info!(
        "Starting job watcher (interval: {:?})",
        config.poll_interval
    );

    let mut jobs: Vec<Watched> = Vec::new();
    let mut ticker = time::interval(config.poll_interval.max(MIN_TICK));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let mut detached = false;

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            registration = registrations.recv(), if !detached => {
                match registration {
                    Some(registration) => {
                        debug!(job_id = %registration.job_id, "Watching job");
                        jobs.push(Watched::from(registration));
                        pending.store(jobs.len(), Ordering::Relaxed);
                    }
                    None => detached = true,
                }
                continue;
            }
            _ = ticker.tick() => {}
        }

        // Handles dropped by their owner are no longer polled
        jobs.retain(|job| !job.reply.is_closed());
        if jobs.is_empty() {
            pending.store(0, Ordering::Relaxed);
            if detached {
                debug!("Job watcher dropped with no pending jobs");
                return;
            }
            continue;
        }

        debug!("Polling {} watched job(s)", jobs.len());
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = poll_round(service.as_ref(), &config, &mut jobs) => {}
        }
        pending.store(jobs.len(), Ordering::Relaxed);
    }

    registrations.close();
    while let Ok(registration) = registrations.try_recv() {
        jobs.push(Watched::from(registration));
    }

    info!("Stopping job watcher, cancelling {} pending job(s)", jobs.len());
    for job in jobs {
        let _ = job.reply.send(Err(job.tracker.cancelled()));
    }
    pending.store(0, Ordering::Relaxed);
}

/// Polls every job once, resolving the ones that are done
///
/// Jobs stay in `jobs` until their outcome has been sent, so dropping the
/// round half way leaves every unresolved job in place.
async fn poll_round(service: &dyn JobService, config: &PollConfig, jobs: &mut Vec<Watched>) {
    // Deadlines are checked before polling, never ahead of the first poll
    let (expired, live): (Vec<_>, Vec<_>) = std::mem::take(jobs)
        .into_iter()
        .partition(|job| job.tracker.polls > 0 && is_past(job.deadline));
    *jobs = live;

    for job in expired {
        warn!(
            job_id = %job.tracker.job_id,
            polls = job.tracker.polls,
            "Timed out waiting for job"
        );
        let _ = job.reply.send(Err(job.tracker.timed_out()));
    }

    let statuses = join_all(
        jobs.iter()
            .map(|job| service.get_status(&job.tracker.job_id)),
    )
    .await;

    for (mut job, status) in std::mem::take(jobs).into_iter().zip(statuses) {
        job.tracker.polls += 1;

        match status {
            Ok(status) => {
                job.transient_failures = 0;
                job.tracker.observe(status);
            }
            Err(e) if e.is_retryable() && job.transient_failures < config.transient_retries => {
                job.transient_failures += 1;
                warn!(
                    job_id = %job.tracker.job_id,
                    attempt = job.transient_failures,
                    error = %e,
                    "Transient failure while polling, retrying"
                );
            }
            Err(e) => {
                let _ = job.reply.send(Err(e));
                continue;
            }
        }

        jobs.push(job);
    }

    let mut index = 0;
    while index < jobs.len() {
        match resolve_terminal(service, &jobs[index].tracker).await {
            Some(outcome) => {
                let job = jobs.remove(index);
                let _ = job.reply.send(outcome);
            }
            None => index += 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{Script, ScriptedService};
    use cakework_core::domain::job::JobStatus::{Failed, InProgress, Pending, Succeeded};

    fn spawn_watcher(service: &Arc<ScriptedService>, cancel: &CancellationToken) -> JobWatcher {
        JobWatcher::spawn(
            service.clone(),
            PollConfig::new(Duration::from_secs(1), Duration::from_secs(30)),
            cancel.clone(),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_resolves_many_jobs_from_one_loop() {
        let service = Arc::new(ScriptedService::new());
        let hello = service.add_job(
            "hello",
            Script::new(&[Pending, Succeeded]).with_result("Hello jessie!"),
        );
        let image = service.add_job(
            "image",
            Script::new(&[Pending, InProgress, InProgress, Succeeded])
                .with_result(r#"{"s3Location": "cake.png"}"#),
        );
        let broken = service.add_job(
            "broken",
            Script::new(&[InProgress, Failed]).with_error("worker crashed"),
        );

        let cancel = CancellationToken::new();
        let watcher = spawn_watcher(&service, &cancel);

        let hello_handle = watcher.watch(hello.clone());
        let image_handle = watcher.watch(image.clone());
        let broken_handle = watcher.watch(broken.clone());

        assert_eq!(hello_handle.wait().await.unwrap().as_str(), "Hello jessie!");
        assert_eq!(
            image_handle.wait().await.unwrap().as_str(),
            r#"{"s3Location": "cake.png"}"#
        );
        match broken_handle.wait().await.unwrap_err() {
            ClientError::JobFailed { detail, .. } => {
                assert_eq!(detail.as_deref(), Some("worker crashed"))
            }
            other => panic!("expected job failure, got {other:?}"),
        }

        assert_eq!(service.polls(&hello), 2);
        assert_eq!(service.polls(&image), 4);
        assert_eq!(watcher.pending(), 0);
        watcher.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_times_out_per_job() {
        let service = Arc::new(ScriptedService::new());
        let stuck = service.add_job("stuck", Script::new(&[InProgress]));

        let cancel = CancellationToken::new();
        let watcher = spawn_watcher(&service, &cancel);

        let err = watcher
            .watch_with_timeout(stuck.clone(), Duration::from_secs(3))
            .wait()
            .await
            .unwrap_err();

        // Same poll count as JobPoller for a 1s interval and 3s budget
        assert!(matches!(
            err,
            ClientError::Timeout {
                last_status: Some(InProgress),
                polls: 3,
                ..
            }
        ));
        assert_eq!(service.polls(&stuck), 3);
        watcher.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_unbounded_timeout_does_not_overflow() {
        let service = Arc::new(ScriptedService::new());
        let done = service.add_job("done", Script::new(&[Succeeded]).with_result("ok"));
        let later = service.add_job(
            "later",
            Script::new(&[Pending, Succeeded]).with_result("ok"),
        );

        let cancel = CancellationToken::new();
        let watcher = spawn_watcher(&service, &cancel);

        let done = watcher.watch_with_timeout(done, Duration::MAX);
        let later = watcher.watch_with_timeout(later, Duration::from_secs(u64::MAX / 2));

        assert_eq!(done.wait().await.unwrap().as_str(), "ok");
        assert_eq!(later.wait().await.unwrap().as_str(), "ok");
        watcher.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_failures_retried_when_configured() {
        let service = Arc::new(ScriptedService::new());
        let flaky = service.add_job(
            "flaky",
            Script::new(&[InProgress, Succeeded])
                .with_result("done")
                .with_transient_failures(2),
        );
        let fragile = service.add_job(
            "fragile",
            Script::new(&[Succeeded])
                .with_result("done")
                .with_transient_failures(3),
        );

        let cancel = CancellationToken::new();
        let watcher = JobWatcher::spawn(
            service.clone(),
            PollConfig::new(Duration::from_secs(1), Duration::from_secs(30))
                .with_transient_retries(2),
            cancel.clone(),
        );

        let flaky_handle = watcher.watch(flaky.clone());
        let fragile_handle = watcher.watch(fragile.clone());

        assert_eq!(flaky_handle.wait().await.unwrap().as_str(), "done");
        assert_eq!(service.polls(&flaky), 4);

        // Third consecutive failure exceeds the allowance
        assert!(fragile_handle.wait().await.unwrap_err().is_retryable());
        assert_eq!(service.polls(&fragile), 3);

        watcher.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_interrupts_poll_in_flight() {
        let service = Arc::new(ScriptedService::new());
        let hung = service.add_job("hung", Script::new(&[InProgress]).stalled());

        let cancel = CancellationToken::new();
        let watcher = spawn_watcher(&service, &cancel);
        let handle = watcher.watch(hung.clone());

        time::sleep(Duration::from_millis(100)).await;
        assert_eq!(service.polls(&hung), 1);
        cancel.cancel();

        let err = time::timeout(Duration::from_secs(1), handle.wait())
            .await
            .unwrap()
            .unwrap_err();
        assert!(matches!(
            err,
            ClientError::Cancelled {
                last_status: None,
                ..
            }
        ));
        watcher.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_resolves_pending_handles() {
        let service = Arc::new(ScriptedService::new());
        let first = service.add_job("a", Script::new(&[InProgress]));
        let second = service.add_job("b", Script::new(&[Pending]));

        let cancel = CancellationToken::new();
        let watcher = spawn_watcher(&service, &cancel);
        let first = watcher.watch(first);
        let second = watcher.watch(second);

        time::sleep(Duration::from_millis(2500)).await;
        assert_eq!(watcher.pending(), 2);
        cancel.cancel();

        assert!(matches!(
            first.wait().await.unwrap_err(),
            ClientError::Cancelled {
                last_status: Some(InProgress),
                ..
            }
        ));
        assert!(matches!(
            second.wait().await.unwrap_err(),
            ClientError::Cancelled { .. }
        ));

        watcher.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_watch_after_stop_is_cancelled() {
        let service = Arc::new(ScriptedService::new());
        let cancel = CancellationToken::new();
        let watcher = spawn_watcher(&service, &cancel);

        cancel.cancel();
        time::sleep(Duration::from_millis(10)).await;

        let err = watcher
            .watch(JobId::new("late"))
            .wait()
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Cancelled { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_unknown_job_resolves_not_found() {
        let service = Arc::new(ScriptedService::new());
        let cancel = CancellationToken::new();
        let watcher = spawn_watcher(&service, &cancel);

        let err = watcher
            .watch(JobId::new("missing"))
            .wait()
            .await
            .unwrap_err();

        assert!(err.is_not_found());
        watcher.shutdown().await;
    }
}
