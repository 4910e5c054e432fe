//! Fixed-interval status polling for server-side jobs.
//!
//! A poll issues its first request immediately, then one per interval tick
//! until the fetched status is terminal or the [`PollHandle`] is cancelled or
//! dropped. Failed requests are logged and retried on the next tick only.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::api::{ApiClient, PipelineApi};
use crate::error::{ClientError, Result};
use crate::models::{GmailExportTask, PipelineRun};

/// Default time between two status requests.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// A status record that can end a poll.
pub trait PollStatus: Clone + Send + Sync + 'static {
    fn is_terminal(&self) -> bool;

    /// Short label for logs.
    fn label(&self) -> &'static str;
}

impl PollStatus for PipelineRun {
    fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    fn label(&self) -> &'static str {
        self.status.as_str()
    }
}

impl PollStatus for GmailExportTask {
    fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    fn label(&self) -> &'static str {
        self.status.as_str()
    }
}

/// Where a poll gets its status from.
#[async_trait]
pub trait StatusSource: Send + Sync + 'static {
    type Status: PollStatus;

    async fn fetch_status(&self, id: &str) -> Result<Self::Status>;
}

/// Polls `GET /api/video-pipeline-runs/{id}/`.
pub struct RunStatusSource(pub Arc<dyn PipelineApi>);

#[async_trait]
impl StatusSource for RunStatusSource {
    type Status = PipelineRun;

    async fn fetch_status(&self, id: &str) -> Result<PipelineRun> {
        self.0.get_pipeline(id).await
    }
}

/// Polls `GET /api/gmail/export/status/{task_id}/`.
pub struct ExportStatusSource(pub ApiClient);

#[async_trait]
impl StatusSource for ExportStatusSource {
    type Status = GmailExportTask;

    async fn fetch_status(&self, id: &str) -> Result<GmailExportTask> {
        self.0.gmail_export_status(id).await
    }
}

/// How a poll loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollExit {
    /// A terminal status was fetched.
    Terminal,
    /// The handle was cancelled or dropped.
    Cancelled,
}

/// Spawns poll loops with a fixed interval.
#[derive(Debug, Clone, Copy)]
pub struct StatusPoller {
    interval: Duration,
}

impl Default for StatusPoller {
    fn default() -> Self {
        Self::new(DEFAULT_POLL_INTERVAL)
    }
}

impl StatusPoller {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval: interval.max(Duration::from_millis(1)),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Start polling `id` on a background task.
    pub fn spawn<S: StatusSource>(
        &self,
        source: Arc<S>,
        id: impl Into<String>,
    ) -> Result<PollHandle<S::Status>> {
        self.spawn_with_token(source, id, CancellationToken::new())
    }

    /// Like [`spawn`](Self::spawn) but stops when `token` (or any parent) is cancelled.
    pub fn spawn_with_token<S: StatusSource>(
        &self,
        source: Arc<S>,
        id: impl Into<String>,
        token: CancellationToken,
    ) -> Result<PollHandle<S::Status>> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(ClientError::validation("cannot poll an empty identifier"));
        }

        let (tx, rx) = watch::channel(None);
        let task = tokio::spawn(poll_loop(source, id, self.interval, tx, token.clone()));

        Ok(PollHandle {
            rx,
            token,
            task: Some(task),
        })
    }
}

async fn poll_loop<S: StatusSource>(
    source: Arc<S>,
    id: String,
    period: Duration,
    tx: watch::Sender<Option<S::Status>>,
    token: CancellationToken,
) -> PollExit {
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut attempt: u32 = 0;

    loop {
        tokio::select! {
            _ = token.cancelled() => {
                debug!(id = %id, "Polling cancelled");
                return PollExit::Cancelled;
            }
            _ = ticker.tick() => {}
        }

        attempt += 1;
        let fetched = tokio::select! {
            _ = token.cancelled() => {
                debug!(id = %id, "Polling cancelled during request");
                return PollExit::Cancelled;
            }
            fetched = source.fetch_status(&id) => fetched,
        };

        match fetched {
            Ok(status) => {
                let terminal = status.is_terminal();
                debug!(id = %id, attempt, status = status.label(), "Status fetched");
                tx.send_replace(Some(status));
                if terminal {
                    info!(id = %id, attempt, "Reached terminal status, polling stopped");
                    return PollExit::Terminal;
                }
            }
            Err(e) => {
                warn!(id = %id, attempt, error = %e, "Status request failed, waiting for next tick");
            }
        }
    }
}

/// Owner of a running poll. Dropping it stops the poll.
#[derive(Debug)]
pub struct PollHandle<T> {
    rx: watch::Receiver<Option<T>>,
    token: CancellationToken,
    task: Option<JoinHandle<PollExit>>,
}

impl<T: Clone> PollHandle<T> {
    /// The last fetched status, if any request has succeeded yet.
    pub fn latest(&self) -> Option<T> {
        self.rx.borrow().clone()
    }

    /// A receiver notified on every fetched status.
    pub fn subscribe(&self) -> watch::Receiver<Option<T>> {
        self.rx.clone()
    }

    /// Wait for the next fetched status. `None` once the poll has ended and
    /// every status has been seen.
    pub async fn changed(&mut self) -> Option<T> {
        self.rx.changed().await.ok()?;
        self.rx.borrow_and_update().clone()
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.task.as_ref().is_none_or(|t| t.is_finished())
    }

    /// Wait for the loop to end.
    pub async fn join(mut self) -> PollExit {
        match self.task.take() {
            Some(task) => task.await.unwrap_or(PollExit::Cancelled),
            None => PollExit::Cancelled,
        }
    }
}

impl<T> Drop for PollHandle<T> {
    fn drop(&mut self) {
        if self.task.is_some() {
            self.token.cancel();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{PipelineStatus, RenderOutput};
    use parking_lot::Mutex;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn run(status: PipelineStatus) -> PipelineRun {
        PipelineRun {
            id: "run-1".into(),
            status,
            error_message: None,
            render: RenderOutput::default(),
            validated_images: Vec::new(),
            created_at: None,
        }
    }

    /// Replays a script of responses; keeps answering the last one when exhausted.
    struct Scripted {
        script: Mutex<VecDeque<Result<PipelineRun>>>,
        calls: AtomicU32,
    }

    impl Scripted {
        fn new(script: Vec<Result<PipelineRun>>) -> Arc<Self> {
            Arc::new(Self {
                script: Mutex::new(script.into()),
                calls: AtomicU32::new(0),
            })
        }
    }

    #[async_trait]
    impl StatusSource for Scripted {
        type Status = PipelineRun;

        async fn fetch_status(&self, _id: &str) -> Result<PipelineRun> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut script = self.script.lock();
            if script.len() > 1 {
                script.pop_front().unwrap()
            } else {
                match script.front() {
                    Some(Ok(run)) => Ok(run.clone()),
                    _ => Err(ClientError::other("unavailable")),
                }
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_stops_after_terminal_status() {
        let source = Scripted::new(vec![
            Ok(run(PipelineStatus::Pending)),
            Ok(run(PipelineStatus::Processing)),
            Ok(run(PipelineStatus::Completed)),
        ]);
        let handle = StatusPoller::default()
            .spawn(source.clone(), "run-1")
            .unwrap();

        assert_eq!(handle.join().await, PollExit::Terminal);
        assert_eq!(source.calls.load(Ordering::SeqCst), 3);

        tokio::time::sleep(DEFAULT_POLL_INTERVAL * 4).await;
        assert_eq!(source.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_request_is_immediate_then_fixed_interval() {
        let source = Scripted::new(vec![Ok(run(PipelineStatus::Processing))]);
        let start = tokio::time::Instant::now();
        let mut handle = StatusPoller::new(Duration::from_secs(5))
            .spawn(source.clone(), "run-1")
            .unwrap();

        handle.changed().await.unwrap();
        assert_eq!(start.elapsed(), Duration::ZERO);

        handle.changed().await.unwrap();
        assert_eq!(start.elapsed(), Duration::from_secs(5));

        handle.changed().await.unwrap();
        assert_eq!(start.elapsed(), Duration::from_secs(10));
        assert_eq!(source.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_requests_wait_for_next_tick() {
        let source = Scripted::new(vec![
            Err(ClientError::other("502")),
            Err(ClientError::other("timeout")),
            Ok(run(PipelineStatus::Failed)),
        ]);
        let start = tokio::time::Instant::now();
        let mut handle = StatusPoller::new(Duration::from_secs(5))
            .spawn(source.clone(), "run-1")
            .unwrap();

        let status = handle.changed().await.unwrap();
        assert_eq!(status.status, PipelineStatus::Failed);
        assert_eq!(start.elapsed(), Duration::from_secs(10));
        assert_eq!(handle.join().await, PollExit::Terminal);
        assert_eq!(source.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_stops_polling() {
        let source = Scripted::new(vec![Ok(run(PipelineStatus::Pending))]);
        let mut handle = StatusPoller::default()
            .spawn(source.clone(), "run-1")
            .unwrap();

        handle.changed().await.unwrap();
        handle.cancel();
        assert_eq!(handle.join().await, PollExit::Cancelled);

        tokio::time::sleep(DEFAULT_POLL_INTERVAL * 3).await;
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_stops_polling() {
        let source = Scripted::new(vec![Ok(run(PipelineStatus::Pending))]);
        let token = CancellationToken::new();
        let mut handle = StatusPoller::default()
            .spawn_with_token(source.clone(), "run-1", token.clone())
            .unwrap();

        handle.changed().await.unwrap();
        drop(handle);
        assert!(token.is_cancelled());

        tokio::time::sleep(DEFAULT_POLL_INTERVAL * 3).await;
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_empty_identifier_is_rejected() {
        let source = Scripted::new(vec![Ok(run(PipelineStatus::Pending))]);
        let result = StatusPoller::default().spawn(source.clone(), "  ");
        assert!(matches!(result, Err(ClientError::Validation(_))));
        assert_eq!(source.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_latest_keeps_only_last_status() {
        let source = Scripted::new(vec![
            Ok(run(PipelineStatus::Created)),
            Ok(run(PipelineStatus::Completed)),
        ]);
        let handle = StatusPoller::default()
            .spawn(source.clone(), "run-1")
            .unwrap();
        let rx = handle.subscribe();

        assert_eq!(handle.join().await, PollExit::Terminal);
        assert_eq!(
            rx.borrow().as_ref().map(|r| r.status),
            Some(PipelineStatus::Completed)
        );
    }
}
