//! Tour generation workflow: submit, start rendering, follow the run.

use parking_lot::Mutex;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::api::PipelineApi;
use crate::error::Result;
use crate::models::{PipelineRun, ValidationReport};
use crate::poller::{PollHandle, RunStatusSource, StatusPoller};
use crate::preview::{LocalVideo, VideoState, derive_video_state};
use crate::upload::{PipelineSubmission, SubmitOutcome};

/// Result of [`Workflow::generate`].
#[derive(Debug)]
pub enum GenerateOutcome {
    /// Image validation rejected the submission; nothing is rendering.
    Rejected(ValidationReport),
    Started(PipelineWatch),
}

/// Drives one pipeline at a time. Starting a new generation or watch cancels
/// the poll of the previous one.
pub struct Workflow {
    api: Arc<dyn PipelineApi>,
    poller: StatusPoller,
    active: Mutex<Option<CancellationToken>>,
    last_video: Arc<Mutex<Option<LocalVideo>>>,
}

impl Workflow {
    pub fn new(api: Arc<dyn PipelineApi>, poller: StatusPoller) -> Self {
        Self {
            api,
            poller,
            active: Mutex::new(None),
            last_video: Arc::new(Mutex::new(None)),
        }
    }

    /// Submit the images, trigger rendering and start polling the run.
    pub async fn generate(&self, submission: &PipelineSubmission) -> Result<GenerateOutcome> {
        let created = match self.api.submit_pipeline(submission).await? {
            SubmitOutcome::Created(run) => run,
            SubmitOutcome::ValidationFailed(report) => {
                info!(
                    invalid = report.invalid().count(),
                    "Submission rejected, no run started"
                );
                return Ok(GenerateOutcome::Rejected(report));
            }
        };
        info!(run_id = %created.id, status = %created.status, "Pipeline run created");

        let started = self.api.run_pipeline(&created.id).await?;
        debug!(run_id = %started.id, status = %started.status, "Rendering triggered");

        Ok(GenerateOutcome::Started(self.watch(&started.id)?))
    }

    /// Follow an existing run.
    pub fn watch(&self, run_id: &str) -> Result<PipelineWatch> {
        let token = CancellationToken::new();
        let source = Arc::new(RunStatusSource(self.api.clone()));
        // A rejected id leaves the current poll running.
        let handle = self.poller.spawn_with_token(source, run_id, token.clone())?;

        if let Some(previous) = self.active.lock().replace(token) {
            debug!("Superseding previous pipeline poll");
            previous.cancel();
        }
        Ok(PipelineWatch {
            id: run_id.to_string(),
            handle,
            last_video: self.last_video.clone(),
        })
    }

    /// The most recent video a watch saw complete.
    pub fn last_video(&self) -> Option<LocalVideo> {
        self.last_video.lock().clone()
    }

    /// Stop following whatever run is active.
    pub fn cancel(&self) {
        if let Some(token) = self.active.lock().take() {
            token.cancel();
        }
    }
}

/// A run being followed, exposed as preview states.
#[derive(Debug)]
pub struct PipelineWatch {
    id: String,
    handle: PollHandle<PipelineRun>,
    last_video: Arc<Mutex<Option<LocalVideo>>>,
}

impl PipelineWatch {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn latest_run(&self) -> Option<PipelineRun> {
        self.handle.latest()
    }

    /// Current preview state. `LOADING` until the first status arrives.
    pub fn state(&self) -> VideoState {
        let run = self.handle.latest();
        let loading = run.is_none() && !self.handle.is_finished();
        let local = self.last_video.lock().clone();
        derive_video_state(loading, run.as_ref(), local.as_ref())
    }

    /// Wait for the next status and derive its state. `None` once polling ended.
    pub async fn next_state(&mut self) -> Option<VideoState> {
        let run = self.handle.changed().await?;
        let local = self.last_video.lock().clone();
        let state = derive_video_state(false, Some(&run), local.as_ref());
        if let VideoState::Ready(video) = &state {
            *self.last_video.lock() = Some(LocalVideo {
                video_url: video.video_url.clone(),
                thumbnail_url: video.thumbnail_url.clone(),
            });
        }
        Some(state)
    }

    /// Follow the run to the end, reporting every state, and return the last one.
    pub async fn wait(mut self, mut on_state: impl FnMut(&VideoState)) -> VideoState {
        let mut last = None;
        while let Some(state) = self.next_state().await {
            on_state(&state);
            last = Some(state);
        }
        last.unwrap_or_else(|| self.state())
    }

    pub fn cancel(&self) {
        self.handle.cancel();
    }
}
