//! Video preview state derivation.
//!
//! [`derive_video_state`] folds everything the preview pane knows about a
//! generation into exactly one [`VideoState`]. It is a pure function; the
//! workflow and the CLI call it on every poll update.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::models::{PipelineRun, PipelineStatus};

pub const DEFAULT_FAILURE_MESSAGE: &str = "Video generation failed";
pub const MISSING_VIDEO_MESSAGE: &str = "Video completed without a video URL";

/// A video generated earlier in this session, kept locally.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalVideo {
    pub video_url: String,
    pub thumbnail_url: Option<String>,
}

/// A playable result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadyVideo {
    pub video_url: String,
    pub thumbnail_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VideoState {
    /// The status request itself is in flight.
    Loading,
    Preparing,
    Processing,
    Error { message: String },
    Ready(ReadyVideo),
    /// Nothing generated yet.
    Initial,
}

impl VideoState {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Loading => "LOADING",
            Self::Preparing => "PREPARING",
            Self::Processing => "PROCESSING",
            Self::Error { .. } => "ERROR",
            Self::Ready(_) => "READY",
            Self::Initial => "INITIAL",
        }
    }
}

impl fmt::Display for VideoState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Error { message } => write!(f, "ERROR: {message}"),
            Self::Ready(video) => write!(f, "READY: {}", video.video_url),
            other => f.write_str(other.name()),
        }
    }
}

/// Derive the preview state.
///
/// Precedence: `loading`; then nothing known at all (`INITIAL`); then the
/// pipeline status; finally whatever local video exists.
pub fn derive_video_state(
    loading: bool,
    pipeline: Option<&PipelineRun>,
    local: Option<&LocalVideo>,
) -> VideoState {
    if loading {
        return VideoState::Loading;
    }
    if pipeline.is_none() && local.is_none() {
        return VideoState::Initial;
    }

    if let Some(run) = pipeline {
        match run.status {
            PipelineStatus::Created | PipelineStatus::Pending => return VideoState::Preparing,
            PipelineStatus::Processing => return VideoState::Processing,
            PipelineStatus::Failed => {
                let message = run
                    .error_message
                    .as_deref()
                    .filter(|m| !m.trim().is_empty())
                    .unwrap_or(DEFAULT_FAILURE_MESSAGE);
                return VideoState::Error {
                    message: message.to_string(),
                };
            }
            PipelineStatus::Completed => {
                return match run.video_url() {
                    Some(url) => VideoState::Ready(ReadyVideo {
                        video_url: url.to_string(),
                        thumbnail_url: run.render.thumbnail_url.clone(),
                    }),
                    None => VideoState::Error {
                        message: MISSING_VIDEO_MESSAGE.to_string(),
                    },
                };
            }
            PipelineStatus::Unknown => {}
        }
    }

    match local {
        Some(video) => VideoState::Ready(ReadyVideo {
            video_url: video.video_url.clone(),
            thumbnail_url: video.thumbnail_url.clone(),
        }),
        None => VideoState::Initial,
    }
}
