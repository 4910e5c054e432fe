//! Tourify: client for the DemoDrive property-tour video pipeline.
//!
//! The backend validates images, renders videos and runs exports; this crate
//! drives it over REST.
//!
//! ## Core Types
//!
//! - [`ApiClient`] - HTTP binding for every endpoint
//! - [`PipelineApi`] - The pipeline-run endpoints as a trait
//! - [`PipelineRun`] / [`PipelineStatus`] - Server-side run records
//!
//! ## Orchestration
//!
//! - [`StatusPoller`] - Fixed-interval polling until a terminal status
//! - [`PipelineSubmission`] / [`upload_all`] - Multipart submission and media uploads
//! - [`derive_video_state`] - Preview state derivation
//! - [`Workflow`] - Submit, render and follow a run
//!
//! ## Local State
//!
//! - [`SessionKeyStore`] - Anonymous visitor id
//! - [`KeyValueStore`] / [`TypedKey`] - Typed preference storage
//! - [`PlaybackCoordinator`] - One audio preview at a time

pub mod api;
pub mod config;
pub mod error;
pub mod http;
pub mod models;
pub mod playback;
pub mod poller;
pub mod preview;
pub mod retry;
pub mod session;
pub mod store;
pub mod upload;
pub mod workflow;

pub use api::{ApiClient, PipelineApi};
pub use config::ClientConfig;
pub use error::{ClientError, Result};
pub use models::{
    AspectRatio, CropFrame, ExportStatus, GmailExportTask, MediaItem, PipelineRun, PipelineStatus,
    PropertyImage, RealtorImport, RenderOutput, SplitResult, Track, ValidatedImage,
    ValidationReport,
};
pub use playback::{Playback, PlaybackCoordinator};
pub use poller::{
    DEFAULT_POLL_INTERVAL, ExportStatusSource, PollExit, PollHandle, PollStatus, RunStatusSource,
    StatusPoller, StatusSource,
};
pub use preview::{LocalVideo, ReadyVideo, VideoState, derive_video_state};
pub use retry::RetryPolicy;
pub use session::SessionKeyStore;
pub use store::{JsonFileStore, KeyValueStore, MemoryStore, TypedKey, keys};
pub use upload::{
    ImageItem, MediaSink, PipelineSubmission, SubmitOutcome, UploadItem, UploadStatus,
    UploadSummary, UploadTracker, upload_all,
};
pub use workflow::{GenerateOutcome, PipelineWatch, Workflow};
