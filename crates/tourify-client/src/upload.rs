//! Media upload orchestration.
//!
//! Two paths send images to the backend:
//!
//! - [`PipelineSubmission`] bundles local files and already-imported remote
//!   images into the single multipart request that creates a pipeline run.
//!   A `400` carrying `validatedImages` is a partial success, see
//!   [`interpret_submit_response`].
//! - [`upload_all`] pushes files into the visitor's media library one request
//!   per file, concurrently, with progress tracked per [`UploadItem`].

use async_trait::async_trait;
use bytes::Bytes;
use futures::{StreamExt, future::join_all};
use parking_lot::Mutex;
use reqwest::StatusCode;
use reqwest::multipart::{Form, Part};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::error::{ClientError, Result};
use crate::models::{AspectRatio, MediaItem, PipelineRun, PropertyImage, ValidationReport};

/// Chunk size used when streaming a file body.
const UPLOAD_CHUNK_SIZE: usize = 64 * 1024;

/// Largest error body kept in [`ClientError::Status`].
const MAX_ERROR_BODY: usize = 512;

/// One image going into a pipeline submission.
#[derive(Debug, Clone, PartialEq)]
pub enum ImageItem {
    /// File on local disk, sent as `media_files[n]`.
    Local(PathBuf),
    /// Image previously imported and validated server-side, sent by id.
    Remote(PropertyImage),
}

/// Everything needed to create a pipeline run.
#[derive(Debug, Clone)]
pub struct PipelineSubmission {
    pub session_key: String,
    pub track_id: String,
    pub aspect_ratio: AspectRatio,
    pub images: Vec<ImageItem>,
}

impl PipelineSubmission {
    pub fn validate(&self) -> Result<()> {
        if self.session_key.trim().is_empty() {
            return Err(ClientError::validation("session key is empty"));
        }
        if self.track_id.trim().is_empty() {
            return Err(ClientError::validation("no music track selected"));
        }
        if self.images.is_empty() {
            return Err(ClientError::validation("at least one image is required"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FormValue {
    Text(String),
    File(PathBuf),
}

/// A multipart field before any file is read.
#[derive(Debug, Clone, PartialEq)]
pub struct FormField {
    pub name: String,
    pub value: FormValue,
}

impl FormField {
    fn text(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: FormValue::Text(value.into()),
        }
    }
}

/// Lay out the multipart fields of a submission, in wire order.
pub fn form_fields(submission: &PipelineSubmission) -> Vec<FormField> {
    let mut fields = vec![
        FormField::text("session_key", &submission.session_key),
        FormField::text("track_id", &submission.track_id),
        FormField::text("aspect_ratio", submission.aspect_ratio.as_str()),
    ];

    let local = submission.images.iter().filter_map(|img| match img {
        ImageItem::Local(path) => Some(path),
        ImageItem::Remote(_) => None,
    });
    for (n, path) in local.enumerate() {
        fields.push(FormField {
            name: format!("media_files[{n}]"),
            value: FormValue::File(path.clone()),
        });
    }

    for img in &submission.images {
        if let ImageItem::Remote(remote) = img {
            fields.push(FormField::text("property_image_ids", &remote.id));
        }
    }

    fields
}

/// Read the submission's files and assemble the multipart form.
pub async fn build_form(submission: &PipelineSubmission) -> Result<Form> {
    let mut form = Form::new();
    for field in form_fields(submission) {
        form = match field.value {
            FormValue::Text(text) => form.text(field.name, text),
            FormValue::File(path) => form.part(field.name, file_part(&path, None).await?),
        };
    }
    Ok(form)
}

/// Called with `(bytes_sent, total_bytes)` as the body is streamed out.
pub type ProgressCallback = Arc<dyn Fn(u64, u64) + Send + Sync>;

/// Build a streamed multipart part for `path`, reporting progress per chunk.
pub(crate) async fn file_part(path: &Path, progress: Option<ProgressCallback>) -> Result<Part> {
    let data = Bytes::from(tokio::fs::read(path).await?);
    let total = data.len() as u64;
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "upload".to_string());
    let mime = mime_guess::from_path(path).first_or_octet_stream();

    let chunks: Vec<Bytes> = (0..data.len())
        .step_by(UPLOAD_CHUNK_SIZE)
        .map(|start| data.slice(start..(start + UPLOAD_CHUNK_SIZE).min(data.len())))
        .collect();

    let mut sent = 0u64;
    let stream = futures::stream::iter(chunks).map(move |chunk| {
        sent += chunk.len() as u64;
        if let Some(cb) = &progress {
            cb(sent, total);
        }
        Ok::<_, std::io::Error>(chunk)
    });

    let part = Part::stream_with_length(reqwest::Body::wrap_stream(stream), total)
        .file_name(file_name)
        .mime_str(mime.as_ref())?;
    Ok(part)
}

/// What creating a pipeline run produced.
#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    Created(PipelineRun),
    /// The backend rejected some images; nothing was created.
    ValidationFailed(ValidationReport),
}

/// Map the submission response onto an outcome.
///
/// A `400` whose body carries `validatedImages` (top-level or under `data`)
/// is returned as [`SubmitOutcome::ValidationFailed`] so callers can mark
/// individual images. Every other non-success status is an error.
pub fn interpret_submit_response(status: StatusCode, body: &str) -> Result<SubmitOutcome> {
    if status.is_success() {
        let run: PipelineRun = serde_json::from_str(body)?;
        return Ok(SubmitOutcome::Created(run));
    }

    if status == StatusCode::BAD_REQUEST
        && let Ok(value) = serde_json::from_str::<serde_json::Value>(body)
    {
        let payload = if value.get("validatedImages").is_some() {
            Some(&value)
        } else {
            value.get("data").filter(|d| d.get("validatedImages").is_some())
        };

        if let Some(payload) = payload {
            let mut report: ValidationReport = serde_json::from_value(payload.clone())?;
            if report.message.is_none() {
                report.message = ["message", "error", "detail"]
                    .iter()
                    .find_map(|key| value.get(key).and_then(|m| m.as_str()))
                    .map(String::from);
            }
            debug!(
                invalid = report.invalid().count(),
                total = report.validated_images.len(),
                "Submission rejected by image validation"
            );
            return Ok(SubmitOutcome::ValidationFailed(report));
        }
    }

    Err(ClientError::status(status, truncate(body)))
}

pub(crate) fn truncate(body: &str) -> String {
    if body.len() <= MAX_ERROR_BODY {
        return body.to_string();
    }
    let mut end = MAX_ERROR_BODY;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}…", &body[..end])
}

/// Destination for single-file media library uploads.
#[async_trait]
pub trait MediaSink: Send + Sync {
    async fn upload_media(
        &self,
        path: &Path,
        session_key: &str,
        progress: ProgressCallback,
    ) -> Result<MediaItem>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadStatus {
    Pending,
    Uploading,
    Success,
    Error,
}

/// Client-side record of one file being uploaded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadItem {
    pub id: String,
    pub path: PathBuf,
    /// 0..=100, never decreasing while uploading.
    pub progress: u8,
    pub status: UploadStatus,
    pub error: Option<String>,
    pub media: Option<MediaItem>,
}

/// Shared list of upload items, updated from concurrent uploads.
#[derive(Debug, Clone, Default)]
pub struct UploadTracker {
    items: Arc<Mutex<Vec<UploadItem>>>,
}

impl UploadTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a file and return its item id.
    pub fn add(&self, path: impl Into<PathBuf>) -> String {
        let id = uuid::Uuid::new_v4().to_string();
        self.items.lock().push(UploadItem {
            id: id.clone(),
            path: path.into(),
            progress: 0,
            status: UploadStatus::Pending,
            error: None,
            media: None,
        });
        id
    }

    fn update(&self, id: &str, f: impl FnOnce(&mut UploadItem)) {
        if let Some(item) = self.items.lock().iter_mut().find(|i| i.id == id) {
            f(item);
        }
    }

    pub fn start(&self, id: &str) {
        self.update(id, |item| {
            if item.status == UploadStatus::Pending {
                item.status = UploadStatus::Uploading;
            }
        });
    }

    /// Record transfer progress. Values are capped at 99 until the server
    /// confirms the upload, and regressions are ignored.
    pub fn set_progress(&self, id: &str, percent: u8) {
        self.update(id, |item| {
            if item.status == UploadStatus::Pending {
                item.status = UploadStatus::Uploading;
            }
            if item.status != UploadStatus::Uploading {
                return;
            }
            let capped = percent.min(99);
            if capped > item.progress {
                item.progress = capped;
            }
        });
    }

    pub fn complete(&self, id: &str, media: MediaItem) {
        self.update(id, |item| {
            item.status = UploadStatus::Success;
            item.progress = 100;
            item.error = None;
            item.media = Some(media);
        });
    }

    pub fn fail(&self, id: &str, error: impl Into<String>) {
        let error = error.into();
        self.update(id, |item| {
            item.status = UploadStatus::Error;
            item.error = Some(error);
        });
    }

    /// Drop an item regardless of its state.
    pub fn remove(&self, id: &str) -> bool {
        let mut items = self.items.lock();
        let before = items.len();
        items.retain(|i| i.id != id);
        items.len() != before
    }

    /// Drop every successfully uploaded item, returning how many were removed.
    pub fn clear_completed(&self) -> usize {
        let mut items = self.items.lock();
        let before = items.len();
        items.retain(|i| i.status != UploadStatus::Success);
        before - items.len()
    }

    pub fn get(&self, id: &str) -> Option<UploadItem> {
        self.items.lock().iter().find(|i| i.id == id).cloned()
    }

    pub fn items(&self) -> Vec<UploadItem> {
        self.items.lock().clone()
    }

    fn pending(&self) -> Vec<(String, PathBuf)> {
        self.items
            .lock()
            .iter()
            .filter(|i| i.status == UploadStatus::Pending)
            .map(|i| (i.id.clone(), i.path.clone()))
            .collect()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UploadSummary {
    pub succeeded: usize,
    pub failed: usize,
}

fn percent(sent: u64, total: u64) -> u8 {
    if total == 0 {
        return 100;
    }
    ((sent.min(total) * 100) / total) as u8
}

/// Upload every pending item concurrently.
pub async fn upload_all(
    sink: &dyn MediaSink,
    tracker: &UploadTracker,
    session_key: &str,
) -> UploadSummary {
    let pending = tracker.pending();
    info!(count = pending.len(), "Uploading media files");

    let uploads = pending.into_iter().map(|(id, path)| {
        let tracker = tracker.clone();
        async move {
            tracker.start(&id);
            let progress: ProgressCallback = {
                let tracker = tracker.clone();
                let id = id.clone();
                Arc::new(move |sent, total| tracker.set_progress(&id, percent(sent, total)))
            };
            match sink.upload_media(&path, session_key, progress).await {
                Ok(media) => {
                    debug!(path = %path.display(), media_id = %media.id, "Upload finished");
                    tracker.complete(&id, media);
                    true
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Upload failed");
                    tracker.fail(&id, e.to_string());
                    false
                }
            }
        }
    });

    let results = join_all(uploads).await;
    let succeeded = results.iter().filter(|ok| **ok).count();
    UploadSummary {
        succeeded,
        failed: results.len() - succeeded,
    }
}
