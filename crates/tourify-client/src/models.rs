//! Wire models returned by the pipeline backend.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ClientError;

/// Status of a video pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PipelineStatus {
    Created,
    Pending,
    Processing,
    Completed,
    Failed,
    /// Any status string this client does not know about.
    #[serde(other)]
    Unknown,
}

impl PipelineStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Unknown => "unknown",
        }
    }

    /// `completed` and `failed` are final; the backend never moves a run out of them.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl fmt::Display for PipelineStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Output frame shape requested for the rendered tour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum AspectRatio {
    #[default]
    #[serde(rename = "16:9")]
    Landscape,
    #[serde(rename = "9:16")]
    Portrait,
    #[serde(rename = "1:1")]
    Square,
}

impl AspectRatio {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Landscape => "16:9",
            Self::Portrait => "9:16",
            Self::Square => "1:1",
        }
    }
}

impl fmt::Display for AspectRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AspectRatio {
    type Err = ClientError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "16:9" | "landscape" => Ok(Self::Landscape),
            "9:16" | "portrait" => Ok(Self::Portrait),
            "1:1" | "square" => Ok(Self::Square),
            other => Err(ClientError::validation(format!(
                "unsupported aspect ratio: {other}"
            ))),
        }
    }
}

/// Rendered video produced by a completed run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RenderOutput {
    #[serde(default)]
    pub video_url: Option<String>,
    #[serde(default)]
    pub thumbnail_url: Option<String>,
    #[serde(default)]
    pub aspect_ratio: Option<AspectRatio>,
}

/// Per-image validity as reported by the backend's image validator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidatedImage {
    #[serde(default, deserialize_with = "deserialize_opt_id")]
    pub id: Option<String>,
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(alias = "isValid", alias = "valid")]
    pub is_valid: bool,
    #[serde(default, alias = "error", alias = "message")]
    pub reason: Option<String>,
}

/// A server-side video pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineRun {
    #[serde(deserialize_with = "deserialize_id")]
    pub id: String,
    pub status: PipelineStatus,
    #[serde(default, alias = "error")]
    pub error_message: Option<String>,
    #[serde(flatten)]
    pub render: RenderOutput,
    #[serde(default, rename = "validatedImages", alias = "validated_images")]
    pub validated_images: Vec<ValidatedImage>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl PipelineRun {
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    pub fn video_url(&self) -> Option<&str> {
        self.render.video_url.as_deref().filter(|u| !u.is_empty())
    }
}

/// Validation payload returned alongside a rejected submission.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(rename = "validatedImages")]
    pub validated_images: Vec<ValidatedImage>,
}

impl ValidationReport {
    pub fn invalid(&self) -> impl Iterator<Item = &ValidatedImage> {
        self.validated_images.iter().filter(|img| !img.is_valid)
    }

    pub fn all_valid(&self) -> bool {
        self.validated_images.iter().all(|img| img.is_valid)
    }
}

/// Background music track.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Track {
    #[serde(deserialize_with = "deserialize_id")]
    pub id: String,
    #[serde(alias = "name")]
    pub title: String,
    #[serde(default)]
    pub artist: Option<String>,
    #[serde(default, alias = "url", alias = "audio_url")]
    pub preview_url: Option<String>,
    #[serde(default)]
    pub duration: Option<f64>,
}

/// Image reference extracted from a third-party listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyImage {
    #[serde(deserialize_with = "deserialize_id")]
    pub id: String,
    pub url: String,
    #[serde(default, alias = "isValid")]
    pub is_valid: Option<bool>,
    #[serde(default)]
    pub reason: Option<String>,
}

/// Response of the realtor listing import.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RealtorImport {
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub images: Vec<PropertyImage>,
}

/// Image stored in the visitor's media library.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaItem {
    #[serde(deserialize_with = "deserialize_id")]
    pub id: String,
    #[serde(alias = "file")]
    pub url: String,
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default)]
    pub content_type: Option<String>,
}

/// One portrait crop proposed for a landscape image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CropFrame {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Result of `split_to_portrait`; previews fill `frames`/`previews`, commits fill `media`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SplitResult {
    #[serde(default)]
    pub frames: Vec<CropFrame>,
    #[serde(default, alias = "preview_urls")]
    pub previews: Vec<String>,
    #[serde(default)]
    pub media: Vec<MediaItem>,
}

/// State of a Gmail export background task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ExportStatus {
    #[serde(alias = "pending")]
    Pending,
    #[serde(alias = "started")]
    Started,
    #[serde(alias = "progress")]
    Progress,
    #[serde(alias = "success")]
    Success,
    #[serde(alias = "failure")]
    Failure,
    #[serde(other)]
    Unknown,
}

impl ExportStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Started => "STARTED",
            Self::Progress => "PROGRESS",
            Self::Success => "SUCCESS",
            Self::Failure => "FAILURE",
            Self::Unknown => "UNKNOWN",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Success | Self::Failure)
    }
}

/// Gmail export task snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GmailExportTask {
    #[serde(deserialize_with = "deserialize_id")]
    pub task_id: String,
    #[serde(alias = "state")]
    pub status: ExportStatus,
    #[serde(default)]
    pub progress: Option<u8>,
    #[serde(default, alias = "url", alias = "result")]
    pub result_url: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

struct IdVisitor;

impl<'de> serde::de::Visitor<'de> for IdVisitor {
    type Value = String;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("a string or integer identifier")
    }

    fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
    where
        E: serde::de::Error,
    {
        Ok(v.to_string())
    }

    fn visit_string<E>(self, v: String) -> Result<Self::Value, E>
    where
        E: serde::de::Error,
    {
        Ok(v)
    }

    fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E>
    where
        E: serde::de::Error,
    {
        Ok(v.to_string())
    }

    fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E>
    where
        E: serde::de::Error,
    {
        Ok(v.to_string())
    }
}

/// Django serializers hand out integer primary keys on some models and UUIDs on others.
fn deserialize_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    deserializer.deserialize_any(IdVisitor)
}

fn deserialize_opt_id<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    match value {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(serde_json::Value::String(s)) => Ok(Some(s)),
        Some(serde_json::Value::Number(n)) => Ok(Some(n.to_string())),
        Some(other) => Err(serde::de::Error::custom(format!(
            "expected string or integer id, got {other}"
        ))),
    }
}
