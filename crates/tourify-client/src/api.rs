//! REST binding for the DemoDrive backend.

use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::json;
use std::path::Path;
use tracing::{debug, instrument};
use url::Url;

use crate::config::ClientConfig;
use crate::error::{ClientError, Result};
use crate::http::build_client;
use crate::models::{
    GmailExportTask, MediaItem, PipelineRun, RealtorImport, SplitResult, Track,
};
use crate::retry::RetryPolicy;
use crate::upload::{
    MediaSink, PipelineSubmission, ProgressCallback, SubmitOutcome, build_form, file_part,
    interpret_submit_response, truncate,
};

/// The pipeline-run endpoints, the seam the workflow and poller are written against.
#[async_trait]
pub trait PipelineApi: Send + Sync {
    /// `POST /api/video-pipeline-runs/`
    async fn submit_pipeline(&self, submission: &PipelineSubmission) -> Result<SubmitOutcome>;

    /// `POST /api/video-pipeline-runs/{id}/run/`
    async fn run_pipeline(&self, id: &str) -> Result<PipelineRun>;

    /// `GET /api/video-pipeline-runs/{id}/`
    async fn get_pipeline(&self, id: &str) -> Result<PipelineRun>;

    /// `GET /api/video-pipeline-runs/`
    async fn list_pipelines(&self, session_key: &str) -> Result<Vec<PipelineRun>>;
}

/// DRF list endpoints answer either a bare array or a paginated envelope.
#[derive(Deserialize)]
#[serde(untagged)]
enum Listing<T> {
    Page { results: Vec<T> },
    Plain(Vec<T>),
}

impl<T> Listing<T> {
    fn into_vec(self) -> Vec<T> {
        match self {
            Listing::Page { results } => results,
            Listing::Plain(items) => items,
        }
    }
}

#[derive(Deserialize)]
struct ExportAccepted {
    task_id: String,
}

/// HTTP client for every endpoint the app consumes.
#[derive(Debug, Clone)]
pub struct ApiClient {
    client: Client,
    base: Url,
    media_retry: RetryPolicy,
}

impl ApiClient {
    pub fn new(config: &ClientConfig) -> Result<Self> {
        config.validate()?;
        let client = build_client(config)?;
        Self::with_client(client, &config.base_url, config.media_retry.clone())
    }

    /// Wrap an already built client.
    ///
    /// reqwest is compiled without a bundled TLS provider, so `client` must be
    /// built after [`crate::http::install_rustls_provider`] has run. [`build_client`] does
    /// that for you.
    pub fn with_client(client: Client, base_url: &str, media_retry: RetryPolicy) -> Result<Self> {
        let base = Url::parse(base_url)?;
        if base.cannot_be_a_base() {
            return Err(ClientError::config(format!(
                "base_url cannot be used as a base: {base_url}"
            )));
        }
        Ok(Self {
            client,
            base,
            media_retry,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    /// Join path segments onto the base URL. An empty last segment yields the
    /// trailing slash Django routes expect.
    pub fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        for segment in &segments[..segments.len().saturating_sub(1)] {
            if segment.is_empty() {
                return Err(ClientError::validation("empty path segment"));
            }
        }
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| ClientError::config("base_url cannot be used as a base"))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn decode<T: DeserializeOwned>(response: Response) -> Result<T> {
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(ClientError::status(status, truncate(&body)));
        }
        Ok(serde_json::from_str(&body)?)
    }

    /// `GET /api/tracks/`
    #[instrument(skip(self))]
    pub async fn list_tracks(&self) -> Result<Vec<Track>> {
        let url = self.endpoint(&["api", "tracks", ""])?;
        let response = self.client.get(url).send().await?;
        let listing: Listing<Track> = Self::decode(response).await?;
        Ok(listing.into_vec())
    }

    /// `POST /api/properties/realtor/`: import the photos of a listing page.
    #[instrument(skip(self))]
    pub async fn import_realtor(&self, listing_url: &str) -> Result<RealtorImport> {
        Url::parse(listing_url)?;
        let url = self.endpoint(&["api", "properties", "realtor", ""])?;
        let response = self
            .client
            .post(url)
            .json(&json!({ "url": listing_url }))
            .send()
            .await?;
        let import: RealtorImport = Self::decode(response).await?;
        debug!(images = import.images.len(), "Realtor listing imported");
        Ok(import)
    }

    /// `POST /api/gmail/export`: returns the background task id.
    #[instrument(skip(self))]
    pub async fn start_gmail_export(&self, email: &str, session_key: &str) -> Result<String> {
        if !email.contains('@') {
            return Err(ClientError::validation(format!("invalid email: {email}")));
        }
        let url = self.endpoint(&["api", "gmail", "export"])?;
        let response = self
            .client
            .post(url)
            .json(&json!({ "email": email, "session_key": session_key }))
            .send()
            .await?;
        let accepted: ExportAccepted = Self::decode(response).await?;
        Ok(accepted.task_id)
    }

    /// `GET /api/gmail/export/status/{task_id}/`
    pub async fn gmail_export_status(&self, task_id: &str) -> Result<GmailExportTask> {
        let url = self.endpoint(&["api", "gmail", "export", "status", task_id, ""])?;
        let response = self.client.get(url).send().await?;
        Self::decode(response).await
    }

    /// `POST /api/media/{id}/split_to_portrait/`. `preview = true` only
    /// computes the crops; `false` creates the portrait images.
    #[instrument(skip(self))]
    pub async fn split_to_portrait(&self, media_id: &str, preview: bool) -> Result<SplitResult> {
        let url = self.endpoint(&["api", "media", media_id, "split_to_portrait", ""])?;
        let response = self
            .client
            .post(url)
            .json(&json!({ "preview": preview }))
            .send()
            .await?;
        Self::decode(response).await
    }

    /// `GET /api/media/`, single attempt.
    pub async fn list_media(&self, session_key: &str) -> Result<Vec<MediaItem>> {
        let url = self.endpoint(&["api", "media", ""])?;
        let response = self
            .client
            .get(url)
            .query(&[("session_key", session_key)])
            .send()
            .await?;
        let listing: Listing<MediaItem> = Self::decode(response).await?;
        Ok(listing.into_vec())
    }

    /// The media library, retried per the configured fixed-delay policy.
    pub async fn fetch_media_library(&self, session_key: &str) -> Result<Vec<MediaItem>> {
        self.media_retry
            .run("media library", || self.list_media(session_key))
            .await
    }
}

#[async_trait]
impl PipelineApi for ApiClient {
    #[instrument(skip_all, fields(images = submission.images.len()))]
    async fn submit_pipeline(&self, submission: &PipelineSubmission) -> Result<SubmitOutcome> {
        submission.validate()?;
        let url = self.endpoint(&["api", "video-pipeline-runs", ""])?;
        let form = build_form(submission).await?;
        let response = self.client.post(url).multipart(form).send().await?;
        let status = response.status();
        let body = response.text().await?;
        interpret_submit_response(status, &body)
    }

    async fn run_pipeline(&self, id: &str) -> Result<PipelineRun> {
        let url = self.endpoint(&["api", "video-pipeline-runs", id, "run", ""])?;
        let response = self.client.post(url).send().await?;
        Self::decode(response).await
    }

    async fn get_pipeline(&self, id: &str) -> Result<PipelineRun> {
        let url = self.endpoint(&["api", "video-pipeline-runs", id, ""])?;
        let response = self.client.get(url).send().await?;
        Self::decode(response).await
    }

    async fn list_pipelines(&self, session_key: &str) -> Result<Vec<PipelineRun>> {
        let url = self.endpoint(&["api", "video-pipeline-runs", ""])?;
        let response = self
            .client
            .get(url)
            .query(&[("session_key", session_key)])
            .send()
            .await?;
        let listing: Listing<PipelineRun> = Self::decode(response).await?;
        Ok(listing.into_vec())
    }
}

#[async_trait]
impl MediaSink for ApiClient {
    async fn upload_media(
        &self,
        path: &Path,
        session_key: &str,
        progress: ProgressCallback,
    ) -> Result<MediaItem> {
        let url = self.endpoint(&["api", "media", ""])?;
        let form = reqwest::multipart::Form::new()
            .text("session_key", session_key.to_string())
            .part("file", file_part(path, Some(progress)).await?);
        let response = self.client.post(url).multipart(form).send().await?;
        Self::decode(response).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(base: &str) -> ApiClient {
        let http = build_client(&ClientConfig::default()).unwrap();
        ApiClient::with_client(http, base, RetryPolicy::default()).unwrap()
    }

    #[test]
    fn test_endpoint_trailing_slash() {
        let api = client("https://app.test");
        assert_eq!(
            api.endpoint(&["api", "video-pipeline-runs", "42", "run", ""])
                .unwrap()
                .as_str(),
            "https://app.test/api/video-pipeline-runs/42/run/"
        );
        assert_eq!(
            api.endpoint(&["api", "gmail", "export"]).unwrap().as_str(),
            "https://app.test/api/gmail/export"
        );
    }

    #[test]
    fn test_endpoint_keeps_base_path_and_escapes_ids() {
        let api = client("https://app.test/backend/");
        assert_eq!(
            api.endpoint(&["api", "media", "a b/c", ""]).unwrap().as_str(),
            "https://app.test/backend/api/media/a%20b%2Fc/"
        );
    }

    #[test]
    fn test_empty_id_is_rejected() {
        let api = client("https://app.test");
        assert!(matches!(
            api.endpoint(&["api", "video-pipeline-runs", "", ""]),
            Err(ClientError::Validation(_))
        ));
    }

    #[test]
    fn test_rejects_non_base_url() {
        let http = build_client(&ClientConfig::default()).unwrap();
        assert!(ApiClient::with_client(http, "mailto:a@b.c", RetryPolicy::default()).is_err());
    }

    #[test]
    fn test_new_installs_tls_provider() {
        let api = ApiClient::new(&ClientConfig::default()).unwrap();
        assert!(api.base_url().as_str().starts_with("http"));
    }

    #[test]
    fn test_listing_accepts_both_shapes() {
        let plain: Listing<Track> =
            serde_json::from_str(r#"[{"id": 1, "title": "Sunrise"}]"#).unwrap();
        assert_eq!(plain.into_vec().len(), 1);

        let page: Listing<Track> = serde_json::from_str(
            r#"{"count": 2, "next": null, "results": [{"id": 1, "name": "A"}, {"id": 2, "name": "B"}]}"#,
        )
        .unwrap();
        let tracks = page.into_vec();
        assert_eq!(tracks[1].title, "B");
    }
}
