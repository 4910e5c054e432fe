use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};
use media_timing::{ButtonClickOverlay, ClickOverlayConfig, Transcript};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tourify_client::{
    ApiClient, AspectRatio, ExportStatus, ExportStatusSource, GenerateOutcome, GmailExportTask,
    ImageItem, JsonFileStore, PipelineApi, PipelineSubmission, PipelineWatch, PlaybackCoordinator,
    SessionKeyStore, StatusPoller, Track, UploadStatus, UploadTracker, VideoState, Workflow,
    derive_video_state, keys, upload_all,
};
use tracing::{debug, info};

use crate::{
    config::AppConfig,
    error::{CliError, Result},
    output::{OutputManager, write_output},
    player::ProcessPlayback,
};

const SPINNER_TICK: Duration = Duration::from_millis(120);
const PLAYER_CHECK: Duration = Duration::from_millis(200);
const UPLOAD_REFRESH: Duration = Duration::from_millis(100);

pub struct CommandExecutor {
    config: AppConfig,
    api: ApiClient,
    store: Arc<JsonFileStore>,
    session: SessionKeyStore,
    output: OutputManager,
    output_file: Option<PathBuf>,
}

impl CommandExecutor {
    pub fn new(
        config: AppConfig,
        output: OutputManager,
        output_file: Option<PathBuf>,
    ) -> Result<Self> {
        let api = ApiClient::new(&config.client)?;
        let store = Arc::new(JsonFileStore::open(config.store_path()?)?);
        let session = SessionKeyStore::new(store.clone());
        debug!(base_url = %api.base_url(), store = %store.path().display(), "Executor ready");
        Ok(Self {
            config,
            api,
            store,
            session,
            output,
            output_file,
        })
    }

    fn emit(&self, content: &str) -> Result<()> {
        write_output(content, self.output_file.as_deref())
    }

    /// Human-facing notes go to stderr and are suppressed for JSON output.
    fn note(&self, text: &str) {
        if !self.output.format().is_json() {
            eprint!("{text}");
        }
    }

    fn spinner(&self, message: impl Into<String>) -> Result<ProgressBar> {
        if self.output.format().is_json() {
            return Ok(ProgressBar::hidden());
        }
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(ProgressStyle::with_template("{spinner:.cyan} {msg}")?);
        spinner.set_message(message.into());
        spinner.enable_steady_tick(SPINNER_TICK);
        Ok(spinner)
    }

    fn workflow(&self) -> Workflow {
        Workflow::new(
            Arc::new(self.api.clone()),
            StatusPoller::new(self.config.client.poll_interval()),
        )
    }

    pub async fn list_tracks(&self, play: &[String], preview_secs: u64) -> Result<()> {
        let tracks = self.api.list_tracks().await?;
        if play.is_empty() {
            return self.emit(&self.output.tracks(&tracks)?);
        }

        let coordinator = PlaybackCoordinator::new();
        let result = self
            .play_previews(&tracks, play, Duration::from_secs(preview_secs), &coordinator)
            .await;
        coordinator.stop();
        result
    }

    async fn play_previews(
        &self,
        tracks: &[Track],
        ids: &[String],
        length: Duration,
        coordinator: &PlaybackCoordinator,
    ) -> Result<()> {
        for id in ids {
            let track = tracks
                .iter()
                .find(|t| &t.id == id)
                .ok_or_else(|| CliError::invalid_input(format!("unknown track id: {id}")))?;
            let url = track.preview_url.as_deref().ok_or_else(|| {
                CliError::invalid_input(format!("track {id} has no preview audio"))
            })?;

            let playback = Arc::new(ProcessPlayback::spawn(&self.config.player, &track.id, url)?);
            coordinator.play(playback.clone());
            let spinner = self.spinner(format!("Playing {} ({})", track.title, track.id))?;

            let deadline = tokio::time::Instant::now() + length;
            let mut check = tokio::time::interval(PLAYER_CHECK);
            loop {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {
                        spinner.finish_and_clear();
                        return Err(CliError::Interrupted);
                    }
                    _ = tokio::time::sleep_until(deadline) => break,
                    _ = check.tick() => {
                        if playback.has_exited() {
                            debug!(track = %track.id, "Player exited");
                            break;
                        }
                    }
                }
            }
            spinner.finish_and_clear();
        }
        Ok(())
    }

    pub async fn import_listing(&self, url: &str) -> Result<()> {
        let import = self.api.import_realtor(url).await?;
        info!(images = import.images.len(), "Listing imported");
        self.emit(&self.output.realtor_import(&import)?)
    }

    pub async fn generate(
        &self,
        files: Vec<PathBuf>,
        listing: Option<&str>,
        track: Option<String>,
        aspect_ratio: Option<AspectRatio>,
        no_wait: bool,
    ) -> Result<()> {
        let store = self.store.as_ref();
        let session_key = self.session.get_or_create()?;

        let track_id = match track {
            Some(track) => track,
            None => keys::SELECTED_TRACK.load(store).ok_or_else(|| {
                CliError::invalid_input("no track selected; pass --track <ID> (see `tourify tracks`)")
            })?,
        };
        let aspect_ratio =
            aspect_ratio.unwrap_or_else(|| keys::SELECTED_ASPECT_RATIO.load(store));

        for file in &files {
            ensure_file(file)?;
        }
        let mut images: Vec<ImageItem> = files.into_iter().map(ImageItem::Local).collect();

        if let Some(listing) = listing {
            let import = self.api.import_realtor(listing).await?;
            let (usable, rejected): (Vec<_>, Vec<_>) = import
                .images
                .into_iter()
                .partition(|img| img.is_valid != Some(false));
            if !rejected.is_empty() {
                self.note(&self.output.warning(&format!(
                    "Skipping {} listing image(s) the importer flagged as invalid",
                    rejected.len()
                )));
            }
            images.extend(usable.into_iter().map(ImageItem::Remote));
        }

        keys::SELECTED_TRACK.save(store, &Some(track_id.clone()))?;
        keys::SELECTED_ASPECT_RATIO.save(store, &aspect_ratio)?;

        let submission = PipelineSubmission {
            session_key,
            track_id,
            aspect_ratio,
            images,
        };

        let workflow = self.workflow();
        let spinner = self.spinner(format!(
            "Submitting {} image(s)...",
            submission.images.len()
        ))?;
        let outcome = workflow.generate(&submission).await;
        let watch = match outcome {
            Ok(GenerateOutcome::Started(watch)) => watch,
            Ok(GenerateOutcome::Rejected(report)) => {
                spinner.finish_and_clear();
                keys::VALIDATED_IMAGES.save(store, &report.validated_images)?;
                self.emit(&self.output.validation_report(&report)?)?;
                return Err(CliError::Rejected {
                    invalid: report.invalid().count(),
                });
            }
            Err(e) => {
                spinner.finish_and_clear();
                return Err(e.into());
            }
        };
        keys::VALIDATED_IMAGES.clear(store)?;

        if no_wait {
            spinner.finish_and_clear();
            self.note(&self.output.success(&format!(
                "Started run {id}; follow it with `tourify status {id} --watch`",
                id = watch.id()
            )));
            return self.emit(&self.output.video_state(watch.id(), &watch.state())?);
        }

        let run_id = watch.id().to_string();
        let state = self.follow(&workflow, watch, spinner).await?;
        self.finish_video(&run_id, &state)
    }

    /// Follow a run to its end, showing each state on the spinner.
    async fn follow(
        &self,
        workflow: &Workflow,
        watch: PipelineWatch,
        spinner: ProgressBar,
    ) -> Result<VideoState> {
        let run_id = watch.id().to_string();
        spinner.set_message(format!("Run {run_id}: waiting for status..."));
        let progress = spinner.clone();

        tokio::select! {
            state = watch.wait(move |state| progress.set_message(format!("Run {run_id}: {state}"))) => {
                spinner.finish_and_clear();
                Ok(state)
            }
            _ = tokio::signal::ctrl_c() => {
                workflow.cancel();
                spinner.finish_and_clear();
                Err(CliError::Interrupted)
            }
        }
    }

    fn finish_video(&self, run_id: &str, state: &VideoState) -> Result<()> {
        self.emit(&self.output.video_state(run_id, state)?)?;
        match state {
            VideoState::Error { message } => Err(CliError::GenerationFailed(message.clone())),
            _ => Ok(()),
        }
    }

    pub async fn status(&self, run_id: &str, watch: bool) -> Result<()> {
        if watch {
            let workflow = self.workflow();
            let pipeline = workflow.watch(run_id)?;
            let spinner = self.spinner(format!("Run {run_id}"))?;
            let state = self.follow(&workflow, pipeline, spinner).await?;
            return self.finish_video(run_id, &state);
        }

        let run = self.api.get_pipeline(run_id).await?;
        let state = derive_video_state(false, Some(&run), None);
        self.emit(&self.output.run_state(&run, &state)?)
    }

    pub async fn list_runs(&self) -> Result<()> {
        let session_key = self.session.get_or_create()?;
        let runs = self.api.list_pipelines(&session_key).await?;
        self.emit(&self.output.runs(&runs)?)
    }

    pub async fn media_library(&self) -> Result<()> {
        let session_key = self.session.get_or_create()?;
        let items = self.api.fetch_media_library(&session_key).await?;
        self.emit(&self.output.media(&items)?)
    }

    pub async fn upload(&self, files: &[PathBuf]) -> Result<()> {
        let session_key = self.session.get_or_create()?;
        let tracker = UploadTracker::new();
        for file in files {
            ensure_file(file)?;
            tracker.add(file);
        }

        let (multi, bars) = self.upload_bars(&tracker)?;
        let upload = upload_all(&self.api, &tracker, &session_key);
        tokio::pin!(upload);
        let mut refresh = tokio::time::interval(UPLOAD_REFRESH);

        let summary = loop {
            tokio::select! {
                summary = &mut upload => break summary,
                _ = refresh.tick() => sync_bars(&tracker, &bars),
                _ = tokio::signal::ctrl_c() => {
                    multi.clear()?;
                    return Err(CliError::Interrupted);
                }
            }
        };
        sync_bars(&tracker, &bars);
        multi.clear()?;

        info!(succeeded = summary.succeeded, failed = summary.failed, "Uploads finished");
        self.emit(&self.output.uploads(&tracker.items())?)?;
        if summary.failed > 0 {
            return Err(CliError::UploadFailed {
                failed: summary.failed,
                total: summary.succeeded + summary.failed,
            });
        }
        Ok(())
    }

    fn upload_bars(
        &self,
        tracker: &UploadTracker,
    ) -> Result<(MultiProgress, HashMap<String, ProgressBar>)> {
        let multi = if self.output.format().is_json() {
            MultiProgress::with_draw_target(ProgressDrawTarget::hidden())
        } else {
            MultiProgress::new()
        };
        let style = ProgressStyle::with_template(
            "{prefix:30!} [{bar:30.cyan/blue}] {pos:>3}% {msg}",
        )?
        .progress_chars("=> ");

        let bars = tracker
            .items()
            .into_iter()
            .map(|item| {
                let bar = multi.add(ProgressBar::new(100));
                bar.set_style(style.clone());
                bar.set_prefix(
                    item.path
                        .file_name()
                        .map(|n| n.to_string_lossy().into_owned())
                        .unwrap_or_else(|| item.path.display().to_string()),
                );
                (item.id, bar)
            })
            .collect();
        Ok((multi, bars))
    }

    pub async fn split(&self, media_id: &str, commit: bool) -> Result<()> {
        let result = self.api.split_to_portrait(media_id, !commit).await?;
        self.emit(&self.output.split(&result)?)
    }

    pub async fn gmail_export(&self, email: Option<String>, no_wait: bool) -> Result<()> {
        let store = self.store.as_ref();
        let email = match email {
            Some(email) => email,
            None => keys::SESSION_EMAIL.load(store).ok_or_else(|| {
                CliError::invalid_input("no email given and none remembered from a previous export")
            })?,
        };
        let session_key = self.session.get_or_create()?;

        let task_id = self.api.start_gmail_export(&email, &session_key).await?;
        keys::SESSION_EMAIL.save(store, &Some(email.clone()))?;
        info!(task_id = %task_id, "Gmail export started");

        if no_wait {
            let task = GmailExportTask {
                task_id,
                status: ExportStatus::Pending,
                progress: None,
                result_url: None,
                error: None,
            };
            return self.emit(&self.output.export_task(&task)?);
        }

        let poller = StatusPoller::new(self.config.client.poll_interval());
        let mut handle = poller.spawn(Arc::new(ExportStatusSource(self.api.clone())), &task_id)?;
        let spinner = self.spinner(format!("Exporting to {email}..."))?;

        let mut last = None;
        loop {
            tokio::select! {
                next = handle.changed() => match next {
                    Some(task) => {
                        let progress = task.progress.map(|p| format!(" {p}%")).unwrap_or_default();
                        spinner.set_message(format!("Export {}{progress}", task.status.as_str()));
                        last = Some(task);
                    }
                    None => break,
                },
                _ = tokio::signal::ctrl_c() => {
                    spinner.finish_and_clear();
                    return Err(CliError::Interrupted);
                }
            }
        }
        spinner.finish_and_clear();

        let task = last
            .or_else(|| handle.latest())
            .ok_or_else(|| CliError::ExportFailed("no status received".into()))?;
        self.emit(&self.output.export_task(&task)?)?;
        if task.status == ExportStatus::Failure {
            return Err(CliError::ExportFailed(
                task.error.unwrap_or_else(|| "unknown error".into()),
            ));
        }
        Ok(())
    }

    pub fn transcript(
        &self,
        file: &Path,
        at: Option<f64>,
        plain: bool,
        normalize: bool,
    ) -> Result<()> {
        let content = std::fs::read_to_string(file)?;
        let mut transcript = media_timing::parse(&content)?;
        debug!(cues = transcript.cues.len(), "Transcript parsed");

        if normalize {
            return self.emit(&transcript.to_vtt());
        }
        if let Some(at) = at {
            if !(at.is_finite() && at >= 0.0) {
                return Err(CliError::invalid_input(format!(
                    "--at must be a non-negative number of seconds, got {at}"
                )));
            }
            let at = Duration::from_secs_f64(at);
            transcript = Transcript {
                header: transcript.header.clone(),
                cues: transcript.active_cues(at).cloned().collect(),
            };
        }
        if plain {
            let mut text = transcript.plain_text();
            text.push('\n');
            return self.emit(&text);
        }
        self.emit(&self.output.transcript(&transcript)?)
    }

    pub fn overlay(&self, at: f64, fps: f64, x: f64, y: f64) -> Result<()> {
        let config = ClickOverlayConfig::at_seconds(at, fps)?.with_position(x, y);
        let overlay = ButtonClickOverlay::new(config)?;
        let frames: Vec<_> = overlay.frames().collect();
        self.emit(&self.output.overlay_frames(&frames)?)
    }

    pub fn session(&self, reset: bool) -> Result<()> {
        if reset {
            keys::SESSION_KEY.clear(self.store.as_ref())?;
            info!("Session key cleared");
            self.note(&self.output.success("Session key cleared"));
            return Ok(());
        }
        let key = self.session.get_or_create()?;
        self.emit(&self.output.session_key(&key)?)
    }
}

fn ensure_file(path: &Path) -> Result<()> {
    if path.is_file() {
        Ok(())
    } else {
        Err(CliError::invalid_input(format!(
            "{} is not a readable file",
            path.display()
        )))
    }
}

fn sync_bars(tracker: &UploadTracker, bars: &HashMap<String, ProgressBar>) {
    for item in tracker.items() {
        let Some(bar) = bars.get(&item.id) else {
            continue;
        };
        if bar.is_finished() {
            continue;
        }
        bar.set_position(u64::from(item.progress));
        match item.status {
            UploadStatus::Success => bar.finish_with_message("done"),
            UploadStatus::Error => {
                bar.abandon_with_message(item.error.unwrap_or_else(|| "failed".into()))
            }
            UploadStatus::Pending | UploadStatus::Uploading => {}
        }
    }
}
