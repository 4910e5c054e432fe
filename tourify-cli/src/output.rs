use crate::{cli::OutputFormat, error::Result};
#[cfg(feature = "colored-output")]
use colored::*;
use media_timing::{OverlayFrame, Transcript, format_timestamp};
use serde::Serialize;
use std::borrow::Cow;
use std::io::Write;
#[cfg(feature = "table-output")]
use tabled::{builder::Builder, settings::Style};
use tourify_client::{
    GmailExportTask, MediaItem, PipelineRun, RealtorImport, SplitResult, Track, UploadItem,
    ValidationReport, VideoState,
};

/// Column headers plus one row of cells per record.
struct Rows {
    headers: &'static [&'static str],
    records: Vec<Vec<String>>,
}

impl Rows {
    fn new(headers: &'static [&'static str]) -> Self {
        Self {
            headers,
            records: Vec::new(),
        }
    }

    fn push(&mut self, record: Vec<String>) {
        debug_assert_eq!(record.len(), self.headers.len());
        self.records.push(record);
    }
}

fn opt(value: Option<&str>) -> String {
    value.unwrap_or_default().to_string()
}

pub struct OutputManager {
    format: OutputFormat,
    colored: bool,
}

impl OutputManager {
    pub fn new(format: OutputFormat, colored: bool) -> Self {
        Self { format, colored }
    }

    pub fn format(&self) -> OutputFormat {
        self.format
    }

    pub fn tracks(&self, tracks: &[Track]) -> Result<String> {
        let mut rows = Rows::new(&["ID", "Title", "Artist", "Duration", "Preview"]);
        for track in tracks {
            rows.push(vec![
                track.id.clone(),
                track.title.clone(),
                opt(track.artist.as_deref()),
                track
                    .duration
                    .map(|d| format!("{d:.0}s"))
                    .unwrap_or_default(),
                opt(track.preview_url.as_deref()),
            ]);
        }
        self.render(tracks, "Tracks", rows)
    }

    pub fn realtor_import(&self, import: &RealtorImport) -> Result<String> {
        let mut rows = Rows::new(&["ID", "URL", "Valid", "Reason"]);
        for image in &import.images {
            rows.push(vec![
                image.id.clone(),
                image.url.clone(),
                image.is_valid.map(|v| v.to_string()).unwrap_or_default(),
                opt(image.reason.as_deref()),
            ]);
        }
        let title = match &import.address {
            Some(address) => Cow::Owned(format!("Imported images for {address}")),
            None => Cow::Borrowed("Imported images"),
        };
        self.render(import, &title, rows)
    }

    pub fn runs(&self, runs: &[PipelineRun]) -> Result<String> {
        let mut rows = Rows::new(&["ID", "Status", "Created", "Video", "Error"]);
        for run in runs {
            rows.push(Self::run_record(run));
        }
        self.render(runs, "Pipeline runs", rows)
    }

    fn run_record(run: &PipelineRun) -> Vec<String> {
        vec![
            run.id.clone(),
            run.status.to_string(),
            run.created_at
                .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
                .unwrap_or_default(),
            opt(run.video_url()),
            opt(run.error_message.as_deref()),
        ]
    }

    /// One run together with the preview state derived from it.
    pub fn run_state(&self, run: &PipelineRun, state: &VideoState) -> Result<String> {
        #[derive(Serialize)]
        struct RunView<'a> {
            run: &'a PipelineRun,
            preview: &'a VideoState,
        }

        let mut rows = Rows::new(&["ID", "Status", "Created", "Video", "Error", "Preview"]);
        let mut record = Self::run_record(run);
        record.push(state.name().to_string());
        rows.push(record);
        self.render(
            &RunView {
                run,
                preview: state,
            },
            "Pipeline run",
            rows,
        )
    }

    pub fn video_state(&self, run_id: &str, state: &VideoState) -> Result<String> {
        #[derive(Serialize)]
        struct StateView<'a> {
            run_id: &'a str,
            #[serde(flatten)]
            state: &'a VideoState,
        }

        let mut rows = Rows::new(&["Run", "State", "Video", "Message"]);
        let (video, message) = match state {
            VideoState::Ready(video) => (video.video_url.clone(), String::new()),
            VideoState::Error { message } => (String::new(), message.clone()),
            _ => (String::new(), String::new()),
        };
        rows.push(vec![
            run_id.to_string(),
            state.name().to_string(),
            video,
            message,
        ]);
        self.render(&StateView { run_id, state }, "Video", rows)
    }

    pub fn validation_report(&self, report: &ValidationReport) -> Result<String> {
        let mut rows = Rows::new(&["Image", "Valid", "Reason"]);
        for image in &report.validated_images {
            rows.push(vec![
                image
                    .filename
                    .clone()
                    .or_else(|| image.id.clone())
                    .unwrap_or_default(),
                image.is_valid.to_string(),
                opt(image.reason.as_deref()),
            ]);
        }
        let title = report
            .message
            .as_deref()
            .unwrap_or("Some images failed validation");
        self.render(report, title, rows)
    }

    pub fn media(&self, items: &[MediaItem]) -> Result<String> {
        let mut rows = Rows::new(&["ID", "Filename", "Type", "URL"]);
        for item in items {
            rows.push(vec![
                item.id.clone(),
                opt(item.filename.as_deref()),
                opt(item.content_type.as_deref()),
                item.url.clone(),
            ]);
        }
        self.render(items, "Media library", rows)
    }

    pub fn uploads(&self, items: &[UploadItem]) -> Result<String> {
        let mut rows = Rows::new(&["File", "Status", "Progress", "Media", "Error"]);
        for item in items {
            rows.push(vec![
                item.path.display().to_string(),
                format!("{:?}", item.status).to_lowercase(),
                format!("{}%", item.progress),
                item.media.as_ref().map(|m| m.id.clone()).unwrap_or_default(),
                opt(item.error.as_deref()),
            ]);
        }
        self.render(items, "Uploads", rows)
    }

    pub fn split(&self, result: &SplitResult) -> Result<String> {
        let mut rows = Rows::new(&["Kind", "Frame", "URL"]);
        for (i, frame) in result.frames.iter().enumerate() {
            rows.push(vec![
                "crop".to_string(),
                format!("{}x{}+{}+{}", frame.width, frame.height, frame.x, frame.y),
                result.previews.get(i).cloned().unwrap_or_default(),
            ]);
        }
        for media in &result.media {
            rows.push(vec!["saved".to_string(), media.id.clone(), media.url.clone()]);
        }
        self.render(result, "Portrait split", rows)
    }

    pub fn export_task(&self, task: &GmailExportTask) -> Result<String> {
        let mut rows = Rows::new(&["Task", "Status", "Progress", "Result", "Error"]);
        rows.push(vec![
            task.task_id.clone(),
            task.status.as_str().to_string(),
            task.progress.map(|p| format!("{p}%")).unwrap_or_default(),
            opt(task.result_url.as_deref()),
            opt(task.error.as_deref()),
        ]);
        self.render(task, "Gmail export", rows)
    }

    pub fn transcript(&self, transcript: &Transcript) -> Result<String> {
        let mut rows = Rows::new(&["Start", "End", "ID", "Text"]);
        for cue in &transcript.cues {
            rows.push(vec![
                format_timestamp(cue.start),
                format_timestamp(cue.end),
                opt(cue.id.as_deref()),
                cue.plain_text().replace('\n', " "),
            ]);
        }
        let title = format!(
            "Transcript ({} cues, {})",
            transcript.cues.len(),
            format_timestamp(transcript.duration())
        );
        self.render(transcript, &title, rows)
    }

    pub fn overlay_frames(&self, frames: &[OverlayFrame]) -> Result<String> {
        let mut rows = Rows::new(&[
            "Frame",
            "Cursor opacity",
            "Cursor scale",
            "Ripple radius",
            "Ripple opacity",
        ]);
        for frame in frames {
            rows.push(vec![
                format!("{:.0}", frame.frame),
                format!("{:.3}", frame.cursor_opacity),
                format!("{:.3}", frame.cursor_scale),
                format!("{:.1}", frame.ripple_radius),
                format!("{:.3}", frame.ripple_opacity),
            ]);
        }
        self.render(frames, "Click overlay", rows)
    }

    pub fn session_key(&self, key: &str) -> Result<String> {
        #[derive(Serialize)]
        struct SessionView<'a> {
            session_key: &'a str,
        }

        let mut rows = Rows::new(&["Session key"]);
        rows.push(vec![key.to_string()]);
        self.render(&SessionView { session_key: key }, "Session", rows)
    }

    pub fn success(&self, message: &str) -> String {
        format!("{} {message}\n", self.colorize("✓", &Color::Green, true))
    }

    pub fn warning(&self, message: &str) -> String {
        format!("{} {message}\n", self.colorize("!", &Color::Yellow, true))
    }

    fn render<T: Serialize + ?Sized>(&self, value: &T, title: &str, rows: Rows) -> Result<String> {
        match self.format {
            OutputFormat::Pretty => Ok(self.format_pretty(title, &rows)),
            OutputFormat::Json => self.format_json(value, true),
            OutputFormat::JsonCompact => self.format_json(value, false),
            #[cfg(feature = "table-output")]
            OutputFormat::Table => Ok(self.format_table(&rows)),
            #[cfg(not(feature = "table-output"))]
            OutputFormat::Table => {
                // Fallback to pretty format when table feature is disabled
                Ok(self.format_pretty(title, &rows))
            }
            OutputFormat::Csv => Ok(Self::format_csv(&rows)),
        }
    }

    fn format_pretty(&self, title: &str, rows: &Rows) -> String {
        let mut output = String::new();
        output.push_str(&self.colorize(title, &Color::Green, true));
        output.push('\n');

        if rows.records.is_empty() {
            output.push_str("  (none)\n");
            return output;
        }

        for (i, record) in rows.records.iter().enumerate() {
            if i > 0 {
                output.push('\n');
            }
            for (header, value) in rows.headers.iter().zip(record) {
                if value.is_empty() {
                    continue;
                }
                let color = if value.starts_with("http://") || value.starts_with("https://") {
                    Color::Blue
                } else {
                    Color::Cyan
                };
                output.push_str(&format!(
                    "  {}: {}\n",
                    self.colorize(header, &Color::Yellow, false),
                    self.colorize(value, &color, false)
                ));
            }
        }
        output
    }

    fn format_json<T: Serialize + ?Sized>(&self, value: &T, pretty: bool) -> Result<String> {
        let mut text = if pretty {
            serde_json::to_string_pretty(value)
        } else {
            serde_json::to_string(value)
        }?;
        text.push('\n');
        Ok(text)
    }

    #[cfg(feature = "table-output")]
    fn format_table(&self, rows: &Rows) -> String {
        let mut builder = Builder::default();
        builder.push_record(rows.headers.iter().map(|h| h.to_string()));
        for record in &rows.records {
            builder.push_record(record.iter().cloned());
        }
        let mut table = builder.build();
        table.with(Style::modern());
        format!("{table}\n")
    }

    fn format_csv(rows: &Rows) -> String {
        let mut output = rows.headers.join(",");
        output.push('\n');
        for record in &rows.records {
            let cells: Vec<Cow<'_, str>> = record.iter().map(|c| Self::escape_csv(c)).collect();
            output.push_str(&cells.join(","));
            output.push('\n');
        }
        output
    }

    fn escape_csv(s: &str) -> Cow<'_, str> {
        if s.contains([',', '"', '\n']) {
            Cow::Owned(format!("\"{}\"", s.replace('"', "\"\"")))
        } else {
            Cow::Borrowed(s)
        }
    }

    fn colorize(&self, text: &str, color: &Color, bold: bool) -> String {
        #[cfg(feature = "colored-output")]
        {
            if self.colored {
                let colored_text = match color {
                    Color::Green => text.green(),
                    Color::Yellow => text.yellow(),
                    Color::Blue => text.blue(),
                    Color::Cyan => text.cyan(),
                };
                if bold {
                    colored_text.bold().to_string()
                } else {
                    colored_text.to_string()
                }
            } else {
                text.to_string()
            }
        }

        #[cfg(not(feature = "colored-output"))]
        {
            let _ = (color, bold, self.colored);
            text.to_string()
        }
    }
}

#[cfg_attr(not(feature = "colored-output"), allow(dead_code))]
enum Color {
    Green,
    Yellow,
    Blue,
    Cyan,
}

pub fn write_output(content: &str, output_file: Option<&std::path::Path>) -> Result<()> {
    match output_file {
        Some(path) => {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(path, content)?;
        }
        None => {
            print!("{content}");
            std::io::stdout().flush()?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn track(id: &str, title: &str) -> Track {
        Track {
            id: id.to_string(),
            title: title.to_string(),
            artist: None,
            preview_url: Some(format!("https://cdn.test/{id}.mp3")),
            duration: Some(92.4),
        }
    }

    #[test]
    fn test_pretty_skips_empty_cells() {
        let out = OutputManager::new(OutputFormat::Pretty, false);
        let text = out.tracks(&[track("1", "Sunrise")]).unwrap();
        assert!(text.starts_with("Tracks\n"));
        assert!(text.contains("  Title: Sunrise\n"));
        assert!(text.contains("  Duration: 92s\n"));
        assert!(!text.contains("Artist"));
    }

    #[test]
    fn test_pretty_empty_list() {
        let out = OutputManager::new(OutputFormat::Pretty, false);
        assert_eq!(out.media(&[]).unwrap(), "Media library\n  (none)\n");
    }

    #[test]
    fn test_json_is_the_model() {
        let out = OutputManager::new(OutputFormat::JsonCompact, false);
        let text = out.tracks(&[track("1", "Sunrise")]).unwrap();
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value[0]["id"], "1");
        assert_eq!(value[0]["preview_url"], "https://cdn.test/1.mp3");
    }

    #[test]
    fn test_csv_escapes_cells() {
        let out = OutputManager::new(OutputFormat::Csv, false);
        let text = out.tracks(&[track("1", "Home, \"Sweet\" Home")]).unwrap();
        let mut lines = text.lines();
        assert_eq!(lines.next(), Some("ID,Title,Artist,Duration,Preview"));
        assert_eq!(
            lines.next(),
            Some("1,\"Home, \"\"Sweet\"\" Home\",,92s,https://cdn.test/1.mp3")
        );
    }

    #[test]
    fn test_video_state_json_flattens_state() {
        let out = OutputManager::new(OutputFormat::JsonCompact, false);
        let state = VideoState::Error {
            message: "render crashed".into(),
        };
        let value: serde_json::Value =
            serde_json::from_str(&out.video_state("9", &state).unwrap()).unwrap();
        assert_eq!(value["run_id"], "9");
        assert_eq!(value["state"], "ERROR");
        assert_eq!(value["message"], "render crashed");
    }

    #[cfg(feature = "table-output")]
    #[test]
    fn test_table_has_headers() {
        let out = OutputManager::new(OutputFormat::Table, false);
        let text = out.tracks(&[track("7", "Dusk")]).unwrap();
        assert!(text.contains("Title"));
        assert!(text.contains("Dusk"));
    }
}
