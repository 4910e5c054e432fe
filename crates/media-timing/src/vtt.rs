//! WebVTT transcript parsing.
//!
//! ## Format Rules
//! - The document starts with `WEBVTT`, optionally followed by a space or tab
//!   and free header text. A UTF-8 BOM is ignored.
//! - Blocks are separated by blank lines.
//! - A cue is an optional identifier line, a timing line
//!   `start --> end [settings]`, then payload lines.
//! - Timestamps are `hh:mm:ss.ttt` or `mm:ss.ttt`.
//! - `NOTE`, `STYLE` and `REGION` blocks carry no cues and are skipped.

use serde::{Deserialize, Serialize};
use std::fmt::Write;
use std::time::Duration;
use tracing::trace;

use crate::error::{Result, TimingError};

const SIGNATURE: &str = "WEBVTT";
const ARROW: &str = "-->";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cue {
    pub id: Option<String>,
    pub start: Duration,
    pub end: Duration,
    /// Raw cue settings after the end timestamp, e.g. `align:start line:0`.
    pub settings: Option<String>,
    /// Payload lines joined with `\n`, markup preserved.
    pub text: String,
}

impl Cue {
    pub fn contains(&self, at: Duration) -> bool {
        self.start <= at && at < self.end
    }

    /// Payload without markup tags and with basic entities decoded.
    pub fn plain_text(&self) -> String {
        strip_tags(&self.text)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transcript {
    /// Text after the signature on the first line.
    pub header: Option<String>,
    pub cues: Vec<Cue>,
}

impl Transcript {
    /// Every cue showing at `at`.
    pub fn active_cues(&self, at: Duration) -> impl Iterator<Item = &Cue> {
        self.cues.iter().filter(move |c| c.contains(at))
    }

    /// The first cue showing at `at`.
    pub fn cue_at(&self, at: Duration) -> Option<&Cue> {
        self.active_cues(at).next()
    }

    /// End of the last cue.
    pub fn duration(&self) -> Duration {
        self.cues.iter().map(|c| c.end).max().unwrap_or_default()
    }

    /// All payloads as plain text, one cue per line.
    pub fn plain_text(&self) -> String {
        self.cues
            .iter()
            .map(Cue::plain_text)
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Render back to WebVTT.
    pub fn to_vtt(&self) -> String {
        let mut out = String::from(SIGNATURE);
        if let Some(header) = &self.header {
            out.push(' ');
            out.push_str(header);
        }
        out.push_str("\n\n");

        for cue in &self.cues {
            if let Some(id) = &cue.id {
                out.push_str(id);
                out.push('\n');
            }
            let _ = write!(
                out,
                "{} {ARROW} {}",
                format_timestamp(cue.start),
                format_timestamp(cue.end)
            );
            if let Some(settings) = &cue.settings {
                out.push(' ');
                out.push_str(settings);
            }
            out.push('\n');
            if !cue.text.is_empty() {
                out.push_str(&cue.text);
                out.push('\n');
            }
            out.push('\n');
        }
        out
    }
}

/// Parse a WebVTT document.
pub fn parse(input: &str) -> Result<Transcript> {
    let normalized = input.replace("\r\n", "\n").replace('\r', "\n");
    let body = normalized.strip_prefix('\u{feff}').unwrap_or(&normalized);
    let lines: Vec<&str> = body.split('\n').collect();

    let first = lines.first().copied().unwrap_or_default();
    let header = match first.strip_prefix(SIGNATURE) {
        Some("") => None,
        Some(rest) if rest.starts_with([' ', '\t']) => {
            Some(rest.trim().to_string()).filter(|h| !h.is_empty())
        }
        _ => return Err(TimingError::MissingSignature),
    };

    // Header lines run until the first blank line or the first timing line.
    let mut idx = 1;
    while idx < lines.len() && !lines[idx].trim().is_empty() && !lines[idx].contains(ARROW) {
        idx += 1;
    }

    let mut cues = Vec::new();
    while idx < lines.len() {
        if lines[idx].trim().is_empty() {
            idx += 1;
            continue;
        }
        let block_start = idx;
        while idx < lines.len() && !lines[idx].trim().is_empty() {
            idx += 1;
        }
        // 1-based number of the block's first line
        let line_no = block_start + 1;
        if let Some(cue) = parse_block(&lines[block_start..idx], line_no)? {
            cues.push(cue);
        }
    }

    trace!(cues = cues.len(), "Parsed WebVTT transcript");
    Ok(Transcript { header, cues })
}

fn is_keyword_block(line: &str, keyword: &str) -> bool {
    line.strip_prefix(keyword)
        .is_some_and(|rest| rest.is_empty() || rest.starts_with([' ', '\t']))
}

fn parse_block(block: &[&str], line_no: usize) -> Result<Option<Cue>> {
    let first = block[0];
    if ["NOTE", "STYLE", "REGION"]
        .iter()
        .any(|kw| is_keyword_block(first, kw))
        && !first.contains(ARROW)
    {
        return Ok(None);
    }

    let (id, timing_idx) = if first.contains(ARROW) {
        (None, 0)
    } else if block.len() > 1 && block[1].contains(ARROW) {
        (Some(first.trim().to_string()), 1)
    } else {
        return Err(TimingError::MissingTiming { line: line_no });
    };

    let timing_line_no = line_no + timing_idx;
    let (left, right) = block[timing_idx]
        .split_once(ARROW)
        .ok_or(TimingError::MissingTiming {
            line: timing_line_no,
        })?;

    let start = parse_timestamp(left.trim(), timing_line_no)?;
    let mut rest = right.split_whitespace();
    let end_raw = rest.next().unwrap_or_default();
    let end = parse_timestamp(end_raw, timing_line_no)?;
    if end < start {
        return Err(TimingError::EndBeforeStart {
            line: timing_line_no,
        });
    }
    let settings = Some(rest.collect::<Vec<_>>().join(" ")).filter(|s| !s.is_empty());

    Ok(Some(Cue {
        id,
        start,
        end,
        settings,
        text: block[timing_idx + 1..].join("\n"),
    }))
}

fn digits(s: &str, exact: Option<usize>) -> Option<u64> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    if exact.is_some_and(|n| s.len() != n) {
        return None;
    }
    s.parse().ok()
}

/// Parse `hh:mm:ss.ttt` or `mm:ss.ttt`.
pub fn parse_timestamp(value: &str, line: usize) -> Result<Duration> {
    let bad = || TimingError::bad_timestamp(line, value);

    let (clock, millis) = value.rsplit_once('.').ok_or_else(bad)?;
    let millis = digits(millis, Some(3)).ok_or_else(bad)?;

    let parts: Vec<&str> = clock.split(':').collect();
    let (hours, minutes, seconds) = match parts.as_slice() {
        [m, s] => (0, *m, *s),
        [h, m, s] => (digits(h, None).ok_or_else(bad)?, *m, *s),
        _ => return Err(bad()),
    };
    let minutes = digits(minutes, Some(2)).filter(|m| *m < 60).ok_or_else(bad)?;
    let seconds = digits(seconds, Some(2)).filter(|s| *s < 60).ok_or_else(bad)?;

    let total = hours
        .checked_mul(3_600_000)
        .and_then(|ms| ms.checked_add((minutes * 60 + seconds) * 1000 + millis))
        .ok_or_else(bad)?;
    Ok(Duration::from_millis(total))
}

/// Format as `hh:mm:ss.ttt`.
pub fn format_timestamp(at: Duration) -> String {
    let total_ms = at.as_millis();
    let hours = total_ms / 3_600_000;
    let minutes = (total_ms / 60_000) % 60;
    let seconds = (total_ms / 1000) % 60;
    let millis = total_ms % 1000;
    format!("{hours:02}:{minutes:02}:{seconds:02}.{millis:03}")
}

/// Remove `<...>` markup and decode the entities WebVTT allows.
pub fn strip_tags(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_tag = false;
    for c in text.chars() {
        match c {
            '<' => in_tag = true,
            '>' if in_tag => in_tag = false,
            _ if !in_tag => out.push(c),
            _ => {}
        }
    }
    out.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&nbsp;", "\u{a0}")
        .replace("&lrm;", "\u{200e}")
        .replace("&rlm;", "\u{200f}")
        .replace("&amp;", "&")
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    const SAMPLE: &str = "\u{feff}WEBVTT - walkthrough\r\nKind: captions\r\n\r\nNOTE recorded on site\r\n\r\nintro\r\n00:00.000 --> 00:02.500 align:start line:0\r\nWelcome to <b>12 Oak Lane</b>\r\n\r\n00:00:02.500 --> 00:00:05.000\r\nThe kitchen &amp; dining area\r\nopen onto the deck.\r\n";

    #[test]
    fn test_parse_sample() {
        let transcript = parse(SAMPLE).unwrap();
        assert_eq!(transcript.header.as_deref(), Some("- walkthrough"));
        assert_eq!(transcript.cues.len(), 2);

        let intro = &transcript.cues[0];
        assert_eq!(intro.id.as_deref(), Some("intro"));
        assert_eq!(intro.start, Duration::ZERO);
        assert_eq!(intro.end, Duration::from_millis(2500));
        assert_eq!(intro.settings.as_deref(), Some("align:start line:0"));
        assert_eq!(intro.plain_text(), "Welcome to 12 Oak Lane");

        let second = &transcript.cues[1];
        assert_eq!(second.id, None);
        assert_eq!(second.text, "The kitchen &amp; dining area\nopen onto the deck.");
        assert_eq!(transcript.duration(), Duration::from_secs(5));
    }

    #[test]
    fn test_cue_lookup_is_half_open() {
        let transcript = parse(SAMPLE).unwrap();
        assert_eq!(
            transcript.cue_at(Duration::from_millis(2499)).unwrap().id.as_deref(),
            Some("intro")
        );
        assert_eq!(
            transcript.cue_at(Duration::from_millis(2500)).unwrap().id,
            None
        );
        assert!(transcript.cue_at(Duration::from_secs(5)).is_none());
    }

    #[test]
    fn test_plain_text() {
        let transcript = parse(SAMPLE).unwrap();
        assert_eq!(
            transcript.plain_text(),
            "Welcome to 12 Oak Lane\nThe kitchen & dining area\nopen onto the deck."
        );
    }

    #[test]
    fn test_render_and_reparse() {
        let transcript = parse(SAMPLE).unwrap();
        let rendered = transcript.to_vtt();
        assert!(rendered.starts_with("WEBVTT - walkthrough\n\nintro\n00:00:00.000 --> 00:00:02.500 align:start line:0\n"));
        assert_eq!(parse(&rendered).unwrap(), transcript);
    }

    #[test]
    fn test_signature_only() {
        let transcript = parse("WEBVTT\n").unwrap();
        assert!(transcript.cues.is_empty());
        assert_eq!(transcript.header, None);
        assert_eq!(transcript.duration(), Duration::ZERO);
    }

    #[rstest]
    #[case("")]
    #[case("WEBVTTX\n\n00:01.000 --> 00:02.000\nhi")]
    #[case("1\n00:01.000 --> 00:02.000\nhi")]
    fn test_missing_signature(#[case] input: &str) {
        assert_eq!(parse(input), Err(TimingError::MissingSignature));
    }

    #[test]
    fn test_end_before_start_reports_line() {
        let err = parse("WEBVTT\n\n00:05.000 --> 00:01.000\nbackwards").unwrap_err();
        assert_eq!(err, TimingError::EndBeforeStart { line: 3 });
    }

    #[test]
    fn test_block_without_timing() {
        let err = parse("WEBVTT\n\nid\njust text\n").unwrap_err();
        assert_eq!(err, TimingError::MissingTiming { line: 3 });
    }

    #[rstest]
    #[case("WEBVTT\n00:00:01.000 --> 00:00:02.000\nhello\n", 2)]
    #[case("WEBVTT - tour\nKind: captions\n00:01.000 --> 00:02.000\nhello\n", 3)]
    fn test_timing_line_ends_header(#[case] input: &str, #[case] timing_line: usize) {
        let transcript = parse(input).unwrap();
        assert_eq!(transcript.cues.len(), 1);
        assert_eq!(transcript.cues[0].start, Duration::from_secs(1));
        assert_eq!(transcript.cues[0].text, "hello");

        let broken = input.replace("00:02.000", "00:00.500");
        assert_eq!(
            parse(&broken),
            Err(TimingError::EndBeforeStart { line: timing_line })
        );
    }

    #[test]
    fn test_empty_payload_is_allowed() {
        let transcript = parse("WEBVTT\n\n00:01.000 --> 00:02.000\n").unwrap();
        assert_eq!(transcript.cues.len(), 1);
        assert_eq!(transcript.cues[0].text, "");
    }

    #[rstest]
    #[case("00:01.000", 1_000)]
    #[case("01:02:03.004", 3_723_004)]
    #[case("100:00:00.000", 360_000_000)]
    #[case("59:59.999", 3_599_999)]
    fn test_timestamps(#[case] raw: &str, #[case] millis: u64) {
        assert_eq!(parse_timestamp(raw, 1).unwrap(), Duration::from_millis(millis));
    }

    #[rstest]
    #[case("1.000")]
    #[case("00:1.000")]
    #[case("00:60.000")]
    #[case("60:00.000")]
    #[case("00:01.00")]
    #[case("00:01,000")]
    #[case("aa:01.000")]
    #[case("00:00:01:000")]
    #[case("9999999999999:00:00.000")]
    #[case("99999999999999999999:00:00.000")]
    fn test_bad_timestamps(#[case] raw: &str) {
        assert!(matches!(
            parse_timestamp(raw, 7),
            Err(TimingError::BadTimestamp { line: 7, .. })
        ));
    }

    #[test]
    fn test_format_timestamp() {
        assert_eq!(format_timestamp(Duration::from_millis(3_723_004)), "01:02:03.004");
        assert_eq!(format_timestamp(Duration::ZERO), "00:00:00.000");
    }

    #[test]
    fn test_strip_tags() {
        assert_eq!(strip_tags("<v Agent>Hi &lt;there&gt;</v>"), "Hi <there>");
        assert_eq!(strip_tags("a &amp;lt; b"), "a &lt; b");
    }
}
