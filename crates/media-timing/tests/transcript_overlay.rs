//! Transcript and overlay timing working together: the click overlay is
//! placed at the cue that mentions the call to action.

use std::time::Duration;

use media_timing::{ButtonClickOverlay, ClickOverlayConfig, TimingError, parse};

const NARRATION: &str = "WEBVTT

NOTE
generated narration for the tour

1
00:00:00.000 --> 00:00:03.200
<v Narrator>Welcome to 48 Harbour Street.</v>

2
00:00:03.200 --> 00:00:06.000
Sunlight fills the open-plan living area.

3
00:00:06.000 --> 00:00:08.500 position:50% align:center
Tap <i>Book a viewing</i> to see it in person.
";

#[test]
fn overlay_follows_call_to_action_cue() {
    let transcript = parse(NARRATION).unwrap();
    assert_eq!(transcript.cues.len(), 3);
    assert_eq!(transcript.duration(), Duration::from_millis(8500));

    let cta = transcript
        .cues
        .iter()
        .find(|c| c.plain_text().contains("Book a viewing"))
        .unwrap();
    assert_eq!(cta.id.as_deref(), Some("3"));

    let fps = 30.0;
    let config = ClickOverlayConfig::at_seconds(cta.start.as_secs_f64(), fps)
        .unwrap()
        .with_position(640.0, 610.0);
    let overlay = ButtonClickOverlay::new(config).unwrap();
    assert_eq!(overlay.config().click_frame, 180.0);

    // Overlay finishes before the cue leaves the screen.
    let end_secs = overlay.end_frame() / fps;
    assert!(end_secs <= cta.end.as_secs_f64());

    let during = overlay.frame(182.0);
    assert!(during.visible);
    assert_eq!((during.x, during.y), (640.0, 610.0));
    assert!(during.ripple_radius > 0.0);

    let at_time = Duration::from_secs_f64(182.0 / fps);
    assert_eq!(transcript.cue_at(at_time).map(|c| c.id.as_deref()), Some(Some("3")));
}

#[test]
fn overlay_frames_serialize() {
    let overlay = ButtonClickOverlay::new(ClickOverlayConfig {
        click_frame: 12.0,
        ..Default::default()
    })
    .unwrap();
    let frames: Vec<_> = overlay.frames().collect();
    let json = serde_json::to_value(&frames[10]).unwrap();
    assert_eq!(json["frame"], 12.0);
    assert_eq!(json["visible"], true);
    assert_eq!(json["cursor_scale"], 1.0);
}

#[test]
fn parse_errors_carry_line_numbers() {
    let broken = "WEBVTT\n\n00:00:01.000 --> 00:00:02.000\nok\n\n00:00:03.000 --> 00:00:0x.000\nbad\n";
    let err = parse(broken).unwrap_err();
    assert!(matches!(err, TimingError::BadTimestamp { line: 6, .. }));
    assert!(err.to_string().starts_with("line 6:"));
}
