//! Button-click overlay: a cursor that fades in, presses, and emits a ripple.
//!
//! Timeline relative to the click frame `c`:
//!
//! ```text
//! c - lead_in      c        c + press   c + 2*press      end - fade   end
//!     |  fade in   | press  |  release  |                    | fade out |
//!                  | ripple grows + fades ... c + ripple      |
//! ```

use serde::{Deserialize, Serialize};

use crate::easing::{Curve, Easing, InterpolateOptions, interpolate_checked};
use crate::error::{Result, TimingError};

/// Cursor scale at the bottom of the press.
pub const PRESSED_SCALE: f64 = 0.85;
/// Ripple opacity at the moment of the click.
pub const RIPPLE_START_OPACITY: f64 = 0.6;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClickOverlayConfig {
    pub click_frame: f64,
    pub x: f64,
    pub y: f64,
    /// Frames the cursor takes to fade in before the click.
    pub lead_in_frames: f64,
    /// Frames to press down; releasing takes as long.
    pub press_frames: f64,
    pub ripple_frames: f64,
    pub max_ripple_radius: f64,
    /// Frames the cursor stays fully visible after the animation settles.
    pub hold_frames: f64,
    pub fade_out_frames: f64,
}

impl Default for ClickOverlayConfig {
    fn default() -> Self {
        Self {
            click_frame: 0.0,
            x: 0.0,
            y: 0.0,
            lead_in_frames: 10.0,
            press_frames: 4.0,
            ripple_frames: 18.0,
            max_ripple_radius: 40.0,
            hold_frames: 8.0,
            fade_out_frames: 6.0,
        }
    }
}

impl ClickOverlayConfig {
    /// Default timing with the click placed at `seconds` into a `fps` video.
    pub fn at_seconds(seconds: f64, fps: f64) -> Result<Self> {
        if !(fps.is_finite() && fps > 0.0) {
            return Err(TimingError::InvalidOverlay(format!("fps must be positive, got {fps}")));
        }
        if !seconds.is_finite() {
            return Err(TimingError::InvalidOverlay("click time must be finite".into()));
        }
        Ok(Self {
            click_frame: (seconds * fps).round(),
            ..Default::default()
        })
    }

    pub fn with_position(mut self, x: f64, y: f64) -> Self {
        self.x = x;
        self.y = y;
        self
    }

    fn validate(&self) -> Result<()> {
        let durations = [
            ("lead_in_frames", self.lead_in_frames),
            ("press_frames", self.press_frames),
            ("ripple_frames", self.ripple_frames),
            ("fade_out_frames", self.fade_out_frames),
        ];
        for (name, value) in durations {
            if !(value.is_finite() && value > 0.0) {
                return Err(TimingError::InvalidOverlay(format!(
                    "{name} must be positive, got {value}"
                )));
            }
        }
        if !(self.hold_frames.is_finite() && self.hold_frames >= 0.0) {
            return Err(TimingError::InvalidOverlay(format!(
                "hold_frames must not be negative, got {}",
                self.hold_frames
            )));
        }
        if !(self.max_ripple_radius.is_finite() && self.max_ripple_radius >= 0.0) {
            return Err(TimingError::InvalidOverlay(format!(
                "max_ripple_radius must not be negative, got {}",
                self.max_ripple_radius
            )));
        }
        if ![self.click_frame, self.x, self.y].iter().all(|v| v.is_finite()) {
            return Err(TimingError::InvalidOverlay(
                "click frame and position must be finite".into(),
            ));
        }
        Ok(())
    }
}

/// Rendered values for one frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct OverlayFrame {
    pub frame: f64,
    pub visible: bool,
    pub x: f64,
    pub y: f64,
    pub cursor_opacity: f64,
    pub cursor_scale: f64,
    pub ripple_radius: f64,
    pub ripple_opacity: f64,
}

impl OverlayFrame {
    fn hidden(frame: f64, config: &ClickOverlayConfig) -> Self {
        Self {
            frame,
            visible: false,
            x: config.x,
            y: config.y,
            cursor_opacity: 0.0,
            cursor_scale: 1.0,
            ripple_radius: 0.0,
            ripple_opacity: 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ButtonClickOverlay {
    config: ClickOverlayConfig,
}

impl ButtonClickOverlay {
    pub fn new(config: ClickOverlayConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &ClickOverlayConfig {
        &self.config
    }

    /// First frame the overlay is drawn.
    pub fn start_frame(&self) -> f64 {
        self.config.click_frame - self.config.lead_in_frames
    }

    /// First frame after the overlay disappears.
    pub fn end_frame(&self) -> f64 {
        let c = &self.config;
        let settled = (c.press_frames * 2.0).max(c.ripple_frames);
        c.click_frame + settled + c.hold_frames + c.fade_out_frames
    }

    pub fn duration_in_frames(&self) -> f64 {
        self.end_frame() - self.start_frame()
    }

    pub fn is_visible(&self, frame: f64) -> bool {
        frame >= self.start_frame() && frame < self.end_frame()
    }

    pub fn frame(&self, frame: f64) -> OverlayFrame {
        let c = &self.config;
        if !self.is_visible(frame) {
            return OverlayFrame::hidden(frame, c);
        }

        let clamped = InterpolateOptions::clamped();
        let click = c.click_frame;
        let end = self.end_frame();

        let fade_in = interpolate_checked(
            frame,
            &[self.start_frame(), click],
            &[0.0, 1.0],
            &clamped.with_easing(Easing::ease_out(Curve::Quad)),
        );
        let fade_out = interpolate_checked(
            frame,
            &[end - c.fade_out_frames, end],
            &[1.0, 0.0],
            &clamped,
        );

        let cursor_scale = interpolate_checked(
            frame,
            &[click, click + c.press_frames, click + c.press_frames * 2.0],
            &[1.0, PRESSED_SCALE, 1.0],
            &clamped.with_easing(Easing::ease_in_out(Curve::Cubic)),
        );

        let (ripple_radius, ripple_opacity) = if frame < click {
            (0.0, 0.0)
        } else {
            let ripple_window = [click, click + c.ripple_frames];
            (
                interpolate_checked(
                    frame,
                    &ripple_window,
                    &[0.0, c.max_ripple_radius],
                    &clamped.with_easing(Easing::ease_out(Curve::Cubic)),
                ),
                interpolate_checked(
                    frame,
                    &ripple_window,
                    &[RIPPLE_START_OPACITY, 0.0],
                    &clamped,
                ),
            )
        };

        OverlayFrame {
            frame,
            visible: true,
            x: c.x,
            y: c.y,
            cursor_opacity: fade_in.min(fade_out),
            cursor_scale,
            ripple_radius,
            ripple_opacity,
        }
    }

    /// Every frame from start to end, stepping by one.
    pub fn frames(&self) -> impl Iterator<Item = OverlayFrame> + '_ {
        let start = self.start_frame();
        let count = self.duration_in_frames().ceil() as usize;
        (0..count).map(move |i| self.frame(start + i as f64))
    }
}
