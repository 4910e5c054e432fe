//! Media timing helpers for tour videos.
//!
//! - [`vtt`] - WebVTT transcript parsing and rendering
//! - [`easing`] - Easing curves and piecewise range interpolation
//! - [`overlay`] - Per-frame values for the button-click overlay

pub mod easing;
pub mod error;
pub mod overlay;
pub mod vtt;

pub use easing::{Curve, Easing, Extrapolate, InterpolateOptions, Mode, interpolate};
pub use error::{Result, TimingError};
pub use overlay::{ButtonClickOverlay, ClickOverlayConfig, OverlayFrame};
pub use vtt::{Cue, Transcript, format_timestamp, parse, parse_timestamp, strip_tags};
