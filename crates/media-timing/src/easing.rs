//! Easing curves and range interpolation for frame-based animation.

use serde::{Deserialize, Serialize};

use crate::error::{Result, TimingError};

const NEWTON_ITERATIONS: usize = 8;
const NEWTON_MIN_SLOPE: f64 = 1e-6;
const SUBDIVISION_ITERATIONS: usize = 64;
const PRECISION: f64 = 1e-7;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Curve {
    Linear,
    Quad,
    Cubic,
    Sine,
    /// CSS-style cubic bezier through (0,0), (x1,y1), (x2,y2), (1,1).
    Bezier { x1: f64, y1: f64, x2: f64, y2: f64 },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    #[default]
    In,
    Out,
    InOut,
}

/// A curve with a direction. `In` runs the curve as-is, `Out` mirrors it and
/// `InOut` joins both halves at t = 0.5.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Easing {
    pub curve: Curve,
    pub mode: Mode,
}

impl Default for Easing {
    fn default() -> Self {
        Self::LINEAR
    }
}

impl Easing {
    pub const LINEAR: Self = Self {
        curve: Curve::Linear,
        mode: Mode::In,
    };

    pub const fn ease_in(curve: Curve) -> Self {
        Self {
            curve,
            mode: Mode::In,
        }
    }

    pub const fn ease_out(curve: Curve) -> Self {
        Self {
            curve,
            mode: Mode::Out,
        }
    }

    pub const fn ease_in_out(curve: Curve) -> Self {
        Self {
            curve,
            mode: Mode::InOut,
        }
    }

    /// Cubic bezier easing. `x1` and `x2` must lie in `[0, 1]` so the curve
    /// stays a function of time.
    pub fn bezier(x1: f64, y1: f64, x2: f64, y2: f64) -> Result<Self> {
        if ![x1, y1, x2, y2].iter().all(|v| v.is_finite()) {
            return Err(TimingError::InvalidEasing(
                "bezier control points must be finite".into(),
            ));
        }
        if !(0.0..=1.0).contains(&x1) || !(0.0..=1.0).contains(&x2) {
            return Err(TimingError::InvalidEasing(format!(
                "bezier x values must be within [0, 1], got {x1} and {x2}"
            )));
        }
        Ok(Self::ease_in(Curve::Bezier { x1, y1, x2, y2 }))
    }

    pub fn apply(&self, t: f64) -> f64 {
        match self.mode {
            Mode::In => self.curve.apply(t),
            Mode::Out => 1.0 - self.curve.apply(1.0 - t),
            Mode::InOut => {
                if t < 0.5 {
                    self.curve.apply(t * 2.0) / 2.0
                } else {
                    1.0 - self.curve.apply((1.0 - t) * 2.0) / 2.0
                }
            }
        }
    }
}

impl Curve {
    pub fn apply(&self, t: f64) -> f64 {
        match *self {
            Curve::Linear => t,
            Curve::Quad => t * t,
            Curve::Cubic => t * t * t,
            Curve::Sine => 1.0 - (t * std::f64::consts::FRAC_PI_2).cos(),
            Curve::Bezier { x1, y1, x2, y2 } => bezier_at(x1, y1, x2, y2, t),
        }
    }
}

fn bezier_coord(t: f64, p1: f64, p2: f64) -> f64 {
    let a = 1.0 - 3.0 * p2 + 3.0 * p1;
    let b = 3.0 * p2 - 6.0 * p1;
    let c = 3.0 * p1;
    ((a * t + b) * t + c) * t
}

fn bezier_slope(t: f64, p1: f64, p2: f64) -> f64 {
    let a = 1.0 - 3.0 * p2 + 3.0 * p1;
    let b = 3.0 * p2 - 6.0 * p1;
    let c = 3.0 * p1;
    3.0 * a * t * t + 2.0 * b * t + c
}

/// Solve x(t) = x for t: Newton-Raphson first, bisection when the slope
/// flattens out or Newton fails to converge.
fn solve_bezier_t(x: f64, x1: f64, x2: f64) -> f64 {
    let mut t = x;
    for _ in 0..NEWTON_ITERATIONS {
        let err = bezier_coord(t, x1, x2) - x;
        if err.abs() < PRECISION {
            return t;
        }
        let slope = bezier_slope(t, x1, x2);
        if slope.abs() < NEWTON_MIN_SLOPE {
            break;
        }
        t -= err / slope;
    }

    let (mut lo, mut hi) = (0.0, 1.0);
    t = x;
    for _ in 0..SUBDIVISION_ITERATIONS {
        let current = bezier_coord(t, x1, x2);
        if (current - x).abs() < PRECISION {
            break;
        }
        if x > current {
            lo = t;
        } else {
            hi = t;
        }
        t = (lo + hi) / 2.0;
    }
    t
}

fn bezier_at(x1: f64, y1: f64, x2: f64, y2: f64, x: f64) -> f64 {
    if x1 == y1 && x2 == y2 {
        return x;
    }
    if x <= 0.0 {
        return 0.0;
    }
    if x >= 1.0 {
        return 1.0;
    }
    bezier_coord(solve_bezier_t(x, x1, x2), y1, y2)
}

/// What happens to inputs outside the input range.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Extrapolate {
    /// Hold the edge output value.
    Clamp,
    /// Continue the edge segment.
    #[default]
    Extend,
    /// Return the input unchanged.
    Identity,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct InterpolateOptions {
    pub easing: Easing,
    pub left: Extrapolate,
    pub right: Extrapolate,
}

impl InterpolateOptions {
    pub fn clamped() -> Self {
        Self {
            easing: Easing::LINEAR,
            left: Extrapolate::Clamp,
            right: Extrapolate::Clamp,
        }
    }

    pub fn with_easing(mut self, easing: Easing) -> Self {
        self.easing = easing;
        self
    }
}

/// Check the ranges [`interpolate`] accepts.
pub fn validate_ranges(input_range: &[f64], output_range: &[f64]) -> Result<()> {
    if input_range.len() != output_range.len() {
        return Err(TimingError::invalid_range(format!(
            "input range has {} points but output range has {}",
            input_range.len(),
            output_range.len()
        )));
    }
    if input_range.len() < 2 {
        return Err(TimingError::invalid_range("at least two points are required"));
    }
    if input_range
        .iter()
        .chain(output_range)
        .any(|v| !v.is_finite())
    {
        return Err(TimingError::invalid_range("ranges must be finite"));
    }
    if input_range.windows(2).any(|w| w[0] >= w[1]) {
        return Err(TimingError::invalid_range(
            "input range must be strictly increasing",
        ));
    }
    Ok(())
}

/// Map `input` from `input_range` onto `output_range`, piecewise, easing each
/// segment.
pub fn interpolate(
    input: f64,
    input_range: &[f64],
    output_range: &[f64],
    options: &InterpolateOptions,
) -> Result<f64> {
    validate_ranges(input_range, output_range)?;
    Ok(interpolate_checked(input, input_range, output_range, options))
}

/// [`interpolate`] for ranges that already passed [`validate_ranges`].
pub(crate) fn interpolate_checked(
    input: f64,
    input_range: &[f64],
    output_range: &[f64],
    options: &InterpolateOptions,
) -> f64 {
    let last = input_range.len() - 1;
    let mut segment = 1;
    while segment < last && input_range[segment] < input {
        segment += 1;
    }
    let i = segment - 1;
    interpolate_segment(
        input,
        (input_range[i], input_range[i + 1]),
        (output_range[i], output_range[i + 1]),
        options,
    )
}

fn interpolate_segment(
    input: f64,
    (in_min, in_max): (f64, f64),
    (out_min, out_max): (f64, f64),
    options: &InterpolateOptions,
) -> f64 {
    let mut value = input;
    if value < in_min {
        match options.left {
            Extrapolate::Identity => return value,
            Extrapolate::Clamp => value = in_min,
            Extrapolate::Extend => {}
        }
    }
    if value > in_max {
        match options.right {
            Extrapolate::Identity => return value,
            Extrapolate::Clamp => value = in_max,
            Extrapolate::Extend => {}
        }
    }
    if out_min == out_max {
        return out_min;
    }

    let progress = options.easing.apply((value - in_min) / (in_max - in_min));
    out_min + progress * (out_max - out_min)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-6
    }

    #[rstest]
    #[case(Easing::LINEAR, 0.25, 0.25)]
    #[case(Easing::ease_in(Curve::Quad), 0.5, 0.25)]
    #[case(Easing::ease_out(Curve::Quad), 0.5, 0.75)]
    #[case(Easing::ease_in(Curve::Cubic), 0.5, 0.125)]
    #[case(Easing::ease_out(Curve::Cubic), 0.5, 0.875)]
    #[case(Easing::ease_in_out(Curve::Cubic), 0.25, 0.0625)]
    #[case(Easing::ease_in_out(Curve::Cubic), 0.5, 0.5)]
    #[case(Easing::ease_in_out(Curve::Quad), 0.75, 0.875)]
    #[case(Easing::ease_in(Curve::Sine), 1.0, 1.0)]
    fn test_easing_values(#[case] easing: Easing, #[case] t: f64, #[case] expected: f64) {
        assert!(close(easing.apply(t), expected), "{easing:?} at {t}");
    }

    #[rstest]
    #[case(Easing::ease_in(Curve::Quad))]
    #[case(Easing::ease_out(Curve::Cubic))]
    #[case(Easing::ease_in_out(Curve::Sine))]
    fn test_easing_endpoints(#[case] easing: Easing) {
        assert!(close(easing.apply(0.0), 0.0));
        assert!(close(easing.apply(1.0), 1.0));
    }

    #[test]
    fn test_bezier_linear_shortcut() {
        let linear = Easing::bezier(0.3, 0.3, 0.7, 0.7).unwrap();
        assert_eq!(linear.apply(0.42), 0.42);
    }

    #[test]
    fn test_bezier_ease_matches_css() {
        // CSS `ease`
        let ease = Easing::bezier(0.25, 0.1, 0.25, 1.0).unwrap();
        assert!(close(ease.apply(0.0), 0.0));
        assert!(close(ease.apply(1.0), 1.0));
        assert!((ease.apply(0.5) - 0.8024).abs() < 1e-3);

        let mut previous = 0.0;
        for step in 1..=100 {
            let value = ease.apply(step as f64 / 100.0);
            assert!(value >= previous);
            previous = value;
        }
    }

    #[test]
    fn test_bezier_flat_start_uses_bisection() {
        let steep = Easing::bezier(1.0, 0.0, 1.0, 0.0).unwrap();
        let value = steep.apply(0.5);
        assert!((0.0..=1.0).contains(&value));
        assert!(value < 0.1);
    }

    #[rstest]
    #[case(-0.1, 0.0, 1.0, 1.0)]
    #[case(0.0, 0.0, 1.1, 1.0)]
    #[case(f64::NAN, 0.0, 1.0, 1.0)]
    fn test_bezier_rejects_bad_points(
        #[case] x1: f64,
        #[case] y1: f64,
        #[case] x2: f64,
        #[case] y2: f64,
    ) {
        assert!(matches!(
            Easing::bezier(x1, y1, x2, y2),
            Err(TimingError::InvalidEasing(_))
        ));
    }

    #[rstest]
    #[case(5.0, 50.0)]
    #[case(-5.0, -50.0)]
    #[case(15.0, 150.0)]
    fn test_interpolate_extends_by_default(#[case] input: f64, #[case] expected: f64) {
        let value =
            interpolate(input, &[0.0, 10.0], &[0.0, 100.0], &InterpolateOptions::default())
                .unwrap();
        assert!(close(value, expected));
    }

    #[rstest]
    #[case(-5.0, 0.0)]
    #[case(15.0, 100.0)]
    fn test_interpolate_clamps(#[case] input: f64, #[case] expected: f64) {
        let value =
            interpolate(input, &[0.0, 10.0], &[0.0, 100.0], &InterpolateOptions::clamped())
                .unwrap();
        assert!(close(value, expected));
    }

    #[test]
    fn test_interpolate_identity() {
        let options = InterpolateOptions {
            left: Extrapolate::Identity,
            right: Extrapolate::Identity,
            ..Default::default()
        };
        assert_eq!(interpolate(-3.0, &[0.0, 1.0], &[10.0, 20.0], &options).unwrap(), -3.0);
        assert_eq!(interpolate(7.0, &[0.0, 1.0], &[10.0, 20.0], &options).unwrap(), 7.0);
    }

    #[rstest]
    #[case(0.0, 1.0)]
    #[case(5.0, 0.85)]
    #[case(10.0, 1.0)]
    #[case(2.5, 0.925)]
    #[case(7.5, 0.925)]
    fn test_interpolate_multi_segment(#[case] input: f64, #[case] expected: f64) {
        let value = interpolate(
            input,
            &[0.0, 5.0, 10.0],
            &[1.0, 0.85, 1.0],
            &InterpolateOptions::clamped(),
        )
        .unwrap();
        assert!(close(value, expected), "{input} -> {value}");
    }

    #[test]
    fn test_interpolate_eased_segment() {
        let options = InterpolateOptions::clamped().with_easing(Easing::ease_in(Curve::Quad));
        let value = interpolate(5.0, &[0.0, 10.0], &[0.0, 100.0], &options).unwrap();
        assert!(close(value, 25.0));
    }

    #[test]
    fn test_interpolate_flat_output() {
        let value = interpolate(3.0, &[0.0, 10.0], &[4.0, 4.0], &InterpolateOptions::default())
            .unwrap();
        assert_eq!(value, 4.0);
    }

    #[rstest]
    #[case(&[0.0], &[1.0])]
    #[case(&[0.0, 1.0], &[1.0])]
    #[case(&[1.0, 1.0], &[0.0, 1.0])]
    #[case(&[2.0, 1.0], &[0.0, 1.0])]
    #[case(&[0.0, f64::INFINITY], &[0.0, 1.0])]
    fn test_interpolate_rejects_bad_ranges(#[case] input: &[f64], #[case] output: &[f64]) {
        assert!(matches!(
            interpolate(0.5, input, output, &InterpolateOptions::default()),
            Err(TimingError::InvalidRange(_))
        ));
    }
}
