use std::f32::consts::PI;

/// Number of samples taken per curve when no explicit resolution is requested.
pub const DEFAULT_CURVE_SAMPLES: usize = 20;

const BISECT_EPSILON: f32 = 1.0e-4;

/// How a keyframe interpolates towards the next one.
#[derive(Clone, Debug, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Tween {
    /// Hold the keyframe value until the next keyframe.
    None,
    #[default]
    Linear,
    /// Power-curve easing. Positive values ease out, negative values ease in.
    Easing(f32),
    Curve(SamplingCurve),
}

impl Tween {
    pub fn is_stepped(&self) -> bool {
        matches!(self, Tween::None)
    }

    /// Remaps a raw `[0, 1]` progress through this tween.
    pub fn progress(&self, progress: f32) -> f32 {
        match self {
            Tween::None => 0.0,
            Tween::Linear => progress.clamp(0.0, 1.0),
            Tween::Easing(easing) => ease(progress, *easing),
            Tween::Curve(curve) => curve.value(progress),
        }
    }
}

/// Power-curve easing.
///
/// `easing` in `(0, 1]` blends towards a quadratic ease-out, `[-1, 0)` towards a quadratic
/// ease-in, `(1, 2]` towards a sine ease-in-out and `[-2, -1)` towards its inverse. Zero or
/// out-of-range values are linear.
pub fn ease(progress: f32, easing: f32) -> f32 {
    if progress <= 0.0 {
        return 0.0;
    }
    if progress >= 1.0 {
        return 1.0;
    }

    let mut easing = easing;
    let value;
    if easing > 2.0 || easing == 0.0 || easing < -2.0 || easing.is_nan() {
        return progress;
    } else if easing > 1.0 {
        value = 0.5 * (1.0 - (progress * PI).cos());
        easing -= 1.0;
    } else if easing > 0.0 {
        value = 1.0 - (1.0 - progress).powi(2);
    } else if easing >= -1.0 {
        easing = -easing;
        value = progress.powi(2);
    } else {
        easing = -easing;
        value = (1.0 - progress * 2.0).acos() / PI;
        easing -= 1.0;
    }

    (value - progress) * easing + progress
}

/// A bezier easing curve pre-sampled into a fixed lookup table.
///
/// The control points describe a chain of cubic segments running from `(0, 0)` to `(1, 1)`:
/// `[c1x, c1y, c2x, c2y]` for one segment, followed by `[ax, ay, c1x, c1y, c2x, c2y]` for
/// every extra segment starting at anchor `(ax, ay)`.
#[derive(Clone, Debug, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SamplingCurve {
    samples: Vec<f32>,
}

impl SamplingCurve {
    pub fn new(control_points: &[f32], sample_count: usize) -> Self {
        let sample_count = sample_count.max(1);
        let mut samples = Vec::with_capacity(sample_count);
        if control_points.len() < 4 {
            for i in 0..sample_count {
                samples.push((i + 1) as f32 / (sample_count + 1) as f32);
            }
            return Self { samples };
        }

        let segment_count = 1 + (control_points.len() - 4) / 6;
        let mut segment = 0usize;
        for i in 0..sample_count {
            let t = (i + 1) as f32 / (sample_count + 1) as f32;
            while segment + 1 < segment_count && segment_end(control_points, segment).0 < t {
                segment += 1;
            }

            let p0 = segment_start(control_points, segment);
            let (p1, p2) = segment_controls(control_points, segment);
            let p3 = segment_end(control_points, segment);

            let mut lower = 0.0f32;
            let mut higher = 1.0f32;
            let mut point = p0;
            while higher - lower > BISECT_EPSILON {
                let percentage = (higher + lower) * 0.5;
                point = cubic_point(p0, p1, p2, p3, percentage);
                if t - point.0 > 0.0 {
                    lower = percentage;
                } else {
                    higher = percentage;
                }
            }
            samples.push(point.1);
        }

        Self { samples }
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    /// Piecewise-linear lookup into the sample table; the ends are pinned to 0 and 1.
    pub fn value(&self, progress: f32) -> f32 {
        if progress <= 0.0 {
            return 0.0;
        }
        if progress >= 1.0 {
            return 1.0;
        }
        if self.samples.is_empty() {
            return progress;
        }

        let segment_count = self.samples.len() + 1;
        let scaled = progress * segment_count as f32;
        let index = (scaled.floor() as usize).min(segment_count - 1);
        let from = if index == 0 {
            0.0
        } else {
            self.samples[index - 1]
        };
        let to = if index == segment_count - 1 {
            1.0
        } else {
            self.samples[index]
        };
        from + (to - from) * (scaled - index as f32)
    }
}

fn segment_start(points: &[f32], segment: usize) -> (f32, f32) {
    if segment == 0 {
        (0.0, 0.0)
    } else {
        let base = 4 + (segment - 1) * 6;
        (points[base], points[base + 1])
    }
}

fn segment_controls(points: &[f32], segment: usize) -> ((f32, f32), (f32, f32)) {
    let base = if segment == 0 { 0 } else { 6 + (segment - 1) * 6 };
    (
        (points[base], points[base + 1]),
        (points[base + 2], points[base + 3]),
    )
}

fn segment_end(points: &[f32], segment: usize) -> (f32, f32) {
    let base = 4 + segment * 6;
    if base + 1 < points.len() {
        (points[base], points[base + 1])
    } else {
        (1.0, 1.0)
    }
}

/// De Casteljau evaluation of one cubic segment.
fn cubic_point(
    p0: (f32, f32),
    p1: (f32, f32),
    p2: (f32, f32),
    p3: (f32, f32),
    t: f32,
) -> (f32, f32) {
    fn lerp(a: (f32, f32), b: (f32, f32), t: f32) -> (f32, f32) {
        (a.0 + (b.0 - a.0) * t, a.1 + (b.1 - a.1) * t)
    }
    let q0 = lerp(p0, p1, t);
    let q1 = lerp(p1, p2, t);
    let q2 = lerp(p2, p3, t);
    let r0 = lerp(q0, q1, t);
    let r1 = lerp(q1, q2, t);
    lerp(r0, r1, t)
}
