use serde::{Deserialize, Serialize};

use crate::render::Rgb;

/// Easing curves shared by every animated effect so pacing stays consistent
/// across the whole library.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Ease {
    Linear,
    /// Hermite `t * t * (3 - 2t)`.
    Smoothstep,
    InOutCubic,
    InOutQuart,
    InOutQuint,
    InOutExpo,
    OutCirc,
}

impl Ease {
    /// Apply this easing function to normalized progress `t`.
    ///
    /// Progress is clamped to `[0, 1]` first; NaN maps to `0`.
    pub fn apply(self, t: f32) -> f32 {
        let t = clamp_unit(t);
        match self {
            Self::Linear => t,
            Self::Smoothstep => t * t * (3.0 - 2.0 * t),
            Self::InOutCubic => {
                if t < 0.5 {
                    4.0 * t * t * t
                } else {
                    1.0 - (-2.0 * t + 2.0).powi(3) / 2.0
                }
            }
            Self::InOutQuart => {
                if t < 0.5 {
                    8.0 * t.powi(4)
                } else {
                    1.0 - (-2.0 * t + 2.0).powi(4) / 2.0
                }
            }
            Self::InOutQuint => {
                if t < 0.5 {
                    16.0 * t.powi(5)
                } else {
                    1.0 - (-2.0 * t + 2.0).powi(5) / 2.0
                }
            }
            Self::InOutExpo => {
                if t <= 0.0 {
                    0.0
                } else if t >= 1.0 {
                    1.0
                } else if t < 0.5 {
                    2f32.powf(20.0 * t - 10.0) / 2.0
                } else {
                    (2.0 - 2f32.powf(-20.0 * t + 10.0)) / 2.0
                }
            }
            Self::OutCirc => (1.0 - (t - 1.0).powi(2)).max(0.0).sqrt(),
        }
    }
}

/// Clamps progress into `[0, 1]`, treating NaN as the start.
pub fn clamp_unit(t: f32) -> f32 {
    if t.is_nan() {
        0.0
    } else {
        t.clamp(0.0, 1.0)
    }
}

/// Progress of `elapsed` through `duration`. Zero-length spans are complete.
pub fn progress(elapsed: f32, duration: f32) -> f32 {
    if duration <= f32::EPSILON {
        return 1.0;
    }
    clamp_unit(elapsed / duration)
}

pub fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

/// Interpolates `a -> b` after running `t` through `ease`.
pub fn tween(a: f32, b: f32, t: f32, ease: Ease) -> f32 {
    lerp(a, b, ease.apply(t))
}

pub fn tween_rgb(a: Rgb, b: Rgb, t: f32, ease: Ease) -> Rgb {
    a.lerp(b, ease.apply(t))
}

/// Maps `value` from one range onto another without clamping.
pub fn remap(value: f32, in_min: f32, in_max: f32, out_min: f32, out_max: f32) -> f32 {
    let span = in_max - in_min;
    if span.abs() <= f32::EPSILON {
        return out_min;
    }
    (value - in_min) * (out_max - out_min) / span + out_min
}
