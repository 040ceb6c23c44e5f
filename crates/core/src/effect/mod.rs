//! The contract every effect implements.
//!
//! An effect owns its simulation state exclusively. The host calls
//! [`Effect::reset`] once per run to size the state and draw randomized
//! parameters, then calls [`Effect::advance`] once per frame until the effect
//! reports [`Step::Done`] or the host decides to move on.

use rand::{rngs::StdRng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::render::Frame;

pub use crate::timeline::SegmentPosition;

/// Behavioural family of an effect. All families share the same contract and
/// differ only in how they finish.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EffectFamily {
    /// Infinite time-driven generator; never reports `Done`.
    Perpetual,
    /// Timeline of named segments; reports `Done` after the last one.
    Choreographed,
    /// Replays precomputed algorithm steps, holds the result, then reports `Done`.
    Stepwise,
}

impl EffectFamily {
    pub fn name(self) -> &'static str {
        match self {
            Self::Perpetual => "perpetual",
            Self::Choreographed => "choreographed",
            Self::Stepwise => "stepwise",
        }
    }

    /// Whether effects of this family can end on their own.
    pub fn is_finite(self) -> bool {
        !matches!(self, Self::Perpetual)
    }
}

/// Outcome of a single [`Effect::advance`] call.
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    Frame(Frame),
    Done,
}

impl Step {
    pub fn is_done(&self) -> bool {
        matches!(self, Self::Done)
    }

    pub fn frame(&self) -> Option<&Frame> {
        match self {
            Self::Frame(frame) => Some(frame),
            Self::Done => None,
        }
    }

    pub fn into_frame(self) -> Option<Frame> {
        match self {
            Self::Frame(frame) => Some(frame),
            Self::Done => None,
        }
    }
}

/// A self-contained generator of frames.
///
/// Implementations must:
/// - return a frame of exactly `width x height` from every `advance` until done,
/// - leave their state untouched when `dt` is zero, so repeated zero-delta
///   calls produce identical frames,
/// - keep returning `Done` once they have returned it,
/// - draw random parameters only inside `reset` or at segment boundaries.
pub trait Effect: Send {
    /// Catalog identifier.
    fn id(&self) -> &'static str;

    fn family(&self) -> EffectFamily;

    /// Discards all state and starts a fresh run on a `width x height` panel.
    fn reset(&mut self, width: usize, height: usize, seed: u64);

    /// Moves the simulation forward by `dt` seconds and renders the result.
    fn advance(&mut self, dt: f32) -> Step;

    /// Current phase for choreographed and stepwise effects.
    fn segment(&self) -> Option<SegmentPosition> {
        None
    }
}

/// Deterministic generator for an effect run.
pub(crate) fn seeded_rng(seed: u64) -> StdRng {
    StdRng::seed_from_u64(seed)
}

/// Normalizes a delta handed to `advance`: negative or non-finite values count
/// as zero.
pub(crate) fn sanitize_dt(dt: f32) -> f32 {
    if dt.is_finite() && dt > 0.0 {
        dt
    } else {
        0.0
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn step_accessors() {
        let step = Step::Frame(Frame::blank(2, 2));
        assert!(!step.is_done());
        assert_eq!(step.frame().map(Frame::width), Some(2));
        assert!(Step::Done.into_frame().is_none());
    }

    #[test]
    fn only_perpetual_effects_are_infinite() {
        assert!(!EffectFamily::Perpetual.is_finite());
        assert!(EffectFamily::Choreographed.is_finite());
        assert!(EffectFamily::Stepwise.is_finite());
    }

    #[test]
    fn invalid_deltas_count_as_zero() {
        assert_eq!(sanitize_dt(-1.0), 0.0);
        assert_eq!(sanitize_dt(f32::INFINITY), 0.0);
        assert_eq!(sanitize_dt(0.25), 0.25);
    }
}
