//! The built-in effect library.
//!
//! Each submodule exports an `ID`, a `NATIVE_FPS` and an effect type with a
//! `new(&AppConfig)` constructor that validates its tunables before any state
//! is allocated. The catalog maps identifiers onto these constructors.

pub mod fire;
pub mod fireworks;
pub mod kaleidoscope;
pub mod lines;
pub mod maze;
pub mod noise_field;
pub mod scanner;
pub mod sort;
pub mod square_morph;
pub mod starfall;
pub mod text;

use crate::timeline::{Segment, SegmentPosition, Ticker, Timeline};

/// Fixed-step playback of a segment timeline.
///
/// The timeline only moves in whole ticks so that per-tick simulations and
/// segment boundaries agree, and a zero delta moves neither.
#[derive(Debug, Clone)]
pub(crate) struct Choreography {
    timeline: Timeline,
    ticker: Ticker,
}

impl Choreography {
    pub fn new(segments: Vec<Segment>, hz: f32) -> Self {
        Self {
            timeline: Timeline::new(segments),
            ticker: Ticker::with_rate(hz),
        }
    }

    /// Releases the ticks due for `dt` and returns the position after each
    /// one. Stops early once the last segment has elapsed.
    pub fn advance(&mut self, dt: f32) -> Vec<SegmentPosition> {
        let ticks = self.ticker.advance(dt);
        let mut positions = Vec::with_capacity(ticks as usize);
        for _ in 0..ticks {
            self.timeline.advance(self.ticker.step());
            match self.timeline.position() {
                Some(pos) => positions.push(pos),
                None => break,
            }
        }
        positions
    }

    pub fn position(&self) -> Option<SegmentPosition> {
        self.timeline.position()
    }

    #[cfg(test)]
    pub fn total_duration(&self) -> f32 {
        self.timeline.total_duration()
    }
}

/// Mirrors `pos` back inside `[0, max)`, flipping `velocity` when it bounced.
pub(crate) fn reflect_into(pos: f32, velocity: f32, max: f32) -> (f32, f32) {
    if !(max > 0.0) || !pos.is_finite() {
        return (0.0, 0.0);
    }
    let (mut pos, mut velocity) = (pos, velocity);
    if pos < 0.0 {
        pos = -pos;
        velocity = velocity.abs();
    } else if pos >= max {
        pos = 2.0 * max - pos;
        velocity = -velocity.abs();
    }
    (clamp_into(pos, max), velocity)
}

/// Clamps `v` into `[0, max)`.
pub(crate) fn clamp_into(v: f32, max: f32) -> f32 {
    if !(max > 0.0) || !v.is_finite() {
        return 0.0;
    }
    v.clamp(0.0, max * (1.0 - f32::EPSILON))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn choreography_moves_in_whole_ticks() {
        let mut c = Choreography::new(vec![Segment::new("a", 0.5), Segment::new("b", 0.5)], 10.0);
        assert!(c.advance(0.0).is_empty());
        assert!(c.advance(0.05).is_empty());
        let positions = c.advance(0.55);
        assert_eq!(positions.len(), 6);
        assert_eq!(positions.last().map(|p| p.name.as_str()), Some("b"));
        c.advance(1.0);
        assert!(c.position().is_none());
    }

    #[test]
    fn reflection_flips_velocity() {
        assert_eq!(reflect_into(-2.0, -1.0, 10.0), (2.0, 1.0));
        assert_eq!(reflect_into(12.0, 3.0, 10.0), (8.0, -3.0));
        assert_eq!(reflect_into(f32::NAN, 3.0, 10.0), (0.0, 0.0));
    }

    proptest! {
        #[test]
        fn reflected_positions_stay_in_range(pos in -1000.0f32..1000.0, max in 0.5f32..128.0) {
            let (p, _) = reflect_into(pos, 1.0, max);
            prop_assert!(p >= 0.0 && p < max);
        }
    }
}
