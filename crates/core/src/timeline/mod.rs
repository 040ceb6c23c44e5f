use serde::{Deserialize, Serialize};

/// Accumulated effect time in seconds.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct PlaybackClock {
    pub time_seconds: f32,
}

impl PlaybackClock {
    pub fn reset(&mut self) {
        self.time_seconds = 0.0;
    }

    /// Adds `delta` seconds. Negative or non-finite deltas are ignored.
    pub fn advance(&mut self, delta: f32) {
        if delta.is_finite() && delta > 0.0 {
            self.time_seconds += delta;
        }
    }
}

/// Converts variable frame deltas into whole fixed-size simulation ticks.
///
/// Effects whose state evolves once per tick use this so that a zero delta
/// never moves the simulation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ticker {
    step: f32,
    pending: f32,
    ticks: u64,
}

/// Ceiling on ticks released per call so one long stall cannot freeze the
/// frame loop while the simulation catches up.
const MAX_TICKS_PER_ADVANCE: u32 = 240;

impl Ticker {
    /// Creates a ticker firing `hz` times per second of effect time.
    pub fn with_rate(hz: f32) -> Self {
        let step = if hz.is_finite() && hz > 0.0 { 1.0 / hz } else { 1.0 };
        Self {
            step,
            pending: 0.0,
            ticks: 0,
        }
    }

    pub fn step(&self) -> f32 {
        self.step
    }

    /// Total ticks released so far.
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Accumulates `dt` and returns how many whole ticks are now due.
    pub fn advance(&mut self, dt: f32) -> u32 {
        if !dt.is_finite() || dt <= 0.0 {
            return 0;
        }
        self.pending += dt;
        // Tolerate float drift so that `n * step` deltas yield exactly `n` ticks.
        let due = ((self.pending + self.step * 1e-3) / self.step).floor();
        let due = (due.max(0.0) as u32).min(MAX_TICKS_PER_ADVANCE);
        if due >= MAX_TICKS_PER_ADVANCE {
            self.pending = 0.0;
        } else {
            self.pending = (self.pending - due as f32 * self.step).max(0.0);
        }
        self.ticks += due as u64;
        due
    }
}

/// Named phase of a choreographed effect.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub name: String,
    pub duration: f32,
}

impl Segment {
    pub fn new(name: impl Into<String>, duration: f32) -> Self {
        let duration = if duration.is_finite() {
            duration.max(0.0)
        } else {
            0.0
        };
        Self {
            name: name.into(),
            duration,
        }
    }
}

/// Where a timeline currently sits.
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentPosition {
    pub index: usize,
    pub name: String,
    /// Normalized progress through the segment in `[0, 1)`.
    pub progress: f32,
    /// Seconds since the segment began.
    pub local_time: f32,
}

/// Ordered list of segments played back against a running clock.
///
/// Zero-length segments are never reported as current: they resolve instantly
/// and the timeline moves on to the next one.
#[derive(Debug, Clone, Default)]
pub struct Timeline {
    segments: Vec<Segment>,
    clock: PlaybackClock,
}

impl Timeline {
    pub fn new(segments: Vec<Segment>) -> Self {
        Self {
            segments,
            clock: PlaybackClock::default(),
        }
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn total_duration(&self) -> f32 {
        self.segments.iter().map(|s| s.duration).sum()
    }

    pub fn elapsed(&self) -> f32 {
        self.clock.time_seconds
    }

    pub fn advance(&mut self, dt: f32) {
        self.clock.advance(dt);
    }

    pub fn restart(&mut self) {
        self.clock.reset();
    }

    pub fn is_finished(&self) -> bool {
        self.position().is_none()
    }

    /// Current segment, or `None` once every segment has elapsed.
    pub fn position(&self) -> Option<SegmentPosition> {
        let now = self.clock.time_seconds;
        let mut start = 0.0;
        for (index, segment) in self.segments.iter().enumerate() {
            let end = start + segment.duration;
            if now < end {
                let local_time = (now - start).max(0.0);
                return Some(SegmentPosition {
                    index,
                    name: segment.name.clone(),
                    progress: crate::easing::progress(local_time, segment.duration)
                        .min(1.0 - f32::EPSILON),
                    local_time,
                });
            }
            start = end;
        }
        None
    }

    /// Index of the current segment, or `segments.len()` when finished.
    pub fn segment_index(&self) -> usize {
        self.position()
            .map(|p| p.index)
            .unwrap_or(self.segments.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn demo_timeline() -> Timeline {
        Timeline::new(vec![
            Segment::new("static", 1.0),
            Segment::new("rising", 2.0),
            Segment::new("instant", 0.0),
            Segment::new("falling", 0.5),
        ])
    }

    #[test]
    fn clock_ignores_invalid_deltas() {
        let mut clock = PlaybackClock::default();
        clock.advance(0.5);
        clock.advance(-1.0);
        clock.advance(f32::NAN);
        assert_eq!(clock.time_seconds, 0.5);
        clock.reset();
        assert_eq!(clock.time_seconds, 0.0);
    }

    #[test]
    fn ticker_releases_whole_steps() {
        let mut ticker = Ticker::with_rate(10.0);
        assert_eq!(ticker.advance(0.0), 0);
        assert_eq!(ticker.advance(0.05), 0);
        assert_eq!(ticker.advance(0.05), 1);
        assert_eq!(ticker.advance(0.3), 3);
        assert_eq!(ticker.ticks(), 4);
    }

    #[test]
    fn ticker_caps_catch_up() {
        let mut ticker = Ticker::with_rate(60.0);
        assert_eq!(ticker.advance(3600.0), MAX_TICKS_PER_ADVANCE);
        assert_eq!(ticker.advance(0.0), 0);
    }

    #[test]
    fn zero_length_segments_are_skipped() {
        let mut timeline = demo_timeline();
        timeline.advance(3.0);
        let pos = timeline.position().unwrap();
        assert_eq!(pos.name, "falling");
        assert_eq!(pos.progress, 0.0);
    }

    #[test]
    fn finishes_after_total_duration() {
        let mut timeline = demo_timeline();
        assert!((timeline.total_duration() - 3.5).abs() < 1e-6);
        timeline.advance(3.49);
        assert!(!timeline.is_finished());
        timeline.advance(0.02);
        assert!(timeline.is_finished());
        assert_eq!(timeline.segment_index(), 4);
    }

    proptest! {
        #[test]
        fn progress_is_monotonic_within_segments(steps in proptest::collection::vec(0.0f32..0.2, 1..80)) {
            let mut timeline = demo_timeline();
            let mut last: Option<SegmentPosition> = timeline.position();
            for dt in steps {
                timeline.advance(dt);
                let now = timeline.position();
                if let (Some(prev), Some(cur)) = (&last, &now) {
                    prop_assert!(cur.index >= prev.index);
                    if cur.index == prev.index {
                        prop_assert!(cur.progress >= prev.progress);
                    }
                    prop_assert!((0.0..1.0).contains(&cur.progress));
                }
                if last.is_none() {
                    prop_assert!(now.is_none());
                }
                last = now;
            }
        }
    }
}
