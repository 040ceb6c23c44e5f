//! The frame loop: picks effects, paces frames and feeds the sink.

use std::time::{Duration, Instant};

use rand::{rngs::StdRng, seq::SliceRandom, Rng, SeedableRng};

use crate::{
    catalog::EffectCatalog,
    config::AppConfig,
    control::CancelHandle,
    effect::Step,
    error::LedMatrixError,
    sink::DisplaySink,
    Result,
};

/// Budget for perpetual effects in a rotation when none is configured.
pub const DEFAULT_SWITCH_AFTER_SECS: f32 = 30.0;

/// Shuffled queue of effect ids that reshuffles the full set once drained,
/// so every id runs once per cycle.
#[derive(Debug, Clone)]
pub struct RotationQueue {
    ids: Vec<String>,
    pending: Vec<String>,
    rng: StdRng,
    cycle: u64,
    last: Option<String>,
}

impl RotationQueue {
    pub fn new(ids: Vec<String>, seed: u64) -> Result<Self> {
        if ids.is_empty() {
            return Err(LedMatrixError::config("rotation needs at least one effect"));
        }
        Ok(Self {
            ids,
            pending: Vec::new(),
            rng: StdRng::seed_from_u64(seed),
            cycle: 0,
            last: None,
        })
    }

    /// Completed reshuffles; `1` while the first permutation is playing.
    pub fn cycle(&self) -> u64 {
        self.cycle
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Ids still waiting in the current cycle.
    pub fn remaining(&self) -> usize {
        self.pending.len()
    }

    pub fn next(&mut self) -> String {
        if self.pending.is_empty() {
            self.reshuffle();
        }
        let id = self.pending.pop().unwrap_or_else(|| self.ids[0].clone());
        self.last = Some(id.clone());
        id
    }

    fn reshuffle(&mut self) {
        let mut order = self.ids.clone();
        order.shuffle(&mut self.rng);
        // Popped from the back; avoid replaying the previous id across the seam.
        if order.len() > 1 && order.last() == self.last.as_ref() {
            order.swap(0, self.ids.len() - 1);
        }
        self.pending = order;
        self.cycle += 1;
        tracing::info!(cycle = self.cycle, effects = self.ids.len(), "rotation reshuffled");
    }
}

/// How the loop turns wall time into `advance` deltas.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Pacing {
    /// Sleep out the rest of each frame interval and report measured deltas.
    Realtime,
    /// Never sleep; every frame advances by the given delta.
    Unpaced(f32),
}

/// Fixed-cadence frame timer.
#[derive(Debug, Clone)]
pub struct Pacer {
    pacing: Pacing,
    interval: Duration,
    last: Instant,
}

impl Pacer {
    pub fn new(pacing: Pacing, fps: u32) -> Self {
        Self {
            pacing,
            interval: Duration::from_secs_f64(1.0 / fps.max(1) as f64),
            last: Instant::now(),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Blocks until the next frame is due and returns the delta to simulate.
    pub fn wait(&mut self) -> f32 {
        match self.pacing {
            Pacing::Unpaced(dt) => dt,
            Pacing::Realtime => {
                let spent = self.last.elapsed();
                if spent < self.interval {
                    spin_sleep::sleep(self.interval - spent);
                }
                let now = Instant::now();
                let dt = now.duration_since(self.last).as_secs_f32();
                self.last = now;
                dt
            }
        }
    }
}

/// Why one effect run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// The effect reported `Done`.
    Completed,
    /// The switch budget ran out.
    TimedOut,
    /// Cancelled from outside.
    Interrupted,
    /// The frame cap was reached.
    FrameLimit,
}

impl RunOutcome {
    /// Whether the loop should stop rather than move on.
    pub fn ends_loop(self) -> bool {
        matches!(self, Self::Interrupted | Self::FrameLimit)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EffectRun {
    pub id: String,
    pub seed: u64,
    pub frames: u64,
    pub seconds: f32,
    pub outcome: RunOutcome,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlayerReport {
    pub runs: Vec<EffectRun>,
}

impl PlayerReport {
    pub fn total_frames(&self) -> u64 {
        self.runs.iter().map(|r| r.frames).sum()
    }

    pub fn frames_for(&self, id: &str) -> u64 {
        self.runs.iter().filter(|r| r.id == id).map(|r| r.frames).sum()
    }

    /// Outcome of the final run.
    pub fn outcome(&self) -> Option<RunOutcome> {
        self.runs.last().map(|r| r.outcome)
    }

    pub fn ids(&self) -> Vec<&str> {
        self.runs.iter().map(|r| r.id.as_str()).collect()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlayerOptions {
    pub pacing: Pacing,
    /// Per-effect budget in seconds. Overrides the rotation config.
    pub switch_after: Option<f32>,
    /// Stop after this many frames in total.
    pub max_frames: Option<u64>,
}

impl PlayerOptions {
    /// Rejects a switch budget that would end every run before its first frame.
    pub fn validate(&self) -> Result<()> {
        if let Some(secs) = self.switch_after {
            if !(secs.is_finite() && secs > 0.0) {
                return Err(LedMatrixError::config(format!(
                    "switch_after must be a positive number, got {secs}"
                )));
            }
        }
        Ok(())
    }
}

impl Default for PlayerOptions {
    fn default() -> Self {
        Self {
            pacing: Pacing::Realtime,
            switch_after: None,
            max_frames: None,
        }
    }
}

/// How long each run may last.
#[derive(Debug, Clone, Copy, PartialEq)]
enum SwitchPolicy {
    Fixed(Option<f32>),
    /// Perpetual effects get the default budget, finite ones run to `Done`.
    ByFamily,
}

/// Drives effects against a sink. One effect is active at a time.
#[derive(Debug)]
pub struct Player {
    catalog: EffectCatalog,
    config: AppConfig,
    options: PlayerOptions,
    seeds: StdRng,
    frames: u64,
}

impl Player {
    pub fn new(catalog: EffectCatalog, config: AppConfig) -> Result<Self> {
        config.validate()?;
        let seeds = match config.rotation.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Ok(Self {
            catalog,
            config,
            options: PlayerOptions::default(),
            seeds,
            frames: 0,
        })
    }

    pub fn with_options(mut self, options: PlayerOptions) -> Self {
        self.options = options;
        self
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Runs one effect, restarting it with a fresh seed each time it ends,
    /// until cancelled or the frame cap is hit.
    pub fn run_single(&mut self, id: &str, sink: &mut dyn DisplaySink, cancel: &CancelHandle) -> Result<PlayerReport> {
        self.options.validate()?;
        let policy = SwitchPolicy::Fixed(self.options.switch_after);
        self.guarded(sink, |player, sink, report| loop {
            let run = player.play(id, policy, sink, cancel)?;
            let outcome = run.outcome;
            report.runs.push(run);
            if outcome.ends_loop() {
                return Ok(());
            }
            tracing::debug!(effect = id, ?outcome, "restarting effect");
        })
    }

    /// Cycles through the configured effects in shuffled order.
    pub fn run_rotation(&mut self, sink: &mut dyn DisplaySink, cancel: &CancelHandle) -> Result<PlayerReport> {
        self.options.validate()?;
        let ids: Vec<String> = if self.config.rotation.effects.is_empty() {
            self.catalog.ids().into_iter().map(str::to_string).collect()
        } else {
            self.config.rotation.effects.clone()
        };
        if let Some(unknown) = ids.iter().find(|id| !self.catalog.contains(id)) {
            return Err(LedMatrixError::UnknownEffect(unknown.clone()));
        }
        let mut queue = RotationQueue::new(ids, self.seeds.gen())?;
        let policy = match self.options.switch_after.or(self.config.rotation.switch_after_secs) {
            Some(secs) => SwitchPolicy::Fixed(Some(secs)),
            None => SwitchPolicy::ByFamily,
        };

        self.guarded(sink, |player, sink, report| loop {
            let id = queue.next();
            let run = player.play(&id, policy, sink, cancel)?;
            let outcome = run.outcome;
            report.runs.push(run);
            if outcome.ends_loop() {
                return Ok(());
            }
            tracing::info!(from = %id, ?outcome, "switching effect");
        })
    }

    /// Headless bounded run of `frames` frames of one effect.
    pub fn run_for(&mut self, id: &str, frames: u64, sink: &mut dyn DisplaySink) -> Result<PlayerReport> {
        let saved = self.options.max_frames.replace(self.frames + frames);
        let result = self.run_single(id, sink, &CancelHandle::new());
        self.options.max_frames = saved;
        result
    }

    /// Runs `body`, then clears the sink whatever happened.
    fn guarded<F>(&mut self, sink: &mut dyn DisplaySink, body: F) -> Result<PlayerReport>
    where
        F: FnOnce(&mut Self, &mut dyn DisplaySink, &mut PlayerReport) -> Result<()>,
    {
        let mut report = PlayerReport::default();
        let result = body(self, &mut *sink, &mut report);
        let cleared = sink.clear();
        if let Err(err) = &result {
            tracing::error!(error = %err, "playback aborted");
            if let Err(clear_err) = cleared {
                tracing::warn!(error = %clear_err, "sink clear failed after error");
            }
            return result.map(|_| report);
        }
        cleared?;
        Ok(report)
    }

    fn play(&mut self, id: &str, policy: SwitchPolicy, sink: &mut dyn DisplaySink, cancel: &CancelHandle) -> Result<EffectRun> {
        let descriptor = self
            .catalog
            .get(id)
            .cloned()
            .ok_or_else(|| LedMatrixError::UnknownEffect(id.to_string()))?;
        let mut effect = self.catalog.instantiate(id, &self.config)?;
        let seed: u64 = self.seeds.gen();
        let (width, height) = (self.config.display.width, self.config.display.height);
        effect.reset(width, height, seed);
        let budget = match policy {
            SwitchPolicy::Fixed(budget) => budget,
            SwitchPolicy::ByFamily if effect.family().is_finite() => None,
            SwitchPolicy::ByFamily => Some(DEFAULT_SWITCH_AFTER_SECS),
        };

        let fps = self.config.display.fps_for(descriptor.native_fps);
        let mut pacer = Pacer::new(self.options.pacing, fps);
        let speed = self.config.speed;
        let mut frames = 0u64;
        let mut seconds = 0.0f32;
        tracing::info!(effect = id, seed, fps, family = effect.family().name(), ?budget, "effect started");

        let outcome = loop {
            if cancel.is_cancelled() {
                break RunOutcome::Interrupted;
            }
            if self.options.max_frames.is_some_and(|cap| self.frames >= cap) {
                break RunOutcome::FrameLimit;
            }
            if budget.is_some_and(|limit| seconds >= limit) {
                break RunOutcome::TimedOut;
            }
            let dt = pacer.wait();
            seconds += dt;
            match effect.advance(dt * speed) {
                Step::Done => break RunOutcome::Completed,
                Step::Frame(frame) => {
                    if let Err(err) = sink.present(&frame) {
                        tracing::warn!(effect = id, frames, error = %err, "sink rejected frame");
                        return Err(err);
                    }
                    frames += 1;
                    self.frames += 1;
                }
            }
        };
        tracing::info!(effect = id, frames, ?outcome, "effect stopped");
        Ok(EffectRun {
            id: id.to_string(),
            seed,
            frames,
            seconds,
            outcome,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::MemorySink;

    fn player(config: AppConfig, dt: f32) -> Player {
        let mut config = config;
        config.rotation.seed = Some(1);
        Player::new(EffectCatalog::builtin(), config).unwrap().with_options(PlayerOptions {
            pacing: Pacing::Unpaced(dt),
            ..PlayerOptions::default()
        })
    }

    fn small() -> AppConfig {
        let mut config = AppConfig::default();
        config.display.width = 16;
        config.display.height = 16;
        config
    }

    #[test]
    fn queue_rejects_empty_sets() {
        assert!(RotationQueue::new(Vec::new(), 0).is_err());
    }

    #[test]
    fn queue_does_not_repeat_across_reshuffles() {
        let ids: Vec<String> = ["a", "b", "c"].iter().map(|s| s.to_string()).collect();
        let mut queue = RotationQueue::new(ids, 5).unwrap();
        let mut previous = queue.next();
        for _ in 0..60 {
            let next = queue.next();
            assert_ne!(next, previous);
            previous = next;
        }
    }

    #[test]
    fn unpaced_pacer_returns_fixed_delta() {
        let mut pacer = Pacer::new(Pacing::Unpaced(0.25), 30);
        assert_eq!(pacer.wait(), 0.25);
        assert_eq!(pacer.interval(), Duration::from_secs_f64(1.0 / 30.0));
    }

    #[test]
    fn realtime_pacer_sleeps_out_the_interval() {
        let mut pacer = Pacer::new(Pacing::Realtime, 100);
        let started = Instant::now();
        pacer.wait();
        pacer.wait();
        assert!(started.elapsed() >= Duration::from_millis(15));
    }

    #[test]
    fn run_for_stops_at_the_frame_cap_and_clears() {
        let sink = MemorySink::new();
        let mut out = sink.clone();
        let report = player(small(), 1.0 / 30.0).run_for("fire", 25, &mut out).unwrap();
        assert_eq!(report.total_frames(), 25);
        assert_eq!(report.outcome(), Some(RunOutcome::FrameLimit));
        assert_eq!(sink.frame_count(), 25);
        assert_eq!(sink.clear_count(), 1);
    }

    #[test]
    fn finite_effects_restart_in_single_mode() {
        let mut config = small();
        config.text.text = "A".into();
        config.text.speed = 200.0;
        let mut sink = MemorySink::counting();
        let report = player(config, 1.0 / 60.0).run_for("text", 200, &mut sink).unwrap();
        assert!(report.runs.len() > 1);
        assert_eq!(report.runs[0].outcome, RunOutcome::Completed);
        assert_ne!(report.runs[0].seed, report.runs[1].seed);
    }

    #[test]
    fn rotation_switches_perpetual_effects_on_budget() {
        let mut config = small();
        config.rotation.effects = vec!["fire".into(), "starfall".into()];
        config.rotation.switch_after_secs = Some(0.5);
        let mut p = player(config, 0.125);
        p.options.max_frames = Some(30);
        let mut sink = MemorySink::counting();
        let report = p.run_rotation(&mut sink, &CancelHandle::new()).unwrap();
        assert_eq!(report.runs[0].outcome, RunOutcome::TimedOut);
        assert_eq!(report.runs[0].frames, 4);
        assert_ne!(report.runs[0].id, report.runs[1].id);
        assert_eq!(sink.clear_count(), 1);
    }

    #[test]
    fn static_text_is_switched_out_like_any_perpetual_effect() {
        let mut config = small();
        config.rotation.effects = vec!["text".into(), "fire".into()];
        config.text.scroll = false;
        let mut p = player(config, 1.0);
        p.options.max_frames = Some(200);
        let report = p.run_rotation(&mut MemorySink::counting(), &CancelHandle::new()).unwrap();
        let text = report.runs.iter().find(|r| r.id == "text").unwrap();
        assert_eq!(text.outcome, RunOutcome::TimedOut);
        assert_eq!(text.frames, DEFAULT_SWITCH_AFTER_SECS as u64);
        assert!(report.ids().contains(&"fire"));
    }

    #[test]
    fn non_positive_switch_budgets_are_rejected() {
        for bad in [0.0, -1.0, f32::NAN] {
            let mut p = player(small(), 0.1);
            p.options.switch_after = Some(bad);
            p.options.max_frames = Some(10);
            let sink = MemorySink::counting();
            let err = p.run_rotation(&mut sink.clone(), &CancelHandle::new()).unwrap_err();
            assert!(err.is_config_error());
            let err = p.run_single("fire", &mut sink.clone(), &CancelHandle::new()).unwrap_err();
            assert!(err.is_config_error());
            assert_eq!(sink.frame_count(), 0);
        }
    }

    #[test]
    fn rotation_rejects_unknown_ids() {
        let mut config = small();
        config.rotation.effects = vec!["nope".into()];
        let err = player(config, 0.1)
            .run_rotation(&mut MemorySink::new(), &CancelHandle::new())
            .unwrap_err();
        assert!(matches!(err, LedMatrixError::UnknownEffect(_)));
    }

    #[test]
    fn cancelled_runs_present_nothing() {
        let cancel = CancelHandle::new();
        cancel.cancel();
        let sink = MemorySink::new();
        let report = player(small(), 0.1).run_single("fire", &mut sink.clone(), &cancel).unwrap();
        assert_eq!(report.outcome(), Some(RunOutcome::Interrupted));
        assert_eq!(sink.frame_count(), 0);
        assert_eq!(sink.clear_count(), 1);
    }

    #[test]
    fn sink_failures_propagate_after_clearing() {
        let sink = MemorySink::counting().failing_after(3);
        let err = player(small(), 0.1)
            .run_for("starfall", 100, &mut sink.clone())
            .unwrap_err();
        assert!(matches!(err, LedMatrixError::Sink(_)));
        assert_eq!(sink.frame_count(), 3);
        assert_eq!(sink.clear_count(), 1);
    }

    #[test]
    fn speed_scales_simulated_time() {
        let mut config = small();
        config.speed = 2.0;
        config.text.text = "A".into();
        config.text.speed = 100.0;
        let mut sink = MemorySink::counting();
        let fast = player(config.clone(), 1.0 / 60.0).run_for("text", 1000, &mut sink).unwrap();
        config.speed = 1.0;
        let slow = player(config, 1.0 / 60.0).run_for("text", 1000, &mut sink).unwrap();
        assert!(fast.runs[0].frames < slow.runs[0].frames);
    }
}
