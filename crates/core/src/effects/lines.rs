//! Short line and wave "performances". Each one plays a fixed sequence of
//! named segments with durations drawn per run, then reports `Done`.

use std::f32::consts::{PI, TAU};

use rand::{rngs::StdRng, Rng};

use crate::{
    config::AppConfig,
    easing::{tween, Ease},
    effect::{sanitize_dt, seeded_rng, Effect, EffectFamily, SegmentPosition, Step},
    render::{Canvas, Rgb},
    timeline::Segment,
    Result,
};

use super::{clamp_into, reflect_into, Choreography};

pub const RGB_LINES_ID: &str = "rgb-lines";
pub const ROTATING_LINE_ID: &str = "rotating-line";
pub const CHANGING_SQUARE_ID: &str = "changing-square";
pub const THREE_SINES_ID: &str = "three-sines";
pub const GRAVITY_ID: &str = "gravity";
pub const ONE_SINE_ID: &str = "one-sine";
pub const NATIVE_FPS: u32 = 60;

const TICK_HZ: f32 = 60.0;

fn pastel(rng: &mut StdRng) -> Rgb {
    Rgb::new(rng.gen_range(200..=255), rng.gen_range(200..=255), rng.gen_range(200..=255))
}

/// Rows scale with the panel height relative to the 64 pixel reference.
fn unit(height: usize) -> f32 {
    height as f32 / 64.0
}

macro_rules! choreographed {
    ($ty:ty, $id:expr) => {
        impl Effect for $ty {
            fn id(&self) -> &'static str {
                $id
            }

            fn family(&self) -> EffectFamily {
                EffectFamily::Choreographed
            }

            fn reset(&mut self, width: usize, height: usize, seed: u64) {
                *self = Self::start(width, height, seed);
            }

            fn advance(&mut self, dt: f32) -> Step {
                for pos in self.choreo.advance(sanitize_dt(dt)) {
                    self.tick(&pos);
                }
                match self.choreo.position() {
                    Some(pos) => Step::Frame(self.render(&pos).into_frame()),
                    None => Step::Done,
                }
            }

            fn segment(&self) -> Option<SegmentPosition> {
                self.choreo.position()
            }
        }
    };
}

/// Three primary-coloured lines wander apart and then return to the centre.
#[derive(Debug, Clone)]
pub struct RgbLinesEffect {
    width: usize,
    height: usize,
    choreo: Choreography,
    positions: [f32; 3],
    velocities: [f32; 3],
    targets: [f32; 3],
    colors: [Rgb; 3],
    speed: f32,
    smoothing: f32,
    rng: StdRng,
}

impl RgbLinesEffect {
    pub fn new(config: &AppConfig) -> Result<Self> {
        config.display.validate()?;
        Ok(Self::start(config.display.width, config.display.height, 0))
    }

    fn start(width: usize, height: usize, seed: u64) -> Self {
        let mut rng = seeded_rng(seed);
        let segments = vec![
            Segment::new("starting", rng.gen_range(1.0..3.0)),
            Segment::new("dispersing", rng.gen_range(15.0..25.0)),
            Segment::new("returning", rng.gen_range(2.0..4.0)),
        ];
        let center = height as f32 / 2.0;
        Self {
            width,
            height,
            choreo: Choreography::new(segments, TICK_HZ),
            positions: [center; 3],
            velocities: [0.0; 3],
            targets: [0.0; 3],
            colors: [
                Rgb::new(rng.gen_range(200..=255), 0, 0),
                Rgb::new(0, rng.gen_range(200..=255), 0),
                Rgb::new(0, 0, rng.gen_range(200..=255)),
            ],
            speed: rng.gen_range(0.3..0.8) * unit(height),
            smoothing: rng.gen_range(0.15..0.35),
            rng,
        }
    }

    pub fn positions(&self) -> [f32; 3] {
        self.positions
    }

    fn tick(&mut self, pos: &SegmentPosition) {
        let h = self.height as f32;
        match pos.name.as_str() {
            "dispersing" => {
                for i in 0..3 {
                    if self.rng.gen_bool(0.05) {
                        self.targets[i] = self.rng.gen_range(-self.speed..=self.speed);
                    }
                    self.velocities[i] += (self.targets[i] - self.velocities[i]) * self.smoothing;
                    let (p, target) = reflect_into(self.positions[i] + self.velocities[i], self.targets[i], h);
                    self.positions[i] = p;
                    self.targets[i] = target;
                }
            }
            "returning" => {
                let center = h / 2.0;
                for p in &mut self.positions {
                    let diff = center - *p;
                    *p = if diff.abs() > 0.1 { *p + diff * 0.1 } else { center };
                }
            }
            _ => {}
        }
    }

    fn render(&self, _pos: &SegmentPosition) -> Canvas {
        let mut canvas = Canvas::new(self.width, self.height);
        for (row, color) in self.positions.iter().zip(self.colors) {
            let y = row.floor() as i64;
            for x in 0..self.width as i64 {
                canvas.add(x, y, color);
            }
        }
        canvas
    }
}

choreographed!(RgbLinesEffect, RGB_LINES_ID);

/// A centred line holds still, then makes one full turn.
#[derive(Debug, Clone)]
pub struct RotatingLineEffect {
    width: usize,
    height: usize,
    choreo: Choreography,
    color: Rgb,
}

impl RotatingLineEffect {
    pub fn new(config: &AppConfig) -> Result<Self> {
        config.display.validate()?;
        Ok(Self::start(config.display.width, config.display.height, 0))
    }

    fn start(width: usize, height: usize, seed: u64) -> Self {
        let mut rng = seeded_rng(seed);
        let segments = vec![
            Segment::new("static", rng.gen_range(2.0..4.0)),
            Segment::new("rotating", rng.gen_range(15.0..25.0)),
        ];
        Self {
            width,
            height,
            choreo: Choreography::new(segments, TICK_HZ),
            color: pastel(&mut rng),
        }
    }

    fn tick(&mut self, _pos: &SegmentPosition) {}

    fn render(&self, pos: &SegmentPosition) -> Canvas {
        let angle = if pos.name == "rotating" {
            pos.progress * TAU
        } else {
            0.0
        };
        let (cx, cy) = (self.width as f32 / 2.0, self.height as f32 / 2.0);
        let half = self.width as f32 / 2.0;
        let (s, c) = angle.sin_cos();
        let mut canvas = Canvas::new(self.width, self.height);
        canvas.line(cx - half * c, cy - half * s, cx + half * c, cy + half * s, self.color);
        canvas
    }
}

choreographed!(RotatingLineEffect, ROTATING_LINE_ID);

/// A flat rectangle that eases toward a new randomly chosen width or height at
/// every segment boundary.
#[derive(Debug, Clone)]
pub struct ChangingSquareEffect {
    width: usize,
    height: usize,
    choreo: Choreography,
    size: (f32, f32),
    target: (f32, f32),
    targets_drawn: usize,
    change_speed: f32,
    color: Rgb,
    rng: StdRng,
}

impl ChangingSquareEffect {
    pub fn new(config: &AppConfig) -> Result<Self> {
        config.display.validate()?;
        Ok(Self::start(config.display.width, config.display.height, 0))
    }

    fn start(width: usize, height: usize, seed: u64) -> Self {
        let mut rng = seeded_rng(seed);
        let interval = rng.gen_range(1.5..3.0);
        let changes = rng.gen_range(6..=10);
        let mut segments = vec![Segment::new("line", interval)];
        segments.extend((0..changes).map(|_| Segment::new("resize", interval)));
        Self {
            width,
            height,
            choreo: Choreography::new(segments, TICK_HZ),
            size: (width as f32, 0.0),
            target: (width as f32, 0.0),
            targets_drawn: 0,
            change_speed: rng.gen_range(0.2..0.4),
            color: pastel(&mut rng),
            rng,
        }
    }

    /// Number of resize targets drawn so far.
    pub fn changes(&self) -> usize {
        self.targets_drawn
    }

    fn tick(&mut self, pos: &SegmentPosition) {
        if pos.index > self.targets_drawn {
            self.targets_drawn = pos.index;
            let (w, h) = (self.width as i64, self.height as i64);
            if self.rng.gen_bool(0.5) {
                self.target.0 = self.rng.gen_range(10.min(w)..=w) as f32;
            } else {
                self.target.1 = self.rng.gen_range(0..=h * 50 / 64) as f32;
            }
        }
        let approach = |current: f32, target: f32, speed: f32| {
            let diff = target - current;
            if diff.abs() < 0.1 {
                target
            } else {
                current + diff * speed
            }
        };
        self.size = (
            approach(self.size.0, self.target.0, self.change_speed),
            approach(self.size.1, self.target.1, self.change_speed),
        );
    }

    fn render(&self, _pos: &SegmentPosition) -> Canvas {
        let (w, h) = (self.width as f32, self.height as f32);
        let (sw, sh) = self.size;
        let x0 = (w - sw) / 2.0;
        let y0 = (h - sh) / 2.0;
        let x1 = x0 + sw - 1.0;
        let y1 = y0 + sh - 1.0;
        let mut canvas = Canvas::new(self.width, self.height);
        if sh > 1.0 {
            canvas.stroke_rect(x0, y0, x1, y1, self.color);
        } else {
            let mid = (h / 2.0).floor();
            canvas.line(x0, mid, x1, mid, self.color);
        }
        canvas
    }
}

choreographed!(ChangingSquareEffect, CHANGING_SQUARE_ID);

/// One line splits into a band, three phase-shifted sines play inside it, and
/// the band merges back.
#[derive(Debug, Clone)]
pub struct ThreeSinesEffect {
    width: usize,
    height: usize,
    choreo: Choreography,
    amplitude: f32,
    frequency: f32,
    speed: f32,
    rise: f32,
    fall: f32,
    waves: f32,
    colors: [Rgb; 3],
}

impl ThreeSinesEffect {
    pub fn new(config: &AppConfig) -> Result<Self> {
        config.display.validate()?;
        Ok(Self::start(config.display.width, config.display.height, 0))
    }

    fn start(width: usize, height: usize, seed: u64) -> Self {
        let mut rng = seeded_rng(seed);
        let amplitude = rng.gen_range(10..=15) as f32 * unit(height);
        let frequency = rng.gen_range(1.5..2.5);
        let speed = rng.gen_range(1.5..2.5);
        let rise = rng.gen_range(1.5..2.5);
        let fall = rng.gen_range(1.5..2.5);
        let waves = rng.gen_range(18.0..22.0);
        let mut tint = |hi: usize| {
            let mut channels = [0u8; 3];
            for (i, c) in channels.iter_mut().enumerate() {
                *c = if i == hi {
                    rng.gen_range(200..=255)
                } else {
                    rng.gen_range(150..=200)
                };
            }
            Rgb::new(channels[0], channels[1], channels[2])
        };
        let colors = [tint(0), tint(1), tint(2)];
        Self {
            width,
            height,
            choreo: Choreography::new(
                vec![
                    Segment::new("line", 3.0),
                    Segment::new("splitting", 1.0),
                    Segment::new("waves", waves),
                    Segment::new("merging", 1.0),
                ],
                TICK_HZ,
            ),
            amplitude,
            frequency,
            speed,
            rise,
            fall,
            waves,
            colors,
        }
    }

    /// Amplitude envelope over the `waves` segment.
    fn envelope(&self, local: f32) -> f32 {
        if local < self.rise {
            tween(0.0, self.amplitude, local / self.rise, Ease::InOutCubic)
        } else if local > self.waves - self.fall {
            tween(0.0, self.amplitude, (self.waves - local) / self.fall, Ease::InOutCubic)
        } else {
            self.amplitude
        }
    }

    fn tick(&mut self, _pos: &SegmentPosition) {}

    fn render(&self, pos: &SegmentPosition) -> Canvas {
        let mut canvas = Canvas::new(self.width, self.height);
        let center = self.height as f32 / 2.0;
        let right = self.width.saturating_sub(1) as f32;
        let band = self.amplitude + 2.0;
        let hline = |canvas: &mut Canvas, y: f32| canvas.line(0.0, y.floor(), right, y.floor(), Rgb::WHITE);

        match pos.name.as_str() {
            "line" => hline(&mut canvas, center),
            "splitting" | "merging" => {
                let spread = if pos.name == "splitting" {
                    Ease::InOutCubic.apply(pos.progress)
                } else {
                    Ease::InOutCubic.apply(1.0 - pos.progress)
                };
                hline(&mut canvas, center);
                hline(&mut canvas, center - band * spread);
                hline(&mut canvas, center + band * spread);
            }
            _ => {
                let amplitude = self.envelope(pos.local_time);
                let border = amplitude + 2.0;
                hline(&mut canvas, center - border);
                hline(&mut canvas, center + border);
                let offset = pos.local_time * self.speed;
                let max_y = self.height.saturating_sub(1) as f32;
                for (k, color) in self.colors.iter().enumerate() {
                    let phase = k as f32 * TAU / 3.0;
                    let points: Vec<(f32, f32)> = (0..self.width)
                        .map(|x| {
                            let arg = TAU * self.frequency * x as f32 / self.width as f32 + phase + offset;
                            let y = (center + amplitude * arg.sin()).clamp(0.0, max_y).floor();
                            (x as f32, y)
                        })
                        .collect();
                    canvas.polyline(&points, *color);
                }
            }
        }
        canvas
    }
}

choreographed!(ThreeSinesEffect, THREE_SINES_ID);

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GravityParticle {
    pub x: f32,
    pub y: f32,
    vx: f32,
    vy: f32,
}

impl GravityParticle {
    fn update(&mut self, damping: f32, width: f32, height: f32) {
        self.vx *= damping;
        self.vy *= damping;
        self.x += self.vx;
        self.y += self.vy;
        if self.x < 0.0 || self.x >= width {
            self.vx *= -0.5;
        }
        if self.y < 0.0 || self.y >= height {
            self.vy *= -0.5;
        }
        self.x = clamp_into(self.x, width);
        self.y = clamp_into(self.y, height);
    }
}

pub const GRAVITY_PARTICLES: usize = 64;

/// A row of particles blasts apart and is then pulled back into line.
#[derive(Debug, Clone)]
pub struct GravityEffect {
    width: usize,
    height: usize,
    choreo: Choreography,
    particles: Vec<GravityParticle>,
    damping: f32,
    spread_force: f32,
    gather_force: f32,
    rng: StdRng,
}

impl GravityEffect {
    pub fn new(config: &AppConfig) -> Result<Self> {
        config.display.validate()?;
        Ok(Self::start(config.display.width, config.display.height, 0))
    }

    fn start(width: usize, height: usize, seed: u64) -> Self {
        let mut rng = seeded_rng(seed);
        let segments = vec![
            Segment::new("spread", rng.gen_range(18.0..22.0)),
            Segment::new("gather", rng.gen_range(18.0..22.0)),
        ];
        let mut effect = Self {
            width,
            height,
            choreo: Choreography::new(segments, TICK_HZ),
            particles: Vec::new(),
            damping: rng.gen_range(0.96..0.99),
            spread_force: rng.gen_range(1.5..2.5),
            gather_force: rng.gen_range(2.5..3.5),
            rng,
        };
        effect.particles = (0..GRAVITY_PARTICLES)
            .map(|i| {
                let (x, y) = effect.home(i);
                GravityParticle { x, y, vx: 0.0, vy: 0.0 }
            })
            .collect();
        effect
    }

    pub fn particles(&self) -> &[GravityParticle] {
        &self.particles
    }

    fn home(&self, i: usize) -> (f32, f32) {
        let x = i as f32 * self.width as f32 / GRAVITY_PARTICLES as f32;
        (clamp_into(x, self.width as f32), (self.height / 2) as f32)
    }

    fn tick(&mut self, pos: &SegmentPosition) {
        let (w, h) = (self.width as f32, self.height as f32);
        let n = GRAVITY_PARTICLES as f32;
        for i in 0..self.particles.len() {
            let (tx, ty) = self.home(i);
            let p = &mut self.particles[i];
            if pos.name == "spread" {
                let start = i as f32 / n;
                if pos.progress > start {
                    let local = ((pos.progress - start) / (1.0 - start)).min(1.0);
                    if local < 0.1 {
                        let angle = self.rng.gen_range(0.0..TAU);
                        let force = self.spread_force * (0.1 - local) * 10.0;
                        p.vx += angle.cos() * force;
                        p.vy += angle.sin() * force;
                    }
                }
            } else {
                let released = pos.progress * n;
                let (dx, dy) = (tx - p.x, ty - p.y);
                if (i as f32) < released {
                    let strength = self.gather_force * (1.0 + (released - i as f32) * 0.1);
                    p.vx += dx * strength * 0.1;
                    p.vy += dy * strength * 0.1;
                } else {
                    p.vx += dx * 0.01;
                    p.vy += dy * 0.01;
                }
            }
            p.update(self.damping, w, h);
        }
    }

    fn render(&self, _pos: &SegmentPosition) -> Canvas {
        let mut canvas = Canvas::new(self.width, self.height);
        for p in &self.particles {
            canvas.set(p.x.round() as i64, p.y.round() as i64, Rgb::WHITE);
        }
        canvas
    }
}

choreographed!(GravityEffect, GRAVITY_ID);

/// A flat line that grows into a travelling sine and flattens out again.
#[derive(Debug, Clone)]
pub struct OneSineEffect {
    width: usize,
    height: usize,
    choreo: Choreography,
    ticks: u64,
    max_amplitude: f32,
    max_frequency: f32,
    color: Rgb,
}

impl OneSineEffect {
    pub fn new(config: &AppConfig) -> Result<Self> {
        config.display.validate()?;
        Ok(Self::start(config.display.width, config.display.height, 0))
    }

    fn start(width: usize, height: usize, seed: u64) -> Self {
        let mut rng = seeded_rng(seed);
        let segments = vec![
            Segment::new("static", rng.gen_range(2.0..4.0)),
            Segment::new("increasing", rng.gen_range(18.0..22.0)),
            Segment::new("decreasing", rng.gen_range(18.0..22.0)),
        ];
        Self {
            width,
            height,
            choreo: Choreography::new(segments, TICK_HZ),
            ticks: 0,
            max_amplitude: rng.gen_range(20..=30) as f32 * unit(height),
            max_frequency: rng.gen_range(3.0..5.0),
            color: pastel(&mut rng),
        }
    }

    fn tick(&mut self, _pos: &SegmentPosition) {
        self.ticks += 1;
    }

    fn render(&self, pos: &SegmentPosition) -> Canvas {
        let shape = match pos.name.as_str() {
            "increasing" => Ease::Smoothstep.apply(pos.progress),
            "decreasing" => 1.0 - Ease::Smoothstep.apply(pos.progress),
            _ => 0.0,
        };
        let amplitude = self.max_amplitude * shape;
        let frequency = self.max_frequency * shape;
        let phase = if shape > 0.0 { self.ticks as f32 * 0.1 } else { 0.0 };
        let center = self.height as f32 / 2.0;
        let max_y = self.height.saturating_sub(1) as f32;
        let points: Vec<(f32, f32)> = (0..self.width)
            .map(|x| {
                let arg = frequency * 2.0 * PI * x as f32 / self.width as f32 + phase;
                (x as f32, (center + (amplitude * arg.sin()).trunc()).clamp(0.0, max_y))
            })
            .collect();
        let mut canvas = Canvas::new(self.width, self.height);
        canvas.polyline(&points, self.color);
        canvas
    }
}

choreographed!(OneSineEffect, ONE_SINE_ID);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effect::testing::{assert_zero_dt_is_idempotent, run_to_done};
    use proptest::prelude::*;

    const DT: f32 = 1.0 / 60.0;

    fn all(config: &AppConfig) -> Vec<Box<dyn Effect>> {
        vec![
            Box::new(RgbLinesEffect::new(config).unwrap()),
            Box::new(RotatingLineEffect::new(config).unwrap()),
            Box::new(ChangingSquareEffect::new(config).unwrap()),
            Box::new(ThreeSinesEffect::new(config).unwrap()),
            Box::new(GravityEffect::new(config).unwrap()),
            Box::new(OneSineEffect::new(config).unwrap()),
        ]
    }

    #[test]
    fn every_performance_finishes_near_its_total_duration() {
        let config = AppConfig::default();
        for (seed, mut effect) in all(&config).into_iter().enumerate() {
            effect.reset(64, 64, seed as u64);
            let mut segments_seen = 0;
            let mut last: Option<SegmentPosition> = None;
            let mut frames = 0usize;
            loop {
                match effect.advance(DT) {
                    Step::Frame(frame) => {
                        assert_eq!(frame.width(), 64);
                        frames += 1;
                    }
                    Step::Done => break,
                }
                let pos = effect.segment().unwrap();
                match &last {
                    Some(prev) if prev.index == pos.index => assert!(pos.progress >= prev.progress),
                    Some(prev) => {
                        assert!(pos.index > prev.index);
                        segments_seen += 1;
                    }
                    None => segments_seen += 1,
                }
                last = Some(pos);
                assert!(frames < 60 * 120, "{} never finished", effect.id());
            }
            assert!(segments_seen >= 2, "{}", effect.id());
            assert!(effect.advance(DT).is_done(), "{} must stay done", effect.id());
        }
    }

    #[test]
    fn run_length_matches_segment_sum() {
        let config = AppConfig::default();
        let mut effect = RotatingLineEffect::new(&config).unwrap();
        effect.reset(64, 64, 11);
        let total = effect.choreo.total_duration();
        let frames = run_to_done(&mut effect, DT, 60 * 60);
        let played = (frames + 1) as f32 * DT;
        assert!((played - total).abs() <= 2.0 * DT, "played {played}, expected {total}");
    }

    #[test]
    fn changing_square_draws_one_target_per_boundary() {
        let mut effect = ChangingSquareEffect::new(&AppConfig::default()).unwrap();
        effect.reset(64, 64, 5);
        run_to_done(&mut effect, DT, 60 * 60);
        assert!((6..=10).contains(&effect.changes()), "{}", effect.changes());
    }

    #[test]
    fn zero_delta_is_idempotent_mid_performance() {
        for mut effect in all(&AppConfig::default()) {
            effect.reset(32, 32, 2);
            for _ in 0..300 {
                effect.advance(DT);
            }
            assert_zero_dt_is_idempotent(effect.as_mut());
        }
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(16))]

        #[test]
        fn gravity_particles_never_leave_the_panel(seed in any::<u64>()) {
            let mut effect = GravityEffect::new(&AppConfig::default()).unwrap();
            effect.reset(40, 24, seed);
            while !effect.advance(4.0 * DT).is_done() {
                for p in effect.particles() {
                    prop_assert!(p.x >= 0.0 && p.x < 40.0);
                    prop_assert!(p.y >= 0.0 && p.y < 24.0);
                }
            }
        }

        #[test]
        fn rgb_lines_stay_on_the_panel(seed in any::<u64>()) {
            let mut effect = RgbLinesEffect::new(&AppConfig::default()).unwrap();
            effect.reset(16, 16, seed);
            while !effect.advance(4.0 * DT).is_done() {
                for y in effect.positions() {
                    prop_assert!((0.0..16.0).contains(&y));
                }
            }
        }
    }
}
