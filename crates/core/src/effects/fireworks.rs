use std::collections::VecDeque;

use rand::{rngs::StdRng, seq::SliceRandom, Rng};

use crate::{
    config::AppConfig,
    easing::{lerp, Ease},
    effect::{sanitize_dt, seeded_rng, Effect, EffectFamily, Step},
    palette::FIREWORK_COLORS,
    render::{Canvas, Rgb},
    timeline::Ticker,
    Result,
};

use super::{clamp_into, reflect_into};

pub const ID: &str = "fireworks";
pub const NATIVE_FPS: u32 = 20;

/// Ticks between bursts, drawn again after every burst.
const BURST_CADENCE: [u32; 3] = [10, 30, 60];
const ORBS_PER_BURST: usize = 5;
const SPARKLES_PER_BURST: usize = 10;
const RIPPLES_PER_BURST: usize = 2;
const SHAPES_PER_BURST: usize = 4;
const BURST_SIZE: usize = ORBS_PER_BURST + SPARKLES_PER_BURST + RIPPLES_PER_BURST + SHAPES_PER_BURST;
const ORB_TRAIL: usize = 5;
const ORB_MAX_RADIUS: f32 = 5.0;

#[derive(Debug, Clone, Copy, PartialEq)]
enum ShapeKind {
    Square,
    Circle,
    Cross,
}

#[derive(Debug, Clone, PartialEq)]
enum Motion {
    /// Drifting anchor with a spinning arm that leaves a short trail.
    Orb {
        velocity: (f32, f32),
        angle: f32,
        spin: f32,
        radius: f32,
        radius_step: f32,
        trail: VecDeque<(f32, f32)>,
    },
    /// Single pixel flying out to a target.
    Sparkle { origin: (f32, f32), target: (f32, f32) },
    /// Ring growing to `max_diameter`.
    Ripple { max_diameter: f32, diameter: f32 },
    /// Outline flying out to a target while spinning.
    Shape {
        kind: ShapeKind,
        origin: (f32, f32),
        target: (f32, f32),
        size: f32,
        angle: f32,
        spin: f32,
    },
}

#[derive(Debug, Clone, PartialEq)]
struct Particle {
    pos: (f32, f32),
    color: Rgb,
    life: u32,
    lifespan: u32,
    dead: bool,
    motion: Motion,
}

impl Particle {
    fn progress(&self) -> f32 {
        self.life as f32 / self.lifespan.max(1) as f32
    }

    fn step(&mut self, width: f32, height: f32) {
        self.life += 1;
        if self.life > self.lifespan {
            self.dead = true;
        }
        let eased = Ease::OutCirc.apply(self.progress());
        match &mut self.motion {
            Motion::Orb {
                velocity,
                angle,
                spin,
                radius,
                radius_step,
                trail,
            } => {
                *angle += *spin;
                let (x, vx) = reflect_into(self.pos.0 + velocity.0, velocity.0, width);
                let (y, vy) = reflect_into(self.pos.1 + velocity.1, velocity.1, height);
                self.pos = (x, y);
                *velocity = (vx, vy);
                *radius = (*radius + *radius_step).min(ORB_MAX_RADIUS);
                trail.push_back((x + *radius * angle.cos(), y + *radius * angle.sin()));
                while trail.len() > ORB_TRAIL {
                    trail.pop_front();
                }
            }
            Motion::Sparkle { origin, target } => {
                self.pos = (
                    clamp_into(lerp(origin.0, target.0, eased), width),
                    clamp_into(lerp(origin.1, target.1, eased), height),
                );
            }
            Motion::Ripple { max_diameter, diameter } => {
                *diameter = *max_diameter * eased;
            }
            Motion::Shape {
                origin,
                target,
                angle,
                spin,
                ..
            } => {
                self.pos = (
                    clamp_into(lerp(origin.0, target.0, eased), width),
                    clamp_into(lerp(origin.1, target.1, eased), height),
                );
                *angle += *spin;
            }
        }
    }

    fn draw(&self, canvas: &mut Canvas) {
        let (x, y) = self.pos;
        match &self.motion {
            Motion::Orb { trail, .. } => {
                let points: Vec<(f32, f32)> = trail.iter().copied().collect();
                if points.len() > 1 {
                    canvas.polyline(&points, self.color);
                }
            }
            Motion::Sparkle { .. } => canvas.plot(x, y, self.color),
            Motion::Ripple { diameter, .. } => canvas.circle(x, y, diameter / 2.0, self.color),
            Motion::Shape {
                kind, size, angle, ..
            } => match kind {
                ShapeKind::Square => {
                    let corners: Vec<(f32, f32)> = (0..5)
                        .map(|i| {
                            let a = *angle + i as f32 * std::f32::consts::FRAC_PI_2;
                            (x + size * a.cos(), y + size * a.sin())
                        })
                        .collect();
                    canvas.polyline(&corners, self.color);
                }
                ShapeKind::Circle => canvas.circle(x, y, *size, self.color),
                ShapeKind::Cross => {
                    canvas.line(x - size, y, x + size, y, self.color);
                    canvas.line(x, y - size, x, y + size, self.color);
                }
            },
        }
    }
}

/// Particle fireworks: random bursts of orbs, sparkles, ripples and shapes.
///
/// Particles age once per tick, are flagged dead past their lifespan and are
/// filtered out before the next burst is considered.
#[derive(Debug, Clone)]
pub struct FireworksEffect {
    max_particles: usize,
    width: usize,
    height: usize,
    particles: Vec<Particle>,
    ticks_to_burst: u32,
    ticker: Ticker,
    rng: StdRng,
}

impl FireworksEffect {
    pub fn new(config: &AppConfig) -> Result<Self> {
        config.fireworks.validate()?;
        let mut effect = Self {
            max_particles: config.fireworks.max_particles,
            width: 0,
            height: 0,
            particles: Vec::new(),
            ticks_to_burst: 0,
            ticker: Ticker::with_rate(NATIVE_FPS as f32),
            rng: seeded_rng(0),
        };
        effect.reset(config.display.width, config.display.height, 0);
        Ok(effect)
    }

    pub fn particle_count(&self) -> usize {
        self.particles.len()
    }

    /// Anchor positions of every live particle.
    pub fn positions(&self) -> impl Iterator<Item = (f32, f32)> + '_ {
        self.particles.iter().map(|p| p.pos)
    }

    fn tick(&mut self) {
        let (w, h) = (self.width as f32, self.height as f32);
        for particle in &mut self.particles {
            particle.step(w, h);
        }
        self.particles.retain(|p| !p.dead);

        if self.ticks_to_burst == 0 {
            if self.particles.len() + BURST_SIZE <= self.max_particles {
                self.burst();
            }
            self.ticks_to_burst = *BURST_CADENCE.choose(&mut self.rng).unwrap_or(&BURST_CADENCE[0]);
        }
        self.ticks_to_burst = self.ticks_to_burst.saturating_sub(1);
    }

    fn burst(&mut self) {
        let (w, h) = (self.width as f32, self.height as f32);
        if w <= 0.0 || h <= 0.0 {
            return;
        }
        let scale = w.min(h) / 64.0;
        let rng = &mut self.rng;
        let center = (rng.gen_range(0.0..w), rng.gen_range(0.0..h));
        let color = |rng: &mut StdRng| *FIREWORK_COLORS.choose(rng).unwrap_or(&Rgb::WHITE);
        let sign = |rng: &mut StdRng| if rng.gen_bool(0.5) { 1.0 } else { -1.0 };
        let target = |rng: &mut StdRng, reach: (f32, f32)| {
            let r = rng.gen_range(reach.0..reach.1) * scale;
            let a = rng.gen_range(0.0..std::f32::consts::TAU);
            (
                reflect_into(center.0 + r * a.cos(), 0.0, w).0,
                reflect_into(center.1 + r * a.sin(), 0.0, h).0,
            )
        };

        let mut spawned = Vec::with_capacity(BURST_SIZE);
        for _ in 0..ORBS_PER_BURST {
            spawned.push(Particle {
                pos: center,
                color: color(rng),
                life: 0,
                lifespan: rng.gen_range(20..=80),
                dead: false,
                motion: Motion::Orb {
                    velocity: (
                        sign(rng) * rng.gen_range(0.05..0.2) * scale,
                        sign(rng) * rng.gen_range(0.05..0.2) * scale,
                    ),
                    angle: rng.gen_range(0.0..std::f32::consts::TAU),
                    spin: sign(rng) * rng.gen_range(0.05..0.3),
                    radius: 0.0,
                    radius_step: rng.gen_range(0.3..1.0),
                    trail: VecDeque::from([center]),
                },
            });
        }
        for _ in 0..SPARKLES_PER_BURST {
            let dest = target(rng, (5.0, 30.0));
            spawned.push(Particle {
                pos: center,
                color: color(rng),
                life: 0,
                lifespan: rng.gen_range(30..=100),
                dead: false,
                motion: Motion::Sparkle {
                    origin: center,
                    target: dest,
                },
            });
        }
        for _ in 0..RIPPLES_PER_BURST {
            spawned.push(Particle {
                pos: center,
                color: color(rng),
                life: 0,
                lifespan: rng.gen_range(30..=80),
                dead: false,
                motion: Motion::Ripple {
                    max_diameter: rng.gen_range(10.0..25.0) * scale,
                    diameter: 0.0,
                },
            });
        }
        for _ in 0..SHAPES_PER_BURST {
            let kind = match rng.gen_range(0..3) {
                0 => ShapeKind::Square,
                1 => ShapeKind::Circle,
                _ => ShapeKind::Cross,
            };
            let dest = target(rng, (5.0, 25.0));
            spawned.push(Particle {
                pos: center,
                color: color(rng),
                life: 0,
                lifespan: rng.gen_range(30..=100),
                dead: false,
                motion: Motion::Shape {
                    kind,
                    origin: center,
                    target: dest,
                    size: rng.gen_range(3.0..10.0) * scale,
                    angle: rng.gen_range(0.0..std::f32::consts::TAU),
                    spin: sign(rng) * rng.gen_range(0.02..0.1),
                },
            });
        }
        self.particles.extend(spawned);
    }
}

impl Effect for FireworksEffect {
    fn id(&self) -> &'static str {
        ID
    }

    fn family(&self) -> EffectFamily {
        EffectFamily::Perpetual
    }

    fn reset(&mut self, width: usize, height: usize, seed: u64) {
        self.width = width;
        self.height = height;
        self.particles.clear();
        self.ticks_to_burst = 0;
        self.ticker = Ticker::with_rate(NATIVE_FPS as f32);
        self.rng = seeded_rng(seed);
    }

    fn advance(&mut self, dt: f32) -> Step {
        for _ in 0..self.ticker.advance(sanitize_dt(dt)) {
            self.tick();
        }
        let mut canvas = Canvas::new(self.width, self.height);
        for particle in &self.particles {
            particle.draw(&mut canvas);
        }
        Step::Frame(canvas.into_frame())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effect::testing::{assert_zero_dt_is_idempotent, run_frames};
    use proptest::prelude::*;

    const TICK: f32 = 1.0 / NATIVE_FPS as f32;

    #[test]
    fn first_tick_fires_a_burst() {
        let mut effect = FireworksEffect::new(&AppConfig::default()).unwrap();
        effect.reset(64, 64, 1);
        assert_eq!(effect.particle_count(), 0);
        let frame = run_frames(&mut effect, 64, 64, 1, TICK);
        assert_eq!(effect.particle_count(), BURST_SIZE);
        assert!(frame.lit_count() > 0);
    }

    #[test]
    fn dead_particles_are_filtered() {
        let mut effect = FireworksEffect::new(&AppConfig::default()).unwrap();
        effect.reset(64, 64, 2);
        // Longest lifespan is 100 ticks; a burst can only add, never resurrect.
        for _ in 0..400 {
            effect.tick();
            assert!(effect.particles.iter().all(|p| !p.dead));
        }
    }

    #[test]
    fn particle_cap_is_respected() {
        let mut config = AppConfig::default();
        config.fireworks.max_particles = BURST_SIZE;
        let mut effect = FireworksEffect::new(&config).unwrap();
        effect.reset(64, 64, 3);
        for _ in 0..300 {
            effect.tick();
            assert!(effect.particle_count() <= BURST_SIZE);
        }
    }

    #[test]
    fn zero_delta_is_idempotent() {
        let mut effect = FireworksEffect::new(&AppConfig::default()).unwrap();
        effect.reset(64, 64, 4);
        run_frames(&mut effect, 64, 64, 12, TICK);
        assert_zero_dt_is_idempotent(&mut effect);
    }

    proptest! {
        #[test]
        fn particles_stay_on_the_panel(seed in any::<u64>(), ticks in 1usize..300) {
            let mut effect = FireworksEffect::new(&AppConfig::default()).unwrap();
            effect.reset(64, 48, seed);
            for _ in 0..ticks {
                let before = effect.particles.len();
                for p in &mut effect.particles {
                    p.step(64.0, 48.0);
                }
                effect.particles.retain(|p| !p.dead);
                prop_assert!(effect.particles.len() <= before);
                effect.tick();
                for (x, y) in effect.positions() {
                    prop_assert!((0.0..64.0).contains(&x), "x = {}", x);
                    prop_assert!((0.0..48.0).contains(&y), "y = {}", y);
                }
            }
        }
    }
}
