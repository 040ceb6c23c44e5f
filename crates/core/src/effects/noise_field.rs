use rand::Rng;

use crate::{
    config::AppConfig,
    easing::{lerp, Ease},
    effect::{sanitize_dt, seeded_rng, Effect, EffectFamily, Step},
    palette::hsv,
    render::Canvas,
    timeline::PlaybackClock,
    Result,
};

pub const ID: &str = "noise-field";
pub const NATIVE_FPS: u32 = 30;

/// Organic colour plasma built from two octaves of hashed value noise.
#[derive(Debug, Clone)]
pub struct NoiseFieldEffect {
    width: usize,
    height: usize,
    clock: PlaybackClock,
    params: NoiseParams,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct NoiseParams {
    noise_seed: u32,
    hue_offset: f32,
    /// Spatial frequency multiplier.
    scale: f32,
    drift: (f32, f32),
}

impl NoiseParams {
    fn draw(seed: u64) -> Self {
        let mut rng = seeded_rng(seed);
        let angle = rng.gen_range(0.0..std::f32::consts::TAU);
        Self {
            noise_seed: rng.gen(),
            hue_offset: rng.gen_range(0.0..1.0),
            scale: rng.gen_range(0.6..1.0),
            drift: (angle.cos(), angle.sin()),
        }
    }
}

impl NoiseFieldEffect {
    pub fn new(config: &AppConfig) -> Result<Self> {
        config.display.validate()?;
        let mut effect = Self {
            width: 0,
            height: 0,
            clock: PlaybackClock::default(),
            params: NoiseParams::draw(0),
        };
        effect.reset(config.display.width, config.display.height, 0);
        Ok(effect)
    }

    fn sample(&self, x: f32, y: f32, t: f32) -> f32 {
        let p = &self.params;
        let (dx, dy) = p.drift;
        let coarse = value_noise(p.noise_seed, x + dx * t, y + dy * t, t * 0.5);
        let fine = value_noise(
            p.noise_seed.wrapping_add(0x9e37),
            2.0 * x - dy * t * 1.7,
            2.0 * y + dx * t * 1.7,
            t * 0.8,
        );
        0.65 * coarse + 0.35 * fine
    }
}

impl Effect for NoiseFieldEffect {
    fn id(&self) -> &'static str {
        ID
    }

    fn family(&self) -> EffectFamily {
        EffectFamily::Perpetual
    }

    fn reset(&mut self, width: usize, height: usize, seed: u64) {
        self.width = width;
        self.height = height;
        self.clock.reset();
        self.params = NoiseParams::draw(seed);
    }

    fn advance(&mut self, dt: f32) -> Step {
        self.clock.advance(sanitize_dt(dt));
        let time = self.clock.time_seconds;
        let t = time * 0.3;
        let span = self.width.max(self.height).max(1) as f32;
        let freq = 4.0 * self.params.scale / span;

        let mut canvas = Canvas::new(self.width, self.height);
        for y in 0..self.height {
            for x in 0..self.width {
                let n = self.sample(x as f32 * freq, y as f32 * freq, t);
                let hue = self.params.hue_offset + n * 0.8 + time * 0.02;
                let value = lerp(0.15, 1.0, Ease::Smoothstep.apply(n));
                canvas.set(x as i64, y as i64, hsv(hue, 0.9, value));
            }
        }
        Step::Frame(canvas.into_frame())
    }
}

/// Lattice hash in `[0, 1)`.
fn lattice(seed: u32, x: i32, y: i32, z: i32) -> f32 {
    let mut h = seed
        ^ (x as u32).wrapping_mul(0x8da6_b343)
        ^ (y as u32).wrapping_mul(0xd816_3841)
        ^ (z as u32).wrapping_mul(0xcb1a_b31f);
    h ^= h >> 15;
    h = h.wrapping_mul(0x2c1b_3c6d);
    h ^= h >> 12;
    h = h.wrapping_mul(0x297a_2d39);
    h ^= h >> 15;
    (h >> 8) as f32 / (1u32 << 24) as f32
}

/// Smoothly interpolated 3-D value noise in `[0, 1)`.
fn value_noise(seed: u32, x: f32, y: f32, z: f32) -> f32 {
    if !(x.is_finite() && y.is_finite() && z.is_finite()) {
        return 0.0;
    }
    let (x0, y0, z0) = (x.floor(), y.floor(), z.floor());
    let (fx, fy, fz) = (
        Ease::Smoothstep.apply(x - x0),
        Ease::Smoothstep.apply(y - y0),
        Ease::Smoothstep.apply(z - z0),
    );
    let (ix, iy, iz) = (x0 as i32, y0 as i32, z0 as i32);
    let corner = |dx: i32, dy: i32, dz: i32| lattice(seed, ix + dx, iy + dy, iz + dz);

    let x00 = lerp(corner(0, 0, 0), corner(1, 0, 0), fx);
    let x10 = lerp(corner(0, 1, 0), corner(1, 1, 0), fx);
    let x01 = lerp(corner(0, 0, 1), corner(1, 0, 1), fx);
    let x11 = lerp(corner(0, 1, 1), corner(1, 1, 1), fx);
    lerp(lerp(x00, x10, fy), lerp(x01, x11, fy), fz)
}
