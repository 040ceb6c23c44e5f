use rand::Rng;

use crate::{
    config::AppConfig,
    effect::{sanitize_dt, seeded_rng, Effect, EffectFamily, Step},
    palette::cosine_gradient,
    render::{Canvas, Rgb},
    timeline::PlaybackClock,
    Result,
};

pub const ID: &str = "kaleidoscope";
pub const NATIVE_FPS: u32 = 30;

const FOLDS: usize = 4;

/// Folded-space shader. Each pixel is a pure function of its position and the
/// accumulated time, so the effect holds no per-pixel state.
#[derive(Debug, Clone)]
pub struct KaleidoscopeEffect {
    width: usize,
    height: usize,
    clock: PlaybackClock,
    /// Time offset drawn per run so consecutive runs start on different colours.
    phase: f32,
}

impl KaleidoscopeEffect {
    pub fn new(config: &AppConfig) -> Result<Self> {
        config.display.validate()?;
        let mut effect = Self {
            width: 0,
            height: 0,
            clock: PlaybackClock::default(),
            phase: 0.0,
        };
        effect.reset(config.display.width, config.display.height, 0);
        Ok(effect)
    }

    fn shade(&self, px: usize, py: usize, time: f32) -> Rgb {
        let aspect = self.width as f32 / self.height.max(1) as f32;
        let u0 = unit_coord(px, self.width) * aspect;
        let v0 = unit_coord(py, self.height);
        let len0 = (u0 * u0 + v0 * v0).sqrt();
        let falloff = (-len0).exp();

        let (mut u, mut v) = (u0, v0);
        let mut color = [0.0f32; 3];
        for i in 0..FOLDS {
            u = (u * 1.5).rem_euclid(1.0) - 0.5;
            v = (v * 1.5).rem_euclid(1.0) - 0.5;
            let mut d = (u * u + v * v).sqrt() * falloff;
            let tint = palette(len0 + i as f32 * 0.4 + time * 0.4);
            d = ((d * 8.0 + time).sin() / 8.0).abs() / 0.4;
            let glow = if d > 0.001 { (0.01 / d).powf(1.2) } else { 0.0 };
            for c in 0..3 {
                color[c] += tint[c] * glow;
            }
        }
        Rgb::from_unit(color[0], color[1], color[2])
    }
}

/// Maps a pixel index onto `[-1, 1]` with both ends included.
fn unit_coord(i: usize, n: usize) -> f32 {
    if n <= 1 {
        return 0.0;
    }
    -1.0 + 2.0 * i as f32 / (n - 1) as f32
}

fn palette(t: f32) -> [f32; 3] {
    let a = 0.5f32.sin();
    let b = 0.5f32.cos();
    cosine_gradient(
        t.cos(),
        [a; 3],
        [b; 3],
        [1.0; 3],
        [0.263f32.sin(), 0.416f32.sin(), 0.557f32.sin()],
    )
}

impl Effect for KaleidoscopeEffect {
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
        self.phase = seeded_rng(seed).gen_range(0.0..std::f32::consts::TAU);
    }

    fn advance(&mut self, dt: f32) -> Step {
        self.clock.advance(sanitize_dt(dt));
        let time = self.clock.time_seconds + self.phase;
        let mut canvas = Canvas::new(self.width, self.height);
        for y in 0..self.height {
            for x in 0..self.width {
                canvas.set(x as i64, y as i64, self.shade(x, y, time));
            }
        }
        Step::Frame(canvas.into_frame())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effect::testing::{assert_zero_dt_is_idempotent, run_frames};

    #[test]
    fn animates_over_time() {
        let mut effect = KaleidoscopeEffect::new(&AppConfig::default()).unwrap();
        effect.reset(32, 32, 5);
        let first = run_frames(&mut effect, 32, 32, 1, 0.0);
        let later = run_frames(&mut effect, 32, 32, 10, 1.0 / 30.0);
        assert_ne!(first, later);
        assert!(later.lit_count() > 0);
    }

    #[test]
    fn zero_delta_is_idempotent() {
        let mut effect = KaleidoscopeEffect::new(&AppConfig::default()).unwrap();
        effect.reset(16, 16, 1);
        assert_zero_dt_is_idempotent(&mut effect);
    }

    #[test]
    fn single_pixel_panel_does_not_divide_by_zero() {
        let mut effect = KaleidoscopeEffect::new(&AppConfig::default()).unwrap();
        effect.reset(1, 1, 0);
        run_frames(&mut effect, 1, 1, 3, 0.1);
    }
}
