use rand::{rngs::StdRng, Rng};

use crate::{
    config::AppConfig,
    effect::{sanitize_dt, seeded_rng, Effect, EffectFamily, Step},
    palette::hsv,
    render::{Canvas, Rgb},
    timeline::Ticker,
    Result,
};

pub const ID: &str = "starfall";
pub const NATIVE_FPS: u32 = 60;

const MAX_DROPS: usize = 300;
/// Strength lost per tick.
const FADE: f32 = 0.977;
/// Below this a drop is invisible and gets respawned.
const EXTINGUISHED: f32 = 0.02;
const GLINT_CHANCE: f64 = 0.001;
const TICKS_PER_MODE: u32 = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorMode {
    /// Hue follows the drop's row.
    RowRainbow,
    RandomRgb,
    RandomHue,
    /// Mostly greyscale with the odd coloured drop.
    Mono,
}

impl ColorMode {
    const CYCLE: [ColorMode; 4] = [Self::RowRainbow, Self::RandomRgb, Self::RandomHue, Self::Mono];

    fn next(self) -> Self {
        let i = Self::CYCLE.iter().position(|m| *m == self).unwrap_or(0);
        Self::CYCLE[(i + 1) % Self::CYCLE.len()]
    }
}

#[derive(Debug, Clone, PartialEq)]
struct Drop {
    x: f32,
    row: usize,
    speed: f32,
    strength: f32,
    color: Rgb,
    glint_color: Rgb,
    glinting: bool,
}

impl Drop {
    fn spawn(rng: &mut StdRng, height: usize, mode: ColorMode) -> Self {
        let row = rng.gen_range(0..height.max(1));
        let hue_pick = hsv(rng.gen_range(0.0..1.0), 1.0, 1.0);
        let color = match mode {
            ColorMode::RowRainbow => hsv(row as f32 / (height.max(2) as f32 / 2.0), 1.0, 1.0),
            ColorMode::RandomRgb => Rgb::new(rng.gen(), rng.gen(), rng.gen()),
            ColorMode::RandomHue => hue_pick,
            ColorMode::Mono => {
                if rng.gen_bool(0.99) {
                    let grey = rng.gen();
                    Rgb::new(grey, grey, grey)
                } else {
                    hue_pick
                }
            }
        };
        Self {
            x: 0.0,
            row,
            speed: 1.0 + rng.gen_range(0.0..4.0),
            strength: rng.gen_range(40..=100) as f32 / 100.0,
            color,
            glint_color: hue_pick,
            glinting: false,
        }
    }

    fn tick(&mut self, rng: &mut StdRng, width: usize) {
        self.x += self.speed / 2.0;
        let last = width.saturating_sub(1) as f32;
        if self.x > last {
            self.x = last;
            self.strength = 0.0;
        }
        self.strength *= FADE;
        self.glinting = rng.gen_bool(GLINT_CHANCE);
    }

    fn extinguished(&self) -> bool {
        self.strength < EXTINGUISHED
    }
}

/// Coloured drops streaking across the panel and fading as they go.
#[derive(Debug, Clone)]
pub struct StarfallEffect {
    width: usize,
    height: usize,
    drops: Vec<Drop>,
    mode: ColorMode,
    mode_ticks: u32,
    ticker: Ticker,
    rng: StdRng,
}

impl StarfallEffect {
    pub fn new(config: &AppConfig) -> Result<Self> {
        config.display.validate()?;
        let mut effect = Self {
            width: 0,
            height: 0,
            drops: Vec::new(),
            mode: ColorMode::RandomRgb,
            mode_ticks: 0,
            ticker: Ticker::with_rate(NATIVE_FPS as f32),
            rng: seeded_rng(0),
        };
        effect.reset(config.display.width, config.display.height, 0);
        Ok(effect)
    }

    pub fn mode(&self) -> ColorMode {
        self.mode
    }

    fn tick(&mut self) {
        for i in 0..self.drops.len() {
            self.drops[i].tick(&mut self.rng, self.width);
            if self.drops[i].extinguished() {
                self.drops[i] = Drop::spawn(&mut self.rng, self.height, self.mode);
            }
        }
        self.mode_ticks += 1;
        if self.mode_ticks >= TICKS_PER_MODE {
            self.mode_ticks = 0;
            self.mode = self.mode.next();
            tracing::debug!(mode = ?self.mode, "starfall colour mode changed");
        }
    }
}

impl Effect for StarfallEffect {
    fn id(&self) -> &'static str {
        ID
    }

    fn family(&self) -> EffectFamily {
        EffectFamily::Perpetual
    }

    fn reset(&mut self, width: usize, height: usize, seed: u64) {
        self.width = width;
        self.height = height;
        self.rng = seeded_rng(seed);
        self.mode = ColorMode::RandomRgb;
        self.mode_ticks = 0;
        self.ticker = Ticker::with_rate(NATIVE_FPS as f32);
        let mode = self.mode;
        let rng = &mut self.rng;
        self.drops = (0..MAX_DROPS).map(|_| Drop::spawn(rng, height, mode)).collect();
    }

    fn advance(&mut self, dt: f32) -> Step {
        for _ in 0..self.ticker.advance(sanitize_dt(dt)) {
            self.tick();
        }
        let mut canvas = Canvas::new(self.width, self.height);
        for drop in &self.drops {
            let color = if drop.glinting {
                drop.glint_color
            } else {
                drop.color.scale(drop.strength)
            };
            canvas.add(drop.x as i64, drop.row as i64, color);
        }
        Step::Frame(canvas.into_frame())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effect::testing::{assert_zero_dt_is_idempotent, run_frames};

    const TICK: f32 = 1.0 / NATIVE_FPS as f32;

    #[test]
    fn drops_stay_on_the_panel_and_respawn() {
        let mut effect = StarfallEffect::new(&AppConfig::default()).unwrap();
        effect.reset(32, 16, 8);
        for _ in 0..500 {
            effect.tick();
            assert_eq!(effect.drops.len(), MAX_DROPS);
            for drop in &effect.drops {
                assert!(drop.x >= 0.0 && drop.x < 32.0);
                assert!(drop.row < 16);
            }
        }
    }

    #[test]
    fn colour_modes_cycle() {
        let mut effect = StarfallEffect::new(&AppConfig::default()).unwrap();
        effect.reset(16, 16, 1);
        assert_eq!(effect.mode(), ColorMode::RandomRgb);
        for _ in 0..TICKS_PER_MODE {
            effect.tick();
        }
        assert_eq!(effect.mode(), ColorMode::RandomHue);
        assert_eq!(ColorMode::Mono.next(), ColorMode::RowRainbow);
    }

    #[test]
    fn renders_something_after_a_few_ticks() {
        let mut effect = StarfallEffect::new(&AppConfig::default()).unwrap();
        effect.reset(64, 64, 2);
        let frame = run_frames(&mut effect, 64, 64, 5, TICK);
        assert!(frame.lit_count() > 0);
    }

    #[test]
    fn zero_delta_is_idempotent() {
        let mut effect = StarfallEffect::new(&AppConfig::default()).unwrap();
        effect.reset(32, 32, 3);
        run_frames(&mut effect, 32, 32, 5, TICK);
        assert_zero_dt_is_idempotent(&mut effect);
    }
}
