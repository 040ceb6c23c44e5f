use rand::{rngs::StdRng, Rng};

use crate::{
    config::{AppConfig, FireConfig},
    effect::{sanitize_dt, seeded_rng, Effect, EffectFamily, Step},
    palette::{FirePalette, FireStyle},
    render::Canvas,
    timeline::Ticker,
    Result,
};

pub const ID: &str = "fire";
pub const NATIVE_FPS: u32 = 14;

/// Heat below this on the bottom row is replaced with fresh embers.
const EMBER_FLOOR: u8 = 30;

/// Classic heat-buffer fire: sparks are injected along the bottom row and the
/// heat rises by averaging the three cells below with a random cooling offset.
#[derive(Debug, Clone)]
pub struct FireEffect {
    settings: FireConfig,
    palette: FirePalette,
    width: usize,
    height: usize,
    heat: Vec<u8>,
    ticker: Ticker,
    rng: StdRng,
}

impl FireEffect {
    pub fn new(config: &AppConfig) -> Result<Self> {
        config.fire.validate()?;
        let style: FireStyle = config.fire.palette.parse()?;
        let mut effect = Self {
            settings: config.fire.clone(),
            palette: FirePalette::new(style),
            width: 0,
            height: 0,
            heat: Vec::new(),
            ticker: Ticker::with_rate(NATIVE_FPS as f32),
            rng: seeded_rng(0),
        };
        effect.reset(config.display.width, config.display.height, 0);
        Ok(effect)
    }

    pub fn palette(&self) -> &FirePalette {
        &self.palette
    }

    pub fn heat_at(&self, x: usize, y: usize) -> Option<u8> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.heat.get(y * self.width + x).copied()
    }

    fn tick(&mut self) {
        let (w, h) = (self.width, self.height);
        if w == 0 || h == 0 {
            return;
        }
        let base = (h - 1) * w;
        for x in 0..w {
            let cell = &mut self.heat[base + x];
            if self.rng.gen::<f32>() < self.settings.spark_chance {
                let spark: u16 = self.rng.gen_range(150..=255);
                *cell = (*cell as u16 + spark).min(255) as u8;
            } else {
                *cell = cell.saturating_sub(self.settings.decay);
            }
            if *cell < EMBER_FLOOR {
                *cell = self.rng.gen_range(20..=60);
            }
        }

        let cooling = -(self.settings.cooling as i32);
        let intensity = self.settings.intensity as i32;
        for y in (0..h - 1).rev() {
            let below = (y + 1) * w;
            for x in 0..w {
                let bottom = self.heat[below + x] as i32;
                let left = if x > 0 { self.heat[below + x - 1] as i32 } else { bottom };
                let right = if x + 1 < w { self.heat[below + x + 1] as i32 } else { bottom };
                let avg = (bottom + left + right) / 3;
                let offset = self.rng.gen_range(cooling..=intensity);
                self.heat[y * w + x] = (avg + offset).clamp(0, 255) as u8;
            }
        }
    }

    fn render(&self) -> Canvas {
        let mut canvas = Canvas::new(self.width, self.height);
        for (i, heat) in self.heat.iter().enumerate() {
            let (x, y) = (i % self.width, i / self.width);
            canvas.set(x as i64, y as i64, self.palette.color(*heat));
        }
        canvas
    }
}

impl Effect for FireEffect {
    fn id(&self) -> &'static str {
        ID
    }

    fn family(&self) -> EffectFamily {
        EffectFamily::Perpetual
    }

    fn reset(&mut self, width: usize, height: usize, seed: u64) {
        self.width = width;
        self.height = height;
        self.heat = vec![0; width * height];
        self.ticker = Ticker::with_rate(NATIVE_FPS as f32);
        self.rng = seeded_rng(seed);
    }

    fn advance(&mut self, dt: f32) -> Step {
        for _ in 0..self.ticker.advance(sanitize_dt(dt)) {
            self.tick();
        }
        Step::Frame(self.render().into_frame())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effect::testing::{assert_zero_dt_is_idempotent, run_frames};
    use crate::LedMatrixError;

    fn small_config() -> AppConfig {
        let mut config = AppConfig::default();
        config.display.width = 16;
        config.display.height = 12;
        config
    }

    #[test]
    fn rejects_unknown_palette_before_running() {
        let mut config = small_config();
        config.fire.palette = "green".into();
        let err = FireEffect::new(&config).unwrap_err();
        assert!(matches!(err, LedMatrixError::UnknownPalette(_)));
    }

    #[test]
    fn rejects_out_of_range_cooling() {
        let mut config = small_config();
        config.fire.cooling = 5;
        assert!(FireEffect::new(&config).unwrap_err().is_config_error());
    }

    #[test]
    fn base_row_never_goes_cold() {
        let mut fire = FireEffect::new(&small_config()).unwrap();
        fire.reset(16, 12, 9);
        run_frames(&mut fire, 16, 12, 40, 1.0 / NATIVE_FPS as f32);
        for x in 0..16 {
            assert!(fire.heat_at(x, 11).unwrap() >= 20);
        }
    }

    #[test]
    fn frames_are_palette_lookups_of_heat() {
        let mut fire = FireEffect::new(&small_config()).unwrap();
        fire.reset(16, 12, 3);
        let frame = run_frames(&mut fire, 16, 12, 10, 1.0 / NATIVE_FPS as f32);
        for y in 0..12 {
            for x in 0..16 {
                let heat = fire.heat_at(x, y).unwrap();
                assert_eq!(frame.pixel(x, y), Some(fire.palette().color(heat)));
            }
        }
    }

    #[test]
    fn same_seed_same_flames() {
        let config = small_config();
        let mut a = FireEffect::new(&config).unwrap();
        let mut b = FireEffect::new(&config).unwrap();
        a.reset(16, 12, 42);
        b.reset(16, 12, 42);
        assert_eq!(run_frames(&mut a, 16, 12, 20, 0.1), run_frames(&mut b, 16, 12, 20, 0.1));
    }

    #[test]
    fn zero_delta_does_not_burn() {
        let mut fire = FireEffect::new(&small_config()).unwrap();
        fire.reset(16, 12, 1);
        run_frames(&mut fire, 16, 12, 5, 0.1);
        assert_zero_dt_is_idempotent(&mut fire);
    }
}
