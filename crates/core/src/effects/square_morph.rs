use rand::{rngs::StdRng, Rng};

use crate::{
    config::AppConfig,
    easing::{lerp, Ease},
    effect::{sanitize_dt, seeded_rng, Effect, EffectFamily, SegmentPosition, Step},
    palette::MORPH_COLORS,
    render::{Canvas, Rgb},
    timeline::Segment,
    Result,
};

use super::Choreography;

pub const ID: &str = "square-morph";
pub const NATIVE_FPS: u32 = 30;

const RISE_SECS: f32 = 3.0;
const HOLD_SECS: f32 = 1.0;
const FALL_SECS: f32 = 3.0;
const REST_SECS: f32 = 1.0;
const CYCLE_SECS: f32 = RISE_SECS + HOLD_SECS + FALL_SECS + REST_SECS;
const EASE: Ease = Ease::InOutQuart;

/// Axis-aligned rectangle stored by its centre.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
}

impl Rect {
    fn lerp(self, other: Rect, t: f32) -> Rect {
        Rect {
            x: lerp(self.x, other.x, t),
            y: lerp(self.y, other.y, t),
            w: lerp(self.w, other.w, t),
            h: lerp(self.h, other.h, t),
        }
    }

    pub fn area(&self) -> f32 {
        self.w * self.h
    }
}

/// Splits `rect` across its longer side at a random ratio, `depth` times,
/// appending the `2^depth` leaves to `out`.
pub fn subdivide(rect: Rect, depth: u32, rng: &mut StdRng, out: &mut Vec<Rect>) {
    let ww = rng.gen_range(0.1..0.9) * rect.w;
    let hh = rng.gen_range(0.1..0.9) * rect.h;
    if depth == 0 {
        out.push(rect);
        return;
    }
    let Rect { x, y, w, h } = rect;
    if w < h {
        subdivide(Rect { x, y: y - h / 2.0 + hh / 2.0, w, h: hh }, depth - 1, rng, out);
        subdivide(Rect { x, y: y + h / 2.0 - (h - hh) / 2.0, w, h: h - hh }, depth - 1, rng, out);
    } else {
        subdivide(Rect { x: x - w / 2.0 + ww / 2.0, y, w: ww, h }, depth - 1, rng, out);
        subdivide(Rect { x: x + w / 2.0 - (w - ww) / 2.0, y, w: w - ww, h }, depth - 1, rng, out);
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Tile {
    from: Rect,
    to: Rect,
    /// Seconds this tile lags behind the timeline; grows with distance from
    /// the centre so the morph ripples outward.
    delay: f32,
}

/// Two recursive subdivisions of the panel morph into each other and back,
/// flashing through the accent palette on the way.
#[derive(Debug, Clone)]
pub struct SquareMorphEffect {
    cycles: u32,
    depth: u32,
    width: usize,
    height: usize,
    choreo: Choreography,
    tiles: Vec<Tile>,
    color_offset: usize,
}

impl SquareMorphEffect {
    pub fn new(config: &AppConfig) -> Result<Self> {
        config.display.validate()?;
        config.morph.validate()?;
        let mut effect = Self {
            cycles: config.morph.cycles,
            depth: config.morph.depth,
            width: 0,
            height: 0,
            choreo: Choreography::new(Vec::new(), NATIVE_FPS as f32),
            tiles: Vec::new(),
            color_offset: 0,
        };
        effect.reset(config.display.width, config.display.height, 0);
        Ok(effect)
    }

    pub fn tile_count(&self) -> usize {
        self.tiles.len()
    }

    /// Accent colours used while rising and falling in `cycle`.
    fn cycle_colors(&self, cycle: usize) -> (Rgb, Rgb) {
        let n = MORPH_COLORS.len();
        let base = self.color_offset + cycle * 2;
        (MORPH_COLORS[base % n], MORPH_COLORS[(base + 1) % n])
    }

    /// Geometry and colour of `tile` at `t` seconds into its cycle.
    fn tile_state(tile: &Tile, t: f32, colors: (Rgb, Rgb)) -> (Rect, Rgb) {
        let flash = |accent: Rgb, eased: f32| Rgb::BLACK.lerp(accent, (eased * std::f32::consts::PI).sin());
        if t <= 0.0 {
            (tile.from, Rgb::BLACK)
        } else if t < RISE_SECS {
            let e = EASE.apply(t / RISE_SECS);
            (tile.from.lerp(tile.to, e), flash(colors.0, e))
        } else if t < RISE_SECS + HOLD_SECS {
            (tile.to, Rgb::BLACK)
        } else if t < RISE_SECS + HOLD_SECS + FALL_SECS {
            let e = EASE.apply((t - RISE_SECS - HOLD_SECS) / FALL_SECS);
            (tile.to.lerp(tile.from, e), flash(colors.1, e))
        } else {
            (tile.from, Rgb::BLACK)
        }
    }

    fn render(&self, pos: &SegmentPosition) -> Canvas {
        let cycle = pos.index / 4;
        let offset = match pos.index % 4 {
            0 => 0.0,
            1 => RISE_SECS,
            2 => RISE_SECS + HOLD_SECS,
            _ => RISE_SECS + HOLD_SECS + FALL_SECS,
        };
        let colors = self.cycle_colors(cycle);
        let mut canvas = Canvas::filled(self.width, self.height, Rgb::WHITE);
        for tile in &self.tiles {
            let (rect, color) = Self::tile_state(tile, offset + pos.local_time - tile.delay, colors);
            canvas.fill_rect(
                rect.x - rect.w / 2.0,
                rect.y - rect.h / 2.0,
                rect.x + rect.w / 2.0,
                rect.y + rect.h / 2.0,
                color,
            );
        }
        canvas
    }
}

impl Effect for SquareMorphEffect {
    fn id(&self) -> &'static str {
        ID
    }

    fn family(&self) -> EffectFamily {
        EffectFamily::Choreographed
    }

    fn reset(&mut self, width: usize, height: usize, seed: u64) {
        let mut rng = seeded_rng(seed);
        let (w, h) = (width as f32, height as f32);
        let (cx, cy) = (w / 2.0, h / 2.0);
        let mut outer = Vec::new();
        let mut inner = Vec::new();
        subdivide(Rect { x: cx, y: cy, w: w * 0.9, h: h * 0.9 }, self.depth, &mut rng, &mut outer);
        subdivide(Rect { x: cx, y: cy, w: w * 0.6, h: h * 0.6 }, self.depth, &mut rng, &mut inner);
        let unit = w.min(h) / 64.0;
        self.tiles = outer
            .into_iter()
            .zip(inner)
            .map(|(from, to)| {
                let dist = ((cx - from.x).powi(2) + (cy - from.y).powi(2)).sqrt();
                let lag_ticks = if unit > 0.0 { (dist / (10.0 * unit)).floor() } else { 0.0 };
                Tile {
                    from,
                    to,
                    delay: lag_ticks / NATIVE_FPS as f32,
                }
            })
            .collect();

        let segments = (0..self.cycles)
            .flat_map(|_| {
                [
                    Segment::new("rise", RISE_SECS),
                    Segment::new("hold", HOLD_SECS),
                    Segment::new("fall", FALL_SECS),
                    Segment::new("rest", REST_SECS),
                ]
            })
            .collect();
        self.choreo = Choreography::new(segments, NATIVE_FPS as f32);
        self.color_offset = rng.gen_range(0..MORPH_COLORS.len());
        self.width = width;
        self.height = height;
    }

    fn advance(&mut self, dt: f32) -> Step {
        self.choreo.advance(sanitize_dt(dt));
        match self.choreo.position() {
            Some(pos) => Step::Frame(self.render(&pos).into_frame()),
            None => Step::Done,
        }
    }

    fn segment(&self) -> Option<SegmentPosition> {
        self.choreo.position()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effect::testing::{assert_zero_dt_is_idempotent, run_to_done};

    const DT: f32 = 1.0 / NATIVE_FPS as f32;

    #[test]
    fn subdivision_tiles_the_parent() {
        let mut rng = seeded_rng(3);
        let parent = Rect { x: 32.0, y: 32.0, w: 57.6, h: 57.6 };
        let mut leaves = Vec::new();
        subdivide(parent, 5, &mut rng, &mut leaves);
        assert_eq!(leaves.len(), 32);
        let area: f32 = leaves.iter().map(Rect::area).sum();
        assert!((area - parent.area()).abs() < 1e-2);
    }

    #[test]
    fn finishes_after_configured_cycles() {
        let mut config = AppConfig::default();
        config.morph.cycles = 2;
        let mut effect = SquareMorphEffect::new(&config).unwrap();
        effect.reset(64, 64, 7);
        let frames = run_to_done(&mut effect, DT, 10_000);
        let played = (frames + 1) as f32 * DT;
        assert!((played - 2.0 * CYCLE_SECS).abs() <= 2.0 * DT);
    }

    #[test]
    fn colours_advance_every_half_cycle() {
        let mut effect = SquareMorphEffect::new(&AppConfig::default()).unwrap();
        effect.reset(32, 32, 1);
        let (rise0, fall0) = effect.cycle_colors(0);
        let (rise1, _) = effect.cycle_colors(1);
        assert_ne!(rise0, fall0);
        assert_ne!(fall0, rise1);
    }

    #[test]
    fn tiles_are_black_at_rest_and_lit_mid_rise() {
        let tile = Tile {
            from: Rect { x: 5.0, y: 5.0, w: 4.0, h: 4.0 },
            to: Rect { x: 6.0, y: 6.0, w: 2.0, h: 2.0 },
            delay: 0.0,
        };
        let colors = (MORPH_COLORS[0], MORPH_COLORS[1]);
        assert_eq!(SquareMorphEffect::tile_state(&tile, 0.0, colors), (tile.from, Rgb::BLACK));
        let (_, mid) = SquareMorphEffect::tile_state(&tile, RISE_SECS / 2.0, colors);
        let accent = MORPH_COLORS[0];
        assert!((mid.r as i16 - accent.r as i16).abs() <= 1);
        assert!((mid.g as i16 - accent.g as i16).abs() <= 1);
        assert!((mid.b as i16 - accent.b as i16).abs() <= 1);
        let (held, _) = SquareMorphEffect::tile_state(&tile, RISE_SECS + 0.5, colors);
        assert_eq!(held, tile.to);
    }

    #[test]
    fn zero_delta_is_idempotent() {
        let mut effect = SquareMorphEffect::new(&AppConfig::default()).unwrap();
        effect.reset(32, 32, 4);
        for _ in 0..50 {
            effect.advance(DT);
        }
        assert_zero_dt_is_idempotent(&mut effect);
        assert_eq!(effect.tile_count(), 1 << AppConfig::default().morph.depth);
    }
}
