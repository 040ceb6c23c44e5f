//! Scrolling or centred text in the built-in bitmap font.

pub(crate) mod font;

use crate::{
    config::AppConfig,
    effect::{sanitize_dt, Effect, EffectFamily, SegmentPosition, Step},
    error::LedMatrixError,
    palette::TextScheme,
    render::{Canvas, Rgb},
    timeline::Segment,
    Result,
};

use super::Choreography;

pub const ID: &str = "text";
pub const NATIVE_FPS: u32 = 60;

/// Vertical gap between lines.
const LINE_SPACING: usize = 2;
/// Extra distance scrolled past the left edge before the pass ends.
const SCROLL_TAIL: usize = 10;

const GLOW_OFFSETS: [(i64, i64); 8] = [(-1, -1), (0, -1), (1, -1), (-1, 0), (1, 0), (-1, 1), (0, 1), (1, 1)];

/// Decodes `\n`, `\t` and `\\`; any other escape is rejected.
pub fn decode_escapes(raw: &str) -> Result<String> {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('\\') => out.push('\\'),
            Some(other) => return Err(LedMatrixError::TextEscape(format!("\\{other}"))),
            None => return Err(LedMatrixError::TextEscape("trailing backslash".to_string())),
        }
    }
    Ok(out)
}

/// A laid-out block of lines, each centred within the widest.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct TextBlock {
    lines: Vec<String>,
    width: usize,
}

impl TextBlock {
    pub fn new(text: &str) -> Self {
        let lines: Vec<String> = text.split('\n').map(str::to_string).collect();
        let width = lines.iter().map(|l| line_width(l)).max().unwrap_or(0);
        Self { lines, width }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        let n = self.lines.len();
        n * font::GLYPH_HEIGHT + n.saturating_sub(1) * LINE_SPACING
    }

    /// Draws the block with its top-left corner at `(x, y)`. The glow pass
    /// goes underneath so the main colour stays crisp.
    pub fn draw(&self, canvas: &mut Canvas, x: i64, y: i64, main: Rgb, glow: Option<Rgb>) {
        if let Some(glow) = glow {
            for (dx, dy) in GLOW_OFFSETS {
                self.paint(canvas, x + dx, y + dy, glow);
            }
        }
        self.paint(canvas, x, y, main);
    }

    fn paint(&self, canvas: &mut Canvas, x: i64, y: i64, color: Rgb) {
        for (row, line) in self.lines.iter().enumerate() {
            let top = y + (row * (font::GLYPH_HEIGHT + LINE_SPACING)) as i64;
            let mut left = x + ((self.width - line_width(line)) / 2) as i64;
            for c in line.chars() {
                for gy in 0..font::GLYPH_HEIGHT {
                    for gx in 0..font::GLYPH_WIDTH {
                        if font::lit(c, gx, gy) {
                            canvas.set(left + gx as i64, top + gy as i64, color);
                        }
                    }
                }
                left += font::advance(c) as i64;
            }
        }
    }
}

fn line_width(line: &str) -> usize {
    // Trailing inter-glyph gap is not part of the ink.
    line.chars().map(font::advance).sum::<usize>().saturating_sub(1)
}

#[derive(Debug, Clone)]
pub struct TextEffect {
    block: TextBlock,
    scheme: TextScheme,
    glow: bool,
    scroll: bool,
    speed: f32,
    width: usize,
    height: usize,
    choreo: Choreography,
}

impl TextEffect {
    pub fn new(config: &AppConfig) -> Result<Self> {
        config.display.validate()?;
        config.text.validate()?;
        let text = decode_escapes(&config.text.text)?;
        let scheme = TextScheme::named(&config.text.scheme)?;
        let mut effect = Self {
            block: TextBlock::new(&text),
            scheme,
            glow: config.text.glow,
            scroll: config.text.scroll,
            speed: config.text.speed,
            width: 0,
            height: 0,
            choreo: Choreography::new(Vec::new(), NATIVE_FPS as f32),
        };
        effect.reset(config.display.width, config.display.height, 0);
        Ok(effect)
    }

    /// Pixels travelled during one scroll pass.
    pub fn scroll_distance(&self) -> usize {
        self.width + self.block.width() + SCROLL_TAIL
    }

    pub fn text_width(&self) -> usize {
        self.block.width()
    }

    fn left_edge(&self, pos: Option<&SegmentPosition>) -> i64 {
        match pos {
            Some(pos) if self.scroll => self.width as i64 - (pos.local_time * self.speed).floor() as i64,
            _ => (self.width as i64 - self.block.width() as i64) / 2,
        }
    }

    fn render(&self, pos: Option<&SegmentPosition>) -> Canvas {
        let mut canvas = Canvas::filled(self.width, self.height, self.scheme.background);
        let top = (self.height as i64 - self.block.height() as i64) / 2;
        let glow = self.glow.then_some(self.scheme.glow);
        self.block.draw(&mut canvas, self.left_edge(pos), top, self.scheme.main, glow);
        canvas
    }
}

impl Effect for TextEffect {
    fn id(&self) -> &'static str {
        ID
    }

    fn family(&self) -> EffectFamily {
        if self.scroll {
            EffectFamily::Choreographed
        } else {
            EffectFamily::Perpetual
        }
    }

    fn reset(&mut self, width: usize, height: usize, _seed: u64) {
        self.width = width;
        self.height = height;
        let segments = if self.scroll {
            vec![Segment::new("scroll", self.scroll_distance() as f32 / self.speed)]
        } else {
            Vec::new()
        };
        self.choreo = Choreography::new(segments, NATIVE_FPS as f32);
    }

    fn advance(&mut self, dt: f32) -> Step {
        if !self.scroll {
            return Step::Frame(self.render(None).into_frame());
        }
        self.choreo.advance(sanitize_dt(dt));
        match self.choreo.position() {
            Some(pos) => Step::Frame(self.render(Some(&pos)).into_frame()),
            None => Step::Done,
        }
    }

    fn segment(&self) -> Option<SegmentPosition> {
        if self.scroll {
            self.choreo.position()
        } else {
            None
        }
    }
}
