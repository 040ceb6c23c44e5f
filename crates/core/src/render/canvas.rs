use super::{Frame, Rgb};

/// Mutable drawing surface used by effects to build a [`Frame`].
///
/// Every primitive clips to the canvas bounds. Coordinates that are out of
/// range, infinite or NaN are skipped rather than reported, so a single bad
/// primitive never aborts the frame.
#[derive(Debug, Clone)]
pub struct Canvas {
    width: usize,
    height: usize,
    pixels: Vec<Rgb>,
}

impl Canvas {
    pub fn new(width: usize, height: usize) -> Self {
        Self::filled(width, height, Rgb::BLACK)
    }

    pub fn filled(width: usize, height: usize, color: Rgb) -> Self {
        Self {
            width,
            height,
            pixels: vec![color; width * height],
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn fill(&mut self, color: Rgb) {
        self.pixels.fill(color);
    }

    pub fn get(&self, x: i64, y: i64) -> Option<Rgb> {
        self.index(x, y).map(|i| self.pixels[i])
    }

    /// Sets an integer pixel, ignoring coordinates outside the canvas.
    pub fn set(&mut self, x: i64, y: i64, color: Rgb) {
        if let Some(i) = self.index(x, y) {
            self.pixels[i] = color;
        }
    }

    /// Adds `color` onto the existing pixel with per-channel saturation.
    pub fn add(&mut self, x: i64, y: i64, color: Rgb) {
        if let Some(i) = self.index(x, y) {
            self.pixels[i] = self.pixels[i].saturating_add(color);
        }
    }

    /// Sets the pixel containing the floating point position `(x, y)`.
    pub fn plot(&mut self, x: f32, y: f32, color: Rgb) {
        if let Some((x, y)) = to_cell(x, y) {
            self.set(x, y, color);
        }
    }

    /// One pixel wide line between two points.
    pub fn line(&mut self, x0: f32, y0: f32, x1: f32, y1: f32, color: Rgb) {
        let Some((x0, y0, x1, y1)) = self.clip_segment(x0, y0, x1, y1) else {
            return;
        };
        let (mut x, mut y) = (x0.round() as i64, y0.round() as i64);
        let (x1, y1) = (x1.round() as i64, y1.round() as i64);
        let dx = (x1 - x).abs();
        let dy = -(y1 - y).abs();
        let sx = if x < x1 { 1 } else { -1 };
        let sy = if y < y1 { 1 } else { -1 };
        let mut err = dx + dy;
        loop {
            self.set(x, y, color);
            if x == x1 && y == y1 {
                break;
            }
            let e2 = 2 * err;
            if e2 >= dy {
                err += dy;
                x += sx;
            }
            if e2 <= dx {
                err += dx;
                y += sy;
            }
        }
    }

    /// Line with a square brush of `width` pixels.
    pub fn thick_line(&mut self, x0: f32, y0: f32, x1: f32, y1: f32, width: f32, color: Rgb) {
        let width = if width.is_finite() { width.max(1.0) } else { 1.0 };
        let spread = ((width - 1.0) / 2.0).round() as i64;
        if spread == 0 {
            self.line(x0, y0, x1, y1, color);
            return;
        }
        for oy in -spread..=spread {
            for ox in -spread..=spread {
                let (ox, oy) = (ox as f32, oy as f32);
                self.line(x0 + ox, y0 + oy, x1 + ox, y1 + oy, color);
            }
        }
    }

    pub fn polyline(&mut self, points: &[(f32, f32)], color: Rgb) {
        match points {
            [] => {}
            [(x, y)] => self.plot(*x, *y, color),
            _ => {
                for pair in points.windows(2) {
                    self.line(pair[0].0, pair[0].1, pair[1].0, pair[1].1, color);
                }
            }
        }
    }

    /// Filled rectangle with inclusive corners, in any corner order.
    pub fn fill_rect(&mut self, x0: f32, y0: f32, x1: f32, y1: f32, color: Rgb) {
        let Some((left, top, right, bottom)) = self.clip_rect(x0, y0, x1, y1) else {
            return;
        };
        for y in top..=bottom {
            let row = y * self.width;
            self.pixels[row + left..=row + right].fill(color);
        }
    }

    /// Rectangle outline with inclusive corners.
    pub fn stroke_rect(&mut self, x0: f32, y0: f32, x1: f32, y1: f32, color: Rgb) {
        self.line(x0, y0, x1, y0, color);
        self.line(x1, y0, x1, y1, color);
        self.line(x1, y1, x0, y1, color);
        self.line(x0, y1, x0, y0, color);
    }

    /// Circle outline of radius `r` around `(cx, cy)`.
    pub fn circle(&mut self, cx: f32, cy: f32, r: f32, color: Rgb) {
        if !(cx.is_finite() && cy.is_finite() && r.is_finite()) || r < 0.0 {
            return;
        }
        if r < 0.5 {
            self.plot(cx, cy, color);
            return;
        }
        let steps = ((r * std::f32::consts::TAU).ceil() as usize).clamp(8, 4096) * 2;
        let mut prev = (cx + r, cy);
        for i in 1..=steps {
            let a = i as f32 / steps as f32 * std::f32::consts::TAU;
            let next = (cx + r * a.cos(), cy + r * a.sin());
            self.line(prev.0, prev.1, next.0, next.1, color);
            prev = next;
        }
    }

    /// Filled disc of radius `r` around `(cx, cy)`.
    pub fn disc(&mut self, cx: f32, cy: f32, r: f32, color: Rgb) {
        if !(cx.is_finite() && cy.is_finite() && r.is_finite()) || r < 0.0 {
            return;
        }
        if r < 0.5 {
            self.plot(cx, cy, color);
            return;
        }
        let Some((left, top, right, bottom)) = self.clip_rect(cx - r, cy - r, cx + r, cy + r) else {
            return;
        };
        let r2 = r * r;
        for y in top..=bottom {
            let dy = y as f32 + 0.5 - cy;
            for x in left..=right {
                let dx = x as f32 + 0.5 - cx;
                if dx * dx + dy * dy <= r2 {
                    self.pixels[y * self.width + x] = color;
                }
            }
        }
    }

    /// Finishes drawing and hands out the immutable frame.
    pub fn into_frame(self) -> Frame {
        Frame::from_parts(self.width, self.height, self.pixels)
    }

    fn index(&self, x: i64, y: i64) -> Option<usize> {
        if x < 0 || y < 0 {
            return None;
        }
        let (x, y) = (x as usize, y as usize);
        if x >= self.width || y >= self.height {
            return None;
        }
        Some(y * self.width + x)
    }

    /// Clamps an inclusive float rectangle to canvas cells.
    fn clip_rect(&self, x0: f32, y0: f32, x1: f32, y1: f32) -> Option<(usize, usize, usize, usize)> {
        if ![x0, y0, x1, y1].iter().all(|v| v.is_finite()) || self.width == 0 || self.height == 0 {
            return None;
        }
        let (left, right) = (x0.min(x1).floor(), x0.max(x1).floor());
        let (top, bottom) = (y0.min(y1).floor(), y0.max(y1).floor());
        let max_x = (self.width - 1) as f32;
        let max_y = (self.height - 1) as f32;
        if right < 0.0 || bottom < 0.0 || left > max_x || top > max_y {
            return None;
        }
        Some((
            left.max(0.0) as usize,
            top.max(0.0) as usize,
            right.min(max_x) as usize,
            bottom.min(max_y) as usize,
        ))
    }

    /// Liang-Barsky clip against the canvas grown by one cell on each side.
    fn clip_segment(&self, x0: f32, y0: f32, x1: f32, y1: f32) -> Option<(f32, f32, f32, f32)> {
        if ![x0, y0, x1, y1].iter().all(|v| v.is_finite()) {
            return None;
        }
        let (xmin, ymin) = (-1.0_f32, -1.0_f32);
        let (xmax, ymax) = (self.width as f32, self.height as f32);
        let (dx, dy) = (x1 - x0, y1 - y0);
        let mut t0 = 0.0_f32;
        let mut t1 = 1.0_f32;
        for (p, q) in [
            (-dx, x0 - xmin),
            (dx, xmax - x0),
            (-dy, y0 - ymin),
            (dy, ymax - y0),
        ] {
            if p.abs() < f32::EPSILON {
                if q < 0.0 {
                    return None;
                }
                continue;
            }
            let r = q / p;
            if p < 0.0 {
                if r > t1 {
                    return None;
                }
                t0 = t0.max(r);
            } else {
                if r < t0 {
                    return None;
                }
                t1 = t1.min(r);
            }
        }
        Some((x0 + t0 * dx, y0 + t0 * dy, x0 + t1 * dx, y0 + t1 * dy))
    }
}

fn to_cell(x: f32, y: f32) -> Option<(i64, i64)> {
    if !(x.is_finite() && y.is_finite()) {
        return None;
    }
    Some((x.floor() as i64, y.floor() as i64))
}

#[cfg(test)]
mod tests {
    use super::*;

    const RED: Rgb = Rgb::new(255, 0, 0);

    #[test]
    fn out_of_bounds_primitives_are_clipped() {
        let mut canvas = Canvas::new(8, 8);
        canvas.set(-1, 3, RED);
        canvas.set(8, 3, RED);
        canvas.plot(f32::NAN, 2.0, RED);
        canvas.disc(100.0, 100.0, 3.0, RED);
        canvas.fill_rect(-50.0, -50.0, -10.0, -10.0, RED);
        canvas.line(-1.0e9, 4.0, -1.0e8, 4.0, RED);
        assert_eq!(canvas.into_frame().lit_count(), 0);
    }

    #[test]
    fn long_lines_are_clipped_to_the_visible_span() {
        let mut canvas = Canvas::new(8, 8);
        canvas.line(-1.0e6, 4.0, 1.0e6, 4.0, RED);
        let frame = canvas.into_frame();
        for x in 0..8 {
            assert_eq!(frame.pixel(x, 4), Some(RED));
        }
        assert_eq!(frame.lit_count(), 8);
    }

    #[test]
    fn line_hits_both_endpoints() {
        let mut canvas = Canvas::new(16, 16);
        canvas.line(1.0, 2.0, 12.0, 9.0, RED);
        let frame = canvas.into_frame();
        assert_eq!(frame.pixel(1, 2), Some(RED));
        assert_eq!(frame.pixel(12, 9), Some(RED));
    }

    #[test]
    fn fill_rect_accepts_reversed_corners() {
        let mut canvas = Canvas::new(10, 10);
        canvas.fill_rect(5.0, 5.0, 2.0, 3.0, RED);
        let frame = canvas.into_frame();
        assert_eq!(frame.lit_count(), 4 * 3);
        assert_eq!(frame.pixel(2, 3), Some(RED));
        assert_eq!(frame.pixel(5, 5), Some(RED));
    }

    #[test]
    fn disc_is_partially_drawn_at_the_edge() {
        let mut canvas = Canvas::new(10, 10);
        canvas.disc(0.0, 0.0, 3.0, RED);
        let frame = canvas.into_frame();
        assert_eq!(frame.pixel(0, 0), Some(RED));
        assert!(frame.lit_count() < 12);
        assert!(frame.lit_count() > 0);
    }

    #[test]
    fn additive_plotting_saturates() {
        let mut canvas = Canvas::new(2, 2);
        canvas.add(0, 0, Rgb::new(200, 0, 0));
        canvas.add(0, 0, Rgb::new(200, 10, 0));
        assert_eq!(canvas.get(0, 0), Some(Rgb::new(255, 10, 0)));
    }
}
