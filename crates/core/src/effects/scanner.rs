//! Rotating 3-D point clouds lit by a moving scan.
//!
//! All three variants share one pipeline: transform the model points for the
//! current time, project them, then composite farthest-first so nearer dots
//! cover farther ones.

use std::f32::consts::{FRAC_PI_2, PI, TAU};

use rand::Rng;

use crate::{
    config::AppConfig,
    easing::Ease,
    effect::{sanitize_dt, seeded_rng, Effect, EffectFamily, Step},
    render::{Canvas, Rgb},
    timeline::PlaybackClock,
    Result,
};

pub const SPHERE_ID: &str = "sphere-scan";
pub const HELIX_ID: &str = "helix-scan";
pub const CUBE_ID: &str = "cube-refraction";
pub const NATIVE_FPS: u32 = 30;

/// Geometry in the model files is authored for a 64 pixel panel.
const REFERENCE_SIZE: f32 = 64.0;
const MIN_DOT_SIZE: f32 = 0.1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScannerKind {
    /// Fibonacci sphere swept by a horizontal scan line.
    Sphere,
    /// Widening helix swept by a horizontal scan line.
    Helix,
    /// 5x5x5 voxel cube pushed outward by a radial wave.
    Cube,
}

impl ScannerKind {
    pub fn id(self) -> &'static str {
        match self {
            Self::Sphere => SPHERE_ID,
            Self::Helix => HELIX_ID,
            Self::Cube => CUBE_ID,
        }
    }

    /// Model time units per second of effect time.
    fn time_rate(self) -> f32 {
        match self {
            Self::Sphere => 0.5,
            Self::Helix => 0.8,
            Self::Cube => 0.3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Point3 {
    x: f32,
    y: f32,
    z: f32,
}

impl Point3 {
    fn rotate_y(self, angle: f32) -> Self {
        let (s, c) = angle.sin_cos();
        Self {
            x: self.x * c - self.z * s,
            y: self.y,
            z: self.x * s + self.z * c,
        }
    }

    fn rotate_x(self, angle: f32) -> Self {
        let (s, c) = angle.sin_cos();
        Self {
            x: self.x,
            y: self.y * c - self.z * s,
            z: self.y * s + self.z * c,
        }
    }

    fn length(self) -> f32 {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }
}

/// Projected dot ready for compositing. Larger `depth` is farther away.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScanDot {
    pub x: f32,
    pub y: f32,
    pub depth: f32,
    pub size: f32,
    pub opacity: f32,
}

/// Sorts dots farthest-first and paints them in that order.
pub fn composite(canvas: &mut Canvas, dots: &mut [ScanDot], color: Rgb) {
    dots.sort_by(|a, b| b.depth.total_cmp(&a.depth));
    for dot in dots.iter() {
        canvas.disc(dot.x, dot.y, dot.size, color.scale(dot.opacity));
    }
}

/// Strength of the scan band at `distance` from its centre line.
fn scan_influence(distance: f32, band: f32) -> f32 {
    if band > 0.0 && distance < band {
        (distance / band * FRAC_PI_2).cos()
    } else {
        0.0
    }
}

#[derive(Debug, Clone)]
pub struct ScannerEffect {
    kind: ScannerKind,
    width: usize,
    height: usize,
    model: Vec<Point3>,
    clock: PlaybackClock,
    time_offset: f32,
}

impl ScannerEffect {
    pub fn new(kind: ScannerKind, config: &AppConfig) -> Result<Self> {
        config.display.validate()?;
        let mut effect = Self {
            kind,
            width: 0,
            height: 0,
            model: Vec::new(),
            clock: PlaybackClock::default(),
            time_offset: 0.0,
        };
        effect.reset(config.display.width, config.display.height, 0);
        Ok(effect)
    }

    pub fn kind(&self) -> ScannerKind {
        self.kind
    }

    fn unit(&self) -> f32 {
        self.width.min(self.height) as f32 / REFERENCE_SIZE
    }

    fn build_model(&self) -> Vec<Point3> {
        let unit = self.unit();
        match self.kind {
            ScannerKind::Sphere => {
                let count = 150;
                let radius = self.width as f32 * 0.35;
                (0..count)
                    .map(|i| {
                        let theta = (1.0 - 2.0 * (i as f32 / count as f32)).acos();
                        let phi = (count as f32 * PI).sqrt() * theta;
                        Point3 {
                            x: radius * theta.sin() * phi.cos(),
                            y: radius * theta.sin() * phi.sin(),
                            z: radius * theta.cos(),
                        }
                    })
                    .collect()
            }
            ScannerKind::Helix => {
                let count = 100;
                (0..count)
                    .map(|i| {
                        let t = i as f32 / count as f32;
                        let angle = t * PI * 8.0;
                        let radius = (5.0 + t * 20.0) * unit;
                        Point3 {
                            x: radius * angle.cos(),
                            y: (t - 0.5) * 40.0 * unit,
                            z: radius * angle.sin(),
                        }
                    })
                    .collect()
            }
            ScannerKind::Cube => {
                let grid = 5;
                let spacing = 8.0 * unit;
                let half = (grid - 1) as f32 * spacing / 2.0;
                let mut points = Vec::with_capacity(grid * grid * grid);
                for x in 0..grid {
                    for y in 0..grid {
                        for z in 0..grid {
                            points.push(Point3 {
                                x: x as f32 * spacing - half,
                                y: y as f32 * spacing - half,
                                z: z as f32 * spacing - half,
                            });
                        }
                    }
                }
                points
            }
        }
    }

    /// Projects the model at model time `t`.
    fn project(&self, t: f32) -> Vec<ScanDot> {
        let unit = self.unit();
        let (cx, cy) = (self.width as f32 / 2.0, self.height as f32 / 2.0);
        match self.kind {
            ScannerKind::Sphere => {
                let radius = self.width as f32 * 0.35;
                let rot_x = (t * 0.3).sin() * 0.5;
                let rot_y = t * 0.5;
                let eased = Ease::InOutCubic.apply(((t * 2.5).sin() + 1.0) / 2.0);
                let scan_line = (eased * 2.0 - 1.0) * radius;
                let band = 15.0 * unit;
                self.model
                    .iter()
                    .filter_map(|p| {
                        let p = p.rotate_y(rot_y).rotate_x(rot_x);
                        if radius <= f32::EPSILON {
                            return None;
                        }
                        let scale = (p.z + radius * 1.5) / (radius * 2.5);
                        let influence = scan_influence((p.y - scan_line).abs(), band);
                        Some(ScanDot {
                            x: cx + p.x,
                            y: cy + p.y,
                            depth: -p.z,
                            size: (scale * 1.5 + influence * 2.0).max(0.0) * unit,
                            opacity: (scale * 0.6 + influence * 0.4).max(0.0),
                        })
                    })
                    .collect()
            }
            ScannerKind::Helix => {
                let rot_y = t * 0.8;
                let eased = Ease::InOutCubic.apply(((t * 3.0).sin() + 1.0) / 2.0);
                let scan_line = (eased * 2.0 - 1.0) * 25.0 * unit;
                let band = 18.0 * unit;
                let reach = 30.0 * unit;
                self.model
                    .iter()
                    .filter_map(|p| {
                        let p = p.rotate_y(rot_y);
                        if reach <= f32::EPSILON {
                            return None;
                        }
                        let scale = (p.z + reach) / (2.0 * reach);
                        let influence = scan_influence((p.y - scan_line).abs(), band);
                        Some(ScanDot {
                            x: cx + p.x,
                            y: cy + p.y,
                            depth: -p.z,
                            size: (scale * 1.5 + influence * 2.0).max(0.0) * unit,
                            opacity: (scale * 0.6 + influence * 0.4).max(0.1),
                        })
                    })
                    .collect()
            }
            ScannerKind::Cube => {
                let spacing = 8.0 * unit;
                let max_dist = 3f32.sqrt() * 2.0 * spacing;
                let period = max_dist * 1.3;
                let wave_radius = if period > 0.0 {
                    (t * 25.0 * unit).rem_euclid(period)
                } else {
                    0.0
                };
                let half_band = 9.0 * unit;
                let push = 5.0 * unit;
                let fov = 80.0 * unit;
                self.model
                    .iter()
                    .filter_map(|p| {
                        let dist = p.length();
                        let to_wave = (dist - wave_radius).abs();
                        let displacement = if half_band > 0.0 && to_wave < half_band {
                            Ease::InOutCubic.apply((to_wave / half_band * FRAC_PI_2).cos()) * push
                        } else {
                            0.0
                        };
                        let mut q = *p;
                        if displacement > 0.0 && dist > f32::EPSILON {
                            let ratio = (dist + displacement) / dist;
                            q = Point3 {
                                x: q.x * ratio,
                                y: q.y * ratio,
                                z: q.z * ratio,
                            };
                        }
                        let q = q.rotate_y(t * 3.0).rotate_x(t * 2.0);
                        let denom = fov + q.z;
                        if denom <= f32::EPSILON {
                            return None;
                        }
                        let scale = fov / denom;
                        let influence = if push > 0.0 { displacement / push } else { 0.0 };
                        Some(ScanDot {
                            x: cx + q.x * scale,
                            y: cy + q.y * scale,
                            depth: q.z,
                            size: (1.2 + influence * 2.0) * scale * unit,
                            opacity: (scale * 0.7 + influence * 0.4).max(0.1),
                        })
                    })
                    .collect()
            }
        }
    }
}

impl Effect for ScannerEffect {
    fn id(&self) -> &'static str {
        self.kind.id()
    }

    fn family(&self) -> EffectFamily {
        EffectFamily::Perpetual
    }

    fn reset(&mut self, width: usize, height: usize, seed: u64) {
        self.width = width;
        self.height = height;
        self.model = self.build_model();
        self.clock.reset();
        self.time_offset = seeded_rng(seed).gen_range(0.0..TAU);
    }

    fn advance(&mut self, dt: f32) -> Step {
        self.clock.advance(sanitize_dt(dt));
        let t = self.time_offset + self.clock.time_seconds * self.kind.time_rate();
        let mut dots: Vec<ScanDot> = self
            .project(t)
            .into_iter()
            .filter(|d| d.size > MIN_DOT_SIZE)
            .collect();
        let mut canvas = Canvas::new(self.width, self.height);
        composite(&mut canvas, &mut dots, Rgb::WHITE);
        Step::Frame(canvas.into_frame())
    }
}
