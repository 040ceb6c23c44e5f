use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{LedMatrixError, Result};

/// Top-level configuration structure for the application.
///
/// Every section carries `#[serde(default)]`, so a config file only needs to
/// mention the values it changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub display: DisplayConfig,
    pub rotation: RotationConfig,
    /// Global multiplier applied to effect time.
    pub speed: f32,
    pub fire: FireConfig,
    pub text: TextConfig,
    pub sort: SortConfig,
    pub maze: MazeConfig,
    pub fireworks: FireworksConfig,
    pub morph: MorphConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            display: DisplayConfig::default(),
            rotation: RotationConfig::default(),
            speed: 1.0,
            fire: FireConfig::default(),
            text: TextConfig::default(),
            sort: SortConfig::default(),
            maze: MazeConfig::default(),
            fireworks: FireworksConfig::default(),
            morph: MorphConfig::default(),
        }
    }
}

impl AppConfig {
    /// Parses and validates a JSON document.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: AppConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a JSON config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&raw)
    }

    /// Checks every documented range. Palette names, text escapes and sort
    /// algorithm names are checked by the effects that consume them.
    pub fn validate(&self) -> Result<()> {
        self.display.validate()?;
        self.rotation.validate()?;
        ensure_positive("speed", self.speed)?;
        self.fire.validate()?;
        self.text.validate()?;
        self.sort.validate()?;
        self.maze.validate()?;
        self.fireworks.validate()?;
        self.morph.validate()
    }
}

/// Panel geometry and output cadence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    pub width: usize,
    pub height: usize,
    /// Overrides each effect's native frame rate when set.
    pub fps: Option<u32>,
    /// Output brightness in `[0, 1]`, applied by the sinks.
    pub brightness: f32,
}

pub const MAX_DIMENSION: usize = 512;
pub const MAX_FPS: u32 = 240;

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            width: 64,
            height: 64,
            fps: None,
            brightness: 1.0,
        }
    }
}

impl DisplayConfig {
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [("width", self.width), ("height", self.height)] {
            if value == 0 || value > MAX_DIMENSION {
                return Err(LedMatrixError::config(format!(
                    "display.{name} must be in 1..={MAX_DIMENSION}, got {value}"
                )));
            }
        }
        if let Some(fps) = self.fps {
            if fps == 0 || fps > MAX_FPS {
                return Err(LedMatrixError::config(format!(
                    "display.fps must be in 1..={MAX_FPS}, got {fps}"
                )));
            }
        }
        ensure_range("display.brightness", self.brightness, 0.0, 1.0)
    }

    /// Frame rate to run an effect at, given its native rate.
    pub fn fps_for(&self, native: u32) -> u32 {
        self.fps.unwrap_or(native).clamp(1, MAX_FPS)
    }
}

/// Multi-effect rotation settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RotationConfig {
    /// Wall-clock budget per effect. Perpetual effects are switched out after
    /// this many seconds; finite effects may end earlier on their own.
    pub switch_after_secs: Option<f32>,
    /// Subset of effect ids to rotate through. Empty means every effect.
    pub effects: Vec<String>,
    /// Seed for the shuffle and for per-run effect seeds.
    pub seed: Option<u64>,
}

impl RotationConfig {
    pub fn validate(&self) -> Result<()> {
        if let Some(secs) = self.switch_after_secs {
            ensure_positive("rotation.switch_after_secs", secs)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FireConfig {
    /// `classic`, `blue` or `purple`.
    pub palette: String,
    /// Heat lost per tick at the base, 1..=10.
    pub decay: u8,
    /// Upper bound of the random heat offset, 1..=15.
    pub intensity: u8,
    /// Lower bound (negated) of the random heat offset, 10..=50.
    pub cooling: u8,
    pub spark_chance: f32,
}

impl Default for FireConfig {
    fn default() -> Self {
        Self {
            palette: "classic".to_string(),
            decay: 2,
            intensity: 8,
            cooling: 30,
            spark_chance: 0.3,
        }
    }
}

impl FireConfig {
    pub fn validate(&self) -> Result<()> {
        ensure_int_range("fire.decay", self.decay, 1, 10)?;
        ensure_int_range("fire.intensity", self.intensity, 1, 15)?;
        ensure_int_range("fire.cooling", self.cooling, 10, 50)?;
        ensure_range("fire.spark_chance", self.spark_chance, 0.0, 1.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TextConfig {
    /// Text to show. `\n`, `\t` and `\\` escapes are decoded.
    pub text: String,
    pub scheme: String,
    pub scroll: bool,
    /// Scroll speed in pixels per second.
    pub speed: f32,
    pub glow: bool,
}

impl Default for TextConfig {
    fn default() -> Self {
        Self {
            text: "HELLO WORLD".to_string(),
            scheme: "blue".to_string(),
            scroll: true,
            speed: 20.0,
            glow: true,
        }
    }
}

impl TextConfig {
    pub fn validate(&self) -> Result<()> {
        ensure_positive("text.speed", self.speed)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SortConfig {
    /// `bubble`, `quick`, `insertion`, `selection` or `random`.
    pub algorithm: String,
    /// Number of bars. Defaults to the panel width.
    pub array_size: Option<usize>,
    /// Seconds per recorded sort operation.
    pub step_interval: f32,
    pub title_secs: f32,
    pub hold_secs: f32,
}

impl Default for SortConfig {
    fn default() -> Self {
        Self {
            algorithm: "random".to_string(),
            array_size: None,
            step_interval: 0.05,
            title_secs: 3.0,
            hold_secs: 2.0,
        }
    }
}

impl SortConfig {
    pub fn validate(&self) -> Result<()> {
        if let Some(size) = self.array_size {
            if size < 2 {
                return Err(LedMatrixError::config(format!(
                    "sort.array_size must be at least 2, got {size}"
                )));
            }
        }
        ensure_positive("sort.step_interval", self.step_interval)?;
        ensure_non_negative("sort.title_secs", self.title_secs)?;
        ensure_non_negative("sort.hold_secs", self.hold_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MazeConfig {
    /// Pixels per maze cell.
    pub cell_size: usize,
    /// BFS visits revealed per search step.
    pub visits_per_step: usize,
    /// Search steps per second.
    pub steps_per_second: f32,
    pub explored_hold_secs: f32,
    pub path_hold_secs: f32,
}

impl Default for MazeConfig {
    fn default() -> Self {
        Self {
            cell_size: 1,
            visits_per_step: 10,
            steps_per_second: 60.0,
            explored_hold_secs: 0.5,
            path_hold_secs: 3.0,
        }
    }
}

impl MazeConfig {
    pub fn validate(&self) -> Result<()> {
        if self.cell_size == 0 {
            return Err(LedMatrixError::config("maze.cell_size must be positive"));
        }
        if self.visits_per_step == 0 {
            return Err(LedMatrixError::config("maze.visits_per_step must be positive"));
        }
        ensure_positive("maze.steps_per_second", self.steps_per_second)?;
        ensure_non_negative("maze.explored_hold_secs", self.explored_hold_secs)?;
        ensure_non_negative("maze.path_hold_secs", self.path_hold_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FireworksConfig {
    /// Hard cap on live particles; bursts are skipped while at the cap.
    pub max_particles: usize,
}

impl Default for FireworksConfig {
    fn default() -> Self {
        Self { max_particles: 600 }
    }
}

impl FireworksConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_particles == 0 {
            return Err(LedMatrixError::config("fireworks.max_particles must be positive"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MorphConfig {
    /// Rise/hold/fall/rest cycles before the square morph finishes.
    pub cycles: u32,
    /// Recursion depth of the rectangle subdivision.
    pub depth: u32,
}

impl Default for MorphConfig {
    fn default() -> Self {
        Self { cycles: 3, depth: 6 }
    }
}

impl MorphConfig {
    pub fn validate(&self) -> Result<()> {
        if self.cycles == 0 {
            return Err(LedMatrixError::config("morph.cycles must be positive"));
        }
        ensure_int_range("morph.depth", self.depth, 1, 10)
    }
}

fn ensure_positive(name: &str, value: f32) -> Result<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(LedMatrixError::config(format!(
            "{name} must be a positive number, got {value}"
        )))
    }
}

fn ensure_non_negative(name: &str, value: f32) -> Result<()> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(LedMatrixError::config(format!(
            "{name} must not be negative, got {value}"
        )))
    }
}

fn ensure_range(name: &str, value: f32, min: f32, max: f32) -> Result<()> {
    if value.is_finite() && (min..=max).contains(&value) {
        Ok(())
    } else {
        Err(LedMatrixError::config(format!(
            "{name} must be in {min}..={max}, got {value}"
        )))
    }
}

fn ensure_int_range<T>(name: &str, value: T, min: T, max: T) -> Result<()>
where
    T: PartialOrd + std::fmt::Display + Copy,
{
    if value >= min && value <= max {
        Ok(())
    } else {
        Err(LedMatrixError::config(format!(
            "{name} must be in {min}..={max}, got {value}"
        )))
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn defaults_are_valid() {
        AppConfig::default().validate().unwrap();
        assert_eq!(AppConfig::default().display.width, 64);
    }

    #[test]
    fn partial_documents_fill_in_defaults() {
        let config = AppConfig::from_json_str(r#"{ "display": { "fps": 30 }, "fire": { "palette": "blue" } }"#)
            .unwrap();
        assert_eq!(config.display.fps, Some(30));
        assert_eq!(config.display.height, 64);
        assert_eq!(config.fire.palette, "blue");
        assert_eq!(config.fire.decay, 2);
    }

    #[test]
    fn rejects_zero_dimensions_and_fps() {
        let err = AppConfig::from_json_str(r#"{ "display": { "width": 0 } }"#).unwrap_err();
        assert!(err.is_config_error());

        let err = AppConfig::from_json_str(r#"{ "display": { "fps": 0 } }"#).unwrap_err();
        assert!(err.to_string().contains("display.fps"));
    }

    #[test]
    fn rejects_out_of_range_tunables() {
        let mut config = AppConfig::default();
        config.fire.cooling = 80;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.speed = 0.0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.sort.array_size = Some(1);
        assert!(config.validate().is_err());
    }

    #[test]
    fn fps_override_wins_over_native_rate() {
        let mut display = DisplayConfig::default();
        assert_eq!(display.fps_for(14), 14);
        display.fps = Some(50);
        assert_eq!(display.fps_for(14), 50);
    }

    #[test]
    fn loads_from_disk() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "rotation": {{ "switch_after_secs": 30.0, "seed": 7 }} }}"#).unwrap();

        let config = AppConfig::load(file.path()).unwrap();
        assert_eq!(config.rotation.switch_after_secs, Some(30.0));
        assert_eq!(config.rotation.seed, Some(7));
    }

    #[test]
    fn malformed_json_is_reported() {
        let err = AppConfig::from_json_str("{ not json").unwrap_err();
        assert!(matches!(err, LedMatrixError::Json(_)));
    }
}
