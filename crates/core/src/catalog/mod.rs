//! Registry of built-in effects.

use serde::Serialize;

use crate::{
    config::AppConfig,
    effect::{Effect, EffectFamily},
    effects::{
        fire, fireworks, kaleidoscope, lines, maze, noise_field, scanner, sort, square_morph, starfall, text,
    },
    error::LedMatrixError,
    Result,
};

type Constructor = fn(&AppConfig) -> Result<Box<dyn Effect>>;

/// Static metadata describing one effect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EffectDescriptor {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub family: EffectFamily,
    pub native_fps: u32,
}

#[derive(Clone)]
struct Entry {
    descriptor: EffectDescriptor,
    construct: Constructor,
}

#[derive(Clone)]
pub struct EffectCatalog {
    entries: Vec<Entry>,
}

fn boxed<E: Effect + 'static>(effect: Result<E>) -> Result<Box<dyn Effect>> {
    effect.map(|e| Box::new(e) as Box<dyn Effect>)
}

macro_rules! entry {
    ($id:expr, $name:literal, $family:ident, $fps:expr, $description:literal, $construct:expr) => {
        Entry {
            descriptor: EffectDescriptor {
                id: $id,
                name: $name,
                description: $description,
                family: EffectFamily::$family,
                native_fps: $fps,
            },
            construct: $construct,
        }
    };
}

impl EffectCatalog {
    /// Every effect shipped with the crate.
    pub fn builtin() -> Self {
        use scanner::{ScannerEffect, ScannerKind};

        let entries = vec![
            entry!(fire::ID, "Fire", Perpetual, fire::NATIVE_FPS,
                "Rising flames from a heat buffer with sparks and cooling.",
                |c| boxed(fire::FireEffect::new(c))),
            entry!(kaleidoscope::ID, "Kaleidoscope", Perpetual, kaleidoscope::NATIVE_FPS,
                "Folded-space shader painted with a cosine palette.",
                |c| boxed(kaleidoscope::KaleidoscopeEffect::new(c))),
            entry!(noise_field::ID, "Noise Field", Perpetual, noise_field::NATIVE_FPS,
                "Drifting value-noise plasma.",
                |c| boxed(noise_field::NoiseFieldEffect::new(c))),
            entry!(fireworks::ID, "Fireworks", Perpetual, fireworks::NATIVE_FPS,
                "Bursts of orbs, sparkles, ripples and shapes.",
                |c| boxed(fireworks::FireworksEffect::new(c))),
            entry!(starfall::ID, "Starfall", Perpetual, starfall::NATIVE_FPS,
                "Fading drops streaking across the panel in cycling colour modes.",
                |c| boxed(starfall::StarfallEffect::new(c))),
            entry!(scanner::SPHERE_ID, "Sphere Scan", Perpetual, scanner::NATIVE_FPS,
                "Rotating point sphere swept by a scan line.",
                |c| boxed(ScannerEffect::new(ScannerKind::Sphere, c))),
            entry!(scanner::HELIX_ID, "Helix Scan", Perpetual, scanner::NATIVE_FPS,
                "Rotating helix swept by a scan line.",
                |c| boxed(ScannerEffect::new(ScannerKind::Helix, c))),
            entry!(scanner::CUBE_ID, "Cube Refraction", Perpetual, scanner::NATIVE_FPS,
                "Voxel cube pulsed by a radial wave.",
                |c| boxed(ScannerEffect::new(ScannerKind::Cube, c))),
            entry!(lines::RGB_LINES_ID, "RGB Lines", Choreographed, lines::NATIVE_FPS,
                "Three coloured lines disperse and return.",
                |c| boxed(lines::RgbLinesEffect::new(c))),
            entry!(lines::ROTATING_LINE_ID, "Rotating Line", Choreographed, lines::NATIVE_FPS,
                "A centred line makes one full turn.",
                |c| boxed(lines::RotatingLineEffect::new(c))),
            entry!(lines::CHANGING_SQUARE_ID, "Changing Square", Choreographed, lines::NATIVE_FPS,
                "A rectangle eases between random sizes.",
                |c| boxed(lines::ChangingSquareEffect::new(c))),
            entry!(lines::THREE_SINES_ID, "Three Sines", Choreographed, lines::NATIVE_FPS,
                "A line splits into three sine waves and merges back.",
                |c| boxed(lines::ThreeSinesEffect::new(c))),
            entry!(lines::GRAVITY_ID, "Gravity", Choreographed, lines::NATIVE_FPS,
                "Particles spread out and are pulled back together.",
                |c| boxed(lines::GravityEffect::new(c))),
            entry!(lines::ONE_SINE_ID, "One Sine", Choreographed, lines::NATIVE_FPS,
                "A flat line swells into a sine wave and settles.",
                |c| boxed(lines::OneSineEffect::new(c))),
            entry!(square_morph::ID, "Square Morph", Choreographed, square_morph::NATIVE_FPS,
                "Recursive rectangle tilings morph into each other.",
                |c| boxed(square_morph::SquareMorphEffect::new(c))),
            entry!(text::ID, "Text", Choreographed, text::NATIVE_FPS,
                "Scrolling or centred text with glow.",
                |c| boxed(text::TextEffect::new(c))),
            entry!(maze::ID, "Maze Search", Stepwise, maze::NATIVE_FPS,
                "Generates a maze and animates a breadth-first search.",
                |c| boxed(maze::MazeEffect::new(c))),
            entry!(sort::ID, "Sorting", Stepwise, sort::NATIVE_FPS,
                "Replays a sorting algorithm as coloured bars.",
                |c| boxed(sort::SortEffect::new(c))),
        ];
        Self { entries }
    }

    /// Identifiers in registration order.
    pub fn ids(&self) -> Vec<&'static str> {
        self.entries.iter().map(|e| e.descriptor.id).collect()
    }

    pub fn get(&self, id: &str) -> Option<&EffectDescriptor> {
        self.entries.iter().find(|e| e.descriptor.id == id).map(|e| &e.descriptor)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    /// Descriptors sorted by display name.
    pub fn descriptors(&self) -> Vec<EffectDescriptor> {
        let mut list: Vec<EffectDescriptor> = self.entries.iter().map(|e| e.descriptor.clone()).collect();
        list.sort_by(|a, b| a.name.cmp(b.name));
        list
    }

    /// Builds a fresh effect, validating its configuration first.
    pub fn instantiate(&self, id: &str, config: &AppConfig) -> Result<Box<dyn Effect>> {
        let entry = self
            .entries
            .iter()
            .find(|e| e.descriptor.id == id)
            .ok_or_else(|| LedMatrixError::UnknownEffect(id.to_string()))?;
        (entry.construct)(config)
    }
}

impl Default for EffectCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}

impl std::fmt::Debug for EffectCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.entries.iter().map(|e| e.descriptor.id)).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn ids_are_unique() {
        let catalog = EffectCatalog::builtin();
        let ids = catalog.ids();
        let unique: HashSet<_> = ids.iter().collect();
        assert_eq!(unique.len(), ids.len());
        assert_eq!(ids.len(), 18);
    }

    #[test]
    fn descriptors_are_sorted_by_name() {
        let names: Vec<_> = EffectCatalog::builtin().descriptors().iter().map(|d| d.name).collect();
        let mut sorted = names.clone();
        sorted.sort();
        assert_eq!(names, sorted);
    }

    #[test]
    fn instantiated_effects_match_their_descriptor() {
        let catalog = EffectCatalog::builtin();
        let config = AppConfig::default();
        for descriptor in catalog.descriptors() {
            let effect = catalog.instantiate(descriptor.id, &config).unwrap();
            assert_eq!(effect.id(), descriptor.id);
            assert_eq!(effect.family(), descriptor.family, "{}", descriptor.id);
        }
    }

    #[test]
    fn unknown_ids_are_rejected() {
        let err = EffectCatalog::builtin()
            .instantiate("plasma-vortex", &AppConfig::default())
            .err()
            .unwrap();
        assert!(matches!(err, LedMatrixError::UnknownEffect(ref id) if id == "plasma-vortex"));
    }

    #[test]
    fn bad_config_fails_before_running() {
        let mut config = AppConfig::default();
        config.fire.palette = "neon".into();
        assert!(EffectCatalog::builtin().instantiate(fire::ID, &config).is_err());
        config = AppConfig::default();
        config.display.width = 0;
        assert!(EffectCatalog::builtin().instantiate(starfall::ID, &config).is_err());
    }

    #[test]
    fn descriptors_serialize() {
        let catalog = EffectCatalog::builtin();
        let json = serde_json::to_string(catalog.get(maze::ID).unwrap()).unwrap();
        assert!(json.contains("\"family\":\"stepwise\""));
    }
}
