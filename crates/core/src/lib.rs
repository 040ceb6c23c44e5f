//! Core library for the LED matrix effect player.
//!
//! Effects are procedural frame generators for a small RGB panel (64x64 by
//! default). The [`player`] drives one effect at a time at a fixed cadence
//! and hands every frame to a [`sink::DisplaySink`]; the [`control`] module
//! wraps that loop in a start/stop surface running on its own thread.

pub mod catalog;
pub mod config;
pub mod control;
pub mod easing;
pub mod effect;
pub mod effects;
pub mod error;
pub mod palette;
pub mod player;
pub mod render;
pub mod sink;
pub mod timeline;

pub use catalog::{EffectCatalog, EffectDescriptor};
pub use config::AppConfig;
pub use control::{CancelHandle, Controller, SinkFactory};
pub use effect::{Effect, EffectFamily, SegmentPosition, Step};
pub use error::{LedMatrixError, Result};
pub use player::{Pacer, Pacing, Player, PlayerOptions, PlayerReport, RotationQueue, RunOutcome};
pub use render::{Canvas, Frame, Rgb};
pub use sink::{DisplaySink, MemorySink, NullSink, PngSequenceSink, TerminalSink};
pub use timeline::{PlaybackClock, Segment, Ticker, Timeline};
