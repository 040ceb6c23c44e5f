//! Display back-ends that consume rendered frames.

use std::{
    io::Write,
    path::{Path, PathBuf},
    sync::{Arc, Mutex, PoisonError},
};

use crate::{error::LedMatrixError, render::Frame, Result};

/// Anything that can show a frame. Implementations must accept repeated
/// `clear` calls.
pub trait DisplaySink: Send {
    fn present(&mut self, frame: &Frame) -> Result<()>;
    fn clear(&mut self) -> Result<()>;
}

impl<S: DisplaySink + ?Sized> DisplaySink for Box<S> {
    fn present(&mut self, frame: &Frame) -> Result<()> {
        (**self).present(frame)
    }

    fn clear(&mut self) -> Result<()> {
        (**self).clear()
    }
}

/// Discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl DisplaySink for NullSink {
    fn present(&mut self, _frame: &Frame) -> Result<()> {
        Ok(())
    }

    fn clear(&mut self) -> Result<()> {
        Ok(())
    }
}

#[derive(Debug, Default)]
struct MemoryLog {
    frames: Vec<Frame>,
    presented: usize,
    clears: usize,
}

/// Records frames in memory. Clones share the same log, so a test can keep
/// one handle while the player owns another.
#[derive(Debug, Default, Clone)]
pub struct MemorySink {
    log: Arc<Mutex<MemoryLog>>,
    fail_after: Option<usize>,
    keep_frames: bool,
}

impl MemorySink {
    pub fn new() -> Self {
        Self {
            keep_frames: true,
            ..Self::default()
        }
    }

    /// Only counts frames instead of storing them. `frames()` stays empty.
    pub fn counting() -> Self {
        Self::default()
    }

    /// Fails every `present` once `frames` frames have been accepted.
    pub fn failing_after(mut self, frames: usize) -> Self {
        self.fail_after = Some(frames);
        self
    }

    fn with_log<T>(&self, f: impl FnOnce(&mut MemoryLog) -> T) -> T {
        let mut log = self.log.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut log)
    }

    pub fn frame_count(&self) -> usize {
        self.with_log(|log| log.presented)
    }

    pub fn frames(&self) -> Vec<Frame> {
        self.with_log(|log| log.frames.clone())
    }

    pub fn last_frame(&self) -> Option<Frame> {
        self.with_log(|log| log.frames.last().cloned())
    }

    pub fn clear_count(&self) -> usize {
        self.with_log(|log| log.clears)
    }
}

impl DisplaySink for MemorySink {
    fn present(&mut self, frame: &Frame) -> Result<()> {
        let (fail_after, keep) = (self.fail_after, self.keep_frames);
        self.with_log(|log| {
            if fail_after.is_some_and(|limit| log.presented >= limit) {
                return Err(LedMatrixError::sink(format!(
                    "memory sink refused frame {}",
                    log.presented
                )));
            }
            log.presented += 1;
            if keep {
                log.frames.push(frame.clone());
            }
            Ok(())
        })
    }

    fn clear(&mut self) -> Result<()> {
        self.with_log(|log| log.clears += 1);
        Ok(())
    }
}

/// Emulates the panel in a 24-bit colour terminal, two pixel rows per text
/// row using upper half blocks.
pub struct TerminalSink<W: Write + Send> {
    out: W,
    brightness: f32,
}

impl TerminalSink<std::io::Stdout> {
    pub fn stdout(brightness: f32) -> Self {
        Self::new(std::io::stdout(), brightness)
    }
}

impl<W: Write + Send> TerminalSink<W> {
    pub fn new(out: W, brightness: f32) -> Self {
        Self {
            out,
            brightness: brightness.clamp(0.0, 1.0),
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn encode(&self, frame: &Frame) -> String {
        let frame = frame.scaled(self.brightness);
        let mut text = String::from("\x1b[H");
        for y in (0..frame.height()).step_by(2) {
            for x in 0..frame.width() {
                let top = frame.pixel(x, y).unwrap_or_default();
                let bottom = frame.pixel(x, y + 1).unwrap_or_default();
                text.push_str(&format!(
                    "\x1b[38;2;{};{};{}m\x1b[48;2;{};{};{}m\u{2580}",
                    top.r, top.g, top.b, bottom.r, bottom.g, bottom.b
                ));
            }
            text.push_str("\x1b[0m\n");
        }
        text
    }
}

impl<W: Write + Send> DisplaySink for TerminalSink<W> {
    fn present(&mut self, frame: &Frame) -> Result<()> {
        let text = self.encode(frame);
        self.out.write_all(text.as_bytes())?;
        self.out.flush()?;
        Ok(())
    }

    fn clear(&mut self) -> Result<()> {
        self.out.write_all(b"\x1b[0m\x1b[2J\x1b[H")?;
        self.out.flush()?;
        Ok(())
    }
}

/// Writes a single frame as an RGB PNG.
pub fn save_png(frame: &Frame, path: &Path) -> Result<()> {
    let image = image::RgbImage::from_raw(frame.width() as u32, frame.height() as u32, frame.to_rgb_bytes())
        .ok_or_else(|| LedMatrixError::sink("frame buffer does not match its dimensions"))?;
    image.save_with_format(path, image::ImageFormat::Png)?;
    Ok(())
}

/// Writes numbered PNG files (`frame_00000.png`, ...) into a directory.
#[derive(Debug)]
pub struct PngSequenceSink {
    dir: PathBuf,
    next: usize,
    brightness: f32,
}

impl PngSequenceSink {
    pub fn new(dir: impl Into<PathBuf>, brightness: f32) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            next: 0,
            brightness: brightness.clamp(0.0, 1.0),
        })
    }

    pub fn written(&self) -> usize {
        self.next
    }

    pub fn path_for(&self, index: usize) -> PathBuf {
        self.dir.join(format!("frame_{index:05}.png"))
    }
}

impl DisplaySink for PngSequenceSink {
    fn present(&mut self, frame: &Frame) -> Result<()> {
        let path = self.path_for(self.next);
        save_png(&frame.scaled(self.brightness), &path)?;
        self.next += 1;
        Ok(())
    }

    fn clear(&mut self) -> Result<()> {
        Ok(())
    }
}
