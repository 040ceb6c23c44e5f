use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand, ValueEnum};
use led_matrix_core::{
    sink, AppConfig, CancelHandle, DisplaySink, EffectCatalog, LedMatrixError, NullSink, Pacing, Player,
    PlayerOptions, PngSequenceSink, Step, TerminalSink,
};
use tracing_subscriber::EnvFilter;

fn main() -> led_matrix_core::Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let catalog = EffectCatalog::builtin();
    let config = cli.display.resolve()?;

    match cli.command {
        Commands::List => {
            list(&catalog);
            Ok(())
        }
        Commands::Run { id, output } => run_single(catalog, config, &id, &output),
        Commands::Rotate {
            effects,
            switch_after,
            output,
        } => run_rotation(catalog, config, effects, switch_after, &output),
        Commands::Snapshot { id, at, out } => snapshot(&catalog, &config, &id, at, &out),
    }
}

fn list(catalog: &EffectCatalog) {
    for d in catalog.descriptors() {
        println!("{:<16} {:<16} {:<13} {}", d.id, d.name, d.family.name(), d.description);
    }
}

fn run_single(catalog: EffectCatalog, config: AppConfig, id: &str, output: &OutputArgs) -> led_matrix_core::Result<()> {
    tracing::info!(effect = id, "starting single effect");
    let mut sink = output.open(&config)?;
    let cancel = install_interrupt()?;
    let mut player = Player::new(catalog, config)?.with_options(output.options(None));
    let report = player.run_single(id, &mut sink, &cancel)?;
    tracing::info!(frames = report.total_frames(), runs = report.runs.len(), "finished");
    Ok(())
}

fn run_rotation(
    catalog: EffectCatalog,
    mut config: AppConfig,
    effects: Vec<String>,
    switch_after: Option<f32>,
    output: &OutputArgs,
) -> led_matrix_core::Result<()> {
    if !effects.is_empty() {
        config.rotation.effects = effects;
    }
    tracing::info!(effects = ?config.rotation.effects, ?switch_after, "starting rotation");
    let mut sink = output.open(&config)?;
    let cancel = install_interrupt()?;
    let mut player = Player::new(catalog, config)?.with_options(output.options(switch_after));
    let report = player.run_rotation(&mut sink, &cancel)?;
    tracing::info!(frames = report.total_frames(), runs = report.runs.len(), "finished");
    Ok(())
}

/// Advances an effect headlessly at its native rate and writes the frame
/// showing at `at` seconds.
fn snapshot(catalog: &EffectCatalog, config: &AppConfig, id: &str, at: f32, out: &Path) -> led_matrix_core::Result<()> {
    let descriptor = catalog
        .get(id)
        .ok_or_else(|| LedMatrixError::UnknownEffect(id.to_string()))?;
    let mut effect = catalog.instantiate(id, config)?;
    effect.reset(
        config.display.width,
        config.display.height,
        config.rotation.seed.unwrap_or(0),
    );
    let dt = 1.0 / config.display.fps_for(descriptor.native_fps) as f32;
    let frames = ((at.max(0.0) / dt).round() as u64).max(1);
    let mut last = None;
    for _ in 0..frames {
        match effect.advance(dt * config.speed) {
            Step::Frame(frame) => last = Some(frame),
            Step::Done => break,
        }
    }
    let frame = last.ok_or_else(|| LedMatrixError::msg(format!("{id} produced no frame")))?;
    sink::save_png(&frame.scaled(config.display.brightness), out)?;
    tracing::info!(effect = id, at, path = ?out, "snapshot written");
    Ok(())
}

fn install_interrupt() -> led_matrix_core::Result<CancelHandle> {
    let cancel = CancelHandle::new();
    let handler = cancel.clone();
    ctrlc::set_handler(move || handler.cancel())
        .map_err(|err| LedMatrixError::msg(format!("failed to install Ctrl-C handler: {err}")))?;
    Ok(cancel)
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .try_init();
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Procedural effects for an RGB LED matrix", long_about = None)]
struct Cli {
    #[command(flatten)]
    display: DisplayArgs,
    #[command(subcommand)]
    command: Commands,
}

/// Overrides applied on top of the configuration file.
#[derive(Args, Debug)]
struct DisplayArgs {
    /// JSON configuration file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[arg(long, global = true)]
    width: Option<usize>,
    #[arg(long, global = true)]
    height: Option<usize>,
    /// Frame rate for every effect instead of each one's native rate.
    #[arg(long, global = true)]
    fps: Option<u32>,
    /// Seed for reproducible runs.
    #[arg(long, global = true)]
    seed: Option<u64>,
}

impl DisplayArgs {
    fn resolve(&self) -> led_matrix_core::Result<AppConfig> {
        let mut config = match &self.config {
            Some(path) => AppConfig::load(path)?,
            None => AppConfig::default(),
        };
        if let Some(width) = self.width {
            config.display.width = width;
        }
        if let Some(height) = self.height {
            config.display.height = height;
        }
        if self.fps.is_some() {
            config.display.fps = self.fps;
        }
        if self.seed.is_some() {
            config.rotation.seed = self.seed;
        }
        config.validate()?;
        Ok(config)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum SinkKind {
    Terminal,
    Null,
    Png,
}

#[derive(Args, Debug)]
struct OutputArgs {
    #[arg(long, value_enum, default_value_t = SinkKind::Terminal)]
    sink: SinkKind,
    /// Directory for the png sink.
    #[arg(long)]
    out: Option<PathBuf>,
    /// Stop after this many frames.
    #[arg(long)]
    frames: Option<u64>,
}

impl OutputArgs {
    fn open(&self, config: &AppConfig) -> led_matrix_core::Result<Box<dyn DisplaySink>> {
        let brightness = config.display.brightness;
        Ok(match self.sink {
            SinkKind::Terminal => Box::new(TerminalSink::stdout(brightness)),
            SinkKind::Null => Box::new(NullSink),
            SinkKind::Png => {
                let dir = self
                    .out
                    .clone()
                    .ok_or_else(|| LedMatrixError::config("--sink png needs --out <dir>"))?;
                Box::new(PngSequenceSink::new(dir, brightness)?)
            }
        })
    }

    fn options(&self, switch_after: Option<f32>) -> PlayerOptions {
        PlayerOptions {
            pacing: Pacing::Realtime,
            switch_after,
            max_frames: self.frames,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print every available effect.
    List,
    /// Run one effect, restarting it whenever it finishes.
    Run {
        /// Effect id, see `list`.
        id: String,
        #[command(flatten)]
        output: OutputArgs,
    },
    /// Rotate through effects in shuffled order.
    Rotate {
        /// Comma separated subset of effect ids.
        #[arg(long, value_delimiter = ',')]
        effects: Vec<String>,
        /// Seconds before switching to the next effect.
        #[arg(long)]
        switch_after: Option<f32>,
        #[command(flatten)]
        output: OutputArgs,
    },
    /// Render a single frame to a PNG file.
    Snapshot {
        id: String,
        /// Seconds of simulated time to advance first.
        #[arg(long, default_value_t = 1.0)]
        at: f32,
        #[arg(long)]
        out: PathBuf,
    },
}
