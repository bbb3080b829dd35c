use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use depth_touch::core_modules::background_model;
use depth_touch::core_modules::cursor_tracker::{CursorEvent, CursorId};
use depth_touch::core_modules::utils::image_helper::image_helper;
use depth_touch::depth_source::{FrameGrabber, Grab, PngSequenceGrabber};
use depth_touch::synthetic::SyntheticScene;
use depth_touch::{FrameEmitter, TouchConfig, TouchFrame, TouchPipeline};
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "touch_replay", about = "Offline tools for recorded depth sessions")]
struct Args {
    /// TOML configuration file; built-in defaults are used when omitted
    #[arg(long, value_name = "PATH", global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run a PNG depth recording through the touch pipeline and print the
    /// cursor frames as JSON lines
    Replay {
        /// Directory of 16-bit PNG depth frames
        #[arg(long, value_name = "DIR")]
        frames: PathBuf,
        /// Write JSON lines here instead of stdout
        #[arg(long, value_name = "PATH")]
        output: Option<PathBuf>,
        /// Frame rate the recording was captured at, used for timestamps
        #[arg(long, default_value_t = 30.0, value_parser = capture_rate)]
        fps: f64,
        /// Also print frames without any cursor event
        #[arg(long)]
        all_frames: bool,
    },
    /// Write a synthetic recording: an empty surface, then a finger dragged across it
    Synth {
        /// Output directory, created if missing
        #[arg(long, value_name = "DIR")]
        output: PathBuf,
        #[arg(long, default_value_t = 60)]
        drag_frames: usize,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "touch_replay=info,depth_touch=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    let args = Args::parse();
    let config = match &args.config {
        Some(path) => {
            TouchConfig::load(path).with_context(|| format!("loading {}", path.display()))?
        }
        None => {
            let mut config = TouchConfig::default();
            config.validate()?;
            config
        }
    };

    match args.command {
        Command::Replay {
            frames,
            output,
            fps,
            all_frames,
        } => {
            let writer: Box<dyn Write> = match output {
                Some(path) => {
                    let file = File::create(&path)
                        .with_context(|| format!("creating {}", path.display()))?;
                    Box::new(file)
                }
                None => Box::new(io::stdout().lock()),
            };
            let mut emitter = JsonLinesEmitter::new(BufWriter::new(writer), all_frames);
            replay(&frames, &config, fps, &mut emitter)?;
            emitter.finish()
        }
        Command::Synth { output, drag_frames } => synth(&output, &config, drag_frames),
    }
}

/// Parses `--fps`: a finite, positive rate whose frame interval fits a `Duration`.
fn capture_rate(value: &str) -> Result<f64, String> {
    let fps: f64 = value.parse().map_err(|e| format!("{e}"))?;
    if !fps.is_finite() || fps <= 0.0 {
        return Err(format!("frame rate must be a finite number > 0, got {value}"));
    }
    Duration::try_from_secs_f64(1.0 / fps)
        .map_err(|_| format!("frame rate {value} is too low"))?;
    Ok(fps)
}

/// Trains on the head of the recording, then runs the rest through the
/// pipeline. Frame `i` is stamped `i / fps` seconds.
fn replay(
    dir: &Path,
    config: &TouchConfig,
    fps: f64,
    emitter: &mut JsonLinesEmitter<impl Write>,
) -> Result<()> {
    let mut grabber = PngSequenceGrabber::open(dir)?;
    let frame_time = Duration::try_from_secs_f64(1.0 / fps)
        .with_context(|| format!("unusable frame rate {fps}"))?;

    // --- 1. Background Training ---
    let mut training = Vec::with_capacity(config.background.training_frames);
    let mut index = 0u32;
    while training.len() < config.background.training_frames {
        match grabber.grab() {
            Ok(Grab::Frame(frame)) if !frame.is_empty() => training.push(frame),
            Ok(Grab::Frame(_)) => warn!(index, "skipping empty training frame"),
            Ok(Grab::Pending) => continue,
            Ok(Grab::End) => anyhow::bail!(
                "recording ended after {} usable frames, {} needed for training",
                training.len(),
                config.background.training_frames
            ),
            Err(e) => warn!(index, error = %e, "skipping training frame"),
        }
        index += 1;
    }
    let background = background_model::train(&training)?;
    let mut pipeline = TouchPipeline::new(config, background)?;

    // --- 2. Main Processing Loop ---
    let (mut processed, mut dropped) = (0u64, 0u64);
    loop {
        let time = frame_time
            .checked_mul(index)
            .with_context(|| format!("timestamp of frame {index} overflows at {fps} fps"))?;
        let result = match grabber.grab() {
            Ok(Grab::Frame(frame)) => pipeline.process_and_emit(&frame, time, emitter),
            Ok(Grab::Pending) => continue,
            Ok(Grab::End) => break,
            Err(e) => Err(e),
        };
        match result {
            Ok(_) => processed += 1,
            Err(e) => {
                dropped += 1;
                warn!(index, error = %e, "dropping frame");
            }
        }
        index += 1;
        emitter.check()?;
    }

    info!(processed, dropped, "replay complete");
    Ok(())
}

fn synth(dir: &Path, config: &TouchConfig, drag_frames: usize) -> Result<()> {
    fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    let scene = SyntheticScene {
        width: config.sensor.width,
        height: config.sensor.height,
        roi: config.roi,
        training_frames: config.background.training_frames,
        drag_frames,
        ..SyntheticScene::default()
    };

    let frames = scene.frames();
    for (i, frame) in frames.iter().enumerate() {
        let path = dir.join(format!("frame_{i:05}.png"));
        image_helper::save(&path, frame)
            .with_context(|| format!("writing {}", path.display()))?;
    }
    info!(frames = frames.len(), dir = %dir.display(), "synthetic recording written");
    Ok(())
}

/// Writes one JSON object per committed frame.
struct JsonLinesEmitter<W: Write> {
    out: W,
    open: Option<TouchFrame>,
    all_frames: bool,
    error: Option<anyhow::Error>,
}

impl<W: Write> JsonLinesEmitter<W> {
    fn new(out: W, all_frames: bool) -> Self {
        Self {
            out,
            open: None,
            all_frames,
            error: None,
        }
    }

    fn push(&mut self, event: CursorEvent) {
        if let Some(frame) = self.open.as_mut() {
            frame.events.push(event);
        }
    }

    /// Surfaces the first write error, if any.
    fn check(&mut self) -> Result<()> {
        match self.error.take() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn finish(mut self) -> Result<()> {
        self.check()?;
        self.out.flush()?;
        Ok(())
    }
}

impl<W: Write> FrameEmitter for JsonLinesEmitter<W> {
    fn begin(&mut self, time: Duration) {
        self.open = Some(TouchFrame {
            time,
            events: Vec::new(),
        });
    }

    fn add(&mut self, id: CursorId, x: f32, y: f32) {
        self.push(CursorEvent::Add { id, x, y });
    }

    fn update(&mut self, id: CursorId, x: f32, y: f32) {
        self.push(CursorEvent::Update { id, x, y });
    }

    fn remove(&mut self, id: CursorId) {
        self.push(CursorEvent::Remove { id });
    }

    fn commit(&mut self) {
        let Some(frame) = self.open.take() else {
            return;
        };
        if self.error.is_some() || (frame.events.is_empty() && !self.all_frames) {
            return;
        }
        let written = serde_json::to_writer(&mut self.out, &frame)
            .map_err(anyhow::Error::from)
            .and_then(|()| writeln!(self.out).map_err(anyhow::Error::from));
        if let Err(e) = written {
            self.error = Some(e);
        }
    }
}
