use anyhow::{Context, Result, bail};
use clap::Parser;
use depth_touch::depth_source::{CaptureSource, FrameGrabber, PngSequenceGrabber, ScriptedGrabber};
use depth_touch::synthetic::SyntheticScene;
use depth_touch::{TouchConfig, TouchPipeline, TracingEmitter, train_from_source};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(
    name = "depth_touch",
    about = "Turns a depth camera view of a surface into touch cursors"
)]
struct Args {
    /// TOML configuration file; built-in defaults are used when omitted
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
    /// Directory of 16-bit PNG depth frames to play back
    #[arg(
        long,
        value_name = "DIR",
        conflicts_with = "synthetic",
        required_unless_present = "synthetic"
    )]
    frames: Option<PathBuf>,
    /// Play back at most this many frames per second (0 = as fast as possible)
    #[arg(long, default_value_t = 30.0, value_parser = playback_rate)]
    fps: f64,
    /// Restart the recording when it ends
    #[arg(long = "loop")]
    looping: bool,
    /// Run on a generated scene instead of a recording
    #[arg(long)]
    synthetic: bool,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "depth_touch=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if let Err(e) = run(Args::parse()).await {
        error!("{e:#}");
        std::process::exit(1);
    }
}

async fn run(args: Args) -> Result<()> {
    info!("Starting depth_touch v{}", env!("CARGO_PKG_VERSION"));

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

    let source = if args.synthetic {
        let scene = SyntheticScene {
            width: config.sensor.width,
            height: config.sensor.height,
            roi: config.roi,
            training_frames: config.background.training_frames,
            ..SyntheticScene::default()
        };
        let frames = scene.frames().into_iter().map(Ok).collect();
        let mut grabber = ScriptedGrabber::new(scene.width, scene.height, frames);
        if let Some(interval) = frame_interval(args.fps) {
            grabber = grabber.paced(interval);
        }
        if args.looping {
            grabber = grabber.looping();
        }
        start(grabber, &config)?
    } else {
        let dir = args.frames.as_ref().context("no frame directory given")?;
        let grabber = PngSequenceGrabber::open(dir)?
            .with_fps(args.fps)
            .looping(args.looping);
        start(grabber, &config)?
    };

    process(source, &config).await
}

/// Parses `--fps`: a finite rate, zero meaning unpaced.
fn playback_rate(value: &str) -> Result<f64, String> {
    let fps: f64 = value.parse().map_err(|e| format!("{e}"))?;
    if !fps.is_finite() || fps < 0.0 {
        return Err(format!("frame rate must be a finite number >= 0, got {value}"));
    }
    if fps > 0.0 && frame_interval(fps).is_none() {
        return Err(format!("frame rate {value} is too low"));
    }
    Ok(fps)
}

fn frame_interval(fps: f64) -> Option<Duration> {
    (fps > 0.0).then(|| Duration::try_from_secs_f64(1.0 / fps).ok()).flatten()
}

fn start<G: FrameGrabber>(grabber: G, config: &TouchConfig) -> Result<CaptureSource> {
    let expected = (config.sensor.width, config.sensor.height);
    if grabber.dimensions() != expected {
        bail!(
            "depth source delivers {:?} frames, configuration expects {:?}",
            grabber.dimensions(),
            expected
        );
    }
    Ok(CaptureSource::start(grabber))
}

async fn process(mut source: CaptureSource, config: &TouchConfig) -> Result<()> {
    let result = async {
        let background = train_from_source(&mut source, config.background.training_frames).await?;
        let mut pipeline = TouchPipeline::new(config, background)?;
        let mut emitter = TracingEmitter::default();

        let shutdown = async {
            if tokio::signal::ctrl_c().await.is_err() {
                // Without a signal handler, run until the source ends.
                std::future::pending::<()>().await;
            }
        };
        let summary = pipeline.run(&mut source, &mut emitter, shutdown).await?;
        info!(processed = summary.processed, dropped = summary.dropped, "done");
        anyhow::Ok(())
    }
    .await;

    source.shutdown().await?;
    result
}
