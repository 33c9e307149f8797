// src/main.rs
use anyhow::{bail, Context, Result};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info};
use vnect_pose::frames::FrameTensor;
use vnect_pose::inference::SimulatedEngine;
use vnect_pose::session::TickOutcome;
use vnect_pose::{JointIndex, PipelineConfig, PosePipeline, Session};

const USAGE: &str =
    "usage: pose_tracker <source> [--config <file.json>] [--duration <secs>] [--fps <n>]";

struct Args {
    source: PathBuf,
    config: Option<PathBuf>,
    duration: f64,
    fps: f64,
}

impl Args {
    fn parse(mut args: impl Iterator<Item = String>) -> Result<Self> {
        let mut source = None;
        let mut config = None;
        let mut duration = 10.0;
        let mut fps = 30.0;

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--config" => config = Some(PathBuf::from(args.next().context(USAGE)?)),
                "--duration" => {
                    duration = args.next().context(USAGE)?.parse().context("bad --duration")?
                }
                "--fps" => fps = args.next().context(USAGE)?.parse().context("bad --fps")?,
                flag if flag.starts_with("--") => bail!("unknown flag {}\n{}", flag, USAGE),
                _ if source.is_none() => source = Some(PathBuf::from(arg)),
                _ => bail!("unexpected argument {}\n{}", arg, USAGE),
            }
        }

        if !(fps > 0.0) {
            bail!("--fps must be positive");
        }
        Ok(Self {
            source: source.context(USAGE)?,
            config,
            duration,
            fps,
        })
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt::init();

    let args = Args::parse(std::env::args().skip(1))?;
    let config = match &args.config {
        Some(path) => PipelineConfig::load(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => PipelineConfig::default(),
    };

    let pipeline = PosePipeline::open(&args.source, &config)
        .with_context(|| format!("failed to start pipeline for {}", args.source.display()))?;

    // A still image as the source feeds the same frame every tick.
    let size = config.grid.image_size as u32;
    let frame = match image::open(&args.source) {
        Ok(img) => FrameTensor::from_image(&img, size),
        Err(_) => FrameTensor::blank(config.grid.image_size),
    };

    let engine = Arc::new(SimulatedEngine::new(&config.grid));
    let mut session = Session::new(pipeline, engine, &config.frames);

    let start = Instant::now();
    let mut ticker = tokio::time::interval(Duration::from_secs_f64(1.0 / args.fps));
    let mut last_report = 0.0;
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    let mut failure = None;
    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = &mut ctrl_c => {
                info!("Interrupted, shutting down");
                break;
            }
        }

        let elapsed = start.elapsed().as_secs_f64();
        if elapsed > args.duration {
            break;
        }

        let outcome = match session.tick(elapsed, Some(frame.clone())).await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!("Tick at {:.2}s failed: {}", elapsed, e);
                failure = Some(e);
                break;
            }
        };
        if elapsed - last_report >= 1.0 {
            last_report = elapsed;
            let hip = session.pipeline().skeleton().get(JointIndex::Hip).filtered_position;
            match outcome {
                TickOutcome::Played(index) => info!(
                    "t={:.2}s snapshot={:?} hip=({:.1}, {:.1}, {:.1})",
                    elapsed, index, hip.x, hip.y, hip.z
                ),
                TickOutcome::Recorded { .. } => info!(
                    "t={:.2}s frames={} hip=({:.1}, {:.1}, {:.1})",
                    elapsed,
                    session.frames_processed(),
                    hip.x,
                    hip.y,
                    hip.z
                ),
            }
        }
    }

    // The recording is flushed even when a tick failed.
    if let Some(path) = session.finish(start.elapsed().as_secs_f64()).await? {
        println!("Track written to {}", path.display());
    }
    match failure {
        Some(e) => Err(anyhow::Error::new(e).context("pipeline stopped")),
        None => Ok(()),
    }
}
