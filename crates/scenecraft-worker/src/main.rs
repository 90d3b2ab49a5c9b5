//! Scene composition worker binary.
//!
//! Renders one job description from disk and prints its report as JSON.

use std::path::PathBuf;

use anyhow::{bail, Context};
use clap::Parser;
use tokio::sync::watch;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use scenecraft_media::{check_ffmpeg, check_ffprobe};
use scenecraft_models::{Job, JobRequest, OutputMode};
use scenecraft_worker::{PipelineConfig, PipelineError, ScenePipeline};

#[derive(Debug, Parser)]
#[command(name = "scenecraft-worker", version, about = "Compose scene clips into a video")]
struct Cli {
    /// Job description (JSON)
    #[arg(required_unless_present = "print_schema")]
    job: Option<PathBuf>,

    /// Root for per-job working directories
    #[arg(long)]
    work_dir: Option<PathBuf>,

    /// Directory for final artifacts
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Delivery mode: timeline or scene_clips
    #[arg(long)]
    mode: Option<OutputMode>,

    /// Keep intermediates after the job finishes
    #[arg(long)]
    keep_intermediates: bool,

    /// Print the job description JSON schema and exit
    #[arg(long)]
    print_schema: bool,
}

fn init_tracing() {
    // Colored output for dev, JSON for production
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("scenecraft=info"));

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    if cli.print_schema {
        let schema = schemars::schema_for!(JobRequest);
        println!("{}", serde_json::to_string_pretty(&schema)?);
        return Ok(());
    }

    init_tracing();

    let mut config = PipelineConfig::from_env();
    if let Some(dir) = cli.work_dir {
        config.work_dir = dir;
    }
    if let Some(dir) = cli.output_dir {
        config.output_dir = dir;
    }
    if cli.keep_intermediates {
        config.keep_intermediates = true;
    }
    info!("Pipeline config: {:?}", config);

    let Some(job_path) = cli.job else {
        bail!("a job description path is required");
    };
    let raw = tokio::fs::read_to_string(&job_path)
        .await
        .with_context(|| format!("reading {}", job_path.display()))?;
    let request: JobRequest = serde_json::from_str(&raw)
        .with_context(|| format!("parsing {}", job_path.display()))?;

    let mut job = Job::from_request(request)?;
    if let Some(mode) = cli.mode {
        job.mode = Some(mode);
    }

    // Ctrl-C kills in-flight FFmpeg processes
    let (cancel_tx, cancel_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received shutdown signal, cancelling job");
            let _ = cancel_tx.send(true);
        }
    });

    let pipeline = ScenePipeline::new(config)?.with_cancel(cancel_rx);

    let ffmpeg = check_ffmpeg()?;
    let ffprobe = check_ffprobe()?;
    info!(ffmpeg = %ffmpeg.display(), ffprobe = %ffprobe.display(), "Found media tools");

    match pipeline.run(&job).await {
        Ok(report) => {
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(())
        }
        Err(PipelineError::NoRenderableScenes { dropped }) => {
            for scene in &dropped {
                error!(scene_number = scene.scene_number, reason = %scene.reason, "Scene dropped");
            }
            bail!("job {} failed: no scene rendered", job.id)
        }
        Err(e) => Err(e).with_context(|| format!("job {} failed", job.id)),
    }
}
