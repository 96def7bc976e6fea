//! Mechanism video generator binary.
//!
//! Usage: `mvid-generate <subject> [--duration 20s|40s|60s] [--quality high|medium|low]
//! [--format mp4|webm] [--continuity] [--output PATH]`. Each flag falls back
//! to its `MVID_*` environment variable.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio::sync::broadcast::error::RecvError;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use mvid_clip_client::{ClipGeneratorClient, ContentServiceClient, MergeJobClient, SegmentDownloader};
use mvid_media::{Transcoder, TranscoderConfig};
use mvid_models::{slugify, DurationClass, OutputFormat, PipelineEvent, Quality, VideoOptions};
use mvid_pipeline::adapters::TranscoderFrameExtractor;
use mvid_pipeline::collaborators::Uploader;
use mvid_pipeline::{
    cancel_pair, metrics, ConcatPipeline, Orchestrator, PipelineConfig, RunRequest, SegmentEngine,
};
use mvid_storage::R2Client;

#[tokio::main]
async fn main() -> ExitCode {
    // Install rustls crypto provider (required for TLS/HTTPS)
    if rustls::crypto::ring::default_provider()
        .install_default()
        .is_err()
    {
        eprintln!("rustls crypto provider was already installed");
    }

    // Load environment variables
    dotenvy::dotenv().ok();

    if let Err(e) = init_tracing() {
        eprintln!("Failed to initialize logging: {:#}", e);
        return ExitCode::FAILURE;
    }

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Generation failed: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn init_tracing() -> anyhow::Result<()> {
    // Colored output for dev, JSON for production
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter = EnvFilter::from_default_env().add_directive("mvid=info".parse()?);

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .try_init()?;
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
            .try_init()?;
    }
    Ok(())
}

/// Generate a mechanism-of-action video for a subject.
#[derive(Debug, Parser)]
#[command(name = "mvid-generate")]
#[command(version)]
struct Args {
    /// Drug or subject to explain
    subject: String,

    /// Total length (20s, 40s, 60s)
    #[arg(long, env = "MVID_DURATION", default_value = "20s")]
    duration: DurationClass,

    /// Encoding quality (high, medium, low)
    #[arg(long, env = "MVID_QUALITY", default_value = "medium")]
    quality: Quality,

    /// Output container (mp4, webm)
    #[arg(long, env = "MVID_FORMAT", default_value = "mp4")]
    format: OutputFormat,

    /// Chain segments through their last frame
    #[arg(long, env = "MVID_PREFER_CONTINUITY")]
    continuity: bool,

    /// Output file path (defaults to ./{slug}.{ext})
    #[arg(long, env = "MVID_OUTPUT")]
    output: Option<PathBuf>,
}

async fn run() -> anyhow::Result<()> {
    let args = Args::parse();

    if let Some(port) = std::env::var("METRICS_PORT").ok().and_then(|p| p.parse().ok()) {
        metrics::init_exporter(port).context("Failed to install Prometheus exporter")?;
        info!(port, "Metrics exporter listening");
    }

    let config = PipelineConfig::from_env();
    info!("Pipeline config: {:?}", config);

    let transcoder = Arc::new(Transcoder::new(TranscoderConfig {
        work_root: config.work_dir.clone(),
        job_timeout_secs: None,
    }));
    let generator = Arc::new(ClipGeneratorClient::from_env().context("Failed to create clip generator client")?);
    let content = Arc::new(ContentServiceClient::from_env().context("Failed to create content service client")?);
    let merge_api = Arc::new(MergeJobClient::from_env().context("Failed to create merge backend client")?);
    let fetcher = Arc::new(SegmentDownloader::new(config.segment_download_timeout)?);

    let uploader: Option<Arc<dyn Uploader>> = if config.upload_enabled {
        match R2Client::from_env().await {
            Ok(client) => Some(Arc::new(client)),
            Err(e) => {
                warn!("Storage unavailable, skipping upload: {}", e);
                None
            }
        }
    } else {
        None
    };

    let engine = SegmentEngine::new(
        generator,
        Arc::new(TranscoderFrameExtractor::new(Arc::clone(&transcoder))),
    );
    let concat = ConcatPipeline::standard(merge_api, fetcher, transcoder, &config);
    let orchestrator = Orchestrator::new(config, content, engine, concat, uploader);

    let mut events = orchestrator.subscribe();
    let event_log = tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => log_event(&event),
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "Event log fell behind"),
                Err(RecvError::Closed) => break,
            }
        }
    });

    let (cancel_tx, cancel_rx) = cancel_pair();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Received shutdown signal, cancelling run");
            cancel_tx.send(true).ok();
        }
    });

    let options = VideoOptions::new(args.duration).with_quality(args.quality);
    let request = RunRequest::new(args.subject.clone(), options)
        .with_format(args.format)
        .with_continuity(args.continuity);
    let outcome = orchestrator.run(request, Some(cancel_rx)).await;

    drop(orchestrator);
    event_log.await.ok();
    let result = outcome?;

    let output = args.output.unwrap_or_else(|| {
        PathBuf::from(format!(
            "{}.{}",
            slugify(&args.subject),
            result.merge.format.extension()
        ))
    });
    tokio::fs::write(&output, &result.merge.bytes)
        .await
        .with_context(|| format!("Failed to write {}", output.display()))?;

    info!(
        path = %output.display(),
        tier = %result.merge.tier,
        duration_secs = result.merge.duration_seconds,
        size_bytes = result.merge.size_bytes,
        "Wrote merged video"
    );
    if let Some(asset) = &result.upload {
        info!(url = %asset.url, key = %asset.key, "Uploaded merged video");
    }
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

fn log_event(event: &PipelineEvent) {
    match event {
        PipelineEvent::Progress(p) => info!(stage = p.stage.as_str(), percent = p.percent, "{}", p.message),
        PipelineEvent::SegmentStarted { segment_number, .. } => {
            info!(segment_number, "Segment started")
        }
        PipelineEvent::SegmentCompleted { segment } => info!(
            segment_number = segment.segment_number,
            status = %segment.status,
            "Segment finished"
        ),
        PipelineEvent::AllSegmentsStarted { segment_count } => {
            info!(segment_count, "All segments dispatched")
        }
        PipelineEvent::Error {
            message,
            segment_number,
            fatal,
            ..
        } => {
            if *fatal {
                error!(?segment_number, "{}", message)
            } else {
                warn!(?segment_number, "{}", message)
            }
        }
    }
}
