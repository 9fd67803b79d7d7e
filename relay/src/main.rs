mod event;
mod fetch;
mod parts;

use frame_relay_common::config::Config;
use frame_relay_common::frame::source_prefix;
use frame_relay_sampler::{sample_video, SampleError};
use std::path::{Path, PathBuf};
use tokio::io::AsyncReadExt;
use tracing::{error, info};

use parts::RelayPayload;

#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("invalid event: {0}")]
    InvalidEvent(String),
    #[error("failed to read event {0}: {1}")]
    ReadEvent(String, std::io::Error),
    #[error("video download failed: {0}")]
    Download(reqwest::Error),
    #[error("video download returned HTTP status {0}")]
    DownloadStatus(u16),
    #[error("I/O error on {0}: {1}")]
    Io(String, std::io::Error),
    #[error("frame sampling failed: {0}")]
    Sample(#[from] SampleError),
    #[error("sampling task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
    #[error("failed to serialize payload: {0}")]
    Json(#[from] serde_json::Error),
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let mut args = std::env::args().skip(1);
    let config_path = args
        .next()
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("config.toml"));
    let event_path = args.next().map(PathBuf::from);

    let config = match Config::load(&config_path) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config from {}: {e}", config_path.display());
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.logging.level.parse().unwrap_or_default()),
        )
        .with_writer(std::io::stderr)
        .init();

    info!(
        output_dir = %config.sampler.output_dir.display(),
        samples_per_second = config.sampler.samples_per_second,
        "starting frame-relay"
    );

    let payload = match run(&config, event_path.as_deref()).await {
        Ok(p) => p,
        Err(e) => {
            error!(error = %e, "video processing failed");
            std::process::exit(1);
        }
    };

    match serde_json::to_string_pretty(&payload) {
        Ok(json) => println!("{json}"),
        Err(e) => {
            error!(error = %e, "failed to serialize payload");
            std::process::exit(1);
        }
    }
}

/// Handle one ingest event: fetch the video, sample it, assemble the payload.
async fn run(config: &Config, event_path: Option<&Path>) -> Result<RelayPayload, RelayError> {
    let raw = read_event(event_path).await?;
    let job = event::parse_event(&raw)?;
    info!(
        video_url = job.video_url,
        video_id = %job.video_id.as_ref().unwrap_or(&serde_json::Value::Null),
        count = job.count,
        "processing video"
    );

    let video = fetch::fetch_video(&job.video_url, &config.download).await?;

    let input = video.path.to_string_lossy().into_owned();
    let prefix = source_prefix(&job.video_url);
    let sampler_config = config.sampler.clone();
    let sampled =
        tokio::task::spawn_blocking(move || sample_video(&input, &prefix, &sampler_config)).await;
    video.cleanup().await;
    let frames = sampled??;

    let payload = parts::build_payload(&job, &frames, &config.payload);
    info!(
        frames = frames.len(),
        parts = payload.content_parts.len(),
        "payload assembled"
    );
    Ok(payload)
}

async fn read_event(path: Option<&Path>) -> Result<Vec<u8>, RelayError> {
    match path {
        Some(path) => tokio::fs::read(path)
            .await
            .map_err(|e| RelayError::ReadEvent(path.display().to_string(), e)),
        None => {
            let mut raw = Vec::new();
            tokio::io::stdin()
                .read_to_end(&mut raw)
                .await
                .map_err(|e| RelayError::ReadEvent("stdin".into(), e))?;
            Ok(raw)
        }
    }
}
