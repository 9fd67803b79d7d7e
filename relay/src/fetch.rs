use std::path::{Path, PathBuf};
use std::time::Duration;

use frame_relay_common::config::DownloadConfig;
use futures_util::StreamExt;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use crate::RelayError;

/// A video ready for the decoder.
#[derive(Debug)]
pub struct LocalVideo {
    pub path: PathBuf,
    /// Set when the file was downloaded into the scratch directory and should
    /// be removed after sampling.
    pub downloaded: bool,
}

impl LocalVideo {
    /// Delete a downloaded file. Local inputs are left alone.
    pub async fn cleanup(self) {
        if !self.downloaded {
            return;
        }
        if let Err(e) = tokio::fs::remove_file(&self.path).await {
            warn!(path = %self.path.display(), error = %e, "failed to delete downloaded video");
        }
    }
}

pub fn is_remote(input: &str) -> bool {
    let lower = input.trim_start().to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

/// Last path segment of a URL, without query string or fragment.
fn download_file_name(url: &str) -> String {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    let after_scheme = path.split_once("://").map_or(path, |(_, rest)| rest);
    match after_scheme.split_once('/') {
        Some((_, rest)) => match rest.rsplit('/').next() {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => "video".into(),
        },
        None => "video".into(),
    }
}

/// Make `input` available as a local file. HTTP(S) URLs are streamed into
/// the scratch directory; anything else is taken to be a local path.
pub async fn fetch_video(input: &str, config: &DownloadConfig) -> Result<LocalVideo, RelayError> {
    if !is_remote(input) {
        debug!(path = input, "using local video");
        return Ok(LocalVideo {
            path: PathBuf::from(input),
            downloaded: false,
        });
    }

    let dest = config.scratch_dir.join(download_file_name(input));
    download(input, &dest, config).await?;
    Ok(LocalVideo {
        path: dest,
        downloaded: true,
    })
}

async fn download(url: &str, dest: &Path, config: &DownloadConfig) -> Result<(), RelayError> {
    let client = reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()
        .map_err(RelayError::Download)?;

    info!(url, dest = %dest.display(), "downloading video");
    let response = client.get(url).send().await.map_err(RelayError::Download)?;

    if !response.status().is_success() {
        return Err(RelayError::DownloadStatus(response.status().as_u16()));
    }

    tokio::fs::create_dir_all(&config.scratch_dir)
        .await
        .map_err(|e| RelayError::Io(config.scratch_dir.display().to_string(), e))?;

    match write_body(response, dest).await {
        Ok(total) => {
            info!(url, bytes = total, "download complete");
            Ok(())
        }
        Err(e) => {
            // Don't leave a partial video behind in the scratch directory.
            if let Err(rm) = tokio::fs::remove_file(dest).await {
                if rm.kind() != std::io::ErrorKind::NotFound {
                    warn!(path = %dest.display(), error = %rm, "failed to delete partial download");
                }
            }
            Err(e)
        }
    }
}

async fn write_body(response: reqwest::Response, dest: &Path) -> Result<u64, RelayError> {
    let mut file = tokio::fs::File::create(dest)
        .await
        .map_err(|e| RelayError::Io(dest.display().to_string(), e))?;

    let mut byte_stream = response.bytes_stream();
    let mut total: u64 = 0;
    while let Some(chunk) = byte_stream.next().await {
        let chunk = chunk.map_err(RelayError::Download)?;
        file.write_all(&chunk)
            .await
            .map_err(|e| RelayError::Io(dest.display().to_string(), e))?;
        total += chunk.len() as u64;
    }
    file.flush()
        .await
        .map_err(|e| RelayError::Io(dest.display().to_string(), e))?;
    Ok(total)
}
