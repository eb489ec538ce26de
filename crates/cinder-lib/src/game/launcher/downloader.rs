/// File download helpers with SHA-1 validation, retry, and cooperative
/// cancellation through a shared [`ProgressTracker`]
use crate::game::launcher::error::LaunchError;
use crate::game::launcher::progress::ProgressTracker;
use futures::StreamExt;
use reqwest::Client;
use sha1::{Digest, Sha1};
use std::path::Path;
use tokio::fs::{create_dir_all, File};
use tokio::io::AsyncWriteExt;

const MAX_RETRIES: u32 = 3;
const RETRY_DELAY_MS: u64 = 1000;

/// Download a file to `path`, verifying against `expected_sha1` when given.
/// A valid existing file is left untouched; downloads stream to a `.part`
/// file and rename into place only after validation.
pub async fn download_to_path(
    client: &Client,
    url: &str,
    path: &Path,
    expected_sha1: Option<&str>,
    tracker: &ProgressTracker,
) -> Result<(), LaunchError> {
    log::debug!("Downloading: {} -> {:?}", url, path);

    if tracker.is_cancelled() {
        return Err(LaunchError::Cancelled);
    }

    if path.exists() {
        if let Some(expected) = expected_sha1 {
            match tokio::fs::read(path).await {
                Ok(bytes) => {
                    let mut hasher = Sha1::new();
                    hasher.update(&bytes);
                    let computed = format!("{:x}", hasher.finalize());
                    if computed.eq_ignore_ascii_case(expected) {
                        log::debug!("File exists and hash matches, skipping: {:?}", path);
                        return Ok(());
                    }
                    log::info!(
                        "File exists but hash mismatches ({} != {}), re-downloading: {:?}",
                        computed,
                        expected,
                        path
                    );
                }
                Err(e) => {
                    log::warn!(
                        "Failed to read existing file for validation: {} - {}",
                        e,
                        path.display()
                    );
                }
            }
        } else {
            log::debug!("File exists and no hash provided, skipping: {:?}", path);
            return Ok(());
        }
    }

    if let Some(parent) = path.parent() {
        create_dir_all(parent)
            .await
            .map_err(|e| LaunchError::CreatingFile {
                path: parent.display().to_string(),
                source: e,
            })?;
    }

    let mut retries = 0;
    loop {
        match download_once(client, url, path, expected_sha1, tracker).await {
            Ok(()) => {
                log::debug!("Download complete: {:?}", path);
                return Ok(());
            }
            Err(e) if e.is_cancellation() => return Err(e),
            Err(e) => {
                retries += 1;
                if retries >= MAX_RETRIES {
                    log::error!("Download failed after {} retries: {}", MAX_RETRIES, e);
                    return Err(e);
                }
                log::warn!(
                    "Download failed (attempt {}/{}): {}. Retrying...",
                    retries,
                    MAX_RETRIES,
                    e
                );
                tokio::time::sleep(tokio::time::Duration::from_millis(
                    RETRY_DELAY_MS * retries as u64,
                ))
                .await;
            }
        }
    }
}

async fn download_once(
    client: &Client,
    url: &str,
    path: &Path,
    expected_sha1: Option<&str>,
    tracker: &ProgressTracker,
) -> Result<(), LaunchError> {
    let downloading = |source: anyhow::Error| LaunchError::Downloading {
        url: url.to_string(),
        source,
    };

    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| downloading(e.into()))?;

    if !response.status().is_success() {
        return Err(downloading(anyhow::anyhow!(
            "HTTP error {}: {}",
            response.status(),
            url
        )));
    }

    // Stream into a temp file so a failed download never leaves a partial
    // file at the destination
    let tmp_name = format!(
        "{}.part",
        path.file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("download")
    );
    let tmp_path = path.with_file_name(tmp_name);
    let mut file = File::create(&tmp_path)
        .await
        .map_err(|e| LaunchError::CreatingFile {
            path: tmp_path.display().to_string(),
            source: e,
        })?;

    let mut hasher = Sha1::new();
    let mut stream = response.bytes_stream();

    while let Some(chunk_result) = stream.next().await {
        if tracker.is_cancelled() {
            drop(file);
            let _ = tokio::fs::remove_file(&tmp_path).await;
            log::warn!("Download cancelled: {:?}", path);
            return Err(LaunchError::Cancelled);
        }

        let chunk = chunk_result.map_err(|e| downloading(e.into()))?;
        file.write_all(&chunk)
            .await
            .map_err(|e| downloading(e.into()))?;
        hasher.update(&chunk);
    }

    file.flush().await.map_err(|e| downloading(e.into()))?;
    file.sync_all().await.map_err(|e| downloading(e.into()))?;
    drop(file);

    if let Some(expected) = expected_sha1 {
        let computed = format!("{:x}", hasher.finalize());
        if !computed.eq_ignore_ascii_case(expected) {
            let _ = tokio::fs::remove_file(&tmp_path).await;
            return Err(LaunchError::ShaMismatch {
                path: path.display().to_string(),
                expected: expected.to_string(),
                actual: computed,
            });
        }
        log::debug!("SHA1 validated: {}", computed);
    }

    tokio::fs::rename(&tmp_path, path)
        .await
        .map_err(|e| downloading(e.into()))
}

/// Download JSON using an existing Client and deserialize
pub async fn download_json<T: serde::de::DeserializeOwned>(
    client: &Client,
    url: &str,
) -> anyhow::Result<T> {
    log::debug!("Downloading JSON: {}", url);
    let response = client.get(url).send().await?;

    if !response.status().is_success() {
        anyhow::bail!("HTTP error {}: {}", response.status(), url);
    }

    let data = response.json().await?;
    Ok(data)
}
