use log::{debug, warn};
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs::{self, File};
use tokio::io::AsyncWriteExt;

use crate::error::DownloadError;

/// Stream `url` into `path`, returning the number of bytes written.
///
/// Bytes go to a sibling `.part-<uuid>` file that is renamed into place only after the size
/// check passes; on any failure the partial file is removed and `path` is left untouched.
pub async fn fetch_to_file(
    client: &Client,
    url: &str,
    path: &Path,
    min_size: u64,
    timeout: Duration,
) -> Result<u64, DownloadError> {
    let partial = partial_path(path);
    let result = stream_into(client, url, &partial, min_size, timeout).await;

    match result {
        Ok(size) => {
            if let Err(e) = fs::rename(&partial, path).await {
                let _ = fs::remove_file(&partial).await;
                return Err(e.into());
            }
            Ok(size)
        }
        Err(e) => {
            let _ = fs::remove_file(&partial).await;
            Err(e)
        }
    }
}

fn partial_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(format!(".part-{}", uuid::Uuid::new_v4()));
    path.with_file_name(name)
}

async fn stream_into(
    client: &Client,
    url: &str,
    partial: &Path,
    min_size: u64,
    timeout: Duration,
) -> Result<u64, DownloadError> {
    let mut response = client.get(url).timeout(timeout).send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(DownloadError::Status(status.as_u16()));
    }

    // Only logged; the size check below is what rejects a download
    let content_type = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_lowercase();
    if !content_type.contains("pdf") {
        warn!("Unexpected content type '{}' from {}", content_type, url);
    }

    let mut file = File::create(partial).await?;
    let mut size: u64 = 0;
    while let Some(chunk) = response.chunk().await? {
        file.write_all(&chunk).await?;
        size += chunk.len() as u64;
    }
    file.flush().await?;
    drop(file);

    debug!("Downloaded {} bytes from {}", size, url);
    if size < min_size {
        return Err(DownloadError::TooSmall {
            size,
            min: min_size,
        });
    }
    Ok(size)
}
