//! HTTP download functionality
//!
//! Handles downloading source archives with progress reporting, checksum
//! verification, and retry with exponential backoff.

use futures::StreamExt;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;

use crate::config::defaults;
use crate::error::DownloadError;

/// Progress callback type for download progress reporting
pub type ProgressCallback = Box<dyn Fn(u64, u64) + Send + Sync>;

/// Download result containing file path and metadata
#[derive(Debug)]
pub struct DownloadResult {
    /// Path to the downloaded file
    pub path: PathBuf,
    /// Size in bytes
    pub size: u64,
    /// SHA256 checksum of the downloaded content
    pub checksum: String,
}

/// Download manager for fetching archives with retry support
#[derive(Debug, Clone)]
pub struct DownloadManager {
    /// HTTP client
    client: reqwest::Client,
    /// Maximum retry attempts
    max_retries: u32,
    /// Base delay for exponential backoff (in milliseconds)
    base_delay_ms: u64,
}

impl DownloadManager {
    /// Create a new download manager
    pub fn new() -> Self {
        Self::with_config(defaults::MAX_DOWNLOAD_RETRIES, 1000)
    }

    /// Create a download manager with custom settings
    pub fn with_config(max_retries: u32, base_delay_ms: u64) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(300))
                .connect_timeout(Duration::from_secs(30))
                .build()
                .unwrap_or_else(|_| reqwest::Client::new()),
            max_retries,
            base_delay_ms,
        }
    }

    /// Get max retries
    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Download a file with retry logic
    ///
    /// # Arguments
    /// * `url` - URL to download from
    /// * `dest` - Destination path
    /// * `progress` - Optional progress callback (`bytes_downloaded`, `total_bytes`)
    pub async fn download(
        &self,
        url: &str,
        dest: &Path,
        progress: Option<ProgressCallback>,
    ) -> Result<DownloadResult, DownloadError> {
        let mut attempts = 0;
        let mut last_error = None;
        let mut delay_ms = self.base_delay_ms;

        while attempts < self.max_retries {
            attempts += 1;

            match self.download_once(url, dest, progress.as_ref()).await {
                Ok(result) => return Ok(result),
                Err(e) => {
                    last_error = Some(e);

                    if attempts < self.max_retries {
                        // Exponential backoff with cap at 30 seconds
                        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                        delay_ms = (delay_ms * 2).min(30_000);
                    }
                }
            }
        }

        // Clean up partial download on failure
        let _ = tokio::fs::remove_file(dest).await;

        Err(last_error.unwrap_or_else(|| DownloadError::MaxRetriesExceeded {
            url: url.to_string(),
            retries: self.max_retries,
        }))
    }

    /// Single download attempt without retry
    async fn download_once(
        &self,
        url: &str,
        dest: &Path,
        progress: Option<&ProgressCallback>,
    ) -> Result<DownloadResult, DownloadError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| DownloadError::NetworkError {
                url: url.to_string(),
                error: e.to_string(),
            })?;

        if !response.status().is_success() {
            return Err(DownloadError::NetworkError {
                url: url.to_string(),
                error: format!("HTTP {}", response.status()),
            });
        }

        let total_size = response.content_length().unwrap_or(0);

        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| DownloadError::IoError {
                    path: parent.to_path_buf(),
                    error: e.to_string(),
                })?;
        }

        let mut file = File::create(dest)
            .await
            .map_err(|e| DownloadError::IoError {
                path: dest.to_path_buf(),
                error: e.to_string(),
            })?;

        let mut hasher = Sha256::new();
        let mut downloaded: u64 = 0;
        let mut stream = response.bytes_stream();

        while let Some(chunk_result) = stream.next().await {
            let chunk = chunk_result.map_err(|e| DownloadError::NetworkError {
                url: url.to_string(),
                error: e.to_string(),
            })?;

            file.write_all(&chunk)
                .await
                .map_err(|e| DownloadError::IoError {
                    path: dest.to_path_buf(),
                    error: e.to_string(),
                })?;

            hasher.update(&chunk);
            downloaded += chunk.len() as u64;

            if let Some(cb) = progress {
                cb(downloaded, total_size);
            }
        }

        file.flush().await.map_err(|e| DownloadError::IoError {
            path: dest.to_path_buf(),
            error: e.to_string(),
        })?;

        let checksum = hex::encode(hasher.finalize());

        Ok(DownloadResult {
            path: dest.to_path_buf(),
            size: downloaded,
            checksum,
        })
    }

    /// Download a file and verify its checksum
    ///
    /// # Arguments
    /// * `url` - URL to download from
    /// * `dest` - Destination path
    /// * `expected_checksum` - Expected SHA256 checksum
    /// * `progress` - Optional progress callback
    pub async fn download_verified(
        &self,
        url: &str,
        dest: &Path,
        expected_checksum: &str,
        progress: Option<ProgressCallback>,
    ) -> Result<DownloadResult, DownloadError> {
        let result = self.download(url, dest, progress).await?;

        if result.checksum.to_lowercase() != expected_checksum.to_lowercase() {
            // Delete corrupted download
            let _ = tokio::fs::remove_file(dest).await;

            return Err(DownloadError::ChecksumFailed {
                file: dest.display().to_string(),
            });
        }

        Ok(result)
    }
}

impl Default for DownloadManager {
    fn default() -> Self {
        Self::new()
    }
}

/// Compute SHA256 checksum of data
pub fn compute_checksum(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_compute_checksum() {
        let data = b"hello world";
        let checksum = compute_checksum(data);
        // Known SHA256 of "hello world"
        assert_eq!(
            checksum,
            "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
        );
    }

    #[test]
    fn test_download_manager_default() {
        let manager = DownloadManager::new();
        assert_eq!(manager.max_retries(), 3);
    }

    #[tokio::test]
    async fn test_download_success() {
        let mock_server = MockServer::start().await;
        let content = b"archive bytes";
        let checksum = compute_checksum(content);

        Mock::given(method("GET"))
            .and(path("/tool.tar.xz"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(content.to_vec()))
            .mount(&mock_server)
            .await;

        let temp = TempDir::new().unwrap();
        let dest = temp.path().join("tool.tar.xz");
        let manager = DownloadManager::new();

        let result = manager
            .download(&format!("{}/tool.tar.xz", mock_server.uri()), &dest, None)
            .await;

        assert!(result.is_ok());
        let download_result = result.unwrap();
        assert_eq!(download_result.checksum, checksum);
        assert!(dest.exists());
        assert_eq!(std::fs::read(&dest).unwrap(), content);
    }

    #[tokio::test]
    async fn test_download_verified_checksum_mismatch() {
        let mock_server = MockServer::start().await;
        let content = b"content with wrong checksum";

        Mock::given(method("GET"))
            .and(path("/wrong.tar.xz"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(content.to_vec()))
            .mount(&mock_server)
            .await;

        let temp = TempDir::new().unwrap();
        let dest = temp.path().join("wrong.tar.xz");
        let manager = DownloadManager::new();

        let result = manager
            .download_verified(
                &format!("{}/wrong.tar.xz", mock_server.uri()),
                &dest,
                "0000000000000000000000000000000000000000000000000000000000000000",
                None,
            )
            .await;

        assert!(result.is_err());
        match result.unwrap_err() {
            DownloadError::ChecksumFailed { .. } => {}
            e => panic!("Expected ChecksumFailed error, got: {e:?}"),
        }

        // File should be deleted after checksum failure
        assert!(!dest.exists());
    }

    #[tokio::test]
    async fn test_download_retry_on_failure() {
        let mock_server = MockServer::start().await;
        let content = b"retry content";

        // First two requests fail, third succeeds
        Mock::given(method("GET"))
            .and(path("/retry.tar.bz2"))
            .respond_with(ResponseTemplate::new(500))
            .up_to_n_times(2)
            .mount(&mock_server)
            .await;

        Mock::given(method("GET"))
            .and(path("/retry.tar.bz2"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(content.to_vec()))
            .mount(&mock_server)
            .await;

        let temp = TempDir::new().unwrap();
        let dest = temp.path().join("retry.tar.bz2");
        // Use short delays for testing
        let manager = DownloadManager::with_config(3, 10);

        let result = manager
            .download(&format!("{}/retry.tar.bz2", mock_server.uri()), &dest, None)
            .await;

        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_download_max_retries_exceeded() {
        let mock_server = MockServer::start().await;

        // All requests fail
        Mock::given(method("GET"))
            .and(path("/fail.tar.xz"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&mock_server)
            .await;

        let temp = TempDir::new().unwrap();
        let dest = temp.path().join("fail.tar.xz");
        // Use short delays for testing
        let manager = DownloadManager::with_config(3, 10);

        let result = manager
            .download(&format!("{}/fail.tar.xz", mock_server.uri()), &dest, None)
            .await;

        assert!(result.is_err());
        // File should not exist after all retries fail
        assert!(!dest.exists());
    }

    #[tokio::test]
    async fn test_download_with_progress_callback() {
        let mock_server = MockServer::start().await;
        let content = b"progress content";

        Mock::given(method("GET"))
            .and(path("/progress.tar.xz"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(content.to_vec()))
            .mount(&mock_server)
            .await;

        let temp = TempDir::new().unwrap();
        let dest = temp.path().join("progress.tar.xz");
        let manager = DownloadManager::new();

        let progress_called = std::sync::Arc::new(std::sync::atomic::AtomicBool::new(false));
        let progress_called_clone = progress_called.clone();

        let progress: ProgressCallback = Box::new(move |downloaded, _total| {
            if downloaded > 0 {
                progress_called_clone.store(true, std::sync::atomic::Ordering::SeqCst);
            }
        });

        let result = manager
            .download(
                &format!("{}/progress.tar.xz", mock_server.uri()),
                &dest,
                Some(progress),
            )
            .await;

        assert!(result.is_ok());
        assert!(progress_called.load(std::sync::atomic::Ordering::SeqCst));
    }
}
