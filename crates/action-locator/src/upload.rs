//! File uploads through `input[type=file]`
//!
//! Uploads bypass text and coordinate resolution: the uploader scans for file
//! inputs, prefers one whose `accept` attribute fits the file, and sets the
//! file directly. Remote `http(s)` sources are downloaded into a temporary
//! file first, which is removed after a grace period.

use crate::{errors::LocatorError, types::UploadSettings};
use action_primitives::{evaluate_as, scripts, FileInputRecord, PageAutomation};
use async_trait::async_trait;
use reqwest::Url;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempPath;
use tracing::{debug, info, warn};

/// Source of remote upload files
#[async_trait]
pub trait FileFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, LocatorError>;
}

/// Fetches over HTTP(S) with `reqwest`
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Result<Self, LocatorError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| LocatorError::Internal(format!("http client: {}", e)))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl FileFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, LocatorError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| {
                if e.is_timeout() {
                    LocatorError::Timeout(format!("download of {} timed out", url))
                } else {
                    LocatorError::Download(format!("{}: {}", url, e))
                }
            })?;
        let bytes = response
            .bytes()
            .await
            .map_err(|e| LocatorError::Download(format!("{}: {}", url, e)))?;
        Ok(bytes.to_vec())
    }
}

/// Whether `path` names an http(s) resource rather than a local file
pub fn is_remote(path: &str) -> bool {
    let lower = path.trim().to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

/// Lowercase extension of a local path or URL path, without the dot
pub fn file_extension(path: &str) -> Option<String> {
    let path = path.trim();
    let file_name = if is_remote(path) {
        Url::parse(path)
            .ok()?
            .path_segments()?
            .filter(|s| !s.is_empty())
            .last()?
            .to_string()
    } else {
        Path::new(path).file_name()?.to_str()?.to_string()
    };
    let (_, ext) = file_name.rsplit_once('.')?;
    if ext.is_empty() {
        None
    } else {
        Some(ext.to_ascii_lowercase())
    }
}

/// MIME type for common upload extensions
pub fn mime_for_extension(ext: &str) -> Option<&'static str> {
    let mime = match ext {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "bmp" => "image/bmp",
        "svg" => "image/svg+xml",
        "mp4" => "video/mp4",
        "webm" => "video/webm",
        "mov" => "video/quicktime",
        "mp3" => "audio/mpeg",
        "wav" => "audio/wav",
        "ogg" => "audio/ogg",
        "pdf" => "application/pdf",
        "json" => "application/json",
        "zip" => "application/zip",
        "txt" => "text/plain",
        "csv" => "text/csv",
        "html" | "htm" => "text/html",
        _ => return None,
    };
    Some(mime)
}

/// Whether an `accept` attribute admits a file with extension `ext`
pub fn accept_matches(accept: &str, ext: &str) -> bool {
    let ext = ext.to_ascii_lowercase();
    let mime = mime_for_extension(&ext);
    accept
        .split(',')
        .map(|token| token.trim().to_ascii_lowercase())
        .filter(|token| !token.is_empty())
        .any(|token| {
            if let Some(suffix) = token.strip_prefix('.') {
                suffix == ext
            } else if token == "*/*" {
                true
            } else if let Some(family) = token.strip_suffix("/*") {
                mime.map_or(false, |m| m.split('/').next() == Some(family))
            } else {
                mime == Some(token.as_str())
            }
        })
}

/// Pick the input to receive `file_path`: first one whose `accept` fits,
/// otherwise the first input found.
pub fn choose_input<'a>(
    inputs: &'a [FileInputRecord],
    file_path: &str,
) -> Option<&'a FileInputRecord> {
    let ext = file_extension(file_path);
    ext.as_deref()
        .and_then(|ext| {
            inputs.iter().find(|input| {
                input
                    .accept
                    .as_deref()
                    .map_or(false, |accept| accept_matches(accept, ext))
            })
        })
        .or_else(|| inputs.first())
}

/// File prepared for upload; a downloaded temp file is kept alive by `temp`
struct PreparedFile {
    path: PathBuf,
    temp: Option<TempPath>,
}

pub struct FileUploader {
    page: Arc<dyn PageAutomation>,
    fetcher: Arc<dyn FileFetcher>,
    settings: UploadSettings,
}

impl FileUploader {
    pub fn new(
        page: Arc<dyn PageAutomation>,
        fetcher: Arc<dyn FileFetcher>,
        settings: UploadSettings,
    ) -> Self {
        Self {
            page,
            fetcher,
            settings,
        }
    }

    /// Set `file_path` (local path or http(s) URL) on the best file input.
    pub async fn upload(&self, file_path: &str) -> Result<PathBuf, LocatorError> {
        let file_path = file_path.trim();
        if file_path.is_empty() {
            return Err(LocatorError::InvalidLocator(
                "upload requires a file path".to_string(),
            ));
        }

        let input = self.find_input(file_path).await?;
        let prepared = self.prepare(file_path).await?;

        info!(
            input = %input.handle,
            file = %prepared.path.display(),
            "setting file on input"
        );
        let result = self
            .page
            .set_file(&input.handle, &prepared.path)
            .await
            .map_err(LocatorError::from);

        let path = prepared.path.clone();
        if let Some(temp) = prepared.temp {
            self.schedule_cleanup(temp);
        }
        result.map(|_| path)
    }

    async fn find_input(&self, file_path: &str) -> Result<FileInputRecord, LocatorError> {
        let mut last_error = None;
        for attempt in 0..=self.settings.retries {
            if attempt > 0 {
                let delay = self.settings.retry_delay_ms * attempt as u64;
                debug!(attempt, delay_ms = delay, "no file input yet, retrying");
                tokio::time::sleep(Duration::from_millis(delay)).await;
            }
            match evaluate_as::<Vec<FileInputRecord>>(
                self.page.as_ref(),
                &scripts::file_input_scan(),
            )
            .await
            {
                Ok(inputs) => {
                    if let Some(input) = choose_input(&inputs, file_path) {
                        return Ok(input.clone());
                    }
                }
                Err(err) => {
                    warn!(attempt, error = %err, "file input scan failed");
                    last_error = Some(err);
                }
            }
        }

        let detail = last_error
            .map(|e| format!(" (last error: {})", e))
            .unwrap_or_default();
        Err(LocatorError::ElementNotFound(format!(
            "no file input found after {} attempts{}",
            self.settings.retries + 1,
            detail
        )))
    }

    async fn prepare(&self, file_path: &str) -> Result<PreparedFile, LocatorError> {
        if !is_remote(file_path) {
            let path = PathBuf::from(file_path);
            tokio::fs::metadata(&path).await.map_err(|e| {
                LocatorError::Upload(format!("file not found: {} ({})", file_path, e))
            })?;
            return Ok(PreparedFile { path, temp: None });
        }

        let bytes = self.fetcher.fetch(file_path).await?;
        let suffix = file_extension(file_path)
            .map(|ext| format!(".{}", ext))
            .unwrap_or_default();
        let mut file = tempfile::Builder::new()
            .prefix("replay-upload-")
            .suffix(&suffix)
            .tempfile()?;
        file.write_all(&bytes)?;
        file.flush()?;
        let temp = file.into_temp_path();
        debug!(
            url = %file_path,
            bytes = bytes.len(),
            path = %temp.display(),
            "downloaded remote upload source"
        );
        Ok(PreparedFile {
            path: temp.to_path_buf(),
            temp: Some(temp),
        })
    }

    fn schedule_cleanup(&self, temp: TempPath) {
        let grace = Duration::from_millis(self.settings.download_grace_ms);
        tokio::spawn(async move {
            tokio::time::sleep(grace).await;
            let path = temp.to_path_buf();
            if let Err(err) = temp.close() {
                warn!(path = %path.display(), error = %err, "failed to remove downloaded file");
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use action_primitives::fake::{FakeOp, FakePage, PageCall};
    use action_primitives::{ActionError, ElementHandle};

    struct StaticFetcher(Vec<u8>);

    #[async_trait]
    impl FileFetcher for StaticFetcher {
        async fn fetch(&self, _url: &str) -> Result<Vec<u8>, LocatorError> {
            Ok(self.0.clone())
        }
    }

    fn input(handle: &str, accept: Option<&str>) -> FileInputRecord {
        FileInputRecord {
            handle: ElementHandle::new(handle),
            accept: accept.map(str::to_string),
            multiple: false,
        }
    }

    fn settings(grace_ms: u64) -> UploadSettings {
        UploadSettings {
            retries: 3,
            retry_delay_ms: 1,
            download_grace_ms: grace_ms,
            download_timeout_ms: 1_000,
        }
    }

    fn set_files(page: &FakePage) -> Vec<(ElementHandle, PathBuf, bool)> {
        page.calls()
            .into_iter()
            .filter_map(|call| match call {
                PageCall::SetFile {
                    handle,
                    path,
                    existed,
                } => Some((handle, path, existed)),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn extension_and_remote_detection() {
        assert!(is_remote("HTTPS://cdn.test/a.png"));
        assert!(!is_remote("/tmp/a.png"));
        assert_eq!(file_extension("/tmp/photo.JPG").as_deref(), Some("jpg"));
        assert_eq!(
            file_extension("https://cdn.test/media/clip.mp4?sig=abc").as_deref(),
            Some("mp4")
        );
        assert_eq!(file_extension("https://cdn.test/"), None);
        assert_eq!(file_extension("/tmp/README"), None);
    }

    #[test]
    fn accept_attribute_matching() {
        assert!(accept_matches("image/*", "png"));
        assert!(accept_matches(".pdf, .doc", "PDF"));
        assert!(accept_matches("video/mp4,video/webm", "mp4"));
        assert!(accept_matches("*/*", "bin"));
        assert!(!accept_matches("image/*", "mp4"));
        assert!(!accept_matches("", "png"));
    }

    #[test]
    fn prefers_matching_input() {
        let inputs = vec![
            input("f-1", Some("video/*")),
            input("f-2", Some("image/png,image/jpeg")),
        ];
        assert_eq!(choose_input(&inputs, "a.jpeg").unwrap().handle.0, "f-2");
        assert_eq!(choose_input(&inputs, "a.pdf").unwrap().handle.0, "f-1");
        assert!(choose_input(&[], "a.pdf").is_none());
    }

    #[tokio::test]
    async fn uploads_local_file_to_late_input() {
        let dir = tempfile::tempdir().unwrap();
        let local = dir.path().join("avatar.png");
        std::fs::write(&local, b"png").unwrap();

        let page = Arc::new(
            FakePage::new()
                .with_file_inputs(vec![input("f-1", Some("image/*"))])
                .file_inputs_appear_after(2),
        );
        let uploader = FileUploader::new(
            page.clone(),
            Arc::new(StaticFetcher(Vec::new())),
            settings(0),
        );
        let path = uploader.upload(local.to_str().unwrap()).await.unwrap();
        assert_eq!(path, local);
        let calls = set_files(&page);
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0 .0, "f-1");
    }

    #[tokio::test]
    async fn missing_input_fails_after_retries() {
        let page = Arc::new(FakePage::new());
        let uploader = FileUploader::new(
            page.clone(),
            Arc::new(StaticFetcher(Vec::new())),
            settings(0),
        );
        let err = uploader.upload("/tmp/whatever.png").await.unwrap_err();
        assert!(matches!(err, LocatorError::ElementNotFound(_)));
        let scans = page
            .calls()
            .into_iter()
            .filter(|c| matches!(c, PageCall::Evaluate(_)))
            .count();
        assert_eq!(scans, 4);
    }

    #[tokio::test]
    async fn missing_local_file_is_an_error() {
        let page = Arc::new(FakePage::new().with_file_inputs(vec![input("f-1", None)]));
        let uploader = FileUploader::new(page, Arc::new(StaticFetcher(Vec::new())), settings(0));
        let err = uploader
            .upload("/definitely/not/here.png")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("file not found"));
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn remote_file_is_downloaded_then_removed() {
        let page = Arc::new(FakePage::new().with_file_inputs(vec![input("f-1", Some("image/*"))]));
        let uploader = FileUploader::new(
            page.clone(),
            Arc::new(StaticFetcher(b"remote-bytes".to_vec())),
            settings(50),
        );
        let path = uploader
            .upload("https://cdn.test/uploads/cover.png")
            .await
            .unwrap();

        assert_eq!(path.extension().and_then(|e| e.to_str()), Some("png"));
        assert_eq!(std::fs::read(&path).unwrap(), b"remote-bytes");
        let calls = set_files(&page);
        assert!(calls[0].2, "file must exist while it is being set");

        tokio::time::sleep(Duration::from_millis(300)).await;
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn set_file_failure_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let local = dir.path().join("doc.pdf");
        std::fs::write(&local, b"%PDF").unwrap();
        let page = Arc::new(
            FakePage::new()
                .with_file_inputs(vec![input("f-1", None)])
                .fail(FakeOp::SetFile, ActionError::NotInteractable("disabled".into())),
        );
        let uploader = FileUploader::new(page, Arc::new(StaticFetcher(Vec::new())), settings(0));
        let err = uploader.upload(local.to_str().unwrap()).await.unwrap_err();
        assert!(matches!(
            err,
            LocatorError::Page(ActionError::NotInteractable(_))
        ));
        assert!(err.is_retryable());
    }
}
