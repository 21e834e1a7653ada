//! Local file system client
//!
//! Files become responses, directories expand into their entries, and
//! missing paths are reported with status 404.

use crate::client::{
    str_param, u64_param, ContentLengthGuard, FetchOutcome, Fetcher, InitParameterMap,
    DEFAULT_SPOOL_THRESHOLD,
};
use crate::entity::{ChildUrls, Method, RequestData, ResponseBody, ResponseData};
use crate::{CrawlError, CrawlResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use url::Url;

/// Fetcher for `file:` URLs
pub struct FileSystemFetcher {
    charset: String,
    spool_threshold: usize,
    content_length_guard: Option<Arc<ContentLengthGuard>>,
}

impl Default for FileSystemFetcher {
    fn default() -> Self {
        Self::new()
    }
}

impl FileSystemFetcher {
    pub fn new() -> Self {
        Self {
            charset: "UTF-8".to_string(),
            spool_threshold: DEFAULT_SPOOL_THRESHOLD,
            content_length_guard: None,
        }
    }

    pub fn with_content_length_guard(mut self, guard: Arc<ContentLengthGuard>) -> Self {
        self.content_length_guard = Some(guard);
        self
    }

    pub fn with_spool_threshold(mut self, spool_threshold: usize) -> Self {
        self.spool_threshold = spool_threshold;
        self
    }

    async fn list_directory(&self, path: &Path, url: &str) -> CrawlResult<ChildUrls> {
        let mut reader = tokio::fs::read_dir(path)
            .await
            .map_err(|e| CrawlError::access_with_source(url, "Failed to list directory", e))?;

        let mut entries = Vec::new();
        while let Some(entry) = reader
            .next_entry()
            .await
            .map_err(|e| CrawlError::access_with_source(url, "Failed to list directory", e))?
        {
            entries.push(entry.path());
        }
        entries.sort();

        let mut children = ChildUrls::new();
        for entry in entries {
            if let Ok(child) = Url::from_file_path(&entry) {
                children.insert(RequestData::get(child.to_string())?);
            }
        }
        Ok(children)
    }
}

#[async_trait]
impl Fetcher for FileSystemFetcher {
    async fn execute(&self, request: &RequestData) -> CrawlResult<FetchOutcome> {
        let url = request.url();
        let started = Instant::now();
        let path = to_path(url)?;

        let mut data = ResponseData::new(request);
        data.charset = self.charset.clone();

        let metadata = match tokio::fs::metadata(&path).await {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::debug!("{} does not exist", path.display());
                data.http_status_code = 404;
                data.execution_time = Some(started.elapsed());
                return Ok(FetchOutcome::Success(data));
            }
            Err(e) => return Err(CrawlError::access_with_source(url, "Failed to stat file", e)),
        };

        if metadata.is_dir() {
            if request.method() == Method::Head {
                data.execution_time = Some(started.elapsed());
                return Ok(FetchOutcome::Success(data));
            }
            let children = self.list_directory(&path, url).await?;
            tracing::debug!("{} expanded into {} entries", url, children.len());
            return Ok(FetchOutcome::Expand(children));
        }

        data.mime_type = Some(guess_mime_type(&path).to_string());
        data.content_length = Some(metadata.len());
        data.last_modified = metadata.modified().ok().map(DateTime::<Utc>::from);

        if let Some(guard) = &self.content_length_guard {
            guard.check(&data)?;
        }

        if request.method() == Method::Get {
            let bytes = tokio::fs::read(&path)
                .await
                .map_err(|e| CrawlError::access_with_source(url, "Failed to read file", e))?;
            data.set_body(ResponseBody::spool(bytes, self.spool_threshold)?);
        }

        data.execution_time = Some(started.elapsed());
        Ok(FetchOutcome::Success(data))
    }

    /// Accepts `charset` (string) and `spool_threshold` (bytes)
    fn set_init_parameters(&mut self, params: &InitParameterMap) -> CrawlResult<()> {
        if let Some(charset) = str_param(params, "charset")? {
            self.charset = charset.to_string();
        }
        if let Some(threshold) = u64_param(params, "spool_threshold")? {
            self.spool_threshold = usize::try_from(threshold).unwrap_or(usize::MAX);
        }
        Ok(())
    }
}

/// Converts a `file:` URL, or a bare path, into a path
fn to_path(url: &str) -> CrawlResult<PathBuf> {
    if !url.starts_with("file:") {
        return Ok(PathBuf::from(url));
    }

    Url::parse(url)
        .ok()
        .and_then(|parsed| parsed.to_file_path().ok())
        .ok_or_else(|| CrawlError::System(format!("Invalid file URL: {}", url)))
}

fn guess_mime_type(path: &Path) -> &'static str {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase);

    match extension.as_deref() {
        Some("html") | Some("htm") => "text/html",
        Some("txt") | Some("log") => "text/plain",
        Some("md") => "text/markdown",
        Some("csv") => "text/csv",
        Some("css") => "text/css",
        Some("xml") => "application/xml",
        Some("json") => "application/json",
        Some("js") => "application/javascript",
        Some("pdf") => "application/pdf",
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("zip") => "application/zip",
        _ => "application/octet-stream",
    }
}
