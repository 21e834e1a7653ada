//! Response descriptors produced by fetchers
//!
//! A response owns its body. Bodies are either held in memory or spooled to a
//! temporary file; the temporary file is removed as soon as the body is
//! dropped, so callers only need to let the value go out of scope (or call
//! [`ResponseData::close`]) to release it.

use crate::entity::request::{Method, RequestData};
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::io::{self, Cursor, Read, Seek, SeekFrom, Write};
use std::time::Duration;
use tempfile::NamedTempFile;

/// Body of a fetched resource
#[derive(Debug)]
pub enum ResponseBody {
    Memory(Vec<u8>),
    TempFile(NamedTempFile),
}

impl ResponseBody {
    /// Stores `bytes` in memory, or in a temporary file when larger than
    /// `threshold`
    pub fn spool(bytes: Vec<u8>, threshold: usize) -> io::Result<Self> {
        if bytes.len() <= threshold {
            return Ok(Self::Memory(bytes));
        }

        let mut spooler = BodySpooler::new(threshold);
        spooler.write(&bytes)?;
        spooler.finish()
    }

    /// Size of the body in bytes
    pub fn len(&self) -> io::Result<u64> {
        match self {
            Self::Memory(bytes) => Ok(bytes.len() as u64),
            Self::TempFile(file) => Ok(file.as_file().metadata()?.len()),
        }
    }

    pub fn is_empty(&self) -> io::Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Opens a reader positioned at the start of the body
    pub fn reader(&mut self) -> io::Result<Box<dyn Read + '_>> {
        match self {
            Self::Memory(bytes) => Ok(Box::new(Cursor::new(bytes.as_slice()))),
            Self::TempFile(file) => {
                let handle = file.as_file_mut();
                handle.seek(SeekFrom::Start(0))?;
                Ok(Box::new(handle))
            }
        }
    }

    /// Reads the whole body into memory
    pub fn into_bytes(self) -> io::Result<Vec<u8>> {
        match self {
            Self::Memory(bytes) => Ok(bytes),
            Self::TempFile(mut file) => {
                let mut buf = Vec::new();
                let handle = file.as_file_mut();
                handle.seek(SeekFrom::Start(0))?;
                handle.read_to_end(&mut buf)?;
                Ok(buf)
            }
        }
    }
}

/// Builds a [`ResponseBody`] from chunks as they arrive
///
/// Chunks stay in memory until the body grows past the threshold; from then
/// on everything goes to a temporary file.
#[derive(Debug)]
pub struct BodySpooler {
    threshold: usize,
    body: ResponseBody,
    written: u64,
}

impl BodySpooler {
    pub fn new(threshold: usize) -> Self {
        Self {
            threshold,
            body: ResponseBody::Memory(Vec::new()),
            written: 0,
        }
    }

    /// Bytes received so far
    pub fn written(&self) -> u64 {
        self.written
    }

    pub fn is_spooled(&self) -> bool {
        matches!(self.body, ResponseBody::TempFile(_))
    }

    pub fn write(&mut self, chunk: &[u8]) -> io::Result<()> {
        match &mut self.body {
            ResponseBody::Memory(bytes) if bytes.len() + chunk.len() <= self.threshold => {
                bytes.extend_from_slice(chunk);
            }
            ResponseBody::Memory(bytes) => {
                let mut file = NamedTempFile::new()?;
                file.write_all(bytes)?;
                file.write_all(chunk)?;
                self.body = ResponseBody::TempFile(file);
            }
            ResponseBody::TempFile(file) => file.write_all(chunk)?,
        }
        self.written += chunk.len() as u64;
        Ok(())
    }

    pub fn finish(mut self) -> io::Result<ResponseBody> {
        if let ResponseBody::TempFile(file) = &mut self.body {
            file.flush()?;
        }
        Ok(self.body)
    }
}

/// Child requests discovered while fetching a container resource
///
/// Insertion ordered; no two entries share the same URL string.
#[derive(Debug, Clone, Default)]
pub struct ChildUrls {
    entries: Vec<RequestData>,
    seen: HashSet<String>,
}

impl ChildUrls {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a child request; returns false if its URL is already present
    pub fn insert(&mut self, request: RequestData) -> bool {
        if !self.seen.insert(request.url().to_string()) {
            return false;
        }
        self.entries.push(request);
        true
    }

    pub fn contains(&self, url: &str) -> bool {
        self.seen.contains(url)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &RequestData> {
        self.entries.iter()
    }
}

impl IntoIterator for ChildUrls {
    type Item = RequestData;
    type IntoIter = std::vec::IntoIter<RequestData>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl FromIterator<RequestData> for ChildUrls {
    fn from_iter<I: IntoIterator<Item = RequestData>>(iter: I) -> Self {
        let mut child_urls = Self::new();
        for request in iter {
            child_urls.insert(request);
        }
        child_urls
    }
}

/// Structured result of a single fetch
#[derive(Debug)]
pub struct ResponseData {
    pub url: String,
    pub method: Method,
    pub http_status_code: u16,
    pub mime_type: Option<String>,
    pub charset: String,
    /// Declared length in bytes; `None` when unknown
    pub content_length: Option<u64>,
    pub last_modified: Option<DateTime<Utc>>,
    pub redirect_location: Option<String>,
    pub execution_time: Option<Duration>,
    pub parent_url: Option<String>,
    pub session_id: Option<String>,
    pub child_urls: ChildUrls,
    metadata: Vec<(String, String)>,
    body: Option<ResponseBody>,
}

impl ResponseData {
    /// Creates an empty response for `request` with status 200
    pub fn new(request: &RequestData) -> Self {
        Self {
            url: request.url().to_string(),
            method: request.method(),
            http_status_code: 200,
            mime_type: None,
            charset: "UTF-8".to_string(),
            content_length: None,
            last_modified: None,
            redirect_location: None,
            execution_time: None,
            parent_url: None,
            session_id: None,
            child_urls: ChildUrls::new(),
            metadata: Vec::new(),
            body: None,
        }
    }

    pub fn with_body(mut self, body: ResponseBody) -> Self {
        self.body = Some(body);
        self
    }

    pub fn set_body(&mut self, body: ResponseBody) {
        self.body = Some(body);
    }

    pub fn has_body(&self) -> bool {
        self.body.is_some()
    }

    /// Hands the body to its single consumer
    ///
    /// Subsequent calls return `None`.
    pub fn take_body(&mut self) -> Option<ResponseBody> {
        self.body.take()
    }

    /// Appends a metadata value; repeated names are kept in insertion order
    pub fn add_metadata(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.metadata.push((name.into(), value.into()));
    }

    /// Returns every value recorded under `name`
    pub fn metadata_values<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.metadata
            .iter()
            .filter(move |(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn metadata(&self) -> &[(String, String)] {
        &self.metadata
    }

    /// Mime type without parameters, lower-cased
    pub fn base_mime_type(&self) -> Option<String> {
        self.mime_type
            .as_deref()
            .map(|mime| mime.split(';').next().unwrap_or(mime).trim().to_ascii_lowercase())
    }

    /// Releases the body and any temporary file backing it
    pub fn close(mut self) {
        self.body.take();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(url: &str) -> RequestData {
        RequestData::get(url).unwrap()
    }

    #[test]
    fn test_body_is_taken_once() {
        let mut response =
            ResponseData::new(&request("http://x/")).with_body(ResponseBody::Memory(b"abc".to_vec()));

        let body = response.take_body().unwrap();
        assert_eq!(body.into_bytes().unwrap(), b"abc");
        assert!(response.take_body().is_none());
    }

    #[test]
    fn test_small_body_stays_in_memory() {
        let body = ResponseBody::spool(b"small".to_vec(), 1024).unwrap();
        assert!(matches!(body, ResponseBody::Memory(_)));
    }

    #[test]
    fn test_large_body_is_spooled_and_removed_on_close() {
        let bytes = vec![b'x'; 64];
        let body = ResponseBody::spool(bytes.clone(), 16).unwrap();
        let path = match &body {
            ResponseBody::TempFile(file) => file.path().to_path_buf(),
            ResponseBody::Memory(_) => panic!("expected a temp file body"),
        };
        assert!(path.exists());

        let response = ResponseData::new(&request("http://x/")).with_body(body);
        response.close();
        assert!(!path.exists());
    }

    #[test]
    fn test_spooled_body_reads_back() {
        let bytes: Vec<u8> = (0..200u8).collect();
        let mut body = ResponseBody::spool(bytes.clone(), 10).unwrap();
        assert_eq!(body.len().unwrap(), 200);

        let mut first = Vec::new();
        body.reader().unwrap().read_to_end(&mut first).unwrap();
        assert_eq!(first, bytes);
        assert_eq!(body.into_bytes().unwrap(), bytes);
    }

    #[test]
    fn test_spooler_switches_to_file_past_threshold() {
        let mut spooler = BodySpooler::new(8);
        spooler.write(b"abcd").unwrap();
        spooler.write(b"efgh").unwrap();
        assert!(!spooler.is_spooled());

        spooler.write(b"ij").unwrap();
        assert!(spooler.is_spooled());
        assert_eq!(spooler.written(), 10);

        let body = spooler.finish().unwrap();
        assert!(matches!(body, ResponseBody::TempFile(_)));
        assert_eq!(body.into_bytes().unwrap(), b"abcdefghij");
    }

    #[test]
    fn test_child_urls_unique_by_url() {
        let mut child_urls = ChildUrls::new();
        assert!(child_urls.insert(request("http://x/a")));
        assert!(!child_urls.insert(request("http://x/a")));
        assert!(!child_urls.insert(
            RequestData::builder()
                .head()
                .url("http://x/a")
                .build()
                .unwrap()
        ));
        assert!(child_urls.insert(request("http://x/b")));

        let urls: Vec<_> = child_urls.iter().map(|r| r.url().to_string()).collect();
        assert_eq!(urls, vec!["http://x/a", "http://x/b"]);
    }

    #[test]
    fn test_metadata_keeps_repeated_names() {
        let mut response = ResponseData::new(&request("http://x/"));
        response.add_metadata("Set-Cookie", "a=1");
        response.add_metadata("Server", "test");
        response.add_metadata("Set-Cookie", "b=2");

        let cookies: Vec<_> = response.metadata_values("Set-Cookie").collect();
        assert_eq!(cookies, vec!["a=1", "b=2"]);
    }

    #[test]
    fn test_base_mime_type_strips_parameters() {
        let mut response = ResponseData::new(&request("http://x/"));
        response.mime_type = Some("Text/HTML; charset=utf-8".to_string());
        assert_eq!(response.base_mime_type().as_deref(), Some("text/html"));
    }
}
