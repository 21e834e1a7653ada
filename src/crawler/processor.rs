//! Processing of a single frontier entry
//!
//! Each entry goes through:
//! 1. Validation (non-blank URL, URL filter, depth bound)
//! 2. Client lookup through the router
//! 3. A HEAD check when the entry carries a previous modification time
//! 4. The fetch itself, then child discovery and result recording

use crate::client::{FetchOutcome, Fetcher};
use crate::crawler::CrawlerContext;
use crate::entity::{
    AccessResult, ChildUrls, FrontierEntry, RequestData, ResponseBody, ResponseData, ResultStatus,
};
use crate::extractor::{extract_links, HINT_CHARSET, HINT_URL};
use crate::{CrawlError, CrawlResult};
use std::collections::HashMap;
use url::Url;

/// What happened to a processed entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessStatus {
    /// The entry was not fetched (blank URL, filtered out or too deep)
    Skipped,
    /// A result was recorded with this status
    Recorded(ResultStatus),
}

/// Processes one entry and records its access result
///
/// Fetch failures are recorded as [`ResultStatus::Failed`] and are not
/// returned; only storage and system errors are.
pub async fn process_entry(
    context: &CrawlerContext,
    entry: &FrontierEntry,
) -> CrawlResult<ProcessStatus> {
    if entry.url.trim().is_empty() {
        tracing::debug!("Skipping entry without url");
        return Ok(ProcessStatus::Skipped);
    }

    if !context.url_filter.matches(&entry.url) {
        tracing::debug!("Skipping filtered url {}", entry.url);
        return Ok(ProcessStatus::Skipped);
    }

    if let Some(max_depth) = context.max_depth {
        if entry.depth > max_depth {
            tracing::debug!(
                "Skipping {} at depth {} (max {})",
                entry.url,
                entry.depth,
                max_depth
            );
            return Ok(ProcessStatus::Skipped);
        }
    }

    let Some(client) = context.router.get_client(entry.url.as_str()) else {
        tracing::info!("No client for {}", entry.url);
        let mut result = new_result(entry, ResultStatus::Unsupported);
        result.error_message = Some("No client is registered for this url".to_string());
        return record(context, result);
    };

    if entry.last_modified.is_some() && !is_content_updated(client.as_ref(), entry).await {
        tracing::debug!("{} is not modified", entry.url);
        let mut result = new_result(entry, ResultStatus::NotModified);
        result.last_modified = entry.last_modified;
        return record(context, result);
    }

    let request = RequestData::builder()
        .method(entry.method)
        .url(entry.url.as_str())
        .build()?;

    match client.execute(&request).await {
        Ok(FetchOutcome::Success(response)) => handle_response(context, entry, response).await,
        Ok(FetchOutcome::Expand(children)) => {
            let queued = offer_children(context, entry, &children)?;
            tracing::debug!("{} expanded into {} new entries", entry.url, queued);
            record(context, new_result(entry, ResultStatus::Expanded))
        }
        Err(e) if is_fetch_failure(&e) => {
            tracing::warn!("Failed to process {}: {}", entry.url, e);
            let mut result = new_result(entry, ResultStatus::Failed);
            result.error_message = Some(e.to_string());
            record(context, result)
        }
        Err(e) => Err(e),
    }
}

/// Asks the server whether the content changed since the previous session
///
/// Anything other than a successful HEAD response with an older or equal
/// modification time counts as updated.
async fn is_content_updated(client: &dyn Fetcher, entry: &FrontierEntry) -> bool {
    let Some(previous) = entry.last_modified else {
        return true;
    };

    let request = match RequestData::builder().head().url(entry.url.as_str()).build() {
        Ok(request) => request,
        Err(_) => return true,
    };

    match client.execute(&request).await {
        Ok(FetchOutcome::Success(response)) => {
            !(response.http_status_code == 200
                && response.last_modified.is_some_and(|current| current <= previous))
        }
        Ok(FetchOutcome::Expand(_)) => true,
        Err(e) => {
            tracing::debug!("HEAD check for {} failed: {}", entry.url, e);
            true
        }
    }
}

async fn handle_response(
    context: &CrawlerContext,
    entry: &FrontierEntry,
    mut response: ResponseData,
) -> CrawlResult<ProcessStatus> {
    response.parent_url = entry.parent_url.clone();
    response.session_id = Some(entry.session_id.clone());

    if let Some(location) = response.redirect_location.clone() {
        tracing::debug!("{} redirects to {}", entry.url, location);
        response.child_urls.insert(RequestData::get(location)?);
    }

    let status = if response.http_status_code >= 400 {
        ResultStatus::Failed
    } else {
        if let Some(body) = response.take_body() {
            let bytes = read_body(body).await?;
            extract(context, &mut response, &bytes);
        }
        ResultStatus::Ok
    };

    let queued = offer_children(context, entry, &response.child_urls)?;
    if queued > 0 {
        tracing::debug!("Queued {} new entries from {}", queued, entry.url);
    }

    let mut result = new_result(entry, status);
    result.http_status_code = Some(response.http_status_code);
    result.mime_type = response.mime_type.clone();
    result.content_length = response.content_length;
    result.last_modified = response.last_modified;
    result.execution_time_ms = response
        .execution_time
        .map(|elapsed| u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX));
    if status == ResultStatus::Failed {
        result.error_message = Some(format!("HTTP status {}", response.http_status_code));
    }

    response.close();
    record(context, result)
}

/// Reads a body on the blocking pool; spooled bodies live in a temp file
async fn read_body(body: ResponseBody) -> CrawlResult<Vec<u8>> {
    let bytes = tokio::task::spawn_blocking(move || body.into_bytes())
        .await
        .map_err(|e| CrawlError::System(format!("Body reader failed: {}", e)))??;
    Ok(bytes)
}

/// Runs the extractor registered for the mime type and collects HTML links
fn extract(context: &CrawlerContext, response: &mut ResponseData, bytes: &[u8]) {
    let mime_type = response.base_mime_type();

    if let Some(extractor) = context.extractors.get(mime_type.as_deref()) {
        let mut hints = HashMap::new();
        hints.insert(HINT_URL.to_string(), response.url.clone());
        hints.insert(HINT_CHARSET.to_string(), response.charset.clone());

        match extractor.get_text(bytes, &hints) {
            Ok(data) => tracing::debug!(
                "Extracted {} characters from {}",
                data.content.len(),
                response.url
            ),
            Err(e) => tracing::warn!("Failed to extract text from {}: {}", response.url, e),
        }
    }

    if matches!(
        mime_type.as_deref(),
        Some("text/html") | Some("application/xhtml+xml")
    ) {
        let Ok(base_url) = Url::parse(&response.url) else {
            return;
        };
        let html = String::from_utf8_lossy(bytes);
        for link in extract_links(&html, &base_url) {
            if let Ok(request) = RequestData::get(link) {
                response.child_urls.insert(request);
            }
        }
    }
}

/// Offers discovered children at the next depth
///
/// # Returns
///
/// The number of children accepted by the session
fn offer_children(
    context: &CrawlerContext,
    parent: &FrontierEntry,
    children: &ChildUrls,
) -> CrawlResult<usize> {
    if children.is_empty() {
        return Ok(0);
    }

    let depth = parent.depth + 1;
    if context.max_depth.is_some_and(|max_depth| depth > max_depth) {
        tracing::debug!("Not following {} children of {}", children.len(), parent.url);
        return Ok(0);
    }

    let entries = children
        .iter()
        .filter(|child| context.url_filter.matches(child.url()))
        .map(|child| {
            let mut entry = FrontierEntry::child_of(parent, child.url()).with_method(child.method());
            if !child.metadata().is_empty() {
                entry.metadata = serde_json::to_string(child.metadata()).ok();
            }
            entry
        });

    context.session.offer_all(entries)
}

fn new_result(entry: &FrontierEntry, status: ResultStatus) -> AccessResult {
    let mut result = AccessResult::new(entry.session_id.clone(), entry.url.clone(), status);
    result.parent_url = entry.parent_url.clone();
    result.method = entry.method;
    result
}

fn record(context: &CrawlerContext, result: AccessResult) -> CrawlResult<ProcessStatus> {
    let status = result.status;
    context.result_store.insert_result(&result)?;
    Ok(ProcessStatus::Recorded(status))
}

/// Errors caused by the fetched resource rather than by this process
fn is_fetch_failure(error: &CrawlError) -> bool {
    matches!(
        error,
        CrawlError::Access { .. }
            | CrawlError::MultipleAccess { .. }
            | CrawlError::MaxLengthExceeded { .. }
            | CrawlError::Io(_)
    )
}
