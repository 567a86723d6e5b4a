//! Paged retrieval of fieldwork events.
//!
//! Pages are requested strictly in sequence. Each page's records are
//! deduplicated by identifier against everything seen so far in the same
//! fetch, first occurrence kept. Paging stops on an empty page, once the
//! accumulated count reaches the server's `numFound`, once the hard record
//! cap is reached, or after `ceil(max_records / page_size) + 1` requests,
//! whichever comes first.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use amcr_archive_models::FieldworkEvent;
use serde_json::Value;

use crate::ArchiveError;
use crate::api::ArchiveApi;
use crate::config::PagingConfig;
use crate::progress::ProgressCallback;
use crate::query::SearchQuery;

/// Result of one paged event fetch.
#[derive(Debug, Clone, Default)]
pub struct EventFetch {
    /// Distinct events in first-seen order.
    pub events: Vec<FieldworkEvent>,
    /// Total match count last reported by the server.
    pub reported_total: usize,
    /// Page requests issued.
    pub requests: usize,
    /// Documents dropped because they had no identifier or a malformed
    /// payload.
    pub dropped_records: usize,
    /// Set when a page failed after earlier pages succeeded; holds the
    /// failure message. The events gathered before the failure are kept.
    pub interrupted: Option<String>,
    /// Whether the record cap cut the result short.
    pub truncated: bool,
}

/// One decoded result page.
struct Page<'a> {
    docs: &'a [Value],
    num_found: usize,
}

impl<'a> Page<'a> {
    fn from_body(body: &'a Value) -> Result<Self, ArchiveError> {
        let response = body.get("response").ok_or_else(|| ArchiveError::Parse {
            message: "search response has no 'response' object".to_string(),
        })?;
        let docs = response
            .get("docs")
            .and_then(Value::as_array)
            .map_or(&[][..], Vec::as_slice);
        let num_found = response
            .get("numFound")
            .and_then(Value::as_u64)
            .and_then(|n| usize::try_from(n).ok())
            .unwrap_or(0);

        Ok(Self { docs, num_found })
    }
}

/// Fetches every event matching `base`, page by page.
///
/// A failed page is not retried and ends paging. Events gathered before
/// the failure are returned with [`EventFetch::interrupted`] set.
///
/// # Errors
///
/// Returns the failure of the first page request, when nothing has been
/// gathered yet.
pub async fn fetch_events(
    api: &dyn ArchiveApi,
    base: &SearchQuery,
    paging: PagingConfig,
    timeout: Duration,
    progress: &Arc<dyn ProgressCallback>,
) -> Result<EventFetch, ArchiveError> {
    let mut fetch = EventFetch::default();
    let mut seen: BTreeSet<String> = BTreeSet::new();

    for page_number in 0..paging.max_requests() {
        let query = base.page(page_number, paging.page_size);
        fetch.requests += 1;

        let page_result = match api.search(&query, timeout).await {
            Ok(body) => accept_page(&body, &mut fetch, &mut seen),
            Err(e) => Err(e),
        };

        let page_len = match page_result {
            Ok(len) => len,
            Err(e) if page_number == 0 => return Err(e),
            Err(e) => {
                log::warn!(
                    "Page {page_number} failed, keeping {} events: {e}",
                    fetch.events.len()
                );
                fetch.interrupted = Some(e.to_string());
                break;
            }
        };

        if page_len == 0 {
            log::debug!("Page {page_number} is empty, stopping");
            break;
        }

        progress.set_total(fetch.reported_total.min(paging.max_records) as u64);
        progress.set_position(fetch.events.len() as u64);
        log::info!(
            "Page {page_number} fetched. Total records: {} / {}",
            fetch.events.len(),
            fetch.reported_total
        );

        if fetch.events.len() >= fetch.reported_total {
            break;
        }
        if fetch.events.len() >= paging.max_records {
            fetch.events.truncate(paging.max_records);
            fetch.truncated = true;
            log::warn!("Record limit {} reached", paging.max_records);
            break;
        }
    }

    Ok(fetch)
}

/// Merges one response body into `fetch`, returning the number of
/// documents on the page (before deduplication).
fn accept_page(
    body: &Value,
    fetch: &mut EventFetch,
    seen: &mut BTreeSet<String>,
) -> Result<usize, ArchiveError> {
    let page = Page::from_body(body)?;
    fetch.reported_total = page.num_found;

    for doc in page.docs {
        match FieldworkEvent::from_doc(doc) {
            Some(event) => {
                if seen.insert(event.ident.clone()) {
                    fetch.events.push(event);
                }
            }
            None => {
                log::debug!("Dropping event record without identifier");
                fetch.dropped_records += 1;
            }
        }
    }

    Ok(page.docs.len())
}
