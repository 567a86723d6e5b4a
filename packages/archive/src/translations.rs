//! Code → label translation cache.
//!
//! The archive publishes its whole UI vocabulary as one JSON object. The
//! cache downloads it at most once per [`TranslationCache`] instance. A
//! failed download leaves the cache empty for the rest of its lifetime and
//! [`TranslationCache::resolve`] then returns codes unchanged.

use std::collections::BTreeMap;
use std::time::Duration;

use tokio::sync::OnceCell;

use crate::api::ArchiveApi;

/// Lazily loaded code → label dictionary.
///
/// Owned by the host and passed to every pipeline run that should share
/// it.
#[derive(Debug, Default)]
pub struct TranslationCache {
    labels: OnceCell<BTreeMap<String, String>>,
}

impl TranslationCache {
    /// Creates an empty, not yet loaded cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a cache that is already loaded with `labels`.
    #[must_use]
    pub fn with_labels(labels: BTreeMap<String, String>) -> Self {
        Self {
            labels: OnceCell::new_with(Some(labels)),
        }
    }

    /// Loads the vocabulary on first call. Later calls return immediately,
    /// whether or not the first attempt succeeded.
    pub async fn ensure_loaded(&self, api: &dyn ArchiveApi, timeout: Duration) {
        self.labels
            .get_or_init(|| async {
                match api.vocabulary(timeout).await {
                    Ok(document) => {
                        let labels = parse_vocabulary(&document);
                        log::info!("Loaded {} vocabulary labels", labels.len());
                        labels
                    }
                    Err(e) => {
                        log::warn!("Vocabulary download failed, codes will not be translated: {e}");
                        BTreeMap::new()
                    }
                }
            })
            .await;
    }

    /// Whether a load has been attempted.
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.labels.initialized()
    }

    /// Number of known labels.
    #[must_use]
    pub fn len(&self) -> usize {
        self.labels.get().map_or(0, BTreeMap::len)
    }

    /// Returns `true` if no label is known.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Label for `code`, or `code` itself when unknown. An empty code
    /// resolves to an empty string.
    #[must_use]
    pub fn resolve(&self, code: &str) -> String {
        if code.is_empty() {
            return String::new();
        }
        self.labels
            .get()
            .and_then(|labels| labels.get(code))
            .map_or_else(|| code.to_string(), Clone::clone)
    }

    /// Resolves each non-empty code and joins the labels with `", "`.
    #[must_use]
    pub fn resolve_joined(&self, codes: &[String]) -> String {
        codes
            .iter()
            .filter(|code| !code.is_empty())
            .map(|code| self.resolve(code))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Keeps the top-level string entries of the vocabulary document. Nested
/// groups are UI strings, not codes.
fn parse_vocabulary(document: &serde_json::Value) -> BTreeMap<String, String> {
    let Some(entries) = document.as_object() else {
        log::warn!("Vocabulary document is not a JSON object");
        return BTreeMap::new();
    };

    entries
        .iter()
        .filter_map(|(code, label)| label.as_str().map(|l| (code.clone(), l.to_string())))
        .collect()
}
