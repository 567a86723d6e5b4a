//! Scripted [`ArchiveApi`] for tests.
//!
//! Search responses are served from a queue in request order. Once the
//! queue is drained, the fallback response (an empty result page unless
//! overridden) is returned for every further request.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};

use crate::ArchiveError;
use crate::api::ArchiveApi;
use crate::query::SearchQuery;

pub struct ScriptedApi {
    searches: Mutex<VecDeque<Result<Value, ArchiveError>>>,
    fallback: Value,
    vocabulary: Mutex<VecDeque<Result<Value, ArchiveError>>>,
    requests: Mutex<Vec<SearchQuery>>,
    vocabulary_calls: AtomicUsize,
}

impl ScriptedApi {
    pub fn new() -> Self {
        Self {
            searches: Mutex::new(VecDeque::new()),
            fallback: page(&[], 0),
            vocabulary: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
            vocabulary_calls: AtomicUsize::new(0),
        }
    }

    pub fn with_search(self, response: Result<Value, ArchiveError>) -> Self {
        self.searches.lock().unwrap().push_back(response);
        self
    }

    pub fn with_fallback(mut self, response: Value) -> Self {
        self.fallback = response;
        self
    }

    pub fn with_vocabulary(self, response: Result<Value, ArchiveError>) -> Self {
        self.vocabulary.lock().unwrap().push_back(response);
        self
    }

    pub fn requests(&self) -> Vec<SearchQuery> {
        self.requests.lock().unwrap().clone()
    }

    pub fn vocabulary_calls(&self) -> usize {
        self.vocabulary_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ArchiveApi for ScriptedApi {
    async fn search(&self, query: &SearchQuery, _timeout: Duration) -> Result<Value, ArchiveError> {
        self.requests.lock().unwrap().push(query.clone());
        self.searches
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(self.fallback.clone()))
    }

    async fn vocabulary(&self, _timeout: Duration) -> Result<Value, ArchiveError> {
        self.vocabulary_calls.fetch_add(1, Ordering::SeqCst);
        self.vocabulary
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(json!({})))
    }
}

/// A search response page.
pub fn page(docs: &[Value], num_found: usize) -> Value {
    json!({ "response": { "docs": docs, "numFound": num_found } })
}

/// A minimal event document referencing `spatial_units`.
pub fn event(ident: &str, spatial_units: &[&str]) -> Value {
    json!({
        "ident_cely": ident,
        "az_okres": "Praha-západ",
        "katastr": ["Roztoky"],
        "akce_hlavni_vedouci": "Novák, Jan",
        "akce_organizace": "ORG-1",
        "akce_hlavni_typ": "HES-TYP",
        "akce_vedlejsi_typ": ["HES-V1", "HES-V2"],
        "akce_je_nz": false,
        "pristupnost": "HES-A",
        "loc": ["50.15,14.39"],
        "az_dj_pian": spatial_units,
    })
}

/// A spatial unit document carrying `wkt` as projected geometry.
pub fn spatial_unit(ident: &str, wkt: &str) -> Value {
    json!({
        "ident_cely": ident,
        "pian_typ": "HES-PT",
        "pian_presnost": "HES-PP",
        "pian_chranene_udaje": { "geom_sjtsk_wkt": { "value": wkt } },
    })
}

/// A network failure.
pub fn unavailable() -> ArchiveError {
    ArchiveError::Status {
        status: 503,
        url: "https://digiarchiv.invalid/api/search/query".to_string(),
    }
}
