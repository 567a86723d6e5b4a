//! Dynamic vocabulary refresh from the archive's facet endpoint.
//!
//! The lead-investigator list has no separate codes: each name is its own
//! code. It is pulled from the `f_vedouci` facet of a facet-only event
//! query and written to [`DYNAMIC_FILE`](crate::DYNAMIC_FILE) wholesale.

use std::path::Path;

use amcr_archive::query::SearchQuery;
use amcr_archive::{ArchiveApi, ArchiveConfig};
use amcr_archive_models::FilterCategory;
use serde_json::Value;

use crate::CodelistError;
use crate::store::{DYNAMIC_FILE, write_codelist};

/// Facet field holding lead investigator names.
pub const LEADER_FACET: &str = "f_vedouci";

/// Result of a refresh, for display by the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshOutcome {
    /// Whether the file was rewritten.
    pub success: bool,
    /// Human-readable summary or failure message.
    pub message: String,
    /// Names written.
    pub written: usize,
}

/// One facet entry as the API ships it.
#[derive(Debug, Clone, Copy)]
enum FacetItem<'a> {
    /// `{ "name": "...", "value": <count> }`
    Labelled(&'a str),
    /// A bare string, as in Solr's flat `[label, count, label, count]`
    /// layout.
    Bare(&'a str),
    Other,
}

impl<'a> FacetItem<'a> {
    fn classify(value: &'a Value) -> Self {
        match value {
            Value::Object(obj) => obj
                .get("name")
                .and_then(Value::as_str)
                .map_or(Self::Other, Self::Labelled),
            Value::String(s) => Self::Bare(s),
            _ => Self::Other,
        }
    }

    /// The label, unless the entry is empty or a bare count.
    fn label(self) -> Option<&'a str> {
        match self {
            Self::Labelled(name) | Self::Bare(name) => {
                let name = name.trim();
                (!name.is_empty() && !name.chars().all(|c| c.is_ascii_digit())).then_some(name)
            }
            Self::Other => None,
        }
    }
}

/// Extracts the labels of `facet` from a facet-only response.
///
/// Looks under `facet_counts.<facet>` first and falls back to the Solr
/// layout `facet_counts.facet_fields.<facet>`. Purely numeric entries are
/// counts and are dropped; repeated labels are kept once.
///
/// # Errors
///
/// Returns [`CodelistError::MissingFacet`] if neither location holds a
/// list.
pub fn facet_labels(response: &Value, facet: &str) -> Result<Vec<String>, CodelistError> {
    let counts = response.get("facet_counts");
    let direct = counts.and_then(|c| c.get(facet)).and_then(Value::as_array);
    let nested = counts
        .and_then(|c| c.get("facet_fields"))
        .and_then(|f| f.get(facet))
        .and_then(Value::as_array);

    let items = match (direct, nested) {
        (Some(items), _) if !items.is_empty() => items,
        (_, Some(items)) | (Some(items), None) => items,
        (None, None) => {
            return Err(CodelistError::MissingFacet {
                facet: facet.to_string(),
            });
        }
    };

    let mut labels: Vec<String> = Vec::new();
    for label in items.iter().filter_map(|item| FacetItem::classify(item).label()) {
        if !labels.iter().any(|l| l == label) {
            labels.push(label.to_string());
        }
    }
    Ok(labels)
}

/// Downloads the lead-investigator facet and rewrites
/// `dir`/[`DYNAMIC_FILE`].
///
/// Never fails: errors are reported through [`RefreshOutcome`] and leave
/// the existing file untouched.
pub async fn refresh_dynamic_vocabulary(
    api: &dyn ArchiveApi,
    config: &ArchiveConfig,
    dir: &Path,
) -> RefreshOutcome {
    match refresh(api, config, dir).await {
        Ok(written) => {
            log::info!("Wrote {written} lead investigators to {DYNAMIC_FILE}");
            RefreshOutcome {
                success: true,
                message: format!("Downloaded {written} names."),
                written,
            }
        }
        Err(e) => {
            log::warn!("Lead investigator refresh failed: {e}");
            RefreshOutcome {
                success: false,
                message: e.to_string(),
                written: 0,
            }
        }
    }
}

async fn refresh(
    api: &dyn ArchiveApi,
    config: &ArchiveConfig,
    dir: &Path,
) -> Result<usize, CodelistError> {
    let response = api
        .search(&SearchQuery::facets(), config.timeouts.facet())
        .await?;
    let labels = facet_labels(&response, LEADER_FACET)?;

    write_codelist(
        &dir.join(DYNAMIC_FILE),
        labels
            .iter()
            .map(|name| (name.as_str(), name.as_str(), FilterCategory::Vedouci)),
    )
}
