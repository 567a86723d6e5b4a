//! Search API query construction.
//!
//! A [`SearchQuery`] is an ordered list of `(key, value)` pairs. Keys may
//! repeat: list-valued filters are sent as one parameter per code, each
//! with an `:or` combinator suffix.

use amcr_archive_models::{BoundingBox, FilterCriteria};

use crate::ArchiveError;

/// Fields requested for fieldwork event records.
pub const EVENT_FIELDS: [&str; 19] = [
    "ident_cely",
    "akce_typ",
    "akce_hlavni_vedouci",
    "akce_datum_zahajeni",
    "az_dj_pian",
    "akce_datum_ukonceni",
    "loc",
    "az_okres",
    "katastr",
    "az_chranene_udaje",
    "akce_organizace",
    "akce_specifikace_data",
    "akce_hlavni_typ",
    "akce_vedlejsi_typ",
    "akce_chranene_udaje",
    "akce_je_nz",
    "pristupnost",
    "dj_negativni_jednotka",
    "az_dokumentacni_jednotka",
];

/// Fields requested for spatial unit records.
pub const SPATIAL_UNIT_FIELDS: [&str; 4] = [
    "ident_cely",
    "pian_typ",
    "pian_chranene_udaje",
    "pian_presnost",
];

/// Sort order for event paging. Ascending by identifier keeps page
/// boundaries stable between requests.
pub const EVENT_SORT: &str = "ident_cely asc";

/// Query parameters for one search request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchQuery {
    pairs: Vec<(String, String)>,
}

impl SearchQuery {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a parameter. Existing parameters with the same key are kept.
    pub fn push(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.pairs.push((key.into(), value.into()));
    }

    /// Replaces every parameter named `key` with a single value.
    pub fn set(&mut self, key: &str, value: impl Into<String>) {
        self.remove(key);
        self.push(key, value);
    }

    /// Removes every parameter named `key`.
    pub fn remove(&mut self, key: &str) {
        self.pairs.retain(|(k, _)| k != key);
    }

    /// All parameters, in insertion order.
    #[must_use]
    pub fn pairs(&self) -> &[(String, String)] {
        &self.pairs
    }

    /// First value of `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Every value of `key`, in order.
    #[must_use]
    pub fn get_all(&self, key: &str) -> Vec<&str> {
        self.pairs
            .iter()
            .filter(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
            .collect()
    }

    /// Base event query: entity, stable sort, projection, viewport and
    /// filter parameters. Paging is added per request with
    /// [`Self::page`].
    ///
    /// `extent` is only used when the criteria restrict the search to the
    /// viewport and must already be in WGS-84.
    #[must_use]
    pub fn events(extent: Option<BoundingBox>, filters: &FilterCriteria) -> Self {
        let mut query = Self::new();
        query.push("mapa", "true");
        query.push("entity", "akce");
        query.push("sort", EVENT_SORT);
        query.push("fl", EVENT_FIELDS.join(","));

        if filters.restrict_to_viewport()
            && let Some(extent) = extent
        {
            query.push("loc_rpt", extent.to_query_value());
        }
        if filters.positive_findings_only() {
            query.push("posevidence", "true");
        }

        for (key, codes) in filters.selections() {
            for code in codes {
                query.push(key, format!("{code}:or"));
            }
        }

        query
    }

    /// Copy of this query requesting page `page` with `rows` records.
    /// The first page is requested without a `page` parameter.
    #[must_use]
    pub fn page(&self, page: usize, rows: usize) -> Self {
        let mut query = self.clone();
        query.set("rows", rows.to_string());
        if page > 0 {
            query.set("page", page.to_string());
        } else {
            query.remove("page");
        }
        query
    }

    /// Query for a batch of spatial units by identifier.
    #[must_use]
    pub fn spatial_units<S: AsRef<str>>(ids: &[S]) -> Self {
        let joined = ids
            .iter()
            .map(AsRef::as_ref)
            .collect::<Vec<_>>()
            .join(" OR ");

        let mut query = Self::new();
        query.push("mapa", "true");
        query.push("entity", "pian");
        query.push("q", format!("ident_cely:({joined})"));
        query.push("rows", ids.len().to_string());
        query.push("fl", SPATIAL_UNIT_FIELDS.join(","));
        query
    }

    /// Facet-only event query (no result rows).
    #[must_use]
    pub fn facets() -> Self {
        let mut query = Self::new();
        query.push("entity", "akce");
        query.push("sort", "datestamp desc");
        query.push("page", "0");
        query.push("onlyFacets", "true");
        query.push("rows", "0");
        query
    }
}

/// Converts an extent from the host's reference system to WGS-84, the
/// system the search API's spatial filter expects.
pub trait ExtentTransform: Send + Sync {
    /// Returns the WGS-84 bounding box of `extent`.
    ///
    /// # Errors
    ///
    /// Returns [`ArchiveError`] if the extent cannot be transformed.
    fn to_wgs84(&self, extent: BoundingBox) -> Result<BoundingBox, ArchiveError>;
}

/// Identity transform for hosts that already work in WGS-84.
#[derive(Debug, Clone, Copy, Default)]
pub struct Wgs84Extent;

impl ExtentTransform for Wgs84Extent {
    fn to_wgs84(&self, extent: BoundingBox) -> Result<BoundingBox, ArchiveError> {
        if [extent.min_x, extent.max_x].iter().any(|x| !(-180.0..=180.0).contains(x))
            || [extent.min_y, extent.max_y].iter().any(|y| !(-90.0..=90.0).contains(y))
        {
            return Err(ArchiveError::Config {
                message: format!(
                    "extent {},{},{},{} is not in WGS-84 degrees",
                    extent.min_x, extent.min_y, extent.max_x, extent.max_y
                ),
            });
        }
        Ok(extent)
    }
}
