#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Data model for AMCR fieldwork events and their spatial units.
//!
//! Defines the filter criteria accepted by the load pipeline, typed views
//! over the search API's event (`akce`) and spatial-unit (`pian`)
//! documents, and the classified feature collections the pipeline emits.

pub mod feature;
pub mod geometry;
pub mod payload;
pub mod record;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

pub use feature::{
    ATTRIBUTE_COUNT, ATTRIBUTE_NAMES, EventMetadata, Feature, FeatureAttributes,
    FeatureCollectionSet,
};
pub use geometry::{GeometryError, GeometryKind, parse_wkt};
pub use payload::{PayloadError, ProtectedData};
pub use record::{DocumentationUnit, FieldworkEvent, SpatialUnit};

/// A filterable category of the archive's search API.
///
/// The string form is the codelist category name used in the local
/// codelist files (`kraj`, `okres`, ...).
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum FilterCategory {
    /// Region.
    Kraj,
    /// District.
    Okres,
    /// Cadastral area.
    Katastr,
    /// Organization.
    Organizace,
    /// Lead investigator.
    Vedouci,
    /// Archaeological period.
    Obdobi,
    /// Site / area type.
    Areal,
    /// Research type.
    TypAkce,
}

impl FilterCategory {
    /// Every category, in the order the filter form lists them.
    pub const ALL: [Self; 8] = [
        Self::Kraj,
        Self::Okres,
        Self::Katastr,
        Self::Organizace,
        Self::Vedouci,
        Self::Obdobi,
        Self::Areal,
        Self::TypAkce,
    ];

    /// The search API query parameter for this category.
    #[must_use]
    pub const fn filter_key(self) -> &'static str {
        match self {
            Self::Kraj => "f_kraj",
            Self::Okres => "f_okres",
            Self::Katastr => "f_katastr",
            Self::Organizace => "f_organizace",
            Self::Vedouci => "f_vedouci",
            Self::Obdobi => "f_obdobi",
            Self::Areal => "f_areal",
            Self::TypAkce => "f_typ_vyzkumu",
        }
    }
}

/// An axis-aligned extent.
///
/// Coordinates are in whatever reference system the producer uses; the
/// search API expects geographic WGS-84 degrees (x = longitude,
/// y = latitude).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    /// Western edge.
    pub min_x: f64,
    /// Southern edge.
    pub min_y: f64,
    /// Eastern edge.
    pub max_x: f64,
    /// Northern edge.
    pub max_y: f64,
}

impl BoundingBox {
    /// Creates a bounding box, normalizing swapped corners.
    #[must_use]
    pub fn new(x1: f64, y1: f64, x2: f64, y2: f64) -> Self {
        Self {
            min_x: x1.min(x2),
            min_y: y1.min(y2),
            max_x: x1.max(x2),
            max_y: y1.max(y2),
        }
    }

    /// Renders the extent as the API's `south,west,north,east` string.
    #[must_use]
    pub fn to_query_value(&self) -> String {
        format!("{},{},{},{}", self.min_y, self.min_x, self.max_y, self.max_x)
    }
}

/// User-selected filter criteria for one pipeline run.
///
/// Built once through [`FilterCriteriaBuilder`] and only read afterwards.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterCriteria {
    selections: BTreeMap<String, Vec<String>>,
    restrict_to_viewport: bool,
    positive_findings_only: bool,
}

impl FilterCriteria {
    /// Starts building a criteria set. Viewport restriction is on by
    /// default, matching the filter form.
    #[must_use]
    pub fn builder() -> FilterCriteriaBuilder {
        FilterCriteriaBuilder {
            criteria: Self {
                restrict_to_viewport: true,
                ..Self::default()
            },
        }
    }

    /// Whether the search is limited to the caller's bounding box.
    #[must_use]
    pub const fn restrict_to_viewport(&self) -> bool {
        self.restrict_to_viewport
    }

    /// Whether spatial units documented as negative findings are dropped.
    #[must_use]
    pub const fn positive_findings_only(&self) -> bool {
        self.positive_findings_only
    }

    /// Iterates over filter keys with at least one selected code.
    pub fn selections(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.selections
            .iter()
            .filter(|(_, codes)| !codes.is_empty())
            .map(|(key, codes)| (key.as_str(), codes.as_slice()))
    }

    /// Codes selected for `key`, if any.
    #[must_use]
    pub fn codes(&self, key: &str) -> &[String] {
        self.selections.get(key).map_or(&[][..], Vec::as_slice)
    }
}

/// Builder for [`FilterCriteria`].
#[derive(Debug, Clone)]
pub struct FilterCriteriaBuilder {
    criteria: FilterCriteria,
}

impl FilterCriteriaBuilder {
    /// Limits the search to the caller's bounding box.
    #[must_use]
    pub const fn restrict_to_viewport(mut self, restrict: bool) -> Self {
        self.criteria.restrict_to_viewport = restrict;
        self
    }

    /// Drops spatial units documented as negative findings.
    #[must_use]
    pub const fn positive_findings_only(mut self, positive_only: bool) -> Self {
        self.criteria.positive_findings_only = positive_only;
        self
    }

    /// Adds codes for an arbitrary filter key. Blank codes are ignored and
    /// repeated codes are kept once.
    #[must_use]
    pub fn select<I, S>(mut self, key: &str, codes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let entry = self.criteria.selections.entry(key.to_string()).or_default();
        for code in codes {
            let code = code.into().trim().to_string();
            if !code.is_empty() && !entry.contains(&code) {
                entry.push(code);
            }
        }
        self
    }

    /// Adds codes for a known category.
    #[must_use]
    pub fn select_category<I, S>(self, category: FilterCategory, codes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.select(category.filter_key(), codes)
    }

    /// Finishes the criteria set.
    #[must_use]
    pub fn build(self) -> FilterCriteria {
        self.criteria
    }
}

/// Terminal state of a load run, for display by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadStatus {
    /// The search matched no events.
    NoEvents,
    /// Events matched but none referenced a usable spatial unit.
    NoGeometry {
        /// Events returned by the search.
        events_found: usize,
    },
    /// Spatial units were requested but none produced a feature.
    NothingRendered {
        /// Events returned by the search.
        events_found: usize,
        /// Events with at least one surviving spatial-unit reference.
        events_with_geometry: usize,
    },
    /// At least one feature was produced.
    Rendered {
        /// Events returned by the search.
        events_found: usize,
        /// Events with at least one surviving spatial-unit reference.
        events_with_geometry: usize,
        /// Features in the polygon collection.
        polygons: usize,
        /// Features in the line collection.
        lines: usize,
        /// Features in the point collection.
        points: usize,
    },
}

impl LoadStatus {
    /// Total features rendered.
    #[must_use]
    pub const fn features_rendered(&self) -> usize {
        match self {
            Self::Rendered {
                polygons,
                lines,
                points,
                ..
            } => *polygons + *lines + *points,
            _ => 0,
        }
    }
}

impl std::fmt::Display for LoadStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoEvents => write!(f, "No fieldwork events matched the filter."),
            Self::NoGeometry { events_found } => write!(
                f,
                "Found {events_found} fieldwork events, but none has a geometry."
            ),
            Self::NothingRendered {
                events_found,
                events_with_geometry,
            } => write!(
                f,
                "Found {events_found} fieldwork events ({events_with_geometry} with geometry), \
                 but no data could be displayed."
            ),
            Self::Rendered {
                events_found,
                events_with_geometry,
                ..
            } => write!(
                f,
                "Done. Events: {events_found} (with geometry: {events_with_geometry}). \
                 Rendered: {} features.",
                self.features_rendered()
            ),
        }
    }
}
