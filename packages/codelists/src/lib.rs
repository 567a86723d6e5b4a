#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Local codelists for the AMCR filter form.
//!
//! Labels shown in the filter form map to the codes the search API
//! filters on. Static vocabularies (regions, districts, periods, ...) ship
//! as `heslar.csv`; the lead-investigator list is downloaded from the
//! archive's facet endpoint into `vedouci.csv`. Both are `;`-delimited
//! with a header row and `label;code;category` rows.

pub mod facets;
pub mod lookup;
pub mod store;

use amcr_archive::ArchiveError;

pub use amcr_archive_models::FilterCategory;
pub use facets::{LEADER_FACET, RefreshOutcome, refresh_dynamic_vocabulary};
pub use lookup::Lookup;
pub use store::{CodelistStore, DYNAMIC_FILE, STATIC_FILE};

/// Errors that can occur while reading or refreshing codelists.
#[derive(Debug, thiserror::Error)]
pub enum CodelistError {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV read or write error.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// The archive request failed.
    #[error("Archive error: {0}")]
    Archive(#[from] ArchiveError),

    /// The facet response does not contain the requested facet.
    #[error("Facet '{facet}' missing from response")]
    MissingFacet {
        /// Facet field name.
        facet: String,
    },
}
