#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! AMCR Digiarchiv search client and map feature pipeline.
//!
//! Fetches fieldwork events (`akce`) matching a bounding box and filter
//! criteria page by page, joins them with separately fetched spatial
//! units (`pian`), parses and classifies the geometries, and returns three
//! typed feature collections (polygons, lines, points) together with a
//! status summary for the host.
//!
//! All remote access goes through the [`api::ArchiveApi`] trait so the
//! pipeline can be driven by any transport; [`api::HttpArchiveApi`] is
//! the `reqwest` implementation.

pub mod api;
pub mod config;
pub mod export;
pub mod join;
pub mod pagination;
pub mod pipeline;
pub mod progress;
pub mod query;
pub mod translations;

#[cfg(test)]
pub(crate) mod scripted;

pub use api::{ArchiveApi, HttpArchiveApi};
pub use config::ArchiveConfig;
pub use pipeline::{LoadReport, load};
pub use translations::TranslationCache;

/// Errors that can occur while talking to the archive.
#[derive(Debug, thiserror::Error)]
pub enum ArchiveError {
    /// HTTP request failed (connection, timeout, body read).
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The server answered with a non-success status.
    #[error("HTTP {status} from {url}")]
    Status {
        /// Response status code.
        status: u16,
        /// Requested URL.
        url: String,
    },

    /// JSON decoding failed.
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    /// A response did not have the expected structure.
    #[error("Parse error: {message}")]
    Parse {
        /// Description of what went wrong.
        message: String,
    },

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid configuration.
    #[error("Configuration error: {message}")]
    Config {
        /// Description of what went wrong.
        message: String,
    },
}

impl ArchiveError {
    /// Returns `true` for transport-level failures (timeouts, refused
    /// connections, non-success statuses).
    #[must_use]
    pub const fn is_network(&self) -> bool {
        matches!(self, Self::Http(_) | Self::Status { .. })
    }
}
