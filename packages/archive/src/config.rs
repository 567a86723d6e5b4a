//! Archive endpoint and pipeline limit configuration.
//!
//! The defaults live in `config/digiarchiv.toml`, baked into the binary
//! via [`include_str!`]. Endpoint URLs can be overridden at runtime with
//! `AMCR_SEARCH_URL` and `AMCR_VOCABULARY_URL`.

use std::time::Duration;

use serde::Deserialize;

use crate::ArchiveError;

/// Embedded default configuration.
const DEFAULT_TOML: &str = include_str!("../config/digiarchiv.toml");

/// Environment variable overriding [`ArchiveConfig::search_url`].
pub const SEARCH_URL_ENV: &str = "AMCR_SEARCH_URL";

/// Environment variable overriding [`ArchiveConfig::vocabulary_url`].
pub const VOCABULARY_URL_ENV: &str = "AMCR_VOCABULARY_URL";

/// Endpoints, paging limits and per-call timeouts.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ArchiveConfig {
    /// Search API endpoint (records and facets).
    pub search_url: String,
    /// Code → label vocabulary document.
    pub vocabulary_url: String,
    /// Prefix of record detail pages; the event identifier is appended.
    pub detail_url_base: String,
    /// Event paging.
    pub paging: PagingConfig,
    /// Spatial unit batching.
    pub geometry: GeometryConfig,
    /// Per-call timeouts.
    pub timeouts: TimeoutConfig,
}

/// Event paging limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct PagingConfig {
    /// Records requested per page.
    pub page_size: usize,
    /// Hard cap on accumulated records.
    pub max_records: usize,
}

impl PagingConfig {
    /// Upper bound on page requests for one fetch:
    /// `ceil(max_records / page_size) + 1`.
    #[must_use]
    pub const fn max_requests(&self) -> usize {
        self.max_records.div_ceil(self.page_size) + 1
    }
}

/// Spatial unit batching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct GeometryConfig {
    /// Identifiers combined into one geometry query.
    pub batch_size: usize,
}

/// Per-call timeouts, in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct TimeoutConfig {
    /// Event page requests.
    pub search_secs: u64,
    /// Geometry batch requests.
    pub geometry_secs: u64,
    /// Vocabulary download.
    pub vocabulary_secs: u64,
    /// Facet-only requests.
    pub facet_secs: u64,
}

impl TimeoutConfig {
    #[must_use]
    pub const fn search(&self) -> Duration {
        Duration::from_secs(self.search_secs)
    }

    #[must_use]
    pub const fn geometry(&self) -> Duration {
        Duration::from_secs(self.geometry_secs)
    }

    #[must_use]
    pub const fn vocabulary(&self) -> Duration {
        Duration::from_secs(self.vocabulary_secs)
    }

    #[must_use]
    pub const fn facet(&self) -> Duration {
        Duration::from_secs(self.facet_secs)
    }
}

impl ArchiveConfig {
    /// Parses a configuration document.
    ///
    /// # Errors
    ///
    /// Returns [`ArchiveError::Config`] if the TOML is malformed or a limit
    /// is zero.
    pub fn parse(toml_str: &str) -> Result<Self, ArchiveError> {
        let config: Self = toml::de::from_str(toml_str).map_err(|e| ArchiveError::Config {
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Starts from the embedded defaults and applies environment overrides.
    ///
    /// # Errors
    ///
    /// Returns [`ArchiveError::Config`] if the embedded defaults are
    /// invalid.
    pub fn from_env() -> Result<Self, ArchiveError> {
        let mut config = Self::parse(DEFAULT_TOML)?;

        if let Ok(url) = std::env::var(SEARCH_URL_ENV)
            && !url.trim().is_empty()
        {
            log::debug!("Search URL overridden by {SEARCH_URL_ENV}: {url}");
            config.search_url = url.trim().to_string();
        }
        if let Ok(url) = std::env::var(VOCABULARY_URL_ENV)
            && !url.trim().is_empty()
        {
            log::debug!("Vocabulary URL overridden by {VOCABULARY_URL_ENV}: {url}");
            config.vocabulary_url = url.trim().to_string();
        }

        Ok(config)
    }

    /// Detail page URL for an event identifier.
    #[must_use]
    pub fn detail_url(&self, ident: &str) -> String {
        format!("{}{ident}", self.detail_url_base)
    }

    fn validate(&self) -> Result<(), ArchiveError> {
        let zero = [
            ("paging.page_size", self.paging.page_size),
            ("paging.max_records", self.paging.max_records),
            ("geometry.batch_size", self.geometry.batch_size),
        ]
        .into_iter()
        .find(|(_, value)| *value == 0);

        if let Some((name, _)) = zero {
            return Err(ArchiveError::Config {
                message: format!("{name} must be greater than zero"),
            });
        }
        Ok(())
    }
}

impl Default for ArchiveConfig {
    /// The embedded configuration, without environment overrides.
    ///
    /// # Panics
    ///
    /// Panics if the embedded TOML is malformed (a build-time guarantee
    /// since the file is embedded).
    fn default() -> Self {
        Self::parse(DEFAULT_TOML)
            .unwrap_or_else(|e| panic!("Failed to parse digiarchiv.toml: {e}"))
    }
}
