//! Load pipeline orchestration.
//!
//! [`load`] runs one full fetch-and-rebuild: vocabulary (first run only),
//! paged event search, spatial join, batched geometry fetch and
//! classification. Every call starts from scratch and returns a fresh
//! [`FeatureCollectionSet`].

use std::sync::Arc;

use amcr_archive_models::{
    BoundingBox, FeatureCollectionSet, FilterCriteria, GeometryKind, LoadStatus,
};

use crate::ArchiveError;
use crate::api::ArchiveApi;
use crate::config::ArchiveConfig;
use crate::join::{JoinPlan, build_features};
use crate::pagination::fetch_events;
use crate::progress::ProgressCallback;
use crate::query::{ExtentTransform, SearchQuery};
use crate::translations::TranslationCache;

/// Counters describing what a run dropped or lost along the way.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadDiagnostics {
    /// Event page requests issued.
    pub page_requests: usize,
    /// Failure message of the page that ended paging early, if any.
    pub pagination_interrupted: Option<String>,
    /// Whether the record cap cut the event list short.
    pub events_truncated: bool,
    /// Event documents dropped for lacking an identifier or carrying a
    /// malformed payload.
    pub dropped_events: usize,
    /// Spatial units requested.
    pub spatial_units_requested: usize,
    /// Spatial-unit documents returned.
    pub spatial_units_returned: usize,
    /// Geometry batches that failed.
    pub failed_batches: usize,
    /// Spatial units skipped for bad or missing geometry.
    pub skipped_geometries: usize,
}

/// Everything one load run hands back to the host.
#[derive(Debug, Clone)]
pub struct LoadReport {
    /// Classified features. Empty unless `status` is
    /// [`LoadStatus::Rendered`].
    pub features: FeatureCollectionSet,
    /// Terminal state, displayable as the host message.
    pub status: LoadStatus,
    /// Run counters.
    pub diagnostics: LoadDiagnostics,
}

impl LoadReport {
    fn empty(status: LoadStatus, diagnostics: LoadDiagnostics) -> Self {
        Self {
            features: FeatureCollectionSet::new(),
            status,
            diagnostics,
        }
    }
}

/// Loads and classifies the spatial units of every event matching
/// `filters`.
///
/// `extent` is in the host's reference system; `transform` converts it to
/// WGS-84 and is only consulted when the criteria restrict the search to
/// the viewport. Runs must not overlap on the same `translations` cache
/// while it is still loading; concurrent runs after that are fine.
///
/// # Errors
///
/// Returns [`ArchiveError`] if the extent cannot be transformed, the first
/// event page fails, or every geometry batch fails. Empty results are not
/// errors; they are reported through [`LoadReport::status`].
pub async fn load(
    api: &dyn ArchiveApi,
    config: &ArchiveConfig,
    translations: &TranslationCache,
    extent: BoundingBox,
    transform: &dyn ExtentTransform,
    filters: &FilterCriteria,
    progress: &Arc<dyn ProgressCallback>,
) -> Result<LoadReport, ArchiveError> {
    translations
        .ensure_loaded(api, config.timeouts.vocabulary())
        .await;

    let extent = if filters.restrict_to_viewport() {
        Some(transform.to_wgs84(extent)?)
    } else {
        None
    };

    progress.set_message("Searching fieldwork events...".to_string());
    let base = SearchQuery::events(extent, filters);
    let fetch = fetch_events(
        api,
        &base,
        config.paging,
        config.timeouts.search(),
        progress,
    )
    .await?;

    let mut diagnostics = LoadDiagnostics {
        page_requests: fetch.requests,
        pagination_interrupted: fetch.interrupted.clone(),
        events_truncated: fetch.truncated,
        dropped_events: fetch.dropped_records,
        ..LoadDiagnostics::default()
    };

    let events_found = fetch.events.len();
    if events_found == 0 {
        let status = LoadStatus::NoEvents;
        progress.finish(status.to_string());
        log::info!("{status}");
        return Ok(LoadReport::empty(status, diagnostics));
    }

    let plan = JoinPlan::build(&fetch.events, filters, translations);
    let events_with_geometry = plan.events_with_geometry();
    if plan.is_empty() {
        let status = LoadStatus::NoGeometry { events_found };
        progress.finish(status.to_string());
        log::info!("{status}");
        return Ok(LoadReport::empty(status, diagnostics));
    }

    diagnostics.spatial_units_requested = plan.len();
    progress.set_message(format!(
        "Events: {events_found} ({events_with_geometry} with map). Fetching {} geometries...",
        plan.len()
    ));
    let outcome = build_features(api, &plan, config, translations, progress).await?;

    diagnostics.spatial_units_returned = outcome.units_returned;
    diagnostics.failed_batches = outcome.failed_batches;
    diagnostics.skipped_geometries = outcome.skipped_geometries;

    let features = outcome.features;
    let status = if features.is_empty() {
        LoadStatus::NothingRendered {
            events_found,
            events_with_geometry,
        }
    } else {
        LoadStatus::Rendered {
            events_found,
            events_with_geometry,
            polygons: features.collection(GeometryKind::Polygon).len(),
            lines: features.collection(GeometryKind::Line).len(),
            points: features.collection(GeometryKind::Point).len(),
        }
    };

    progress.finish(status.to_string());
    log::info!("{status}");

    Ok(LoadReport {
        features,
        status,
        diagnostics,
    })
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::progress::null_progress;
    use crate::query::Wgs84Extent;
    use crate::scripted::{ScriptedApi, event, page, spatial_unit, unavailable};

    fn extent() -> BoundingBox {
        BoundingBox::new(14.2, 49.9, 14.5, 50.2)
    }

    async fn run(api: &ScriptedApi, filters: &FilterCriteria) -> Result<LoadReport, ArchiveError> {
        load(
            api,
            &ArchiveConfig::default(),
            &TranslationCache::new(),
            extent(),
            &Wgs84Extent,
            filters,
            &null_progress(),
        )
        .await
    }

    #[tokio::test]
    async fn zero_events_reports_no_events() {
        let api = ScriptedApi::new();

        let report = run(&api, &FilterCriteria::builder().build()).await.unwrap();

        assert_eq!(report.status, LoadStatus::NoEvents);
        assert!(report.features.is_empty());
        assert_eq!(api.requests().len(), 1);
    }

    #[tokio::test]
    async fn events_without_spatial_units_report_no_geometry() {
        let api = ScriptedApi::new()
            .with_search(Ok(page(&[event("C-1", &[]), event("C-2", &[])], 2)));

        let report = run(&api, &FilterCriteria::builder().build()).await.unwrap();

        assert_eq!(report.status, LoadStatus::NoGeometry { events_found: 2 });
        assert!(report.features.is_empty());
        assert_eq!(api.requests().len(), 1);
    }

    #[tokio::test]
    async fn renders_valid_geometry_and_skips_malformed() {
        let api = ScriptedApi::new()
            .with_search(Ok(page(&[event("C-1", &["P-1", "P-2"])], 1)))
            .with_search(Ok(page(
                &[
                    spatial_unit("P-1", "POLYGON ((0 0, 4 0, 4 4, 0 4, 0 0))"),
                    spatial_unit("P-2", "POLYGON ((0 0, 4 0"),
                ],
                2,
            )));

        let report = run(&api, &FilterCriteria::builder().build()).await.unwrap();

        assert_eq!(
            report.status,
            LoadStatus::Rendered {
                events_found: 1,
                events_with_geometry: 1,
                polygons: 1,
                lines: 0,
                points: 0,
            }
        );
        assert_eq!(report.features.collection(GeometryKind::Polygon)[0].id(), "P-1");
        assert_eq!(report.diagnostics.skipped_geometries, 1);
        assert_eq!(report.diagnostics.spatial_units_requested, 2);
    }

    #[tokio::test]
    async fn shared_spatial_unit_carries_last_event_metadata() {
        let api = ScriptedApi::new()
            .with_search(Ok(page(&[event("C-A", &["P-9"]), event("C-B", &["P-9"])], 2)))
            .with_search(Ok(page(&[spatial_unit("P-9", "POINT (1 1)")], 1)));

        let report = run(&api, &FilterCriteria::builder().build()).await.unwrap();

        let points = report.features.collection(GeometryKind::Point);
        assert_eq!(points.len(), 1);
        assert_eq!(points[0].attributes.event.ident, "C-B");
    }

    #[tokio::test]
    async fn malformed_event_payload_still_renders_its_spatial_unit() {
        let mut doc = event("C-1", &["P-1"]);
        doc["akce_chranene_udaje"] = json!("{\"lokalizace_okolnosti\": ");
        let api = ScriptedApi::new()
            .with_search(Ok(page(&[doc], 1)))
            .with_search(Ok(page(&[spatial_unit("P-1", "POINT (1 1)")], 1)));

        let report = run(&api, &FilterCriteria::builder().build()).await.unwrap();

        assert_eq!(report.diagnostics.dropped_events, 0);
        assert_eq!(report.status.features_rendered(), 1);
        let points = report.features.collection(GeometryKind::Point);
        assert_eq!(points[0].attributes.event.locality_circumstances, "");
    }

    #[tokio::test]
    async fn unusable_geometries_report_nothing_rendered() {
        let api = ScriptedApi::new()
            .with_search(Ok(page(&[event("C-1", &["P-1"])], 1)))
            .with_search(Ok(page(&[json!({ "ident_cely": "P-1" })], 1)));

        let report = run(&api, &FilterCriteria::builder().build()).await.unwrap();

        assert_eq!(
            report.status,
            LoadStatus::NothingRendered {
                events_found: 1,
                events_with_geometry: 1,
            }
        );
    }

    #[tokio::test]
    async fn interrupted_paging_still_renders_gathered_events() {
        let api = ScriptedApi::new()
            .with_search(Ok(page(&[event("C-1", &["P-1"])], 1000)))
            .with_search(Err(unavailable()))
            .with_search(Ok(page(&[spatial_unit("P-1", "POINT (1 1)")], 1)));

        let report = run(&api, &FilterCriteria::builder().build()).await.unwrap();

        assert_eq!(report.status.features_rendered(), 1);
        assert!(report.diagnostics.pagination_interrupted.is_some());
    }

    #[tokio::test]
    async fn viewport_is_only_transformed_when_restricted() {
        let api = ScriptedApi::new();
        let filters = FilterCriteria::builder().restrict_to_viewport(false).build();

        let report = load(
            &api,
            &ArchiveConfig::default(),
            &TranslationCache::new(),
            BoundingBox::new(-745_000.0, -1_045_000.0, -740_000.0, -1_040_000.0),
            &Wgs84Extent,
            &filters,
            &null_progress(),
        )
        .await
        .unwrap();

        assert_eq!(report.status, LoadStatus::NoEvents);
        assert!(api.requests()[0].get("loc_rpt").is_none());
    }

    #[tokio::test]
    async fn first_page_failure_propagates() {
        let api = ScriptedApi::new().with_search(Err(unavailable()));

        let err = run(&api, &FilterCriteria::builder().build()).await.unwrap_err();

        assert!(err.is_network());
    }
}
