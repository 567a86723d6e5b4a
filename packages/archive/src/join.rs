//! Spatial join and geometry classification.
//!
//! Events reference spatial units by identifier; the geometries live in a
//! separate entity. [`JoinPlan`] maps each referenced spatial unit to the
//! metadata of the event referencing it. [`build_features`] then fetches
//! the spatial units in batches and turns each one into a classified
//! [`Feature`].

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;

use amcr_archive_models::{
    EventMetadata, Feature, FeatureAttributes, FeatureCollectionSet, FieldworkEvent,
    FilterCriteria, GeometryError, GeometryKind, SpatialUnit, parse_wkt,
};
use serde_json::Value;

use crate::ArchiveError;
use crate::api::ArchiveApi;
use crate::config::ArchiveConfig;
use crate::progress::ProgressCallback;
use crate::query::SearchQuery;
use crate::translations::TranslationCache;

/// Spatial-unit identifier → metadata of the event that references it.
///
/// When several events reference the same spatial unit, the event
/// processed last wins.
#[derive(Debug, Clone, Default)]
pub struct JoinPlan {
    lookup: BTreeMap<String, Arc<EventMetadata>>,
    events_with_geometry: usize,
}

impl JoinPlan {
    /// Builds the lookup for `events`, in order.
    ///
    /// With [`FilterCriteria::positive_findings_only`] set, spatial units
    /// that an event's own documentation units mark as negative findings
    /// are not taken from that event.
    #[must_use]
    pub fn build(
        events: &[FieldworkEvent],
        filters: &FilterCriteria,
        translations: &TranslationCache,
    ) -> Self {
        let mut plan = Self::default();

        for event in events {
            if event.spatial_unit_ids.is_empty() {
                continue;
            }

            let excluded = if filters.positive_findings_only() {
                event.negative_spatial_units()
            } else {
                BTreeSet::new()
            };

            let surviving: Vec<&String> = event
                .spatial_unit_ids
                .iter()
                .filter(|id| !excluded.contains(id.as_str()))
                .collect();
            if surviving.is_empty() {
                log::debug!("{}: every spatial unit is a negative finding", event.ident);
                continue;
            }

            plan.events_with_geometry += 1;
            let metadata = Arc::new(snapshot(event, translations));
            for id in surviving {
                if let Some(previous) = plan.lookup.insert(id.clone(), Arc::clone(&metadata))
                    && previous.ident != metadata.ident
                {
                    log::debug!(
                        "{id} is shared by {} and {}, keeping {}",
                        previous.ident,
                        metadata.ident,
                        metadata.ident
                    );
                }
            }
        }

        plan
    }

    /// Target spatial-unit identifiers, in sorted order.
    pub fn target_ids(&self) -> impl Iterator<Item = &str> {
        self.lookup.keys().map(String::as_str)
    }

    /// Metadata for spatial unit `id`.
    #[must_use]
    pub fn metadata(&self, id: &str) -> Option<&Arc<EventMetadata>> {
        self.lookup.get(id)
    }

    /// Events with at least one spatial unit left after exclusion.
    #[must_use]
    pub const fn events_with_geometry(&self) -> usize {
        self.events_with_geometry
    }

    /// Number of target spatial units.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lookup.len()
    }

    /// Returns `true` if no spatial unit is targeted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lookup.is_empty()
    }
}

/// Translated display snapshot of an event.
#[must_use]
pub fn snapshot(event: &FieldworkEvent, translations: &TranslationCache) -> EventMetadata {
    EventMetadata {
        ident: event.ident.clone(),
        district: event.district.clone(),
        cadastral_areas: join_non_empty(&event.cadastral_areas),
        additional_cadastral_areas: join_non_empty(&event.additional_cadastral_areas),
        lead_investigator: event.lead_investigator.clone(),
        organization: translations.resolve(&event.organization),
        data_specification: translations.resolve(&event.data_specification),
        start_date: event.start_date.clone(),
        end_date: event.end_date.clone(),
        primary_type: translations.resolve(&event.primary_type),
        secondary_types: translations.resolve_joined(&event.secondary_types),
        locality_circumstances: event.locality_circumstances.clone(),
        is_replacement_record: event.is_replacement_record,
        accessibility: event.accessibility.clone(),
        localization_points: join_non_empty(&event.localization_points),
    }
}

fn join_non_empty(items: &[String]) -> String {
    items
        .iter()
        .filter(|s| !s.is_empty())
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Outcome of the geometry stage.
#[derive(Debug, Clone, Default)]
pub struct JoinOutcome {
    /// Classified features.
    pub features: FeatureCollectionSet,
    /// Spatial-unit documents returned by the archive.
    pub units_returned: usize,
    /// Batches whose request failed.
    pub failed_batches: usize,
    /// Spatial units skipped because their geometry was missing,
    /// malformed, invalid or unclassifiable.
    pub skipped_geometries: usize,
    /// Returned documents that matched no target identifier.
    pub unmatched_units: usize,
}

/// Fetches the plan's spatial units batch by batch and classifies them.
///
/// A failed batch is logged and skipped. One bad geometry never aborts
/// the batch it came in.
///
/// # Errors
///
/// Returns the last batch failure if every batch failed.
pub async fn build_features(
    api: &dyn ArchiveApi,
    plan: &JoinPlan,
    config: &ArchiveConfig,
    translations: &TranslationCache,
    progress: &Arc<dyn ProgressCallback>,
) -> Result<JoinOutcome, ArchiveError> {
    let ids: Vec<&str> = plan.target_ids().collect();
    let mut outcome = JoinOutcome::default();
    if ids.is_empty() {
        return Ok(outcome);
    }

    let batches: Vec<&[&str]> = ids.chunks(config.geometry.batch_size).collect();
    let timeout = config.timeouts.geometry();
    let mut last_error = None;

    progress.set_total(ids.len() as u64);
    progress.set_position(0);
    log::info!(
        "Fetching {} spatial units in {} batches",
        ids.len(),
        batches.len()
    );

    for (index, batch) in batches.iter().enumerate() {
        match fetch_batch(api, batch, timeout).await {
            Ok(docs) => {
                outcome.units_returned += docs.len();
                for doc in &docs {
                    classify_into(doc, plan, config, translations, &mut outcome);
                }
            }
            Err(e) => {
                log::warn!("Spatial unit batch {index} failed, skipping: {e}");
                outcome.failed_batches += 1;
                last_error = Some(e);
            }
        }
        progress.inc(batch.len() as u64);
    }

    if outcome.failed_batches == batches.len()
        && let Some(e) = last_error
    {
        return Err(e);
    }

    Ok(outcome)
}

async fn fetch_batch(
    api: &dyn ArchiveApi,
    ids: &[&str],
    timeout: Duration,
) -> Result<Vec<Value>, ArchiveError> {
    let body = api.search(&SearchQuery::spatial_units(ids), timeout).await?;
    let docs = body
        .get("response")
        .and_then(|r| r.get("docs"))
        .and_then(Value::as_array)
        .ok_or_else(|| ArchiveError::Parse {
            message: "spatial unit response has no 'response.docs' list".to_string(),
        })?;
    Ok(docs.clone())
}

fn classify_into(
    doc: &Value,
    plan: &JoinPlan,
    config: &ArchiveConfig,
    translations: &TranslationCache,
    outcome: &mut JoinOutcome,
) {
    let unit = match SpatialUnit::from_doc(doc) {
        Ok(Some(unit)) => unit,
        Ok(None) => {
            outcome.unmatched_units += 1;
            return;
        }
        Err(e) => {
            log::warn!("Skipping spatial unit with malformed payload: {e}");
            outcome.skipped_geometries += 1;
            return;
        }
    };

    let Some(event) = plan.metadata(&unit.ident) else {
        log::debug!("{}: not requested by any event", unit.ident);
        outcome.unmatched_units += 1;
        return;
    };

    match build_feature(&unit, event, config, translations) {
        Ok(feature) => outcome.features.push(feature),
        Err(e) => {
            log::warn!("{}: skipped, {e}", unit.ident);
            outcome.skipped_geometries += 1;
        }
    }
}

/// Pairs a spatial unit's geometry with its event metadata.
///
/// # Errors
///
/// Returns [`GeometryError`] if the unit carries no geometry text, or the
/// text is malformed, invalid or unclassifiable.
pub fn build_feature(
    unit: &SpatialUnit,
    event: &Arc<EventMetadata>,
    config: &ArchiveConfig,
    translations: &TranslationCache,
) -> Result<Feature, GeometryError> {
    let text = unit.geometry_text().ok_or(GeometryError::Missing)?;
    let geometry = parse_wkt(text)?;
    let kind = GeometryKind::of(&geometry)?;

    Ok(Feature {
        kind,
        geometry,
        attributes: FeatureAttributes {
            spatial_unit_id: unit.ident.clone(),
            precision: translations.resolve(&unit.precision_code),
            spatial_unit_type: translations.resolve(&unit.type_code),
            detail_url: config.detail_url(&event.ident),
            event: Arc::clone(event),
        },
    })
}

#[cfg(test)]
mod tests {
    use amcr_archive_models::ATTRIBUTE_COUNT;
    use serde_json::json;

    use super::*;
    use crate::progress::null_progress;
    use crate::scripted::{ScriptedApi, event, page, spatial_unit, unavailable};

    fn events(docs: &[Value]) -> Vec<FieldworkEvent> {
        docs.iter()
            .map(|doc| FieldworkEvent::from_doc(doc).unwrap())
            .collect()
    }

    fn with_negative(mut doc: Value, negative: &str, positive: &str) -> Value {
        doc["az_dokumentacni_jednotka"] = json!([
            { "dj_negativni_jednotka": true, "dj_pian": { "id": negative } },
            { "dj_negativni_jednotka": false, "dj_pian": { "id": positive } },
        ]);
        doc
    }

    fn translations() -> TranslationCache {
        TranslationCache::with_labels(BTreeMap::from([
            ("ORG-1".to_string(), "Archeologický ústav".to_string()),
            ("HES-V1".to_string(), "výzkum".to_string()),
            ("HES-PT".to_string(), "plocha".to_string()),
        ]))
    }

    fn config(batch_size: usize) -> ArchiveConfig {
        let mut config = ArchiveConfig::default();
        config.geometry.batch_size = batch_size;
        config
    }

    #[test]
    fn positive_only_excludes_negative_units_of_the_same_event() {
        let doc = with_negative(event("C-1", &["P-1", "P-2"]), "P-1", "P-2");
        let filters = FilterCriteria::builder().positive_findings_only(true).build();

        let plan = JoinPlan::build(&events(&[doc]), &filters, &translations());

        assert_eq!(plan.target_ids().collect::<Vec<_>>(), ["P-2"]);
        assert_eq!(plan.events_with_geometry(), 1);
    }

    #[test]
    fn negative_units_are_kept_without_positive_only() {
        let doc = with_negative(event("C-1", &["P-1", "P-2"]), "P-1", "P-2");
        let filters = FilterCriteria::builder().build();

        let plan = JoinPlan::build(&events(&[doc]), &filters, &translations());

        assert_eq!(plan.target_ids().collect::<Vec<_>>(), ["P-1", "P-2"]);
    }

    #[test]
    fn fully_excluded_event_does_not_count_as_having_geometry() {
        let doc = with_negative(event("C-1", &["P-1"]), "P-1", "P-9");
        let filters = FilterCriteria::builder().positive_findings_only(true).build();

        let plan = JoinPlan::build(
            &events(&[doc, event("C-2", &[])]),
            &filters,
            &translations(),
        );

        assert!(plan.is_empty());
        assert_eq!(plan.events_with_geometry(), 0);
    }

    #[test]
    fn shared_spatial_unit_takes_last_event() {
        let plan = JoinPlan::build(
            &events(&[event("C-A", &["P-9"]), event("C-B", &["P-9"])]),
            &FilterCriteria::builder().build(),
            &translations(),
        );

        assert_eq!(plan.len(), 1);
        assert_eq!(plan.metadata("P-9").unwrap().ident, "C-B");
        assert_eq!(plan.events_with_geometry(), 2);
    }

    #[test]
    fn snapshot_translates_codes_and_passes_unknown_through() {
        let metadata = snapshot(&events(&[event("C-1", &[])])[0], &translations());

        assert_eq!(metadata.organization, "Archeologický ústav");
        assert_eq!(metadata.primary_type, "HES-TYP");
        assert_eq!(metadata.secondary_types, "výzkum, HES-V2");
        assert_eq!(metadata.cadastral_areas, "Roztoky");
        assert_eq!(metadata.data_specification, "");
    }

    #[tokio::test]
    async fn malformed_geometry_is_skipped_not_fatal() {
        let plan = JoinPlan::build(
            &events(&[event("C-1", &["P-1", "P-2"])]),
            &FilterCriteria::builder().build(),
            &translations(),
        );
        let api = ScriptedApi::new().with_search(Ok(page(
            &[
                spatial_unit("P-1", "POLYGON ((0 0, 10 0, 10 10, 0 10, 0 0))"),
                spatial_unit("P-2", "POLYGON ((0 0, 10"),
            ],
            2,
        )));

        let outcome = build_features(&api, &plan, &config(50), &translations(), &null_progress())
            .await
            .unwrap();

        let polygons = outcome.features.collection(GeometryKind::Polygon);
        assert_eq!(polygons.len(), 1);
        assert_eq!(polygons[0].id(), "P-1");
        assert_eq!(outcome.features.len(), 1);
        assert_eq!(outcome.skipped_geometries, 1);
    }

    #[tokio::test]
    async fn features_carry_full_attribute_rows() {
        let plan = JoinPlan::build(
            &events(&[event("C-1", &["P-1"])]),
            &FilterCriteria::builder().build(),
            &translations(),
        );
        let api = ScriptedApi::new().with_search(Ok(page(
            &[spatial_unit("P-1", "POINT (-742000 -1043000)")],
            1,
        )));

        let outcome = build_features(&api, &plan, &config(50), &translations(), &null_progress())
            .await
            .unwrap();

        let point = &outcome.features.collection(GeometryKind::Point)[0];
        let row = point.attributes.to_row();
        assert_eq!(row.len(), ATTRIBUTE_COUNT);
        assert_eq!(row[0], "P-1");
        assert_eq!(row[1], "HES-PP");
        assert_eq!(row[2], "plocha");
        assert_eq!(row[4], "C-1");
        assert_eq!(row[5], "https://digiarchiv.aiscr.cz/id/C-1");
        assert_eq!(row[17], "Ne");
    }

    #[tokio::test]
    async fn classifies_each_kind_into_its_own_collection() {
        let plan = JoinPlan::build(
            &events(&[event("C-1", &["P-1", "P-2", "P-3", "P-4"])]),
            &FilterCriteria::builder().build(),
            &translations(),
        );
        let api = ScriptedApi::new().with_search(Ok(page(
            &[
                spatial_unit("P-1", "MULTIPOLYGON (((0 0, 1 0, 1 1, 0 0)))"),
                spatial_unit("P-2", "LINESTRING (0 0, 5 5)"),
                spatial_unit("P-3", "MULTIPOINT ((1 1), (2 2))"),
                spatial_unit("P-4", "GEOMETRYCOLLECTION (POINT (1 1))"),
            ],
            4,
        )));

        let outcome = build_features(&api, &plan, &config(50), &translations(), &null_progress())
            .await
            .unwrap();

        for kind in GeometryKind::ALL {
            for feature in outcome.features.collection(kind) {
                assert_eq!(feature.kind, kind);
                assert_eq!(GeometryKind::of(&feature.geometry).unwrap(), kind);
            }
        }
        assert_eq!(outcome.features.collection(GeometryKind::Polygon).len(), 1);
        assert_eq!(outcome.features.collection(GeometryKind::Line).len(), 1);
        assert_eq!(outcome.features.collection(GeometryKind::Point).len(), 1);
        assert_eq!(outcome.skipped_geometries, 1);
    }

    #[tokio::test]
    async fn batches_ids_and_survives_a_failed_batch() {
        let plan = JoinPlan::build(
            &events(&[event("C-1", &["P-1", "P-2", "P-3"])]),
            &FilterCriteria::builder().build(),
            &translations(),
        );
        let api = ScriptedApi::new()
            .with_search(Err(unavailable()))
            .with_search(Ok(page(&[spatial_unit("P-3", "POINT (1 2)")], 1)));

        let outcome = build_features(&api, &plan, &config(2), &translations(), &null_progress())
            .await
            .unwrap();

        let requests = api.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].get("q"), Some("ident_cely:(P-1 OR P-2)"));
        assert_eq!(requests[1].get("q"), Some("ident_cely:(P-3)"));
        assert_eq!(outcome.failed_batches, 1);
        assert_eq!(outcome.features.len(), 1);
    }

    #[tokio::test]
    async fn every_batch_failing_is_an_error() {
        let plan = JoinPlan::build(
            &events(&[event("C-1", &["P-1"])]),
            &FilterCriteria::builder().build(),
            &translations(),
        );
        let api = ScriptedApi::new().with_search(Err(unavailable()));

        let result =
            build_features(&api, &plan, &config(50), &translations(), &null_progress()).await;

        assert!(result.unwrap_err().is_network());
    }

    #[tokio::test]
    async fn falls_back_to_generic_geometry_and_string_payloads() {
        let plan = JoinPlan::build(
            &events(&[event("C-1", &["P-1"])]),
            &FilterCriteria::builder().build(),
            &translations(),
        );
        let doc = json!({
            "ident_cely": "P-1",
            "pian_chranene_udaje": [
                "{\"geom_wkt\": {\"value\": \"LINESTRING (14.1 50.1, 14.2 50.2)\"}}"
            ],
        });
        let api = ScriptedApi::new().with_search(Ok(page(&[doc], 1)));

        let outcome = build_features(&api, &plan, &config(50), &translations(), &null_progress())
            .await
            .unwrap();

        assert_eq!(outcome.features.collection(GeometryKind::Line).len(), 1);
    }
}
