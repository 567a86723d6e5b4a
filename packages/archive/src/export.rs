//! GeoJSON export of feature collections.
//!
//! Geometries stay in the archive's projected system (S-JTSK /
//! Krovak East North, EPSG:5514); each collection names it in a `crs`
//! foreign member.

use std::path::{Path, PathBuf};

use amcr_archive_models::{Feature, FeatureCollectionSet, GeometryKind};
use geojson::{FeatureCollection, JsonObject, JsonValue, feature::Id};
use serde_json::json;

use crate::ArchiveError;

/// Reference system of exported geometries.
pub const EXPORT_CRS: &str = "urn:ogc:def:crs:EPSG::5514";

/// Output file name for a collection kind.
#[must_use]
pub const fn file_name(kind: GeometryKind) -> &'static str {
    match kind {
        GeometryKind::Polygon => "amcr_plochy.geojson",
        GeometryKind::Line => "amcr_linie.geojson",
        GeometryKind::Point => "amcr_body.geojson",
    }
}

/// Converts one feature to GeoJSON. The feature id is the spatial-unit
/// identifier; properties are the 19 attributes in column order.
#[must_use]
pub fn to_geojson_feature(feature: &Feature) -> geojson::Feature {
    let properties: JsonObject = feature
        .attributes
        .named()
        .into_iter()
        .map(|(name, value)| (name.to_string(), JsonValue::String(value)))
        .collect();

    geojson::Feature {
        bbox: None,
        geometry: Some(geojson::Geometry::new(geojson::Value::from(
            &feature.geometry,
        ))),
        id: Some(Id::String(feature.id().to_string())),
        properties: Some(properties),
        foreign_members: None,
    }
}

/// Converts one collection to a GeoJSON feature collection named after
/// its layer.
#[must_use]
pub fn to_feature_collection(kind: GeometryKind, features: &[Feature]) -> FeatureCollection {
    let mut foreign_members = JsonObject::new();
    foreign_members.insert(
        "name".to_string(),
        JsonValue::String(format!("AMČR {}", kind.layer_name())),
    );
    foreign_members.insert(
        "crs".to_string(),
        json!({ "type": "name", "properties": { "name": EXPORT_CRS } }),
    );

    FeatureCollection {
        bbox: None,
        features: features.iter().map(to_geojson_feature).collect(),
        foreign_members: Some(foreign_members),
    }
}

/// Writes every non-empty collection of `set` into `dir`, creating the
/// directory if needed. Returns the written paths with their feature
/// counts.
///
/// # Errors
///
/// Returns [`ArchiveError::Io`] if the directory or a file cannot be
/// written.
pub fn write_collections(
    dir: &Path,
    set: &FeatureCollectionSet,
) -> Result<Vec<(PathBuf, usize)>, ArchiveError> {
    std::fs::create_dir_all(dir)?;

    let mut written = Vec::new();
    for kind in GeometryKind::ALL {
        let features = set.collection(kind);
        if features.is_empty() {
            continue;
        }

        let path = dir.join(file_name(kind));
        let collection = to_feature_collection(kind, features);
        std::fs::write(&path, collection.to_string())?;
        log::info!("Wrote {} features to {}", features.len(), path.display());
        written.push((path, features.len()));
    }

    Ok(written)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use amcr_archive_models::{ATTRIBUTE_NAMES, EventMetadata, FeatureAttributes, parse_wkt};

    use super::*;

    fn feature(id: &str, wkt: &str) -> Feature {
        let geometry = parse_wkt(wkt).unwrap();
        Feature {
            kind: GeometryKind::of(&geometry).unwrap(),
            geometry,
            attributes: FeatureAttributes {
                spatial_unit_id: id.to_string(),
                precision: "cm".to_string(),
                spatial_unit_type: "plocha".to_string(),
                detail_url: "https://digiarchiv.aiscr.cz/id/C-1".to_string(),
                event: Arc::new(EventMetadata {
                    ident: "C-1".to_string(),
                    is_replacement_record: true,
                    ..EventMetadata::default()
                }),
            },
        }
    }

    #[test]
    fn feature_properties_follow_column_order() {
        let exported = to_geojson_feature(&feature("P-1", "POINT (1 2)"));

        assert_eq!(exported.id, Some(Id::String("P-1".to_string())));
        let properties = exported.properties.unwrap();
        let keys: Vec<&str> = properties.keys().map(String::as_str).collect();
        let mut expected = ATTRIBUTE_NAMES.to_vec();
        expected.sort_unstable();
        let mut sorted_keys = keys.clone();
        sorted_keys.sort_unstable();
        assert_eq!(sorted_keys, expected);
        assert_eq!(properties["Akce - nahrazuje NZ"], "Ano");
        assert_eq!(properties["Identifikátor"], "C-1");
    }

    #[test]
    fn collection_names_layer_and_crs() {
        let collection = to_feature_collection(
            GeometryKind::Line,
            &[feature("P-2", "LINESTRING (0 0, 1 1)")],
        );

        let members = collection.foreign_members.unwrap();
        assert_eq!(members["name"], "AMČR Linie");
        assert_eq!(members["crs"]["properties"]["name"], EXPORT_CRS);
        assert_eq!(collection.features.len(), 1);
    }

    #[test]
    fn writes_only_non_empty_collections() {
        let dir = tempfile::tempdir().unwrap();
        let mut set = FeatureCollectionSet::new();
        set.push(feature("P-1", "POLYGON ((0 0, 1 0, 1 1, 0 0))"));
        set.push(feature("P-3", "POINT (5 5)"));

        let written = write_collections(dir.path(), &set).unwrap();

        assert_eq!(written.len(), 2);
        assert!(dir.path().join("amcr_plochy.geojson").exists());
        assert!(!dir.path().join("amcr_linie.geojson").exists());

        let text = std::fs::read_to_string(dir.path().join("amcr_body.geojson")).unwrap();
        let parsed: FeatureCollection = text.parse::<geojson::GeoJson>().unwrap().try_into().unwrap();
        assert_eq!(parsed.features[0].id, Some(Id::String("P-3".to_string())));
    }
}
