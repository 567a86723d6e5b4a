//! Output features and their fixed attribute schema.

use std::sync::Arc;

use geo::Geometry;

use crate::geometry::GeometryKind;

/// Number of attributes every feature carries.
pub const ATTRIBUTE_COUNT: usize = 19;

/// Attribute column names, in output order.
pub const ATTRIBUTE_NAMES: [&str; ATTRIBUTE_COUNT] = [
    "PIAN",
    "Přesnost",
    "PIAN – typ",
    "Definiční bod(y) (WGS-84)",
    "Identifikátor",
    "Odkaz do Digiarchivu",
    "Okres",
    "Katastr",
    "Další katastry",
    "Vedoucí akce",
    "Organizace",
    "Specifikace data",
    "Datum zahájení",
    "Datum ukončení",
    "Hlavní typ",
    "Vedlejší typ",
    "Akce – lokalizace",
    "Akce - nahrazuje NZ",
    "Přístupnost",
];

/// Snapshot of a fieldwork event's display fields, already translated.
///
/// Shared by every spatial unit the event references.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventMetadata {
    /// Event identifier.
    pub ident: String,
    /// District.
    pub district: String,
    /// Cadastral areas, comma-joined.
    pub cadastral_areas: String,
    /// Additional cadastral areas, comma-joined.
    pub additional_cadastral_areas: String,
    /// Lead investigator.
    pub lead_investigator: String,
    /// Organization label.
    pub organization: String,
    /// Date specification label.
    pub data_specification: String,
    /// Start date.
    pub start_date: String,
    /// End date.
    pub end_date: String,
    /// Primary type label.
    pub primary_type: String,
    /// Secondary type labels, comma-joined.
    pub secondary_types: String,
    /// Locality circumstances.
    pub locality_circumstances: String,
    /// Whether the event replaces a fieldwork report.
    pub is_replacement_record: bool,
    /// Accessibility code.
    pub accessibility: String,
    /// Localization points, comma-joined.
    pub localization_points: String,
}

/// The 19 attributes of one output feature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureAttributes {
    /// Spatial-unit identifier.
    pub spatial_unit_id: String,
    /// Translated precision.
    pub precision: String,
    /// Translated spatial-unit type.
    pub spatial_unit_type: String,
    /// Link to the event's detail page.
    pub detail_url: String,
    /// Metadata of the event referencing the spatial unit.
    pub event: Arc<EventMetadata>,
}

impl FeatureAttributes {
    /// Renders the attributes as a row in [`ATTRIBUTE_NAMES`] order.
    #[must_use]
    pub fn to_row(&self) -> [String; ATTRIBUTE_COUNT] {
        let event = &self.event;
        [
            self.spatial_unit_id.clone(),
            self.precision.clone(),
            self.spatial_unit_type.clone(),
            event.localization_points.clone(),
            event.ident.clone(),
            self.detail_url.clone(),
            event.district.clone(),
            event.cadastral_areas.clone(),
            event.additional_cadastral_areas.clone(),
            event.lead_investigator.clone(),
            event.organization.clone(),
            event.data_specification.clone(),
            event.start_date.clone(),
            event.end_date.clone(),
            event.primary_type.clone(),
            event.secondary_types.clone(),
            event.locality_circumstances.clone(),
            yes_no(event.is_replacement_record).to_string(),
            event.accessibility.clone(),
        ]
    }

    /// Pairs each attribute with its column name.
    #[must_use]
    pub fn named(&self) -> Vec<(&'static str, String)> {
        ATTRIBUTE_NAMES.into_iter().zip(self.to_row()).collect()
    }
}

const fn yes_no(flag: bool) -> &'static str {
    if flag { "Ano" } else { "Ne" }
}

/// One classified output feature.
#[derive(Debug, Clone, PartialEq)]
pub struct Feature {
    /// Topological class; always matches `geometry`.
    pub kind: GeometryKind,
    /// Parsed, validated geometry.
    pub geometry: Geometry<f64>,
    /// Attribute record.
    pub attributes: FeatureAttributes,
}

impl Feature {
    /// Spatial-unit identifier of this feature.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.attributes.spatial_unit_id
    }
}

/// Three disjoint, kind-keyed feature collections produced by one run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureCollectionSet {
    polygons: Vec<Feature>,
    lines: Vec<Feature>,
    points: Vec<Feature>,
}

impl FeatureCollectionSet {
    /// Creates an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Files a feature under the collection matching its kind.
    pub fn push(&mut self, feature: Feature) {
        match feature.kind {
            GeometryKind::Polygon => self.polygons.push(feature),
            GeometryKind::Line => self.lines.push(feature),
            GeometryKind::Point => self.points.push(feature),
        }
    }

    /// Returns the collection for `kind`.
    #[must_use]
    pub fn collection(&self, kind: GeometryKind) -> &[Feature] {
        match kind {
            GeometryKind::Polygon => &self.polygons,
            GeometryKind::Line => &self.lines,
            GeometryKind::Point => &self.points,
        }
    }

    /// Total number of features across all three collections.
    #[must_use]
    pub fn len(&self) -> usize {
        self.polygons.len() + self.lines.len() + self.points.len()
    }

    /// Returns `true` if no collection holds a feature.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
