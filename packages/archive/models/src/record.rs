//! Typed views over raw search-API documents.
//!
//! The API returns loosely typed Solr documents: single-valued fields are
//! sometimes wrapped in lists, multi-valued fields are sometimes scalars,
//! and nested payloads come in several shapes. The constructors here pull
//! the fields the pipeline needs out of a [`serde_json::Value`] document
//! and tolerate every shape observed in practice.

use std::collections::BTreeSet;

use serde_json::Value;

use crate::payload::{PayloadError, ProtectedData};

/// A documentation unit attached to a fieldwork event.
///
/// Only used to work out which spatial units record a negative finding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentationUnit {
    /// Whether this unit records the absence of findings.
    pub is_negative_finding: bool,
    /// The spatial unit this documentation unit is located by.
    pub spatial_unit_id: Option<String>,
}

impl DocumentationUnit {
    /// Builds a documentation unit from one `az_dokumentacni_jednotka`
    /// element. The spatial-unit reference may be an `{ "id": ... }`
    /// object or a bare string.
    #[must_use]
    pub fn from_doc(doc: &Value) -> Self {
        let is_negative_finding = doc
            .get("dj_negativni_jednotka")
            .and_then(Value::as_bool)
            .unwrap_or(false);
        let spatial_unit_id = match doc.get("dj_pian") {
            Some(Value::Object(obj)) => obj.get("id").and_then(value_to_text),
            Some(Value::String(id)) if !id.is_empty() => Some(id.clone()),
            _ => None,
        };

        Self {
            is_negative_finding,
            spatial_unit_id,
        }
    }
}

/// One fieldwork event (`akce`) record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldworkEvent {
    /// Unique identifier (`ident_cely`).
    pub ident: String,
    /// District name.
    pub district: String,
    /// Cadastral area names.
    pub cadastral_areas: Vec<String>,
    /// Additional cadastral areas from the protected payload.
    pub additional_cadastral_areas: Vec<String>,
    /// Lead investigator.
    pub lead_investigator: String,
    /// Organization code.
    pub organization: String,
    /// Date specification code.
    pub data_specification: String,
    /// Start date as sent by the API.
    pub start_date: String,
    /// End date as sent by the API.
    pub end_date: String,
    /// Primary type code.
    pub primary_type: String,
    /// Secondary type codes.
    pub secondary_types: Vec<String>,
    /// Locality circumstances from the protected payload.
    pub locality_circumstances: String,
    /// Whether this record replaces a fieldwork report.
    pub is_replacement_record: bool,
    /// Accessibility code.
    pub accessibility: String,
    /// Localization (definition) point references.
    pub localization_points: Vec<String>,
    /// Referenced spatial-unit identifiers, in API order.
    pub spatial_unit_ids: Vec<String>,
    /// Attached documentation units.
    pub documentation_units: Vec<DocumentationUnit>,
}

impl FieldworkEvent {
    /// Builds an event from a search document.
    ///
    /// Returns `None` when the document has no identifier; such records
    /// cannot be deduplicated and are dropped by the pagination engine.
    /// A malformed protected-data payload only blanks the display columns
    /// it feeds; the event and its spatial units are kept.
    #[must_use]
    pub fn from_doc(doc: &Value) -> Option<Self> {
        let ident = record_ident(doc)?;

        let location_data = display_payload(doc, "az_chranene_udaje", &ident);
        let event_data = display_payload(doc, "akce_chranene_udaje", &ident);

        let additional_cadastral_areas = location_data
            .get("dalsi_katastr")
            .map(|value| {
                as_items(value)
                    .iter()
                    .filter_map(|item| match item {
                        Value::Object(obj) => obj.get("value").and_then(value_to_text),
                        other => value_to_text(other),
                    })
                    .filter(|s| !s.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        let locality_circumstances = event_data
            .get("lokalizace_okolnosti")
            .and_then(value_to_text)
            .unwrap_or_default();

        let documentation_units = doc
            .get("az_dokumentacni_jednotka")
            .map(|value| {
                as_items(value)
                    .iter()
                    .map(DocumentationUnit::from_doc)
                    .collect()
            })
            .unwrap_or_default();

        Some(Self {
            ident,
            district: first_text(doc, "az_okres"),
            cadastral_areas: text_list(doc, "katastr"),
            additional_cadastral_areas,
            lead_investigator: first_text(doc, "akce_hlavni_vedouci"),
            organization: first_text(doc, "akce_organizace"),
            data_specification: first_text(doc, "akce_specifikace_data"),
            start_date: first_text(doc, "akce_datum_zahajeni"),
            end_date: first_text(doc, "akce_datum_ukonceni"),
            primary_type: first_text(doc, "akce_hlavni_typ"),
            secondary_types: text_list(doc, "akce_vedlejsi_typ"),
            locality_circumstances,
            is_replacement_record: doc.get("akce_je_nz").and_then(Value::as_bool) == Some(true),
            accessibility: first_text(doc, "pristupnost"),
            localization_points: text_list(doc, "loc"),
            spatial_unit_ids: text_list(doc, "az_dj_pian"),
            documentation_units,
        })
    }

    /// Spatial units that this event's documentation units mark as
    /// negative findings.
    #[must_use]
    pub fn negative_spatial_units(&self) -> BTreeSet<&str> {
        self.documentation_units
            .iter()
            .filter(|unit| unit.is_negative_finding)
            .filter_map(|unit| unit.spatial_unit_id.as_deref())
            .collect()
    }
}

/// One spatial unit (`pian`) geometry record.
#[derive(Debug, Clone, PartialEq)]
pub struct SpatialUnit {
    /// Identifier, shared with [`FieldworkEvent::spatial_unit_ids`].
    pub ident: String,
    /// Spatial-unit type code.
    pub type_code: String,
    /// Precision code.
    pub precision_code: String,
    /// Normalized protected payload carrying the geometry.
    pub data: ProtectedData,
}

impl SpatialUnit {
    /// Field holding geometry in the national projected system (S-JTSK).
    pub const PROJECTED_GEOMETRY_FIELD: &'static str = "geom_sjtsk_wkt";
    /// Fallback field holding geometry in a generic system.
    pub const GENERIC_GEOMETRY_FIELD: &'static str = "geom_wkt";

    /// Builds a spatial unit from a search document.
    ///
    /// # Errors
    ///
    /// Returns [`PayloadError`] if `pian_chranene_udaje` is a malformed JSON
    /// string.
    pub fn from_doc(doc: &Value) -> Result<Option<Self>, PayloadError> {
        let Some(ident) = record_ident(doc) else {
            return Ok(None);
        };

        Ok(Some(Self {
            ident,
            type_code: first_text(doc, "pian_typ"),
            precision_code: first_text(doc, "pian_presnost"),
            data: ProtectedData::normalize_field(doc.get("pian_chranene_udaje"))?,
        }))
    }

    /// Returns the geometry text, preferring the projected encoding.
    #[must_use]
    pub fn geometry_text(&self) -> Option<&str> {
        self.data
            .wrapped_text(Self::PROJECTED_GEOMETRY_FIELD)
            .or_else(|| self.data.wrapped_text(Self::GENERIC_GEOMETRY_FIELD))
    }
}

/// Returns the non-empty `ident_cely` of a search document.
#[must_use]
pub fn record_ident(doc: &Value) -> Option<String> {
    let ident = first_text(doc, "ident_cely");
    (!ident.is_empty()).then_some(ident)
}

fn display_payload(doc: &Value, key: &str, ident: &str) -> ProtectedData {
    ProtectedData::normalize_field(doc.get(key)).unwrap_or_else(|e| {
        log::warn!("{ident}: ignoring malformed {key}: {e}");
        ProtectedData::default()
    })
}

/// Renders a scalar JSON value as text. Objects, arrays and `null` have
/// no textual form here.
fn value_to_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

/// Views a field as a list, wrapping scalars.
fn as_items(value: &Value) -> Vec<Value> {
    match value {
        Value::Array(items) => items.clone(),
        Value::Null => Vec::new(),
        other => vec![other.clone()],
    }
}

/// Single-valued field: first element of a list, or the scalar itself.
fn first_text(doc: &Value, key: &str) -> String {
    match doc.get(key) {
        Some(Value::Array(items)) => items.first().and_then(value_to_text),
        Some(value) => value_to_text(value),
        None => None,
    }
    .unwrap_or_default()
}

/// Multi-valued field with empty entries dropped.
fn text_list(doc: &Value, key: &str) -> Vec<String> {
    doc.get(key)
        .map(|value| {
            as_items(value)
                .iter()
                .filter_map(value_to_text)
                .filter(|s| !s.is_empty())
                .collect()
        })
        .unwrap_or_default()
}
