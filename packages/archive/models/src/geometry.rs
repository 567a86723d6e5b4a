//! Geometry parsing, validation and topological classification.

use std::str::FromStr as _;

use geo::{Geometry, Validation as _};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// The topological class a feature is filed under.
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
pub enum GeometryKind {
    /// Areal geometries.
    Polygon,
    /// Linear geometries.
    Line,
    /// Point geometries.
    Point,
}

impl GeometryKind {
    /// All kinds in output order (polygons, lines, points).
    pub const ALL: [Self; 3] = [Self::Polygon, Self::Line, Self::Point];

    /// Classifies a geometry by its topological dimension.
    ///
    /// # Errors
    ///
    /// Returns [`GeometryError::Unclassifiable`] for geometry collections,
    /// which mix dimensions.
    pub fn of(geometry: &Geometry<f64>) -> Result<Self, GeometryError> {
        match geometry {
            Geometry::Polygon(_)
            | Geometry::MultiPolygon(_)
            | Geometry::Rect(_)
            | Geometry::Triangle(_) => Ok(Self::Polygon),
            Geometry::LineString(_) | Geometry::MultiLineString(_) | Geometry::Line(_) => {
                Ok(Self::Line)
            }
            Geometry::Point(_) | Geometry::MultiPoint(_) => Ok(Self::Point),
            Geometry::GeometryCollection(_) => Err(GeometryError::Unclassifiable {
                kind: "GeometryCollection",
            }),
        }
    }

    /// Czech layer name used by the archive's map layers.
    #[must_use]
    pub const fn layer_name(self) -> &'static str {
        match self {
            Self::Polygon => "Plochy",
            Self::Line => "Linie",
            Self::Point => "Body",
        }
    }
}

/// Reasons a geometry text cannot become a feature.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GeometryError {
    /// The spatial unit carries no geometry text.
    #[error("no geometry text")]
    Missing,

    /// The text is not well-formed WKT.
    #[error("malformed WKT: {message}")]
    Wkt {
        /// Parser message.
        message: String,
    },

    /// The geometry parsed but is not structurally valid.
    #[error("invalid geometry: {reason}")]
    Invalid {
        /// Validation failure description.
        reason: String,
    },

    /// The geometry has no single topological class.
    #[error("unclassifiable geometry type {kind}")]
    Unclassifiable {
        /// Geometry type name.
        kind: &'static str,
    },
}

/// Parses WKT text into a validated geometry.
///
/// # Errors
///
/// Returns [`GeometryError::Wkt`] if the text does not parse or cannot be
/// converted (e.g. `POINT EMPTY`), and [`GeometryError::Invalid`] if the
/// result fails OGC validity checks (self-intersecting rings, too few
/// points, non-finite coordinates, ...).
pub fn parse_wkt(text: &str) -> Result<Geometry<f64>, GeometryError> {
    let parsed = wkt::Wkt::<f64>::from_str(text.trim()).map_err(|e| GeometryError::Wkt {
        message: e.to_string(),
    })?;
    let geometry = Geometry::<f64>::try_from(parsed).map_err(|e| GeometryError::Wkt {
        message: e.to_string(),
    })?;

    geometry
        .check_validation()
        .map_err(|e| GeometryError::Invalid {
            reason: e.to_string(),
        })?;

    Ok(geometry)
}
