use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

use crate::db::DbError;

/// The three levels of government a district can belong to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum DistrictLevel {
    Federal,
    Provincial,
    Municipal,
}

impl DistrictLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Federal => "federal",
            Self::Provincial => "provincial",
            Self::Municipal => "municipal",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "federal" => Some(Self::Federal),
            "provincial" => Some(Self::Provincial),
            "municipal" => Some(Self::Municipal),
            _ => None,
        }
    }

    /// The issue column that scopes an issue to this level's district.
    pub fn district_column(&self) -> &'static str {
        match self {
            Self::Federal => "federal_district",
            Self::Provincial => "provincial_district",
            Self::Municipal => "municipal_district",
        }
    }
}

impl std::fmt::Display for DistrictLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A district row normalized to one shape across all three levels. The
/// per-level tables differ (federal carries bilingual names, municipal
/// carries city and borough); the geometry store flattens them here so
/// nothing downstream has to care which table a row came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct District {
    pub id: i32,
    pub name: String,
    pub level: DistrictLevel,
    pub province: Option<String>,
    pub city: Option<String>,
    pub borough: Option<String>,
}

/// The districts containing a user's coordinate, one name per level.
/// Derived data: recomputed from the coordinate, never stored. A level
/// whose containment query failed or matched nothing is simply null.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct UserDistrictInfo {
    pub federal: Option<String>,
    pub provincial: Option<String>,
    pub municipal: Option<String>,
    pub municipal_borough: Option<String>,
    pub city: Option<String>,
    pub province: Option<String>,
}

impl UserDistrictInfo {
    pub fn from_levels(
        federal: Option<District>,
        provincial: Option<District>,
        municipal: Option<District>,
    ) -> Self {
        Self {
            federal: federal.map(|d| d.name),
            province: provincial.as_ref().and_then(|d| d.province.clone()),
            provincial: provincial.map(|d| d.name),
            municipal_borough: municipal.as_ref().and_then(|d| d.borough.clone()),
            city: municipal.as_ref().and_then(|d| d.city.clone()),
            municipal: municipal.map(|d| d.name),
        }
    }
}

/// A district near a coordinate, with its boundary as GeoJSON for map
/// display.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct NearbyDistrict {
    pub id: i32,
    pub name: String,
    pub level: DistrictLevel,
    pub borough: Option<String>,
    /// GeoJSON geometry produced by ST_AsGeoJSON.
    #[schema(value_type = Object)]
    pub boundary: serde_json::Value,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct NearbyDistrictsResponse {
    pub districts: Vec<NearbyDistrict>,
}

/// One entry in a level's district listing. The slug is derived from the
/// name so clients can build district URLs without re-slugging.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct DistrictNameEntry {
    #[schema(example = "Côte-des-Neiges")]
    pub name: String,
    #[schema(example = "cote-des-neiges")]
    pub slug: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct DistrictNamesResponse {
    pub level: DistrictLevel,
    pub districts: Vec<DistrictNameEntry>,
}

/// A slug resolved back to its canonical district name.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SlugResolveResponse {
    pub level: DistrictLevel,
    pub slug: String,
    #[schema(example = "Côte-des-Neiges")]
    pub name: String,
}

#[derive(Debug, Error)]
pub enum DistrictError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    #[error("{0} timed out")]
    Timeout(&'static str),

    #[error("District not found")]
    NotFound,

    #[error("Validation error: {0}")]
    ValidationError(String),
}

impl From<DbError> for DistrictError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::Timeout(label) => Self::Timeout(label),
            DbError::Backend(e) => Self::DatabaseError(e),
        }
    }
}

/// Error response for the API
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct DistrictErrorResponse {
    /// Error message
    #[schema(example = "District not found")]
    pub error: String,

    /// Error code
    #[schema(example = "NOT_FOUND")]
    pub code: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn district(name: &str, level: DistrictLevel) -> District {
        District {
            id: 1,
            name: name.to_string(),
            level,
            province: None,
            city: None,
            borough: None,
        }
    }

    #[test]
    fn level_round_trips_through_strings() {
        for level in [
            DistrictLevel::Federal,
            DistrictLevel::Provincial,
            DistrictLevel::Municipal,
        ] {
            assert_eq!(DistrictLevel::from_str(level.as_str()), Some(level));
        }
        assert_eq!(DistrictLevel::from_str("regional"), None);
    }

    #[test]
    fn info_pulls_display_fields_from_the_right_levels() {
        let provincial = District {
            province: Some("QC".to_string()),
            ..district("Westmount-Saint-Louis", DistrictLevel::Provincial)
        };
        let municipal = District {
            city: Some("Montréal".to_string()),
            borough: Some("Ville-Marie".to_string()),
            ..district("Peter-McGill", DistrictLevel::Municipal)
        };

        let info = UserDistrictInfo::from_levels(
            Some(district("Laurier—Sainte-Marie", DistrictLevel::Federal)),
            Some(provincial),
            Some(municipal),
        );

        assert_eq!(info.federal.as_deref(), Some("Laurier—Sainte-Marie"));
        assert_eq!(info.provincial.as_deref(), Some("Westmount-Saint-Louis"));
        assert_eq!(info.province.as_deref(), Some("QC"));
        assert_eq!(info.municipal.as_deref(), Some("Peter-McGill"));
        assert_eq!(info.municipal_borough.as_deref(), Some("Ville-Marie"));
        assert_eq!(info.city.as_deref(), Some("Montréal"));
    }

    #[test]
    fn missing_levels_stay_null() {
        let info = UserDistrictInfo::from_levels(
            None,
            None,
            Some(district("Plateau-Mont-Royal", DistrictLevel::Municipal)),
        );
        assert!(info.federal.is_none());
        assert!(info.provincial.is_none());
        assert!(info.province.is_none());
        assert_eq!(info.municipal.as_deref(), Some("Plateau-Mont-Royal"));
    }
}
