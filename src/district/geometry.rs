use axum::async_trait;
use sqlx::PgPool;

use super::model::{District, DistrictLevel, NearbyDistrict};
use crate::db::{self, DbError};

/// Backing store for district boundaries. One implementation speaks
/// PostGIS; tests mock this trait to drive the resolver without a
/// database.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait GeometryStore: Send + Sync {
    /// The district at this level whose boundary contains the point, if
    /// any. A point lies in at most one polygon per level; if the store
    /// ever returns several the first wins.
    async fn containing_district(
        &self,
        level: DistrictLevel,
        lat: f64,
        lng: f64,
    ) -> Result<Option<District>, DbError>;

    /// Districts at every level whose boundary lies within radius_km of
    /// the point, with GeoJSON boundaries for map display.
    async fn districts_near(
        &self,
        lat: f64,
        lng: f64,
        radius_km: f64,
    ) -> Result<Vec<NearbyDistrict>, DbError>;

    /// All display names at a level (federal lists English names).
    async fn district_names(&self, level: DistrictLevel) -> Result<Vec<String>, DbError>;
}

pub struct PostgisGeometryStore {
    pool: PgPool,
}

impl PostgisGeometryStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl GeometryStore for PostgisGeometryStore {
    async fn containing_district(
        &self,
        level: DistrictLevel,
        lat: f64,
        lng: f64,
    ) -> Result<Option<District>, DbError> {
        // ST_MakePoint takes (x, y) = (lng, lat).
        match level {
            DistrictLevel::Federal => {
                let row = db::with_timeout(
                    "federal containment query",
                    sqlx::query_as::<_, (i32, String)>(
                        "SELECT id, name_en FROM forum.federal_districts \
                         WHERE ST_Contains(geom, ST_SetSRID(ST_MakePoint($2, $1), 4326)) \
                         LIMIT 1",
                    )
                    .bind(lat)
                    .bind(lng)
                    .fetch_optional(&self.pool),
                )
                .await?;
                Ok(row.map(|(id, name)| District {
                    id,
                    name,
                    level,
                    province: None,
                    city: None,
                    borough: None,
                }))
            }
            DistrictLevel::Provincial => {
                let row = db::with_timeout(
                    "provincial containment query",
                    sqlx::query_as::<_, (i32, String, String)>(
                        "SELECT id, name, province FROM forum.provincial_districts \
                         WHERE ST_Contains(geom, ST_SetSRID(ST_MakePoint($2, $1), 4326)) \
                         LIMIT 1",
                    )
                    .bind(lat)
                    .bind(lng)
                    .fetch_optional(&self.pool),
                )
                .await?;
                Ok(row.map(|(id, name, province)| District {
                    id,
                    name,
                    level,
                    province: Some(province),
                    city: None,
                    borough: None,
                }))
            }
            DistrictLevel::Municipal => {
                let row = db::with_timeout(
                    "municipal containment query",
                    sqlx::query_as::<_, (i32, String, String, Option<String>)>(
                        "SELECT id, name, city, borough FROM forum.municipal_districts \
                         WHERE ST_Contains(geom, ST_SetSRID(ST_MakePoint($2, $1), 4326)) \
                         LIMIT 1",
                    )
                    .bind(lat)
                    .bind(lng)
                    .fetch_optional(&self.pool),
                )
                .await?;
                Ok(row.map(|(id, name, city, borough)| District {
                    id,
                    name,
                    level,
                    province: None,
                    city: Some(city),
                    borough,
                }))
            }
        }
    }

    async fn districts_near(
        &self,
        lat: f64,
        lng: f64,
        radius_km: f64,
    ) -> Result<Vec<NearbyDistrict>, DbError> {
        // Municipal boundaries are dense; their search radius is capped at
        // 30 km regardless of what the caller asked for.
        let radius_m = radius_km * 1000.0;
        let municipal_radius_m = radius_km.min(30.0) * 1000.0;

        let rows = db::with_timeout(
            "districts near query",
            sqlx::query_as::<_, (i32, String, String, Option<String>, serde_json::Value)>(
                "SELECT id, name_en AS name, 'federal' AS level, NULL AS borough, \
                        ST_AsGeoJSON(geom)::jsonb AS boundary \
                 FROM forum.federal_districts \
                 WHERE ST_DWithin(geom::geography, ST_SetSRID(ST_MakePoint($2, $1), 4326)::geography, $3) \
                 UNION ALL \
                 SELECT id, name, 'provincial', NULL, ST_AsGeoJSON(geom)::jsonb \
                 FROM forum.provincial_districts \
                 WHERE ST_DWithin(geom::geography, ST_SetSRID(ST_MakePoint($2, $1), 4326)::geography, $3) \
                 UNION ALL \
                 SELECT id, name, 'municipal', borough, ST_AsGeoJSON(geom)::jsonb \
                 FROM forum.municipal_districts \
                 WHERE ST_DWithin(geom::geography, ST_SetSRID(ST_MakePoint($2, $1), 4326)::geography, $4)",
            )
            .bind(lat)
            .bind(lng)
            .bind(radius_m)
            .bind(municipal_radius_m)
            .fetch_all(&self.pool),
        )
        .await?;

        Ok(rows
            .into_iter()
            .filter_map(|(id, name, level, borough, boundary)| {
                DistrictLevel::from_str(&level).map(|level| NearbyDistrict {
                    id,
                    name,
                    level,
                    borough,
                    boundary,
                })
            })
            .collect())
    }

    async fn district_names(&self, level: DistrictLevel) -> Result<Vec<String>, DbError> {
        let sql = match level {
            DistrictLevel::Federal => {
                "SELECT name_en FROM forum.federal_districts ORDER BY name_en"
            }
            DistrictLevel::Provincial => {
                "SELECT name FROM forum.provincial_districts ORDER BY name"
            }
            DistrictLevel::Municipal => {
                "SELECT name FROM forum.municipal_districts ORDER BY name"
            }
        };
        let rows = db::with_timeout(
            "district names query",
            sqlx::query_as::<_, (String,)>(sql).fetch_all(&self.pool),
        )
        .await?;
        Ok(rows.into_iter().map(|(name,)| name).collect())
    }
}
