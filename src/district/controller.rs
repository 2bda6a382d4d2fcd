use crate::district::model::{
    DistrictError, DistrictErrorResponse, DistrictLevel, SlugResolveResponse,
};
use crate::district::service::DistrictService;
use crate::issue::controller::issue_error_to_response;
use crate::issue::model::FeedQueryParams;
use crate::issue::service::IssueService;
use axum::{
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::error;
use utoipa::{IntoParams, ToSchema};

/// Search radius for the map listing when the client does not pass one.
const DEFAULT_NEAR_RADIUS_KM: f64 = 50.0;

// Query parameters for coordinate endpoints
#[derive(Debug, Deserialize, ToSchema, IntoParams)]
pub struct CoordinateQueryParams {
    #[schema(example = 45.5017)]
    lat: Option<f64>,
    #[schema(example = -73.5673)]
    lng: Option<f64>,
}

// Query parameters for the map listing
#[derive(Debug, Deserialize, ToSchema, IntoParams)]
pub struct NearQueryParams {
    lat: Option<f64>,
    lng: Option<f64>,
    #[schema(example = 50.0)]
    radius_km: Option<f64>,
}

// Helper function to convert DistrictError to HTTP response
fn district_error_to_response(err: DistrictError) -> (StatusCode, Json<DistrictErrorResponse>) {
    let (status, error_message, code) = match err {
        DistrictError::DatabaseError(e) => {
            error!("Database error: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Database error",
                "DB_ERROR",
            )
        }
        DistrictError::Timeout(label) => {
            error!("Query timed out: {}", label);
            (
                StatusCode::GATEWAY_TIMEOUT,
                "The request timed out",
                "TIMEOUT",
            )
        }
        DistrictError::NotFound => (StatusCode::NOT_FOUND, "District not found", "NOT_FOUND"),
        DistrictError::ValidationError(_) => {
            (StatusCode::BAD_REQUEST, "Invalid input", "VALIDATION_ERROR")
        }
    };

    let error_response = DistrictErrorResponse {
        error: error_message.to_string(),
        code: code.to_string(),
    };

    (status, Json(error_response))
}

fn parse_level(level: &str) -> Result<DistrictLevel, DistrictError> {
    DistrictLevel::from_str(level).ok_or_else(|| {
        DistrictError::ValidationError(format!("Unknown government level: {}", level))
    })
}

/// List the districts at a government level
///
/// Returns every district name at the level with its URL slug, ordered by
/// name. Federal districts list their English names.
#[utoipa::path(
    get,
    path = "/api/districts/{level}",
    tag = "districts",
    params(
        ("level" = String, Path, description = "federal, provincial or municipal")
    ),
    responses(
        (status = 200, description = "District names and slugs", body = DistrictNamesResponse),
        (status = 400, description = "Unknown level", body = DistrictErrorResponse),
        (status = 500, description = "Internal server error", body = DistrictErrorResponse)
    )
)]
pub async fn list_districts(
    Path(level): Path<String>,
    Extension(district_service): Extension<Arc<DistrictService>>,
) -> impl IntoResponse {
    let level = match parse_level(&level) {
        Ok(level) => level,
        Err(e) => return district_error_to_response(e).into_response(),
    };

    match district_service.list_districts(level).await {
        Ok(listing) => (StatusCode::OK, Json(listing)).into_response(),
        Err(e) => district_error_to_response(e).into_response(),
    }
}

/// Resolve a coordinate to its districts
///
/// Point-in-polygon lookup at every government level. A level whose query
/// fails or matches nothing comes back null; the endpoint itself does not
/// fail. Results are cached for five minutes per coordinate.
#[utoipa::path(
    get,
    path = "/api/districts/resolve",
    tag = "districts",
    params(CoordinateQueryParams),
    responses(
        (status = 200, description = "Districts containing the point", body = UserDistrictInfo),
        (status = 400, description = "Missing lat or lng", body = DistrictErrorResponse)
    )
)]
pub async fn resolve_districts(
    Query(params): Query<CoordinateQueryParams>,
    Extension(district_service): Extension<Arc<DistrictService>>,
) -> impl IntoResponse {
    let (lat, lng) = match (params.lat, params.lng) {
        (Some(lat), Some(lng)) => (lat, lng),
        _ => {
            return district_error_to_response(DistrictError::ValidationError(
                "lat and lng are required".to_string(),
            ))
            .into_response();
        }
    };

    let info = district_service.resolve_coordinate(lat, lng).await;
    (StatusCode::OK, Json(info)).into_response()
}

/// List districts near a coordinate
///
/// Map data: every district whose boundary lies within radius_km of the
/// point, with GeoJSON boundaries. The municipal search radius is capped
/// at 30 km.
#[utoipa::path(
    get,
    path = "/api/districts/near",
    tag = "districts",
    params(NearQueryParams),
    responses(
        (status = 200, description = "Nearby districts with boundaries", body = NearbyDistrictsResponse),
        (status = 400, description = "Missing lat or lng", body = DistrictErrorResponse),
        (status = 504, description = "Geometry query timed out", body = DistrictErrorResponse),
        (status = 500, description = "Internal server error", body = DistrictErrorResponse)
    )
)]
pub async fn districts_near(
    Query(params): Query<NearQueryParams>,
    Extension(district_service): Extension<Arc<DistrictService>>,
) -> impl IntoResponse {
    let (lat, lng) = match (params.lat, params.lng) {
        (Some(lat), Some(lng)) => (lat, lng),
        _ => {
            return district_error_to_response(DistrictError::ValidationError(
                "lat and lng are required".to_string(),
            ))
            .into_response();
        }
    };
    let radius_km = params.radius_km.unwrap_or(DEFAULT_NEAR_RADIUS_KM);

    match district_service.districts_near(lat, lng, radius_km).await {
        Ok(districts) => (StatusCode::OK, Json(districts)).into_response(),
        Err(e) => district_error_to_response(e).into_response(),
    }
}

/// Resolve a district slug
///
/// Maps a level+slug pair back to the canonical district name.
#[utoipa::path(
    get,
    path = "/api/districts/{level}/{slug}",
    tag = "districts",
    params(
        ("level" = String, Path, description = "federal, provincial or municipal"),
        ("slug" = String, Path, description = "URL slug of the district name")
    ),
    responses(
        (status = 200, description = "The canonical district name", body = SlugResolveResponse),
        (status = 400, description = "Unknown level", body = DistrictErrorResponse),
        (status = 404, description = "No district matches the slug", body = DistrictErrorResponse),
        (status = 500, description = "Internal server error", body = DistrictErrorResponse)
    )
)]
pub async fn resolve_district_slug(
    Path((level, slug)): Path<(String, String)>,
    Extension(district_service): Extension<Arc<DistrictService>>,
) -> impl IntoResponse {
    let level = match parse_level(&level) {
        Ok(level) => level,
        Err(e) => return district_error_to_response(e).into_response(),
    };

    match district_service.canonical_name(level, &slug).await {
        Ok(name) => {
            let resolved = SlugResolveResponse { level, slug, name };
            (StatusCode::OK, Json(resolved)).into_response()
        }
        Err(e) => district_error_to_response(e).into_response(),
    }
}

/// Get the issue feed for a district page
///
/// Resolves the slug, then lists issues scoped exactly to that district:
/// the level's district field must equal the name and government_level
/// must equal the level. Same aggregation and optional filters as the
/// main feed.
#[utoipa::path(
    get,
    path = "/api/districts/{level}/{slug}/issues",
    tag = "districts",
    params(
        ("level" = String, Path, description = "federal, provincial or municipal"),
        ("slug" = String, Path, description = "URL slug of the district name"),
        FeedQueryParams
    ),
    responses(
        (status = 200, description = "Aggregated district feed", body = FeedResponse),
        (status = 400, description = "Unknown level", body = DistrictErrorResponse),
        (status = 404, description = "No district matches the slug", body = DistrictErrorResponse),
        (status = 504, description = "A backing query timed out", body = IssueErrorResponse),
        (status = 500, description = "Internal server error", body = IssueErrorResponse)
    )
)]
pub async fn district_issues(
    Path((level, slug)): Path<(String, String)>,
    Query(params): Query<FeedQueryParams>,
    Extension(district_service): Extension<Arc<DistrictService>>,
    Extension(issue_service): Extension<Arc<IssueService>>,
) -> impl IntoResponse {
    let level = match parse_level(&level) {
        Ok(level) => level,
        Err(e) => return district_error_to_response(e).into_response(),
    };

    let district = match district_service.canonical_name(level, &slug).await {
        Ok(name) => name,
        Err(e) => return district_error_to_response(e).into_response(),
    };

    let (filters, sort) = params.into_parts();
    match issue_service
        .district_feed(level, &district, filters, sort)
        .await
    {
        Ok(feed) => (StatusCode::OK, Json(feed)).into_response(),
        Err(e) => issue_error_to_response(e).into_response(),
    }
}
