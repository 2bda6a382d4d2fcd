use crate::district::controller::{
    district_issues, districts_near, list_districts, resolve_district_slug, resolve_districts,
};
use crate::district::service::DistrictService;
use crate::issue::service::IssueService;
use axum::{routing::get, Router};
use std::sync::Arc;

/// Create a router for district routes. All reads, all public. The issue
/// service is layered too because the district page feed aggregates
/// through it.
pub fn routes(district_service: Arc<DistrictService>, issue_service: Arc<IssueService>) -> Router {
    Router::new()
        // Fixed segments before the :level capture
        .route("/api/districts/resolve", get(resolve_districts))
        .route("/api/districts/near", get(districts_near))
        .route("/api/districts/:level", get(list_districts))
        .route("/api/districts/:level/:slug", get(resolve_district_slug))
        .route("/api/districts/:level/:slug/issues", get(district_issues))
        .layer(axum::extract::Extension(district_service))
        .layer(axum::extract::Extension(issue_service))
}
