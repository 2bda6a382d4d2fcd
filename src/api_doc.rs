use utoipa::openapi::security::{Http, HttpAuthScheme, SecurityScheme};
use utoipa::{Modify, OpenApi};

/// Security scheme configuration for OpenAPI
pub struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        // Get or create components section
        let components = openapi.components.get_or_insert_with(Default::default);

        // Add bearer token security scheme
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(Http::new(HttpAuthScheme::Bearer)),
        );
    }
}

/// API documentation
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Civic Forum Backend API",
        version = "0.1.0",
        description = "REST API for the Civic Forum Backend"
    ),
    paths(
        // Add health check endpoint
        crate::routes::health::health_check,
        // Add district endpoints
        crate::district::controller::list_districts,
        crate::district::controller::resolve_districts,
        crate::district::controller::districts_near,
        crate::district::controller::resolve_district_slug,
        crate::district::controller::district_issues,
        // Add issue endpoints
        crate::issue::controller::get_feed,
        crate::issue::controller::get_issue,
        crate::issue::controller::create_issue,
        crate::issue::controller::update_issue,
        crate::issue::controller::vote,
        // Add comment endpoints
        crate::comment::controller::create_comment,
        crate::comment::controller::list_comments,
        // Add notification endpoints
        crate::notification::controller::list_notifications,
        crate::notification::controller::unread_count,
        crate::notification::controller::mark_read,
        crate::notification::controller::mark_all_read,
        crate::notification::controller::get_settings,
        crate::notification::controller::update_settings,
        crate::notification::controller::track_visit,
        // Add scheduled job triggers
        crate::notification::controller::run_bookmark_digest,
        crate::notification::controller::cleanup_notifications,
        // Add profile endpoints
        crate::profile::controller::get_profile,
        crate::profile::controller::add_bookmark,
        crate::profile::controller::remove_bookmark
    ),
    components(
        schemas(
            // Health schemas
            crate::routes::health::HealthResponse,
            // District schemas
            crate::district::model::District,
            crate::district::model::DistrictLevel,
            crate::district::model::UserDistrictInfo,
            crate::district::model::NearbyDistrict,
            crate::district::model::NearbyDistrictsResponse,
            crate::district::model::DistrictNameEntry,
            crate::district::model::DistrictNamesResponse,
            crate::district::model::SlugResolveResponse,
            crate::district::model::DistrictErrorResponse,
            // Issue schemas
            crate::issue::model::IssueRecord,
            crate::issue::model::FeedResponse,
            crate::issue::model::FeedSort,
            crate::issue::model::CreateIssueRequest,
            crate::issue::model::UpdateIssueRequest,
            crate::issue::model::VoteRequest,
            crate::issue::model::VoteSummary,
            crate::issue::model::VoteCounts,
            crate::issue::model::IssueErrorResponse,
            // Comment schemas
            crate::comment::model::CommentRecord,
            crate::comment::model::CommentListResponse,
            crate::comment::model::CreateCommentRequest,
            crate::comment::model::CommentErrorResponse,
            // Notification schemas
            crate::notification::model::NotificationType,
            crate::notification::model::NotificationRecord,
            crate::notification::model::NotificationListResponse,
            crate::notification::model::UnreadCountResponse,
            crate::notification::model::NotificationSettings,
            crate::notification::model::UpdateSettingsRequest,
            crate::notification::model::TrackVisitRequest,
            crate::notification::model::SuccessResponse,
            crate::notification::model::DigestSummary,
            crate::notification::model::CleanupSummary,
            crate::notification::model::NotificationErrorResponse,
            // Profile schemas
            crate::profile::model::ProfileResponse,
            crate::profile::model::BookmarkResponse,
            crate::profile::model::ProfileErrorResponse,
            // External type schemas
            crate::schema_ext::DateTimeWrapper,
            crate::schema_ext::UuidWrapper
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "districts", description = "District listing, resolution and slug routing endpoints"),
        (name = "issues", description = "Issue feed, creation and voting endpoints"),
        (name = "comments", description = "Comment management endpoints"),
        (name = "notifications", description = "Notification read-state and settings endpoints"),
        (name = "jobs", description = "Scheduled job trigger endpoints"),
        (name = "profiles", description = "Public profile and bookmark endpoints")
    ),
    security(
        ("bearer_auth" = [])
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;
