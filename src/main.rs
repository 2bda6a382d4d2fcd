mod api_doc;
mod auth;
mod cache;
mod comment;
mod db;
mod district;
mod issue;
mod notification;
mod profile;
mod routes;
mod schema_ext;

use axum::{routing::get, Router};
use dotenvy::dotenv;
use redis::Client;
use sqlx::postgres::PgPoolOptions;
use std::{net::SocketAddr, sync::Arc};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{error, info};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::api_doc::ApiDoc;
use crate::cache::redis::RedisCache;
use crate::comment::service::CommentService;
use crate::district::geometry::{GeometryStore, PostgisGeometryStore};
use crate::district::service::DistrictService;
use crate::issue::service::IssueService;
use crate::notification::digest::DigestService;
use crate::notification::service::NotificationService;
use crate::profile::service::ProfileService;

// Simple app config struct
#[derive(Debug, Clone)]
struct AppConfig {
    redis_url: Option<String>,
    port: u16,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logger
    tracing_subscriber::fmt::init();

    // Load .env file if it exists
    dotenv().ok();

    // Create connection pool
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&std::env::var("DATABASE_URL").unwrap())
        .await?;

    // Check if the database is initialized
    if !db::check_db_initialized(&pool).await {
        db::init_db(&pool).await?;
    }

    // Create a simple app config
    let app_config = AppConfig {
        redis_url: std::env::var("REDIS_URL").ok(),
        port: std::env::var("PORT")
            .ok()
            .and_then(|value| value.parse().ok())
            .unwrap_or(9500),
    };

    // Initialize Redis cache if configured
    let redis_cache = if let Some(url) = &app_config.redis_url {
        info!("Initializing Redis cache with URL: {}", url);
        match Client::open(url.clone()) {
            Ok(client) => Some(RedisCache::new(client)),
            Err(e) => {
                error!("Failed to connect to Redis: {}", e);
                None
            }
        }
    } else {
        info!("No Redis URL configured, proceeding without cache");
        None
    };

    // Create service instances
    let issue_service = Arc::new(IssueService::new(pool.clone(), redis_cache.clone()));
    let notification_service = Arc::new(NotificationService::new(
        pool.clone(),
        redis_cache.clone(),
    ));
    let digest_service = Arc::new(DigestService::new(pool.clone(), redis_cache.clone()));
    let profile_service = Arc::new(ProfileService::new(pool.clone()));

    // Comment creation fans out notifications, so the comment service
    // carries the notification service
    let comment_service = Arc::new(CommentService::new(
        pool.clone(),
        redis_cache.clone(),
        notification_service.clone(),
    ));

    // District resolution runs against the PostGIS-backed geometry store
    let geometry_store: Arc<dyn GeometryStore> = Arc::new(PostgisGeometryStore::new(pool.clone()));
    let district_service = Arc::new(DistrictService::new(geometry_store));

    // Build the router
    let app = Router::new()
        // API documentation
        .merge(SwaggerUi::new("/docs").url("/api-docs/openapi.json", ApiDoc::openapi()))
        // Health routes
        .merge(routes::health::routes(pool.clone()))
        // District listing, resolution and slug routing
        .merge(routes::districts::routes(
            district_service.clone(),
            issue_service.clone(),
        ))
        // Issue feed, creation and voting
        .merge(routes::issues::routes(issue_service.clone()))
        // Comment routes
        .merge(routes::comments::routes(comment_service.clone()))
        // Notification read-state and settings routes
        .merge(routes::notifications::routes(notification_service.clone()))
        // Profile and bookmark routes
        .merge(routes::profiles::routes(profile_service.clone()))
        // Scheduled job triggers
        .merge(routes::jobs::routes(digest_service.clone()))
        // Add welcome route
        .route(
            "/",
            get(|| async { "Welcome to the Civic Forum Backend API" }),
        )
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    // Try different ports
    let mut port = app_config.port;
    let max_tries = 5;
    for attempt in 1..=max_tries {
        let addr = SocketAddr::from(([127, 0, 0, 1], port));
        match axum::Server::try_bind(&addr) {
            Ok(server) => {
                println!(
                    "🚀 Server started successfully at http://localhost:{}",
                    port
                );
                println!("📄 API Documentation: http://localhost:{}/docs", port);
                println!(
                    "🗺️ District resolution: http://localhost:{}/api/districts/resolve?lat=45.5017&lng=-73.5673",
                    port
                );
                println!("📰 Issue feed: http://localhost:{}/api/issues", port);
                return server
                    .serve(app.into_make_service())
                    .await
                    .map_err(|e| e.into());
            }
            Err(_) => {
                if attempt == max_tries {
                    return Err("Failed to bind to any port".into());
                }
                port += 1;
            }
        }
    }

    Err("Failed to bind to any port".into())
}
