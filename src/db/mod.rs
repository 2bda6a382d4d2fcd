use sqlx::{PgPool, Row};
use std::fs;
use std::future::Future;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info, warn};

/// Bound applied to every data-store and geometry-store call.
pub const QUERY_TIMEOUT: Duration = Duration::from_secs(15);

/// Database access errors. A timed-out query is distinct from a backend
/// failure so callers can treat it as transient.
#[derive(Debug, Error)]
pub enum DbError {
    #[error("{0} timed out after 15s")]
    Timeout(&'static str),
    #[error("database error: {0}")]
    Backend(#[from] sqlx::Error),
}

/// Run a query future under the shared 15-second bound. The label names
/// the query in timeout errors and logs ("issues select", "votes select").
pub async fn with_timeout<T, F>(label: &'static str, fut: F) -> Result<T, DbError>
where
    F: Future<Output = Result<T, sqlx::Error>>,
{
    match tokio::time::timeout(QUERY_TIMEOUT, fut).await {
        Ok(result) => result.map_err(DbError::from),
        Err(_) => {
            warn!("{} exceeded {}s timeout", label, QUERY_TIMEOUT.as_secs());
            Err(DbError::Timeout(label))
        }
    }
}

/// Initialize the database schema
pub async fn init_db(pool: &PgPool) -> Result<(), sqlx::Error> {
    info!("Initializing database schema...");

    // Read the schema SQL file
    let schema_path = Path::new("src/db/schema.sql");
    let schema_sql = match fs::read_to_string(schema_path) {
        Ok(content) => content,
        Err(e) => {
            error!("Failed to read schema.sql: {}", e);
            return Err(sqlx::Error::Io(e));
        }
    };

    // Execute the SQL script
    match sqlx::query(&schema_sql).execute(pool).await {
        Ok(_) => {
            info!("Database schema initialized successfully");
        }
        Err(e) => {
            error!("Failed to initialize database schema: {}", e);
            return Err(e);
        }
    }

    Ok(())
}

/// Check if the issues table exists
pub async fn check_db_initialized(pool: &PgPool) -> bool {
    let result = sqlx::query(
        "SELECT EXISTS (SELECT FROM information_schema.tables WHERE table_schema = 'forum' AND table_name = 'issues')",
    )
    .fetch_one(pool)
    .await;

    match result {
        Ok(row) => row.try_get::<bool, _>(0).unwrap_or(false),
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn with_timeout_passes_through_success() {
        let result = with_timeout("test select", async { Ok::<_, sqlx::Error>(7) }).await;
        assert_eq!(result.unwrap(), 7);
    }

    #[tokio::test]
    async fn with_timeout_wraps_backend_errors() {
        let result =
            with_timeout("test select", async { Err::<i32, _>(sqlx::Error::PoolTimedOut) }).await;
        assert!(matches!(result, Err(DbError::Backend(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn with_timeout_times_out_hung_queries() {
        let result = with_timeout("hung select", async {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok::<_, sqlx::Error>(1)
        })
        .await;
        match result {
            Err(DbError::Timeout(label)) => assert_eq!(label, "hung select"),
            other => panic!("expected timeout, got {:?}", other),
        }
    }

    #[test]
    fn timeout_error_names_the_query() {
        let err = DbError::Timeout("votes select");
        assert_eq!(err.to_string(), "votes select timed out after 15s");
    }
}
