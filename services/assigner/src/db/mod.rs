//! Postgres access for the assigner.
//!
//! [`Database`] owns the pool and applies the roster schema from
//! `migrations/`. Assignment runs go through [`PgAssignmentStore`], which opens
//! one serializable transaction per run.

mod error;
mod store;

pub use error::DbError;
pub use store::{PgAssignmentSession, PgAssignmentStore};

use std::path::PathBuf;
use std::time::Duration;

use sqlx::migrate::Migrator;
use sqlx::postgres::{PgPool, PgPoolOptions};
use tracing::{debug, info};

/// Pool settings.
#[derive(Debug, Clone)]
pub struct DbConfig {
    pub database_url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout: Duration,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            database_url: "postgres://localhost/roster".to_string(),
            max_connections: 10,
            min_connections: 1,
            acquire_timeout: Duration::from_secs(5),
        }
    }
}

impl DbConfig {
    /// Reads `DATABASE_URL`, `DB_MAX_CONNECTIONS` and `DB_MIN_CONNECTIONS`.
    /// Unparseable pool sizes fall back to the defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let size = |name: &str, default: u32| {
            lookup(name)
                .and_then(|raw| raw.trim().parse().ok())
                .unwrap_or(default)
        };

        Self {
            max_connections: size("DB_MAX_CONNECTIONS", defaults.max_connections),
            min_connections: size("DB_MIN_CONNECTIONS", defaults.min_connections),
            database_url: lookup("DATABASE_URL").unwrap_or(defaults.database_url),
            ..defaults
        }
    }
}

/// Roster database handle.
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    pub async fn connect(config: &DbConfig) -> Result<Self, DbError> {
        info!(
            max_connections = config.max_connections,
            min_connections = config.min_connections,
            "Connecting to roster database"
        );

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(config.acquire_timeout)
            .connect(&config.database_url)
            .await
            .map_err(DbError::Connect)?;

        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn health_check(&self) -> Result<(), DbError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(DbError::Query)?;
        Ok(())
    }

    /// Applies the roster schema from the first migrations directory that
    /// loads; works from the workspace root, the crate root or an installed
    /// binary's working directory.
    pub async fn run_migrations(&self) -> Result<(), DbError> {
        let dirs = migration_dirs();
        let mut last_error = None;

        for dir in &dirs {
            match Migrator::new(dir.clone()).await {
                Ok(migrator) => {
                    info!(migrations_dir = %dir.display(), "Applying roster schema");
                    migrator.run(&self.pool).await.map_err(DbError::Migration)?;
                    return Ok(());
                }
                Err(e) => {
                    debug!(migrations_dir = %dir.display(), error = %e, "No migrations here");
                    last_error = Some(e.to_string());
                }
            }
        }

        Err(DbError::MigrationDirNotFound {
            tried: dirs
                .iter()
                .map(|dir| dir.display().to_string())
                .collect::<Vec<_>>()
                .join(", "),
            last_error: last_error.unwrap_or_else(|| "unknown error".to_string()),
        })
    }

    pub fn assignment_store(&self) -> PgAssignmentStore {
        PgAssignmentStore::new(self.pool.clone())
    }
}

fn migration_dirs() -> Vec<PathBuf> {
    vec![
        PathBuf::from("migrations"),
        PathBuf::from("services/assigner/migrations"),
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("migrations"),
    ]
}
