mod cities;
mod flights;
mod posts;
mod users;

use deadpool_postgres::{Config, ManagerConfig, Pool, PoolConfig, RecyclingMethod, Runtime};
use tokio_postgres::error::SqlState;
use tokio_postgres::NoTls;
use uuid::Uuid;

use crate::config::DatabaseConfig;
use crate::error::AppResult;

pub use cities::ReviewInsert;

/// Database connection pool
pub type DbPool = Pool;

/// Migrations in apply order; the `migrate` binary falls back to these when run outside the repo
pub const MIGRATIONS: &[(&str, &str)] = &[
    ("V1__initial_schema.sql", include_str!("../../migrations/V1__initial_schema.sql")),
    ("V2__posts.sql", include_str!("../../migrations/V2__posts.sql")),
];

/// Database service
pub struct DatabaseService {
    pool: DbPool,
}

impl DatabaseService {
    /// Create a new database service with connection pool
    pub async fn new(config: &DatabaseConfig) -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        let service = Self::with_lazy_pool(config)?;

        // Test connection
        let client = service.pool.get().await?;
        client.execute("SELECT 1", &[]).await?;

        log::info!("Database connection established");

        Ok(service)
    }

    /// Build the pool without opening a connection; connections are made on first use
    pub fn with_lazy_pool(config: &DatabaseConfig) -> Result<Self, deadpool_postgres::CreatePoolError> {
        let mut cfg = Config::new();
        cfg.url = Some(config.url.clone());
        cfg.manager = Some(ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        });
        cfg.pool = Some(PoolConfig::new(config.max_connections.max(1)));

        let pool = cfg.create_pool(Some(Runtime::Tokio1), NoTls)?;
        Ok(Self { pool })
    }

    /// Get a database client from the pool
    pub async fn get_client(&self) -> AppResult<deadpool_postgres::Client> {
        Ok(self.pool.get().await?)
    }

    /// Apply the bundled schema. Every statement is idempotent, so this is
    /// safe to run on each start alongside the `migrate` tool.
    pub async fn init_schema(&self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let client = self.pool.get().await?;

        for (name, sql) in MIGRATIONS {
            client.batch_execute(sql).await?;
            log::debug!("Schema file {} applied", name);
        }

        log::info!("Database schema initialized");
        Ok(())
    }

    /// Cheap liveness probe used by the health endpoint
    pub async fn ping(&self) -> AppResult<()> {
        let client = self.get_client().await?;
        client.execute("SELECT 1", &[]).await?;
        Ok(())
    }
}

/// True when the error is a Postgres unique constraint violation
pub fn is_unique_violation(err: &tokio_postgres::Error) -> bool {
    err.code() == Some(&SqlState::UNIQUE_VIOLATION)
}

/// Distinct ids in first-seen order
pub(crate) fn distinct_ids(ids: impl IntoIterator<Item = Uuid>) -> Vec<Uuid> {
    let mut out: Vec<Uuid> = Vec::new();
    for id in ids {
        if !out.contains(&id) {
            out.push(id);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn migrations_are_ordered_by_version() {
        let names: Vec<&str> = MIGRATIONS.iter().map(|(name, _)| *name).collect();
        let mut sorted = names.clone();
        sorted.sort();
        assert_eq!(names, sorted);
        assert!(MIGRATIONS.iter().all(|(_, sql)| sql.contains("IF NOT EXISTS")));
    }

    #[test]
    fn distinct_ids_keeps_first_occurrence() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        assert_eq!(distinct_ids(vec![a, b, a, b, a]), vec![a, b]);
        assert!(distinct_ids(Vec::new()).is_empty());
    }
}
