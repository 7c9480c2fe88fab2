pub mod db_pool;
pub mod result;
pub mod schema;

use async_trait::async_trait;
use r2d2::Pool;
use thiserror::Error;
use tracing::{debug, info};

use crate::config::DatabaseConfig;
use db_pool::DuckDBConnectionManager;
pub use result::{ResultSet, SqlValue};

#[derive(Debug, Error)]
pub enum DbError {
    #[error("Database connection error: {0}")]
    ConnectionError(String),
    #[error("{0}")]
    QueryError(String),
    #[error("Database task failed: {0}")]
    TaskError(String),
}

/// The relational store the pipeline asks questions of.
#[async_trait]
pub trait Database: Send + Sync {
    /// Schema description for the SQL prompt, including a few sample rows per table.
    async fn describe_schema(&self) -> Result<String, DbError>;

    async fn execute(&self, sql: &str) -> Result<ResultSet, DbError>;

    /// SQL dialect named in the generation prompt.
    fn dialect(&self) -> &str;
}

pub struct DuckDb {
    pool: Pool<DuckDBConnectionManager>,
    sample_rows: usize,
}

impl DuckDb {
    pub fn connect(config: &DatabaseConfig) -> Result<Self, DbError> {
        info!(
            "Opening DuckDB database at {} (read_only={})",
            config.path, config.read_only
        );
        let manager = DuckDBConnectionManager::open(&config.path, config.read_only)
            .map_err(|e| DbError::ConnectionError(format!("{}: {}", config.path, e)))?;

        let pool = Pool::builder()
            .max_size(config.pool_size.max(1) as u32)
            .build(manager)
            .map_err(|e| DbError::ConnectionError(e.to_string()))?;

        Ok(Self {
            pool,
            sample_rows: config.sample_rows,
        })
    }

    async fn with_connection<T, F>(&self, task: F) -> Result<T, DbError>
    where
        T: Send + 'static,
        F: FnOnce(&duckdb::Connection) -> duckdb::Result<T> + Send + 'static,
    {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let conn = pool
                .get()
                .map_err(|e| DbError::ConnectionError(e.to_string()))?;
            task(&conn).map_err(|e| DbError::QueryError(e.to_string()))
        })
        .await
        .map_err(|e| DbError::TaskError(e.to_string()))?
    }
}

#[async_trait]
impl Database for DuckDb {
    async fn describe_schema(&self) -> Result<String, DbError> {
        let sample_rows = self.sample_rows;
        self.with_connection(move |conn| schema::describe(conn, sample_rows))
            .await
    }

    async fn execute(&self, sql: &str) -> Result<ResultSet, DbError> {
        debug!("Executing SQL: {}", sql);
        let sql = sql.to_string();
        self.with_connection(move |conn| result::query_rows(conn, &sql))
            .await
    }

    fn dialect(&self) -> &str {
        "DuckDB"
    }
}
