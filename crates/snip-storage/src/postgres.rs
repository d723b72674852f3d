use crate::error::{map_sqlx_error, Result, StorageError};
use async_trait::async_trait;
use snip_core::{BatchRequest, BatchResponse, ShortToken, Storage, UserUrl};
use sqlx::postgres::PgPoolOptions;
use sqlx::{Connection, Executor, PgPool, Row, Statement};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, trace, warn};
use typed_builder::TypedBuilder;
use uuid::Uuid;

/// Schema applied by [`PostgresStorage::migrate`].
pub const SCHEMA: &str = include_str!("../ddl/postgres/urls.sql");

const INSERT_URL: &str = r#"
    INSERT INTO urls (id, owner_id, short_token, original_url)
    VALUES ($1, $2, $3, $4)
    ON CONFLICT (original_url) DO UPDATE
    SET owner_id = EXCLUDED.owner_id,
        deleted = FALSE
    RETURNING id
"#;

/// Connection settings for [`PostgresStorage::connect`].
#[derive(Debug, Clone, TypedBuilder)]
pub struct PostgresOptions {
    #[builder(setter(into))]
    database_url: String,
    #[builder(setter(into))]
    base_url: String,
    #[builder(default = 5)]
    max_connections: u32,
    /// Upper bound for every database call, including pool acquisition.
    #[builder(default = Duration::from_secs(10))]
    timeout: Duration,
}

/// PostgreSQL implementation of the storage contract.
///
/// `original_url` is unique. Writing a URL that already exists moves the row
/// to the new owner and reports [`StorageError::Duplicate`] with the short URL
/// issued the first time. Soft delete is implemented with the `deleted`
/// column; rows are never physically removed.
///
/// Every call is bounded by the configured timeout. When it elapses the
/// in-flight future is dropped, which rolls back any open transaction, and
/// the caller receives [`StorageError::Timeout`].
#[derive(Debug, Clone)]
pub struct PostgresStorage {
    pool: PgPool,
    base_url: String,
    timeout: Duration,
}

impl PostgresStorage {
    /// Creates a storage from an existing connection pool.
    pub fn new(pool: PgPool, base_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            pool,
            base_url: base_url.into(),
            timeout,
        }
    }

    /// Creates a storage by opening a new connection pool.
    pub async fn connect(options: PostgresOptions) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(options.max_connections)
            .acquire_timeout(options.timeout)
            .connect(&options.database_url)
            .await
            .map_err(map_sqlx_error)?;

        debug!(max_connections = options.max_connections, "connected to postgres");
        Ok(Self::new(pool, options.base_url, options.timeout))
    }

    /// Creates the `urls` table and its indexes if they do not exist yet.
    pub async fn migrate(&self) -> Result<()> {
        self.bounded("migrate", async {
            sqlx::raw_sql(SCHEMA)
                .execute(&self.pool)
                .await
                .map_err(map_sqlx_error)?;
            Ok(())
        })
        .await
    }

    /// Returns a reference to the underlying pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn bounded<T, F>(&self, operation: &'static str, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>> + Send,
    {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(StorageError::Timeout(format!(
                "{operation} did not finish within {:?}",
                self.timeout
            ))),
        }
    }
}

#[async_trait]
impl Storage for PostgresStorage {
    async fn write(&self, original_url: &str, owner: &str) -> Result<String> {
        if original_url.is_empty() {
            return Err(StorageError::EmptyInput);
        }

        let token = ShortToken::from_url(original_url);
        let id = Uuid::new_v4();

        let stored_id: Uuid = self
            .bounded("write", async {
                sqlx::query_scalar(INSERT_URL)
                    .bind(id)
                    .bind(owner)
                    .bind(token.as_str())
                    .bind(original_url)
                    .fetch_one(&self.pool)
                    .await
                    .map_err(map_sqlx_error)
            })
            .await?;

        let short_url = token.to_url(&self.base_url);
        if stored_id != id {
            debug!(token = %token, owner, "url already shortened");
            return Err(StorageError::Duplicate(short_url));
        }

        trace!(token = %token, owner, "inserted url");
        Ok(short_url)
    }

    async fn read(&self, token: &ShortToken) -> Result<String> {
        let row: Option<(String, bool)> = self
            .bounded("read", async {
                sqlx::query_as(
                    r#"
                    SELECT original_url, deleted
                    FROM urls
                    WHERE short_token = $1
                    LIMIT 1
                    "#,
                )
                .bind(token.as_str())
                .fetch_optional(&self.pool)
                .await
                .map_err(map_sqlx_error)
            })
            .await?;

        match row {
            None => Err(StorageError::NotFound(token.to_string())),
            Some((_, true)) => Err(StorageError::Gone(token.to_string())),
            Some((original_url, false)) => Ok(original_url),
        }
    }

    async fn read_all(&self, owner: &str) -> Result<Vec<UserUrl>> {
        let rows = self
            .bounded("read_all", async {
                sqlx::query(
                    r#"
                    SELECT short_token, original_url
                    FROM urls
                    WHERE owner_id = $1
                      AND deleted = FALSE
                    "#,
                )
                .bind(owner)
                .fetch_all(&self.pool)
                .await
                .map_err(map_sqlx_error)
            })
            .await?;

        // A row that does not decode aborts the whole listing.
        let urls = rows
            .iter()
            .map(|row| -> Result<UserUrl> {
                let short_token: String = row.try_get("short_token").map_err(map_sqlx_error)?;
                let original_url: String = row.try_get("original_url").map_err(map_sqlx_error)?;
                Ok(UserUrl {
                    short_url: ShortToken::new_unchecked(short_token).to_url(&self.base_url),
                    original_url,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        if urls.is_empty() {
            return Err(StorageError::NotFound(format!("no urls for owner {owner}")));
        }

        Ok(urls)
    }

    async fn batch(&self, entries: Vec<BatchRequest>, owner: &str) -> Result<Vec<BatchResponse>> {
        if entries.is_empty() || entries.iter().any(|e| e.original_url.is_empty()) {
            return Err(StorageError::EmptyInput);
        }

        self.bounded("batch", async {
            let mut tx = self.pool.begin().await.map_err(map_sqlx_error)?;
            let statement = (&mut *tx)
                .prepare(INSERT_URL)
                .await
                .map_err(map_sqlx_error)?;

            let mut responses = Vec::with_capacity(entries.len());
            for entry in &entries {
                let token = ShortToken::from_url(&entry.original_url);

                // Dropping `tx` on error rolls the whole batch back.
                statement
                    .query()
                    .bind(Uuid::new_v4())
                    .bind(owner)
                    .bind(token.as_str())
                    .bind(entry.original_url.as_str())
                    .fetch_one(&mut *tx)
                    .await
                    .map_err(map_sqlx_error)?;

                responses.push(BatchResponse {
                    correlation_id: entry.correlation_id.clone(),
                    short_url: token.to_url(&self.base_url),
                });
            }

            tx.commit().await.map_err(map_sqlx_error)?;

            debug!(owner, count = responses.len(), "inserted batch");
            Ok(responses)
        })
        .await
        .inspect_err(|err| warn!(owner, error = %err, "batch rolled back"))
    }

    async fn delete(&self, owner: &str, tokens: &[ShortToken]) -> Result<()> {
        if tokens.is_empty() {
            return Ok(());
        }

        self.bounded("delete", async {
            let mut tx = self.pool.begin().await.map_err(map_sqlx_error)?;
            let mut deleted = 0u64;

            for token in tokens {
                let result = sqlx::query(
                    r#"
                    UPDATE urls
                    SET deleted = TRUE
                    WHERE owner_id = $1
                      AND short_token = $2
                    "#,
                )
                .bind(owner)
                .bind(token.as_str())
                .execute(&mut *tx)
                .await
                .map_err(map_sqlx_error)?;

                deleted += result.rows_affected();
            }

            tx.commit().await.map_err(map_sqlx_error)?;

            debug!(owner, requested = tokens.len(), deleted, "soft-deleted urls");
            Ok(())
        })
        .await
    }

    async fn health_check(&self) -> Result<()> {
        self.bounded("health_check", async {
            let mut conn = self.pool.acquire().await.map_err(map_sqlx_error)?;
            conn.ping()
                .await
                .map_err(|e| StorageError::Unavailable(e.to_string()))
        })
        .await
    }
}
