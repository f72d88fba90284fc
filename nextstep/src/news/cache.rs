use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use sqlx::SqlitePool;
use std::sync::Arc;
use tracing::{info, warn};

use super::{most_recent, CategoryFilter, FeedSource, NewsItem};

/// The single cached copy of the news list
#[derive(Debug, Clone, PartialEq)]
pub struct CacheRecord {
    pub news_data: Vec<NewsItem>,
    pub updated_at: DateTime<Utc>,
}

impl CacheRecord {
    pub fn is_fresh(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        now - self.updated_at < ttl
    }
}

/// The stored row exists but cannot be turned back into a [`CacheRecord`].
///
/// Returned inside the `anyhow::Error` from [`CacheStore::read`] so the gateway can tell
/// a bad row (rewrite it) from an unavailable store (bypass it).
#[derive(Debug, thiserror::Error)]
#[error("cached news row is unreadable: {reason}")]
pub struct CorruptCacheRow {
    pub reason: String,
}

/// Persistence for the singleton cache record. Last write wins.
#[async_trait::async_trait]
pub trait CacheStore: Send + Sync {
    async fn read(&self) -> Result<Option<CacheRecord>>;
    async fn write(&self, record: &CacheRecord) -> Result<()>;
}

/// `news_cache` table, one row with id 1
#[derive(Clone)]
pub struct SqliteNewsCache {
    pool: SqlitePool,
}

impl SqliteNewsCache {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl CacheStore for SqliteNewsCache {
    async fn read(&self) -> Result<Option<CacheRecord>> {
        let row = sqlx::query_as::<_, CacheRow>(
            "SELECT news_data, updated_at FROM news_cache WHERE id = 1",
        )
        .fetch_optional(&self.pool)
        .await
        .context("Failed to read news cache")?;

        let Some(row) = row else {
            return Ok(None);
        };

        let news_data: Vec<NewsItem> = serde_json::from_str(&row.news_data).map_err(|e| CorruptCacheRow {
            reason: format!("news_data: {}", e),
        })?;
        let updated_at = DateTime::parse_from_rfc3339(&row.updated_at)
            .map_err(|e| CorruptCacheRow {
                reason: format!("updated_at {:?}: {}", row.updated_at, e),
            })?
            .with_timezone(&Utc);

        Ok(Some(CacheRecord {
            news_data,
            updated_at,
        }))
    }

    async fn write(&self, record: &CacheRecord) -> Result<()> {
        let news_json =
            serde_json::to_string(&record.news_data).context("failed to serialize news")?;

        sqlx::query(
            r#"
            INSERT INTO news_cache (id, news_data, updated_at)
            VALUES (1, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                news_data = excluded.news_data,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&news_json)
        .bind(record.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .context("Failed to upsert news cache")?;

        Ok(())
    }
}

#[derive(sqlx::FromRow)]
struct CacheRow {
    news_data: String,
    updated_at: String,
}

/// Serves news from the cache while it is fresh and refreshes it from the feed otherwise.
///
/// Two callers that both see a stale record will both fetch and both write; the later
/// write wins. Nothing here locks against that.
#[derive(Clone)]
pub struct NewsGateway {
    cache: Arc<dyn CacheStore>,
    source: Arc<dyn FeedSource>,
    ttl: Duration,
    max_items: usize,
}

impl NewsGateway {
    pub fn new(cache: Arc<dyn CacheStore>, source: Arc<dyn FeedSource>) -> Self {
        Self {
            cache,
            source,
            ttl: Duration::hours(24),
            max_items: 20,
        }
    }

    pub fn with_limits(mut self, ttl: Duration, max_items: usize) -> Self {
        self.ttl = ttl;
        self.max_items = max_items;
        self
    }

    /// News for `filter` as of `now`.
    ///
    /// If the cached path fails, one direct fetch is attempted and its items are
    /// returned without category filtering and without touching the cache.
    pub async fn news(&self, filter: CategoryFilter, now: DateTime<Utc>) -> Result<Vec<NewsItem>> {
        match self.cached_or_refreshed(now).await {
            Ok(items) => Ok(filter.apply(items)),
            Err(e) => {
                warn!(error = %e, "news: cache path failed, falling back to direct fetch");
                let items = self
                    .source
                    .fetch()
                    .await
                    .context("direct news fetch failed")?;
                Ok(most_recent(items, self.max_items))
            }
        }
    }

    /// Fetch the feed and overwrite the cache regardless of its age.
    pub async fn refresh(&self, now: DateTime<Utc>) -> Result<Vec<NewsItem>> {
        let items = most_recent(self.source.fetch().await?, self.max_items);
        let record = CacheRecord {
            news_data: items,
            updated_at: now,
        };
        self.cache.write(&record).await?;
        info!(items = record.news_data.len(), "news: cache refreshed");
        Ok(record.news_data)
    }

    /// Age of the cached record, if any.
    pub async fn cache_age(&self, now: DateTime<Utc>) -> Result<Option<Duration>> {
        Ok(self.cache.read().await?.map(|r| now - r.updated_at))
    }

    async fn cached_or_refreshed(&self, now: DateTime<Utc>) -> Result<Vec<NewsItem>> {
        let cached = match self.cache.read().await {
            Ok(record) => record,
            // Treated as stale; the refresh below overwrites the row
            Err(e) if e.is::<CorruptCacheRow>() => {
                warn!(error = %e, "news: discarding unreadable cache row");
                None
            }
            Err(e) => return Err(e),
        };

        if let Some(record) = cached {
            if record.is_fresh(now, self.ttl) {
                info!(items = record.news_data.len(), "news: serving cached news");
                return Ok(record.news_data);
            }
            info!(updated_at = %record.updated_at, "news: cache is stale");
        }
        self.refresh(now).await
    }
}
