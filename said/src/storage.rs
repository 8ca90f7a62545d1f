use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::SqlitePool;
use tracing::{debug, info};

/// Remembers which quotes were already posted.
#[async_trait]
pub trait DedupFilter: Send + Sync {
    /// The candidates, in order, that were never recorded.
    async fn exclude(&self, candidates: Vec<String>) -> Result<Vec<String>>;

    /// Marks quotes as used.
    async fn record(&self, quotes: &[String]) -> Result<()>;
}

/// SQLite-backed store of posted quotes.
pub struct UsedQuotes {
    pool: SqlitePool,
}

impl UsedQuotes {
    /// Opens (creating if needed) the store at `path`.
    pub async fn open(path: &str) -> Result<Self> {
        let pool = common::init_db_pool(path).await?;
        Self::from_pool(pool).await
    }

    pub async fn from_pool(pool: SqlitePool) -> Result<Self> {
        ensure_schema(&pool).await?;
        Ok(Self { pool })
    }

    pub async fn contains(&self, quote: &str) -> Result<bool> {
        let found = sqlx::query_scalar::<_, i64>("SELECT 1 FROM used_quotes WHERE quote = ?")
            .bind(quote)
            .fetch_optional(&self.pool)
            .await
            .context("failed to look up used quote")?;
        Ok(found.is_some())
    }

    pub async fn count(&self) -> Result<i64> {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM used_quotes")
            .fetch_one(&self.pool)
            .await
            .context("failed to count used quotes")
    }

    pub async fn close(self) {
        self.pool.close().await;
    }
}

async fn ensure_schema(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS used_quotes (
            quote TEXT PRIMARY KEY,
            used_at TEXT NOT NULL
        );
        "#,
    )
    .execute(pool)
    .await
    .context("failed to create used_quotes table")?;
    Ok(())
}

#[async_trait]
impl DedupFilter for UsedQuotes {
    async fn exclude(&self, candidates: Vec<String>) -> Result<Vec<String>> {
        let total = candidates.len();
        let mut fresh = Vec::with_capacity(total);
        for candidate in candidates {
            if !self.contains(&candidate).await? {
                fresh.push(candidate);
            }
        }
        debug!("used quotes: {} of {} candidates are new", fresh.len(), total);
        Ok(fresh)
    }

    async fn record(&self, quotes: &[String]) -> Result<()> {
        let mut tx = self.pool.begin().await.context("failed to start transaction")?;
        for quote in quotes {
            sqlx::query("INSERT OR IGNORE INTO used_quotes (quote, used_at) VALUES (?, ?)")
                .bind(quote)
                .bind(Utc::now())
                .execute(&mut tx)
                .await
                .with_context(|| format!("failed to record quote: {}", quote))?;
        }
        tx.commit().await.context("failed to commit used quotes")?;
        info!("Recorded {} used quotes", quotes.len());
        Ok(())
    }
}
