//! `PostgreSQL` implementation of [`TokenStore`].
//!
//! Identifiers and masses are `u64` in the domain and `BIGINT` in the
//! table; every conversion is checked and fails with
//! [`DbError::OutOfRange`] rather than wrapping.

use chrono::{DateTime, Utc};
use massbot_types::{Mass, Tier, TokenId, TokenRecord};
use sqlx::{PgPool, Postgres, Transaction};

use crate::error::DbError;
use crate::store::{AlphaUpdate, CountFilter, TokenStore};

/// Columns selected for a [`TokenRow`].
const ROW_COLUMNS: &str = "token_id, exists_on_chain, tier, mass, is_alpha, updated_at";

/// A row of the `tokens` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct TokenRow {
    /// Token identifier.
    pub token_id: i64,
    /// Whether the token exists on the ledger.
    pub exists_on_chain: bool,
    /// Token class.
    pub tier: i32,
    /// Token mass.
    pub mass: i64,
    /// Alpha flag.
    pub is_alpha: bool,
    /// Last write.
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<TokenRow> for TokenRecord {
    type Error = DbError;

    fn try_from(row: TokenRow) -> Result<Self, Self::Error> {
        let id = u64::try_from(row.token_id)
            .map_err(|e| DbError::OutOfRange(format!("token_id {}: {e}", row.token_id)))?;
        let tier = u32::try_from(row.tier)
            .map_err(|e| DbError::OutOfRange(format!("tier {} of token {id}: {e}", row.tier)))?;
        let mass = u64::try_from(row.mass)
            .map_err(|e| DbError::OutOfRange(format!("mass {} of token {id}: {e}", row.mass)))?;
        Ok(Self {
            id: TokenId(id),
            exists: row.exists_on_chain,
            tier: Tier(tier),
            mass: Mass(mass),
            is_alpha: row.is_alpha,
        })
    }
}

fn db_id(id: TokenId) -> Result<i64, DbError> {
    i64::try_from(id.get()).map_err(|e| DbError::OutOfRange(format!("token id {id}: {e}")))
}

fn db_tier(tier: Tier) -> Result<i32, DbError> {
    i32::try_from(tier.get()).map_err(|e| DbError::OutOfRange(format!("tier {tier}: {e}")))
}

fn db_mass(mass: Mass) -> Result<i64, DbError> {
    i64::try_from(mass.get()).map_err(|e| DbError::OutOfRange(format!("mass {mass}: {e}")))
}

/// Token mirror stored in the `tokens` table.
#[derive(Debug, Clone)]
pub struct PgTokenStore {
    pool: PgPool,
}

impl PgTokenStore {
    /// Create a store over a connection pool.
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Fetch and row-lock a record inside `tx`.
    async fn lock_row(
        tx: &mut Transaction<'_, Postgres>,
        id: i64,
    ) -> Result<Option<TokenRecord>, DbError> {
        let row = sqlx::query_as::<_, TokenRow>(&format!(
            "SELECT {ROW_COLUMNS} FROM tokens WHERE token_id = $1 FOR UPDATE"
        ))
        .bind(id)
        .fetch_optional(&mut **tx)
        .await?;
        row.map(TokenRecord::try_from).transpose()
    }
}

impl TokenStore for PgTokenStore {
    async fn get(&self, id: TokenId) -> Result<Option<TokenRecord>, DbError> {
        let row = sqlx::query_as::<_, TokenRow>(&format!(
            "SELECT {ROW_COLUMNS} FROM tokens WHERE token_id = $1"
        ))
        .bind(db_id(id)?)
        .fetch_optional(&self.pool)
        .await?;
        row.map(TokenRecord::try_from).transpose()
    }

    async fn upsert(&self, record: TokenRecord) -> Result<(), DbError> {
        sqlx::query(
            r"INSERT INTO tokens (token_id, exists_on_chain, tier, mass)
              VALUES ($1, $2, $3, $4)
              ON CONFLICT (token_id) DO UPDATE SET
                exists_on_chain = EXCLUDED.exists_on_chain,
                tier = EXCLUDED.tier,
                mass = EXCLUDED.mass,
                is_alpha = tokens.is_alpha AND EXCLUDED.exists_on_chain,
                updated_at = now()",
        )
        .bind(db_id(record.id)?)
        .bind(record.exists)
        .bind(db_tier(record.tier)?)
        .bind(db_mass(record.mass)?)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Upserts the batch with a single `UNNEST` insert in one transaction.
    ///
    /// Identifiers within one batch must be distinct.
    async fn upsert_batch(&self, records: &[TokenRecord]) -> Result<(), DbError> {
        if records.is_empty() {
            return Ok(());
        }

        let len = records.len();
        let mut ids = Vec::with_capacity(len);
        let mut exists = Vec::with_capacity(len);
        let mut tiers = Vec::with_capacity(len);
        let mut masses = Vec::with_capacity(len);
        for record in records {
            ids.push(db_id(record.id)?);
            exists.push(record.exists);
            tiers.push(db_tier(record.tier)?);
            masses.push(db_mass(record.mass)?);
        }

        let mut tx = self.pool.begin().await?;
        sqlx::query(
            r"INSERT INTO tokens (token_id, exists_on_chain, tier, mass)
              SELECT * FROM UNNEST($1::BIGINT[], $2::BOOLEAN[], $3::INTEGER[], $4::BIGINT[])
              ON CONFLICT (token_id) DO UPDATE SET
                exists_on_chain = EXCLUDED.exists_on_chain,
                tier = EXCLUDED.tier,
                mass = EXCLUDED.mass,
                is_alpha = tokens.is_alpha AND EXCLUDED.exists_on_chain,
                updated_at = now()",
        )
        .bind(&ids)
        .bind(&exists)
        .bind(&tiers)
        .bind(&masses)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;

        tracing::debug!(count = len, "Upserted token batch (UNNEST)");
        Ok(())
    }

    async fn retire(&self, id: TokenId) -> Result<Option<TokenRecord>, DbError> {
        let key = db_id(id)?;
        let mut tx = self.pool.begin().await?;
        let prior = Self::lock_row(&mut tx, key).await?;

        if prior.is_some_and(|p| p.exists) {
            sqlx::query(
                r"UPDATE tokens
                  SET exists_on_chain = FALSE, tier = $2, mass = 0, is_alpha = FALSE, updated_at = now()
                  WHERE token_id = $1",
            )
            .bind(key)
            .bind(db_tier(Tier::NEUTRAL)?)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(prior)
    }

    async fn set_mass(&self, id: TokenId, mass: Mass) -> Result<Option<TokenRecord>, DbError> {
        let key = db_id(id)?;
        let mut tx = self.pool.begin().await?;
        let prior = Self::lock_row(&mut tx, key).await?;

        if prior.is_some() {
            sqlx::query("UPDATE tokens SET mass = $2, updated_at = now() WHERE token_id = $1")
                .bind(key)
                .bind(db_mass(mass)?)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(prior)
    }

    async fn mark_alpha(&self, id: TokenId) -> Result<AlphaUpdate, DbError> {
        let key = db_id(id)?;
        let mut tx = self.pool.begin().await?;
        if Self::lock_row(&mut tx, key).await?.is_none() {
            tx.rollback().await?;
            return Ok(AlphaUpdate::default());
        }

        // Clear first: the partial unique index allows one flagged row.
        let cleared_ids: Vec<i64> = sqlx::query_scalar(
            r"UPDATE tokens SET is_alpha = FALSE, updated_at = now()
              WHERE is_alpha AND token_id <> $1
              RETURNING token_id",
        )
        .bind(key)
        .fetch_all(&mut *tx)
        .await?;

        sqlx::query("UPDATE tokens SET is_alpha = TRUE, updated_at = now() WHERE token_id = $1")
            .bind(key)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        let cleared = cleared_ids
            .into_iter()
            .map(|raw| {
                u64::try_from(raw)
                    .map(TokenId)
                    .map_err(|e| DbError::OutOfRange(format!("token_id {raw}: {e}")))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(AlphaUpdate {
            found: true,
            cleared,
        })
    }

    async fn count(&self, filter: CountFilter) -> Result<u64, DbError> {
        let tier = filter.tier.map(db_tier).transpose()?;
        let mass = filter.mass_above.map(db_mass).transpose()?;

        let count: i64 = sqlx::query_scalar(
            r"SELECT COUNT(*) FROM tokens
              WHERE ($1::BOOLEAN IS NULL OR exists_on_chain = $1)
                AND ($2::INTEGER IS NULL OR tier = $2)
                AND ($3::BIGINT IS NULL OR mass > $3)",
        )
        .bind(filter.exists)
        .bind(tier)
        .bind(mass)
        .fetch_one(&self.pool)
        .await?;

        u64::try_from(count).map_err(|e| DbError::OutOfRange(format!("row count {count}: {e}")))
    }
}
