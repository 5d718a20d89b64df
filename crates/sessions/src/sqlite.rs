use std::path::Path;

use {
    anyhow::Result,
    async_trait::async_trait,
    serde::{Serialize, de::DeserializeOwned},
    sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions},
    ustoz_common::{QuestionId, RequesterId, RequesterProfile, ResponderId},
};

use crate::{
    key::{Family, StoreKey},
    model::{Question, RateGate, RequesterSession, ResponderClaim},
    store::{RateStamp, RelayStore},
};

/// SQLite-backed store. Every record is one JSON row in `entries`, keyed by
/// [`StoreKey`]; `stamped_at` mirrors the record's own timestamp so expiry can
/// be a single conditional delete.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Open (or create) a database file and make sure the schema exists.
    pub async fn connect(path: &Path) -> Result<Self> {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new().connect_with(options).await?;
        Self::init(&pool).await?;
        tracing::debug!(path = %path.display(), "sqlite store ready");
        Ok(Self::new(pool))
    }

    /// Private in-memory database, mostly for tests.
    pub async fn in_memory() -> Result<Self> {
        // Each connection to `sqlite::memory:` is its own database.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;
        Self::init(&pool).await?;
        Ok(Self::new(pool))
    }

    /// Create the `entries` and `counters` tables if they don't exist.
    pub async fn init(pool: &SqlitePool) -> Result<()> {
        sqlx::query(
            r#"CREATE TABLE IF NOT EXISTS entries (
                key        TEXT PRIMARY KEY,
                family     TEXT NOT NULL,
                value      TEXT NOT NULL,
                stamped_at INTEGER NOT NULL
            )"#,
        )
        .execute(pool)
        .await?;
        sqlx::query("CREATE INDEX IF NOT EXISTS entries_family ON entries(family)")
            .execute(pool)
            .await?;
        sqlx::query(
            r#"CREATE TABLE IF NOT EXISTS counters (
                name  TEXT PRIMARY KEY,
                value INTEGER NOT NULL
            )"#,
        )
        .execute(pool)
        .await?;
        Ok(())
    }

    // ── generic row helpers ─────────────────────────────────────────

    async fn put<T: Serialize + Sync>(
        &self,
        key: StoreKey,
        family: Family,
        stamped_at: u64,
        value: &T,
    ) -> Result<()> {
        let json = serde_json::to_string(value)?;
        sqlx::query(
            r#"INSERT INTO entries (key, family, value, stamped_at)
               VALUES (?, ?, ?, ?)
               ON CONFLICT(key) DO UPDATE SET
                 value = excluded.value,
                 stamped_at = excluded.stamped_at"#,
        )
        .bind(key.as_str())
        .bind(family.as_str())
        .bind(json)
        .bind(to_sql(stamped_at))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get<T: DeserializeOwned>(&self, key: StoreKey) -> Result<Option<T>> {
        let row: Option<(String,)> = sqlx::query_as("SELECT value FROM entries WHERE key = ?")
            .bind(key.as_str())
            .fetch_optional(&self.pool)
            .await?;
        row.map(|(json,)| serde_json::from_str(&json))
            .transpose()
            .map_err(Into::into)
    }

    async fn take<T: DeserializeOwned>(&self, key: StoreKey) -> Result<Option<T>> {
        let row: Option<(String,)> =
            sqlx::query_as("DELETE FROM entries WHERE key = ? RETURNING value")
                .bind(key.as_str())
                .fetch_optional(&self.pool)
                .await?;
        row.map(|(json,)| serde_json::from_str(&json))
            .transpose()
            .map_err(Into::into)
    }

    async fn remove(&self, key: StoreKey) -> Result<bool> {
        let done = sqlx::query("DELETE FROM entries WHERE key = ?")
            .bind(key.as_str())
            .execute(&self.pool)
            .await?;
        Ok(done.rows_affected() > 0)
    }

    async fn expire(&self, key: StoreKey, cutoff: u64) -> Result<bool> {
        let done = sqlx::query("DELETE FROM entries WHERE key = ? AND stamped_at < ?")
            .bind(key.as_str())
            .bind(to_sql(cutoff))
            .execute(&self.pool)
            .await?;
        Ok(done.rows_affected() > 0)
    }

    async fn list<T: DeserializeOwned>(&self, family: Family) -> Result<Vec<T>> {
        let rows: Vec<(String,)> =
            sqlx::query_as("SELECT value FROM entries WHERE family = ? ORDER BY stamped_at ASC")
                .bind(family.as_str())
                .fetch_all(&self.pool)
                .await?;
        let mut out = Vec::with_capacity(rows.len());
        for (json,) in rows {
            match serde_json::from_str(&json) {
                Ok(value) => out.push(value),
                Err(e) => {
                    tracing::warn!(family = family.as_str(), error = %e, "skipping unreadable row");
                },
            }
        }
        Ok(out)
    }

    async fn patch(&self, key: StoreKey, path: &str, json_value: &str) -> Result<bool> {
        let done = sqlx::query("UPDATE entries SET value = json_set(value, ?, json(?)) WHERE key = ?")
            .bind(path)
            .bind(json_value)
            .bind(key.as_str())
            .execute(&self.pool)
            .await?;
        Ok(done.rows_affected() > 0)
    }
}

#[async_trait]
impl RelayStore for SqliteStore {
    async fn next_question_id(&self) -> Result<QuestionId> {
        let (value,): (i64,) = sqlx::query_as(
            r#"INSERT INTO counters (name, value) VALUES ('question', 1)
               ON CONFLICT(name) DO UPDATE SET value = counters.value + 1
               RETURNING value"#,
        )
        .fetch_one(&self.pool)
        .await?;
        Ok(QuestionId(u64::try_from(value)?))
    }

    async fn put_question(&self, question: &Question) -> Result<()> {
        self.put(
            StoreKey::question(question.id),
            Family::Question,
            question.created_at,
            question,
        )
        .await
    }

    async fn get_question(&self, id: QuestionId) -> Result<Option<Question>> {
        self.get(StoreKey::question(id)).await
    }

    async fn mark_answered(&self, id: QuestionId) -> Result<bool> {
        self.patch(StoreKey::question(id), "$.answered", "true").await
    }

    async fn note_claim(&self, id: QuestionId, responder: ResponderId) -> Result<bool> {
        self.patch(
            StoreKey::question(id),
            "$.claimed_by",
            &responder.0.to_string(),
        )
        .await
    }

    async fn remove_question(&self, id: QuestionId) -> Result<bool> {
        self.remove(StoreKey::question(id)).await
    }

    async fn expire_question(&self, id: QuestionId, cutoff: u64) -> Result<bool> {
        self.expire(StoreKey::question(id), cutoff).await
    }

    async fn list_questions(&self) -> Result<Vec<Question>> {
        self.list(Family::Question).await
    }

    async fn put_session(&self, session: &RequesterSession) -> Result<()> {
        self.put(
            StoreKey::session(session.requester_id),
            Family::Session,
            session.entered_at,
            session,
        )
        .await
    }

    async fn get_session(&self, id: RequesterId) -> Result<Option<RequesterSession>> {
        self.get(StoreKey::session(id)).await
    }

    async fn take_session(&self, id: RequesterId) -> Result<Option<RequesterSession>> {
        self.take(StoreKey::session(id)).await
    }

    async fn expire_session(&self, id: RequesterId, cutoff: u64) -> Result<bool> {
        self.expire(StoreKey::session(id), cutoff).await
    }

    async fn list_sessions(&self) -> Result<Vec<RequesterSession>> {
        self.list(Family::Session).await
    }

    async fn put_claim(&self, claim: &ResponderClaim) -> Result<()> {
        self.put(
            StoreKey::claim(claim.responder_id),
            Family::Claim,
            claim.claimed_at,
            claim,
        )
        .await
    }

    async fn get_claim(&self, id: ResponderId) -> Result<Option<ResponderClaim>> {
        self.get(StoreKey::claim(id)).await
    }

    async fn take_claim(
        &self,
        id: ResponderId,
        expected: Option<QuestionId>,
    ) -> Result<Option<ResponderClaim>> {
        let Some(question) = expected else {
            return self.take(StoreKey::claim(id)).await;
        };
        let row: Option<(String,)> = sqlx::query_as(
            r#"DELETE FROM entries
               WHERE key = ? AND json_extract(value, '$.question_id') = ?
               RETURNING value"#,
        )
        .bind(StoreKey::claim(id).as_str())
        .bind(to_sql(question.0))
        .fetch_optional(&self.pool)
        .await?;
        row.map(|(json,)| serde_json::from_str(&json))
            .transpose()
            .map_err(Into::into)
    }

    async fn expire_claim(&self, id: ResponderId, cutoff: u64) -> Result<bool> {
        self.expire(StoreKey::claim(id), cutoff).await
    }

    async fn list_claims(&self) -> Result<Vec<ResponderClaim>> {
        self.list(Family::Claim).await
    }

    async fn get_rate_gate(&self, id: RequesterId) -> Result<Option<RateGate>> {
        self.get(StoreKey::rate_gate(id)).await
    }

    async fn try_stamp_rate_gate(
        &self,
        id: RequesterId,
        now: u64,
        window_ms: u64,
    ) -> Result<RateStamp> {
        let key = StoreKey::rate_gate(id);
        let gate = RateGate {
            requester_id: id,
            last_sent_at: now,
        };
        // The conditional upsert is the whole check-and-stamp.
        let done = sqlx::query(
            r#"INSERT INTO entries (key, family, value, stamped_at)
               VALUES (?, ?, ?, ?)
               ON CONFLICT(key) DO UPDATE SET
                 value = excluded.value,
                 stamped_at = excluded.stamped_at
               WHERE entries.stamped_at <= ?"#,
        )
        .bind(key.as_str())
        .bind(Family::RateGate.as_str())
        .bind(serde_json::to_string(&gate)?)
        .bind(to_sql(now))
        .bind(to_sql(now.saturating_sub(window_ms)))
        .execute(&self.pool)
        .await?;
        if done.rows_affected() > 0 {
            return Ok(RateStamp::Stamped);
        }
        let last_sent_at = self
            .get::<RateGate>(key)
            .await?
            .map_or(now, |g| g.last_sent_at);
        Ok(RateStamp::Blocked { last_sent_at })
    }

    async fn expire_rate_gate(&self, id: RequesterId, cutoff: u64) -> Result<bool> {
        self.expire(StoreKey::rate_gate(id), cutoff).await
    }

    async fn list_rate_gates(&self) -> Result<Vec<RateGate>> {
        self.list(Family::RateGate).await
    }

    async fn put_profile(&self, profile: &RequesterProfile) -> Result<()> {
        self.put(
            StoreKey::requester(profile.id),
            Family::Requester,
            profile.last_active_at,
            profile,
        )
        .await
    }

    async fn list_profiles(&self) -> Result<Vec<RequesterProfile>> {
        self.list(Family::Requester).await
    }

    async fn mute(&self, id: RequesterId) -> Result<bool> {
        let done = sqlx::query(
            r#"INSERT INTO entries (key, family, value, stamped_at)
               VALUES (?, ?, ?, 0)
               ON CONFLICT(key) DO NOTHING"#,
        )
        .bind(StoreKey::muted(id).as_str())
        .bind(Family::Muted.as_str())
        .bind(id.0.to_string())
        .execute(&self.pool)
        .await?;
        Ok(done.rows_affected() > 0)
    }

    async fn is_muted(&self, id: RequesterId) -> Result<bool> {
        let row: Option<(i64,)> = sqlx::query_as("SELECT 1 FROM entries WHERE key = ?")
            .bind(StoreKey::muted(id).as_str())
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.is_some())
    }
}

/// SQLite integers are signed; clamp rather than wrap.
fn to_sql(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}
