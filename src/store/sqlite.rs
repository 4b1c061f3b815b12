use super::PollStore;
use crate::error::{StoreError, StoreResult};
use crate::types::{Poll, PollStatus, Vote};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// (id, question, options json, duration_secs, start_time ms, status, created_at ms)
type PollRow = (String, String, String, i64, Option<i64>, String, i64);

/// (poll_id, voter_name, option_index, cast_at ms)
type VoteRow = (String, String, i64, i64);

const POLL_COLUMNS: &str =
    "id, question, options, duration_secs, start_time, status, created_at";

/// SQLite-backed store. Vote uniqueness is enforced by the
/// `UNIQUE (poll_id, voter_name)` constraint in the schema.
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Connection acquire timeout
    const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(5);

    /// Open (creating if needed) the database at `path` and run migrations.
    /// `:memory:` gives a private in-memory database held on a single connection.
    pub async fn open(path: &str) -> StoreResult<Self> {
        let pool = if path == ":memory:" {
            let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);

            // The database lives only as long as its connection, so never recycle it
            SqlitePoolOptions::new()
                .max_connections(1)
                .min_connections(1)
                .acquire_timeout(Self::ACQUIRE_TIMEOUT)
                .idle_timeout(Option::<Duration>::None)
                .max_lifetime(Option::<Duration>::None)
                .connect_with(options)
                .await?
        } else {
            if let Some(parent) = Path::new(path).parent() {
                if !parent.as_os_str().is_empty() {
                    if let Err(e) = std::fs::create_dir_all(parent) {
                        tracing::warn!(path = %parent.display(), error = %e, "Failed to create database directory");
                    }
                }
            }

            let options = SqliteConnectOptions::new()
                .filename(path)
                .create_if_missing(true)
                .journal_mode(SqliteJournalMode::Wal)
                .foreign_keys(true);

            SqlitePoolOptions::new()
                .max_connections(5)
                .acquire_timeout(Self::ACQUIRE_TIMEOUT)
                .connect_with(options)
                .await?
        };

        sqlx::migrate!("./migrations").run(&pool).await?;
        tracing::info!(path = %path, "Poll database ready");

        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

fn to_millis(ts: DateTime<Utc>) -> i64 {
    ts.timestamp_millis()
}

fn from_millis(ms: i64) -> StoreResult<DateTime<Utc>> {
    DateTime::from_timestamp_millis(ms)
        .ok_or_else(|| StoreError::Corrupt(format!("timestamp out of range: {}", ms)))
}

fn poll_from_row(row: PollRow) -> StoreResult<Poll> {
    let (id, question, options, duration_secs, start_time, status, created_at) = row;

    let options: Vec<String> = serde_json::from_str(&options)
        .map_err(|e| StoreError::Corrupt(format!("poll {} options: {}", id, e)))?;
    let status = PollStatus::parse(&status)
        .ok_or_else(|| StoreError::Corrupt(format!("poll {} status: {}", id, status)))?;
    let duration_secs = u32::try_from(duration_secs)
        .map_err(|_| StoreError::Corrupt(format!("poll {} duration: {}", id, duration_secs)))?;

    Ok(Poll {
        id,
        question,
        options,
        duration_secs,
        start_time: start_time.map(from_millis).transpose()?,
        status,
        created_at: from_millis(created_at)?,
    })
}

fn vote_from_row(row: VoteRow) -> StoreResult<Vote> {
    let (poll_id, voter_name, option_index, cast_at) = row;
    let option_index = usize::try_from(option_index)
        .map_err(|_| StoreError::Corrupt(format!("vote option index: {}", option_index)))?;

    Ok(Vote {
        poll_id,
        voter_name,
        option_index,
        cast_at: from_millis(cast_at)?,
    })
}

#[async_trait]
impl PollStore for SqliteStore {
    async fn insert_poll(&self, poll: &Poll) -> StoreResult<()> {
        let options = serde_json::to_string(&poll.options)
            .map_err(|e| StoreError::Corrupt(format!("poll {} options: {}", poll.id, e)))?;

        sqlx::query(
            r#"
            INSERT INTO polls (id, question, options, duration_secs, start_time, status, is_active, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&poll.id)
        .bind(&poll.question)
        .bind(options)
        .bind(i64::from(poll.duration_secs))
        .bind(poll.start_time.map(to_millis))
        .bind(poll.status.as_str())
        .bind(poll.is_active())
        .bind(to_millis(poll.created_at))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_poll(&self, id: &str) -> StoreResult<Option<Poll>> {
        let query = format!("SELECT {} FROM polls WHERE id = ?", POLL_COLUMNS);
        let row = sqlx::query_as::<_, PollRow>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(poll_from_row).transpose()
    }

    async fn update_poll(&self, poll: &Poll) -> StoreResult<bool> {
        let result = sqlx::query(
            "UPDATE polls SET status = ?, is_active = ?, start_time = ? WHERE id = ?",
        )
        .bind(poll.status.as_str())
        .bind(poll.is_active())
        .bind(poll.start_time.map(to_millis))
        .bind(&poll.id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete_poll(&self, id: &str) -> StoreResult<bool> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM votes WHERE poll_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        let result = sqlx::query("DELETE FROM polls WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(result.rows_affected() > 0)
    }

    async fn polls_with_status(&self, status: PollStatus) -> StoreResult<Vec<Poll>> {
        let query = format!(
            "SELECT {} FROM polls WHERE status = ? ORDER BY seq ASC",
            POLL_COLUMNS
        );
        let rows = sqlx::query_as::<_, PollRow>(&query)
            .bind(status.as_str())
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(poll_from_row).collect()
    }

    async fn all_polls(&self) -> StoreResult<Vec<Poll>> {
        let query = format!("SELECT {} FROM polls ORDER BY seq ASC", POLL_COLUMNS);
        let rows = sqlx::query_as::<_, PollRow>(&query)
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(poll_from_row).collect()
    }

    async fn insert_vote(&self, vote: &Vote) -> StoreResult<()> {
        let option_index = i64::try_from(vote.option_index)
            .map_err(|_| StoreError::Corrupt(format!("vote option index: {}", vote.option_index)))?;

        sqlx::query(
            r#"
            INSERT INTO votes (poll_id, voter_name, option_index, cast_at)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(&vote.poll_id)
        .bind(&vote.voter_name)
        .bind(option_index)
        .bind(to_millis(vote.cast_at))
        .execute(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
                StoreError::DuplicateVote {
                    poll_id: vote.poll_id.clone(),
                    voter: vote.voter_name.clone(),
                }
            }
            other => StoreError::from(other),
        })?;

        Ok(())
    }

    async fn votes_for_poll(&self, poll_id: &str) -> StoreResult<Vec<Vote>> {
        let rows = sqlx::query_as::<_, VoteRow>(
            "SELECT poll_id, voter_name, option_index, cast_at FROM votes WHERE poll_id = ? ORDER BY rowid ASC",
        )
        .bind(poll_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(vote_from_row).collect()
    }

    async fn find_vote(&self, poll_id: &str, voter_name: &str) -> StoreResult<Option<Vote>> {
        let row = sqlx::query_as::<_, VoteRow>(
            "SELECT poll_id, voter_name, option_index, cast_at FROM votes WHERE poll_id = ? AND voter_name = ?",
        )
        .bind(poll_id)
        .bind(voter_name)
        .fetch_optional(&self.pool)
        .await?;

        row.map(vote_from_row).transpose()
    }
}
