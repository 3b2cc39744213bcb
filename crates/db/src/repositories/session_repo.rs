//! Repository for the `sessions` table.
//!
//! Transitions are written as guarded updates (`WHERE status_id = ...`) so a
//! row that already moved on is left alone; callers learn about it from the
//! returned flag.

use imperium_core::session::transition_sources;
use imperium_core::status::{SessionStatus, StatusId};
use imperium_core::types::{DbId, Timestamp};
use sqlx::{PgConnection, PgExecutor};

use crate::models::session::{CreateSession, Session, SessionDetail};

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str = "id, user_id, host_id, client_id, status_id, session_token, program_id, \
    webrtc_offer, webrtc_answer, expires_at, started_at, ended_at, end_reason, \
    created_at, updated_at";

/// Columns of [`SessionDetail`], selected from `sessions s` joined to `hosts h`
/// and `clients c`.
const DETAIL_COLUMNS: &str = "s.id, s.user_id, s.host_id, h.name AS host_name, \
    s.client_id, c.name AS client_name, s.status_id, s.session_token, s.program_id, \
    s.webrtc_offer, s.webrtc_answer, s.expires_at, s.created_at, s.started_at, \
    s.ended_at, s.end_reason";

const DETAIL_FROM: &str = "sessions s \
    JOIN hosts h ON h.id = s.host_id \
    JOIN clients c ON c.id = s.client_id";

/// Provides persistence for remote-control sessions.
pub struct SessionRepo;

impl SessionRepo {
    /// Insert a new PENDING session, returning the created row.
    pub async fn create<'e>(
        executor: impl PgExecutor<'e>,
        input: &CreateSession,
    ) -> Result<Session, sqlx::Error> {
        let query = format!(
            "INSERT INTO sessions
                (user_id, host_id, client_id, status_id, session_token, program_id,
                 expires_at, created_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Session>(&query)
            .bind(input.user_id)
            .bind(input.host_id)
            .bind(input.client_id)
            .bind(SessionStatus::Pending.id())
            .bind(&input.session_token)
            .bind(&input.program_id)
            .bind(input.expires_at)
            .bind(input.created_at)
            .fetch_one(executor)
            .await
    }

    /// Find a session by internal ID.
    pub async fn find_by_id<'e>(
        executor: impl PgExecutor<'e>,
        id: DbId,
    ) -> Result<Option<Session>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM sessions WHERE id = $1");
        sqlx::query_as::<_, Session>(&query)
            .bind(id)
            .fetch_optional(executor)
            .await
    }

    /// Find a session and take a row lock on it for the rest of the transaction.
    pub async fn lock_by_id(
        conn: &mut PgConnection,
        id: DbId,
    ) -> Result<Option<Session>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM sessions WHERE id = $1 FOR UPDATE");
        sqlx::query_as::<_, Session>(&query)
            .bind(id)
            .fetch_optional(conn)
            .await
    }

    /// Find a session by its signaling token.
    pub async fn find_by_token<'e>(
        executor: impl PgExecutor<'e>,
        session_token: &str,
    ) -> Result<Option<Session>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM sessions WHERE session_token = $1");
        sqlx::query_as::<_, Session>(&query)
            .bind(session_token)
            .fetch_optional(executor)
            .await
    }

    /// Find a session together with its host and client names.
    pub async fn find_detail<'e>(
        executor: impl PgExecutor<'e>,
        id: DbId,
    ) -> Result<Option<SessionDetail>, sqlx::Error> {
        let query = format!("SELECT {DETAIL_COLUMNS} FROM {DETAIL_FROM} WHERE s.id = $1");
        sqlx::query_as::<_, SessionDetail>(&query)
            .bind(id)
            .fetch_optional(executor)
            .await
    }

    /// Sessions owned by a user, newest first.
    pub async fn list_by_user<'e>(
        executor: impl PgExecutor<'e>,
        user_id: DbId,
    ) -> Result<Vec<SessionDetail>, sqlx::Error> {
        Self::list_where(executor, "s.user_id", user_id).await
    }

    /// Sessions that ran on a host, newest first.
    pub async fn list_by_host<'e>(
        executor: impl PgExecutor<'e>,
        host_id: DbId,
    ) -> Result<Vec<SessionDetail>, sqlx::Error> {
        Self::list_where(executor, "s.host_id", host_id).await
    }

    /// Sessions that used a client, newest first.
    pub async fn list_by_client<'e>(
        executor: impl PgExecutor<'e>,
        client_id: DbId,
    ) -> Result<Vec<SessionDetail>, sqlx::Error> {
        Self::list_where(executor, "s.client_id", client_id).await
    }

    async fn list_where<'e>(
        executor: impl PgExecutor<'e>,
        column: &'static str,
        value: DbId,
    ) -> Result<Vec<SessionDetail>, sqlx::Error> {
        let query = format!(
            "SELECT {DETAIL_COLUMNS} FROM {DETAIL_FROM}
             WHERE {column} = $1
             ORDER BY s.created_at DESC, s.id DESC"
        );
        sqlx::query_as::<_, SessionDetail>(&query)
            .bind(value)
            .fetch_all(executor)
            .await
    }

    /// Count ACTIVE sessions on a host, optionally ignoring one session.
    pub async fn count_active_for_host<'e>(
        executor: impl PgExecutor<'e>,
        host_id: DbId,
        excluding: Option<DbId>,
    ) -> Result<i64, sqlx::Error> {
        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM sessions
             WHERE host_id = $1 AND status_id = $2 AND ($3::BIGINT IS NULL OR id <> $3)",
        )
        .bind(host_id)
        .bind(SessionStatus::Active.id())
        .bind(excluding)
        .fetch_one(executor)
        .await?;
        Ok(count)
    }

    /// IDs of PENDING or ACTIVE sessions whose expiry is strictly before `now`.
    pub async fn list_expired_live_ids<'e>(
        executor: impl PgExecutor<'e>,
        now: Timestamp,
    ) -> Result<Vec<DbId>, sqlx::Error> {
        let rows: Vec<(DbId,)> = sqlx::query_as(
            "SELECT id FROM sessions
             WHERE status_id IN ($1, $2) AND expires_at < $3
             ORDER BY expires_at ASC, id ASC",
        )
        .bind(SessionStatus::Pending.id())
        .bind(SessionStatus::Active.id())
        .bind(now)
        .fetch_all(executor)
        .await?;
        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    /// Store the caller's WebRTC offer.
    pub async fn set_offer<'e>(
        executor: impl PgExecutor<'e>,
        id: DbId,
        webrtc_offer: &str,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("UPDATE sessions SET webrtc_offer = $2 WHERE id = $1")
            .bind(id)
            .bind(webrtc_offer)
            .execute(executor)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Overwrite the stored WebRTC answer.
    pub async fn set_answer<'e>(
        executor: impl PgExecutor<'e>,
        id: DbId,
        webrtc_answer: &str,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("UPDATE sessions SET webrtc_answer = $2 WHERE id = $1")
            .bind(id)
            .bind(webrtc_answer)
            .execute(executor)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// PENDING -> ACTIVE, recording the host's answer and `started_at`.
    ///
    /// Returns `false` if the session was not PENDING.
    pub async fn mark_active<'e>(
        executor: impl PgExecutor<'e>,
        id: DbId,
        webrtc_answer: &str,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE sessions
             SET status_id = $2, webrtc_answer = $3, started_at = NOW()
             WHERE id = $1 AND status_id = $4",
        )
        .bind(id)
        .bind(SessionStatus::Active.id())
        .bind(webrtc_answer)
        .bind(SessionStatus::Pending.id())
        .execute(executor)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Move a live session to a terminal status, recording `ended_at` and the
    /// reason (if any).
    ///
    /// Only rows in a status with an edge to `status` are touched. Returns
    /// `false` if the session was already terminal.
    pub async fn finish<'e>(
        executor: impl PgExecutor<'e>,
        id: DbId,
        status: SessionStatus,
        reason: Option<&str>,
    ) -> Result<bool, sqlx::Error> {
        debug_assert!(status.is_terminal());
        let sources: Vec<StatusId> = transition_sources(status)
            .into_iter()
            .map(SessionStatus::id)
            .collect();
        let result = sqlx::query(
            "UPDATE sessions
             SET status_id = $2, end_reason = $3, ended_at = NOW()
             WHERE id = $1 AND status_id = ANY($4)",
        )
        .bind(id)
        .bind(status.id())
        .bind(reason)
        .bind(sources)
        .execute(executor)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}
