//! Session Coordinator: drives the session state machine and keeps host
//! status in lock-step with it.
//!
//! Every operation runs in a single database transaction. Rows are locked in
//! a fixed order (session row, then host row) so concurrent operations on the
//! same session or host serialize instead of interleaving.
//!
//! `start` holds its transaction across the call to the host; `end`, `cancel`
//! and the expiry sweep commit first and notify the host afterwards, logging
//! (never propagating) notification failures.

use chrono::Utc;
use imperium_core::session::{
    ensure_can_cancel, ensure_can_end, ensure_can_start, expiry_from, generate_session_token,
    is_expired, owned_by, start_failure_reason, SessionError, DEFAULT_CANCEL_REASON,
    REASON_EXPIRED, REASON_EXPIRED_BEFORE_START,
};
use imperium_core::status::{HostStatus, SessionStatus};
use imperium_core::types::{DbId, Timestamp};
use imperium_db::models::host::Host;
use imperium_db::models::session::{
    CreateSession, CreateSessionRequest, SessionResponse, SessionSummary,
};
use imperium_db::repositories::{ClientRepo, HostRepo, SessionRepo};
use sqlx::{PgConnection, PgPool};

use crate::error::{AppError, AppResult};
use crate::signaling::HostClient;

/// Coordinates session transitions, host status and host signaling.
pub struct SessionCoordinator {
    pool: PgPool,
    hosts: HostClient,
}

impl SessionCoordinator {
    pub fn new(pool: PgPool, hosts: HostClient) -> Self {
        Self { pool, hosts }
    }

    // -----------------------------------------------------------------------
    // Transitions
    // -----------------------------------------------------------------------

    /// Create a PENDING session pairing one of the user's hosts with one of
    /// the user's clients.
    ///
    /// The host row stays locked until commit, so concurrent creates against
    /// the same host are checked one after the other. Host status is not
    /// changed here.
    pub async fn create_session(
        &self,
        user_id: DbId,
        input: &CreateSessionRequest,
    ) -> AppResult<SessionResponse> {
        let mut tx = self.pool.begin().await?;

        let host = HostRepo::lock_by_id(&mut tx, input.host_id)
            .await?
            .ok_or(SessionError::HostNotFound(input.host_id))?;
        if !owned_by(host.owner_id, user_id) {
            return Err(SessionError::HostOwnershipMismatch(host.id).into());
        }

        let client = ClientRepo::find_by_id(&mut *tx, input.client_id)
            .await?
            .ok_or(SessionError::ClientNotFound(input.client_id))?;
        if !owned_by(client.owner_id, user_id) {
            return Err(SessionError::ClientOwnershipMismatch(client.id).into());
        }

        if host.status() != HostStatus::Available {
            return Err(SessionError::HostUnavailable(host.id).into());
        }
        if SessionRepo::count_active_for_host(&mut *tx, host.id, None).await? > 0 {
            return Err(SessionError::HostBusy(host.id).into());
        }

        let created_at = Utc::now();
        let session = SessionRepo::create(
            &mut *tx,
            &CreateSession {
                user_id,
                host_id: host.id,
                client_id: client.id,
                session_token: generate_session_token(),
                program_id: input.program_id.clone(),
                created_at,
                expires_at: expiry_from(created_at),
            },
        )
        .await?;

        let response = load_response(&mut tx, session.id).await?;
        tx.commit().await?;

        tracing::info!(
            session_id = session.id,
            host_id = host.id,
            client_id = client.id,
            user_id,
            "Session created"
        );
        Ok(response)
    }

    /// PENDING -> ACTIVE.
    ///
    /// An expired session is cancelled and [`SessionError::SessionExpired`]
    /// returned. If the host is not AVAILABLE or already has an ACTIVE
    /// session, the session is left PENDING. If the host cannot be reached or
    /// answers without a WebRTC answer, the session is cancelled and host
    /// status is left untouched.
    pub async fn start_session(
        &self,
        user_id: DbId,
        session_id: DbId,
        webrtc_offer: &str,
    ) -> AppResult<SessionResponse> {
        let mut tx = self.pool.begin().await?;

        let session = SessionRepo::lock_by_id(&mut tx, session_id)
            .await?
            .ok_or(SessionError::SessionNotFound(session_id))?;
        if !owned_by(session.user_id, user_id) {
            return Err(SessionError::SessionOwnershipMismatch(session_id).into());
        }
        ensure_can_start(session.status())?;

        if is_expired(session.expires_at, Utc::now()) {
            SessionRepo::finish(
                &mut *tx,
                session_id,
                SessionStatus::Cancelled,
                Some(REASON_EXPIRED_BEFORE_START),
            )
            .await?;
            tx.commit().await?;
            tracing::info!(session_id, "Session expired before starting");
            return Err(SessionError::SessionExpired(session_id).into());
        }

        let host = HostRepo::lock_by_id(&mut tx, session.host_id)
            .await?
            .ok_or(SessionError::HostNotFound(session.host_id))?;
        if host.status() != HostStatus::Available {
            return Err(SessionError::HostUnavailable(host.id).into());
        }
        if SessionRepo::count_active_for_host(&mut *tx, host.id, Some(session_id)).await? > 0 {
            return Err(SessionError::HostBusy(host.id).into());
        }

        SessionRepo::set_offer(&mut *tx, session_id, webrtc_offer).await?;
        let payload = load_response(&mut tx, session_id).await?;

        let answer = match self.hosts.start_session(&host, &payload).await {
            Ok(answer) => answer,
            Err(e) => {
                let cause = e.to_string();
                let reason = start_failure_reason(&cause);
                SessionRepo::finish(
                    &mut *tx,
                    session_id,
                    SessionStatus::Cancelled,
                    Some(reason.as_str()),
                )
                .await?;
                tx.commit().await?;
                tracing::warn!(session_id, host_id = host.id, error = %e, "Host failed to start session");
                return Err(SessionError::SessionStartFailed(cause).into());
            }
        };

        if !SessionRepo::mark_active(&mut *tx, session_id, &answer).await? {
            return Err(AppError::InternalError(format!(
                "Session {session_id} left PENDING while locked"
            )));
        }
        HostRepo::update_status(&mut *tx, host.id, HostStatus::InUse).await?;

        let response = load_response(&mut tx, session_id).await?;
        tx.commit().await?;

        tracing::info!(session_id, host_id = host.id, "Session started");
        Ok(response)
    }

    /// ACTIVE -> ENDED. The host is set back to AVAILABLE and notified.
    pub async fn end_session(
        &self,
        user_id: DbId,
        session_id: DbId,
        reason: Option<&str>,
        webrtc_answer: Option<&str>,
    ) -> AppResult<SessionResponse> {
        let mut tx = self.pool.begin().await?;

        let session = SessionRepo::lock_by_id(&mut tx, session_id)
            .await?
            .ok_or(SessionError::SessionNotFound(session_id))?;
        if !owned_by(session.user_id, user_id) {
            return Err(SessionError::SessionOwnershipMismatch(session_id).into());
        }
        ensure_can_end(session.status())?;

        if let Some(answer) = webrtc_answer {
            SessionRepo::set_answer(&mut *tx, session_id, answer).await?;
        }
        SessionRepo::finish(&mut *tx, session_id, SessionStatus::Ended, reason).await?;
        let host = release_host(&mut tx, session.host_id).await?;

        let response = load_response(&mut tx, session_id).await?;
        tx.commit().await?;

        tracing::info!(session_id, host_id = session.host_id, "Session ended");
        if let Some(host) = host {
            self.notify_end(&host, &response).await;
        }
        Ok(response)
    }

    /// PENDING or ACTIVE -> CANCELLED.
    ///
    /// Only a session that was ACTIVE releases its host and notifies it.
    pub async fn cancel_session(
        &self,
        user_id: DbId,
        session_id: DbId,
        reason: Option<&str>,
    ) -> AppResult<SessionResponse> {
        let reason = reason.unwrap_or(DEFAULT_CANCEL_REASON);
        let mut tx = self.pool.begin().await?;

        let session = SessionRepo::lock_by_id(&mut tx, session_id)
            .await?
            .ok_or(SessionError::SessionNotFound(session_id))?;
        if !owned_by(session.user_id, user_id) {
            return Err(SessionError::SessionOwnershipMismatch(session_id).into());
        }
        ensure_can_cancel(session.status())?;

        let was_active = session.status() == SessionStatus::Active;
        SessionRepo::finish(&mut *tx, session_id, SessionStatus::Cancelled, Some(reason)).await?;
        let host = if was_active {
            release_host(&mut tx, session.host_id).await?
        } else {
            None
        };

        let response = load_response(&mut tx, session_id).await?;
        tx.commit().await?;

        tracing::info!(session_id, was_active, reason, "Session cancelled");
        if let Some(host) = host {
            self.notify_end(&host, &response).await;
        }
        Ok(response)
    }

    /// Cancel every PENDING or ACTIVE session whose expiry is before `now`,
    /// releasing the hosts of ACTIVE ones. Returns the number expired.
    ///
    /// Each session is handled in its own transaction; a failure on one is
    /// logged and does not stop the sweep.
    pub async fn expire_stale_sessions(&self, now: Timestamp) -> AppResult<usize> {
        let ids = SessionRepo::list_expired_live_ids(&self.pool, now).await?;
        let mut expired = 0;

        for session_id in ids {
            match self.expire_one(session_id, now).await {
                Ok(true) => expired += 1,
                Ok(false) => {}
                Err(e) => {
                    tracing::error!(session_id, error = %e, "Failed to expire session");
                }
            }
        }
        Ok(expired)
    }

    async fn expire_one(&self, session_id: DbId, now: Timestamp) -> AppResult<bool> {
        let mut tx = self.pool.begin().await?;

        let Some(session) = SessionRepo::lock_by_id(&mut tx, session_id).await? else {
            return Ok(false);
        };
        // Re-check under the lock: the session may have moved on since the scan.
        if !session.status().is_live() || !is_expired(session.expires_at, now) {
            return Ok(false);
        }

        let was_active = session.status() == SessionStatus::Active;
        SessionRepo::finish(&mut *tx, session_id, SessionStatus::Cancelled, Some(REASON_EXPIRED))
            .await?;
        let host = if was_active {
            release_host(&mut tx, session.host_id).await?
        } else {
            None
        };

        let response = load_response(&mut tx, session_id).await?;
        tx.commit().await?;

        tracing::info!(session_id, was_active, "Expired stale session");
        if let Some(host) = host {
            self.notify_end(&host, &response).await;
        }
        Ok(true)
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    /// True iff `session_token` names an ACTIVE, unexpired session on `host_id`.
    ///
    /// Lookup failures are logged and reported as `false`.
    pub async fn validate_session_token(&self, session_token: &str, host_id: DbId) -> bool {
        match SessionRepo::find_by_token(&self.pool, session_token).await {
            Ok(Some(session)) => {
                session.host_id == host_id
                    && session.status() == SessionStatus::Active
                    && !is_expired(session.expires_at, Utc::now())
            }
            Ok(None) => false,
            Err(e) => {
                tracing::error!(host_id, error = %e, "Session token lookup failed");
                false
            }
        }
    }

    /// Fetch one of the user's sessions.
    pub async fn get_session(&self, user_id: DbId, session_id: DbId) -> AppResult<SessionResponse> {
        let detail = SessionRepo::find_detail(&self.pool, session_id)
            .await?
            .ok_or(SessionError::SessionNotFound(session_id))?;
        if !owned_by(detail.user_id, user_id) {
            return Err(SessionError::SessionOwnershipMismatch(session_id).into());
        }
        Ok(detail.into())
    }

    /// The user's sessions, newest first.
    pub async fn list_for_user(&self, user_id: DbId) -> AppResult<Vec<SessionSummary>> {
        let sessions = SessionRepo::list_by_user(&self.pool, user_id).await?;
        Ok(sessions.into_iter().map(SessionSummary::from).collect())
    }

    /// Sessions on one of the user's hosts, newest first.
    pub async fn list_for_host(
        &self,
        user_id: DbId,
        host_id: DbId,
    ) -> AppResult<Vec<SessionSummary>> {
        let host = HostRepo::find_by_id(&self.pool, host_id)
            .await?
            .ok_or(SessionError::HostNotFound(host_id))?;
        if !owned_by(host.owner_id, user_id) {
            return Err(SessionError::HostOwnershipMismatch(host_id).into());
        }
        let sessions = SessionRepo::list_by_host(&self.pool, host_id).await?;
        Ok(sessions.into_iter().map(SessionSummary::from).collect())
    }

    /// Sessions that used one of the user's clients, newest first.
    pub async fn list_for_client(
        &self,
        user_id: DbId,
        client_id: DbId,
    ) -> AppResult<Vec<SessionSummary>> {
        let client = ClientRepo::find_by_id(&self.pool, client_id)
            .await?
            .ok_or(SessionError::ClientNotFound(client_id))?;
        if !owned_by(client.owner_id, user_id) {
            return Err(SessionError::ClientOwnershipMismatch(client_id).into());
        }
        let sessions = SessionRepo::list_by_client(&self.pool, client_id).await?;
        Ok(sessions.into_iter().map(SessionSummary::from).collect())
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    async fn notify_end(&self, host: &Host, session: &SessionResponse) {
        if let Err(e) = self.hosts.end_session(host, session).await {
            tracing::warn!(
                session_id = session.id,
                host_id = host.id,
                error = %e,
                "Failed to notify host of session end"
            );
        }
    }
}

/// Lock the host and set it back to AVAILABLE, returning the updated row.
async fn release_host(conn: &mut PgConnection, host_id: DbId) -> AppResult<Option<Host>> {
    if HostRepo::lock_by_id(conn, host_id).await?.is_none() {
        return Ok(None);
    }
    Ok(HostRepo::update_status(conn, host_id, HostStatus::Available).await?)
}

async fn load_response(conn: &mut PgConnection, session_id: DbId) -> AppResult<SessionResponse> {
    let detail = SessionRepo::find_detail(conn, session_id)
        .await?
        .ok_or(SessionError::SessionNotFound(session_id))?;
    Ok(detail.into())
}
