//! Repository for the `hosts` table.

use imperium_core::status::{HostStatus, SessionStatus};
use imperium_core::types::DbId;
use sqlx::{PgConnection, PgExecutor, PgPool};

use crate::models::host::{CreateHost, Host, UpdateHost};
use crate::repositories::DeleteOutcome;

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str = "id, owner_id, name, ip_address, port, status_id, created_at, updated_at";

/// Result of a guarded operator status change.
#[derive(Debug, Clone)]
pub enum StatusChange {
    Updated(Host),
    NotFound,
    /// The host has an ACTIVE session and the requested status differs from
    /// the current one.
    BlockedByActiveSession,
}

/// Provides CRUD operations and status transitions for hosts.
pub struct HostRepo;

impl HostRepo {
    /// Insert a new host (status AVAILABLE), returning the created row.
    pub async fn create<'e>(
        executor: impl PgExecutor<'e>,
        owner_id: DbId,
        input: &CreateHost,
    ) -> Result<Host, sqlx::Error> {
        let query = format!(
            "INSERT INTO hosts (owner_id, name, ip_address, port, status_id)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Host>(&query)
            .bind(owner_id)
            .bind(&input.name)
            .bind(&input.ip_address)
            .bind(input.port)
            .bind(HostStatus::Available.id())
            .fetch_one(executor)
            .await
    }

    /// Return the owner's host registered under (name, address, port),
    /// creating it if it does not exist yet.
    ///
    /// Concurrent calls with the same triple converge on one row through the
    /// `uq_hosts_owner_name_address_port` constraint.
    pub async fn get_or_create(
        pool: &PgPool,
        owner_id: DbId,
        input: &CreateHost,
    ) -> Result<Host, sqlx::Error> {
        let insert = format!(
            "INSERT INTO hosts (owner_id, name, ip_address, port, status_id)
             VALUES ($1, $2, $3, $4, $5)
             ON CONFLICT ON CONSTRAINT uq_hosts_owner_name_address_port DO NOTHING
             RETURNING {COLUMNS}"
        );
        let created = sqlx::query_as::<_, Host>(&insert)
            .bind(owner_id)
            .bind(&input.name)
            .bind(&input.ip_address)
            .bind(input.port)
            .bind(HostStatus::Available.id())
            .fetch_optional(pool)
            .await?;

        if let Some(host) = created {
            return Ok(host);
        }

        let select = format!(
            "SELECT {COLUMNS} FROM hosts
             WHERE owner_id = $1 AND name = $2 AND ip_address = $3 AND port = $4"
        );
        sqlx::query_as::<_, Host>(&select)
            .bind(owner_id)
            .bind(&input.name)
            .bind(&input.ip_address)
            .bind(input.port)
            .fetch_one(pool)
            .await
    }

    /// Find a host by internal ID.
    pub async fn find_by_id<'e>(
        executor: impl PgExecutor<'e>,
        id: DbId,
    ) -> Result<Option<Host>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM hosts WHERE id = $1");
        sqlx::query_as::<_, Host>(&query)
            .bind(id)
            .fetch_optional(executor)
            .await
    }

    /// Find a host and take a row lock on it for the rest of the transaction.
    pub async fn lock_by_id(conn: &mut PgConnection, id: DbId) -> Result<Option<Host>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM hosts WHERE id = $1 FOR UPDATE");
        sqlx::query_as::<_, Host>(&query)
            .bind(id)
            .fetch_optional(conn)
            .await
    }

    /// List hosts owned by a user, most recently created first.
    pub async fn list_by_owner<'e>(
        executor: impl PgExecutor<'e>,
        owner_id: DbId,
    ) -> Result<Vec<Host>, sqlx::Error> {
        let query =
            format!("SELECT {COLUMNS} FROM hosts WHERE owner_id = $1 ORDER BY created_at DESC, id DESC");
        sqlx::query_as::<_, Host>(&query)
            .bind(owner_id)
            .fetch_all(executor)
            .await
    }

    /// Overwrite address, port and status. Returns `None` if the host does not exist.
    pub async fn update<'e>(
        executor: impl PgExecutor<'e>,
        id: DbId,
        input: &UpdateHost,
    ) -> Result<Option<Host>, sqlx::Error> {
        let query = format!(
            "UPDATE hosts SET ip_address = $2, port = $3, status_id = $4
             WHERE id = $1
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Host>(&query)
            .bind(id)
            .bind(&input.ip_address)
            .bind(input.port)
            .bind(input.status.id())
            .fetch_optional(executor)
            .await
    }

    /// Unconditionally overwrite a host's status.
    ///
    /// Used by session coordination inside its own transaction, where the
    /// session row lock already orders the flip against the transition.
    pub async fn update_status<'e>(
        executor: impl PgExecutor<'e>,
        id: DbId,
        status: HostStatus,
    ) -> Result<Option<Host>, sqlx::Error> {
        let query = format!("UPDATE hosts SET status_id = $2 WHERE id = $1 RETURNING {COLUMNS}");
        sqlx::query_as::<_, Host>(&query)
            .bind(id)
            .bind(status.id())
            .fetch_optional(executor)
            .await
    }

    /// Operator-facing status overwrite.
    ///
    /// Refuses to change the status of a host that currently has an ACTIVE
    /// session; setting the status it already has is a no-op.
    pub async fn update_status_guarded(
        pool: &PgPool,
        id: DbId,
        status: HostStatus,
    ) -> Result<StatusChange, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let Some(host) = Self::lock_by_id(&mut tx, id).await? else {
            return Ok(StatusChange::NotFound);
        };
        if Self::status_change_blocked(&mut tx, &host, status).await? {
            return Ok(StatusChange::BlockedByActiveSession);
        }

        let updated = Self::update_status(&mut *tx, id, status).await?;
        tx.commit().await?;
        Ok(updated.map_or(StatusChange::NotFound, StatusChange::Updated))
    }

    /// Full update with the same status guard as [`Self::update_status_guarded`].
    pub async fn update_guarded(
        pool: &PgPool,
        id: DbId,
        input: &UpdateHost,
    ) -> Result<StatusChange, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let Some(host) = Self::lock_by_id(&mut tx, id).await? else {
            return Ok(StatusChange::NotFound);
        };
        if Self::status_change_blocked(&mut tx, &host, input.status).await? {
            return Ok(StatusChange::BlockedByActiveSession);
        }

        let updated = Self::update(&mut *tx, id, input).await?;
        tx.commit().await?;
        Ok(updated.map_or(StatusChange::NotFound, StatusChange::Updated))
    }

    /// A locked host may not change status while it has an ACTIVE session.
    async fn status_change_blocked(
        conn: &mut PgConnection,
        host: &Host,
        status: HostStatus,
    ) -> Result<bool, sqlx::Error> {
        if host.status() == status {
            return Ok(false);
        }
        let (active,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM sessions WHERE host_id = $1 AND status_id = $2")
                .bind(host.id)
                .bind(SessionStatus::Active.id())
                .fetch_one(conn)
                .await?;
        Ok(active > 0)
    }

    /// Delete a host after removing its terminal session history.
    ///
    /// Refuses while any PENDING or ACTIVE session references the host.
    pub async fn delete_with_history(pool: &PgPool, id: DbId) -> Result<DeleteOutcome, sqlx::Error> {
        let mut tx = pool.begin().await?;

        if Self::lock_by_id(&mut tx, id).await?.is_none() {
            return Ok(DeleteOutcome::NotFound);
        }

        let (live,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM sessions WHERE host_id = $1 AND status_id IN ($2, $3)",
        )
        .bind(id)
        .bind(SessionStatus::Pending.id())
        .bind(SessionStatus::Active.id())
        .fetch_one(&mut *tx)
        .await?;
        if live > 0 {
            return Ok(DeleteOutcome::HasLiveSessions);
        }

        sqlx::query("DELETE FROM sessions WHERE host_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM hosts WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(DeleteOutcome::Deleted)
    }
}
