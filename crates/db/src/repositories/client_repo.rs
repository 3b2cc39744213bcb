//! Repository for the `clients` table.

use imperium_core::status::SessionStatus;
use imperium_core::types::DbId;
use sqlx::{PgExecutor, PgPool};

use crate::models::client::{Client, CreateClient};
use crate::repositories::DeleteOutcome;

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str = "id, owner_id, name, ip_address, created_at, updated_at";

/// Provides CRUD operations for client endpoints.
pub struct ClientRepo;

impl ClientRepo {
    /// Insert a new client, returning the created row.
    pub async fn create<'e>(
        executor: impl PgExecutor<'e>,
        owner_id: DbId,
        input: &CreateClient,
    ) -> Result<Client, sqlx::Error> {
        let query = format!(
            "INSERT INTO clients (owner_id, name, ip_address)
             VALUES ($1, $2, $3)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Client>(&query)
            .bind(owner_id)
            .bind(&input.client_name)
            .bind(&input.ip_address)
            .fetch_one(executor)
            .await
    }

    /// Return the owner's client with this (name, address), creating it if
    /// needed. An existing row is returned unchanged apart from `updated_at`.
    pub async fn upsert<'e>(
        executor: impl PgExecutor<'e>,
        owner_id: DbId,
        input: &CreateClient,
    ) -> Result<Client, sqlx::Error> {
        let query = format!(
            "INSERT INTO clients (owner_id, name, ip_address)
             VALUES ($1, $2, $3)
             ON CONFLICT ON CONSTRAINT uq_clients_owner_name_address
             DO UPDATE SET updated_at = NOW()
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Client>(&query)
            .bind(owner_id)
            .bind(&input.client_name)
            .bind(&input.ip_address)
            .fetch_one(executor)
            .await
    }

    /// Find a client by internal ID.
    pub async fn find_by_id<'e>(
        executor: impl PgExecutor<'e>,
        id: DbId,
    ) -> Result<Option<Client>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM clients WHERE id = $1");
        sqlx::query_as::<_, Client>(&query)
            .bind(id)
            .fetch_optional(executor)
            .await
    }

    /// List clients owned by a user, most recently created first.
    pub async fn list_by_owner<'e>(
        executor: impl PgExecutor<'e>,
        owner_id: DbId,
    ) -> Result<Vec<Client>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM clients WHERE owner_id = $1 ORDER BY created_at DESC, id DESC"
        );
        sqlx::query_as::<_, Client>(&query)
            .bind(owner_id)
            .fetch_all(executor)
            .await
    }

    /// Overwrite name and address. Returns `None` if the client does not exist.
    pub async fn update<'e>(
        executor: impl PgExecutor<'e>,
        id: DbId,
        input: &CreateClient,
    ) -> Result<Option<Client>, sqlx::Error> {
        let query = format!(
            "UPDATE clients SET name = $2, ip_address = $3
             WHERE id = $1
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Client>(&query)
            .bind(id)
            .bind(&input.client_name)
            .bind(&input.ip_address)
            .fetch_optional(executor)
            .await
    }

    /// Delete a client after removing its terminal session history.
    ///
    /// Refuses while any PENDING or ACTIVE session references the client.
    pub async fn delete_with_history(pool: &PgPool, id: DbId) -> Result<DeleteOutcome, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let locked: Option<(DbId,)> = sqlx::query_as("SELECT id FROM clients WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?;
        if locked.is_none() {
            return Ok(DeleteOutcome::NotFound);
        }

        let (live,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM sessions WHERE client_id = $1 AND status_id IN ($2, $3)",
        )
        .bind(id)
        .bind(SessionStatus::Pending.id())
        .bind(SessionStatus::Active.id())
        .fetch_one(&mut *tx)
        .await?;
        if live > 0 {
            return Ok(DeleteOutcome::HasLiveSessions);
        }

        sqlx::query("DELETE FROM sessions WHERE client_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM clients WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(DeleteOutcome::Deleted)
    }
}
