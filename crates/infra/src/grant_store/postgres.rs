//! Postgres-backed grant store.
//!
//! ## Consistency
//!
//! - `load_access_rows` runs both base-relation queries inside one
//!   `REPEATABLE READ, READ ONLY` transaction, so an evaluation never mixes
//!   two snapshots.
//! - Status transitions are a single `UPDATE ... WHERE status = ANY($expected)`.
//!   Under concurrent updates Postgres re-checks the predicate after the row
//!   lock is released, so of two racing accepts exactly one matches.
//! - A revoke first locks the property's ACTIVE OWNER rows (`FOR UPDATE`) and
//!   refuses to remove the last one.
//! - Uniqueness of non-terminal grants is enforced by partial unique indexes
//!   (see `migrations/0001_access.sql`).
//!
//! ## Error Mapping
//!
//! | SQLx Error | PostgreSQL Error Code | StoreError |
//! |------------|----------------------|------------|
//! | Database (unique violation) | `23505` | `DuplicateGrant` |
//! | Database (other) | Any other | `Storage` |
//! | PoolClosed / PoolTimedOut / Io / Tls | N/A | `Unavailable` |
//! | Other | N/A | `Storage` |

use std::sync::Arc;

use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{FromRow, PgPool, Postgres, Row, Transaction};
use tracing::{Span, field, instrument};
use uuid::Uuid;

use rentgate_access::{AccessRows, Grant, GrantRow, GrantStatus, Invitee, OwnershipRow, Property, Role};
use rentgate_core::{EmailAddress, GrantId, PropertyId, UserId};

use super::{GrantStore, StoreError, Transition};

const MIGRATION: &str = include_str!("../../migrations/0001_access.sql");

const GRANT_COLUMNS: &str = "grant_id, property_id, user_id, invitee_user_id, invitee_email, \
     role, status, invited_by, invited_at, expires_at, accepted_at, revoked_at, revoked_by";

const PROPERTY_COLUMNS: &str = "property_id, landlord_id, name, created_at, disabled_at";

/// Postgres-backed grant store.
#[derive(Debug, Clone)]
pub struct PostgresGrantStore {
    pool: Arc<PgPool>,
}

impl PostgresGrantStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    /// Open a pool against `database_url`.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;
        Ok(Self::new(pool))
    }

    /// Apply the schema. Idempotent.
    #[instrument(skip(self), err)]
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::raw_sql(MIGRATION)
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("migrate", e))?;
        Ok(())
    }

    async fn fetch_grant_in(
        tx: &mut Transaction<'_, Postgres>,
        grant_id: GrantId,
    ) -> Result<Option<Grant>, StoreError> {
        let sql = format!("SELECT {GRANT_COLUMNS} FROM property_grants WHERE grant_id = $1");
        let row = sqlx::query(&sql)
            .bind(grant_id.as_uuid())
            .fetch_optional(&mut **tx)
            .await
            .map_err(|e| map_sqlx_error("fetch_grant", e))?;
        row.map(|r| decode_grant(&r)).transpose()
    }
}

#[async_trait::async_trait]
impl GrantStore for PostgresGrantStore {
    #[instrument(skip(self), fields(user_id = %user_id, owned = field::Empty, grants = field::Empty), err)]
    async fn load_access_rows(&self, user_id: UserId) -> Result<AccessRows, StoreError> {
        let span = Span::current();

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ, READ ONLY")
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("set_isolation", e))?;

        let owned_rows = sqlx::query(
            r#"
            SELECT property_id, disabled_at IS NOT NULL AS disabled
            FROM properties
            WHERE landlord_id = $1
            "#,
        )
        .bind(user_id.as_uuid())
        .fetch_all(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("load_owned", e))?;

        let grant_rows = sqlx::query(
            r#"
            SELECT
                g.grant_id,
                g.property_id,
                g.role,
                g.status,
                p.disabled_at IS NOT NULL AS property_disabled
            FROM property_grants g
            JOIN properties p ON p.property_id = g.property_id
            WHERE g.user_id = $1 AND g.status = 'active'
            "#,
        )
        .bind(user_id.as_uuid())
        .fetch_all(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("load_grants", e))?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;

        let mut owned = Vec::with_capacity(owned_rows.len());
        for row in owned_rows {
            owned.push(OwnershipRow {
                property_id: PropertyId::from_uuid(row.try_get("property_id").map_err(corrupt)?),
                disabled: row.try_get("disabled").map_err(corrupt)?,
            });
        }

        let mut grants = Vec::with_capacity(grant_rows.len());
        for row in grant_rows {
            let role: String = row.try_get("role").map_err(corrupt)?;
            let status: String = row.try_get("status").map_err(corrupt)?;
            grants.push(GrantRow {
                grant_id: GrantId::from_uuid(row.try_get("grant_id").map_err(corrupt)?),
                property_id: PropertyId::from_uuid(row.try_get("property_id").map_err(corrupt)?),
                role: parse_role(&role)?,
                status: parse_status(&status)?,
                property_disabled: row.try_get("property_disabled").map_err(corrupt)?,
            });
        }

        span.record("owned", owned.len());
        span.record("grants", grants.len());
        Ok(AccessRows {
            user_id,
            owned,
            grants,
        })
    }

    #[instrument(skip(self), fields(property_id = %property_id), err)]
    async fn get_property(&self, property_id: PropertyId) -> Result<Option<Property>, StoreError> {
        let sql = format!("SELECT {PROPERTY_COLUMNS} FROM properties WHERE property_id = $1");
        let row = sqlx::query(&sql)
            .bind(property_id.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("get_property", e))?;
        row.map(|r| decode_property(&r)).transpose()
    }

    #[instrument(skip(self), fields(grant_id = %grant_id), err)]
    async fn get_grant(&self, grant_id: GrantId) -> Result<Option<Grant>, StoreError> {
        let sql = format!("SELECT {GRANT_COLUMNS} FROM property_grants WHERE grant_id = $1");
        let row = sqlx::query(&sql)
            .bind(grant_id.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("get_grant", e))?;
        row.map(|r| decode_grant(&r)).transpose()
    }

    #[instrument(skip(self), fields(property_id = %property_id), err)]
    async fn list_property_grants(&self, property_id: PropertyId) -> Result<Vec<Grant>, StoreError> {
        let sql = format!(
            "SELECT {GRANT_COLUMNS} FROM property_grants \
             WHERE property_id = $1 ORDER BY invited_at ASC, grant_id ASC"
        );
        let rows = sqlx::query(&sql)
            .bind(property_id.as_uuid())
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("list_property_grants", e))?;
        rows.iter().map(decode_grant).collect()
    }

    #[instrument(skip(self, email), fields(user_id = %user_id), err)]
    async fn list_invitations_for(
        &self,
        user_id: UserId,
        email: Option<&EmailAddress>,
    ) -> Result<Vec<Grant>, StoreError> {
        let sql = format!(
            "SELECT {GRANT_COLUMNS} FROM property_grants \
             WHERE status = 'pending' \
               AND (invitee_user_id = $1 OR ($2::text IS NOT NULL AND invitee_email = $2)) \
             ORDER BY invited_at ASC, grant_id ASC"
        );
        let rows = sqlx::query(&sql)
            .bind(user_id.as_uuid())
            .bind(email.map(EmailAddress::as_str))
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("list_invitations_for", e))?;
        rows.iter().map(decode_grant).collect()
    }

    #[instrument(
        skip(self, property, owner_grant),
        fields(property_id = %property.property_id, landlord_id = %property.landlord_id),
        err
    )]
    async fn create_property(&self, property: &Property, owner_grant: &Grant) -> Result<(), StoreError> {
        if owner_grant.property_id != property.property_id {
            return Err(StoreError::Storage(
                "owner grant must target the new property".to_string(),
            ));
        }

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        sqlx::query(
            r#"
            INSERT INTO properties (property_id, landlord_id, name, created_at, disabled_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(property.property_id.as_uuid())
        .bind(property.landlord_id.as_uuid())
        .bind(&property.name)
        .bind(property.created_at)
        .bind(property.disabled_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("insert_property", e))?;

        insert_grant(&mut tx, owner_grant).await?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;
        Ok(())
    }

    #[instrument(skip(self), fields(property_id = %property_id), err)]
    async fn set_property_disabled(
        &self,
        property_id: PropertyId,
        disabled_at: Option<DateTime<Utc>>,
    ) -> Result<Property, StoreError> {
        let sql = format!(
            "UPDATE properties SET disabled_at = $2 WHERE property_id = $1 RETURNING {PROPERTY_COLUMNS}"
        );
        let row = sqlx::query(&sql)
            .bind(property_id.as_uuid())
            .bind(disabled_at)
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("set_property_disabled", e))?;
        match row {
            Some(row) => decode_property(&row),
            None => Err(StoreError::PropertyNotFound(property_id)),
        }
    }

    #[instrument(
        skip(self, grant),
        fields(grant_id = %grant.grant_id, property_id = %grant.property_id),
        err
    )]
    async fn insert_invitation(&self, grant: &Grant, now: DateTime<Utc>) -> Result<(), StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        let exists = sqlx::query("SELECT 1 FROM properties WHERE property_id = $1")
            .bind(grant.property_id.as_uuid())
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("check_property", e))?;
        if exists.is_none() {
            tx.rollback()
                .await
                .map_err(|e| map_sqlx_error("rollback", e))?;
            return Err(StoreError::PropertyNotFound(grant.property_id));
        }

        // Lapsed rows still carry status 'pending' and would trip the
        // partial unique indexes.
        sqlx::query(
            r#"
            UPDATE property_grants
            SET status = 'expired'
            WHERE property_id = $1
              AND status = 'pending'
              AND expires_at <= $2
              AND (user_id = $3 OR invitee_email = $4)
            "#,
        )
        .bind(grant.property_id.as_uuid())
        .bind(now)
        .bind(grant.user_id.map(|u| *u.as_uuid()))
        .bind(invitee_email(&grant.invitee))
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("expire_lapsed", e))?;

        insert_grant(&mut tx, grant).await?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;
        Ok(())
    }

    #[instrument(skip(self, expected), fields(grant_id = %grant_id, transition = ?transition), err)]
    async fn transition(
        &self,
        grant_id: GrantId,
        expected: &[GrantStatus],
        transition: Transition,
        now: DateTime<Utc>,
    ) -> Result<Grant, StoreError> {
        let expected: Vec<String> = expected.iter().map(|s| s.as_str().to_string()).collect();
        let (user_id, accepted_at, revoked_at, revoked_by) = match transition {
            Transition::Activate { user_id } => (Some(*user_id.as_uuid()), Some(now), None, None),
            Transition::Revoke { actor } => (None, None, Some(now), Some(*actor.as_uuid())),
            Transition::Expire => (None, None, None, None),
        };
        let wants_lapsed = matches!(transition, Transition::Expire);

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        if let Some(user_id) = user_id {
            sqlx::query(
                r#"
                UPDATE property_grants
                SET status = 'expired'
                WHERE property_id = (SELECT property_id FROM property_grants WHERE grant_id = $1)
                  AND grant_id <> $1
                  AND user_id = $2
                  AND status = 'pending'
                  AND expires_at <= $3
                "#,
            )
            .bind(grant_id.as_uuid())
            .bind(user_id)
            .bind(now)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("expire_lapsed", e))?;
        }

        if matches!(transition, Transition::Revoke { .. }) {
            // Lock every ACTIVE OWNER row of the property so concurrent
            // revokes of different owner grants serialize on the count.
            let owners = sqlx::query(
                r#"
                SELECT grant_id, property_id
                FROM property_grants
                WHERE property_id = (SELECT property_id FROM property_grants WHERE grant_id = $1)
                  AND role = 'OWNER'
                  AND status = 'active'
                FOR UPDATE
                "#,
            )
            .bind(grant_id.as_uuid())
            .fetch_all(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("lock_owner_grants", e))?;

            let mut last_owner = None;
            if owners.len() == 1 {
                let only: Uuid = owners[0]
                    .try_get("grant_id")
                    .map_err(corrupt)?;
                if only == *grant_id.as_uuid() {
                    let property_id: Uuid = owners[0]
                        .try_get("property_id")
                        .map_err(corrupt)?;
                    last_owner = Some(PropertyId::from_uuid(property_id));
                }
            }
            if let Some(property_id) = last_owner {
                tx.rollback()
                    .await
                    .map_err(|e| map_sqlx_error("rollback", e))?;
                return Err(StoreError::LastOwner(property_id));
            }
        }

        let sql = format!(
            r#"
            UPDATE property_grants
            SET status = $3,
                user_id = COALESCE($4, user_id),
                accepted_at = COALESCE($5, accepted_at),
                revoked_at = COALESCE($6, revoked_at),
                revoked_by = COALESCE($7, revoked_by)
            WHERE grant_id = $1
              AND status = ANY($2)
              AND (status = 'pending' AND expires_at IS NOT NULL AND expires_at <= $8) = $9
            RETURNING {GRANT_COLUMNS}
            "#
        );
        let updated = sqlx::query(&sql)
            .bind(grant_id.as_uuid())
            .bind(&expected[..])
            .bind(transition.target().as_str())
            .bind(user_id)
            .bind(accepted_at)
            .bind(revoked_at)
            .bind(revoked_by)
            .bind(now)
            .bind(wants_lapsed)
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("transition", e))?;

        let Some(row) = updated else {
            let current = Self::fetch_grant_in(&mut tx, grant_id).await?;
            tx.rollback()
                .await
                .map_err(|e| map_sqlx_error("rollback", e))?;
            return Err(match current {
                Some(grant) => StoreError::StatusConflict {
                    current: grant.effective_status(now),
                },
                None => StoreError::GrantNotFound(grant_id),
            });
        };

        let grant = decode_grant(&row)?;
        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;
        Ok(grant)
    }

    #[instrument(skip(self), fields(expired = field::Empty), err)]
    async fn sweep_expired(&self, now: DateTime<Utc>) -> Result<u64, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE property_grants
            SET status = 'expired'
            WHERE status = 'pending' AND expires_at <= $1
            "#,
        )
        .bind(now)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("sweep_expired", e))?;

        Span::current().record("expired", result.rows_affected());
        Ok(result.rows_affected())
    }
}

async fn insert_grant(tx: &mut Transaction<'_, Postgres>, grant: &Grant) -> Result<(), StoreError> {
    let invitee_user_id = match &grant.invitee {
        Invitee::User(id) => Some(*id.as_uuid()),
        Invitee::Email(_) => None,
    };

    sqlx::query(
        r#"
        INSERT INTO property_grants (
            grant_id, property_id, user_id, invitee_user_id, invitee_email,
            role, status, invited_by, invited_at, expires_at,
            accepted_at, revoked_at, revoked_by
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
        "#,
    )
    .bind(grant.grant_id.as_uuid())
    .bind(grant.property_id.as_uuid())
    .bind(grant.user_id.map(|u| *u.as_uuid()))
    .bind(invitee_user_id)
    .bind(invitee_email(&grant.invitee))
    .bind(grant.role.as_str())
    .bind(grant.status.as_str())
    .bind(grant.invited_by.as_uuid())
    .bind(grant.invited_at)
    .bind(grant.expires_at)
    .bind(grant.accepted_at)
    .bind(grant.revoked_at)
    .bind(grant.revoked_by.map(|u| *u.as_uuid()))
    .execute(&mut **tx)
    .await
    .map_err(|e| map_sqlx_error("insert_grant", e))?;
    Ok(())
}

fn invitee_email(invitee: &Invitee) -> Option<&str> {
    match invitee {
        Invitee::Email(addr) => Some(addr.as_str()),
        Invitee::User(_) => None,
    }
}

fn parse_role(raw: &str) -> Result<Role, StoreError> {
    raw.parse()
        .map_err(|e| StoreError::Corrupt(format!("role column: {e}")))
}

fn parse_status(raw: &str) -> Result<GrantStatus, StoreError> {
    raw.parse()
        .map_err(|e| StoreError::Corrupt(format!("status column: {e}")))
}

fn corrupt(err: sqlx::Error) -> StoreError {
    StoreError::Corrupt(format!("failed to decode row: {err}"))
}

fn decode_grant(row: &PgRow) -> Result<Grant, StoreError> {
    GrantRecord::from_row(row).map_err(corrupt)?.try_into()
}

fn decode_property(row: &PgRow) -> Result<Property, StoreError> {
    Ok(PropertyRecord::from_row(row).map_err(corrupt)?.into())
}

/// Map SQLx errors to StoreError.
fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {}: {}", operation, db_err.message());
            match db_err.code().as_deref() {
                Some("23505") => StoreError::DuplicateGrant,
                _ => StoreError::Storage(msg),
            }
        }
        sqlx::Error::PoolClosed | sqlx::Error::PoolTimedOut => {
            StoreError::Unavailable(format!("connection pool unavailable in {}", operation))
        }
        sqlx::Error::Io(e) => StoreError::Unavailable(format!("io error in {}: {}", operation, e)),
        sqlx::Error::Tls(e) => StoreError::Unavailable(format!("tls error in {}: {}", operation, e)),
        _ => StoreError::Storage(format!("sqlx error in {}: {}", operation, err)),
    }
}

// SQLx row types

#[derive(Debug)]
struct GrantRecord {
    grant_id: Uuid,
    property_id: Uuid,
    user_id: Option<Uuid>,
    invitee_user_id: Option<Uuid>,
    invitee_email: Option<String>,
    role: String,
    status: String,
    invited_by: Uuid,
    invited_at: DateTime<Utc>,
    expires_at: Option<DateTime<Utc>>,
    accepted_at: Option<DateTime<Utc>>,
    revoked_at: Option<DateTime<Utc>>,
    revoked_by: Option<Uuid>,
}

impl<'r> FromRow<'r, PgRow> for GrantRecord {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            grant_id: row.try_get("grant_id")?,
            property_id: row.try_get("property_id")?,
            user_id: row.try_get("user_id")?,
            invitee_user_id: row.try_get("invitee_user_id")?,
            invitee_email: row.try_get("invitee_email")?,
            role: row.try_get("role")?,
            status: row.try_get("status")?,
            invited_by: row.try_get("invited_by")?,
            invited_at: row.try_get("invited_at")?,
            expires_at: row.try_get("expires_at")?,
            accepted_at: row.try_get("accepted_at")?,
            revoked_at: row.try_get("revoked_at")?,
            revoked_by: row.try_get("revoked_by")?,
        })
    }
}

impl TryFrom<GrantRecord> for Grant {
    type Error = StoreError;

    fn try_from(row: GrantRecord) -> Result<Self, Self::Error> {
        let invitee = match (row.invitee_email, row.invitee_user_id) {
            (Some(email), _) => Invitee::Email(
                EmailAddress::parse(&email)
                    .map_err(|e| StoreError::Corrupt(format!("invitee_email column: {e}")))?,
            ),
            (None, Some(id)) => Invitee::User(UserId::from_uuid(id)),
            (None, None) => {
                return Err(StoreError::Corrupt(format!(
                    "grant {} has no invitee",
                    row.grant_id
                )));
            }
        };

        Ok(Grant {
            grant_id: GrantId::from_uuid(row.grant_id),
            property_id: PropertyId::from_uuid(row.property_id),
            invitee,
            user_id: row.user_id.map(UserId::from_uuid),
            role: parse_role(&row.role)?,
            status: parse_status(&row.status)?,
            invited_by: UserId::from_uuid(row.invited_by),
            invited_at: row.invited_at,
            expires_at: row.expires_at,
            accepted_at: row.accepted_at,
            revoked_at: row.revoked_at,
            revoked_by: row.revoked_by.map(UserId::from_uuid),
        })
    }
}

#[derive(Debug)]
struct PropertyRecord {
    property_id: Uuid,
    landlord_id: Uuid,
    name: String,
    created_at: DateTime<Utc>,
    disabled_at: Option<DateTime<Utc>>,
}

impl<'r> FromRow<'r, PgRow> for PropertyRecord {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            property_id: row.try_get("property_id")?,
            landlord_id: row.try_get("landlord_id")?,
            name: row.try_get("name")?,
            created_at: row.try_get("created_at")?,
            disabled_at: row.try_get("disabled_at")?,
        })
    }
}

impl From<PropertyRecord> for Property {
    fn from(row: PropertyRecord) -> Self {
        Property {
            property_id: PropertyId::from_uuid(row.property_id),
            landlord_id: UserId::from_uuid(row.landlord_id),
            name: row.name,
            created_at: row.created_at,
            disabled_at: row.disabled_at,
        }
    }
}
