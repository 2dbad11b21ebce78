#![allow(dead_code)]

use async_trait::async_trait;
use sqlx::PgPool;

use crate::errors::{map_unique_violation, AppError};
use crate::models::contact::{ContactPatch, ContactRow};

/// Record-level CRUD against the local contacts table. `AppState` carries
/// this as `Arc<dyn ContactStore>` so the reconciler can run against an
/// in-memory double in tests.
#[async_trait]
pub trait ContactStore: Send + Sync {
    async fn create(
        &self,
        name: &str,
        email: Option<&str>,
        phone: Option<&str>,
        external_id: Option<i64>,
    ) -> Result<ContactRow, AppError>;

    async fn get_by_id(&self, id: i64) -> Result<Option<ContactRow>, AppError>;

    /// Exact match.
    async fn get_by_email(&self, email: &str) -> Result<Option<ContactRow>, AppError>;

    async fn get_by_external_id(&self, external_id: i64) -> Result<Option<ContactRow>, AppError>;

    /// Case-insensitive substring match; ties break in insertion order.
    async fn get_by_name(&self, name: &str) -> Result<Option<ContactRow>, AppError>;

    /// Exact match.
    async fn get_by_phone(&self, phone: &str) -> Result<Option<ContactRow>, AppError>;

    /// Applies only the fields present in the patch. Returns `None` for an
    /// unknown id. Single-statement, so atomic at row granularity.
    async fn update(&self, id: i64, patch: &ContactPatch) -> Result<Option<ContactRow>, AppError>;

    async fn delete(&self, id: i64) -> Result<bool, AppError>;
}

pub struct PgContactStore {
    pool: PgPool,
}

impl PgContactStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ContactStore for PgContactStore {
    async fn create(
        &self,
        name: &str,
        email: Option<&str>,
        phone: Option<&str>,
        external_id: Option<i64>,
    ) -> Result<ContactRow, AppError> {
        sqlx::query_as::<_, ContactRow>(
            r#"
            INSERT INTO contacts (name, email, phone, external_id)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(name)
        .bind(email)
        .bind(phone)
        .bind(external_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            map_unique_violation(
                e,
                format!(
                    "A contact with email {} already exists",
                    email.unwrap_or_default()
                ),
            )
        })
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<ContactRow>, AppError> {
        Ok(
            sqlx::query_as::<_, ContactRow>("SELECT * FROM contacts WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    async fn get_by_email(&self, email: &str) -> Result<Option<ContactRow>, AppError> {
        Ok(
            sqlx::query_as::<_, ContactRow>("SELECT * FROM contacts WHERE email = $1")
                .bind(email)
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    async fn get_by_external_id(&self, external_id: i64) -> Result<Option<ContactRow>, AppError> {
        Ok(
            sqlx::query_as::<_, ContactRow>("SELECT * FROM contacts WHERE external_id = $1")
                .bind(external_id)
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    async fn get_by_name(&self, name: &str) -> Result<Option<ContactRow>, AppError> {
        Ok(sqlx::query_as::<_, ContactRow>(
            "SELECT * FROM contacts WHERE name ILIKE $1 ORDER BY id LIMIT 1",
        )
        .bind(format!("%{name}%"))
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn get_by_phone(&self, phone: &str) -> Result<Option<ContactRow>, AppError> {
        Ok(
            sqlx::query_as::<_, ContactRow>("SELECT * FROM contacts WHERE phone = $1")
                .bind(phone)
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    async fn update(&self, id: i64, patch: &ContactPatch) -> Result<Option<ContactRow>, AppError> {
        sqlx::query_as::<_, ContactRow>(
            r#"
            UPDATE contacts SET
                name        = COALESCE($2, name),
                email       = COALESCE($3, email),
                phone       = COALESCE($4, phone),
                external_id = COALESCE($5, external_id),
                updated_at  = now()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(patch.name.as_deref())
        .bind(patch.email.as_deref())
        .bind(patch.phone.as_deref())
        .bind(patch.external_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            map_unique_violation(
                e,
                format!(
                    "A contact with email {} already exists",
                    patch.email.as_deref().unwrap_or_default()
                ),
            )
        })
    }

    async fn delete(&self, id: i64) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM contacts WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
