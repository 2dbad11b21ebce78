use anyhow::Result;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::info;

/// Creates and returns a PostgreSQL connection pool.
pub async fn create_pool(database_url: &str) -> Result<PgPool> {
    info!("Connecting to PostgreSQL...");

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(database_url)
        .await?;

    info!("PostgreSQL connection pool established");
    Ok(pool)
}

/// Bootstraps the contacts table on startup. `email` and `external_id` carry
/// unique indexes; `external_id` stays NULL until Pipedrive accepts the
/// record, and may stay NULL forever.
pub async fn init_schema(pool: &PgPool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS contacts (
            id          BIGSERIAL PRIMARY KEY,
            name        TEXT NOT NULL,
            email       TEXT UNIQUE,
            phone       TEXT,
            external_id BIGINT UNIQUE,
            created_at  TIMESTAMPTZ NOT NULL DEFAULT now(),
            updated_at  TIMESTAMPTZ NOT NULL DEFAULT now()
        )
        "#,
    )
    .execute(pool)
    .await?;

    info!("Contacts schema ready");
    Ok(())
}
