use anyhow::{Context, Result};
use sqlx::{PgPool, postgres::PgPoolOptions};

/// Opens the journal database and applies the invoice migrations.
pub async fn connect(database_url: &str) -> Result<PgPool> {
    if !database_url.starts_with("postgres://") && !database_url.starts_with("postgresql://") {
        return Err(anyhow::anyhow!(
            "DATABASE_URL must start with postgres:// or postgresql://"
        ));
    }

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(database_url)
        .await
        .context("Failed to connect to PostgreSQL")?;

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .context("Failed to run invoice migrations")?;

    Ok(pool)
}
