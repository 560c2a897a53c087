//! Function registration in the hosted database
//!
//! Bookkeeping only: upserts one row per function into an `edge_functions`
//! table so the deployment is visible in the database. Registration is
//! best-effort; the caller treats a returned error as a soft failure and
//! continues with the remaining steps.

use anyhow::{Context, Result};
use sqlx::postgres::PgPoolOptions;
use std::time::Duration;

use crate::config::Settings;
use crate::manifest::FunctionSpec;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

const CREATE_TABLE_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS edge_functions (
    id UUID DEFAULT gen_random_uuid() PRIMARY KEY,
    name TEXT UNIQUE NOT NULL,
    slug TEXT UNIQUE NOT NULL,
    created_at TIMESTAMPTZ DEFAULT NOW(),
    updated_at TIMESTAMPTZ DEFAULT NOW()
)
"#;

const UPSERT_SQL: &str = r#"
INSERT INTO edge_functions (name, slug)
VALUES ($1, $2)
ON CONFLICT (name) DO UPDATE
SET updated_at = NOW()
"#;

/// Upsert every function into the `edge_functions` table.
///
/// Stale rows for functions no longer in the manifest are left in place;
/// there is no deletion path. Returns the number of rows upserted.
pub async fn register(settings: &Settings, functions: &[FunctionSpec]) -> Result<usize> {
    let pool = PgPoolOptions::new()
        .max_connections(1)
        .acquire_timeout(CONNECT_TIMEOUT)
        .connect(&settings.database_url())
        .await
        .context("Failed to connect to the hosted database")?;

    let result = register_with_pool(&pool, functions).await;

    // Release the connection on every exit path
    pool.close().await;
    result
}

async fn register_with_pool(
    pool: &sqlx::PgPool,
    functions: &[FunctionSpec],
) -> Result<usize> {
    sqlx::query(CREATE_TABLE_SQL)
        .execute(pool)
        .await
        .context("Failed to ensure edge_functions table exists")?;

    let mut count = 0;
    for func in functions {
        sqlx::query(UPSERT_SQL)
            .bind(&func.name)
            .bind(&func.slug)
            .execute(pool)
            .await
            .with_context(|| format!("Failed to register function {}", func.name))?;

        tracing::info!("Registered function: {}", func.name);
        count += 1;
    }

    Ok(count)
}
