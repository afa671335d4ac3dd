use std::path::Path;

use anyhow::Context;
use sqlx::{Executor, PgPool};
use tracing::info;

use crate::{
    auth::password::hash_seed_passwords,
    config::SeedUser,
    users::repo_types::{NewUser, User},
};

/// Dependents first so foreign keys never block a drop.
const DROP_ORDER: [&str; 3] = ["receipt_images", "reports", "users"];

pub async fn load_script(path: &Path) -> anyhow::Result<String> {
    tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("read schema script {}", path.display()))
}

/// Runs the idempotent schema script as-is.
pub async fn ensure_schema(db: &PgPool, script: &str) -> anyhow::Result<()> {
    db.execute(script).await.context("apply schema script")?;
    Ok(())
}

/// Drops all three tables, recreates them from `script`, and inserts `seeds`.
/// Runs in one transaction, so a failure leaves the previous schema intact.
pub async fn reset_schema(db: &PgPool, script: &str, seeds: &[SeedUser]) -> anyhow::Result<usize> {
    let hashes = hash_seed_passwords(seeds).await?;

    let mut tx = db.begin().await.context("begin tx")?;
    for table in DROP_ORDER {
        let stmt = format!("DROP TABLE IF EXISTS {table} CASCADE");
        (&mut *tx)
            .execute(stmt.as_str())
            .await
            .with_context(|| format!("drop table {table}"))?;
    }
    (&mut *tx)
        .execute(script)
        .await
        .context("apply schema script")?;

    for (seed, hash) in seeds.iter().zip(&hashes) {
        let new_user = NewUser {
            username: &seed.username,
            password_hash: hash,
            full_name: &seed.full_name,
            is_admin: seed.is_admin,
        };
        User::create(&mut *tx, &new_user)
            .await
            .with_context(|| format!("seed user {}", seed.username))?;
    }
    tx.commit().await.context("commit tx")?;

    info!(seeded = seeds.len(), "schema reset");
    Ok(seeds.len())
}
