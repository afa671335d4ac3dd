use anyhow::Context;
use sqlx::{PgExecutor, PgPool};

use super::repo_types::{NewUser, User, UserListing};

impl User {
    pub async fn find_by_username(db: &PgPool, username: &str) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, username, password_hash, full_name, is_admin
            FROM users
            WHERE username = $1
            "#,
        )
        .bind(username)
        .fetch_optional(db)
        .await
        .context("find user by username")?;
        Ok(user)
    }

    /// Returns `(id, username)` of the inserted row.
    pub async fn create<'e>(
        db: impl PgExecutor<'e>,
        new: &NewUser<'_>,
    ) -> anyhow::Result<(i32, String)> {
        let row = sqlx::query_as::<_, (i32, String)>(
            r#"
            INSERT INTO users (username, password_hash, full_name, is_admin)
            VALUES ($1, $2, $3, $4)
            RETURNING id, username
            "#,
        )
        .bind(new.username)
        .bind(new.password_hash)
        .bind(new.full_name)
        .bind(new.is_admin)
        .fetch_one(db)
        .await
        .context("insert user")?;
        Ok(row)
    }
}

pub async fn list_users(db: &PgPool) -> anyhow::Result<Vec<UserListing>> {
    let rows = sqlx::query_as::<_, UserListing>(
        r#"
        SELECT id, username, full_name, is_admin
          FROM users
         ORDER BY id
        "#,
    )
    .fetch_all(db)
    .await
    .context("list users")?;
    Ok(rows)
}
