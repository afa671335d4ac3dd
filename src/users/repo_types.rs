use serde::Serialize;
use sqlx::FromRow;

/// Full user row, only used server-side.
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: i32,
    pub username: String,
    pub password_hash: String,
    pub full_name: Option<String>,
    pub is_admin: bool,
}

/// What `/api/users` exposes. There is no password column here at all.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct UserListing {
    pub id: i32,
    pub username: String,
    pub full_name: Option<String>,
    pub is_admin: bool,
}

/// Input for inserting a user; `password_hash` is already an Argon2 PHC string.
#[derive(Debug)]
pub struct NewUser<'a> {
    pub username: &'a str,
    pub password_hash: &'a str,
    pub full_name: &'a str,
    pub is_admin: bool,
}
