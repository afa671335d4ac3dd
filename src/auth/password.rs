//! Credentials are stored in `users.password_hash` as Argon2id PHC strings
//! (`$argon2id$v=19$...`), salt and parameters included, so verification
//! needs nothing but the stored column. Registration and the seed users
//! written by the schema reset both go through [`hash_password`].
//!
//! Argon2 is deliberately slow; request handlers call the `*_blocking`
//! wrappers so hashing runs on tokio's blocking pool.

use anyhow::Context;
use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use rand::rngs::OsRng;

use crate::config::SeedUser;

pub fn hash_password(plain: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let phc = Argon2::default()
        .hash_password(plain.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("argon2 hash: {e}"))?;
    Ok(phc.to_string())
}

/// `Ok(false)` on mismatch. `Err` means the column does not hold a PHC
/// string at all, e.g. a row written before hashing was introduced.
pub fn verify_password(plain: &str, stored: &str) -> anyhow::Result<bool> {
    let parsed =
        PasswordHash::new(stored).map_err(|e| anyhow::anyhow!("stored password is not a PHC string: {e}"))?;
    Ok(Argon2::default()
        .verify_password(plain.as_bytes(), &parsed)
        .is_ok())
}

pub async fn hash_password_blocking(plain: String) -> anyhow::Result<String> {
    tokio::task::spawn_blocking(move || hash_password(&plain))
        .await
        .context("password hashing task")?
}

pub async fn verify_password_blocking(plain: String, stored: String) -> anyhow::Result<bool> {
    tokio::task::spawn_blocking(move || verify_password(&plain, &stored))
        .await
        .context("password verification task")?
}

/// One PHC string per seed user, in order.
pub async fn hash_seed_passwords(seeds: &[SeedUser]) -> anyhow::Result<Vec<String>> {
    let mut hashes = Vec::with_capacity(seeds.len());
    for seed in seeds {
        let hash = hash_password_blocking(seed.password.clone())
            .await
            .with_context(|| format!("hash seed password for {}", seed.username))?;
        hashes.push(hash);
    }
    Ok(hashes)
}
