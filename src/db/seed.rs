use crate::domain::models::UserRole;
use anyhow::Result;
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHasher, SaltString},
    Argon2,
};
use sqlx::PgPool;

/// Bootstrap the initial admin account from the environment so a fresh deploy
/// is usable without manual SQL. No-op when the email already exists.
pub async fn seed_admin(pool: &PgPool) -> Result<()> {
    let (email, password) = match (
        std::env::var("ADMIN_EMAIL"),
        std::env::var("ADMIN_PASSWORD"),
    ) {
        (Ok(email), Ok(password)) => (email, password),
        _ => {
            tracing::debug!("ADMIN_EMAIL/ADMIN_PASSWORD not set, skipping admin seed");
            return Ok(());
        }
    };

    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("Failed to hash admin password: {}", e))?
        .to_string();

    let inserted = sqlx::query(
        r#"
        INSERT INTO users (email, hash, full_name, role)
        VALUES ($1, $2, 'Administrator', $3)
        ON CONFLICT (email) DO NOTHING
        "#,
    )
    .bind(&email)
    .bind(&hash)
    .bind(UserRole::Admin)
    .execute(pool)
    .await?;

    if inserted.rows_affected() > 0 {
        tracing::info!("Seeded admin account {}", email);
    }
    Ok(())
}
