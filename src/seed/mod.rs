//! Sample data.

use crate::db::Database;
use crate::id;

/// Emails of the sample users.
pub const SAMPLE_USERS: [&str; 2] = ["user1@example.com", "user2@example.com"];

/// Insert the sample users, skipping any email that already exists.
///
/// Returns how many rows were inserted, so a second run reports 0.
pub async fn seed_all(db: &Database) -> Result<u64, sqlx::Error> {
    let mut tx = db.pool().begin().await?;
    let mut inserted = 0;

    for email in SAMPLE_USERS {
        let result = sqlx::query(
            "INSERT INTO users (id, email, created_at) VALUES ($1, $2, now()) \
             ON CONFLICT (email) DO NOTHING",
        )
        .bind(id::new())
        .bind(email)
        .execute(&mut *tx)
        .await?;
        inserted += result.rows_affected();
    }

    tx.commit().await?;
    tracing::info!(count = SAMPLE_USERS.len(), inserted, "Seed users applied");
    Ok(inserted)
}
