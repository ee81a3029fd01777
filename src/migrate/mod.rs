//! Embedded schema migrations.
//!
//! Migrations live in `migrations/` as reversible `*.up.sql` / `*.down.sql`
//! pairs and are compiled into the binary.

use sqlx::migrate::{Migrate, Migrator};
use thiserror::Error;

use crate::db::Database;

static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

#[derive(Debug, Error)]
pub enum MigrateError {
    #[error("migration failed: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Apply every pending migration.
pub async fn up(db: &Database) -> Result<(), MigrateError> {
    MIGRATOR.run(db.pool()).await?;
    tracing::info!("Migrations applied");
    Ok(())
}

/// Revert the `steps` most recent migrations (at least one).
pub async fn down(db: &Database, steps: u32) -> Result<(), MigrateError> {
    let applied = applied_versions(db).await?;
    let target = down_target(&applied, steps);
    MIGRATOR.undo(db.pool(), target).await?;
    tracing::info!(steps = steps.max(1), target, "Migrations reverted");
    Ok(())
}

/// Revert every migration.
pub async fn reset(db: &Database) -> Result<(), MigrateError> {
    MIGRATOR.undo(db.pool(), 0).await?;
    tracing::info!("Migrations reset to version 0");
    Ok(())
}

/// Versions recorded as applied, ascending.
pub async fn applied_versions(db: &Database) -> Result<Vec<i64>, MigrateError> {
    let mut conn = db.pool().acquire().await?;
    conn.ensure_migrations_table().await?;
    let mut versions: Vec<i64> = conn
        .list_applied_migrations()
        .await?
        .into_iter()
        .map(|migration| migration.version)
        .collect();
    versions.sort_unstable();
    Ok(versions)
}

/// Version to undo down to so that `steps` applied migrations are reverted.
pub fn down_target(applied: &[i64], steps: u32) -> i64 {
    let steps = steps.max(1) as usize;
    if steps >= applied.len() {
        0
    } else {
        applied[applied.len() - steps - 1]
    }
}

/// Every embedded migration as `(version, description)`.
pub fn embedded() -> impl Iterator<Item = (i64, &'static str)> {
    MIGRATOR
        .iter()
        .filter(|migration| migration.migration_type.is_up_migration())
        .map(|migration| (migration.version, migration.description.as_ref()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_down_target() {
        let applied = [1, 2, 3];

        assert_eq!(down_target(&applied, 1), 2);
        assert_eq!(down_target(&applied, 2), 1);
        assert_eq!(down_target(&applied, 3), 0);
        assert_eq!(down_target(&applied, 10), 0);
        // Zero steps still reverts one.
        assert_eq!(down_target(&applied, 0), 2);
        assert_eq!(down_target(&[], 1), 0);
    }

    #[test]
    fn test_users_migration_is_embedded() {
        let migrations: Vec<_> = embedded().collect();
        assert!(migrations
            .iter()
            .any(|(_, description)| description.contains("create users")));
    }
}
