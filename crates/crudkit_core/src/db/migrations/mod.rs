//! SQLite migration registry and executor.
//!
//! # Responsibility
//! - Register one migration per resource family, in strictly increasing
//!   version order.
//! - Bring a connection from any older version up to `latest_version()`
//!   in a single transaction.
//!
//! # Invariants
//! - `version` values are contiguous from 1 and never reused.
//! - The applied version is mirrored to `PRAGMA user_version`.
//! - Two connections racing on a fresh file migrate it exactly once.

use crate::db::{StorageError, StorageResult};
use log::info;
use rusqlite::{Connection, TransactionBehavior};

#[derive(Debug, Clone, Copy)]
struct Migration {
    version: u32,
    name: &'static str,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "pantry",
        sql: include_str!("0001_pantry.sql"),
    },
    Migration {
        version: 2,
        name: "bookmarks",
        sql: include_str!("0002_bookmarks.sql"),
    },
    Migration {
        version: 3,
        name: "inventory",
        sql: include_str!("0003_inventory.sql"),
    },
    Migration {
        version: 4,
        name: "counters",
        sql: include_str!("0004_counters.sql"),
    },
];

/// Schema version a fully migrated database carries.
pub fn latest_version() -> u32 {
    MIGRATIONS.last().map_or(0, |migration| migration.version)
}

/// Upgrades `conn` to `latest_version()`.
///
/// # Errors
/// - `UnsupportedSchemaVersion` when the file was written by a newer build.
/// - `Sqlite` when a migration statement fails; nothing is applied then.
pub fn apply_migrations(conn: &mut Connection) -> StorageResult<()> {
    let latest = latest_version();
    let observed = current_user_version(conn)?;
    check_supported(observed, latest)?;
    if observed == latest {
        return Ok(());
    }

    // Re-read under the write lock: another connection may have migrated
    // between the check above and acquiring it.
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let from_version = current_user_version(&tx)?;
    check_supported(from_version, latest)?;

    let pending = MIGRATIONS
        .iter()
        .filter(|migration| migration.version > from_version);
    for migration in pending {
        tx.execute_batch(migration.sql)?;
        tx.pragma_update(None, "user_version", migration.version)?;
        info!(
            "event=db_migrate module=db status=ok version={} name={}",
            migration.version, migration.name
        );
    }
    tx.commit()?;

    Ok(())
}

/// Reads the schema version stamped on the connection.
pub fn current_user_version(conn: &Connection) -> StorageResult<u32> {
    let version = conn.query_row("PRAGMA user_version;", [], |row| row.get::<_, u32>(0))?;
    Ok(version)
}

fn check_supported(db_version: u32, latest_supported: u32) -> StorageResult<()> {
    if db_version > latest_supported {
        return Err(StorageError::UnsupportedSchemaVersion {
            db_version,
            latest_supported,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{apply_migrations, current_user_version, latest_version, MIGRATIONS};
    use rusqlite::Connection;

    #[test]
    fn versions_are_contiguous_from_one() {
        for (index, migration) in MIGRATIONS.iter().enumerate() {
            assert_eq!(migration.version as usize, index + 1, "{}", migration.name);
        }
    }

    #[test]
    fn partially_migrated_database_is_brought_up_to_date() {
        let mut conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(MIGRATIONS[0].sql).unwrap();
        conn.pragma_update(None, "user_version", 1).unwrap();

        apply_migrations(&mut conn).unwrap();
        assert_eq!(current_user_version(&conn).unwrap(), latest_version());

        let counters: i64 = conn
            .query_row("SELECT COUNT(*) FROM counters;", [], |row| row.get(0))
            .unwrap();
        assert_eq!(counters, 0);
    }
}
