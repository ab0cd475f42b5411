//! Versioned SQL schema for the SQLite backend.
//!
//! Migration files are embedded with `include_str!` and applied through
//! SQLite's `user_version` pragma.

use rusqlite::Connection;
use rusqlite_migration::{Migrations, M};

use crate::error::StorageError;

fn migrations() -> Migrations<'static> {
    Migrations::new(vec![
        M::up(include_str!("migrations/001_initial_schema.sql")),
        // Future migrations added here as new M::up(...) entries.
    ])
}

/// Applies pragmas and pending migrations to a freshly opened connection.
/// WAL gives concurrent readers alongside the single writer, and NORMAL
/// synchronous is safe under WAL.
pub fn prepare(conn: &mut Connection) -> Result<(), StorageError> {
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "synchronous", "NORMAL")?;
    conn.pragma_update(None, "foreign_keys", "ON")?;
    migrations()
        .to_latest(conn)
        .map_err(|e| StorageError::Migration(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn migrations_are_internally_valid() {
        migrations().validate().unwrap();
    }

    #[test]
    fn prepare_is_idempotent() {
        let mut conn = Connection::open_in_memory().unwrap();
        prepare(&mut conn).unwrap();
        prepare(&mut conn).unwrap();
    }
}
