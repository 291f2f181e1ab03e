//! Database operations module for SQLite storage
//!
//! This module handles all database operations including:
//! - Database initialization and migrations
//! - Admin user seeding and lookup
//! - Keyed reads and upserts for the journal tables

use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use tracing::{debug, info};

use crate::types::{Entry, EntryInput, Table, User, ADMIN_USERNAME};

/// Initialize the database at the given path, running any pending migrations
pub fn init_db(db_path: &Path, migrations_dir: &Path) -> Result<Connection> {
    let conn = Connection::open(db_path)
        .with_context(|| format!("Failed to open database at {}", db_path.display()))?;

    let count = run_migrations(&conn, migrations_dir)?;
    if count > 0 {
        info!(count = count, "Applied migrations");
    }

    Ok(conn)
}

/// Run pending migrations from the migrations directory
pub fn run_migrations(conn: &Connection, migrations_dir: &Path) -> Result<usize> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
             version TEXT PRIMARY KEY,
             applied_at TEXT NOT NULL
         );",
    )?;

    let mut migrations: Vec<_> = std::fs::read_dir(migrations_dir)
        .with_context(|| {
            format!(
                "Failed to read migrations directory: {}",
                migrations_dir.display()
            )
        })?
        .filter_map(|e| e.ok())
        .filter(|e| {
            e.path()
                .extension()
                .map(|ext| ext == "sql")
                .unwrap_or(false)
        })
        .map(|e| e.path())
        .collect();

    migrations.sort();

    let mut applied = 0;

    for migration_path in migrations {
        let version = migration_path
            .file_stem()
            .and_then(|s| s.to_str())
            .ok_or_else(|| anyhow::anyhow!("Invalid migration filename"))?
            .to_string();

        let already_applied: bool = conn.query_row(
            "SELECT COUNT(*) > 0 FROM schema_migrations WHERE version = ?1",
            [&version],
            |row| row.get(0),
        )?;

        if already_applied {
            continue;
        }

        let sql = std::fs::read_to_string(&migration_path)
            .with_context(|| format!("Failed to read migration: {}", migration_path.display()))?;

        conn.execute_batch(&sql)
            .with_context(|| format!("Failed to apply migration: {}", version))?;

        conn.execute(
            "INSERT INTO schema_migrations (version, applied_at) VALUES (?1, datetime('now'))",
            [&version],
        )?;

        debug!(version = %version, "Applied migration");
        applied += 1;
    }

    Ok(applied)
}

/// Look up a user by username
pub fn get_user_by_username(conn: &Connection, username: &str) -> Result<Option<User>> {
    let user = conn
        .query_row(
            "SELECT id, username, password FROM users WHERE username = ?1",
            [username],
            |row| {
                Ok(User {
                    id: row.get(0)?,
                    username: row.get(1)?,
                    password: row.get(2)?,
                })
            },
        )
        .optional()?;
    Ok(user)
}

/// Insert a new user and return it with its assigned id
pub fn create_user(conn: &Connection, username: &str, password: &str) -> Result<User> {
    conn.execute(
        "INSERT INTO users (username, password) VALUES (?1, ?2)",
        params![username, password],
    )
    .with_context(|| format!("Failed to create user {}", username))?;

    Ok(User {
        id: conn.last_insert_rowid(),
        username: username.to_string(),
        password: password.to_string(),
    })
}

/// Create the admin user if it does not exist yet.
/// An existing admin keeps its stored password. Returns true when a user was created.
pub fn ensure_admin(conn: &Connection, password: &str) -> Result<bool> {
    if get_user_by_username(conn, ADMIN_USERNAME)?.is_some() {
        return Ok(false);
    }
    create_user(conn, ADMIN_USERNAME, password)?;
    Ok(true)
}

fn select_sql(table: &Table) -> String {
    let columns: Vec<String> = table
        .fields
        .iter()
        .map(|f| format!("\"{}\"", f.name))
        .collect();
    format!(
        "SELECT id, \"{key}\", {columns} FROM {name} WHERE \"{key}\" = ?1",
        key = table.key,
        columns = columns.join(", "),
        name = table.name,
    )
}

fn entry_from_row(table: &'static Table, row: &Row) -> rusqlite::Result<Entry> {
    let mut values = Vec::with_capacity(table.fields.len());
    for idx in 0..table.fields.len() {
        let value: Option<String> = row.get(idx + 2)?;
        values.push(value.unwrap_or_default());
    }
    Ok(Entry {
        table,
        id: Some(row.get(0)?),
        key: row.get(1)?,
        values,
    })
}

/// Get the entry stored under `key`, if any
pub fn get_entry(conn: &Connection, table: &'static Table, key: &str) -> Result<Option<Entry>> {
    let entry = conn
        .query_row(&select_sql(table), [key], |row| entry_from_row(table, row))
        .optional()
        .with_context(|| format!("Failed to read {} for {}", table.noun, key))?;
    Ok(entry)
}

/// Insert or update the entry for `input.key`.
///
/// An existing row only has the sent fields overwritten. A new row gets an
/// empty string for every field that was not sent.
pub fn upsert_entry(conn: &Connection, input: &EntryInput) -> Result<Entry> {
    let table = input.table;
    let tx = conn.unchecked_transaction()?;

    let existing: Option<i64> = tx
        .query_row(
            &format!(
                "SELECT id FROM {} WHERE \"{}\" = ?1",
                table.name, table.key
            ),
            [&input.key],
            |row| row.get(0),
        )
        .optional()?;

    match existing {
        Some(id) if !input.values.is_empty() => {
            let set_clauses: Vec<String> = input
                .values
                .iter()
                .map(|(name, _)| format!("\"{}\" = ?", name))
                .collect();
            let sql = format!(
                "UPDATE {} SET {} WHERE id = ?",
                table.name,
                set_clauses.join(", ")
            );

            let mut params_vec: Vec<&dyn rusqlite::ToSql> = input
                .values
                .iter()
                .map(|(_, value)| value as &dyn rusqlite::ToSql)
                .collect();
            params_vec.push(&id);

            tx.execute(&sql, params_vec.as_slice())?;
            debug!(table = table.name, key = %input.key, "Updated entry");
        }
        Some(_) => {
            debug!(table = table.name, key = %input.key, "Nothing to update");
        }
        None => {
            let mut columns = vec![format!("\"{}\"", table.key)];
            let mut values: Vec<&str> = vec![input.key.as_str()];
            for field in table.fields {
                columns.push(format!("\"{}\"", field.name));
                let value = input
                    .values
                    .iter()
                    .find(|(name, _)| *name == field.name)
                    .map(|(_, value)| value.as_str())
                    .unwrap_or("");
                values.push(value);
            }
            let placeholders: Vec<&str> = vec!["?"; columns.len()];
            let sql = format!(
                "INSERT INTO {} ({}) VALUES ({})",
                table.name,
                columns.join(", "),
                placeholders.join(", ")
            );

            tx.execute(&sql, rusqlite::params_from_iter(values))?;
            debug!(table = table.name, key = %input.key, "Inserted entry");
        }
    }

    let entry = get_entry(&tx, table, &input.key)?
        .ok_or_else(|| anyhow::anyhow!("{} for {} vanished after upsert", table.noun, input.key))?;
    tx.commit()?;

    Ok(entry)
}

/// Count all rows in a journal table
#[cfg(test)]
pub fn count_entries(conn: &Connection, table: &Table) -> Result<usize> {
    let count: i64 = conn.query_row(
        &format!("SELECT COUNT(*) FROM {}", table.name),
        [],
        |row| row.get(0),
    )?;
    Ok(count as usize)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{SCHOOL, SPECIAL, WHATIDID};
    use tempfile::TempDir;

    fn setup_test_db() -> (TempDir, Connection) {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("test.db");
        let migrations_dir = temp_dir.path().join("migrations");
        std::fs::create_dir(&migrations_dir).unwrap();

        std::fs::write(
            migrations_dir.join("001_initial_schema.sql"),
            include_str!("../db/migrations/001_initial_schema.sql"),
        )
        .unwrap();

        let conn = init_db(&db_path, &migrations_dir).unwrap();
        (temp_dir, conn)
    }

    fn input(table: &'static Table, key: &str, values: &[(&'static str, &str)]) -> EntryInput {
        EntryInput {
            table,
            key: key.to_string(),
            values: values
                .iter()
                .map(|(name, value)| (*name, value.to_string()))
                .collect(),
        }
    }

    // ========== init_db tests ==========

    #[test]
    fn test_init_db_creates_tables() {
        let (_temp_dir, conn) = setup_test_db();

        for name in ["users", "school_entries", "whatidid_entries", "special_entries"] {
            let table_exists: bool = conn
                .query_row(
                    "SELECT COUNT(*) > 0 FROM sqlite_master WHERE type='table' AND name=?1",
                    [name],
                    |row| row.get(0),
                )
                .unwrap();
            assert!(table_exists, "missing table {}", name);
        }
    }

    #[test]
    fn test_init_db_idempotent() {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("test.db");
        let migrations_dir = temp_dir.path().join("migrations");
        std::fs::create_dir(&migrations_dir).unwrap();

        std::fs::write(
            migrations_dir.join("001_initial_schema.sql"),
            include_str!("../db/migrations/001_initial_schema.sql"),
        )
        .unwrap();

        let conn1 = init_db(&db_path, &migrations_dir).unwrap();
        upsert_entry(&conn1, &input(&SCHOOL, "2024-06-24", &[("p1", "Maths")])).unwrap();
        drop(conn1);

        let conn2 = init_db(&db_path, &migrations_dir).unwrap();
        let applied = run_migrations(&conn2, &migrations_dir).unwrap();
        assert_eq!(applied, 0);
        assert_eq!(count_entries(&conn2, &SCHOOL).unwrap(), 1);
    }

    #[test]
    fn test_init_db_missing_migrations_dir() {
        let temp_dir = TempDir::new().unwrap();
        let result = init_db(
            &temp_dir.path().join("test.db"),
            &temp_dir.path().join("nowhere"),
        );
        assert!(result.is_err());
    }

    // ========== User tests ==========

    #[test]
    fn test_ensure_admin_creates_once() {
        let (_temp_dir, conn) = setup_test_db();

        assert!(ensure_admin(&conn, "first").unwrap());
        assert!(!ensure_admin(&conn, "second").unwrap());

        let admin = get_user_by_username(&conn, "admin").unwrap().unwrap();
        assert_eq!(admin.password, "first");
    }

    #[test]
    fn test_get_unknown_user() {
        let (_temp_dir, conn) = setup_test_db();
        assert!(get_user_by_username(&conn, "ghost").unwrap().is_none());
    }

    #[test]
    fn test_create_user_rejects_duplicate_username() {
        let (_temp_dir, conn) = setup_test_db();
        create_user(&conn, "alice", "pw").unwrap();
        assert!(create_user(&conn, "alice", "other").is_err());
    }

    // ========== Entry tests ==========

    #[test]
    fn test_get_missing_entry() {
        let (_temp_dir, conn) = setup_test_db();
        assert!(get_entry(&conn, &SCHOOL, "2024-06-24").unwrap().is_none());
    }

    #[test]
    fn test_insert_fills_unset_fields_with_empty_strings() {
        let (_temp_dir, conn) = setup_test_db();

        let entry = upsert_entry(&conn, &input(&SCHOOL, "2024-06-24", &[("p2", "Chemistry")]))
            .unwrap();

        assert!(entry.id.is_some());
        assert_eq!(entry.key, "2024-06-24");
        assert_eq!(entry.get("p2"), Some("Chemistry"));
        assert_eq!(entry.get("p1"), Some(""));
        assert_eq!(entry.get("p8"), Some(""));
    }

    #[test]
    fn test_upsert_is_idempotent_per_key() {
        let (_temp_dir, conn) = setup_test_db();
        let payload = input(&WHATIDID, "2024-07-01", &[("ioqm", "Geometry set 4")]);

        let first = upsert_entry(&conn, &payload).unwrap();
        let second = upsert_entry(&conn, &payload).unwrap();

        assert_eq!(first, second);
        assert_eq!(count_entries(&conn, &WHATIDID).unwrap(), 1);
    }

    #[test]
    fn test_update_keeps_fields_not_sent() {
        let (_temp_dir, conn) = setup_test_db();

        upsert_entry(
            &conn,
            &input(&SCHOOL, "2024-06-24", &[("p1", "Maths"), ("p2", "Physics")]),
        )
        .unwrap();
        let updated =
            upsert_entry(&conn, &input(&SCHOOL, "2024-06-24", &[("p2", "Biology")])).unwrap();

        assert_eq!(updated.get("p1"), Some("Maths"));
        assert_eq!(updated.get("p2"), Some("Biology"));
    }

    #[test]
    fn test_update_with_no_fields_is_a_no_op() {
        let (_temp_dir, conn) = setup_test_db();

        let stored =
            upsert_entry(&conn, &input(&SCHOOL, "2024-06-24", &[("p1", "Maths")])).unwrap();
        let again = upsert_entry(&conn, &input(&SCHOOL, "2024-06-24", &[])).unwrap();

        assert_eq!(stored, again);
    }

    #[test]
    fn test_entries_are_scoped_by_table() {
        let (_temp_dir, conn) = setup_test_db();

        upsert_entry(&conn, &input(&SCHOOL, "2024-06-24", &[("p1", "Maths")])).unwrap();

        assert!(get_entry(&conn, &WHATIDID, "2024-06-24").unwrap().is_none());
        assert_eq!(count_entries(&conn, &SCHOOL).unwrap(), 1);
        assert_eq!(count_entries(&conn, &WHATIDID).unwrap(), 0);
    }

    #[test]
    fn test_special_entry_upsert() {
        let (_temp_dir, conn) = setup_test_db();

        upsert_entry(
            &conn,
            &input(&SPECIAL, "holiday_homework", &[("content", "# Week 1")]),
        )
        .unwrap();
        let updated = upsert_entry(
            &conn,
            &input(&SPECIAL, "holiday_homework", &[("content", "# Week 2")]),
        )
        .unwrap();

        assert_eq!(updated.get("content"), Some("# Week 2"));
        assert_eq!(count_entries(&conn, &SPECIAL).unwrap(), 1);
        assert!(get_entry(&conn, &SPECIAL, "what_had_done").unwrap().is_none());
    }

    #[test]
    fn test_null_columns_read_as_empty() {
        let (_temp_dir, conn) = setup_test_db();
        conn.execute(
            "INSERT INTO whatidid_entries (date, ioqm, nsep, schol) VALUES ('2024-06-24', NULL, 'x', NULL)",
            [],
        )
        .unwrap();

        let entry = get_entry(&conn, &WHATIDID, "2024-06-24").unwrap().unwrap();
        assert_eq!(entry.values, vec!["", "x", ""]);
    }

    #[test]
    fn test_multiline_content_round_trips() {
        let (_temp_dir, conn) = setup_test_db();
        let text = "# Plan\n- [ ] Essay\n- [x] Reading\n{https://example.com/a.png}";

        upsert_entry(&conn, &input(&SPECIAL, "what_had_done", &[("content", text)])).unwrap();

        let entry = get_entry(&conn, &SPECIAL, "what_had_done").unwrap().unwrap();
        assert_eq!(entry.get("content"), Some(text));
    }
}
