//! SQLite-backed datastore

use std::sync::{Mutex, MutexGuard};

use cb_calendar::SourceKind;
use rusqlite::{Connection, params};
use tracing::{debug, warn};

use crate::store::{CalendarRecord, Datastore, UserRecord};
use crate::{Error, Result};

/// SQLite-based user and calendar store
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (or create) the database at the given path
    pub fn new(db_path: &str) -> Result<Self> {
        let conn = Connection::open(db_path)?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_tables()?;
        debug!("Opened database: {}", db_path);
        Ok(store)
    }

    /// Create an in-memory store (for testing)
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_tables()?;
        Ok(store)
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| Error::Other("database connection lock poisoned".to_string()))
    }

    /// Initialize database tables
    fn init_tables(&self) -> Result<()> {
        let conn = self.conn()?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS users (
                user_id TEXT PRIMARY KEY,
                room_id TEXT NOT NULL,
                created DATETIME DEFAULT CURRENT_TIMESTAMP
            )",
            [],
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS calendar (
                id INTEGER NOT NULL PRIMARY KEY AUTOINCREMENT,
                user_id TEXT NOT NULL,
                name TEXT NOT NULL,
                cal_type TEXT NOT NULL,
                uri TEXT NOT NULL,
                created DATETIME DEFAULT CURRENT_TIMESTAMP
            )",
            [],
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_calendar_user_id ON calendar(user_id)",
            [],
        )?;

        Ok(())
    }
}

impl Datastore for SqliteStore {
    fn fetch_all_users(&self) -> Result<Vec<UserRecord>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT user_id, room_id FROM users")?;

        let rows = stmt.query_map([], |row| {
            Ok(UserRecord {
                user_id: row.get(0)?,
                room_id: row.get(1)?,
            })
        })?;

        let mut users = Vec::new();
        for user in rows {
            users.push(user?);
        }
        Ok(users)
    }

    fn fetch_all_calendars(&self) -> Result<Vec<CalendarRecord>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT id, user_id, name, cal_type, uri FROM calendar ORDER BY id")?;

        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, String>(4)?,
            ))
        })?;

        let mut calendars = Vec::new();
        for row in rows {
            let (id, user_id, name, cal_type, uri) = row?;
            let Ok(kind) = cal_type.parse::<SourceKind>() else {
                warn!(row_id = id, "Unknown calendar type in database: {:?}", cal_type);
                continue;
            };
            calendars.push(CalendarRecord {
                id,
                user_id,
                name,
                kind,
                uri,
            });
        }
        Ok(calendars)
    }

    fn add_user(&self, user_id: &str, room_id: &str) -> Result<()> {
        self.conn()?.execute(
            "INSERT INTO users (user_id, room_id) VALUES (?1, ?2)",
            params![user_id, room_id],
        )?;
        Ok(())
    }

    fn update_user_room_id(&self, user_id: &str, room_id: &str) -> Result<()> {
        self.conn()?.execute(
            "UPDATE users SET room_id = ?2 WHERE user_id = ?1",
            params![user_id, room_id],
        )?;
        Ok(())
    }

    fn add_calendar(&self, user_id: &str, name: &str, kind: SourceKind, uri: &str) -> Result<i64> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO calendar (user_id, name, cal_type, uri) VALUES (?1, ?2, ?3, ?4)",
            params![user_id, name, kind.as_str(), uri],
        )?;
        Ok(conn.last_insert_rowid())
    }

    fn remove_calendar(&self, user_id: &str, name: &str) -> Result<()> {
        self.conn()?.execute(
            "DELETE FROM calendar WHERE user_id = ?1 AND name = ?2",
            params![user_id, name],
        )?;
        Ok(())
    }
}
