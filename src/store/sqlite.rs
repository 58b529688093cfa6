//! SQLite-backed datastore. `date` is the primary key, so the insert doubles as
//! the conditional write that keeps two processes from storing the same day.

use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, Connection, ErrorCode, OptionalExtension};
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

use super::{window_bounds, Datastore, StoredCompliment};
use crate::error::StoreError;

const DATE_FMT: &str = "%Y-%m-%d";

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| StoreError::Io(e.to_string()))?;
        }
        let conn = Connection::open(path)?;
        Self::with_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, StoreError> {
        conn.busy_timeout(Duration::from_secs(5))?;
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS compliments (
                date TEXT PRIMARY KEY,
                text TEXT NOT NULL,
                headline_title TEXT NOT NULL,
                created_at TEXT NOT NULL
            );
            "#,
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|p| p.into_inner())
    }
}

fn parse_row(
    date: String,
    text: String,
    headline_title: String,
    created_at: String,
) -> Result<StoredCompliment, StoreError> {
    let date = NaiveDate::parse_from_str(&date, DATE_FMT)
        .map_err(|e| StoreError::Io(format!("bad date '{date}': {e}")))?;
    let created_at = DateTime::parse_from_rfc3339(&created_at)
        .map_err(|e| StoreError::Io(format!("bad created_at '{created_at}': {e}")))?
        .with_timezone(&Utc);
    Ok(StoredCompliment {
        date,
        text,
        headline_title,
        created_at,
    })
}

#[async_trait::async_trait]
impl Datastore for SqliteStore {
    async fn get_by_date(&self, date: NaiveDate) -> Result<Option<StoredCompliment>, StoreError> {
        let raw = {
            let conn = self.lock();
            conn.query_row(
                "SELECT date, text, headline_title, created_at FROM compliments WHERE date = ?1",
                [date.format(DATE_FMT).to_string()],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                    ))
                },
            )
            .optional()?
        };
        raw.map(|(d, t, h, c)| parse_row(d, t, h, c)).transpose()
    }

    async fn insert(&self, row: StoredCompliment) -> Result<(), StoreError> {
        let conn = self.lock();
        let res = conn.execute(
            "INSERT INTO compliments (date, text, headline_title, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![
                row.date.format(DATE_FMT).to_string(),
                row.text,
                row.headline_title,
                row.created_at.to_rfc3339(),
            ],
        );
        match res {
            Ok(_) => Ok(()),
            Err(rusqlite::Error::SqliteFailure(e, _)) if e.code == ErrorCode::ConstraintViolation => {
                Err(StoreError::DuplicateKey(row.date))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn recent_texts(&self, around: NaiveDate, window_days: u32) -> Result<Vec<String>, StoreError> {
        let (from, to) = window_bounds(around, window_days);
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT text FROM compliments WHERE date >= ?1 AND date <= ?2 AND date <> ?3 ORDER BY date DESC",
        )?;
        let rows = stmt.query_map(
            [
                from.format(DATE_FMT).to_string(),
                to.format(DATE_FMT).to_string(),
                around.format(DATE_FMT).to_string(),
            ],
            |row| row.get::<_, String>(0),
        )?;
        rows.collect::<Result<Vec<_>, _>>().map_err(StoreError::from)
    }
}
