//! SQLite persistence for interactions and contacts.
//!
//! A thin CRUD layer backing the engine's storage seams: it serves the
//! reminder collection as a [`ReminderSource`] and plays the external
//! backend as a [`RemoteStore`]. Timestamps are stored as RFC 3339 strings,
//! tags as a JSON array.

use std::collections::BTreeSet;
use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::{params, Connection, Row};
use uuid::Uuid;

use crate::error::EngineError;
use crate::store::{ReminderSource, RemoteStore};
use crate::types::{Contact, Interaction, InteractionKind};

/// SQLite-backed tracker database.
pub struct TrackerDb {
    conn: Mutex<Connection>,
}

impl TrackerDb {
    pub fn open(path: &Path) -> Result<Self, EngineError> {
        let conn = Connection::open(path)?;
        let db = Self {
            conn: Mutex::new(conn),
        };
        db.init_schema()?;
        Ok(db)
    }

    /// In-memory database for tests and ephemeral use.
    pub fn open_in_memory() -> Result<Self, EngineError> {
        let conn = Connection::open_in_memory()?;
        let db = Self {
            conn: Mutex::new(conn),
        };
        db.init_schema()?;
        Ok(db)
    }

    fn init_schema(&self) -> Result<(), EngineError> {
        let conn = self.conn.lock();
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS contacts (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                company TEXT,
                role TEXT
            );
            CREATE TABLE IF NOT EXISTS interactions (
                id TEXT PRIMARY KEY,
                contact_id TEXT NOT NULL,
                kind TEXT NOT NULL,
                summary TEXT NOT NULL DEFAULT '',
                tags_json TEXT NOT NULL DEFAULT '[]',
                follow_up_required INTEGER NOT NULL DEFAULT 0,
                follow_up_due TEXT,
                is_done INTEGER NOT NULL DEFAULT 0,
                snooze_count INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_interactions_contact
                ON interactions(contact_id);
            CREATE INDEX IF NOT EXISTS idx_interactions_due
                ON interactions(follow_up_due);",
        )?;
        Ok(())
    }

    pub fn upsert_contact(&self, contact: &Contact) -> Result<(), EngineError> {
        self.conn.lock().execute(
            "INSERT INTO contacts (id, name, company, role)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                company = excluded.company,
                role = excluded.role",
            params![contact.id, contact.name, contact.company, contact.role],
        )?;
        Ok(())
    }

    /// Insert or replace an interaction. Generates an id when the snapshot's
    /// id is empty; returns the effective id.
    pub fn upsert_interaction(&self, item: &Interaction) -> Result<String, EngineError> {
        let id = if item.id.is_empty() {
            format!("int-{}", Uuid::new_v4())
        } else {
            item.id.clone()
        };
        let tags_json = serde_json::to_string(&item.tags)
            .map_err(|e| EngineError::Validation(format!("unserializable tags: {}", e)))?;

        self.conn.lock().execute(
            "INSERT INTO interactions
                (id, contact_id, kind, summary, tags_json, follow_up_required,
                 follow_up_due, is_done, snooze_count, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
             ON CONFLICT(id) DO UPDATE SET
                contact_id = excluded.contact_id,
                kind = excluded.kind,
                summary = excluded.summary,
                tags_json = excluded.tags_json,
                follow_up_required = excluded.follow_up_required,
                follow_up_due = excluded.follow_up_due,
                is_done = excluded.is_done,
                snooze_count = excluded.snooze_count,
                created_at = excluded.created_at",
            params![
                id,
                item.contact_id,
                item.kind.as_str(),
                item.summary,
                tags_json,
                item.follow_up_required as i32,
                item.follow_up_due.map(|d| d.to_rfc3339()),
                item.is_done as i32,
                item.snooze_count,
                item.created_at.to_rfc3339(),
            ],
        )?;
        Ok(id)
    }

    pub fn get_interaction(&self, id: &str) -> Result<Option<Interaction>, EngineError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT id, contact_id, kind, summary, tags_json, follow_up_required,
                    follow_up_due, is_done, snooze_count, created_at
             FROM interactions WHERE id = ?1",
        )?;
        let mut rows = stmt.query(params![id])?;
        match rows.next()? {
            Some(row) => Ok(Some(row_to_interaction(row)?)),
            None => Ok(None),
        }
    }

    /// Persist a snooze: pushes the due date forward and bumps the counter.
    pub fn snooze_interaction(
        &self,
        id: &str,
        by: chrono::Duration,
    ) -> Result<Interaction, EngineError> {
        let mut item = self.get_interaction(id)?.ok_or(EngineError::NotFound {
            kind: "interaction",
            id: id.to_string(),
        })?;
        if item.follow_up_due.is_none() {
            return Err(EngineError::Validation(format!(
                "interaction {} has no due date to snooze",
                id
            )));
        }
        item.snooze(by);
        self.upsert_interaction(&item)?;
        Ok(item)
    }
}

fn row_to_interaction(row: &Row<'_>) -> Result<Interaction, EngineError> {
    let kind_raw: String = row.get(2)?;
    let kind = InteractionKind::parse(&kind_raw).ok_or_else(|| {
        EngineError::Validation(format!("unknown interaction kind: {}", kind_raw))
    })?;

    let tags_json: String = row.get(4)?;
    let tags: BTreeSet<String> = serde_json::from_str(&tags_json).unwrap_or_else(|e| {
        // Malformed tag data degrades to no tags, never fails the read.
        log::warn!("dropping malformed tags ({}): {}", e, tags_json);
        BTreeSet::new()
    });

    let follow_up_due: Option<String> = row.get(6)?;
    let created_at: String = row.get(9)?;

    Ok(Interaction {
        id: row.get(0)?,
        contact_id: row.get(1)?,
        kind,
        summary: row.get(3)?,
        tags,
        follow_up_required: row.get::<_, i32>(5)? != 0,
        follow_up_due: follow_up_due.as_deref().map(parse_timestamp).transpose()?,
        is_done: row.get::<_, i32>(7)? != 0,
        snooze_count: row.get(8)?,
        created_at: parse_timestamp(&created_at)?,
    })
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, EngineError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| EngineError::Storage(format!("bad timestamp {:?}: {}", raw, e)))
}

impl ReminderSource for TrackerDb {
    fn interactions(&self) -> Result<Vec<Interaction>, EngineError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT id, contact_id, kind, summary, tags_json, follow_up_required,
                    follow_up_due, is_done, snooze_count, created_at
             FROM interactions ORDER BY created_at ASC",
        )?;
        let mut rows = stmt.query([])?;
        let mut items = Vec::new();
        while let Some(row) = rows.next()? {
            match row_to_interaction(row) {
                Ok(item) => items.push(item),
                Err(e) if e.is_per_item() => {
                    // One bad row must not take down the collection read.
                    log::warn!("skipping unreadable interaction row: {}", e);
                }
                Err(e) => return Err(e),
            }
        }
        Ok(items)
    }

    fn contact(&self, id: &str) -> Result<Option<Contact>, EngineError> {
        let conn = self.conn.lock();
        let mut stmt =
            conn.prepare("SELECT id, name, company, role FROM contacts WHERE id = ?1")?;
        let mut rows = stmt.query(params![id])?;
        match rows.next()? {
            Some(row) => Ok(Some(Contact {
                id: row.get(0)?,
                name: row.get(1)?,
                company: row.get(2)?,
                role: row.get(3)?,
            })),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl RemoteStore for TrackerDb {
    async fn delete(&self, id: &str) -> Result<(), EngineError> {
        let affected = self
            .conn
            .lock()
            .execute("DELETE FROM interactions WHERE id = ?1", params![id])?;
        if affected == 0 {
            log::debug!("delete of {} matched no rows", id);
        }
        Ok(())
    }

    async fn create(&self, snapshot: &Interaction) -> Result<String, EngineError> {
        self.upsert_interaction(snapshot)
    }
}
