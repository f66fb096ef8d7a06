use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, params};
use std::sync::Mutex;
use tokio::sync::broadcast;

use crate::models::kit::{Kit, KitStatus};

/// Registry mutation broadcast to the Collector supervisor (§9: message-passing
/// instead of a shared mutable map read from polling loops).
#[derive(Debug, Clone)]
pub enum RegistryEvent {
    Added(Kit),
    Removed(String),
    Updated(Kit),
}

/// Durable, hot-reconfigurable set of kits (§4.2). Backed by SQLite in WAL mode,
/// following the teacher's `ConfigDb` pattern: a single `Mutex<Connection>`, idempotent
/// `CREATE TABLE IF NOT EXISTS` migrations run on open.
pub struct ConfigDb {
    conn: Mutex<Connection>,
    events: broadcast::Sender<RegistryEvent>,
}

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("kit '{0}' not found")]
    NotFound(String),
    #[error("kit '{0}' already exists")]
    Duplicate(String),
    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),
}

impl ConfigDb {
    pub fn open(path: &str) -> anyhow::Result<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
        let (events, _) = broadcast::channel(64);
        let db = Self {
            conn: Mutex::new(conn),
            events,
        };
        db.run_migrations()?;
        Ok(db)
    }

    fn run_migrations(&self) -> anyhow::Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS kits (
                kit_id     TEXT PRIMARY KEY,
                name       TEXT NOT NULL,
                location   TEXT,
                api_url    TEXT NOT NULL,
                enabled    INTEGER NOT NULL DEFAULT 1,
                created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ','now')),
                last_seen  TEXT
            );
            ",
        )?;
        Ok(())
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RegistryEvent> {
        self.events.subscribe()
    }

    fn row_to_kit(
        kit_id: String,
        name: String,
        location: Option<String>,
        api_url: String,
        enabled: bool,
        created_at: DateTime<Utc>,
        last_seen: Option<DateTime<Utc>>,
    ) -> Kit {
        let status = KitStatus::derive(last_seen, Utc::now());
        Kit {
            kit_id,
            name,
            location,
            api_url,
            enabled,
            created_at,
            last_seen,
            status,
        }
    }

    /// §4.2 `list_kits([kit_id])`.
    pub fn list_kits(&self, kit_id: Option<&str>) -> Result<Vec<Kit>, RegistryError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT kit_id, name, location, api_url, enabled, created_at, last_seen \
             FROM kits WHERE (?1 IS NULL OR kit_id = ?1) ORDER BY kit_id",
        )?;
        let rows = stmt
            .query_map(params![kit_id], |row| {
                let enabled: i64 = row.get(4)?;
                let created_at: String = row.get(5)?;
                let last_seen: Option<String> = row.get(6)?;
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, Option<String>>(2)?,
                    row.get::<_, String>(3)?,
                    enabled != 0,
                    created_at,
                    last_seen,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(rows
            .into_iter()
            .map(|(kit_id, name, location, api_url, enabled, created_at, last_seen)| {
                Self::row_to_kit(
                    kit_id,
                    name,
                    location,
                    api_url,
                    enabled,
                    parse_ts(&created_at),
                    last_seen.as_deref().map(parse_ts),
                )
            })
            .collect())
    }

    pub fn get_kit(&self, kit_id: &str) -> Result<Option<Kit>, RegistryError> {
        Ok(self.list_kits(Some(kit_id))?.into_iter().next())
    }

    /// §4.2 `add_kit`. Caller is responsible for probing the URL before calling this
    /// (kept separate so admin handlers can surface probe failures distinctly).
    pub fn add_kit(
        &self,
        kit_id: &str,
        name: &str,
        location: Option<&str>,
        api_url: &str,
        enabled: bool,
    ) -> Result<Kit, RegistryError> {
        {
            let conn = self.conn.lock().unwrap();
            let existing: Option<String> = conn
                .query_row(
                    "SELECT kit_id FROM kits WHERE kit_id = ?1",
                    params![kit_id],
                    |row| row.get(0),
                )
                .optional()?;
            if existing.is_some() {
                return Err(RegistryError::Duplicate(kit_id.to_string()));
            }
            conn.execute(
                "INSERT INTO kits (kit_id, name, location, api_url, enabled) VALUES (?1, ?2, ?3, ?4, ?5)",
                params![kit_id, name, location, api_url, enabled as i64],
            )?;
        }
        let kit = self
            .get_kit(kit_id)?
            .expect("just inserted kit must be readable");
        let _ = self.events.send(RegistryEvent::Added(kit.clone()));
        Ok(kit)
    }

    /// §4.2 `remove_kit`. Historical observations are untouched — only the registry
    /// row is deleted.
    pub fn remove_kit(&self, kit_id: &str) -> Result<(), RegistryError> {
        let affected = {
            let conn = self.conn.lock().unwrap();
            conn.execute("DELETE FROM kits WHERE kit_id = ?1", params![kit_id])?
        };
        if affected == 0 {
            return Err(RegistryError::NotFound(kit_id.to_string()));
        }
        let _ = self.events.send(RegistryEvent::Removed(kit_id.to_string()));
        Ok(())
    }

    /// Mirrors collector-observed health back to the registry (§4.3 "Transitions are
    /// mirrored to the registry's last_seen/status").
    pub fn touch_last_seen(&self, kit_id: &str, at: DateTime<Utc>) -> Result<(), RegistryError> {
        {
            let conn = self.conn.lock().unwrap();
            conn.execute(
                "UPDATE kits SET last_seen = ?2 WHERE kit_id = ?1 \
                 AND (last_seen IS NULL OR last_seen < ?2)",
                params![kit_id, at.to_rfc3339()],
            )?;
        }
        if let Some(kit) = self.get_kit(kit_id)? {
            let _ = self.events.send(RegistryEvent::Updated(kit));
        }
        Ok(())
    }

    /// §4.2 `reload_from_config`: union-merge config-file kits into the registry.
    /// Duplicates resolve to the existing registry entry (config is never authoritative
    /// over a live registry row).
    pub fn reload_from_config(&self, seeds: &[crate::config::KitSeed]) -> Result<usize, RegistryError> {
        let mut inserted = 0;
        for seed in seeds {
            let kit_id = seed
                .kit_id
                .clone()
                .unwrap_or_else(|| derive_kit_id(&seed.api_url));
            if self.get_kit(&kit_id)?.is_some() {
                continue;
            }
            self.add_kit(
                &kit_id,
                seed.name.as_deref().unwrap_or(&kit_id),
                seed.location.as_deref(),
                &seed.api_url,
                seed.enabled,
            )?;
            inserted += 1;
        }
        Ok(inserted)
    }
}

/// Deterministic kit_id derivation from a base URL when the caller doesn't supply one.
pub fn derive_kit_id(api_url: &str) -> String {
    api_url
        .trim_start_matches("http://")
        .trim_start_matches("https://")
        .trim_end_matches('/')
        .replace(['.', ':', '/'], "-")
}

fn parse_ts(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|d| d.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_memory() -> ConfigDb {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("PRAGMA foreign_keys=ON;").unwrap();
        let (events, _) = broadcast::channel(64);
        let db = ConfigDb {
            conn: Mutex::new(conn),
            events,
        };
        db.run_migrations().unwrap();
        db
    }

    #[test]
    fn add_then_list_round_trips() {
        let db = open_memory();
        db.add_kit("k1", "Kit One", Some("roof"), "http://h:8088", true)
            .unwrap();
        let kits = db.list_kits(None).unwrap();
        assert_eq!(kits.len(), 1);
        assert_eq!(kits[0].kit_id, "k1");
        assert_eq!(kits[0].status, KitStatus::Unknown);
    }

    #[test]
    fn duplicate_add_fails() {
        let db = open_memory();
        db.add_kit("k1", "Kit One", None, "http://h:8088", true).unwrap();
        let err = db
            .add_kit("k1", "Kit One Again", None, "http://h:8088", true)
            .unwrap_err();
        assert!(matches!(err, RegistryError::Duplicate(_)));
    }

    #[test]
    fn remove_unknown_fails() {
        let db = open_memory();
        let err = db.remove_kit("nope").unwrap_err();
        assert!(matches!(err, RegistryError::NotFound(_)));
    }

    #[test]
    fn remove_then_historical_data_is_not_this_dbs_concern() {
        let db = open_memory();
        db.add_kit("k1", "Kit One", None, "http://h:8088", true).unwrap();
        db.remove_kit("k1").unwrap();
        assert!(db.get_kit("k1").unwrap().is_none());
    }

    #[test]
    fn touch_last_seen_derives_online_status() {
        let db = open_memory();
        db.add_kit("k1", "Kit One", None, "http://h:8088", true).unwrap();
        db.touch_last_seen("k1", Utc::now()).unwrap();
        let kit = db.get_kit("k1").unwrap().unwrap();
        assert_eq!(kit.status, KitStatus::Online);
    }

    #[test]
    fn reload_from_config_skips_existing() {
        let db = open_memory();
        db.add_kit("k1", "Kit One", None, "http://h:8088", true).unwrap();
        let seeds = vec![
            crate::config::KitSeed {
                kit_id: Some("k1".to_string()),
                api_url: "http://other:8088".to_string(),
                name: None,
                location: None,
                enabled: true,
            },
            crate::config::KitSeed {
                kit_id: Some("k2".to_string()),
                api_url: "http://h2:8088".to_string(),
                name: None,
                location: None,
                enabled: true,
            },
        ];
        let inserted = db.reload_from_config(&seeds).unwrap();
        assert_eq!(inserted, 1);
        assert_eq!(db.list_kits(None).unwrap().len(), 2);
        // k1's original api_url must be untouched.
        assert_eq!(db.get_kit("k1").unwrap().unwrap().api_url, "http://h:8088");
    }
}
