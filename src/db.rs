use rusqlite::{params, Connection};
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Mutex;

/// Document-cache entries older than this are treated as stale.
pub const DOCUMENT_CACHE_TTL_SECS: i64 = 300;

const SELECTED_FOLDER_KEY: &str = "selected_folder";
const EXPANDED_FOLDERS_KEY: &str = "expanded_folders";

pub struct Db {
    conn: Mutex<Connection>,
}

impl Db {
    pub fn new(db_path: PathBuf) -> Result<Self, String> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| e.to_string())?;
        }
        let conn = Connection::open(&db_path).map_err(|e| e.to_string())?;
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS schema_version (
                version INTEGER PRIMARY KEY,
                applied_at TEXT DEFAULT CURRENT_TIMESTAMP
            );
            INSERT INTO schema_version (version) SELECT 1 WHERE NOT EXISTS (SELECT 1 FROM schema_version LIMIT 1);
            CREATE TABLE IF NOT EXISTS ui_state (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
            );
            ",
        )
        .map_err(|e| e.to_string())?;

        // Normalize schema_version to a single row
        let _ = conn.execute(
            "DELETE FROM schema_version WHERE version < (SELECT MAX(version) FROM schema_version)",
            [],
        );

        // Migration 002: per-folder document cache (run once when version < 2)
        let current_version: i64 = conn
            .query_row("SELECT version FROM schema_version LIMIT 1", [], |r| r.get(0))
            .unwrap_or(1);
        if current_version < 2 {
            conn.execute_batch(
                "
                CREATE TABLE IF NOT EXISTS document_cache (
                    cache_key TEXT PRIMARY KEY,
                    payload TEXT NOT NULL,
                    cached_at TEXT NOT NULL
                );
                CREATE INDEX IF NOT EXISTS idx_document_cache_cached_at ON document_cache(cached_at);
                ",
            )
            .map_err(|e| e.to_string())?;
            conn.execute("UPDATE schema_version SET version = 2", [])
                .map_err(|e| e.to_string())?;
        }

        Ok(Db {
            conn: Mutex::new(conn),
        })
    }

    fn get_state(&self, key: &str) -> Result<Option<String>, String> {
        let conn = self.conn.lock().map_err(|e| e.to_string())?;
        let mut stmt = conn
            .prepare("SELECT value FROM ui_state WHERE key = ?1")
            .map_err(|e| e.to_string())?;
        let mut rows = stmt.query(params![key]).map_err(|e| e.to_string())?;
        match rows.next().map_err(|e| e.to_string())? {
            Some(row) => Ok(Some(row.get::<_, String>(0).map_err(|e| e.to_string())?)),
            None => Ok(None),
        }
    }

    fn set_state(&self, key: &str, value: &str) -> Result<(), String> {
        let conn = self.conn.lock().map_err(|e| e.to_string())?;
        conn.execute(
            "INSERT INTO ui_state (key, value, updated_at) VALUES (?1, ?2, datetime('now'))
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            params![key, value],
        )
        .map_err(|e| e.to_string())?;
        Ok(())
    }

    fn delete_state(&self, key: &str) -> Result<(), String> {
        let conn = self.conn.lock().map_err(|e| e.to_string())?;
        conn.execute("DELETE FROM ui_state WHERE key = ?1", params![key])
            .map_err(|e| e.to_string())?;
        Ok(())
    }

    pub fn selected_folder(&self) -> Result<Option<String>, String> {
        self.get_state(SELECTED_FOLDER_KEY)
    }

    pub fn set_selected_folder(&self, folder_id: Option<&str>) -> Result<(), String> {
        match folder_id {
            Some(id) => self.set_state(SELECTED_FOLDER_KEY, id),
            None => self.delete_state(SELECTED_FOLDER_KEY),
        }
    }

    pub fn expanded_folders(&self) -> Result<HashSet<String>, String> {
        match self.get_state(EXPANDED_FOLDERS_KEY)? {
            Some(json) => serde_json::from_str(&json).map_err(|e| format!("Parse expanded_folders: {}", e)),
            None => Ok(HashSet::new()),
        }
    }

    pub fn set_expanded_folders(&self, expanded: &HashSet<String>) -> Result<(), String> {
        let json = serde_json::to_string(expanded).map_err(|e| e.to_string())?;
        self.set_state(EXPANDED_FOLDERS_KEY, &json)
    }

    /// Cached document payload for a folder key, if present and fresh.
    /// Stale rows are removed on read.
    pub fn cached_documents(&self, cache_key: &str) -> Result<Option<String>, String> {
        let conn = self.conn.lock().map_err(|e| e.to_string())?;
        let entry: Option<(String, String)> = {
            let mut stmt = conn
                .prepare("SELECT payload, cached_at FROM document_cache WHERE cache_key = ?1")
                .map_err(|e| e.to_string())?;
            let mut rows = stmt.query(params![cache_key]).map_err(|e| e.to_string())?;
            match rows.next().map_err(|e| e.to_string())? {
                Some(row) => Some((
                    row.get(0).map_err(|e: rusqlite::Error| e.to_string())?,
                    row.get(1).map_err(|e: rusqlite::Error| e.to_string())?,
                )),
                None => None,
            }
        };
        let Some((payload, cached_at)) = entry else {
            return Ok(None);
        };

        let fresh = chrono::DateTime::parse_from_rfc3339(&cached_at)
            .map(|at| {
                let age = chrono::Utc::now() - at.with_timezone(&chrono::Utc);
                age.num_seconds() <= DOCUMENT_CACHE_TTL_SECS
            })
            .unwrap_or(false);
        if !fresh {
            conn.execute("DELETE FROM document_cache WHERE cache_key = ?1", params![cache_key])
                .map_err(|e| e.to_string())?;
            return Ok(None);
        }
        Ok(Some(payload))
    }

    pub fn upsert_document_cache(&self, cache_key: &str, payload: &str) -> Result<(), String> {
        let cached_at = chrono::Utc::now().to_rfc3339();
        let conn = self.conn.lock().map_err(|e| e.to_string())?;
        conn.execute(
            "INSERT INTO document_cache (cache_key, payload, cached_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(cache_key) DO UPDATE SET payload = excluded.payload, cached_at = excluded.cached_at",
            params![cache_key, payload, cached_at],
        )
        .map_err(|e| e.to_string())?;
        Ok(())
    }

    pub fn invalidate_document_cache(&self, cache_key: &str) -> Result<(), String> {
        let conn = self.conn.lock().map_err(|e| e.to_string())?;
        conn.execute("DELETE FROM document_cache WHERE cache_key = ?1", params![cache_key])
            .map_err(|e| e.to_string())?;
        Ok(())
    }

    pub fn clear_document_cache(&self) -> Result<u64, String> {
        let conn = self.conn.lock().map_err(|e| e.to_string())?;
        let count = conn
            .execute("DELETE FROM document_cache", [])
            .map_err(|e| e.to_string())?;
        Ok(count as u64)
    }

    /// Wipe all persisted UI state (explicit user action).
    pub fn reset_ui_state(&self) -> Result<(), String> {
        let conn = self.conn.lock().map_err(|e| e.to_string())?;
        conn.execute("DELETE FROM ui_state", []).map_err(|e| e.to_string())?;
        conn.execute("DELETE FROM document_cache", []).map_err(|e| e.to_string())?;
        Ok(())
    }
}
