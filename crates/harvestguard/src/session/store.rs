//! SQLite-backed key/value store for the session token, role and last results.

use crate::api::TokenResponse;
use crate::report::ResultsView;
use rusqlite::{Connection, OptionalExtension};
use std::path::Path;
use std::sync::Mutex;
use thiserror::Error;
use tracing::{debug, info};

const TOKEN_KEY: &str = "token";
const ROLE_KEY: &str = "role";
const RESULTS_KEY: &str = "last_results";

/// Role assumed when the backend does not send one.
pub const DEFAULT_ROLE: &str = "farmer";

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
}

/// An authenticated user as far as this client knows.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Session {
    pub token: String,
    pub role: Option<String>,
}

/// Durable session state. Share one handle (e.g. `Arc<SessionStore>`) between
/// whatever needs the token instead of passing the token around.
pub struct SessionStore {
    conn: Mutex<Connection>,
}

impl SessionStore {
    /// Open or create the store at `path`. Creates parent dirs if needed.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, SessionError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        debug!(path = %path.display(), "opening session store");
        Self::init(Connection::open(path)?)
    }

    /// Non-persistent store.
    pub fn open_in_memory() -> Result<Self, SessionError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, SessionError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS session (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_utc INTEGER NOT NULL
            );
            "#,
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<std::sync::MutexGuard<'_, Connection>, SessionError> {
        self.conn
            .lock()
            .map_err(|e| std::io::Error::other(e.to_string()).into())
    }

    fn get(&self, key: &str) -> Result<Option<String>, SessionError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT value FROM session WHERE key = ?1")?;
        let row = stmt
            .query_row([key], |r| r.get::<_, String>(0))
            .optional()?;
        Ok(row)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), SessionError> {
        let updated = time::OffsetDateTime::now_utc().unix_timestamp();
        let conn = self.conn()?;
        conn.execute(
            "INSERT OR REPLACE INTO session (key, value, updated_utc) VALUES (?1, ?2, ?3)",
            rusqlite::params![key, value, updated],
        )?;
        Ok(())
    }

    fn remove(&self, keys: &[&str]) -> Result<(), SessionError> {
        let conn = self.conn()?;
        for key in keys {
            conn.execute("DELETE FROM session WHERE key = ?1", [key])?;
        }
        Ok(())
    }

    pub fn set_token(&self, token: &str) -> Result<(), SessionError> {
        self.set(TOKEN_KEY, token.trim())
    }

    /// Stored token; an empty value counts as none.
    pub fn get_token(&self) -> Result<Option<String>, SessionError> {
        Ok(self.get(TOKEN_KEY)?.filter(|t| !t.trim().is_empty()))
    }

    /// Log out: drop token, role and any results shown under the old session.
    pub fn clear_token(&self) -> Result<(), SessionError> {
        self.remove(&[TOKEN_KEY, ROLE_KEY, RESULTS_KEY])?;
        info!("session cleared");
        Ok(())
    }

    pub fn set_role(&self, role: &str) -> Result<(), SessionError> {
        self.set(ROLE_KEY, role)
    }

    pub fn get_role(&self) -> Result<Option<String>, SessionError> {
        self.get(ROLE_KEY)
    }

    /// Current session, if a token is stored.
    pub fn session(&self) -> Result<Option<Session>, SessionError> {
        let Some(token) = self.get_token()? else {
            return Ok(None);
        };
        Ok(Some(Session {
            token,
            role: self.get_role()?,
        }))
    }

    /// Store a fresh login or registration.
    pub fn begin(&self, token: &TokenResponse) -> Result<Session, SessionError> {
        let role = token
            .role
            .clone()
            .filter(|r| !r.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_ROLE.to_string());
        self.set_token(&token.access_token)?;
        self.set_role(&role)?;
        Ok(Session {
            token: token.access_token.trim().to_string(),
            role: Some(role),
        })
    }

    pub fn save_results(&self, view: &ResultsView) -> Result<(), SessionError> {
        self.set(RESULTS_KEY, &serde_json::to_string(view)?)
    }

    /// Results of the most recent scan, for the results view.
    pub fn last_results(&self) -> Result<Option<ResultsView>, SessionError> {
        match self.get(RESULTS_KEY)? {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scan::{ScanOutcome, ScanResult};
    use tempfile::NamedTempFile;

    fn token(access: &str, role: Option<&str>) -> TokenResponse {
        TokenResponse {
            access_token: access.to_string(),
            token_type: "bearer".to_string(),
            role: role.map(str::to_string),
        }
    }

    #[test]
    fn token_roundtrip_and_clear() {
        let store = SessionStore::open_in_memory().unwrap();
        assert_eq!(store.get_token().unwrap(), None);
        store.set_token("abc").unwrap();
        assert_eq!(store.get_token().unwrap().as_deref(), Some("abc"));
        store.set_role("inspector").unwrap();
        store.clear_token().unwrap();
        assert_eq!(store.get_token().unwrap(), None);
        assert_eq!(store.get_role().unwrap(), None);
    }

    #[test]
    fn empty_token_is_no_session() {
        let store = SessionStore::open_in_memory().unwrap();
        store.set_token("   ").unwrap();
        assert_eq!(store.session().unwrap(), None);
    }

    #[test]
    fn begin_defaults_role() {
        let store = SessionStore::open_in_memory().unwrap();
        let session = store.begin(&token("t1", None)).unwrap();
        assert_eq!(session.role.as_deref(), Some(DEFAULT_ROLE));
        let session = store.begin(&token("t2", Some("admin"))).unwrap();
        assert_eq!(store.session().unwrap(), Some(session));
    }

    #[test]
    fn survives_reopen() {
        let tmp = NamedTempFile::new().unwrap();
        {
            let store = SessionStore::open(tmp.path()).unwrap();
            store.begin(&token("persisted", Some("farmer"))).unwrap();
        }
        let store = SessionStore::open(tmp.path()).unwrap();
        let session = store.session().unwrap().unwrap();
        assert_eq!(session.token, "persisted");
        assert_eq!(session.role.as_deref(), Some("farmer"));
    }

    #[test]
    fn last_results_roundtrip_and_logout() {
        let store = SessionStore::open_in_memory().unwrap();
        assert!(store.last_results().unwrap().is_none());
        let outcome = ScanOutcome::batch(vec![
            ScanResult::error_placeholder("a.jpg", "cannot identify image file"),
        ]);
        let view = ResultsView::from_outcome(&outcome);
        store.save_results(&view).unwrap();
        let loaded = store.last_results().unwrap().unwrap();
        assert_eq!(loaded.results, outcome.results);
        assert!(loaded.partial_failure);
        store.clear_token().unwrap();
        assert!(store.last_results().unwrap().is_none());
    }
}
