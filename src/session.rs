// Bearer-token session and its on-disk cache.
//
// A token is good for a fixed window after login. The CLI is invoked
// once per command, so the session is cached in the home directory and
// reused until it expires instead of logging in on every run.

use crate::error::SessionError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::io::Write;
#[cfg(unix)]
use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};
use std::path::{Path, PathBuf};

/// A bearer token and the instant it stops being valid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    /// Expiry saturates at the end of representable time.
    pub fn issued_at(token: String, now: DateTime<Utc>, ttl: chrono::Duration) -> Self {
        Session {
            token,
            expires_at: now.checked_add_signed(ttl).unwrap_or(DateTime::<Utc>::MAX_UTC),
        }
    }

    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        !self.token.is_empty() && now < self.expires_at
    }
}

/// What gets written to disk: the session plus the account it belongs to.
#[derive(Debug, Serialize, Deserialize)]
struct CachedSession {
    base_url: String,
    username: String,
    #[serde(flatten)]
    session: Session,
}

/// JSON file holding the most recent session.
#[derive(Debug, Clone)]
pub struct SessionStore {
    path: PathBuf,
}

impl SessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        SessionStore { path: path.into() }
    }

    /// `~/.noipfraud_session`, or the working directory without a home.
    pub fn default_location() -> Self {
        let dir = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        Self::new(dir.join(".noipfraud_session"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Return the cached session for this account, if any. Sessions for
    /// another base URL or user are ignored, as are expired ones.
    pub fn load(
        &self,
        base_url: &str,
        username: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<Session>, SessionError> {
        let data = match std::fs::read_to_string(&self.path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let cached: CachedSession = serde_json::from_str(&data)?;
        if cached.base_url != base_url || cached.username != username {
            return Ok(None);
        }
        Ok(Some(cached.session).filter(|s| s.is_valid_at(now)))
    }

    pub fn save(&self, base_url: &str, username: &str, session: &Session) -> Result<(), SessionError> {
        let cached = CachedSession {
            base_url: base_url.to_string(),
            username: username.to_string(),
            session: session.clone(),
        };
        let data = serde_json::to_string_pretty(&cached)?;
        let mut options = OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        options.mode(0o600);
        let mut file = options.open(&self.path)?;
        // mode() only applies on create, an older file keeps its bits
        #[cfg(unix)]
        file.set_permissions(std::fs::Permissions::from_mode(0o600))?;
        file.write_all(data.as_bytes())?;
        Ok(())
    }

    /// Remove the cache file. Returns whether there was one.
    pub fn clear(&self) -> Result<bool, SessionError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    const BASE: &str = "https://example.com/admin/api";

    fn noon() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 10, 31, 12, 0, 0).unwrap()
    }

    #[test]
    fn session_expires_after_ttl() {
        let session = Session::issued_at("tok".into(), noon(), Duration::hours(5));
        assert!(session.is_valid_at(noon() + Duration::hours(4)));
        assert!(!session.is_valid_at(noon() + Duration::hours(5)));
    }

    #[test]
    fn huge_ttl_saturates_instead_of_overflowing() {
        let session = Session::issued_at("tok".into(), noon(), Duration::days(365 * 1_000_000));
        assert_eq!(session.expires_at, DateTime::<Utc>::MAX_UTC);
        assert!(session.is_valid_at(noon()));
    }

    #[test]
    fn empty_token_is_never_valid() {
        let session = Session::issued_at(String::new(), noon(), Duration::hours(5));
        assert!(!session.is_valid_at(noon()));
    }

    #[test]
    fn store_round_trips_for_same_account() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::new(dir.path().join("session.json"));
        let session = Session::issued_at("tok".into(), noon(), Duration::hours(5));
        store.save(BASE, "alice", &session).unwrap();

        assert_eq!(store.load(BASE, "alice", noon()).unwrap(), Some(session));
        assert_eq!(store.load(BASE, "bob", noon()).unwrap(), None);
        assert_eq!(store.load("https://other.example", "alice", noon()).unwrap(), None);
        assert_eq!(store.load(BASE, "alice", noon() + Duration::hours(6)).unwrap(), None);
    }

    #[test]
    fn missing_file_loads_as_none_and_clear_reports_it() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::new(dir.path().join("absent.json"));
        assert_eq!(store.load(BASE, "alice", noon()).unwrap(), None);
        assert!(!store.clear().unwrap());
    }

    #[test]
    fn corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        std::fs::write(&path, "not json").unwrap();
        let store = SessionStore::new(&path);
        assert!(matches!(store.load(BASE, "alice", noon()), Err(SessionError::Json(_))));
        assert!(store.clear().unwrap());
        assert!(!path.exists());
    }

    #[cfg(unix)]
    #[test]
    fn saved_session_is_private_to_the_owner() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        std::fs::write(&path, "{}").unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o644)).unwrap();

        let store = SessionStore::new(&path);
        let session = Session::issued_at("tok".into(), noon(), Duration::hours(5));
        store.save(BASE, "alice", &session).unwrap();

        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
        assert_eq!(store.load(BASE, "alice", noon()).unwrap(), Some(session));

        std::fs::remove_file(&path).unwrap();
        store.save(BASE, "alice", &Session::issued_at("t2".into(), noon(), Duration::hours(5))).unwrap();
        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
