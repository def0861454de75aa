//! File-backed persistence for sessions
//!
//! Each session lives in one JSON file named `<session>.armada.json` inside
//! the sessions directory. The persisted form has exactly two top-level
//! fields, `data` and `steps`, and round-trips losslessly. Writes go through
//! a temp file and an atomic rename so an interrupted save never leaves a
//! half-written session behind.
//!
//! Two processes writing the same session file concurrently is not guarded
//! against; run one armada per session.

use std::path::PathBuf;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::debug;

use super::data::{SessionData, Step};
use crate::error::{Error, Result};

/// Suffix for session files in the sessions directory.
pub const SESSION_EXTENSION: &str = ".armada.json";

/// The aggregate the engine operates on: accumulated data plus the ordered
/// step history, identified by the session name it is stored under.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub name: String,
    pub data: SessionData,
    pub steps: Vec<Step>,
}

impl Session {
    /// A fresh session with no history.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data: SessionData::default(),
            steps: Vec::new(),
        }
    }
}

/// On-disk form: exactly `data` and `steps`.
#[derive(Serialize, Deserialize)]
struct SessionFile {
    data: SessionData,
    steps: Vec<Step>,
}

/// A saved session as shown in the picker.
#[derive(Debug, Clone)]
pub struct SessionEntry {
    pub name: String,
    pub modified: DateTime<Utc>,
}

/// Persistence boundary for sessions. Filesystem only; no network.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Create and persist a new empty session. Fails if the name is taken.
    async fn create(&self, name: &str) -> Result<Session>;

    /// Load a saved session.
    async fn open(&self, name: &str) -> Result<Session>;

    /// Whether a session of this name is on disk.
    async fn exists(&self, name: &str) -> Result<bool>;

    /// Serialize and overwrite the session's file.
    async fn save(&self, session: &Session) -> Result<()>;

    /// All saved sessions, newest first.
    async fn list(&self) -> Result<Vec<SessionEntry>>;

    /// Remove a saved session. Removing an absent session is not an error.
    async fn delete(&self, name: &str) -> Result<()>;
}

/// Session storage in a directory of JSON files.
pub struct FileSessionStore {
    root: PathBuf,
}

impl FileSessionStore {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    fn session_path(&self, name: &str) -> PathBuf {
        self.root.join(format!("{name}{SESSION_EXTENSION}"))
    }

    fn io_error(path: PathBuf, source: std::io::Error) -> Error {
        Error::SessionIo { path, source }
    }
}

#[async_trait]
impl SessionStore for FileSessionStore {
    async fn create(&self, name: &str) -> Result<Session> {
        if self.exists(name).await? {
            return Err(Error::SessionExists(name.to_string()));
        }
        let session = Session::new(name);
        self.save(&session).await?;
        Ok(session)
    }

    async fn open(&self, name: &str) -> Result<Session> {
        let path = self.session_path(name);
        let content = fs::read_to_string(&path)
            .await
            .map_err(|e| Self::io_error(path.clone(), e))?;

        let file: SessionFile =
            serde_json::from_str(&content).map_err(|source| Error::CorruptSession {
                path: path.clone(),
                source,
            })?;

        debug!(session = name, steps = file.steps.len(), "opened session");
        Ok(Session {
            name: name.to_string(),
            data: file.data,
            steps: file.steps,
        })
    }

    async fn exists(&self, name: &str) -> Result<bool> {
        Ok(self.session_path(name).exists())
    }

    async fn save(&self, session: &Session) -> Result<()> {
        fs::create_dir_all(&self.root)
            .await
            .map_err(|e| Self::io_error(self.root.clone(), e))?;

        let file = SessionFile {
            data: session.data.clone(),
            steps: session.steps.clone(),
        };
        let json = serde_json::to_string_pretty(&file)?;

        // Write to a temp file, then rename into place.
        let path = self.session_path(&session.name);
        let temp = path.with_extension("json.tmp");
        fs::write(&temp, json)
            .await
            .map_err(|e| Self::io_error(temp.clone(), e))?;
        fs::rename(&temp, &path)
            .await
            .map_err(|e| Self::io_error(path.clone(), e))?;

        debug!(
            session = %session.name,
            steps = session.steps.len(),
            "saved session"
        );
        Ok(())
    }

    async fn list(&self) -> Result<Vec<SessionEntry>> {
        let mut entries = Vec::new();

        if !self.root.exists() {
            return Ok(entries);
        }

        let mut dir = fs::read_dir(&self.root)
            .await
            .map_err(|e| Self::io_error(self.root.clone(), e))?;

        while let Some(entry) = dir
            .next_entry()
            .await
            .map_err(|e| Self::io_error(self.root.clone(), e))?
        {
            let file_name = entry.file_name();
            let Some(name) = file_name
                .to_str()
                .and_then(|n| n.strip_suffix(SESSION_EXTENSION))
            else {
                continue;
            };

            let metadata = entry
                .metadata()
                .await
                .map_err(|e| Self::io_error(entry.path(), e))?;
            let modified = metadata
                .modified()
                .map_err(|e| Self::io_error(entry.path(), e))?;

            entries.push(SessionEntry {
                name: name.to_string(),
                modified: modified.into(),
            });
        }

        entries.sort_by(|a, b| b.modified.cmp(&a.modified));
        Ok(entries)
    }

    async fn delete(&self, name: &str) -> Result<()> {
        let path = self.session_path(name);
        if path.exists() {
            fs::remove_file(&path)
                .await
                .map_err(|e| Self::io_error(path.clone(), e))?;
        }
        Ok(())
    }
}

/// In-memory store for tests. Sessions round-trip through their serialized
/// form so the tests exercise the same lossless-persistence contract as the
/// file store.
#[cfg(test)]
pub struct InMemorySessionStore {
    sessions: std::sync::Mutex<std::collections::HashMap<String, String>>,
    saves: std::sync::atomic::AtomicUsize,
}

#[cfg(test)]
impl InMemorySessionStore {
    pub fn new() -> Self {
        Self {
            sessions: std::sync::Mutex::new(std::collections::HashMap::new()),
            saves: std::sync::atomic::AtomicUsize::new(0),
        }
    }

    /// How many times `save` has been called.
    pub fn save_count(&self) -> usize {
        self.saves.load(std::sync::atomic::Ordering::SeqCst)
    }
}

#[cfg(test)]
#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn create(&self, name: &str) -> Result<Session> {
        if self.exists(name).await? {
            return Err(Error::SessionExists(name.to_string()));
        }
        let session = Session::new(name);
        self.save(&session).await?;
        Ok(session)
    }

    async fn open(&self, name: &str) -> Result<Session> {
        let sessions = self.sessions.lock().unwrap();
        let content = sessions.get(name).ok_or_else(|| Error::SessionIo {
            path: PathBuf::from(name),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "no such session"),
        })?;
        let file: SessionFile =
            serde_json::from_str(content).map_err(|source| Error::CorruptSession {
                path: PathBuf::from(name),
                source,
            })?;
        Ok(Session {
            name: name.to_string(),
            data: file.data,
            steps: file.steps,
        })
    }

    async fn exists(&self, name: &str) -> Result<bool> {
        Ok(self.sessions.lock().unwrap().contains_key(name))
    }

    async fn save(&self, session: &Session) -> Result<()> {
        let file = SessionFile {
            data: session.data.clone(),
            steps: session.steps.clone(),
        };
        let json = serde_json::to_string(&file)?;
        self.sessions
            .lock()
            .unwrap()
            .insert(session.name.clone(), json);
        self.saves
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        Ok(())
    }

    async fn list(&self) -> Result<Vec<SessionEntry>> {
        let sessions = self.sessions.lock().unwrap();
        Ok(sessions
            .keys()
            .map(|name| SessionEntry {
                name: name.clone(),
                modified: Utc::now(),
            })
            .collect())
    }

    async fn delete(&self, name: &str) -> Result<()> {
        self.sessions.lock().unwrap().remove(name);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::data::{RepoRecord, StepArgs};
    use tempfile::TempDir;

    #[tokio::test]
    async fn create_save_open_round_trip() {
        let temp = TempDir::new().unwrap();
        let store = FileSessionStore::new(temp.path().to_path_buf());

        let mut session = store.create("migration").await.unwrap();
        session.data.repos = Some(vec![RepoRecord::new("acme", "widgets")]);
        session.steps.push(Step {
            name: "repo-file".to_string(),
            args: StepArgs::new().with("file", "repos.txt"),
        });
        store.save(&session).await.unwrap();

        let loaded = store.open("migration").await.unwrap();
        assert_eq!(loaded, session);
    }

    #[tokio::test]
    async fn create_refuses_an_existing_name() {
        let temp = TempDir::new().unwrap();
        let store = FileSessionStore::new(temp.path().to_path_buf());

        store.create("migration").await.unwrap();
        let err = store.create("migration").await.unwrap_err();
        assert!(matches!(err, Error::SessionExists(name) if name == "migration"));
    }

    #[tokio::test]
    async fn open_of_unparsable_file_is_corrupt_session() {
        let temp = TempDir::new().unwrap();
        let store = FileSessionStore::new(temp.path().to_path_buf());

        let path = temp.path().join(format!("broken{SESSION_EXTENSION}"));
        std::fs::write(&path, "not json {").unwrap();

        let err = store.open("broken").await.unwrap_err();
        assert!(matches!(err, Error::CorruptSession { .. }));
    }

    #[tokio::test]
    async fn open_of_missing_file_is_io_error() {
        let temp = TempDir::new().unwrap();
        let store = FileSessionStore::new(temp.path().to_path_buf());

        let err = store.open("absent").await.unwrap_err();
        assert!(matches!(err, Error::SessionIo { .. }));
    }

    #[tokio::test]
    async fn list_is_sorted_newest_first_and_skips_other_files() {
        let temp = TempDir::new().unwrap();
        let store = FileSessionStore::new(temp.path().to_path_buf());

        store.create("first").await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        store.create("second").await.unwrap();
        std::fs::write(temp.path().join("notes.txt"), "ignore me").unwrap();

        let entries = store.list().await.unwrap();
        let names: Vec<&str> = entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, ["second", "first"]);
    }

    #[tokio::test]
    async fn delete_removes_the_file_and_tolerates_absence() {
        let temp = TempDir::new().unwrap();
        let store = FileSessionStore::new(temp.path().to_path_buf());

        store.create("gone").await.unwrap();
        store.delete("gone").await.unwrap();
        assert!(!store.exists("gone").await.unwrap());

        // Deleting again is fine.
        store.delete("gone").await.unwrap();
    }
}
