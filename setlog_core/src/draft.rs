//! Partial-progress persistence for in-progress sessions.
//!
//! A draft is a snapshot of one `ExecutionSession` written after each change
//! so a restart does not lose recorded sets. Drafts live next to, but apart
//! from, the execution store: only finalized records ever reach history.

use crate::session::ExecutionSession;
use crate::{Error, ExecutionStatus, Result};
use fs2::FileExt;
use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// File-backed slot holding at most one in-progress session
pub struct DraftFile {
    path: PathBuf,
}

impl DraftFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Load the saved session with shared locking
    ///
    /// Returns `None` if there is no draft. A draft that cannot be read or
    /// parsed, or that is no longer in progress, is logged and treated as
    /// absent.
    pub fn load(&self) -> Result<Option<ExecutionSession>> {
        if !self.path.exists() {
            tracing::debug!("No draft found at {:?}", self.path);
            return Ok(None);
        }

        let file = match File::open(&self.path) {
            Ok(f) => f,
            Err(e) => {
                tracing::warn!("Unable to open draft {:?}: {}. Ignoring.", self.path, e);
                return Ok(None);
            }
        };

        if let Err(e) = file.lock_shared() {
            tracing::warn!("Unable to lock draft {:?}: {}. Ignoring.", self.path, e);
            return Ok(None);
        }

        let mut contents = String::new();
        let read = std::io::BufReader::new(&file).read_to_string(&mut contents);
        file.unlock()?;
        if let Err(e) = read {
            tracing::warn!("Failed to read draft {:?}: {}. Ignoring.", self.path, e);
            return Ok(None);
        }

        let session = match serde_json::from_str::<ExecutionSession>(&contents) {
            Ok(session) => session,
            Err(e) => {
                tracing::warn!("Failed to parse draft {:?}: {}. Ignoring.", self.path, e);
                return Ok(None);
            }
        };

        if session.status() != ExecutionStatus::InProgress {
            tracing::warn!(
                "Draft {:?} holds a {:?} session. Ignoring.",
                self.path,
                session.status()
            );
            return Ok(None);
        }

        tracing::debug!("Loaded draft for session {}", session.id());
        Ok(Some(session))
    }

    /// Atomically write the session
    ///
    /// Only in-progress sessions are saved; anything else is
    /// `Error::SessionClosed`.
    pub fn save(&self, session: &ExecutionSession) -> Result<()> {
        if session.status() != ExecutionStatus::InProgress {
            return Err(Error::SessionClosed(session.status()));
        }

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let temp = NamedTempFile::new_in(self.path.parent().ok_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::Other, "draft path missing parent")
        })?)?;

        temp.as_file().lock_exclusive()?;
        {
            let mut writer = std::io::BufWriter::new(temp.as_file());
            let contents = serde_json::to_string(session)?;
            writer.write_all(contents.as_bytes())?;
            writer.flush()?;
        }
        temp.as_file().sync_all()?;
        temp.as_file().unlock()?;

        temp.persist(&self.path).map_err(|e| Error::Io(e.error))?;

        tracing::debug!("Saved draft for session {}", session.id());
        Ok(())
    }

    /// Remove the draft; a missing draft is not an error
    pub fn discard(&self) -> Result<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => {
                tracing::debug!("Discarded draft {:?}", self.path);
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Load the draft, apply `f`, and save it back
    pub fn update<F, T>(&self, f: F) -> Result<Option<T>>
    where
        F: FnOnce(&mut ExecutionSession) -> Result<T>,
    {
        let Some(mut session) = self.load()? else {
            return Ok(None);
        };
        let value = f(&mut session)?;
        self.save(&session)?;
        Ok(Some(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::templates::{default_templates, MemoryTemplateStore};
    use crate::SetInput;
    use chrono::Utc;

    fn new_session() -> ExecutionSession {
        let store = MemoryTemplateStore::with_defaults();
        crate::session::start_session(&store, "full_body_a", "user", None, Utc::now()).unwrap()
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let temp_dir = tempfile::tempdir().unwrap();
        let draft = DraftFile::new(temp_dir.path().join("draft.json"));

        let mut session = new_session();
        session
            .record_set(0, 0, SetInput { reps: Some(12), weight: Some(60.0), duration_seconds: None })
            .unwrap();
        session.complete_set(0, 0).unwrap();
        session.tick_rest(0).unwrap();
        session.advance().unwrap();

        draft.save(&session).unwrap();
        let loaded = draft.load().unwrap().unwrap();

        assert_eq!(loaded, session);
        assert_eq!(loaded.cursor(), 1);
        assert_eq!(loaded.rest_timer(0).unwrap().remaining_seconds(), 89);
    }

    #[test]
    fn test_load_missing_returns_none() {
        let temp_dir = tempfile::tempdir().unwrap();
        let draft = DraftFile::new(temp_dir.path().join("draft.json"));
        assert!(draft.load().unwrap().is_none());
    }

    #[test]
    fn test_corrupted_draft_returns_none() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("draft.json");
        std::fs::write(&path, "{ invalid json }").unwrap();

        let draft = DraftFile::new(&path);
        assert!(draft.load().unwrap().is_none());
    }

    #[test]
    fn test_closed_session_not_saved() {
        let temp_dir = tempfile::tempdir().unwrap();
        let draft = DraftFile::new(temp_dir.path().join("draft.json"));

        let mut session = new_session();
        session.abandon().unwrap();
        assert!(matches!(
            draft.save(&session),
            Err(Error::SessionClosed(ExecutionStatus::Abandoned))
        ));
        assert!(!draft.exists());
    }

    #[test]
    fn test_update_and_discard() {
        let temp_dir = tempfile::tempdir().unwrap();
        let draft = DraftFile::new(temp_dir.path().join("draft.json"));
        draft.save(&new_session()).unwrap();

        let rest = draft.update(|s| s.complete_set(1, 0)).unwrap();
        assert_eq!(rest, Some(default_templates()[0].global_rest_seconds));

        let loaded = draft.load().unwrap().unwrap();
        assert!(loaded.exercises()[1].sets[0].completed);

        draft.discard().unwrap();
        assert!(!draft.exists());
        draft.discard().unwrap();
        assert_eq!(draft.update(|s| s.add_set(0)).unwrap(), None);
    }

    #[test]
    fn test_atomic_save_leaves_no_temp_files() {
        let temp_dir = tempfile::tempdir().unwrap();
        let draft = DraftFile::new(temp_dir.path().join("draft.json"));
        draft.save(&new_session()).unwrap();
        draft.save(&new_session()).unwrap();

        let extras: Vec<_> = std::fs::read_dir(temp_dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name() != "draft.json")
            .collect();
        assert!(extras.is_empty(), "Found extras: {:?}", extras);
    }
}
