//! Persistence for completed executions.
//!
//! History is append-only: records are written once by the finalizer and
//! removed only by a whole-record delete. The file-backed store keeps one
//! JSON document per line with file locking for safe concurrent access.

use crate::{CompletedExecution, Error, Result};
use fs2::FileExt;
use serde::Deserialize;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use uuid::Uuid;

/// Offset/limit window for listing history
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Page {
    pub skip: usize,
    pub limit: usize,
}

impl Default for Page {
    fn default() -> Self {
        Self { skip: 0, limit: 100 }
    }
}

/// Execution store trait for persisting finished workouts
pub trait ExecutionStore {
    /// Persist a record, returning its id
    fn save_completed_execution(&mut self, record: &CompletedExecution) -> Result<Uuid>;

    /// List a user's records, newest first
    fn list_completed_executions(&self, user_id: &str, page: Page)
        -> Result<Vec<CompletedExecution>>;

    /// Remove a record entirely
    fn delete_completed_execution(&mut self, id: Uuid) -> Result<()>;
}

fn paginate(
    mut records: Vec<CompletedExecution>,
    user_id: &str,
    page: Page,
) -> Vec<CompletedExecution> {
    records.retain(|r| r.user_id == user_id);
    records.sort_by(|a, b| b.started_at.cmp(&a.started_at));
    records
        .into_iter()
        .skip(page.skip)
        .take(page.limit)
        .collect()
}

// ============================================================================
// In-memory store
// ============================================================================

/// Store that keeps records in memory
#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    records: Vec<CompletedExecution>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl ExecutionStore for MemoryStore {
    fn save_completed_execution(&mut self, record: &CompletedExecution) -> Result<Uuid> {
        self.records.push(record.clone());
        Ok(record.id)
    }

    fn list_completed_executions(
        &self,
        user_id: &str,
        page: Page,
    ) -> Result<Vec<CompletedExecution>> {
        Ok(paginate(self.records.clone(), user_id, page))
    }

    fn delete_completed_execution(&mut self, id: Uuid) -> Result<()> {
        let before = self.records.len();
        self.records.retain(|r| r.id != id);
        if self.records.len() == before {
            return Err(Error::ExecutionNotFound(id));
        }
        Ok(())
    }
}

// ============================================================================
// JSONL store
// ============================================================================

/// JSONL-based execution store with file locking
///
/// Writers serialize on a sidecar `<path>.lock` file rather than on the data
/// file itself, since a delete replaces the data file's inode.
pub struct JsonlStore {
    path: PathBuf,
}

/// Just enough of a record to identify it during deletes
#[derive(Deserialize)]
struct RecordId {
    id: Uuid,
}

impl JsonlStore {
    /// Create a new JSONL store for the given path
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Sidecar file every reader and writer locks
    pub fn lock_path(&self) -> PathBuf {
        let mut name = self.path.as_os_str().to_owned();
        name.push(".lock");
        PathBuf::from(name)
    }

    /// Ensure the parent directory exists
    fn ensure_parent_dir(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Ok(())
    }

    fn open_lock(&self) -> Result<File> {
        Ok(OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(self.lock_path())?)
    }

    /// Read every parseable record, skipping corrupt lines
    pub fn read_all(&self) -> Result<Vec<CompletedExecution>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let lock = self.open_lock()?;
        lock.lock_shared()?;

        let file = File::open(&self.path)?;
        let reader = BufReader::new(&file);
        let mut records = Vec::new();

        for (line_num, line_result) in reader.lines().enumerate() {
            let line = line_result?;
            if line.trim().is_empty() {
                continue;
            }

            match serde_json::from_str::<CompletedExecution>(&line) {
                Ok(record) => records.push(record),
                Err(e) => {
                    tracing::warn!("Failed to parse execution at line {}: {}", line_num + 1, e);
                }
            }
        }

        lock.unlock()?;
        tracing::debug!("Read {} executions from {:?}", records.len(), self.path);
        Ok(records)
    }
}

impl ExecutionStore for JsonlStore {
    fn save_completed_execution(&mut self, record: &CompletedExecution) -> Result<Uuid> {
        self.ensure_parent_dir()?;

        let lock = self.open_lock()?;
        lock.lock_exclusive()?;

        // Opened only after the lock so a concurrent delete cannot swap the
        // file out from under this append
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;

        let mut writer = std::io::BufWriter::new(&file);
        let line = serde_json::to_string(record)?;
        writer.write_all(line.as_bytes())?;
        writer.write_all(b"\n")?;
        writer.flush()?;
        drop(writer);
        file.sync_data()?;

        lock.unlock()?;

        tracing::debug!("Appended execution {} to {:?}", record.id, self.path);
        Ok(record.id)
    }

    fn list_completed_executions(
        &self,
        user_id: &str,
        page: Page,
    ) -> Result<Vec<CompletedExecution>> {
        Ok(paginate(self.read_all()?, user_id, page))
    }

    /// Rewrites the file without the matching line
    ///
    /// Lines that fail to parse are carried over untouched.
    fn delete_completed_execution(&mut self, id: Uuid) -> Result<()> {
        if !self.path.exists() {
            return Err(Error::ExecutionNotFound(id));
        }

        let lock = self.open_lock()?;
        lock.lock_exclusive()?;

        let file = File::open(&self.path)?;
        let mut kept = Vec::new();
        let mut removed = false;
        for line_result in BufReader::new(&file).lines() {
            let line = line_result?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<RecordId>(&line) {
                Ok(record) if record.id == id => removed = true,
                _ => kept.push(line),
            }
        }

        if !removed {
            lock.unlock()?;
            return Err(Error::ExecutionNotFound(id));
        }

        let temp = NamedTempFile::new_in(self.path.parent().ok_or_else(|| {
            Error::Store(format!("store path {:?} has no parent", self.path))
        })?)?;
        {
            let mut writer = std::io::BufWriter::new(temp.as_file());
            for line in &kept {
                writer.write_all(line.as_bytes())?;
                writer.write_all(b"\n")?;
            }
            writer.flush()?;
        }
        temp.as_file().sync_all()?;
        temp.persist(&self.path).map_err(|e| Error::Io(e.error))?;

        lock.unlock()?;
        tracing::info!("Deleted execution {} from {:?}", id, self.path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ExecutedExercise, ExecutedSet};
    use chrono::{Duration, Utc};

    fn create_test_record(user: &str, days_ago: i64) -> CompletedExecution {
        let started_at = Utc::now() - Duration::days(days_ago);
        CompletedExecution {
            id: Uuid::new_v4(),
            user_id: user.into(),
            template_id: Some("full_body_a".into()),
            template_name: Some("Full Body A".into()),
            started_at,
            finished_at: started_at + Duration::minutes(45),
            duration_minutes: Some(45),
            body_weight: None,
            general_notes: None,
            exercises: vec![ExecutedExercise {
                exercise_id: "back_squat".into(),
                name: None,
                order: 1,
                notes: None,
                sets: vec![ExecutedSet {
                    order: 1,
                    reps: Some(5),
                    weight: Some(100.0),
                    duration_seconds: None,
                    completed: true,
                }],
            }],
        }
    }

    #[test]
    fn test_append_and_list() {
        let temp_dir = tempfile::tempdir().unwrap();
        let mut store = JsonlStore::new(temp_dir.path().join("executions.jsonl"));

        let old = create_test_record("alice", 3);
        let new = create_test_record("alice", 1);
        let other = create_test_record("bob", 0);
        store.save_completed_execution(&old).unwrap();
        store.save_completed_execution(&new).unwrap();
        store.save_completed_execution(&other).unwrap();

        let listed = store
            .list_completed_executions("alice", Page::default())
            .unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].id, new.id);
        assert_eq!(listed[1].id, old.id);
        assert_eq!(listed[0], new);
    }

    #[test]
    fn test_pagination() {
        let mut store = MemoryStore::new();
        for days in 0..5 {
            store
                .save_completed_execution(&create_test_record("alice", days))
                .unwrap();
        }

        let page = store
            .list_completed_executions("alice", Page { skip: 1, limit: 2 })
            .unwrap();
        assert_eq!(page.len(), 2);
        assert!(page[0].started_at > page[1].started_at);

        let tail = store
            .list_completed_executions("alice", Page { skip: 4, limit: 10 })
            .unwrap();
        assert_eq!(tail.len(), 1);
    }

    #[test]
    fn test_delete_removes_only_target() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("executions.jsonl");
        let mut store = JsonlStore::new(&path);

        let keep = create_test_record("alice", 2);
        let gone = create_test_record("alice", 1);
        store.save_completed_execution(&keep).unwrap();
        store.save_completed_execution(&gone).unwrap();

        store.delete_completed_execution(gone.id).unwrap();

        let remaining = store.read_all().unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].id, keep.id);

        assert!(matches!(
            store.delete_completed_execution(gone.id),
            Err(Error::ExecutionNotFound(id)) if id == gone.id
        ));

        // Only the data file and its lock file remain
        let mut entries: Vec<_> = std::fs::read_dir(temp_dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        entries.sort();
        assert_eq!(entries, vec!["executions.jsonl", "executions.jsonl.lock"]);
    }

    #[test]
    fn test_save_waits_for_delete_and_survives_rewrite() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("executions.jsonl");
        let mut store = JsonlStore::new(&path);

        let a = create_test_record("alice", 2);
        let b = create_test_record("alice", 1);
        store.save_completed_execution(&a).unwrap();
        store.save_completed_execution(&b).unwrap();

        // Hold the store lock as a delete in another process would
        let lock = OpenOptions::new().write(true).open(store.lock_path()).unwrap();
        lock.lock_exclusive().unwrap();

        let c = create_test_record("alice", 0);
        let writer_path = path.clone();
        let pending = c.clone();
        let writer = std::thread::spawn(move || {
            JsonlStore::new(writer_path)
                .save_completed_execution(&pending)
                .unwrap()
        });

        std::thread::sleep(std::time::Duration::from_millis(100));
        let staged = NamedTempFile::new_in(temp_dir.path()).unwrap();
        let mut handle = staged.as_file();
        writeln!(handle, "{}", serde_json::to_string(&b).unwrap()).unwrap();
        staged.persist(&path).unwrap();
        lock.unlock().unwrap();

        assert_eq!(writer.join().unwrap(), c.id);
        let ids: Vec<Uuid> = store.read_all().unwrap().iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![b.id, c.id]);
    }

    #[test]
    fn test_concurrent_saves_and_deletes_lose_nothing() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("executions.jsonl");
        let mut store = JsonlStore::new(&path);

        let doomed: Vec<Uuid> = (0..20)
            .map(|_| {
                store
                    .save_completed_execution(&create_test_record("alice", 1))
                    .unwrap()
            })
            .collect();

        let saver_path = path.clone();
        let saver = std::thread::spawn(move || {
            let mut store = JsonlStore::new(saver_path);
            (0..20)
                .map(|_| {
                    store
                        .save_completed_execution(&create_test_record("alice", 0))
                        .unwrap()
                })
                .collect::<Vec<_>>()
        });
        let deleter_path = path.clone();
        let deleter = std::thread::spawn(move || {
            let mut store = JsonlStore::new(deleter_path);
            for id in doomed {
                store.delete_completed_execution(id).unwrap();
            }
        });

        let saved = saver.join().unwrap();
        deleter.join().unwrap();

        let mut ids: Vec<Uuid> = store.read_all().unwrap().iter().map(|r| r.id).collect();
        let mut expected = saved;
        ids.sort();
        expected.sort();
        assert_eq!(ids, expected);
    }

    #[test]
    fn test_corrupt_lines_skipped_and_preserved() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("executions.jsonl");
        let mut store = JsonlStore::new(&path);

        let a = create_test_record("alice", 1);
        let b = create_test_record("alice", 2);
        store.save_completed_execution(&a).unwrap();
        {
            let mut file = OpenOptions::new().append(true).open(&path).unwrap();
            writeln!(file, "{{ not json").unwrap();
        }
        store.save_completed_execution(&b).unwrap();

        assert_eq!(store.read_all().unwrap().len(), 2);

        store.delete_completed_execution(a.id).unwrap();
        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.contains("{ not json"));
        assert_eq!(store.read_all().unwrap().len(), 1);
    }

    #[test]
    fn test_missing_file_is_empty() {
        let temp_dir = tempfile::tempdir().unwrap();
        let mut store = JsonlStore::new(temp_dir.path().join("none.jsonl"));
        assert!(store
            .list_completed_executions("alice", Page::default())
            .unwrap()
            .is_empty());
        assert!(matches!(
            store.delete_completed_execution(Uuid::new_v4()),
            Err(Error::ExecutionNotFound(_))
        ));
    }

    #[test]
    fn test_memory_store_delete() {
        let mut store = MemoryStore::new();
        let record = create_test_record("alice", 0);
        store.save_completed_execution(&record).unwrap();
        assert_eq!(store.len(), 1);

        store.delete_completed_execution(record.id).unwrap();
        assert!(store.is_empty());
        assert!(store.delete_completed_execution(record.id).is_err());
    }
}
