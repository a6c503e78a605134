//! File-backed job queue.
//!
//! The whole queue lives in one JSON document guarded by an advisory lock on a
//! sibling lockfile. Every public operation is a single lock/read/mutate/write
//! transaction, so concurrent tasks and separate processes serialise cleanly.

use chrono::{DateTime, Utc};
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use super::actions::Action;
use crate::{Error, Result};

/// Queue item status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum QueueStatus {
    /// Waiting for the automatic scheduler pass.
    ReadyToRun,
    /// Waiting for a human answer.
    RequiresUserInput,
    /// Finished successfully.
    Completed,
    /// Finished with an error.
    Failed,
}

impl QueueStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueueStatus::ReadyToRun => "ready-to-run",
            QueueStatus::RequiresUserInput => "requires-user-input",
            QueueStatus::Completed => "completed",
            QueueStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, QueueStatus::Completed | QueueStatus::Failed)
    }

    /// Transitions allowed by the queue lifecycle.
    ///
    /// Terminal states never move; the only non-terminal edges lead into a
    /// terminal state or from `ready-to-run` into `requires-user-input`.
    pub fn can_transition_to(&self, next: QueueStatus) -> bool {
        match (self, next) {
            (QueueStatus::Completed | QueueStatus::Failed, _) => false,
            (QueueStatus::ReadyToRun, QueueStatus::RequiresUserInput) => true,
            (_, QueueStatus::Completed | QueueStatus::Failed) => true,
            _ => false,
        }
    }
}

impl std::fmt::Display for QueueStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One unit of work in the queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueItem {
    /// Unique item ID.
    pub id: String,
    /// When the item was created.
    pub created_at: DateTime<Utc>,
    /// When the item completed successfully.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    /// What the item does.
    pub action: Action,
    /// Items that must be completed before this one can run.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dependencies: Option<Vec<String>>,
    /// Current status.
    pub status: QueueStatus,
    /// Failure cause, present only when failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl QueueItem {
    /// Create a new item with a fresh ID.
    pub fn new(action: Action, status: QueueStatus) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            created_at: Utc::now(),
            completed_at: None,
            action,
            dependencies: None,
            status,
            error: None,
        }
    }

    /// Create an item that is already resolved, such as a pre-answered request.
    pub fn completed(action: Action) -> Self {
        let mut item = Self::new(action, QueueStatus::Completed);
        item.completed_at = Some(item.created_at);
        item
    }

    /// Set the item ID.
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// Set the dependencies. An empty list is stored as "no dependencies".
    pub fn with_dependencies(mut self, dependencies: Vec<String>) -> Self {
        self.dependencies = if dependencies.is_empty() {
            None
        } else {
            Some(dependencies)
        };
        self
    }

    /// Dependency IDs, empty when there are none.
    pub fn dependency_ids(&self) -> &[String] {
        self.dependencies.as_deref().unwrap_or(&[])
    }

    pub fn depends_on(&self, id: &str) -> bool {
        self.dependency_ids().iter().any(|dep| dep == id)
    }

    fn transition(&mut self, next: QueueStatus) -> Result<()> {
        if !self.status.can_transition_to(next) {
            return Err(Error::InvalidStateTransition {
                from: self.status.to_string(),
                to: next.to_string(),
            });
        }
        self.status = next;
        Ok(())
    }

    /// Move to `completed` and stamp `completed_at`.
    pub fn mark_completed(&mut self) -> Result<()> {
        self.transition(QueueStatus::Completed)?;
        self.completed_at = Some(Utc::now());
        self.error = None;
        Ok(())
    }

    /// Move to `failed` with the given cause.
    pub fn mark_failed(&mut self, error: impl Into<String>) -> Result<()> {
        self.transition(QueueStatus::Failed)?;
        self.error = Some(error.into());
        Ok(())
    }
}

/// Per-status item counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueCounts {
    pub ready_to_run: usize,
    pub requires_user_input: usize,
    pub completed: usize,
    pub failed: usize,
}

impl QueueCounts {
    pub fn total(&self) -> usize {
        self.ready_to_run + self.requires_user_input + self.completed + self.failed
    }
}

/// The whole persisted queue, in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueueState {
    #[serde(default)]
    pub queue: Vec<QueueItem>,
}

impl QueueState {
    pub fn new(queue: Vec<QueueItem>) -> Self {
        Self { queue }
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// Find an item by ID.
    pub fn find(&self, id: &str) -> Option<&QueueItem> {
        self.queue.iter().find(|item| item.id == id)
    }

    pub fn counts(&self) -> QueueCounts {
        let mut counts = QueueCounts::default();
        for item in &self.queue {
            match item.status {
                QueueStatus::ReadyToRun => counts.ready_to_run += 1,
                QueueStatus::RequiresUserInput => counts.requires_user_input += 1,
                QueueStatus::Completed => counts.completed += 1,
                QueueStatus::Failed => counts.failed += 1,
            }
        }
        counts
    }

    /// Return the ID of an item that sits on a dependency cycle, if any.
    ///
    /// Dependencies pointing outside the queue are ignored here; they are
    /// merely unsatisfiable, not cyclic.
    pub fn find_cycle(&self) -> Option<String> {
        #[derive(Clone, Copy, PartialEq)]
        enum Mark {
            Visiting,
            Done,
        }

        let edges: HashMap<&str, &[String]> = self
            .queue
            .iter()
            .map(|item| (item.id.as_str(), item.dependency_ids()))
            .collect();
        let mut marks: HashMap<&str, Mark> = HashMap::with_capacity(edges.len());

        for start in self.queue.iter().map(|item| item.id.as_str()) {
            if marks.contains_key(start) {
                continue;
            }
            // Iterative DFS: (node, next dependency index).
            let mut stack: Vec<(&str, usize)> = vec![(start, 0)];
            marks.insert(start, Mark::Visiting);

            while let Some((node, idx)) = stack.pop() {
                let deps = edges.get(node).copied().unwrap_or(&[]);
                if idx >= deps.len() {
                    marks.insert(node, Mark::Done);
                    continue;
                }
                stack.push((node, idx + 1));

                let dep = deps[idx].as_str();
                if !edges.contains_key(dep) {
                    continue;
                }
                match marks.get(dep) {
                    Some(Mark::Visiting) => return Some(dep.to_string()),
                    Some(Mark::Done) => {}
                    None => {
                        marks.insert(dep, Mark::Visiting);
                        stack.push((dep, 0));
                    }
                }
            }
        }
        None
    }
}

/// Durable, lock-guarded queue storage.
#[derive(Debug, Clone)]
pub struct QueueStore {
    path: PathBuf,
    lock_path: PathBuf,
}

impl QueueStore {
    /// Create a store backed by `path`; the lockfile is `<path>.lock`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let lock_path = sibling_with_suffix(&path, "lock");
        Self { path, lock_path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the whole queue. A missing file yields an empty queue and is created.
    pub async fn get_state(&self) -> Result<QueueState> {
        self.transaction(|state| Ok(state.clone())).await
    }

    /// Replace the item with the same ID. Fails if no such item exists.
    pub async fn update_item(&self, item: QueueItem) -> Result<()> {
        self.transaction(move |state| {
            let slot = state
                .queue
                .iter_mut()
                .find(|existing| existing.id == item.id)
                .ok_or_else(|| Error::not_found("queue item", item.id.clone()))?;
            *slot = item;
            Ok(())
        })
        .await
    }

    /// Mutate the first item that depends on `id` and matches `predicate`,
    /// all under one lock. Returns `None`, writing nothing new, when no item
    /// matches. An error from `mutate` leaves the file untouched.
    pub async fn update_first_dependent<T, P, F>(
        &self,
        id: &str,
        predicate: P,
        mutate: F,
    ) -> Result<Option<T>>
    where
        T: Send + 'static,
        P: Fn(&QueueItem) -> bool + Send + 'static,
        F: FnOnce(&mut QueueItem) -> Result<T> + Send + 'static,
    {
        let id = id.to_string();
        self.transaction(move |state| {
            let target = state
                .queue
                .iter_mut()
                .find(|item| item.depends_on(&id) && predicate(item));
            match target {
                Some(item) => mutate(item).map(Some),
                None => Ok(None),
            }
        })
        .await
    }

    /// Append items in order. The batch is rejected if it reuses an ID or
    /// would introduce a dependency cycle.
    pub async fn append_items(&self, items: Vec<QueueItem>) -> Result<()> {
        self.transaction(move |state| {
            let mut seen: HashSet<&str> = state.queue.iter().map(|i| i.id.as_str()).collect();
            for item in &items {
                if !seen.insert(item.id.as_str()) {
                    return Err(Error::validation(format!(
                        "queue item id {} already exists",
                        item.id
                    )));
                }
            }

            let mut candidate = state.clone();
            candidate.queue.extend(items);
            if let Some(id) = candidate.find_cycle() {
                return Err(Error::validation(format!(
                    "appending these items would create a dependency cycle through {id}"
                )));
            }
            *state = candidate;
            Ok(())
        })
        .await
    }

    /// Run `mutate` against the current state under the file lock, then
    /// rewrite the file. The lock is held on a blocking thread for the whole
    /// read-modify-write cycle.
    async fn transaction<T, F>(&self, mutate: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut QueueState) -> Result<T> + Send + 'static,
    {
        let path = self.path.clone();
        let lock_path = self.lock_path.clone();

        tokio::task::spawn_blocking(move || {
            let lock = acquire_lock(&lock_path)?;
            let result = read_modify_write(&path, mutate);
            if let Err(e) = FileExt::unlock(&lock) {
                warn!(path = %lock_path.display(), error = %e, "Failed to release queue lock");
            }
            result
        })
        .await
        .map_err(|e| Error::Other(format!("Queue store task failed: {e}")))?
    }
}

fn sibling_with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".");
    name.push(suffix);
    path.with_file_name(name)
}

fn acquire_lock(lock_path: &Path) -> Result<File> {
    if let Some(parent) = lock_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .map_err(|e| Error::io_path("creating queue directory", parent, e))?;
    }
    let file = OpenOptions::new()
        .create(true)
        .read(true)
        .write(true)
        .truncate(false)
        .open(lock_path)
        .map_err(|e| Error::io_path("opening queue lock", lock_path, e))?;
    file.lock_exclusive()
        .map_err(|e| Error::io_path("locking queue", lock_path, e))?;
    Ok(file)
}

fn read_modify_write<T>(
    path: &Path,
    mutate: impl FnOnce(&mut QueueState) -> Result<T>,
) -> Result<T> {
    let mut state = read_state(path)?;
    let value = mutate(&mut state)?;
    write_state(path, &state)?;
    Ok(value)
}

fn read_state(path: &Path) -> Result<QueueState> {
    match std::fs::read_to_string(path) {
        Ok(raw) if raw.trim().is_empty() => Ok(QueueState::default()),
        Ok(raw) => Ok(serde_json::from_str(&raw)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "Queue file missing, starting empty");
            Ok(QueueState::default())
        }
        Err(e) => Err(Error::io_path("reading queue", path, e)),
    }
}

fn write_state(path: &Path, state: &QueueState) -> Result<()> {
    let tmp = sibling_with_suffix(path, "tmp");
    let json = serde_json::to_vec_pretty(state)?;
    std::fs::write(&tmp, json).map_err(|e| Error::io_path("writing queue", &tmp, e))?;
    std::fs::rename(&tmp, path).map_err(|e| Error::io_path("replacing queue", path, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::actions::{CodeRequest, ConcatenateVideos};
    use std::sync::Arc;
    use tempfile::TempDir;

    fn concat_item(name: &str) -> QueueItem {
        QueueItem::new(
            Action::ConcatenateVideos(ConcatenateVideos {
                videos: vec!["/a.mp4".into(), "/b.mp4".into()],
                output_name: name.to_string(),
                dry_run: false,
            }),
            QueueStatus::ReadyToRun,
        )
    }

    #[test]
    fn test_status_transitions_are_one_way() {
        use QueueStatus::*;
        assert!(ReadyToRun.can_transition_to(Completed));
        assert!(ReadyToRun.can_transition_to(Failed));
        assert!(RequiresUserInput.can_transition_to(Completed));
        assert!(RequiresUserInput.can_transition_to(Failed));
        assert!(!Completed.can_transition_to(ReadyToRun));
        assert!(!Failed.can_transition_to(ReadyToRun));
        assert!(!Completed.can_transition_to(Failed));
        assert!(!RequiresUserInput.can_transition_to(ReadyToRun));
    }

    #[test]
    fn test_mark_failed_then_completed_is_rejected() {
        let mut item = concat_item("x");
        item.mark_failed("boom").unwrap();
        assert_eq!(item.error.as_deref(), Some("boom"));
        assert!(matches!(
            item.mark_completed(),
            Err(Error::InvalidStateTransition { .. })
        ));
    }

    #[test]
    fn test_status_serializes_kebab_case() {
        let json = serde_json::to_string(&QueueStatus::RequiresUserInput).unwrap();
        assert_eq!(json, "\"requires-user-input\"");
    }

    #[test]
    fn test_find_cycle() {
        let a = concat_item("a").with_id("a").with_dependencies(vec!["b".into()]);
        let b = concat_item("b").with_id("b").with_dependencies(vec!["c".into()]);
        let c = concat_item("c").with_id("c");
        let state = QueueState::new(vec![a.clone(), b.clone(), c]);
        assert!(state.find_cycle().is_none());

        let c = concat_item("c").with_id("c").with_dependencies(vec!["a".into()]);
        let state = QueueState::new(vec![a, b, c]);
        assert!(state.find_cycle().is_some());
    }

    #[test]
    fn test_missing_dependency_is_not_a_cycle() {
        let a = concat_item("a").with_id("a").with_dependencies(vec!["ghost".into()]);
        assert!(QueueState::new(vec![a]).find_cycle().is_none());
    }

    #[tokio::test]
    async fn test_update_first_dependent_mutates_in_one_transaction() {
        let dir = TempDir::new().unwrap();
        let store = QueueStore::new(dir.path().join("queue.json"));
        let parent = concat_item("parent").with_id("parent");
        let unrelated = concat_item("other").with_id("other");
        let child = concat_item("child")
            .with_id("child")
            .with_dependencies(vec!["parent".into()]);
        store
            .append_items(vec![parent, unrelated, child])
            .await
            .unwrap();

        let touched = store
            .update_first_dependent(
                "parent",
                |item| matches!(item.action, Action::ConcatenateVideos(_)),
                |item| {
                    item.mark_failed("resolved elsewhere")?;
                    Ok(item.id.clone())
                },
            )
            .await
            .unwrap();
        assert_eq!(touched.as_deref(), Some("child"));

        let state = store.get_state().await.unwrap();
        assert_eq!(state.find("child").unwrap().status, QueueStatus::Failed);
        assert_eq!(state.find("other").unwrap().status, QueueStatus::ReadyToRun);

        // No dependent: nothing matches and nothing changes.
        let none = store
            .update_first_dependent("child", |_| true, |_| Ok(()))
            .await
            .unwrap();
        assert!(none.is_none());

        // A failing mutation leaves the stored item as it was.
        let before = store.get_state().await.unwrap();
        let err = store
            .update_first_dependent(
                "parent",
                |_| true,
                |item| {
                    item.error = Some("half-written".into());
                    Err::<(), _>(Error::invariant("stop"))
                },
            )
            .await
            .unwrap_err();
        assert!(err.is_invariant_violation());
        assert_eq!(store.get_state().await.unwrap(), before);
    }

    #[tokio::test]
    async fn test_missing_file_reads_empty_and_is_created() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("queue.json");
        let store = QueueStore::new(&path);

        let state = store.get_state().await.unwrap();
        assert!(state.is_empty());
        assert!(path.exists());
        assert!(dir.path().join("queue.json.lock").exists());
    }

    #[tokio::test]
    async fn test_round_trip_preserves_optional_fields() {
        let dir = TempDir::new().unwrap();
        let store = QueueStore::new(dir.path().join("queue.json"));

        let plain = concat_item("plain");
        let mut done = QueueItem::new(
            Action::CodeRequest(CodeRequest {
                temporary_data: None,
            }),
            QueueStatus::ReadyToRun,
        )
        .with_dependencies(vec![plain.id.clone()]);
        done.mark_completed().unwrap();

        let items = vec![plain, done];
        store.append_items(items.clone()).await.unwrap();

        let state = store.get_state().await.unwrap();
        assert_eq!(state, QueueState::new(items));
    }

    #[tokio::test]
    async fn test_update_item_replaces_in_place() {
        let dir = TempDir::new().unwrap();
        let store = QueueStore::new(dir.path().join("queue.json"));
        let first = concat_item("first");
        let second = concat_item("second");
        store
            .append_items(vec![first.clone(), second.clone()])
            .await
            .unwrap();

        let mut updated = first.clone();
        updated.mark_failed("encoder exploded").unwrap();
        store.update_item(updated.clone()).await.unwrap();

        let state = store.get_state().await.unwrap();
        assert_eq!(state.queue[0], updated);
        assert_eq!(state.queue[1], second);
    }

    #[tokio::test]
    async fn test_update_unknown_item_fails() {
        let dir = TempDir::new().unwrap();
        let store = QueueStore::new(dir.path().join("queue.json"));
        let err = store.update_item(concat_item("ghost")).await.unwrap_err();
        assert!(matches!(err, Error::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_append_rejects_cycles_and_duplicates() {
        let dir = TempDir::new().unwrap();
        let store = QueueStore::new(dir.path().join("queue.json"));

        let a = concat_item("a").with_id("a").with_dependencies(vec!["b".into()]);
        let b = concat_item("b").with_id("b").with_dependencies(vec!["a".into()]);
        let err = store.append_items(vec![a, b]).await.unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        assert!(store.get_state().await.unwrap().is_empty());

        let a = concat_item("a").with_id("a");
        store.append_items(vec![a.clone()]).await.unwrap();
        let err = store.append_items(vec![a]).await.unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[tokio::test]
    async fn test_concurrent_updates_do_not_lose_writes() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(QueueStore::new(dir.path().join("queue.json")));
        let items: Vec<QueueItem> = (0..16).map(|i| concat_item(&format!("v{i}"))).collect();
        store.append_items(items.clone()).await.unwrap();

        let mut tasks = tokio::task::JoinSet::new();
        for mut item in items {
            let store = store.clone();
            tasks.spawn(async move {
                item.mark_completed().unwrap();
                store.update_item(item).await
            });
        }
        while let Some(result) = tasks.join_next().await {
            result.unwrap().unwrap();
        }

        let counts = store.get_state().await.unwrap().counts();
        assert_eq!(counts.completed, 16);
        assert_eq!(counts.total(), 16);
    }
}
