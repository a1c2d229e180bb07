//! JSON file storage implementation.
//!
//! Stores each course as a JSON file under `courses/` and keeps a small
//! per-course meta marker (version + updated_at) under `meta/courses/`.
//!
//! Saves are staged next to the course file as `<id>.json.tmp` and only
//! renamed into place on commit, so a committed file is never partially
//! written. Reads through the same storage see staged changes.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use lessonpath_core::{Course, CourseId};
use super::{Storage, Result};
use tokio::fs;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PendingChange {
    Save,
    Delete,
}

/// File-based JSON storage backend.
pub struct JsonStorage {
    root: PathBuf,
    pending: BTreeMap<CourseId, PendingChange>,
}

impl JsonStorage {
    /// Create storage, creating the data and meta directories if needed.
    pub async fn new(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();

        fs::create_dir_all(root.join("courses")).await?;
        fs::create_dir_all(root.join("meta").join("courses")).await?;

        Ok(Self {
            root,
            pending: BTreeMap::new(),
        })
    }

    fn course_path(&self, id: CourseId) -> PathBuf {
        self.root.join("courses").join(format!("{}.json", id))
    }

    fn staged_path(&self, id: CourseId) -> PathBuf {
        self.root.join("courses").join(format!("{}.json.tmp", id))
    }

    fn meta_path(&self, kind: &str, id: &str) -> PathBuf {
        self.root.join("meta").join(kind).join(format!("{}.meta.json", id))
    }

    /// Whether there are saves or deletes not yet committed.
    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Current committed version of a course (0 if never committed).
    pub async fn version(&self, id: CourseId) -> Result<u64> {
        let path = self.meta_path("courses", &id.to_string());
        Ok(read_version(&path).await)
    }

    /// Read and increment per-object version, return new version.
    async fn bump_version(&self, kind: &str, id: &str) -> Result<u64> {
        let path = self.meta_path(kind, id);
        let version = read_version(&path).await + 1;
        let meta = serde_json::json!({"version": version, "updated_at": chrono::Utc::now()});
        fs::write(&path, serde_json::to_string_pretty(&meta)?.as_bytes()).await?;
        Ok(version)
    }

    /// Make one staged change durable.
    async fn apply(&self, id: CourseId, change: PendingChange) -> Result<()> {
        match change {
            PendingChange::Save => {
                fs::rename(self.staged_path(id), self.course_path(id)).await?;
                let version = self.bump_version("courses", &id.to_string()).await?;
                debug!("Committed course {} (version {})", id, version);
            }
            PendingChange::Delete => {
                remove_if_exists(&self.course_path(id)).await?;
                remove_if_exists(&self.meta_path("courses", &id.to_string())).await?;
                debug!("Deleted course {}", id);
            }
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl Storage for JsonStorage {
    async fn save_course(&mut self, course: &Course) -> Result<()> {
        let json = serde_json::to_string_pretty(course)?;
        fs::write(self.staged_path(course.id), json.as_bytes()).await?;

        self.pending.insert(course.id, PendingChange::Save);
        debug!("Staged course {}", course.id);
        Ok(())
    }

    async fn load_course(&self, id: CourseId) -> Result<Option<Course>> {
        match self.pending.get(&id) {
            Some(PendingChange::Delete) => Ok(None),
            Some(PendingChange::Save) => read_json(&self.staged_path(id)).await,
            None => read_json(&self.course_path(id)).await,
        }
    }

    async fn list_courses(&self) -> Result<Vec<Course>> {
        let mut courses: Vec<Course> = list_dir(&self.root.join("courses")).await?;
        courses.retain(|c| !self.pending.contains_key(&c.id));
        for (id, change) in &self.pending {
            if *change == PendingChange::Save {
                if let Some(course) = read_json(&self.staged_path(*id)).await? {
                    courses.push(course);
                }
            }
        }
        courses.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(courses)
    }

    async fn delete_course(&mut self, id: CourseId) -> Result<()> {
        remove_if_exists(&self.staged_path(id)).await?;
        self.pending.insert(id, PendingChange::Delete);
        Ok(())
    }

    async fn commit(&mut self, message: &str) -> Result<()> {
        let count = self.pending.len();
        while let Some((id, change)) = self.pending.pop_first() {
            if let Err(e) = self.apply(id, change).await {
                // Keep it staged so a later commit or rollback can finish
                self.pending.insert(id, change);
                return Err(e);
            }
        }
        debug!("Committed {} change(s): {}", count, message);
        Ok(())
    }

    async fn rollback(&mut self) -> Result<()> {
        let pending = std::mem::take(&mut self.pending);
        for (id, change) in pending {
            if change == PendingChange::Save {
                if let Err(e) = remove_if_exists(&self.staged_path(id)).await {
                    warn!("Failed to discard staged course {}: {}", id, e);
                }
            }
        }
        debug!("Rolled back pending changes");
        Ok(())
    }
}

async fn remove_if_exists(path: &Path) -> std::io::Result<()> {
    match fs::remove_file(path).await {
        Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}

async fn read_version(path: &Path) -> u64 {
    match fs::read_to_string(path).await {
        Ok(s) => serde_json::from_str::<serde_json::Value>(&s)
            .ok()
            .and_then(|json| json.get("version").and_then(|v| v.as_u64()))
            .unwrap_or(0),
        Err(_) => 0,
    }
}

async fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    match fs::read_to_string(path).await {
        Ok(json) => {
            let value = serde_json::from_str(&json)?;
            Ok(Some(value))
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Read every `*.json` file in a directory; staged `*.json.tmp` files are skipped.
async fn list_dir<T: serde::de::DeserializeOwned>(dir: &Path) -> Result<Vec<T>> {
    let mut items = Vec::new();
    let mut rd = fs::read_dir(dir).await?;
    while let Some(entry) = rd.next_entry().await? {
        if entry.path().extension().and_then(|s| s.to_str()) != Some("json") {
            continue;
        }
        if let Ok(Some(item)) = read_json(&entry.path()).await {
            items.push(item);
        }
    }
    Ok(items)
}
