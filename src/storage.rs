//! Local key-value storage.
//!
//! A single JSON object file whose values are strings, each holding its own
//! JSON blob. Every write rewrites the whole file.

use crate::task::Task;
use log::{debug, warn};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const TASKS_KEY: &str = "TASKS";
pub const THEME_KEY: &str = "THEME";
pub const WALLPAPER_KEY: &str = "WALLPAPER";

const STORAGE_FILE: &str = "storage.json";

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("failed to access `{path}`: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to encode storage: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Stored array elements are either full records or the bare strings the
/// browser page used to write.
#[derive(Deserialize)]
#[serde(untagged)]
enum StoredTask {
    Record(Task),
    Text(String),
}

pub struct Storage {
    path: PathBuf,
    items: BTreeMap<String, String>,
}

impl Storage {
    /// Opens the store in `dir`. Unreadable or malformed files start empty.
    pub fn open(dir: &Path) -> Self {
        let path = dir.join(STORAGE_FILE);
        let items = match fs::read_to_string(&path) {
            Ok(data) => serde_json::from_str(&data).unwrap_or_else(|err| {
                warn!(
                    "event=storage_open module=storage status=fallback path={} reason={err}",
                    path.display()
                );
                BTreeMap::new()
            }),
            Err(err) if err.kind() == io::ErrorKind::NotFound => BTreeMap::new(),
            Err(err) => {
                warn!(
                    "event=storage_open module=storage status=fallback path={} reason={err}",
                    path.display()
                );
                BTreeMap::new()
            }
        };
        Self { path, items }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get_item(&self, key: &str) -> Option<&str> {
        self.items.get(key).map(String::as_str)
    }

    pub fn set_item(&mut self, key: &str, value: impl Into<String>) -> Result<(), StorageError> {
        self.items.insert(key.to_string(), value.into());
        self.flush()
    }

    pub fn remove_item(&mut self, key: &str) -> Result<(), StorageError> {
        if self.items.remove(key).is_some() {
            self.flush()?;
        }
        Ok(())
    }

    /// Decodes the JSON value under `key`. Missing or malformed values are `None`.
    pub fn get_value<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = self.get_item(key)?;
        match serde_json::from_str(raw) {
            Ok(value) => Some(value),
            Err(err) => {
                warn!("event=get_value module=storage status=fallback key={key} reason={err}");
                None
            }
        }
    }

    pub fn set_value<T: Serialize + ?Sized>(&mut self, key: &str, value: &T) -> Result<(), StorageError> {
        let encoded = serde_json::to_string(value)?;
        self.set_item(key, encoded)
    }

    /// Reads the task list. Missing or malformed data yields an empty list.
    pub fn load_tasks(&self) -> Vec<Task> {
        let Some(raw) = self.get_item(TASKS_KEY) else {
            return Vec::new();
        };
        match serde_json::from_str::<Vec<StoredTask>>(raw) {
            Ok(stored) => {
                let tasks = assign_ids(stored);
                debug!("event=load_tasks module=storage status=ok count={}", tasks.len());
                tasks
            }
            Err(err) => {
                warn!("event=load_tasks module=storage status=fallback reason={err}");
                Vec::new()
            }
        }
    }

    pub fn save_tasks(&mut self, tasks: &[Task]) -> Result<(), StorageError> {
        let encoded = serde_json::to_string(tasks)?;
        self.set_item(TASKS_KEY, encoded)?;
        debug!("event=save_tasks module=storage status=ok count={}", tasks.len());
        Ok(())
    }

    fn flush(&self) -> Result<(), StorageError> {
        let io_err = |source| StorageError::Io {
            path: self.path.clone(),
            source,
        };
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
        let encoded = serde_json::to_string_pretty(&self.items)?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, encoded).map_err(io_err)?;
        fs::rename(&tmp, &self.path).map_err(io_err)?;
        Ok(())
    }
}

/// Gives bare-string entries an id and renames repeated record ids, so ids
/// are unique across the whole decoded array.
fn assign_ids(stored: Vec<StoredTask>) -> Vec<Task> {
    let record_ids: HashSet<String> = stored
        .iter()
        .filter_map(|item| match item {
            StoredTask::Record(task) => Some(task.id.clone()),
            StoredTask::Text(_) => None,
        })
        .collect();

    let mut taken: HashSet<String> = HashSet::with_capacity(stored.len());
    let mut tasks = Vec::with_capacity(stored.len());
    for (index, item) in stored.into_iter().enumerate() {
        let task = match item {
            StoredTask::Record(mut task) => {
                if taken.contains(&task.id) {
                    let renamed = unique_id(&task.id, |id| taken.contains(id) || record_ids.contains(id));
                    warn!(
                        "event=load_tasks module=storage status=repaired duplicate_id={} new_id={renamed}",
                        task.id
                    );
                    task.id = renamed;
                }
                task
            }
            StoredTask::Text(text) => {
                let id = unique_id(&format!("legacy-{index}"), |id| {
                    taken.contains(id) || record_ids.contains(id)
                });
                Task::new(id, text)
            }
        };
        taken.insert(task.id.clone());
        tasks.push(task);
    }
    tasks
}

fn unique_id(base: &str, used: impl Fn(&str) -> bool) -> String {
    if !used(base) {
        return base.to_string();
    }
    (1..)
        .map(|n| format!("{base}-{n}"))
        .find(|candidate| !used(candidate.as_str()))
        .unwrap_or_else(|| base.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::Repeat;
    use chrono::NaiveDateTime;

    #[test]
    fn tasks_round_trip_through_reload() {
        let dir = tempfile::tempdir().unwrap();
        let mut task = Task::new("1714557600000", "dentist");
        task.category = Some("health".to_string());
        task.important = true;
        task.due = Some(NaiveDateTime::parse_from_str("2024-05-02 14:30", "%Y-%m-%d %H:%M").unwrap());
        task.repeat = Repeat::Weekly;
        let tasks = vec![task, Task::new("1714557600001", "groceries")];

        let mut storage = Storage::open(dir.path());
        storage.save_tasks(&tasks).unwrap();

        let reopened = Storage::open(dir.path());
        assert_eq!(reopened.load_tasks(), tasks);
    }

    #[test]
    fn missing_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        assert!(Storage::open(dir.path()).load_tasks().is_empty());
    }

    #[test]
    fn corrupt_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(STORAGE_FILE), "{not json").unwrap();
        assert!(Storage::open(dir.path()).load_tasks().is_empty());
    }

    #[test]
    fn malformed_tasks_value_loads_empty_but_keeps_other_keys() {
        let dir = tempfile::tempdir().unwrap();
        let mut storage = Storage::open(dir.path());
        storage.set_item(TASKS_KEY, "[{\"id\": 3}]").unwrap();
        storage.set_item(THEME_KEY, "\"dark\"").unwrap();

        let reopened = Storage::open(dir.path());
        assert!(reopened.load_tasks().is_empty());
        assert_eq!(reopened.get_item(THEME_KEY), Some("\"dark\""));
    }

    #[test]
    fn bare_string_entries_load_as_tasks() {
        let dir = tempfile::tempdir().unwrap();
        let mut storage = Storage::open(dir.path());
        storage
            .set_item(TASKS_KEY, r#"["call mom", {"id":"legacy-1","text":"x"}, "feed cat"]"#)
            .unwrap();

        let tasks = storage.load_tasks();
        let texts: Vec<&str> = tasks.iter().map(|t| t.text.as_str()).collect();
        assert_eq!(texts, vec!["call mom", "x", "feed cat"]);
        assert_eq!(tasks[0].id, "legacy-0");
        assert_eq!(tasks[2].id, "legacy-2");
    }

    #[test]
    fn legacy_ids_avoid_later_record_ids() {
        let dir = tempfile::tempdir().unwrap();
        let mut storage = Storage::open(dir.path());
        storage
            .set_item(TASKS_KEY, r#"["from browser", {"id":"legacy-0","text":"record"}]"#)
            .unwrap();

        let tasks = storage.load_tasks();
        assert_eq!(tasks[1].id, "legacy-0");
        assert_eq!(tasks[0].id, "legacy-0-1");
    }

    #[test]
    fn duplicate_record_ids_are_renamed() {
        let dir = tempfile::tempdir().unwrap();
        let mut storage = Storage::open(dir.path());
        storage
            .set_item(
                TASKS_KEY,
                r#"[{"id":"7","text":"a"}, {"id":"7","text":"b"}, {"id":"7-1","text":"c"}]"#,
            )
            .unwrap();

        let tasks = storage.load_tasks();
        let ids: Vec<&str> = tasks.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["7", "7-2", "7-1"]);
        let texts: Vec<&str> = tasks.iter().map(|t| t.text.as_str()).collect();
        assert_eq!(texts, vec!["a", "b", "c"]);
    }

    #[test]
    fn values_are_json_encoded() {
        let dir = tempfile::tempdir().unwrap();
        let mut storage = Storage::open(dir.path());
        storage.set_value(THEME_KEY, &crate::theme::Theme::Dark).unwrap();
        assert_eq!(storage.get_item(THEME_KEY), Some("\"dark\""));

        let reopened = Storage::open(dir.path());
        assert_eq!(reopened.get_value(THEME_KEY), Some(crate::theme::Theme::Dark));

        storage.set_item(WALLPAPER_KEY, "ocean").unwrap();
        assert_eq!(storage.get_value::<crate::wallpaper::Wallpaper>(WALLPAPER_KEY), None);
    }

    #[test]
    fn remove_item_drops_key() {
        let dir = tempfile::tempdir().unwrap();
        let mut storage = Storage::open(dir.path());
        storage.set_item(WALLPAPER_KEY, "ocean").unwrap();
        storage.remove_item(WALLPAPER_KEY).unwrap();
        assert_eq!(Storage::open(dir.path()).get_item(WALLPAPER_KEY), None);
    }
}
