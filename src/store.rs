use anyhow::{Context, Result};
use directories::ProjectDirs;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::youtube::Video;

const STORAGE_FILE: &str = "storage.json";

/// String key/value storage persisted as one JSON object in the data dir.
///
/// Every `set` writes the whole file back. Unreadable or malformed files are
/// treated as empty.
#[derive(Debug, Default)]
pub struct Storage {
  path: Option<PathBuf>,
  entries: BTreeMap<String, String>,
}

impl Storage {
  pub fn open_default() -> Self {
    match ProjectDirs::from("", "", "diggr") {
      Some(dirs) => Self::open(dirs.data_dir().join(STORAGE_FILE)),
      None => {
        warn!("storage: no home directory, video order will not persist");
        Self::default()
      }
    }
  }

  pub fn open(path: PathBuf) -> Self {
    let entries = Self::read(&path).unwrap_or_default();
    Self { path: Some(path), entries }
  }

  fn read(path: &Path) -> Option<BTreeMap<String, String>> {
    let content = std::fs::read_to_string(path).ok()?;
    match serde_json::from_str(&content) {
      Ok(entries) => Some(entries),
      Err(e) => {
        warn!(path = %path.display(), err = %e, "storage: ignoring malformed file");
        None
      }
    }
  }

  pub fn get(&self, key: &str) -> Option<&str> {
    self.entries.get(key).map(String::as_str)
  }

  pub fn set(&mut self, key: &str, value: String) -> Result<()> {
    self.entries.insert(key.to_string(), value);
    self.persist()
  }

  fn persist(&self) -> Result<()> {
    let Some(path) = &self.path else { return Ok(()) };
    if let Some(dir) = path.parent() {
      std::fs::create_dir_all(dir).with_context(|| format!("Failed to create {}", dir.display()))?;
    }
    let content = serde_json::to_string_pretty(&self.entries).context("Failed to serialize storage")?;
    std::fs::write(path, content).with_context(|| format!("Failed to write {}", path.display()))
  }
}

// --- Saved video order ---

pub fn order_key(release_id: u64) -> String {
  format!("video-order-{}", release_id)
}

pub fn save_order(storage: &mut Storage, release_id: u64, videos: &[Video]) -> Result<()> {
  let ids: Vec<&str> = videos.iter().map(|v| v.id.as_str()).collect();
  let value = serde_json::to_string(&ids).context("Failed to serialize video order")?;
  debug!(release_id, count = ids.len(), "storage: saving video order");
  storage.set(&order_key(release_id), value)
}

/// Reorder freshly extracted videos by the saved order for this release.
///
/// Saved ids come first in saved order; videos the saved list doesn't know
/// about follow in their original order. Ids no longer on the release are
/// ignored.
pub fn load_order(storage: &Storage, release_id: u64, videos: Vec<Video>) -> Vec<Video> {
  let Some(raw) = storage.get(&order_key(release_id)) else { return videos };
  let Ok(saved) = serde_json::from_str::<Vec<String>>(raw) else {
    warn!(release_id, "storage: ignoring malformed video order");
    return videos;
  };

  let mut remaining: Vec<Option<Video>> = videos.into_iter().map(Some).collect();
  let mut ordered = Vec::with_capacity(remaining.len());
  for id in &saved {
    if let Some(slot) = remaining.iter_mut().find(|v| v.as_ref().is_some_and(|v| &v.id == id)) {
      ordered.extend(slot.take());
    }
  }
  ordered.extend(remaining.into_iter().flatten());
  ordered
}

#[cfg(test)]
mod tests {
  use super::*;

  fn video(id: &str) -> Video {
    Video { id: id.to_string(), title: id.to_string(), description: String::new() }
  }

  fn ids(videos: &[Video]) -> Vec<&str> {
    videos.iter().map(|v| v.id.as_str()).collect()
  }

  #[test]
  fn saved_order_first_then_new() {
    let mut storage = Storage::default();
    save_order(&mut storage, 7, &[video("B"), video("A")]).unwrap();
    let loaded = load_order(&storage, 7, vec![video("A"), video("B"), video("C")]);
    assert_eq!(ids(&loaded), ["B", "A", "C"]);
  }

  #[test]
  fn missing_order_keeps_original() {
    let storage = Storage::default();
    let loaded = load_order(&storage, 7, vec![video("A"), video("B")]);
    assert_eq!(ids(&loaded), ["A", "B"]);
  }

  #[test]
  fn stale_ids_are_skipped() {
    let mut storage = Storage::default();
    save_order(&mut storage, 1, &[video("GONE"), video("B")]).unwrap();
    let loaded = load_order(&storage, 1, vec![video("A"), video("B")]);
    assert_eq!(ids(&loaded), ["B", "A"]);
  }

  #[test]
  fn malformed_order_fails_open() {
    let mut storage = Storage::default();
    storage.set(&order_key(3), "{not json".to_string()).unwrap();
    let loaded = load_order(&storage, 3, vec![video("A"), video("B")]);
    assert_eq!(ids(&loaded), ["A", "B"]);
  }

  #[test]
  fn orders_are_per_release() {
    let mut storage = Storage::default();
    save_order(&mut storage, 1, &[video("B"), video("A")]).unwrap();
    let loaded = load_order(&storage, 2, vec![video("A"), video("B")]);
    assert_eq!(ids(&loaded), ["A", "B"]);
  }

  #[test]
  fn persists_across_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join(STORAGE_FILE);
    let mut storage = Storage::open(path.clone());
    save_order(&mut storage, 42, &[video("Z"), video("Y")]).unwrap();

    let reopened = Storage::open(path);
    assert_eq!(reopened.get("video-order-42"), Some(r#"["Z","Y"]"#));
  }

  #[test]
  fn malformed_file_opens_empty() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join(STORAGE_FILE);
    std::fs::write(&path, "[1, 2").unwrap();
    let storage = Storage::open(path);
    assert_eq!(storage.get("video-order-1"), None);
  }
}
