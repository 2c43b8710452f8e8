// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Asset descriptions persisted in the settings directory.
//!
//! Every accepted description is written verbatim to
//! `<settings_dir>/<uuid>.jsonld`. The store remembers which file belongs to
//! which asset so a deleted asset's file can be removed; files written by an
//! earlier process are matched by parsing them.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use uuid::Uuid;

use uagate_core::description::ThingDescription;
use uagate_core::service::{DescriptionStore, StoredDescription};
use uagate_core::types::AssetId;

/// File extension of persisted descriptions.
pub const DESCRIPTION_EXTENSION: &str = "jsonld";

/// Description store backed by a directory of `*.jsonld` files.
#[derive(Debug)]
pub struct FileDescriptionStore {
    dir: PathBuf,
    files: Mutex<HashMap<AssetId, PathBuf>>,
}

impl FileDescriptionStore {
    /// Opens the store, creating the directory if needed.
    pub fn open(dir: impl Into<PathBuf>) -> io::Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            files: Mutex::new(HashMap::new()),
        })
    }

    /// Returns the settings directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Returns the file holding an asset's description, if known.
    pub fn file_of(&self, asset: &AssetId) -> Option<PathBuf> {
        self.files.lock().get(asset).cloned()
    }

    fn description_files(&self) -> io::Result<Vec<PathBuf>> {
        let mut files: Vec<PathBuf> = fs::read_dir(&self.dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| {
                path.is_file() && path.extension().and_then(|e| e.to_str()) == Some(DESCRIPTION_EXTENSION)
            })
            .collect();
        files.sort();
        Ok(files)
    }

    fn asset_of(text: &str) -> Option<AssetId> {
        ThingDescription::parse(text).ok().map(|td| td.asset_id())
    }

    /// Finds an asset's file by parsing the directory contents.
    fn scan_for(&self, asset: &AssetId) -> io::Result<Option<PathBuf>> {
        for path in self.description_files()? {
            let Ok(text) = fs::read_to_string(&path) else {
                continue;
            };
            if Self::asset_of(&text).as_ref() == Some(asset) {
                return Ok(Some(path));
            }
        }
        Ok(None)
    }
}

impl DescriptionStore for FileDescriptionStore {
    fn save(&self, asset: &AssetId, text: &str) -> io::Result<()> {
        let path = self
            .dir
            .join(format!("{}.{}", Uuid::new_v4(), DESCRIPTION_EXTENSION));
        let temp = path.with_extension("tmp");
        fs::write(&temp, text)?;
        fs::rename(&temp, &path)?;

        tracing::debug!(asset_id = %asset, path = %path.display(), "Description persisted");
        if let Some(previous) = self.files.lock().insert(asset.clone(), path) {
            // A re-created asset keeps only its newest description.
            if let Err(e) = fs::remove_file(&previous) {
                tracing::warn!(path = %previous.display(), error = %e, "Failed to remove superseded description");
            }
        }
        Ok(())
    }

    fn remove(&self, asset: &AssetId) -> io::Result<()> {
        let known = self.files.lock().remove(asset);
        let path = match known {
            Some(path) => Some(path),
            None => self.scan_for(asset)?,
        };
        match path {
            Some(path) => {
                match fs::remove_file(&path) {
                    Ok(()) => {}
                    Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                    Err(e) => return Err(e),
                }
                tracing::debug!(asset_id = %asset, path = %path.display(), "Description removed");
            }
            None => tracing::debug!(asset_id = %asset, "No persisted description to remove"),
        }
        Ok(())
    }

    fn load_all(&self) -> io::Result<Vec<StoredDescription>> {
        let mut stored = Vec::new();
        for path in self.description_files()? {
            let text = match fs::read_to_string(&path) {
                Ok(text) => text,
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Skipping unreadable description");
                    continue;
                }
            };
            if let Some(asset) = Self::asset_of(&text) {
                self.files.lock().insert(asset, path.clone());
            }
            stored.push(StoredDescription {
                source: path.display().to_string(),
                text,
            });
        }
        Ok(stored)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn description(name: &str) -> String {
        format!(
            r#"{{
  "@context": ["https://www.w3.org/2022/wot/td/v1.1"],
  "name": "{name}",
  "title": "Pump",
  "base": "modbus://10.0.0.5:502/1",
  "properties": {{}}
}}"#
        )
    }

    #[test]
    fn test_open_creates_directory() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("nested").join("settings");
        let store = FileDescriptionStore::open(&dir).unwrap();
        assert!(dir.is_dir());
        assert_eq!(store.dir(), dir.as_path());
    }

    #[test]
    fn test_save_writes_uuid_named_jsonld() {
        let temp = TempDir::new().unwrap();
        let store = FileDescriptionStore::open(temp.path()).unwrap();
        let asset = AssetId::new("pump-01");

        store.save(&asset, &description("pump-01")).unwrap();

        let path = store.file_of(&asset).unwrap();
        assert_eq!(path.extension().unwrap(), "jsonld");
        let stem = path.file_stem().unwrap().to_str().unwrap();
        assert!(Uuid::parse_str(stem).is_ok());
        assert_eq!(fs::read_to_string(&path).unwrap(), description("pump-01"));
        assert!(!path.with_extension("tmp").exists());
    }

    #[test]
    fn test_remove_deletes_file() {
        let temp = TempDir::new().unwrap();
        let store = FileDescriptionStore::open(temp.path()).unwrap();
        let asset = AssetId::new("pump-01");
        store.save(&asset, &description("pump-01")).unwrap();
        let path = store.file_of(&asset).unwrap();

        store.remove(&asset).unwrap();
        assert!(!path.exists());
        assert!(store.file_of(&asset).is_none());

        // Unknown assets are ignored.
        store.remove(&AssetId::new("ghost")).unwrap();
    }

    #[test]
    fn test_resave_replaces_previous_file() {
        let temp = TempDir::new().unwrap();
        let store = FileDescriptionStore::open(temp.path()).unwrap();
        let asset = AssetId::new("pump-01");
        store.save(&asset, &description("pump-01")).unwrap();
        let first = store.file_of(&asset).unwrap();
        store.save(&asset, &description("pump-01")).unwrap();

        assert!(!first.exists());
        assert_eq!(store.load_all().unwrap().len(), 1);
    }

    #[test]
    fn test_load_all_from_previous_process() {
        let temp = TempDir::new().unwrap();
        {
            let store = FileDescriptionStore::open(temp.path()).unwrap();
            store.save(&AssetId::new("pump-01"), &description("pump-01")).unwrap();
            store.save(&AssetId::new("pump-02"), &description("pump-02")).unwrap();
        }
        fs::write(temp.path().join("broken.jsonld"), "{ not json").unwrap();
        fs::write(temp.path().join("notes.txt"), "ignored").unwrap();

        let store = FileDescriptionStore::open(temp.path()).unwrap();
        let stored = store.load_all().unwrap();
        // Broken files are returned so the caller can log and skip them.
        assert_eq!(stored.len(), 3);
        assert!(stored.iter().all(|s| s.source.ends_with(".jsonld")));

        let file = store.file_of(&AssetId::new("pump-02")).unwrap();
        store.remove(&AssetId::new("pump-02")).unwrap();
        assert!(!file.exists());
    }

    #[test]
    fn test_remove_scans_without_load() {
        let temp = TempDir::new().unwrap();
        {
            let store = FileDescriptionStore::open(temp.path()).unwrap();
            store.save(&AssetId::new("pump-01"), &description("pump-01")).unwrap();
        }

        let store = FileDescriptionStore::open(temp.path()).unwrap();
        store.remove(&AssetId::new("pump-01")).unwrap();
        assert!(store.load_all().unwrap().is_empty());
    }
}
