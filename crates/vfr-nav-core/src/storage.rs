// SPDX-License-Identifier: MIT
// Copyright (c) 2026 StarTuz

use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Flat string key/value namespace shared by every plan and the selection
/// pointer.
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>>;

    fn set(&mut self, key: &str, value: &str) -> Result<()>;

    /// Removing a missing key is not an error.
    fn remove(&mut self, key: &str) -> Result<()>;

    fn keys(&self) -> Result<Vec<String>>;
}

/// One `<encoded key>.json` file per key inside a directory.
///
/// File names stay distinct on case-insensitive filesystems: keys are
/// percent-encoded, then each uppercase ASCII letter becomes `^` followed by
/// its lowercase form. The only uppercase letters left are the hex digits of
/// `%XX` escapes, and `^` itself is always escaped by the first pass.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

const EXTENSION: &str = ".json";
const UPPERCASE_MARK: char = '^';

fn encode_key(key: &str) -> String {
    let mut encoded = String::with_capacity(key.len());
    for c in urlencoding::encode(key).chars() {
        if c.is_ascii_uppercase() && !encoded.ends_with('%') && !after_escape_start(&encoded) {
            encoded.push(UPPERCASE_MARK);
            encoded.push(c.to_ascii_lowercase());
        } else {
            encoded.push(c);
        }
    }
    encoded
}

/// Whether the next character is the second hex digit of a `%XX` escape.
fn after_escape_start(encoded: &str) -> bool {
    let bytes = encoded.as_bytes();
    bytes.len() >= 2 && bytes[bytes.len() - 2] == b'%'
}

fn decode_key(file_stem: &str) -> Option<String> {
    let mut percent_encoded = String::with_capacity(file_stem.len());
    let mut chars = file_stem.chars();
    while let Some(c) = chars.next() {
        if c == UPPERCASE_MARK {
            percent_encoded.push(chars.next()?.to_ascii_uppercase());
        } else {
            percent_encoded.push(c);
        }
    }
    urlencoding::decode(&percent_encoded)
        .ok()
        .map(|key| key.into_owned())
}

impl FileStore {
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    /// Store under `<config root>/plans`.
    pub fn open_default() -> Self {
        Self::new(crate::get_config_root().join("plans"))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}{}", encode_key(key), EXTENSION))
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let path = self.path_for(key);
        if !path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Ok(Some(content))
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        if !self.dir.exists() {
            fs::create_dir_all(&self.dir)
                .with_context(|| format!("Failed to create {}", self.dir.display()))?;
        }
        let path = self.path_for(key);
        log::debug!("[Storage] Writing {} bytes to {}", value.len(), path.display());
        fs::write(&path, value).with_context(|| format!("Failed to write {}", path.display()))
    }

    fn remove(&mut self, key: &str) -> Result<()> {
        let path = self.path_for(key);
        if path.exists() {
            fs::remove_file(&path)
                .with_context(|| format!("Failed to remove {}", path.display()))?;
        }
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }

        let mut keys = Vec::new();
        let entries = fs::read_dir(&self.dir)
            .with_context(|| format!("Failed to list {}", self.dir.display()))?;
        for entry in entries {
            let entry = entry?;
            let file_name = entry.file_name();
            let Some(encoded) = file_name
                .to_str()
                .and_then(|name| name.strip_suffix(EXTENSION))
            else {
                continue;
            };
            match decode_key(encoded) {
                Some(key) => keys.push(key),
                None => log::warn!("[Storage] Ignoring undecodable file {:?}", file_name),
            }
        }
        keys.sort();
        Ok(keys)
    }
}

/// In-memory store, mostly for tests.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: BTreeMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<()> {
        self.entries.remove(key);
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>> {
        Ok(self.entries.keys().cloned().collect())
    }
}
