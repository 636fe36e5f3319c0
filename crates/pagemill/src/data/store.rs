// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! On-disk data records.
//!
//! Records live at `<root>/<language>/<path>.json`. The store never locks:
//! two fetch runs writing the same tree at once must be serialized by the
//! caller.

use crate::error::{PagemillError, Result};
use crate::registry::path_to_string;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};

/// Record holding the output of `get_common_data`.
pub const COMMON_RECORD: &str = "_common";

/// Handle to the persisted data records of a site.
#[derive(Debug, Clone)]
pub struct DataStore {
    root: PathBuf,
}

impl DataStore {
    /// Creates a store rooted at `root`.
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// The store root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// File path of a record.
    pub fn record_path(&self, language: &str, path: &str) -> PathBuf {
        let path = path.trim_matches('/');
        let path = path.strip_suffix(".json").unwrap_or(path);
        self.root.join(language).join(format!("{}.json", path))
    }

    /// Writes a record, creating parent directories.
    pub async fn write(&self, language: &str, path: &str, value: &Value) -> Result<PathBuf> {
        let file = self.record_path(language, path);
        if let Some(parent) = file.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let json = serde_json::to_vec_pretty(value)?;
        tokio::fs::write(&file, json).await?;
        tracing::debug!("Wrote record {}", file.display());
        Ok(file)
    }

    /// Reads a record, returning `None` if it does not exist.
    pub fn load(&self, language: &str, path: &str) -> Result<Option<Value>> {
        let file = self.record_path(language, path);
        let content = match std::fs::read_to_string(&file) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        Ok(Some(serde_json::from_str(&content)?))
    }

    /// Reads the common record of a language.
    pub fn load_common(&self, language: &str) -> Result<Option<Value>> {
        self.load(language, COMMON_RECORD)
    }

    /// Removes every record.
    pub async fn clear_all(&self) -> Result<()> {
        remove_dir_if_exists(&self.root).await
    }

    /// Removes every record of one language.
    pub async fn clear_language(&self, language: &str) -> Result<()> {
        remove_dir_if_exists(&self.root.join(language)).await
    }

    /// Lists record paths of a language (relative, without `.json`), sorted.
    pub fn list_records(&self, language: &str) -> Result<Vec<String>> {
        let dir = self.root.join(language);
        if !dir.is_dir() {
            return Ok(Vec::new());
        }

        let pattern = format!("{}/**/*.json", glob::Pattern::escape(&dir.to_string_lossy()));
        let mut records = Vec::new();
        for entry in glob::glob(&pattern)? {
            let path = entry.map_err(|e| PagemillError::Io(e.into_error()))?;
            let relative = path_to_string(path.strip_prefix(&dir).unwrap_or(&path));
            if let Some(name) = relative.strip_suffix(".json") {
                records.push(name.to_string());
            }
        }
        records.sort();
        Ok(records)
    }

    /// Builds the render context for a page.
    ///
    /// Object records are used as-is; anything else is wrapped under `data`.
    /// The language's common record is added under `common`, and the language
    /// code under `language`, unless the record already defines them.
    pub fn page_context(&self, language: &str, data: Option<Value>) -> Result<Value> {
        let mut context = match data {
            Some(Value::Object(map)) => map,
            Some(other) => {
                let mut map = Map::new();
                map.insert("data".to_string(), other);
                map
            }
            None => Map::new(),
        };

        if !context.contains_key("common") {
            if let Some(common) = self.load_common(language)? {
                context.insert("common".to_string(), common);
            }
        }
        context
            .entry("language".to_string())
            .or_insert_with(|| Value::String(language.to_string()));

        Ok(Value::Object(context))
    }
}

async fn remove_dir_if_exists(dir: &Path) -> Result<()> {
    match tokio::fs::remove_dir_all(dir).await {
        Ok(()) => {
            tracing::debug!("Cleared {}", dir.display());
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}
