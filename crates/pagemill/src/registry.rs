// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Template discovery and canonical identifiers.
//!
//! Every template file under the template root gets a flat canonical id
//! derived from its relative path: separators become `_` and the extension is
//! dropped. `blog/post.tpl` becomes `blog_post`. The id names the template's
//! render function in the bundle and its data function (`get_blog_post_data`).
//!
//! ```rust,ignore
//! let registry = TemplateRegistry::new(&config);
//! for template in registry.list_templates()? {
//!     println!("{} -> {}", template.path, template.canonical_id);
//! }
//! ```

use crate::config::SiteConfig;
use crate::error::{PagemillError, Result};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

/// Name of the data function shared by every page of a language.
pub const COMMON_DATA_FUNCTION: &str = "get_common_data";

/// A discovered template.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TemplateFile {
    /// Slash-separated path relative to the template root.
    pub path: String,
    /// Flat identifier derived from `path`.
    pub canonical_id: String,
}

impl TemplateFile {
    /// Creates a template entry from a relative path.
    pub fn new(path: impl Into<String>) -> Self {
        let path = normalize_separators(&path.into());
        let canonical_id = to_canonical_id(&path);
        Self { path, canonical_id }
    }

    /// The `get_<id>_data` function name for this template.
    pub fn data_function_name(&self) -> String {
        data_function_name(&self.canonical_id)
    }

    /// Directory part of `path` ("" for top-level templates).
    pub fn dir(&self) -> &str {
        match self.path.rfind('/') {
            Some(pos) => &self.path[..pos],
            None => "",
        }
    }

    /// File name without extension.
    pub fn stem(&self) -> &str {
        let name = match self.path.rfind('/') {
            Some(pos) => &self.path[pos + 1..],
            None => &self.path,
        };
        match name.rfind('.') {
            Some(pos) if pos > 0 => &name[..pos],
            _ => name,
        }
    }
}

/// Converts backslashes to forward slashes.
pub fn normalize_separators(path: &str) -> String {
    path.replace('\\', "/")
}

/// Converts a Path to a string with forward slashes.
pub fn path_to_string<P: AsRef<Path>>(path: P) -> String {
    normalize_separators(&path.as_ref().to_string_lossy())
}

/// Derives the canonical id of a template path.
pub fn to_canonical_id(path: &str) -> String {
    let path = normalize_separators(path);
    let path = path.trim_start_matches('/');
    let without_ext = match path.rfind('.') {
        Some(dot) if dot > path.rfind('/').map(|s| s + 1).unwrap_or(0) => &path[..dot],
        _ => path,
    };
    without_ext.replace('/', "_")
}

/// Maps a canonical id back to its template path.
pub fn to_path(canonical_id: &str, ext: &str) -> String {
    format!("{}.{}", canonical_id.replace('_', "/"), ext)
}

/// Builds the data function name for a canonical id.
pub fn data_function_name(canonical_id: &str) -> String {
    format!("get_{}_data", canonical_id)
}

/// Finds the template a data function name refers to.
///
/// Accepts `get_<id>_data`, `<id>_data`, `get_<id>` or a bare id, and compares
/// ids with `-` and `_` treated as equal.
pub fn find_template_by_function_name<'a, I>(templates: I, name: &str) -> Option<&'a TemplateFile>
where
    I: IntoIterator<Item = &'a TemplateFile>,
{
    let stripped = name.strip_prefix("get_").unwrap_or(name);
    let stripped = stripped.strip_suffix("_data").unwrap_or(stripped);
    let wanted = stripped.replace('-', "_");

    templates.into_iter().find(|template| {
        template.canonical_id == stripped || template.canonical_id.replace('-', "_") == wanted
    })
}

/// Enumerates the template tree.
#[derive(Debug, Clone)]
pub struct TemplateRegistry {
    root: PathBuf,
    ext: String,
}

impl TemplateRegistry {
    /// Creates a registry for the configured template root.
    pub fn new(config: &SiteConfig) -> Self {
        Self {
            root: config.template_root_path(),
            ext: config.template_ext.trim_start_matches('.').to_string(),
        }
    }

    /// The template root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The template file extension.
    pub fn extension(&self) -> &str {
        &self.ext
    }

    /// Recursively lists template files, sorted by path.
    pub fn list_templates(&self) -> Result<BTreeSet<TemplateFile>> {
        // glob yields nothing for a missing root; surface it as an I/O error instead
        std::fs::read_dir(&self.root)?;

        let pattern = format!(
            "{}/**/*.{}",
            glob::Pattern::escape(&self.root.to_string_lossy()),
            self.ext
        );

        let mut templates = BTreeSet::new();
        for entry in glob::glob(&pattern)? {
            let path = entry.map_err(|e| PagemillError::Io(e.into_error()))?;
            if !path.is_file() {
                continue;
            }
            let relative = path.strip_prefix(&self.root).unwrap_or(&path);
            templates.insert(TemplateFile::new(path_to_string(relative)));
        }

        tracing::debug!("Found {} template(s) under {}", templates.len(), self.root.display());
        Ok(templates)
    }

    /// Template path for a canonical id, using this registry's extension.
    pub fn to_path(&self, canonical_id: &str) -> String {
        to_path(canonical_id, &self.ext)
    }

    /// Absolute file path of a template.
    pub fn file_path(&self, template_path: &str) -> PathBuf {
        self.root.join(normalize_separators(template_path))
    }

    /// Returns true if a template exists at `template_path`.
    pub fn exists(&self, template_path: &str) -> bool {
        self.file_path(template_path).is_file()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn registry_for(dir: &Path) -> TemplateRegistry {
        let config = SiteConfig {
            template_root: dir.to_string_lossy().to_string(),
            ..SiteConfig::default()
        };
        TemplateRegistry::new(&config)
    }

    #[test]
    fn test_canonical_id() {
        assert_eq!(to_canonical_id("home.tpl"), "home");
        assert_eq!(to_canonical_id("blog/post.tpl"), "blog_post");
        assert_eq!(to_canonical_id("blog\\post.tpl"), "blog_post");
        assert_eq!(to_canonical_id("v1.2/page"), "v1.2_page");
    }

    #[test]
    fn test_round_trip_for_listed_templates() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("blog/archive")).unwrap();
        fs::write(dir.path().join("home.tpl"), "").unwrap();
        fs::write(dir.path().join("blog/post.tpl"), "").unwrap();
        fs::write(dir.path().join("blog/archive/index.tpl"), "").unwrap();
        fs::write(dir.path().join("notes.txt"), "").unwrap();

        let registry = registry_for(dir.path());
        let templates = registry.list_templates().unwrap();

        assert_eq!(templates.len(), 3);
        for template in &templates {
            assert_eq!(registry.to_path(&template.canonical_id), template.path);
        }
    }

    #[test]
    fn test_missing_root_is_io_error() {
        let dir = TempDir::new().unwrap();
        let registry = registry_for(&dir.path().join("missing"));
        assert!(matches!(registry.list_templates(), Err(PagemillError::Io(_))));
    }

    #[test]
    fn test_find_template_by_function_name() {
        let templates = vec![
            TemplateFile::new("home.tpl"),
            TemplateFile::new("blog/post.tpl"),
            TemplateFile::new("about-us.tpl"),
        ];

        let found = find_template_by_function_name(&templates, "get_blog_post_data").unwrap();
        assert_eq!(found.path, "blog/post.tpl");

        let found = find_template_by_function_name(&templates, "home").unwrap();
        assert_eq!(found.path, "home.tpl");

        let found = find_template_by_function_name(&templates, "get_about_us_data").unwrap();
        assert_eq!(found.path, "about-us.tpl");

        assert!(find_template_by_function_name(&templates, "get_missing_data").is_none());
    }

    #[test]
    fn test_dir_and_stem() {
        let template = TemplateFile::new("blog/post.tpl");
        assert_eq!(template.dir(), "blog");
        assert_eq!(template.stem(), "post");
        assert_eq!(template.data_function_name(), "get_blog_post_data");

        let top = TemplateFile::new("home.tpl");
        assert_eq!(top.dir(), "");
        assert_eq!(top.stem(), "home");
    }
}
