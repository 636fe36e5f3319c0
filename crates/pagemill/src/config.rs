// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Site configuration shared by every pipeline component.
//!
//! A [`SiteConfig`] is constructed once (usually from the `[site]` table of
//! `pagemill.toml`) and passed by reference into each component constructor.
//! Relative directories are resolved against [`SiteConfig::project_root`].

use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Paths, languages and limits for one site.
#[derive(Debug, Clone, Deserialize)]
pub struct SiteConfig {
    /// Directory that relative paths are resolved against.
    #[serde(skip, default = "default_project_root")]
    pub project_root: PathBuf,

    /// Languages the site is built for (default: `["en"]`).
    #[serde(default = "default_languages")]
    pub languages: Vec<String>,

    /// Language used when a URL carries no language prefix.
    /// Falls back to the first entry of `languages`.
    #[serde(default)]
    pub default_language: Option<String>,

    /// Root of the template tree (default: "src/templates").
    #[serde(default = "default_template_root")]
    pub template_root: String,

    /// Template file extension without the dot (default: "tpl").
    #[serde(default = "default_template_ext")]
    pub template_ext: String,

    /// Lua file returning the table of data functions (default: "src/data.lua").
    #[serde(default = "default_data_source")]
    pub data_source: String,

    /// Where persisted data records are written (default: ".pagemill/data").
    #[serde(default = "default_data_dir")]
    pub data_dir: String,

    /// Compiled bundle artifact (default: ".pagemill/templates.lua").
    #[serde(default = "default_bundle_path")]
    pub bundle_path: String,

    /// Compiled fragment cache (default: ".pagemill/cache").
    #[serde(default = "default_cache_dir")]
    pub cache_dir: String,

    /// Static build output (default: "dist").
    #[serde(default = "default_output_dir")]
    pub output_dir: String,

    /// Public assets copied into the output (default: "public").
    #[serde(default = "default_public_dir")]
    pub public_dir: String,

    /// Concurrent data functions / compiles (default: 10).
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,

    /// Nesting limit for isolated fragments (default: 10).
    #[serde(default = "default_scope_max_depth")]
    pub scope_max_depth: usize,
}

fn default_project_root() -> PathBuf {
    PathBuf::from(".")
}

fn default_languages() -> Vec<String> {
    vec!["en".to_string()]
}

fn default_template_root() -> String {
    "src/templates".to_string()
}

fn default_template_ext() -> String {
    "tpl".to_string()
}

fn default_data_source() -> String {
    "src/data.lua".to_string()
}

fn default_data_dir() -> String {
    ".pagemill/data".to_string()
}

fn default_bundle_path() -> String {
    ".pagemill/templates.lua".to_string()
}

fn default_cache_dir() -> String {
    ".pagemill/cache".to_string()
}

fn default_output_dir() -> String {
    "dist".to_string()
}

fn default_public_dir() -> String {
    "public".to_string()
}

fn default_max_concurrency() -> usize {
    10
}

fn default_scope_max_depth() -> usize {
    10
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            project_root: default_project_root(),
            languages: default_languages(),
            default_language: None,
            template_root: default_template_root(),
            template_ext: default_template_ext(),
            data_source: default_data_source(),
            data_dir: default_data_dir(),
            bundle_path: default_bundle_path(),
            cache_dir: default_cache_dir(),
            output_dir: default_output_dir(),
            public_dir: default_public_dir(),
            max_concurrency: default_max_concurrency(),
            scope_max_depth: default_scope_max_depth(),
        }
    }
}

impl SiteConfig {
    /// Returns a copy rooted at `root`.
    pub fn with_project_root<P: AsRef<Path>>(mut self, root: P) -> Self {
        self.project_root = root.as_ref().to_path_buf();
        self
    }

    /// Sets the site languages.
    pub fn with_languages<I, S>(mut self, languages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.languages = languages.into_iter().map(Into::into).collect();
        self
    }

    /// Resolves a configured path against the project root.
    pub fn resolve(&self, path: &str) -> PathBuf {
        let p = Path::new(path);
        if p.is_absolute() {
            p.to_path_buf()
        } else {
            self.project_root.join(p)
        }
    }

    /// The language used for unprefixed URLs.
    pub fn default_language(&self) -> &str {
        self.default_language
            .as_deref()
            .or_else(|| self.languages.first().map(String::as_str))
            .unwrap_or("en")
    }

    /// Returns true if `language` is one of the site languages.
    pub fn has_language(&self, language: &str) -> bool {
        self.languages.iter().any(|l| l == language)
    }

    /// Absolute template root.
    pub fn template_root_path(&self) -> PathBuf {
        self.resolve(&self.template_root)
    }

    /// Absolute data store root.
    pub fn data_dir_path(&self) -> PathBuf {
        self.resolve(&self.data_dir)
    }

    /// Absolute bundle path.
    pub fn bundle_file(&self) -> PathBuf {
        self.resolve(&self.bundle_path)
    }

    /// Absolute fragment cache directory.
    pub fn cache_dir_path(&self) -> PathBuf {
        self.resolve(&self.cache_dir)
    }

    /// Absolute output directory.
    pub fn output_dir_path(&self) -> PathBuf {
        self.resolve(&self.output_dir)
    }

    /// Absolute public assets directory.
    pub fn public_dir_path(&self) -> PathBuf {
        self.resolve(&self.public_dir)
    }

    /// Absolute data source file.
    pub fn data_source_path(&self) -> PathBuf {
        self.resolve(&self.data_source)
    }
}
