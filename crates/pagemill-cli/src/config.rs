// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! pagemill project configuration.
//!
//! Configuration is loaded from `pagemill.toml` at the project root.
//!
//! # Example Configuration
//!
//! ```toml
//! [project]
//! name = "my-site"
//!
//! [site]
//! languages = ["en", "fr"]
//! template_root = "src/templates"
//! output_dir = "dist"
//!
//! [[fetch.custom]]
//! function = "get_posts_data"
//! output = "blog/[slug]"
//!
//! [dev]
//! port = 3000
//!
//! [[routes]]
//! pattern = "/blog/{slug}"
//! template = "blog/post.tpl"
//! data = "blog/{slug}"
//! ```

use pagemill::{CustomDataEntry, Resolver, RouteConfig, SiteConfig};
use serde::Deserialize;
use std::fs;
use std::path::Path;

/// Name of the project configuration file.
pub const CONFIG_FILE: &str = "pagemill.toml";

/// Main configuration structure loaded from `pagemill.toml`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Project metadata.
    #[serde(default)]
    pub project: ProjectConfig,
    /// Pipeline paths and languages.
    #[serde(default)]
    pub site: SiteConfig,
    /// Data fetch settings.
    #[serde(default)]
    pub fetch: FetchConfig,
    /// Development server settings.
    #[serde(default)]
    pub dev: DevConfig,
    /// Explicit routes, matched in declaration order.
    #[serde(default)]
    pub routes: Vec<RouteConfig>,
}

/// Project metadata configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ProjectConfig {
    /// Project name.
    #[serde(default = "default_name")]
    pub name: String,
}

/// Data fetch configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FetchConfig {
    /// Data functions whose output is placed by path instead of by template.
    #[serde(default)]
    pub custom: Vec<CustomDataEntry>,
}

/// Development server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DevConfig {
    /// Server port (default: 3000).
    #[serde(default = "default_port")]
    pub port: u16,
    /// Server host (default: "127.0.0.1").
    #[serde(default = "default_host")]
    pub host: String,
}

fn default_name() -> String {
    "unnamed".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self { name: default_name() }
    }
}

impl Default for DevConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            host: default_host(),
        }
    }
}

impl Config {
    /// Loads configuration from `pagemill.toml` in the current directory.
    pub fn load() -> anyhow::Result<Self> {
        Self::load_from(&std::env::current_dir()?)
    }

    /// Loads configuration from `pagemill.toml` in `dir`.
    ///
    /// If no configuration file exists, returns default configuration. Site
    /// paths are resolved against `dir` either way.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration file exists but cannot be parsed.
    pub fn load_from(dir: &Path) -> anyhow::Result<Self> {
        let config_path = dir.join(CONFIG_FILE);

        let mut config = if config_path.exists() {
            let content = fs::read_to_string(&config_path)?;
            toml::from_str::<Config>(&content)
                .map_err(|e| anyhow::anyhow!("{}: {}", config_path.display(), e))?
        } else {
            tracing::debug!("No {} in {}, using defaults", CONFIG_FILE, dir.display());
            Config::default()
        };

        config.site.project_root = dir.to_path_buf();
        Ok(config)
    }

    /// Builds a resolver over `template_ids` with the configured routes.
    pub fn resolver(&self, template_ids: &[String]) -> anyhow::Result<Resolver> {
        let resolver = Resolver::new(&self.site, template_ids.iter().cloned()).with_route_configs(&self.routes)?;
        Ok(resolver)
    }
}
