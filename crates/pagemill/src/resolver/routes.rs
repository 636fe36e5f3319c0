// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Pattern routes declared in configuration.
//!
//! ```toml
//! [[routes]]
//! pattern = "/blog/{slug}"
//! template = "blog/post.tpl"
//! data = "blog/{slug}"
//! devices = ["pc", "ipad"]
//! ```

use super::{Device, RequestContext, RouteDefinition};
use crate::error::Result;
use crate::registry::to_canonical_id;
use matchit::Router as MatchitRouter;
use serde::Deserialize;
use serde_json::Value;

/// One `[[routes]]` entry.
#[derive(Debug, Clone, Deserialize)]
pub struct RouteConfig {
    /// matchit URL pattern (without language prefix), e.g. `/blog/{slug}`.
    pub pattern: String,

    /// Template path or canonical id; `{param}` placeholders are substituted.
    pub template: String,

    /// Record path to load as page data; `{param}` placeholders are substituted.
    #[serde(default)]
    pub data: Option<String>,

    /// Languages the route applies to (all when empty).
    #[serde(default)]
    pub languages: Vec<String>,

    /// Devices the route applies to (all when empty).
    #[serde(default)]
    pub devices: Vec<Device>,

    /// Fixed URL paths rendered by the static build.
    #[serde(default)]
    pub static_paths: Vec<String>,
}

/// A route matching URL patterns with matchit.
pub struct PatternRoute {
    config: RouteConfig,
    matcher: MatchitRouter<()>,
}

impl PatternRoute {
    /// Builds the route, failing on an invalid pattern.
    pub fn new(config: RouteConfig) -> Result<Self> {
        let mut matcher = MatchitRouter::new();
        matcher.insert(normalize_path(&config.pattern), ())?;
        Ok(Self { config, matcher })
    }

    /// The route's configuration.
    pub fn config(&self) -> &RouteConfig {
        &self.config
    }

    fn params(&self, path: &str) -> Option<Vec<(String, String)>> {
        let path = normalize_path(path);
        let matched = self.matcher.at(&path).ok()?;
        Some(
            matched
                .params
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )
    }

    fn substitute(&self, template: &str, ctx: &RequestContext<'_>) -> String {
        let mut out = template.replace("{language}", ctx.language);
        for (key, value) in self.params(ctx.path).unwrap_or_default() {
            out = out.replace(&format!("{{{}}}", key), &value);
        }
        out
    }
}

fn normalize_path(path: &str) -> String {
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{}", trimmed)
    }
}

impl RouteDefinition for PatternRoute {
    fn matches(&self, ctx: &RequestContext<'_>) -> bool {
        if !self.config.languages.is_empty() && !self.config.languages.iter().any(|l| l == ctx.language) {
            return false;
        }
        if !self.config.devices.is_empty() && !self.config.devices.contains(&ctx.device) {
            return false;
        }
        self.params(ctx.path).is_some()
    }

    fn data(&self, ctx: &RequestContext<'_>) -> Result<Option<Value>> {
        match &self.config.data {
            Some(record) => ctx.data.load(ctx.language, &self.substitute(record, ctx)),
            None => Ok(None),
        }
    }

    fn template_id(&self, ctx: &RequestContext<'_>) -> String {
        to_canonical_id(&self.substitute(&self.config.template, ctx))
    }

    fn static_paths(&self) -> &[String] {
        &self.config.static_paths
    }
}
