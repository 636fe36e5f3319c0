// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Rendering from a compiled bundle.
//!
//! The bundle is executed once in a sandboxed Lua state; the table it returns
//! maps canonical ids to render functions.
//!
//! ```rust,ignore
//! let renderer = BundleRenderer::from_file(config.bundle_file())?;
//! let html = renderer.render("home", &serde_json::json!({ "title": "Hi" }))?;
//! ```

use crate::error::{PagemillError, Result};
use crate::lua_env;
use crate::transform::{expand_macros, ScopeRewriter};
use mlua::{Lua, LuaSerdeExt, Table};
use serde_json::Value;
use std::path::Path;

const TEMPLATES_KEY: &str = "__pagemill_templates";

/// Renders templates from a loaded bundle.
pub struct BundleRenderer {
    lua: Lua,
    ids: Vec<String>,
}

impl BundleRenderer {
    /// Loads a bundle file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let code = std::fs::read_to_string(path.as_ref())?;
        Self::from_source(&code)
    }

    /// Loads bundle source.
    pub fn from_source(code: &str) -> Result<Self> {
        let lua = Lua::new();
        lua_env::register_json_module(&lua)?;
        lua_env::sandbox(&lua)?;

        let templates: Table = lua.load(code).set_name("@pagemill_bundle").eval()?;
        let mut ids = Vec::new();
        for pair in templates.pairs::<String, mlua::Function>() {
            let (id, _) = pair?;
            ids.push(id);
        }
        ids.sort();
        lua.set_named_registry_value(TEMPLATES_KEY, templates)?;

        tracing::debug!("Loaded bundle with {} template(s)", ids.len());
        Ok(Self { lua, ids })
    }

    /// Canonical ids in the bundle, sorted.
    pub fn template_ids(&self) -> &[String] {
        &self.ids
    }

    /// Returns true if the bundle has a template for `id`.
    pub fn has_template(&self, id: &str) -> bool {
        self.ids.binary_search_by(|probe| probe.as_str().cmp(id)).is_ok()
    }

    /// Renders template `id` with `data`.
    pub fn render(&self, id: &str, data: &Value) -> Result<String> {
        if !self.has_template(id) {
            return Err(PagemillError::Resolution(format!("template '{}' is not in the bundle", id)));
        }
        let templates: Table = self.lua.named_registry_value(TEMPLATES_KEY)?;
        let function: mlua::Function = templates.get(id)?;
        let html: String = function.call(self.lua.to_value(data)?)?;
        Ok(html)
    }

    /// Renders template `id` and applies the output passes.
    ///
    /// Macros are expanded against `data` first, then isolated fragments are
    /// scoped.
    pub fn render_page(&self, id: &str, data: &Value, scope: &ScopeRewriter) -> Result<String> {
        let html = self.render(id, data)?;
        let html = expand_macros(&html, data);
        Ok(scope.rewrite(&html))
    }
}
