// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Template compilation into a single Lua bundle.
//!
//! A [`TemplateCompiler`] turns one template source into a Lua chunk that
//! defines a render function and returns it. The [`BundleCompiler`] runs the
//! compiler over every template, cuts the function out of each chunk, and
//! assembles the pieces behind a shared runtime preamble:
//!
//! ```lua
//! local __templates = {}
//! -- runtime helpers
//! __templates["home"] = function(data) ... end
//! __templates["blog_post"] = function(data) ... end
//! return __templates
//! ```
//!
//! The result is minified and syntax-checked before it is written.

mod bundle;
mod interpolate;
pub mod minify;

pub use bundle::{BundleCompiler, CompiledBundle};
pub use interpolate::InterpolatingCompiler;

use crate::error::Result;

/// Runtime preamble shared by every compiled template.
pub const RUNTIME: &str = include_str!("runtime.lua");

/// Options passed to a [`TemplateCompiler`].
#[derive(Debug, Clone, PartialEq)]
pub struct CompileOptions {
    /// Name the generated render function must have.
    pub function_name: String,
    /// Template path relative to the template root, for diagnostics.
    pub template_path: String,
}

impl CompileOptions {
    /// Options for the template at `template_path` with canonical id `canonical_id`.
    pub fn for_template(template_path: &str, canonical_id: &str) -> Self {
        Self {
            function_name: render_function_name(canonical_id),
            template_path: template_path.to_string(),
        }
    }
}

/// Compiles template sources into Lua.
///
/// The generated code must define `local function <function_name>(data)`
/// and end with `return <function_name>`. It may use the helpers of the
/// runtime preamble (`__escape`, `__tostring`, `__lookup`).
pub trait TemplateCompiler: Send + Sync {
    /// Compiles one template source.
    fn compile(&self, source: &str, options: &CompileOptions) -> Result<String>;
}

/// Render function name for a canonical id.
///
/// Characters that are not valid in a Lua identifier become `_`.
pub fn render_function_name(canonical_id: &str) -> String {
    let sanitized: String = canonical_id
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect();
    format!("render_{}", sanitized)
}

/// Escapes a string for use inside a double-quoted Lua literal.
pub fn escape_lua_string(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
        .replace('\r', "\\r")
        .replace('\t', "\\t")
        .replace('\0', "\\0")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_function_name() {
        assert_eq!(render_function_name("blog_post"), "render_blog_post");
        assert_eq!(render_function_name("about-us"), "render_about_us");
        assert_eq!(render_function_name("v1.2_page"), "render_v1_2_page");
    }

    #[test]
    fn test_escape_lua_string() {
        assert_eq!(escape_lua_string("a\"b\\c\nd"), "a\\\"b\\\\c\\nd");
    }

    #[test]
    fn test_runtime_is_valid_lua() {
        let lua = mlua::Lua::new();
        let chunk = format!("{}\nreturn __templates", RUNTIME);
        let templates: mlua::Table = lua.load(&chunk).eval().unwrap();
        assert_eq!(templates.raw_len(), 0);
    }
}
