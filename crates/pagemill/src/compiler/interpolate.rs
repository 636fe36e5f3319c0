// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Built-in compiler for interpolation-only templates.
//!
//! `{{ path }}` inserts an HTML-escaped value, `{{{ path }}}` inserts it raw.
//! Paths are dotted (`post.author.name`, `items.0.title`). Everything else is
//! copied through, including `^^key^^` macros and `<isolate>` markers, which
//! are handled after rendering.

use super::{escape_lua_string, CompileOptions, TemplateCompiler};
use crate::error::{PagemillError, Result};
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref INTERPOLATION: Regex =
        Regex::new(r"\{\{\{\s*([^{}]*?)\s*\}\}\}|\{\{\s*([^{}]*?)\s*\}\}").unwrap();
    static ref DATA_PATH: Regex = Regex::new(r"^[A-Za-z_][A-Za-z0-9_-]*(\.[A-Za-z0-9_-]+)*$").unwrap();
}

/// Compiles `{{ }}` / `{{{ }}}` interpolation into a Lua render function.
#[derive(Debug, Clone, Copy, Default)]
pub struct InterpolatingCompiler;

impl InterpolatingCompiler {
    /// Creates the compiler.
    pub fn new() -> Self {
        Self
    }
}

impl TemplateCompiler for InterpolatingCompiler {
    fn compile(&self, source: &str, options: &CompileOptions) -> Result<String> {
        let name = &options.function_name;
        let mut code = String::new();
        code.push_str(&format!("local function {}(data)\n", name));
        code.push_str("  local __out = {}\n");

        let mut last = 0;
        for caps in INTERPOLATION.captures_iter(source) {
            let whole = caps.get(0).map(|m| (m.start(), m.end())).unwrap_or((last, last));
            push_literal(&mut code, &source[last..whole.0]);

            let (path, raw) = match (caps.get(1), caps.get(2)) {
                (Some(m), _) => (m.as_str(), true),
                (None, Some(m)) => (m.as_str(), false),
                (None, None) => ("", false),
            };
            if !DATA_PATH.is_match(path) {
                return Err(PagemillError::compile(
                    &options.template_path,
                    format!("invalid interpolation '{}'", &source[whole.0..whole.1]),
                ));
            }

            let lookup = format!("__lookup(data, \"{}\")", escape_lua_string(path));
            if raw {
                code.push_str(&format!("  __out[#__out + 1] = __tostring({})\n", lookup));
            } else {
                code.push_str(&format!("  __out[#__out + 1] = __escape({})\n", lookup));
            }
            last = whole.1;
        }
        push_literal(&mut code, &source[last..]);

        code.push_str("  return table.concat(__out)\n");
        code.push_str("end\n");
        code.push_str(&format!("return {}\n", name));
        Ok(code)
    }
}

fn push_literal(code: &mut String, text: &str) {
    if !text.is_empty() {
        code.push_str(&format!("  __out[#__out + 1] = \"{}\"\n", escape_lua_string(text)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::RUNTIME;
    use mlua::{Lua, LuaSerdeExt};
    use serde_json::json;

    fn render(source: &str, data: serde_json::Value) -> String {
        let options = CompileOptions::for_template("page.tpl", "page");
        let code = InterpolatingCompiler::new().compile(source, &options).unwrap();

        let lua = Lua::new();
        crate::lua_env::register_json_module(&lua).unwrap();
        let chunk = format!("{}\n{}", RUNTIME, code);
        let function: mlua::Function = lua.load(&chunk).eval().unwrap();
        function.call(lua.to_value(&data).unwrap()).unwrap()
    }

    #[test]
    fn test_generated_shape() {
        let options = CompileOptions::for_template("blog/post.tpl", "blog_post");
        let code = InterpolatingCompiler::new().compile("<h1>{{ title }}</h1>", &options).unwrap();
        assert!(code.starts_with("local function render_blog_post(data)"));
        assert!(code.trim_end().ends_with("return render_blog_post"));
    }

    #[test]
    fn test_escaped_and_raw_interpolation() {
        let html = render(
            "<h1>{{ title }}</h1>{{{ body }}}<p>{{ missing }}</p>",
            json!({ "title": "A & B", "body": "<em>hi</em>" }),
        );
        assert_eq!(html, "<h1>A &amp; B</h1><em>hi</em><p></p>");
    }

    #[test]
    fn test_nested_paths_and_indices() {
        let html = render(
            "{{ post.author }} / {{ items.1.name }} / {{ count }}",
            json!({ "post": { "author": "Ada" }, "items": [{ "name": "a" }, { "name": "b" }], "count": 3 }),
        );
        assert_eq!(html, "Ada / b / 3");
    }

    #[test]
    fn test_quotes_and_macros_pass_through() {
        let html = render("<a title=\"x\">^^name^^</a>\n", json!({}));
        assert_eq!(html, "<a title=\"x\">^^name^^</a>\n");
    }

    #[test]
    fn test_invalid_path_is_compile_error() {
        let options = CompileOptions::for_template("page.tpl", "page");
        let err = InterpolatingCompiler::new().compile("{{ a b }}", &options).unwrap_err();
        assert!(matches!(err, PagemillError::Compile { ref template, .. } if template == "page.tpl"));
    }
}
