// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Data functions defined in Lua.
//!
//! A data source is a Lua chunk returning a table of functions:
//!
//! ```lua
//! local M = {}
//!
//! function M.get_common_data(language)
//!   return { site = "Example", language = language }
//! end
//!
//! function M.get_blog_post_data(language)
//!   return { { page_name = "hello", title = "Hello" } }
//! end
//!
//! return M
//! ```
//!
//! Every `get_*_data` entry is registered under its key. The Lua state sits
//! behind a mutex, so calls are serialized and run on the blocking pool.

use crate::data::{DataFnError, DataFunction, DataFunctions, DataFuture};
use crate::error::{PagemillError, Result};
use crate::lua_env;
use crate::registry::COMMON_DATA_FUNCTION;
use mlua::{Lua, LuaSerdeExt, Table};
use std::path::Path;
use std::sync::{Arc, Mutex};

const DATA_TABLE_KEY: &str = "__pagemill_data";

/// A loaded Lua data source.
pub struct LuaDataSource {
    lua: Arc<Mutex<Lua>>,
    names: Vec<String>,
}

impl LuaDataSource {
    /// Loads a data source file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path)?;
        Self::from_source(&source, &path.to_string_lossy())
    }

    /// Loads a data source from a string. `name` shows up in Lua errors.
    pub fn from_source(source: &str, name: &str) -> Result<Self> {
        let lua = Lua::new();
        lua_env::register_json_module(&lua)?;

        let table: Table = lua
            .load(source)
            .set_name(format!("@{}", name))
            .eval()
            .map_err(|e| PagemillError::Data {
                language: "-".to_string(),
                function: name.to_string(),
                message: format!("data source did not return a table: {}", e),
            })?;

        let mut names = Vec::new();
        for pair in table.pairs::<mlua::Value, mlua::Value>() {
            let (key, value) = pair?;
            if let (mlua::Value::String(key), mlua::Value::Function(_)) = (&key, &value) {
                let key = key.to_str()?.to_string();
                if is_data_function_name(&key) {
                    names.push(key);
                }
            }
        }
        names.sort();
        lua.set_named_registry_value(DATA_TABLE_KEY, table)?;

        tracing::debug!("Loaded {} data function(s) from {}", names.len(), name);
        Ok(Self {
            lua: Arc::new(Mutex::new(lua)),
            names,
        })
    }

    /// Names of the data functions found in the source.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Builds the registration map for every data function in the source.
    pub fn functions(&self) -> DataFunctions {
        let mut functions = DataFunctions::new();
        for name in &self.names {
            functions.register(
                name.clone(),
                LuaDataFunction {
                    lua: self.lua.clone(),
                    name: name.clone(),
                },
            );
        }
        functions
    }
}

fn is_data_function_name(name: &str) -> bool {
    name == COMMON_DATA_FUNCTION
        || name
            .strip_prefix("get_")
            .and_then(|rest| rest.strip_suffix("_data"))
            .is_some_and(|id| !id.is_empty())
}

struct LuaDataFunction {
    lua: Arc<Mutex<Lua>>,
    name: String,
}

impl LuaDataFunction {
    fn call_blocking(lua: &Lua, name: &str, language: &str) -> mlua::Result<serde_json::Value> {
        let table: Table = lua.named_registry_value(DATA_TABLE_KEY)?;
        let function: mlua::Function = table.get(name)?;
        let value: mlua::Value = function.call(language)?;
        lua.from_value(value)
    }
}

impl DataFunction for LuaDataFunction {
    fn call(&self, language: &str) -> DataFuture {
        let lua = self.lua.clone();
        let name = self.name.clone();
        let language = language.to_string();
        Box::pin(async move {
            let joined = tokio::task::spawn_blocking(move || -> std::result::Result<serde_json::Value, DataFnError> {
                let lua = lua.lock().map_err(|_| "data source state poisoned by an earlier panic")?;
                Ok(Self::call_blocking(&lua, &name, &language)?)
            })
            .await;
            match joined {
                Ok(result) => result,
                Err(e) => Err(Box::new(e) as DataFnError),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const SOURCE: &str = r#"
        local M = {}
        function M.get_common_data(language) return { site = "Example", language = language } end
        function M.get_home_data(language) return { title = "Home " .. language } end
        function M.get_blog_post_data(language)
            return { { page_name = "a" }, { page_name = "b" } }
        end
        function M.helper() return 1 end
        M.get_static_data = "not a function"
        return M
    "#;

    #[test]
    fn test_collects_data_function_names() {
        let source = LuaDataSource::from_source(SOURCE, "data.lua").unwrap();
        assert_eq!(
            source.names(),
            &["get_blog_post_data", "get_common_data", "get_home_data"]
        );
    }

    #[tokio::test]
    async fn test_calls_lua_functions() {
        let source = LuaDataSource::from_source(SOURCE, "data.lua").unwrap();
        let functions = source.functions();

        let home = functions.get("get_home_data").unwrap().call("fr").await.unwrap();
        assert_eq!(home, json!({ "title": "Home fr" }));

        let posts = functions.get("get_blog_post_data").unwrap().call("en").await.unwrap();
        assert_eq!(posts, json!([{ "page_name": "a" }, { "page_name": "b" }]));
    }

    #[tokio::test]
    async fn test_lua_error_surfaces() {
        let source = LuaDataSource::from_source(
            "return { get_home_data = function() error('offline') end }",
            "data.lua",
        )
        .unwrap();
        let err = source
            .functions()
            .get("get_home_data")
            .unwrap()
            .call("en")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("offline"));
    }

    #[test]
    fn test_non_table_source_is_rejected() {
        assert!(LuaDataSource::from_source("return 42", "data.lua").is_err());
    }
}
