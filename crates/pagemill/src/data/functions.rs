// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Data function registration.
//!
//! Data functions are looked up by name from an explicit map built once at
//! startup, either by hand or from a Lua data source
//! ([`LuaDataSource`](crate::lua_source::LuaDataSource)).
//!
//! ```rust,ignore
//! let mut functions = DataFunctions::new();
//! functions.register("get_home_data", data_fn(|language| async move {
//!     Ok::<_, DataFnError>(serde_json::json!({ "title": language }))
//! }));
//! ```

use futures_util::future::BoxFuture;
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;

/// Error type returned by data functions.
pub type DataFnError = Box<dyn std::error::Error + Send + Sync>;

/// Future returned by a data function call.
pub type DataFuture = BoxFuture<'static, Result<Value, DataFnError>>;

/// A function producing page data for one language.
pub trait DataFunction: Send + Sync {
    /// Produces the data for `language`.
    fn call(&self, language: &str) -> DataFuture;
}

/// Adapter turning an async closure into a [`DataFunction`].
pub struct FnDataFunction<F>(F);

impl<F, Fut> DataFunction for FnDataFunction<F>
where
    F: Fn(String) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Value, DataFnError>> + Send + 'static,
{
    fn call(&self, language: &str) -> DataFuture {
        Box::pin((self.0)(language.to_string()))
    }
}

/// Wraps an async closure as a data function.
pub fn data_fn<F, Fut>(f: F) -> FnDataFunction<F>
where
    F: Fn(String) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Value, DataFnError>> + Send + 'static,
{
    FnDataFunction(f)
}

/// Name → function registration map.
#[derive(Clone, Default)]
pub struct DataFunctions {
    functions: BTreeMap<String, Arc<dyn DataFunction>>,
}

impl DataFunctions {
    /// Creates an empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `function` under `name`, replacing any previous entry.
    pub fn register<F>(&mut self, name: impl Into<String>, function: F) -> &mut Self
    where
        F: DataFunction + 'static,
    {
        self.functions.insert(name.into(), Arc::new(function));
        self
    }

    /// Registers an already shared function.
    pub fn register_arc(&mut self, name: impl Into<String>, function: Arc<dyn DataFunction>) -> &mut Self {
        self.functions.insert(name.into(), function);
        self
    }

    /// Looks up a function by name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn DataFunction>> {
        self.functions.get(name).cloned()
    }

    /// Returns true if `name` is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    /// Registered names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.functions.keys().map(String::as_str)
    }

    /// Number of registered functions.
    pub fn len(&self) -> usize {
        self.functions.len()
    }

    /// Returns true if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }

    /// Adds every entry of `other`, replacing duplicates.
    pub fn extend(&mut self, other: DataFunctions) {
        self.functions.extend(other.functions);
    }
}

impl std::fmt::Debug for DataFunctions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.functions.keys()).finish()
    }
}

/// A data function whose output is placed by an explicit path rather than
/// by a template.
#[derive(Debug, Clone, Deserialize)]
pub struct CustomDataEntry {
    /// Registered data function name.
    pub function: String,

    /// Output path relative to the language directory, without `.json`.
    ///
    /// A trailing `[field]` segment splits array results into one file per
    /// element, named by that element's `field`.
    pub output: String,

    /// Languages the entry runs for (all site languages when empty).
    #[serde(default)]
    pub languages: Vec<String>,
}

impl CustomDataEntry {
    /// Returns true if the entry runs for `language`.
    pub fn applies_to(&self, language: &str) -> bool {
        self.languages.is_empty() || self.languages.iter().any(|l| l == language)
    }

    /// Splits a bracketed output pattern into `(directory, field)`.
    pub fn split_field(&self) -> Option<(&str, &str)> {
        let (dir, last) = match self.output.rfind('/') {
            Some(pos) => (&self.output[..pos], &self.output[pos + 1..]),
            None => ("", self.output.as_str()),
        };
        let field = last.strip_prefix('[')?.strip_suffix(']')?;
        if field.is_empty() {
            None
        } else {
            Some((dir, field))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_register_and_call() {
        let mut functions = DataFunctions::new();
        functions.register(
            "get_home_data",
            data_fn(|language| async move { Ok::<_, DataFnError>(json!({ "title": language })) }),
        );

        assert!(functions.contains("get_home_data"));
        assert_eq!(functions.names().collect::<Vec<_>>(), vec!["get_home_data"]);

        let value = functions.get("get_home_data").unwrap().call("fr").await.unwrap();
        assert_eq!(value, json!({ "title": "fr" }));
    }

    #[test]
    fn test_custom_entry_field_pattern() {
        let entry = CustomDataEntry {
            function: "get_news_data".to_string(),
            output: "news/[slug]".to_string(),
            languages: vec![],
        };
        assert_eq!(entry.split_field(), Some(("news", "slug")));
        assert!(entry.applies_to("en"));

        let plain = CustomDataEntry {
            function: "get_news_data".to_string(),
            output: "news/list".to_string(),
            languages: vec!["fr".to_string()],
        };
        assert_eq!(plain.split_field(), None);
        assert!(!plain.applies_to("en"));
        assert!(plain.applies_to("fr"));
    }
}
