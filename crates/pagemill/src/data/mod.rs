// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Page data: acquisition, validation and persistence.
//!
//! Data functions produce either one record (a JSON object) or a non-empty
//! array of records for a given language. The [`DataScheduler`] calls them
//! under a concurrency cap and writes the results into a [`DataStore`] as
//! JSON files, which the renderer later picks up.

pub mod functions;
pub mod scheduler;
pub mod store;

pub use functions::{data_fn, CustomDataEntry, DataFnError, DataFunction, DataFunctions, DataFuture};
pub use scheduler::{DataScheduler, FetchFilter, FetchReport};
pub use store::{DataStore, COMMON_RECORD};

use crate::error::{PagemillError, Result};
use serde_json::{Map, Value};

/// Field that names a record's output file.
pub const PAGE_NAME_FIELD: &str = "page_name";

/// Field stamped onto records with their originating template path(s).
pub const TEMPLATE_FIELD: &str = "_template";

/// A validated data function result.
#[derive(Debug, Clone, PartialEq)]
pub enum PageData {
    /// A single record.
    Record(Map<String, Value>),
    /// A non-empty list of records.
    Records(Vec<Map<String, Value>>),
}

impl PageData {
    /// Validates `value` and converts it.
    ///
    /// `language` and `function` are only used to name the culprit in the
    /// error.
    pub fn from_value(value: Value, language: &str, function: &str) -> Result<Self> {
        match value {
            Value::Object(map) => Ok(PageData::Record(map)),
            Value::Array(items) => {
                if items.is_empty() {
                    return Err(PagemillError::validation(
                        language,
                        function,
                        "returned an empty array",
                    ));
                }
                items
                    .into_iter()
                    .enumerate()
                    .map(|(index, item)| match item {
                        Value::Object(map) => Ok(map),
                        other => Err(PagemillError::validation(
                            language,
                            function,
                            format!("array element {} is {}, expected an object", index, kind(&other)),
                        )),
                    })
                    .collect::<Result<Vec<_>>>()
                    .map(PageData::Records)
            }
            other => Err(PagemillError::validation(
                language,
                function,
                format!("returned {}, expected an object or an array of objects", kind(&other)),
            )),
        }
    }

    /// Converts back into a JSON value.
    pub fn into_value(self) -> Value {
        match self {
            PageData::Record(map) => Value::Object(map),
            PageData::Records(items) => Value::Array(items.into_iter().map(Value::Object).collect()),
        }
    }
}

/// Checks the shape of a data function result without consuming it.
pub fn check_data(value: &Value, language: &str, function: &str) -> Result<()> {
    PageData::from_value(value.clone(), language, function).map(|_| ())
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_check_data_accepts_records() {
        assert!(check_data(&json!({"a": 1}), "en", "get_home_data").is_ok());
        assert!(check_data(&json!([{}, {}]), "en", "get_home_data").is_ok());
    }

    #[test]
    fn test_check_data_rejects_bad_shapes() {
        assert!(check_data(&json!([]), "en", "get_home_data").is_err());
        assert!(check_data(&json!([1, 2]), "en", "get_home_data").is_err());
        assert!(check_data(&json!(null), "en", "get_home_data").is_err());
        assert!(check_data(&json!("text"), "en", "get_home_data").is_err());
        assert!(check_data(&json!([[{}]]), "en", "get_home_data").is_err());
    }

    #[test]
    fn test_validation_error_names_language_and_function() {
        let err = check_data(&json!([]), "fr", "get_blog_data").unwrap_err();
        match err {
            PagemillError::Validation { language, function, .. } => {
                assert_eq!(language, "fr");
                assert_eq!(function, "get_blog_data");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_page_data_variants() {
        let data = PageData::from_value(json!([{"a": 1}]), "en", "f").unwrap();
        assert!(matches!(data, PageData::Records(ref items) if items.len() == 1));
        assert_eq!(data.into_value(), json!([{"a": 1}]));
    }
}
