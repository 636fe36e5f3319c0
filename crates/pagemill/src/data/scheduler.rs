// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Data acquisition scheduler.
//!
//! A fetch run calls, for every selected language, `get_common_data`, the
//! custom data entries, and the per-template `get_<id>_data` functions. Every
//! call is queued into one [`BoundedPool`]; execution order inside the pool is
//! not guaranteed. The run fails fast on the first error.
//!
//! # Invalidation
//!
//! - no filter: the whole store is cleared first
//! - language filter only: those languages' directories are cleared
//! - function filter: nothing is cleared (targeted rerun)

use super::functions::{CustomDataEntry, DataFunction, DataFunctions};
use super::store::{DataStore, COMMON_RECORD};
use super::{PageData, PAGE_NAME_FIELD, TEMPLATE_FIELD};
use crate::config::SiteConfig;
use crate::error::{PagemillError, Result};
use crate::pool::BoundedPool;
use crate::registry::{find_template_by_function_name, TemplateFile, COMMON_DATA_FUNCTION};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

/// Selects which functions and languages a fetch run covers.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FetchFilter {
    /// Only run these function names.
    pub functions: Option<BTreeSet<String>>,
    /// Only run for these languages.
    pub languages: Option<BTreeSet<String>>,
}

impl FetchFilter {
    /// A filter selecting everything.
    pub fn all() -> Self {
        Self::default()
    }

    /// Parses `f=name1,name2` and `c=lang1,lang2` arguments.
    ///
    /// Unknown arguments are ignored with a warning.
    pub fn from_args<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut filter = Self::default();
        for arg in args {
            let arg = arg.as_ref();
            match arg.split_once('=') {
                Some(("f", names)) => filter.functions = Some(split_list(names)),
                Some(("c", languages)) => filter.languages = Some(split_list(languages)),
                _ => tracing::warn!("Ignoring fetch argument '{}'", arg),
            }
        }
        filter
    }

    /// Restricts the run to `names`.
    pub fn with_functions<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.functions = Some(names.into_iter().map(Into::into).collect());
        self
    }

    /// Restricts the run to `languages`.
    pub fn with_languages<I, S>(mut self, languages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.languages = Some(languages.into_iter().map(Into::into).collect());
        self
    }

    fn selects_function(&self, name: &str) -> bool {
        self.functions.as_ref().map_or(true, |names| names.contains(name))
    }
}

fn split_list(list: &str) -> BTreeSet<String> {
    list.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

/// Outcome of a fetch run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FetchReport {
    /// Records written per language.
    pub records: BTreeMap<String, usize>,
    /// Number of data function calls.
    pub calls: usize,
}

impl FetchReport {
    /// Total records written.
    pub fn total(&self) -> usize {
        self.records.values().sum()
    }
}

/// Where a task's result goes.
#[derive(Debug, Clone)]
enum Placement {
    Common,
    Template {
        template: TemplateFile,
        stamp: Value,
    },
    Custom(CustomDataEntry),
}

/// One queued data function call.
#[derive(Clone)]
struct FetchTask {
    language: String,
    function_name: String,
    function: Arc<dyn DataFunction>,
    placement: Placement,
}

/// Runs data functions and persists their results.
pub struct DataScheduler {
    languages: Vec<String>,
    templates: BTreeSet<TemplateFile>,
    functions: DataFunctions,
    custom: Vec<CustomDataEntry>,
    store: DataStore,
    pool: BoundedPool,
}

impl DataScheduler {
    /// Creates a scheduler for the given templates and registered functions.
    pub fn new(config: &SiteConfig, templates: BTreeSet<TemplateFile>, functions: DataFunctions) -> Self {
        Self {
            languages: config.languages.clone(),
            templates,
            functions,
            custom: Vec::new(),
            store: DataStore::new(config.data_dir_path()),
            pool: BoundedPool::new(config.max_concurrency),
        }
    }

    /// Adds custom data entries.
    pub fn with_custom_entries(mut self, entries: Vec<CustomDataEntry>) -> Self {
        self.custom = entries;
        self
    }

    /// Overrides the concurrency cap.
    pub fn with_max_concurrency(mut self, limit: usize) -> Self {
        self.pool = BoundedPool::new(limit);
        self
    }

    /// The store results are written to.
    pub fn store(&self) -> &DataStore {
        &self.store
    }

    /// Runs every selected data function and writes the results.
    pub async fn run(&self, filter: &FetchFilter) -> Result<FetchReport> {
        let tasks = self.plan(filter)?;

        match (&filter.functions, &filter.languages) {
            (None, None) => self.store.clear_all().await?,
            (None, Some(_)) => {
                for language in self.selected_languages(filter) {
                    self.store.clear_language(&language).await?;
                }
            }
            // targeted reruns keep everything else in place
            (Some(_), _) => {}
        }

        tracing::info!("Running {} data function call(s)", tasks.len());
        let calls = tasks.len();
        let store = self.store.clone();
        let futures: Vec<_> = tasks
            .into_iter()
            .map(|task| {
                let store = store.clone();
                async move { execute(task, store).await }
            })
            .collect();

        let mut report = FetchReport {
            calls,
            ..FetchReport::default()
        };
        for (language, written) in self.pool.run(futures).await? {
            *report.records.entry(language).or_default() += written;
        }
        Ok(report)
    }

    fn selected_languages(&self, filter: &FetchFilter) -> Vec<String> {
        match &filter.languages {
            None => self.languages.clone(),
            Some(wanted) => {
                for language in wanted {
                    if !self.languages.contains(language) {
                        tracing::warn!("Language '{}' is not configured, skipping", language);
                    }
                }
                self.languages
                    .iter()
                    .filter(|l| wanted.contains(*l))
                    .cloned()
                    .collect()
            }
        }
    }

    /// Builds the task list in enqueue order.
    fn plan(&self, filter: &FetchFilter) -> Result<Vec<FetchTask>> {
        if let Some(names) = &filter.functions {
            if let Some(missing) = names.iter().find(|n| !self.functions.contains(n)) {
                return Err(PagemillError::MissingFunction(missing.clone()));
            }
        }
        for entry in &self.custom {
            if !self.functions.contains(&entry.function) {
                return Err(PagemillError::MissingFunction(entry.function.clone()));
            }
        }

        let custom_names: BTreeSet<&str> = self.custom.iter().map(|e| e.function.as_str()).collect();
        let mut template_functions: Vec<(String, TemplateFile)> = Vec::new();
        for name in self.functions.names() {
            if name == COMMON_DATA_FUNCTION || custom_names.contains(name) {
                continue;
            }
            match find_template_by_function_name(&self.templates, name) {
                Some(template) => template_functions.push((name.to_string(), template.clone())),
                None => tracing::warn!("No template found for data function '{}'", name),
            }
        }

        let mut tasks = Vec::new();
        for language in self.selected_languages(filter) {
            if filter.selects_function(COMMON_DATA_FUNCTION) {
                if let Some(function) = self.functions.get(COMMON_DATA_FUNCTION) {
                    tasks.push(FetchTask {
                        language: language.clone(),
                        function_name: COMMON_DATA_FUNCTION.to_string(),
                        function,
                        placement: Placement::Common,
                    });
                }
            }

            for entry in &self.custom {
                if !entry.applies_to(&language) || !filter.selects_function(&entry.function) {
                    continue;
                }
                if let Some(function) = self.functions.get(&entry.function) {
                    tasks.push(FetchTask {
                        language: language.clone(),
                        function_name: entry.function.clone(),
                        function,
                        placement: Placement::Custom(entry.clone()),
                    });
                }
            }

            for (name, template) in &template_functions {
                if !filter.selects_function(name) {
                    continue;
                }
                if let Some(function) = self.functions.get(name) {
                    tasks.push(FetchTask {
                        language: language.clone(),
                        function_name: name.clone(),
                        function,
                        placement: Placement::Template {
                            template: template.clone(),
                            stamp: self.template_stamp(template),
                        },
                    });
                }
            }
        }

        Ok(tasks)
    }

    /// The `_template` value for records of `template`.
    ///
    /// When language-specific variants exist (`fr/home.tpl` next to
    /// `home.tpl`) every candidate is listed and the renderer picks the one
    /// matching the record's language.
    fn template_stamp(&self, template: &TemplateFile) -> Value {
        let variants: Vec<Value> = self
            .languages
            .iter()
            .map(|language| format!("{}/{}", language, template.path))
            .filter(|path| self.templates.iter().any(|t| &t.path == path))
            .map(Value::String)
            .collect();

        if variants.is_empty() {
            Value::String(template.path.clone())
        } else {
            let mut candidates = vec![Value::String(template.path.clone())];
            candidates.extend(variants);
            Value::Array(candidates)
        }
    }
}

async fn execute(task: FetchTask, store: DataStore) -> Result<(String, usize)> {
    let FetchTask {
        language,
        function_name,
        function,
        placement,
    } = task;

    tracing::debug!("Calling {} for {}", function_name, language);
    let value = function
        .call(&language)
        .await
        .map_err(|e| PagemillError::Data {
            language: language.clone(),
            function: function_name.clone(),
            message: e.to_string(),
        })?;
    let data = PageData::from_value(value, &language, &function_name)?;

    let written = match placement {
        Placement::Common => {
            store.write(&language, COMMON_RECORD, &data.into_value()).await?;
            1
        }
        Placement::Template { template, stamp } => match data {
            PageData::Record(mut record) => {
                record.insert(TEMPLATE_FIELD.to_string(), stamp);
                let path = join_path(template.dir(), template.stem());
                store.write(&language, &path, &Value::Object(record)).await?;
                1
            }
            PageData::Records(records) => {
                let count = records.len();
                for (index, mut record) in records.into_iter().enumerate() {
                    let name = match page_name(&record) {
                        Some(name) => checked_record_name(name, &language, &function_name)?,
                        None => format!("{}_{}", template.stem(), index + 1),
                    };
                    record.insert(TEMPLATE_FIELD.to_string(), stamp.clone());
                    let path = join_path(template.dir(), &name);
                    store.write(&language, &path, &Value::Object(record)).await?;
                }
                count
            }
        },
        Placement::Custom(entry) => match (entry.split_field(), data) {
            (Some((dir, field)), data) => {
                let records = match data {
                    PageData::Record(record) => vec![record],
                    PageData::Records(records) => records,
                };
                let count = records.len();
                for record in records {
                    let name = field_value(&record, field).ok_or_else(|| {
                        PagemillError::validation(
                            &language,
                            &function_name,
                            format!("element has no usable '{}' field for output '{}'", field, entry.output),
                        )
                    })?;
                    let name = checked_record_name(name, &language, &function_name)?;
                    store
                        .write(&language, &join_path(dir, &name), &Value::Object(record))
                        .await?;
                }
                count
            }
            (None, data) => {
                store.write(&language, &entry.output, &data.into_value()).await?;
                1
            }
        },
    };

    Ok((language, written))
}

fn page_name(record: &Map<String, Value>) -> Option<String> {
    field_value(record, PAGE_NAME_FIELD)
}

/// A non-empty string or number field usable as a file name.
fn field_value(record: &Map<String, Value>, field: &str) -> Option<String> {
    match record.get(field)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Rejects names that would place a record outside the language directory.
fn checked_record_name(name: String, language: &str, function: &str) -> Result<String> {
    let escapes = name.starts_with('/')
        || name.starts_with('\\')
        || name.split(['/', '\\']).any(|segment| segment == "..");
    if escapes {
        return Err(PagemillError::validation(
            language,
            function,
            format!("record name '{}' must stay inside the language directory", name),
        ));
    }
    Ok(name)
}

fn join_path(dir: &str, name: &str) -> String {
    if dir.is_empty() {
        name.to_string()
    } else {
        format!("{}/{}", dir, name)
    }
}
