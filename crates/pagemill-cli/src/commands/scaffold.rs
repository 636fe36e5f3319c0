// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Adds a `get_<id>_data` stub to the data source for every template that
//! has none.

use crate::config::Config;
use console::style;
use pagemill::{LuaDataSource, SiteConfig, TemplateRegistry};
use std::collections::BTreeSet;
use std::fs;

const NEW_DATA_SOURCE: &str = "local M = {}\n\nreturn M\n";

/// Runs the scaffold command.
pub async fn run(config: &Config) -> anyhow::Result<()> {
    let added = scaffold_data_source(&config.site)?;
    if added.is_empty() {
        println!("{}", style("Every template already has a data function").dim());
        return Ok(());
    }
    for name in &added {
        println!("  {} {}", style("+").green(), name);
    }
    println!(
        "{} {} stub(s) to {}",
        style("Added").green().bold(),
        added.len(),
        config.site.data_source
    );
    Ok(())
}

/// Appends missing data function stubs, creating the data source if needed.
///
/// Returns the names of the functions added.
pub fn scaffold_data_source(site: &SiteConfig) -> anyhow::Result<Vec<String>> {
    let path = site.data_source_path();
    let (source, existing) = if path.is_file() {
        let names: BTreeSet<String> = LuaDataSource::load(&path)?.names().iter().cloned().collect();
        (fs::read_to_string(&path)?, names)
    } else {
        (NEW_DATA_SOURCE.to_string(), BTreeSet::new())
    };

    let missing: Vec<String> = TemplateRegistry::new(site)
        .list_templates()?
        .iter()
        .filter(|t| !is_language_variant(&t.path, &site.languages))
        .map(|t| t.data_function_name())
        .filter(|name| !existing.contains(name))
        .collect();
    if missing.is_empty() {
        return Ok(missing);
    }

    let stubs: String = missing.iter().map(|name| stub(name)).collect();
    let updated = insert_before_return(&source, &stubs)
        .ok_or_else(|| anyhow::anyhow!("{} does not end with `return M`", path.display()))?;

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(&path, updated)?;
    tracing::info!("Scaffolded {} data function(s) in {}", missing.len(), path.display());
    Ok(missing)
}

/// `fr/home.tpl` is rendered with the records of `home.tpl`.
fn is_language_variant(path: &str, languages: &[String]) -> bool {
    languages
        .iter()
        .any(|language| path.strip_prefix(language.as_str()).is_some_and(|rest| rest.starts_with('/')))
}

fn stub(name: &str) -> String {
    if is_lua_identifier(name) {
        format!("function M.{}(language)\n  return {{}}\nend\n\n", name)
    } else {
        format!("M[\"{}\"] = function(language)\n  return {{}}\nend\n\n", name)
    }
}

fn is_lua_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Inserts `text` before the last `return M` line.
fn insert_before_return(source: &str, text: &str) -> Option<String> {
    let mut offset = None;
    let mut position = 0;
    for line in source.split_inclusive('\n') {
        if line.trim() == "return M" {
            offset = Some(position);
        }
        position += line.len();
    }
    let offset = offset?;
    Some(format!("{}{}{}", &source[..offset], text, &source[offset..]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_before_last_return() {
        let source = "local M = {}\nlocal function f() return M end\nreturn M\n";
        let updated = insert_before_return(source, "-- stub\n").unwrap();
        assert_eq!(updated, "local M = {}\nlocal function f() return M end\n-- stub\nreturn M\n");
        assert!(insert_before_return("return {}", "x").is_none());
    }

    #[test]
    fn test_language_variants_get_no_stub() {
        let languages = vec!["en".to_string(), "fr".to_string()];
        assert!(is_language_variant("fr/home.tpl", &languages));
        assert!(!is_language_variant("home.tpl", &languages));
        assert!(!is_language_variant("french/home.tpl", &languages));
    }

    #[test]
    fn test_stub_shapes() {
        assert_eq!(stub("get_home_data"), "function M.get_home_data(language)\n  return {}\nend\n\n");
        assert!(stub("get_my-page_data").starts_with("M[\"get_my-page_data\"] = function(language)"));
    }
}
