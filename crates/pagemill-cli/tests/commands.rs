// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Config loading and the pipeline commands against a temp project.

use pagemill::FetchFilter;
use pagemill_cli::commands::{build::build, env_command_args, fetch::fetch, scaffold::scaffold_data_source};
use pagemill_cli::config::Config;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn write(root: &Path, relative: &str, content: &str) {
    let path = root.join(relative);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

#[test]
fn test_missing_config_uses_defaults() {
    let dir = TempDir::new().unwrap();
    let config = Config::load_from(dir.path()).unwrap();

    assert_eq!(config.project.name, "unnamed");
    assert_eq!(config.site.languages, vec!["en".to_string()]);
    assert_eq!(config.dev.port, 3000);
    assert_eq!(config.site.project_root, dir.path());
    assert!(config.routes.is_empty());
}

#[test]
fn test_config_file_is_parsed() {
    let dir = TempDir::new().unwrap();
    write(
        dir.path(),
        "pagemill.toml",
        r#"
[project]
name = "docs"

[site]
languages = ["en", "de"]
output_dir = "public_html"

[[fetch.custom]]
function = "get_posts_data"
output = "blog/[slug]"
languages = ["de"]

[dev]
port = 4000

[[routes]]
pattern = "/blog/{slug}"
template = "blog/post.tpl"
data = "blog/{slug}"
devices = ["mobile"]
"#,
    );

    let config = Config::load_from(dir.path()).unwrap();
    assert_eq!(config.project.name, "docs");
    assert_eq!(config.site.languages, vec!["en".to_string(), "de".to_string()]);
    assert_eq!(config.site.output_dir_path(), dir.path().join("public_html"));
    assert_eq!(config.site.template_root, "src/templates");
    assert_eq!(config.fetch.custom.len(), 1);
    assert!(config.fetch.custom[0].applies_to("de"));
    assert!(!config.fetch.custom[0].applies_to("en"));
    assert_eq!(config.dev.port, 4000);
    assert_eq!(config.dev.host, "127.0.0.1");
    assert_eq!(config.routes[0].template, "blog/post.tpl");
    assert_eq!(config.resolver(&["blog_post".to_string()]).unwrap().routes().len(), 1);
}

#[test]
fn test_invalid_config_is_error() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "pagemill.toml", "[site]\nlanguages = 3\n");
    assert!(Config::load_from(dir.path()).is_err());
}

#[test]
fn test_env_command_args() {
    assert_eq!(env_command_args("  fetch f=a,b   c=en "), vec!["fetch", "f=a,b", "c=en"]);
    assert!(env_command_args("").is_empty());
}

#[test]
fn test_scaffold_creates_and_extends_data_source() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "src/templates/home.tpl", "home");
    write(dir.path(), "src/templates/blog/post.tpl", "post");
    let config = Config::load_from(dir.path()).unwrap();

    let added = scaffold_data_source(&config.site).unwrap();
    assert_eq!(added, vec!["get_blog_post_data".to_string(), "get_home_data".to_string()]);
    let source = fs::read_to_string(dir.path().join("src/data.lua")).unwrap();
    assert!(source.contains("function M.get_home_data(language)"));
    assert!(source.trim_end().ends_with("return M"));

    assert!(scaffold_data_source(&config.site).unwrap().is_empty());

    write(dir.path(), "src/templates/contact.tpl", "contact");
    assert_eq!(scaffold_data_source(&config.site).unwrap(), vec!["get_contact_data".to_string()]);
}

#[tokio::test]
async fn test_fetch_then_build() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "pagemill.toml", "[site]\nlanguages = [\"en\", \"fr\"]\n");
    write(dir.path(), "src/templates/home.tpl", "<h1>{{ title }}</h1><p>{{ common.tagline }}</p>");
    write(dir.path(), "src/templates/blog/post.tpl", "<article>{{ title }}</article>");
    write(
        dir.path(),
        "src/data.lua",
        r#"
local M = {}

function M.get_common_data(language)
  return { tagline = "tag-" .. language }
end

function M.get_home_data(language)
  return { title = "Home " .. language }
end

function M.get_blog_post_data(language)
  return { { page_name = "first", title = "First" }, { title = "Second" } }
end

return M
"#,
    );
    let config = Config::load_from(dir.path()).unwrap();

    let report = fetch(&config, &FetchFilter::all()).await.unwrap();
    assert_eq!(report.records.get("en"), Some(&4));
    assert_eq!(report.total(), 8);

    let report = build(&config).await.unwrap();
    assert_eq!(report.written.len(), 6);
    assert!(report.skipped.is_empty());

    let home = fs::read_to_string(dir.path().join("dist/fr/home.html")).unwrap();
    assert_eq!(home, "<h1>Home fr</h1><p>tag-fr</p>");
    let second = fs::read_to_string(dir.path().join("dist/en/blog/post_2.html")).unwrap();
    assert_eq!(second, "<article>Second</article>");
    assert!(dir.path().join("dist/en/blog/first.html").is_file());
}

#[tokio::test]
async fn test_fetch_without_data_source_fails() {
    let dir = TempDir::new().unwrap();
    let config = Config::load_from(dir.path()).unwrap();
    let err = fetch(&config, &FetchFilter::all()).await.unwrap_err();
    assert!(err.to_string().contains("data source"));
}
