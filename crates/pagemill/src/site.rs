// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Static site output.
//!
//! Every persisted record becomes `<output>/<language>/<record path>.html`,
//! rendered with the template of the first route matching that URL, else
//! the one named in its `_template` stamp. Routes may add
//! fixed pages through `static_paths`. Records whose template cannot be
//! found are skipped with a warning.

use crate::config::SiteConfig;
use crate::data::{DataStore, COMMON_RECORD};
use crate::error::Result;
use crate::render::BundleRenderer;
use crate::resolver::{convention_lookup_path, Resolution, Resolver};
use crate::transform::ScopeRewriter;
use std::fs;
use std::path::{Path, PathBuf};

/// Outcome of a static build.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BuildReport {
    /// Pages written.
    pub written: Vec<PathBuf>,
    /// `<language>/<path>` of pages skipped for lack of a template.
    pub skipped: Vec<String>,
}

/// Renders the persisted records of every language to HTML files.
pub struct SiteBuilder {
    config: SiteConfig,
    renderer: BundleRenderer,
    resolver: Resolver,
    scope: ScopeRewriter,
}

impl SiteBuilder {
    /// Creates a builder for a loaded bundle and resolver.
    pub fn new(config: &SiteConfig, renderer: BundleRenderer, resolver: Resolver) -> Self {
        Self {
            config: config.clone(),
            renderer,
            resolver,
            scope: ScopeRewriter::new(config.scope_max_depth),
        }
    }

    /// Builds every page and copies the bundle and public assets.
    pub fn build(&self) -> Result<BuildReport> {
        let store = DataStore::new(self.config.data_dir_path());
        let output = self.config.output_dir_path();
        fs::create_dir_all(&output)?;

        let mut report = BuildReport::default();
        for language in &self.config.languages {
            for path in store.list_records(language)? {
                if path == COMMON_RECORD {
                    continue;
                }
                let record = store.load(language, &path)?;
                let resolution = self.resolver.resolve_page(language, &path, record, &store)?;
                self.write_page(&store, &output, language, &path, resolution, &mut report)?;
            }

            for route in self.resolver.routes() {
                for static_path in route.static_paths() {
                    let url = format!("/{}/{}", language, static_path.trim_start_matches('/'));
                    let resolution = self.resolver.resolve_request(&url, None, &store)?;
                    let page = convention_lookup_path(static_path);
                    self.write_page(&store, &output, language, &page, resolution, &mut report)?;
                }
            }
        }

        let bundle = self.config.bundle_file();
        if bundle.is_file() {
            fs::copy(&bundle, output.join("templates.lua"))?;
        }
        let public = self.config.public_dir_path();
        if public.is_dir() {
            let copied = copy_public_assets(&public, &output)?;
            tracing::debug!("Copied {} public asset(s)", copied);
        }

        tracing::info!(
            "Built {} page(s), skipped {}",
            report.written.len(),
            report.skipped.len()
        );
        Ok(report)
    }

    fn write_page(
        &self,
        store: &DataStore,
        output: &Path,
        language: &str,
        path: &str,
        resolution: Resolution,
        report: &mut BuildReport,
    ) -> Result<()> {
        match resolution {
            Resolution::Found { template_id, data, .. } => {
                let context = store.page_context(language, data)?;
                let html = self.renderer.render_page(&template_id, &context, &self.scope)?;
                let file = output.join(language).join(format!("{}.html", path));
                if let Some(parent) = file.parent() {
                    fs::create_dir_all(parent)?;
                }
                fs::write(&file, html)?;
                tracing::debug!("Wrote {}", file.display());
                report.written.push(file);
            }
            Resolution::NotFound { lookup } => {
                tracing::warn!("Template not found for {}/{} (tried {}), skipping", language, path, lookup);
                report.skipped.push(format!("{}/{}", language, path));
            }
        }
        Ok(())
    }
}

/// Copies the public asset tree into the output, returning the file count.
fn copy_public_assets(public: &Path, output: &Path) -> Result<usize> {
    let mut copied = 0;
    let mut pending = vec![public.to_path_buf()];
    while let Some(dir) = pending.pop() {
        let target = output.join(dir.strip_prefix(public).unwrap_or(&dir));
        fs::create_dir_all(&target)?;
        for entry in fs::read_dir(&dir)? {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                pending.push(entry.path());
            } else {
                fs::copy(entry.path(), target.join(entry.file_name()))?;
                copied += 1;
            }
        }
    }
    Ok(copied)
}
