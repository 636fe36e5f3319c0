// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Build command: renders every persisted record to static HTML.

use super::compile::compile;
use crate::config::Config;
use console::style;
use pagemill::{BuildReport, BundleRenderer, SiteBuilder};
use std::time::Instant;

/// Runs the build command.
pub async fn run(config: &Config) -> anyhow::Result<()> {
    let start = Instant::now();
    println!(
        "{} {}",
        style("Building site into:").cyan(),
        config.site.output_dir
    );

    let report = build(config).await?;
    for skipped in &report.skipped {
        println!("  {} {} (template not found)", style("skipped").yellow(), skipped);
    }
    println!(
        "{} {} page(s) in {}ms",
        style("Built").green().bold(),
        report.written.len(),
        start.elapsed().as_millis()
    );
    Ok(())
}

/// Compiles a fresh bundle and renders the site with it.
pub async fn build(config: &Config) -> anyhow::Result<BuildReport> {
    let bundle = compile(config, None).await?;
    let renderer = BundleRenderer::from_source(&bundle.code)?;
    let resolver = config.resolver(renderer.template_ids())?;
    let report = SiteBuilder::new(&config.site, renderer, resolver).build()?;
    Ok(report)
}
