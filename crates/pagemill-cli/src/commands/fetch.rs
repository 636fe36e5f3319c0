// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Fetch command: runs the data functions and persists their records.

use crate::config::Config;
use console::style;
use pagemill::{DataScheduler, FetchFilter, FetchReport, LuaDataSource, TemplateRegistry};
use std::time::Instant;

/// Runs the fetch command with `f=name1,name2` / `c=lang1,lang2` filter arguments.
pub async fn run(config: &Config, args: &[String]) -> anyhow::Result<()> {
    let start = Instant::now();
    let filter = FetchFilter::from_args(args);
    let report = fetch(config, &filter).await?;

    for (language, count) in &report.records {
        println!("  {} {} record(s)", style(language).cyan(), count);
    }
    println!(
        "{} {} record(s) from {} call(s) in {}ms",
        style("Fetched").green().bold(),
        report.total(),
        report.calls,
        start.elapsed().as_millis()
    );
    Ok(())
}

/// Loads the data source and runs the scheduler with `filter`.
pub async fn fetch(config: &Config, filter: &FetchFilter) -> anyhow::Result<FetchReport> {
    let site = &config.site;
    let source_path = site.data_source_path();
    if !source_path.is_file() {
        anyhow::bail!(
            "data source {} not found (run `pagemill scaffold` to create it)",
            source_path.display()
        );
    }

    let functions = LuaDataSource::load(&source_path)?.functions();
    let templates = TemplateRegistry::new(site).list_templates()?;
    let report = DataScheduler::new(site, templates, functions)
        .with_custom_entries(config.fetch.custom.clone())
        .with_max_concurrency(site.max_concurrency)
        .run(filter)
        .await?;
    Ok(report)
}
