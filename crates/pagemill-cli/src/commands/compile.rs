// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Compile command: writes the template bundle.

use crate::config::Config;
use console::style;
use pagemill::{BundleCompiler, CompiledBundle, InterpolatingCompiler};
use std::time::Instant;

/// Runs the compile command, optionally recompiling a single template.
pub async fn run(config: &Config, template: Option<&str>) -> anyhow::Result<()> {
    let start = Instant::now();
    let bundle = compile(config, template).await?;

    println!(
        "{} {} template(s) ({} compiled) into {} in {}ms",
        style("Bundled").green().bold(),
        bundle.templates.len(),
        bundle.compiled,
        style(bundle.path.display()).cyan(),
        start.elapsed().as_millis()
    );
    Ok(())
}

/// Compiles the bundle with the built-in compiler.
pub async fn compile(config: &Config, template: Option<&str>) -> anyhow::Result<CompiledBundle> {
    let bundle = BundleCompiler::new(&config.site, InterpolatingCompiler::new())
        .compile_all(template)
        .await?;
    Ok(bundle)
}
