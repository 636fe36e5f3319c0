// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Development server command.

use super::compile::compile;
use crate::config::Config;
use crate::server::http::create_server;
use console::style;
use pagemill::BundleRenderer;

/// Compiles the bundle and serves the site, overriding the configured
/// host and port when given.
pub async fn run(config: &Config, host: Option<String>, port: Option<u16>) -> anyhow::Result<()> {
    let bundle = compile(config, None).await?;
    let renderer = BundleRenderer::from_source(&bundle.code)?;

    let host = host.unwrap_or_else(|| config.dev.host.clone());
    let port = port.unwrap_or(config.dev.port);
    let addr = format!("{}:{}", host, port);

    println!(
        "{} {} template(s), {} route(s)",
        style("Loaded").green(),
        renderer.template_ids().len(),
        config.routes.len()
    );
    println!("{} http://{}", style("Dev server running at").cyan().bold(), addr);

    create_server(&addr, config, renderer).await
}
