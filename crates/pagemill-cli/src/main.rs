// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use pagemill_cli::commands::{self, env_command_args, COMMAND_ENV};
use pagemill_cli::config::Config;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "pagemill")]
#[command(author = "Maravilla Labs")]
#[command(version)]
#[command(about = "Multi-language static site pipeline on Lua templates", long_about = None)]
struct Cli {
    /// Log level: error, warn, info, debug, trace
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    /// Project directory containing pagemill.toml
    #[arg(short = 'C', long, global = true, default_value = ".")]
    project: PathBuf,

    /// Command to run; read from PAGEMILL_COMMAND when omitted
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Add data function stubs for templates that have none
    Scaffold,
    /// Run data functions and persist their records
    Fetch {
        /// Filters: f=name1,name2 (functions) and c=lang1,lang2 (languages)
        args: Vec<String>,
    },
    /// Compile templates into the bundle
    Compile {
        /// Only recompile this template; the rest come from cache
        #[arg(short, long)]
        template: Option<String>,
    },
    /// Render the static site
    Build,
    /// Start the development server
    Dev {
        /// Port to run the dev server on (default from pagemill.toml)
        #[arg(short, long)]
        port: Option<u16>,
        /// Host to bind to (default from pagemill.toml)
        #[arg(long)]
        host: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing with the specified log level
    let filter = EnvFilter::try_new(&cli.log_level).unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::fmt().with_env_filter(filter).init();

    let command = match cli.command {
        Some(command) => command,
        None => command_from_env()?,
    };
    let config = Config::load_from(&cli.project)?;

    match command {
        Commands::Scaffold => commands::scaffold::run(&config).await,
        Commands::Fetch { args } => commands::fetch::run(&config, &args).await,
        Commands::Compile { template } => commands::compile::run(&config, template.as_deref()).await,
        Commands::Build => commands::build::run(&config).await,
        Commands::Dev { port, host } => commands::dev::run(&config, host, port).await,
    }
}

fn command_from_env() -> anyhow::Result<Commands> {
    let value = std::env::var(COMMAND_ENV)
        .map_err(|_| anyhow::anyhow!("no command given; pass a subcommand or set {}", COMMAND_ENV))?;
    let args = std::iter::once("pagemill".to_string()).chain(env_command_args(&value));
    Cli::try_parse_from(args)?
        .command
        .ok_or_else(|| anyhow::anyhow!("{} is empty", COMMAND_ENV))
}
