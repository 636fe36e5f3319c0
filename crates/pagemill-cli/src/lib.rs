// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

// Warn on missing documentation for public items
#![warn(missing_docs)]

//! pagemill CLI library.
//!
//! This crate provides the command-line interface for the pagemill site
//! pipeline: project configuration, the pipeline commands, and a thin
//! development server.
//!
//! # Usage
//!
//! This crate is primarily used through the `pagemill` binary:
//!
//! ```bash
//! pagemill scaffold          # Add data function stubs for new templates
//! pagemill fetch f=get_home_data c=en
//! pagemill compile --template blog/post.tpl
//! pagemill build             # Render the static site
//! pagemill dev               # Start development server
//! ```
//!
//! Without a subcommand, the command line is taken from `PAGEMILL_COMMAND`.
//!
//! # Configuration
//!
//! Projects are configured via `pagemill.toml` at the project root.

/// CLI commands (scaffold, fetch, compile, build, dev).
pub mod commands;
/// Project configuration from `pagemill.toml`.
pub mod config;
/// Development server.
pub mod server;
