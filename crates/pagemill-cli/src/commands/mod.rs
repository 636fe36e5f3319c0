// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! CLI command implementations.
//!
//! - `scaffold`: add data function stubs for new templates
//! - `fetch`: run data functions and persist records
//! - `compile`: compile templates into the bundle
//! - `build`: render the static site
//! - `dev`: start the development server

/// Production build command.
pub mod build;
/// Template compile command.
pub mod compile;
/// Development server command.
pub mod dev;
/// Data fetch command.
pub mod fetch;
/// Data function scaffolding command.
pub mod scaffold;

/// Environment variable holding the command line when no subcommand is given.
pub const COMMAND_ENV: &str = "PAGEMILL_COMMAND";

/// Splits a `PAGEMILL_COMMAND` value into arguments.
pub fn env_command_args(value: &str) -> Vec<String> {
    value.split_whitespace().map(str::to_string).collect()
}
