// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

// Warn on missing documentation for public items
#![warn(missing_docs)]

//! # pagemill
//!
//! Multi-language static site pipeline built on Lua templates.
//!
//! A site is a tree of template files plus per-page data produced by data
//! functions. pagemill:
//!
//! - discovers templates and derives canonical ids (`blog/post.tpl` → `blog_post`)
//! - calls the data functions for every language under a concurrency cap and
//!   persists the results as JSON records
//! - compiles every template into one minified Lua bundle
//! - resolves requests and records to a template and its data
//! - post-processes rendered markup with a small macro language and scoped
//!   styles for `<isolate>` fragments
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use pagemill::{BundleCompiler, DataScheduler, FetchFilter, InterpolatingCompiler,
//!                LuaDataSource, SiteConfig, TemplateRegistry};
//!
//! let config = SiteConfig::default().with_languages(["en", "fr"]);
//! let templates = TemplateRegistry::new(&config).list_templates()?;
//!
//! let functions = LuaDataSource::load(config.data_source_path())?.functions();
//! DataScheduler::new(&config, templates, functions).run(&FetchFilter::all()).await?;
//!
//! BundleCompiler::new(&config, InterpolatingCompiler::new()).compile_all(None).await?;
//! ```

/// Error types.
pub mod error;
/// Site configuration.
pub mod config;
/// Template discovery and canonical ids.
pub mod registry;
/// Bounded concurrent task execution.
pub mod pool;
/// Data functions, scheduling and persisted records.
pub mod data;
/// Lua state helpers.
pub mod lua_env;
/// Data functions defined in Lua.
pub mod lua_source;
/// Template compilation and bundling.
pub mod compiler;
/// Rendering from a compiled bundle.
pub mod render;
/// Request and record resolution.
pub mod resolver;
/// Output text passes.
pub mod transform;
/// Static site output.
pub mod site;

pub use compiler::{BundleCompiler, CompileOptions, CompiledBundle, InterpolatingCompiler, TemplateCompiler};
pub use config::SiteConfig;
pub use data::{
    data_fn, CustomDataEntry, DataFnError, DataFunction, DataFunctions, DataScheduler, DataStore, FetchFilter,
    FetchReport, PageData,
};
pub use error::{PagemillError, Result};
pub use lua_source::LuaDataSource;
pub use pool::BoundedPool;
pub use registry::{TemplateFile, TemplateRegistry};
pub use render::BundleRenderer;
pub use resolver::{Device, PatternRoute, RequestContext, Resolution, Resolver, RouteConfig, RouteDefinition};
pub use site::{BuildReport, SiteBuilder};
pub use transform::{expand_macros, ScopeRewriter};
