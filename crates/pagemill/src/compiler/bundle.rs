// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

use super::minify::minify_lua;
use super::{CompileOptions, TemplateCompiler, RUNTIME};
use crate::config::SiteConfig;
use crate::error::{PagemillError, Result};
use crate::pool::BoundedPool;
use crate::registry::{normalize_separators, path_to_string, TemplateFile, TemplateRegistry};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Name used for bundle-level errors.
const BUNDLE_NAME: &str = "<bundle>";

/// A written bundle.
#[derive(Debug, Clone)]
pub struct CompiledBundle {
    /// Minified bundle source.
    pub code: String,
    /// Canonical ids in bundle order.
    pub templates: Vec<String>,
    /// Number of templates compiled in this run (the rest came from cache).
    pub compiled: usize,
    /// Where the bundle was written.
    pub path: PathBuf,
}

/// Compiles the template tree into one Lua bundle.
pub struct BundleCompiler {
    compiler: Arc<dyn TemplateCompiler>,
    registry: TemplateRegistry,
    cache_dir: PathBuf,
    output: PathBuf,
    pool: BoundedPool,
}

impl BundleCompiler {
    /// Creates a bundle compiler using `compiler` for every template.
    pub fn new<C: TemplateCompiler + 'static>(config: &SiteConfig, compiler: C) -> Self {
        Self::with_shared_compiler(config, Arc::new(compiler))
    }

    /// Creates a bundle compiler from an already shared compiler.
    pub fn with_shared_compiler(config: &SiteConfig, compiler: Arc<dyn TemplateCompiler>) -> Self {
        Self {
            compiler,
            registry: TemplateRegistry::new(config),
            cache_dir: config.cache_dir_path(),
            output: config.bundle_file(),
            pool: BoundedPool::new(config.max_concurrency),
        }
    }

    /// Where the bundle is written.
    pub fn output_path(&self) -> &Path {
        &self.output
    }

    /// Compiles every template, or only the one matching `filter`.
    ///
    /// With a filter, the other templates are taken from the fragment cache
    /// (and compiled on a cache miss), so the bundle always contains the
    /// whole tree.
    pub async fn compile_all(&self, filter: Option<&str>) -> Result<CompiledBundle> {
        let templates = self.registry.list_templates()?;

        let selected = match filter {
            Some(filter) => {
                let wanted = self.normalize_filter(filter);
                let found = templates
                    .iter()
                    .find(|t| t.path == wanted || t.canonical_id == wanted)
                    .ok_or_else(|| PagemillError::compile(filter, "no template matches this path"))?;
                Some(found.path.clone())
            }
            None => None,
        };

        let mut compiled = 0;
        let mut jobs = Vec::with_capacity(templates.len());
        for template in &templates {
            let force = selected.as_ref().map_or(true, |path| path == &template.path);
            if force {
                compiled += 1;
            }
            let job = FragmentJob {
                compiler: self.compiler.clone(),
                template: template.clone(),
                source_path: self.registry.file_path(&template.path),
                cache_path: self.cache_path(template),
                use_cache: !force,
            };
            jobs.push(job.run());
        }

        tracing::info!("Compiling {} template(s)", compiled);
        let fragments = self.pool.run(jobs).await?;

        let mut buffer = String::from(RUNTIME);
        buffer.push('\n');
        for fragment in &fragments {
            buffer.push_str(fragment);
            buffer.push('\n');
        }
        buffer.push_str("return __templates\n");

        let code = minify_lua(&buffer, BUNDLE_NAME)?;
        check_syntax(&code)?;

        if let Some(parent) = self.output.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&self.output, &code).await?;
        tracing::info!("Wrote bundle {}", self.output.display());

        Ok(CompiledBundle {
            code,
            templates: templates.into_iter().map(|t| t.canonical_id).collect(),
            compiled,
            path: self.output.clone(),
        })
    }

    fn cache_path(&self, template: &TemplateFile) -> PathBuf {
        self.cache_dir.join(format!("{}.lua", template.canonical_id))
    }

    /// Turns a user-supplied template path into a registry-relative one.
    fn normalize_filter(&self, filter: &str) -> String {
        let filter = normalize_separators(filter);
        let filter = filter.trim_start_matches("./");
        let root = path_to_string(self.registry.root());
        let root = root.trim_start_matches("./").trim_end_matches('/');
        let relative = filter
            .strip_prefix(root)
            .and_then(|rest| rest.strip_prefix('/'))
            .unwrap_or(filter);
        relative.trim_start_matches('/').to_string()
    }
}

struct FragmentJob {
    compiler: Arc<dyn TemplateCompiler>,
    template: TemplateFile,
    source_path: PathBuf,
    cache_path: PathBuf,
    use_cache: bool,
}

impl FragmentJob {
    async fn run(self) -> Result<String> {
        if self.use_cache {
            match tokio::fs::read_to_string(&self.cache_path).await {
                Ok(fragment) => {
                    tracing::debug!("Using cached fragment for {}", self.template.path);
                    return Ok(fragment);
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    tracing::debug!("No cached fragment for {}, compiling", self.template.path);
                }
                Err(e) => return Err(e.into()),
            }
        }

        let source = tokio::fs::read_to_string(&self.source_path).await?;
        let options = CompileOptions::for_template(&self.template.path, &self.template.canonical_id);
        let generated = self.compiler.compile(&source, &options)?;
        let fragment = extract_fragment(&generated, &self.template, &options.function_name)?;

        if let Some(parent) = self.cache_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&self.cache_path, &fragment).await?;
        Ok(fragment)
    }
}

/// Cuts the render function out of generated code and rebinds it into the
/// bundle's template table.
fn extract_fragment(generated: &str, template: &TemplateFile, function_name: &str) -> Result<String> {
    let definition = format!("function {}(", function_name);
    let start = generated.find(&definition).ok_or_else(|| {
        PagemillError::compile(
            &template.path,
            format!("generated code does not define {}", function_name),
        )
    })?;
    let params = start + definition.len() - 1;

    let trailer = format!("return {}", function_name);
    let end = generated[params..]
        .rfind(&trailer)
        .map(|pos| params + pos)
        .ok_or_else(|| {
            PagemillError::compile(
                &template.path,
                format!("generated code does not return {}", function_name),
            )
        })?;

    Ok(format!(
        "__templates[\"{}\"] = function{}",
        super::escape_lua_string(&template.canonical_id),
        generated[params..end].trim_end()
    ))
}

fn check_syntax(code: &str) -> Result<()> {
    let lua = mlua::Lua::new();
    lua.load(code)
        .set_name("@pagemill_bundle")
        .into_function()
        .map(|_| ())
        .map_err(|e| PagemillError::compile(BUNDLE_NAME, e.to_string()))
}
