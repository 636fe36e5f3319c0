// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! HTTP server for development.
//!
//! A thin adapter: public assets are served as-is, every other request is
//! resolved to a template and its data, rendered from the bundle, and run
//! through the output passes. Records are read from disk per request.

use std::path::Path;
use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Request, State},
    http::{header, StatusCode},
    response::{Html, IntoResponse, Response},
    Router,
};
use pagemill::{BundleRenderer, DataStore, Resolution, Resolver, ScopeRewriter};
use tokio::sync::Mutex;
use tower_http::services::ServeDir;

use crate::config::Config;

/// Shared application state for the development server.
pub struct AppState {
    /// Loaded template bundle.
    pub renderer: Mutex<BundleRenderer>,
    /// Request resolver with the configured routes.
    pub resolver: Resolver,
    /// Persisted records.
    pub store: DataStore,
    /// Isolation pass applied to every page.
    pub scope: ScopeRewriter,
}

impl AppState {
    /// Creates the state for `config` serving from `renderer`.
    pub fn new(config: &Config, renderer: BundleRenderer) -> anyhow::Result<Self> {
        let resolver = config.resolver(renderer.template_ids())?;
        Ok(Self {
            renderer: Mutex::new(renderer),
            resolver,
            store: DataStore::new(config.site.data_dir_path()),
            scope: ScopeRewriter::new(config.site.scope_max_depth),
        })
    }
}

/// Builds the application: public assets first, pages as fallback.
pub fn app(state: Arc<AppState>, public_dir: &Path) -> Router {
    let pages = Router::new().fallback(fallback_handler).with_state(state);
    Router::new().fallback_service(ServeDir::new(public_dir).fallback(pages))
}

/// Creates and starts the development HTTP server.
pub async fn create_server(addr: &str, config: &Config, renderer: BundleRenderer) -> anyhow::Result<()> {
    let state = Arc::new(AppState::new(config, renderer)?);
    let app = app(state, &config.site.public_dir_path());

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn fallback_handler(State(state): State<Arc<AppState>>, request: Request<Body>) -> Response {
    let user_agent = request
        .headers()
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let url = request
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| "/".to_string());

    render_url(&state, &url, user_agent.as_deref()).await
}

/// Resolves and renders `url`.
///
/// Unknown templates give a 404 page; resolution and render failures a 500.
pub async fn render_url(state: &AppState, url: &str, user_agent: Option<&str>) -> Response {
    let resolution = match state.resolver.resolve_request(url, user_agent, &state.store) {
        Ok(resolution) => resolution,
        Err(e) => {
            tracing::error!("Failed to resolve {}: {}", url, e);
            return (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response();
        }
    };

    match resolution {
        Resolution::Found { template_id, data, source } => {
            tracing::debug!("{} -> {} ({:?})", url, template_id, source);
            let (language, _) = state.resolver.split_language(url);
            let context = match state.store.page_context(language, data) {
                Ok(context) => context,
                Err(e) => return (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
            };

            let renderer = state.renderer.lock().await;
            match renderer.render_page(&template_id, &context, &state.scope) {
                Ok(html) => Html(html).into_response(),
                Err(e) => {
                    tracing::error!("Failed to render {}: {}", template_id, e);
                    (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
                }
            }
        }
        Resolution::NotFound { lookup } => {
            tracing::warn!("Template not found for {} (tried {})", url, lookup);
            (StatusCode::NOT_FOUND, format!("Template not found: {}", lookup)).into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pagemill::SiteConfig;
    use tempfile::TempDir;

    const BUNDLE: &str = r#"
        local __templates = {}
        __templates["home"] = function(data) return "<h1>" .. data.title .. "</h1>" end
        __templates["about_index"] = function(data) return "<p>" .. data.language .. "</p>" end
        return __templates
    "#;

    async fn body_text(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    fn state(dir: &TempDir) -> AppState {
        let config = Config {
            site: SiteConfig::default()
                .with_project_root(dir.path())
                .with_languages(["en", "fr"]),
            ..Config::default()
        };
        AppState::new(&config, BundleRenderer::from_source(BUNDLE).unwrap()).unwrap()
    }

    #[tokio::test]
    async fn test_record_page_renders() {
        let dir = TempDir::new().unwrap();
        let state = state(&dir);
        state
            .store
            .write("fr", "home", &serde_json::json!({ "title": "Accueil", "_template": "home.tpl" }))
            .await
            .unwrap();

        let response = render_url(&state, "/fr/home.html", None).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_text(response).await, "<h1>Accueil</h1>");
    }

    #[tokio::test]
    async fn test_convention_template_without_record() {
        let dir = TempDir::new().unwrap();
        let response = render_url(&state(&dir), "/about", None).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_text(response).await, "<p>en</p>");
    }

    #[tokio::test]
    async fn test_missing_template_is_404() {
        let dir = TempDir::new().unwrap();
        let response = render_url(&state(&dir), "/en/nowhere.html", None).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert!(body_text(response).await.starts_with("Template not found"));
    }
}
