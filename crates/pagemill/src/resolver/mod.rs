// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Request and record resolution.
//!
//! A request is resolved in two tiers:
//!
//! 1. Explicit routes, evaluated in declaration order. The first route whose
//!    [`RouteDefinition::matches`] returns true supplies the template and the
//!    data.
//! 2. Convention: `/about.html` looks up the record `about`, `/about` the
//!    record `about/index`. A found record names its template in
//!    `_template`; without a record, the lookup path itself is tried as a
//!    template.
//!
//! The first URL segment selects the language when it is one of the site
//! languages. A request nothing matches is [`Resolution::NotFound`], not an
//! error.

mod routes;

pub use routes::{PatternRoute, RouteConfig};

use crate::config::SiteConfig;
use crate::data::{DataStore, TEMPLATE_FIELD};
use crate::error::Result;
use crate::registry::to_canonical_id;
use lazy_static::lazy_static;
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeSet;

lazy_static! {
    static ref DESKTOP_UA: Regex = Regex::new(r"Windows NT|Macintosh|X11|CrOS").unwrap();
    static ref HANDHELD_UA: Regex = Regex::new(r"Mobi|iPhone|iPod|iPad|Android|Tablet").unwrap();
    static ref TABLET_UA: Regex = Regex::new(r"iPad|Tablet").unwrap();
    static ref MOBILE_UA: Regex = Regex::new(r"Mobi|iPhone|iPod|Android|BlackBerry|Opera Mini|IEMobile").unwrap();
}

/// Device class of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Device {
    /// Desktop browser.
    Pc,
    /// Tablet-class device.
    Ipad,
    /// Phone or other handheld.
    Mobile,
    /// No or unrecognized User-Agent.
    Unknown,
}

impl Device {
    /// Classifies a User-Agent header.
    pub fn from_user_agent(user_agent: Option<&str>) -> Self {
        let Some(ua) = user_agent else {
            return Device::Unknown;
        };
        if DESKTOP_UA.is_match(ua) && !HANDHELD_UA.is_match(ua) {
            Device::Pc
        } else if TABLET_UA.is_match(ua) || (ua.contains("Android") && !ua.contains("Mobile")) {
            Device::Ipad
        } else if MOBILE_UA.is_match(ua) {
            Device::Mobile
        } else {
            Device::Unknown
        }
    }

    /// Lowercase name, as used in route configuration.
    pub fn as_str(&self) -> &'static str {
        match self {
            Device::Pc => "pc",
            Device::Ipad => "ipad",
            Device::Mobile => "mobile",
            Device::Unknown => "unknown",
        }
    }
}

/// What route callables see of a request.
#[derive(Debug, Clone, Copy)]
pub struct RequestContext<'a> {
    /// The full request URL path (with language prefix).
    pub url: &'a str,
    /// The path without language prefix, starting with `/`.
    pub path: &'a str,
    /// Selected language.
    pub language: &'a str,
    /// Device class.
    pub device: Device,
    /// Persisted data records.
    pub data: &'a DataStore,
}

/// An explicit route.
pub trait RouteDefinition: Send + Sync {
    /// Returns true if this route handles the request.
    fn matches(&self, ctx: &RequestContext<'_>) -> bool;

    /// Data for the page, if any.
    fn data(&self, ctx: &RequestContext<'_>) -> Result<Option<Value>>;

    /// Canonical id of the template to render.
    fn template_id(&self, ctx: &RequestContext<'_>) -> String;

    /// Fixed URL paths this route should be rendered at in a static build.
    fn static_paths(&self) -> &[String] {
        &[]
    }
}

/// How a page was resolved.
#[derive(Debug, Clone, PartialEq)]
pub enum ResolutionSource {
    /// Explicit route at this index.
    Route(usize),
    /// Persisted record at this path.
    Record(String),
    /// Lookup path used directly as a template.
    Template,
}

/// Result of resolving a request or record.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    /// A template exists for the request.
    Found {
        /// Canonical id of the template.
        template_id: String,
        /// Page data, if any.
        data: Option<Value>,
        /// Which tier resolved it.
        source: ResolutionSource,
    },
    /// No template could be found.
    NotFound {
        /// The template or lookup path that was tried last.
        lookup: String,
    },
}

impl Resolution {
    /// Returns true for [`Resolution::Found`].
    pub fn is_found(&self) -> bool {
        matches!(self, Resolution::Found { .. })
    }
}

/// Pairs requests and records with templates.
pub struct Resolver {
    routes: Vec<Box<dyn RouteDefinition>>,
    templates: BTreeSet<String>,
    languages: Vec<String>,
    default_language: String,
}

impl Resolver {
    /// Creates a resolver knowing the given template ids.
    pub fn new<I, S>(config: &SiteConfig, template_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            routes: Vec::new(),
            templates: template_ids.into_iter().map(Into::into).collect(),
            languages: config.languages.clone(),
            default_language: config.default_language().to_string(),
        }
    }

    /// Appends an explicit route.
    pub fn with_route<R: RouteDefinition + 'static>(mut self, route: R) -> Self {
        self.routes.push(Box::new(route));
        self
    }

    /// Appends pattern routes from configuration.
    pub fn with_route_configs(mut self, configs: &[RouteConfig]) -> Result<Self> {
        for config in configs {
            self.routes.push(Box::new(PatternRoute::new(config.clone())?));
        }
        Ok(self)
    }

    /// The explicit routes, in evaluation order.
    pub fn routes(&self) -> &[Box<dyn RouteDefinition>] {
        &self.routes
    }

    /// Returns true if `id` is a known template.
    pub fn has_template(&self, id: &str) -> bool {
        self.templates.contains(id)
    }

    /// Splits the language prefix off a URL path.
    ///
    /// Returns the language and the remaining path (always starting with `/`).
    pub fn split_language<'u>(&'u self, url: &'u str) -> (&'u str, String) {
        let path = url.split(['?', '#']).next().unwrap_or("");
        let trimmed = path.trim_start_matches('/');
        let (first, rest) = trimmed.split_once('/').unwrap_or((trimmed, ""));

        match self.languages.iter().find(|l| l.as_str() == first) {
            Some(language) => (language.as_str(), format!("/{}", rest)),
            None => (self.default_language.as_str(), format!("/{}", trimmed)),
        }
    }

    /// Resolves an incoming request.
    pub fn resolve_request(&self, url: &str, user_agent: Option<&str>, store: &DataStore) -> Result<Resolution> {
        let (language, path) = self.split_language(url);
        let ctx = RequestContext {
            url,
            path: &path,
            language,
            device: Device::from_user_agent(user_agent),
            data: store,
        };
        if let Some(resolution) = self.match_route(&ctx)? {
            return Ok(resolution);
        }

        let lookup = convention_lookup_path(&path);
        let record = store.load(language, &lookup)?;
        Ok(self.resolve_record(language, &lookup, record))
    }

    /// Resolves a persisted record for the static build.
    ///
    /// The record is addressed as `/<language>/<path>.html`, so explicit
    /// routes win over its `_template` stamp exactly as they do for requests.
    pub fn resolve_page(
        &self,
        language: &str,
        path: &str,
        record: Option<Value>,
        store: &DataStore,
    ) -> Result<Resolution> {
        let page = format!("/{}.html", path.trim_start_matches('/'));
        let url = format!("/{}{}", language, page);
        let ctx = RequestContext {
            url: &url,
            path: &page,
            language,
            device: Device::Unknown,
            data: store,
        };
        if let Some(resolution) = self.match_route(&ctx)? {
            return Ok(resolution);
        }
        Ok(self.resolve_record(language, path, record))
    }

    fn match_route(&self, ctx: &RequestContext<'_>) -> Result<Option<Resolution>> {
        for (index, route) in self.routes.iter().enumerate() {
            if !route.matches(ctx) {
                continue;
            }
            let template_id = route.template_id(ctx);
            tracing::debug!("Route {} matched {} -> {}", index, ctx.url, template_id);
            if !self.has_template(&template_id) {
                return Ok(Some(Resolution::NotFound { lookup: template_id }));
            }
            return Ok(Some(Resolution::Found {
                template_id,
                data: route.data(ctx)?,
                source: ResolutionSource::Route(index),
            }));
        }
        Ok(None)
    }

    /// Resolves a persisted record (or its absence) at `path`.
    pub fn resolve_record(&self, language: &str, path: &str, record: Option<Value>) -> Resolution {
        if let Some(record) = record {
            let selected = record
                .get(TEMPLATE_FIELD)
                .and_then(|stamp| select_template(stamp, language, &self.languages));
            if let Some(template_path) = selected {
                let template_id = to_canonical_id(&template_path);
                if self.has_template(&template_id) {
                    return Resolution::Found {
                        template_id,
                        data: Some(record),
                        source: ResolutionSource::Record(path.to_string()),
                    };
                }
                return Resolution::NotFound { lookup: template_path };
            }
            if let Some(found) = self.template_for_path(path, Some(record)) {
                return found;
            }
            return Resolution::NotFound {
                lookup: path.to_string(),
            };
        }

        self.template_for_path(path, None).unwrap_or_else(|| Resolution::NotFound {
            lookup: path.to_string(),
        })
    }

    fn template_for_path(&self, path: &str, data: Option<Value>) -> Option<Resolution> {
        let template_id = to_canonical_id(path);
        self.has_template(&template_id).then(|| Resolution::Found {
            template_id,
            data,
            source: ResolutionSource::Template,
        })
    }
}

/// Record path for a language-stripped URL path.
///
/// `/about.html` → `about`, `/about` → `about/index`, `/` → `index`.
pub fn convention_lookup_path(path: &str) -> String {
    let trimmed = path.trim_matches('/');
    if let Some(stem) = trimmed.strip_suffix(".html") {
        stem.to_string()
    } else if trimmed.is_empty() {
        "index".to_string()
    } else {
        format!("{}/index", trimmed)
    }
}

/// Picks the template path from a `_template` stamp.
///
/// A string is used as-is. For a list, the candidate prefixed with
/// `<language>/` wins; otherwise the first candidate carrying no language
/// prefix at all.
pub fn select_template(stamp: &Value, language: &str, languages: &[String]) -> Option<String> {
    match stamp {
        Value::String(path) => Some(path.clone()),
        Value::Array(candidates) => {
            let candidates: Vec<&str> = candidates.iter().filter_map(Value::as_str).collect();
            let own_prefix = format!("{}/", language);
            candidates
                .iter()
                .find(|c| c.starts_with(&own_prefix))
                .or_else(|| {
                    candidates
                        .iter()
                        .find(|c| !languages.iter().any(|l| c.starts_with(&format!("{}/", l))))
                })
                .map(|c| c.to_string())
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    const IPHONE: &str = "Mozilla/5.0 (iPhone; CPU iPhone OS 17_0 like Mac OS X) AppleWebKit/605.1.15 Mobile/15E148";
    const IPAD: &str = "Mozilla/5.0 (iPad; CPU OS 17_0 like Mac OS X) AppleWebKit/605.1.15 Mobile/15E148";
    const ANDROID_TABLET: &str = "Mozilla/5.0 (Linux; Android 13; SM-X700) AppleWebKit/537.36 Chrome/120.0 Safari/537.36";
    const ANDROID_PHONE: &str = "Mozilla/5.0 (Linux; Android 13; Pixel 7) AppleWebKit/537.36 Chrome/120.0 Mobile Safari/537.36";
    const DESKTOP: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 Chrome/120.0 Safari/537.36";

    struct FixedRoute;

    impl RouteDefinition for FixedRoute {
        fn matches(&self, ctx: &RequestContext<'_>) -> bool {
            ctx.path == "/special"
        }

        fn data(&self, ctx: &RequestContext<'_>) -> Result<Option<Value>> {
            Ok(Some(json!({ "language": ctx.language, "device": ctx.device.as_str() })))
        }

        fn template_id(&self, _ctx: &RequestContext<'_>) -> String {
            "special".to_string()
        }
    }

    fn resolver() -> Resolver {
        let config = SiteConfig::default().with_languages(["en", "fr"]);
        Resolver::new(&config, ["home", "special", "about_index", "fr_home"])
    }

    #[test]
    fn test_device_classification() {
        assert_eq!(Device::from_user_agent(Some(DESKTOP)), Device::Pc);
        assert_eq!(Device::from_user_agent(Some(IPAD)), Device::Ipad);
        assert_eq!(Device::from_user_agent(Some(ANDROID_TABLET)), Device::Ipad);
        assert_eq!(Device::from_user_agent(Some(IPHONE)), Device::Mobile);
        assert_eq!(Device::from_user_agent(Some(ANDROID_PHONE)), Device::Mobile);
        assert_eq!(Device::from_user_agent(Some("curl/8.0")), Device::Unknown);
        assert_eq!(Device::from_user_agent(None), Device::Unknown);
    }

    #[test]
    fn test_convention_lookup_path() {
        assert_eq!(convention_lookup_path("/about.html"), "about");
        assert_eq!(convention_lookup_path("/about"), "about/index");
        assert_eq!(convention_lookup_path("/blog/post/"), "blog/post/index");
        assert_eq!(convention_lookup_path("/"), "index");
    }

    #[test]
    fn test_split_language() {
        let resolver = resolver();
        assert_eq!(resolver.split_language("/fr/home.html"), ("fr", "/home.html".to_string()));
        assert_eq!(resolver.split_language("/home.html?x=1"), ("en", "/home.html".to_string()));
        assert_eq!(resolver.split_language("/fr"), ("fr", "/".to_string()));
        assert_eq!(resolver.split_language("/french/x"), ("en", "/french/x".to_string()));
    }

    #[test]
    fn test_select_template() {
        let languages = vec!["en".to_string(), "fr".to_string()];
        let stamp = json!(["home.tpl", "fr/home.tpl"]);
        assert_eq!(select_template(&stamp, "fr", &languages).unwrap(), "fr/home.tpl");
        assert_eq!(select_template(&stamp, "en", &languages).unwrap(), "home.tpl");
        assert_eq!(select_template(&json!("a.tpl"), "en", &languages).unwrap(), "a.tpl");
        assert_eq!(select_template(&json!(["fr/x.tpl"]), "en", &languages), None);
        assert_eq!(select_template(&json!(1), "en", &languages), None);
    }

    #[tokio::test]
    async fn test_route_wins_over_convention() {
        let dir = TempDir::new().unwrap();
        let store = DataStore::new(dir.path());
        store
            .write("en", "special/index", &json!({ "_template": "home.tpl" }))
            .await
            .unwrap();

        let resolver = resolver().with_route(FixedRoute);
        let resolution = resolver.resolve_request("/special", Some(IPHONE), &store).unwrap();
        assert_eq!(
            resolution,
            Resolution::Found {
                template_id: "special".to_string(),
                data: Some(json!({ "language": "en", "device": "mobile" })),
                source: ResolutionSource::Route(0),
            }
        );
    }

    #[tokio::test]
    async fn test_convention_record_and_template_fallback() {
        let dir = TempDir::new().unwrap();
        let store = DataStore::new(dir.path());
        let record = json!({ "title": "Accueil", "_template": ["home.tpl", "fr/home.tpl"] });
        store.write("fr", "home", &record).await.unwrap();

        let resolver = resolver();
        let found = resolver.resolve_request("/fr/home.html", None, &store).unwrap();
        assert_eq!(
            found,
            Resolution::Found {
                template_id: "fr_home".to_string(),
                data: Some(record),
                source: ResolutionSource::Record("home".to_string()),
            }
        );

        let by_template = resolver.resolve_request("/about", None, &store).unwrap();
        assert_eq!(
            by_template,
            Resolution::Found {
                template_id: "about_index".to_string(),
                data: None,
                source: ResolutionSource::Template,
            }
        );

        let missing = resolver.resolve_request("/nothing.html", None, &store).unwrap();
        assert_eq!(missing, Resolution::NotFound { lookup: "nothing".to_string() });
    }

    #[test]
    fn test_record_with_unknown_template_is_not_found() {
        let resolution = resolver().resolve_record("en", "x", Some(json!({ "_template": "gone.tpl" })));
        assert_eq!(resolution, Resolution::NotFound { lookup: "gone.tpl".to_string() });
    }
}
