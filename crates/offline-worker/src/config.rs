//! Worker configuration loaded from the environment

use crate::error::{Result, WorkerError};
use crate::strategy::{FetchStrategy, StrategyPolicy};
use crate::types::cache_url;
use std::env;
use std::path::PathBuf;
use tracing::warn;
use url::Url;

pub const DEFAULT_CACHE_VERSION: &str = "it-ops-v1";

/// Assets the application shell needs to render offline
pub const DEFAULT_ASSETS: &[&str] = &[
    "/",
    "/auth/login",
    "/static/manifest.json",
    "https://cdn.tailwindcss.com",
    "https://cdnjs.cloudflare.com/ajax/libs/font-awesome/6.4.0/css/all.min.css",
    "https://unpkg.com/htmx.org@1.9.5",
    "https://cdn.jsdelivr.net/npm/alpinejs@3.x.x/dist/cdn.min.js",
];

const DEFAULT_ICON: &str = "https://cdn-icons-png.flaticon.com/512/906/906309.png";
const DEFAULT_TAG: &str = "it-ops-notification";

/// How notifications are decorated
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationConfig {
    pub icon: String,
    pub badge: String,
    pub vibrate: Vec<u32>,
    pub tag: String,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            icon: DEFAULT_ICON.to_string(),
            badge: DEFAULT_ICON.to_string(),
            vibrate: vec![100, 50, 100],
            tag: DEFAULT_TAG.to_string(),
        }
    }
}

/// Worker configuration, injected at startup
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub port: u16,
    /// Origin of the application; relative URLs resolve against it
    pub origin: Url,
    /// Name of the live cache generation
    pub cache_version: String,
    pub cache_dir: PathBuf,
    pub max_cache_size: u64,
    pub assets: Vec<Url>,
    pub policy: StrategyPolicy,
    pub skip_waiting: bool,
    pub notification: NotificationConfig,
}

impl WorkerConfig {
    /// Config for `origin` with every other setting at its default
    pub fn new(origin: Url, cache_version: &str) -> Self {
        let assets = resolve_assets(&origin, DEFAULT_ASSETS.iter().copied());
        Self {
            port: 3005,
            origin,
            cache_version: cache_version.to_string(),
            cache_dir: PathBuf::from("./cache/shell"),
            max_cache_size: 256 * 1024 * 1024,
            assets,
            policy: StrategyPolicy::default(),
            skip_waiting: true,
            notification: NotificationConfig::default(),
        }
    }

    /// Replace the asset list, resolving relative paths against the origin
    pub fn with_assets<'a>(mut self, assets: impl IntoIterator<Item = &'a str>) -> Self {
        self.assets = resolve_assets(&self.origin, assets);
        self
    }

    /// Parse configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let origin = env::var("ORIGIN").unwrap_or_else(|_| "http://localhost:8080".to_string());
        let origin = Url::parse(&origin)?;

        let cache_version =
            env::var("CACHE_VERSION").unwrap_or_else(|_| DEFAULT_CACHE_VERSION.to_string());

        let mut config = Self::new(origin, &cache_version);

        if let Some(port) = env::var("PORT").ok().and_then(|p| p.parse().ok()) {
            config.port = port;
        }

        if let Ok(dir) = env::var("CACHE_DIR") {
            config.cache_dir = PathBuf::from(dir);
        }

        if let Some(size) = env::var("MAX_CACHE_SIZE")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
        {
            config.max_cache_size = size;
        }

        if let Ok(list) = env::var("ASSET_URLS") {
            let assets: Vec<String> = list
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
            config = config.with_assets(assets.iter().map(String::as_str));
        }

        if let Ok(s) = env::var("NAVIGATION_STRATEGY") {
            config.policy.navigation = s.parse::<FetchStrategy>()?;
        }
        if let Ok(s) = env::var("ASSET_STRATEGY") {
            config.policy.subresource = s.parse::<FetchStrategy>()?;
        }
        if let Ok(s) = env::var("CACHE_WRITE_BACK") {
            config.policy.write_back = parse_flag("CACHE_WRITE_BACK", &s)?;
        }
        if let Ok(s) = env::var("SKIP_WAITING") {
            config.skip_waiting = parse_flag("SKIP_WAITING", &s)?;
        }

        if let Ok(icon) = env::var("NOTIFICATION_ICON") {
            config.notification.icon = icon;
        }
        if let Ok(badge) = env::var("NOTIFICATION_BADGE") {
            config.notification.badge = badge;
        }
        if let Ok(tag) = env::var("NOTIFICATION_TAG") {
            config.notification.tag = tag;
        }

        Ok(config)
    }

    /// Resolve `url` against the origin, falling back to the origin itself
    pub fn resolve(&self, url: &str) -> Url {
        self.origin
            .join(url)
            .unwrap_or_else(|_| self.origin.clone())
    }

    /// URL on the origin for a request path and query
    ///
    /// Unlike [`resolve`](Self::resolve), a path such as `//other.host/x`
    /// stays on the origin instead of being read as a network-path reference.
    pub fn same_origin(&self, path: &str, query: Option<&str>) -> Url {
        let mut url = self.origin.clone();
        url.set_path(path);
        url.set_query(query);
        url.set_fragment(None);
        url
    }

    /// The install-list asset matching `url`, if any
    pub fn asset(&self, url: &str) -> Option<Url> {
        let wanted = cache_url(&self.origin.join(url).ok()?);
        self.assets.iter().find(|a| cache_url(a) == wanted).cloned()
    }
}

fn resolve_assets<'a>(origin: &Url, assets: impl IntoIterator<Item = &'a str>) -> Vec<Url> {
    assets
        .into_iter()
        .filter_map(|a| match origin.join(a) {
            Ok(url) => Some(url),
            Err(e) => {
                warn!(asset = a, error = %e, "Ignoring unparseable asset URL");
                None
            }
        })
        .collect()
}

fn parse_flag(name: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(WorkerError::Config(format!(
            "{} must be a boolean, got {}",
            name, other
        ))),
    }
}
