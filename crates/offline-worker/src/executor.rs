//! Carries out intents against cache storage and the host surfaces

use crate::error::{Result, WorkerError};
use crate::host::{Clients, Network, NotificationSurface};
use crate::intent::Intent;
use crate::strategy::FetchStrategy;
use crate::types::{
    cache_url, ClickOutcome, FailedAsset, FetchRequest, FetchResponse, Notification,
};
use futures::future::join_all;
use shell_cache::CacheStorage;
use std::sync::Arc;
use tracing::{debug, info, warn};
use url::Url;

/// What performing a single intent produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    SkippedWaiting,
    Precached {
        cache: String,
        cached: Vec<String>,
        failed: Vec<FailedAsset>,
    },
    Deleted(Vec<String>),
    Claimed(usize),
    Responded(FetchResponse),
    Shown(Notification),
    Closed(bool),
    Window(ClickOutcome),
}

/// Performs intents; the only component with side effects
pub struct Executor {
    storage: Arc<CacheStorage>,
    network: Arc<dyn Network>,
    notifications: Arc<dyn NotificationSurface>,
    clients: Arc<dyn Clients>,
}

impl Executor {
    pub fn new(
        storage: Arc<CacheStorage>,
        network: Arc<dyn Network>,
        notifications: Arc<dyn NotificationSurface>,
        clients: Arc<dyn Clients>,
    ) -> Self {
        Self {
            storage,
            network,
            notifications,
            clients,
        }
    }

    pub fn storage(&self) -> &Arc<CacheStorage> {
        &self.storage
    }

    pub async fn execute(&self, intent: Intent) -> Result<Effect> {
        match intent {
            Intent::SkipWaiting => Ok(Effect::SkippedWaiting),
            Intent::Precache { cache, urls } => self.precache(cache, urls).await,
            Intent::DeleteCachesExcept { keep } => self.delete_caches_except(&keep).await,
            Intent::ClaimClients => Ok(Effect::Claimed(self.clients.claim().await)),
            Intent::Respond {
                request,
                strategy,
                write_back,
            } => self
                .respond(&request, strategy, write_back.as_deref())
                .await
                .map(Effect::Responded),
            Intent::ShowNotification(notification) => {
                self.notifications.show(notification.clone()).await?;
                Ok(Effect::Shown(notification))
            }
            Intent::CloseNotification { tag } => {
                Ok(Effect::Closed(self.notifications.close(&tag).await?))
            }
            Intent::FocusOrOpenWindow { url } => self.focus_or_open(&url).await.map(Effect::Window),
        }
    }

    /// Fetch every URL concurrently and store the successful responses
    async fn precache(&self, cache_name: String, urls: Vec<Url>) -> Result<Effect> {
        let cache = self.storage.open(&cache_name).await?;
        let cache = &cache;
        info!(cache = %cache_name, assets = urls.len(), "Precaching assets");

        let fetches = urls.iter().map(|url| async move {
            let request = FetchRequest::subresource(url.clone());
            let outcome = match self.network.fetch(&request).await {
                Ok(response) if response.is_success() => cache
                    .put(&request.cache_url(), &response)
                    .await
                    .map_err(|e| e.to_string()),
                Ok(response) => Err(format!("status {}", response.status)),
                Err(e) => Err(e.to_string()),
            };
            (url, outcome)
        });

        let mut cached = Vec::new();
        let mut failed = Vec::new();
        for (url, outcome) in join_all(fetches).await {
            match outcome {
                Ok(()) => cached.push(url.to_string()),
                Err(error) => {
                    warn!(cache = %cache_name, url = %url, error = %error, "Failed to precache asset");
                    failed.push(FailedAsset {
                        url: url.to_string(),
                        error,
                    });
                }
            }
        }

        info!(
            cache = %cache_name,
            cached = cached.len(),
            failed = failed.len(),
            "Precache finished"
        );
        Ok(Effect::Precached {
            cache: cache_name,
            cached,
            failed,
        })
    }

    async fn delete_caches_except(&self, keep: &str) -> Result<Effect> {
        let mut deleted = Vec::new();
        for name in self.storage.keys().await {
            if name == keep {
                continue;
            }
            if self.storage.delete(&name).await? {
                info!(cache = %name, "Deleted stale cache");
                deleted.push(name);
            }
        }
        Ok(Effect::Deleted(deleted))
    }

    async fn respond(
        &self,
        request: &FetchRequest,
        strategy: FetchStrategy,
        write_back: Option<&str>,
    ) -> Result<FetchResponse> {
        debug!(url = %request.url, strategy = %strategy, "Responding to fetch");

        match strategy {
            FetchStrategy::NetworkOnly => {
                let snapshot = self.network.fetch(request).await?;
                Ok(FetchResponse::network(snapshot))
            }
            FetchStrategy::CacheOnly => self
                .from_cache(request)
                .await
                .ok_or_else(|| WorkerError::CacheMiss(request.cache_url())),
            FetchStrategy::NetworkFirst => match self.from_network(request, write_back).await {
                Ok(response) => Ok(response),
                Err(e) => {
                    warn!(url = %request.url, error = %e, "Network failed, trying cache");
                    self.from_cache(request).await.ok_or(e)
                }
            },
            FetchStrategy::CacheFirst => match self.from_cache(request).await {
                Some(response) => Ok(response),
                None => self.from_network(request, write_back).await,
            },
        }
    }

    async fn from_cache(&self, request: &FetchRequest) -> Option<FetchResponse> {
        self.storage
            .match_url(&request.cache_url())
            .await
            .map(FetchResponse::cache)
    }

    async fn from_network(
        &self,
        request: &FetchRequest,
        write_back: Option<&str>,
    ) -> Result<FetchResponse> {
        let snapshot = self.network.fetch(request).await?;

        if let Some(name) = write_back {
            if snapshot.is_success() {
                match self.storage.open(name).await {
                    Ok(cache) => {
                        if let Err(e) = cache.put(&request.cache_url(), &snapshot).await {
                            warn!(cache = %name, url = %request.url, error = %e, "Failed to write back response");
                        }
                    }
                    Err(e) => warn!(cache = %name, error = %e, "Failed to open cache for write-back"),
                }
            }
        }

        Ok(FetchResponse::network(snapshot))
    }

    async fn focus_or_open(&self, url: &Url) -> Result<ClickOutcome> {
        let target = cache_url(url);
        let windows = self.clients.match_all(true).await;

        if let Some(window) = windows.iter().find(|w| cache_url(&w.url) == target) {
            let client = self.clients.focus(&window.id).await?;
            debug!(id = %client.id, url = %client.url, "Focused existing window");
            return Ok(ClickOutcome::Focused { client });
        }

        let client = self.clients.open_window(url).await?;
        Ok(ClickOutcome::Opened { client })
    }
}
