//! Host platform seams: network, notification surface and window clients

use crate::error::Result;
use crate::types::{FetchRequest, Notification, WindowClient};
use async_trait::async_trait;
use shell_cache::ResponseSnapshot;
use url::Url;

/// Outbound HTTP(S) fetch
///
/// Any HTTP status is a successful fetch; only transport failures are errors.
#[async_trait]
pub trait Network: Send + Sync {
    async fn fetch(&self, request: &FetchRequest) -> Result<ResponseSnapshot>;
}

/// Where notifications are rendered
#[async_trait]
pub trait NotificationSurface: Send + Sync {
    /// Display a notification, replacing any with the same tag
    async fn show(&self, notification: Notification) -> Result<()>;

    /// Dismiss the notification with `tag`; returns whether one was shown
    async fn close(&self, tag: &str) -> Result<bool>;

    async fn displayed(&self) -> Vec<Notification>;
}

/// Open windows and tabs in the worker's scope
#[async_trait]
pub trait Clients: Send + Sync {
    async fn match_all(&self, include_uncontrolled: bool) -> Vec<WindowClient>;

    async fn focus(&self, id: &str) -> Result<WindowClient>;

    async fn open_window(&self, url: &Url) -> Result<WindowClient>;

    /// Take control of every uncontrolled window; returns how many changed
    async fn claim(&self) -> usize;
}
