//! In-process notification and window surfaces
//!
//! The HTTP host has no real desktop to draw on, so notifications and
//! windows are tracked in memory and exposed over its endpoints.

use crate::error::{Result, WorkerError};
use crate::host::{Clients, NotificationSurface};
use crate::types::{Notification, WindowClient};
use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::RwLock;
use tracing::{debug, info};
use url::Url;

/// Notifications currently on screen, one per tag
#[derive(Default)]
pub struct InMemoryNotifications {
    shown: RwLock<Vec<Notification>>,
}

impl InMemoryNotifications {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn find(&self, tag: &str) -> Option<Notification> {
        self.shown
            .read()
            .await
            .iter()
            .find(|n| n.options.tag == tag)
            .cloned()
    }
}

#[async_trait]
impl NotificationSurface for InMemoryNotifications {
    async fn show(&self, notification: Notification) -> Result<()> {
        let mut shown = self.shown.write().await;
        shown.retain(|n| n.options.tag != notification.options.tag);
        info!(
            title = %notification.title,
            tag = %notification.options.tag,
            "Notification displayed"
        );
        shown.push(notification);
        Ok(())
    }

    async fn close(&self, tag: &str) -> Result<bool> {
        let mut shown = self.shown.write().await;
        let before = shown.len();
        shown.retain(|n| n.options.tag != tag);
        Ok(shown.len() != before)
    }

    async fn displayed(&self) -> Vec<Notification> {
        self.shown.read().await.clone()
    }
}

/// Open windows, in the order they were opened
#[derive(Default)]
pub struct InMemoryClients {
    windows: RwLock<Vec<WindowClient>>,
    next_id: AtomicU64,
}

impl InMemoryClients {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_id(&self) -> String {
        (self.next_id.fetch_add(1, Ordering::Relaxed) + 1).to_string()
    }

    /// Record a window the host already has open
    pub async fn register(&self, url: Url, controlled: bool) -> WindowClient {
        let client = WindowClient {
            id: self.next_id(),
            url,
            focused: false,
            controlled,
        };
        self.windows.write().await.push(client.clone());
        debug!(id = %client.id, url = %client.url, controlled, "Window registered");
        client
    }
}

#[async_trait]
impl Clients for InMemoryClients {
    async fn match_all(&self, include_uncontrolled: bool) -> Vec<WindowClient> {
        self.windows
            .read()
            .await
            .iter()
            .filter(|w| include_uncontrolled || w.controlled)
            .cloned()
            .collect()
    }

    async fn focus(&self, id: &str) -> Result<WindowClient> {
        let mut windows = self.windows.write().await;
        if !windows.iter().any(|w| w.id == id) {
            return Err(WorkerError::Client(format!("no window with id {}", id)));
        }

        let mut focused = None;
        for window in windows.iter_mut() {
            window.focused = window.id == id;
            if window.focused {
                focused = Some(window.clone());
            }
        }
        focused.ok_or_else(|| WorkerError::Client(format!("no window with id {}", id)))
    }

    async fn open_window(&self, url: &Url) -> Result<WindowClient> {
        let mut windows = self.windows.write().await;
        for window in windows.iter_mut() {
            window.focused = false;
        }

        let client = WindowClient {
            id: self.next_id(),
            url: url.clone(),
            focused: true,
            controlled: true,
        };
        windows.push(client.clone());
        info!(id = %client.id, url = %client.url, "Window opened");
        Ok(client)
    }

    async fn claim(&self) -> usize {
        let mut windows = self.windows.write().await;
        let mut claimed = 0;
        for window in windows.iter_mut().filter(|w| !w.controlled) {
            window.controlled = true;
            claimed += 1;
        }
        claimed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{NotificationData, NotificationOptions};

    fn notification(title: &str, tag: &str) -> Notification {
        Notification {
            title: title.to_string(),
            options: NotificationOptions {
                body: "body".to_string(),
                icon: "icon".to_string(),
                badge: "badge".to_string(),
                vibrate: vec![100, 50, 100],
                data: NotificationData {
                    url: "/".to_string(),
                },
                tag: tag.to_string(),
            },
        }
    }

    fn url(path: &str) -> Url {
        Url::parse("http://localhost:8080").unwrap().join(path).unwrap()
    }

    #[tokio::test]
    async fn test_same_tag_replaces() {
        let surface = InMemoryNotifications::new();
        surface.show(notification("first", "ops")).await.unwrap();
        surface.show(notification("second", "ops")).await.unwrap();
        surface.show(notification("other", "billing")).await.unwrap();

        let shown = surface.displayed().await;
        assert_eq!(shown.len(), 2);
        assert_eq!(surface.find("ops").await.unwrap().title, "second");
    }

    #[tokio::test]
    async fn test_close_by_tag() {
        let surface = InMemoryNotifications::new();
        surface.show(notification("first", "ops")).await.unwrap();

        assert!(surface.close("ops").await.unwrap());
        assert!(!surface.close("ops").await.unwrap());
        assert!(surface.displayed().await.is_empty());
    }

    #[tokio::test]
    async fn test_match_all_respects_control() {
        let clients = InMemoryClients::new();
        clients.register(url("/"), true).await;
        clients.register(url("/staff"), false).await;

        assert_eq!(clients.match_all(false).await.len(), 1);
        assert_eq!(clients.match_all(true).await.len(), 2);
    }

    #[tokio::test]
    async fn test_claim_controls_every_window() {
        let clients = InMemoryClients::new();
        clients.register(url("/"), false).await;
        clients.register(url("/staff"), false).await;
        clients.register(url("/manager"), true).await;

        assert_eq!(clients.claim().await, 2);
        assert_eq!(clients.claim().await, 0);
        assert_eq!(clients.match_all(false).await.len(), 3);
    }

    #[tokio::test]
    async fn test_focus_moves_focus() {
        let clients = InMemoryClients::new();
        let a = clients.register(url("/a"), true).await;
        let b = clients.register(url("/b"), true).await;

        clients.focus(&a.id).await.unwrap();
        let focused = clients.focus(&b.id).await.unwrap();
        assert!(focused.focused);

        let all = clients.match_all(true).await;
        assert_eq!(all.iter().filter(|w| w.focused).count(), 1);
        assert!(clients.focus("missing").await.is_err());
    }

    #[tokio::test]
    async fn test_open_window_is_focused_and_controlled() {
        let clients = InMemoryClients::new();
        let opened = clients.open_window(&url("/consumer")).await.unwrap();

        assert!(opened.focused);
        assert!(opened.controlled);
        assert_eq!(clients.match_all(false).await, vec![opened]);
    }
}
