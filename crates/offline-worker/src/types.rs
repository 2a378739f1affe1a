//! Core types for the offline worker

use crate::strategy::RequestMode;
use serde::{Deserialize, Serialize};
use shell_cache::{GenerationStats, ResponseSnapshot};
use std::fmt;
use url::Url;

pub const DEFAULT_NOTIFICATION_TITLE: &str = "New Notification";
pub const DEFAULT_NOTIFICATION_BODY: &str = "Check app for details.";
pub const DEFAULT_NOTIFICATION_URL: &str = "/";

/// Worker lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkerState {
    Parsed,
    Installing,
    Installed,
    Activating,
    Activated,
    /// Install failed hard; further lifecycle events are rejected
    Redundant,
}

impl WorkerState {
    pub fn can_intercept_fetch(&self) -> bool {
        matches!(self, WorkerState::Activated)
    }

    pub fn can_install(&self) -> bool {
        !matches!(self, WorkerState::Redundant)
    }

    pub fn can_activate(&self) -> bool {
        matches!(
            self,
            WorkerState::Installed | WorkerState::Activating | WorkerState::Activated
        )
    }
}

impl fmt::Display for WorkerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkerState::Parsed => write!(f, "parsed"),
            WorkerState::Installing => write!(f, "installing"),
            WorkerState::Installed => write!(f, "installed"),
            WorkerState::Activating => write!(f, "activating"),
            WorkerState::Activated => write!(f, "activated"),
            WorkerState::Redundant => write!(f, "redundant"),
        }
    }
}

/// Cache key for a URL: the URL without its fragment
pub fn cache_url(url: &Url) -> String {
    let mut url = url.clone();
    url.set_fragment(None);
    url.to_string()
}

/// An intercepted outgoing request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    pub url: Url,
    pub method: String,
    pub mode: RequestMode,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl FetchRequest {
    pub fn get(url: Url, mode: RequestMode) -> Self {
        Self {
            url,
            method: "GET".to_string(),
            mode,
            headers: Vec::new(),
            body: Vec::new(),
        }
    }

    pub fn navigate(url: Url) -> Self {
        Self::get(url, RequestMode::Navigate)
    }

    pub fn subresource(url: Url) -> Self {
        Self::get(url, RequestMode::Subresource)
    }

    /// Only GET requests are read from or written to the cache
    pub fn is_cacheable(&self) -> bool {
        self.method.eq_ignore_ascii_case("GET")
    }

    pub fn cache_url(&self) -> String {
        cache_url(&self.url)
    }
}

/// Where a served response came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseSource {
    Network,
    Cache,
}

/// The response handed back to the page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchResponse {
    pub snapshot: ResponseSnapshot,
    pub source: ResponseSource,
}

impl FetchResponse {
    pub fn network(snapshot: ResponseSnapshot) -> Self {
        Self {
            snapshot,
            source: ResponseSource::Network,
        }
    }

    pub fn cache(snapshot: ResponseSnapshot) -> Self {
        Self {
            snapshot,
            source: ResponseSource::Cache,
        }
    }
}

/// Title, body and click target resolved from a push payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationPayload {
    pub title: String,
    pub body: String,
    pub url: String,
}

impl Default for NotificationPayload {
    fn default() -> Self {
        Self {
            title: DEFAULT_NOTIFICATION_TITLE.to_string(),
            body: DEFAULT_NOTIFICATION_BODY.to_string(),
            url: DEFAULT_NOTIFICATION_URL.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationData {
    pub url: String,
}

/// Display configuration handed to the notification surface
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationOptions {
    pub body: String,
    pub icon: String,
    pub badge: String,
    pub vibrate: Vec<u32>,
    pub data: NotificationData,
    /// Notifications with the same tag replace each other
    pub tag: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub title: String,
    #[serde(flatten)]
    pub options: NotificationOptions,
}

/// An open window or tab
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowClient {
    pub id: String,
    pub url: Url,
    pub focused: bool,
    /// Whether this worker controls the window's fetches
    pub controlled: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedAsset {
    pub url: String,
    pub error: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallReport {
    pub cache: String,
    pub cached: Vec<String>,
    pub failed: Vec<FailedAsset>,
    pub skip_waiting: bool,
    /// Set when skip-waiting activated the worker right after install
    #[serde(skip_serializing_if = "Option::is_none")]
    pub activated: Option<ActivateReport>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivateReport {
    pub cache: String,
    pub deleted: Vec<String>,
    pub claimed: usize,
}

/// What a notification click did
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "lowercase")]
pub enum ClickOutcome {
    Focused { client: WindowClient },
    Opened { client: WindowClient },
}

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub uptime_secs: u64,
    pub state: WorkerState,
    pub cache_version: String,
    pub caches: Vec<GenerationStats>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_payload() {
        let payload = NotificationPayload::default();
        assert_eq!(payload.title, "New Notification");
        assert_eq!(payload.body, "Check app for details.");
        assert_eq!(payload.url, "/");
    }

    #[test]
    fn test_cache_url_strips_fragment() {
        let url = Url::parse("http://localhost:8080/staff/tickets?page=2#top").unwrap();
        assert_eq!(cache_url(&url), "http://localhost:8080/staff/tickets?page=2");
    }

    #[test]
    fn test_only_get_is_cacheable() {
        let url = Url::parse("http://localhost:8080/api/tickets").unwrap();
        let mut request = FetchRequest::subresource(url);
        assert!(request.is_cacheable());

        request.method = "POST".to_string();
        assert!(!request.is_cacheable());
    }

    #[test]
    fn test_worker_state_transitions() {
        assert!(!WorkerState::Installing.can_intercept_fetch());
        assert!(WorkerState::Activated.can_intercept_fetch());
        assert!(!WorkerState::Parsed.can_activate());
        assert!(WorkerState::Installed.can_activate());
        assert!(!WorkerState::Redundant.can_activate());
        assert!(WorkerState::Activated.can_install());
        assert!(!WorkerState::Redundant.can_install());
    }

    #[test]
    fn test_notification_serialization_is_flat() {
        let notification = Notification {
            title: "Ticket assigned".to_string(),
            options: NotificationOptions {
                body: "INC-42 needs attention".to_string(),
                icon: "/static/icon.png".to_string(),
                badge: "/static/badge.png".to_string(),
                vibrate: vec![100, 50, 100],
                data: NotificationData {
                    url: "/staff/tickets/42".to_string(),
                },
                tag: "it-ops-notification".to_string(),
            },
        };

        let json = serde_json::to_value(&notification).unwrap();
        assert_eq!(json["title"], "Ticket assigned");
        assert_eq!(json["body"], "INC-42 needs attention");
        assert_eq!(json["data"]["url"], "/staff/tickets/42");
        assert_eq!(json["vibrate"], serde_json::json!([100, 50, 100]));
    }

    #[test]
    fn test_click_outcome_is_tagged() {
        let outcome = ClickOutcome::Opened {
            client: WindowClient {
                id: "1".to_string(),
                url: Url::parse("http://localhost:8080/").unwrap(),
                focused: true,
                controlled: true,
            },
        };

        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["action"], "opened");
        assert_eq!(json["client"]["url"], "http://localhost:8080/");
    }
}
