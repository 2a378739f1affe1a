//! Pure event handlers
//!
//! Each handler looks only at the configuration and the event payload and
//! returns the intents the executor should carry out. None of them touch
//! the network, the cache or the notification surface directly.

use crate::config::WorkerConfig;
use crate::intent::Intent;
use crate::strategy::FetchStrategy;
use crate::types::{
    FetchRequest, Notification, NotificationData, NotificationOptions, NotificationPayload,
};
use serde_json::Value;

pub fn on_install(config: &WorkerConfig) -> Vec<Intent> {
    let mut intents = Vec::with_capacity(2);
    if config.skip_waiting {
        intents.push(Intent::SkipWaiting);
    }
    intents.push(Intent::Precache {
        cache: config.cache_version.clone(),
        urls: config.assets.clone(),
    });
    intents
}

pub fn on_activate(config: &WorkerConfig) -> Vec<Intent> {
    vec![
        Intent::DeleteCachesExcept {
            keep: config.cache_version.clone(),
        },
        Intent::ClaimClients,
    ]
}

pub fn on_fetch(config: &WorkerConfig, request: FetchRequest) -> Intent {
    if !request.is_cacheable() {
        return Intent::Respond {
            request,
            strategy: FetchStrategy::NetworkOnly,
            write_back: None,
        };
    }

    let strategy = config.policy.strategy_for(request.mode);
    let write_back = match strategy {
        FetchStrategy::NetworkFirst | FetchStrategy::CacheFirst if config.policy.write_back => {
            Some(config.cache_version.clone())
        }
        _ => None,
    };

    Intent::Respond {
        request,
        strategy,
        write_back,
    }
}

/// Resolve a push payload into notification content
///
/// A JSON object overrides the defaults field by field. Anything else that
/// carries text becomes the body. Missing or blank data yields the defaults.
pub fn parse_push_payload(data: Option<&[u8]>) -> NotificationPayload {
    let mut payload = NotificationPayload::default();

    let Some(data) = data else {
        return payload;
    };

    match serde_json::from_slice::<Value>(data) {
        Ok(Value::Object(fields)) => {
            let field = |name: &str| {
                fields
                    .get(name)
                    .and_then(Value::as_str)
                    .map(str::to_string)
            };
            if let Some(title) = field("title") {
                payload.title = title;
            }
            if let Some(body) = field("body") {
                payload.body = body;
            }
            if let Some(url) = field("url") {
                payload.url = url;
            }
        }
        _ => {
            let text = String::from_utf8_lossy(data);
            if !text.trim().is_empty() {
                payload.body = text.into_owned();
            }
        }
    }

    payload
}

pub fn on_push(config: &WorkerConfig, data: Option<&[u8]>) -> Intent {
    let payload = parse_push_payload(data);

    Intent::ShowNotification(Notification {
        title: payload.title,
        options: NotificationOptions {
            body: payload.body,
            icon: config.notification.icon.clone(),
            badge: config.notification.badge.clone(),
            vibrate: config.notification.vibrate.clone(),
            data: NotificationData { url: payload.url },
            tag: config.notification.tag.clone(),
        },
    })
}

pub fn on_notification_click(config: &WorkerConfig, notification: &Notification) -> Vec<Intent> {
    vec![
        Intent::CloseNotification {
            tag: notification.options.tag.clone(),
        },
        Intent::FocusOrOpenWindow {
            url: config.resolve(&notification.options.data.url),
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::RequestMode;
    use url::Url;

    fn config() -> WorkerConfig {
        WorkerConfig::new(Url::parse("http://localhost:8080").unwrap(), "it-ops-v2")
    }

    fn shown(intent: Intent) -> Notification {
        match intent {
            Intent::ShowNotification(n) => n,
            other => panic!("expected ShowNotification, got {:?}", other),
        }
    }

    #[test]
    fn test_install_skips_waiting_then_precaches() {
        let config = config();
        let intents = on_install(&config);

        assert_eq!(intents[0], Intent::SkipWaiting);
        match &intents[1] {
            Intent::Precache { cache, urls } => {
                assert_eq!(cache, "it-ops-v2");
                assert_eq!(urls, &config.assets);
            }
            other => panic!("unexpected intent {:?}", other),
        }
    }

    #[test]
    fn test_install_without_skip_waiting() {
        let mut config = config();
        config.skip_waiting = false;

        let intents = on_install(&config);
        assert_eq!(intents.len(), 1);
        assert!(matches!(intents[0], Intent::Precache { .. }));
    }

    #[test]
    fn test_activate_keeps_current_version() {
        let intents = on_activate(&config());
        assert_eq!(
            intents,
            vec![
                Intent::DeleteCachesExcept {
                    keep: "it-ops-v2".to_string()
                },
                Intent::ClaimClients,
            ]
        );
    }

    #[test]
    fn test_fetch_navigation_is_network_first() {
        let config = config();
        let request = FetchRequest::navigate(config.resolve("/staff"));

        match on_fetch(&config, request) {
            Intent::Respond {
                strategy,
                write_back,
                ..
            } => {
                assert_eq!(strategy, FetchStrategy::NetworkFirst);
                assert_eq!(write_back, None);
            }
            other => panic!("unexpected intent {:?}", other),
        }
    }

    #[test]
    fn test_fetch_asset_is_cache_first_with_write_back() {
        let mut config = config();
        config.policy.write_back = true;
        let request = FetchRequest::subresource(config.resolve("/static/app.js"));

        match on_fetch(&config, request) {
            Intent::Respond {
                request,
                strategy,
                write_back,
            } => {
                assert_eq!(request.mode, RequestMode::Subresource);
                assert_eq!(strategy, FetchStrategy::CacheFirst);
                assert_eq!(write_back.as_deref(), Some("it-ops-v2"));
            }
            other => panic!("unexpected intent {:?}", other),
        }
    }

    #[test]
    fn test_fetch_non_get_bypasses_cache() {
        let mut config = config();
        config.policy.write_back = true;
        let mut request = FetchRequest::navigate(config.resolve("/auth/login"));
        request.method = "POST".to_string();

        match on_fetch(&config, request) {
            Intent::Respond {
                strategy,
                write_back,
                ..
            } => {
                assert_eq!(strategy, FetchStrategy::NetworkOnly);
                assert_eq!(write_back, None);
            }
            other => panic!("unexpected intent {:?}", other),
        }
    }

    #[test]
    fn test_push_structured_payload() {
        let data = br#"{"title":"X","body":"Y","url":"/z"}"#;
        let notification = shown(on_push(&config(), Some(data.as_slice())));

        assert_eq!(notification.title, "X");
        assert_eq!(notification.options.body, "Y");
        assert_eq!(notification.options.data.url, "/z");
        assert_eq!(notification.options.vibrate, vec![100, 50, 100]);
        assert_eq!(notification.options.tag, "it-ops-notification");
    }

    #[test]
    fn test_push_plain_text_payload() {
        let notification = shown(on_push(&config(), Some(b"hello".as_slice())));

        assert_eq!(notification.title, "New Notification");
        assert_eq!(notification.options.body, "hello");
        assert_eq!(notification.options.data.url, "/");
    }

    #[test]
    fn test_push_without_payload_uses_defaults() {
        let notification = shown(on_push(&config(), None));

        assert_eq!(notification.title, "New Notification");
        assert_eq!(notification.options.body, "Check app for details.");
        assert_eq!(notification.options.data.url, "/");
    }

    #[test]
    fn test_push_partial_payload_keeps_defaults() {
        let payload = parse_push_payload(Some(br#"{"title":"Outage","url":null}"#.as_slice()));

        assert_eq!(payload.title, "Outage");
        assert_eq!(payload.body, "Check app for details.");
        assert_eq!(payload.url, "/");
    }

    #[test]
    fn test_push_json_scalar_is_plain_text() {
        let payload = parse_push_payload(Some(b"42".as_slice()));
        assert_eq!(payload.body, "42");
        assert_eq!(payload.title, "New Notification");
    }

    #[test]
    fn test_push_blank_payload_uses_defaults() {
        let payload = parse_push_payload(Some(b"  \n".as_slice()));
        assert_eq!(payload, NotificationPayload::default());
    }

    #[test]
    fn test_click_closes_then_targets_resolved_url() {
        let config = config();
        let notification = shown(on_push(&config, Some(br#"{"url":"/staff/tickets/7"}"#.as_slice())));

        let intents = on_notification_click(&config, &notification);
        assert_eq!(
            intents,
            vec![
                Intent::CloseNotification {
                    tag: "it-ops-notification".to_string()
                },
                Intent::FocusOrOpenWindow {
                    url: Url::parse("http://localhost:8080/staff/tickets/7").unwrap()
                },
            ]
        );
    }
}
