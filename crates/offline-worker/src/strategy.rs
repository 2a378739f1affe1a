//! Fetch strategies and the policy that picks one per request

use crate::error::WorkerError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// How a request is answered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FetchStrategy {
    /// Live fetch, cached copy when the network fails
    NetworkFirst,
    /// Cached copy, live fetch on a miss
    CacheFirst,
    NetworkOnly,
    CacheOnly,
}

impl fmt::Display for FetchStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchStrategy::NetworkFirst => write!(f, "network-first"),
            FetchStrategy::CacheFirst => write!(f, "cache-first"),
            FetchStrategy::NetworkOnly => write!(f, "network-only"),
            FetchStrategy::CacheOnly => write!(f, "cache-only"),
        }
    }
}

impl FromStr for FetchStrategy {
    type Err = WorkerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "network-first" => Ok(FetchStrategy::NetworkFirst),
            "cache-first" => Ok(FetchStrategy::CacheFirst),
            "network-only" => Ok(FetchStrategy::NetworkOnly),
            "cache-only" => Ok(FetchStrategy::CacheOnly),
            other => Err(WorkerError::Config(format!(
                "unknown fetch strategy: {}",
                other
            ))),
        }
    }
}

/// Whether a request is a top-level document load or a subresource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestMode {
    Navigate,
    Subresource,
}

/// Strategy selection per request class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StrategyPolicy {
    pub navigation: FetchStrategy,
    pub subresource: FetchStrategy,
    /// Store successful live responses into the current cache
    pub write_back: bool,
}

impl StrategyPolicy {
    pub fn strategy_for(&self, mode: RequestMode) -> FetchStrategy {
        match mode {
            RequestMode::Navigate => self.navigation,
            RequestMode::Subresource => self.subresource,
        }
    }
}

impl Default for StrategyPolicy {
    fn default() -> Self {
        Self {
            navigation: FetchStrategy::NetworkFirst,
            subresource: FetchStrategy::CacheFirst,
            write_back: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_policy_splits_by_mode() {
        let policy = StrategyPolicy::default();
        assert_eq!(
            policy.strategy_for(RequestMode::Navigate),
            FetchStrategy::NetworkFirst
        );
        assert_eq!(
            policy.strategy_for(RequestMode::Subresource),
            FetchStrategy::CacheFirst
        );
        assert!(!policy.write_back);
    }

    #[test]
    fn test_strategy_parsing() {
        assert_eq!(
            "network-first".parse::<FetchStrategy>().unwrap(),
            FetchStrategy::NetworkFirst
        );
        assert_eq!(
            "Cache_First".parse::<FetchStrategy>().unwrap(),
            FetchStrategy::CacheFirst
        );
        assert_eq!(
            " cache-only ".parse::<FetchStrategy>().unwrap(),
            FetchStrategy::CacheOnly
        );
        assert!("fastest".parse::<FetchStrategy>().is_err());
    }

    #[test]
    fn test_strategy_display_parses_back() {
        for strategy in [
            FetchStrategy::NetworkFirst,
            FetchStrategy::CacheFirst,
            FetchStrategy::NetworkOnly,
            FetchStrategy::CacheOnly,
        ] {
            assert_eq!(strategy.to_string().parse::<FetchStrategy>().unwrap(), strategy);
        }
    }

    #[test]
    fn test_strategy_serialization() {
        let json = serde_json::to_string(&FetchStrategy::CacheFirst).unwrap();
        assert_eq!(json, "\"cache-first\"");
    }
}
