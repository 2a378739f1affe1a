//! Side effects requested by the pure event handlers

use crate::strategy::FetchStrategy;
use crate::types::{FetchRequest, Notification};
use url::Url;

/// A single effect for the executor to perform
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    /// Activate as soon as install finishes instead of waiting
    SkipWaiting,
    /// Fetch every URL and store the successes in `cache`
    Precache { cache: String, urls: Vec<Url> },
    /// Delete every cache generation except `keep`
    DeleteCachesExcept { keep: String },
    /// Take control of every open window
    ClaimClients,
    /// Answer a request with the given strategy
    Respond {
        request: FetchRequest,
        strategy: FetchStrategy,
        /// Cache that successful live responses are written to
        write_back: Option<String>,
    },
    ShowNotification(Notification),
    CloseNotification { tag: String },
    /// Focus a window already at `url`, or open one
    FocusOrOpenWindow { url: Url },
}
