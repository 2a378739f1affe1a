//! Offline cache and push-notification worker
//!
//! Keeps a versioned cache of the application shell up to date, answers
//! page requests from the network or the cache depending on the request
//! kind, and turns push messages into notifications that focus or open a
//! window when clicked.
//!
//! Lifecycle events are routed by the [`Scheduler`] to pure handlers in
//! [`handlers`], which return [`Intent`]s for the [`Executor`] to perform.

pub mod config;
pub mod error;
pub mod event;
pub mod executor;
pub mod handlers;
pub mod host;
pub mod intent;
pub mod network;
pub mod scheduler;
pub mod server;
pub mod strategy;
pub mod surface;
pub mod types;

pub use config::{NotificationConfig, WorkerConfig};
pub use error::{Result, WorkerError};
pub use event::{EventOutcome, WorkerEvent};
pub use executor::{Effect, Executor};
pub use host::{Clients, Network, NotificationSurface};
pub use intent::Intent;
pub use network::ReqwestNetwork;
pub use scheduler::{Scheduler, WorkerHandle};
pub use strategy::{FetchStrategy, RequestMode, StrategyPolicy};
pub use surface::{InMemoryClients, InMemoryNotifications};
pub use types::{
    ActivateReport, ClickOutcome, FetchRequest, FetchResponse, InstallReport, Notification,
    NotificationOptions, NotificationPayload, ResponseSource, WindowClient, WorkerState,
};
