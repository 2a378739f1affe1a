//! Lifecycle events delivered to the worker and what handling them produced

use crate::types::{
    ActivateReport, ClickOutcome, FetchRequest, FetchResponse, InstallReport, Notification,
};

/// Events dispatched to the worker by its host
#[derive(Debug, Clone)]
pub enum WorkerEvent {
    /// Populate the current cache generation
    Install,
    /// Drop stale generations and take control of open windows
    Activate,
    /// An outgoing request from a controlled page
    Fetch(FetchRequest),
    /// A push message with its raw payload, if any
    Push(Option<Vec<u8>>),
    /// The user clicked a displayed notification
    NotificationClick(Notification),
}

impl WorkerEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            WorkerEvent::Install => "install",
            WorkerEvent::Activate => "activate",
            WorkerEvent::Fetch(_) => "fetch",
            WorkerEvent::Push(_) => "push",
            WorkerEvent::NotificationClick(_) => "notificationclick",
        }
    }
}

/// Result of a fully handled event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventOutcome {
    Installed(InstallReport),
    Activated(ActivateReport),
    Responded(FetchResponse),
    Displayed(Notification),
    Clicked(ClickOutcome),
}
