//! Event scheduler
//!
//! Receives typed lifecycle events over a channel, routes each to its pure
//! handler and runs the resulting intents on a tracked task. An event is
//! only reported as handled once every intent it produced has completed,
//! and `drain` waits for all outstanding tasks before the worker stops.

use crate::config::WorkerConfig;
use crate::error::{Result, WorkerError};
use crate::event::{EventOutcome, WorkerEvent};
use crate::executor::{Effect, Executor};
use crate::handlers;
use crate::intent::Intent;
use crate::strategy::FetchStrategy;
use crate::types::{ActivateReport, FetchRequest, InstallReport, Notification, WorkerState};
use std::future::Future;
use std::sync::{Arc, Mutex};
use tokio::sync::{mpsc, oneshot, RwLock};
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, error, info, warn};

struct Envelope {
    event: WorkerEvent,
    reply: oneshot::Sender<Result<EventOutcome>>,
}

/// Sends events to a running scheduler
#[derive(Clone)]
pub struct WorkerHandle {
    tx: mpsc::Sender<Envelope>,
}

impl WorkerHandle {
    /// Dispatch an event and wait until its work has finished
    pub async fn send(&self, event: WorkerEvent) -> Result<EventOutcome> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Envelope { event, reply })
            .await
            .map_err(|_| WorkerError::Shutdown)?;
        rx.await.map_err(|_| WorkerError::Shutdown)?
    }
}

pub struct Scheduler {
    config: Arc<WorkerConfig>,
    executor: Arc<Executor>,
    state: RwLock<WorkerState>,
    tasks: Mutex<JoinSet<()>>,
}

impl Scheduler {
    pub fn new(config: Arc<WorkerConfig>, executor: Arc<Executor>) -> Arc<Self> {
        Arc::new(Self {
            config,
            executor,
            state: RwLock::new(WorkerState::Parsed),
            tasks: Mutex::new(JoinSet::new()),
        })
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    pub fn executor(&self) -> &Executor {
        &self.executor
    }

    pub async fn state(&self) -> WorkerState {
        *self.state.read().await
    }

    async fn set_state(&self, next: WorkerState) {
        let mut state = self.state.write().await;
        let previous = *state;
        debug!(from = %previous, to = %next, "Worker state change");
        *state = next;
    }

    /// Start the receive loop; it exits and drains once every handle is dropped
    pub fn start(self: &Arc<Self>, buffer: usize) -> (WorkerHandle, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(buffer);
        let scheduler = self.clone();
        let join = tokio::spawn(async move { scheduler.run(rx).await });
        (WorkerHandle { tx }, join)
    }

    async fn run(self: Arc<Self>, mut rx: mpsc::Receiver<Envelope>) {
        while let Some(Envelope { event, reply }) = rx.recv().await {
            let scheduler = self.clone();
            self.track(async move {
                let result = scheduler.handle(event).await;
                // The sender may have stopped waiting; the work still ran to completion
                let _ = reply.send(result);
            });
        }

        info!("Event channel closed, waiting for outstanding work");
        self.drain().await;
    }

    /// Run an event on a tracked task and return a receiver for its outcome
    pub fn dispatch(self: &Arc<Self>, event: WorkerEvent) -> oneshot::Receiver<Result<EventOutcome>> {
        let (reply, rx) = oneshot::channel();
        let scheduler = self.clone();
        self.track(async move {
            let _ = reply.send(scheduler.handle(event).await);
        });
        rx
    }

    fn track<F>(&self, work: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let mut tasks = self.tasks.lock().unwrap_or_else(|e| e.into_inner());
        while let Some(finished) = tasks.try_join_next() {
            if let Err(e) = finished {
                error!("Event task failed: {}", e);
            }
        }
        tasks.spawn(work);
    }

    /// Number of event tasks that have not finished yet
    pub fn pending(&self) -> usize {
        let mut tasks = self.tasks.lock().unwrap_or_else(|e| e.into_inner());
        while tasks.try_join_next().is_some() {}
        tasks.len()
    }

    /// Wait for every tracked task to finish
    pub async fn drain(&self) {
        loop {
            let mut batch = {
                let mut tasks = self.tasks.lock().unwrap_or_else(|e| e.into_inner());
                std::mem::take(&mut *tasks)
            };
            if batch.is_empty() {
                break;
            }
            while let Some(finished) = batch.join_next().await {
                if let Err(e) = finished {
                    error!("Event task failed: {}", e);
                }
            }
        }
    }

    /// Handle one event to completion
    pub async fn handle(&self, event: WorkerEvent) -> Result<EventOutcome> {
        debug!(event = event.kind(), "Handling event");

        match event {
            WorkerEvent::Install => self.install().await.map(EventOutcome::Installed),
            WorkerEvent::Activate => self.activate().await.map(EventOutcome::Activated),
            WorkerEvent::Fetch(request) => self.fetch(request).await,
            WorkerEvent::Push(data) => self.push(data.as_deref()).await,
            WorkerEvent::NotificationClick(notification) => self.click(&notification).await,
        }
    }

    async fn run_intents(&self, intents: Vec<Intent>) -> Result<Vec<Effect>> {
        let mut effects = Vec::with_capacity(intents.len());
        for intent in intents {
            effects.push(self.executor.execute(intent).await?);
        }
        Ok(effects)
    }

    async fn install(&self) -> Result<InstallReport> {
        let current = self.state().await;
        if !current.can_install() {
            return Err(WorkerError::InvalidState {
                expected: "not redundant",
                actual: current,
            });
        }

        self.set_state(WorkerState::Installing).await;

        let effects = match self.run_intents(handlers::on_install(&self.config)).await {
            Ok(effects) => effects,
            Err(e) => {
                error!(error = %e, "Install failed");
                self.set_state(WorkerState::Redundant).await;
                return Err(e);
            }
        };

        let mut report = InstallReport {
            cache: self.config.cache_version.clone(),
            ..Default::default()
        };
        for effect in effects {
            match effect {
                Effect::SkippedWaiting => report.skip_waiting = true,
                Effect::Precached { cached, failed, .. } => {
                    report.cached = cached;
                    report.failed = failed;
                }
                _ => {}
            }
        }

        self.set_state(WorkerState::Installed).await;
        info!(
            cache = %report.cache,
            cached = report.cached.len(),
            failed = report.failed.len(),
            "Worker installed"
        );

        if report.skip_waiting {
            report.activated = Some(self.activate().await?);
        } else {
            info!("Worker installed, waiting for activation");
        }

        Ok(report)
    }

    async fn activate(&self) -> Result<ActivateReport> {
        let current = self.state().await;
        if !current.can_activate() {
            return Err(WorkerError::InvalidState {
                expected: "installed",
                actual: current,
            });
        }

        self.set_state(WorkerState::Activating).await;
        let effects = self.run_intents(handlers::on_activate(&self.config)).await?;

        let mut report = ActivateReport {
            cache: self.config.cache_version.clone(),
            ..Default::default()
        };
        for effect in effects {
            match effect {
                Effect::Deleted(names) => report.deleted = names,
                Effect::Claimed(count) => report.claimed = count,
                _ => {}
            }
        }

        self.set_state(WorkerState::Activated).await;
        info!(
            cache = %report.cache,
            deleted = report.deleted.len(),
            claimed = report.claimed,
            "Worker activated and clients claimed"
        );
        Ok(report)
    }

    async fn fetch(&self, request: FetchRequest) -> Result<EventOutcome> {
        let intent = if self.state().await.can_intercept_fetch() {
            handlers::on_fetch(&self.config, request)
        } else {
            // Not in control yet: the page talks to the network directly
            Intent::Respond {
                request,
                strategy: FetchStrategy::NetworkOnly,
                write_back: None,
            }
        };

        match self.executor.execute(intent).await? {
            Effect::Responded(response) => Ok(EventOutcome::Responded(response)),
            other => Err(WorkerError::Network(format!(
                "fetch produced no response: {:?}",
                other
            ))),
        }
    }

    async fn push(&self, data: Option<&[u8]>) -> Result<EventOutcome> {
        let intent = handlers::on_push(&self.config, data);

        match self.executor.execute(intent).await? {
            Effect::Shown(notification) => Ok(EventOutcome::Displayed(notification)),
            other => Err(WorkerError::Notification(format!(
                "push produced no notification: {:?}",
                other
            ))),
        }
    }

    async fn click(&self, notification: &Notification) -> Result<EventOutcome> {
        let effects = self
            .run_intents(handlers::on_notification_click(&self.config, notification))
            .await?;

        for effect in effects {
            match effect {
                Effect::Window(outcome) => return Ok(EventOutcome::Clicked(outcome)),
                Effect::Closed(false) => {
                    warn!(tag = %notification.options.tag, "Clicked notification was not displayed")
                }
                _ => {}
            }
        }

        Err(WorkerError::Client("click produced no window".to_string()))
    }
}
