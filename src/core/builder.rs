use std::sync::Arc;

use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;

use super::{config::SupervisorConfig, supervisor::Supervisor};
use crate::{
    events::Bus,
    store::{MemoryStore, Store},
    subscribers::{Subscribe, SubscriberSet},
};

/// Builder for constructing a [`Supervisor`] with optional features.
pub struct SupervisorBuilder {
    cfg: SupervisorConfig,
    subscribers: Vec<Arc<dyn Subscribe>>,
    flags: Option<Arc<dyn Store>>,
}

impl SupervisorBuilder {
    /// Creates a new builder with the given configuration.
    pub fn new(cfg: SupervisorConfig) -> Self {
        Self {
            cfg,
            subscribers: Vec::new(),
            flags: None,
        }
    }

    /// Replaces the configuration.
    pub fn with_config(mut self, cfg: SupervisorConfig) -> Self {
        self.cfg = cfg;
        self
    }

    /// Sets event subscribers.
    ///
    /// Subscribers receive runtime events (registration, failures, joins, shutdown)
    /// through dedicated workers with bounded queues.
    pub fn with_subscribers(mut self, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        self.subscribers = subscribers;
        self
    }

    /// Uses `store` for the cancellation flag.
    ///
    /// Pass a [`FileStore`](crate::FileStore) to share the flag with other processes.
    /// Defaults to a fresh [`MemoryStore`].
    pub fn with_flag_store(mut self, store: Arc<dyn Store>) -> Self {
        self.flags = Some(store);
        self
    }

    /// Builds the supervisor.
    ///
    /// Must be called inside a tokio runtime when subscribers are configured: their
    /// workers and the bus listener are spawned here.
    pub fn build(self) -> Arc<Supervisor> {
        let bus = Bus::new(self.cfg.bus_capacity_clamped());
        let listener_token = CancellationToken::new();

        if !self.subscribers.is_empty() {
            let subs = SubscriberSet::new(self.subscribers, bus.clone());
            spawn_listener(&bus, subs, listener_token.clone());
        }

        let flags = self
            .flags
            .unwrap_or_else(|| Arc::new(MemoryStore::new()) as Arc<dyn Store>);
        Arc::new(Supervisor::new_internal(self.cfg, bus, flags, listener_token))
    }
}

/// Forwards bus events to the subscriber set until `token` is cancelled.
fn spawn_listener(bus: &Bus, subs: SubscriberSet, token: CancellationToken) {
    let mut rx = bus.subscribe();
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                msg = rx.recv() => match msg {
                    Ok(ev) => subs.emit(&ev),
                    Err(RecvError::Lagged(_)) => continue,
                    Err(RecvError::Closed) => break,
                }
            }
        }
        subs.shutdown().await;
    });
}
