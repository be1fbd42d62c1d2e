// SPDX-FileCopyrightText: 2026 Wuzzy Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Assembly of an [`Analytics`] service from configuration.
//!
//! Every collaborator defaults to the production implementation selected by
//! [`WuzzyConfig`]; tests replace them one at a time.

use std::sync::Arc;

use tracing::{debug, info};
use wuzzy_client::AnalyticsClient;
use wuzzy_config::WuzzyConfig;
use wuzzy_core::{AnalyticsError, AnalyticsTransport, Clock, KeyValueStore, Scheduler, SystemClock};
use wuzzy_queue::{DeliveryQueue, TokioScheduler};
use wuzzy_session::{ClientIdentity, SessionManager};
use wuzzy_storage::StateStore;

use crate::analytics::Analytics;

enum TransportChoice {
    FromConfig,
    Custom(Arc<dyn AnalyticsTransport>),
    Disabled,
}

/// Builder for [`Analytics`].
pub struct AnalyticsBuilder {
    config: WuzzyConfig,
    store: Option<Arc<dyn KeyValueStore>>,
    transport: TransportChoice,
    clock: Option<Arc<dyn Clock>>,
    scheduler: Option<Arc<dyn Scheduler>>,
}

impl AnalyticsBuilder {
    pub(crate) fn new(config: WuzzyConfig) -> Self {
        Self {
            config,
            store: None,
            transport: TransportChoice::FromConfig,
            clock: None,
            scheduler: None,
        }
    }

    /// Use `store` instead of opening the configured backend.
    pub fn with_store(mut self, store: Arc<dyn KeyValueStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Use `transport` instead of an HTTP client for the configured URL.
    pub fn with_transport(mut self, transport: Arc<dyn AnalyticsTransport>) -> Self {
        self.transport = TransportChoice::Custom(transport);
        self
    }

    /// Never contact the analytics API, whatever the configuration says.
    pub fn without_transport(mut self) -> Self {
        self.transport = TransportChoice::Disabled;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Use `scheduler` for queue timers. Without one, a [`TokioScheduler`] is
    /// created and [`Analytics::spawn_timer_driver`] must be called to run it.
    pub fn with_scheduler(mut self, scheduler: Arc<dyn Scheduler>) -> Self {
        self.scheduler = Some(scheduler);
        self
    }

    pub fn build(self) -> Result<Analytics, AnalyticsError> {
        let store = match self.store {
            Some(store) => store,
            None => wuzzy_storage::open_store(&self.config.storage)?,
        };
        let state = StateStore::new(store);

        let transport: Option<Arc<dyn AnalyticsTransport>> = match self.transport {
            TransportChoice::FromConfig => AnalyticsClient::from_config(&self.config.analytics)?
                .map(|client| Arc::new(client) as Arc<dyn AnalyticsTransport>),
            TransportChoice::Custom(transport) => Some(transport),
            TransportChoice::Disabled => None,
        };
        if transport.is_none() {
            info!("analytics API not configured, events stay local");
        }

        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
        let (scheduler, fired) = match self.scheduler {
            Some(scheduler) => (scheduler, None),
            None => {
                let (scheduler, fired) = TokioScheduler::new();
                (Arc::new(scheduler) as Arc<dyn Scheduler>, Some(fired))
            }
        };

        let session = Arc::new(SessionManager::new(
            state.clone(),
            transport.clone(),
            ClientIdentity::from_config(&self.config.analytics),
            clock.clone(),
        ));
        let queue = DeliveryQueue::new(
            self.config.queue.clone(),
            state,
            transport,
            scheduler,
            clock.clone(),
        )
        .with_session_renewal(session.clone());

        debug!(
            batch_size = self.config.queue.batch_size,
            max_queue_size = self.config.queue.max_queue_size,
            "analytics service assembled"
        );
        Ok(Analytics::from_parts(session, Arc::new(queue), clock, fired))
    }
}
