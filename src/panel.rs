//! Outliner panel state.
//!
//! The panel never blocks on initialization: it starts in
//! [`PanelState::Loading`], awaits the coordinator, and ends in either
//! `Ready` with rows or `Error` with a message and a retry path. Once ready
//! it subscribes to outliner changes; each change marks the panel stale via
//! the UI dispatcher, and the host calls [`OutlinerPanel::refresh`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use cnc_suite_core::filter::ElementFilter;
use cnc_suite_core::notify::SubscriptionId;

use crate::coordinator::{InitializationCoordinator, Services};
use crate::error::InitError;
use crate::host::UiDispatcher;
use crate::outliner::ElementOutlinerStore;
use crate::view::{element_rows, summary, ElementRow, OutlinerSummary};

#[derive(Debug, Clone, PartialEq)]
pub enum PanelState {
    Loading,
    Ready { rows: Vec<ElementRow> },
    Error { message: String },
}

pub struct OutlinerPanel {
    coordinator: Arc<InitializationCoordinator>,
    dispatcher: Arc<dyn UiDispatcher>,
    state: PanelState,
    filter: ElementFilter,
    stale: Arc<AtomicBool>,
    subscription: Option<(Arc<ElementOutlinerStore>, SubscriptionId)>,
}

impl OutlinerPanel {
    pub fn new(
        coordinator: Arc<InitializationCoordinator>,
        dispatcher: Arc<dyn UiDispatcher>,
    ) -> Self {
        Self {
            coordinator,
            dispatcher,
            state: PanelState::Loading,
            filter: ElementFilter::default(),
            stale: Arc::new(AtomicBool::new(false)),
            subscription: None,
        }
    }

    pub fn state(&self) -> &PanelState {
        &self.state
    }

    /// Wait for the services and render the current rows or the error.
    pub async fn open(&mut self) -> &PanelState {
        self.state = PanelState::Loading;
        let outcome = self.coordinator.ensure_ready().await;
        self.settle(outcome)
    }

    /// Ask the coordinator to retry a failed initialization, then re-render.
    pub async fn retry(&mut self) -> &PanelState {
        self.state = PanelState::Loading;
        let outcome = self.coordinator.retry().await;
        self.settle(outcome)
    }

    fn settle(&mut self, outcome: Result<Services, InitError>) -> &PanelState {
        match outcome {
            Ok(services) => {
                self.attach(services.outliner);
                self.refresh();
            }
            Err(e) => {
                tracing::warn!(error = %e, "outliner panel cannot show elements");
                self.state = PanelState::Error {
                    message: e.to_string(),
                };
            }
        }
        &self.state
    }

    fn attach(&mut self, outliner: Arc<ElementOutlinerStore>) {
        if self.subscription.is_some() {
            return;
        }
        let stale = self.stale.clone();
        let dispatcher = self.dispatcher.clone();
        let id = outliner.subscribe(move |_| {
            let stale = stale.clone();
            dispatcher.post(Box::new(move || stale.store(true, Ordering::SeqCst)));
        });
        self.subscription = Some((outliner, id));
    }

    /// Rebuild rows from the outliner. No-op until the panel is attached.
    pub fn refresh(&mut self) {
        if let Some((outliner, _)) = &self.subscription {
            let rows = element_rows(outliner, &self.filter);
            self.state = PanelState::Ready { rows };
            self.stale.store(false, Ordering::SeqCst);
        }
    }

    /// True when the outliner changed since the last refresh.
    pub fn is_stale(&self) -> bool {
        self.stale.load(Ordering::SeqCst)
    }

    pub fn set_filter(&mut self, filter: ElementFilter) {
        self.filter = filter;
        self.refresh();
    }

    pub fn summary(&self) -> Option<OutlinerSummary> {
        self.subscription.as_ref().map(|(outliner, _)| summary(outliner))
    }

    /// Stop listening for outliner changes.
    pub fn close(&mut self) {
        if let Some((outliner, id)) = self.subscription.take() {
            outliner.unsubscribe(id);
        }
    }
}

impl Drop for OutlinerPanel {
    fn drop(&mut self) {
        self.close();
    }
}
