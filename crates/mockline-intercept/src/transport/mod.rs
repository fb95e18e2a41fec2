//! Transport interceptors.
//!
//! Both adapters wrap a real transport and implement the same trait as it,
//! so callers pick mocking by choosing which value to inject. They share a
//! [`MockEngine`] that reads the rule store and reports hits to the relay.

mod fetch;
mod lifecycle;
mod xhr;

pub use fetch::{Fetch, FetchRequest, MockFetch, NetworkFetch};
pub use lifecycle::{ReadyState, XhrEvent};
pub use xhr::{MockXhr, NetworkXhr, XhrHandle, XhrHandler, XhrTransport, XmlHttpRequest};

use crate::config::MockRule;
use crate::matcher::find_matching_rule;
use crate::relay::{InterceptRecord, RelayRequest, TransportKind};
use crate::store::RuleStore;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, info, trace, warn};

/// Rule lookup shared by the fetch and XHR adapters.
#[derive(Clone)]
pub struct MockEngine {
    store: Arc<RuleStore>,
    notifier: Option<mpsc::Sender<RelayRequest>>,
}

impl MockEngine {
    pub fn new(store: Arc<RuleStore>) -> Self {
        Self {
            store,
            notifier: None,
        }
    }

    /// Report every hit to the relay as a `MockRequest`.
    pub fn with_notifier(mut self, notifier: mpsc::Sender<RelayRequest>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn store(&self) -> &Arc<RuleStore> {
        &self.store
    }

    /// Find the rule answering this call, if any.
    pub fn lookup(&self, url: &str, method: &str, transport: TransportKind) -> Option<Arc<MockRule>> {
        trace!("Intercepting {:?} request: {} {}", transport, method, url);

        let state = self.store.current_state();
        if state.is_empty() && self.store.is_initializing() {
            debug!("Rule store is still initializing, passing {} through", url);
        }

        let rule = find_matching_rule(url, method, &state)?;
        info!(
            rule_id = %rule.id,
            "Mocking {:?} request: {} {}",
            transport, method, url
        );
        self.notify(InterceptRecord {
            url: url.to_string(),
            method: method.to_string(),
            rule_id: rule.id.clone(),
            transport,
        });
        Some(rule)
    }

    fn notify(&self, record: InterceptRecord) {
        let Some(notifier) = &self.notifier else {
            return;
        };
        match notifier.try_send(RelayRequest::MockRequest(record)) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => warn!("Relay is busy, dropping mock request notification"),
            Err(TrySendError::Closed(_)) => debug!("Relay is closed, mock request not reported"),
        }
    }
}

/// Upper-cased method, `GET` when blank.
pub(crate) fn normalize_method(method: &str) -> String {
    let method = method.trim();
    if method.is_empty() {
        "GET".to_string()
    } else {
        method.to_ascii_uppercase()
    }
}
