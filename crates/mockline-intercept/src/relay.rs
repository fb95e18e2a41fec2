//! Message relay between the page side (interceptors, rule store) and the
//! extension side (persistence).
//!
//! The page side cannot reach persistence directly. It asks for rule
//! snapshots with [`RelayRequest::GetMockRules`] and reports intercepted
//! calls with [`RelayRequest::MockRequest`]; the extension side answers from
//! a [`KeyValueStore`] in [`serve_relay`]. Push updates travel the other way
//! over a plain update channel (see [`crate::store::UpdateSender`]).

use crate::error::RelayError;
use crate::persistence::{get_mock_rules, KeyValueStore};
use crate::store::{RuleSource, UpdateSender};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

/// Which transport an intercepted call came through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    Fetch,
    Xhr,
}

/// Notification that a call was answered by a mock rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InterceptRecord {
    pub url: String,
    pub method: String,
    pub rule_id: String,
    pub transport: TransportKind,
}

#[derive(Debug)]
pub enum RelayRequest {
    GetMockRules { reply: oneshot::Sender<Value> },
    MockRequest(InterceptRecord),
}

/// Page-side end of the relay.
#[derive(Debug, Clone)]
pub struct ChannelRelay {
    tx: mpsc::Sender<RelayRequest>,
}

impl ChannelRelay {
    pub fn new(tx: mpsc::Sender<RelayRequest>) -> Self {
        Self { tx }
    }

    /// Sender for intercept notifications, shared with the interceptors.
    pub fn notifier(&self) -> mpsc::Sender<RelayRequest> {
        self.tx.clone()
    }
}

/// Create a connected relay: the page-side handle and the extension-side receiver.
pub fn channel(buffer: usize) -> (ChannelRelay, mpsc::Receiver<RelayRequest>) {
    let (tx, rx) = mpsc::channel(buffer);
    (ChannelRelay::new(tx), rx)
}

#[async_trait]
impl RuleSource for ChannelRelay {
    async fn fetch_rules(&self) -> Result<Value, RelayError> {
        let (reply, response) = oneshot::channel();
        self.tx
            .send(RelayRequest::GetMockRules { reply })
            .await
            .map_err(|_| RelayError::Disconnected)?;
        let payload = response.await.map_err(|_| RelayError::Disconnected)?;

        debug!("Received data from relay: {}", payload);
        if !payload.is_object() {
            return Err(RelayError::Malformed(format!(
                "expected an object, got {payload}"
            )));
        }
        Ok(payload)
    }
}

/// Extension-side loop: answers rule requests from persistence and logs
/// intercept notifications. Runs until every page-side sender is dropped.
pub async fn serve_relay(store: Arc<dyn KeyValueStore>, mut rx: mpsc::Receiver<RelayRequest>) {
    while let Some(request) = rx.recv().await {
        match request {
            RelayRequest::GetMockRules { reply } => {
                let payload = get_mock_rules(store.as_ref());
                if reply.send(payload).is_err() {
                    debug!("Rule request was abandoned before the reply was sent");
                }
            }
            RelayRequest::MockRequest(record) => {
                info!(
                    url = %record.url,
                    method = %record.method,
                    rule_id = %record.rule_id,
                    transport = ?record.transport,
                    "Mock request intercepted"
                );
            }
        }
    }
    debug!("Relay closed");
}

/// Broadcast the current persisted rules to every connected page as a push
/// update. Returns how many pages received it.
pub fn broadcast_update(store: &dyn KeyValueStore, pages: &[UpdateSender]) -> usize {
    let payload = get_mock_rules(store);
    pages
        .iter()
        .filter(|page| match page.send(payload.clone()) {
            Ok(()) => true,
            Err(_) => {
                warn!("Skipping page that no longer listens for rule updates");
                false
            }
        })
        .count()
}
