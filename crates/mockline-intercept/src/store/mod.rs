//! Rule store - the in-memory mirror of the persisted rule table.
//!
//! The store starts empty and disabled, so interceptors can be installed
//! before the first snapshot arrives. Snapshots are fetched through a
//! [`RuleSource`] with a hard timeout, refreshed periodically, and replaced
//! immediately when a push update arrives. Every write swaps the whole
//! `Arc<MockState>`; readers see either the old or the new snapshot.

mod normalize;

pub use normalize::{normalize_payload, normalize_rules};
pub(crate) use normalize::is_truthy;

use crate::config::{RefreshSettings, RelaySettings};
use crate::error::RelayError;
use crate::matcher::MockState;
use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// Where rule snapshots come from (the relay to the persistence side).
#[async_trait]
pub trait RuleSource: Send + Sync {
    /// Fetch the raw `{mockRules, isEnabled}` payload.
    async fn fetch_rules(&self) -> Result<Value, RelayError>;
}

/// Receiving side of push updates (`MOCK_DATA_UPDATED` payloads).
pub type UpdateReceiver = mpsc::UnboundedReceiver<Value>;
pub type UpdateSender = mpsc::UnboundedSender<Value>;

pub struct RuleStore {
    state: RwLock<Arc<MockState>>,
    source: Arc<dyn RuleSource>,
    relay: RelaySettings,
    refresh: RefreshSettings,
    created_at: Instant,
}

impl RuleStore {
    pub fn new(
        source: Arc<dyn RuleSource>,
        relay: RelaySettings,
        refresh: RefreshSettings,
    ) -> Arc<Self> {
        Arc::new(Self {
            state: RwLock::new(Arc::new(MockState::disabled())),
            source,
            relay,
            refresh,
            created_at: Instant::now(),
        })
    }

    /// Last known snapshot. Never blocks on the relay.
    pub fn current_state(&self) -> Arc<MockState> {
        Arc::clone(&self.state.read())
    }

    /// Swap in a new snapshot.
    pub fn replace(&self, state: MockState) -> Arc<MockState> {
        let state = Arc::new(state);
        *self.state.write() = Arc::clone(&state);
        state
    }

    /// True while inside the startup grace window. Only used for diagnostics:
    /// an empty rule set never matches, loading or not.
    pub fn is_initializing(&self) -> bool {
        self.created_at.elapsed() < self.refresh.init_grace()
    }

    /// Fetch the latest snapshot and install it. Timeouts and relay failures
    /// install the empty, disabled state instead.
    pub async fn refresh(&self) -> Arc<MockState> {
        let timeout = self.relay.timeout();
        let fetched = match tokio::time::timeout(timeout, self.source.fetch_rules()).await {
            Ok(result) => result,
            Err(_) => Err(RelayError::Timeout(timeout)),
        };

        let state = match fetched {
            Ok(payload) => normalize_payload(&payload),
            Err(e) => {
                warn!("Failed to get mock rules, falling back to disabled: {}", e);
                MockState::disabled()
            }
        };

        info!(
            "Rule store refreshed: {} rule(s), mocking {}",
            state.len(),
            if state.enabled() { "enabled" } else { "disabled" }
        );
        self.replace(state)
    }

    /// Apply a push update immediately. Non-object payloads are ignored.
    pub fn apply_update(&self, payload: &Value) -> Option<Arc<MockState>> {
        if !payload.is_object() {
            warn!("Ignoring rule update that is not an object");
            return None;
        }

        let state = normalize_payload(payload);
        info!(
            "Rule store updated in real time: {} rule(s), mocking {}",
            state.len(),
            if state.enabled() { "enabled" } else { "disabled" }
        );
        Some(self.replace(state))
    }

    /// Start the background task: an immediate first refresh, then periodic
    /// refreshes and push updates, handled in arrival order on this one task.
    pub fn spawn_background(self: &Arc<Self>, updates: Option<UpdateReceiver>) -> JoinHandle<()> {
        let store = Arc::clone(self);
        tokio::spawn(async move {
            store.run(updates).await;
        })
    }

    async fn run(&self, mut updates: Option<UpdateReceiver>) {
        debug!("Starting rule store background refresh");
        self.refresh().await;

        let period = self.refresh.interval();
        let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.refresh().await;
                }
                update = recv_update(&mut updates) => {
                    match update {
                        Some(payload) => {
                            self.apply_update(&payload);
                        }
                        None => {
                            debug!("Rule update channel closed, continuing with periodic refresh");
                            updates = None;
                        }
                    }
                }
            }
        }
    }
}

async fn recv_update(updates: &mut Option<UpdateReceiver>) -> Option<Value> {
    match updates {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}
