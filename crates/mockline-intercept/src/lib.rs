//! Mockline: rule-driven interception of fetch and XHR calls.
//!
//! A [`store::RuleStore`] mirrors the persisted rule table, the
//! [`matcher`] picks the rule answering a call, [`response`] turns it into a
//! concrete response and the [`transport`] decorators hand that response back
//! in place of the network.

pub mod config;
pub mod error;
pub mod matcher;
pub mod persistence;
pub mod relay;
pub mod response;
pub mod store;
pub mod template;
pub mod transport;

pub use config::{Config, MatchType, MockRule};
pub use matcher::{find_matching_rule, MockState};
pub use store::{RuleSource, RuleStore};
pub use transport::{
    Fetch, FetchRequest, MockEngine, MockFetch, MockXhr, NetworkFetch, NetworkXhr, XhrTransport,
    XmlHttpRequest,
};
