//! XMLHttpRequest-style transport.
//!
//! An [`XmlHttpRequest`] is the shared request object a page holds on to: it
//! carries the ready state, the response surface and the registered handlers.
//! Transports drive it through the lifecycle; handlers are always invoked
//! with no internal lock held, so they may read the instance freely.

use super::lifecycle::{ReadyState, XhrEvent};
use super::{normalize_method, MockEngine};
use crate::config::XhrSettings;
use crate::error::{InterceptError, LifecycleError};
use crate::relay::TransportKind;
use crate::response::{synthesize, SynthesizedResponse};
use parking_lot::Mutex;
use reqwest::header::{HeaderName, HeaderValue};
use reqwest::Method;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tracing::{debug, error, trace, warn};

pub type XhrHandle = Arc<XmlHttpRequest>;
pub type XhrHandler = Arc<dyn Fn(&XmlHttpRequest) + Send + Sync>;

#[derive(Default)]
struct Handlers {
    on_ready_state_change: Option<XhrHandler>,
    on_load: Option<XhrHandler>,
    on_load_end: Option<XhrHandler>,
    on_error: Option<XhrHandler>,
    listeners: Vec<(XhrEvent, XhrHandler)>,
}

impl Handlers {
    fn slot(&self, event: XhrEvent) -> Option<&XhrHandler> {
        match event {
            XhrEvent::ReadyStateChange => self.on_ready_state_change.as_ref(),
            XhrEvent::Load => self.on_load.as_ref(),
            XhrEvent::LoadEnd => self.on_load_end.as_ref(),
            XhrEvent::Error => self.on_error.as_ref(),
        }
    }

    /// Slot first, then listeners in registration order.
    fn targets(&self, event: XhrEvent) -> Vec<XhrHandler> {
        self.slot(event)
            .into_iter()
            .chain(
                self.listeners
                    .iter()
                    .filter(|(registered, _)| *registered == event)
                    .map(|(_, handler)| handler),
            )
            .cloned()
            .collect()
    }
}

#[derive(Default)]
struct XhrState {
    ready_state: ReadyState,
    method: Option<String>,
    url: Option<String>,
    request_headers: Vec<(String, String)>,
    status: u16,
    status_text: String,
    response_headers: Vec<(String, String)>,
    response_text: String,
}

#[derive(Default)]
pub struct XmlHttpRequest {
    state: Mutex<XhrState>,
    handlers: Mutex<Handlers>,
}

impl XmlHttpRequest {
    pub fn new() -> XhrHandle {
        Arc::new(Self::default())
    }

    pub fn ready_state(&self) -> ReadyState {
        self.state.lock().ready_state
    }

    /// 0 until the response completes.
    pub fn status(&self) -> u16 {
        self.state.lock().status
    }

    pub fn status_text(&self) -> String {
        self.state.lock().status_text.clone()
    }

    pub fn response(&self) -> String {
        self.response_text()
    }

    pub fn response_text(&self) -> String {
        self.state.lock().response_text.clone()
    }

    pub fn get_response_header(&self, name: &str) -> Option<String> {
        self.state
            .lock()
            .response_headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.clone())
    }

    pub fn get_all_response_headers(&self) -> String {
        self.state
            .lock()
            .response_headers
            .iter()
            .map(|(name, value)| format!("{name}: {value}"))
            .collect::<Vec<_>>()
            .join("\r\n")
    }

    pub fn request_method(&self) -> Option<String> {
        self.state.lock().method.clone()
    }

    pub fn request_url(&self) -> Option<String> {
        self.state.lock().url.clone()
    }

    pub fn set_request_header(&self, name: impl Into<String>, value: impl Into<String>) {
        self.state
            .lock()
            .request_headers
            .push((name.into(), value.into()));
    }

    pub fn set_on_ready_state_change(&self, handler: impl Fn(&XmlHttpRequest) + Send + Sync + 'static) {
        self.handlers.lock().on_ready_state_change = Some(Arc::new(handler));
    }

    pub fn set_on_load(&self, handler: impl Fn(&XmlHttpRequest) + Send + Sync + 'static) {
        self.handlers.lock().on_load = Some(Arc::new(handler));
    }

    pub fn set_on_load_end(&self, handler: impl Fn(&XmlHttpRequest) + Send + Sync + 'static) {
        self.handlers.lock().on_load_end = Some(Arc::new(handler));
    }

    pub fn set_on_error(&self, handler: impl Fn(&XmlHttpRequest) + Send + Sync + 'static) {
        self.handlers.lock().on_error = Some(Arc::new(handler));
    }

    pub fn add_event_listener(
        &self,
        event: XhrEvent,
        handler: impl Fn(&XmlHttpRequest) + Send + Sync + 'static,
    ) {
        self.handlers.lock().listeners.push((event, Arc::new(handler)));
    }

    /// Record the request line and reset the response surface.
    fn open_request(&self, method: String, url: String) {
        let mut state = self.state.lock();
        state.method = Some(method);
        state.url = Some(url);
        state.request_headers.clear();
        state.status = 0;
        state.status_text.clear();
        state.response_headers.clear();
        state.response_text.clear();
    }

    fn request_headers(&self) -> Vec<(String, String)> {
        self.state.lock().request_headers.clone()
    }

    fn set_response_headers(&self, headers: Vec<(String, String)>) {
        self.state.lock().response_headers = headers;
    }

    /// Move to `next` and fire `readystatechange`.
    fn advance(&self, next: ReadyState) -> Result<(), LifecycleError> {
        {
            let mut state = self.state.lock();
            state.ready_state = state.ready_state.advance_to(next)?;
        }
        trace!("XHR ready state -> {:?}", next);
        self.dispatch(XhrEvent::ReadyStateChange);
        Ok(())
    }

    /// Set the response surface, enter `Done`, then fire `readystatechange`,
    /// `load` and `loadend`.
    fn complete(&self, status: u16, status_text: String, body: String) -> Result<(), LifecycleError> {
        {
            let mut state = self.state.lock();
            let next = state.ready_state.advance_to(ReadyState::Done)?;
            state.status = status;
            state.status_text = status_text;
            state.response_text = body;
            state.ready_state = next;
        }
        self.dispatch(XhrEvent::ReadyStateChange);
        self.dispatch(XhrEvent::Load);
        self.dispatch(XhrEvent::LoadEnd);
        Ok(())
    }

    /// Network failure: `Done` with status 0, then `error` and `loadend`.
    fn fail(&self) {
        self.state.lock().ready_state = ReadyState::Done;
        self.dispatch(XhrEvent::ReadyStateChange);
        self.dispatch(XhrEvent::Error);
        self.dispatch(XhrEvent::LoadEnd);
    }

    fn dispatch(&self, event: XhrEvent) {
        let targets = self.handlers.lock().targets(event);
        trace!("Dispatching {} to {} handler(s)", event.name(), targets.len());
        for handler in targets {
            handler(self);
        }
    }
}

impl std::fmt::Debug for XmlHttpRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("XmlHttpRequest")
            .field("ready_state", &state.ready_state)
            .field("method", &state.method)
            .field("url", &state.url)
            .field("status", &state.status)
            .finish()
    }
}

pub trait XhrTransport: Send + Sync {
    fn open(&self, xhr: &XhrHandle, method: &str, url: &str);

    /// Start the request. Completion is reported through the instance's
    /// handlers, never through the return value.
    fn send(&self, xhr: &XhrHandle, body: Option<String>);
}

/// The real transport, driving the lifecycle with a `reqwest` round trip.
#[derive(Debug, Clone, Default)]
pub struct NetworkXhr {
    client: reqwest::Client,
}

impl NetworkXhr {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    fn build_request(
        &self,
        xhr: &XmlHttpRequest,
        body: Option<String>,
    ) -> Option<reqwest::RequestBuilder> {
        let url = xhr.request_url()?;
        let method = Method::from_str(&xhr.request_method().unwrap_or_else(|| "GET".to_string())).ok()?;

        let mut builder = self.client.request(method, url);
        for (name, value) in xhr.request_headers() {
            let (Ok(name), Ok(value)) = (HeaderName::from_str(&name), HeaderValue::from_str(&value))
            else {
                warn!("Dropping request header '{}' that cannot be sent", name);
                continue;
            };
            builder = builder.header(name, value);
        }
        if let Some(body) = body {
            builder = builder.body(body);
        }
        Some(builder)
    }
}

impl XhrTransport for NetworkXhr {
    fn open(&self, xhr: &XhrHandle, method: &str, url: &str) {
        xhr.open_request(normalize_method(method), url.to_string());
        if let Err(e) = xhr.advance(ReadyState::Opened) {
            warn!("Failed to open XHR: {}", e);
        }
    }

    fn send(&self, xhr: &XhrHandle, body: Option<String>) {
        let Some(request) = self.build_request(xhr, body) else {
            warn!("XHR sent without a valid request line");
            xhr.fail();
            return;
        };
        let Ok(runtime) = Handle::try_current() else {
            error!("No async runtime available to send XHR");
            xhr.fail();
            return;
        };

        let xhr = Arc::clone(xhr);
        runtime.spawn(async move {
            let response = match request.send().await {
                Ok(response) => response,
                Err(e) => {
                    warn!("XHR request failed: {}", e);
                    xhr.fail();
                    return;
                }
            };

            let status = response.status();
            xhr.set_response_headers(
                response
                    .headers()
                    .iter()
                    .map(|(name, value)| {
                        (
                            name.to_string(),
                            String::from_utf8_lossy(value.as_bytes()).into_owned(),
                        )
                    })
                    .collect(),
            );

            if let Err(e) = xhr
                .advance(ReadyState::HeadersReceived)
                .and_then(|_| xhr.advance(ReadyState::Loading))
            {
                warn!("Abandoning XHR response: {}", e);
                return;
            }

            match response.text().await {
                Ok(body) => {
                    let reason = status.canonical_reason().unwrap_or_default().to_string();
                    if let Err(e) = xhr.complete(status.as_u16(), reason, body) {
                        warn!("Abandoning XHR response: {}", e);
                    }
                }
                Err(e) => {
                    warn!("Failed to read XHR response body: {}", e);
                    xhr.fail();
                }
            }
        });
    }
}

/// Replays matching requests from the rule store through the full
/// ready-state lifecycle; everything else goes to `inner`.
pub struct MockXhr<X> {
    engine: MockEngine,
    inner: X,
    stage_delay: Duration,
}

impl<X: XhrTransport> MockXhr<X> {
    pub fn new(engine: MockEngine, inner: X, settings: &XhrSettings) -> Self {
        Self {
            engine,
            inner,
            stage_delay: settings.stage_delay(),
        }
    }

    pub fn inner(&self) -> &X {
        &self.inner
    }
}

impl<X: XhrTransport> XhrTransport for MockXhr<X> {
    fn open(&self, xhr: &XhrHandle, method: &str, url: &str) {
        let method = normalize_method(method);
        xhr.open_request(method.clone(), url.to_string());
        self.inner.open(xhr, &method, url);
    }

    fn send(&self, xhr: &XhrHandle, body: Option<String>) {
        let Some(url) = xhr.request_url() else {
            return self.inner.send(xhr, body);
        };
        let method = xhr.request_method().unwrap_or_else(|| "GET".to_string());

        let Some(rule) = self.engine.lookup(&url, &method, TransportKind::Xhr) else {
            return self.inner.send(xhr, body);
        };

        let Ok(runtime) = Handle::try_current() else {
            error!(
                rule_id = %rule.id,
                "Failed to replay mock XHR, passing request through: {}",
                InterceptError::NoRuntime
            );
            return self.inner.send(xhr, body);
        };

        let synthesized = synthesize(&rule);
        let xhr = Arc::clone(xhr);
        let stage_delay = self.stage_delay;
        runtime.spawn(async move {
            if let Err(e) = replay(&xhr, synthesized, stage_delay).await {
                warn!(rule_id = %rule.id, "Mock XHR replay stopped: {}", e);
            }
        });
    }
}

async fn replay(
    xhr: &XmlHttpRequest,
    synthesized: SynthesizedResponse,
    stage_delay: Duration,
) -> Result<(), LifecycleError> {
    if !synthesized.delay.is_zero() {
        debug!("Delaying mock XHR response for {:?}", synthesized.delay);
        tokio::time::sleep(synthesized.delay).await;
    }

    xhr.advance(ReadyState::Opened)?;
    tokio::time::sleep(stage_delay).await;

    // Headers become readable from HEADERS_RECEIVED on
    xhr.set_response_headers(synthesized.headers);
    for stage in [ReadyState::HeadersReceived, ReadyState::Loading] {
        xhr.advance(stage)?;
        tokio::time::sleep(stage_delay).await;
    }

    xhr.complete(synthesized.status, synthesized.status_text, synthesized.body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{MatchType, MockRule, RefreshSettings, RelaySettings};
    use crate::error::RelayError;
    use crate::matcher::MockState;
    use crate::store::{RuleSource, RuleStore};
    use async_trait::async_trait;
    use serde_json::{json, Value};
    use tokio::sync::oneshot;

    struct NoSource;

    #[async_trait]
    impl RuleSource for NoSource {
        async fn fetch_rules(&self) -> Result<Value, RelayError> {
            Err(RelayError::Disconnected)
        }
    }

    /// Records calls instead of touching the network.
    #[derive(Default)]
    struct RecordingXhr {
        opened: Mutex<Vec<(String, String)>>,
        sent: Mutex<Vec<Option<String>>>,
    }

    impl XhrTransport for RecordingXhr {
        fn open(&self, xhr: &XhrHandle, method: &str, url: &str) {
            self.opened.lock().push((method.to_string(), url.to_string()));
            xhr.advance(ReadyState::Opened).unwrap();
        }

        fn send(&self, _xhr: &XhrHandle, body: Option<String>) {
            self.sent.lock().push(body);
        }
    }

    fn mock_xhr(rule: MockRule) -> MockXhr<RecordingXhr> {
        let store = RuleStore::new(
            Arc::new(NoSource),
            RelaySettings::default(),
            RefreshSettings::default(),
        );
        store.replace(MockState::new(vec![rule], true));
        MockXhr::new(
            MockEngine::new(store),
            RecordingXhr::default(),
            &XhrSettings::default(),
        )
    }

    fn users_rule() -> MockRule {
        MockRule {
            id: "users".to_string(),
            url: "/users".to_string(),
            method: "GET".to_string(),
            match_type: MatchType::Contains,
            status: 404,
            delay: 0,
            response: json!({"error": "missing"}),
            enabled: true,
        }
    }

    fn done_signal(xhr: &XmlHttpRequest) -> oneshot::Receiver<()> {
        let (tx, rx) = oneshot::channel();
        let tx = Mutex::new(Some(tx));
        xhr.add_event_listener(XhrEvent::LoadEnd, move |_| {
            if let Some(tx) = tx.lock().take() {
                let _ = tx.send(());
            }
        });
        rx
    }

    #[test]
    fn test_response_headers_surface() {
        let xhr = XmlHttpRequest::new();
        xhr.set_response_headers(vec![
            ("Content-Type".to_string(), "application/json".to_string()),
            ("X-Mock-Rule".to_string(), "r1".to_string()),
        ]);

        assert_eq!(xhr.get_response_header("x-mock-rule").as_deref(), Some("r1"));
        assert_eq!(xhr.get_response_header("missing"), None);
        assert_eq!(
            xhr.get_all_response_headers(),
            "Content-Type: application/json\r\nX-Mock-Rule: r1"
        );
    }

    #[test]
    fn test_illegal_transition_is_rejected() {
        let xhr = XmlHttpRequest::new();
        assert!(xhr.advance(ReadyState::Loading).is_err());
        assert_eq!(xhr.ready_state(), ReadyState::Unsent);
    }

    #[test]
    fn test_handlers_may_read_instance() {
        let xhr = XmlHttpRequest::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        xhr.set_on_ready_state_change(move |xhr| sink.lock().push(xhr.ready_state()));

        xhr.advance(ReadyState::Opened).unwrap();

        assert_eq!(*seen.lock(), vec![ReadyState::Opened]);
    }

    #[test]
    fn test_open_records_request_line() {
        let transport = mock_xhr(users_rule());
        let xhr = XmlHttpRequest::new();

        transport.open(&xhr, "get", "https://api.x/users");

        assert_eq!(xhr.request_method().as_deref(), Some("GET"));
        assert_eq!(xhr.request_url().as_deref(), Some("https://api.x/users"));
        assert_eq!(
            *transport.inner().opened.lock(),
            vec![("GET".to_string(), "https://api.x/users".to_string())]
        );
    }

    #[test]
    fn test_send_without_open_delegates() {
        let transport = mock_xhr(users_rule());
        let xhr = XmlHttpRequest::new();

        transport.send(&xhr, Some("payload".to_string()));

        assert_eq!(*transport.inner().sent.lock(), vec![Some("payload".to_string())]);
    }

    #[test]
    fn test_miss_delegates() {
        let transport = mock_xhr(users_rule());
        let xhr = XmlHttpRequest::new();

        transport.open(&xhr, "POST", "https://api.x/users");
        transport.send(&xhr, None);

        assert_eq!(transport.inner().sent.lock().len(), 1);
    }

    #[test]
    fn test_hit_without_runtime_falls_through() {
        let transport = mock_xhr(users_rule());
        let xhr = XmlHttpRequest::new();

        transport.open(&xhr, "GET", "https://api.x/users");
        transport.send(&xhr, None);

        assert_eq!(transport.inner().sent.lock().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_hit_replays_lifecycle() {
        let transport = mock_xhr(users_rule());
        let xhr = XmlHttpRequest::new();
        let events = Arc::new(Mutex::new(Vec::new()));

        let sink = Arc::clone(&events);
        xhr.set_on_ready_state_change(move |xhr| {
            sink.lock().push(format!("slot:{}", xhr.ready_state().as_u8()))
        });
        let sink = Arc::clone(&events);
        xhr.add_event_listener(XhrEvent::ReadyStateChange, move |xhr| {
            sink.lock().push(format!("listener:{}", xhr.ready_state().as_u8()))
        });
        let sink = Arc::clone(&events);
        xhr.set_on_load(move |xhr| sink.lock().push(format!("load:{}", xhr.status())));
        let done = done_signal(&xhr);

        transport.open(&xhr, "GET", "https://api.x/users");
        transport.send(&xhr, None);
        done.await.unwrap();

        assert!(transport.inner().sent.lock().is_empty());
        assert_eq!(
            *events.lock(),
            vec![
                "slot:1", "listener:1", // open
                "slot:1", "listener:1",
                "slot:2", "listener:2",
                "slot:3", "listener:3",
                "slot:4", "listener:4",
                "load:404",
            ]
        );
        assert_eq!(xhr.status(), 404);
        assert_eq!(xhr.status_text(), "Not Found");
        assert_eq!(xhr.get_response_header("X-Mock-Rule").as_deref(), Some("users"));
        let body: Value = serde_json::from_str(&xhr.response_text()).unwrap();
        assert_eq!(body, json!({"error": "missing"}));
        assert_eq!(xhr.response(), xhr.response_text());
    }

    #[tokio::test(start_paused = true)]
    async fn test_response_only_visible_at_done() {
        let mut rule = users_rule();
        rule.delay = 100;
        let transport = mock_xhr(rule);
        let xhr = XmlHttpRequest::new();
        let observed = Arc::new(Mutex::new(Vec::new()));

        let sink = Arc::clone(&observed);
        xhr.set_on_ready_state_change(move |xhr| {
            let header = xhr.get_response_header("X-Mock-Rule");
            sink.lock().push((xhr.ready_state(), xhr.status(), header))
        });
        let done = done_signal(&xhr);

        let started = tokio::time::Instant::now();
        transport.open(&xhr, "GET", "https://api.x/users");
        transport.send(&xhr, None);

        // Still inside the rule delay
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(xhr.ready_state(), ReadyState::Opened);
        assert!(xhr.get_response_header("X-Mock-Rule").is_none());
        assert!(xhr.get_all_response_headers().is_empty());

        done.await.unwrap();

        assert!(started.elapsed() >= Duration::from_millis(130));
        let observed = observed.lock();
        for (state, status, header) in observed.iter() {
            let expected = if *state == ReadyState::Done { 404 } else { 0 };
            assert_eq!(*status, expected, "status at {state:?}");
            assert_eq!(
                header.is_some(),
                *state >= ReadyState::HeadersReceived,
                "headers at {state:?}"
            );
        }
    }
}
