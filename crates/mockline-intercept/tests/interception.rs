//! End-to-end interception: persisted rules travel through the relay into the
//! rule store and answer fetch and XHR calls.

use async_trait::async_trait;
use mockline_intercept::config::{RefreshSettings, RelaySettings, XhrSettings};
use mockline_intercept::error::TransportError;
use mockline_intercept::persistence::{
    delete_mock_rule, get_mock_rules, save_mock_rule, toggle_mock_enabled, KeyValueStore,
    MemoryStore,
};
use mockline_intercept::relay::{self, broadcast_update, serve_relay};
use mockline_intercept::store::RuleStore;
use mockline_intercept::transport::{
    Fetch, FetchRequest, MockEngine, MockFetch, MockXhr, ReadyState, XhrEvent, XhrHandle,
    XhrTransport, XmlHttpRequest,
};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};

/// Stands in for the network.
#[derive(Default)]
struct Network {
    calls: Mutex<Vec<String>>,
}

#[async_trait]
impl Fetch for Network {
    async fn fetch(&self, request: FetchRequest) -> Result<reqwest::Response, TransportError> {
        self.calls
            .lock()
            .push(format!("{} {}", request.method, request.url));
        Ok(http::Response::new("real".to_string()).into())
    }
}

impl XhrTransport for Network {
    fn open(&self, _xhr: &XhrHandle, method: &str, url: &str) {
        self.calls.lock().push(format!("open {method} {url}"));
    }

    fn send(&self, _xhr: &XhrHandle, _body: Option<String>) {
        self.calls.lock().push("send".to_string());
    }
}

fn persisted(values: Value) -> Arc<MemoryStore> {
    let store = Arc::new(MemoryStore::new());
    if let Value::Object(map) = values {
        store.set(map).unwrap();
    }
    store
}

fn users_404() -> Value {
    json!({
        "mockRules": [{
            "id": "users-missing",
            "url": "/users",
            "method": "GET",
            "matchType": "contains",
            "status": 404,
            "response": {"error": "no such user"},
            "enabled": true
        }],
        "isEnabled": true
    })
}

/// Wire a rule store to persistence through the relay and load the first snapshot.
async fn connected_store(persistence: Arc<MemoryStore>) -> (Arc<RuleStore>, MockEngine) {
    let (page, extension) = relay::channel(16);
    tokio::spawn(serve_relay(persistence, extension));

    let notifier = page.notifier();
    let store = RuleStore::new(
        Arc::new(page),
        RelaySettings::default(),
        RefreshSettings::default(),
    );
    store.refresh().await;
    let engine = MockEngine::new(Arc::clone(&store)).with_notifier(notifier);
    (store, engine)
}

#[tokio::test]
async fn test_users_404_is_mocked_and_post_falls_through() {
    let (_store, engine) = connected_store(persisted(users_404())).await;
    let fetch = MockFetch::new(engine, Network::default());

    let response = fetch
        .fetch(FetchRequest::get("https://api.example.com/users/42"))
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::NOT_FOUND);
    assert_eq!(response.headers()["x-mock-rule"], "users-missing");
    assert_eq!(response.headers()["content-type"], "application/json");
    let body: Value = response.json().await.unwrap();
    assert_eq!(body, json!({"error": "no such user"}));

    let response = fetch
        .fetch(FetchRequest::new("POST", "https://api.example.com/users"))
        .await
        .unwrap();
    assert_eq!(response.text().await.unwrap(), "real");
    assert_eq!(
        *fetch.inner().calls.lock(),
        vec!["POST https://api.example.com/users".to_string()]
    );
}

#[tokio::test]
async fn test_globally_disabled_rules_never_match() {
    let mut payload = users_404();
    payload["isEnabled"] = json!(false);
    let (_store, engine) = connected_store(persisted(payload)).await;
    let fetch = MockFetch::new(engine, Network::default());

    let response = fetch
        .fetch(FetchRequest::get("https://api.example.com/users"))
        .await
        .unwrap();
    assert_eq!(response.text().await.unwrap(), "real");
}

#[tokio::test]
async fn test_string_encoded_rules_are_accepted() {
    let rules = users_404()["mockRules"].to_string();
    let (store, _engine) = connected_store(persisted(json!({ "mockRules": rules }))).await;

    let state = store.current_state();
    assert!(state.enabled());
    assert_eq!(state.rules()[0].id(), "users-missing");
}

#[tokio::test(start_paused = true)]
async fn test_unanswered_relay_falls_back_to_disabled() {
    let (page, _extension) = relay::channel(16);
    let store = RuleStore::new(
        Arc::new(page),
        RelaySettings { timeout_ms: 1000 },
        RefreshSettings::default(),
    );

    let started = tokio::time::Instant::now();
    let state = store.refresh().await;

    assert!(started.elapsed() >= Duration::from_millis(1000));
    assert!(!state.enabled());
    assert!(state.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_push_update_does_not_change_in_flight_response() {
    let mut payload = users_404();
    payload["mockRules"][0]["delay"] = json!(500);
    let (store, engine) = connected_store(persisted(payload)).await;
    let fetch = Arc::new(MockFetch::new(engine, Network::default()));

    let in_flight = {
        let fetch = Arc::clone(&fetch);
        tokio::spawn(async move {
            fetch
                .fetch(FetchRequest::get("https://api.example.com/users"))
                .await
        })
    };
    tokio::time::sleep(Duration::from_millis(100)).await;

    store.apply_update(&json!({
        "mockRules": [{
            "id": "users-ok",
            "url": "/users",
            "matchType": "contains",
            "status": 200,
            "response": {"users": []},
            "enabled": true
        }],
        "isEnabled": true
    }));

    let response = in_flight.await.unwrap().unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::NOT_FOUND);
    assert_eq!(response.headers()["x-mock-rule"], "users-missing");

    let response = fetch
        .fetch(FetchRequest::get("https://api.example.com/users"))
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::OK);
    assert_eq!(response.headers()["x-mock-rule"], "users-ok");
}

#[tokio::test(start_paused = true)]
async fn test_broadcast_reaches_background_store() {
    let persistence = persisted(json!({"mockRules": [], "isEnabled": false}));
    let (page, extension) = relay::channel(16);
    tokio::spawn(serve_relay(persistence.clone(), extension));

    let store = RuleStore::new(
        Arc::new(page),
        RelaySettings::default(),
        RefreshSettings::default(),
    );
    let (updates_tx, updates_rx) = mpsc::unbounded_channel();
    let background = store.spawn_background(Some(updates_rx));
    tokio::time::sleep(Duration::from_millis(5)).await;
    assert!(!store.current_state().enabled());

    let Value::Object(rules) = users_404() else {
        unreachable!()
    };
    persistence.set(rules).unwrap();
    assert_eq!(broadcast_update(&*persistence, &[updates_tx]), 1);
    tokio::time::sleep(Duration::from_millis(5)).await;

    let state = store.current_state();
    assert!(state.enabled());
    assert_eq!(state.len(), 1);

    background.abort();
}

#[tokio::test(start_paused = true)]
async fn test_xhr_lifecycle_order() {
    let (_store, engine) = connected_store(persisted(users_404())).await;
    let transport = MockXhr::new(engine, Network::default(), &XhrSettings::default());
    let xhr = XmlHttpRequest::new();
    let log = Arc::new(Mutex::new(Vec::new()));

    for event in [
        XhrEvent::ReadyStateChange,
        XhrEvent::Load,
        XhrEvent::LoadEnd,
    ] {
        let sink = Arc::clone(&log);
        xhr.add_event_listener(event, move |xhr| {
            sink.lock()
                .push(format!("{}@{}", event.name(), xhr.ready_state().as_u8()))
        });
    }
    let (done_tx, done_rx) = oneshot::channel();
    let done_tx = Mutex::new(Some(done_tx));
    xhr.set_on_load_end(move |xhr| {
        if let Some(tx) = done_tx.lock().take() {
            let _ = tx.send((xhr.status(), xhr.response_text()));
        }
    });

    transport.open(&xhr, "get", "https://api.example.com/users");
    transport.send(&xhr, None);
    let (status, body) = done_rx.await.unwrap();

    assert_eq!(
        *log.lock(),
        vec![
            "readystatechange@1",
            "readystatechange@2",
            "readystatechange@3",
            "readystatechange@4",
            "load@4",
            "loadend@4",
        ]
    );
    assert_eq!(status, 404);
    assert_eq!(serde_json::from_str::<Value>(&body).unwrap(), json!({"error": "no such user"}));
    assert_eq!(xhr.ready_state(), ReadyState::Done);
    assert_eq!(
        xhr.get_all_response_headers(),
        "Content-Type: application/json\r\nX-Mock-Rule: users-missing"
    );
    assert_eq!(
        *transport.inner().calls.lock(),
        vec!["open GET https://api.example.com/users".to_string()]
    );
}

#[tokio::test]
async fn test_xhr_miss_goes_to_network() {
    let (_store, engine) = connected_store(persisted(users_404())).await;
    let transport = MockXhr::new(engine, Network::default(), &XhrSettings::default());
    let xhr = XmlHttpRequest::new();

    transport.open(&xhr, "DELETE", "https://api.example.com/users/1");
    transport.send(&xhr, None);

    assert_eq!(
        *transport.inner().calls.lock(),
        vec![
            "open DELETE https://api.example.com/users/1".to_string(),
            "send".to_string()
        ]
    );
    assert_eq!(xhr.ready_state(), ReadyState::Unsent);
}

#[tokio::test]
async fn test_rule_edits_reach_the_engine() {
    let persistence = persisted(users_404());
    save_mock_rule(
        &*persistence,
        json!({
            "id": "users-missing",
            "url": "/users",
            "method": "GET",
            "matchType": "contains",
            "status": 410,
            "response": {"gone": true},
            "enabled": true
        }),
    )
    .unwrap();
    save_mock_rule(
        &*persistence,
        json!({"id": "orders", "url": "/orders", "matchType": "exact", "enabled": true}),
    )
    .unwrap();

    let (store, engine) = connected_store(Arc::clone(&persistence)).await;
    let fetch = MockFetch::new(engine, Network::default());

    assert_eq!(store.current_state().len(), 2);
    let response = fetch
        .fetch(FetchRequest::get("https://api.example.com/users"))
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::GONE);
    assert_eq!(response.json::<Value>().await.unwrap(), json!({"gone": true}));

    assert!(delete_mock_rule(&*persistence, "orders").unwrap());
    toggle_mock_enabled(&*persistence, false).unwrap();
    assert_eq!(
        get_mock_rules(&*persistence),
        json!({
            "mockRules": [{
                "id": "users-missing",
                "url": "/users",
                "method": "GET",
                "matchType": "contains",
                "status": 410,
                "response": {"gone": true},
                "enabled": true
            }],
            "isEnabled": false
        })
    );

    store.refresh().await;
    let response = fetch
        .fetch(FetchRequest::get("https://api.example.com/users"))
        .await
        .unwrap();
    assert_eq!(response.text().await.unwrap(), "real");
}
