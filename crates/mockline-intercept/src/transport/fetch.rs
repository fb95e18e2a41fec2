use super::{normalize_method, MockEngine};
use crate::error::TransportError;
use crate::relay::TransportKind;
use crate::response::{synthesize, MockResponseBuilder};
use async_trait::async_trait;
use reqwest::header::{HeaderName, HeaderValue};
use reqwest::Method;
use std::str::FromStr;
use tracing::{debug, error};

/// An outbound fetch call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    pub url: String,
    pub method: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
}

impl FetchRequest {
    pub fn new(method: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method: method.into(),
            headers: Vec::new(),
            body: None,
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new("GET", url)
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }
}

#[async_trait]
pub trait Fetch: Send + Sync {
    async fn fetch(&self, request: FetchRequest) -> Result<reqwest::Response, TransportError>;
}

/// The real transport.
#[derive(Debug, Clone, Default)]
pub struct NetworkFetch {
    client: reqwest::Client,
}

impl NetworkFetch {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Fetch for NetworkFetch {
    async fn fetch(&self, request: FetchRequest) -> Result<reqwest::Response, TransportError> {
        let method = Method::from_str(&normalize_method(&request.method))
            .map_err(|_| TransportError::InvalidRequest(format!("method '{}'", request.method)))?;

        let mut builder = self.client.request(method, &request.url);
        for (name, value) in &request.headers {
            let name = HeaderName::from_str(name)
                .map_err(|_| TransportError::InvalidRequest(format!("header '{name}'")))?;
            let value = HeaderValue::from_str(value)
                .map_err(|_| TransportError::InvalidRequest(format!("value of header '{name}'")))?;
            builder = builder.header(name, value);
        }
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        Ok(builder.send().await?)
    }
}

/// Answers matching calls from the rule store and hands everything else to
/// `inner` untouched.
pub struct MockFetch<F> {
    engine: MockEngine,
    inner: F,
}

impl<F: Fetch> MockFetch<F> {
    pub fn new(engine: MockEngine, inner: F) -> Self {
        Self { engine, inner }
    }

    pub fn inner(&self) -> &F {
        &self.inner
    }
}

#[async_trait]
impl<F: Fetch> Fetch for MockFetch<F> {
    async fn fetch(&self, request: FetchRequest) -> Result<reqwest::Response, TransportError> {
        let method = normalize_method(&request.method);
        let Some(rule) = self.engine.lookup(&request.url, &method, TransportKind::Fetch) else {
            return self.inner.fetch(request).await;
        };

        let synthesized = synthesize(&rule);
        if !synthesized.delay.is_zero() {
            debug!("Delaying mock response for {:?}", synthesized.delay);
            tokio::time::sleep(synthesized.delay).await;
        }

        match MockResponseBuilder::from_synthesized(&synthesized) {
            Ok(builder) => Ok(builder.build_reqwest()),
            Err(e) => {
                error!(
                    rule_id = %rule.id,
                    "Failed to build mock response, passing request through: {}", e
                );
                self.inner.fetch(request).await
            }
        }
    }
}
