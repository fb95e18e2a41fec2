use super::synthesizer::SynthesizedResponse;
use crate::error::InterceptError;
use http::header::{HeaderName, HeaderValue};
use http::{HeaderMap, StatusCode};
use std::str::FromStr;

/// Reason phrase of a synthesized response, stored in the response extensions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusText(pub String);

pub struct MockResponseBuilder {
    status: StatusCode,
    status_text: Option<String>,
    body: Option<String>,
    headers: HeaderMap,
}

impl MockResponseBuilder {
    pub fn new(status_code: StatusCode) -> Self {
        MockResponseBuilder {
            status: status_code,
            status_text: None,
            body: None,
            headers: Default::default(),
        }
    }

    /// Start from a synthesized response. Fails when the status or a header
    /// cannot be carried by an HTTP response.
    pub fn from_synthesized(synthesized: &SynthesizedResponse) -> Result<Self, InterceptError> {
        let status = StatusCode::from_u16(synthesized.status)
            .map_err(|_| InterceptError::InvalidStatus(synthesized.status))?;

        let mut builder = Self::new(status)
            .status_text(synthesized.status_text.clone())
            .body(synthesized.body.clone());
        for (name, value) in &synthesized.headers {
            builder = builder.try_header(name, value)?;
        }
        Ok(builder)
    }

    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn status_text(mut self, text: impl Into<String>) -> Self {
        self.status_text = Some(text.into());
        self
    }

    pub fn try_header(mut self, name: &str, value: &str) -> Result<Self, InterceptError> {
        let name_err = || InterceptError::InvalidHeader(name.to_string());
        let header_name = HeaderName::from_str(name).map_err(|_| name_err())?;
        let header_value = HeaderValue::from_str(value).map_err(|_| name_err())?;
        self.headers.insert(header_name, header_value);
        Ok(self)
    }

    pub fn build(self) -> http::Response<String> {
        let mut response = http::Response::new(self.body.unwrap_or_default());
        *response.status_mut() = self.status;
        response.headers_mut().extend(self.headers);
        if let Some(text) = self.status_text {
            response.extensions_mut().insert(StatusText(text));
        }
        response
    }

    /// Build the response the fetch transport hands back to callers.
    pub fn build_reqwest(self) -> reqwest::Response {
        reqwest::Response::from(self.build())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::header::CONTENT_TYPE;
    use std::time::Duration;

    fn synthesized(status: u16, rule_id: &str) -> SynthesizedResponse {
        SynthesizedResponse {
            status,
            status_text: "Not Found".to_string(),
            headers: vec![
                ("Content-Type".to_string(), "application/json".to_string()),
                ("X-Mock-Rule".to_string(), rule_id.to_string()),
            ],
            body: "{}".to_string(),
            delay: Duration::ZERO,
        }
    }

    #[test]
    fn test_builder_with_status() {
        let response = MockResponseBuilder::new(StatusCode::OK).build();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.body().is_empty());
    }

    #[test]
    fn test_from_synthesized() {
        let response = MockResponseBuilder::from_synthesized(&synthesized(404, "r-1"))
            .unwrap()
            .build();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            response.headers().get(CONTENT_TYPE),
            Some(&HeaderValue::from_static("application/json"))
        );
        assert_eq!(
            response.headers().get("x-mock-rule"),
            Some(&HeaderValue::from_static("r-1"))
        );
        assert_eq!(
            response.extensions().get::<StatusText>(),
            Some(&StatusText("Not Found".to_string()))
        );
        assert_eq!(response.body(), "{}");
    }

    #[test]
    fn test_invalid_status_is_rejected() {
        let err = MockResponseBuilder::from_synthesized(&synthesized(1000, "r-1"))
            .err()
            .unwrap();
        assert!(matches!(err, InterceptError::InvalidStatus(1000)));
    }

    #[test]
    fn test_invalid_header_value_is_rejected() {
        let err = MockResponseBuilder::from_synthesized(&synthesized(200, "bad\nid"))
            .err()
            .unwrap();
        assert!(matches!(err, InterceptError::InvalidHeader(name) if name == "X-Mock-Rule"));
    }

    #[tokio::test]
    async fn test_build_reqwest() {
        let response = MockResponseBuilder::new(StatusCode::CREATED)
            .body("created")
            .build_reqwest();

        assert_eq!(response.status(), reqwest::StatusCode::CREATED);
        assert_eq!(response.text().await.unwrap(), "created");
    }
}
