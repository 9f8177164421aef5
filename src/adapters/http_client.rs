use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use crate::error::{NotifierError, Result};

/// Default timeout applied to every outbound request
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// HTTP method enum
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    GET,
    POST,
    PATCH,
    DELETE,
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            HttpMethod::GET => "GET",
            HttpMethod::POST => "POST",
            HttpMethod::PATCH => "PATCH",
            HttpMethod::DELETE => "DELETE",
        };
        f.write_str(name)
    }
}

/// A very simple version that only holds response data
#[derive(Debug, Clone)]
pub struct SimpleHttpResponse {
    /// HTTP status code
    status_code: u16,
    /// Response body
    body: String,
}

impl SimpleHttpResponse {
    /// Create a new response
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status_code: status,
            body: body.into(),
        }
    }

    /// Get the status code
    pub fn status(&self) -> u16 {
        self.status_code
    }

    /// Get a reference to the response body
    pub fn body(&self) -> &str {
        &self.body
    }

    /// Get the body as text (consumes the response)
    pub fn text(self) -> String {
        self.body
    }

    /// Parse body as JSON
    pub fn json<T: serde::de::DeserializeOwned>(self) -> Result<T> {
        Ok(serde_json::from_str(&self.body)?)
    }

    /// Check if successful (2xx status)
    pub fn is_success(&self) -> bool {
        self.status_code >= 200 && self.status_code < 300
    }
}

/// Trait for HTTP client operations, allowing for mocking
#[async_trait]
pub trait HttpClient: Send + Sync {
    /// Perform an HTTP request and return a SimpleHttpResponse
    async fn send(
        &self,
        method: HttpMethod,
        url: &str,
        headers: HashMap<String, String>,
        body: Option<String>,
    ) -> Result<SimpleHttpResponse>;

    /// Perform HTTP GET request
    async fn get(&self, url: &str, headers: HashMap<String, String>) -> Result<SimpleHttpResponse> {
        self.send(HttpMethod::GET, url, headers, None).await
    }

    /// POST an `application/x-www-form-urlencoded` body
    async fn post_form(
        &self,
        url: &str,
        mut headers: HashMap<String, String>,
        fields: &[(&str, &str)],
    ) -> Result<SimpleHttpResponse> {
        let body = url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(fields.iter())
            .finish();
        headers.insert(
            "Content-Type".to_string(),
            "application/x-www-form-urlencoded".to_string(),
        );
        self.send(HttpMethod::POST, url, headers, Some(body)).await
    }

    /// POST a JSON body
    async fn post_json(
        &self,
        url: &str,
        mut headers: HashMap<String, String>,
        body: &serde_json::Value,
    ) -> Result<SimpleHttpResponse> {
        headers.insert("Content-Type".to_string(), "application/json".to_string());
        self.send(HttpMethod::POST, url, headers, Some(body.to_string()))
            .await
    }
}

/// Implementation of HttpClient using reqwest
pub struct ReqwestHttpClient {
    /// Internal reqwest client
    client: reqwest::Client,
}

impl ReqwestHttpClient {
    /// Create a new ReqwestHttpClient with the default request timeout
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .timeout(DEFAULT_REQUEST_TIMEOUT)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self { client }
    }

    /// Create a new client with custom configuration
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl Default for ReqwestHttpClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HttpClient for ReqwestHttpClient {
    async fn send(
        &self,
        method: HttpMethod,
        url: &str,
        headers: HashMap<String, String>,
        body: Option<String>,
    ) -> Result<SimpleHttpResponse> {
        let mut request = match method {
            HttpMethod::GET => self.client.get(url),
            HttpMethod::POST => self.client.post(url),
            HttpMethod::PATCH => self.client.patch(url),
            HttpMethod::DELETE => self.client.delete(url),
        };

        // Add headers
        for (key, value) in headers {
            request = request.header(key, value);
        }

        if let Some(body) = body {
            request = request.body(body);
        }

        // Send request
        let response = request.send().await.map_err(|e| {
            NotifierError::connection_with_source(format!("{} {} failed", method, url), e)
        })?;

        // Convert to SimpleHttpResponse
        let status = response.status().as_u16();
        let body = response.text().await?;

        Ok(SimpleHttpResponse::new(status, body))
    }
}


#[cfg(test)]
mod tests {
    use super::mock::MockHttpClient;
    use super::*;

    #[tokio::test]
    async fn test_mock_http_client() -> Result<()> {
        let client = MockHttpClient::new();

        client.mock_response(HttpMethod::GET, "https://example.com/api", 200, "Hello, world!");
        client.mock_json(
            HttpMethod::GET,
            "https://example.com/api/json",
            200,
            &serde_json::json!({"data": [{"id": "123"}]}),
        );
        client.mock_response(HttpMethod::GET, "https://example.com/api/error", 404, "Not found");

        let response = client.get("https://example.com/api", HashMap::new()).await?;
        assert_eq!(response.status(), 200);
        assert_eq!(response.text(), "Hello, world!");

        let response = client.get("https://example.com/api/json", HashMap::new()).await?;
        let json: serde_json::Value = response.json()?;
        assert_eq!(json["data"][0]["id"], "123");

        let response = client.get("https://example.com/api/error", HashMap::new()).await?;
        assert!(!response.is_success());

        // Unknown URL is a transport error
        let result = client.get("https://example.com/not-found", HashMap::new()).await;
        assert!(result.is_err());

        assert_eq!(client.get_requests().len(), 4);
        Ok(())
    }

    #[tokio::test]
    async fn test_mock_queue_repeats_last_response() -> Result<()> {
        let client = MockHttpClient::new();
        client.mock_response(HttpMethod::GET, "https://example.com/seq", 500, "first");
        client.mock_response(HttpMethod::GET, "https://example.com/seq", 200, "second");

        let first = client.get("https://example.com/seq", HashMap::new()).await?;
        let second = client.get("https://example.com/seq", HashMap::new()).await?;
        let third = client.get("https://example.com/seq", HashMap::new()).await?;

        assert_eq!(first.status(), 500);
        assert_eq!(second.body(), "second");
        assert_eq!(third.body(), "second");
        Ok(())
    }

    #[tokio::test]
    async fn test_post_form_encodes_fields() -> Result<()> {
        let client = MockHttpClient::new();
        client.mock_response(HttpMethod::POST, "https://example.com/token", 200, "{}");

        client
            .post_form(
                "https://example.com/token",
                HashMap::new(),
                &[("grant_type", "client_credentials"), ("client_id", "a b")],
            )
            .await?;

        let request = &client.get_requests()[0];
        assert_eq!(
            request.body.as_deref(),
            Some("grant_type=client_credentials&client_id=a+b")
        );
        assert_eq!(
            request.headers.get("Content-Type").map(String::as_str),
            Some("application/x-www-form-urlencoded")
        );
        Ok(())
    }
}
