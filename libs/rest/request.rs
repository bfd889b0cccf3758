use crate::error::{RestError, Result};
use crate::route::Route;
use reqwest::header::HeaderMap;
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;

/// One API call: method, route, optional JSON body and query string
#[derive(Debug, Clone)]
pub struct RestRequest {
    pub method: Method,
    pub route: Route,
    pub body: Option<Value>,
    pub query: Vec<(String, String)>,
}

impl RestRequest {
    pub fn new(method: Method, route: impl AsRef<str>) -> Result<Self> {
        Ok(Self {
            method,
            route: Route::new(route)?,
            body: None,
            query: Vec::new(),
        })
    }

    pub fn get(route: impl AsRef<str>) -> Result<Self> {
        Self::new(Method::GET, route)
    }

    pub fn post(route: impl AsRef<str>, body: Value) -> Result<Self> {
        Ok(Self::new(Method::POST, route)?.body(body))
    }

    pub fn patch(route: impl AsRef<str>, body: Value) -> Result<Self> {
        Ok(Self::new(Method::PATCH, route)?.body(body))
    }

    pub fn put(route: impl AsRef<str>, body: Value) -> Result<Self> {
        Ok(Self::new(Method::PUT, route)?.body(body))
    }

    pub fn delete(route: impl AsRef<str>) -> Result<Self> {
        Self::new(Method::DELETE, route)
    }

    pub fn body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    /// Rate-limit class of this request
    pub fn class(&self) -> String {
        self.route.class(&self.method)
    }
}

/// Rate-limit headers of one response
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RateLimitHeaders {
    pub remaining: Option<u32>,
    pub reset_after: Option<Duration>,
    pub bucket: Option<String>,
}

impl RateLimitHeaders {
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let text = |name: &str| {
            headers
                .get(name)
                .and_then(|value| value.to_str().ok())
                .map(str::to_string)
        };
        Self {
            remaining: text("x-ratelimit-remaining").and_then(|v| v.parse().ok()),
            reset_after: text("x-ratelimit-reset-after")
                .and_then(|v| v.parse::<f64>().ok())
                .and_then(|secs| Duration::try_from_secs_f64(secs).ok()),
            bucket: text("x-ratelimit-bucket"),
        }
    }
}

/// Body of a 429 response
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct RateLimitBody {
    pub retry_after: f64,
    #[serde(default)]
    pub global: bool,
}

/// A successful (status < 400) response
#[derive(Debug, Clone)]
pub struct RestResponse {
    pub status: u16,
    /// Decoded JSON body (`Null` when empty, a string when not JSON)
    pub body: Value,
    pub rate_limit: RateLimitHeaders,
}

impl RestResponse {
    /// Deserialize the body into a typed record
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_value(self.body.clone()).map_err(|e| RestError::Deserialize(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;
    use serde_json::json;

    #[test]
    fn test_rate_limit_headers_parsed() {
        let mut headers = HeaderMap::new();
        headers.insert("x-ratelimit-remaining", HeaderValue::from_static("3"));
        headers.insert("x-ratelimit-reset-after", HeaderValue::from_static("1.5"));
        headers.insert("x-ratelimit-bucket", HeaderValue::from_static("abcd"));

        let parsed = RateLimitHeaders::from_headers(&headers);
        assert_eq!(parsed.remaining, Some(3));
        assert_eq!(parsed.reset_after, Some(Duration::from_millis(1500)));
        assert_eq!(parsed.bucket.as_deref(), Some("abcd"));
    }

    #[test]
    fn test_missing_headers_are_none() {
        let parsed = RateLimitHeaders::from_headers(&HeaderMap::new());
        assert_eq!(parsed, RateLimitHeaders::default());
    }

    #[test]
    fn test_rate_limit_body_defaults_global() {
        let body: RateLimitBody = serde_json::from_value(json!({"retry_after": 2.5})).unwrap();
        assert_eq!(body.retry_after, 2.5);
        assert!(!body.global);
    }

    #[test]
    fn test_request_builders() {
        let request = RestRequest::post("channels/1/messages", json!({"content": "hi"}))
            .unwrap()
            .query("wait", "true");
        assert_eq!(request.method, Method::POST);
        assert_eq!(request.route.path(), "channels/1/messages");
        assert_eq!(request.query, vec![("wait".to_string(), "true".to_string())]);
        assert!(RestRequest::get("").is_err());
    }
}
