//! Rate-limit aware REST client

use crate::error::{RestError, Result};
use crate::rate_limit::{PendingRequest, RateLimiter};
use crate::request::{RateLimitBody, RateLimitHeaders, RestRequest, RestResponse};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE, RETRY_AFTER};
use reqwest::{Client, Method};
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Default versioned API base URL
pub const DEFAULT_BASE_URL: &str = "https://discord.com/api/v10/";

/// Retry window used when a 429 carries neither a body nor a header
const FALLBACK_RETRY_AFTER: f64 = 1.0;

/// Transport settings
#[derive(Debug, Clone)]
pub struct RestConfig {
    pub base_url: String,
    pub user_agent: String,
    pub timeout: Duration,
}

impl Default for RestConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            user_agent: format!(
                "DiscordBot (https://github.com/inkcord/inkcord, {})",
                env!("CARGO_PKG_VERSION")
            ),
            timeout: Duration::from_secs(30),
        }
    }
}

enum Outcome {
    Done(RestResponse),
    RateLimited { retry_after: f64, global: bool },
}

struct Inner {
    http: Client,
    base_url: String,
    limiter: RateLimiter,
}

/// REST client over one kept-alive HTTP connection pool
///
/// Cloning is cheap; clones share the connection pool and the rate-limit
/// budgets.
#[derive(Clone)]
pub struct RestClient {
    inner: Arc<Inner>,
}

impl RestClient {
    /// Create a client against the default API base URL
    pub fn new(token: &str) -> Result<Self> {
        Self::with_config(token, RestConfig::default())
    }

    pub fn with_config(token: &str, config: RestConfig) -> Result<Self> {
        let token = token.trim();
        if token.is_empty() {
            return Err(RestError::Configuration("bot token is empty".to_string()));
        }

        let mut authorization = HeaderValue::from_str(&format!("Bot {}", token)).map_err(|_| {
            RestError::Configuration("bot token contains invalid header characters".to_string())
        })?;
        authorization.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, authorization);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let http = Client::builder()
            .default_headers(headers)
            .user_agent(config.user_agent)
            .timeout(config.timeout)
            .connect_timeout(Duration::from_secs(10))
            .pool_idle_timeout(Duration::from_secs(90))
            .tcp_keepalive(Duration::from_secs(15))
            .build()?;

        let mut base_url = config.base_url;
        if !base_url.ends_with('/') {
            base_url.push('/');
        }

        Ok(Self {
            inner: Arc::new(Inner {
                http,
                base_url,
                limiter: RateLimiter::new(),
            }),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.inner.base_url
    }

    pub fn limiter(&self) -> &RateLimiter {
        &self.inner.limiter
    }

    /// Send one request, waiting out rate limits
    ///
    /// A 429 is never returned: the request is parked and resubmitted once
    /// its window has elapsed, and this future resolves with that response.
    pub async fn send(&self, request: RestRequest) -> Result<RestResponse> {
        self.inner.submit(request).await
    }

    /// Build and send a request in one call
    pub async fn request(
        &self,
        method: Method,
        route: &str,
        body: Option<Value>,
        query: &[(&str, &str)],
    ) -> Result<RestResponse> {
        let mut request = RestRequest::new(method, route)?;
        request.body = body;
        for (key, value) in query {
            request = request.query(*key, *value);
        }
        self.send(request).await
    }

    /// Send every request concurrently
    ///
    /// Handles are returned in request order.
    pub fn send_multiple(&self, requests: Vec<RestRequest>) -> Vec<JoinHandle<Result<RestResponse>>> {
        requests
            .into_iter()
            .map(|request| {
                let inner = Arc::clone(&self.inner);
                tokio::spawn(async move { inner.submit(request).await })
            })
            .collect()
    }

    /// Abort scheduled resubmissions; their callers get `RestError::Cancelled`
    pub fn cancel_pending(&self) -> usize {
        self.inner.limiter.cancel_pending()
    }

    /// Fetch the gateway WebSocket URL
    pub async fn get_gateway_url(&self) -> Result<String> {
        #[derive(Deserialize)]
        struct GatewayInfo {
            url: String,
        }

        let response = self.send(RestRequest::get("gateway")?).await?;
        let info: GatewayInfo = response.json()?;
        info!("Gateway URL: {}", info.url);
        Ok(info.url)
    }

    /// Answer an interaction
    pub async fn create_interaction_response(
        &self,
        interaction_id: &str,
        token: &str,
        body: Value,
    ) -> Result<RestResponse> {
        let route = format!("interactions/{}/{}/callback", interaction_id, token);
        self.send(RestRequest::post(route, body)?).await
    }
}

impl Inner {
    async fn submit(self: &Arc<Self>, request: RestRequest) -> Result<RestResponse> {
        let class = request.class();
        if let Some(delay) = self.limiter.delay_for(&class) {
            debug!("Waiting {:?} before {}", delay, class);
            tokio::time::sleep(delay).await;
        }

        match self.execute(&request, &class).await? {
            Outcome::Done(response) => Ok(response),
            Outcome::RateLimited {
                retry_after,
                global,
            } => {
                self.limiter.record_rate_limited(&class, retry_after, global);

                let (responder, receiver) = oneshot::channel();
                self.limiter.defer(&class, PendingRequest { request, responder });

                let task = tokio::spawn(resubmit(Arc::clone(self), class));
                self.limiter.track(task.abort_handle());

                receiver.await.unwrap_or(Err(RestError::Cancelled))
            }
        }
    }

    async fn execute(&self, request: &RestRequest, class: &str) -> Result<Outcome> {
        let url = format!("{}{}", self.base_url, request.route.path());
        debug!("{} {}", request.method, url);

        let mut builder = self.http.request(request.method.clone(), &url);
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let headers = RateLimitHeaders::from_headers(response.headers());
        let retry_header = response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.parse::<f64>().ok());
        let text = response.text().await?;

        if status == 429 {
            let (retry_after, global) = match serde_json::from_str::<RateLimitBody>(&text) {
                Ok(body) => (body.retry_after, body.global),
                Err(_) => (retry_header.unwrap_or(FALLBACK_RETRY_AFTER), false),
            };
            return Ok(Outcome::RateLimited {
                retry_after,
                global,
            });
        }

        if status >= 400 {
            warn!("{} {} failed ({}): {}", request.method, url, status, text);
            return Err(RestError::Http { status, body: text });
        }

        self.limiter.record_success(class, &headers);

        let body = if text.trim().is_empty() {
            Value::Null
        } else {
            match serde_json::from_str(&text) {
                Ok(value) => value,
                Err(_) => Value::String(text),
            }
        };

        Ok(Outcome::Done(RestResponse {
            status,
            body,
            rate_limit: headers,
        }))
    }
}

/// Resubmit parked requests of one class after their window elapses
async fn resubmit(inner: Arc<Inner>, class: String) {
    loop {
        if let Some(delay) = inner.limiter.delay_for(&class) {
            tokio::time::sleep(delay).await;
        }

        let Some(pending) = inner.limiter.take_next(&class) else {
            return;
        };
        debug!("Resubmitting request on {}", class);

        match inner.execute(&pending.request, &class).await {
            Ok(Outcome::Done(response)) => {
                let _ = pending.responder.send(Ok(response));
                return;
            }
            Ok(Outcome::RateLimited {
                retry_after,
                global,
            }) => {
                inner.limiter.record_rate_limited(&class, retry_after, global);
                inner.limiter.requeue_front(&class, pending);
            }
            Err(e) => {
                let _ = pending.responder.send(Err(e));
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_token_rejected() {
        assert!(matches!(
            RestClient::new("   "),
            Err(RestError::Configuration(_))
        ));
    }

    #[test]
    fn test_base_url_gets_trailing_slash() {
        let client = RestClient::with_config(
            "abc",
            RestConfig {
                base_url: "http://127.0.0.1:9/api/v10".to_string(),
                ..RestConfig::default()
            },
        )
        .unwrap();
        assert_eq!(client.base_url(), "http://127.0.0.1:9/api/v10/");
    }

    #[test]
    fn test_default_user_agent_format() {
        let config = RestConfig::default();
        assert!(config.user_agent.starts_with("DiscordBot (https://"));
        assert!(config.user_agent.ends_with(&format!("{})", env!("CARGO_PKG_VERSION"))));
    }
}
