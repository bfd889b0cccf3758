//! # inkcord-rest
//!
//! REST transport for the chat API.
//!
//! - One kept-alive `reqwest` client with the bot's authorization headers
//! - Per-route-class rate-limit budgets
//! - Transparent resubmission after a 429
//!
//! ```ignore
//! use inkcord_rest::{RestClient, RestRequest};
//! use serde_json::json;
//!
//! let rest = RestClient::new(&token)?;
//! let request = RestRequest::post("channels/123/messages", json!({ "content": "hi" }))?;
//! let response = rest.send(request).await?;
//! ```

pub mod error;
pub mod rate_limit;
pub mod request;
pub mod route;
pub mod transport;

pub use error::{RestError, Result};
pub use rate_limit::RateLimiter;
pub use request::{RateLimitHeaders, RestRequest, RestResponse};
pub use route::Route;
pub use transport::{RestClient, RestConfig, DEFAULT_BASE_URL};

pub use reqwest::Method;
