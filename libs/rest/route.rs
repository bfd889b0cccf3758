//! API routes and their rate-limit class

use crate::error::{RestError, Result};
use reqwest::Method;
use std::fmt;

/// Path segments whose following id is part of the rate-limit bucket
const MAJOR_PARAMETERS: [&str; 5] = ["channels", "guilds", "webhooks", "applications", "interactions"];

/// A validated API route relative to the versioned base URL
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Route {
    path: String,
}

impl Route {
    /// Validate a route such as `channels/123/messages`
    ///
    /// A leading `/` is dropped. Absolute URLs, empty routes, whitespace and
    /// `..` segments are rejected.
    pub fn new(path: impl AsRef<str>) -> Result<Self> {
        let path = path.as_ref().trim_start_matches('/');
        if path.is_empty() {
            return Err(RestError::InvalidRoute("route is empty".to_string()));
        }
        if path.contains("://") {
            return Err(RestError::InvalidRoute(format!(
                "expected a relative route, got '{}'",
                path
            )));
        }
        if path.chars().any(char::is_whitespace) {
            return Err(RestError::InvalidRoute(format!(
                "route '{}' contains whitespace",
                path
            )));
        }
        if path.split('/').any(|segment| segment == "..") {
            return Err(RestError::InvalidRoute(format!(
                "route '{}' contains '..'",
                path
            )));
        }
        Ok(Self {
            path: path.to_string(),
        })
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Rate-limit class: method plus the route with minor ids replaced
    ///
    /// `channels/1/messages/99` becomes `POST channels/1/messages/:id`;
    /// interaction tokens become `:token`.
    pub fn class(&self, method: &Method) -> String {
        let path = self.path.split('?').next().unwrap_or_default();
        let segments: Vec<&str> = path.split('/').collect();
        let normalized: Vec<&str> = segments
            .iter()
            .enumerate()
            .map(|(i, &segment)| {
                let previous = i.checked_sub(1).map(|p| segments[p]);
                let before_previous = i.checked_sub(2).map(|p| segments[p]);
                if previous.is_some_and(|p| MAJOR_PARAMETERS.contains(&p)) {
                    segment
                } else if before_previous == Some("interactions") {
                    ":token"
                } else if !segment.is_empty() && segment.chars().all(|c| c.is_ascii_digit()) {
                    ":id"
                } else {
                    segment
                }
            })
            .collect();
        format!("{} {}", method, normalized.join("/"))
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minor_ids_are_collapsed() {
        let route = Route::new("channels/10/messages/99").unwrap();
        assert_eq!(route.class(&Method::DELETE), "DELETE channels/10/messages/:id");

        let other = Route::new("/channels/10/messages/100").unwrap();
        assert_eq!(route.class(&Method::DELETE), other.class(&Method::DELETE));
    }

    #[test]
    fn test_major_ids_split_classes() {
        let a = Route::new("guilds/1/members").unwrap();
        let b = Route::new("guilds/2/members").unwrap();
        assert_ne!(a.class(&Method::GET), b.class(&Method::GET));
        assert_eq!(
            Route::new("applications/7/guilds/123/commands")
                .unwrap()
                .class(&Method::POST),
            "POST applications/7/guilds/123/commands"
        );
    }

    #[test]
    fn test_interaction_token_collapsed() {
        let route = Route::new("interactions/55/aW50ZXJhY3Rpb24/callback").unwrap();
        assert_eq!(route.class(&Method::POST), "POST interactions/55/:token/callback");
    }

    #[test]
    fn test_invalid_routes_rejected() {
        assert!(matches!(Route::new(""), Err(RestError::InvalidRoute(_))));
        assert!(matches!(
            Route::new("https://discord.com/api/v10/gateway"),
            Err(RestError::InvalidRoute(_))
        ));
        assert!(matches!(Route::new("channels/1/../x"), Err(RestError::InvalidRoute(_))));
        assert!(matches!(Route::new("channels/ 1"), Err(RestError::InvalidRoute(_))));
    }
}
