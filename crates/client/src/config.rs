//! Backend endpoint configuration.
//!
//! On the web the base URLs are derived from the page's own origin; native
//! callers construct them explicitly.

/// HTTP and WebSocket base URLs for one backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    api_base: String,
    ws_base: String,
}

impl Endpoints {
    pub fn new(api_base: impl Into<String>, ws_base: impl Into<String>) -> Self {
        Self {
            api_base: api_base.into().trim_end_matches('/').to_string(),
            ws_base: ws_base.into().trim_end_matches('/').to_string(),
        }
    }

    /// Derive endpoints from the current page location, mirroring the
    /// `/api` and `/ws` mounts the backend serves under its own host.
    #[cfg(target_arch = "wasm32")]
    pub fn detect() -> Option<Self> {
        let location = web_sys::window()?.location();
        let protocol = location.protocol().ok()?;
        let host = location.host().ok()?;
        let ws_protocol = if protocol == "https:" { "wss:" } else { "ws:" };
        Some(Self::new(
            format!("{protocol}//{host}/api"),
            format!("{ws_protocol}//{host}/ws"),
        ))
    }

    /// Join an API path onto the HTTP base.
    pub fn api_url(&self, path: &str) -> String {
        format!("{}/{}", self.api_base, path.trim_start_matches('/'))
    }

    /// Subscription URL for one event code.
    pub fn ws_url(&self, code: &str) -> String {
        format!("{}/{}", self.ws_base, code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_joins_normalize_slashes() {
        let endpoints = Endpoints::new("http://range.local:8000/api/", "ws://range.local:8000/ws/");
        assert_eq!(endpoints.api_url("/events/ABC123"), "http://range.local:8000/api/events/ABC123");
        assert_eq!(endpoints.ws_url("ABC123"), "ws://range.local:8000/ws/ABC123");
    }
}
