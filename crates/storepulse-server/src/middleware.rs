//! Request plumbing shared by every route: request ids, bearer-token auth and
//! per-client rate limiting.

use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
    time::{Duration, Instant},
};

use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, HeaderMap, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::api::{ApiError, ErrorCode};

const API_KEYS_VAR: &str = "STOREPULSE_API_KEYS";
const REQUEST_ID_HEADER: &str = "x-request-id";

/// Rate-limit bucket for requests that carry no bearer token.
const ANONYMOUS_CLIENT: &str = "anonymous";

/// Request id carried as a request extension and echoed in `x-request-id`.
#[derive(Debug, Clone)]
pub struct RequestId(pub String);

/// Accepted bearer tokens. Auth is disabled when the set is empty.
#[derive(Debug, Clone)]
pub struct AuthState {
    api_keys: Arc<HashSet<String>>,
}

impl AuthState {
    /// Read tokens from `STOREPULSE_API_KEYS`.
    ///
    /// # Errors
    ///
    /// Fails outside development when no token is configured.
    pub fn from_env(is_development: bool) -> anyhow::Result<Self> {
        let raw = std::env::var(API_KEYS_VAR).unwrap_or_default();
        Self::from_keys(&raw, is_development)
    }

    /// Parse a comma-separated token list.
    ///
    /// # Errors
    ///
    /// Fails outside development when `raw` holds no token.
    pub fn from_keys(raw: &str, is_development: bool) -> anyhow::Result<Self> {
        let api_keys: HashSet<String> = raw
            .split(',')
            .map(str::trim)
            .filter(|key| !key.is_empty())
            .map(ToOwned::to_owned)
            .collect();

        if api_keys.is_empty() {
            anyhow::ensure!(
                is_development,
                "{API_KEYS_VAR} must list at least one bearer token outside development"
            );
            tracing::warn!("{API_KEYS_VAR} is empty; report endpoints are unauthenticated");
        }

        Ok(Self {
            api_keys: Arc::new(api_keys),
        })
    }

    #[must_use]
    pub fn enabled(&self) -> bool {
        !self.api_keys.is_empty()
    }

    fn allows(&self, token: &str) -> bool {
        self.api_keys.contains(token)
    }
}

/// Fixed-window request budget, tracked separately for each client token.
#[derive(Debug, Clone)]
pub struct RateLimitState {
    max_requests: usize,
    window: Duration,
    clients: Arc<Mutex<HashMap<String, ClientWindow>>>,
}

#[derive(Debug, Clone, Copy)]
struct ClientWindow {
    opened_at: Instant,
    used: usize,
}

impl RateLimitState {
    #[must_use]
    pub fn new(max_requests: usize, window: Duration) -> Self {
        Self {
            max_requests,
            window,
            clients: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Count one request for `client`; `false` once its budget is spent.
    async fn admit(&self, client: &str) -> bool {
        let now = Instant::now();
        let mut clients = self.clients.lock().await;

        // Forget clients whose window has lapsed so the map stays bounded.
        clients.retain(|_, w| now.duration_since(w.opened_at) < self.window);

        let entry = clients.entry(client.to_owned()).or_insert(ClientWindow {
            opened_at: now,
            used: 0,
        });
        if entry.used >= self.max_requests {
            return false;
        }
        entry.used += 1;
        true
    }
}

fn request_id_of(req: &Request) -> String {
    req.extensions()
        .get::<RequestId>()
        .map(|id| id.0.clone())
        .unwrap_or_default()
}

/// Use the caller's `x-request-id` or mint a UUID, expose it to handlers and
/// echo it on the response.
pub async fn request_id(mut req: Request, next: Next) -> Response {
    let id = req
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.trim().is_empty())
        .map_or_else(|| Uuid::new_v4().to_string(), ToOwned::to_owned);

    req.extensions_mut().insert(RequestId(id.clone()));
    let mut response = next.run(req).await;

    if let Ok(value) = HeaderValue::from_str(&id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    response
}

/// Reject requests without an accepted bearer token while auth is enabled.
pub async fn require_bearer_auth(
    State(auth): State<AuthState>,
    req: Request,
    next: Next,
) -> Response {
    if !auth.enabled() {
        return next.run(req).await;
    }

    if bearer_token(req.headers()).is_some_and(|token| auth.allows(token)) {
        return next.run(req).await;
    }

    tracing::debug!(path = %req.uri().path(), "rejected request without valid bearer token");
    ApiError::new(
        request_id_of(&req),
        ErrorCode::Unauthorized,
        "missing or invalid bearer token",
    )
    .into_response()
}

/// Reject requests once the calling client has used up its window budget.
pub async fn enforce_rate_limit(
    State(limit): State<RateLimitState>,
    req: Request,
    next: Next,
) -> Response {
    let client = bearer_token(req.headers()).unwrap_or(ANONYMOUS_CLIENT).to_owned();

    if limit.admit(&client).await {
        return next.run(req).await;
    }

    tracing::warn!(path = %req.uri().path(), "rate limit exceeded");
    ApiError::new(
        request_id_of(&req),
        ErrorCode::RateLimited,
        format!(
            "at most {} requests per {}s",
            limit.max_requests,
            limit.window.as_secs()
        ),
    )
    .into_response()
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(authorization: &'static str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static(authorization));
        headers
    }

    #[test]
    fn bearer_token_is_extracted_and_trimmed() {
        assert_eq!(bearer_token(&headers("Bearer  report-key ")), Some("report-key"));
        assert_eq!(bearer_token(&headers("Basic abc123")), None);
        assert_eq!(bearer_token(&headers("Bearer   ")), None);
        assert_eq!(bearer_token(&HeaderMap::new()), None);
    }

    #[test]
    fn empty_key_list_disables_auth_only_in_development() {
        let dev = AuthState::from_keys("", true).expect("development allows no keys");
        assert!(!dev.enabled());
        assert!(AuthState::from_keys(" , ", false).is_err());
    }

    #[test]
    fn key_list_is_trimmed() {
        let auth = AuthState::from_keys(" alpha, beta ,", false).expect("keys");
        assert!(auth.enabled());
        assert!(auth.allows("alpha"));
        assert!(auth.allows("beta"));
        assert!(!auth.allows(""));
    }

    #[tokio::test]
    async fn budgets_are_tracked_per_client() {
        let limit = RateLimitState::new(2, Duration::from_secs(60));

        assert!(limit.admit("a").await);
        assert!(limit.admit("a").await);
        assert!(!limit.admit("a").await);
        assert!(limit.admit("b").await);
    }

    #[tokio::test]
    async fn budget_resets_after_window() {
        let limit = RateLimitState::new(1, Duration::from_millis(20));

        assert!(limit.admit("a").await);
        assert!(!limit.admit("a").await);
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(limit.admit("a").await);
    }
}
