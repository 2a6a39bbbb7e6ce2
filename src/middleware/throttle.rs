use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

use axum::{
    extract::{ConnectInfo, Request, State},
    http::{header::RETRY_AFTER, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tokio::sync::Mutex;
use tracing::warn;

use crate::auth::Principal;
use crate::error::ApiError;
use crate::state::AppState;

const PRUNE_THRESHOLD: usize = 10_000;

struct Window {
    started: Instant,
    hits: u32,
}

/// Fixed-window request counter per client key.
pub struct RateLimiter {
    limit: u32,
    window: Duration,
    windows: Mutex<HashMap<String, Window>>,
}

impl RateLimiter {
    pub fn new(limit: u32, window: Duration) -> Self {
        Self { limit: limit.max(1), window, windows: Mutex::new(HashMap::new()) }
    }

    /// Counts one request. `Err` carries the time until the window resets.
    pub async fn hit(&self, key: &str) -> Result<(), Duration> {
        self.hit_at(key, Instant::now()).await
    }

    async fn hit_at(&self, key: &str, now: Instant) -> Result<(), Duration> {
        let mut windows = self.windows.lock().await;
        if windows.len() > PRUNE_THRESHOLD {
            let window = self.window;
            windows.retain(|_, w| now.duration_since(w.started) < window);
        }

        let entry = windows.entry(key.to_string()).or_insert(Window { started: now, hits: 0 });
        let elapsed = now.duration_since(entry.started);
        if elapsed >= self.window {
            entry.started = now;
            entry.hits = 0;
        }
        if entry.hits >= self.limit {
            return Err(self.window.saturating_sub(now.duration_since(entry.started)));
        }
        entry.hits += 1;
        Ok(())
    }
}

/// Principal id when authenticated, else client address.
fn client_key(request: &Request) -> String {
    if let Some(principal) = request.extensions().get::<Principal>() {
        return format!("user:{}", principal.id);
    }
    match request.extensions().get::<ConnectInfo<SocketAddr>>() {
        Some(ConnectInfo(addr)) => format!("ip:{}", addr.ip()),
        None => "anonymous".to_string(),
    }
}

pub async fn throttle(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let Some(limiter) = state.limiter.as_ref() else {
        return next.run(request).await;
    };

    let key = client_key(&request);
    match limiter.hit(&key).await {
        Ok(()) => next.run(request).await,
        Err(retry_after) => {
            warn!("Rate limit exceeded for {}", key);
            let seconds = retry_after.as_secs().max(1);
            let mut response = ApiError::too_many_requests("Too Many Attempts.").into_response();
            if let Ok(value) = HeaderValue::from_str(&seconds.to_string()) {
                response.headers_mut().insert(RETRY_AFTER, value);
            }
            response
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn blocks_after_limit_until_window_resets() {
        let limiter = RateLimiter::new(2, Duration::from_secs(60));
        let start = Instant::now();
        assert!(limiter.hit_at("ip:1", start).await.is_ok());
        assert!(limiter.hit_at("ip:1", start).await.is_ok());

        let retry = limiter.hit_at("ip:1", start + Duration::from_secs(10)).await.unwrap_err();
        assert_eq!(retry, Duration::from_secs(50));

        assert!(limiter.hit_at("ip:2", start).await.is_ok());
        assert!(limiter.hit_at("ip:1", start + Duration::from_secs(60)).await.is_ok());
    }
}
