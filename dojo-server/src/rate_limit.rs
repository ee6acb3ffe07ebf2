use axum::{
    extract::Request,
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::api::ApiError;
use crate::middleware::SESSION_HEADER;

/// Fixed-window request counter per session token
#[derive(Clone)]
pub struct RateLimiter {
    // session token -> (request count, window start)
    state: Arc<Mutex<HashMap<String, (u32, Instant)>>>,
    max_requests: u32,
    window_duration: Duration,
}

impl RateLimiter {
    pub fn new(max_requests: u32, window_seconds: u64) -> Self {
        Self {
            state: Arc::new(Mutex::new(HashMap::new())),
            max_requests,
            window_duration: Duration::from_secs(window_seconds),
        }
    }

    /// Count a request; `Err` carries the message for a 429
    pub fn check_rate_limit(&self, token: &str) -> Result<(), String> {
        self.check_at(token, Instant::now())
    }

    fn check_at(&self, token: &str, now: Instant) -> Result<(), String> {
        let mut state = self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner());

        if state.len() > 10_000 {
            let window = self.window_duration;
            state.retain(|_, (_, start)| now.duration_since(*start) < window * 2);
        }

        match state.get_mut(token) {
            Some((count, window_start)) if now.duration_since(*window_start) < self.window_duration => {
                if *count >= self.max_requests {
                    let remaining = self.window_duration - now.duration_since(*window_start);
                    return Err(format!(
                        "Rate limit exceeded. Try again in {} seconds.",
                        remaining.as_secs()
                    ));
                }
                *count += 1;
            }
            Some(entry) => *entry = (1, now),
            None => {
                state.insert(token.to_string(), (1, now));
            }
        }

        Ok(())
    }
}

/// Rate limit authenticated requests (those carrying a session token)
pub async fn rate_limit_middleware(
    axum::Extension(limiter): axum::Extension<RateLimiter>,
    request: Request,
    next: Next,
) -> Response {
    let token = request
        .headers()
        .get(SESSION_HEADER)
        .and_then(|v| v.to_str().ok());

    if let Some(token) = token {
        if let Err(msg) = limiter.check_rate_limit(token) {
            tracing::warn!("Rate limit hit: {}", msg);
            return ApiError::TooManyRequests(msg).into_response();
        }
    }

    next.run(request).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_limit_per_token() {
        let limiter = RateLimiter::new(2, 60);
        assert!(limiter.check_rate_limit("a").is_ok());
        assert!(limiter.check_rate_limit("a").is_ok());
        assert!(limiter.check_rate_limit("a").is_err());
        assert!(limiter.check_rate_limit("b").is_ok());
    }

    #[test]
    fn test_window_resets() {
        let limiter = RateLimiter::new(1, 60);
        let start = Instant::now();
        assert!(limiter.check_at("a", start).is_ok());
        assert!(limiter.check_at("a", start + Duration::from_secs(30)).is_err());
        assert!(limiter.check_at("a", start + Duration::from_secs(61)).is_ok());
    }
}
