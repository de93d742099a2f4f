use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use tracing::warn;

use crate::auth::extractors::client_ip_from_parts;
use crate::error::ApiError;
use crate::state::AppState;

/// Fixed-window counter keyed by an arbitrary string.
///
/// Increment-and-test happens under one lock acquisition per call, so two
/// concurrent requests can never both pass when a single slot remains.
#[derive(Clone)]
pub struct RateLimiter {
    max: u32,
    window: Duration,
    windows: Arc<Mutex<HashMap<String, Window>>>,
}

struct Window {
    started: Instant,
    count: u32,
}

// Opportunistic eviction threshold: once the map holds this many keys,
// expired windows are swept on the next check.
const SWEEP_THRESHOLD: usize = 4096;

impl RateLimiter {
    pub fn new(max: u32, window: Duration) -> Self {
        Self {
            max,
            window,
            windows: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Counts one hit against `key`. Fails with `RateLimited` once the
    /// window's budget is spent; the caller must not touch any downstream
    /// resource after a failure.
    pub fn check(&self, key: &str) -> Result<(), ApiError> {
        let now = Instant::now();
        let mut windows = self.windows.lock().unwrap_or_else(|e| e.into_inner());

        if windows.len() >= SWEEP_THRESHOLD {
            let window = self.window;
            windows.retain(|_, w| now.duration_since(w.started) < window);
        }

        let entry = windows.entry(key.to_string()).or_insert(Window {
            started: now,
            count: 0,
        });
        if now.duration_since(entry.started) >= self.window {
            entry.started = now;
            entry.count = 0;
        }
        if entry.count >= self.max {
            warn!(key = %key, max = self.max, "rate limit exceeded");
            return Err(ApiError::RateLimited);
        }
        entry.count += 1;
        Ok(())
    }
}

/// Key for the tight per-account policy: source address plus the normalized
/// login email, so neither rotating addresses nor spoofing the email alone
/// escapes the budget.
pub fn sensitive_key(ip: IpAddr, email: &str) -> String {
    format!("{}:{}", ip, email.trim().to_lowercase())
}

/// Broad per-origin limiter applied to the whole API surface.
pub async fn global_rate_limit(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let ip = client_ip_from_parts(request.headers(), request.extensions());
    state.global_limiter.check(&ip.to_string())?;
    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ip(s: &str) -> IpAddr {
        s.parse().expect("valid ip literal")
    }

    #[test]
    fn sixth_request_in_window_is_rejected() {
        let limiter = RateLimiter::new(5, Duration::from_secs(3600));
        let key = sensitive_key(ip("10.0.0.1"), "a@x.com");
        for _ in 0..5 {
            limiter.check(&key).expect("under budget");
        }
        let err = limiter.check(&key).unwrap_err();
        assert!(matches!(err, ApiError::RateLimited));
    }

    #[test]
    fn different_address_or_email_has_its_own_budget() {
        let limiter = RateLimiter::new(5, Duration::from_secs(3600));
        let exhausted = sensitive_key(ip("10.0.0.1"), "a@x.com");
        for _ in 0..5 {
            limiter.check(&exhausted).expect("under budget");
        }
        assert!(limiter.check(&exhausted).is_err());

        // same email, different source address
        limiter
            .check(&sensitive_key(ip("10.0.0.2"), "a@x.com"))
            .expect("other address not counted against the exhausted key");
        // same address, different email
        limiter
            .check(&sensitive_key(ip("10.0.0.1"), "b@x.com"))
            .expect("other email not counted against the exhausted key");
    }

    #[test]
    fn window_expiry_resets_the_budget() {
        let limiter = RateLimiter::new(2, Duration::from_millis(10));
        let key = "k";
        limiter.check(key).unwrap();
        limiter.check(key).unwrap();
        assert!(limiter.check(key).is_err());
        std::thread::sleep(Duration::from_millis(15));
        limiter.check(key).expect("fresh window after expiry");
    }

    #[test]
    fn email_is_normalized_into_the_key() {
        assert_eq!(
            sensitive_key(ip("10.0.0.1"), "  A@X.Com "),
            sensitive_key(ip("10.0.0.1"), "a@x.com")
        );
    }

    #[test]
    fn concurrent_checks_never_overshoot_by_more_than_the_cap() {
        let limiter = RateLimiter::new(50, Duration::from_secs(60));
        let mut handles = Vec::new();
        for _ in 0..8 {
            let limiter = limiter.clone();
            handles.push(std::thread::spawn(move || {
                let mut admitted = 0u32;
                for _ in 0..20 {
                    if limiter.check("shared").is_ok() {
                        admitted += 1;
                    }
                }
                admitted
            }));
        }
        let total: u32 = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(total, 50);
    }
}
