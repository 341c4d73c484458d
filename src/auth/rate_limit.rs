use std::{
    collections::HashMap,
    net::{IpAddr, SocketAddr},
    time::{Duration, Instant},
};

use axum::{
    extract::{ConnectInfo, Request, State},
    middleware::Next,
    response::Response,
};
use parking_lot::RwLock;
use tracing::warn;

use crate::db::AppState;
use crate::error::ApiError;

pub const MAX_AUTH_ATTEMPTS: usize = 5;
pub const AUTH_WINDOW: Duration = Duration::from_secs(15 * 60);

/// Sliding-window request limiter keyed by source IP. Stale hits are pruned
/// on every check, so entries self-clean as the window moves.
pub struct RateLimiter {
    entries: RwLock<HashMap<IpAddr, Vec<Instant>>>,
    max: usize,
    window: Duration,
}

impl RateLimiter {
    pub fn new(max: usize, window: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            max,
            window,
        }
    }

    /// Returns true and records the hit when the request is allowed.
    pub fn check_and_record(&self, ip: IpAddr) -> bool {
        let now = Instant::now();
        let mut map = self.entries.write();
        let hits = map.entry(ip).or_default();
        hits.retain(|t| now.duration_since(*t) < self.window);
        if hits.len() >= self.max {
            false
        } else {
            hits.push(now);
            true
        }
    }
}

/// Gate for the credential endpoints; the rejection is uniform no matter
/// what the request carried.
pub async fn limit_auth_attempts(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if !state.limiter.check_and_record(addr.ip()) {
        warn!(ip = %addr.ip(), "auth rate limit exceeded");
        return Err(ApiError::RateLimited);
    }
    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allows_up_to_the_limit_then_blocks() {
        let limiter = RateLimiter::new(5, Duration::from_secs(60));
        let ip: IpAddr = "127.0.0.1".parse().unwrap();

        for _ in 0..5 {
            assert!(limiter.check_and_record(ip));
        }
        assert!(!limiter.check_and_record(ip));
    }

    #[test]
    fn quotas_are_per_ip() {
        let limiter = RateLimiter::new(2, Duration::from_secs(60));
        let ip1: IpAddr = "127.0.0.1".parse().unwrap();
        let ip2: IpAddr = "127.0.0.2".parse().unwrap();

        assert!(limiter.check_and_record(ip1));
        assert!(limiter.check_and_record(ip1));
        assert!(!limiter.check_and_record(ip1));

        assert!(limiter.check_and_record(ip2));
        assert!(limiter.check_and_record(ip2));
        assert!(!limiter.check_and_record(ip2));
    }

    #[test]
    fn hits_outside_the_window_are_pruned() {
        // Zero-length window: every previous hit is stale by the next check.
        let limiter = RateLimiter::new(1, Duration::ZERO);
        let ip: IpAddr = "127.0.0.1".parse().unwrap();

        assert!(limiter.check_and_record(ip));
        assert!(limiter.check_and_record(ip));
    }
}
