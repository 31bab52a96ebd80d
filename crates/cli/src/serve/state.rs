//! Application state and rate limiting.

use std::collections::HashMap;
use std::net::IpAddr;
use std::time::Instant;

use tokio::sync::Mutex;

use camber_engine::JobService;
use camber_storage::MemoryStorage;

use super::RATE_LIMIT_WINDOW_SECS;

/// In-memory per-IP rate limiter over a fixed window.
pub(crate) struct RateLimiter {
    windows: Mutex<HashMap<IpAddr, Window>>,
    max_requests: u64,
}

struct Window {
    started_at: Instant,
    requests: u64,
}

impl RateLimiter {
    pub(crate) fn new(max_requests: u64) -> Self {
        Self {
            windows: Mutex::new(HashMap::new()),
            max_requests,
        }
    }

    /// Count a request from `ip` against its current window.
    /// Err carries the seconds until the window resets.
    pub(crate) async fn check(&self, ip: IpAddr) -> Result<(), u64> {
        let mut windows = self.windows.lock().await;
        let now = Instant::now();
        let window = windows.entry(ip).or_insert(Window {
            started_at: now,
            requests: 0,
        });

        let elapsed = now.duration_since(window.started_at).as_secs();
        if elapsed >= RATE_LIMIT_WINDOW_SECS {
            window.started_at = now;
            window.requests = 0;
        }

        window.requests += 1;
        if window.requests > self.max_requests {
            Err(RATE_LIMIT_WINDOW_SECS.saturating_sub(elapsed))
        } else {
            Ok(())
        }
    }
}

/// Application state shared across request handlers.
pub(crate) struct AppState {
    /// The job service over the server's storage backend.
    pub(crate) service: JobService<MemoryStorage>,
    /// Per-IP rate limiter.
    pub(crate) rate_limiter: RateLimiter,
    /// Optional staff API key. None = no auth required.
    pub(crate) api_key: Option<String>,
}
