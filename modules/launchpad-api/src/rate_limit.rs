use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Admission control for operator-triggered work.
pub trait RateLimiter: Send + Sync {
    /// Count one call. Returns false if the call is over the limit.
    fn try_acquire(&self) -> bool;
}

#[derive(Debug, Clone, Copy)]
struct Window {
    started: Instant,
    count: usize,
}

/// At most `max` calls per window. A window opens at the first call counted
/// in it and closes once more than `length` has elapsed since.
#[derive(Debug)]
pub struct FixedWindowLimiter {
    max: usize,
    length: Duration,
    window: Mutex<Option<Window>>,
}

impl FixedWindowLimiter {
    pub fn new(max: usize, length: Duration) -> Self {
        Self {
            max,
            length,
            window: Mutex::new(None),
        }
    }

    pub fn per_hour(max: usize) -> Self {
        Self::new(max, Duration::from_secs(3600))
    }

    pub fn try_acquire_at(&self, now: Instant) -> bool {
        let mut window = self.window.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let current = match *window {
            Some(w) if now.saturating_duration_since(w.started) <= self.length => w,
            _ => Window {
                started: now,
                count: 0,
            },
        };
        if current.count >= self.max {
            *window = Some(current);
            return false;
        }
        *window = Some(Window {
            count: current.count + 1,
            ..current
        });
        true
    }
}

impl RateLimiter for FixedWindowLimiter {
    fn try_acquire(&self) -> bool {
        self.try_acquire_at(Instant::now())
    }
}
