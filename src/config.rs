//! # Supervisor configuration.
//!
//! [`Config`] collects the knobs that shape supervisor behavior: the async
//! grace window applied after every internal deadline, the launch queue
//! depth, and the event bus capacity.
//!
//! # Example
//! ```
//! use std::time::Duration;
//! use appvisor::Config;
//!
//! let mut cfg = Config::default();
//! cfg.async_grace = Duration::from_millis(250);
//!
//! assert_eq!(cfg.launch_queue_capacity, 10);
//! ```

use std::time::Duration;

/// Configuration for a [`Supervisor`](crate::Supervisor).
#[derive(Clone, Debug)]
pub struct Config {
    /// Settlement window applied after a deadline fires, during which a late
    /// result from a user callback is still accepted instead of the deadline
    /// error. Must be positive and at most 5 seconds.
    ///
    /// Task wakeup order is not deterministic; without this window a callback
    /// that finishes "at the same time" as its deadline would race the
    /// timeout error. Raise it slightly on slow or heavily loaded hosts.
    pub async_grace: Duration,
    /// Buffer depth of the launch request queue (floored at 8).
    pub launch_queue_capacity: usize,
    /// Capacity of the event bus channel.
    pub bus_capacity: usize,
}

impl Default for Config {
    /// Provides a default configuration:
    /// - `async_grace = 100ms`
    /// - `launch_queue_capacity = 10`
    /// - `bus_capacity = 1024`
    fn default() -> Self {
        Self {
            async_grace: Duration::from_millis(100),
            launch_queue_capacity: 10,
            bus_capacity: 1024,
        }
    }
}

impl Config {
    /// Panics when a field is outside its documented domain.
    ///
    /// Out-of-range configuration is a programmer error, not a runtime
    /// condition.
    pub(crate) fn validate(&self) {
        if self.async_grace.is_zero() {
            panic!("Config.async_grace must be a positive, non-zero duration");
        }
        if self.async_grace > Duration::from_secs(5) {
            panic!("Config.async_grace must be at most 5 seconds; it is a grace period, not a timeout");
        }
    }
}
