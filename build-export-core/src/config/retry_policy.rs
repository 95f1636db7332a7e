use serde::Deserialize;
use std::time::Duration;

#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Consecutive failures tolerated before the stream is abandoned, 0 disables retrying.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_retry_interval_ms")]
    pub retry_interval_ms: u64,
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_interval_ms() -> u64 {
    1000
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            max_retries: default_max_retries(),
            retry_interval_ms: default_retry_interval_ms(),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32, retry_interval: Duration) -> RetryPolicy {
        RetryPolicy {
            max_retries,
            retry_interval_ms: retry_interval.as_millis() as u64,
        }
    }

    /// The discovery stream can sit idle for a long time between builds.
    pub fn discovery() -> RetryPolicy {
        RetryPolicy::new(30, Duration::from_millis(6000))
    }

    /// Every build should eventually finish, even over a flaky network.
    pub fn per_build() -> RetryPolicy {
        RetryPolicy::new(100, Duration::from_millis(2000))
    }

    pub fn retry_interval(&self) -> Duration {
        Duration::from_millis(self.retry_interval_ms)
    }
}
