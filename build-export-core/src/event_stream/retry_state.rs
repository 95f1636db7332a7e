use crate::config::RetryPolicy;
use crate::export_api::STATUS_COMPLETE;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RetryDecision {
    /// The server has nothing more to send; this is not an error.
    Complete,
    Retry,
    GiveUp,
}

/// Retry bookkeeping for one logical connection.
///
/// A failing attempt may be reported twice, once with the response status and once
/// without one. Only one report per attempt gets counted.
#[derive(Clone, Debug)]
pub struct RetryState {
    policy: RetryPolicy,
    retries: u32,
    counted_current_attempt: bool,
}

impl RetryState {
    pub fn new(policy: RetryPolicy) -> RetryState {
        RetryState {
            policy,
            retries: 0,
            counted_current_attempt: false,
        }
    }

    pub fn retries(&self) -> u32 {
        self.retries
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn on_open(&mut self) {
        self.retries = 0;
        self.counted_current_attempt = false;
    }

    pub fn next_attempt(&mut self) {
        self.counted_current_attempt = false;
    }

    pub fn on_error(&mut self, status: Option<u16>) -> RetryDecision {
        if status == Some(STATUS_COMPLETE) {
            return RetryDecision::Complete;
        }

        if self.policy.max_retries == 0 || self.retries >= self.policy.max_retries {
            return RetryDecision::GiveUp;
        }

        match status {
            Some(_) => {
                self.retries += 1;
                self.counted_current_attempt = true;
            }
            None if self.counted_current_attempt => (),
            None => {
                self.retries += 1;
                self.counted_current_attempt = true;
            }
        }
        RetryDecision::Retry
    }
}
