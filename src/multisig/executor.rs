//! Execution sink: the capability that carries out approved transactions
//!
//! The vault never dispatches calls itself. Once a transaction has
//! reached quorum it hands a [`Call`] to an injected [`ExecutionSink`] and
//! only records the transaction as executed if the sink reports success.

use crate::crypto::encoding::encode_payload;
use std::thread;
use std::time::Duration;
use thiserror::Error;

/// Failures reported by an execution sink
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExecutionError {
    /// Downstream refused the call; retrying will not help
    #[error("call rejected: {0}")]
    Rejected(String),
    /// Downstream could not be reached; the call may succeed later
    #[error("sink unavailable: {0}")]
    Unavailable(String),
    /// The holding pool cannot cover the transaction value
    #[error("insufficient funds: have {have}, need {need}")]
    InsufficientFunds { have: u128, need: u128 },
}

impl ExecutionError {
    /// Whether another attempt within the same execute call may succeed
    pub fn is_transient(&self) -> bool {
        matches!(self, ExecutionError::Unavailable(_))
    }
}

/// An approved operation handed to the sink
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Call {
    pub index: usize,
    pub target: String,
    pub value: u128,
    pub payload: Vec<u8>,
}

/// Carries out approved calls
pub trait ExecutionSink: Send + Sync {
    fn invoke(&self, call: &Call) -> Result<(), ExecutionError>;
}

impl<F> ExecutionSink for F
where
    F: Fn(&Call) -> Result<(), ExecutionError> + Send + Sync,
{
    fn invoke(&self, call: &Call) -> Result<(), ExecutionError> {
        self(call)
    }
}

/// Sink that accepts every call and logs it
///
/// Used when no downstream ledger is attached (CLI, standalone server).
#[derive(Clone, Copy, Debug, Default)]
pub struct LoggingSink;

impl ExecutionSink for LoggingSink {
    fn invoke(&self, call: &Call) -> Result<(), ExecutionError> {
        log::info!(
            "Dispatching tx #{}: {} -> {} with {}",
            call.index,
            call.value,
            call.target,
            encode_payload(&call.payload)
        );
        Ok(())
    }
}

/// Bounded retry of transient sink failures
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total invocations allowed per execute call (0 is treated as 1)
    pub max_attempts: u32,
    /// Pause between attempts
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    /// Pass-through: one attempt, failures go straight to the caller
    fn default() -> Self {
        Self {
            max_attempts: 1,
            backoff: Duration::ZERO,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, backoff: Duration) -> Self {
        Self {
            max_attempts,
            backoff,
        }
    }

    /// Invoke `sink` until it succeeds, fails permanently, or attempts run out
    ///
    /// Returns the number of attempts made on success.
    pub fn run(&self, sink: &dyn ExecutionSink, call: &Call) -> Result<u32, ExecutionError> {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            match sink.invoke(call) {
                Ok(()) => return Ok(attempt),
                Err(e) if e.is_transient() && attempt < max_attempts => {
                    log::debug!(
                        "tx #{} attempt {}/{} failed: {}",
                        call.index,
                        attempt,
                        max_attempts,
                        e
                    );
                    if !self.backoff.is_zero() {
                        thread::sleep(self.backoff);
                    }
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn call() -> Call {
        Call {
            index: 0,
            target: "recipient".to_string(),
            value: 0,
            payload: vec![0x01, 0x23],
        }
    }

    #[test]
    fn test_closure_sink() {
        let sink = |c: &Call| -> Result<(), ExecutionError> {
            if c.target == "recipient" {
                Ok(())
            } else {
                Err(ExecutionError::Rejected("unknown target".to_string()))
            }
        };
        assert!(sink.invoke(&call()).is_ok());
    }

    #[test]
    fn test_pass_through_policy() {
        let calls = AtomicU32::new(0);
        let sink = |_: &Call| -> Result<(), ExecutionError> {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(ExecutionError::Unavailable("down".to_string()))
        };

        let result = RetryPolicy::default().run(&sink, &call());
        assert_eq!(result, Err(ExecutionError::Unavailable("down".to_string())));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_transient_failures_retried() {
        let calls = AtomicU32::new(0);
        let sink = |_: &Call| -> Result<(), ExecutionError> {
            if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(ExecutionError::Unavailable("busy".to_string()))
            } else {
                Ok(())
            }
        };

        let policy = RetryPolicy::new(3, Duration::ZERO);
        assert_eq!(policy.run(&sink, &call()), Ok(3));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_retries_are_bounded() {
        let calls = AtomicU32::new(0);
        let sink = |_: &Call| -> Result<(), ExecutionError> {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(ExecutionError::Unavailable("down".to_string()))
        };

        let policy = RetryPolicy::new(4, Duration::from_millis(1));
        assert!(policy.run(&sink, &call()).is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn test_permanent_failure_not_retried() {
        let calls = AtomicU32::new(0);
        let sink = |_: &Call| -> Result<(), ExecutionError> {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(ExecutionError::Rejected("revert".to_string()))
        };

        let policy = RetryPolicy::new(5, Duration::ZERO);
        assert!(policy.run(&sink, &call()).is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_logging_sink_accepts() {
        assert!(LoggingSink.invoke(&call()).is_ok());
    }
}
