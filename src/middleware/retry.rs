use std::{thread, time::Duration};

use log::warn;

use crate::{
    error::{Error, Result},
    handler::Handler,
    protocol::{Request, Response},
};

use super::Middleware;

/// Upper bound on any single delay between two attempts.
const MAX_DELAY: Duration = Duration::from_secs(30);

/// Delay before each retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    /// The same delay before every retry.
    Constant(Duration),
    /// `step`, then `2 * step`, then `3 * step`, ...
    Linear(Duration),
    /// `base`, then `2 * base`, then `4 * base`, ...
    Exponential(Duration),
}

impl Backoff {
    /// Delay before retry number `retry`, starting from 1.
    pub fn delay(self, retry: u32) -> Duration {
        let delay = match self {
            Backoff::Constant(delay) => delay,
            Backoff::Linear(step) => step.saturating_mul(retry),
            Backoff::Exponential(base) => {
                base.saturating_mul(1u32 << retry.saturating_sub(1).min(16))
            }
        };
        delay.min(MAX_DELAY)
    }
}

/// Retries requests that failed at the transport level.
///
/// Only I/O failures and timeouts are retried. A failure reported by the server is
/// returned immediately, since sending the same request again would fail the same way.
/// The failed connection has already been closed by then, so a retry re-opens it and,
/// when an [`AuthMiddleware`](super::AuthMiddleware) sits further in, re-authenticates.
///
/// Writes (`insert`, `replace`, `update`, `upsert`, `delete`) are retried only when the
/// connection could not be established, because after a broken exchange the server may
/// already have applied them. [`RetryMiddleware::with_write_retries`] lifts that limit.
#[derive(Debug, Clone)]
pub struct RetryMiddleware {
    max_retries: u32,
    backoff: Backoff,
    retry_writes: bool,
}

impl RetryMiddleware {
    pub fn new(max_retries: u32, backoff: Backoff) -> Self {
        Self {
            max_retries,
            backoff,
            retry_writes: false,
        }
    }

    /// Retries writes after any transport failure, at the risk of applying them twice.
    pub fn with_write_retries(mut self, retry_writes: bool) -> Self {
        self.retry_writes = retry_writes;
        self
    }

    fn should_retry(&self, request: &Request, error: &Error) -> bool {
        if !error.is_transport() {
            return false;
        }
        self.retry_writes || error.is_unsent() || request.request_type().is_idempotent()
    }

    pub fn constant(max_retries: u32, delay: Duration) -> Self {
        Self::new(max_retries, Backoff::Constant(delay))
    }

    pub fn linear(max_retries: u32, step: Duration) -> Self {
        Self::new(max_retries, Backoff::Linear(step))
    }

    pub fn exponential(max_retries: u32, base: Duration) -> Self {
        Self::new(max_retries, Backoff::Exponential(base))
    }
}

impl Middleware for RetryMiddleware {
    fn process(&self, request: Request, handler: &dyn Handler) -> Result<Response> {
        let mut retry = 0;
        loop {
            match handler.handle(request.clone()) {
                Err(e) if retry < self.max_retries && self.should_retry(&request, &e) => {
                    retry += 1;
                    let delay = self.backoff.delay(retry);
                    warn!(
                        "{} failed ({e}), retry {retry}/{} in {delay:?}",
                        request.request_type(),
                        self.max_retries
                    );
                    thread::sleep(delay);
                }
                result => return result,
            }
        }
    }

    fn name(&self) -> &str {
        "retry"
    }
}
