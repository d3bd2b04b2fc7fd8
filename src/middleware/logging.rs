use std::time::Instant;

use log::{Level, log, log_enabled};

use crate::{
    error::Result,
    handler::Handler,
    protocol::{Request, Response},
};

use super::Middleware;

/// Logs every request with its outcome and how long it took.
#[derive(Debug, Clone)]
pub struct LoggingMiddleware {
    level: Level,
}

impl LoggingMiddleware {
    pub fn new(level: Level) -> Self {
        Self { level }
    }
}

impl Default for LoggingMiddleware {
    fn default() -> Self {
        Self::new(Level::Debug)
    }
}

impl Middleware for LoggingMiddleware {
    fn process(&self, request: Request, handler: &dyn Handler) -> Result<Response> {
        if !log_enabled!(self.level) {
            return handler.handle(request);
        }

        let kind = request.request_type();
        log!(self.level, "request {kind}: {request:?}");

        let start = Instant::now();
        let result = handler.handle(request);
        let elapsed = start.elapsed();

        match &result {
            Ok(response) => log!(
                self.level,
                "response {kind} (sync {}) in {elapsed:?}",
                response.sync()
            ),
            Err(e) => log!(self.level, "request {kind} failed in {elapsed:?}: {e}"),
        }
        result
    }

    fn name(&self) -> &str {
        "logging"
    }
}
