//! Request middlewares.
//!
//! A [`Middleware`] sits between the caller and the terminal handler. It receives each
//! request together with the rest of the chain and must return the response of the
//! forwarded call that stands for the original request. It may send additional requests
//! of its own through the same handler before forwarding, such as an `Authenticate`
//! request; those travel over the same connection as any other request.
//!
//! # Key Components
//!
//! - [`AuthMiddleware`]: Authenticates once each time the connection is (re)opened.
//! - [`LoggingMiddleware`]: Logs each request with its outcome and latency.
//! - [`RetryMiddleware`]: Retries requests that failed at the transport level.
mod auth;
mod logging;
mod retry;

use crate::{
    error::Result,
    handler::Handler,
    protocol::{Request, Response},
};

pub use auth::AuthMiddleware;
pub use logging::LoggingMiddleware;
pub use retry::{Backoff, RetryMiddleware};

pub trait Middleware: Send + Sync {
    fn process(&self, request: Request, handler: &dyn Handler) -> Result<Response>;

    /// Name shown when the chain is inspected.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}
