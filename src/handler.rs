//! Request handlers and the middleware chain.
//!
//! A [`Handler`] turns a [`Request`] into a [`Response`], blocking until the response has
//! been read. The [`DefaultHandler`] is the terminal handler: it sends the request over
//! its [`Connection`] and maps failed responses into [`Error::RequestFailed`].
//!
//! A [`Chain`] wraps a terminal handler in an ordered list of middlewares. The list is
//! fixed at construction and given outermost-first: the first middleware sees every
//! request before any other, and its `next` handler dispatches to the second middleware,
//! and so on down to the terminal handler.
//!
//! # Example
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use tarantool_client::{
//!     connection::{Connection, TcpConnector},
//!     ext::ExtensionRegistry,
//!     handler::{Chain, DefaultHandler, Handler},
//!     middleware::{AuthMiddleware, LoggingMiddleware},
//!     protocol::Request,
//! };
//!
//! let connection = Connection::new(Arc::new(TcpConnector::new("127.0.0.1:3301")));
//! let terminal = DefaultHandler::new(connection, ExtensionRegistry::default());
//! let chain = Chain::new(
//!     terminal,
//!     vec![
//!         Arc::new(LoggingMiddleware::default()),
//!         Arc::new(AuthMiddleware::new("user_foo", "foo")),
//!     ],
//! );
//!
//! chain.handle(Request::Ping).unwrap();
//! ```
//!
//! [`Error::RequestFailed`]: crate::Error::RequestFailed
use std::{fmt, sync::Arc};

use crate::{
    connection::Connection,
    error::Result,
    ext::ExtensionRegistry,
    middleware::Middleware,
    protocol::{Request, Response},
};

pub trait Handler {
    /// Sends `request` and returns its successful response.
    fn handle(&self, request: Request) -> Result<Response>;

    /// The connection requests are eventually sent over.
    fn connection(&self) -> &Connection;
}

impl<H: Handler + ?Sized> Handler for &H {
    fn handle(&self, request: Request) -> Result<Response> {
        H::handle(self, request)
    }

    fn connection(&self) -> &Connection {
        H::connection(self)
    }
}

/// Sends requests over a [`Connection`].
#[derive(Debug)]
pub struct DefaultHandler {
    connection: Connection,
    extensions: ExtensionRegistry,
}

impl DefaultHandler {
    pub fn new(connection: Connection, extensions: ExtensionRegistry) -> Self {
        Self {
            connection,
            extensions,
        }
    }

    pub fn extensions(&self) -> &ExtensionRegistry {
        &self.extensions
    }
}

impl Handler for DefaultHandler {
    fn handle(&self, request: Request) -> Result<Response> {
        self.connection
            .send(&request, &self.extensions)?
            .into_result()
    }

    fn connection(&self) -> &Connection {
        &self.connection
    }
}

/// A terminal handler wrapped in a fixed, ordered list of middlewares.
pub struct Chain<H = DefaultHandler> {
    terminal: H,
    middlewares: Vec<Arc<dyn Middleware>>,
}

impl<H: Handler> Chain<H> {
    /// Builds the chain; `middlewares` is ordered outermost-first.
    pub fn new(terminal: H, middlewares: Vec<Arc<dyn Middleware>>) -> Self {
        Self {
            terminal,
            middlewares,
        }
    }

    pub fn middlewares(&self) -> &[Arc<dyn Middleware>] {
        &self.middlewares
    }

    pub fn terminal(&self) -> &H {
        &self.terminal
    }

    fn dispatch(&self, depth: usize, request: Request) -> Result<Response> {
        match self.middlewares.get(depth) {
            Some(middleware) => middleware.process(
                request,
                &Next {
                    chain: self,
                    depth: depth + 1,
                },
            ),
            None => self.terminal.handle(request),
        }
    }
}

impl<H: Handler> Handler for Chain<H> {
    fn handle(&self, request: Request) -> Result<Response> {
        self.dispatch(0, request)
    }

    fn connection(&self) -> &Connection {
        self.terminal.connection()
    }
}

impl<H: fmt::Debug> fmt::Debug for Chain<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names = self
            .middlewares
            .iter()
            .map(|m| m.name())
            .collect::<Vec<_>>();
        f.debug_struct("Chain")
            .field("middlewares", &names)
            .field("terminal", &self.terminal)
            .finish()
    }
}

/// The rest of the chain, as seen by the middleware at `depth - 1`.
struct Next<'a, H> {
    chain: &'a Chain<H>,
    depth: usize,
}

impl<H: Handler> Handler for Next<'_, H> {
    fn handle(&self, request: Request) -> Result<Response> {
        self.chain.dispatch(self.depth, request)
    }

    fn connection(&self) -> &Connection {
        self.chain.connection()
    }
}
