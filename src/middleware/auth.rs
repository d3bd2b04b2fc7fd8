use std::fmt;

use log::info;

use crate::{
    error::Result,
    handler::Handler,
    protocol::{Request, Response},
};

use super::Middleware;

/// Authenticates the connection each time it is opened.
///
/// The middleware checks the connection before forwarding a request. If it is closed, it
/// opens it, sends one `Authenticate` request scrambled with the fresh salt, and only then
/// forwards the original request. A failed authentication closes the connection and is
/// returned as is; the original request is not sent.
///
/// Place it innermost in the chain so that every request, schema lookups included, passes
/// through it right before reaching the connection.
pub struct AuthMiddleware {
    username: String,
    password: String,
}

impl AuthMiddleware {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }
}

impl Middleware for AuthMiddleware {
    fn process(&self, request: Request, handler: &dyn Handler) -> Result<Response> {
        let connection = handler.connection();

        if connection.is_closed() {
            let greeting = connection.open()?;
            let auth = Request::authenticate(&greeting, &self.username, &self.password);
            if let Err(e) = handler.handle(auth) {
                // an open but unauthenticated stream would skip authentication next time
                connection.close();
                return Err(e);
            }
            info!("authenticated as '{}'", self.username);
        }

        handler.handle(request)
    }

    fn name(&self) -> &str {
        "auth"
    }
}

impl fmt::Debug for AuthMiddleware {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthMiddleware")
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}
