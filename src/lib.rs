pub mod cli;
pub mod client;
pub mod config;
pub mod connection;
pub mod error;
pub mod ext;
pub mod handler;
pub mod middleware;
pub mod protocol;
pub mod schema;
pub mod value;

#[cfg(test)]
pub(crate) mod mock;

pub use client::{Client, ClientBuilder};
pub use config::Config;
pub use connection::{Connection, ConnectionRegistry};
pub use error::{Error, Result};
pub use handler::{Chain, Handler};
pub use middleware::Middleware;
pub use protocol::{IteratorType, Request, Response};
pub use schema::{Criteria, IndexRef, Operations, Space};
pub use value::{Tuple, Value};
