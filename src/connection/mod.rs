//! Connection lifecycle.
//!
//! A [`Connection`] is a logical handle on a byte stream to the server. It starts
//! Closed, becomes Open once [`Connection::open`] has connected and read the server
//! greeting, and goes back to Closed on [`Connection::close`] or on any transport failure.
//!
//! # Overview
//!
//! - `open()` on an open connection is a no-op that returns the greeting of the existing
//!   stream, so the salt (and with it the stream identity) does not change.
//! - `send()` opens lazily, assigns the next sync id, writes one frame and blocks until
//!   the response frame is read. A sync mismatch, a broken stream or a timeout closes the
//!   connection before the error is returned, so no caller resumes on a stream left
//!   mid-frame.
//! - Persistent connections reference a session held by a [`ConnectionRegistry`] under a
//!   persistence key. Every connection built with the same key observes the same session:
//!   if one of them closes it, all of them see Closed and the next sender re-opens it.
//!
//! # Key Components
//!
//! - [`Connector`]: Produces the raw duplex stream. [`TcpConnector`] is the default.
//! - [`ConnectionRegistry`]: Holds persistent sessions by key.
mod registry;

use std::{
    fmt,
    io::{self, Read, Write},
    net::{TcpStream, ToSocketAddrs},
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use log::{debug, info, warn};

use crate::{
    config::Config,
    error::{Error, Result},
    ext::ExtensionRegistry,
    protocol::{Greeting, ProtocolTransport, Request, Response},
};

pub use registry::ConnectionRegistry;

/// A duplex byte stream.
pub trait Stream: Read + Write + Send {}

impl<T: Read + Write + Send> Stream for T {}

/// Opens the raw stream a [`Connection`] talks over.
pub trait Connector: Send + Sync {
    fn connect(&self) -> io::Result<Box<dyn Stream>>;

    /// Human readable target, used in logs.
    fn target(&self) -> String;
}

/// Connects over TCP.
#[derive(Debug, Clone)]
pub struct TcpConnector {
    address: String,
    connect_timeout: Duration,
    socket_timeout: Option<Duration>,
    nodelay: bool,
}

impl TcpConnector {
    pub fn new(address: impl Into<String>) -> Self {
        Self::from_config(&Config::default().with_address(address))
    }

    pub fn from_config(config: &Config) -> Self {
        Self {
            address: config.address().to_string(),
            connect_timeout: config.connect_timeout(),
            socket_timeout: config.socket_timeout(),
            nodelay: config.tcp_nodelay(),
        }
    }
}

impl Connector for TcpConnector {
    fn connect(&self) -> io::Result<Box<dyn Stream>> {
        let mut last_err = None;

        for addr in self.address.to_socket_addrs()? {
            match TcpStream::connect_timeout(&addr, self.connect_timeout) {
                Ok(stream) => {
                    stream.set_nodelay(self.nodelay)?;
                    stream.set_read_timeout(self.socket_timeout)?;
                    stream.set_write_timeout(self.socket_timeout)?;
                    return Ok(Box::new(stream));
                }
                Err(e) => {
                    debug!("failed to connect to {addr}: {e}");
                    last_err = Some(e);
                }
            }
        }

        Err(last_err.unwrap_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("'{}' did not resolve to any address", self.address),
            )
        }))
    }

    fn target(&self) -> String {
        self.address.clone()
    }
}

/// An open stream and the state tied to it.
pub(crate) struct Session {
    transport: ProtocolTransport<Box<dyn Stream>>,
    greeting: Greeting,
    next_sync: u64,
}

pub(crate) type SharedSession = Arc<Mutex<Option<Session>>>;

/// A logical connection to the server.
///
/// A persistent connection has no Open/Closed state of its own: [`Connection::is_closed`]
/// reports the shared session, so a close through any handle on the same key is seen by
/// all of them.
pub struct Connection {
    connector: Arc<dyn Connector>,
    session: SharedSession,
    persistence_key: Option<String>,
}

impl Connection {
    /// A connection owning its own stream.
    pub fn new(connector: Arc<dyn Connector>) -> Self {
        Self {
            connector,
            session: Arc::new(Mutex::new(None)),
            persistence_key: None,
        }
    }

    /// A connection sharing the session stored under `key` in `registry`.
    pub fn persistent(
        connector: Arc<dyn Connector>,
        key: impl Into<String>,
        registry: &ConnectionRegistry,
    ) -> Self {
        let key = key.into();
        Self {
            connector,
            session: registry.session(&key),
            persistence_key: Some(key),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Option<Session>> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Whether the session is closed. For persistent connections this is the shared session.
    pub fn is_closed(&self) -> bool {
        self.lock().is_none()
    }

    pub fn is_persistent(&self) -> bool {
        self.persistence_key.is_some()
    }

    pub fn persistence_key(&self) -> Option<&str> {
        self.persistence_key.as_deref()
    }

    /// Opens the connection and returns the server greeting.
    ///
    /// Does nothing if the connection is already open.
    pub fn open(&self) -> Result<Greeting> {
        let mut slot = self.lock();
        let session = self.ensure_open(&mut slot)?;
        Ok(session.greeting.clone())
    }

    fn ensure_open<'s>(&self, slot: &'s mut Option<Session>) -> Result<&'s mut Session> {
        if slot.is_none() {
            let stream = self.connector.connect().map_err(Error::Connect)?;
            let mut transport = ProtocolTransport::new(stream);
            let greeting = transport.read_greeting()?;

            info!(
                "connected to {} ({})",
                self.connector.target(),
                greeting.server()
            );
            *slot = Some(Session {
                transport,
                greeting,
                next_sync: 0,
            });
        }

        slot.as_mut()
            .ok_or_else(|| Error::Protocol("connection is not open".into()))
    }

    /// Closes the connection. Closing a closed connection does nothing.
    pub fn close(&self) {
        if self.lock().take().is_some() {
            info!("closed connection to {}", self.connector.target());
        }
    }

    /// Sends `request` and blocks until its response is read.
    ///
    /// The response is returned as received; failures reported by the server are
    /// mapped by the caller.
    pub fn send(&self, request: &Request, extensions: &ExtensionRegistry) -> Result<Response> {
        let mut slot = self.lock();
        let session = self.ensure_open(&mut slot)?;

        let sync = session.next_sync;
        session.next_sync += 1;
        let payload = request.encode(sync, extensions)?;
        debug!("sending {} (sync {sync})", request.request_type());

        let result = exchange(session, &payload, sync, extensions);
        if let Err(e) = &result {
            warn!(
                "closing connection to {} after failed exchange: {e}",
                self.connector.target()
            );
            *slot = None;
        }
        result
    }
}

fn exchange(
    session: &mut Session,
    payload: &[u8],
    sync: u64,
    extensions: &ExtensionRegistry,
) -> Result<Response> {
    session.transport.write_frame(payload)?;
    let frame = session.transport.read_frame()?;
    let response = Response::decode(&frame, extensions)?;

    if response.sync() != sync {
        return Err(Error::Protocol(format!(
            "expected response for sync {sync}, got {}",
            response.sync()
        )));
    }
    Ok(response)
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("target", &self.connector.target())
            .field("persistence_key", &self.persistence_key)
            .field("closed", &self.is_closed())
            .finish()
    }
}
