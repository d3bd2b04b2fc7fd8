//! Client-server communication protocol.
//!
//! This module defines the binary protocol spoken with the server: the greeting read when a
//! connection is opened, the typed [`Request`] values the client can send, the decoded
//! [`Response`] and the framing used to move both over a byte stream.
//!
//! # Overview
//!
//! Every exchange is a strict request/response pair. The client writes one frame and blocks
//! until the frame carrying the same sync id comes back. Nothing is pipelined: at most one
//! request is in flight on a stream.
//!
//! # Binary Format
//!
//! - A connection starts with a 128 byte greeting sent by the server. It names the server
//!   and carries the random salt used to scramble the password during authentication.
//! - Each frame is a MessagePack `uint32` length followed by two MessagePack maps: a header
//!   (request type or response code, sync id, schema id) and a type specific body.
//! - Failed responses set bit `0x8000` in the response code and carry the server message.
//!
//! # Key Components
//!
//! - [`Request`]: Typed request variants and their encoding.
//! - [`Response`]: A decoded response, either a success body or a failure descriptor.
//! - [`Greeting`]: Parsed server greeting and the challenge-response scramble.
//! - [`ProtocolTransport`]: Frame reader/writer over any `Read + Write` stream.
mod greeting;
mod request;
mod response;
mod transport;

pub use greeting::{GREETING_SIZE, Greeting, scramble};
pub use request::{Request, RequestType};
pub use response::Response;
pub use transport::ProtocolTransport;

pub(crate) mod keys {
    pub(crate) const CODE: u64 = 0x00;
    pub(crate) const SYNC: u64 = 0x01;
    pub(crate) const SCHEMA_ID: u64 = 0x05;

    pub(crate) const SPACE_ID: u64 = 0x10;
    pub(crate) const INDEX_ID: u64 = 0x11;
    pub(crate) const LIMIT: u64 = 0x12;
    pub(crate) const OFFSET: u64 = 0x13;
    pub(crate) const ITERATOR: u64 = 0x14;
    pub(crate) const KEY: u64 = 0x20;
    pub(crate) const TUPLE: u64 = 0x21;
    pub(crate) const USER_NAME: u64 = 0x23;
    pub(crate) const OPS: u64 = 0x28;
    pub(crate) const DATA: u64 = 0x30;
    pub(crate) const ERROR_24: u64 = 0x31;
    pub(crate) const ERROR: u64 = 0x52;

    /// Keys inside the `ERROR` stack entries.
    pub(crate) const ERROR_STACK: u64 = 0x00;
    pub(crate) const ERROR_MESSAGE: u64 = 0x03;
}

/// Index iteration strategy used by a select.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IteratorType {
    Eq,
    Req,
    All,
    Lt,
    Le,
    Ge,
    Gt,
    BitsAllSet,
    BitsAnySet,
    BitsAllNotSet,
    Overlaps,
    Neighbor,
}

impl IteratorType {
    pub fn code(self) -> u8 {
        match self {
            IteratorType::Eq => 0,
            IteratorType::Req => 1,
            IteratorType::All => 2,
            IteratorType::Lt => 3,
            IteratorType::Le => 4,
            IteratorType::Ge => 5,
            IteratorType::Gt => 6,
            IteratorType::BitsAllSet => 7,
            IteratorType::BitsAnySet => 8,
            IteratorType::BitsAllNotSet => 9,
            IteratorType::Overlaps => 10,
            IteratorType::Neighbor => 11,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        Some(match code {
            0 => IteratorType::Eq,
            1 => IteratorType::Req,
            2 => IteratorType::All,
            3 => IteratorType::Lt,
            4 => IteratorType::Le,
            5 => IteratorType::Ge,
            6 => IteratorType::Gt,
            7 => IteratorType::BitsAllSet,
            8 => IteratorType::BitsAnySet,
            9 => IteratorType::BitsAllNotSet,
            10 => IteratorType::Overlaps,
            11 => IteratorType::Neighbor,
            _ => return None,
        })
    }
}
