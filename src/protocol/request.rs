use std::fmt;

use crate::{
    error::Result,
    ext::ExtensionRegistry,
    schema::Operations,
    value::{Tuple, Value},
};

use super::{Greeting, IteratorType, keys, scramble};

/// Request type codes written into the frame header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestType {
    Select,
    Insert,
    Replace,
    Update,
    Delete,
    Authenticate,
    Upsert,
    Ping,
}

impl RequestType {
    pub fn code(self) -> u8 {
        match self {
            RequestType::Select => 0x01,
            RequestType::Insert => 0x02,
            RequestType::Replace => 0x03,
            RequestType::Update => 0x04,
            RequestType::Delete => 0x05,
            RequestType::Authenticate => 0x07,
            RequestType::Upsert => 0x09,
            RequestType::Ping => 0x40,
        }
    }

    /// Whether sending the request twice leaves the server as sending it once.
    pub fn is_idempotent(self) -> bool {
        matches!(
            self,
            RequestType::Select | RequestType::Authenticate | RequestType::Ping
        )
    }

    pub fn from_code(code: u8) -> Option<Self> {
        Some(match code {
            0x01 => RequestType::Select,
            0x02 => RequestType::Insert,
            0x03 => RequestType::Replace,
            0x04 => RequestType::Update,
            0x05 => RequestType::Delete,
            0x07 => RequestType::Authenticate,
            0x09 => RequestType::Upsert,
            0x40 => RequestType::Ping,
            _ => return None,
        })
    }
}

impl fmt::Display for RequestType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RequestType::Select => "select",
            RequestType::Insert => "insert",
            RequestType::Replace => "replace",
            RequestType::Update => "update",
            RequestType::Delete => "delete",
            RequestType::Authenticate => "auth",
            RequestType::Upsert => "upsert",
            RequestType::Ping => "ping",
        };
        f.write_str(name)
    }
}

/// A typed request. Immutable once built; the sync id is assigned when it is sent.
#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    /// Credentials, with the password already scrambled against the connection salt.
    Authenticate {
        username: String,
        scramble: [u8; 20],
    },
    Select {
        space_id: u32,
        index_id: u32,
        key: Vec<Value>,
        limit: u32,
        offset: u32,
        iterator: IteratorType,
    },
    Insert {
        space_id: u32,
        tuple: Tuple,
    },
    Replace {
        space_id: u32,
        tuple: Tuple,
    },
    Update {
        space_id: u32,
        index_id: u32,
        key: Vec<Value>,
        operations: Operations,
    },
    Upsert {
        space_id: u32,
        tuple: Tuple,
        operations: Operations,
    },
    Delete {
        space_id: u32,
        index_id: u32,
        key: Vec<Value>,
    },
    Ping,
}

impl Request {
    /// Builds an `Authenticate` request against the salt of an opened connection.
    pub fn authenticate(greeting: &Greeting, username: &str, password: &str) -> Self {
        Request::Authenticate {
            username: username.to_string(),
            scramble: scramble(greeting.salt(), password),
        }
    }

    pub fn request_type(&self) -> RequestType {
        match self {
            Request::Authenticate { .. } => RequestType::Authenticate,
            Request::Select { .. } => RequestType::Select,
            Request::Insert { .. } => RequestType::Insert,
            Request::Replace { .. } => RequestType::Replace,
            Request::Update { .. } => RequestType::Update,
            Request::Upsert { .. } => RequestType::Upsert,
            Request::Delete { .. } => RequestType::Delete,
            Request::Ping => RequestType::Ping,
        }
    }

    /// Encodes header and body for the given sync id. The frame length is
    /// added by the transport.
    pub fn encode(&self, sync: u64, extensions: &ExtensionRegistry) -> Result<Vec<u8>> {
        let header = rmpv::Value::Map(vec![
            (
                rmpv::Value::from(keys::CODE),
                rmpv::Value::from(self.request_type().code()),
            ),
            (rmpv::Value::from(keys::SYNC), rmpv::Value::from(sync)),
        ]);
        let body = rmpv::Value::Map(
            self.body(extensions)?
                .into_iter()
                .map(|(k, v)| (rmpv::Value::from(k), v))
                .collect(),
        );

        let mut buf = Vec::new();
        rmpv::encode::write_value(&mut buf, &header)?;
        rmpv::encode::write_value(&mut buf, &body)?;
        Ok(buf)
    }

    fn body(&self, extensions: &ExtensionRegistry) -> Result<Vec<(u64, rmpv::Value)>> {
        let values = |values: &[Value]| -> Result<rmpv::Value> {
            Ok(rmpv::Value::Array(
                values
                    .iter()
                    .map(|v| v.to_wire(extensions))
                    .collect::<Result<_>>()?,
            ))
        };

        Ok(match self {
            Request::Authenticate { username, scramble } => vec![
                (keys::USER_NAME, rmpv::Value::from(username.as_str())),
                (
                    keys::TUPLE,
                    rmpv::Value::Array(vec![
                        rmpv::Value::from("chap-sha1"),
                        rmpv::Value::Binary(scramble.to_vec()),
                    ]),
                ),
            ],
            Request::Select {
                space_id,
                index_id,
                key,
                limit,
                offset,
                iterator,
            } => vec![
                (keys::SPACE_ID, rmpv::Value::from(*space_id)),
                (keys::INDEX_ID, rmpv::Value::from(*index_id)),
                (keys::LIMIT, rmpv::Value::from(*limit)),
                (keys::OFFSET, rmpv::Value::from(*offset)),
                (keys::ITERATOR, rmpv::Value::from(iterator.code())),
                (keys::KEY, values(key)?),
            ],
            Request::Insert { space_id, tuple } | Request::Replace { space_id, tuple } => vec![
                (keys::SPACE_ID, rmpv::Value::from(*space_id)),
                (keys::TUPLE, values(tuple)?),
            ],
            Request::Update {
                space_id,
                index_id,
                key,
                operations,
            } => vec![
                (keys::SPACE_ID, rmpv::Value::from(*space_id)),
                (keys::INDEX_ID, rmpv::Value::from(*index_id)),
                (keys::KEY, values(key)?),
                (keys::TUPLE, operations.to_wire(extensions)?),
            ],
            Request::Upsert {
                space_id,
                tuple,
                operations,
            } => vec![
                (keys::SPACE_ID, rmpv::Value::from(*space_id)),
                (keys::TUPLE, values(tuple)?),
                (keys::OPS, operations.to_wire(extensions)?),
            ],
            Request::Delete {
                space_id,
                index_id,
                key,
            } => vec![
                (keys::SPACE_ID, rmpv::Value::from(*space_id)),
                (keys::INDEX_ID, rmpv::Value::from(*index_id)),
                (keys::KEY, values(key)?),
            ],
            Request::Ping => vec![],
        })
    }
}
