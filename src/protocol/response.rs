use std::collections::HashMap;

use crate::{
    error::{ERROR_FLAG, Error, Result, map_failure},
    ext::ExtensionRegistry,
    value::{Tuple, Value},
};

use super::keys;

/// A decoded response frame.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    sync: u64,
    schema_id: Option<u64>,
    outcome: Outcome,
}

#[derive(Debug, Clone, PartialEq)]
enum Outcome {
    Success { body: HashMap<u64, Value> },
    Failure { status: u32, message: String },
}

impl Response {
    pub fn decode(buf: &[u8], extensions: &ExtensionRegistry) -> Result<Self> {
        let mut rd = buf;
        let header = rmpv::decode::read_value(&mut rd)?;
        // ping and auth responses may come without a body
        let body = if rd.is_empty() {
            rmpv::Value::Map(vec![])
        } else {
            rmpv::decode::read_value(&mut rd)?
        };

        let header = int_keyed(header, "header")?;
        let status = header
            .get(&keys::CODE)
            .and_then(rmpv::Value::as_u64)
            .and_then(|code| u32::try_from(code).ok())
            .ok_or_else(|| Error::Protocol("response header has no code".into()))?;
        let sync = header
            .get(&keys::SYNC)
            .and_then(rmpv::Value::as_u64)
            .ok_or_else(|| Error::Protocol("response header has no sync".into()))?;
        let schema_id = header.get(&keys::SCHEMA_ID).and_then(rmpv::Value::as_u64);

        let mut body = int_keyed(body, "body")?;
        let outcome = if status & ERROR_FLAG != 0 {
            Outcome::Failure {
                status,
                message: failure_message(&mut body),
            }
        } else {
            Outcome::Success {
                body: body
                    .into_iter()
                    .map(|(k, v)| Ok((k, Value::from_wire(v, extensions)?)))
                    .collect::<Result<_>>()?,
            }
        };

        Ok(Self {
            sync,
            schema_id,
            outcome,
        })
    }

    pub fn sync(&self) -> u64 {
        self.sync
    }

    pub fn schema_id(&self) -> Option<u64> {
        self.schema_id
    }

    pub fn is_failure(&self) -> bool {
        matches!(self.outcome, Outcome::Failure { .. })
    }

    /// Body field of a successful response.
    pub fn get(&self, key: u64) -> Option<&Value> {
        match &self.outcome {
            Outcome::Success { body } => body.get(&key),
            Outcome::Failure { .. } => None,
        }
    }

    /// Maps a failure into [`Error::RequestFailed`], passing successes through.
    pub fn into_result(self) -> Result<Self> {
        match self.outcome {
            Outcome::Failure { status, message } => Err(map_failure(status, message)),
            Outcome::Success { .. } => Ok(self),
        }
    }

    /// Tuples carried in the `DATA` field; empty when the field is absent.
    pub fn into_tuples(self) -> Result<Vec<Tuple>> {
        let mut body = match self.outcome {
            Outcome::Success { body } => body,
            Outcome::Failure { status, message } => return Err(map_failure(status, message)),
        };

        match body.remove(&keys::DATA) {
            None => Ok(vec![]),
            Some(Value::Array(rows)) => rows
                .into_iter()
                .map(|row| match row {
                    Value::Array(fields) => Ok(fields),
                    other => Err(Error::Protocol(format!("expected a tuple, got {other}"))),
                })
                .collect(),
            Some(other) => Err(Error::Protocol(format!(
                "expected an array of tuples, got {other}"
            ))),
        }
    }
}

fn int_keyed(value: rmpv::Value, what: &str) -> Result<HashMap<u64, rmpv::Value>> {
    match value {
        rmpv::Value::Map(entries) => entries
            .into_iter()
            .map(|(k, v)| match k.as_u64() {
                Some(k) => Ok((k, v)),
                None => Err(Error::Protocol(format!("non-integer key {k} in {what}"))),
            })
            .collect(),
        other => Err(Error::Protocol(format!("expected {what} map, got {other}"))),
    }
}

/// Server message of a failed response, preferring the plain text field
/// over the first entry of the error stack.
fn failure_message(body: &mut HashMap<u64, rmpv::Value>) -> String {
    if let Some(rmpv::Value::String(message)) = body.remove(&keys::ERROR_24) {
        if let Some(message) = message.into_str() {
            return message;
        }
    }

    body.get(&keys::ERROR)
        .and_then(rmpv::Value::as_map)
        .and_then(|error| {
            error
                .iter()
                .find(|(k, _)| k.as_u64() == Some(keys::ERROR_STACK))
        })
        .and_then(|(_, stack)| stack.as_array()?.first()?.as_map())
        .and_then(|entry| {
            entry
                .iter()
                .find(|(k, _)| k.as_u64() == Some(keys::ERROR_MESSAGE))
        })
        .and_then(|(_, message)| message.as_str())
        .map(str::to_string)
        .unwrap_or_default()
}
