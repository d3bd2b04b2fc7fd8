use chrono::{DateTime, FixedOffset};

use super::Extension;
use crate::error::{Error, Result};

const FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6f%:z";

/// Packs a timestamp as an ISO-8601 string inside an extension value.
#[derive(Debug, Clone, Copy, Default)]
pub struct DateTimeExtension;

impl Extension for DateTimeExtension {
    type Value = DateTime<FixedOffset>;

    fn pack(&self, value: &Self::Value) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        let text = rmpv::Value::from(value.format(FORMAT).to_string());
        rmpv::encode::write_value(&mut buf, &text)?;
        Ok(buf)
    }

    fn unpack(&self, data: &[u8]) -> Result<Self::Value> {
        let value = rmpv::decode::read_value(&mut &data[..])?;
        let text = value
            .as_str()
            .ok_or_else(|| Error::Extension(format!("expected a date string, got {value}")))?;

        DateTime::parse_from_rfc3339(text)
            .map_err(|e| Error::Extension(format!("invalid date '{text}': {e}")))
    }
}
