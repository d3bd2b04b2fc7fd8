//! MessagePack extension types.
//!
//! The codec itself only knows the MessagePack core types. Domain scalars that the server
//! stores as extension values (timestamps, decimals, ...) are plugged in through an
//! [`ExtensionRegistry`], which maps a numeric extension type code to an [`Extension`]
//! implementation providing the pack/unpack pair.
//!
//! Decoded extension values come back as a tagged [`Ext`]: the type code plus a payload that
//! can be downcast to the extension's value type. Codes with no registered extension decode
//! to a [`RawExt`] payload holding the undecoded bytes.
//!
//! # Example
//! ```rust
//! use chrono::DateTime;
//! use tarantool_client::ext::{DateTimeExtension, Ext, ExtensionRegistry};
//!
//! let mut registry = ExtensionRegistry::default();
//! registry.register(42, DateTimeExtension).unwrap();
//!
//! let date = DateTime::parse_from_rfc3339("2016-10-01T12:00:00+02:00").unwrap();
//! let (code, data) = registry.pack(&Ext::new(42, date)).unwrap();
//! let ext = registry.unpack(code, &data).unwrap();
//!
//! assert_eq!(ext.downcast_ref(), Some(&date));
//! ```
mod datetime;

use std::{any::Any, collections::HashMap, fmt, sync::Arc};

use log::debug;

use crate::error::{Error, Result};

pub use datetime::DateTimeExtension;

/// A pack/unpack pair for one extension value type.
pub trait Extension: Send + Sync + 'static {
    /// The Rust type this extension encodes.
    type Value: Any + fmt::Debug + PartialEq + Send + Sync;

    fn pack(&self, value: &Self::Value) -> Result<Vec<u8>>;

    fn unpack(&self, data: &[u8]) -> Result<Self::Value>;
}

/// Payload carried by an [`Ext`] value.
pub trait ExtPayload: Any + fmt::Debug + Send + Sync {
    fn as_any(&self) -> &dyn Any;

    fn dyn_eq(&self, other: &dyn ExtPayload) -> bool;
}

impl<T> ExtPayload for T
where
    T: Any + fmt::Debug + PartialEq + Send + Sync,
{
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn dyn_eq(&self, other: &dyn ExtPayload) -> bool {
        ExtPayload::as_any(other)
            .downcast_ref::<T>()
            .is_some_and(|other| self == other)
    }
}

/// Undecoded bytes of an extension value with no registered [`Extension`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawExt(pub Vec<u8>);

/// A tagged extension value.
#[derive(Debug, Clone)]
pub struct Ext {
    code: i8,
    payload: Arc<dyn ExtPayload>,
}

impl Ext {
    pub fn new<T: ExtPayload>(code: i8, value: T) -> Self {
        Self {
            code,
            payload: Arc::new(value),
        }
    }

    pub fn raw(code: i8, data: Vec<u8>) -> Self {
        Self::new(code, RawExt(data))
    }

    pub fn code(&self) -> i8 {
        self.code
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        ExtPayload::as_any(&*self.payload).downcast_ref()
    }

    pub fn is_raw(&self) -> bool {
        self.downcast_ref::<RawExt>().is_some()
    }
}

impl PartialEq for Ext {
    fn eq(&self, other: &Self) -> bool {
        self.code == other.code && self.payload.dyn_eq(&*other.payload)
    }
}

trait ErasedExtension: Send + Sync {
    fn value_type(&self) -> &'static str;

    fn pack(&self, value: &dyn ExtPayload) -> Option<Result<Vec<u8>>>;

    fn unpack(&self, data: &[u8]) -> Result<Arc<dyn ExtPayload>>;
}

struct Erased<E>(E);

impl<E: Extension> ErasedExtension for Erased<E> {
    fn value_type(&self) -> &'static str {
        std::any::type_name::<E::Value>()
    }

    fn pack(&self, value: &dyn ExtPayload) -> Option<Result<Vec<u8>>> {
        ExtPayload::as_any(value)
            .downcast_ref::<E::Value>()
            .map(|value| self.0.pack(value))
    }

    fn unpack(&self, data: &[u8]) -> Result<Arc<dyn ExtPayload>> {
        let value = self.0.unpack(data)?;
        Ok(Arc::new(value))
    }
}

/// Maps extension type codes to their [`Extension`].
#[derive(Clone, Default)]
pub struct ExtensionRegistry {
    codecs: HashMap<i8, Arc<dyn ErasedExtension>>,
}

impl ExtensionRegistry {
    /// Registers `extension` under `code`.
    ///
    /// Negative codes are reserved by MessagePack itself, and a code can be
    /// registered only once.
    pub fn register<E: Extension>(&mut self, code: i8, extension: E) -> Result<()> {
        if code < 0 {
            return Err(Error::Extension(format!(
                "extension type code {code} is reserved"
            )));
        }
        if self.codecs.contains_key(&code) {
            return Err(Error::Extension(format!(
                "extension type code {code} is already registered"
            )));
        }

        let erased = Erased(extension);
        debug!(
            "registered extension {code} for {}",
            erased.value_type()
        );
        self.codecs.insert(code, Arc::new(erased));
        Ok(())
    }

    pub fn is_registered(&self, code: i8) -> bool {
        self.codecs.contains_key(&code)
    }

    /// Encodes an extension value into its type code and payload bytes.
    pub fn pack(&self, ext: &Ext) -> Result<(i8, Vec<u8>)> {
        if let Some(raw) = ext.downcast_ref::<RawExt>() {
            return Ok((ext.code, raw.0.clone()));
        }

        let codec = self.codecs.get(&ext.code).ok_or_else(|| {
            Error::Extension(format!("no extension registered for type code {}", ext.code))
        })?;

        match codec.pack(&*ext.payload) {
            Some(packed) => Ok((ext.code, packed?)),
            None => Err(Error::Extension(format!(
                "extension type code {} expects a {} value, got {:?}",
                ext.code,
                codec.value_type(),
                ext.payload
            ))),
        }
    }

    /// Decodes an extension payload; unknown codes yield a [`RawExt`].
    pub fn unpack(&self, code: i8, data: &[u8]) -> Result<Ext> {
        match self.codecs.get(&code) {
            Some(codec) => Ok(Ext {
                code,
                payload: codec.unpack(data)?,
            }),
            None => Ok(Ext::raw(code, data.to_vec())),
        }
    }
}

impl fmt::Debug for ExtensionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut codes = self.codecs.keys().collect::<Vec<_>>();
        codes.sort();
        f.debug_struct("ExtensionRegistry")
            .field("codes", &codes)
            .finish()
    }
}
