use base64::{Engine, engine::general_purpose::STANDARD};
use sha1::{Digest, Sha1};

use crate::error::{Error, Result};

/// Size of the greeting the server writes before accepting requests.
pub const GREETING_SIZE: usize = 128;

const LINE_SIZE: usize = GREETING_SIZE / 2;
const SALT_ENCODED_SIZE: usize = 44;
const SCRAMBLE_SIZE: usize = 20;

/// Server greeting read when a connection is opened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Greeting {
    server: String,
    salt: Vec<u8>,
}

impl Greeting {
    pub fn parse(buf: &[u8]) -> Result<Self> {
        if buf.len() < GREETING_SIZE {
            return Err(Error::Handshake(format!(
                "greeting is {} bytes, expected {GREETING_SIZE}",
                buf.len()
            )));
        }

        let (line, salt_line) = buf[..GREETING_SIZE].split_at(LINE_SIZE);
        if !line.starts_with(b"Tarantool") {
            return Err(Error::Handshake("unable to recognize server greeting".into()));
        }
        let server = String::from_utf8_lossy(line).trim().to_string();

        let encoded = std::str::from_utf8(&salt_line[..SALT_ENCODED_SIZE])
            .map_err(|_| Error::Handshake("salt is not valid ascii".into()))?;
        let salt = STANDARD
            .decode(encoded.trim())
            .map_err(|e| Error::Handshake(format!("invalid salt: {e}")))?;

        if salt.len() < SCRAMBLE_SIZE {
            return Err(Error::Handshake(format!(
                "salt is {} bytes, expected at least {SCRAMBLE_SIZE}",
                salt.len()
            )));
        }

        Ok(Self { server, salt })
    }

    /// The greeting's first line, e.g. `Tarantool 2.11.1 (Binary) <uuid>`.
    pub fn server(&self) -> &str {
        &self.server
    }

    pub fn salt(&self) -> &[u8] {
        &self.salt
    }

    /// Renders a greeting the way a server writes it.
    #[cfg(test)]
    pub(crate) fn render(server: &str, salt: &[u8]) -> Vec<u8> {
        let mut buf = vec![b' '; GREETING_SIZE];
        buf[..server.len()].copy_from_slice(server.as_bytes());
        buf[LINE_SIZE - 1] = b'\n';

        let encoded = STANDARD.encode(salt);
        buf[LINE_SIZE..LINE_SIZE + encoded.len()].copy_from_slice(encoded.as_bytes());
        buf[GREETING_SIZE - 1] = b'\n';
        buf
    }
}

/// Derives the chap-sha1 scramble sent in place of the password.
pub fn scramble(salt: &[u8], password: &str) -> [u8; SCRAMBLE_SIZE] {
    let step1 = Sha1::digest(password.as_bytes());
    let step2 = Sha1::digest(step1);

    let mut hasher = Sha1::new();
    hasher.update(&salt[..SCRAMBLE_SIZE.min(salt.len())]);
    hasher.update(step2);
    let step3 = hasher.finalize();

    let mut out = [0u8; SCRAMBLE_SIZE];
    for (i, byte) in out.iter_mut().enumerate() {
        *byte = step1[i] ^ step3[i];
    }
    out
}
