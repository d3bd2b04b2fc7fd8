use std::io::{Read, Write};

use log::trace;

use crate::error::{Error, Result, map_io};

use super::{GREETING_SIZE, Greeting};

/// Upper bound on an incoming frame, guarding against a corrupt length prefix.
const MAX_FRAME_SIZE: usize = 1 << 30;

/// Reads and writes length-prefixed frames over a byte stream.
pub struct ProtocolTransport<T: Read + Write> {
    stream: T,
}

impl<T: Read + Write> ProtocolTransport<T> {
    pub fn new(stream: T) -> Self {
        Self { stream }
    }

    pub fn read_greeting(&mut self) -> Result<Greeting> {
        let mut buf = [0u8; GREETING_SIZE];
        self.stream.read_exact(&mut buf).map_err(|e| match map_io(e) {
            Error::Io(e) => Error::Handshake(format!("failed to read greeting: {e}")),
            other => other,
        })?;
        Greeting::parse(&buf)
    }

    /// Writes one frame: a `uint32` length prefix followed by `payload`.
    pub fn write_frame(&mut self, payload: &[u8]) -> Result<()> {
        let len = u32::try_from(payload.len())
            .map_err(|_| Error::Protocol(format!("frame of {} bytes is too large", payload.len())))?;

        let mut buf = Vec::with_capacity(payload.len() + 5);
        buf.push(0xce);
        buf.extend_from_slice(&len.to_be_bytes());
        buf.extend_from_slice(payload);

        trace!("writing frame of {} bytes", payload.len());
        self.stream.write_all(&buf).map_err(map_io)?;
        self.stream.flush().map_err(map_io)?;
        Ok(())
    }

    /// Reads one frame and returns its payload.
    pub fn read_frame(&mut self) -> Result<Vec<u8>> {
        let len = self.read_len()?;
        if len > MAX_FRAME_SIZE {
            return Err(Error::Protocol(format!("frame of {len} bytes exceeds limit")));
        }

        let mut payload = vec![0u8; len];
        self.stream.read_exact(&mut payload).map_err(map_io)?;
        trace!("read frame of {len} bytes");
        Ok(payload)
    }

    fn read_len(&mut self) -> Result<usize> {
        let mut marker = [0u8; 1];
        self.stream.read_exact(&mut marker).map_err(map_io)?;

        let width = match marker[0] {
            n @ 0x00..=0x7f => return Ok(usize::from(n)),
            0xcc => 1,
            0xcd => 2,
            0xce => 4,
            other => {
                return Err(Error::Protocol(format!(
                    "invalid frame length marker {other:#x}"
                )));
            }
        };

        let mut buf = [0u8; 4];
        self.stream
            .read_exact(&mut buf[4 - width..])
            .map_err(map_io)?;
        Ok(u32::from_be_bytes(buf) as usize)
    }
}
