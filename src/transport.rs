//! Serial transport: the command/response primitives of the handbox link.
//!
//! Replies come in two shapes: `#`-terminated strings and fixed-length
//! byte replies (acknowledgement flags, alignment). Bytes read past a
//! terminator are kept for the next receive.

use crate::error::{MountError, MountResult};
use crate::port::SerialPortAdapter;
use memchr::memchr;
use tracing::{trace, warn};

/// Reply terminator used by the Meade protocol.
pub const TERMINATOR: u8 = b'#';

const READ_CHUNK: usize = 64;

/// Longest unterminated reply kept before the link is treated as garbled.
const MAX_PENDING: usize = 256;

/// Exclusive owner of the open serial link.
#[derive(Debug)]
pub struct Transport {
    port: Box<dyn SerialPortAdapter>,
    pending: Vec<u8>,
}

impl Transport {
    pub fn new(port: Box<dyn SerialPortAdapter>) -> Self {
        Self {
            port,
            pending: Vec::new(),
        }
    }

    /// Write one command. Commands carry their own `:` prefix and `#` suffix.
    pub fn transmit(&mut self, command: &str) -> MountResult<()> {
        trace!(tag = "Transport", port = self.port.name(), "tx {}", command);
        self.port.write_bytes(command.as_bytes())?;
        Ok(())
    }

    /// Read up to and including the terminator; the terminator is stripped.
    pub fn receive_terminated(&mut self) -> MountResult<String> {
        loop {
            if let Some(pos) = memchr(TERMINATOR, &self.pending) {
                let reply: Vec<u8> = self.pending.drain(..=pos).take(pos).collect();
                let reply = String::from_utf8_lossy(&reply).into_owned();
                trace!(tag = "Transport", "rx {}#", reply);
                return Ok(reply);
            }
            if self.pending.len() >= MAX_PENDING {
                let dropped = self.pending.len();
                self.pending.clear();
                return Err(MountError::protocol(format!(
                    "no terminator in {dropped} received bytes"
                )));
            }
            self.fill()?;
        }
    }

    /// Read exactly `count` bytes.
    pub fn receive_counted(&mut self, count: usize) -> MountResult<Vec<u8>> {
        while self.pending.len() < count {
            self.fill()?;
        }
        let reply: Vec<u8> = self.pending.drain(..count).collect();
        trace!(tag = "Transport", "rx {:?}", String::from_utf8_lossy(&reply));
        Ok(reply)
    }

    /// Transmit then read a terminated reply.
    pub fn query(&mut self, command: &str) -> MountResult<String> {
        self.transmit(command)?;
        self.receive_terminated()
    }

    /// Transmit then read a one-byte acknowledgement.
    pub fn query_flag(&mut self, command: &str) -> MountResult<u8> {
        self.transmit(command)?;
        let reply = self.receive_counted(1)?;
        reply
            .first()
            .copied()
            .ok_or_else(|| MountError::protocol(format!("no acknowledgement for {command}")))
    }

    /// Drop stale bytes left behind by an interrupted exchange.
    pub fn flush_input(&mut self) {
        self.pending.clear();
        if let Err(e) = self.port.clear_input() {
            warn!(tag = "Transport", "failed to clear receive buffer: {}", e);
        }
    }

    fn fill(&mut self) -> MountResult<()> {
        let mut chunk = [0u8; READ_CHUNK];
        let n = self.port.read_bytes(&mut chunk)?;
        if n == 0 {
            return Err(MountError::protocol("serial link returned no data"));
        }
        self.pending.extend_from_slice(&chunk[..n]);
        Ok(())
    }
}
