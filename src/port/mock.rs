//! Mock serial port implementation for testing.
//!
//! `MockSerialPort` behaves like a scripted handbox: replies can be bound to
//! the command that provokes them, and every command written is logged so
//! tests can assert on the exact wire sequence. Clones share state, so a
//! test keeps one handle while the driver owns another.

use super::error::PortError;
use super::traits::SerialPortAdapter;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Default)]
struct MockPortState {
    /// Bytes waiting to be returned by read operations.
    read_queue: VecDeque<u8>,
    /// Every write, in order.
    write_log: Vec<Vec<u8>>,
    /// One-shot replies, consumed in order per command.
    scripted: HashMap<Vec<u8>, VecDeque<Vec<u8>>>,
    /// Replies used whenever no one-shot reply is left for a command.
    standing: HashMap<Vec<u8>, Vec<u8>>,
    /// Whether the next read/write operation should time out.
    should_timeout: bool,
    /// Writes that fail once the command matches.
    failing_writes: HashMap<Vec<u8>, usize>,
    timeout: Duration,
    input_cleared: usize,
}

/// Mock serial port implementation for testing.
///
/// # Example
/// ```
/// use lx90_mount::port::{MockSerialPort, SerialPortAdapter};
///
/// let mut port = MockSerialPort::new("MOCK0");
/// port.respond_always(":GT#", "60.1#");
///
/// port.write_bytes(b":GT#").unwrap();
/// let mut buffer = [0u8; 8];
/// let n = port.read_bytes(&mut buffer).unwrap();
/// assert_eq!(&buffer[..n], b"60.1#");
/// assert_eq!(port.commands(), vec![":GT#".to_string()]);
/// ```
#[derive(Clone)]
pub struct MockSerialPort {
    name: String,
    state: Arc<Mutex<MockPortState>>,
}

impl MockSerialPort {
    /// Create a new mock serial port with the given name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: Arc::new(Mutex::new(MockPortState {
                timeout: Duration::from_secs(1),
                ..Default::default()
            })),
        }
    }

    /// Enqueue bytes to be returned by subsequent read operations.
    pub fn enqueue_read(&mut self, data: &[u8]) {
        self.state.lock().read_queue.extend(data);
    }

    /// Queue a reply that is produced the next time `command` is written.
    pub fn respond(&mut self, command: &str, reply: impl AsRef<[u8]>) {
        self.state
            .lock()
            .scripted
            .entry(command.as_bytes().to_vec())
            .or_default()
            .push_back(reply.as_ref().to_vec());
    }

    /// Reply to `command` every time once one-shot replies are used up.
    pub fn respond_always(&mut self, command: &str, reply: impl AsRef<[u8]>) {
        self.state
            .lock()
            .standing
            .insert(command.as_bytes().to_vec(), reply.as_ref().to_vec());
    }

    /// Make the next `times` writes of `command` fail with a broken pipe.
    pub fn fail_write_of(&mut self, command: &str, times: usize) {
        self.state
            .lock()
            .failing_writes
            .insert(command.as_bytes().to_vec(), times);
    }

    /// Get a copy of all data written to the port.
    pub fn get_write_log(&self) -> Vec<Vec<u8>> {
        self.state.lock().write_log.clone()
    }

    /// The write log decoded as command strings.
    pub fn commands(&self) -> Vec<String> {
        self.state
            .lock()
            .write_log
            .iter()
            .map(|w| String::from_utf8_lossy(w).into_owned())
            .collect()
    }

    /// How many times `command` has been written.
    pub fn count(&self, command: &str) -> usize {
        self.state
            .lock()
            .write_log
            .iter()
            .filter(|w| w.as_slice() == command.as_bytes())
            .count()
    }

    /// Clear the write log.
    pub fn clear_write_log(&mut self) {
        self.state.lock().write_log.clear();
    }

    /// Set whether the next read/write operation should time out.
    pub fn set_should_timeout(&mut self, should_timeout: bool) {
        self.state.lock().should_timeout = should_timeout;
    }

    /// Number of times the receive buffer was flushed.
    pub fn input_clear_count(&self) -> usize {
        self.state.lock().input_cleared
    }

    /// Get the number of bytes available to read.
    pub fn available_bytes(&self) -> usize {
        self.state.lock().read_queue.len()
    }
}

impl SerialPortAdapter for MockSerialPort {
    fn write_bytes(&mut self, data: &[u8]) -> Result<usize, PortError> {
        let mut state = self.state.lock();

        if state.should_timeout {
            state.should_timeout = false;
            return Err(PortError::timeout(state.timeout));
        }

        if let Some(remaining) = state.failing_writes.get_mut(data) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(PortError::Io(std::io::Error::from(
                    std::io::ErrorKind::BrokenPipe,
                )));
            }
        }

        state.write_log.push(data.to_vec());

        let reply = match state.scripted.get_mut(data).and_then(VecDeque::pop_front) {
            Some(reply) => Some(reply),
            None => state.standing.get(data).cloned(),
        };
        if let Some(reply) = reply {
            state.read_queue.extend(reply);
        }

        Ok(data.len())
    }

    fn read_bytes(&mut self, buffer: &mut [u8]) -> Result<usize, PortError> {
        let mut state = self.state.lock();

        if state.should_timeout {
            state.should_timeout = false;
            return Err(PortError::timeout(state.timeout));
        }

        let mut bytes_read = 0;
        for byte in buffer.iter_mut() {
            match state.read_queue.pop_front() {
                Some(queued) => {
                    *byte = queued;
                    bytes_read += 1;
                }
                None => break,
            }
        }

        if bytes_read == 0 {
            // Simulate "would block" behavior by returning an I/O error
            Err(PortError::Io(std::io::Error::new(
                std::io::ErrorKind::WouldBlock,
                "No data available",
            )))
        } else {
            Ok(bytes_read)
        }
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn clear_input(&mut self) -> Result<(), PortError> {
        let mut state = self.state.lock();
        state.read_queue.clear();
        state.input_cleared += 1;
        Ok(())
    }
}

impl std::fmt::Debug for MockSerialPort {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockSerialPort")
            .field("name", &self.name)
            .field("available_bytes", &self.available_bytes())
            .finish()
    }
}
