//! In-memory transports for deterministic protocol tests.
//!
//! Each mock keeps its state behind a shared handle so tests can inspect what
//! was written after the mock itself has been moved into (and dropped by) the
//! code under test.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::error::{Result, TransportError};
use crate::shm::{ShmDevice, ShmMapping};
use crate::traits::{PowerControl, Transport};

fn lock<T>(state: &Mutex<T>) -> MutexGuard<'_, T> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Debug, Default)]
struct TransportState {
    inbound: VecDeque<Vec<u8>>,
    rules: Vec<ResponseRule>,
    written: Vec<u8>,
    writes: Vec<Vec<u8>>,
    read_calls: usize,
    closed: bool,
    fail_writes: bool,
}

#[derive(Debug)]
struct ResponseRule {
    after_written: usize,
    response: Vec<u8>,
}

/// Scripted in-memory [`Transport`].
///
/// Reads are served from queued chunks; readiness reflects whether a chunk is
/// queued, so an empty queue behaves like a readiness timeout.
#[derive(Debug, Default)]
pub struct MockTransport {
    state: Arc<Mutex<TransportState>>,
}

impl MockTransport {
    /// Create a transport with nothing queued.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue `bytes` as the next inbound chunk.
    pub fn with_inbound(self, bytes: impl Into<Vec<u8>>) -> Self {
        lock(&self.state).inbound.push_back(bytes.into());
        self
    }

    /// Queue `response` once at least `after_written` bytes have been written in total.
    pub fn respond_after(self, after_written: usize, response: impl Into<Vec<u8>>) -> Self {
        lock(&self.state).rules.push(ResponseRule {
            after_written,
            response: response.into(),
        });
        self
    }

    /// Make every write fail with a broken-pipe error.
    pub fn failing_writes(self) -> Self {
        lock(&self.state).fail_writes = true;
        self
    }

    /// Inspection handle sharing this transport's state.
    pub fn handle(&self) -> MockHandle {
        MockHandle {
            state: Arc::clone(&self.state),
        }
    }
}

impl Transport for MockTransport {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let mut state = lock(&self.state);
        state.read_calls += 1;
        let Some(mut chunk) = state.inbound.pop_front() else {
            return Ok(0);
        };
        let n = chunk.len().min(buf.len());
        buf[..n].copy_from_slice(&chunk[..n]);
        if n < chunk.len() {
            chunk.drain(..n);
            state.inbound.push_front(chunk);
        }
        Ok(n)
    }

    fn write(&mut self, buf: &[u8]) -> Result<usize> {
        let mut state = lock(&self.state);
        if state.fail_writes {
            return Err(TransportError::Io(std::io::Error::from(
                std::io::ErrorKind::BrokenPipe,
            )));
        }
        state.written.extend_from_slice(buf);
        state.writes.push(buf.to_vec());

        let total = state.written.len();
        let mut fired = Vec::new();
        state.rules.retain(|rule| {
            if total >= rule.after_written {
                fired.push(rule.response.clone());
                false
            } else {
                true
            }
        });
        state.inbound.extend(fired);
        Ok(buf.len())
    }

    fn wait_readable(&mut self, _timeout: Duration) -> Result<bool> {
        Ok(!lock(&self.state).inbound.is_empty())
    }

    fn wait_writable(&mut self, _timeout: Duration) -> Result<bool> {
        Ok(true)
    }

    fn transport_name(&self) -> &'static str {
        "mock"
    }
}

impl Drop for MockTransport {
    fn drop(&mut self) {
        lock(&self.state).closed = true;
    }
}

/// Inspection side of a [`MockTransport`].
#[derive(Debug, Clone)]
pub struct MockHandle {
    state: Arc<Mutex<TransportState>>,
}

impl MockHandle {
    /// Every byte written so far, concatenated.
    pub fn written(&self) -> Vec<u8> {
        lock(&self.state).written.clone()
    }

    /// Individual write calls in order.
    pub fn writes(&self) -> Vec<Vec<u8>> {
        lock(&self.state).writes.clone()
    }

    /// Number of `read` calls made.
    pub fn read_calls(&self) -> usize {
        lock(&self.state).read_calls
    }

    /// Whether the transport has been dropped.
    pub fn is_closed(&self) -> bool {
        lock(&self.state).closed
    }

    /// Queue another inbound chunk.
    pub fn push_inbound(&self, bytes: impl Into<Vec<u8>>) {
        lock(&self.state).inbound.push_back(bytes.into());
    }
}

/// Operations observed by a [`MockShmDevice`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShmOp {
    ReadWord(u32),
    WriteWord(u32),
    Map(usize),
    Unmap,
    ReleaseSemaphore,
}

#[derive(Debug, Default)]
struct ShmState {
    sentinels: VecDeque<u32>,
    commands: Vec<u32>,
    ops: Vec<ShmOp>,
    memory: Vec<u8>,
    fail_map: bool,
    fail_release: bool,
    busy_writes: bool,
    closed: bool,
}

/// Scripted in-memory [`ShmDevice`].
#[derive(Debug)]
pub struct MockShmDevice {
    state: Arc<Mutex<ShmState>>,
}

impl MockShmDevice {
    /// Create a device backed by `window` bytes of zeroed memory.
    pub fn new(window: usize) -> Self {
        Self {
            state: Arc::new(Mutex::new(ShmState {
                memory: vec![0; window],
                ..ShmState::default()
            })),
        }
    }

    /// Queue sentinel words returned by successive reads.
    pub fn with_sentinels(self, words: impl IntoIterator<Item = u32>) -> Self {
        lock(&self.state).sentinels.extend(words);
        self
    }

    /// Make `map` fail.
    pub fn failing_map(self) -> Self {
        lock(&self.state).fail_map = true;
        self
    }

    /// Make `release_semaphore` fail.
    pub fn failing_release(self) -> Self {
        lock(&self.state).fail_release = true;
        self
    }

    /// Make the device never become writable.
    pub fn busy_writes(self) -> Self {
        lock(&self.state).busy_writes = true;
        self
    }

    /// Inspection handle sharing this device's state.
    pub fn handle(&self) -> MockShmHandle {
        MockShmHandle {
            state: Arc::clone(&self.state),
        }
    }
}

impl ShmDevice for MockShmDevice {
    type Mapping = MockMapping;

    fn wait_readable(&mut self, _timeout: Duration) -> Result<bool> {
        Ok(!lock(&self.state).sentinels.is_empty())
    }

    fn wait_writable(&mut self, _timeout: Duration) -> Result<bool> {
        Ok(!lock(&self.state).busy_writes)
    }

    fn read_word(&mut self) -> Result<u32> {
        let mut state = lock(&self.state);
        let word = state
            .sentinels
            .pop_front()
            .ok_or_else(|| TransportError::Io(std::io::ErrorKind::UnexpectedEof.into()))?;
        state.ops.push(ShmOp::ReadWord(word));
        Ok(word)
    }

    fn write_word(&mut self, word: u32) -> Result<()> {
        let mut state = lock(&self.state);
        state.commands.push(word);
        state.ops.push(ShmOp::WriteWord(word));
        Ok(())
    }

    fn map(&mut self, len: usize) -> Result<MockMapping> {
        let mut state = lock(&self.state);
        if state.fail_map {
            return Err(TransportError::Map {
                len,
                source: std::io::ErrorKind::OutOfMemory.into(),
            });
        }
        state.ops.push(ShmOp::Map(len));
        let mut buffer = state.memory.clone();
        buffer.resize(len, 0);
        Ok(MockMapping {
            state: Arc::clone(&self.state),
            buffer,
        })
    }

    fn release_semaphore(&mut self) -> Result<()> {
        let mut state = lock(&self.state);
        if state.fail_release {
            return Err(TransportError::Io(std::io::Error::from_raw_os_error(5)));
        }
        state.ops.push(ShmOp::ReleaseSemaphore);
        Ok(())
    }
}

impl Drop for MockShmDevice {
    fn drop(&mut self) {
        lock(&self.state).closed = true;
    }
}

/// Mapping handed out by [`MockShmDevice`]; flushes to device memory on drop.
#[derive(Debug)]
pub struct MockMapping {
    state: Arc<Mutex<ShmState>>,
    buffer: Vec<u8>,
}

impl ShmMapping for MockMapping {
    fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.buffer
    }
}

impl Drop for MockMapping {
    fn drop(&mut self) {
        let mut state = lock(&self.state);
        state.memory = std::mem::take(&mut self.buffer);
        state.ops.push(ShmOp::Unmap);
    }
}

/// Inspection side of a [`MockShmDevice`].
#[derive(Debug, Clone)]
pub struct MockShmHandle {
    state: Arc<Mutex<ShmState>>,
}

impl MockShmHandle {
    /// Operation log in order.
    pub fn ops(&self) -> Vec<ShmOp> {
        lock(&self.state).ops.clone()
    }

    /// Command words written.
    pub fn commands(&self) -> Vec<u32> {
        lock(&self.state).commands.clone()
    }

    /// Device memory as of the last unmap.
    pub fn memory(&self) -> Vec<u8> {
        lock(&self.state).memory.clone()
    }

    /// Whether the device has been dropped.
    pub fn is_closed(&self) -> bool {
        lock(&self.state).closed
    }
}

/// In-memory [`PowerControl`] recording every command it would send.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MockPower {
    pub enabled: bool,
    pub commands: Vec<&'static str>,
}

impl MockPower {
    /// Start in the given power state.
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            commands: Vec::new(),
        }
    }
}

impl PowerControl for MockPower {
    fn is_enabled(&mut self) -> Result<bool> {
        Ok(self.enabled)
    }

    fn power_on(&mut self) -> Result<()> {
        if !self.enabled {
            self.commands.push("on");
            self.enabled = true;
        }
        Ok(())
    }

    fn power_off(&mut self) -> Result<()> {
        if self.enabled {
            self.commands.push("off");
            self.enabled = false;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_preserve_chunk_order() {
        let mut transport = MockTransport::new().with_inbound(vec![1, 2, 3]).with_inbound(vec![4]);
        let mut buf = [0u8; 2];
        assert_eq!(transport.read(&mut buf).unwrap(), 2);
        assert_eq!(buf, [1, 2]);
        assert_eq!(transport.read(&mut buf).unwrap(), 1);
        assert_eq!(buf[0], 3);
        assert_eq!(transport.read(&mut buf).unwrap(), 1);
        assert_eq!(buf[0], 4);
        assert!(!transport.wait_readable(Duration::ZERO).unwrap());
    }

    #[test]
    fn response_rule_fires_once_threshold_reached() {
        let mut transport = MockTransport::new().respond_after(4, vec![0x01]);
        transport.write(b"ab").unwrap();
        assert!(!transport.wait_readable(Duration::ZERO).unwrap());
        transport.write(b"cd").unwrap();
        assert!(transport.wait_readable(Duration::ZERO).unwrap());
        transport.write(b"ef").unwrap();

        let handle = transport.handle();
        let mut buf = [0u8; 4];
        assert_eq!(transport.read(&mut buf).unwrap(), 1);
        assert_eq!(buf[0], 0x01);
        assert!(!transport.wait_readable(Duration::ZERO).unwrap());
        assert_eq!(handle.written(), b"abcdef");
        assert_eq!(handle.writes().len(), 3);
    }

    #[test]
    fn handle_observes_close() {
        let transport = MockTransport::new();
        let handle = transport.handle();
        assert!(!handle.is_closed());
        drop(transport);
        assert!(handle.is_closed());
    }

    #[test]
    fn mock_power_is_idempotent() {
        let mut power = MockPower::new(true);
        power.power_on().unwrap();
        assert!(power.commands.is_empty());
        power.power_off().unwrap();
        power.power_off().unwrap();
        assert_eq!(power.commands, vec!["off"]);
    }
}
