//! In-memory transport
//!
//! Stands in for a serial line when simulating a peripheral. Clones share the
//! same line, so a test can keep a handle while the engine owns another.

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::trace;

use crate::{Transport, error::*};

type Responder = Box<dyn FnMut(&[u8]) -> Option<Vec<u8>> + Send>;

#[derive(Default)]
struct Line {
    written: Vec<Vec<u8>>,
    incoming: VecDeque<u8>,
    responder: Option<Responder>,
    chunk_size: Option<usize>,
    closed: bool,
}

/// Shared in-memory line
#[derive(Clone, Default)]
pub struct MemoryTransport {
    line: Arc<Mutex<Line>>,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer every write with the bytes returned by `responder`
    pub fn with_responder<F>(self, responder: F) -> Self
    where
        F: FnMut(&[u8]) -> Option<Vec<u8>> + Send + 'static,
    {
        self.line.lock().responder = Some(Box::new(responder));
        self
    }

    /// Deliver at most `size` bytes per read
    pub fn with_chunk_size(self, size: usize) -> Self {
        self.line.lock().chunk_size = Some(size.max(1));
        self
    }

    /// Queue bytes as if the peripheral had sent them
    pub fn inject(&self, data: &[u8]) {
        self.line.lock().incoming.extend(data.iter().copied());
    }

    /// Every write seen so far
    pub fn written(&self) -> Vec<Vec<u8>> {
        self.line.lock().written.clone()
    }

    pub fn write_count(&self) -> usize {
        self.line.lock().written.len()
    }

    /// Bytes queued but not yet read
    pub fn pending(&self) -> usize {
        self.line.lock().incoming.len()
    }

    /// Make further writes fail as if the line dropped
    pub fn close(&self) {
        self.line.lock().closed = true;
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn write(&mut self, data: &[u8]) -> Result<()> {
        let mut guard = self.line.lock();
        let line = &mut *guard;
        if line.closed {
            return Err(Error::ConnectionClosed);
        }

        trace!("Memory line write: {}", hex::encode(data));
        line.written.push(data.to_vec());

        if let Some(responder) = line.responder.as_mut() {
            if let Some(reply) = responder(data) {
                line.incoming.extend(reply);
            }
        }
        Ok(())
    }

    fn read_available(&mut self) -> Result<Vec<u8>> {
        let mut line = self.line.lock();
        let n = line
            .chunk_size
            .unwrap_or(usize::MAX)
            .min(line.incoming.len());
        Ok(line.incoming.drain(..n).collect())
    }

    fn clear_input(&mut self) -> Result<()> {
        self.line.lock().incoming.clear();
        Ok(())
    }

    fn description(&self) -> String {
        "memory".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_echo() {
        let handle = MemoryTransport::new().with_responder(|data| Some(data.to_vec()));
        let mut transport = handle.clone();

        transport.write(&[1, 2, 3]).await.unwrap();
        assert_eq!(handle.write_count(), 1);
        assert_eq!(transport.read_available().unwrap(), vec![1, 2, 3]);
        assert!(transport.read_available().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_memory_chunked_reads() {
        let mut transport = MemoryTransport::new().with_chunk_size(2);
        transport.inject(&[1, 2, 3, 4, 5]);

        assert_eq!(transport.read_available().unwrap(), vec![1, 2]);
        assert_eq!(transport.read_available().unwrap(), vec![3, 4]);
        assert_eq!(transport.read_available().unwrap(), vec![5]);
    }

    #[tokio::test]
    async fn test_memory_closed() {
        let mut transport = MemoryTransport::new();
        transport.close();
        assert!(matches!(transport.write(&[1]).await, Err(Error::ConnectionClosed)));
    }

    #[test]
    fn test_memory_clear_input() {
        let mut transport = MemoryTransport::new();
        transport.inject(&[9, 9]);
        transport.clear_input().unwrap();
        assert_eq!(transport.pending(), 0);
    }
}
