//! Scripted transport for unit tests.

use std::collections::VecDeque;

use bytes::Bytes;

use super::Transport;
use crate::error::Result;

/// Replays queued responses, one per `receive` call, and records writes.
#[derive(Debug, Default)]
pub(crate) struct MockTransport {
    pub sent: Vec<Vec<u8>>,
    pub responses: VecDeque<Vec<u8>>,
    pub reconnects: u32,
    pub flushes: u32,
    pub closed: bool,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(mut self, bytes: &[u8]) -> Self {
        self.responses.push_back(bytes.to_vec());
        self
    }

    pub fn push(&mut self, bytes: &[u8]) {
        self.responses.push_back(bytes.to_vec());
    }
}

impl Transport for MockTransport {
    fn send(&mut self, bytes: &[u8]) -> Result<()> {
        self.sent.push(bytes.to_vec());
        Ok(())
    }

    fn receive(&mut self, count: usize) -> Result<Bytes> {
        let mut rsp = self.responses.pop_front().unwrap_or_default();
        rsp.truncate(count);
        Ok(Bytes::from(rsp))
    }

    fn flush_input(&mut self) -> Result<()> {
        self.flushes += 1;
        Ok(())
    }

    fn reconnect(&mut self) -> Result<()> {
        self.reconnects += 1;
        Ok(())
    }

    fn close(&mut self) {
        self.closed = true;
    }
}
