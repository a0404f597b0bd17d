//! Flow-controlled, in-memory byte stream.
//!
//! A [`ByteStream`] is the hand-off point between a producer and a consumer:
//! the application writes into the sender's outbound stream, and the
//! reassembler writes into the receiver's inbound stream.  The buffer never
//! holds more than `capacity` bytes; a write that would overflow is truncated
//! and the caller learns how much was accepted.
//!
//! All operations are total.  Asking for more than is available simply
//! returns (or removes) less.

use std::collections::VecDeque;

/// A bounded FIFO of bytes with end-of-input and error signalling.
#[derive(Debug)]
pub struct ByteStream {
    buffer: VecDeque<u8>,
    capacity: usize,
    bytes_written: u64,
    bytes_read: u64,
    input_ended: bool,
    error: bool,
}

impl ByteStream {
    /// Create an empty stream that buffers at most `capacity` bytes.
    pub fn new(capacity: usize) -> Self {
        Self {
            buffer: VecDeque::with_capacity(capacity),
            capacity,
            bytes_written: 0,
            bytes_read: 0,
            input_ended: false,
            error: false,
        }
    }

    /// Append as much of `data` as fits and return the number of bytes accepted.
    ///
    /// Returns `0` once the stream has errored or input has ended.
    pub fn write(&mut self, data: &[u8]) -> usize {
        if self.error || self.input_ended {
            return 0;
        }
        let accepted = data.len().min(self.remaining_capacity());
        self.buffer.extend(&data[..accepted]);
        self.bytes_written += accepted as u64;
        accepted
    }

    /// Copy up to `len` bytes from the front of the buffer without removing them.
    pub fn peek(&self, len: usize) -> Vec<u8> {
        if self.error {
            return Vec::new();
        }
        let n = len.min(self.buffer.len());
        self.buffer.iter().take(n).copied().collect()
    }

    /// Remove up to `len` bytes from the front of the buffer.
    pub fn pop(&mut self, len: usize) {
        if self.error {
            return;
        }
        let n = len.min(self.buffer.len());
        self.buffer.drain(..n);
        self.bytes_read += n as u64;
    }

    /// Remove and return up to `len` bytes from the front of the buffer.
    pub fn read(&mut self, len: usize) -> Vec<u8> {
        let out = self.peek(len);
        self.pop(out.len());
        out
    }

    /// Signal that no more bytes will ever be written.
    pub fn end_input(&mut self) {
        self.input_ended = true;
    }

    /// `true` once [`end_input`](Self::end_input) has been called.
    pub fn input_ended(&self) -> bool {
        self.input_ended
    }

    /// Number of bytes currently buffered.
    pub fn buffer_size(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_buffer_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// `true` when input has ended and every written byte has been read.
    pub fn is_eof(&self) -> bool {
        self.input_ended && self.buffer.is_empty()
    }

    /// Total number of bytes ever accepted by [`write`](Self::write).
    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    /// Total number of bytes ever removed by [`pop`](Self::pop) / [`read`](Self::read).
    pub fn bytes_read(&self) -> u64 {
        self.bytes_read
    }

    /// How many more bytes the buffer can hold right now.
    pub fn remaining_capacity(&self) -> usize {
        self.capacity - self.buffer.len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Mark the stream as failed.  Irreversible.
    pub fn set_error(&mut self) {
        self.error = true;
    }

    pub fn is_error(&self) -> bool {
        self.error
    }
}
