// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Utilities for capturing output from the runtime process.

use bytes::{Bytes, BytesMut};
use std::{borrow::Cow, ops::Range};

/// The size at which the interleaved buffer grows.
///
/// This size is not totally arbitrary, but rather the (normal) page size on most systems.
pub(crate) const CHUNK_SIZE: usize = 4 * 1024;

/// The stream a chunk of output was read from.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum OutputStream {
    /// Standard output.
    Stdout,

    /// Standard error.
    Stderr,
}

/// A single chunk of captured output. This may represent zero or more lines.
#[derive(Clone, Debug)]
struct OutputChunk {
    range: Range<usize>,
    stream: OutputStream,
}

/// The complete captured output of the runtime process.
///
/// Standard output and standard error are read independently, and stored interleaved in the order
/// chunks arrived.
#[derive(Clone, Debug, Default)]
pub struct CapturedOutput {
    buf: Bytes,
    chunks: Vec<OutputChunk>,
}

impl CapturedOutput {
    /// Returns the interleaved output as a lossy UTF-8 string.
    ///
    /// This is the raw output that results are parsed from.
    pub fn lossy(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.buf)
    }

    /// Returns only standard output as a lossy UTF-8 string.
    pub fn stdout_lossy(&self) -> String {
        self.stream_lossy(OutputStream::Stdout)
    }

    /// Returns only standard error as a lossy UTF-8 string.
    pub fn stderr_lossy(&self) -> String {
        self.stream_lossy(OutputStream::Stderr)
    }

    fn stream_lossy(&self, stream: OutputStream) -> String {
        let mut buf = BytesMut::new();
        for chunk in self.chunks.iter().filter(|chunk| chunk.stream == stream) {
            buf.extend_from_slice(&self.buf[chunk.range.clone()]);
        }
        String::from_utf8_lossy(&buf).into_owned()
    }
}

/// Accumulates chunks from both streams into a single buffer.
#[derive(Debug)]
pub(crate) struct OutputAccumulator {
    buf: BytesMut,
    chunks: Vec<OutputChunk>,
}

impl OutputAccumulator {
    pub(crate) fn new() -> Self {
        Self {
            buf: BytesMut::with_capacity(CHUNK_SIZE),
            chunks: Vec::new(),
        }
    }

    pub(crate) fn push_chunk(&mut self, chunk: &[u8], stream: OutputStream) {
        if chunk.is_empty() {
            return;
        }

        let start = self.buf.len();
        if self.buf.capacity() - start < chunk.len() {
            self.buf.reserve(CHUNK_SIZE.max(chunk.len()));
        }

        self.buf.extend_from_slice(chunk);
        self.chunks.push(OutputChunk {
            range: start..start + chunk.len(),
            stream,
        });
    }

    /// Called when output capturing is complete.
    pub(crate) fn freeze(self) -> CapturedOutput {
        CapturedOutput {
            buf: self.buf.freeze(),
            chunks: self.chunks,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn streams_are_interleaved_in_arrival_order() {
        let mut acc = OutputAccumulator::new();
        acc.push_chunk(b"Test passed: A, 10\n", OutputStream::Stdout);
        acc.push_chunk(b"warning: low memory\n", OutputStream::Stderr);
        acc.push_chunk(b"", OutputStream::Stderr);
        acc.push_chunk(b"Done.\n", OutputStream::Stdout);
        let output = acc.freeze();

        assert_eq!(
            output.lossy(),
            "Test passed: A, 10\nwarning: low memory\nDone.\n"
        );
        assert_eq!(output.stdout_lossy(), "Test passed: A, 10\nDone.\n");
        assert_eq!(output.stderr_lossy(), "warning: low memory\n");
    }

    #[test]
    fn invalid_utf8_is_replaced() {
        let mut acc = OutputAccumulator::new();
        acc.push_chunk(b"bad \xff byte", OutputStream::Stdout);
        assert_eq!(acc.freeze().lossy(), "bad \u{fffd} byte");
    }
}
