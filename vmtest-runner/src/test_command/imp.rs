// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::{
    errors::ChildFdError,
    test_output::{CapturedOutput, OutputAccumulator, OutputStream, CHUNK_SIZE},
};
use bytes::BytesMut;
use std::{io, sync::Arc};
use tokio::{
    io::{AsyncBufReadExt, AsyncRead, BufReader},
    process::{Child as TokioChild, ChildStderr, ChildStdout},
};

/// A spawned child process along with its file descriptors.
pub(crate) struct Child {
    pub(crate) child: TokioChild,
    pub(crate) child_fds: ChildFds,
}

pub(super) fn spawn(cmd: std::process::Command) -> io::Result<Child> {
    let mut cmd: tokio::process::Command = cmd.into();
    // Backstop for paths that never reach the supervisor's own termination logic.
    cmd.kill_on_drop(true);
    let mut child = cmd.spawn()?;

    let stdout = child.stdout.take();
    let stderr = child.stderr.take();

    Ok(Child {
        child,
        child_fds: ChildFds::new(stdout, stderr),
    })
}

/// A `BufReader` over an `AsyncRead` that tracks the state of the reader and
/// whether it is done.
pub(crate) struct FusedBufReader<R> {
    reader: BufReader<R>,
    done: bool,
}

impl<R: AsyncRead + Unpin> FusedBufReader<R> {
    pub(crate) fn new(reader: R) -> Self {
        Self {
            reader: BufReader::with_capacity(CHUNK_SIZE, reader),
            done: false,
        }
    }

    pub(crate) async fn fill_buf(&mut self, acc: &mut BytesMut) -> Result<(), io::Error> {
        if self.done {
            return Ok(());
        }

        let res = self.reader.fill_buf().await;
        match res {
            Ok(buf) => {
                acc.extend_from_slice(buf);
                if buf.is_empty() {
                    self.done = true;
                }
                let len = buf.len();
                self.reader.consume(len);
                Ok(())
            }
            Err(error) => {
                self.done = true;
                Err(error)
            }
        }
    }

    pub(crate) fn is_done(&self) -> bool {
        self.done
    }
}

/// A version of [`FusedBufReader::fill_buf`] that works with an `Option<FusedBufReader>`.
async fn fill_buf_opt<R: AsyncRead + Unpin>(
    reader: Option<&mut FusedBufReader<R>>,
    acc: &mut BytesMut,
) -> Result<(), io::Error> {
    match reader {
        Some(reader) => reader.fill_buf(acc).await,
        None => Ok(()),
    }
}

/// A version of [`FusedBufReader::is_done`] that works with an `Option<FusedBufReader>`.
fn is_done_opt<R: AsyncRead + Unpin>(reader: &Option<FusedBufReader<R>>) -> bool {
    reader.as_ref().is_none_or(|r| r.is_done())
}

/// The standard output and standard error pipes of the child process.
pub(crate) struct ChildFds {
    stdout: Option<FusedBufReader<ChildStdout>>,
    stderr: Option<FusedBufReader<ChildStderr>>,
    // Per-stream staging buffers, so both reads can be in flight at once.
    stdout_buf: BytesMut,
    stderr_buf: BytesMut,
}

impl ChildFds {
    pub(crate) fn new(stdout: Option<ChildStdout>, stderr: Option<ChildStderr>) -> Self {
        Self {
            stdout: stdout.map(FusedBufReader::new),
            stderr: stderr.map(FusedBufReader::new),
            stdout_buf: BytesMut::with_capacity(CHUNK_SIZE),
            stderr_buf: BytesMut::with_capacity(CHUNK_SIZE),
        }
    }

    pub(crate) fn is_done(&self) -> bool {
        is_done_opt(&self.stdout) && is_done_opt(&self.stderr)
    }

    /// Fills `acc` with available data from whichever stream makes progress first.
    ///
    /// This operation is cancel-safe, since the underlying [`AsyncBufReadExt::fill_buf`] operation
    /// is cancel-safe. Neither stream can block the other.
    pub(crate) async fn fill_buf(&mut self, acc: &mut OutputAccumulator) -> Result<(), ChildFdError> {
        let Self {
            stdout,
            stderr,
            stdout_buf,
            stderr_buf,
        } = self;

        // Wait until either of these make progress.
        let res = tokio::select! {
            res = fill_buf_opt(stdout.as_mut(), stdout_buf), if !is_done_opt(stdout) => {
                res.map_err(|error| ChildFdError::ReadStdout(Arc::new(error)))
            }
            res = fill_buf_opt(stderr.as_mut(), stderr_buf), if !is_done_opt(stderr) => {
                res.map_err(|error| ChildFdError::ReadStderr(Arc::new(error)))
            }
            // If both are done, do nothing.
            else => {
                Ok(())
            }
        };

        acc.push_chunk(stdout_buf, OutputStream::Stdout);
        stdout_buf.clear();
        acc.push_chunk(stderr_buf, OutputStream::Stderr);
        stderr_buf.clear();

        res
    }
}

/// Output and error accumulator for a child process.
pub(crate) struct ChildAccumulator {
    pub(crate) fds: ChildFds,
    pub(crate) output: OutputAccumulator,
    pub(crate) errors: Vec<ChildFdError>,
}

impl ChildAccumulator {
    pub(crate) fn new(fds: ChildFds) -> Self {
        Self {
            fds,
            output: OutputAccumulator::new(),
            errors: Vec::new(),
        }
    }

    pub(crate) async fn fill_buf(&mut self) {
        let res = self.fds.fill_buf(&mut self.output).await;
        if let Err(error) = res {
            self.errors.push(error);
        }
    }

    /// Reads until both streams hit end-of-file.
    pub(crate) async fn drain(&mut self) {
        while !self.fds.is_done() {
            self.fill_buf().await;
        }
    }

    /// Marks the collection as done, returning the captured output.
    pub(crate) fn freeze(self) -> (CapturedOutput, Vec<ChildFdError>) {
        (self.output.freeze(), self.errors)
    }
}
