/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::io::{Read, Write};
use std::mem;
use std::sync::Arc;

use log::{debug, warn};

use tlsterm_io::{ChunkQueue, NetworkStatus};

use crate::{EngineContext, NoiseFilter, OpensslSession, SessionCreateError, SslSessionIo, translate};

/// Size of one engine read or write attempt.
pub const BLOCK_SIZE: usize = 16 * 1024;
const MAX_READ_BLOCKS: usize = 16;
/// Upper bound of bytes staged by one read hook invocation.
pub const MAX_READ_SIZE: usize = BLOCK_SIZE * MAX_READ_BLOCKS;

/// The read budget for the next read hook invocation on `cq`.
///
/// Zero is returned when the queue is already full. A zero budget still
/// performs one read attempt, so readiness reported by the os is consumed.
pub fn read_budget(cq: &ChunkQueue) -> usize {
    let mut max_read = MAX_READ_SIZE;
    if let Some(remaining) = cq.remaining_quota()
        && remaining < max_read
    {
        max_read = remaining;
        if max_read == 0 {
            warn!("fd should be disabled as chunk queue is already full");
        }
    }
    max_read
}

enum ReadState {
    Idle,
    /// The buffer of a suspended read, it must be passed again as is.
    Pending(Vec<u8>),
}

enum WriteState {
    Idle,
    /// Length of the chunk of a suspended write, the chunk itself is still
    /// at the front of the outbound queue.
    Pending { len: usize },
}

/// Tls connection hooks for one accepted connection.
pub struct SessionAdapter<S: SslSessionIo> {
    session: Option<S>,
    read_state: ReadState,
    write_state: WriteState,
    noise: Arc<NoiseFilter>,
}

impl<IO: Read + Write> SessionAdapter<OpensslSession<IO>> {
    /// Create a server side session on `io`.
    pub fn create(ctx: &EngineContext, io: IO) -> Result<Self, SessionCreateError> {
        let session = OpensslSession::new(ctx, io)?;
        Ok(SessionAdapter::new(session, ctx.noise_filter().clone()))
    }
}

impl<S: SslSessionIo> SessionAdapter<S> {
    pub fn new(session: S, noise: Arc<NoiseFilter>) -> Self {
        SessionAdapter {
            session: Some(session),
            read_state: ReadState::Idle,
            write_state: WriteState::Idle,
            noise,
        }
    }

    #[inline]
    pub fn is_active(&self) -> bool {
        self.session.is_some()
    }

    /// Whether the engine can return more data without waiting for the socket.
    pub fn has_pending(&self) -> bool {
        self.session.as_ref().map(|s| s.has_pending()).unwrap_or(false)
    }

    /// Decrypt bytes from the session into `cq`, staging at most `max_read` bytes.
    ///
    /// Use [`read_budget`] to get `max_read`.
    pub fn read(&mut self, cq: &mut ChunkQueue, max_read: usize) -> NetworkStatus {
        let Some(session) = self.session.as_mut() else {
            debug!("SSL_read: session already closed");
            return NetworkStatus::FatalError;
        };

        let mut retained = match mem::replace(&mut self.read_state, ReadState::Idle) {
            ReadState::Pending(buf) => Some(buf),
            ReadState::Idle => None,
        };
        let mut len = 0usize;
        loop {
            let mut buf = retained.take().unwrap_or_else(|| {
                let size = if max_read == 0 {
                    BLOCK_SIZE
                } else {
                    BLOCK_SIZE.min(max_read - len)
                };
                vec![0u8; size]
            });

            session.clear_error();
            match session.ssl_read(&mut buf) {
                Ok(0) => return NetworkStatus::ConnectionClose,
                Ok(r) => {
                    let filled = r == buf.len();
                    buf.truncate(r);
                    cq.append_vec(buf);
                    len += r;
                    if !(filled && len < max_read) {
                        return NetworkStatus::Success;
                    }
                }
                Err(e) => {
                    if let Some(wait) = e.code().wait_for() {
                        self.read_state = ReadState::Pending(buf);
                        return NetworkStatus::WaitForEvent(wait);
                    }
                    return translate::read_error(e, &self.noise);
                }
            }
        }
    }

    /// Encrypt bytes from the front of `cq` into the session, at most about `write_max` bytes.
    ///
    /// At least one chunk is tried if `cq` is not empty.
    pub fn write(&mut self, cq: &mut ChunkQueue, mut write_max: usize) -> NetworkStatus {
        let Some(session) = self.session.as_mut() else {
            debug!("SSL_write: session already closed");
            return NetworkStatus::FatalError;
        };

        loop {
            let Some(front) = cq.front_chunk(BLOCK_SIZE) else {
                self.write_state = WriteState::Idle;
                return NetworkStatus::Success;
            };
            let chunk = match self.write_state {
                WriteState::Pending { len } => &front[..len.min(front.len())],
                WriteState::Idle => front,
            };
            let block_len = chunk.len();

            session.clear_error();
            match session.ssl_write(chunk) {
                Ok(r) => {
                    self.write_state = WriteState::Idle;
                    cq.skip(r);
                    write_max = write_max.saturating_sub(r);
                    if !(r == block_len && write_max > 0) {
                        return NetworkStatus::Success;
                    }
                }
                Err(e) => {
                    if let Some(wait) = e.code().wait_for() {
                        self.write_state = WriteState::Pending { len: block_len };
                        return NetworkStatus::WaitForEvent(wait);
                    }
                    self.write_state = WriteState::Idle;
                    return translate::write_error(e);
                }
            }
        }
    }

    /// Shut down and release the session. Calling it again does nothing.
    pub fn close(&mut self) {
        if let Some(mut session) = self.session.take() {
            session.shutdown();
        }
        self.read_state = ReadState::Idle;
        self.write_state = WriteState::Idle;
    }
}

impl<S: SslSessionIo> Drop for SessionAdapter<S> {
    fn drop(&mut self) {
        self.close();
    }
}
