/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::fmt;
use std::io::{self, Read, Write};

use libc::c_int;
use openssl::error::ErrorStack;
use openssl::foreign_types::ForeignTypeRef;
use log::debug;
use openssl::ssl::{self, ErrorCode, Ssl, SslStream};
use thiserror::Error;

use tlsterm_io::WaitFor;

use crate::noise::ERR_LIB_SSL;
use crate::{Diagnostics, EngineContext, ffi};

const SSL_R_UNEXPECTED_EOF_WHILE_READING: c_int = 294;

/// Classification of a failed engine read or write.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SslErrorCode {
    WantRead,
    WantWrite,
    /// Transport level failure, look at the os error.
    Syscall,
    /// The peer sent close notify.
    ZeroReturn,
    Ssl,
    Other(c_int),
}

impl SslErrorCode {
    /// The readiness to wait for before retrying, `None` if a retry makes no sense.
    pub fn wait_for(&self) -> Option<WaitFor> {
        match self {
            SslErrorCode::WantRead => Some(WaitFor::Readable),
            SslErrorCode::WantWrite => Some(WaitFor::Writable),
            _ => None,
        }
    }
}

impl From<ErrorCode> for SslErrorCode {
    fn from(code: ErrorCode) -> Self {
        match code {
            ErrorCode::WANT_READ => SslErrorCode::WantRead,
            ErrorCode::WANT_WRITE => SslErrorCode::WantWrite,
            ErrorCode::SYSCALL => SslErrorCode::Syscall,
            ErrorCode::ZERO_RETURN => SslErrorCode::ZeroReturn,
            ErrorCode::SSL => SslErrorCode::Ssl,
            _ => SslErrorCode::Other(code.as_raw()),
        }
    }
}

#[derive(Debug)]
pub struct SslIoError {
    code: SslErrorCode,
    io_error: Option<io::Error>,
    diagnostics: Diagnostics,
}

impl SslIoError {
    pub fn new(code: SslErrorCode) -> Self {
        SslIoError {
            code,
            io_error: None,
            diagnostics: Diagnostics::default(),
        }
    }

    pub fn with_io_error(mut self, e: io::Error) -> Self {
        self.io_error = Some(e);
        self
    }

    pub fn with_diagnostics(mut self, diagnostics: Diagnostics) -> Self {
        self.diagnostics = diagnostics;
        self
    }

    #[inline]
    pub fn code(&self) -> SslErrorCode {
        self.code
    }

    /// Whether the peer closed the transport without sending close notify.
    ///
    /// The engine reports this either as a syscall error with no os error,
    /// or as an ssl error carrying only the unexpected eof reason.
    pub fn is_unexpected_eof(&self) -> bool {
        match self.code {
            SslErrorCode::Syscall => self.io_error.is_none() && self.diagnostics.is_empty(),
            SslErrorCode::Ssl => {
                let entries = self.diagnostics.as_slice();
                !entries.is_empty()
                    && entries.iter().all(|d| {
                        d.library_code() == ERR_LIB_SSL
                            && d.reason_code() == SSL_R_UNEXPECTED_EOF_WHILE_READING
                    })
            }
            _ => false,
        }
    }

    pub fn into_parts(self) -> (SslErrorCode, Option<io::Error>, Diagnostics) {
        (self.code, self.io_error, self.diagnostics)
    }
}

impl fmt::Display for SslIoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ssl error {:?}", self.code)?;
        if let Some(e) = &self.io_error {
            write!(f, ": {e}")?;
        }
        Ok(())
    }
}

impl std::error::Error for SslIoError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.io_error
            .as_ref()
            .map(|e| e as &(dyn std::error::Error + 'static))
    }
}

impl From<ssl::Error> for SslIoError {
    fn from(e: ssl::Error) -> Self {
        let code = SslErrorCode::from(e.code());
        let diagnostics = e
            .ssl_error()
            .map(Diagnostics::from_error_stack)
            .unwrap_or_default();
        let io_error = e.into_io_error().ok();
        SslIoError {
            code,
            io_error,
            diagnostics,
        }
    }
}

#[derive(Debug, Error)]
pub enum SessionCreateError {
    #[error("SSL_new: {0}")]
    NewSession(ErrorStack),
    #[error("SSL_set_fd: {0}")]
    BindSocket(ErrorStack),
}

/// The engine calls a session adapter needs.
pub trait SslSessionIo {
    /// Reset the transient error state of the engine.
    fn clear_error(&mut self);

    fn ssl_read(&mut self, buf: &mut [u8]) -> Result<usize, SslIoError>;

    fn ssl_write(&mut self, buf: &[u8]) -> Result<usize, SslIoError>;

    /// Send close notify, the result is ignored.
    fn shutdown(&mut self);

    /// Whether decrypted or raw bytes are still buffered inside the engine.
    fn has_pending(&self) -> bool;
}

/// A server side openssl session bound to one socket.
pub struct OpensslSession<S> {
    stream: SslStream<S>,
}

impl<S: Read + Write> OpensslSession<S> {
    pub fn new(ctx: &EngineContext, io: S) -> Result<Self, SessionCreateError> {
        let mut ssl = Ssl::new(ctx.ssl_context()).map_err(SessionCreateError::NewSession)?;
        ssl.set_accept_state();
        let stream = SslStream::new(ssl, io).map_err(SessionCreateError::BindSocket)?;
        Ok(OpensslSession { stream })
    }
}

impl<S: Read + Write> SslSessionIo for OpensslSession<S> {
    fn clear_error(&mut self) {
        let _ = ErrorStack::get();
    }

    fn ssl_read(&mut self, buf: &mut [u8]) -> Result<usize, SslIoError> {
        match self.stream.ssl_read(buf) {
            Ok(n) => Ok(n),
            Err(e) => {
                let e = SslIoError::from(e);
                if e.is_unexpected_eof() {
                    Ok(0)
                } else {
                    Err(e)
                }
            }
        }
    }

    fn ssl_write(&mut self, buf: &[u8]) -> Result<usize, SslIoError> {
        self.stream.ssl_write(buf).map_err(SslIoError::from)
    }

    fn shutdown(&mut self) {
        let _ = self.stream.shutdown();
        for d in Diagnostics::drain_thread_queue() {
            debug!("SSL_shutdown: {d}");
        }
    }

    fn has_pending(&self) -> bool {
        unsafe { ffi::SSL_has_pending(self.stream.ssl().as_ptr()) == 1 }
    }
}
