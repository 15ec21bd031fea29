/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::io;

use libc::c_int;
use log::{debug, error, warn};

use tlsterm_io::NetworkStatus;

use crate::{Diagnostic, Diagnostics, NoiseFilter, SslErrorCode, SslIoError};

const ERR_LIB_SYS: c_int = 2;

fn is_peer_reset(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::BrokenPipe | io::ErrorKind::ConnectionReset
    )
}

/// Newer engines queue the socket errno as a system library entry.
fn is_peer_reset_entry(d: &Diagnostic) -> bool {
    d.library_code() == ERR_LIB_SYS && matches!(d.reason_code(), libc::EPIPE | libc::ECONNRESET)
}

fn only_peer_reset(diagnostics: &Diagnostics) -> bool {
    !diagnostics.is_empty() && diagnostics.as_slice().iter().all(is_peer_reset_entry)
}

/// Map a failed `SSL_write` to the status of the connection.
///
/// All queued diagnostics are consumed and logged before returning.
pub(crate) fn write_error(e: SslIoError) -> NetworkStatus {
    let (code, io_error, diagnostics) = e.into_parts();
    if let Some(wait) = code.wait_for() {
        return NetworkStatus::WaitForEvent(wait);
    }

    match code {
        SslErrorCode::Syscall => {
            if only_peer_reset(&diagnostics) {
                for d in diagnostics {
                    debug!("SSL_write: {d}");
                }
                return NetworkStatus::ConnectionClose;
            }
            if !diagnostics.is_empty() {
                for d in diagnostics {
                    error!("SSL_write: {d}");
                }
                return NetworkStatus::FatalError;
            }
            match io_error {
                Some(e) if is_peer_reset(&e) => NetworkStatus::ConnectionClose,
                Some(e) => {
                    error!("SSL_write: {e}");
                    NetworkStatus::FatalError
                }
                None => {
                    error!("SSL_write: unexpected eof");
                    NetworkStatus::ConnectionClose
                }
            }
        }
        SslErrorCode::ZeroReturn => NetworkStatus::ConnectionClose,
        _ => {
            for d in diagnostics {
                error!("SSL_write: {d}");
            }
            NetworkStatus::FatalError
        }
    }
}

/// Map a failed `SSL_read` to the status of the connection.
///
/// Diagnostics accepted by `noise` do not make the result fatal.
pub(crate) fn read_error(e: SslIoError, noise: &NoiseFilter) -> NetworkStatus {
    let (code, io_error, diagnostics) = e.into_parts();
    if let Some(wait) = code.wait_for() {
        return NetworkStatus::WaitForEvent(wait);
    }

    match code {
        SslErrorCode::Syscall => {
            if only_peer_reset(&diagnostics) {
                for d in diagnostics {
                    debug!("SSL_read: {d}");
                }
                return NetworkStatus::ConnectionClose;
            }
            for d in diagnostics {
                error!("SSL_read: {d}");
            }
            match io_error {
                Some(e) if is_peer_reset(&e) => NetworkStatus::ConnectionClose,
                Some(e) => {
                    error!("SSL_read: {e}");
                    NetworkStatus::FatalError
                }
                None => {
                    error!("SSL_read: unexpected eof");
                    NetworkStatus::FatalError
                }
            }
        }
        SslErrorCode::ZeroReturn => NetworkStatus::ConnectionClose,
        _ => {
            let mut escalated = false;
            for d in diagnostics {
                if noise.is_noise(&d) {
                    if noise.log_noise() {
                        warn!("SSL_read: {d}");
                    } else {
                        debug!("SSL_read: {d}");
                    }
                    continue;
                }
                escalated = true;
                error!("SSL_read: {d}");
            }
            if escalated {
                NetworkStatus::FatalError
            } else {
                NetworkStatus::ConnectionClose
            }
        }
    }
}
