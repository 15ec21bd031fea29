/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub(crate) enum ServerTaskError {
    #[error("closed by client")]
    ClosedByClient,
    #[error("client tls failed")]
    ClientTlsFailed,
    #[error("client wait failed: {0:?}")]
    ClientWaitFailed(io::Error),
    #[error("backend connect failed: {0:?}")]
    BackendConnectFailed(io::Error),
    #[error("backend read failed: {0:?}")]
    BackendReadFailed(io::Error),
    #[error("backend write failed: {0:?}")]
    BackendWriteFailed(io::Error),
    #[error("idle timeout")]
    IdleTimeout,
    #[error("server force quit")]
    ServerForceQuit,
}

impl ServerTaskError {
    /// Whether the connection ended without a fault on either side.
    pub(crate) fn is_normal_close(&self) -> bool {
        matches!(
            self,
            ServerTaskError::ClosedByClient | ServerTaskError::ServerForceQuit
        )
    }
}
