/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::fmt;

/// The readiness a suspended operation is waiting for.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum WaitFor {
    Readable,
    Writable,
}

/// Result of one invocation of a connection read or write hook.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum NetworkStatus {
    /// Progress was made, no need to wait, but stop for now.
    Success,
    /// Nothing can be done until the socket readiness changes.
    WaitForEvent(WaitFor),
    /// The peer closed the connection, no fault on our side.
    ConnectionClose,
    FatalError,
}

impl NetworkStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            NetworkStatus::ConnectionClose | NetworkStatus::FatalError
        )
    }
}

impl fmt::Display for NetworkStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NetworkStatus::Success => f.write_str("success"),
            NetworkStatus::WaitForEvent(WaitFor::Readable) => f.write_str("wait for readable"),
            NetworkStatus::WaitForEvent(WaitFor::Writable) => f.write_str("wait for writable"),
            NetworkStatus::ConnectionClose => f.write_str("connection close"),
            NetworkStatus::FatalError => f.write_str("fatal error"),
        }
    }
}
