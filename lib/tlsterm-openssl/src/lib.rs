/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

mod ffi;

mod init;
pub use init::{InitError, init};

mod protocol;
pub use protocol::OpensslProtocol;

mod diag;
pub use diag::{Diagnostic, Diagnostics};

mod noise;
pub use noise::{NoiseFilter, SslNoise};

mod context;
pub use context::{EngineContext, EngineContextBuilder};

mod session;
pub use session::{OpensslSession, SessionCreateError, SslErrorCode, SslIoError, SslSessionIo};

mod wrapper;
pub use wrapper::SocketIo;

mod translate;

mod adapter;
pub use adapter::{BLOCK_SIZE, MAX_READ_SIZE, SessionAdapter, read_budget};

#[cfg(test)]
mod test_util;
