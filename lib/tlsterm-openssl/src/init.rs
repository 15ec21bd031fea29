/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::sync::OnceLock;

use thiserror::Error;

use crate::ffi;

#[derive(Clone, Copy, Debug, Error, Eq, PartialEq)]
pub enum InitError {
    #[error("not enough entropy in the pool")]
    NotEnoughEntropy,
}

static INIT_RESULT: OnceLock<Result<(), InitError>> = OnceLock::new();

/// Initialize the ssl library for the whole process.
///
/// This should be called before any listener is configured. It is safe to
/// call it more than once, the later calls return the first result.
pub fn init() -> Result<(), InitError> {
    *INIT_RESULT.get_or_init(|| {
        openssl::init();

        if unsafe { ffi::RAND_status() } == 1 {
            Ok(())
        } else {
            Err(InitError::NotEnoughEntropy)
        }
    })
}
