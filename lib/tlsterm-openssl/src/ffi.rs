/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::ptr;

use libc::{c_int, c_long};
use openssl_sys::{SSL, SSL_CTRL_MODE, SSL_CTX, SSL_CTX_ctrl};

const SSL_CTRL_GET_READ_AHEAD: c_int = 40;
const SSL_CTRL_SET_READ_AHEAD: c_int = 41;

unsafe extern "C" {
    pub fn RAND_status() -> c_int;
    pub fn SSL_has_pending(s: *const SSL) -> c_int;
}

#[allow(non_snake_case)]
pub unsafe fn SSL_CTX_set_read_ahead(ctx: *mut SSL_CTX, yes: c_long) -> c_long {
    unsafe { SSL_CTX_ctrl(ctx, SSL_CTRL_SET_READ_AHEAD, yes, ptr::null_mut()) }
}

#[allow(non_snake_case)]
pub unsafe fn SSL_CTX_get_read_ahead(ctx: *mut SSL_CTX) -> c_long {
    unsafe { SSL_CTX_ctrl(ctx, SSL_CTRL_GET_READ_AHEAD, 0, ptr::null_mut()) }
}

#[allow(non_snake_case)]
pub unsafe fn SSL_CTX_get_mode(ctx: *mut SSL_CTX) -> c_long {
    unsafe { SSL_CTX_ctrl(ctx, SSL_CTRL_MODE, 0, ptr::null_mut()) }
}
