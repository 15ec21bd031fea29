/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default, Eq, PartialEq)]
pub struct LogSnapshot {
    pub total: u64,
    pub passed: u64,
    pub size: u64,
    pub format_failed: u64,
    pub channel_closed: u64,
    pub channel_overflow: u64,
    pub io_failed: u64,
}

#[derive(Default)]
pub struct LogStats {
    total: AtomicU64,
    passed: AtomicU64,
    size: AtomicU64,
    format_failed: AtomicU64,
    channel_closed: AtomicU64,
    channel_overflow: AtomicU64,
    io_failed: AtomicU64,
}

impl LogStats {
    pub fn snapshot(&self) -> LogSnapshot {
        LogSnapshot {
            total: self.total.load(Ordering::Relaxed),
            passed: self.passed.load(Ordering::Relaxed),
            size: self.size.load(Ordering::Relaxed),
            format_failed: self.format_failed.load(Ordering::Relaxed),
            channel_closed: self.channel_closed.load(Ordering::Relaxed),
            channel_overflow: self.channel_overflow.load(Ordering::Relaxed),
            io_failed: self.io_failed.load(Ordering::Relaxed),
        }
    }

    pub(crate) fn add_total(&self) {
        self.total.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn add_passed(&self, size: usize) {
        self.passed.fetch_add(1, Ordering::Relaxed);
        self.size.fetch_add(size as u64, Ordering::Relaxed);
    }

    pub(crate) fn add_format_failed(&self) {
        self.format_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn add_channel_closed(&self) {
        self.channel_closed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn add_channel_overflow(&self) {
        self.channel_overflow.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn add_io_failed(&self) {
        self.io_failed.fetch_add(1, Ordering::Relaxed);
    }
}
