/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::sync::Arc;
use std::sync::atomic::{AtomicI32, AtomicIsize, AtomicU64, Ordering};

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct ListenSnapshot {
    pub accepted: u64,
    pub setup_failed: u64,
    pub closed: u64,
    pub fatal: u64,
    pub alive: i32,
}

/// Connection counters of one listener.
#[derive(Debug)]
pub struct ListenStats {
    name: String,

    runtime_count: AtomicIsize,
    accepted: AtomicU64,
    setup_failed: AtomicU64,
    closed: AtomicU64,
    fatal: AtomicU64,
    alive: AtomicI32,
}

impl ListenStats {
    pub fn new(name: &str) -> Self {
        ListenStats {
            name: name.to_string(),
            runtime_count: AtomicIsize::new(0),
            accepted: AtomicU64::new(0),
            setup_failed: AtomicU64::new(0),
            closed: AtomicU64::new(0),
            fatal: AtomicU64::new(0),
            alive: AtomicI32::new(0),
        }
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub(super) fn add_running_runtime(self: &Arc<Self>) -> ListenAliveGuard {
        self.runtime_count.fetch_add(1, Ordering::Relaxed);
        ListenAliveGuard(self.clone())
    }

    #[inline]
    pub fn is_running(&self) -> bool {
        self.runtime_count.load(Ordering::Relaxed) > 0
    }

    pub(super) fn add_accepted(&self) {
        self.accepted.fetch_add(1, Ordering::Relaxed);
    }

    pub(super) fn add_setup_failed(&self) {
        self.setup_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub(super) fn add_closed(&self) {
        self.closed.fetch_add(1, Ordering::Relaxed);
    }

    pub(super) fn add_fatal(&self) {
        self.fatal.fetch_add(1, Ordering::Relaxed);
    }

    #[must_use]
    pub(super) fn add_alive_task(self: &Arc<Self>) -> TaskAliveGuard {
        self.alive.fetch_add(1, Ordering::Relaxed);
        TaskAliveGuard(self.clone())
    }

    pub fn snapshot(&self) -> ListenSnapshot {
        ListenSnapshot {
            accepted: self.accepted.load(Ordering::Relaxed),
            setup_failed: self.setup_failed.load(Ordering::Relaxed),
            closed: self.closed.load(Ordering::Relaxed),
            fatal: self.fatal.load(Ordering::Relaxed),
            alive: self.alive.load(Ordering::Relaxed),
        }
    }
}

pub(super) struct ListenAliveGuard(Arc<ListenStats>);

impl Drop for ListenAliveGuard {
    fn drop(&mut self) {
        self.0.runtime_count.fetch_sub(1, Ordering::Relaxed);
    }
}

pub(super) struct TaskAliveGuard(Arc<ListenStats>);

impl Drop for TaskAliveGuard {
    fn drop(&mut self) {
        self.0.alive.fetch_sub(1, Ordering::Relaxed);
    }
}
