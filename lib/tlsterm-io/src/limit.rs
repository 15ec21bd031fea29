/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

/// Byte quota of a [`ChunkQueue`](crate::ChunkQueue).
///
/// A `limit` of zero means unlimited.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct QueueLimit {
    limit: usize,
    current: usize,
}

impl QueueLimit {
    pub fn new(limit: usize) -> Self {
        QueueLimit { limit, current: 0 }
    }

    #[inline]
    pub fn limit(&self) -> usize {
        self.limit
    }

    #[inline]
    pub fn current(&self) -> usize {
        self.current
    }

    #[inline]
    pub fn is_limited(&self) -> bool {
        self.limit > 0
    }

    /// Bytes that can still be staged, `None` if unlimited.
    pub fn remaining(&self) -> Option<usize> {
        if self.is_limited() {
            Some(self.limit.saturating_sub(self.current))
        } else {
            None
        }
    }

    pub fn is_full(&self) -> bool {
        self.is_limited() && self.current >= self.limit
    }

    pub(crate) fn add(&mut self, len: usize) {
        self.current += len;
    }

    pub(crate) fn sub(&mut self, len: usize) {
        self.current = self.current.saturating_sub(len);
    }
}
