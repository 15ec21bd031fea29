/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::collections::VecDeque;

use bytes::Bytes;

use super::QueueLimit;

/// An ordered queue of pending bytes, kept as the chunks they were appended as.
///
/// Chunks are never merged, so the front chunk stays at the same address
/// until it is consumed by [`ChunkQueue::skip`].
#[derive(Debug, Default)]
pub struct ChunkQueue {
    chunks: VecDeque<Bytes>,
    length: usize,
    bytes_in: u64,
    bytes_out: u64,
    limit: QueueLimit,
}

impl ChunkQueue {
    pub fn new() -> Self {
        ChunkQueue::default()
    }

    pub fn with_limit(limit: usize) -> Self {
        ChunkQueue {
            limit: QueueLimit::new(limit),
            ..Default::default()
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.length
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    #[inline]
    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    #[inline]
    pub fn bytes_in(&self) -> u64 {
        self.bytes_in
    }

    #[inline]
    pub fn bytes_out(&self) -> u64 {
        self.bytes_out
    }

    #[inline]
    pub fn limit(&self) -> &QueueLimit {
        &self.limit
    }

    pub fn remaining_quota(&self) -> Option<usize> {
        self.limit.remaining()
    }

    pub fn is_full(&self) -> bool {
        self.limit.is_full()
    }

    pub fn append_bytes(&mut self, data: Bytes) {
        if data.is_empty() {
            return;
        }
        let len = data.len();
        self.length += len;
        self.bytes_in += len as u64;
        self.limit.add(len);
        self.chunks.push_back(data);
    }

    /// Append the buffer, taking over its allocation.
    pub fn append_vec(&mut self, data: Vec<u8>) {
        self.append_bytes(Bytes::from(data));
    }

    /// Move all chunks of `other` to the end of this queue.
    pub fn steal_all(&mut self, other: &mut ChunkQueue) {
        while let Some(chunk) = other.chunks.pop_front() {
            let len = chunk.len();
            other.length -= len;
            other.bytes_out += len as u64;
            other.limit.sub(len);
            self.append_bytes(chunk);
        }
    }

    /// Get at most `max_len` bytes from the start of the front chunk.
    pub fn front_chunk(&self, max_len: usize) -> Option<&[u8]> {
        self.chunks.front().map(|chunk| {
            let len = chunk.len().min(max_len);
            &chunk[..len]
        })
    }

    /// Drop `len` bytes from the front of the queue, return the bytes really dropped.
    pub fn skip(&mut self, mut len: usize) -> usize {
        let mut skipped = 0;
        while len > 0 {
            let Some(chunk) = self.chunks.front_mut() else {
                break;
            };
            if chunk.len() > len {
                let _ = chunk.split_to(len);
                skipped += len;
                break;
            }
            len -= chunk.len();
            skipped += chunk.len();
            self.chunks.pop_front();
        }
        self.length -= skipped;
        self.bytes_out += skipped as u64;
        self.limit.sub(skipped);
        skipped
    }

    pub fn clear(&mut self) {
        let len = self.length;
        let _ = self.skip(len);
    }
}
