/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

mod limit;
pub use limit::QueueLimit;

mod queue;
pub use queue::ChunkQueue;

mod status;
pub use status::{NetworkStatus, WaitFor};
