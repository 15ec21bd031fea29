/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

/// Lowercase the key and use `_` as word separator, so `CA-File` matches `ca_file`.
pub fn normalize(raw: &str) -> String {
    raw.to_lowercase().replace('-', "_")
}
