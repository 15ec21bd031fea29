/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::path::{Path, PathBuf};

use anyhow::anyhow;
use yaml_rust::Yaml;

/// Get the path of an existing regular file, relative paths are resolved in `lookup_dir`.
pub fn as_file_path(v: &Yaml, lookup_dir: Option<&Path>) -> anyhow::Result<PathBuf> {
    let Yaml::String(path) = v else {
        return Err(anyhow!("yaml value type for path should be string"));
    };
    if path.is_empty() {
        return Err(anyhow!("empty path"));
    }

    let path = PathBuf::from(path);
    let path = match lookup_dir {
        Some(dir) if path.is_relative() => dir.join(path),
        _ => path,
    };
    if !path.exists() {
        return Err(anyhow!("path {} is not existed", path.display()));
    }
    if !path.is_file() {
        return Err(anyhow!("path {} is not a regular file", path.display()));
    }
    path.canonicalize()
        .map_err(|e| anyhow!("invalid path {}: {e}", path.display()))
}
