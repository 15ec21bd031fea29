/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::fs;
use std::path::Path;

use anyhow::{Context, anyhow};
use yaml_rust::{Yaml, YamlLoader};

/// Load the first document of the yaml file at `path`.
pub fn load_doc(path: &Path) -> anyhow::Result<Yaml> {
    let content = fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read file {}: {e}", path.display()))?;
    let docs = YamlLoader::load_from_str(&content)
        .context(format!("failed to parse yaml file {}", path.display()))?;
    docs.into_iter()
        .next()
        .ok_or_else(|| anyhow!("no yaml document found in {}", path.display()))
}
