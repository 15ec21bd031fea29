/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::time::Duration;

use anyhow::{Context, anyhow};
use yaml_rust::Yaml;

const DEFAULT_BUFFER_LIMIT: usize = 512 * 1024;
const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RuntimeConfig {
    /// Quota of both the inbound and the outbound chunk queue of a connection.
    pub buffer_limit: usize,
    pub idle_timeout: Duration,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        RuntimeConfig {
            buffer_limit: DEFAULT_BUFFER_LIMIT,
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
        }
    }
}

impl RuntimeConfig {
    pub(super) fn parse(v: &Yaml) -> anyhow::Result<Self> {
        let Yaml::Hash(map) = v else {
            return Err(anyhow!("yaml value type for 'runtime' should be 'map'"));
        };

        let mut config = RuntimeConfig::default();
        tlsterm_yaml::foreach_kv(map, |k, v| config.set(k, v))?;
        Ok(config)
    }

    fn set(&mut self, k: &str, v: &Yaml) -> anyhow::Result<()> {
        match tlsterm_yaml::key::normalize(k).as_str() {
            "buffer_limit" => {
                let limit = tlsterm_yaml::humanize::as_usize(v)
                    .context(format!("invalid humanize usize value for key {k}"))?;
                if limit == 0 {
                    return Err(anyhow!("buffer limit should not be zero"));
                }
                self.buffer_limit = limit;
                Ok(())
            }
            "idle_timeout" => {
                self.idle_timeout = tlsterm_yaml::humanize::as_duration(v)
                    .context(format!("invalid humanize duration value for key {k}"))?;
                Ok(())
            }
            _ => Err(anyhow!("invalid key {k}")),
        }
    }
}
