/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::collections::HashSet;
use std::path::Path;

use anyhow::{Context, anyhow};
use yaml_rust::Yaml;

mod listener;
pub use listener::ListenerConfig;

mod runtime;
pub use runtime::RuntimeConfig;

#[derive(Clone, Debug, Default)]
pub struct TlstermConfig {
    pub runtime: RuntimeConfig,
    pub listeners: Vec<ListenerConfig>,
}

impl TlstermConfig {
    fn set(&mut self, k: &str, v: &Yaml, conf_dir: &Path) -> anyhow::Result<()> {
        match tlsterm_yaml::key::normalize(k).as_str() {
            "runtime" => {
                self.runtime = RuntimeConfig::parse(v)?;
                Ok(())
            }
            "listener" | "listeners" => {
                let listeners =
                    tlsterm_yaml::value::as_list(v, |v| ListenerConfig::parse(v, conf_dir))?;
                self.listeners.extend(listeners);
                Ok(())
            }
            _ => Err(anyhow!("invalid key {k}")),
        }
    }

    fn check(&self) -> anyhow::Result<()> {
        if self.listeners.is_empty() {
            return Err(anyhow!("no listener is configured"));
        }
        let mut names = HashSet::with_capacity(self.listeners.len());
        for listener in &self.listeners {
            if !names.insert(listener.name()) {
                return Err(anyhow!("duplicate listener name {}", listener.name()));
            }
        }
        Ok(())
    }
}

/// Parse the main config document, relative paths in it are resolved in `conf_dir`.
pub fn parse(doc: &Yaml, conf_dir: &Path) -> anyhow::Result<TlstermConfig> {
    let Yaml::Hash(map) = doc else {
        return Err(anyhow!("root value type should be hash"));
    };

    let mut config = TlstermConfig::default();
    tlsterm_yaml::foreach_kv(map, |k, v| config.set(k, v, conf_dir))?;
    config.check()?;
    Ok(config)
}

pub fn load(config_file: &Path) -> anyhow::Result<TlstermConfig> {
    let doc = tlsterm_yaml::load_doc(config_file)?;
    let conf_dir = config_file.parent().unwrap_or_else(|| Path::new("."));
    parse(&doc, conf_dir).context(format!(
        "failed to parse config file {}",
        config_file.display()
    ))
}
