/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::sync::Arc;

use anyhow::Context;
use log::{info, warn};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use tlsterm_openssl::EngineContext;

use crate::config::TlstermConfig;

mod error;
use error::ServerTaskError;

mod stats;
pub use stats::{ListenSnapshot, ListenStats};

mod runtime;
use runtime::ListenerRuntime;

mod task;

#[derive(Clone, Debug)]
pub(crate) enum ServerReloadCommand {
    QuitRuntime,
}

/// Build the engine contexts of all listeners, in config order.
///
/// Nothing is kept if any of them fails.
pub fn build_all(config: &TlstermConfig) -> anyhow::Result<Vec<EngineContext>> {
    let mut contexts = Vec::with_capacity(config.listeners.len());
    for listener in &config.listeners {
        let ctx = listener.build_engine_context()?;
        contexts.push(ctx);
    }
    Ok(contexts)
}

pub struct ServeHandle {
    quit_sender: broadcast::Sender<ServerReloadCommand>,
    runtimes: Vec<JoinHandle<()>>,
    stats: Vec<Arc<ListenStats>>,
}

impl ServeHandle {
    pub fn stats(&self) -> &[Arc<ListenStats>] {
        &self.stats
    }

    /// Stop all accept loops and tell the alive connections to quit.
    pub async fn stop(self) {
        let _ = self.quit_sender.send(ServerReloadCommand::QuitRuntime);
        for handle in self.runtimes {
            if let Err(e) = handle.await {
                warn!("listener runtime join error: {e}");
            }
        }
        for stats in &self.stats {
            let snap = stats.snapshot();
            info!(
                "SRT[{}] accepted {} setup failed {} closed {} fatal {} alive {}",
                stats.name(),
                snap.accepted,
                snap.setup_failed,
                snap.closed,
                snap.fatal,
                snap.alive
            );
        }
    }
}

/// Spawn one runtime for each listener, must be called inside a tokio runtime.
pub fn spawn_all(config: &TlstermConfig) -> anyhow::Result<ServeHandle> {
    let contexts = build_all(config).context("failed to setup listeners")?;

    let runtime_config = Arc::new(config.runtime.clone());
    let (quit_sender, _) = broadcast::channel(4);
    let mut runtimes = Vec::with_capacity(contexts.len());
    let mut all_stats = Vec::with_capacity(contexts.len());
    for (listener, ctx) in config.listeners.iter().zip(contexts) {
        let stats = Arc::new(ListenStats::new(listener.name()));
        let runtime = ListenerRuntime::new(
            Arc::new(listener.clone()),
            runtime_config.clone(),
            ctx,
            stats.clone(),
        );
        runtimes.push(runtime.into_running(&quit_sender));
        all_stats.push(stats);
    }

    Ok(ServeHandle {
        quit_sender,
        runtimes,
        stats: all_stats,
    })
}
