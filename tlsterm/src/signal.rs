/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use anyhow::anyhow;

/// Wait for Ctrl-C, or SIGTERM on unix.
pub async fn wait_for_quit() -> anyhow::Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let mut terminate = signal(SignalKind::terminate())
            .map_err(|e| anyhow!("failed to register SIGTERM handler: {e}"))?;
        tokio::select! {
            r = tokio::signal::ctrl_c() => {
                r.map_err(|e| anyhow!("failed to wait for Ctrl-C: {e}"))?;
            }
            _ = terminate.recv() => {}
        }
        Ok(())
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c()
            .await
            .map_err(|e| anyhow!("failed to wait for Ctrl-C: {e}"))
    }
}
