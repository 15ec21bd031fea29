/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use anyhow::{Context, anyhow};
use log::{debug, error, info};

use tlsterm::config::TlstermConfig;

fn main() -> anyhow::Result<()> {
    let Some(proc_args) =
        tlsterm::opts::parse_clap().context("failed to parse command line options")?
    else {
        return Ok(());
    };

    // set up process logger early, only proc args is used inside
    let _log_guard =
        tlsterm::log::process::setup(proc_args.verbose_level).context("failed to setup logger")?;

    tlsterm_openssl::init().context("failed to init openssl")?;

    let config = tlsterm::config::load(&proc_args.config_file).context("failed to load config")?;
    debug!("loaded config from {}", proc_args.config_file.display());

    if proc_args.test_config {
        let contexts = tlsterm::serve::build_all(&config)?;
        println!("[ok] {} listener(s) checked", contexts.len());
        return Ok(());
    }

    match tokio_run(&config) {
        Ok(_) => Ok(()),
        Err(e) => {
            error!("{e:?}");
            Err(e)
        }
    }
}

fn tokio_run(config: &TlstermConfig) -> anyhow::Result<()> {
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| anyhow!("failed to start runtime: {e}"))?;
    rt.block_on(async {
        let handle = tlsterm::serve::spawn_all(config)?;
        info!("{} listener(s) spawned", handle.stats().len());

        tlsterm::signal::wait_for_quit().await?;
        info!("quit signal received");

        handle.stop().await;
        Ok(())
    })
}
