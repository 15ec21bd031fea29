/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use slog::{Drain, o};
use slog_scope::GlobalLoggerGuard;

use tlsterm_stdlog::AsyncLogConfig;

const PROCESS_LOG_THREAD_NAME: &str = "log-process";

fn log_level(verbose_level: u8) -> log::Level {
    match verbose_level {
        0 => log::Level::Warn,
        1 => log::Level::Info,
        2 => log::Level::Debug,
        _ => log::Level::Trace,
    }
}

/// Route the `log` facade to an async stderr drain.
///
/// Keep the returned guard alive for the whole process.
pub fn setup(verbose_level: u8) -> Result<GlobalLoggerGuard, log::SetLoggerError> {
    let async_conf = AsyncLogConfig::with_name(PROCESS_LOG_THREAD_NAME);
    let drain = tlsterm_stdlog::new_async_logger(&async_conf, true, false);
    let logger = slog::Logger::root(drain.fuse(), o!());

    let scope_guard = slog_scope::set_global_logger(logger);

    slog_stdlog::init_with_level(log_level(verbose_level))?;
    Ok(scope_guard)
}
