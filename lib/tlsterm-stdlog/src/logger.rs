/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::sync::Arc;

use flume::{Sender, TrySendError};
use slog::{Drain, OwnedKVList, Record};

use super::{LogStats, StdLogFormatter, StdLogValue};

pub struct AsyncLogger {
    sender: Sender<StdLogValue>,
    formatter: StdLogFormatter,
    stats: Arc<LogStats>,
}

impl AsyncLogger {
    pub(crate) fn new(
        sender: Sender<StdLogValue>,
        formatter: StdLogFormatter,
        stats: Arc<LogStats>,
    ) -> Self {
        AsyncLogger {
            sender,
            formatter,
            stats,
        }
    }

    pub fn get_stats(&self) -> Arc<LogStats> {
        Arc::clone(&self.stats)
    }
}

impl Drain for AsyncLogger {
    type Ok = ();
    type Err = slog::Error;

    fn log(&self, record: &Record, logger_values: &OwnedKVList) -> Result<(), slog::Error> {
        self.stats.add_total();

        match self.formatter.format_slog(record, logger_values) {
            Ok(v) => {
                match self.sender.try_send(v) {
                    Ok(_) => {}
                    Err(TrySendError::Full(_)) => self.stats.add_channel_overflow(),
                    Err(TrySendError::Disconnected(_)) => self.stats.add_channel_closed(),
                }
                Ok(())
            }
            Err(e) => {
                self.stats.add_format_failed();
                Err(e)
            }
        }
    }
}
