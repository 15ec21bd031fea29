/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::io::{self, Write};
use std::sync::Arc;

use chrono::Local;
use flume::Receiver;
use slog::Level;

mod config;
pub use config::AsyncLogConfig;

mod stats;
pub use stats::{LogSnapshot, LogStats};

mod format;
pub use format::StdLogFormatter;

mod logger;
pub use logger::AsyncLogger;

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";

pub struct StdLogValue {
    level: Level,
    message: String,
    kv_pairs: Vec<(String, String)>,
    location: Option<String>,
}

impl StdLogValue {
    fn message_str(&self) -> &str {
        if self.message.is_empty() {
            "()"
        } else {
            &self.message
        }
    }
}

/// Create a slog drain that sends records to a dedicated writer thread.
///
/// Records are dropped, not blocked on, when the channel is full.
pub fn new_async_logger(
    async_conf: &AsyncLogConfig,
    append_code_position: bool,
    use_stdout: bool,
) -> AsyncLogger {
    let (sender, receiver) = flume::bounded::<StdLogValue>(async_conf.channel_capacity);

    let stats = Arc::new(LogStats::default());

    let io_thread = AsyncIoThread {
        receiver,
        stats: Arc::clone(&stats),
    };

    let _detached_thread = std::thread::Builder::new()
        .name(async_conf.thread_name.clone())
        .spawn(move || {
            if use_stdout {
                io_thread.run(io::stdout());
            } else {
                io_thread.run(io::stderr());
            }
        });

    AsyncLogger::new(sender, StdLogFormatter::new(append_code_position), stats)
}

struct AsyncIoThread {
    receiver: Receiver<StdLogValue>,
    stats: Arc<LogStats>,
}

impl AsyncIoThread {
    fn run<IO: Write>(&self, mut io: IO) {
        let mut buf: Vec<u8> = Vec::with_capacity(1024);
        while let Ok(v) = self.receiver.recv() {
            buf.clear();
            let _ = write_plain(&mut buf, v);
            self.write_buf(&mut io, &buf);

            while let Ok(v) = self.receiver.try_recv() {
                buf.clear();
                let _ = write_plain(&mut buf, v);
                self.write_buf(&mut io, &buf);
            }

            let _ = io.flush();
        }
    }

    fn write_buf<IO: Write>(&self, io: &mut IO, buf: &[u8]) {
        match io.write_all(buf) {
            Ok(_) => self.stats.add_passed(buf.len()),
            Err(_) => self.stats.add_io_failed(),
        }
    }
}

fn write_plain<IO: Write>(io: &mut IO, v: StdLogValue) -> io::Result<()> {
    write!(io, "{}", Local::now().format(TIME_FORMAT))?;
    write!(io, " {}", v.level.as_short_str())?;
    for (k, v) in &v.kv_pairs {
        write!(io, " {k}: {v},")?;
    }
    write!(io, " {}", v.message_str())?;
    if let Some(location) = &v.location {
        write!(io, " <{location}>")?;
    }
    writeln!(io)
}
