/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::io::{self, Read, Write};
use std::sync::Arc;

use tokio::net::TcpStream;

/// Non-blocking std io view of a tokio tcp stream.
///
/// Calls never wait, they return `WouldBlock` when the socket is not ready.
/// The driver keeps another reference to the stream to wait for readiness.
pub struct SocketIo {
    stream: Arc<TcpStream>,
}

impl SocketIo {
    pub fn new(stream: Arc<TcpStream>) -> Self {
        SocketIo { stream }
    }

    pub fn stream(&self) -> &Arc<TcpStream> {
        &self.stream
    }
}

impl Read for SocketIo {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.stream.try_read(buf)
    }
}

impl Write for SocketIo {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.stream.try_write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
