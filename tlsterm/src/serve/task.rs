/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::future;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use log::{debug, info};
use tokio::io::{AsyncWriteExt, Interest, Ready};
use tokio::net::TcpStream;
use tokio::sync::broadcast;

use tlsterm_io::{ChunkQueue, NetworkStatus, WaitFor};
use tlsterm_openssl::{BLOCK_SIZE, MAX_READ_SIZE, OpensslSession, SessionAdapter, SocketIo};

use super::stats::TaskAliveGuard;
use super::{ListenStats, ServerReloadCommand, ServerTaskError};
use crate::config::{ListenerConfig, RuntimeConfig};

const WRITE_MAX: usize = MAX_READ_SIZE;

pub(super) struct TlstermTaskContext {
    pub(super) listener_config: Arc<ListenerConfig>,
    pub(super) runtime_config: Arc<RuntimeConfig>,
    pub(super) listen_stats: Arc<ListenStats>,
    pub(super) peer_addr: SocketAddr,
}

/// Drives the tls session of one accepted connection.
pub(super) struct TlstermTask {
    ctx: TlstermTaskContext,
    client: Arc<TcpStream>,
    adapter: SessionAdapter<OpensslSession<SocketIo>>,
    inbound: ChunkQueue,
    outbound: ChunkQueue,
    read_wait: Option<WaitFor>,
    write_wait: Option<WaitFor>,
    client_eof: bool,
    backend_eof: bool,
    backend_shutdown: bool,
    _alive_guard: TaskAliveGuard,
}

fn add_interest(interest: Option<Interest>, wait: WaitFor) -> Option<Interest> {
    let new = match wait {
        WaitFor::Readable => Interest::READABLE,
        WaitFor::Writable => Interest::WRITABLE,
    };
    match interest {
        Some(i) => Some(i | new),
        None => Some(new),
    }
}

async fn wait_ready(stream: Option<&TcpStream>, interest: Option<Interest>) -> io::Result<Ready> {
    match (stream, interest) {
        (Some(stream), Some(interest)) => stream.ready(interest).await,
        _ => future::pending().await,
    }
}

impl TlstermTask {
    pub(super) fn new(
        ctx: TlstermTaskContext,
        client: Arc<TcpStream>,
        adapter: SessionAdapter<OpensslSession<SocketIo>>,
    ) -> Self {
        let buffer_limit = ctx.runtime_config.buffer_limit;
        let alive_guard = ctx.listen_stats.add_alive_task();
        TlstermTask {
            ctx,
            client,
            adapter,
            inbound: ChunkQueue::with_limit(buffer_limit),
            outbound: ChunkQueue::with_limit(buffer_limit),
            read_wait: None,
            write_wait: None,
            client_eof: false,
            backend_eof: false,
            backend_shutdown: false,
            _alive_guard: alive_guard,
        }
    }

    pub(super) async fn into_running(mut self, mut quit: broadcast::Receiver<ServerReloadCommand>) {
        let r = match self.ctx.listener_config.backend() {
            Some(addr) => match TcpStream::connect(addr).await {
                Ok(backend) => self.run(Some(backend), &mut quit).await,
                Err(e) => Err(ServerTaskError::BackendConnectFailed(e)),
            },
            None => self.run(None, &mut quit).await,
        };
        self.adapter.close();

        let stats = &self.ctx.listen_stats;
        match r {
            Ok(_) => {
                stats.add_closed();
                debug!(
                    "SRT[{}] connection from {} finished",
                    self.ctx.listener_config.name(),
                    self.ctx.peer_addr
                );
            }
            Err(e) if e.is_normal_close() => {
                stats.add_closed();
                debug!(
                    "SRT[{}] connection from {} finished: {e}",
                    self.ctx.listener_config.name(),
                    self.ctx.peer_addr
                );
            }
            Err(e) => {
                stats.add_fatal();
                info!(
                    "SRT[{}] connection from {} failed: {e}",
                    self.ctx.listener_config.name(),
                    self.ctx.peer_addr
                );
            }
        }
    }

    async fn run(
        &mut self,
        mut backend: Option<TcpStream>,
        quit: &mut broadcast::Receiver<ServerReloadCommand>,
    ) -> Result<(), ServerTaskError> {
        let idle_timeout = self.ctx.runtime_config.idle_timeout;

        loop {
            if !self.client_eof {
                self.pump_read()?;
            }
            match backend.as_mut() {
                Some(stream) => {
                    self.write_backend(stream)?;
                    self.read_backend(stream)?;
                    if self.client_eof && self.inbound.is_empty() && !self.backend_shutdown {
                        // pass the client eof on, the response may still be coming
                        stream
                            .shutdown()
                            .await
                            .map_err(ServerTaskError::BackendWriteFailed)?;
                        self.backend_shutdown = true;
                    }
                }
                None => {
                    if !self.outbound.is_full() {
                        self.outbound.steal_all(&mut self.inbound);
                    }
                }
            }
            self.pump_write()?;
            if self.outbound.is_empty() {
                if self.backend_eof {
                    return Ok(());
                }
                if backend.is_none() && self.client_eof && self.inbound.is_empty() {
                    return Ok(());
                }
            }

            let client_interest = self.client_interest();
            let backend_interest = self.backend_interest();
            tokio::select! {
                biased;

                ev = quit.recv() => {
                    match ev {
                        Ok(ServerReloadCommand::QuitRuntime) | Err(broadcast::error::RecvError::Closed) => {
                            return Err(ServerTaskError::ServerForceQuit);
                        }
                        Err(broadcast::error::RecvError::Lagged(_)) => {}
                    }
                }
                r = wait_ready(Some(self.client.as_ref()), client_interest) => {
                    r.map_err(ServerTaskError::ClientWaitFailed)?;
                }
                r = wait_ready(backend.as_ref(), backend_interest) => {
                    r.map_err(ServerTaskError::BackendReadFailed)?;
                }
                _ = tokio::time::sleep(idle_timeout) => {
                    return Err(ServerTaskError::IdleTimeout);
                }
            }
        }
    }

    fn handle_status(&self, status: NetworkStatus) -> Result<Option<WaitFor>, ServerTaskError> {
        match status {
            NetworkStatus::Success => Ok(None),
            NetworkStatus::WaitForEvent(wait) => Ok(Some(wait)),
            NetworkStatus::ConnectionClose => Err(ServerTaskError::ClosedByClient),
            NetworkStatus::FatalError => Err(ServerTaskError::ClientTlsFailed),
        }
    }

    /// Stage decrypted bytes while the inbound queue has room.
    ///
    /// A peer close only ends the read side, staged bytes are still delivered.
    fn pump_read(&mut self) -> Result<(), ServerTaskError> {
        loop {
            if self.inbound.is_full() {
                return Ok(());
            }
            let max_read = tlsterm_openssl::read_budget(&self.inbound);
            let status = self.adapter.read(&mut self.inbound, max_read);
            if status == NetworkStatus::ConnectionClose {
                debug!(
                    "SRT[{}] client {} closed its sending side",
                    self.ctx.listener_config.name(),
                    self.ctx.peer_addr
                );
                self.client_eof = true;
                self.read_wait = None;
                return Ok(());
            }
            self.read_wait = self.handle_status(status)?;
            // the engine may hold decrypted records that the socket will never signal
            if self.read_wait.is_some() || !self.adapter.has_pending() {
                return Ok(());
            }
        }
    }

    fn pump_write(&mut self) -> Result<(), ServerTaskError> {
        if self.outbound.is_empty() {
            self.write_wait = None;
            return Ok(());
        }
        let status = self.adapter.write(&mut self.outbound, WRITE_MAX);
        self.write_wait = self.handle_status(status)?;
        Ok(())
    }

    fn write_backend(&mut self, backend: &TcpStream) -> Result<(), ServerTaskError> {
        while let Some(chunk) = self.inbound.front_chunk(BLOCK_SIZE) {
            match backend.try_write(chunk) {
                Ok(n) => {
                    self.inbound.skip(n);
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) => return Err(ServerTaskError::BackendWriteFailed(e)),
            }
        }
        Ok(())
    }

    fn read_backend(&mut self, backend: &TcpStream) -> Result<(), ServerTaskError> {
        while !self.backend_eof {
            let size = match self.outbound.remaining_quota() {
                Some(0) => break,
                Some(n) => n.min(BLOCK_SIZE),
                None => BLOCK_SIZE,
            };
            let mut buf = vec![0u8; size];
            match backend.try_read(&mut buf) {
                Ok(0) => self.backend_eof = true,
                Ok(n) => {
                    buf.truncate(n);
                    self.outbound.append_vec(buf);
                    if n < size {
                        break;
                    }
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) => return Err(ServerTaskError::BackendReadFailed(e)),
            }
        }
        Ok(())
    }

    fn client_interest(&self) -> Option<Interest> {
        let mut interest = None;
        if !self.client_eof && !self.inbound.is_full() && !self.backend_eof {
            interest = add_interest(interest, self.read_wait.unwrap_or(WaitFor::Readable));
        }
        if !self.outbound.is_empty() {
            interest = add_interest(interest, self.write_wait.unwrap_or(WaitFor::Writable));
        }
        interest
    }

    fn backend_interest(&self) -> Option<Interest> {
        let mut interest = None;
        if !self.backend_eof && !self.outbound.is_full() {
            interest = add_interest(interest, WaitFor::Readable);
        }
        if !self.inbound.is_empty() {
            interest = add_interest(interest, WaitFor::Writable);
        }
        interest
    }
}
