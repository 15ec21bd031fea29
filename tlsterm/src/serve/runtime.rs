/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::net::SocketAddr;
use std::sync::Arc;

use log::{info, warn};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use tlsterm_openssl::{EngineContext, SessionAdapter, SocketIo};

use super::stats::ListenAliveGuard;
use super::task::{TlstermTask, TlstermTaskContext};
use super::{ListenStats, ServerReloadCommand};
use crate::config::{ListenerConfig, RuntimeConfig};

/// The accept loop of one listener.
///
/// It owns the engine context, which is released when the runtime ends.
pub(super) struct ListenerRuntime {
    config: Arc<ListenerConfig>,
    runtime_config: Arc<RuntimeConfig>,
    engine_ctx: EngineContext,
    listen_stats: Arc<ListenStats>,
    _alive_guard: Option<ListenAliveGuard>,
}

impl ListenerRuntime {
    pub(super) fn new(
        config: Arc<ListenerConfig>,
        runtime_config: Arc<RuntimeConfig>,
        engine_ctx: EngineContext,
        listen_stats: Arc<ListenStats>,
    ) -> Self {
        ListenerRuntime {
            config,
            runtime_config,
            engine_ctx,
            listen_stats,
            _alive_guard: None,
        }
    }

    fn pre_start(&mut self) {
        info!("started SRT[{}]", self.config.name());
        self._alive_guard = Some(self.listen_stats.add_running_runtime());
    }

    fn post_stop(&self) {
        info!("stopped SRT[{}]", self.config.name());
    }

    async fn run(
        mut self,
        listener: TcpListener,
        mut quit: broadcast::Receiver<ServerReloadCommand>,
    ) {
        use broadcast::error::RecvError;

        self.pre_start();
        loop {
            tokio::select! {
                biased;

                ev = quit.recv() => {
                    match ev {
                        Ok(ServerReloadCommand::QuitRuntime) => {}
                        Err(RecvError::Closed) => {}
                        Err(RecvError::Lagged(dropped)) => {
                            warn!("SRT[{}] quit notify channel overflowed, {dropped} msg dropped",
                                self.config.name());
                            continue;
                        }
                    }
                    info!("SRT[{}] will go offline", self.config.name());
                    break;
                }
                r = listener.accept() => {
                    match r {
                        Ok((stream, peer_addr)) => {
                            self.listen_stats.add_accepted();
                            self.run_task(stream, peer_addr, quit.resubscribe());
                        }
                        Err(e) => {
                            warn!("SRT[{}] accept: {e:?}", self.config.name());
                        }
                    }
                }
            }
        }
        self.post_stop();
    }

    fn run_task(
        &self,
        stream: TcpStream,
        peer_addr: SocketAddr,
        quit: broadcast::Receiver<ServerReloadCommand>,
    ) {
        let client = Arc::new(stream);
        let adapter = match SessionAdapter::create(&self.engine_ctx, SocketIo::new(client.clone()))
        {
            Ok(adapter) => adapter,
            Err(e) => {
                self.listen_stats.add_setup_failed();
                warn!(
                    "SRT[{}] failed to setup tls session for {peer_addr}: {e}",
                    self.config.name()
                );
                return;
            }
        };

        let ctx = TlstermTaskContext {
            listener_config: self.config.clone(),
            runtime_config: self.runtime_config.clone(),
            listen_stats: self.listen_stats.clone(),
            peer_addr,
        };
        let task = TlstermTask::new(ctx, client, adapter);
        tokio::spawn(async move {
            task.into_running(quit).await;
        });
    }

    /// Bind the listen address and run the accept loop in a new task.
    pub(super) fn into_running(
        self,
        quit_sender: &broadcast::Sender<ServerReloadCommand>,
    ) -> JoinHandle<()> {
        let quit = quit_sender.subscribe();
        tokio::spawn(async move {
            let Some(listen_addr) = self.config.listen() else {
                warn!("SRT[{}] has no listen address", self.config.name());
                return;
            };
            match TcpListener::bind(listen_addr).await {
                Ok(listener) => self.run(listener, quit).await,
                Err(e) => warn!(
                    "SRT[{}] failed to listen on {listen_addr}: {e}",
                    self.config.name()
                ),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};
    use std::path::Path;
    use std::time::Duration;

    use openssl::ssl::{SslConnector, SslMethod, SslStream, SslVerifyMode};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tlsterm_yaml::yaml_doc;

    use crate::config::test_util::{TempDir, write_pem_bundle};

    fn listener_config(dir: &Path, backend: Option<SocketAddr>) -> ListenerConfig {
        let mut content = "name: test\nlisten: 8443\npemfile: server.pem\n".to_string();
        if let Some(addr) = backend {
            content.push_str(&format!("backend: \"{addr}\"\n"));
        }
        let doc = yaml_doc!(&content);
        ListenerConfig::parse(&doc, dir).unwrap()
    }

    fn tls_connect(addr: SocketAddr) -> SslStream<std::net::TcpStream> {
        let mut builder = SslConnector::builder(SslMethod::tls_client()).unwrap();
        builder.set_verify(SslVerifyMode::NONE);
        let connector = builder.build();
        let stream = std::net::TcpStream::connect(addr).unwrap();
        stream
            .set_read_timeout(Some(Duration::from_secs(10)))
            .unwrap();
        connector
            .configure()
            .unwrap()
            .verify_hostname(false)
            .connect("tlsterm.test", stream)
            .unwrap()
    }

    async fn start(
        config: ListenerConfig,
    ) -> (
        SocketAddr,
        Arc<ListenStats>,
        broadcast::Sender<ServerReloadCommand>,
        JoinHandle<()>,
    ) {
        let engine_ctx = config.build_engine_context().unwrap();
        let stats = Arc::new(ListenStats::new(config.name()));
        let runtime = ListenerRuntime::new(
            Arc::new(config),
            Arc::new(RuntimeConfig::default()),
            engine_ctx,
            stats.clone(),
        );

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (quit_sender, quit) = broadcast::channel(4);
        let handle = tokio::spawn(runtime.run(listener, quit));
        (addr, stats, quit_sender, handle)
    }

    #[tokio::test]
    async fn echo() {
        let temp_dir = TempDir::new("serve_echo");
        write_pem_bundle(temp_dir.path(), "server.pem");
        let (addr, stats, quit_sender, handle) =
            start(listener_config(temp_dir.path(), None)).await;

        let received = tokio::task::spawn_blocking(move || {
            let mut tls = tls_connect(addr);
            let data: Vec<u8> = (0..64 * 1024).map(|i| (i % 251) as u8).collect();
            tls.write_all(&data).unwrap();
            let mut received = vec![0u8; data.len()];
            tls.read_exact(&mut received).unwrap();
            let _ = tls.shutdown();
            received == data
        })
        .await
        .unwrap();
        assert!(received);
        assert!(stats.is_running());
        assert_eq!(stats.snapshot().accepted, 1);
        assert_eq!(stats.snapshot().setup_failed, 0);

        quit_sender.send(ServerReloadCommand::QuitRuntime).unwrap();
        handle.await.unwrap();
        assert!(!stats.is_running());
    }

    #[tokio::test]
    async fn relay() {
        let temp_dir = TempDir::new("serve_relay");
        write_pem_bundle(temp_dir.path(), "server.pem");

        let backend = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let backend_addr = backend.local_addr().unwrap();
        let backend_handle = tokio::spawn(async move {
            let (mut stream, _) = backend.accept().await.unwrap();
            let mut buf = [0u8; 4];
            stream.read_exact(&mut buf).await.unwrap();
            assert_eq!(&buf, b"ping");
            stream.write_all(b"pong").await.unwrap();
        });

        let (addr, stats, quit_sender, handle) =
            start(listener_config(temp_dir.path(), Some(backend_addr))).await;

        let (reply, tail) = tokio::task::spawn_blocking(move || {
            let mut tls = tls_connect(addr);
            tls.write_all(b"ping").unwrap();
            let mut reply = [0u8; 4];
            tls.read_exact(&mut reply).unwrap();
            let mut buf = [0u8; 8];
            let tail = tls.read(&mut buf).unwrap_or(0);
            (reply, tail)
        })
        .await
        .unwrap();
        assert_eq!(&reply, b"pong");
        assert_eq!(tail, 0);
        backend_handle.await.unwrap();

        for _ in 0..100 {
            if stats.snapshot().closed == 1 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(stats.snapshot().closed, 1);
        assert_eq!(stats.snapshot().fatal, 0);

        quit_sender.send(ServerReloadCommand::QuitRuntime).unwrap();
        handle.await.unwrap();
    }

    async fn wait_closed(stats: &ListenStats) {
        for _ in 0..100 {
            if stats.snapshot().closed == 1 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    /// Read until the server ends the session.
    fn read_all(tls: &mut SslStream<std::net::TcpStream>) -> Vec<u8> {
        let mut received = Vec::new();
        let mut buf = [0u8; 4096];
        loop {
            match tls.read(&mut buf) {
                Ok(0) | Err(_) => return received,
                Ok(n) => received.extend_from_slice(&buf[..n]),
            }
        }
    }

    #[tokio::test]
    async fn relay_half_close() {
        let temp_dir = TempDir::new("serve_half_close");
        write_pem_bundle(temp_dir.path(), "server.pem");

        let backend = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let backend_addr = backend.local_addr().unwrap();
        let backend_handle = tokio::spawn(async move {
            let (mut stream, _) = backend.accept().await.unwrap();
            let mut request = Vec::new();
            stream.read_to_end(&mut request).await.unwrap();
            stream.write_all(b"HTTP/1.0 200 OK\r\n\r\n").await.unwrap();
            request
        });

        let (addr, stats, quit_sender, handle) =
            start(listener_config(temp_dir.path(), Some(backend_addr))).await;

        let response = tokio::task::spawn_blocking(move || {
            let mut tls = tls_connect(addr);
            tls.write_all(b"GET / HTTP/1.0\r\n\r\n").unwrap();
            tls.shutdown().unwrap();
            read_all(&mut tls)
        })
        .await
        .unwrap();
        assert_eq!(backend_handle.await.unwrap(), b"GET / HTTP/1.0\r\n\r\n");
        assert_eq!(response, b"HTTP/1.0 200 OK\r\n\r\n");

        wait_closed(&stats).await;
        assert_eq!(stats.snapshot().closed, 1);
        assert_eq!(stats.snapshot().fatal, 0);

        quit_sender.send(ServerReloadCommand::QuitRuntime).unwrap();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn echo_half_close() {
        let temp_dir = TempDir::new("serve_echo_half_close");
        write_pem_bundle(temp_dir.path(), "server.pem");
        let (addr, stats, quit_sender, handle) =
            start(listener_config(temp_dir.path(), None)).await;

        let (sent, received) = tokio::task::spawn_blocking(move || {
            let mut tls = tls_connect(addr);
            let data: Vec<u8> = (0..20 * 1024).map(|i| (i % 253) as u8).collect();
            tls.write_all(&data).unwrap();
            tls.shutdown().unwrap();
            let received = read_all(&mut tls);
            (data, received)
        })
        .await
        .unwrap();
        assert_eq!(received, sent);

        wait_closed(&stats).await;
        assert_eq!(stats.snapshot().closed, 1);
        assert_eq!(stats.snapshot().fatal, 0);

        quit_sender.send(ServerReloadCommand::QuitRuntime).unwrap();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn bind_failure_releases_context() {
        let temp_dir = TempDir::new("serve_bind");
        write_pem_bundle(temp_dir.path(), "server.pem");

        let occupied = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = occupied.local_addr().unwrap();
        let doc = yaml_doc!(&format!("listen: \"{addr}\"\npemfile: server.pem\n"));
        let config = ListenerConfig::parse(&doc, temp_dir.path()).unwrap();
        let engine_ctx = config.build_engine_context().unwrap();
        let stats = Arc::new(ListenStats::new(config.name()));
        let runtime = ListenerRuntime::new(
            Arc::new(config),
            Arc::new(RuntimeConfig::default()),
            engine_ctx,
            stats.clone(),
        );

        let (quit_sender, _) = broadcast::channel(4);
        runtime.into_running(&quit_sender).await.unwrap();
        assert!(!stats.is_running());
        assert_eq!(stats.snapshot().accepted, 0);
    }
}
