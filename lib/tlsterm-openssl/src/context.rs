/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, anyhow};
use log::debug;
use openssl::foreign_types::ForeignTypeRef;
use openssl::ssl::{SslContext, SslContextBuilder, SslContextRef, SslFiletype, SslMethod, SslMode};

use crate::{NoiseFilter, OpensslProtocol, ffi};

/// Tls server settings of one listener.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct EngineContextBuilder {
    pemfile: Option<PathBuf>,
    ca_file: Option<PathBuf>,
    ciphers: Option<String>,
    allow_legacy_protocol: bool,
    min_protocol: Option<OpensslProtocol>,
    noise_filter: NoiseFilter,
}

impl EngineContextBuilder {
    pub fn empty() -> Self {
        EngineContextBuilder::default()
    }

    /// Set the pem file that contains both the certificate and the private key.
    pub fn set_pemfile(&mut self, path: PathBuf) {
        self.pemfile = Some(path);
    }

    pub fn pemfile(&self) -> Option<&Path> {
        self.pemfile.as_deref()
    }

    pub fn set_ca_file(&mut self, path: PathBuf) {
        self.ca_file = Some(path);
    }

    pub fn set_ciphers(&mut self, ciphers: String) {
        self.ciphers = Some(ciphers);
    }

    pub fn set_allow_legacy_protocol(&mut self, allow: bool) {
        self.allow_legacy_protocol = allow;
    }

    pub fn set_min_protocol(&mut self, protocol: OpensslProtocol) {
        self.min_protocol = Some(protocol);
    }

    pub fn set_noise_filter(&mut self, filter: NoiseFilter) {
        self.noise_filter = filter;
    }

    pub fn check(&self) -> anyhow::Result<()> {
        if self.pemfile.is_none() {
            return Err(anyhow!("no pemfile is set"));
        }
        if let Some(p) = self.min_protocol
            && p.is_legacy()
            && !self.allow_legacy_protocol
        {
            return Err(anyhow!(
                "min protocol {p} is not allowed as legacy protocol is disabled"
            ));
        }
        Ok(())
    }

    pub fn build(&self) -> anyhow::Result<EngineContext> {
        self.check()?;
        let Some(pemfile) = &self.pemfile else {
            return Err(anyhow!("no pemfile is set"));
        };

        let mut builder = SslContextBuilder::new(SslMethod::tls_server())
            .map_err(|e| anyhow!("failed to create ssl context builder: {e}"))?;

        let min_version = match self.min_protocol {
            Some(p) => Some(p.ssl_version()),
            None if self.allow_legacy_protocol => None,
            None => Some(OpensslProtocol::Tls1.ssl_version()),
        };
        builder
            .set_min_proto_version(min_version)
            .map_err(|e| anyhow!("failed to set min protocol version: {e}"))?;

        if let Some(ciphers) = &self.ciphers {
            builder
                .set_cipher_list(ciphers)
                .map_err(|e| anyhow!("failed to set cipher list '{ciphers}': {e}"))?;
        }

        if let Some(ca_file) = &self.ca_file {
            builder
                .set_ca_file(ca_file)
                .map_err(|e| anyhow!("failed to load ca file {}: {e}", ca_file.display()))?;
        }

        builder
            .set_certificate_file(pemfile, SslFiletype::PEM)
            .map_err(|e| anyhow!("failed to load certificate file {}: {e}", pemfile.display()))?;
        builder
            .set_private_key_file(pemfile, SslFiletype::PEM)
            .map_err(|e| anyhow!("failed to load private key file {}: {e}", pemfile.display()))?;
        builder.check_private_key().with_context(|| {
            format!(
                "private key in {} does not match the certificate public key",
                pemfile.display()
            )
        })?;

        unsafe {
            ffi::SSL_CTX_set_read_ahead(builder.as_ptr(), 1);
        }
        builder.set_mode(SslMode::ACCEPT_MOVING_WRITE_BUFFER);

        debug!("ssl context for {} created", pemfile.display());
        Ok(EngineContext {
            ssl_context: builder.build(),
            pemfile: pemfile.clone(),
            noise_filter: Arc::new(self.noise_filter.clone()),
        })
    }
}

/// A ready to use tls server context.
///
/// It is owned by the listener and only borrowed by the sessions.
pub struct EngineContext {
    ssl_context: SslContext,
    pemfile: PathBuf,
    noise_filter: Arc<NoiseFilter>,
}

impl EngineContext {
    pub fn ssl_context(&self) -> &SslContextRef {
        &self.ssl_context
    }

    pub fn pemfile(&self) -> &Path {
        &self.pemfile
    }

    pub fn noise_filter(&self) -> &Arc<NoiseFilter> {
        &self.noise_filter
    }

    pub fn read_ahead(&self) -> bool {
        unsafe { ffi::SSL_CTX_get_read_ahead(self.ssl_context.as_ptr()) != 0 }
    }

    pub fn mode(&self) -> SslMode {
        let bits = unsafe { ffi::SSL_CTX_get_mode(self.ssl_context.as_ptr()) };
        SslMode::from_bits_truncate(bits as _)
    }
}

impl Drop for EngineContext {
    fn drop(&mut self) {
        debug!("ssl context for {} released", self.pemfile.display());
    }
}
