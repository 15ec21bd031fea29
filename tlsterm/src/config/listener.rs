/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::net::SocketAddr;
use std::path::Path;
use std::str::FromStr;

use anyhow::{Context, anyhow};
use yaml_rust::Yaml;

use tlsterm_openssl::{
    EngineContext, EngineContextBuilder, NoiseFilter, OpensslProtocol, SslNoise,
};

#[derive(Clone, Debug)]
pub struct ListenerConfig {
    name: String,
    listen: Option<SocketAddr>,
    backend: Option<SocketAddr>,
    tls: EngineContextBuilder,
    noise_reasons: Option<Vec<SslNoise>>,
    log_noise: bool,
}

impl ListenerConfig {
    fn empty() -> Self {
        ListenerConfig {
            name: String::new(),
            listen: None,
            backend: None,
            tls: EngineContextBuilder::empty(),
            noise_reasons: None,
            log_noise: false,
        }
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Always set on a parsed config. Port 0 asks the system for a free port.
    #[inline]
    pub fn listen(&self) -> Option<SocketAddr> {
        self.listen
    }

    /// The plaintext upstream, decrypted data is echoed back when not set.
    pub fn backend(&self) -> Option<SocketAddr> {
        self.backend
    }

    pub fn pemfile(&self) -> Option<&Path> {
        self.tls.pemfile()
    }

    pub fn build_engine_context(&self) -> anyhow::Result<EngineContext> {
        self.tls
            .build()
            .context(format!("failed to build ssl context for listener {}", self.name))
    }

    pub(crate) fn parse(v: &Yaml, conf_dir: &Path) -> anyhow::Result<Self> {
        let Yaml::Hash(map) = v else {
            return Err(anyhow!("yaml value type for 'listener' should be 'map'"));
        };

        let mut config = ListenerConfig::empty();
        tlsterm_yaml::foreach_kv(map, |k, v| config.set(k, v, conf_dir))?;
        config.check()?;
        Ok(config)
    }

    fn set(&mut self, k: &str, v: &Yaml, conf_dir: &Path) -> anyhow::Result<()> {
        match tlsterm_yaml::key::normalize(k).as_str() {
            "name" => {
                self.name = tlsterm_yaml::value::as_string(v)?;
                Ok(())
            }
            "listen" => {
                let addr = tlsterm_yaml::value::as_sockaddr(v)
                    .context(format!("invalid socket address value for key {k}"))?;
                self.listen = Some(addr);
                Ok(())
            }
            "backend" => {
                let addr = tlsterm_yaml::value::as_sockaddr(v)
                    .context(format!("invalid socket address value for key {k}"))?;
                self.backend = Some(addr);
                Ok(())
            }
            "pemfile" => {
                let path = tlsterm_yaml::value::as_file_path(v, Some(conf_dir))
                    .context(format!("invalid file path value for key {k}"))?;
                self.tls.set_pemfile(path);
                Ok(())
            }
            "ca_file" => {
                let path = tlsterm_yaml::value::as_file_path(v, Some(conf_dir))
                    .context(format!("invalid file path value for key {k}"))?;
                self.tls.set_ca_file(path);
                Ok(())
            }
            "ciphers" => {
                let ciphers = tlsterm_yaml::value::as_string(v)
                    .context(format!("invalid string value for key {k}"))?;
                self.tls.set_ciphers(ciphers);
                Ok(())
            }
            "allow_ssl2" | "allow_legacy_protocol" => {
                let allow = tlsterm_yaml::value::as_bool(v)
                    .context(format!("invalid bool value for key {k}"))?;
                self.tls.set_allow_legacy_protocol(allow);
                Ok(())
            }
            "protocol_min" | "min_protocol" => {
                let s = tlsterm_yaml::value::as_string(v)
                    .context(format!("invalid string value for key {k}"))?;
                let protocol = OpensslProtocol::from_str(&s)
                    .context(format!("invalid openssl protocol value for key {k}"))?;
                self.tls.set_min_protocol(protocol);
                Ok(())
            }
            "ssl_noise" => {
                // an empty list disables the filter
                let reasons = tlsterm_yaml::value::as_list(v, |v| {
                    let s = tlsterm_yaml::value::as_string(v)?;
                    SslNoise::from_str(&s)
                })
                .context(format!("invalid ssl noise list value for key {k}"))?;
                self.noise_reasons = Some(reasons);
                Ok(())
            }
            "log_ssl_noise" => {
                self.log_noise = tlsterm_yaml::value::as_bool(v)
                    .context(format!("invalid bool value for key {k}"))?;
                Ok(())
            }
            _ => Err(anyhow!("invalid key {k}")),
        }
    }

    fn check(&mut self) -> anyhow::Result<()> {
        let Some(listen) = self.listen else {
            return Err(anyhow!("listener needs a listen parameter"));
        };
        if self.name.is_empty() {
            self.name = listen.to_string();
        }

        let mut noise = match self.noise_reasons.take() {
            Some(reasons) => NoiseFilter::new(reasons),
            None => NoiseFilter::default(),
        };
        noise.set_log_noise(self.log_noise);
        self.tls.set_noise_filter(noise);

        self.tls
            .check()
            .context(format!("invalid tls config for listener {}", self.name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_util::{TempDir, write_pem_bundle};
    use tlsterm_yaml::yaml_doc;

    #[test]
    fn parse_full() {
        let temp_dir = TempDir::new("listener_full");
        let pemfile = write_pem_bundle(temp_dir.path(), "server.pem");
        write_pem_bundle(temp_dir.path(), "chain.pem");

        let doc = yaml_doc!(
            r#"
            name: https
            listen: "127.0.0.1:8443"
            pemfile: server.pem
            ca-file: chain.pem
            ciphers: "HIGH:!aNULL"
            allow-ssl2: false
            protocol-min: tls1.2
            backend: "127.0.0.1:8080"
            ssl-noise: [handshake_failure, unknown-ca]
            log-ssl-noise: true
            "#
        );
        let config = ListenerConfig::parse(&doc, temp_dir.path()).unwrap();
        assert_eq!(config.name(), "https");
        assert_eq!(
            config.listen(),
            Some(SocketAddr::from_str("127.0.0.1:8443").unwrap())
        );
        assert_eq!(
            config.backend(),
            Some(SocketAddr::from_str("127.0.0.1:8080").unwrap())
        );
        assert_eq!(config.pemfile(), Some(pemfile.canonicalize().unwrap().as_path()));

        let ctx = config.build_engine_context().unwrap();
        let noise = ctx.noise_filter();
        assert!(noise.log_noise());
        assert_eq!(
            noise.reasons(),
            &[SslNoise::HandshakeFailure, SslNoise::UnknownCa]
        );
    }

    #[test]
    fn parse_defaults() {
        let temp_dir = TempDir::new("listener_default");
        write_pem_bundle(temp_dir.path(), "server.pem");

        let doc = yaml_doc!("listen: 8443\npemfile: server.pem");
        let config = ListenerConfig::parse(&doc, temp_dir.path()).unwrap();
        assert_eq!(config.name(), "[::]:8443");
        assert!(config.backend().is_none());

        let ctx = config.build_engine_context().unwrap();
        assert_eq!(**ctx.noise_filter(), NoiseFilter::default());
    }

    #[test]
    fn noise_disabled() {
        let temp_dir = TempDir::new("listener_noise");
        write_pem_bundle(temp_dir.path(), "server.pem");

        let doc = yaml_doc!("listen: 8443\npemfile: server.pem\nssl_noise: []");
        let config = ListenerConfig::parse(&doc, temp_dir.path()).unwrap();
        let ctx = config.build_engine_context().unwrap();
        assert!(ctx.noise_filter().reasons().is_empty());
    }

    #[test]
    fn parse_missing() {
        let temp_dir = TempDir::new("listener_missing");
        write_pem_bundle(temp_dir.path(), "server.pem");

        let doc = yaml_doc!("pemfile: server.pem");
        let e = ListenerConfig::parse(&doc, temp_dir.path()).unwrap_err();
        assert_eq!(e.to_string(), "listener needs a listen parameter");

        let doc = yaml_doc!("listen: 8443");
        assert!(ListenerConfig::parse(&doc, temp_dir.path()).is_err());
    }

    #[test]
    fn parse_any_port() {
        let temp_dir = TempDir::new("listener_any_port");
        write_pem_bundle(temp_dir.path(), "server.pem");

        let doc = yaml_doc!("listen: 0\npemfile: server.pem");
        let config = ListenerConfig::parse(&doc, temp_dir.path()).unwrap();
        assert_eq!(config.listen().map(|addr| addr.port()), Some(0));
        assert_eq!(config.name(), "[::]:0");

        let doc = yaml_doc!("listen: \"127.0.0.1:0\"\npemfile: server.pem");
        let config = ListenerConfig::parse(&doc, temp_dir.path()).unwrap();
        assert_eq!(config.listen(), Some(SocketAddr::from_str("127.0.0.1:0").unwrap()));
    }

    #[test]
    fn parse_bad_value() {
        let temp_dir = TempDir::new("listener_bad");
        write_pem_bundle(temp_dir.path(), "server.pem");

        let doc = yaml_doc!("listen: 8443\npemfile: missing.pem");
        assert!(ListenerConfig::parse(&doc, temp_dir.path()).is_err());

        let doc = yaml_doc!("listen: 8443\npemfile: server.pem\nallow_ssl2: maybe");
        assert!(ListenerConfig::parse(&doc, temp_dir.path()).is_err());

        let doc = yaml_doc!("listen: 8443\npemfile: server.pem\nciphers: [a, b]");
        assert!(ListenerConfig::parse(&doc, temp_dir.path()).is_err());

        let doc = yaml_doc!("listen: 8443\npemfile: server.pem\nssl_noise: [timeout]");
        assert!(ListenerConfig::parse(&doc, temp_dir.path()).is_err());

        let doc = yaml_doc!("listen: 8443\npemfile: server.pem\nprotocol_min: ssl3");
        assert!(ListenerConfig::parse(&doc, temp_dir.path()).is_err());

        let doc = yaml_doc!("listen: 8443\npemfile: server.pem\nallow_ssl2: true\nprotocol_min: ssl3");
        assert!(ListenerConfig::parse(&doc, temp_dir.path()).is_ok());

        let doc = yaml_doc!("listen: 8443\npemfile: server.pem\nworkers: 2");
        assert!(ListenerConfig::parse(&doc, temp_dir.path()).is_err());
    }

    #[test]
    fn build_bad_ciphers() {
        let temp_dir = TempDir::new("listener_ciphers");
        write_pem_bundle(temp_dir.path(), "server.pem");

        let doc = yaml_doc!("listen: 8443\npemfile: server.pem\nciphers: NO-SUCH-CIPHER");
        let config = ListenerConfig::parse(&doc, temp_dir.path()).unwrap();
        assert!(config.build_engine_context().is_err());
    }
}
