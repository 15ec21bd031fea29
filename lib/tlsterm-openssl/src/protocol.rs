/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::fmt;
use std::str::FromStr;

use anyhow::anyhow;
use openssl::ssl::SslVersion;

#[derive(Clone, Copy, Debug, Eq, PartialEq, PartialOrd, Ord)]
pub enum OpensslProtocol {
    Ssl3,
    Tls1,
    Tls11,
    Tls12,
    Tls13,
}

impl OpensslProtocol {
    /// Versions that are only allowed when legacy protocols are permitted.
    pub fn is_legacy(&self) -> bool {
        matches!(self, OpensslProtocol::Ssl3)
    }

    pub fn ssl_version(&self) -> SslVersion {
        match self {
            OpensslProtocol::Ssl3 => SslVersion::SSL3,
            OpensslProtocol::Tls1 => SslVersion::TLS1,
            OpensslProtocol::Tls11 => SslVersion::TLS1_1,
            OpensslProtocol::Tls12 => SslVersion::TLS1_2,
            OpensslProtocol::Tls13 => SslVersion::TLS1_3,
        }
    }
}

impl fmt::Display for OpensslProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OpensslProtocol::Ssl3 => f.write_str("ssl3.0"),
            OpensslProtocol::Tls1 => f.write_str("tls1.0"),
            OpensslProtocol::Tls11 => f.write_str("tls1.1"),
            OpensslProtocol::Tls12 => f.write_str("tls1.2"),
            OpensslProtocol::Tls13 => f.write_str("tls1.3"),
        }
    }
}

impl FromStr for OpensslProtocol {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "ssl3" | "ssl30" | "ssl3.0" | "ssl3_0" => Ok(OpensslProtocol::Ssl3),
            "tls1" | "tls10" | "tls1.0" | "tls1_0" => Ok(OpensslProtocol::Tls1),
            "tls11" | "tls1.1" | "tls1_1" => Ok(OpensslProtocol::Tls11),
            "tls12" | "tls1.2" | "tls1_2" => Ok(OpensslProtocol::Tls12),
            "tls13" | "tls1.3" | "tls1_3" => Ok(OpensslProtocol::Tls13),
            _ => Err(anyhow!("unknown openssl protocol {s}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse() {
        assert_eq!(
            OpensslProtocol::from_str("TLS1.2").unwrap(),
            OpensslProtocol::Tls12
        );
        assert_eq!(
            OpensslProtocol::from_str("ssl3").unwrap(),
            OpensslProtocol::Ssl3
        );
        assert!(OpensslProtocol::from_str("ssl2").is_err());
    }

    #[test]
    fn legacy() {
        assert!(OpensslProtocol::Ssl3.is_legacy());
        assert!(!OpensslProtocol::Tls1.is_legacy());
        assert!(OpensslProtocol::Ssl3 < OpensslProtocol::Tls1);
    }
}
