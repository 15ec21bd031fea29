/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::net::{IpAddr, Ipv6Addr, SocketAddr};
use std::str::FromStr;

use anyhow::anyhow;
use yaml_rust::Yaml;

/// Parse a listen address.
///
/// A bare port, or `*:port`, means all addresses.
pub fn as_sockaddr(v: &Yaml) -> anyhow::Result<SocketAddr> {
    match v {
        Yaml::String(s) => {
            if let Some(port) = s.strip_prefix("*:") {
                let port =
                    u16::from_str(port).map_err(|e| anyhow!("invalid port {port}: {e}"))?;
                return Ok(SocketAddr::new(IpAddr::V6(Ipv6Addr::UNSPECIFIED), port));
            }
            if let Ok(port) = u16::from_str(s) {
                return Ok(SocketAddr::new(IpAddr::V6(Ipv6Addr::UNSPECIFIED), port));
            }
            SocketAddr::from_str(s).map_err(|e| anyhow!("invalid socket address {s}: {e}"))
        }
        Yaml::Integer(i) => {
            let port = u16::try_from(*i).map_err(|e| anyhow!("invalid port {i}: {e}"))?;
            Ok(SocketAddr::new(IpAddr::V6(Ipv6Addr::UNSPECIFIED), port))
        }
        _ => Err(anyhow!(
            "yaml value type for 'socket address' should be 'string' or 'integer'"
        )),
    }
}
