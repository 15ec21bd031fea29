/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::fmt;
use std::str::FromStr;

use anyhow::anyhow;
use libc::c_int;

use crate::Diagnostic;

pub(crate) const ERR_LIB_SSL: c_int = 20;

const SSL_R_SSL_HANDSHAKE_FAILURE: c_int = 1040;
const SSL_R_SSLV3_ALERT_BAD_CERTIFICATE: c_int = 1042;
const SSL_R_SSLV3_ALERT_CERTIFICATE_UNKNOWN: c_int = 1046;
const SSL_R_TLSV1_ALERT_UNKNOWN_CA: c_int = 1048;

/// Handshake failures that scanners and misconfigured clients trigger all the time.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum SslNoise {
    HandshakeFailure,
    BadCertificate,
    CertificateUnknown,
    UnknownCa,
}

impl SslNoise {
    pub const ALL: [SslNoise; 4] = [
        SslNoise::HandshakeFailure,
        SslNoise::BadCertificate,
        SslNoise::CertificateUnknown,
        SslNoise::UnknownCa,
    ];

    fn reason_code(&self) -> c_int {
        match self {
            SslNoise::HandshakeFailure => SSL_R_SSL_HANDSHAKE_FAILURE,
            SslNoise::BadCertificate => SSL_R_SSLV3_ALERT_BAD_CERTIFICATE,
            SslNoise::CertificateUnknown => SSL_R_SSLV3_ALERT_CERTIFICATE_UNKNOWN,
            SslNoise::UnknownCa => SSL_R_TLSV1_ALERT_UNKNOWN_CA,
        }
    }

    fn matches(&self, diag: &Diagnostic) -> bool {
        diag.library_code() == ERR_LIB_SSL && diag.reason_code() == self.reason_code()
    }
}

impl fmt::Display for SslNoise {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SslNoise::HandshakeFailure => f.write_str("handshake_failure"),
            SslNoise::BadCertificate => f.write_str("bad_certificate"),
            SslNoise::CertificateUnknown => f.write_str("certificate_unknown"),
            SslNoise::UnknownCa => f.write_str("unknown_ca"),
        }
    }
}

impl FromStr for SslNoise {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "handshake_failure" => Ok(SslNoise::HandshakeFailure),
            "bad_certificate" | "bad_cert" => Ok(SslNoise::BadCertificate),
            "certificate_unknown" | "cert_unknown" => Ok(SslNoise::CertificateUnknown),
            "unknown_ca" => Ok(SslNoise::UnknownCa),
            _ => Err(anyhow!("unknown ssl noise type {s}")),
        }
    }
}

/// The set of read errors that close the connection quietly instead of
/// being reported as fatal.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct NoiseFilter {
    reasons: Vec<SslNoise>,
    log_noise: bool,
}

impl Default for NoiseFilter {
    fn default() -> Self {
        NoiseFilter::new(SslNoise::ALL.to_vec())
    }
}

impl NoiseFilter {
    pub fn new(reasons: Vec<SslNoise>) -> Self {
        let mut uniq = Vec::with_capacity(reasons.len());
        for r in reasons {
            if !uniq.contains(&r) {
                uniq.push(r);
            }
        }
        NoiseFilter {
            reasons: uniq,
            log_noise: false,
        }
    }

    /// Every read error escalates.
    pub fn disabled() -> Self {
        NoiseFilter::new(Vec::new())
    }

    pub fn set_log_noise(&mut self, log: bool) {
        self.log_noise = log;
    }

    #[inline]
    pub fn log_noise(&self) -> bool {
        self.log_noise
    }

    pub fn reasons(&self) -> &[SslNoise] {
        &self.reasons
    }

    pub fn is_noise(&self, diag: &Diagnostic) -> bool {
        self.reasons.iter().any(|r| r.matches(diag))
    }
}
