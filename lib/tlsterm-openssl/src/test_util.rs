/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::cell::RefCell;
use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::sync::atomic::{AtomicUsize, Ordering};

use openssl::asn1::Asn1Time;
use openssl::bn::{BigNum, MsbOption};
use openssl::ec::{EcGroup, EcKey};
use openssl::hash::MessageDigest;
use openssl::nid::Nid;
use openssl::pkey::{PKey, Private};
use openssl::x509::{X509, X509NameBuilder};

use crate::{SslErrorCode, SslIoError, SslSessionIo};

static TEST_DIR_ID_COUNTER: AtomicUsize = AtomicUsize::new(0);

pub(crate) struct TempDir {
    path: PathBuf,
}

impl TempDir {
    pub(crate) fn new(prefix: &str) -> Self {
        let id = TEST_DIR_ID_COUNTER.fetch_add(1, Ordering::SeqCst);
        let path = std::env::temp_dir().join(format!(
            "tlsterm_{}_{}_{}",
            prefix,
            std::process::id(),
            id
        ));
        fs::create_dir_all(&path).expect("Failed to create test directory");
        TempDir { path }
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for TempDir {
    fn drop(&mut self) {
        let _ = fs::remove_dir_all(&self.path);
    }
}

pub(crate) fn new_key() -> PKey<Private> {
    let group = EcGroup::from_curve_name(Nid::X9_62_PRIME256V1).unwrap();
    let ec_key = EcKey::generate(&group).unwrap();
    PKey::from_ec_key(ec_key).unwrap()
}

pub(crate) fn self_signed_cert(key: &PKey<Private>, cn: &str) -> X509 {
    let mut name = X509NameBuilder::new().unwrap();
    name.append_entry_by_nid(Nid::COMMONNAME, cn).unwrap();
    let name = name.build();

    let mut serial = BigNum::new().unwrap();
    serial.rand(128, MsbOption::MAYBE_ZERO, false).unwrap();
    let serial = serial.to_asn1_integer().unwrap();

    let mut builder = X509::builder().unwrap();
    builder.set_version(2).unwrap();
    builder.set_serial_number(&serial).unwrap();
    builder.set_subject_name(&name).unwrap();
    builder.set_issuer_name(&name).unwrap();
    builder.set_pubkey(key).unwrap();
    builder
        .set_not_before(&Asn1Time::days_from_now(0).unwrap())
        .unwrap();
    builder
        .set_not_after(&Asn1Time::days_from_now(1).unwrap())
        .unwrap();
    builder.sign(key, MessageDigest::sha256()).unwrap();
    builder.build()
}

/// Write a pem bundle with the certificate followed by the private key.
pub(crate) fn write_pem_bundle(path: &Path, cert: &X509, key: &PKey<Private>) {
    let mut content = cert.to_pem().unwrap();
    content.extend_from_slice(&key.private_key_to_pem_pkcs8().unwrap());
    fs::write(path, content).unwrap();
}

/// Write a valid self signed bundle and return its path.
pub(crate) fn write_valid_bundle(dir: &Path, name: &str) -> PathBuf {
    let key = new_key();
    let cert = self_signed_cert(&key, "tlsterm.test");
    let path = dir.join(name);
    write_pem_bundle(&path, &cert, &key);
    path
}

pub(crate) enum ReadStep {
    /// Return this many bytes, limited by the buffer size. Zero means eof.
    Data(usize),
    Fail(SslIoError),
}

pub(crate) enum WriteStep {
    /// Accept at most this many bytes.
    Accept(usize),
    Fail(SslIoError),
}

#[derive(Default)]
pub(crate) struct MockRecord {
    /// Address and length of every buffer passed to `ssl_read`.
    pub(crate) read_calls: Vec<(usize, usize)>,
    /// Address and length of every buffer passed to `ssl_write`.
    pub(crate) write_calls: Vec<(usize, usize)>,
    pub(crate) written: Vec<u8>,
    pub(crate) clear_count: usize,
    pub(crate) shutdown_count: usize,
    pub(crate) drop_count: usize,
}

/// A scripted engine session.
///
/// Reads fail with want-read and writes accept everything once the script runs out.
pub(crate) struct MockSession {
    reads: VecDeque<ReadStep>,
    writes: VecDeque<WriteStep>,
    next_byte: u8,
    pending: bool,
    record: Rc<RefCell<MockRecord>>,
}

impl MockSession {
    pub(crate) fn new() -> (Self, Rc<RefCell<MockRecord>>) {
        let record = Rc::new(RefCell::new(MockRecord::default()));
        let session = MockSession {
            reads: VecDeque::new(),
            writes: VecDeque::new(),
            next_byte: 0,
            pending: false,
            record: record.clone(),
        };
        (session, record)
    }

    pub(crate) fn push_read(&mut self, step: ReadStep) {
        self.reads.push_back(step);
    }

    pub(crate) fn push_write(&mut self, step: WriteStep) {
        self.writes.push_back(step);
    }

    pub(crate) fn set_pending(&mut self, pending: bool) {
        self.pending = pending;
    }
}

impl SslSessionIo for MockSession {
    fn clear_error(&mut self) {
        self.record.borrow_mut().clear_count += 1;
    }

    fn ssl_read(&mut self, buf: &mut [u8]) -> Result<usize, SslIoError> {
        self.record
            .borrow_mut()
            .read_calls
            .push((buf.as_ptr() as usize, buf.len()));
        match self.reads.pop_front() {
            Some(ReadStep::Data(n)) => {
                let n = n.min(buf.len());
                for b in &mut buf[..n] {
                    *b = self.next_byte;
                    self.next_byte = self.next_byte.wrapping_add(1);
                }
                Ok(n)
            }
            Some(ReadStep::Fail(e)) => Err(e),
            None => Err(SslIoError::new(SslErrorCode::WantRead)),
        }
    }

    fn ssl_write(&mut self, buf: &[u8]) -> Result<usize, SslIoError> {
        let mut record = self.record.borrow_mut();
        record.write_calls.push((buf.as_ptr() as usize, buf.len()));
        let n = match self.writes.pop_front() {
            Some(WriteStep::Accept(n)) => n.min(buf.len()),
            Some(WriteStep::Fail(e)) => return Err(e),
            None => buf.len(),
        };
        record.written.extend_from_slice(&buf[..n]);
        Ok(n)
    }

    fn shutdown(&mut self) {
        self.record.borrow_mut().shutdown_count += 1;
    }

    fn has_pending(&self) -> bool {
        self.pending
    }
}

impl Drop for MockSession {
    fn drop(&mut self) {
        self.record.borrow_mut().drop_count += 1;
    }
}
