/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::fmt;
use std::vec;

use libc::c_int;
use openssl::error::{Error, ErrorStack};

/// One entry taken off the engine error queue.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Diagnostic {
    library_code: c_int,
    reason_code: c_int,
    text: String,
}

impl Diagnostic {
    pub fn new(library_code: c_int, reason_code: c_int, text: impl Into<String>) -> Self {
        Diagnostic {
            library_code,
            reason_code,
            text: text.into(),
        }
    }

    #[inline]
    pub fn library_code(&self) -> c_int {
        self.library_code
    }

    #[inline]
    pub fn reason_code(&self) -> c_int {
        self.reason_code
    }
}

impl From<&Error> for Diagnostic {
    fn from(e: &Error) -> Self {
        Diagnostic {
            library_code: e.library_code(),
            reason_code: e.reason_code(),
            text: e.to_string(),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// The drained error queue of one failed engine call.
///
/// It can be iterated only once, every entry is handed out exactly one time.
#[derive(Debug, Default)]
pub struct Diagnostics {
    entries: vec::IntoIter<Diagnostic>,
}

impl Diagnostics {
    pub fn new(entries: Vec<Diagnostic>) -> Self {
        Diagnostics {
            entries: entries.into_iter(),
        }
    }

    pub fn from_error_stack(stack: &ErrorStack) -> Self {
        Diagnostics::new(stack.errors().iter().map(Diagnostic::from).collect())
    }

    /// Take all pending entries from the error queue of the current thread.
    pub fn drain_thread_queue() -> Self {
        Diagnostics::from_error_stack(&ErrorStack::get())
    }

    pub fn is_empty(&self) -> bool {
        self.entries.len() == 0
    }

    /// The entries not handed out yet.
    pub fn as_slice(&self) -> &[Diagnostic] {
        self.entries.as_slice()
    }
}

impl Iterator for Diagnostics {
    type Item = Diagnostic;

    fn next(&mut self) -> Option<Self::Item> {
        self.entries.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.entries.size_hint()
    }
}

impl ExactSizeIterator for Diagnostics {}
