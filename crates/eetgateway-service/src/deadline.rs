// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Time budget around a transport.
//
// Online registration has to finish within the authority's limit; a
// confirmation that arrives later is worthless to the register, which must
// already have printed the receipt without a FIK.  `Deadline` turns such a
// late answer into `TransportError::Timeout` so the caller takes the offline
// path instead of racing the clock.

use std::time::{Duration, Instant};

use tracing::warn;

use crate::traits::{Transport, TransportError};

/// Fails any exchange that takes longer than `budget`.
pub struct Deadline<T> {
    inner: T,
    budget: Duration,
}

impl<T: Transport> Deadline<T> {
    pub fn new(inner: T, budget: Duration) -> Self {
        Self { inner, budget }
    }
}

impl<T: Transport> Transport for Deadline<T> {
    fn send(&self, envelope: &[u8]) -> Result<Vec<u8>, TransportError> {
        let started = Instant::now();
        let response = self.inner.send(envelope)?;
        let elapsed = started.elapsed();
        if elapsed > self.budget {
            warn!(
                elapsed_ms = elapsed.as_millis(),
                budget_ms = self.budget.as_millis(),
                "response arrived after the deadline"
            );
            return Err(TransportError::Timeout(self.budget));
        }
        Ok(response)
    }

    fn ping(&self) -> Result<(), TransportError> {
        let started = Instant::now();
        self.inner.ping()?;
        if started.elapsed() > self.budget {
            return Err(TransportError::Timeout(self.budget));
        }
        Ok(())
    }
}
