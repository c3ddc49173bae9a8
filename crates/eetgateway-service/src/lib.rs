// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>

//! EET gateway service.
//!
//! Wires the envelope core to its collaborators: a [`KeyStore`] that hands
//! out taxpayer credentials, a [`Transport`] that talks to the authority and
//! a [`TrustVerifier`](eetgateway_security::TrustVerifier) that decides
//! whether a response signer is acceptable.
//!
//! The `stub` module carries in-process implementations used by the CLI and
//! the tests; [`Deadline`] bounds any transport by the registration time
//! limit.

pub mod deadline;
pub mod service;
pub mod stub;
pub mod traits;

pub use deadline::Deadline;
pub use service::{GatewayService, ServiceError};
pub use stub::{InMemoryKeyStore, SimulatedAuthority, UnreachableTransport};
pub use traits::{KeyStore, KeyStoreError, Transport, TransportError};
