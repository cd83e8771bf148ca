//! # MT5 Core Library
//!
//! The connection lifecycle manager behind the MT5 bridge backend: it turns
//! the remote platform's asynchronous account provisioning into a predictable,
//! short-circuiting pipeline per request.
//!
//! ## Modules
//! - `model`: Account, state and query types shared with the wire format.
//! - `remote`: The remote account-management contract and its HTTP client.
//! - `registry`: Resolves (server, login) pairs to a unique account.
//! - `deploy`: Idempotent deploy/undeploy transitions.
//! - `readiness`: Bounded waiting for an account to become connected.
//! - `bridge`: Snapshot and trade-history queries over a ready account.
//! - `service`: Wires the stages together, one flow per inbound request.
//! - `sync`: Per-account-key serialization for concurrent flows.

pub mod bridge;
pub mod deploy;
pub mod error;
pub mod model;
pub mod readiness;
pub mod registry;
pub mod remote;
pub mod service;
pub mod sync;

pub use error::{Error, ErrorKind, Result};
pub use service::{BridgeService, ConnectOutcome};
