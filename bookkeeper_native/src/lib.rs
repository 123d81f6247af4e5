#![forbid(unsafe_code)]

//! BookKeeper native driver
//!
//! Drives the Apache BookKeeper Java client through `jvm_bridge`:
//! configure, open a client, open a ledger, append, close.
//!
//! No BookKeeper logic lives here. Replication, quorum checks and entry
//! id assignment all happen on the foreign side; this crate only owns the
//! references and turns foreign exceptions into `ClientError`s.

pub mod error;
pub mod descriptors;
pub mod digest;
pub mod configuration;
pub mod client;
pub mod ledger;
pub mod classpath;
pub mod settings;
pub mod runner;

pub use client::Client;
pub use configuration::ClientConfiguration;
pub use digest::{Digest, DigestToken};
pub use error::{BootstrapError, ClientError, SettingsError};
pub use ledger::LedgerHandle;
pub use settings::Settings;
