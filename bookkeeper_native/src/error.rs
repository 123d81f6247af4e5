//! Error types for the BookKeeper facade and the driver around it.

use std::path::PathBuf;

use jvm_bridge::error::{BridgeError, ForeignError};
use thiserror::Error;

pub use jvm_bridge::jvm::BootstrapError;

/// A failed facade operation. The bridge is left consistent and the
/// operation may be retried.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClientError {
    /// The foreign call failed or its result could not be used.
    #[error("{operation} failed: {source}")]
    Bridge {
        operation: &'static str,
        #[source]
        source: BridgeError,
    },

    #[error("ledger {ledger_id} is closed")]
    LedgerClosed { ledger_id: i64 },

    #[error("BookKeeper client is closed")]
    ClientClosed,
}

impl ClientError {
    pub(crate) fn bridge(operation: &'static str) -> impl FnOnce(BridgeError) -> Self {
        move |source| ClientError::Bridge { operation, source }
    }

    /// The message of the foreign exception behind this error, if any.
    pub fn foreign_message(&self) -> Option<&str> {
        match self {
            ClientError::Bridge {
                source: BridgeError::Foreign(ForeignError::Raised { message }),
                ..
            } => Some(message),
            _ => None,
        }
    }
}

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("cannot read settings file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid settings file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("{field} must be positive, got {value}")]
    NotPositive { field: &'static str, value: i32 },
}
