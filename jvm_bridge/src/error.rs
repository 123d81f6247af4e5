//! Error types for the bridge core.
//!
//! Two failure classes cross this crate:
//!   - `DescriptorError`: startup-time resolution failures (fatal to the run)
//!   - `BridgeError`: per-operation failures, recoverable by the caller
//!
//! `ForeignError` is the native image of a foreign exception and is the only
//! thing the exception translator ever produces.

use thiserror::Error;

/// Result alias for per-operation bridge calls.
pub type BridgeResult<T> = Result<T, BridgeError>;

/// A foreign exception, translated and cleared.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ForeignError {
    /// The exception was captured and its message extracted.
    #[error("{message}")]
    Raised { message: String },

    /// The exception was cleared but its message could not be read
    /// (null message, or message extraction raised again).
    #[error("foreign exception raised (message unavailable)")]
    Unreadable,
}

impl ForeignError {
    /// The foreign message, if one was recovered.
    pub fn message(&self) -> Option<&str> {
        match self {
            ForeignError::Raised { message } => Some(message),
            ForeignError::Unreadable => None,
        }
    }
}

/// Startup resolution failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DescriptorError {
    #[error("foreign type {type_name} could not be resolved: {cause}")]
    TypeNotFound { type_name: String, cause: ForeignError },

    #[error("member {type_name}.{member}{signature} could not be resolved: {cause}")]
    MemberNotFound {
        type_name: String,
        member: String,
        signature: String,
        cause: ForeignError,
    },

    /// A lookup named a descriptor that was never part of the resolved set.
    #[error("descriptor {type_name}.{member} is not registered")]
    Unregistered { type_name: String, member: String },

    #[error("descriptor {type_name}.{member} is a {actual}, not a {expected}")]
    KindMismatch {
        type_name: String,
        member: String,
        expected: &'static str,
        actual: &'static str,
    },

    #[error("descriptor cache has been torn down")]
    TornDown,
}

/// Per-operation failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BridgeError {
    #[error(transparent)]
    Foreign(#[from] ForeignError),

    #[error(transparent)]
    Descriptor(#[from] DescriptorError),

    /// The owning handle was already released.
    #[error("foreign handle already released")]
    Released,

    /// A durable reference could not be created.
    #[error("could not promote reference to a durable one")]
    PromotionFailed,

    /// The runtime could not allocate or pin a byte buffer.
    #[error("foreign byte buffer of {len} bytes could not be {action}")]
    Buffer { len: usize, action: &'static str },

    /// A string could not be marshaled in either direction.
    #[error("foreign string could not be {action}")]
    String { action: &'static str },

    /// The call succeeded but returned null where an object was required.
    #[error("{operation} returned null")]
    NullReturn { operation: &'static str },

    /// The call returned a different kind of value than was asked for.
    #[error("{operation} returned an unexpected value kind (expected {expected})")]
    UnexpectedReturn {
        operation: &'static str,
        expected: &'static str,
    },
}
