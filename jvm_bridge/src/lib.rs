//! JVM bridge — foreign-reference lifecycle and call marshaling.
//!
//! Lets native code drive a managed library through a fixed set of
//! pre-resolved descriptors. No library semantics live here; this crate
//! only guarantees that
//!   - descriptors are resolved once and released once
//!   - every acquired reference is released exactly once
//!   - a pending foreign exception is cleared and translated before the
//!     next foreign call
//!   - byte buffers are copied only while pinned
//!
//! `jvm` is the JNI implementation of the runtime seam, `sim` an
//! in-process one used by tests.

pub mod runtime;
pub mod error;
pub mod exception;
pub mod descriptors;
pub mod handle;
pub mod marshal;
pub mod jvm;
pub mod sim;

pub use descriptors::{DescriptorCache, MemberSpec, TypeSpec};
pub use error::{BridgeError, BridgeResult, DescriptorError, ForeignError};
pub use handle::{OwningHandle, Returned, Scope};
pub use runtime::{Arg, ForeignRuntime, ReturnKind, Value};
