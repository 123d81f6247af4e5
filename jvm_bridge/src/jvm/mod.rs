//! The JNI-backed runtime: bootstrap plus the `ForeignRuntime`
//! implementation over an attached thread's `JNIEnv`.

mod env;
mod vm;

pub use env::{JniField, JniMethod, JniRef, JniRuntime, JniType};
pub use vm::{BootstrapError, ManagedRuntime};
