//! JVM bootstrap — create the runtime once, attach threads to it.

use ::jni::{AttachGuard, InitArgsBuilder, JNIVersion, JavaVM};
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("invalid JVM arguments: {0}")]
    Arguments(String),

    #[error("failed to create the JVM: {0}")]
    Start(String),

    #[error("failed to attach the current thread: {0}")]
    Attach(String),
}

/// A live JVM created by this process.
pub struct ManagedRuntime {
    vm: JavaVM,
}

impl ManagedRuntime {
    /// Create the JVM with `-Djava.class.path=<classpath>` as its only
    /// option. Unrecognized options are rejected.
    pub fn start(classpath: &str) -> Result<Self, BootstrapError> {
        let class_path_option = format!("-Djava.class.path={classpath}");
        let args = InitArgsBuilder::new()
            .version(JNIVersion::V8)
            .option(class_path_option.as_str())
            .ignore_unrecognized(false)
            .build()
            .map_err(|e| BootstrapError::Arguments(e.to_string()))?;

        let vm = JavaVM::new(args).map_err(|e| BootstrapError::Start(e.to_string()))?;
        info!(classpath_len = classpath.len(), "JVM started");
        Ok(Self { vm })
    }

    /// Attach the calling thread. It stays attached until the guard drops.
    pub fn attach(&self) -> Result<AttachGuard<'_>, BootstrapError> {
        self.vm
            .attach_current_thread()
            .map_err(|e| BootstrapError::Attach(e.to_string()))
    }

    /// Give up the runtime. Must only be called after every descriptor
    /// cache and handle created on it is gone, which the borrow of
    /// `attach` already guarantees.
    pub fn stop(self) {
        drop(self.vm);
        info!("JVM handle released");
    }
}
