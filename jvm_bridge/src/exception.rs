//! Exception translator — the single place where pending foreign
//! exceptions become native errors.
//!
//! Order of operations when an exception is pending:
//!   1. capture the throwable reference
//!   2. clear the pending state (nothing else may be called while pending)
//!   3. invoke the cached "get message" member on the captured throwable
//!   4. if step 3 raised or produced nothing readable, clear again and
//!      fall back to `ForeignError::Unreadable`
//!
//! After `check_and_clear` returns, the execution context is never left
//! with a pending exception.

use tracing::debug;

use crate::error::ForeignError;
use crate::runtime::{ForeignRuntime, ReturnKind, Value};

/// Converts pending foreign exceptions into `ForeignError`s.
#[derive(Clone)]
pub struct ExceptionTranslator<R: ForeignRuntime> {
    runtime: R,
    get_message: R::Method,
}

impl<R: ForeignRuntime> ExceptionTranslator<R> {
    /// `get_message` must be the resolved `Throwable.getMessage()` member.
    pub fn new(runtime: R, get_message: R::Method) -> Self {
        Self {
            runtime,
            get_message,
        }
    }

    /// Succeed if nothing is pending; otherwise clear and translate.
    pub fn check_and_clear(&self) -> Result<(), ForeignError> {
        if !self.runtime.exception_pending() {
            return Ok(());
        }

        let throwable = self.runtime.exception_occurred();
        self.runtime.exception_clear();

        let Some(throwable) = throwable else {
            return Err(ForeignError::Unreadable);
        };

        let message = self.extract_message(&throwable);
        self.runtime.delete_local(throwable);

        let err = match message {
            Some(message) => ForeignError::Raised { message },
            None => ForeignError::Unreadable,
        };
        debug!(error = %err, "cleared pending foreign exception");
        Err(err)
    }

    /// Check after a call that produced `value`.
    ///
    /// On error the value is discarded (any returned reference is deleted)
    /// and never handed to the caller.
    pub fn check_value(&self, value: Value<R::Ref>) -> Result<Value<R::Ref>, ForeignError> {
        match self.check_and_clear() {
            Ok(()) => Ok(value),
            Err(err) => {
                discard_value(&self.runtime, value);
                Err(err)
            }
        }
    }

    fn extract_message(&self, throwable: &R::Ref) -> Option<String> {
        let value = self
            .runtime
            .invoke(throwable, self.get_message, ReturnKind::Object, &[]);

        if self.runtime.exception_pending() {
            self.runtime.exception_clear();
            discard_value(&self.runtime, value);
            return None;
        }

        let Value::Object(Some(text)) = value else {
            discard_value(&self.runtime, value);
            return None;
        };

        let message = self.runtime.read_string(&text);
        self.runtime.delete_local(text);

        if self.runtime.exception_pending() {
            self.runtime.exception_clear();
            return None;
        }
        message
    }
}

/// Clear whatever is pending without calling back into the runtime.
///
/// Used before the translator exists, i.e. while the descriptor table that
/// holds `getMessage` is itself being resolved.
pub fn clear_pending<R: ForeignRuntime>(runtime: &R) -> ForeignError {
    if runtime.exception_pending() {
        if let Some(throwable) = runtime.exception_occurred() {
            runtime.exception_clear();
            runtime.delete_local(throwable);
        } else {
            runtime.exception_clear();
        }
    }
    ForeignError::Unreadable
}

/// Release the reference carried by a value that will not be used.
pub(crate) fn discard_value<R: ForeignRuntime>(runtime: &R, value: Value<R::Ref>) {
    if let Value::Object(Some(reference)) = value {
        runtime.delete_local(reference);
    }
}
