//! Owning foreign handle — one reference, released exactly once.
//!
//! A handle carries its reference plus the scope it was obtained in:
//!   - `CallScoped`: valid only until the current native frame returns to
//!     the runtime; released with `delete_local`
//!   - `Durable`: valid until released; released with `delete_durable`
//!
//! Anything stored beyond the call that produced it must be promoted with
//! `into_durable` first. `release` is idempotent and also runs on drop.

use tracing::trace;

use crate::descriptors::DescriptorCache;
use crate::error::{BridgeError, BridgeResult};
use crate::runtime::{Arg, ForeignRuntime, ReturnKind, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    CallScoped,
    Durable,
}

/// Scoped owner of a single foreign object reference.
pub struct OwningHandle<R: ForeignRuntime> {
    runtime: R,
    reference: Option<R::Ref>,
    scope: Scope,
}

impl<R: ForeignRuntime> OwningHandle<R> {
    /// Take ownership of a fresh call-scoped reference.
    pub fn call_scoped(runtime: &R, reference: R::Ref) -> Self {
        Self {
            runtime: runtime.clone(),
            reference: Some(reference),
            scope: Scope::CallScoped,
        }
    }

    /// Take ownership of an already durable reference.
    pub fn durable(runtime: &R, reference: R::Ref) -> Self {
        Self {
            runtime: runtime.clone(),
            reference: Some(reference),
            scope: Scope::Durable,
        }
    }

    /// Construct a new foreign object. The result is call-scoped.
    pub fn construct(
        cache: &DescriptorCache<R>,
        type_name: &'static str,
        args: &[Arg<'_, R::Ref>],
    ) -> BridgeResult<Self> {
        let ty = cache.type_of(type_name)?;
        let ctor = cache.constructor(type_name)?;
        let runtime = cache.runtime();

        let created = runtime.construct(ty, ctor, args);
        let value = cache.translator().check_value(Value::Object(created))?;
        Returned::from_value(runtime, value).into_object(type_name)
    }

    /// Read an object-typed static field. The result is call-scoped.
    pub fn read_static(
        cache: &DescriptorCache<R>,
        type_name: &'static str,
        field: &'static str,
    ) -> BridgeResult<Self> {
        let ty = cache.type_of(type_name)?;
        let field_id = cache.static_field(type_name, field)?;
        let runtime = cache.runtime();

        let read = runtime.read_static(ty, field_id);
        let value = cache.translator().check_value(Value::Object(read))?;
        Returned::from_value(runtime, value).into_object(field)
    }

    pub fn scope(&self) -> Scope {
        self.scope
    }

    pub fn is_released(&self) -> bool {
        self.reference.is_none()
    }

    /// Borrow the held reference, e.g. to pass it as a call argument.
    pub fn get(&self) -> BridgeResult<&R::Ref> {
        self.reference.as_ref().ok_or(BridgeError::Released)
    }

    /// Promote to a durable reference. The call-scoped reference is
    /// deleted once the durable one exists. No-op for durable handles.
    pub fn into_durable(mut self) -> BridgeResult<Self> {
        if self.scope == Scope::Durable {
            return Ok(self);
        }
        let local = self.reference.take().ok_or(BridgeError::Released)?;
        let durable = self.runtime.promote(&local);
        self.runtime.delete_local(local);
        let durable = durable.ok_or(BridgeError::PromotionFailed)?;
        Ok(Self::durable(&self.runtime, durable))
    }

    /// Release the reference. A second call does nothing.
    pub fn release(&mut self) {
        let Some(reference) = self.reference.take() else {
            return;
        };
        match self.scope {
            Scope::CallScoped => self.runtime.delete_local(reference),
            Scope::Durable => self.runtime.delete_durable(reference),
        }
        trace!(scope = ?self.scope, "foreign reference released");
    }

    /// Invoke `method` on the held object and translate any exception.
    ///
    /// On a translated exception the raw return value is discarded.
    pub fn with_call(
        &self,
        cache: &DescriptorCache<R>,
        method: R::Method,
        ret: ReturnKind,
        args: &[Arg<'_, R::Ref>],
    ) -> BridgeResult<Returned<R>> {
        let target = self.get()?;
        let value = self.runtime.invoke(target, method, ret, args);
        let value = cache.translator().check_value(value)?;
        Ok(Returned::from_value(&self.runtime, value))
    }
}

impl<R: ForeignRuntime> Drop for OwningHandle<R> {
    fn drop(&mut self) {
        self.release();
    }
}

/// A translated, exception-free return value.
///
/// Object results are already wrapped in call-scoped handles, so an
/// ignored result still releases its reference.
pub enum Returned<R: ForeignRuntime> {
    Void,
    Int(i32),
    Long(i64),
    Object(Option<OwningHandle<R>>),
}

impl<R: ForeignRuntime> Returned<R> {
    fn from_value(runtime: &R, value: Value<R::Ref>) -> Self {
        match value {
            Value::Void => Returned::Void,
            Value::Int(v) => Returned::Int(v),
            Value::Long(v) => Returned::Long(v),
            Value::Object(reference) => {
                Returned::Object(reference.map(|r| OwningHandle::call_scoped(runtime, r)))
            }
        }
    }

    pub fn into_void(self, operation: &'static str) -> BridgeResult<()> {
        match self {
            Returned::Void => Ok(()),
            _ => Err(unexpected(operation, "void")),
        }
    }

    pub fn into_int(self, operation: &'static str) -> BridgeResult<i32> {
        match self {
            Returned::Int(v) => Ok(v),
            _ => Err(unexpected(operation, "int")),
        }
    }

    pub fn into_long(self, operation: &'static str) -> BridgeResult<i64> {
        match self {
            Returned::Long(v) => Ok(v),
            _ => Err(unexpected(operation, "long")),
        }
    }

    /// The returned object; null is an error.
    pub fn into_object(self, operation: &'static str) -> BridgeResult<OwningHandle<R>> {
        match self {
            Returned::Object(Some(handle)) => Ok(handle),
            Returned::Object(None) => Err(BridgeError::NullReturn { operation }),
            _ => Err(unexpected(operation, "object")),
        }
    }
}

fn unexpected(operation: &'static str, expected: &'static str) -> BridgeError {
    BridgeError::UnexpectedReturn {
        operation,
        expected,
    }
}
