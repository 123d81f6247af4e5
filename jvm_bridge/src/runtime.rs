//! The foreign runtime seam.
//!
//! Everything above this trait (descriptor cache, owning handles, the
//! exception translator, the marshaler and every facade built on them)
//! talks to the managed runtime only through `ForeignRuntime`.
//!
//! The trait mirrors the raw invocation interface on purpose:
//!   - lookups and calls report failure as `None` and leave an exception
//!     pending, exactly like the JNI function table
//!   - references are plain values; nothing here releases them implicitly
//!   - there is no exception checking; that belongs to `exception.rs`
//!
//! Implementations are cheap `Clone` handles onto one execution context
//! (one attached thread). They are expected to be `!Send`.

/// What a member call is expected to return.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReturnKind {
    Void,
    Int,
    Long,
    Object,
}

/// A single call argument.
///
/// Object arguments borrow a reference owned elsewhere (usually by an
/// `OwningHandle`); the callee never takes ownership.
#[derive(Debug)]
pub enum Arg<'a, Ref> {
    Int(i32),
    Long(i64),
    Object(&'a Ref),
    Null,
}

/// Raw result of a member call, before exception translation.
///
/// An `Object(Some(_))` is a fresh call-scoped reference the caller owns.
#[derive(Debug)]
pub enum Value<Ref> {
    Void,
    Int(i32),
    Long(i64),
    Object(Option<Ref>),
}

/// One attached execution context of a managed runtime.
pub trait ForeignRuntime: Clone {
    /// Durable handle to a resolved foreign type.
    type Type;
    /// Resolved method or constructor.
    type Method: Copy;
    /// Resolved static field.
    type Field: Copy;
    /// An object reference, call-scoped or durable.
    type Ref;

    // -- resolution ------------------------------------------------------

    /// Resolve a type by its binary name (`java/lang/Throwable`).
    fn find_type(&self, name: &str) -> Option<Self::Type>;

    /// Resolve an instance method or constructor (`<init>`) of `ty`.
    fn find_method(&self, ty: &Self::Type, name: &str, signature: &str) -> Option<Self::Method>;

    /// Resolve a static field of `ty`.
    fn find_static_field(&self, ty: &Self::Type, name: &str, signature: &str)
        -> Option<Self::Field>;

    /// Release a type handle obtained from `find_type`.
    fn release_type(&self, ty: Self::Type);

    // -- calls -----------------------------------------------------------

    /// Allocate a new instance of `ty` through `ctor`.
    fn construct(
        &self,
        ty: &Self::Type,
        ctor: Self::Method,
        args: &[Arg<'_, Self::Ref>],
    ) -> Option<Self::Ref>;

    /// Invoke an instance method on `target`.
    fn invoke(
        &self,
        target: &Self::Ref,
        method: Self::Method,
        ret: ReturnKind,
        args: &[Arg<'_, Self::Ref>],
    ) -> Value<Self::Ref>;

    /// Read an object-typed static field.
    fn read_static(&self, ty: &Self::Type, field: Self::Field) -> Option<Self::Ref>;

    // -- pending exception state ----------------------------------------

    fn exception_pending(&self) -> bool;

    /// Fetch a call-scoped reference to the pending throwable without
    /// clearing it.
    fn exception_occurred(&self) -> Option<Self::Ref>;

    fn exception_clear(&self);

    // -- reference management -------------------------------------------

    /// Create a durable reference to the object behind `local`.
    fn promote(&self, local: &Self::Ref) -> Option<Self::Ref>;

    fn delete_local(&self, local: Self::Ref);

    fn delete_durable(&self, durable: Self::Ref);

    // -- arrays and strings ---------------------------------------------

    fn new_byte_array(&self, len: usize) -> Option<Self::Ref>;

    fn byte_array_len(&self, array: &Self::Ref) -> Option<usize>;

    /// Pin `array` for the duration of `f`.
    ///
    /// No other runtime call may be made from inside `f`. Returns `None`
    /// if the array could not be pinned.
    fn with_pinned_bytes<T>(&self, array: &Self::Ref, f: impl FnOnce(&mut [u8]) -> T)
        -> Option<T>;

    fn new_string(&self, value: &str) -> Option<Self::Ref>;

    fn read_string(&self, string: &Self::Ref) -> Option<String>;
}
