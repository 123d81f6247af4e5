//! Buffer marshaler — native bytes to foreign `byte[]` and back.
//!
//! Copies happen only while the foreign array is pinned, so the collector
//! can neither move nor reclaim it mid-copy. Nothing else is called on the
//! runtime while a pin is held.
//!
//! Zero-length input produces a zero-length array, never null.

use crate::descriptors::DescriptorCache;
use crate::error::{BridgeError, BridgeResult};
use crate::exception::clear_pending;
use crate::handle::OwningHandle;
use crate::runtime::ForeignRuntime;

/// Copy `bytes` into a freshly allocated foreign byte array.
///
/// The returned handle is call-scoped; promote it if it has to outlive the
/// current native frame.
pub fn to_foreign<R: ForeignRuntime>(
    cache: &DescriptorCache<R>,
    bytes: &[u8],
) -> BridgeResult<OwningHandle<R>> {
    let runtime = cache.runtime();
    let len = bytes.len();

    let Some(array) = runtime.new_byte_array(len) else {
        cache.translator().check_and_clear()?;
        return Err(BridgeError::Buffer {
            len,
            action: "allocated",
        });
    };
    let handle = OwningHandle::call_scoped(runtime, array);

    if len > 0 {
        runtime
            .with_pinned_bytes(handle.get()?, |pinned| pinned.copy_from_slice(bytes))
            .ok_or_else(|| pin_failed(runtime, len))?;
    }
    Ok(handle)
}

/// Copy the contents of a foreign byte array into a native vector.
pub fn from_foreign<R: ForeignRuntime>(
    cache: &DescriptorCache<R>,
    handle: &OwningHandle<R>,
) -> BridgeResult<Vec<u8>> {
    let runtime = cache.runtime();
    let array = handle.get()?;

    let Some(len) = runtime.byte_array_len(array) else {
        cache.translator().check_and_clear()?;
        return Err(BridgeError::Buffer {
            len: 0,
            action: "measured",
        });
    };
    if len == 0 {
        return Ok(Vec::new());
    }

    runtime
        .with_pinned_bytes(array, |pinned| pinned.to_vec())
        .ok_or_else(|| pin_failed(runtime, len))
}

/// Marshal a native string into a call-scoped foreign string.
pub fn string_to_foreign<R: ForeignRuntime>(
    cache: &DescriptorCache<R>,
    value: &str,
) -> BridgeResult<OwningHandle<R>> {
    let runtime = cache.runtime();
    match runtime.new_string(value) {
        Some(string) => Ok(OwningHandle::call_scoped(runtime, string)),
        None => {
            cache.translator().check_and_clear()?;
            Err(BridgeError::String { action: "created" })
        }
    }
}

fn pin_failed<R: ForeignRuntime>(runtime: &R, len: usize) -> BridgeError {
    // A failed pin may leave an OutOfMemoryError behind.
    clear_pending(runtime);
    BridgeError::Buffer {
        len,
        action: "pinned",
    }
}
