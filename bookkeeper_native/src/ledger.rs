//! An open ledger: append entries, then close exactly once.

use jvm_bridge::{
    marshal, Arg, BridgeResult, DescriptorCache, ForeignRuntime, OwningHandle, ReturnKind,
};
use tracing::{debug, info, warn};

use crate::descriptors::{APPEND, CLOSE, LEDGER_HANDLE};
use crate::error::ClientError;

/// A writable ledger session, created by `Client::open_ledger`.
///
/// Dropping an open ledger closes it; a close failure at that point is
/// logged and otherwise ignored.
pub struct LedgerHandle<'a, R: ForeignRuntime> {
    cache: &'a DescriptorCache<R>,
    handle: OwningHandle<R>,
    id: i64,
    closed: bool,
}

impl<'a, R: ForeignRuntime> LedgerHandle<'a, R> {
    pub(crate) fn new(cache: &'a DescriptorCache<R>, handle: OwningHandle<R>, id: i64) -> Self {
        Self {
            cache,
            handle,
            id,
            closed: false,
        }
    }

    pub fn id(&self) -> i64 {
        self.id
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Append one entry and return its entry id.
    ///
    /// A failed append leaves the ledger open for the next one.
    pub fn append(&self, payload: &[u8]) -> Result<i64, ClientError> {
        if self.closed {
            return Err(ClientError::LedgerClosed { ledger_id: self.id });
        }
        let entry_id = self
            .append_foreign(payload)
            .map_err(ClientError::bridge("append"))?;
        debug!(ledger_id = self.id, entry_id, len = payload.len(), "entry appended");
        Ok(entry_id)
    }

    /// Close the ledger. Later calls are no-ops.
    ///
    /// The ledger counts as closed and its reference is released even if
    /// the foreign close raised.
    pub fn close(&mut self) -> Result<(), ClientError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        let result = self.close_foreign();
        self.handle.release();
        result.map_err(ClientError::bridge("close ledger"))?;
        info!(ledger_id = self.id, "ledger closed");
        Ok(())
    }

    fn append_foreign(&self, payload: &[u8]) -> BridgeResult<i64> {
        let append = self.cache.method(LEDGER_HANDLE, APPEND)?;
        let payload = marshal::to_foreign(self.cache, payload)?;
        self.handle
            .with_call(self.cache, append, ReturnKind::Long, &[Arg::Object(payload.get()?)])?
            .into_long(APPEND)
    }

    fn close_foreign(&self) -> BridgeResult<()> {
        let close = self.cache.method(LEDGER_HANDLE, CLOSE)?;
        self.handle
            .with_call(self.cache, close, ReturnKind::Void, &[])?
            .into_void(CLOSE)
    }
}

impl<R: ForeignRuntime> Drop for LedgerHandle<'_, R> {
    fn drop(&mut self) {
        if let Err(err) = self.close() {
            warn!(ledger_id = self.id, error = %err, "Ledger close error");
        }
    }
}
