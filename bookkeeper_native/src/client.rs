//! The BookKeeper client and ledger creation.

use jvm_bridge::{
    marshal, Arg, BridgeResult, DescriptorCache, ForeignRuntime, OwningHandle, ReturnKind,
};
use tracing::{info, warn};

use crate::configuration::ClientConfiguration;
use crate::descriptors::{BOOKKEEPER, CLOSE, CREATE_LEDGER, GET_ID, LEDGER_HANDLE};
use crate::digest::DigestToken;
use crate::error::ClientError;
use crate::ledger::LedgerHandle;

/// A connected `org.apache.bookkeeper.client.BookKeeper`.
///
/// Ledgers opened through `open_ledger` borrow the client, so it can be
/// neither closed nor dropped while one of them is alive.
pub struct Client<'c, R: ForeignRuntime> {
    cache: &'c DescriptorCache<R>,
    handle: OwningHandle<R>,
    closed: bool,
}

impl<'c, R: ForeignRuntime> Client<'c, R> {
    /// Connect using `configuration`. The configuration stays usable
    /// whether or not this succeeds.
    pub fn open(configuration: &ClientConfiguration<'c, R>) -> Result<Self, ClientError> {
        let cache = configuration.cache();
        let config_ref = configuration
            .handle()
            .get()
            .map_err(ClientError::bridge("open BookKeeper client"))?;

        let handle = OwningHandle::construct(cache, BOOKKEEPER, &[Arg::Object(config_ref)])
            .and_then(OwningHandle::into_durable)
            .map_err(ClientError::bridge("open BookKeeper client"))?;

        info!(uri = configuration.metadata_service_uri(), "BookKeeper client open");
        Ok(Self {
            cache,
            handle,
            closed: false,
        })
    }

    /// Create a ledger with the given replication settings.
    ///
    /// `quorum_size <= ensemble_size` is enforced by the cluster, not here.
    pub fn open_ledger(
        &self,
        ensemble_size: i32,
        quorum_size: i32,
        digest: &DigestToken<R>,
        password: &[u8],
    ) -> Result<LedgerHandle<'_, R>, ClientError> {
        if self.closed {
            return Err(ClientError::ClientClosed);
        }
        let (handle, ledger_id) = self
            .create_ledger(ensemble_size, quorum_size, digest, password)
            .map_err(ClientError::bridge("create ledger"))?;

        info!(
            ledger_id,
            ensemble_size,
            quorum_size,
            digest = %digest.digest(),
            "ledger open"
        );
        Ok(LedgerHandle::new(self.cache, handle, ledger_id))
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Close the client. Later calls are no-ops.
    ///
    /// The client counts as closed and its reference is released even if
    /// the foreign close raised.
    pub fn close(&mut self) -> Result<(), ClientError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        let result = self.close_foreign();
        self.handle.release();
        result.map_err(ClientError::bridge("close BookKeeper client"))?;
        info!("BookKeeper client closed");
        Ok(())
    }

    fn create_ledger(
        &self,
        ensemble_size: i32,
        quorum_size: i32,
        digest: &DigestToken<R>,
        password: &[u8],
    ) -> BridgeResult<(OwningHandle<R>, i64)> {
        let create = self.cache.method(BOOKKEEPER, CREATE_LEDGER)?;
        let password = marshal::to_foreign(self.cache, password)?;

        let ledger = self
            .handle
            .with_call(
                self.cache,
                create,
                ReturnKind::Object,
                &[
                    Arg::Int(ensemble_size),
                    Arg::Int(quorum_size),
                    Arg::Object(digest.handle().get()?),
                    Arg::Object(password.get()?),
                ],
            )?
            .into_object(CREATE_LEDGER)?
            .into_durable()?;

        let get_id = self.cache.method(LEDGER_HANDLE, GET_ID)?;
        let ledger_id = ledger
            .with_call(self.cache, get_id, ReturnKind::Long, &[])?
            .into_long(GET_ID)?;
        Ok((ledger, ledger_id))
    }

    fn close_foreign(&self) -> BridgeResult<()> {
        let close = self.cache.method(BOOKKEEPER, CLOSE)?;
        self.handle
            .with_call(self.cache, close, ReturnKind::Void, &[])?
            .into_void(CLOSE)
    }
}

impl<R: ForeignRuntime> Drop for Client<'_, R> {
    fn drop(&mut self) {
        if let Err(err) = self.close() {
            warn!(error = %err, "BookKeeper close error");
        }
    }
}
