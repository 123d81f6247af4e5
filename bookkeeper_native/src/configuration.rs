//! Client configuration: a foreign `ClientConfiguration` with the metadata
//! service URI applied.

use jvm_bridge::{
    marshal, Arg, BridgeResult, DescriptorCache, ForeignRuntime, OwningHandle, ReturnKind,
};
use tracing::info;

use crate::descriptors::{CLIENT_CONFIGURATION, SET_METADATA_SERVICE_URI};
use crate::error::ClientError;

pub struct ClientConfiguration<'c, R: ForeignRuntime> {
    cache: &'c DescriptorCache<R>,
    handle: OwningHandle<R>,
    metadata_service_uri: String,
}

impl<'c, R: ForeignRuntime> ClientConfiguration<'c, R> {
    /// Construct a configuration pointing at `metadata_service_uri`.
    ///
    /// The URI is passed through as is; the foreign side validates it. On
    /// failure no configuration exists.
    pub fn configure(
        cache: &'c DescriptorCache<R>,
        metadata_service_uri: &str,
    ) -> Result<Self, ClientError> {
        let handle = OwningHandle::construct(cache, CLIENT_CONFIGURATION, &[])
            .and_then(OwningHandle::into_durable)
            .map_err(ClientError::bridge("construct client configuration"))?;

        set_metadata_service_uri(cache, &handle, metadata_service_uri)
            .map_err(ClientError::bridge("set metadata service URI"))?;

        info!(uri = metadata_service_uri, "client configured");
        Ok(Self {
            cache,
            handle,
            metadata_service_uri: metadata_service_uri.to_string(),
        })
    }

    pub fn metadata_service_uri(&self) -> &str {
        &self.metadata_service_uri
    }

    pub(crate) fn cache(&self) -> &'c DescriptorCache<R> {
        self.cache
    }

    pub(crate) fn handle(&self) -> &OwningHandle<R> {
        &self.handle
    }
}

fn set_metadata_service_uri<R: ForeignRuntime>(
    cache: &DescriptorCache<R>,
    configuration: &OwningHandle<R>,
    uri: &str,
) -> BridgeResult<()> {
    let setter = cache.method(CLIENT_CONFIGURATION, SET_METADATA_SERVICE_URI)?;
    let uri = marshal::string_to_foreign(cache, uri)?;
    // Returns the configuration itself; the extra reference is released
    // with the result.
    configuration.with_call(cache, setter, ReturnKind::Object, &[Arg::Object(uri.get()?)])?;
    Ok(())
}
