//! Digest type selection and the foreign token for it.

use std::fmt;

use jvm_bridge::{DescriptorCache, ForeignRuntime, OwningHandle};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::descriptors::DIGEST_TYPE;
use crate::error::ClientError;

/// Entry digest used by a ledger. Names match `BookKeeper.DigestType`.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "UPPERCASE")]
#[value(rename_all = "UPPER")]
pub enum Digest {
    #[default]
    Dummy,
    Crc32,
    Crc32c,
    Mac,
}

impl Digest {
    /// The static field of `DigestType` holding this constant.
    pub fn field_name(self) -> &'static str {
        match self {
            Digest::Dummy => "DUMMY",
            Digest::Crc32 => "CRC32",
            Digest::Crc32c => "CRC32C",
            Digest::Mac => "MAC",
        }
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.field_name())
    }
}

/// A durable reference to one `DigestType` constant, fetched once and
/// passed to every ledger open.
pub struct DigestToken<R: ForeignRuntime> {
    digest: Digest,
    handle: OwningHandle<R>,
}

impl<R: ForeignRuntime> DigestToken<R> {
    pub fn fetch(cache: &DescriptorCache<R>, digest: Digest) -> Result<Self, ClientError> {
        let handle = OwningHandle::read_static(cache, DIGEST_TYPE, digest.field_name())
            .and_then(OwningHandle::into_durable)
            .map_err(ClientError::bridge("read digest type"))?;
        debug!(%digest, "digest type token fetched");
        Ok(Self { digest, handle })
    }

    pub fn digest(&self) -> Digest {
        self.digest
    }

    pub(crate) fn handle(&self) -> &OwningHandle<R> {
        &self.handle
    }
}
