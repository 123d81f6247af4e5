//! Run settings — JSON file, then command-line overrides.
//!
//! Every field has a default, so an empty file (or no file) is a valid
//! configuration. Unknown fields are rejected.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::digest::Digest;
use crate::error::SettingsError;

pub const DEFAULT_METADATA_SERVICE_URI: &str = "zk+hierarchical://localhost:2181/ledgers";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// Directory scanned for `.jar` files to put on the class path.
    pub vendor_dir: PathBuf,
    pub metadata_service_uri: String,
    pub ensemble_size: i32,
    pub quorum_size: i32,
    pub digest: Digest,
    pub password: String,
    pub payload: String,
    pub append_count: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            vendor_dir: PathBuf::from("vendor"),
            metadata_service_uri: DEFAULT_METADATA_SERVICE_URI.to_string(),
            ensemble_size: 3,
            quorum_size: 3,
            digest: Digest::Dummy,
            password: String::new(),
            payload: "hello".to_string(),
            append_count: 100,
        }
    }
}

/// Command-line overrides; `None` keeps the loaded value.
#[derive(Debug, Clone, Default, clap::Args)]
pub struct Overrides {
    /// Directory holding the BookKeeper client jars
    #[arg(long)]
    pub vendor_dir: Option<PathBuf>,

    /// Metadata service URI handed to ClientConfiguration
    #[arg(long)]
    pub metadata_service_uri: Option<String>,

    #[arg(long)]
    pub ensemble_size: Option<i32>,

    #[arg(long)]
    pub quorum_size: Option<i32>,

    #[arg(long, value_enum, ignore_case = true)]
    pub digest: Option<Digest>,

    #[arg(long)]
    pub password: Option<String>,

    /// Entry payload, appended as UTF-8 bytes
    #[arg(long)]
    pub payload: Option<String>,

    /// Number of appends to perform
    #[arg(long)]
    pub append_count: Option<u32>,
}

impl Settings {
    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        let text = fs::read_to_string(path).map_err(|source| SettingsError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| SettingsError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn apply(&mut self, o: Overrides) {
        if let Some(v) = o.vendor_dir {
            self.vendor_dir = v;
        }
        if let Some(v) = o.metadata_service_uri {
            self.metadata_service_uri = v;
        }
        if let Some(v) = o.ensemble_size {
            self.ensemble_size = v;
        }
        if let Some(v) = o.quorum_size {
            self.quorum_size = v;
        }
        if let Some(v) = o.digest {
            self.digest = v;
        }
        if let Some(v) = o.password {
            self.password = v;
        }
        if let Some(v) = o.payload {
            self.payload = v;
        }
        if let Some(v) = o.append_count {
            self.append_count = v;
        }
    }

    /// Checks the bridge itself depends on. Quorum against ensemble is
    /// left to the cluster.
    pub fn validate(&self) -> Result<(), SettingsError> {
        for (field, value) in [
            ("ensemble_size", self.ensemble_size),
            ("quorum_size", self.quorum_size),
        ] {
            if value <= 0 {
                return Err(SettingsError::NotPositive { field, value });
            }
        }
        Ok(())
    }
}
