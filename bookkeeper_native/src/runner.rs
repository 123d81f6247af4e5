//! Append driver — one ledger, `append_count` entries, then close.
//!
//! Order of operations:
//!   1. configure, open client, fetch digest token, open ledger
//!      (any failure here ends the run with an error)
//!   2. append the payload `append_count` times; a failed append is
//!      recorded and the loop continues
//!   3. close the ledger, then the client; close failures are recorded
//!      and logged, never returned

use serde::Serialize;
use sha2::{Digest as _, Sha256};
use tracing::{error, info, warn};

use jvm_bridge::{DescriptorCache, ForeignRuntime};

use crate::client::Client;
use crate::configuration::ClientConfiguration;
use crate::digest::{Digest, DigestToken};
use crate::error::ClientError;
use crate::settings::Settings;

/// The result of a single append attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppendOutcome {
    Appended(i64),
    Failed(String),
}

/// Summary of one driver run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunReport {
    pub metadata_service_uri: String,
    pub digest: Digest,
    pub ledger_id: i64,
    pub attempted: u32,
    pub succeeded: u32,
    pub failed: u32,
    pub entry_ids: Vec<i64>,
    pub failures: Vec<String>,
    pub close_errors: Vec<String>,
    /// Lowercase hex SHA-256 of the payload bytes.
    pub payload_sha256: String,
}

impl RunReport {
    fn new(settings: &Settings, ledger_id: i64) -> Self {
        Self {
            metadata_service_uri: settings.metadata_service_uri.clone(),
            digest: settings.digest,
            ledger_id,
            attempted: 0,
            succeeded: 0,
            failed: 0,
            entry_ids: Vec::new(),
            failures: Vec::new(),
            close_errors: Vec::new(),
            payload_sha256: payload_sha256(settings.payload.as_bytes()),
        }
    }

    fn record(&mut self, outcome: &AppendOutcome) {
        self.attempted += 1;
        match outcome {
            AppendOutcome::Appended(id) => {
                self.succeeded += 1;
                self.entry_ids.push(*id);
            }
            AppendOutcome::Failed(message) => {
                self.failed += 1;
                self.failures.push(message.clone());
            }
        }
    }
}

/// Run the append workload described by `settings`.
///
/// `observe` sees every append outcome as it happens.
pub fn run<R, F>(
    cache: &DescriptorCache<R>,
    settings: &Settings,
    mut observe: F,
) -> Result<RunReport, ClientError>
where
    R: ForeignRuntime,
    F: FnMut(&AppendOutcome),
{
    let configuration = ClientConfiguration::configure(cache, &settings.metadata_service_uri)?;
    let mut client = Client::open(&configuration)?;
    let digest = DigestToken::fetch(cache, settings.digest)?;

    let mut report = {
        let mut ledger = client.open_ledger(
            settings.ensemble_size,
            settings.quorum_size,
            &digest,
            settings.password.as_bytes(),
        )?;
        let mut report = RunReport::new(settings, ledger.id());

        let payload = settings.payload.as_bytes();
        for _ in 0..settings.append_count {
            let outcome = match ledger.append(payload) {
                Ok(entry_id) => AppendOutcome::Appended(entry_id),
                Err(err) => {
                    let message = err
                        .foreign_message()
                        .map_or_else(|| err.to_string(), str::to_string);
                    error!("Append error: {message}");
                    AppendOutcome::Failed(message)
                }
            };
            observe(&outcome);
            report.record(&outcome);
        }

        if let Err(err) = ledger.close() {
            warn!(ledger_id = ledger.id(), error = %err, "Ledger close error");
            report.close_errors.push(err.to_string());
        }
        report
    };

    if let Err(err) = client.close() {
        warn!(error = %err, "BookKeeper close error");
        report.close_errors.push(err.to_string());
    }

    info!(
        ledger_id = report.ledger_id,
        succeeded = report.succeeded,
        failed = report.failed,
        "run complete"
    );
    Ok(report)
}

pub fn payload_sha256(payload: &[u8]) -> String {
    Sha256::digest(payload)
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_digest_is_lowercase_hex() {
        assert_eq!(
            payload_sha256(b"hello"),
            "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
        );
        assert_eq!(
            payload_sha256(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn report_counts_outcomes() {
        let mut report = RunReport::new(&Settings::default(), 7);
        report.record(&AppendOutcome::Appended(0));
        report.record(&AppendOutcome::Failed("boom".to_string()));
        report.record(&AppendOutcome::Appended(1));
        assert_eq!((report.attempted, report.succeeded, report.failed), (3, 2, 1));
        assert_eq!(report.entry_ids, vec![0, 1]);
        assert_eq!(report.failures, vec!["boom".to_string()]);
    }
}
