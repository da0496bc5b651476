//! Durable per-step progress tracking.
//!
//! The ledger is a JSON file in the run's output directory, persisted after
//! every transition. It — not in-memory state or wall-clock time — is the
//! sole source of truth for "has this already happened" across process
//! restarts. An exclusive advisory lock on the file enforces the
//! single-writer discipline for the duration of a run.

use std::collections::BTreeMap;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use alloy_core::primitives::{Address, B256};
use chrono::{DateTime, Utc};
use fs2::FileExt;
use serde::{Deserialize, Serialize};

/// The default file name for the run ledger.
pub const LEDGER_FILENAME: &str = "ledger.json";

/// Ledger key for a component deployment.
pub fn deploy_step(component: &str) -> String {
    format!("deploy:{component}")
}

/// Ledger key for a wiring call.
pub fn wire_step(step: &str) -> String {
    format!("wire:{step}")
}

/// Per-step state machine: `unstarted -> pending -> {confirmed | failed}`.
///
/// `pending` is the only state a crashed run can resume from; `confirmed`
/// and `failed` are terminal for the step.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[strum(serialize_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum StepStatus {
    Unstarted,
    Pending,
    Confirmed,
    Failed,
}

/// One record per attempted step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepRecord {
    pub status: StepStatus,
    /// Hash of the submitted transaction, once known. A pending record with
    /// a hash means the outcome is unknown and must be re-checked against
    /// the chain, never blindly resubmitted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tx_hash: Option<B256>,
    /// Resulting address, for confirmed deployments.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<Address>,
    /// Operator-facing reason, for failed steps.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("step `{0}` is already confirmed")]
    AlreadyConfirmed(String),

    #[error("step `{0}` previously failed; reset it explicitly to retry")]
    BeginOnFailed(String),

    #[error("step `{0}` is confirmed; confirmed steps cannot be reset")]
    ResetOfConfirmed(String),

    #[error(
        "ledger at {path} was written for a different plan \
         (recorded fingerprint {recorded}, current plan {current})"
    )]
    PlanMismatch {
        path: PathBuf,
        recorded: String,
        current: String,
    },

    #[error("another orchestrator holds the ledger at {0}")]
    Locked(PathBuf),

    #[error("failed to open ledger at {path}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("ledger at {path} is not valid JSON")]
    Malformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to persist ledger at {path}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct LedgerState {
    /// Fingerprint of the plan this ledger belongs to.
    plan_fingerprint: String,
    steps: BTreeMap<String, StepRecord>,
}

/// Durable run ledger, exclusively owned for the life of the value.
#[derive(Debug)]
pub struct RunLedger {
    path: PathBuf,
    state: LedgerState,
    /// Keeps the advisory lock alive; released on drop.
    _lock: File,
}

impl RunLedger {
    /// Open (or create) the ledger at `path`, locking it for exclusive use.
    ///
    /// A non-empty ledger must carry `plan_fingerprint`; resuming a run
    /// against a different plan would misapply recorded addresses.
    pub fn open(path: impl Into<PathBuf>, plan_fingerprint: &str) -> Result<Self, LedgerError> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| LedgerError::Open {
                path: path.clone(),
                source,
            })?;
        }

        let lock = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .map_err(|source| LedgerError::Open {
                path: path.clone(),
                source,
            })?;
        lock.try_lock_exclusive()
            .map_err(|_| LedgerError::Locked(path.clone()))?;

        let raw = std::fs::read_to_string(&path).map_err(|source| LedgerError::Open {
            path: path.clone(),
            source,
        })?;

        let ledger = if raw.trim().is_empty() {
            let ledger = Self {
                path,
                state: LedgerState {
                    plan_fingerprint: plan_fingerprint.to_string(),
                    steps: BTreeMap::new(),
                },
                _lock: lock,
            };
            tracing::info!(path = %ledger.path.display(), "Created run ledger");
            ledger
        } else {
            let state: LedgerState =
                serde_json::from_str(&raw).map_err(|source| LedgerError::Malformed {
                    path: path.clone(),
                    source,
                })?;
            if state.plan_fingerprint != plan_fingerprint {
                return Err(LedgerError::PlanMismatch {
                    path,
                    recorded: state.plan_fingerprint,
                    current: plan_fingerprint.to_string(),
                });
            }
            let ledger = Self {
                path,
                state,
                _lock: lock,
            };
            tracing::info!(
                path = %ledger.path.display(),
                steps = ledger.state.steps.len(),
                "Loaded run ledger"
            );
            ledger
        };

        ledger.persist()?;
        Ok(ledger)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn plan_fingerprint(&self) -> &str {
        &self.state.plan_fingerprint
    }

    pub fn status(&self, step: &str) -> StepStatus {
        self.state
            .steps
            .get(step)
            .map(|record| record.status)
            .unwrap_or(StepStatus::Unstarted)
    }

    pub fn record(&self, step: &str) -> Option<&StepRecord> {
        self.state.steps.get(step)
    }

    /// The confirmed address recorded for a deployment step, if any.
    pub fn confirmed_address(&self, step: &str) -> Option<Address> {
        self.state
            .steps
            .get(step)
            .filter(|record| record.status == StepStatus::Confirmed)
            .and_then(|record| record.address)
    }

    /// Record that a step is being attempted.
    ///
    /// Idempotent for pending steps (the existing record, including any
    /// submitted transaction hash, is preserved).
    pub fn begin(&mut self, step: &str) -> Result<(), LedgerError> {
        match self.status(step) {
            StepStatus::Confirmed => return Err(LedgerError::AlreadyConfirmed(step.to_string())),
            StepStatus::Failed => return Err(LedgerError::BeginOnFailed(step.to_string())),
            StepStatus::Pending => return Ok(()),
            StepStatus::Unstarted => {}
        }
        self.state.steps.insert(
            step.to_string(),
            StepRecord {
                status: StepStatus::Pending,
                tx_hash: None,
                address: None,
                error: None,
                updated_at: Utc::now(),
            },
        );
        self.persist()
    }

    /// Attach the submitted transaction hash to a pending step.
    pub fn record_submission(&mut self, step: &str, tx_hash: B256) -> Result<(), LedgerError> {
        if self.status(step) == StepStatus::Confirmed {
            return Err(LedgerError::AlreadyConfirmed(step.to_string()));
        }
        let record = self
            .state
            .steps
            .entry(step.to_string())
            .or_insert_with(|| StepRecord {
                status: StepStatus::Pending,
                tx_hash: None,
                address: None,
                error: None,
                updated_at: Utc::now(),
            });
        record.status = StepStatus::Pending;
        record.tx_hash = Some(tx_hash);
        record.updated_at = Utc::now();
        self.persist()
    }

    /// Transition a step to confirmed, recording its result.
    pub fn confirm(&mut self, step: &str, address: Option<Address>) -> Result<(), LedgerError> {
        let now = Utc::now();
        let record = self
            .state
            .steps
            .entry(step.to_string())
            .or_insert_with(|| StepRecord {
                status: StepStatus::Pending,
                tx_hash: None,
                address: None,
                error: None,
                updated_at: now,
            });
        record.status = StepStatus::Confirmed;
        record.address = address;
        record.error = None;
        record.updated_at = now;
        self.persist()
    }

    /// Transition a step to failed. Failed steps are never retried silently.
    pub fn fail(&mut self, step: &str, reason: impl Into<String>) -> Result<(), LedgerError> {
        let now = Utc::now();
        let record = self
            .state
            .steps
            .entry(step.to_string())
            .or_insert_with(|| StepRecord {
                status: StepStatus::Pending,
                tx_hash: None,
                address: None,
                error: None,
                updated_at: now,
            });
        record.status = StepStatus::Failed;
        record.error = Some(reason.into());
        record.updated_at = now;
        self.persist()
    }

    /// Operator override: forget a failed or pending step so the next run
    /// re-attempts it. Confirmed steps are immutable; their on-chain effects
    /// cannot be undone.
    pub fn reset(&mut self, step: &str) -> Result<(), LedgerError> {
        if self.status(step) == StepStatus::Confirmed {
            return Err(LedgerError::ResetOfConfirmed(step.to_string()));
        }
        if self.state.steps.remove(step).is_some() {
            tracing::warn!(step = %step, "Step record reset by operator override");
            self.persist()?;
        }
        Ok(())
    }

    fn persist(&self) -> Result<(), LedgerError> {
        let json = serde_json::to_string_pretty(&self.state)
            .expect("ledger state serialization should never fail");
        std::fs::write(&self.path, json).map_err(|source| LedgerError::Write {
            path: self.path.clone(),
            source,
        })
    }
}
