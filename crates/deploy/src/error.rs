//! Failure taxonomy for steps that touch the network.
//!
//! Plan validation errors live with the plan ([`crate::PlanError`]) and are
//! raised before any network interaction. The variants here describe what can
//! go wrong once a step executes, and each maps to a distinct ledger
//! disposition: slot and artifact problems abort before submission,
//! submission rejections leave the step retryable, timeouts leave it pending
//! for the next run to re-check, and on-chain reverts are terminal.

use alloy_core::primitives::B256;

use crate::artifacts::ArtifactError;
use crate::chain::ChainError;
use crate::ledger::LedgerError;
use crate::registry::RegistryError;

#[derive(Debug, thiserror::Error)]
pub enum StepError {
    /// A slot references a component with no recorded address. Indicates a
    /// plan-ordering bug; fatal for the run.
    #[error("slot references `{0}`, which has no recorded address")]
    SlotUnresolved(String),

    /// A wiring step targets a component with no recorded address.
    #[error("wiring target `{0}` has no recorded address")]
    TargetNotDeployed(String),

    /// Init bytecode for a component could not be loaded.
    #[error("artifact for `{component}` could not be loaded")]
    Artifact {
        component: String,
        #[source]
        source: ArtifactError,
    },

    /// The network rejected the transaction before it entered the chain.
    /// The step stays pending and is safe to retry once the cause is fixed.
    #[error("submission rejected by the network")]
    Submission(#[source] ChainError),

    /// The bounded confirmation wait elapsed with the outcome still unknown.
    /// The step stays pending; the next run re-checks the recorded
    /// transaction before deciding whether to resubmit.
    #[error("no confirmation for {tx_hash} after {polls} polls")]
    ConfirmationTimeout { tx_hash: B256, polls: u32 },

    /// The transaction executed on-chain and failed. Terminal for the step;
    /// operator intervention required.
    #[error("transaction {tx_hash} reverted on-chain")]
    Reverted { tx_hash: B256 },

    /// A deployment receipt came back successful but without a contract
    /// address.
    #[error("deployment receipt for {tx_hash} carries no contract address")]
    MissingContractAddress { tx_hash: B256 },

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    Registry(#[from] RegistryError),
}
