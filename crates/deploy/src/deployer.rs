//! Construct-and-confirm primitive for a single component.

use alloy_core::primitives::{Address, B256, Bytes};

use crate::abi;
use crate::artifacts::ArtifactStore;
use crate::chain::{ChainClient, ConfirmationPolicy, TxStatus, settle};
use crate::error::StepError;
use crate::ledger::{RunLedger, StepStatus, deploy_step};
use crate::plan::ComponentSpec;
use crate::registry::AddressRegistry;

/// Deploys one component: resolves its constructor slots, submits the
/// creation transaction, and waits for irreversible confirmation.
pub struct ComponentDeployer<'a, C> {
    chain: &'a C,
    artifacts: &'a ArtifactStore,
    sender: Address,
    policy: ConfirmationPolicy,
}

impl<'a, C: ChainClient> ComponentDeployer<'a, C> {
    pub fn new(
        chain: &'a C,
        artifacts: &'a ArtifactStore,
        sender: Address,
        policy: ConfirmationPolicy,
    ) -> Self {
        Self {
            chain,
            artifacts,
            sender,
            policy,
        }
    }

    /// Deploy `spec`, recording the resulting address in the registry and
    /// confirming the ledger entry.
    pub async fn deploy(
        &self,
        spec: &ComponentSpec,
        registry: &mut AddressRegistry,
        ledger: &mut RunLedger,
    ) -> Result<Address, StepError> {
        let step_id = deploy_step(&spec.name);

        // Resolve slots and load bytecode before any network traffic, so a
        // plan-ordering bug or a missing artifact aborts cleanly.
        let words = spec
            .constructor
            .iter()
            .map(|slot| slot.resolve(registry, self.sender))
            .collect::<Result<Vec<B256>, StepError>>()?;
        let init_code = self
            .artifacts
            .load(spec.artifact_stem())
            .map_err(|source| StepError::Artifact {
                component: spec.name.clone(),
                source,
            })?;
        let init_code = abi::encode_constructor(&init_code, &words);

        // A pending record with a hash means a prior run submitted and went
        // away with the outcome unknown. Only a transaction the node no
        // longer knows about is safe to resubmit; anything else (including a
        // failed probe) waits on the original submission.
        let tx_hash = match pending_submission(ledger, &step_id) {
            Some(prior) => match self.chain.transaction_status(prior).await {
                Ok(TxStatus::Unknown) => {
                    tracing::warn!(
                        component = %spec.name,
                        tx = %prior,
                        "Pending transaction was dropped by the network, resubmitting"
                    );
                    self.submit(&step_id, spec, init_code, ledger).await?
                }
                _ => {
                    tracing::info!(
                        component = %spec.name,
                        tx = %prior,
                        "Re-checking pending transaction from a previous run"
                    );
                    prior
                }
            },
            None => self.submit(&step_id, spec, init_code, ledger).await?,
        };

        let confirmation = match settle(self.chain, tx_hash, &self.policy).await {
            Ok(confirmation) => confirmation,
            Err(e @ StepError::Reverted { .. }) => {
                ledger.fail(&step_id, "construction reverted on-chain")?;
                return Err(e);
            }
            Err(e) => return Err(e),
        };

        let Some(address) = confirmation.contract_address else {
            let e = StepError::MissingContractAddress { tx_hash };
            ledger.fail(&step_id, e.to_string())?;
            return Err(e);
        };

        registry.record(&spec.name, address)?;
        ledger.confirm(&step_id, Some(address))?;
        tracing::info!(
            component = %spec.name,
            address = %address,
            confirmations = confirmation.confirmations,
            "Component deployed"
        );
        Ok(address)
    }

    async fn submit(
        &self,
        step_id: &str,
        spec: &ComponentSpec,
        init_code: Bytes,
        ledger: &mut RunLedger,
    ) -> Result<B256, StepError> {
        ledger.begin(step_id)?;
        let tx_hash = self
            .chain
            .submit_deployment(self.sender, init_code)
            .await
            .map_err(StepError::Submission)?;
        ledger.record_submission(step_id, tx_hash)?;
        tracing::info!(component = %spec.name, tx = %tx_hash, "Deployment submitted");
        Ok(tx_hash)
    }
}

/// The transaction hash of a step left pending by a previous run, if any.
pub(crate) fn pending_submission(ledger: &RunLedger, step_id: &str) -> Option<B256> {
    ledger
        .record(step_id)
        .filter(|record| record.status == StepStatus::Pending)
        .and_then(|record| record.tx_hash)
}
