//! Post-deploy configuration calls.
//!
//! Wiring runs strictly sequentially, in declared order: later steps may
//! depend on state mutated by earlier ones (an authority transfer must
//! follow the configuration calls that needed the prior authority), so no
//! call is submitted before its predecessor confirms.

use alloy_core::primitives::{Address, B256};

use crate::abi;
use crate::chain::{ChainClient, ConfirmationPolicy, TxStatus, settle};
use crate::deployer::pending_submission;
use crate::error::StepError;
use crate::ledger::{RunLedger, wire_step};
use crate::plan::WiringStep;
use crate::registry::AddressRegistry;

/// Executes wiring steps against already-deployed components.
pub struct WiringExecutor<'a, C> {
    chain: &'a C,
    sender: Address,
    policy: ConfirmationPolicy,
}

impl<'a, C: ChainClient> WiringExecutor<'a, C> {
    pub fn new(chain: &'a C, sender: Address, policy: ConfirmationPolicy) -> Self {
        Self {
            chain,
            sender,
            policy,
        }
    }

    /// Execute one wiring step and wait for irreversible confirmation.
    pub async fn execute(
        &self,
        step: &WiringStep,
        registry: &AddressRegistry,
        ledger: &mut RunLedger,
    ) -> Result<(), StepError> {
        let step_id = wire_step(&step.name);

        let target = registry
            .lookup(&step.target)
            .ok_or_else(|| StepError::TargetNotDeployed(step.target.clone()))?;
        let words = step
            .args
            .iter()
            .map(|slot| slot.resolve(registry, self.sender))
            .collect::<Result<Vec<B256>, StepError>>()?;
        let calldata = abi::encode_call(&step.method, &words);

        // Same resume discipline as deployments: re-check a submission whose
        // outcome is unknown before considering a resubmission.
        let tx_hash = match pending_submission(ledger, &step_id) {
            Some(prior) => match self.chain.transaction_status(prior).await {
                Ok(TxStatus::Unknown) => {
                    tracing::warn!(
                        step = %step.name,
                        tx = %prior,
                        "Pending call was dropped by the network, resubmitting"
                    );
                    self.submit(&step_id, step, target, calldata, ledger).await?
                }
                _ => {
                    tracing::info!(
                        step = %step.name,
                        tx = %prior,
                        "Re-checking pending call from a previous run"
                    );
                    prior
                }
            },
            None => self.submit(&step_id, step, target, calldata, ledger).await?,
        };

        match settle(self.chain, tx_hash, &self.policy).await {
            Ok(confirmation) => {
                ledger.confirm(&step_id, None)?;
                tracing::info!(
                    step = %step.name,
                    target = %target,
                    confirmations = confirmation.confirmations,
                    "Wiring step confirmed"
                );
                Ok(())
            }
            Err(e @ StepError::Reverted { .. }) => {
                ledger.fail(&step_id, "call reverted on-chain")?;
                Err(e)
            }
            Err(e) => Err(e),
        }
    }

    async fn submit(
        &self,
        step_id: &str,
        step: &WiringStep,
        target: Address,
        calldata: alloy_core::primitives::Bytes,
        ledger: &mut RunLedger,
    ) -> Result<B256, StepError> {
        ledger.begin(step_id)?;
        let tx_hash = self
            .chain
            .submit_call(self.sender, target, calldata)
            .await
            .map_err(StepError::Submission)?;
        ledger.record_submission(step_id, tx_hash)?;
        tracing::info!(step = %step.name, method = %step.method, tx = %tx_hash, "Call submitted");
        Ok(tx_hash)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::mock::{MockChain, Script};
    use crate::ledger::{LEDGER_FILENAME, StepStatus};
    use crate::plan::Slot;
    use std::time::Duration;
    use tempdir::TempDir;

    const SENDER: Address = Address::with_last_byte(0xFE);

    fn policy() -> ConfirmationPolicy {
        ConfirmationPolicy {
            confirmations: 1,
            max_polls: 3,
            poll_interval: Duration::ZERO,
        }
    }

    fn ledger_in(dir: &TempDir) -> RunLedger {
        RunLedger::open(dir.path().join(LEDGER_FILENAME), "fp").unwrap()
    }

    #[tokio::test]
    async fn test_execute_resolves_and_confirms() {
        let dir = TempDir::new("tangelo-wiring").expect("Failed to create temp dir");
        let mut ledger = ledger_in(&dir);
        let chain = MockChain::new();

        let oracle = Address::with_last_byte(0x11);
        let token = Address::with_last_byte(0x22);
        let mut registry = AddressRegistry::new();
        registry.record("price-oracle", oracle).unwrap();
        registry.record("cbtc", token).unwrap();

        let step = WiringStep::new(
            "seed-cbtc-price",
            "price-oracle",
            "setPrice(address,uint256)",
        )
        .arg(Slot::Component("cbtc".to_string()))
        .arg(Slot::Uint(alloy_core::primitives::U256::from(
            1_000_000_000_000_000_000u64,
        )));

        let executor = WiringExecutor::new(&chain, SENDER, policy());
        executor.execute(&step, &registry, &mut ledger).await.unwrap();

        assert_eq!(ledger.status("wire:seed-cbtc-price"), StepStatus::Confirmed);

        let submissions = chain.submissions();
        assert_eq!(submissions.len(), 1);
        assert_eq!(submissions[0].to, Some(oracle));
        // Selector, token address word, price word.
        assert_eq!(
            &submissions[0].data[..4],
            abi::selector("setPrice(address,uint256)").as_slice()
        );
        assert_eq!(submissions[0].data.len(), 4 + 64);
        assert_eq!(submissions[0].data[35], 0x22);
    }

    #[tokio::test]
    async fn test_target_not_deployed() {
        let dir = TempDir::new("tangelo-wiring").expect("Failed to create temp dir");
        let mut ledger = ledger_in(&dir);
        let chain = MockChain::new();
        let registry = AddressRegistry::new();

        let step = WiringStep::new("w", "ghost", "poke()");
        let executor = WiringExecutor::new(&chain, SENDER, policy());
        let err = executor
            .execute(&step, &registry, &mut ledger)
            .await
            .unwrap_err();

        assert!(matches!(err, StepError::TargetNotDeployed(name) if name == "ghost"));
        assert!(chain.submissions().is_empty());
        assert_eq!(ledger.status("wire:w"), StepStatus::Unstarted);
    }

    #[tokio::test]
    async fn test_reverted_call_marks_step_failed() {
        let dir = TempDir::new("tangelo-wiring").expect("Failed to create temp dir");
        let mut ledger = ledger_in(&dir);
        let chain = MockChain::new();
        chain.script([Script::Revert]);

        let mut registry = AddressRegistry::new();
        registry
            .record("cbtc", Address::with_last_byte(0x22))
            .unwrap();

        let step = WiringStep::new("transfer", "cbtc", "transferOwnership(address)")
            .arg(Slot::Deployer);
        let executor = WiringExecutor::new(&chain, SENDER, policy());
        let err = executor
            .execute(&step, &registry, &mut ledger)
            .await
            .unwrap_err();

        assert!(matches!(err, StepError::Reverted { .. }));
        assert_eq!(ledger.status("wire:transfer"), StepStatus::Failed);
    }
}
