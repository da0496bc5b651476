//! End-to-end orchestration of a deployment plan.
//!
//! The run is fully sequential: each component's constructor may reference
//! addresses of earlier components, and wiring depends on deployment
//! completion, so the dependency graph collapses to a linear critical path.
//! The first fatal step error aborts the run; the ledger and registry are
//! left intact and a subsequent run resumes from the first non-confirmed
//! step. Nothing is ever rolled back.

use alloy_core::primitives::Address;
use anyhow::{Context, Result};
use comfy_table::Table;

use crate::artifacts::ArtifactStore;
use crate::chain::{ChainClient, ConfirmationPolicy};
use crate::deployer::ComponentDeployer;
use crate::ledger::{RunLedger, StepStatus, deploy_step, wire_step};
use crate::plan::DeploymentPlan;
use crate::registry::AddressRegistry;
use crate::wiring::WiringExecutor;

/// Outcome of a completed run.
#[derive(Debug)]
pub struct RunSummary {
    /// Component addresses, in deployment order.
    pub addresses: Vec<(String, Address)>,
    /// Components deployed by this run.
    pub deployed: usize,
    /// Components already confirmed by a previous run.
    pub skipped_deployments: usize,
    /// Wiring steps executed by this run.
    pub wired: usize,
    /// Wiring steps already confirmed by a previous run.
    pub skipped_wiring: usize,
}

impl RunSummary {
    /// Render the final address map for the operator.
    pub fn table(&self) -> Table {
        let mut table = Table::new();
        table.set_header(vec!["component", "address"]);
        for (name, address) in &self.addresses {
            table.add_row(vec![name.clone(), address.to_string()]);
        }
        table
    }
}

/// Drives a validated plan against a chain, resuming from whatever the
/// ledger already records.
pub struct Orchestrator<C> {
    chain: C,
    artifacts: ArtifactStore,
    sender: Address,
    policy: ConfirmationPolicy,
}

impl<C: ChainClient> Orchestrator<C> {
    pub fn new(
        chain: C,
        artifacts: ArtifactStore,
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

    pub async fn run(
        &self,
        plan: &DeploymentPlan,
        ledger: &mut RunLedger,
    ) -> Result<RunSummary> {
        let mut registry = AddressRegistry::new();
        for component in plan.components() {
            if let Some(address) = ledger.confirmed_address(&deploy_step(&component.name)) {
                registry
                    .record(&component.name, address)
                    .context("Failed to rebuild registry from ledger")?;
            }
        }
        if !registry.is_empty() {
            tracing::info!(
                components = registry.len(),
                "Resuming: registry rebuilt from confirmed ledger entries"
            );
        }

        let deployer =
            ComponentDeployer::new(&self.chain, &self.artifacts, self.sender, self.policy.clone());
        let mut deployed = 0usize;
        let mut skipped_deployments = 0usize;
        for spec in plan.order() {
            let step_id = deploy_step(&spec.name);
            match ledger.status(&step_id) {
                StepStatus::Confirmed => {
                    tracing::info!(component = %spec.name, "Already deployed, skipping");
                    skipped_deployments += 1;
                }
                StepStatus::Failed => {
                    bail_failed_step(ledger, &step_id)?;
                }
                StepStatus::Pending | StepStatus::Unstarted => {
                    deployer
                        .deploy(spec, &mut registry, ledger)
                        .await
                        .with_context(|| format!("Failed to deploy `{}`", spec.name))?;
                    deployed += 1;
                }
            }
        }

        let executor = WiringExecutor::new(&self.chain, self.sender, self.policy.clone());
        let mut wired = 0usize;
        let mut skipped_wiring = 0usize;
        for step in plan.wiring() {
            let step_id = wire_step(&step.name);
            match ledger.status(&step_id) {
                StepStatus::Confirmed => {
                    tracing::info!(step = %step.name, "Already wired, skipping");
                    skipped_wiring += 1;
                }
                StepStatus::Failed => {
                    bail_failed_step(ledger, &step_id)?;
                }
                StepStatus::Pending | StepStatus::Unstarted => {
                    executor
                        .execute(step, &registry, ledger)
                        .await
                        .with_context(|| format!("Failed to execute wiring step `{}`", step.name))?;
                    wired += 1;
                }
            }
        }

        let addresses: Vec<(String, Address)> = plan
            .order()
            .filter_map(|spec| {
                registry
                    .lookup(&spec.name)
                    .map(|address| (spec.name.clone(), address))
            })
            .collect();

        tracing::info!(
            deployed,
            skipped_deployments,
            wired,
            skipped_wiring,
            "Run complete"
        );

        Ok(RunSummary {
            addresses,
            deployed,
            skipped_deployments,
            wired,
            skipped_wiring,
        })
    }
}

/// A failed step halts the run until the operator explicitly resets it.
fn bail_failed_step(ledger: &RunLedger, step_id: &str) -> Result<()> {
    let reason = ledger
        .record(step_id)
        .and_then(|record| record.error.clone())
        .unwrap_or_else(|| "no reason recorded".to_string());
    anyhow::bail!(
        "step `{step_id}` failed in a previous run ({reason}); \
         an explicit operator override is required to retry it"
    )
}
