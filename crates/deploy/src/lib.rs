//! tangelo-deploy - Deployment orchestration for the tangelo DeFi suite.
//!
//! This crate deploys a set of interdependent on-chain components in
//! dependency order, wires them together with post-deploy configuration
//! calls, and keeps a durable run ledger so an interrupted run resumes from
//! the first unconfirmed step instead of starting over.

pub mod abi;

mod artifacts;
pub use artifacts::{ArtifactError, ArtifactStore};

mod chain;
pub use chain::{
    ChainClient, ChainError, ConfirmationPolicy, HttpChain, TxConfirmation, TxStatus, TxWait,
    await_confirmation,
};

mod deployer;
pub use deployer::ComponentDeployer;

mod error;
pub use error::StepError;

mod ledger;
pub use ledger::{
    LEDGER_FILENAME, LedgerError, RunLedger, StepRecord, StepStatus, deploy_step, wire_step,
};

mod orchestrator;
pub use orchestrator::{Orchestrator, RunSummary};

mod plan;
pub use plan::{ComponentSpec, DeploymentPlan, PlanError, Slot, WiringStep};

mod registry;
pub use registry::{AddressRegistry, RegistryError};

pub mod suite;

mod wiring;
pub use wiring::WiringExecutor;
