//! Deployment plan: component descriptors, wiring steps, and their
//! evaluation order.
//!
//! A plan is validated once, up front, before anything touches the network.
//! [`DeploymentPlan::build`] checks that every reference names a component in
//! the plan, that wiring calls match their method signatures, and that the
//! constructor reference graph is acyclic, then fixes a deterministic
//! deployment order. Downstream consumers of the resulting addresses expect
//! that order to be stable between environments, so ties between independent
//! components are always broken by declaration order.

use alloy_core::primitives::{Address, B256, U256};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::abi;
use crate::error::StepError;
use crate::registry::AddressRegistry;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum PlanError {
    #[error("component `{0}` is declared more than once")]
    DuplicateComponent(String),

    #[error("wiring step `{0}` is declared more than once")]
    DuplicateWiringStep(String),

    #[error("`{referrer}` references `{reference}`, which is not a component in this plan")]
    UnknownReference { referrer: String, reference: String },

    #[error("wiring step `{step}` has a malformed method signature `{signature}`")]
    MalformedSignature { step: String, signature: String },

    #[error(
        "wiring step `{step}` passes {got} argument(s) but `{signature}` takes {expected}"
    )]
    ArityMismatch {
        step: String,
        signature: String,
        expected: usize,
        got: usize,
    },

    #[error("component `{0}` requires wiring but no wiring step targets it")]
    MissingWiring(String),

    #[error("component `{0}` participates in a constructor dependency cycle")]
    CycleDetected(String),
}

/// One constructor or call argument.
///
/// Every variant resolves to a single static 32-byte ABI word.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Slot {
    /// Literal address, e.g. a chain-provided system contract.
    Address(Address),
    /// Literal unsigned 256-bit value.
    Uint(U256),
    /// Literal 32-byte value.
    Bytes32(B256),
    /// The confirmed address of another component in the plan.
    Component(String),
    /// The deploying identity's address.
    Deployer,
}

impl Slot {
    /// The component this slot references, if any.
    pub fn component_ref(&self) -> Option<&str> {
        match self {
            Slot::Component(name) => Some(name),
            _ => None,
        }
    }

    /// Resolve the slot to its ABI word.
    pub fn resolve(
        &self,
        registry: &AddressRegistry,
        deployer: Address,
    ) -> Result<B256, StepError> {
        match self {
            Slot::Address(address) => Ok(abi::encode_address(*address)),
            Slot::Uint(value) => Ok(abi::encode_uint(*value)),
            Slot::Bytes32(word) => Ok(*word),
            Slot::Component(name) => registry
                .lookup(name)
                .map(abi::encode_address)
                .ok_or_else(|| StepError::SlotUnresolved(name.clone())),
            Slot::Deployer => Ok(abi::encode_address(deployer)),
        }
    }
}

/// One deployable on-chain unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentSpec {
    /// Unique name, stable across runs; also the default artifact stem.
    pub name: String,
    /// Artifact stem naming the init-bytecode file, when it differs from
    /// the component name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifact: Option<String>,
    /// Constructor arguments, in ABI order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub constructor: Vec<Slot>,
    /// Whether the component expects post-deploy configuration calls.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub requires_wiring: bool,
}

impl ComponentSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            artifact: None,
            constructor: Vec::new(),
            requires_wiring: false,
        }
    }

    /// Append a constructor argument.
    pub fn arg(mut self, slot: Slot) -> Self {
        self.constructor.push(slot);
        self
    }

    /// Mark the component as requiring post-deploy wiring.
    pub fn wired(mut self) -> Self {
        self.requires_wiring = true;
        self
    }

    pub fn artifact_stem(&self) -> &str {
        self.artifact.as_deref().unwrap_or(&self.name)
    }
}

/// A post-deployment configuration call connecting already-deployed
/// components.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WiringStep {
    /// Unique name, stable across runs.
    pub name: String,
    /// Component whose method is called.
    pub target: String,
    /// Canonical method signature, e.g. `"setPrice(address,uint256)"`.
    pub method: String,
    /// Call arguments, in ABI order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<Slot>,
}

impl WiringStep {
    pub fn new(
        name: impl Into<String>,
        target: impl Into<String>,
        method: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            target: target.into(),
            method: method.into(),
            args: Vec::new(),
        }
    }

    /// Append a call argument.
    pub fn arg(mut self, slot: Slot) -> Self {
        self.args.push(slot);
        self
    }
}

/// A validated set of components and wiring steps with a fixed evaluation
/// order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeploymentPlan {
    components: Vec<ComponentSpec>,
    wiring: Vec<WiringStep>,
    /// Indices into `components` in deployment order.
    #[serde(skip)]
    order: Vec<usize>,
}

#[derive(Deserialize)]
struct RawPlan {
    #[serde(default)]
    components: Vec<ComponentSpec>,
    #[serde(default)]
    wiring: Vec<WiringStep>,
}

impl<'de> Deserialize<'de> for DeploymentPlan {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = RawPlan::deserialize(deserializer)?;
        DeploymentPlan::build(raw.components, raw.wiring).map_err(serde::de::Error::custom)
    }
}

impl DeploymentPlan {
    /// Validate descriptors and wiring steps and fix the deployment order.
    pub fn build(
        components: Vec<ComponentSpec>,
        wiring: Vec<WiringStep>,
    ) -> Result<Self, PlanError> {
        let mut names = std::collections::BTreeSet::new();
        for component in &components {
            if !names.insert(component.name.as_str()) {
                return Err(PlanError::DuplicateComponent(component.name.clone()));
            }
        }

        for component in &components {
            for slot in &component.constructor {
                if let Some(reference) = slot.component_ref() {
                    if !names.contains(reference) {
                        return Err(PlanError::UnknownReference {
                            referrer: component.name.clone(),
                            reference: reference.to_string(),
                        });
                    }
                }
            }
        }

        let mut step_names = std::collections::BTreeSet::new();
        for step in &wiring {
            if !step_names.insert(step.name.as_str()) {
                return Err(PlanError::DuplicateWiringStep(step.name.clone()));
            }
            if !names.contains(step.target.as_str()) {
                return Err(PlanError::UnknownReference {
                    referrer: step.name.clone(),
                    reference: step.target.clone(),
                });
            }
            for slot in &step.args {
                if let Some(reference) = slot.component_ref() {
                    if !names.contains(reference) {
                        return Err(PlanError::UnknownReference {
                            referrer: step.name.clone(),
                            reference: reference.to_string(),
                        });
                    }
                }
            }
            let expected =
                abi::arity(&step.method).ok_or_else(|| PlanError::MalformedSignature {
                    step: step.name.clone(),
                    signature: step.method.clone(),
                })?;
            if expected != step.args.len() {
                return Err(PlanError::ArityMismatch {
                    step: step.name.clone(),
                    signature: step.method.clone(),
                    expected,
                    got: step.args.len(),
                });
            }
        }

        for component in &components {
            if component.requires_wiring
                && !wiring.iter().any(|step| step.target == component.name)
            {
                return Err(PlanError::MissingWiring(component.name.clone()));
            }
        }

        let order = topological_order(&components)?;

        Ok(Self {
            components,
            wiring,
            order,
        })
    }

    pub fn components(&self) -> &[ComponentSpec] {
        &self.components
    }

    pub fn wiring(&self) -> &[WiringStep] {
        &self.wiring
    }

    pub fn component(&self, name: &str) -> Option<&ComponentSpec> {
        self.components.iter().find(|c| c.name == name)
    }

    /// Components in deployment order: every component appears strictly
    /// after everything it references.
    pub fn order(&self) -> impl Iterator<Item = &ComponentSpec> {
        self.order.iter().map(|&index| &self.components[index])
    }

    /// SHA-256 over the canonical JSON serialization. Recorded in the run
    /// ledger so a resume against a different plan is refused.
    pub fn fingerprint(&self) -> String {
        let json = serde_json::to_string(self)
            .expect("plan serialization should never fail");
        let mut hasher = Sha256::new();
        hasher.update(json.as_bytes());
        hex::encode(hasher.finalize())
    }
}

/// Kahn's algorithm with the ready set scanned in declaration order, so the
/// order is total, deterministic, and reproducible across runs.
fn topological_order(components: &[ComponentSpec]) -> Result<Vec<usize>, PlanError> {
    let index_of: std::collections::BTreeMap<&str, usize> = components
        .iter()
        .enumerate()
        .map(|(index, component)| (component.name.as_str(), index))
        .collect();

    // references[i] holds the distinct components that component i references.
    let references: Vec<std::collections::BTreeSet<usize>> = components
        .iter()
        .map(|component| {
            component
                .constructor
                .iter()
                .filter_map(|slot| slot.component_ref())
                .map(|name| index_of[name])
                .collect()
        })
        .collect();

    let mut order = Vec::with_capacity(components.len());
    let mut placed = vec![false; components.len()];

    while order.len() < components.len() {
        let next = components.iter().enumerate().position(|(index, _)| {
            !placed[index] && references[index].iter().all(|&dep| placed[dep])
        });
        match next {
            Some(index) => {
                placed[index] = true;
                order.push(index);
            }
            None => {
                let stuck = components
                    .iter()
                    .enumerate()
                    .find(|(index, _)| !placed[*index])
                    .map(|(_, component)| component.name.clone())
                    .expect("an unplaced component exists when ordering is stuck");
                return Err(PlanError::CycleDetected(stuck));
            }
        }
    }

    Ok(order)
}
