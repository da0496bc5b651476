//! Confirmed on-chain addresses, keyed by component name.

use std::collections::BTreeMap;

use alloy_core::primitives::Address;
use derive_more::Deref;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("address for `{0}` is already recorded")]
    AlreadyRecorded(String),
}

/// Mapping from component name to its confirmed address.
///
/// Populated exactly once per component and immutable thereafter for the
/// life of a run; later steps read it to resolve constructor and wiring
/// slots. Mutated only by the orchestrator thread.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deref)]
pub struct AddressRegistry {
    #[deref]
    entries: BTreeMap<String, Address>,
}

impl AddressRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a confirmed address. Each name accepts exactly one write.
    pub fn record(
        &mut self,
        name: impl Into<String>,
        address: Address,
    ) -> Result<(), RegistryError> {
        let name = name.into();
        if self.entries.contains_key(&name) {
            return Err(RegistryError::AlreadyRecorded(name));
        }
        self.entries.insert(name, address);
        Ok(())
    }

    pub fn lookup(&self, name: &str) -> Option<Address> {
        self.entries.get(name).copied()
    }
}
