//! The built-in deployment plan for the DeFi suite.
//!
//! Seven components: a wrapped-BTC token, a price oracle, a governance
//! token, a collateralized stablecoin, an AMM exchange, an aggregator
//! oracle, and a payment gateway. The wiring afterwards seeds the initial
//! price, hands the token's mint authority to the exchange, registers the
//! oracle as the aggregator's price source, and optionally registers a
//! merchant with the gateway.

use std::path::PathBuf;

use alloy_core::primitives::{Address, U256};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::abi;
use crate::plan::{ComponentSpec, DeploymentPlan, Slot, WiringStep};

/// The default name for the suite configuration file.
pub const SUITE_CONFIG_FILENAME: &str = "Tangelo.toml";

/// Component names. Stable across runs; off-chain consumers key on them.
pub const CBTC: &str = "cbtc";
pub const PRICE_ORACLE: &str = "price-oracle";
pub const CGOV: &str = "cgov";
pub const STABLECOIN: &str = "stablecoin";
pub const AMM_DEX: &str = "amm-dex";
pub const AGGREGATOR_ORACLE: &str = "aggregator-oracle";
pub const PAYMENT_GATEWAY: &str = "payment-gateway";

/// Network and protocol parameters for the suite.
///
/// Serialized to TOML alongside the run ledger so a resumed run sees the
/// exact configuration that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SuiteConfig {
    /// Chain-provided light client system contract.
    pub light_client: Address,
    /// Chain-provided bridge system contract.
    pub bridge: Address,
    /// Price seeded into the oracle for the wrapped token, 18 decimals.
    pub initial_cbtc_price: U256,
    /// Stablecoin collateral ratio, 18 decimals.
    pub collateral_ratio: U256,
    /// Stablecoin stability fee, basis points.
    pub stability_fee_bps: u64,
    /// Exchange swap fee, basis points.
    pub swap_fee_bps: u64,
    /// Exchange protocol fee, basis points.
    pub protocol_fee_bps: u64,
    /// Merchant registered with the payment gateway; skipped when absent.
    pub merchant_label: Option<String>,
}

impl Default for SuiteConfig {
    fn default() -> Self {
        let one = U256::from(1_000_000_000_000_000_000u64);
        Self {
            // System contract addresses from the testnet documentation.
            light_client: Address::with_last_byte(0x01),
            bridge: Address::with_last_byte(0x02),
            initial_cbtc_price: one,
            collateral_ratio: one,
            stability_fee_bps: 200,
            swap_fee_bps: 30,
            protocol_fee_bps: 10,
            merchant_label: Some("merchant123".to_string()),
        }
    }
}

impl SuiteConfig {
    /// Save the configuration to a TOML file.
    pub fn save_to_file(&self, path: &PathBuf) -> Result<()> {
        let content =
            toml::to_string_pretty(self).context("Failed to serialize suite config to TOML")?;
        std::fs::write(path, content)
            .context(format!("Failed to write config to {}", path.display()))?;
        tracing::info!(path = %path.display(), "Configuration saved");
        Ok(())
    }

    /// Load the configuration from a TOML file.
    pub fn load_from_file(path: &PathBuf) -> Result<Self> {
        if !path.exists() {
            return Err(anyhow::anyhow!(
                "Configuration file or directory not found: {}",
                path.display()
            ));
        }

        let config_path = if path.is_dir() {
            path.join(SUITE_CONFIG_FILENAME)
        } else {
            path.to_path_buf()
        };

        let content = std::fs::read_to_string(&config_path)
            .context(format!("Failed to read config from {}", path.display()))?;
        let config: Self =
            toml::from_str(&content).context("Failed to parse config file as TOML")?;
        tracing::info!(path = %path.display(), "Configuration loaded");
        Ok(config)
    }

    /// Build the suite's deployment plan.
    pub fn plan(&self) -> Result<DeploymentPlan> {
        let mut gateway = ComponentSpec::new(PAYMENT_GATEWAY)
            .arg(Slot::Component(STABLECOIN.to_string()))
            .arg(Slot::Component(CBTC.to_string()))
            .arg(Slot::Component(AGGREGATOR_ORACLE.to_string()))
            .arg(Slot::Component(AMM_DEX.to_string()));
        if self.merchant_label.is_some() {
            gateway = gateway.wired();
        }

        let components = vec![
            ComponentSpec::new(CBTC).wired(),
            ComponentSpec::new(PRICE_ORACLE).wired(),
            ComponentSpec::new(CGOV),
            ComponentSpec::new(STABLECOIN)
                .arg(Slot::Component(CBTC.to_string()))
                .arg(Slot::Uint(self.collateral_ratio))
                .arg(Slot::Component(PRICE_ORACLE.to_string()))
                .arg(Slot::Uint(U256::from(self.stability_fee_bps))),
            ComponentSpec::new(AMM_DEX)
                .arg(Slot::Component(CBTC.to_string()))
                .arg(Slot::Component(STABLECOIN.to_string()))
                .arg(Slot::Address(self.light_client))
                .arg(Slot::Address(self.bridge))
                .arg(Slot::Component(PRICE_ORACLE.to_string()))
                .arg(Slot::Component(CGOV.to_string()))
                .arg(Slot::Uint(U256::from(self.swap_fee_bps)))
                .arg(Slot::Uint(U256::from(self.protocol_fee_bps)))
                .arg(Slot::Deployer),
            ComponentSpec::new(AGGREGATOR_ORACLE)
                .arg(Slot::Deployer)
                .wired(),
            gateway,
        ];

        let mut wiring = vec![
            WiringStep::new(
                "seed-cbtc-price",
                PRICE_ORACLE,
                "setPrice(address,uint256)",
            )
            .arg(Slot::Component(CBTC.to_string()))
            .arg(Slot::Uint(self.initial_cbtc_price)),
            WiringStep::new(
                "transfer-cbtc-ownership",
                CBTC,
                "transferOwnership(address)",
            )
            .arg(Slot::Component(AMM_DEX.to_string())),
            WiringStep::new(
                "register-cbtc-price-source",
                AGGREGATOR_ORACLE,
                "addOracle(address,address)",
            )
            .arg(Slot::Component(CBTC.to_string()))
            .arg(Slot::Component(PRICE_ORACLE.to_string())),
        ];

        if let Some(label) = &self.merchant_label {
            let merchant_id = abi::bytes32_label(label)
                .with_context(|| format!("Invalid merchant label `{label}`"))?;
            wiring.push(
                WiringStep::new(
                    "register-merchant",
                    PAYMENT_GATEWAY,
                    "registerMerchant(bytes32,address)",
                )
                .arg(Slot::Bytes32(merchant_id))
                .arg(Slot::Deployer),
            );
        }

        DeploymentPlan::build(components, wiring).context("Suite plan failed validation")
    }
}
