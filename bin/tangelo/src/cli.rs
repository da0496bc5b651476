use std::path::PathBuf;

use alloy_core::primitives::Address;
use clap::Parser;
use tracing::level_filters::LevelFilter;
use url::Url;

#[derive(Parser)]
#[command(name = "tangelo")]
#[command(
    author,
    version,
    about = "Deploy and wire the tangelo DeFi suite onto an EVM chain"
)]
pub struct Cli {
    /// The verbosity level.
    #[arg(short, long, env = "TANGELO_VERBOSITY", default_value_t = LevelFilter::INFO)]
    pub verbosity: LevelFilter,

    /// The URL of the target network's JSON-RPC endpoint.
    #[arg(long, alias = "rpc", env = "TANGELO_RPC_URL")]
    pub rpc_url: Url,

    /// The deploying identity: an account unlocked on the endpoint, which
    /// signs every construction and wiring call and receives the
    /// administrative roles the suite assigns to its deployer.
    #[arg(long, env = "TANGELO_FROM")]
    pub from: Address,

    /// The path to the output data directory (run ledger + saved config).
    #[arg(long, env = "TANGELO_OUTDATA", default_value = "tangelo-data")]
    pub outdata: PathBuf,

    /// Directory of init-bytecode artifacts, one `<component>.hex` per
    /// component.
    #[arg(long, env = "TANGELO_ARTIFACTS", default_value = "artifacts")]
    pub artifacts: PathBuf,

    /// Path to a custom deployment plan (TOML). When provided, it replaces
    /// the built-in suite plan.
    #[arg(long, env = "TANGELO_PLAN")]
    pub plan: Option<PathBuf>,

    /// Path to a suite configuration file to load instead of the defaults.
    ///
    /// Ignored when --plan is provided.
    #[arg(long, alias = "conf", env = "TANGELO_CONFIG")]
    pub config: Option<PathBuf>,

    /// Blocks on top of the inclusion block before an effect counts as
    /// irreversible.
    #[arg(long, env = "TANGELO_CONFIRMATIONS", default_value_t = 2)]
    pub confirmations: u64,

    /// Seconds between confirmation polls.
    #[arg(long, env = "TANGELO_POLL_INTERVAL", default_value_t = 2)]
    pub poll_interval_secs: u64,

    /// Upper bound on confirmation polls per transaction before the run
    /// gives up on it (the step stays pending and is re-checked next run).
    #[arg(long, env = "TANGELO_MAX_POLLS", default_value_t = 60)]
    pub max_polls: u32,

    /// Operator override: reset a previously failed step so this run
    /// re-attempts it. May be given multiple times. Step ids look like
    /// `deploy:cbtc` or `wire:register-merchant`.
    #[arg(long, value_name = "STEP_ID")]
    pub retry_failed: Vec<String>,
}
