//! tangelo is a CLI tool that deploys and wires a DeFi contract suite onto
//! an EVM chain in a single idempotent, resumable run.

mod cli;

use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;

use cli::Cli;
use tangelo_deploy::suite::{SUITE_CONFIG_FILENAME, SuiteConfig};
use tangelo_deploy::{
    ArtifactStore, ConfirmationPolicy, DeploymentPlan, HttpChain, LEDGER_FILENAME, Orchestrator,
    RunLedger,
};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize the logger.
    tracing_subscriber::fmt()
        .with_max_level(cli.verbosity)
        .init();

    std::fs::create_dir_all(&cli.outdata).context(format!(
        "Failed to create output directory {}",
        cli.outdata.display()
    ))?;

    // Either a custom plan file, or the built-in suite built from its
    // configuration. Validation happens before anything touches the network.
    let plan: DeploymentPlan = if let Some(plan_path) = &cli.plan {
        let raw = std::fs::read_to_string(plan_path)
            .with_context(|| format!("Failed to read plan from {}", plan_path.display()))?;
        toml::from_str(&raw).context("Failed to parse plan file as TOML")?
    } else {
        let config = match &cli.config {
            Some(path) => SuiteConfig::load_from_file(path)?,
            None => SuiteConfig::default(),
        };
        // Save the effective configuration next to the ledger before
        // deploying.
        config.save_to_file(&cli.outdata.join(SUITE_CONFIG_FILENAME))?;
        config.plan()?
    };

    tracing::info!(
        rpc_url = %cli.rpc_url,
        from = %cli.from,
        outdata = %cli.outdata.display(),
        components = plan.components().len(),
        wiring_steps = plan.wiring().len(),
        "Starting deployment run..."
    );

    let mut ledger = RunLedger::open(cli.outdata.join(LEDGER_FILENAME), &plan.fingerprint())?;

    for step in &cli.retry_failed {
        ledger.reset(step)?;
    }

    let chain = HttpChain::new(cli.rpc_url.clone())?;
    let policy = ConfirmationPolicy {
        confirmations: cli.confirmations,
        max_polls: cli.max_polls,
        poll_interval: Duration::from_secs(cli.poll_interval_secs),
    };
    let orchestrator = Orchestrator::new(
        chain,
        ArtifactStore::new(&cli.artifacts),
        cli.from,
        policy,
    );

    let summary = orchestrator.run(&plan, &mut ledger).await?;

    tracing::info!("✓ Deployment complete!");
    println!("{}", summary.table());

    Ok(())
}
