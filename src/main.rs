mod batch;
mod cli;
mod config;
mod eligibility;
mod error;
mod report;
mod retry;
mod rpc;
mod transaction;
mod types;
mod wallet;

use anyhow::{Context, Result};
use batch::{BatchOptions, Orchestrator};
use cli::{Commands, parse_args};
use config::Config;
use retry::with_backoff;
use rpc::{LedgerRpc, SolanaRpc};
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::watch;
use tracing::info;
use types::{BatchRun, OperationKind, OperationSpec};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt::init();

    let cli = parse_args();

    match cli.command {
        Commands::GenerateConfig { output } => generate_config(&output),
        command => run_command(command, &cli.config).await,
    }
}

async fn run_command(command: Commands, config_path: &Path) -> Result<()> {
    let config = Config::load(config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;
    info!("Configuration loaded successfully");

    let wallets = wallet::load_keypairs(&config.keys_file)?;
    info!(
        "Loaded {} wallets from {}",
        wallets.len(),
        config.keys_file.display()
    );

    let rpc = SolanaRpc::new(config.rpc_url.clone(), config.commitment_config()?);

    // A ctrl-c flips the flag; the batch loop stops before the next
    // wallet and abandons any in-flight confirmation wait.
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let signal_tx = shutdown_tx.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received shutdown signal, stopping after the current wallet...");
            let _ = signal_tx.send(true);
        }
    });

    let kind = match command {
        Commands::TransferSol => Some(OperationKind::NativeTransfer),
        Commands::TransferToken => Some(OperationKind::TokenTransfer),
        Commands::SweepSol => Some(OperationKind::NativeSweep),
        Commands::SweepToken => Some(OperationKind::TokenSweepFixed),
        Commands::SweepAllTokens => Some(OperationKind::TokenSweepAll),
        Commands::CloseTokenAccounts => Some(OperationKind::CloseTokenAccount),
        _ => None,
    };

    let (run, title, default_report) = if let Some(kind) = kind {
        let spec = build_spec(kind, &config, &rpc).await?;
        let authority = config.main_keypair()?;
        batch::preflight(&rpc, &spec, &authority, wallets.len()).await?;

        info!(
            "Starting {} across {} wallets",
            kind.label(),
            wallets.len()
        );
        let options = batch_options(&config, kind.default_delay_ms());
        let orchestrator = Orchestrator::new(&rpc, spec, options, shutdown_rx);
        let run = orchestrator.run(&wallets, &authority).await;
        (run, format!("{} Results", kind.label()), "run-report.txt")
    } else {
        match command {
            Commands::CheckBalance => {
                info!("Checking SOL balances for {} wallets", wallets.len());
                let options = batch_options(&config, 1000);
                let run = batch::check_balances(&rpc, &wallets, &options, shutdown_rx).await;
                (
                    run,
                    "SOL Balance Check Results".to_string(),
                    "balance-SOL.txt",
                )
            }
            Commands::CheckTokenBalance => {
                let mint = config.mint_pubkey()?;
                info!("Checking token balances for {} wallets", wallets.len());
                let options = batch_options(&config, 2000);
                let run =
                    batch::check_token_balances(&rpc, &wallets, &mint, &options, shutdown_rx)
                        .await;
                (
                    run,
                    "Token Balance Check Results".to_string(),
                    "balance-token.txt",
                )
            }
            _ => unreachable!("operation commands handled above"),
        }
    };

    let report_path = config
        .report_file
        .clone()
        .unwrap_or_else(|| PathBuf::from(default_report));
    report::write_report(&report_path, &title, &run)?;
    print_summary(&run, &report_path);

    Ok(())
}

async fn build_spec(
    kind: OperationKind,
    config: &Config,
    rpc: &SolanaRpc,
) -> Result<OperationSpec> {
    let (mint, decimals, amount_ui) = if kind.is_token_op() {
        let mint = config.mint_pubkey()?;
        let decimals = match config.token_decimals {
            Some(decimals) => decimals,
            None => with_backoff(config.retry, || rpc.mint_decimals(&mint))
                .await
                .context("Failed to fetch mint decimals")?,
        };
        info!("Using {decimals} decimals for mint {mint}");
        (Some(mint), decimals, config.token_amount)
    } else {
        (None, 9, config.sol_amount)
    };

    Ok(OperationSpec {
        kind,
        mint,
        amount_ui,
        decimals,
        reserve_lamports: config.fee_reserve_lamports,
    })
}

fn batch_options(config: &Config, default_delay_ms: u64) -> BatchOptions {
    BatchOptions {
        confirm_timeout: Duration::from_secs(config.confirm_timeout_secs),
        wallet_delay: Duration::from_millis(
            config.wallet_delay_ms.unwrap_or(default_delay_ms),
        ),
        retry: config.retry,
    }
}

fn print_summary(run: &BatchRun, report_path: &Path) {
    println!("\n{:-^80}", " RESULTS SUMMARY ");
    println!("Processed: {}", run.processed);
    println!("Succeeded: {}", run.succeeded);
    println!("Skipped: {}", run.skipped);
    println!("Failed: {}", run.failed);
    println!("Report written to {}", report_path.display());
}

fn generate_config(output: &Path) -> Result<()> {
    let sample_config = r#"# Solana RPC endpoint and commitment level
rpc_url: "https://api.mainnet-beta.solana.com"
commitment: "confirmed"

# File with one base58-encoded private key per line
keys_file: "wallet-keys.txt"

# Base58-encoded private key of the main wallet (funding source for
# transfers, destination for sweeps)
main_wallet_key: "YOUR_MAIN_WALLET_PRIVATE_KEY"

# SOL per wallet for transfer-sol
sol_amount: 0.01

# Token settings for the token operations
token_mint: "YOUR_TOKEN_MINT_ADDRESS"
token_amount: 100.0
# token_decimals: 8            # optional, fetched from the mint when omitted

# Lamports left behind on SOL sweeps to cover the transaction fee
fee_reserve_lamports: 5000

# Optional tuning
# wallet_delay_ms: 2000        # pause between wallets
# confirm_timeout_secs: 60
# report_file: "run-report.txt"
retry:
  max_retries: 5
  initial_delay_ms: 1000
"#;

    let mut file = File::create(output)
        .with_context(|| format!("Failed to create config file at {}", output.display()))?;
    file.write_all(sample_config.as_bytes())?;

    info!(
        "Sample configuration file generated at {}",
        output.display()
    );
    info!("Please edit the file with your actual configuration before running an operation.");
    Ok(())
}
