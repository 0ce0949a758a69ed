use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(version = "0.1.0")]
#[command(about = "Solana bulk wallet operations utility")]
#[command(
    long_about = "Batch SOL and SPL token operations across a fleet of wallets: \
    balance checks, transfers from a main wallet, sweeps into a main wallet, \
    and rent reclamation by closing empty token accounts. Wallets are \
    processed sequentially with throttling and rate-limit retries."
)]
pub struct Cli {
    /// Path to the YAML configuration file
    #[arg(short, long, default_value = "config.yaml")]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Check the SOL balance of every wallet in the key file
    CheckBalance,

    /// Check the token balance of every wallet in the key file
    CheckTokenBalance,

    /// Send a fixed amount of SOL from the main wallet to every wallet
    TransferSol,

    /// Send a fixed token amount from the main wallet to every wallet
    TransferToken,

    /// Sweep all SOL above the fee reserve from every wallet into the main wallet
    SweepSol,

    /// Sweep a fixed token amount from every wallet into the main wallet
    SweepToken,

    /// Sweep the entire token balance from every wallet into the main wallet
    SweepAllTokens,

    /// Close empty token accounts and return the rent to each wallet
    CloseTokenAccounts,

    /// Write a sample configuration file
    GenerateConfig {
        /// Path to output config file
        #[arg(short, long, default_value = "config.yaml")]
        output: PathBuf,
    },
}

pub fn parse_args() -> Cli {
    Cli::parse()
}
