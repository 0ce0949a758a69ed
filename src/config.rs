use anyhow::{Context, Result, bail};
use serde::Deserialize;
use solana_sdk::commitment_config::CommitmentConfig;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Keypair;
use std::fs::File;
use std::path::{Path, PathBuf};

use crate::retry::RetrySettings;
use crate::wallet;

#[derive(Debug, Deserialize)]
pub struct Config {
    #[serde(default = "default_rpc_url")]
    pub rpc_url: String,
    #[serde(default = "default_commitment")]
    pub commitment: String,
    #[serde(default = "default_keys_file")]
    pub keys_file: PathBuf,

    /// Base58-encoded private key of the main wallet: the funding source
    /// for transfers and the destination for sweeps. Not needed for the
    /// read-only balance checks.
    pub main_wallet_key: Option<String>,

    /// SOL per wallet for transfer-sol.
    #[serde(default)]
    pub sol_amount: f64,
    /// Token amount (display units) for transfer-token and sweep-token.
    #[serde(default)]
    pub token_amount: f64,
    pub token_mint: Option<String>,
    /// Override for the mint's decimal count; fetched from the mint when
    /// absent.
    pub token_decimals: Option<u8>,

    /// Lamports left behind on SOL sweeps to cover the transaction fee.
    #[serde(default = "default_fee_reserve")]
    pub fee_reserve_lamports: u64,

    /// Override for the per-operation inter-wallet delay.
    pub wallet_delay_ms: Option<u64>,
    #[serde(default = "default_confirm_timeout")]
    pub confirm_timeout_secs: u64,
    #[serde(default)]
    pub retry: RetrySettings,

    /// Override for the per-operation report path.
    pub report_file: Option<PathBuf>,
}

fn default_rpc_url() -> String {
    "https://api.mainnet-beta.solana.com".to_string()
}

fn default_commitment() -> String {
    "confirmed".to_string()
}

fn default_keys_file() -> PathBuf {
    PathBuf::from("wallet-keys.txt")
}

fn default_fee_reserve() -> u64 {
    5000
}

fn default_confirm_timeout() -> u64 {
    60
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path.as_ref()).with_context(|| {
            format!("Failed to open config file: {}", path.as_ref().display())
        })?;
        let config: Config =
            serde_yaml::from_reader(file).context("Failed to parse config file")?;
        Ok(config)
    }

    pub fn commitment_config(&self) -> Result<CommitmentConfig> {
        match self.commitment.as_str() {
            "processed" => Ok(CommitmentConfig::processed()),
            "confirmed" => Ok(CommitmentConfig::confirmed()),
            "finalized" => Ok(CommitmentConfig::finalized()),
            other => bail!("Unknown commitment level in config: {other}"),
        }
    }

    pub fn main_keypair(&self) -> Result<Keypair> {
        let encoded = self
            .main_wallet_key
            .as_deref()
            .context("main_wallet_key missing in config")?;
        wallet::parse_keypair(encoded).context("Invalid main_wallet_key in config")
    }

    pub fn mint_pubkey(&self) -> Result<Pubkey> {
        let mint = self
            .token_mint
            .as_deref()
            .context("token_mint missing in config")?;
        mint.parse::<Pubkey>()
            .context("Invalid token_mint pubkey in config")
    }
}
