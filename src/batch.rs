use anyhow::{Context, Result, bail};
use indicatif::ProgressBar;
use solana_sdk::{
    instruction::Instruction,
    pubkey::Pubkey,
    signature::{Keypair, Signature, Signer},
    transaction::Transaction,
};
use spl_associated_token_account::get_associated_token_address;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{Instant, sleep};
use tracing::{info, warn};

use crate::eligibility;
use crate::error::LedgerError;
use crate::retry::{RetrySettings, Throttle, with_backoff};
use crate::rpc::LedgerRpc;
use crate::transaction::{close_token_account, native_transfer, token_transfer};
use crate::types::{
    BalanceSnapshot, BatchRun, OperationKind, OperationSpec, TokenBalance, Verdict, WalletRecord,
    WalletStatus, base_to_ui, lamports_to_sol,
};

#[derive(Debug, Clone, Copy)]
pub struct BatchOptions {
    pub confirm_timeout: Duration,
    /// Minimum spacing between wallets, the deliberate backpressure
    /// against RPC rate limits.
    pub wallet_delay: Duration,
    pub retry: RetrySettings,
}

enum ConfirmOutcome {
    Confirmed,
    OnChainFailure(String),
    TimedOut,
    Interrupted,
}

/// Drives one operation across the whole fleet, strictly sequentially.
/// One wallet's failure never stops the batch; every processed wallet
/// ends up as exactly one record in the returned `BatchRun`.
pub struct Orchestrator<'a, R: LedgerRpc> {
    rpc: &'a R,
    spec: OperationSpec,
    options: BatchOptions,
    shutdown: watch::Receiver<bool>,
}

impl<'a, R: LedgerRpc> Orchestrator<'a, R> {
    pub fn new(
        rpc: &'a R,
        spec: OperationSpec,
        options: BatchOptions,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            rpc,
            spec,
            options,
            shutdown,
        }
    }

    pub async fn run(&self, wallets: &[Keypair], authority: &Keypair) -> BatchRun {
        let mut run = BatchRun::default();
        let mut throttle = Throttle::new(self.options.wallet_delay);
        let bar = ProgressBar::new(wallets.len() as u64);

        for wallet in wallets {
            if *self.shutdown.borrow() {
                info!("shutdown requested, stopping before the next wallet");
                break;
            }
            throttle.acquire().await;

            let record = self.process_wallet(wallet, authority).await;
            log_record(&record);
            run.push(record);
            bar.inc(1);
        }

        bar.finish_and_clear();
        run
    }

    async fn process_wallet(&self, wallet: &Keypair, authority: &Keypair) -> WalletRecord {
        let wallet_pubkey = wallet.pubkey();

        let snapshot = match self.fetch_snapshot(&wallet_pubkey, &authority.pubkey()).await {
            Ok(snapshot) => snapshot,
            Err(err) => return record(wallet_pubkey, WalletStatus::Failed(err.to_string()), None),
        };

        let amount = match eligibility::check(&self.spec, &snapshot) {
            Verdict::Skip(reason) => {
                return record(wallet_pubkey, WalletStatus::Skipped(reason), None);
            }
            Verdict::Eligible(amount) => amount,
        };

        match self.submit_and_confirm(wallet, authority, amount).await {
            Ok(signature) => record(
                wallet_pubkey,
                WalletStatus::Succeeded {
                    signature,
                    detail: self.success_detail(amount),
                },
                Some(amount),
            ),
            Err(err) => record(wallet_pubkey, WalletStatus::Failed(err.to_string()), None),
        }
    }

    /// Fetch exactly the balances this operation's eligibility decision
    /// reads, fresh for this wallet pass.
    async fn fetch_snapshot(
        &self,
        wallet: &Pubkey,
        authority: &Pubkey,
    ) -> Result<BalanceSnapshot, LedgerError> {
        let retry = self.options.retry;
        let mut snapshot = BalanceSnapshot::default();
        match self.spec.kind {
            OperationKind::NativeTransfer => {
                // Funds leave the main wallet here.
                snapshot.lamports =
                    Some(with_backoff(retry, || self.rpc.balance(authority)).await?);
            }
            OperationKind::NativeSweep => {
                snapshot.lamports = Some(with_backoff(retry, || self.rpc.balance(wallet)).await?);
            }
            OperationKind::TokenTransfer => {
                let mint = self.mint()?;
                let source = get_associated_token_address(authority, &mint);
                snapshot.token =
                    with_backoff(retry, || self.rpc.token_balance(&source)).await?;
            }
            OperationKind::TokenSweepFixed
            | OperationKind::TokenSweepAll
            | OperationKind::CloseTokenAccount => {
                let mint = self.mint()?;
                let account = get_associated_token_address(wallet, &mint);
                snapshot.token =
                    with_backoff(retry, || self.rpc.token_balance(&account)).await?;
            }
        }
        Ok(snapshot)
    }

    /// Build, sign and send, then wait for confirmation. A send that
    /// fails on rate limiting or an expired blockhash is retried by
    /// rebuilding against a fresh blockhash; before every resubmission
    /// the previous attempt's signature is checked so an already-landed
    /// transaction is never sent twice.
    async fn submit_and_confirm(
        &self,
        wallet: &Keypair,
        authority: &Keypair,
        amount: u64,
    ) -> Result<Signature, LedgerError> {
        let signer = self.signer(wallet, authority);
        let fee_payer = signer.pubkey();
        let mut previous: Option<Signature> = None;
        let mut attempt = 0u32;

        loop {
            attempt += 1;

            if let Some(signature) = previous {
                if let Ok(Some(Ok(()))) = self.rpc.signature_status(&signature).await {
                    info!("previous attempt already confirmed: {signature}");
                    return Ok(signature);
                }
            }

            let create_destination = self
                .destination_needs_account(&wallet.pubkey(), &authority.pubkey())
                .await?;
            let instructions = self.build_instructions(
                &wallet.pubkey(),
                &authority.pubkey(),
                amount,
                create_destination,
            )?;
            let blockhash =
                with_backoff(self.options.retry, || self.rpc.latest_blockhash()).await?;
            let transaction = Transaction::new_signed_with_payer(
                &instructions,
                Some(&fee_payer),
                &[signer],
                blockhash,
            );
            let signature = transaction.signatures[0];

            match self.rpc.send(&transaction).await {
                Ok(signature) => {
                    return match self.await_confirmation(&signature).await {
                        ConfirmOutcome::Confirmed => Ok(signature),
                        ConfirmOutcome::OnChainFailure(detail) => {
                            Err(LedgerError::Other(detail))
                        }
                        ConfirmOutcome::TimedOut => {
                            Err(LedgerError::Other("confirmation timeout".to_string()))
                        }
                        ConfirmOutcome::Interrupted => {
                            Err(LedgerError::Other("interrupted".to_string()))
                        }
                    };
                }
                Err(err @ (LedgerError::RateLimited | LedgerError::BlockhashExpired))
                    if attempt <= self.options.retry.max_retries =>
                {
                    previous = Some(signature);
                    warn!("send failed ({err}), rebuilding with a fresh blockhash");
                    if matches!(err, LedgerError::RateLimited) {
                        let delay = self.options.retry.delay_ms(attempt);
                        sleep(Duration::from_millis(delay)).await;
                    }
                }
                Err(err) => return Err(err),
            }
        }
    }

    async fn await_confirmation(&self, signature: &Signature) -> ConfirmOutcome {
        let mut shutdown = self.shutdown.clone();
        let deadline = Instant::now() + self.options.confirm_timeout;

        while Instant::now() < deadline {
            if *shutdown.borrow() {
                warn!("interrupted while waiting for confirmation of {signature}");
                return ConfirmOutcome::Interrupted;
            }

            let wait = match self.rpc.signature_status(signature).await {
                Ok(Some(Ok(()))) => return ConfirmOutcome::Confirmed,
                Ok(Some(Err(err))) => {
                    return ConfirmOutcome::OnChainFailure(format!("transaction error: {err:?}"));
                }
                Ok(None) => Duration::from_millis(500),
                Err(err) => {
                    warn!("error checking signature status: {err}");
                    Duration::from_millis(1000)
                }
            };

            tokio::select! {
                _ = sleep(wait) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        sleep(wait).await;
                    }
                }
            }
        }

        ConfirmOutcome::TimedOut
    }

    fn build_instructions(
        &self,
        wallet: &Pubkey,
        authority: &Pubkey,
        amount: u64,
        create_destination: bool,
    ) -> Result<Vec<Instruction>, LedgerError> {
        match self.spec.kind {
            OperationKind::NativeTransfer => Ok(native_transfer(authority, wallet, amount)),
            OperationKind::NativeSweep => Ok(native_transfer(wallet, authority, amount)),
            OperationKind::TokenTransfer => token_transfer(
                &self.mint()?,
                authority,
                wallet,
                authority,
                amount,
                self.spec.decimals,
                create_destination,
            ),
            OperationKind::TokenSweepFixed | OperationKind::TokenSweepAll => token_transfer(
                &self.mint()?,
                wallet,
                authority,
                wallet,
                amount,
                self.spec.decimals,
                create_destination,
            ),
            OperationKind::CloseTokenAccount => close_token_account(&self.mint()?, wallet),
        }
    }

    /// For token movements, check whether the receiving side's associated
    /// token account still needs to be created.
    async fn destination_needs_account(
        &self,
        wallet: &Pubkey,
        authority: &Pubkey,
    ) -> Result<bool, LedgerError> {
        let owner = match self.spec.kind {
            OperationKind::TokenTransfer => wallet,
            OperationKind::TokenSweepFixed | OperationKind::TokenSweepAll => authority,
            _ => return Ok(false),
        };
        let destination = get_associated_token_address(owner, &self.mint()?);
        let exists =
            with_backoff(self.options.retry, || self.rpc.account_exists(&destination)).await?;
        Ok(!exists)
    }

    fn signer<'k>(&self, wallet: &'k Keypair, authority: &'k Keypair) -> &'k Keypair {
        match self.spec.kind {
            OperationKind::NativeTransfer | OperationKind::TokenTransfer => authority,
            _ => wallet,
        }
    }

    fn mint(&self) -> Result<Pubkey, LedgerError> {
        self.spec
            .mint
            .ok_or_else(|| LedgerError::Other("token mint not configured".to_string()))
    }

    fn success_detail(&self, amount: u64) -> String {
        match self.spec.kind {
            OperationKind::NativeTransfer => {
                format!("sent {} SOL", lamports_to_sol(amount))
            }
            OperationKind::NativeSweep => {
                format!("swept {} SOL", lamports_to_sol(amount))
            }
            OperationKind::TokenTransfer => {
                format!("sent {} tokens", base_to_ui(amount, self.spec.decimals))
            }
            OperationKind::TokenSweepFixed | OperationKind::TokenSweepAll => {
                format!("swept {} tokens", base_to_ui(amount, self.spec.decimals))
            }
            OperationKind::CloseTokenAccount => "closed token account, rent reclaimed".to_string(),
        }
    }
}

/// Fatal checks that must pass before the batch loop starts. Everything
/// caught here aborts the whole run with a non-zero exit.
pub async fn preflight<R: LedgerRpc>(
    rpc: &R,
    spec: &OperationSpec,
    authority: &Keypair,
    wallet_count: usize,
) -> Result<()> {
    let retry = RetrySettings::default();
    let authority_pubkey = authority.pubkey();
    match spec.kind {
        OperationKind::NativeTransfer => {
            let balance = with_backoff(retry, || rpc.balance(&authority_pubkey))
                .await
                .context("Failed to fetch main wallet balance")?;
            let needed = spec.amount_base().saturating_mul(wallet_count as u64);
            info!("Main wallet balance: {} SOL", lamports_to_sol(balance));
            info!(
                "Total SOL needed for transfers: {} SOL",
                lamports_to_sol(needed)
            );
            if balance < needed {
                bail!(
                    "Insufficient balance in main wallet: deposit at least {} SOL into {} and try again",
                    lamports_to_sol(needed - balance),
                    authority_pubkey
                );
            }
        }
        OperationKind::TokenTransfer => {
            let mint = spec
                .mint
                .context("token_mint missing in config")?;
            let source = get_associated_token_address(&authority_pubkey, &mint);
            let held = with_backoff(retry, || rpc.token_balance(&source))
                .await
                .context("Failed to fetch main wallet token balance")?
                .map(|balance| balance.amount)
                .unwrap_or(0);
            let needed = spec.amount_base().saturating_mul(wallet_count as u64);
            info!(
                "Main wallet token balance: {}",
                base_to_ui(held, spec.decimals)
            );
            info!("Total tokens needed: {}", base_to_ui(needed, spec.decimals));
            if held < needed {
                bail!("Insufficient token balance in main wallet for all transfers");
            }
        }
        _ => {}
    }
    Ok(())
}

/// Read-only SOL balance pass over the fleet.
pub async fn check_balances<R: LedgerRpc>(
    rpc: &R,
    wallets: &[Keypair],
    options: &BatchOptions,
    shutdown: watch::Receiver<bool>,
) -> BatchRun {
    let mut run = BatchRun::default();
    let mut throttle = Throttle::new(options.wallet_delay);

    for wallet in wallets {
        if *shutdown.borrow() {
            info!("shutdown requested, stopping before the next wallet");
            break;
        }
        throttle.acquire().await;

        let pubkey = wallet.pubkey();
        let status = match with_backoff(options.retry, || rpc.balance(&pubkey)).await {
            Ok(lamports) => {
                WalletStatus::Checked(format!("SOL Balance: {} SOL", lamports_to_sol(lamports)))
            }
            Err(err) => WalletStatus::Failed(err.to_string()),
        };
        let record = record(pubkey, status, None);
        log_record(&record);
        run.push(record);
    }
    run
}

/// Read-only token balance pass over the fleet.
pub async fn check_token_balances<R: LedgerRpc>(
    rpc: &R,
    wallets: &[Keypair],
    mint: &Pubkey,
    options: &BatchOptions,
    shutdown: watch::Receiver<bool>,
) -> BatchRun {
    let mut run = BatchRun::default();
    let mut throttle = Throttle::new(options.wallet_delay);

    for wallet in wallets {
        if *shutdown.borrow() {
            info!("shutdown requested, stopping before the next wallet");
            break;
        }
        throttle.acquire().await;

        let pubkey = wallet.pubkey();
        let status = match token_balance_by_owner(rpc, &pubkey, mint, options.retry).await {
            Ok(Some(balance)) => {
                WalletStatus::Checked(format!("Token Balance: {}", balance.ui_amount))
            }
            Ok(None) => WalletStatus::Checked("No token account found".to_string()),
            Err(err) => WalletStatus::Failed(err.to_string()),
        };
        let record = record(pubkey, status, None);
        log_record(&record);
        run.push(record);
    }
    run
}

/// Look the owner's token account up by owner+mint, then read its
/// balance. Owners without an account resolve to `None`.
async fn token_balance_by_owner<R: LedgerRpc>(
    rpc: &R,
    owner: &Pubkey,
    mint: &Pubkey,
    retry: RetrySettings,
) -> Result<Option<TokenBalance>, LedgerError> {
    let accounts = with_backoff(retry, || rpc.token_accounts_by_owner(owner, mint)).await?;
    let Some(account) = accounts.first().copied() else {
        return Ok(None);
    };
    with_backoff(retry, || rpc.token_balance(&account)).await
}

fn record(wallet: Pubkey, status: WalletStatus, amount: Option<u64>) -> WalletRecord {
    WalletRecord {
        wallet,
        status,
        amount,
    }
}

fn log_record(record: &WalletRecord) {
    match &record.status {
        WalletStatus::Succeeded { signature, detail } => {
            info!("{}: {} ({})", record.wallet, detail, signature);
        }
        WalletStatus::Skipped(reason) => {
            info!("Skipping wallet {} - {}", record.wallet, reason);
        }
        WalletStatus::Failed(error) => {
            warn!("Failed: {}: {}", record.wallet, error);
        }
        WalletStatus::Checked(detail) => {
            info!("{}: {}", record.wallet, detail);
        }
    }
}
