use solana_sdk::native_token::LAMPORTS_PER_SOL;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Signature;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    NativeTransfer,
    TokenTransfer,
    NativeSweep,
    TokenSweepFixed,
    TokenSweepAll,
    CloseTokenAccount,
}

impl OperationKind {
    pub fn is_token_op(&self) -> bool {
        !matches!(self, Self::NativeTransfer | Self::NativeSweep)
    }

    /// Minimum pause between wallets. Token operations hit more RPC
    /// endpoints per wallet, so they get the longer default.
    pub fn default_delay_ms(&self) -> u64 {
        if self.is_token_op() { 2000 } else { 1000 }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::NativeTransfer => "SOL Transfer",
            Self::TokenTransfer => "Token Transfer",
            Self::NativeSweep => "SOL Sweep",
            Self::TokenSweepFixed => "Token Sweep",
            Self::TokenSweepAll => "Token Sweep (all)",
            Self::CloseTokenAccount => "Close Token Accounts",
        }
    }
}

/// Everything one batch run needs to know about the operation itself.
/// The signing keypairs are passed alongside, not stored here.
#[derive(Debug, Clone)]
pub struct OperationSpec {
    pub kind: OperationKind,
    pub mint: Option<Pubkey>,
    /// Fixed per-wallet amount in display units, where the operation uses one.
    pub amount_ui: f64,
    /// 9 for SOL, otherwise resolved from the mint (or config override).
    pub decimals: u8,
    /// Lamports left behind on a SOL sweep to cover the transaction fee.
    pub reserve_lamports: u64,
}

impl OperationSpec {
    pub fn amount_base(&self) -> u64 {
        ui_to_base(self.amount_ui, self.decimals)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct TokenBalance {
    /// Raw amount in base units.
    pub amount: u64,
    pub decimals: u8,
    pub ui_amount: f64,
}

/// Balances fetched for one wallet immediately before the eligibility
/// decision. Fields not needed by the operation stay `None`.
#[derive(Debug, Clone, Copy, Default)]
pub struct BalanceSnapshot {
    pub lamports: Option<u64>,
    /// `None` means the token account does not exist.
    pub token: Option<TokenBalance>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    /// Go ahead, moving this many base units.
    Eligible(u64),
    Skip(String),
}

#[derive(Debug)]
pub struct WalletRecord {
    pub wallet: Pubkey,
    pub status: WalletStatus,
    /// Base units actually moved, for successful value operations.
    pub amount: Option<u64>,
}

#[derive(Debug)]
pub enum WalletStatus {
    Succeeded { signature: Signature, detail: String },
    Skipped(String),
    Failed(String),
    /// Read-only result line from a balance check run.
    Checked(String),
}

#[derive(Debug, Default)]
pub struct BatchRun {
    pub records: Vec<WalletRecord>,
    pub processed: usize,
    pub skipped: usize,
    pub succeeded: usize,
    pub failed: usize,
}

impl BatchRun {
    pub fn push(&mut self, record: WalletRecord) {
        self.processed += 1;
        match record.status {
            WalletStatus::Succeeded { .. } | WalletStatus::Checked(_) => self.succeeded += 1,
            WalletStatus::Skipped(_) => self.skipped += 1,
            WalletStatus::Failed(_) => self.failed += 1,
        }
        self.records.push(record);
    }
}

pub fn ui_to_base(ui_amount: f64, decimals: u8) -> u64 {
    (ui_amount * 10f64.powi(decimals as i32)) as u64
}

pub fn base_to_ui(amount: u64, decimals: u8) -> f64 {
    amount as f64 / 10f64.powi(decimals as i32)
}

pub fn lamports_to_sol(lamports: u64) -> f64 {
    lamports as f64 / LAMPORTS_PER_SOL as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ui_to_base_respects_decimals() {
        assert_eq!(ui_to_base(100.0, 8), 10_000_000_000);
        assert_eq!(ui_to_base(0.5, 9), 500_000_000);
        assert_eq!(ui_to_base(1.0, 0), 1);
    }

    #[test]
    fn lamports_to_sol_uses_nine_decimals() {
        assert_eq!(lamports_to_sol(1_000_000_000), 1.0);
        assert_eq!(lamports_to_sol(1_500_000_000), 1.5);
    }

    #[test]
    fn batch_counters_track_statuses() {
        let mut run = BatchRun::default();
        run.push(WalletRecord {
            wallet: Pubkey::new_unique(),
            status: WalletStatus::Succeeded {
                signature: Signature::default(),
                detail: "sent".into(),
            },
            amount: Some(1),
        });
        run.push(WalletRecord {
            wallet: Pubkey::new_unique(),
            status: WalletStatus::Skipped("low balance".into()),
            amount: None,
        });
        run.push(WalletRecord {
            wallet: Pubkey::new_unique(),
            status: WalletStatus::Failed("boom".into()),
            amount: None,
        });
        assert_eq!(run.processed, 3);
        assert_eq!(run.succeeded, 1);
        assert_eq!(run.skipped, 1);
        assert_eq!(run.failed, 1);
    }
}
