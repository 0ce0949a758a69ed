use async_trait::async_trait;
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_client::rpc_config::RpcSendTransactionConfig;
use solana_client::rpc_request::TokenAccountsFilter;
use solana_sdk::{
    commitment_config::CommitmentConfig,
    hash::Hash,
    pubkey::Pubkey,
    signature::Signature,
    transaction::{Transaction, TransactionError},
};
use solana_transaction_status::TransactionStatus;
use std::time::Duration;

use crate::error::LedgerError;
use crate::types::{TokenBalance, base_to_ui};

/// The slice of the RPC surface the batch loop consumes. Kept behind a
/// trait so the loop can run against a scripted implementation in tests.
#[async_trait]
pub trait LedgerRpc: Send + Sync {
    async fn balance(&self, wallet: &Pubkey) -> Result<u64, LedgerError>;

    /// Balance of a specific token account. `Ok(None)` when the account
    /// does not exist.
    async fn token_balance(
        &self,
        token_account: &Pubkey,
    ) -> Result<Option<TokenBalance>, LedgerError>;

    /// Token accounts the owner holds for one mint.
    async fn token_accounts_by_owner(
        &self,
        owner: &Pubkey,
        mint: &Pubkey,
    ) -> Result<Vec<Pubkey>, LedgerError>;

    async fn account_exists(&self, address: &Pubkey) -> Result<bool, LedgerError>;

    async fn mint_decimals(&self, mint: &Pubkey) -> Result<u8, LedgerError>;

    async fn latest_blockhash(&self) -> Result<Hash, LedgerError>;

    async fn send(&self, transaction: &Transaction) -> Result<Signature, LedgerError>;

    /// Processed status of a submitted signature at the configured
    /// commitment level. `Ok(None)` until the cluster has seen it there.
    async fn signature_status(
        &self,
        signature: &Signature,
    ) -> Result<Option<Result<(), TransactionError>>, LedgerError>;
}

pub struct SolanaRpc {
    client: RpcClient,
    commitment: CommitmentConfig,
}

impl SolanaRpc {
    pub fn new(rpc_url: String, commitment: CommitmentConfig) -> Self {
        let client = RpcClient::new_with_timeout_and_commitment(
            rpc_url,
            Duration::from_secs(30),
            commitment,
        );
        Self { client, commitment }
    }
}

#[async_trait]
impl LedgerRpc for SolanaRpc {
    async fn balance(&self, wallet: &Pubkey) -> Result<u64, LedgerError> {
        Ok(self.client.get_balance(wallet).await?)
    }

    async fn token_balance(
        &self,
        token_account: &Pubkey,
    ) -> Result<Option<TokenBalance>, LedgerError> {
        match self.client.get_token_account_balance(token_account).await {
            Ok(balance) => {
                let amount = balance
                    .amount
                    .parse::<u64>()
                    .map_err(|e| LedgerError::Other(format!("unparseable token amount: {e}")))?;
                let ui_amount = balance
                    .ui_amount
                    .unwrap_or_else(|| base_to_ui(amount, balance.decimals));
                Ok(Some(TokenBalance {
                    amount,
                    decimals: balance.decimals,
                    ui_amount,
                }))
            }
            Err(err) => match LedgerError::from(err) {
                LedgerError::NotFound => Ok(None),
                other => Err(other),
            },
        }
    }

    async fn token_accounts_by_owner(
        &self,
        owner: &Pubkey,
        mint: &Pubkey,
    ) -> Result<Vec<Pubkey>, LedgerError> {
        let accounts = self
            .client
            .get_token_accounts_by_owner(owner, TokenAccountsFilter::Mint(*mint))
            .await?;
        accounts
            .into_iter()
            .map(|keyed| {
                keyed
                    .pubkey
                    .parse::<Pubkey>()
                    .map_err(|e| LedgerError::Other(format!("unparseable account pubkey: {e}")))
            })
            .collect()
    }

    async fn account_exists(&self, address: &Pubkey) -> Result<bool, LedgerError> {
        let response = self
            .client
            .get_account_with_commitment(address, self.commitment)
            .await?;
        Ok(response.value.is_some())
    }

    async fn mint_decimals(&self, mint: &Pubkey) -> Result<u8, LedgerError> {
        let supply = self.client.get_token_supply(mint).await?;
        Ok(supply.decimals)
    }

    async fn latest_blockhash(&self) -> Result<Hash, LedgerError> {
        Ok(self.client.get_latest_blockhash().await?)
    }

    async fn send(&self, transaction: &Transaction) -> Result<Signature, LedgerError> {
        let config = RpcSendTransactionConfig {
            skip_preflight: false,
            preflight_commitment: Some(self.commitment.commitment),
            max_retries: Some(5),
            ..Default::default()
        };
        Ok(self
            .client
            .send_transaction_with_config(transaction, config)
            .await?)
    }

    async fn signature_status(
        &self,
        signature: &Signature,
    ) -> Result<Option<Result<(), TransactionError>>, LedgerError> {
        let response = self.client.get_signature_statuses(&[*signature]).await?;
        let status = response.value.into_iter().next().flatten();
        Ok(status.and_then(|s| at_commitment(s, self.commitment)))
    }
}

/// Reduce a cluster status to a terminal result, or `None` while it has
/// not yet reached the requested commitment level.
fn at_commitment(
    status: TransactionStatus,
    commitment: CommitmentConfig,
) -> Option<Result<(), TransactionError>> {
    if !status.satisfies_commitment(commitment) {
        return None;
    }
    Some(match status.err {
        Some(err) => Err(err),
        None => Ok(()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use solana_transaction_status::TransactionConfirmationStatus;

    fn status(confirmation: TransactionConfirmationStatus) -> TransactionStatus {
        TransactionStatus {
            slot: 1,
            confirmations: Some(1),
            status: Ok(()),
            err: None,
            confirmation_status: Some(confirmation),
        }
    }

    #[test]
    fn processed_does_not_satisfy_confirmed() {
        let result = at_commitment(
            status(TransactionConfirmationStatus::Processed),
            CommitmentConfig::confirmed(),
        );
        assert!(result.is_none());
    }

    #[test]
    fn confirmed_satisfies_confirmed() {
        let result = at_commitment(
            status(TransactionConfirmationStatus::Confirmed),
            CommitmentConfig::confirmed(),
        );
        assert_eq!(result, Some(Ok(())));
    }

    #[test]
    fn on_chain_failure_is_terminal() {
        let mut failed = status(TransactionConfirmationStatus::Finalized);
        failed.err = Some(TransactionError::AccountInUse);
        let result = at_commitment(failed, CommitmentConfig::confirmed());
        assert_eq!(result, Some(Err(TransactionError::AccountInUse)));
    }
}
