use solana_client::client_error::{ClientError, ClientErrorKind};
use solana_client::rpc_request::{RpcError, RpcResponseErrorData};
use solana_sdk::transaction::TransactionError;
use thiserror::Error;

/// JSON-RPC "invalid params" — the code Solana nodes answer with when a
/// queried account or token account does not exist.
const JSON_RPC_INVALID_PARAMS: i64 = -32602;

/// What went wrong talking to the cluster, reduced to the classes the
/// batch loop actually branches on. Classification inspects the error
/// structure (HTTP status, RPC error code, `TransactionError` variant)
/// rather than matching on message text.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("rate limited by RPC endpoint")]
    RateLimited,

    #[error("account not found")]
    NotFound,

    #[error("insufficient funds: {0}")]
    InsufficientFunds(String),

    #[error("blockhash expired before the transaction landed")]
    BlockhashExpired,

    #[error("{0}")]
    Other(String),
}

impl LedgerError {
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::RateLimited)
    }
}

impl From<ClientError> for LedgerError {
    fn from(err: ClientError) -> Self {
        match err.kind() {
            ClientErrorKind::Reqwest(e)
                if e.status().is_some_and(|s| s.as_u16() == 429) =>
            {
                Self::RateLimited
            }
            ClientErrorKind::RpcError(rpc_err) => classify_rpc_error(rpc_err, &err),
            ClientErrorKind::TransactionError(tx_err) => classify_tx_error(tx_err),
            _ => Self::Other(err.to_string()),
        }
    }
}

fn classify_rpc_error(rpc_err: &RpcError, original: &ClientError) -> LedgerError {
    match rpc_err {
        RpcError::RpcResponseError { code, data, .. } => {
            if let RpcResponseErrorData::SendTransactionPreflightFailure(sim) = data {
                if let Some(tx_err) = &sim.err {
                    return classify_tx_error(tx_err);
                }
            }
            if *code == JSON_RPC_INVALID_PARAMS {
                return LedgerError::NotFound;
            }
            LedgerError::Other(original.to_string())
        }
        _ => LedgerError::Other(original.to_string()),
    }
}

fn classify_tx_error(tx_err: &TransactionError) -> LedgerError {
    match tx_err {
        TransactionError::BlockhashNotFound => LedgerError::BlockhashExpired,
        TransactionError::InsufficientFundsForFee
        | TransactionError::InsufficientFundsForRent { .. } => {
            LedgerError::InsufficientFunds(tx_err.to_string())
        }
        TransactionError::AccountNotFound => LedgerError::NotFound,
        other => LedgerError::Other(format!("transaction error: {other}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use solana_client::rpc_request::RpcRequest;

    fn rpc_response_error(code: i64, message: &str) -> ClientError {
        ClientError::new_with_request(
            ClientErrorKind::RpcError(RpcError::RpcResponseError {
                code,
                message: message.to_string(),
                data: RpcResponseErrorData::Empty,
            }),
            RpcRequest::GetTokenAccountBalance,
        )
    }

    #[test]
    fn invalid_params_maps_to_not_found() {
        let classified: LedgerError =
            rpc_response_error(JSON_RPC_INVALID_PARAMS, "Invalid param: could not find account")
                .into();
        assert!(matches!(classified, LedgerError::NotFound));
    }

    #[test]
    fn other_rpc_codes_stay_other() {
        let classified: LedgerError = rpc_response_error(-32005, "node is behind").into();
        assert!(matches!(classified, LedgerError::Other(_)));
    }

    #[test]
    fn blockhash_not_found_maps_to_expired() {
        let err = ClientError::new_with_request(
            ClientErrorKind::TransactionError(TransactionError::BlockhashNotFound),
            RpcRequest::SendTransaction,
        );
        let classified: LedgerError = err.into();
        assert!(matches!(classified, LedgerError::BlockhashExpired));
    }

    #[test]
    fn fee_shortfall_maps_to_insufficient_funds() {
        let err = ClientError::new_with_request(
            ClientErrorKind::TransactionError(TransactionError::InsufficientFundsForFee),
            RpcRequest::SendTransaction,
        );
        let classified: LedgerError = err.into();
        assert!(matches!(classified, LedgerError::InsufficientFunds(_)));
    }

    #[test]
    fn only_rate_limit_is_transient() {
        assert!(LedgerError::RateLimited.is_transient());
        assert!(!LedgerError::NotFound.is_transient());
        assert!(!LedgerError::BlockhashExpired.is_transient());
        assert!(!LedgerError::Other("x".into()).is_transient());
    }
}
