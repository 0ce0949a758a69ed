use crate::types::{BalanceSnapshot, OperationKind, OperationSpec, Verdict, lamports_to_sol};

/// Decide what to do with one wallet from its freshly fetched balances.
/// Pure: the same snapshot always yields the same verdict.
pub fn check(spec: &OperationSpec, snapshot: &BalanceSnapshot) -> Verdict {
    match spec.kind {
        OperationKind::NativeTransfer => {
            let funding = snapshot.lamports.unwrap_or(0);
            let amount = spec.amount_base();
            if funding < amount {
                Verdict::Skip(format!(
                    "insufficient balance in main wallet: {} SOL",
                    lamports_to_sol(funding)
                ))
            } else {
                Verdict::Eligible(amount)
            }
        }
        OperationKind::NativeSweep => {
            let balance = snapshot.lamports.unwrap_or(0);
            if balance < spec.reserve_lamports {
                Verdict::Skip(format!(
                    "insufficient balance: {} SOL",
                    lamports_to_sol(balance)
                ))
            } else {
                Verdict::Eligible(balance - spec.reserve_lamports)
            }
        }
        OperationKind::TokenTransfer | OperationKind::TokenSweepFixed => {
            let requested = spec.amount_base();
            match snapshot.token {
                Some(held) if held.amount >= requested => Verdict::Eligible(requested),
                Some(held) => Verdict::Skip(format!(
                    "insufficient token balance: {}",
                    held.ui_amount
                )),
                None => Verdict::Skip("no token account".to_string()),
            }
        }
        OperationKind::TokenSweepAll => match snapshot.token {
            Some(held) if held.amount > 0 => Verdict::Eligible(held.amount),
            Some(_) => Verdict::Skip("no tokens available".to_string()),
            None => Verdict::Skip("no token account".to_string()),
        },
        OperationKind::CloseTokenAccount => match snapshot.token {
            Some(held) if held.amount == 0 => Verdict::Eligible(0),
            Some(held) => Verdict::Skip(format!(
                "account still holds {} tokens",
                held.ui_amount
            )),
            None => Verdict::Skip("no token account".to_string()),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TokenBalance;

    fn spec(kind: OperationKind) -> OperationSpec {
        OperationSpec {
            kind,
            mint: None,
            amount_ui: 0.0,
            decimals: 9,
            reserve_lamports: 5000,
        }
    }

    fn sol_snapshot(lamports: u64) -> BalanceSnapshot {
        BalanceSnapshot {
            lamports: Some(lamports),
            token: None,
        }
    }

    fn token_snapshot(amount: u64, decimals: u8) -> BalanceSnapshot {
        BalanceSnapshot {
            lamports: None,
            token: Some(TokenBalance {
                amount,
                decimals,
                ui_amount: amount as f64 / 10f64.powi(decimals as i32),
            }),
        }
    }

    #[test]
    fn sweep_leaves_exactly_the_reserve() {
        let verdict = check(&spec(OperationKind::NativeSweep), &sol_snapshot(1_000_000));
        assert_eq!(verdict, Verdict::Eligible(995_000));
    }

    #[test]
    fn sweep_skips_below_reserve() {
        let spec = spec(OperationKind::NativeSweep);
        assert!(matches!(check(&spec, &sol_snapshot(4999)), Verdict::Skip(_)));
        // Balance exactly at the reserve sweeps zero rather than skipping.
        assert_eq!(check(&spec, &sol_snapshot(5000)), Verdict::Eligible(0));
    }

    #[test]
    fn verdicts_are_idempotent() {
        let spec = spec(OperationKind::NativeSweep);
        let snapshot = sol_snapshot(123_456);
        assert_eq!(check(&spec, &snapshot), check(&spec, &snapshot));
    }

    #[test]
    fn fixed_token_sweep_skips_when_held_below_requested() {
        let mut spec = spec(OperationKind::TokenSweepFixed);
        spec.amount_ui = 100.0;
        spec.decimals = 8;
        let verdict = check(&spec, &token_snapshot(5_000_000_000, 8)); // 50.0 held
        assert_eq!(
            verdict,
            Verdict::Skip("insufficient token balance: 50".to_string())
        );
    }

    #[test]
    fn fixed_token_sweep_moves_the_requested_amount() {
        let mut spec = spec(OperationKind::TokenSweepFixed);
        spec.amount_ui = 100.0;
        spec.decimals = 8;
        let verdict = check(&spec, &token_snapshot(20_000_000_000, 8)); // 200.0 held
        assert_eq!(verdict, Verdict::Eligible(10_000_000_000));
    }

    #[test]
    fn sweep_all_takes_the_full_raw_amount() {
        let spec = spec(OperationKind::TokenSweepAll);
        assert_eq!(
            check(&spec, &token_snapshot(123_456_789, 8)),
            Verdict::Eligible(123_456_789)
        );
        assert!(matches!(
            check(&spec, &token_snapshot(0, 8)),
            Verdict::Skip(_)
        ));
    }

    #[test]
    fn missing_token_account_skips_token_ops() {
        let empty = BalanceSnapshot::default();
        for kind in [
            OperationKind::TokenTransfer,
            OperationKind::TokenSweepFixed,
            OperationKind::TokenSweepAll,
            OperationKind::CloseTokenAccount,
        ] {
            assert_eq!(
                check(&spec(kind), &empty),
                Verdict::Skip("no token account".to_string())
            );
        }
    }

    #[test]
    fn close_requires_zero_balance() {
        let spec = spec(OperationKind::CloseTokenAccount);
        assert_eq!(check(&spec, &token_snapshot(0, 8)), Verdict::Eligible(0));
        let verdict = check(&spec, &token_snapshot(12, 8));
        assert!(matches!(verdict, Verdict::Skip(reason) if reason.contains("still holds")));
    }

    #[test]
    fn native_transfer_checks_funding_wallet() {
        let mut spec = spec(OperationKind::NativeTransfer);
        spec.amount_ui = 0.01; // 10_000_000 lamports
        assert_eq!(
            check(&spec, &sol_snapshot(10_000_000)),
            Verdict::Eligible(10_000_000)
        );
        assert!(matches!(
            check(&spec, &sol_snapshot(9_999_999)),
            Verdict::Skip(_)
        ));
    }
}
