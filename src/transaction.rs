use solana_sdk::{instruction::Instruction, pubkey::Pubkey, system_instruction};
use spl_associated_token_account::get_associated_token_address;
use spl_associated_token_account::instruction::create_associated_token_account;

use crate::error::LedgerError;

/// Single SOL transfer, fee paid by the sender.
pub fn native_transfer(from: &Pubkey, to: &Pubkey, lamports: u64) -> Vec<Instruction> {
    vec![system_instruction::transfer(from, to, lamports)]
}

/// Token transfer between the associated token accounts of the two
/// owners. When the destination account is missing, a create instruction
/// funded by `payer` is prepended so the transfer lands in one
/// transaction.
pub fn token_transfer(
    mint: &Pubkey,
    source_owner: &Pubkey,
    destination_owner: &Pubkey,
    payer: &Pubkey,
    amount: u64,
    decimals: u8,
    create_destination_account: bool,
) -> Result<Vec<Instruction>, LedgerError> {
    let source = get_associated_token_address(source_owner, mint);
    let destination = get_associated_token_address(destination_owner, mint);

    let mut instructions = Vec::with_capacity(2);
    if create_destination_account {
        instructions.push(create_associated_token_account(
            payer,
            destination_owner,
            mint,
            &spl_token::id(),
        ));
    }
    let transfer = spl_token::instruction::transfer_checked(
        &spl_token::id(),
        &source,
        mint,
        &destination,
        source_owner,
        &[],
        amount,
        decimals,
    )
    .map_err(|e| LedgerError::Other(format!("failed to build token transfer: {e}")))?;
    instructions.push(transfer);
    Ok(instructions)
}

/// Close the owner's associated token account, returning the rent to the
/// owner. The account must already be empty.
pub fn close_token_account(mint: &Pubkey, owner: &Pubkey) -> Result<Vec<Instruction>, LedgerError> {
    let token_account = get_associated_token_address(owner, mint);
    let close = spl_token::instruction::close_account(
        &spl_token::id(),
        &token_account,
        owner,
        owner,
        &[],
    )
    .map_err(|e| LedgerError::Other(format!("failed to build close instruction: {e}")))?;
    Ok(vec![close])
}
