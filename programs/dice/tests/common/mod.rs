#![allow(dead_code)]

use anchor_lang::{InstructionData, ToAccountMetas};
use solana_program_test::*;
use solana_sdk::{
    account_info::AccountInfo,
    entrypoint::ProgramResult,
    instruction::{Instruction, InstructionError},
    native_token::LAMPORTS_PER_SOL,
    pubkey::Pubkey,
    signature::{Keypair, Signature},
    signer::Signer,
    system_instruction, system_program, sysvar,
    transaction::{Transaction, TransactionError},
};

pub use dice::DiceError;

// Anchor's entry ties account lifetimes together; the native processor does not.
fn process_instruction(program_id: &Pubkey, accounts: &[AccountInfo], data: &[u8]) -> ProgramResult {
    let accounts = Box::leak(Box::new(accounts.to_vec()));
    dice::entry(program_id, accounts, data)
}

pub fn program_test() -> ProgramTest {
    let mut pt = ProgramTest::new("dice", dice::ID, processor!(process_instruction));
    pt.prefer_bpf(false);
    pt
}

pub async fn start() -> ProgramTestContext {
    program_test().start_with_context().await
}

pub fn vault_address(house: &Pubkey) -> Pubkey {
    Pubkey::find_program_address(&[dice::VAULT_SEED, house.as_ref()], &dice::ID).0
}

pub fn bet_address(player: &Pubkey, seed: u128) -> Pubkey {
    Pubkey::find_program_address(
        &[dice::BET_SEED, player.as_ref(), &seed.to_le_bytes()],
        &dice::ID,
    )
    .0
}

pub fn initialize_ix(house: &Pubkey, amount: u64) -> Instruction {
    Instruction {
        program_id: dice::ID,
        accounts: dice::accounts::Initialize {
            house: *house,
            vault: vault_address(house),
            system_program: system_program::ID,
        }
        .to_account_metas(None),
        data: dice::instruction::Initialize { amount }.data(),
    }
}

pub fn place_bet_ix(player: &Pubkey, house: &Pubkey, seed: u128, roll: u8, amount: u64) -> Instruction {
    Instruction {
        program_id: dice::ID,
        accounts: dice::accounts::PlaceBet {
            player: *player,
            house: *house,
            vault: vault_address(house),
            bet: bet_address(player, seed),
            randomness_account: Pubkey::new_unique(),
            system_program: system_program::ID,
        }
        .to_account_metas(None),
        data: dice::instruction::PlaceBet { seed, roll, amount }.data(),
    }
}

pub fn resolve_bet_ix(house: &Pubkey, player: &Pubkey, seed: u128, sig: Vec<u8>) -> Instruction {
    Instruction {
        program_id: dice::ID,
        accounts: dice::accounts::ResolveBet {
            house: *house,
            player: *player,
            vault: vault_address(house),
            bet: bet_address(player, seed),
            instruction_sysvar: sysvar::instructions::ID,
            system_program: system_program::ID,
        }
        .to_account_metas(None),
        data: dice::instruction::ResolveBet { sig }.data(),
    }
}

pub fn refund_bet_ix(player: &Pubkey, house: &Pubkey, seed: u128) -> Instruction {
    Instruction {
        program_id: dice::ID,
        accounts: dice::accounts::RefundBet {
            player: *player,
            house: *house,
            vault: vault_address(house),
            bet: bet_address(player, seed),
            system_program: system_program::ID,
        }
        .to_account_metas(None),
        data: dice::instruction::RefundBet {}.data(),
    }
}

/// Precompile instruction proving `house` signed `message`; returns it with the signature bytes.
pub fn house_signature_ix(house: &Keypair, message: &[u8]) -> (Instruction, Vec<u8>) {
    let signature = house.sign_message(message);
    let sig_bytes: [u8; 64] = signature.as_ref().try_into().unwrap();
    let ix = Instruction {
        program_id: solana_sdk::ed25519_program::ID,
        accounts: vec![],
        data: dice::ed25519::new_instruction_data(&house.pubkey().to_bytes(), &sig_bytes, message),
    };
    (ix, sig_bytes.to_vec())
}

/// Borsh bytes of the bet account, discriminator stripped.
pub async fn bet_message(ctx: &mut ProgramTestContext, bet: &Pubkey) -> Vec<u8> {
    let account = ctx
        .banks_client
        .get_account(*bet)
        .await
        .unwrap()
        .expect("bet account");
    account.data[8..8 + <dice::Bet as anchor_lang::Space>::INIT_SPACE].to_vec()
}

pub async fn fetch_bet(ctx: &mut ProgramTestContext, bet: &Pubkey) -> Option<dice::Bet> {
    use anchor_lang::AccountDeserialize;
    let account = ctx.banks_client.get_account(*bet).await.unwrap()?;
    Some(dice::Bet::try_deserialize(&mut account.data.as_slice()).unwrap())
}

pub async fn balance(ctx: &mut ProgramTestContext, key: &Pubkey) -> u64 {
    ctx.banks_client.get_balance(*key).await.unwrap()
}

pub async fn funded_keypair(ctx: &mut ProgramTestContext, sol: u64) -> Keypair {
    let keypair = Keypair::new();
    let ix = system_instruction::transfer(&ctx.payer.pubkey(), &keypair.pubkey(), sol * LAMPORTS_PER_SOL);
    let blockhash = ctx.banks_client.get_latest_blockhash().await.unwrap();
    let tx = Transaction::new_signed_with_payer(&[ix], Some(&ctx.payer.pubkey()), &[&ctx.payer], blockhash);
    ctx.banks_client.process_transaction(tx).await.unwrap();
    keypair
}

/// Sends `ixs` signed by `signers` (the first one pays) and returns the transaction signature.
pub async fn send(
    ctx: &mut ProgramTestContext,
    ixs: &[Instruction],
    signers: &[&Keypair],
) -> Result<Signature, BanksClientError> {
    let blockhash = ctx.banks_client.get_latest_blockhash().await?;
    let tx = Transaction::new_signed_with_payer(ixs, Some(&signers[0].pubkey()), signers, blockhash);
    let signature = tx.signatures[0];
    ctx.banks_client.process_transaction(tx).await?;
    Ok(signature)
}

/// Custom error code carried by a failed transaction, if any.
pub fn custom_code(err: BanksClientError) -> Option<u32> {
    match err.unwrap() {
        TransactionError::InstructionError(_, InstructionError::Custom(code)) => Some(code),
        _ => None,
    }
}

pub fn dice_code(err: DiceError) -> u32 {
    anchor_lang::error::ERROR_CODE_OFFSET + err as u32
}

pub fn anchor_code(err: anchor_lang::error::ErrorCode) -> u32 {
    u32::from(err)
}
