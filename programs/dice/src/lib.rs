#![cfg_attr(not(test), warn(unexpected_cfgs))]

use anchor_lang::prelude::*;
use anchor_lang::solana_program::{
    ed25519_program, hash::hash, sysvar::instructions::load_instruction_at_checked,
};

pub mod ed25519;

declare_id!("CV4X2KEEEv9PEmPwH1Uk1kL6vw7mTpMBBduTp713ZcU3");

#[constant]
pub const SEED: &str = "anchor";

pub const VAULT_SEED: &[u8] = b"vault";
pub const BET_SEED: &[u8] = b"bet";

pub const MIN_BET_LAMPORTS: u64 = 10_000_000; // 0.01 SOL
pub const MAX_BET_LAMPORTS: u64 = 10_000_000_000; // 10 SOL
pub const MIN_ROLL: u8 = 2;
pub const MAX_ROLL: u8 = 96;
pub const HOUSE_EDGE: u16 = 150; // bps
pub const BPS_DENOM: u64 = 10_000;
pub const REFUND_TIMEOUT_SLOTS: u64 = 150; // ~1 minute

/// Maps a house signature to a roll in `1..=100`: the two little-endian
/// halves of `sha256(sig)` are added (wrapping) and reduced mod 100.
pub fn roll_from_signature(sig: &[u8]) -> u8 {
    let digest = hash(sig).to_bytes();
    let mut half = [0u8; 16];
    half.copy_from_slice(&digest[..16]);
    let lower = u128::from_le_bytes(half);
    half.copy_from_slice(&digest[16..]);
    let upper = u128::from_le_bytes(half);
    (lower.wrapping_add(upper) % 100) as u8 + 1
}

/// Winning payout for a bet of `amount` on `roll`, house edge applied.
pub fn payout(amount: u64, roll: u8) -> Option<u64> {
    let odds = (roll as u128).checked_sub(1).filter(|odds| *odds > 0)?;
    let gross = (amount as u128).checked_mul((BPS_DENOM - HOUSE_EDGE as u64) as u128)?;
    u64::try_from(gross.checked_div(odds)?.checked_div(100)?).ok()
}

pub mod helpers {
    use super::*;

    pub fn transfer_to_vault<'info>(
        amount: u64,
        from: &Signer<'info>,
        vault: &SystemAccount<'info>,
        system_program: &Program<'info, System>,
    ) -> Result<()> {
        require!(from.lamports() >= amount, DiceError::InsufficientFunds);
        anchor_lang::system_program::transfer(
            CpiContext::new(
                system_program.to_account_info(),
                anchor_lang::system_program::Transfer {
                    from: from.to_account_info(),
                    to: vault.to_account_info(),
                },
            ),
            amount,
        )
    }

    pub fn transfer_from_vault<'info>(
        amount: u64,
        vault: &SystemAccount<'info>,
        to: &AccountInfo<'info>,
        system_program: &Program<'info, System>,
        seeds: &[&[u8]],
    ) -> Result<()> {
        // the vault may be drained to zero but never left below rent exemption
        let remaining = vault
            .lamports()
            .checked_sub(amount)
            .ok_or(DiceError::InsufficientFunds)?;
        require!(
            remaining == 0 || remaining >= Rent::get()?.minimum_balance(0),
            DiceError::InsufficientFunds
        );
        anchor_lang::system_program::transfer(
            CpiContext::new_with_signer(
                system_program.to_account_info(),
                anchor_lang::system_program::Transfer {
                    from: vault.to_account_info(),
                    to: to.clone(),
                },
                &[seeds],
            ),
            amount,
        )
    }

    /// Checks that instruction 0 of the transaction is an Ed25519 precompile
    /// verifying `sig` by `house` over the serialized bet.
    pub fn verify_house_signature(
        instructions: &AccountInfo,
        house: &Pubkey,
        bet: &Bet,
        sig: &[u8],
    ) -> Result<()> {
        let ix = load_instruction_at_checked(0, instructions)?;
        require_keys_eq!(ix.program_id, ed25519_program::ID, DiceError::Ed25519Program);
        require_eq!(ix.accounts.len(), 0, DiceError::Ed25519Accounts);

        let signatures = ed25519::parse(&ix.data)?;
        require_eq!(signatures.len(), 1, DiceError::Ed25519DataLength);
        let signature = &signatures[0];
        require!(signature.is_inline, DiceError::Ed25519Header);

        let signer = signature.public_key.ok_or(DiceError::Ed25519Pubkey)?;
        require_keys_eq!(signer, *house, DiceError::Ed25519Pubkey);
        require!(signature.signature == Some(sig), DiceError::Ed25519Signature);

        let mut expected = Vec::with_capacity(Bet::INIT_SPACE);
        bet.serialize(&mut expected)
            .map_err(|_| DiceError::Ed25519Signature)?;
        require!(
            signature.message == Some(expected.as_slice()),
            DiceError::Ed25519Signature
        );
        Ok(())
    }
}

#[program]
pub mod dice {
    use super::*;
    use crate::helpers::{transfer_from_vault, transfer_to_vault, verify_house_signature};

    pub fn initialize(ctx: Context<Initialize>, amount: u64) -> Result<()> {
        require!(amount > 0, DiceError::ZeroAmount);
        transfer_to_vault(
            amount,
            &ctx.accounts.house,
            &ctx.accounts.vault,
            &ctx.accounts.system_program,
        )?;

        msg!("vault {} funded with {} lamports", ctx.accounts.vault.key(), amount);
        emit!(VaultFunded {
            house: ctx.accounts.house.key(),
            vault: ctx.accounts.vault.key(),
            amount,
        });
        Ok(())
    }

    pub fn place_bet(ctx: Context<PlaceBet>, seed: u128, roll: u8, amount: u64) -> Result<()> {
        require!(amount >= MIN_BET_LAMPORTS, DiceError::MinimumBet);
        require!(amount <= MAX_BET_LAMPORTS, DiceError::MaximumBet);
        require!(roll >= MIN_ROLL, DiceError::MinimumRoll);
        require!(roll <= MAX_ROLL, DiceError::MaximumRoll);

        let slot = Clock::get()?.slot;
        let player = ctx.accounts.player.key();
        ctx.accounts.bet.set_inner(Bet {
            amount,
            player,
            slot,
            seed,
            roll,
            bump: ctx.bumps.bet,
            randomness_account: ctx.accounts.randomness_account.key(),
            commit_slot: slot,
            is_resolved: false,
        });

        transfer_to_vault(
            amount,
            &ctx.accounts.player,
            &ctx.accounts.vault,
            &ctx.accounts.system_program,
        )?;

        emit!(BetPlaced {
            player,
            seed,
            roll,
            amount,
            slot,
        });
        Ok(())
    }

    pub fn resolve_bet(ctx: Context<ResolveBet>, sig: Vec<u8>) -> Result<()> {
        let house = ctx.accounts.house.key();
        verify_house_signature(
            &ctx.accounts.instruction_sysvar,
            &house,
            &ctx.accounts.bet,
            &sig,
        )?;

        let bet = &ctx.accounts.bet;
        require!(!bet.is_resolved, DiceError::BetAlreadyResolved);

        let roll = roll_from_signature(&sig);
        let won = bet.roll > roll;
        let mut paid = 0;
        if won {
            paid = payout(bet.amount, bet.roll).ok_or(DiceError::Overflow)?;
            let bump = [ctx.bumps.vault];
            let seeds: &[&[u8]] = &[VAULT_SEED, house.as_ref(), &bump];
            transfer_from_vault(
                paid,
                &ctx.accounts.vault,
                &ctx.accounts.player.to_account_info(),
                &ctx.accounts.system_program,
                seeds,
            )?;
        }

        msg!("bet rolled {} against {}: won={} payout={}", roll, bet.roll, won, paid);
        emit!(BetResolved {
            player: bet.player,
            seed: bet.seed,
            roll,
            won,
            payout: paid,
        });
        Ok(())
    }

    pub fn refund_bet(ctx: Context<RefundBet>) -> Result<()> {
        let bet = &ctx.accounts.bet;
        require!(!bet.is_resolved, DiceError::BetAlreadyResolved);

        let now = Clock::get()?.slot;
        require!(
            now.saturating_sub(bet.commit_slot) >= REFUND_TIMEOUT_SLOTS,
            DiceError::RefundNotEligible
        );

        let amount = bet.amount;
        let house = ctx.accounts.house.key();
        let bump = [ctx.bumps.vault];
        let seeds: &[&[u8]] = &[VAULT_SEED, house.as_ref(), &bump];
        transfer_from_vault(
            amount,
            &ctx.accounts.vault,
            &ctx.accounts.player.to_account_info(),
            &ctx.accounts.system_program,
            seeds,
        )?;

        let bet = &mut ctx.accounts.bet;
        bet.is_resolved = true;
        emit!(BetRefunded {
            player: bet.player,
            seed: bet.seed,
            amount,
        });
        Ok(())
    }
}

#[account]
#[derive(InitSpace)]
pub struct Bet {
    pub amount: u64,
    pub player: Pubkey,
    pub slot: u64,
    pub seed: u128,
    /// Player wins when the rolled number is below this value.
    pub roll: u8,
    pub bump: u8,
    pub randomness_account: Pubkey,
    pub commit_slot: u64,
    pub is_resolved: bool,
}

#[derive(Accounts)]
pub struct Initialize<'info> {
    #[account(mut)]
    pub house: Signer<'info>,
    #[account(
        mut,
        seeds = [VAULT_SEED, house.key().as_ref()],
        bump
    )]
    pub vault: SystemAccount<'info>,
    pub system_program: Program<'info, System>,
}

#[derive(Accounts)]
#[instruction(seed: u128)]
pub struct PlaceBet<'info> {
    #[account(mut)]
    pub player: Signer<'info>,
    /// CHECK: House authority; only used to derive the vault address
    pub house: UncheckedAccount<'info>,
    #[account(
        mut,
        seeds = [VAULT_SEED, house.key().as_ref()],
        bump
    )]
    pub vault: SystemAccount<'info>,
    #[account(
        init,
        payer = player,
        space = 8 + Bet::INIT_SPACE,
        seeds = [BET_SEED, player.key().as_ref(), seed.to_le_bytes().as_ref()],
        bump
    )]
    pub bet: Account<'info, Bet>,
    /// CHECK: Recorded on the bet, never read
    pub randomness_account: UncheckedAccount<'info>,
    pub system_program: Program<'info, System>,
}

#[derive(Accounts)]
pub struct ResolveBet<'info> {
    #[account(mut)]
    pub house: Signer<'info>,
    /// CHECK: Bound to the bet through `has_one`; receives the payout and the bet rent
    #[account(mut)]
    pub player: UncheckedAccount<'info>,
    #[account(
        mut,
        seeds = [VAULT_SEED, house.key().as_ref()],
        bump
    )]
    pub vault: SystemAccount<'info>,
    #[account(
        mut,
        close = player,
        seeds = [BET_SEED, player.key().as_ref(), bet.seed.to_le_bytes().as_ref()],
        bump = bet.bump,
        has_one = player @ DiceError::NotPlayerBet
    )]
    pub bet: Account<'info, Bet>,
    /// CHECK: Address checked against the instructions sysvar id
    #[account(address = anchor_lang::solana_program::sysvar::instructions::ID)]
    pub instruction_sysvar: AccountInfo<'info>,
    pub system_program: Program<'info, System>,
}

#[derive(Accounts)]
pub struct RefundBet<'info> {
    #[account(mut)]
    pub player: Signer<'info>,
    /// CHECK: House authority; only used to derive the vault address
    pub house: UncheckedAccount<'info>,
    #[account(
        mut,
        seeds = [VAULT_SEED, house.key().as_ref()],
        bump
    )]
    pub vault: SystemAccount<'info>,
    #[account(
        mut,
        close = player,
        seeds = [BET_SEED, player.key().as_ref(), bet.seed.to_le_bytes().as_ref()],
        bump = bet.bump,
        has_one = player @ DiceError::NotPlayerBet
    )]
    pub bet: Account<'info, Bet>,
    pub system_program: Program<'info, System>,
}

#[event]
pub struct VaultFunded {
    pub house: Pubkey,
    pub vault: Pubkey,
    pub amount: u64,
}

#[event]
pub struct BetPlaced {
    pub player: Pubkey,
    pub seed: u128,
    pub roll: u8,
    pub amount: u64,
    pub slot: u64,
}

#[event]
pub struct BetResolved {
    pub player: Pubkey,
    pub seed: u128,
    pub roll: u8,
    pub won: bool,
    pub payout: u64,
}

#[event]
pub struct BetRefunded {
    pub player: Pubkey,
    pub seed: u128,
    pub amount: u64,
}

#[error_code]
pub enum DiceError {
    #[msg("Bet has already been resolved")]
    BetAlreadyResolved,
    #[msg("Insufficient funds")]
    InsufficientFunds,
    #[msg("Bet does not belong to the player")]
    NotPlayerBet,
    #[msg("Refund not yet eligible - wait more slots")]
    RefundNotEligible,
    #[msg("Bet amount below minimum")]
    MinimumBet,
    #[msg("Bet amount above maximum")]
    MaximumBet,
    #[msg("Roll prediction below minimum")]
    MinimumRoll,
    #[msg("Roll prediction above maximum")]
    MaximumRoll,
    #[msg("Amount must be greater than zero")]
    ZeroAmount,
    #[msg("Invalid Ed25519 program")]
    Ed25519Program,
    #[msg("Ed25519 instruction should have no accounts")]
    Ed25519Accounts,
    #[msg("Invalid Ed25519 data length")]
    Ed25519DataLength,
    #[msg("Invalid Ed25519 header")]
    Ed25519Header,
    #[msg("Invalid Ed25519 public key")]
    Ed25519Pubkey,
    #[msg("Invalid Ed25519 signature")]
    Ed25519Signature,
    #[msg("Arithmetic overflow")]
    Overflow,
}
