use std::sync::Arc;

use anchor_client::{
    solana_sdk::{
        ed25519_program,
        instruction::Instruction,
        pubkey::Pubkey,
        signature::{read_keypair_file, Keypair, Signature},
        signer::Signer,
        system_program, sysvar,
    },
    Client, Program,
};
use anchor_lang::{AnchorSerialize, Space};
use dice::Bet;
use log::{debug, info};

use crate::config::ProviderConfig;
use crate::error::{ClientError, Result};

/// Typed handle to the dice program, paying and signing with one wallet.
pub struct DiceClient {
    program: Program<Arc<Keypair>>,
    payer: Arc<Keypair>,
}

impl DiceClient {
    /// Loads the wallet named by `config` and resolves the program handle.
    pub fn connect(config: &ProviderConfig) -> Result<Self> {
        config.validate()?;
        let payer = read_keypair_file(&config.wallet_path).map_err(|err| ClientError::Wallet {
            path: config.wallet_path.clone(),
            reason: err.to_string(),
        })?;
        Self::with_payer(config, Arc::new(payer))
    }

    pub fn with_payer(config: &ProviderConfig, payer: Arc<Keypair>) -> Result<Self> {
        config.validate()?;
        debug!(
            "dice client on {} ({:?}) as {}",
            config.cluster_url,
            config.commitment.commitment,
            payer.pubkey()
        );
        let client = Client::new_with_options(config.cluster(), payer.clone(), config.commitment);
        let program = client.program(dice::ID)?;
        Ok(Self { program, payer })
    }

    pub fn payer(&self) -> Pubkey {
        self.payer.pubkey()
    }

    pub fn vault_address(&self) -> Pubkey {
        vault_address(&self.payer())
    }

    pub fn bet_address(&self, player: &Pubkey, seed: u128) -> Pubkey {
        bet_address(player, seed)
    }

    /// Funds the payer's vault with `amount` lamports.
    pub async fn initialize(&self, amount: u64) -> Result<Signature> {
        let house = self.payer();
        let signature = self
            .program
            .request()
            .accounts(dice::accounts::Initialize {
                house,
                vault: vault_address(&house),
                system_program: system_program::ID,
            })
            .args(dice::instruction::Initialize { amount })
            .send()
            .await?;
        info!("initialize signature: {signature}");
        Ok(signature)
    }

    /// Places a bet from the payer against `house`'s vault.
    pub async fn place_bet(
        &self,
        house: &Pubkey,
        seed: u128,
        roll: u8,
        amount: u64,
        randomness_account: Pubkey,
    ) -> Result<Signature> {
        let player = self.payer();
        let signature = self
            .program
            .request()
            .accounts(dice::accounts::PlaceBet {
                player,
                house: *house,
                vault: vault_address(house),
                bet: bet_address(&player, seed),
                randomness_account,
                system_program: system_program::ID,
            })
            .args(dice::instruction::PlaceBet { seed, roll, amount })
            .send()
            .await?;
        info!("place_bet signature: {signature}");
        Ok(signature)
    }

    /// Resolves `player`'s bet with the payer acting as house: the bet is
    /// signed with the payer key and the proof rides in front of the call.
    pub async fn resolve_bet(&self, player: &Pubkey, seed: u128) -> Result<Signature> {
        let house = self.payer();
        let bet = bet_address(player, seed);
        let state = self.fetch_bet(player, seed).await?;

        let mut message = Vec::with_capacity(Bet::INIT_SPACE);
        state
            .serialize(&mut message)
            .map_err(|err| ClientError::Other(format!("failed to serialize bet: {err}")))?;
        let (proof, sig) = house_signature_ix(&self.payer, &message);
        debug!("bet {bet} rolls {}", dice::roll_from_signature(&sig));

        let signature = self
            .program
            .request()
            .instruction(proof)
            .accounts(dice::accounts::ResolveBet {
                house,
                player: *player,
                vault: vault_address(&house),
                bet,
                instruction_sysvar: sysvar::instructions::ID,
                system_program: system_program::ID,
            })
            .args(dice::instruction::ResolveBet { sig })
            .send()
            .await?;
        info!("resolve_bet signature: {signature}");
        Ok(signature)
    }

    /// Reclaims the payer's stake from `house`'s vault after the timeout.
    pub async fn refund_bet(&self, house: &Pubkey, seed: u128) -> Result<Signature> {
        let player = self.payer();
        let signature = self
            .program
            .request()
            .accounts(dice::accounts::RefundBet {
                player,
                house: *house,
                vault: vault_address(house),
                bet: bet_address(&player, seed),
                system_program: system_program::ID,
            })
            .args(dice::instruction::RefundBet {})
            .send()
            .await?;
        info!("refund_bet signature: {signature}");
        Ok(signature)
    }

    pub async fn fetch_bet(&self, player: &Pubkey, seed: u128) -> Result<Bet> {
        Ok(self.program.account::<Bet>(bet_address(player, seed)).await?)
    }
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

/// Ed25519 precompile instruction over `message` signed by `house`, plus the
/// raw signature bytes the program expects as its argument.
pub fn house_signature_ix(house: &Keypair, message: &[u8]) -> (Instruction, Vec<u8>) {
    let signature = house.sign_message(message);
    let mut sig = [0u8; 64];
    sig.copy_from_slice(signature.as_ref());
    let data = dice::ed25519::new_instruction_data(&house.pubkey().to_bytes(), &sig, message);
    (
        Instruction {
            program_id: ed25519_program::ID,
            accounts: vec![],
            data,
        },
        sig.to_vec(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn addresses_are_program_derived() {
        let house = Pubkey::new_unique();
        let vault = vault_address(&house);
        assert!(!vault.is_on_curve());
        assert_ne!(vault, vault_address(&Pubkey::new_unique()));

        let player = Pubkey::new_unique();
        assert_ne!(bet_address(&player, 1), bet_address(&player, 2));
    }

    #[test]
    fn house_signature_ix_carries_verifiable_proof() {
        let house = Keypair::new();
        let (ix, sig) = house_signature_ix(&house, b"bet");

        assert_eq!(ix.program_id, ed25519_program::ID);
        assert!(ix.accounts.is_empty());
        let parsed = dice::ed25519::parse(&ix.data).unwrap();
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].public_key, Some(house.pubkey()));
        assert_eq!(parsed[0].signature, Some(sig.as_slice()));
        assert_eq!(parsed[0].message, Some(&b"bet"[..]));

        let signature = Signature::try_from(sig.as_slice()).unwrap();
        assert!(signature.verify(house.pubkey().as_ref(), b"bet"));
    }
}
