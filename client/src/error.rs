use std::path::PathBuf;

use anchor_client::solana_client::client_error::{
    ClientError as SolanaClientError, ClientErrorKind,
};
use anchor_client::solana_sdk::{instruction::InstructionError, transaction::TransactionError};
use dice::DiceError;

pub type Result<T> = std::result::Result<T, ClientError>;

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("invalid provider config: {0}")]
    Config(String),
    #[error("failed to read wallet {path}: {reason}")]
    Wallet { path: PathBuf, reason: String },
    /// The cluster could not be reached; no transaction was confirmed.
    #[error("cluster unreachable: {0}")]
    Connectivity(String),
    /// The transaction reached the cluster and was rejected.
    #[error("transaction rejected: {reason}")]
    ProgramRejected { code: Option<u32>, reason: String },
    #[error("{0}")]
    Other(String),
}

impl ClientError {
    /// The dice program error behind a rejection, when the code is one of ours.
    pub fn dice_error(&self) -> Option<DiceError> {
        match self {
            ClientError::ProgramRejected { code: Some(code), .. } => dice_error(*code),
            _ => None,
        }
    }

    pub fn is_connectivity(&self) -> bool {
        matches!(self, ClientError::Connectivity(_))
    }
}

impl From<anchor_client::ClientError> for ClientError {
    fn from(err: anchor_client::ClientError) -> Self {
        match err {
            anchor_client::ClientError::SolanaClientError(err) => classify(&err),
            other => ClientError::Other(other.to_string()),
        }
    }
}

/// Splits RPC failures into rejections (the transaction carried an error)
/// and connectivity failures (transport never got an answer).
pub fn classify(err: &SolanaClientError) -> ClientError {
    if let Some(tx_err) = err.get_transaction_error() {
        let code = match &tx_err {
            TransactionError::InstructionError(_, InstructionError::Custom(code)) => Some(*code),
            _ => None,
        };
        let reason = match code.and_then(dice_error) {
            Some(dice) => format!("{dice:?}: {dice}"),
            None => tx_err.to_string(),
        };
        return ClientError::ProgramRejected { code, reason };
    }

    match err.kind() {
        ClientErrorKind::Io(_) | ClientErrorKind::Reqwest(_) => {
            ClientError::Connectivity(err.to_string())
        }
        _ => ClientError::Other(err.to_string()),
    }
}

/// Maps an on-chain error code back to its `DiceError`. Codes follow
/// declaration order from `ERROR_CODE_OFFSET`; `dice_error_codes_cover_every_variant`
/// breaks the build when a variant is added without a code here.
fn dice_error(code: u32) -> Option<DiceError> {
    use DiceError::*;
    let err = match code.checked_sub(anchor_lang::error::ERROR_CODE_OFFSET)? {
        0 => BetAlreadyResolved,
        1 => InsufficientFunds,
        2 => NotPlayerBet,
        3 => RefundNotEligible,
        4 => MinimumBet,
        5 => MaximumBet,
        6 => MinimumRoll,
        7 => MaximumRoll,
        8 => ZeroAmount,
        9 => Ed25519Program,
        10 => Ed25519Accounts,
        11 => Ed25519DataLength,
        12 => Ed25519Header,
        13 => Ed25519Pubkey,
        14 => Ed25519Signature,
        15 => Overflow,
        _ => return None,
    };
    Some(err)
}
