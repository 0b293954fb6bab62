//! Reading and writing Ed25519 precompile instruction data.
//!
//! The precompile takes a two byte header (signature count, padding) followed
//! by one 14 byte offsets record per signature. Each record points at the
//! public key, signature and message, either inside the precompile
//! instruction itself (index `u16::MAX`) or inside another instruction of the
//! same transaction.

use anchor_lang::prelude::*;

use crate::DiceError;

pub const PUBKEY_LEN: usize = 32;
pub const SIGNATURE_LEN: usize = 64;
pub const HEADER_LEN: usize = 2;
pub const OFFSETS_LEN: usize = 14;

/// Instruction index meaning "this instruction".
pub const CURRENT_INSTRUCTION: u16 = u16::MAX;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Offsets {
    signature_offset: u16,
    signature_ix: u16,
    public_key_offset: u16,
    public_key_ix: u16,
    message_offset: u16,
    message_size: u16,
    message_ix: u16,
}

impl Offsets {
    fn read(data: &[u8], at: usize) -> Result<Self> {
        let field = |n: usize| read_u16(data, at + n * 2);
        Ok(Self {
            signature_offset: field(0)?,
            signature_ix: field(1)?,
            public_key_offset: field(2)?,
            public_key_ix: field(3)?,
            message_offset: field(4)?,
            message_size: field(5)?,
            message_ix: field(6)?,
        })
    }

    fn is_inline(&self) -> bool {
        self.signature_ix == CURRENT_INSTRUCTION
            && self.public_key_ix == CURRENT_INSTRUCTION
            && self.message_ix == CURRENT_INSTRUCTION
    }
}

/// One signature record. Fields are only populated when the referenced data
/// lives in the precompile instruction; data held by other instructions is
/// never resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ed25519Signature<'a> {
    pub is_inline: bool,
    pub public_key: Option<Pubkey>,
    pub signature: Option<&'a [u8]>,
    pub message: Option<&'a [u8]>,
}

fn read_u16(data: &[u8], at: usize) -> Result<u16> {
    let bytes = data.get(at..at + 2).ok_or(DiceError::Ed25519DataLength)?;
    Ok(u16::from_le_bytes([bytes[0], bytes[1]]))
}

fn slice(data: &[u8], offset: u16, len: usize) -> Result<&[u8]> {
    let start = offset as usize;
    let bytes = data
        .get(start..start + len)
        .ok_or(DiceError::Ed25519DataLength)?;
    Ok(bytes)
}

/// Parses every signature record in `data`.
pub fn parse(data: &[u8]) -> Result<Vec<Ed25519Signature<'_>>> {
    require_gte!(data.len(), HEADER_LEN, DiceError::Ed25519DataLength);
    let count = data[0] as usize;
    require_gte!(
        data.len(),
        HEADER_LEN + count * OFFSETS_LEN,
        DiceError::Ed25519DataLength
    );

    let mut signatures = Vec::with_capacity(count);
    for i in 0..count {
        let offsets = Offsets::read(data, HEADER_LEN + i * OFFSETS_LEN)?;
        if !offsets.is_inline() {
            signatures.push(Ed25519Signature {
                is_inline: false,
                public_key: None,
                signature: None,
                message: None,
            });
            continue;
        }

        let public_key = slice(data, offsets.public_key_offset, PUBKEY_LEN)?;
        let public_key = Pubkey::try_from(public_key).map_err(|_| DiceError::Ed25519Pubkey)?;
        signatures.push(Ed25519Signature {
            is_inline: true,
            public_key: Some(public_key),
            signature: Some(slice(data, offsets.signature_offset, SIGNATURE_LEN)?),
            message: Some(slice(
                data,
                offsets.message_offset,
                offsets.message_size as usize,
            )?),
        });
    }
    Ok(signatures)
}

/// Builds single-signature precompile data with everything stored inline:
/// public key at 16, signature at 48, message at 112.
pub fn new_instruction_data(
    public_key: &[u8; PUBKEY_LEN],
    signature: &[u8; SIGNATURE_LEN],
    message: &[u8],
) -> Vec<u8> {
    let public_key_offset = HEADER_LEN + OFFSETS_LEN;
    let signature_offset = public_key_offset + PUBKEY_LEN;
    let message_offset = signature_offset + SIGNATURE_LEN;

    let mut data = Vec::with_capacity(message_offset + message.len());
    data.extend_from_slice(&[1, 0]);
    for field in [
        signature_offset as u16,
        CURRENT_INSTRUCTION,
        public_key_offset as u16,
        CURRENT_INSTRUCTION,
        message_offset as u16,
        message.len() as u16,
        CURRENT_INSTRUCTION,
    ] {
        data.extend_from_slice(&field.to_le_bytes());
    }
    data.extend_from_slice(public_key);
    data.extend_from_slice(signature);
    data.extend_from_slice(message);
    data
}
