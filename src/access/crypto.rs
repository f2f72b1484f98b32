//! Admission proof: AES-CBC with a zero IV and no padding, applied to the
//! 16 raw bytes of a client's `client_id`. This is a one-block MAC-like
//! construct, *not* a general-purpose MAC — the secret must never be reused
//! across clients, and the primitive is preserved exactly (no padding, zero
//! IV) for wire compatibility with existing clients.

use aes::cipher::{BlockEncryptMut, KeyIvInit};
use cbc::cipher::block_padding::NoPadding;
use thiserror::Error;
use uuid::Uuid;

pub const ADMISSION_PROOF_LEN: usize = 16;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CryptoError {
    #[error("admission secret must be 16, 24 or 32 bytes, got {0}")]
    UnsupportedKeyLength(usize),
}

/// Compute `AES-CBC(key=secret, iv=zeros, padding=none)` over the 16 raw
/// bytes of `client_id`. The key length selects AES-128/192/256.
pub fn compute_admission_proof(
    secret: &[u8],
    client_id: Uuid,
) -> Result<[u8; ADMISSION_PROOF_LEN], CryptoError> {
    let plaintext = *client_id.as_bytes();

    let ciphertext = match secret.len() {
        16 => {
            let iv = [0u8; ADMISSION_PROOF_LEN];
            cbc::Encryptor::<aes::Aes128>::new(secret.into(), (&iv).into())
                .encrypt_padded_vec_mut::<NoPadding>(&plaintext)
        }
        24 => {
            let iv = [0u8; ADMISSION_PROOF_LEN];
            cbc::Encryptor::<aes::Aes192>::new(secret.into(), (&iv).into())
                .encrypt_padded_vec_mut::<NoPadding>(&plaintext)
        }
        32 => {
            let iv = [0u8; ADMISSION_PROOF_LEN];
            cbc::Encryptor::<aes::Aes256>::new(secret.into(), (&iv).into())
                .encrypt_padded_vec_mut::<NoPadding>(&plaintext)
        }
        other => return Err(CryptoError::UnsupportedKeyLength(other)),
    };

    let mut out = [0u8; ADMISSION_PROOF_LEN];
    out.copy_from_slice(&ciphertext);
    Ok(out)
}

/// Byte-wise compare a client-supplied proof against the one this secret
/// would produce. Constant-time is not required here: the comparison target
/// (the ciphertext) carries no secret material of its own.
pub fn verify_admission_proof(
    secret: &[u8],
    client_id: Uuid,
    encrypted_client_id: &[u8],
) -> Result<bool, CryptoError> {
    let expected = compute_admission_proof(secret, client_id)?;
    Ok(expected.as_slice() == encrypted_client_id)
}
