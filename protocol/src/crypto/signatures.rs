//! # Recoverable Signatures
//!
//! secp256k1 ECDSA signatures carrying a recovery byte, so the signer's
//! public key (and therefore address) can be derived from the message hash
//! and the signature alone.
//!
//! ## Wire format
//!
//! A transaction signature is the hex string
//!
//! ```text
//! 0x ‖ signing_hash (32 bytes) ‖ r (32) ‖ s (32) ‖ v (1)
//! ```
//!
//! Only the trailing 65 bytes are the signature proper. The leading signing
//! hash lets a verifier check that the signature was made over the data it
//! is being asked to accept. A bare 65-byte `r ‖ s ‖ v` is also accepted; the
//! verifier then uses the hash it recomputes.
//!
//! `v` is `27 + recovery_id`. Raw recovery ids `0`/`1` are accepted on input.

use libsecp256k1::{Message, RecoveryId, Signature};
use serde_json::Value;
use thiserror::Error;

use super::hash::hash_transaction;
use super::keys::{strip_hex_prefix, Address, LedgerKeypair};
use crate::config::{HASH_LENGTH, RECOVERABLE_SIGNATURE_LENGTH, RECOVERY_ID_OFFSET};

/// Errors during signature decoding and recovery.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SignatureError {
    #[error("signature is not valid hex")]
    InvalidEncoding,

    #[error("signature too short: expected at least {expected} bytes, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    #[error("invalid hash: expected 32 hex-encoded bytes")]
    InvalidHash,

    #[error("invalid recovery byte: {0}")]
    InvalidRecoveryId(u8),

    #[error("malformed signature: r or s out of range")]
    MalformedSignature,

    #[error("public key recovery failed")]
    RecoveryFailed,
}

/// The `r ‖ s ‖ v` components of a recoverable signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecoverableSignature {
    bytes: [u8; RECOVERABLE_SIGNATURE_LENGTH],
}

impl RecoverableSignature {
    /// Parses exactly 65 bytes. No range checks happen until recovery.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, SignatureError> {
        let arr: [u8; RECOVERABLE_SIGNATURE_LENGTH] =
            bytes.try_into().map_err(|_| SignatureError::InvalidLength {
                expected: RECOVERABLE_SIGNATURE_LENGTH,
                actual: bytes.len(),
            })?;
        Ok(Self { bytes: arr })
    }

    pub fn r(&self) -> &[u8] {
        &self.bytes[..32]
    }

    pub fn s(&self) -> &[u8] {
        &self.bytes[32..64]
    }

    pub fn v(&self) -> u8 {
        self.bytes[64]
    }

    /// Normalizes `v` to a raw recovery id in `0..=3`.
    pub fn recovery_id(&self) -> Result<u8, SignatureError> {
        match self.v() {
            v @ 0..=3 => Ok(v),
            v @ 27..=30 => Ok(v - RECOVERY_ID_OFFSET),
            v => Err(SignatureError::InvalidRecoveryId(v)),
        }
    }

    pub fn as_bytes(&self) -> &[u8; RECOVERABLE_SIGNATURE_LENGTH] {
        &self.bytes
    }
}

/// Decodes a signature string and splits it into the optional signing-hash
/// prefix and the trailing `r ‖ s ‖ v`.
pub fn split_signature(signature_hex: &str) -> Result<(Vec<u8>, RecoverableSignature), SignatureError> {
    let bytes =
        hex::decode(strip_hex_prefix(signature_hex)).map_err(|_| SignatureError::InvalidEncoding)?;
    if bytes.len() < RECOVERABLE_SIGNATURE_LENGTH {
        return Err(SignatureError::InvalidLength {
            expected: RECOVERABLE_SIGNATURE_LENGTH,
            actual: bytes.len(),
        });
    }
    let split = bytes.len() - RECOVERABLE_SIGNATURE_LENGTH;
    let sig = RecoverableSignature::from_bytes(&bytes[split..])?;
    Ok((bytes[..split].to_vec(), sig))
}

/// Signs a 32-byte message hash.
pub fn sign_hash(hash: &[u8; HASH_LENGTH], keypair: &LedgerKeypair) -> RecoverableSignature {
    let message = Message::parse(hash);
    let (sig, recovery_id) = libsecp256k1::sign(&message, keypair.secret());
    let mut bytes = [0u8; RECOVERABLE_SIGNATURE_LENGTH];
    bytes[..64].copy_from_slice(&sig.serialize());
    bytes[64] = recovery_id.serialize() + RECOVERY_ID_OFFSET;
    RecoverableSignature { bytes }
}

/// Signs transaction data, producing the `0x ‖ hash ‖ r ‖ s ‖ v` wire string.
///
/// The data is hashed exactly as given; callers decide whether that is a raw
/// client body or canonical signing data.
pub fn ec_sign_transaction(data: &Value, keypair: &LedgerKeypair) -> String {
    let hash = hash_transaction(data);
    let sig = sign_hash(&hash, keypair);
    format!("0x{}{}", hex::encode(hash), hex::encode(sig.as_bytes()))
}

/// Recovers the signer address from a message hash and signature.
pub fn recover_address(
    hash: &[u8; HASH_LENGTH],
    signature: &RecoverableSignature,
) -> Result<Address, SignatureError> {
    let recovery_id = RecoveryId::parse(signature.recovery_id()?)
        .map_err(|_| SignatureError::InvalidRecoveryId(signature.v()))?;
    let sig = Signature::parse_standard_slice(&signature.as_bytes()[..64])
        .map_err(|_| SignatureError::MalformedSignature)?;
    let message = Message::parse(hash);
    let public = libsecp256k1::recover(&message, &sig, &recovery_id)
        .map_err(|_| SignatureError::RecoveryFailed)?;
    Ok(Address::from_public_key(&public))
}

/// Derives the signer address of a transaction from its hex hash and its
/// signature string. Only the trailing 65 signature bytes are used.
pub fn get_address(hash_hex: &str, signature_hex: &str) -> Result<Address, SignatureError> {
    let hash_bytes =
        hex::decode(strip_hex_prefix(hash_hex)).map_err(|_| SignatureError::InvalidHash)?;
    let hash: [u8; HASH_LENGTH] = hash_bytes
        .as_slice()
        .try_into()
        .map_err(|_| SignatureError::InvalidHash)?;
    let (_, sig) = split_signature(signature_hex)?;
    recover_address(&hash, &sig)
}

/// Verifies that `signature_hex` was produced over `data` by `address`.
///
/// Returns `false` for every failure: undecodable signature, signing-hash
/// prefix that does not match `data`, failed recovery, or a recovered
/// address different from the claimed one.
pub fn ec_verify_sig(data: &Value, signature_hex: &str, address: &str) -> bool {
    let Ok(claimed) = address.parse::<Address>() else {
        return false;
    };
    let Ok((prefix, sig)) = split_signature(signature_hex) else {
        return false;
    };
    let expected = hash_transaction(data);
    if !prefix.is_empty() && prefix.as_slice() != expected.as_slice() {
        return false;
    }
    match recover_address(&expected, &sig) {
        Ok(recovered) => recovered == claimed,
        Err(_) => false,
    }
}
