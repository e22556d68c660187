//! # Key Management
//!
//! secp256k1 keypairs and the account addresses derived from them.
//!
//! An account address is the last 20 bytes of the Keccak-256 hash of the
//! uncompressed public key (without its `0x04` tag byte). Addresses are
//! displayed with the EIP-55 mixed-case checksum so that transcription
//! errors are caught by anyone comparing the casing.
//!
//! Key bytes are never logged. `LedgerKeypair` has no `Debug` output for its
//! secret half and does not implement `Serialize`.

use libsecp256k1::{PublicKey, SecretKey};
use rand::rngs::OsRng;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use super::hash::keccak256;
use crate::config::{ADDRESS_LENGTH, SECRET_KEY_LENGTH};

/// Errors that can occur during key and address operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum KeyError {
    #[error("invalid secret key bytes: wrong length or not a valid scalar")]
    InvalidSecretKey,

    #[error("invalid public key bytes: not a valid secp256k1 point")]
    InvalidPublicKey,

    #[error("invalid address: {0}")]
    InvalidAddress(String),
}

/// A signing identity: a secp256k1 secret key and its public key.
///
/// # Examples
///
/// ```
/// use afan_protocol::crypto::keys::LedgerKeypair;
///
/// let kp = LedgerKeypair::generate();
/// let address = kp.address();
/// assert!(address.to_string().starts_with("0x"));
/// ```
#[derive(Clone)]
pub struct LedgerKeypair {
    secret: SecretKey,
    public: PublicKey,
}

impl LedgerKeypair {
    /// Generate a fresh keypair using the OS cryptographic RNG.
    pub fn generate() -> Self {
        let secret = SecretKey::random(&mut OsRng);
        let public = PublicKey::from_secret_key(&secret);
        Self { secret, public }
    }

    /// Reconstruct a keypair from raw 32-byte secret key material.
    ///
    /// Fails if the bytes are zero or not below the curve order.
    pub fn from_bytes(secret_key_bytes: &[u8; SECRET_KEY_LENGTH]) -> Result<Self, KeyError> {
        let secret = SecretKey::parse(secret_key_bytes).map_err(|_| KeyError::InvalidSecretKey)?;
        let public = PublicKey::from_secret_key(&secret);
        Ok(Self { secret, public })
    }

    /// Reconstruct a keypair from a hex-encoded secret key, with or without
    /// a `0x` prefix.
    pub fn from_hex(hex_str: &str) -> Result<Self, KeyError> {
        let stripped = strip_hex_prefix(hex_str.trim());
        let bytes = hex::decode(stripped).map_err(|_| KeyError::InvalidSecretKey)?;
        let arr: [u8; SECRET_KEY_LENGTH] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| KeyError::InvalidSecretKey)?;
        Self::from_bytes(&arr)
    }

    /// Raw secret key bytes. Handle with care.
    pub fn secret_key_bytes(&self) -> [u8; SECRET_KEY_LENGTH] {
        self.secret.serialize()
    }

    /// Hex-encoded secret key (no prefix).
    pub fn secret_hex(&self) -> String {
        hex::encode(self.secret_key_bytes())
    }

    /// The uncompressed 65-byte public key (`0x04 ‖ x ‖ y`).
    pub fn public_key_bytes(&self) -> [u8; 65] {
        self.public.serialize()
    }

    /// The account address controlled by this keypair.
    pub fn address(&self) -> Address {
        Address::from_public_key(&self.public)
    }

    pub(crate) fn secret(&self) -> &SecretKey {
        &self.secret
    }
}

impl fmt::Debug for LedgerKeypair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LedgerKeypair")
            .field("address", &self.address().to_string())
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Address
// ---------------------------------------------------------------------------

/// A 20-byte account identifier.
///
/// `Display` renders the EIP-55 checksummed form with a `0x` prefix.
/// Parsing is case-insensitive: the checksum casing is a presentation
/// concern, and two addresses are equal when their bytes are equal.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Address([u8; ADDRESS_LENGTH]);

impl Address {
    /// Wraps raw address bytes.
    pub fn from_bytes(bytes: [u8; ADDRESS_LENGTH]) -> Self {
        Self(bytes)
    }

    /// Derives the address of a secp256k1 public key.
    pub fn from_public_key(public: &PublicKey) -> Self {
        Self::from_uncompressed(&public.serialize())
    }

    /// Derives an address from a 65-byte uncompressed public key.
    pub fn from_uncompressed(public: &[u8; 65]) -> Self {
        let hash = keccak256(&public[1..]);
        let mut bytes = [0u8; ADDRESS_LENGTH];
        bytes.copy_from_slice(&hash[32 - ADDRESS_LENGTH..]);
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; ADDRESS_LENGTH] {
        &self.0
    }

    /// EIP-55 checksummed hex, `0x`-prefixed.
    pub fn to_checksum(&self) -> String {
        let lower = hex::encode(self.0);
        let hash = keccak256(lower.as_bytes());
        let mut out = String::with_capacity(2 + lower.len());
        out.push_str("0x");
        for (i, c) in lower.chars().enumerate() {
            let nibble = (hash[i / 2] >> (if i % 2 == 0 { 4 } else { 0 })) & 0x0f;
            if c.is_ascii_alphabetic() && nibble >= 8 {
                out.push(c.to_ascii_uppercase());
            } else {
                out.push(c);
            }
        }
        out
    }

    /// Returns `true` if `s` is already in checksummed form for this address.
    pub fn is_checksummed(s: &str) -> bool {
        match s.parse::<Address>() {
            Ok(addr) => addr.to_checksum() == s,
            Err(_) => false,
        }
    }
}

impl FromStr for Address {
    type Err = KeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let stripped = strip_hex_prefix(s);
        if stripped.len() != ADDRESS_LENGTH * 2 {
            return Err(KeyError::InvalidAddress(s.to_string()));
        }
        let bytes = hex::decode(stripped).map_err(|_| KeyError::InvalidAddress(s.to_string()))?;
        let mut arr = [0u8; ADDRESS_LENGTH];
        arr.copy_from_slice(&bytes);
        Ok(Self(arr))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_checksum())
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self.to_checksum())
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_checksum())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

pub(crate) fn strip_hex_prefix(s: &str) -> &str {
    s.strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .unwrap_or(s)
}
