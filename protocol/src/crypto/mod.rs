//! # Cryptographic Primitives
//!
//! Everything the transaction engine needs to hash, sign and recover:
//!
//! - **Keccak-256** for transaction hashes and address derivation.
//! - **secp256k1 recoverable ECDSA** for signatures, so that the signer's
//!   address falls out of `(hash, signature)` without a key registry.
//! - **EIP-55** checksummed addresses.
//!
//! These are thin wrappers around `libsecp256k1` and `sha3`. Nothing here
//! holds state; every function is pure.

pub mod hash;
pub mod keys;
pub mod signatures;

pub use hash::{hash_transaction, hash_transaction_hex, keccak256, stable_stringify};
pub use keys::{Address, KeyError, LedgerKeypair};
pub use signatures::{
    ec_sign_transaction, ec_verify_sig, get_address, recover_address, RecoverableSignature,
    SignatureError,
};
