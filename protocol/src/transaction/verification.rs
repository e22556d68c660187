//! Transaction verification.
//!
//! [`verify_transaction`] is the gate every transaction passes before it
//! enters the pool or a block. It is a pure predicate: every authenticity
//! failure is `false`, never an error or a panic. The decision chain
//! short-circuits in this order:
//!
//! 1. batch (`tx_list`) bodies are accepted as-is;
//! 2. unrecognized operations are rejected;
//! 3. trusted origins with `skip_verif` are accepted without cryptography;
//! 4. otherwise the signature must recover to the claimed address over the
//!    signing data.

use rayon::prelude::*;

use super::builder::Transaction;
use super::diagnostics::{Diagnostic, DiagnosticSink, NoopSink};
use super::types::Body;
use crate::crypto::signatures::ec_verify_sig;

pub fn verify_transaction(tx: &Transaction) -> bool {
    verify_transaction_with(tx, &NoopSink)
}

/// [`verify_transaction`], reporting the decision to `sink`.
pub fn verify_transaction_with(tx: &Transaction, sink: &dyn DiagnosticSink) -> bool {
    let op = match tx.body().body {
        Body::Batch(_) => {
            sink.emit(Diagnostic::BatchAccepted { hash: tx.hash() });
            return true;
        }
        Body::Single(ref op) => op,
    };

    if !op.is_recognized() {
        sink.emit(Diagnostic::UnrecognizedOperation { hash: tx.hash() });
        return false;
    }

    if tx.skip_verif() {
        sink.emit(Diagnostic::SkippedVerification {
            hash: tx.hash(),
            address: tx.address(),
        });
        return true;
    }

    let ok = ec_verify_sig(&tx.signing_data(), tx.signature(), tx.address());
    if !ok {
        sink.emit(Diagnostic::SignatureRejected {
            hash: tx.hash(),
            address: tx.address(),
        });
    }
    ok
}

/// Verifies independent transactions in parallel. Results line up with the
/// input slice.
pub fn verify_all(txs: &[Transaction]) -> Vec<bool> {
    verify_all_with(txs, &NoopSink)
}

pub fn verify_all_with(txs: &[Transaction], sink: &dyn DiagnosticSink) -> Vec<bool> {
    txs.par_iter()
        .map(|tx| verify_transaction_with(tx, sink))
        .collect()
}
