//! Diagnostic sink for engine decisions.
//!
//! The engine's construction and verification paths are pure; they never
//! log on their own. Callers that want visibility pass a [`DiagnosticSink`].
//! [`NoopSink`] is the default everywhere; [`TracingSink`] forwards events
//! to `tracing` and is what the node installs.

use std::sync::Arc;

/// An observation made while constructing or verifying a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Diagnostic<'a> {
    /// A transaction was assembled.
    Created {
        hash: &'a str,
        address: &'a str,
        trusted: bool,
    },
    /// Address recovery failed during assembly; the address is left empty.
    RecoveryFailed { hash: &'a str, reason: &'a str },
    /// A batch (`tx_list`) transaction was accepted without verification.
    BatchAccepted { hash: &'a str },
    /// The operation type is missing or not recognized.
    UnrecognizedOperation { hash: &'a str },
    /// A trusted-origin transaction skipped signature verification.
    SkippedVerification { hash: &'a str, address: &'a str },
    /// The signature did not verify against the claimed address.
    SignatureRejected { hash: &'a str, address: &'a str },
}

pub trait DiagnosticSink: Send + Sync {
    fn emit(&self, event: Diagnostic<'_>);
}

/// Discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSink;

impl DiagnosticSink for NoopSink {
    fn emit(&self, _event: Diagnostic<'_>) {}
}

/// Forwards events to `tracing`. Skipped verifications are logged at `warn`
/// since they bypass authentication; everything else at `debug`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
    fn emit(&self, event: Diagnostic<'_>) {
        match event {
            Diagnostic::Created {
                hash,
                address,
                trusted,
            } => tracing::debug!(%hash, %address, trusted, "transaction created"),
            Diagnostic::RecoveryFailed { hash, reason } => {
                tracing::debug!(%hash, %reason, "address recovery failed")
            }
            Diagnostic::BatchAccepted { hash } => {
                tracing::debug!(%hash, "batch transaction accepted without verification")
            }
            Diagnostic::UnrecognizedOperation { hash } => {
                tracing::debug!(%hash, "invalid transaction type")
            }
            Diagnostic::SkippedVerification { hash, address } => {
                tracing::warn!(%hash, %address, "skipping signature verification")
            }
            Diagnostic::SignatureRejected { hash, address } => {
                tracing::debug!(%hash, %address, "signature rejected")
            }
        }
    }
}

impl<T: DiagnosticSink + ?Sized> DiagnosticSink for Arc<T> {
    fn emit(&self, event: Diagnostic<'_>) {
        (**self).emit(event)
    }
}


#[cfg(test)]
mod tests {
    use super::testing::RecordingSink;
    use super::*;

    #[test]
    fn noop_sink_accepts_everything() {
        NoopSink.emit(Diagnostic::BatchAccepted { hash: "ab" });
    }

    #[test]
    fn arc_sink_forwards() {
        let sink = Arc::new(RecordingSink::default());
        let shared: Arc<dyn DiagnosticSink> = sink.clone();
        shared.emit(Diagnostic::UnrecognizedOperation { hash: "ab" });
        assert_eq!(sink.take(), vec!["unrecognized".to_string()]);
    }
}
