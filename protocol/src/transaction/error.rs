//! Structural construction errors.
//!
//! These are raised while turning a raw payload into a [`super::Transaction`]
//! and mean the caller never obtains a transaction at all. Authenticity
//! problems are not errors: they surface later as `false` from
//! [`super::verify_transaction`].

use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransactionError {
    /// The payload is not a JSON object.
    #[error("transaction payload must be a JSON object")]
    NotAnObject,

    /// A required field is absent.
    #[error("transaction must contain timestamp, nonce and one of operation or tx_list (missing {field})")]
    MissingField { field: &'static str },

    /// Both `operation` and `tx_list` were supplied.
    #[error("transaction must contain exactly one of operation or tx_list, not both")]
    AmbiguousBody,

    /// A field is present but has the wrong JSON type.
    #[error("malformed field {field}: {reason}")]
    MalformedField { field: &'static str, reason: String },
}

impl TransactionError {
    pub(crate) fn malformed(field: &'static str, reason: impl Into<String>) -> Self {
        Self::MalformedField {
            field,
            reason: reason.into(),
        }
    }
}
