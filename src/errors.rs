//! Error types for the verifiable binomial mechanism.
//!
//! The crate distinguishes mistakes made by the calling application
//! ([`CallerError`]) from failures of the cryptographic collaborators and
//! broken internal invariants ([`InternalError`]). A rejected verification is
//! deliberately *not* an error; it is reported through
//! [`Verdict`](crate::session::Verdict).

// Copyright (c) 2023 Bolt Labs Holdings, Inc
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

use thiserror::Error;

/// The default Result type used in this crate.
pub type Result<T> = std::result::Result<T, InternalError>;

/// Errors triggered by the calling application.
///
/// These are recoverable: no session state is mutated when one is returned,
/// so the caller can fix its input and retry the same operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CallerError {
    /// A privacy parameter or sampling probability was outside its domain.
    #[error("A privacy parameter or probability was outside its valid domain")]
    InvalidParameter,
    /// Two bit vectors of unequal length were combined.
    #[error("Bit vectors of unequal length were given to a combining operation")]
    LengthMismatch,
    /// A numeric engine was called with arguments that violate its
    /// precondition (for example, an empty noise vector).
    #[error("An engine precondition was not met")]
    PreconditionNotMet,
    /// A protocol step was invoked before its predecessor completed, or on a
    /// session in the wrong state.
    #[error("A protocol step was invoked out of order or on a session in the wrong state")]
    ProtocolViolation,
    /// The given session identifier is unknown or expired.
    #[error("No session exists for the given identifier")]
    SessionNotFound,
}

/// Errors that can occur while running the protocol.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InternalError {
    /// The calling application made a mistake; see [`CallerError`].
    #[error("The calling application made a mistake: {0}")]
    CallingApplicationMistake(#[from] CallerError),
    /// An external commitment, proof, or coin-flip call failed. The current
    /// step was aborted without mutating session state and may be retried.
    #[error("A cryptographic collaborator call failed: {0}")]
    CollaboratorFailure(String),
    /// Something went wrong that shouldn't be possible. This indicates a bug
    /// in this crate.
    #[error("An internal invariant was violated")]
    InternalInvariantFailed,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn caller_errors_convert_to_internal_errors() {
        let err: InternalError = CallerError::ProtocolViolation.into();
        assert_eq!(
            err,
            InternalError::CallingApplicationMistake(CallerError::ProtocolViolation)
        );
    }
}
