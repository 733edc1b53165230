//! A verifiable binomial mechanism for differentially private counts.
//!
//! This crate implements the protocol core of a system in which a data
//! curator publishes a differentially private sum of binary client inputs
//! together with cryptographic evidence that the noise was generated
//! honestly. Binomial noise is built bit by bit: the curator samples private
//! random bits, commits to them, proves each committed bit is binary, and
//! then XORs them with public bits produced by a two-party coin-flip
//! exchange. Because the public bits are unbiased, the resulting noise bits
//! are unbiased regardless of how the curator chose its private bits.
//!
//! Every client input and every noise bit is bound by a Pedersen commitment.
//! The homomorphic product of those commitments must equal the curator's
//! combined commitment to the noisy sum and the auxiliary randomness value;
//! the final verification step checks exactly this equality and reports a
//! [`Verdict`]. Any tampering with the noise bits after commitment makes the
//! two sides disagree.
//!
//! # Overview of protocol steps
//!
//! A [`SessionRunner`] drives one session through the following steps, in
//! order:
//!
//! 1. **Input.** The session is created with the curator's binary dataset.
//! 2. **Commit inputs.** Each input is Pedersen-committed.
//! 3. **Set privacy parameters.** The (ε, δ) pair fixes the number of noise
//!    bits via `ceil((10/ε)² · ln(2/δ))`.
//! 4. **Sample bits.** The curator draws its private bits under a
//!    [`SamplingPolicy`]; until committed they may be edited or re-drawn.
//! 5. **Commit bits.** Each private bit is committed, freezing the vector.
//! 6. **Prove binary.** A Sigma-OR proof shows each committed bit is 0 or 1.
//! 7. **Coin flip.** A Morra commit-reveal exchange yields public bits.
//! 8. **XOR.** Private and public bits combine into the noise vector; the
//!    bit commitments are updated in lockstep.
//! 9. **Compute sum.** The binomial mechanism produces the noisy estimate.
//! 10. **Compute z.** The auxiliary value sums all commitment randomness.
//! 11. **Commit output.** The sum and z are bound in a single commitment.
//! 12. **Verify.** The homomorphic consistency check accepts or rejects.
//!
//! The cryptography sits behind the [`CommitmentEngine`] and [`CoinFlip`]
//! traits in the [`collaborator`] module; [`PedersenEngine`] and
//! [`MorraCoinFlip`] are the production implementations. A [`SessionStore`]
//! manages many concurrent sessions for an embedding service.
//!
//! [`Verdict`]: session::Verdict
//! [`SessionRunner`]: session::SessionRunner
//! [`SamplingPolicy`]: bits::SamplingPolicy
//! [`CommitmentEngine`]: collaborator::CommitmentEngine
//! [`CoinFlip`]: collaborator::CoinFlip
//! [`PedersenEngine`]: collaborator::PedersenEngine
//! [`MorraCoinFlip`]: collaborator::MorraCoinFlip
//! [`SessionStore`]: store::SessionStore

// Copyright (c) Facebook, Inc. and its affiliates.
// Modifications Copyright (c) 2022-2023 Bolt Labs Holdings, Inc
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]
#![warn(unused_results)]

pub mod bits;
pub mod collaborator;
pub mod errors;
pub mod mechanism;
pub mod params;
mod protocol;
pub mod session;
pub mod store;
mod utils;

pub use bits::{BitVector, SamplingPolicy};
pub use collaborator::{CoinFlip, CommitmentEngine, MorraCoinFlip, PedersenEngine};
pub use errors::{CallerError, InternalError};
pub use mechanism::NoisySum;
pub use params::PrivacyParams;
pub use protocol::SessionId;
pub use session::{SessionRunner, Status, Step, Verdict};
pub use store::SessionStore;
