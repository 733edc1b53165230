//! Cryptographic collaborator seams.
//!
//! The orchestration core never performs group arithmetic itself; it consumes
//! commitment values, randomness values, and proof-validity results through
//! the [`CommitmentEngine`] and [`CoinFlip`] traits. The production
//! implementations are [`PedersenEngine`] (Pedersen commitments over the
//! Ristretto group with Sigma-OR binary proofs) and [`MorraCoinFlip`] (a
//! two-party commit-reveal coin flip). Deterministic fakes for exercising the
//! orchestration logic in isolation live in the test-only [`testing`] module.

// Copyright (c) 2023 Bolt Labs Holdings, Inc
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

mod coinflip;
mod pedersen;
#[cfg(test)]
pub(crate) mod testing;

pub use coinflip::MorraCoinFlip;
pub use pedersen::{BitProof, PedersenEngine};

use crate::{bits::BitVector, errors::Result};
use rand::{CryptoRng, RngCore};
use std::{fmt::Debug, iter::Sum};

/// A binding, hiding commitment scheme with the homomorphic structure the
/// protocol's final consistency check relies on.
///
/// Commitment values are opaque to the orchestrator: the only operations it
/// needs are the ones below, and the only predicate it applies is exact
/// equality of two commitment values.
pub trait CommitmentEngine {
    /// An opaque commitment value.
    type Commitment: Clone + PartialEq + Debug;
    /// The randomness used to open a commitment. Randomness values add, and
    /// their sum is the auxiliary value `z` committed alongside the sum.
    type Randomness: Clone + Debug + Sum<Self::Randomness>;
    /// A zero-knowledge proof that a commitment opens to 0 or 1.
    type Proof: Clone + Debug;

    /// Commit to each bit of `bits`, returning one (commitment, randomness)
    /// pair per bit.
    fn commit_bits<R: RngCore + CryptoRng>(
        &self,
        rng: &mut R,
        bits: &BitVector,
    ) -> Result<Vec<(Self::Commitment, Self::Randomness)>>;

    /// Produce a Sigma-OR proof that `commitment` opens to a bit, given the
    /// opening `(bit, randomness)`.
    fn prove_bit<R: RngCore + CryptoRng>(
        &self,
        rng: &mut R,
        bit: u8,
        commitment: &Self::Commitment,
        randomness: &Self::Randomness,
    ) -> Result<Self::Proof>;

    /// Check a Sigma-OR binary proof against its commitment. An invalid proof
    /// is a collaborator failure, not a caller mistake.
    fn verify_bit(&self, commitment: &Self::Commitment, proof: &Self::Proof) -> Result<()>;

    /// Update a bit commitment under a public coin-flip bit so that it
    /// commits to `bit XOR public_bit`, mapping the opening randomness
    /// accordingly. Updating under a zero public bit is the identity.
    fn xor_update(
        &self,
        commitment: &Self::Commitment,
        randomness: &Self::Randomness,
        public_bit: u8,
    ) -> (Self::Commitment, Self::Randomness);

    /// Homomorphic product of a sequence of commitments: the result commits
    /// to the sum of the committed values under the sum of their randomness.
    fn sum_commitments<'a, I>(&self, commitments: I) -> Self::Commitment
    where
        I: IntoIterator<Item = &'a Self::Commitment>,
        Self::Commitment: 'a;

    /// The combined commitment `Com(value, randomness)` binding the noisy sum
    /// to the auxiliary value.
    fn commit_sum(&self, value: u64, randomness: &Self::Randomness) -> Self::Commitment;
}

/// A two-party coin-flip exchange producing unbiased public bits.
pub trait CoinFlip {
    /// Run the exchange, producing `n` public bits.
    fn flip<R: RngCore + CryptoRng>(&mut self, rng: &mut R, n: usize) -> Result<BitVector>;
}
