//! Bit vectors, sampling policies, and the XOR noise combiner.
//!
//! The curator's inputs, its private randomness, the public coin-flip
//! outcome, and the noise vector are all ordered sequences over {0, 1}. This
//! module provides the single [`BitVector`] representation for them, the
//! sampling policies used to draw the curator's private bits, and the
//! element-wise XOR that turns private and public bits into noise bits.

// Copyright (c) 2023 Bolt Labs Holdings, Inc
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

use crate::errors::{CallerError, Result};
use rand::{CryptoRng, Rng, RngCore};
use serde::{Deserialize, Serialize};
use tracing::error;
use zeroize::Zeroize;

/// How the curator's private random bits are drawn.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum SamplingPolicy {
    /// Each bit is independently Bernoulli(0.5).
    Uniform,
    /// All bits start at zero, to be hand-edited before confirmation.
    Manual,
    /// Each bit is independently Bernoulli(p) for the given `p ∊ [0, 1]`.
    Weighted(f64),
}

/// A dense, ordered sequence over {0, 1}.
///
/// Zeroizable because some instances (the curator's private bits) are secret
/// randomness that should not outlive the session.
#[derive(Debug, Clone, PartialEq, Eq, Zeroize, Serialize, Deserialize)]
pub struct BitVector(Vec<u8>);

impl BitVector {
    /// Build a bit vector from raw bytes; any non-zero byte is taken as 1.
    pub fn from_bits(bits: &[u8]) -> Self {
        Self(bits.iter().map(|b| u8::from(*b != 0)).collect())
    }

    /// Sample `n` bits under the given policy.
    pub fn sample<R: RngCore + CryptoRng>(
        rng: &mut R,
        n: usize,
        policy: SamplingPolicy,
    ) -> Result<Self> {
        let bits = match policy {
            SamplingPolicy::Uniform => (0..n).map(|_| u8::from(rng.gen::<bool>())).collect(),
            SamplingPolicy::Manual => vec![0u8; n],
            SamplingPolicy::Weighted(p) => {
                if !(0.0..=1.0).contains(&p) {
                    error!("Sampling probability must lie in [0, 1]. Got: {}", p);
                    Err(CallerError::InvalidParameter)?;
                }
                (0..n).map(|_| u8::from(rng.gen_bool(p))).collect()
            }
        };
        Ok(Self(bits))
    }

    /// Number of bits.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the vector holds no bits.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The bits as a byte slice of 0s and 1s.
    pub fn as_slice(&self) -> &[u8] {
        &self.0
    }

    /// Sum of all bits.
    pub fn count_ones(&self) -> u64 {
        self.0.iter().map(|b| u64::from(*b)).sum()
    }

    /// Set every bit in the closed index range `[start, end]` to `value`.
    ///
    /// Repeating the same range-set is a no-op after the first application.
    pub fn paint_range(&mut self, start: usize, end: usize, value: u8) -> Result<()> {
        if start > end || end >= self.0.len() {
            error!(
                "Invalid paint range [{}, {}] for a vector of {} bits",
                start,
                end,
                self.0.len()
            );
            Err(CallerError::InvalidParameter)?;
        }
        let value = u8::from(value != 0);
        for bit in &mut self.0[start..=end] {
            *bit = value;
        }
        Ok(())
    }

    /// Element-wise exclusive-or of two equal-length bit vectors.
    ///
    /// This is the noise combiner: XOR of the curator's private bits with the
    /// public coin-flip bits yields the noise vector. The operation is
    /// commutative and self-inverse (`a.xor(a.xor(b)) == b`), which is what
    /// lets the commitment collaborator update bit commitments in lockstep.
    pub fn xor(&self, other: &Self) -> Result<Self> {
        if self.len() != other.len() {
            error!(
                "Cannot XOR bit vectors of different lengths: {} vs {}",
                self.len(),
                other.len()
            );
            Err(CallerError::LengthMismatch)?;
        }
        Ok(Self(
            self.0
                .iter()
                .zip(other.0.iter())
                .map(|(a, b)| a ^ b)
                .collect(),
        ))
    }
}
