//! Numeric engines of the binomial mechanism: the noisy sum and the
//! auxiliary value.

// Copyright (c) 2023 Bolt Labs Holdings, Inc
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

use crate::{
    bits::BitVector,
    errors::{CallerError, Result},
};
use std::iter::Sum;
use tracing::error;

/// Result of running the binomial mechanism over a session's noise bits.
///
/// All intermediate values are retained unrounded for display and audit; the
/// one-way ceiling is applied only to the published [`estimate`].
///
/// The published estimate and the committed sum are distinct values. The
/// estimate centers the binomial noise by subtracting `nb / 2`; the
/// [`committed_sum`] is the raw integer `true_count + Σ noise_bits`, which is
/// exactly what the homomorphic product of the session's commitments encodes
/// and therefore what goes into the combined commitment.
///
/// [`estimate`]: NoisySum::estimate
/// [`committed_sum`]: NoisySum::committed_sum
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NoisySum {
    sum_noise: u64,
    offset: f64,
    noise: f64,
    estimate: i64,
    committed_sum: u64,
}

impl NoisySum {
    /// Sum of the noise bits.
    pub fn sum_noise(&self) -> u64 {
        self.sum_noise
    }

    /// The centering offset `nb / 2`, real-valued and never rounded.
    pub fn offset(&self) -> f64 {
        self.offset
    }

    /// The centered noise `Σ noise_bits − nb / 2`.
    pub fn noise(&self) -> f64 {
        self.noise
    }

    /// The published differentially-private estimate
    /// `ceil(true_count + Σ noise_bits − nb / 2)`.
    pub fn estimate(&self) -> i64 {
        self.estimate
    }

    /// The raw sum `true_count + Σ noise_bits` bound by the combined
    /// commitment.
    pub fn committed_sum(&self) -> u64 {
        self.committed_sum
    }
}

/// Run the binomial mechanism: combine the true count with the noise bits.
///
/// Fails with [`CallerError::PreconditionNotMet`] if `noise_bits` is empty or
/// `nb` is zero, and with [`CallerError::LengthMismatch`] if the noise vector
/// does not have exactly `nb` bits.
pub fn noisy_sum(true_count: u64, noise_bits: &BitVector, nb: usize) -> Result<NoisySum> {
    if noise_bits.is_empty() || nb == 0 {
        error!("Noisy sum requires a non-empty noise vector and a positive bit length");
        Err(CallerError::PreconditionNotMet)?;
    }
    if noise_bits.len() != nb {
        error!(
            "Noise vector has {} bits but the session expects {}",
            noise_bits.len(),
            nb
        );
        Err(CallerError::LengthMismatch)?;
    }

    let sum_noise = noise_bits.count_ones();
    let offset = nb as f64 / 2.0;
    let noise = sum_noise as f64 - offset;
    let estimate = (true_count as f64 + noise).ceil() as i64;

    Ok(NoisySum {
        sum_noise,
        offset,
        noise,
        estimate,
        committed_sum: true_count + sum_noise,
    })
}

/// Compute the auxiliary value `z = Σr + Σs` from the randomness used in the
/// input commitments (`r`) and the noise-bit commitments (`s`).
///
/// Generic over the commitment engine's randomness type; with the Pedersen
/// engine these are group scalars.
pub fn auxiliary_value<T, I, J>(input_randomness: I, bit_randomness: J) -> T
where
    T: Sum<T>,
    I: IntoIterator<Item = T>,
    J: IntoIterator<Item = T>,
{
    input_randomness
        .into_iter()
        .chain(bit_randomness)
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::InternalError;

    #[test]
    fn worked_example_with_761_noise_bits() {
        // 761 noise bits of which 380 are set, true count 500:
        // noise = 380 - 380.5 = -0.5, estimate = ceil(499.5) = 500.
        let mut raw = vec![1u8; 380];
        raw.extend_from_slice(&vec![0u8; 381]);
        let noise_bits = BitVector::from_bits(&raw);
        let sum = noisy_sum(500, &noise_bits, 761).unwrap();
        assert_eq!(sum.sum_noise(), 380);
        assert_eq!(sum.offset(), 380.5);
        assert_eq!(sum.noise(), -0.5);
        assert_eq!(sum.estimate(), 500);
        assert_eq!(sum.committed_sum(), 880);
    }

    #[test]
    fn ceiling_is_one_way() {
        // Even number of bits: noise is integral, no rounding happens.
        let noise_bits = BitVector::from_bits(&[1, 1, 0, 0]);
        let sum = noisy_sum(10, &noise_bits, 4).unwrap();
        assert_eq!(sum.estimate(), 10);

        // Odd number of bits: half-integer noise always rounds up.
        let noise_bits = BitVector::from_bits(&[1, 0, 0]);
        let sum = noisy_sum(10, &noise_bits, 3).unwrap();
        assert_eq!(sum.noise(), -0.5);
        assert_eq!(sum.estimate(), 10);
    }

    #[test]
    fn deterministic_for_fixed_inputs() {
        let noise_bits = BitVector::from_bits(&[1, 0, 1, 1, 0]);
        let first = noisy_sum(7, &noise_bits, 5).unwrap();
        let second = noisy_sum(7, &noise_bits, 5).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn rejects_empty_noise_vector() {
        let empty = BitVector::from_bits(&[]);
        assert_eq!(
            noisy_sum(5, &empty, 0).unwrap_err(),
            InternalError::CallingApplicationMistake(CallerError::PreconditionNotMet)
        );
    }

    #[test]
    fn rejects_length_mismatch() {
        let noise_bits = BitVector::from_bits(&[1, 0]);
        assert_eq!(
            noisy_sum(5, &noise_bits, 3).unwrap_err(),
            InternalError::CallingApplicationMistake(CallerError::LengthMismatch)
        );
    }

    #[test]
    fn auxiliary_value_sums_both_sequences() {
        let z: i64 = auxiliary_value(vec![1i64, 2, 3], vec![10i64, 20]);
        assert_eq!(z, 36);
    }
}
