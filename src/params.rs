//! Differential-privacy parameters and the noise-length formula.

// Copyright (c) 2023 Bolt Labs Holdings, Inc
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

use crate::errors::{CallerError, Result};
use serde::{Deserialize, Serialize};
use tracing::error;

/// Validated (ε, δ) differential-privacy parameters for a session.
///
/// The parameters determine how many noise bits the binomial mechanism needs
/// via [`noise_length`](PrivacyParams::noise_length). They are validated at
/// construction, so a `PrivacyParams` value always satisfies `ε > 0` and
/// `0 < δ < 1`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PrivacyParams {
    epsilon: f64,
    delta: f64,
}

impl PrivacyParams {
    /// Construct parameters, checking `epsilon > 0` and `0 < delta < 1`.
    pub fn new(epsilon: f64, delta: f64) -> Result<Self> {
        if !epsilon.is_finite() || epsilon <= 0.0 {
            error!("Epsilon must be a positive real. Got: {}", epsilon);
            Err(CallerError::InvalidParameter)?;
        }
        if !delta.is_finite() || delta <= 0.0 || delta >= 1.0 {
            error!("Delta must lie strictly between 0 and 1. Got: {}", delta);
            Err(CallerError::InvalidParameter)?;
        }
        Ok(Self { epsilon, delta })
    }

    /// The ε privacy parameter.
    pub fn epsilon(&self) -> f64 {
        self.epsilon
    }

    /// The δ privacy parameter.
    pub fn delta(&self) -> f64 {
        self.delta
    }

    /// Number of noise bits the mechanism requires for these parameters:
    /// `ceil((10/ε)² · ln(2/δ))`.
    ///
    /// The result fixes the length of every bit vector in the session. It is
    /// deterministic and non-increasing as ε grows (for fixed δ).
    pub fn noise_length(&self) -> Result<usize> {
        let raw = (10.0 / self.epsilon).powi(2) * (2.0 / self.delta).ln();
        if !raw.is_finite() || raw <= 0.0 {
            error!(
                "Noise length is not representable for epsilon={}, delta={}",
                self.epsilon, self.delta
            );
            Err(CallerError::InvalidParameter)?;
        }
        Ok(raw.ceil() as usize)
    }
}
