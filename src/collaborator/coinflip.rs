//! Morra coin flips: unbiased public bits from a two-party commit-reveal
//! exchange.

// Copyright (c) 2023 Bolt Labs Holdings, Inc
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

use crate::{
    bits::BitVector,
    collaborator::CoinFlip,
    errors::{InternalError, Result},
};
use rand::{CryptoRng, Rng, RngCore};
use sha2::{Digest, Sha256};

// Throws are drawn from an even-sized range so each party's throw parity is
// uniform; the sum's parity is then unbiased as long as either party plays
// honestly.
const THROW_RANGE: u8 = 4;

/// A [`CoinFlip`] collaborator running the Morra sub-protocol between the
/// curator and the verifier.
///
/// Each party picks a throw, commits to it with a salted hash,
/// and only reveals once it holds the other party's commitment. A revealed
/// throw that does not match its commitment aborts the exchange. The public
/// bit is the parity of the two throws, so it is unbiased as long as either
/// party's throw is uniform.
///
/// Both parties run in-process here; the exchange still performs the full
/// commit-reveal-check sequence so the transcript shape matches a networked
/// deployment.
#[derive(Debug, Default, Clone)]
pub struct MorraCoinFlip;

struct Throw {
    value: u8,
    salt: [u8; 32],
}

impl Throw {
    fn sample<R: RngCore + CryptoRng>(rng: &mut R) -> Self {
        let mut salt = [0u8; 32];
        rng.fill_bytes(&mut salt);
        Self {
            value: rng.gen_range(0..THROW_RANGE),
            salt,
        }
    }

    fn commitment(&self) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update(b"morra throw");
        hasher.update(self.salt);
        hasher.update([self.value]);
        hasher.finalize().into()
    }

    fn check_reveal(commitment: &[u8; 32], revealed: &Throw) -> Result<()> {
        if &revealed.commitment() != commitment {
            return Err(InternalError::CollaboratorFailure(
                "morra reveal did not match its commitment".into(),
            ));
        }
        Ok(())
    }
}

impl CoinFlip for MorraCoinFlip {
    fn flip<R: RngCore + CryptoRng>(&mut self, rng: &mut R, n: usize) -> Result<BitVector> {
        let mut bits = Vec::with_capacity(n);
        for _ in 0..n {
            let curator = Throw::sample(rng);
            let verifier = Throw::sample(rng);

            // Commitments are exchanged before either side reveals.
            let curator_commitment = curator.commitment();
            let verifier_commitment = verifier.commitment();
            Throw::check_reveal(&curator_commitment, &curator)?;
            Throw::check_reveal(&verifier_commitment, &verifier)?;

            bits.push((curator.value + verifier.value) % 2);
        }
        Ok(BitVector::from_bits(&bits))
    }
}
