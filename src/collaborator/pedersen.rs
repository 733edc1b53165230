//! Pedersen commitments over the Ristretto group, with Sigma-OR binary
//! proofs.
//!
//! A commitment to `m` with randomness `r` is `g·m + h·r` for fixed group
//! elements `g` (the Ristretto basepoint) and `h` (derived by hashing to the
//! group, so its discrete log is unknown). The scheme is additively
//! homomorphic: the sum of two commitments commits to the sum of the values
//! under the sum of the randomness, which is exactly the structure the
//! protocol's final consistency check exploits.

// Copyright (c) 2023 Bolt Labs Holdings, Inc
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

use crate::{
    bits::BitVector,
    collaborator::CommitmentEngine,
    errors::{InternalError, Result},
};
use curve25519_dalek::{
    constants::RISTRETTO_BASEPOINT_POINT, ristretto::RistrettoPoint, scalar::Scalar,
    traits::Identity,
};
use merlin::Transcript;
use rand::{CryptoRng, RngCore};
use rayon::prelude::*;
use sha2::Sha512;
use tracing::error;

/// A [`CommitmentEngine`] backed by Pedersen commitments over Ristretto.
#[derive(Debug, Clone)]
pub struct PedersenEngine {
    g: RistrettoPoint,
    h: RistrettoPoint,
}

impl Default for PedersenEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl PedersenEngine {
    /// Create an engine with the standard basepoint and a blinding base
    /// whose discrete log is unknown to everyone.
    pub fn new() -> Self {
        Self {
            g: RISTRETTO_BASEPOINT_POINT,
            h: RistrettoPoint::hash_from_bytes::<Sha512>(b"vbm pedersen blinding base"),
        }
    }

    fn commit(&self, message: Scalar, randomness: Scalar) -> RistrettoPoint {
        self.g * message + self.h * randomness
    }

    /// Fiat-Shamir challenge binding the commitment and both first-round
    /// announcements of the OR proof.
    fn challenge(
        commitment: &RistrettoPoint,
        t0: &RistrettoPoint,
        t1: &RistrettoPoint,
    ) -> Scalar {
        let mut transcript = Transcript::new(b"vbm sigma-or bit proof");
        transcript.append_message(b"com", commitment.compress().as_bytes());
        transcript.append_message(b"t0", t0.compress().as_bytes());
        transcript.append_message(b"t1", t1.compress().as_bytes());
        let mut buf = [0u8; 64];
        transcript.challenge_bytes(b"challenge", &mut buf);
        Scalar::from_bytes_mod_order_wide(&buf)
    }
}

fn bit_scalar(bit: u8) -> Scalar {
    if bit == 0 {
        Scalar::ZERO
    } else {
        Scalar::ONE
    }
}

/// A zero-knowledge proof that a Pedersen commitment opens to 0 or 1,
/// without revealing which.
///
/// Standard OR-composition of two Schnorr proofs: one branch proves
/// knowledge of `r` with `C = h·r` (the committed bit is 0), the other
/// proves it for `C − g = h·r` (the bit is 1). The branch the prover cannot
/// satisfy is simulated, and the two branch challenges are forced to add up
/// to the Fiat-Shamir challenge.
#[derive(Debug, Clone, PartialEq)]
pub struct BitProof {
    t0: RistrettoPoint,
    t1: RistrettoPoint,
    c0: Scalar,
    c1: Scalar,
    z0: Scalar,
    z1: Scalar,
}

impl CommitmentEngine for PedersenEngine {
    type Commitment = RistrettoPoint;
    type Randomness = Scalar;
    type Proof = BitProof;

    fn commit_bits<R: RngCore + CryptoRng>(
        &self,
        rng: &mut R,
        bits: &BitVector,
    ) -> Result<Vec<(Self::Commitment, Self::Randomness)>> {
        let randomness: Vec<Scalar> = (0..bits.len()).map(|_| Scalar::random(rng)).collect();
        Ok(bits
            .as_slice()
            .par_iter()
            .zip(randomness.par_iter())
            .map(|(&bit, &r)| (self.commit(bit_scalar(bit), r), r))
            .collect())
    }

    fn prove_bit<R: RngCore + CryptoRng>(
        &self,
        rng: &mut R,
        bit: u8,
        commitment: &Self::Commitment,
        randomness: &Self::Randomness,
    ) -> Result<Self::Proof> {
        // Branch statements: `a0 = h·r` iff the bit is 0, `a1 = h·r` iff 1.
        let a0 = *commitment;
        let a1 = commitment - self.g;

        // Simulate the branch we can't satisfy, run the real one honestly.
        let c_sim = Scalar::random(rng);
        let z_sim = Scalar::random(rng);
        let w = Scalar::random(rng);
        let t_real = self.h * w;

        let (t0, t1) = if bit == 0 {
            (t_real, self.h * z_sim - a1 * c_sim)
        } else {
            (self.h * z_sim - a0 * c_sim, t_real)
        };

        let c = Self::challenge(commitment, &t0, &t1);
        let c_real = c - c_sim;
        let z_real = w + c_real * randomness;

        let proof = if bit == 0 {
            BitProof {
                t0,
                t1,
                c0: c_real,
                c1: c_sim,
                z0: z_real,
                z1: z_sim,
            }
        } else {
            BitProof {
                t0,
                t1,
                c0: c_sim,
                c1: c_real,
                z0: z_sim,
                z1: z_real,
            }
        };
        Ok(proof)
    }

    fn verify_bit(&self, commitment: &Self::Commitment, proof: &Self::Proof) -> Result<()> {
        let a0 = *commitment;
        let a1 = commitment - self.g;

        let c = Self::challenge(commitment, &proof.t0, &proof.t1);
        let challenge_ok = proof.c0 + proof.c1 == c;
        let branch0_ok = self.h * proof.z0 == proof.t0 + a0 * proof.c0;
        let branch1_ok = self.h * proof.z1 == proof.t1 + a1 * proof.c1;

        if !(challenge_ok && branch0_ok && branch1_ok) {
            error!("Sigma-OR binary proof failed verification");
            return Err(InternalError::CollaboratorFailure(
                "binary proof did not verify against its commitment".into(),
            ));
        }
        Ok(())
    }

    fn xor_update(
        &self,
        commitment: &Self::Commitment,
        randomness: &Self::Randomness,
        public_bit: u8,
    ) -> (Self::Commitment, Self::Randomness) {
        if public_bit == 0 {
            (*commitment, *randomness)
        } else {
            // Com(1, 1) − Com(b, r) commits to 1 − b = b XOR 1 with
            // randomness 1 − r.
            (
                self.commit(Scalar::ONE, Scalar::ONE) - commitment,
                Scalar::ONE - randomness,
            )
        }
    }

    fn sum_commitments<'a, I>(&self, commitments: I) -> Self::Commitment
    where
        I: IntoIterator<Item = &'a Self::Commitment>,
    {
        commitments
            .into_iter()
            .fold(RistrettoPoint::identity(), |sum, c| sum + c)
    }

    fn commit_sum(&self, value: u64, randomness: &Self::Randomness) -> Self::Commitment {
        self.commit(Scalar::from(value), *randomness)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{bits::SamplingPolicy, utils::testing::init_testing};

    #[test]
    fn commitments_are_additively_homomorphic() {
        let mut rng = init_testing();
        let engine = PedersenEngine::new();
        let (a, r) = (Scalar::from(17u64), Scalar::random(&mut rng));
        let (b, s) = (Scalar::from(25u64), Scalar::random(&mut rng));
        assert_eq!(
            engine.commit(a, r) + engine.commit(b, s),
            engine.commit(a + b, r + s)
        );
    }

    #[test]
    fn commit_bits_open_correctly() {
        let mut rng = init_testing();
        let engine = PedersenEngine::new();
        let bits = BitVector::from_bits(&[1, 0, 1, 1, 0]);
        let pairs = engine.commit_bits(&mut rng, &bits).unwrap();
        assert_eq!(pairs.len(), 5);
        for (&bit, (com, r)) in bits.as_slice().iter().zip(pairs.iter()) {
            assert_eq!(*com, engine.commit(bit_scalar(bit), *r));
        }
    }

    #[test]
    fn xor_update_flips_the_committed_bit() {
        let mut rng = init_testing();
        let engine = PedersenEngine::new();
        for bit in 0..2u8 {
            let r = Scalar::random(&mut rng);
            let com = engine.commit(bit_scalar(bit), r);

            let (updated, updated_r) = engine.xor_update(&com, &r, 1);
            assert_eq!(updated, engine.commit(bit_scalar(bit ^ 1), updated_r));

            let (unchanged, unchanged_r) = engine.xor_update(&com, &r, 0);
            assert_eq!(unchanged, com);
            assert_eq!(unchanged_r, r);
        }
    }

    #[test]
    fn bit_proofs_verify_for_both_bits() {
        let mut rng = init_testing();
        let engine = PedersenEngine::new();
        for bit in 0..2u8 {
            let r = Scalar::random(&mut rng);
            let com = engine.commit(bit_scalar(bit), r);
            let proof = engine.prove_bit(&mut rng, bit, &com, &r).unwrap();
            assert!(engine.verify_bit(&com, &proof).is_ok());
        }
    }

    #[test]
    fn bit_proof_rejects_non_binary_commitment() {
        let mut rng = init_testing();
        let engine = PedersenEngine::new();
        let r = Scalar::random(&mut rng);
        let com = engine.commit(Scalar::from(2u64), r);
        // The prover claims the bit is 1 but holds a commitment to 2; the
        // real branch has no valid witness, so verification must fail.
        let proof = engine.prove_bit(&mut rng, 1, &com, &r).unwrap();
        assert!(engine.verify_bit(&com, &proof).is_err());
    }

    #[test]
    fn tampered_proof_is_rejected() {
        let mut rng = init_testing();
        let engine = PedersenEngine::new();
        let r = Scalar::random(&mut rng);
        let com = engine.commit(Scalar::ONE, r);
        let mut proof = engine.prove_bit(&mut rng, 1, &com, &r).unwrap();
        proof.z0 += Scalar::ONE;
        assert!(engine.verify_bit(&com, &proof).is_err());
    }

    #[test]
    fn summing_no_commitments_gives_a_commitment_to_zero() {
        let engine = PedersenEngine::new();
        let sum = engine.sum_commitments(std::iter::empty::<&RistrettoPoint>());
        assert_eq!(sum, engine.commit(Scalar::ZERO, Scalar::ZERO));
    }

    #[test]
    fn sum_of_bit_commitments_matches_combined_commitment() {
        let mut rng = init_testing();
        let engine = PedersenEngine::new();
        let bits = BitVector::sample(&mut rng, 32, SamplingPolicy::Uniform).unwrap();
        let pairs = engine.commit_bits(&mut rng, &bits).unwrap();

        let lhs = engine.sum_commitments(pairs.iter().map(|(c, _)| c));
        let z: Scalar = pairs.iter().map(|(_, r)| *r).sum();
        let rhs = engine.commit_sum(bits.count_ones(), &z);
        assert_eq!(lhs, rhs);
    }
}
