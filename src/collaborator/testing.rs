//! Deterministic fake collaborators for exercising the orchestration logic
//! without group arithmetic.

use crate::{
    bits::BitVector,
    collaborator::{CoinFlip, CommitmentEngine},
    errors::{InternalError, Result},
};
use rand::{CryptoRng, Rng, RngCore};

/// A transparent "commitment" carrying the committed value and randomness
/// sums in the clear.
///
/// Addition is componentwise, so the fake has exactly the homomorphic
/// structure the consistency check relies on, while every intermediate value
/// stays inspectable in tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct FakeCommitment {
    pub value: i128,
    pub randomness: i128,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct FakeProof {
    bit: u8,
    randomness: i128,
}

#[derive(Debug, Default, Clone)]
pub(crate) struct FakeEngine;

impl CommitmentEngine for FakeEngine {
    type Commitment = FakeCommitment;
    type Randomness = i128;
    type Proof = FakeProof;

    fn commit_bits<R: RngCore + CryptoRng>(
        &self,
        rng: &mut R,
        bits: &BitVector,
    ) -> Result<Vec<(Self::Commitment, Self::Randomness)>> {
        Ok(bits
            .as_slice()
            .iter()
            .map(|&bit| {
                let randomness = i128::from(rng.gen::<u32>());
                (
                    FakeCommitment {
                        value: i128::from(bit),
                        randomness,
                    },
                    randomness,
                )
            })
            .collect())
    }

    fn prove_bit<R: RngCore + CryptoRng>(
        &self,
        _rng: &mut R,
        bit: u8,
        _commitment: &Self::Commitment,
        randomness: &Self::Randomness,
    ) -> Result<Self::Proof> {
        Ok(FakeProof {
            bit,
            randomness: *randomness,
        })
    }

    fn verify_bit(&self, commitment: &Self::Commitment, proof: &Self::Proof) -> Result<()> {
        let reopened = FakeCommitment {
            value: i128::from(proof.bit),
            randomness: proof.randomness,
        };
        if reopened != *commitment {
            return Err(InternalError::CollaboratorFailure(
                "fake binary proof did not reopen its commitment".into(),
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
            (
                FakeCommitment {
                    value: 1 - commitment.value,
                    randomness: 1 - commitment.randomness,
                },
                1 - randomness,
            )
        }
    }

    fn sum_commitments<'a, I>(&self, commitments: I) -> Self::Commitment
    where
        I: IntoIterator<Item = &'a Self::Commitment>,
    {
        commitments.into_iter().fold(
            FakeCommitment {
                value: 0,
                randomness: 0,
            },
            |sum, c| FakeCommitment {
                value: sum.value + c.value,
                randomness: sum.randomness + c.randomness,
            },
        )
    }

    fn commit_sum(&self, value: u64, randomness: &Self::Randomness) -> Self::Commitment {
        FakeCommitment {
            value: i128::from(value),
            randomness: *randomness,
        }
    }
}

/// A coin-flip collaborator that replays a fixed bit pattern, cycling when
/// the requested length exceeds the pattern.
#[derive(Debug, Clone)]
pub(crate) struct FixedCoinFlip(pub Vec<u8>);

impl CoinFlip for FixedCoinFlip {
    fn flip<R: RngCore + CryptoRng>(&mut self, _rng: &mut R, n: usize) -> Result<BitVector> {
        let bits: Vec<u8> = self.0.iter().cycle().take(n).copied().collect();
        Ok(BitVector::from_bits(&bits))
    }
}

/// A coin-flip collaborator that always fails, for exercising the
/// retry-without-mutation behavior of the state machine.
#[derive(Debug, Clone)]
pub(crate) struct FailingCoinFlip;

impl CoinFlip for FailingCoinFlip {
    fn flip<R: RngCore + CryptoRng>(&mut self, _rng: &mut R, _n: usize) -> Result<BitVector> {
        Err(InternalError::CollaboratorFailure(
            "coin-flip exchange unavailable".into(),
        ))
    }
}
