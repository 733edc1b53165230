//! The session state machine driving the verifiable binomial mechanism.
//!
//! # High-level protocol description
//! A session runs the following steps strictly forward:
//! - The curator supplies its raw binary dataset, then commits to every
//!   input.
//! - The privacy parameters (ε, δ) fix the number of noise bits, and the
//!   curator draws its private random bits under a sampling policy. Until
//!   the bits are committed they may be edited in place, and the parameters
//!   may be changed (invalidating any sampled bits).
//! - The private bits are committed and proven binary with Sigma-OR proofs.
//! - A Morra coin-flip exchange produces public bits, which are XORed with
//!   the private bits into the noise vector; the commitment engine updates
//!   the bit commitments in lockstep.
//! - The noisy sum and the auxiliary value z are computed and committed
//!   together.
//! - The verifier recomputes the homomorphic product of all input and
//!   noise-bit commitments and compares it against the combined commitment.
//!   Equality accepts the session; anything else rejects it.
//!
//! Between the XOR step and the sum computation, an explicit one-time side
//! path lets the operator overwrite the noise bits without touching their
//! commitments. This exists to demonstrate that tampering is caught by the
//! final check; it is closed permanently once the sum has been computed.

// Copyright (c) 2023 Bolt Labs Holdings, Inc
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

mod step;

pub use step::{can_enter, Step, STEP_ORDER};

use crate::{
    bits::{BitVector, SamplingPolicy},
    collaborator::{CoinFlip, CommitmentEngine},
    errors::{CallerError, InternalError, Result},
    mechanism::{self, NoisySum},
    params::PrivacyParams,
    protocol::SessionId,
};
use rand::{CryptoRng, RngCore};
use std::collections::HashSet;
use tracing::{error, info, instrument, warn};
use zeroize::Zeroize;

/// Terminal outcome of the verification step.
///
/// A rejection is a first-class protocol outcome ("tampering detected"), not
/// an error: transport and programming failures surface as
/// [`InternalError`](crate::errors::InternalError) instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// The homomorphic consistency check passed.
    Accepted,
    /// The two sides of the consistency check disagree.
    Rejected,
}

/// Lifecycle status of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// The session is still progressing through its steps.
    InProgress,
    /// Terminal: verification accepted the session.
    Verified,
    /// Terminal: verification detected an inconsistency.
    Rejected,
}

/// A single protocol session and the state machine that drives it.
///
/// The runner owns all session data plus its two collaborators, enforces the
/// forward step ordering, and applies each step's mutation atomically: a
/// failing step (including a failing collaborator round-trip) leaves the
/// session exactly as it was, so the same step can be retried.
#[derive(Debug)]
pub struct SessionRunner<E: CommitmentEngine, F: CoinFlip> {
    id: SessionId,
    engine: E,
    coin_flip: F,

    inputs: BitVector,
    true_count: u64,
    params: Option<PrivacyParams>,
    nb: Option<usize>,
    private_bits: Option<BitVector>,
    public_bits: Option<BitVector>,
    noise_bits: Option<BitVector>,

    input_commitments: Vec<E::Commitment>,
    input_randomness: Vec<E::Randomness>,
    bit_commitments: Vec<E::Commitment>,
    bit_randomness: Vec<E::Randomness>,
    noise_commitments: Vec<E::Commitment>,
    noise_randomness: Vec<E::Randomness>,

    inputs_committed: bool,
    bits_committed: bool,
    sum_committed: bool,
    tampered: bool,

    noisy: Option<NoisySum>,
    auxiliary: Option<E::Randomness>,
    combined_commitment: Option<E::Commitment>,

    completed: HashSet<Step>,
    furthest: Step,
    status: Status,
}

impl<E: CommitmentEngine, F: CoinFlip> SessionRunner<E, F> {
    /// Create a session from the curator's raw dataset. Any non-zero input
    /// byte is taken as 1. The dataset is immutable for the session's
    /// lifetime and must be non-empty.
    pub fn new<R: RngCore + CryptoRng>(
        rng: &mut R,
        engine: E,
        coin_flip: F,
        inputs: &[u8],
    ) -> Result<Self> {
        if inputs.is_empty() {
            error!("A session needs at least one client input");
            Err(CallerError::InvalidParameter)?;
        }
        let inputs = BitVector::from_bits(inputs);
        let true_count = inputs.count_ones();
        let id = SessionId::random(rng);
        info!("{id}: created session with {} client inputs", inputs.len());

        Ok(Self {
            id,
            engine,
            coin_flip,
            inputs,
            true_count,
            params: None,
            nb: None,
            private_bits: None,
            public_bits: None,
            noise_bits: None,
            input_commitments: Vec::new(),
            input_randomness: Vec::new(),
            bit_commitments: Vec::new(),
            bit_randomness: Vec::new(),
            noise_commitments: Vec::new(),
            noise_randomness: Vec::new(),
            inputs_committed: false,
            bits_committed: false,
            sum_committed: false,
            tampered: false,
            noisy: None,
            auxiliary: None,
            combined_commitment: None,
            completed: HashSet::from([Step::Input]),
            furthest: Step::Input,
            status: Status::InProgress,
        })
    }

    /// The session's identifier.
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Current lifecycle status.
    pub fn status(&self) -> Status {
        self.status
    }

    /// Sum of the client inputs.
    pub fn true_count(&self) -> u64 {
        self.true_count
    }

    /// The confirmed privacy parameters, if set.
    pub fn params(&self) -> Option<PrivacyParams> {
        self.params
    }

    /// The session's noise-bit count, once parameters are set.
    pub fn noise_length(&self) -> Option<usize> {
        self.nb
    }

    /// The curator's private bits, while they exist.
    pub fn private_bits(&self) -> Option<&BitVector> {
        self.private_bits.as_ref()
    }

    /// The public coin-flip bits, once received.
    pub fn public_bits(&self) -> Option<&BitVector> {
        self.public_bits.as_ref()
    }

    /// The noise vector, once combined.
    pub fn noise_bits(&self) -> Option<&BitVector> {
        self.noise_bits.as_ref()
    }

    /// The noisy-sum computation result, once run.
    pub fn noisy_sum(&self) -> Option<NoisySum> {
        self.noisy
    }

    /// The auxiliary value z, once computed.
    pub fn auxiliary(&self) -> Option<&E::Randomness> {
        self.auxiliary.as_ref()
    }

    /// Commitments to the client inputs.
    pub fn input_commitments(&self) -> &[E::Commitment] {
        &self.input_commitments
    }

    /// Commitments to the private bits (as originally committed).
    pub fn bit_commitments(&self) -> &[E::Commitment] {
        &self.bit_commitments
    }

    /// The XOR-updated bit commitments covering the noise vector.
    pub fn noise_commitments(&self) -> &[E::Commitment] {
        &self.noise_commitments
    }

    /// Steps completed so far. This set only ever grows.
    pub fn completed_steps(&self) -> &HashSet<Step> {
        &self.completed
    }

    /// Whether the client inputs have been committed.
    pub fn inputs_committed(&self) -> bool {
        self.inputs_committed
    }

    /// Whether the private bits have been committed (and thereby frozen).
    pub fn bits_committed(&self) -> bool {
        self.bits_committed
    }

    /// Whether the combined sum/auxiliary commitment has been made.
    pub fn sum_committed(&self) -> bool {
        self.sum_committed
    }

    fn ensure_step(&self, target: Step) -> Result<()> {
        if self.status != Status::InProgress {
            error!(
                "{}: session is terminal ({:?}); step {} is not allowed",
                self.id, self.status, target
            );
            Err(CallerError::ProtocolViolation)?;
        }
        if !step::can_enter(self.furthest, target, &self.completed) {
            error!(
                "{}: step {} is not reachable (furthest completed: {})",
                self.id, target, self.furthest
            );
            Err(CallerError::ProtocolViolation)?;
        }
        Ok(())
    }

    fn complete_step(&mut self, step: Step) {
        info!("{}: completed step {}", self.id, step);
        let _ = self.completed.insert(step);
        if step.index() > self.furthest.index() {
            self.furthest = step;
        }
    }

    /// Commit to every client input, returning one commitment per input.
    #[instrument(skip_all, err(Debug))]
    pub fn commit_inputs<R: RngCore + CryptoRng>(&mut self, rng: &mut R) -> Result<Vec<E::Commitment>> {
        self.ensure_step(Step::CommitInputs)?;
        if self.inputs_committed {
            error!("{}: client inputs are already committed", self.id);
            Err(CallerError::ProtocolViolation)?;
        }

        let pairs = self.engine.commit_bits(rng, &self.inputs)?;
        let (commitments, randomness): (Vec<_>, Vec<_>) = pairs.into_iter().unzip();
        self.input_commitments = commitments.clone();
        self.input_randomness = randomness;
        self.inputs_committed = true;
        self.complete_step(Step::CommitInputs);
        Ok(commitments)
    }

    /// Fix the privacy parameters, deriving the noise-bit count.
    ///
    /// May be called again before the private bits are committed; doing so
    /// invalidates (zeroizes) any previously sampled bits, since their length
    /// no longer matches the session.
    #[instrument(skip_all, err(Debug))]
    pub fn set_privacy_params(&mut self, epsilon: f64, delta: f64) -> Result<usize> {
        self.ensure_step(Step::SetPrivacyParams)?;
        if self.bits_committed {
            error!(
                "{}: privacy parameters are frozen once bits are committed",
                self.id
            );
            Err(CallerError::ProtocolViolation)?;
        }

        let params = PrivacyParams::new(epsilon, delta)?;
        let nb = params.noise_length()?;

        if let Some(mut stale) = self.private_bits.take() {
            warn!(
                "{}: changing privacy parameters invalidated previously sampled bits",
                self.id
            );
            stale.zeroize();
        }
        self.params = Some(params);
        self.nb = Some(nb);
        self.complete_step(Step::SetPrivacyParams);
        info!("{}: session needs {nb} noise bits", self.id);
        Ok(nb)
    }

    fn required_noise_length(&self) -> Result<usize> {
        self.nb.ok_or_else(|| {
            error!("{}: privacy parameters are not set", self.id);
            CallerError::ProtocolViolation.into()
        })
    }

    /// Draw the curator's private bits under the given policy.
    #[instrument(skip_all, err(Debug))]
    pub fn sample_bits<R: RngCore + CryptoRng>(
        &mut self,
        rng: &mut R,
        policy: SamplingPolicy,
    ) -> Result<()> {
        self.ensure_step(Step::SampleBits)?;
        if self.bits_committed {
            error!("{}: private bits are already committed", self.id);
            Err(CallerError::ProtocolViolation)?;
        }
        let nb = self.required_noise_length()?;
        let bits = BitVector::sample(rng, nb, policy)?;
        self.private_bits = Some(bits);
        self.complete_step(Step::SampleBits);
        Ok(())
    }

    /// Supply the private bits directly instead of sampling them. The vector
    /// must hold exactly the session's noise-bit count.
    #[instrument(skip_all, err(Debug))]
    pub fn submit_private_bits(&mut self, bits: &[u8]) -> Result<()> {
        self.ensure_step(Step::SampleBits)?;
        if self.bits_committed {
            error!("{}: private bits are already committed", self.id);
            Err(CallerError::ProtocolViolation)?;
        }
        let nb = self.required_noise_length()?;
        if bits.len() != nb {
            error!(
                "{}: submitted {} bits but the session needs {nb}",
                self.id,
                bits.len()
            );
            Err(CallerError::LengthMismatch)?;
        }
        self.private_bits = Some(BitVector::from_bits(bits));
        self.complete_step(Step::SampleBits);
        Ok(())
    }

    /// Set every private bit in the closed range `[start, end]` to `value`.
    /// Only available while the bits are still editable.
    #[instrument(skip_all, err(Debug))]
    pub fn paint_private_bits(&mut self, start: usize, end: usize, value: u8) -> Result<()> {
        self.ensure_step(Step::SampleBits)?;
        if self.bits_committed {
            error!("{}: private bits are already committed", self.id);
            Err(CallerError::ProtocolViolation)?;
        }
        match self.private_bits.as_mut() {
            None => {
                error!("{}: no private bits have been sampled", self.id);
                Err(CallerError::ProtocolViolation)?
            }
            Some(bits) => bits.paint_range(start, end, value),
        }
    }

    /// Commit to each private bit, freezing the bit vector.
    #[instrument(skip_all, err(Debug))]
    pub fn commit_private_bits<R: RngCore + CryptoRng>(
        &mut self,
        rng: &mut R,
    ) -> Result<Vec<E::Commitment>> {
        self.ensure_step(Step::CommitBits)?;
        if self.bits_committed {
            error!("{}: private bits are already committed", self.id);
            Err(CallerError::ProtocolViolation)?;
        }
        let bits = self.private_bits.as_ref().ok_or_else(|| {
            error!("{}: no private bits have been sampled", self.id);
            InternalError::from(CallerError::ProtocolViolation)
        })?;

        let pairs = self.engine.commit_bits(rng, bits)?;
        let (commitments, randomness): (Vec<_>, Vec<_>) = pairs.into_iter().unzip();
        self.bit_commitments = commitments.clone();
        self.bit_randomness = randomness;
        self.bits_committed = true;
        self.complete_step(Step::CommitBits);
        Ok(commitments)
    }

    /// Prove and check that every committed private bit is binary.
    #[instrument(skip_all, err(Debug))]
    pub fn prove_binary<R: RngCore + CryptoRng>(&mut self, rng: &mut R) -> Result<()> {
        self.ensure_step(Step::ProveBinary)?;
        let bits = self.private_bits.as_ref().ok_or_else(|| {
            error!("{}: no private bits exist to prove over", self.id);
            InternalError::from(CallerError::ProtocolViolation)
        })?;

        for ((&bit, commitment), randomness) in bits
            .as_slice()
            .iter()
            .zip(self.bit_commitments.iter())
            .zip(self.bit_randomness.iter())
        {
            let proof = self.engine.prove_bit(rng, bit, commitment, randomness)?;
            self.engine.verify_bit(commitment, &proof)?;
        }
        self.complete_step(Step::ProveBinary);
        Ok(())
    }

    /// Run the coin-flip exchange, fixing the session's public bits.
    #[instrument(skip_all, err(Debug))]
    pub fn run_coin_flip<R: RngCore + CryptoRng>(&mut self, rng: &mut R) -> Result<BitVector> {
        self.ensure_step(Step::CoinFlip)?;
        if self.completed.contains(&Step::CoinFlip) {
            error!("{}: public bits are immutable once received", self.id);
            Err(CallerError::ProtocolViolation)?;
        }
        let nb = self.required_noise_length()?;

        let bits = self.coin_flip.flip(rng, nb)?;
        if bits.len() != nb {
            error!(
                "{}: coin-flip collaborator returned {} bits instead of {nb}",
                self.id,
                bits.len()
            );
            return Err(InternalError::CollaboratorFailure(
                "coin-flip exchange returned the wrong number of bits".into(),
            ));
        }
        self.public_bits = Some(bits.clone());
        self.complete_step(Step::CoinFlip);
        Ok(bits)
    }

    /// XOR the private and public bits into the noise vector, updating the
    /// bit commitments in lockstep.
    #[instrument(skip_all, err(Debug))]
    pub fn xor_bits(&mut self) -> Result<BitVector> {
        self.ensure_step(Step::XorBits)?;
        if self.completed.contains(&Step::XorBits) {
            error!("{}: noise bits have already been combined", self.id);
            Err(CallerError::ProtocolViolation)?;
        }
        let private = self.private_bits.as_ref().ok_or_else(|| {
            error!("{}: no private bits exist to combine", self.id);
            InternalError::from(CallerError::ProtocolViolation)
        })?;
        let public = self.public_bits.as_ref().ok_or_else(|| {
            error!("{}: no public bits exist to combine", self.id);
            InternalError::from(CallerError::ProtocolViolation)
        })?;

        let noise = private.xor(public)?;
        let pairs: Vec<_> = self
            .bit_commitments
            .iter()
            .zip(self.bit_randomness.iter())
            .zip(public.as_slice().iter())
            .map(|((commitment, randomness), &public_bit)| {
                self.engine.xor_update(commitment, randomness, public_bit)
            })
            .collect();
        let (commitments, randomness): (Vec<_>, Vec<_>) = pairs.into_iter().unzip();

        self.noise_bits = Some(noise.clone());
        self.noise_commitments = commitments;
        self.noise_randomness = randomness;
        self.complete_step(Step::XorBits);
        Ok(noise)
    }

    /// Overwrite the noise bits without touching their commitments.
    ///
    /// This is the deliberately exposed tamper path for demonstrating that
    /// the final consistency check catches inconsistent data. It is available
    /// exactly once, between the XOR step and the sum computation.
    #[instrument(skip_all, err(Debug))]
    pub fn overwrite_noise_bits(&mut self, bits: &[u8]) -> Result<()> {
        if self.status != Status::InProgress
            || !self.completed.contains(&Step::XorBits)
            || self.completed.contains(&Step::ComputeSum)
        {
            error!(
                "{}: the noise-bit overwrite path is only open between the XOR and sum steps",
                self.id
            );
            Err(CallerError::ProtocolViolation)?;
        }
        if self.tampered {
            error!("{}: the noise bits may only be overwritten once", self.id);
            Err(CallerError::ProtocolViolation)?;
        }
        let nb = self.required_noise_length()?;
        if bits.len() != nb {
            error!(
                "{}: overwrite supplied {} bits but the session needs {nb}",
                self.id,
                bits.len()
            );
            Err(CallerError::LengthMismatch)?;
        }

        warn!("{}: noise bits overwritten out of band", self.id);
        self.noise_bits = Some(BitVector::from_bits(bits));
        self.tampered = true;
        Ok(())
    }

    /// Run the binomial mechanism over the noise vector.
    #[instrument(skip_all, err(Debug))]
    pub fn compute_sum(&mut self) -> Result<NoisySum> {
        self.ensure_step(Step::ComputeSum)?;
        if self.noisy.is_some() {
            error!("{}: the noisy sum has already been computed", self.id);
            Err(CallerError::ProtocolViolation)?;
        }
        let nb = self.required_noise_length()?;
        let noise_bits = self.noise_bits.as_ref().ok_or_else(|| {
            error!("{}: no noise bits exist to sum over", self.id);
            InternalError::from(CallerError::ProtocolViolation)
        })?;

        let noisy = mechanism::noisy_sum(self.true_count, noise_bits, nb)?;
        self.noisy = Some(noisy);
        self.complete_step(Step::ComputeSum);
        Ok(noisy)
    }

    /// Compute the auxiliary value z from the commitment randomness.
    #[instrument(skip_all, err(Debug))]
    pub fn compute_auxiliary(&mut self) -> Result<E::Randomness> {
        self.ensure_step(Step::ComputeZ)?;
        if self.auxiliary.is_some() {
            error!("{}: the auxiliary value has already been computed", self.id);
            Err(CallerError::ProtocolViolation)?;
        }

        let auxiliary = mechanism::auxiliary_value(
            self.input_randomness.iter().cloned(),
            self.noise_randomness.iter().cloned(),
        );
        self.auxiliary = Some(auxiliary.clone());
        self.complete_step(Step::ComputeZ);
        Ok(auxiliary)
    }

    /// Produce the combined commitment binding the sum and the auxiliary
    /// value together.
    #[instrument(skip_all, err(Debug))]
    pub fn commit_output(&mut self) -> Result<E::Commitment> {
        self.ensure_step(Step::CommitYZ)?;
        if self.sum_committed {
            error!("{}: the combined commitment has already been made", self.id);
            Err(CallerError::ProtocolViolation)?;
        }
        let noisy = self.noisy.ok_or_else(|| {
            error!("{}: the noisy sum has not been computed", self.id);
            InternalError::from(CallerError::ProtocolViolation)
        })?;
        let auxiliary = self.auxiliary.as_ref().ok_or_else(|| {
            error!("{}: the auxiliary value has not been computed", self.id);
            InternalError::from(CallerError::ProtocolViolation)
        })?;

        let combined = self.engine.commit_sum(noisy.committed_sum(), auxiliary);
        self.combined_commitment = Some(combined.clone());
        self.sum_committed = true;
        self.complete_step(Step::CommitYZ);
        Ok(combined)
    }

    /// The verifier's left-hand side: the homomorphic product of all input
    /// commitments and all XOR-updated bit commitments.
    pub fn lhs(&self) -> Result<E::Commitment> {
        if !self.completed.contains(&Step::XorBits) {
            error!("{}: the left-hand side needs the combined commitments", self.id);
            Err(CallerError::ProtocolViolation)?;
        }
        Ok(self.engine.sum_commitments(
            self.input_commitments
                .iter()
                .chain(self.noise_commitments.iter()),
        ))
    }

    /// The verifier's right-hand side: the combined sum/auxiliary
    /// commitment.
    pub fn rhs(&self) -> Result<E::Commitment> {
        self.combined_commitment.clone().ok_or_else(|| {
            error!("{}: the combined commitment has not been made", self.id);
            CallerError::ProtocolViolation.into()
        })
    }

    /// Run the homomorphic consistency check.
    ///
    /// May be re-run any number of times, including on a terminal session;
    /// given unchanged session data the verdict is identical every time.
    #[instrument(skip_all, err(Debug))]
    pub fn verify(&mut self) -> Result<Verdict> {
        // Unlike every other step, re-running verification on a terminal
        // session is allowed; it recomputes the same comparison.
        if self.status == Status::InProgress
            && !step::can_enter(self.furthest, Step::Verify, &self.completed)
        {
            error!(
                "{}: verification is not reachable (furthest completed: {})",
                self.id, self.furthest
            );
            Err(CallerError::ProtocolViolation)?;
        }

        let lhs = self.lhs()?;
        let rhs = self.rhs()?;
        let verdict = if lhs == rhs {
            Verdict::Accepted
        } else {
            Verdict::Rejected
        };
        self.complete_step(Step::Verify);
        self.status = match verdict {
            Verdict::Accepted => Status::Verified,
            Verdict::Rejected => Status::Rejected,
        };
        info!("{}: verification finished with {:?}", self.id, verdict);
        Ok(verdict)
    }
}
