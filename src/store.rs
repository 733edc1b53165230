//! In-memory registry of concurrent protocol sessions.
//!
//! A [`SessionStore`] owns every live [`SessionRunner`], keyed by
//! [`SessionId`], and forwards each protocol operation to the addressed
//! session. Sessions are fully independent; an error in one never affects
//! another. The store itself does no locking: an embedding service is
//! expected to wrap it in whatever synchronization its handler model needs,
//! with at most one writer per session at a time.

// Copyright (c) 2023 Bolt Labs Holdings, Inc
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

use crate::{
    bits::{BitVector, SamplingPolicy},
    collaborator::{CoinFlip, CommitmentEngine},
    errors::{CallerError, Result},
    mechanism::NoisySum,
    protocol::SessionId,
    session::{SessionRunner, Status, Verdict},
};
use rand::{CryptoRng, RngCore};
use std::collections::HashMap;
use tracing::{error, info, instrument};

/// Registry of live sessions sharing a commitment engine and coin-flip type.
#[derive(Debug, Default)]
pub struct SessionStore<E: CommitmentEngine, F: CoinFlip> {
    sessions: HashMap<SessionId, SessionRunner<E, F>>,
}

impl<E: CommitmentEngine, F: CoinFlip> SessionStore<E, F> {
    /// Create an empty store.
    pub fn new() -> Self {
        Self {
            sessions: HashMap::new(),
        }
    }

    /// Create a session from the curator's raw dataset, returning its fresh
    /// identifier.
    #[instrument(skip_all, err(Debug))]
    pub fn create_session<R: RngCore + CryptoRng>(
        &mut self,
        rng: &mut R,
        engine: E,
        coin_flip: F,
        inputs: &[u8],
    ) -> Result<SessionId> {
        let runner = SessionRunner::new(rng, engine, coin_flip, inputs)?;
        let id = runner.id();
        let _ = self.sessions.insert(id, runner);
        info!("Session {id} registered ({} live sessions)", self.sessions.len());
        Ok(id)
    }

    /// Drop a session and everything it holds.
    #[instrument(skip_all, err(Debug))]
    pub fn remove_session(&mut self, id: SessionId) -> Result<()> {
        match self.sessions.remove(&id) {
            Some(_) => {
                info!("Session {id} removed");
                Ok(())
            }
            None => {
                error!("No session found for identifier {id}");
                Err(CallerError::SessionNotFound)?
            }
        }
    }

    /// Look up a session for reading.
    pub fn session(&self, id: SessionId) -> Result<&SessionRunner<E, F>> {
        self.sessions.get(&id).ok_or_else(|| {
            error!("No session found for identifier {id}");
            CallerError::SessionNotFound.into()
        })
    }

    /// Look up a session for mutation.
    pub fn session_mut(&mut self, id: SessionId) -> Result<&mut SessionRunner<E, F>> {
        self.sessions.get_mut(&id).ok_or_else(|| {
            error!("No session found for identifier {id}");
            CallerError::SessionNotFound.into()
        })
    }

    /// Identifiers of all live sessions, in no particular order.
    pub fn session_ids(&self) -> Vec<SessionId> {
        self.sessions.keys().copied().collect()
    }

    /// Number of live sessions.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Whether the store holds no sessions.
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Commit to the addressed session's client inputs.
    pub fn commit_inputs<R: RngCore + CryptoRng>(
        &mut self,
        rng: &mut R,
        id: SessionId,
    ) -> Result<Vec<E::Commitment>> {
        self.session_mut(id)?.commit_inputs(rng)
    }

    /// Fix the addressed session's privacy parameters, returning its
    /// noise-bit count.
    pub fn set_privacy_params(
        &mut self,
        id: SessionId,
        epsilon: f64,
        delta: f64,
    ) -> Result<usize> {
        self.session_mut(id)?.set_privacy_params(epsilon, delta)
    }

    /// Draw the addressed session's private bits under a policy.
    pub fn sample_bits<R: RngCore + CryptoRng>(
        &mut self,
        rng: &mut R,
        id: SessionId,
        policy: SamplingPolicy,
    ) -> Result<()> {
        self.session_mut(id)?.sample_bits(rng, policy)
    }

    /// Supply the addressed session's private bits directly.
    pub fn submit_private_bits(&mut self, id: SessionId, bits: &[u8]) -> Result<()> {
        self.session_mut(id)?.submit_private_bits(bits)
    }

    /// Edit a range of the addressed session's private bits.
    pub fn paint_private_bits(
        &mut self,
        id: SessionId,
        start: usize,
        end: usize,
        value: u8,
    ) -> Result<()> {
        self.session_mut(id)?.paint_private_bits(start, end, value)
    }

    /// Commit to the addressed session's private bits, freezing them.
    pub fn commit_private_bits<R: RngCore + CryptoRng>(
        &mut self,
        rng: &mut R,
        id: SessionId,
    ) -> Result<Vec<E::Commitment>> {
        self.session_mut(id)?.commit_private_bits(rng)
    }

    /// Prove and check that the committed bits are binary.
    pub fn prove_binary<R: RngCore + CryptoRng>(
        &mut self,
        rng: &mut R,
        id: SessionId,
    ) -> Result<()> {
        self.session_mut(id)?.prove_binary(rng)
    }

    /// Run the coin-flip exchange for the addressed session.
    pub fn run_coin_flip<R: RngCore + CryptoRng>(
        &mut self,
        rng: &mut R,
        id: SessionId,
    ) -> Result<BitVector> {
        self.session_mut(id)?.run_coin_flip(rng)
    }

    /// Combine the addressed session's private and public bits into noise.
    pub fn xor_bits(&mut self, id: SessionId) -> Result<BitVector> {
        self.session_mut(id)?.xor_bits()
    }

    /// Overwrite the addressed session's noise bits (the one-time tamper
    /// path).
    pub fn overwrite_noise_bits(&mut self, id: SessionId, bits: &[u8]) -> Result<()> {
        self.session_mut(id)?.overwrite_noise_bits(bits)
    }

    /// Run the binomial mechanism for the addressed session.
    pub fn compute_sum(&mut self, id: SessionId) -> Result<NoisySum> {
        self.session_mut(id)?.compute_sum()
    }

    /// Compute the addressed session's auxiliary value z.
    pub fn compute_auxiliary(&mut self, id: SessionId) -> Result<E::Randomness> {
        self.session_mut(id)?.compute_auxiliary()
    }

    /// Produce the addressed session's combined sum/auxiliary commitment.
    pub fn commit_output(&mut self, id: SessionId) -> Result<E::Commitment> {
        self.session_mut(id)?.commit_output()
    }

    /// Run the homomorphic consistency check for the addressed session.
    pub fn verify(&mut self, id: SessionId) -> Result<Verdict> {
        self.session_mut(id)?.verify()
    }

    /// The verifier's left-hand side for the addressed session.
    pub fn lhs(&self, id: SessionId) -> Result<E::Commitment> {
        self.session(id)?.lhs()
    }

    /// The verifier's right-hand side for the addressed session.
    pub fn rhs(&self, id: SessionId) -> Result<E::Commitment> {
        self.session(id)?.rhs()
    }

    /// Lifecycle status of the addressed session.
    pub fn status(&self, id: SessionId) -> Result<Status> {
        Ok(self.session(id)?.status())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        collaborator::testing::{FakeEngine, FixedCoinFlip},
        errors::InternalError,
        utils::testing::init_testing,
    };
    use rand::rngs::StdRng;

    type FakeStore = SessionStore<FakeEngine, FixedCoinFlip>;

    fn new_session(store: &mut FakeStore, rng: &mut StdRng, inputs: &[u8]) -> SessionId {
        store
            .create_session(rng, FakeEngine, FixedCoinFlip(vec![0, 1, 1]), inputs)
            .unwrap()
    }

    #[test]
    fn full_protocol_runs_through_the_store() {
        let mut rng = init_testing();
        let mut store = FakeStore::new();
        let id = new_session(&mut store, &mut rng, &[1, 0, 1, 1, 0, 1]);

        let _ = store.commit_inputs(&mut rng, id).unwrap();
        let nb = store.set_privacy_params(id, 2.0, 0.25).unwrap();
        store
            .sample_bits(&mut rng, id, SamplingPolicy::Uniform)
            .unwrap();
        let _ = store.commit_private_bits(&mut rng, id).unwrap();
        store.prove_binary(&mut rng, id).unwrap();
        let public = store.run_coin_flip(&mut rng, id).unwrap();
        assert_eq!(public.len(), nb);
        let _ = store.xor_bits(id).unwrap();
        let noisy = store.compute_sum(id).unwrap();
        assert_eq!(noisy.committed_sum(), 4 + noisy.sum_noise());
        let _ = store.compute_auxiliary(id).unwrap();
        let _ = store.commit_output(id).unwrap();
        assert_eq!(store.lhs(id).unwrap(), store.rhs(id).unwrap());
        assert_eq!(store.verify(id).unwrap(), Verdict::Accepted);
        assert_eq!(store.status(id).unwrap(), Status::Verified);
    }

    #[test]
    fn unknown_identifiers_are_reported() {
        let mut rng = init_testing();
        let mut store = FakeStore::new();
        let _ = new_session(&mut store, &mut rng, &[1, 0]);
        let bogus = SessionId::random(&mut rng);

        let not_found =
            InternalError::CallingApplicationMistake(CallerError::SessionNotFound);
        assert_eq!(store.status(bogus).unwrap_err(), not_found);
        assert_eq!(
            store.set_privacy_params(bogus, 1.0, 0.5).unwrap_err(),
            not_found
        );
        assert_eq!(store.remove_session(bogus).unwrap_err(), not_found);
    }

    #[test]
    fn removed_sessions_are_gone() {
        let mut rng = init_testing();
        let mut store = FakeStore::new();
        let id = new_session(&mut store, &mut rng, &[1, 1]);
        assert_eq!(store.len(), 1);

        store.remove_session(id).unwrap();
        assert!(store.is_empty());
        assert_eq!(
            store.status(id).unwrap_err(),
            InternalError::CallingApplicationMistake(CallerError::SessionNotFound)
        );
    }

    #[test]
    fn sessions_progress_independently() {
        let mut rng = init_testing();
        let mut store = FakeStore::new();
        let first = new_session(&mut store, &mut rng, &[1, 0, 1]);
        let second = new_session(&mut store, &mut rng, &[0, 0, 1, 1]);
        assert_ne!(first, second);

        // Advance only the first session.
        let _ = store.commit_inputs(&mut rng, first).unwrap();
        let _ = store.set_privacy_params(first, 2.0, 0.25).unwrap();

        // An out-of-order call on the second session fails without touching
        // the first.
        assert!(store.sample_bits(&mut rng, second, SamplingPolicy::Uniform).is_err());
        store
            .sample_bits(&mut rng, first, SamplingPolicy::Uniform)
            .unwrap();
        assert!(store.session(first).unwrap().private_bits().is_some());
        assert!(store.session(second).unwrap().private_bits().is_none());
    }
}
