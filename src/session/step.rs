//! The ordered protocol steps and the single transition predicate.

use serde::{Deserialize, Serialize};
use std::{
    collections::HashSet,
    fmt::{Display, Formatter},
};

/// One step of the protocol, in forward order.
///
/// The discriminants encode the ordering, so `Step::index` is just a cast and
/// there is exactly one place the sequence is written down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Step {
    /// Session creation with the curator's raw inputs.
    Input,
    /// Commit to each client input.
    CommitInputs,
    /// Fix (ε, δ) and derive the noise-bit count.
    SetPrivacyParams,
    /// Draw the curator's private random bits.
    SampleBits,
    /// Commit to each private bit.
    CommitBits,
    /// Prove every bit commitment opens to 0 or 1.
    ProveBinary,
    /// Run the Morra exchange for public bits.
    CoinFlip,
    /// XOR private and public bits into the noise vector.
    XorBits,
    /// Compute the noisy sum.
    ComputeSum,
    /// Compute the auxiliary value z.
    ComputeZ,
    /// Commit to the sum and z together.
    CommitYZ,
    /// Check the homomorphic consistency equation.
    Verify,
}

/// All steps in execution order.
pub const STEP_ORDER: [Step; 12] = [
    Step::Input,
    Step::CommitInputs,
    Step::SetPrivacyParams,
    Step::SampleBits,
    Step::CommitBits,
    Step::ProveBinary,
    Step::CoinFlip,
    Step::XorBits,
    Step::ComputeSum,
    Step::ComputeZ,
    Step::CommitYZ,
    Step::Verify,
];

impl Step {
    /// Position of this step in the forward order.
    pub fn index(self) -> usize {
        self as usize
    }

    /// The step that must complete before this one may run.
    pub fn predecessor(self) -> Option<Step> {
        self.index().checked_sub(1).map(|i| STEP_ORDER[i])
    }
}

impl Display for Step {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self:?}")
    }
}

/// Whether the machine may enter `target`, given the furthest step it has
/// completed and the set of completed steps.
///
/// Entering is allowed when the target is no more than one step ahead of the
/// furthest completed step and the target's predecessor has completed;
/// already-completed steps may be re-entered (the individual step handlers
/// decide whether replay is meaningful), but skipping ahead never is.
pub fn can_enter(furthest: Step, target: Step, completed: &HashSet<Step>) -> bool {
    if target.index() > furthest.index() + 1 {
        return false;
    }
    match target.predecessor() {
        None => true,
        Some(predecessor) => completed.contains(&predecessor),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn completed_through(step: Step) -> HashSet<Step> {
        STEP_ORDER
            .iter()
            .take_while(|s| s.index() <= step.index())
            .copied()
            .collect()
    }

    #[test]
    fn order_is_consistent_with_indices() {
        for (i, step) in STEP_ORDER.iter().enumerate() {
            assert_eq!(step.index(), i);
        }
        assert_eq!(Step::Input.predecessor(), None);
        assert_eq!(Step::Verify.predecessor(), Some(Step::CommitYZ));
    }

    #[test]
    fn next_step_is_reachable() {
        let completed = completed_through(Step::CoinFlip);
        assert!(can_enter(Step::CoinFlip, Step::XorBits, &completed));
    }

    #[test]
    fn skipping_ahead_is_rejected() {
        let completed = completed_through(Step::CoinFlip);
        assert!(!can_enter(Step::CoinFlip, Step::ComputeSum, &completed));
        assert!(!can_enter(Step::CoinFlip, Step::Verify, &completed));
    }

    #[test]
    fn completed_steps_may_be_re_entered() {
        let completed = completed_through(Step::XorBits);
        assert!(can_enter(Step::XorBits, Step::SampleBits, &completed));
        assert!(can_enter(Step::XorBits, Step::XorBits, &completed));
    }

    #[test]
    fn missing_predecessor_is_rejected() {
        // Furthest step advanced without its predecessor recorded: the
        // predicate still refuses entry.
        let mut completed = completed_through(Step::CoinFlip);
        let _ = completed.remove(&Step::CoinFlip);
        assert!(!can_enter(Step::CoinFlip, Step::XorBits, &completed));
    }
}
