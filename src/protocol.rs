//! Session identifiers.

// Copyright (c) 2023 Bolt Labs Holdings, Inc
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

use rand::{CryptoRng, Rng, RngCore};
use serde::{Deserialize, Serialize};
use std::fmt::{Debug, Display, Formatter};

/// An opaque identifier for a single protocol session.
///
/// A session is created once with the curator's inputs and identified by this
/// value for every subsequent operation. Identifiers are sampled uniformly at
/// random, so collisions between sessions are cryptographically unlikely.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SessionId(u128);

impl SessionId {
    /// Produce a random [`SessionId`].
    pub fn random<R: RngCore + CryptoRng>(rng: &mut R) -> Self {
        Self(rng.gen())
    }
}

impl Display for SessionId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", hex::encode(self.0.to_be_bytes()))
    }
}
