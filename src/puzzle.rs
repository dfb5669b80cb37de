// Copyright (c) Rushnet Contributors
// SPDX-License-Identifier: Apache-2.0

//! The proof-of-work puzzle primitive.
//!
//! The "hash" is a plain affine map over the prime field `[0, PRIME)`:
//! `h(x) = (x * MULTIPLIER + OFFSET) mod PRIME`. It is a puzzle, not a
//! security primitive: cheap to evaluate, a bijection on the field, and
//! invertible only by scanning the domain, which is exactly the work the
//! searcher distributes over its workers.

use rand::Rng;

/// Size of the search domain. Prime, so the map below is a bijection.
pub const PRIME: u64 = 99_997_669;
/// Multiplier of the affine map.
const MULTIPLIER: u64 = 435_679_812;
/// Offset of the affine map.
const OFFSET: u64 = 100_001_819;

/// Evaluates the puzzle map at `x`.
///
/// Pure; for `x` in `[0, PRIME)` the result is again in `[0, PRIME)`.
#[must_use]
pub const fn hash(x: u64) -> u64 {
    (x * MULTIPLIER + OFFSET) % PRIME
}

/// Samples a fresh round target uniformly from `[0, PRIME)`.
///
/// Only the net founder calls this; every later target is the previous
/// round's solution.
#[must_use]
pub fn random_target() -> u64 {
    rand::rng().random_range(0..PRIME)
}
