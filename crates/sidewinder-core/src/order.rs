//! Ring ordering predicates.
//!
//! The snake orders all nodes by public key and wraps the highest key
//! around to the lowest. Routing decisions only ever need two questions
//! answered: is one key below another, and does a key fall strictly
//! between two others on the ring.

use crate::types::PublicKey;

/// Strict unsigned lexicographic comparison of two keys.
#[must_use]
pub fn less_than(a: &PublicKey, b: &PublicKey) -> bool {
    a < b
}

/// True iff `b` lies strictly between `a` and `c` in cyclic ring order.
///
/// All comparisons are strict, so any pair of equal arguments yields
/// false. The three rotations cover the wrapped cases.
#[must_use]
pub fn dht_ordered(a: &PublicKey, b: &PublicKey, c: &PublicKey) -> bool {
    (a < b && b < c) || (b < c && c < a) || (c < a && a < b)
}
