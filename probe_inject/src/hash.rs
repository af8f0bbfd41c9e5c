//! Location hashes correlating a probe call with its place in a method.
//!
//! The hash mixes the method identity with the index the anchor instruction
//! ends up at after instrumentation. It uses the same 31-multiplier polynomial
//! over UTF-16 code units that JVM string hashing uses, combined like
//! `Arrays.hashCode(int[])`, so a harness running on the target VM can
//! recompute a key from the same inputs. It is a correlation key only:
//! collisions are possible and merely coarsen coverage.

use crate::ir::MethodIdentity;

/// 31-polynomial hash of the UTF-16 encoding of `s`, in wrapping i32 arithmetic.
pub fn string_hash(s: &str) -> i32 {
    s.encode_utf16()
        .fold(0i32, |acc, unit| acc.wrapping_mul(31).wrapping_add(unit as i32))
}

fn combine(values: &[i32]) -> i32 {
    values
        .iter()
        .fold(1i32, |acc, value| acc.wrapping_mul(31).wrapping_add(*value))
}

/// The location hash for an anchor at `final_index` in the instrumented stream.
pub fn location_hash(identity: &MethodIdentity, final_index: usize) -> i32 {
    combine(&[
        string_hash(identity.owner()),
        string_hash(identity.name()),
        string_hash(identity.descriptor()),
        final_index as i32,
    ])
}
