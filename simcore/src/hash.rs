//! Deterministic hashing for probabilistic engine decisions (FR §4.3, §5, §9).
//!
//! Every "probability" check in an engine (row-buffer hit, cross-socket
//! access, TLB hit, page fault, false-sharing conflict, ECC event, prefetch
//! hit, ...) must be reproducible for identical inputs. We hash
//! `(operation id, data size, type length, current tick, decision seed)`
//! with a fixed-parameter FNV-1a and compare a normalized fraction against
//! a threshold — no wall-clock randomness, no OS entropy.

/// FNV-1a 64-bit offset basis / prime, per the published constants.
const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

fn fnv1a(bytes: &[u8]) -> u64 {
    let mut hash = FNV_OFFSET;
    for &b in bytes {
        hash ^= u64::from(b);
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

/// A named decision axis. Each distinct `decision_seed` produces an
/// independent-looking stream for the same `(op_id, data_size, type_len,
/// tick)` tuple, so e.g. "row-buffer hit" and "ECC event" don't correlate.
pub fn deterministic_hash(op_id: &str, data_size: u64, type_len: usize, tick: u64, decision_seed: u64) -> u64 {
    let mut buf = Vec::with_capacity(op_id.len() + 32);
    buf.extend_from_slice(op_id.as_bytes());
    buf.extend_from_slice(&data_size.to_le_bytes());
    buf.extend_from_slice(&(type_len as u64).to_le_bytes());
    buf.extend_from_slice(&tick.to_le_bytes());
    buf.extend_from_slice(&decision_seed.to_le_bytes());
    fnv1a(&buf)
}

/// Normalize a hash to `[0.0, 1.0)`.
pub fn unit_fraction(hash: u64) -> f64 {
    (hash as f64) / (u64::MAX as f64)
}

/// Deterministically decide a probabilistic event: returns `true` with
/// approximate probability `probability` (clamped to `[0.0, 1.0]`).
pub fn decide(op_id: &str, data_size: u64, type_len: usize, tick: u64, decision_seed: u64, probability: f64) -> bool {
    let p = probability.clamp(0.0, 1.0);
    let hash = deterministic_hash(op_id, data_size, type_len, tick, decision_seed);
    unit_fraction(hash) < p
}
