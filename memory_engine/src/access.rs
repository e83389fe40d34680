//! Access-pattern classification (FR §4.3).

use simcore::types::{AccessPattern, Operation};

/// Sequential above 1 MiB; random for small ops; stride otherwise.
pub const SEQUENTIAL_THRESHOLD_BYTES: u64 = 1_048_576;
pub const RANDOM_THRESHOLD_BYTES: u64 = 4096;

pub fn classify(op: &Operation) -> AccessPattern {
    if op.data_size > SEQUENTIAL_THRESHOLD_BYTES {
        AccessPattern::Sequential
    } else if op.data_size < RANDOM_THRESHOLD_BYTES {
        AccessPattern::Random
    } else {
        AccessPattern::Stride
    }
}

/// Default row-buffer hit rate per access pattern, absent any
/// profile/convergence override (FR §4.3).
pub fn default_row_buffer_hit_rate(pattern: AccessPattern) -> f64 {
    match pattern {
        AccessPattern::Sequential => 0.85,
        AccessPattern::Random => 0.15,
        AccessPattern::Stride => 0.45,
    }
}

pub fn model_name(pattern: AccessPattern) -> &'static str {
    match pattern {
        AccessPattern::Sequential => "row_buffer_hit_sequential",
        AccessPattern::Random => "row_buffer_hit_random",
        AccessPattern::Stride => "row_buffer_hit_stride",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_by_size() {
        let big = Operation::new("a", "memory_read", 2_000_000, 0);
        let small = Operation::new("b", "memory_read", 64, 0);
        let mid = Operation::new("c", "memory_read", 65_536, 0);
        assert_eq!(classify(&big), AccessPattern::Sequential);
        assert_eq!(classify(&small), AccessPattern::Random);
        assert_eq!(classify(&mid), AccessPattern::Stride);
    }
}
