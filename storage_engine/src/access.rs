//! Access-pattern classification (FR §4.4).

use simcore::types::{AccessPattern, Operation};

/// Transfers spanning more than this many blocks are treated as sequential.
pub const SEQUENTIAL_BLOCK_THRESHOLD: u64 = 8;

pub fn classify(op: &Operation, block_size_bytes: u64) -> AccessPattern {
    let blocks = op.data_size / block_size_bytes.max(1);
    if blocks > SEQUENTIAL_BLOCK_THRESHOLD {
        AccessPattern::Sequential
    } else {
        AccessPattern::Random
    }
}

pub fn is_write(op_type: &str) -> bool {
    op_type.contains("write")
}

pub fn is_seek(op_type: &str) -> bool {
    op_type.contains("seek")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_by_block_count() {
        let seq = Operation::new("a", "storage_read", 64 * 1024, 0);
        let rand = Operation::new("b", "storage_read", 2048, 0);
        assert_eq!(classify(&seq, 4096), AccessPattern::Sequential);
        assert_eq!(classify(&rand, 4096), AccessPattern::Random);
    }

    #[test]
    fn op_type_matching() {
        assert!(is_write("storage_write"));
        assert!(!is_write("storage_read"));
        assert!(is_seek("storage_seek"));
    }
}
