//! End-to-end scenario: storage queue overflow (FR §8 scenario 3).

use simcore::types::Operation;
use simcore::Engine;
use storage_engine::StorageEngine;

#[test]
fn sixth_operation_rejected_first_five_complete() {
    let mut engine = StorageEngine::new(5);
    for i in 0..5 {
        engine.queue_operation(Operation::new(format!("r{i}"), "storage_read", 4096, 1)).unwrap();
    }
    let rejected = engine.queue_operation(Operation::new("r5", "storage_read", 4096, 1));
    assert!(rejected.is_err());

    let mut completed = Vec::new();
    for tick in 1..=50u64 {
        completed.extend(engine.process_tick(tick));
    }
    assert_eq!(completed.len(), 5);
    assert!(completed.iter().all(|r| r.success));
}

#[test]
fn sequential_and_random_ops_both_succeed_with_sane_penalties() {
    let mut seq_engine = StorageEngine::new(10);
    let seq = Operation::new("seq", "storage_write", 1_000_000, 1);
    let seq_result = seq_engine.process_operation(seq, 1);
    assert!(seq_result.success);
    assert!(seq_result.penalty.unwrap().total_factor.is_finite());

    let mut rand_engine = StorageEngine::new(10);
    let rand = Operation::new("rand", "storage_write", 512, 1);
    let rand_result = rand_engine.process_operation(rand, 1);
    assert!(rand_result.success);
    assert!(rand_result.penalty.unwrap().total_factor >= 1.0);
}
