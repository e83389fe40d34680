//! Property tests for universally-quantified invariants (FR §8).

use cpu_engine::CpuEngine;
use proptest::prelude::*;
use simcore::types::{ComplexityTag, Operation};
use simcore::Engine;

proptest! {
    #[test]
    fn penalty_components_and_total_are_sane(
        data_size in 1u64..4_000_000,
        tick in 1u64..10_000,
        complexity_idx in 0u8..5,
    ) {
        let complexity = match complexity_idx {
            0 => ComplexityTag::Constant,
            1 => ComplexityTag::Logarithmic,
            2 => ComplexityTag::Linear,
            3 => ComplexityTag::Linearithmic,
            _ => ComplexityTag::Quadratic,
        };
        let mut engine = CpuEngine::new(10);
        let op = Operation::new("p", "cpu_compute", data_size, 0).with_complexity(complexity);
        let result = engine.process_operation(op, tick);

        prop_assert!(result.completion_tick >= 1);
        let penalty = result.penalty.expect("cpu engine always attaches penalty info");
        prop_assert!(penalty.load_factor >= 1.0);
        prop_assert!(penalty.queue_factor >= 1.0);
        prop_assert!(penalty.thermal_factor >= 1.0);
        prop_assert!(penalty.contention_factor >= 1.0);
        prop_assert!(penalty.health_factor >= 1.0);
        prop_assert!(penalty.total_factor.is_finite());
        prop_assert!(penalty.total_factor >= 1.0);
        let product = penalty.load_factor
            * penalty.queue_factor
            * penalty.thermal_factor
            * penalty.contention_factor
            * penalty.health_factor;
        prop_assert!(penalty.total_factor <= product + 1e-6);
    }

    #[test]
    fn queue_length_never_exceeds_capacity(n_ops in 0usize..20) {
        let engine = CpuEngine::new(5);
        let mut accepted = 0;
        for i in 0..n_ops {
            if engine.queue_operation(Operation::new(format!("op{i}"), "cpu_compute", 10, 0)).is_ok() {
                accepted += 1;
            }
        }
        prop_assert!(accepted <= 5);
        prop_assert!(engine.queue_length() <= engine.queue_capacity());
    }
}
