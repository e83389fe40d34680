//! End-to-end scenarios: DDR4 profile ingestion and reset semantics
//! (FR §8 scenarios 2 and 5).

use memory_engine::MemoryEngine;
use simcore::types::{EngineKind, EngineProfile, Operation};
use simcore::Engine;

fn ddr4_3200_dual_channel() -> EngineProfile {
    EngineProfile {
        name: "ddr4_3200_dual_channel".into(),
        engine_kind: EngineKind::Memory,
        description: "DDR4-3200 dual channel".into(),
        version: "1".into(),
        baseline_performance: [
            ("capacity_gb".to_string(), 32.0),
            ("bandwidth_gbps".to_string(), 25.6),
            ("frequency_mhz".to_string(), 3200.0),
        ]
        .into_iter()
        .collect(),
        technology_specs: Default::default(),
        load_curves: Default::default(),
        engine_specific: Default::default(),
    }
}

#[test]
fn ddr4_profile_five_reads_all_complete_then_counter_resets() {
    let mut engine = MemoryEngine::new(100);
    engine.load_profile(Some(ddr4_3200_dual_channel())).unwrap();

    for tick in 1..=5u64 {
        let op = Operation::new(format!("r{tick}"), "memory_read", 4096, tick);
        engine.queue_operation(op).unwrap();
    }

    let mut completed = Vec::new();
    for tick in 1..=30u64 {
        completed.extend(engine.process_tick(tick));
    }
    assert_eq!(completed.len(), 5);
    assert!(completed.iter().all(|r| r.success));
    assert_eq!(engine.get_current_state()["operations_processed"], 5);

    engine.reset();
    assert_eq!(engine.get_current_state()["operations_processed"], 0);
}

#[test]
fn reset_clears_utilization_and_active_channels_preserves_profile() {
    let mut engine = MemoryEngine::new(100);
    engine.load_profile(Some(ddr4_3200_dual_channel())).unwrap();

    for tick in 1..=5u64 {
        engine.queue_operation(Operation::new(format!("w{tick}"), "memory_write", 65_536, tick)).unwrap();
    }
    for tick in 1..=30u64 {
        engine.process_tick(tick);
    }

    engine.reset();
    let dynamic = engine.get_dynamic_state();
    assert_eq!(dynamic["engine_specific"]["busy_channels"], 0);
    let state = engine.get_current_state();
    assert_eq!(state["bandwidth_utilization"], 0.0);

    let profile = engine.get_profile().expect("profile survives reset");
    assert_eq!(profile.baseline("bandwidth_gbps"), Some(25.6));
}
