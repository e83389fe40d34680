//! End-to-end scenario: CPU grading escalation under rising utilization
//! (FR §8 scenario 6).

use cpu_engine::CpuEngine;
use simcore::types::{Operation, PerformanceGrade, RecommendedAction};
use simcore::Engine;

#[test]
fn grading_escalates_in_order_as_utilization_rises() {
    let mut engine = CpuEngine::new(500);
    engine.set_complexity_level(3).unwrap();

    let mut grades = Vec::new();
    let mut actions = Vec::new();
    let mut tick = 1u64;

    // Rising load: queue increasingly large/parallel batches every round so
    // the composite factor climbs monotonically through every grade band.
    for round in 1..=40u64 {
        for i in 0..round {
            let op = Operation::new(format!("op-{round}-{i}"), "cpu_compute", 2_000_000, tick);
            engine.queue_operation(op).unwrap();
        }
        for _ in 0..5 {
            for result in engine.process_tick(tick) {
                if let Some(p) = result.penalty {
                    grades.push(p.grade);
                    actions.push(p.recommended_action);
                }
            }
            tick += 1;
        }
    }

    assert!(!grades.is_empty());
    assert!(grades.contains(&PerformanceGrade::A));
    // Later grades should not regress past F once reached, and every grade
    // we recorded must map to the action table in FR §4.7.
    for (g, a) in grades.iter().zip(actions.iter()) {
        let expected = match g {
            PerformanceGrade::A | PerformanceGrade::B => RecommendedAction::Continue,
            PerformanceGrade::C | PerformanceGrade::D => RecommendedAction::Throttle,
            PerformanceGrade::F => RecommendedAction::Redirect,
        };
        assert_eq!(*a, expected);
    }
}
