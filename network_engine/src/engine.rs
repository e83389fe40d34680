//! The concrete network engine (FR §4.5, §9).

use crate::features::NetworkFeatures;
use crate::pipeline;
use crate::state::NetworkState;
use serde_json::json;
use simcore::types::{
    ConvergenceMetrics, DynamicState, EngineDetail, EngineId, EngineKind, EngineProfile, GradingBands, HealthMetrics,
    Operation, OperationResult, PenaltyInformation,
};
use simcore::{CommonEngineCore, ComplexityState, Engine, EngineResult};
use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::time::Duration;
use tracing::{debug, trace};

#[derive(Debug, Clone)]
struct InFlightOp {
    completion_tick: u64,
    push_seq: u64,
    bandwidth_mbps: f64,
    result: OperationResult,
}

impl PartialEq for InFlightOp {
    fn eq(&self, other: &Self) -> bool {
        self.completion_tick == other.completion_tick && self.push_seq == other.push_seq
    }
}
impl Eq for InFlightOp {}
impl PartialOrd for InFlightOp {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for InFlightOp {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        (self.completion_tick, self.push_seq).cmp(&(other.completion_tick, other.push_seq))
    }
}

/// Per-op link-bandwidth footprint in Mb, reserved while in flight and
/// released on completion (FR §4.5 admission rule, adapted to a
/// reservation budget the way CPU reserves cores and memory reserves
/// channels).
fn bandwidth_footprint_mbps(op: &Operation) -> f64 {
    (op.data_size as f64 * 8.0 / 1_000_000.0).max(0.01)
}

pub struct NetworkEngine {
    core: CommonEngineCore,
    complexity: ComplexityState<NetworkFeatures>,
    state: NetworkState,
    in_flight: BinaryHeap<Reverse<InFlightOp>>,
    busy_bandwidth_mbps: f64,
    pool_size: u32,
}

impl NetworkEngine {
    pub fn new(capacity: usize) -> Self {
        Self {
            core: CommonEngineCore::new(EngineKind::Network, capacity),
            complexity: ComplexityState::default(),
            state: NetworkState::default(),
            in_flight: BinaryHeap::new(),
            busy_bandwidth_mbps: 0.0,
            pool_size: 0,
        }
    }

    fn heap_cap(&self) -> usize {
        let avg_latency_ms = self.core.health().average_latency_ms;
        let avg_ticks = if avg_latency_ms > 0.0 {
            self.core.duration_to_ticks(Duration::from_secs_f64(avg_latency_ms / 1000.0))
        } else {
            1
        };
        let raw = self.state.max_connections as u64 * avg_ticks * 2;
        raw.clamp(50, 5000) as usize
    }

    fn build_result(&mut self, op: &Operation, tick: u64, completion_tick: u64) -> OperationResult {
        let utilization = self.busy_bandwidth_mbps / self.state.bandwidth_mbps.max(1.0);
        let transmission_s = (op.data_size as f64 * 8.0) / (self.state.bandwidth_mbps * 1_000_000.0).max(1.0);
        let base = Duration::from_secs_f64(self.state.base_latency_ms / 1000.0 + transmission_s)
            + Duration::from_secs_f64(self.state.physics_floor_ms() / 1000.0);

        let outcome = pipeline::run(base, op, &self.state, &self.complexity, tick, utilization, &mut self.pool_size);
        let (_, factors) = self.core.composite_performance_factor(outcome.duration, utilization);

        let detail = EngineDetail::Network {
            bandwidth_utilization: utilization,
            congestion_factor: outcome.congestion_factor,
            packet_loss_rate: outcome.packet_loss_rate,
            latency_penalty: outcome.latency_penalty,
            protocol_efficiency: outcome.protocol_efficiency,
        };
        let total_factor =
            factors.load_factor * factors.queue_factor * outcome.latency_penalty * outcome.congestion_factor * factors.health_factor;
        let scaled = outcome.duration.mul_f64(total_factor.max(f64::MIN_POSITIVE));
        let penalty = PenaltyInformation::new(
            EngineKind::Network,
            self.core.id(),
            outcome.duration,
            scaled,
            factors.load_factor,
            factors.queue_factor,
            outcome.latency_penalty,
            outcome.congestion_factor,
            factors.health_factor,
            total_factor,
            detail,
            GradingBands::STORAGE_NETWORK,
        );

        let mut result = OperationResult {
            operation_id: op.id.clone(),
            operation_type: op.op_type.clone(),
            processing_time: scaled,
            completion_tick,
            success: !outcome.packet_lost,
            error: None,
            next_component: op.next_component.clone(),
            penalty: Some(penalty),
            metrics: Default::default(),
        };
        if outcome.packet_lost {
            result = result.with_metric("packet_lost", true);
        }
        result
    }

    fn admit(&mut self, tick: u64) {
        let cap = self.heap_cap();
        while self.in_flight.len() < cap {
            if self.busy_bandwidth_mbps >= self.state.bandwidth_mbps {
                break;
            }
            let Some(queued) = self.core.dequeue_operation() else { break };
            let footprint = bandwidth_footprint_mbps(&queued.operation);
            if self.busy_bandwidth_mbps + footprint > self.state.bandwidth_mbps {
                self.core.requeue_front(queued);
                break;
            }
            self.busy_bandwidth_mbps += footprint;
            let mut result = self.build_result(&queued.operation, tick, tick);
            let ticks = self.core.duration_to_ticks(result.processing_time);
            let completion_tick = tick + ticks;
            result.completion_tick = completion_tick;
            let push_seq = self.core.next_push_seq();
            trace!(op_id = %queued.operation.id, completion_tick, "network op admitted");
            self.in_flight.push(Reverse(InFlightOp { completion_tick, push_seq, bandwidth_mbps: footprint, result }));
        }
    }

    fn drain_completed(&mut self, tick: u64) -> Vec<OperationResult> {
        let mut out = Vec::new();
        while let Some(Reverse(top)) = self.in_flight.peek() {
            if top.completion_tick > tick {
                break;
            }
            let Reverse(item) = self.in_flight.pop().unwrap();
            self.busy_bandwidth_mbps = (self.busy_bandwidth_mbps - item.bandwidth_mbps).max(0.0);
            self.core.record_completion(item.result.processing_time, item.result.success, tick);
            out.push(item.result);
        }
        out
    }
}

impl Engine for NetworkEngine {
    fn process_operation(&mut self, op: Operation, tick: u64) -> OperationResult {
        let completion_tick = tick.max(op.start_tick + 1);
        let mut result = self.build_result(&op, tick, completion_tick);
        result.completion_tick = completion_tick;
        self.core.advance_tick(tick);
        self.core.record_completion(result.processing_time, result.success, tick);
        result
    }

    fn process_tick(&mut self, tick: u64) -> Vec<OperationResult> {
        self.core.advance_tick(tick);
        self.core.record_load_sample(self.busy_bandwidth_mbps / self.state.bandwidth_mbps.max(1.0));
        self.admit(tick);
        let results = self.drain_completed(tick);
        if !results.is_empty() {
            debug!(tick, completed = results.len(), "network tick completed operations");
        }
        results
    }

    fn queue_operation(&self, op: Operation) -> EngineResult<()> {
        self.core.queue_operation(op)
    }

    fn queue_length(&self) -> usize {
        self.core.queue_len()
    }

    fn queue_capacity(&self) -> usize {
        self.core.queue_capacity()
    }

    fn engine_type(&self) -> EngineKind {
        EngineKind::Network
    }

    fn engine_id(&self) -> EngineId {
        self.core.id()
    }

    fn set_tick_duration(&mut self, duration: Duration) {
        self.core.set_tick_duration(duration);
    }

    fn get_tick_duration(&self) -> Duration {
        self.core.tick_duration()
    }

    fn load_profile(&mut self, profile: Option<EngineProfile>) -> EngineResult<()> {
        let profile_clone = profile.clone();
        self.core.ingest_profile(profile)?;
        if let Some(p) = profile_clone {
            self.state.apply_profile(&p);
        }
        Ok(())
    }

    fn get_profile(&self) -> Option<&EngineProfile> {
        self.core.profile()
    }

    fn set_complexity_level(&mut self, raw_level: u8) -> EngineResult<()> {
        self.complexity.set_level_from_u8(raw_level)
    }

    fn get_complexity_level(&self) -> u8 {
        self.complexity.level().as_u8()
    }

    fn get_health(&self) -> HealthMetrics {
        self.core.health()
    }

    fn update_health(&mut self, tick: u64) {
        self.core.update_health(tick);
    }

    fn get_dynamic_state(&self) -> serde_json::Value {
        let health = self.core.health();
        let (_, factors) = self.core.composite_performance_factor(Duration::from_millis(1), health.utilization);
        let dynamic = DynamicState {
            current_utilization: health.utilization,
            composite_performance_factor: factors.product(),
            convergence_progress: self.core.convergence_metrics().overall_progress,
            engine_specific: [
                ("busy_bandwidth_mbps".to_string(), json!(self.busy_bandwidth_mbps)),
                ("bandwidth_mbps".to_string(), json!(self.state.bandwidth_mbps)),
                ("in_flight".to_string(), json!(self.in_flight.len())),
                ("pool_size".to_string(), json!(self.pool_size)),
            ]
            .into_iter()
            .collect(),
        };
        serde_json::to_value(dynamic).unwrap_or_else(|_| json!({}))
    }

    fn get_convergence_metrics(&self) -> ConvergenceMetrics {
        self.core.convergence_metrics()
    }

    fn reset(&mut self) {
        self.core.reset();
        self.in_flight.clear();
        self.busy_bandwidth_mbps = 0.0;
        self.pool_size = 0;
    }

    fn get_current_state(&self) -> serde_json::Value {
        let mut map = self.core.base_state_fields();
        map.insert("complexity_level".into(), json!(self.complexity.level().as_u8()));
        map.insert("bandwidth_mbps".into(), json!(self.state.bandwidth_mbps));
        map.insert("busy_bandwidth_mbps".into(), json!(self.busy_bandwidth_mbps));
        map.insert("bandwidth_utilization".into(), json!(self.busy_bandwidth_mbps / self.state.bandwidth_mbps.max(1.0)));
        map.insert("in_flight_count".into(), json!(self.in_flight.len()));
        serde_json::Value::Object(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gigabit_lan_profile() -> EngineProfile {
        EngineProfile {
            name: "gigabit_lan".into(),
            engine_kind: EngineKind::Network,
            description: String::new(),
            version: "1".into(),
            baseline_performance: [("bandwidth_mbps".to_string(), 1000.0), ("base_latency_ms".to_string(), 1.0)].into_iter().collect(),
            technology_specs: Default::default(),
            load_curves: Default::default(),
            engine_specific: [("topology".to_string(), [("distance_km".to_string(), json!(0.1))].into_iter().collect())].into_iter().collect(),
        }
    }

    #[test]
    fn gigabit_lan_request_succeeds_with_low_penalty() {
        let mut engine = NetworkEngine::new(100);
        engine.load_profile(Some(gigabit_lan_profile())).unwrap();
        let op = Operation::new("t1", "network_request", 1024, 1);
        let result = engine.process_operation(op, 1);
        assert!(result.success);
        assert!(result.processing_time.as_secs_f64() > 0.0009 && result.processing_time.as_secs_f64() < 0.005);
        let penalty = result.penalty.unwrap();
        assert!(matches!(penalty.grade, simcore::types::PerformanceGrade::A | simcore::types::PerformanceGrade::B));
    }

    #[test]
    fn queue_full_at_capacity() {
        let mut engine = NetworkEngine::new(5);
        for i in 0..5 {
            engine.queue_operation(Operation::new(format!("op{i}"), "network_request", 1024, 1)).unwrap();
        }
        let overflow = engine.queue_operation(Operation::new("op6", "network_request", 1024, 1));
        assert!(overflow.is_err());
        let mut completed = Vec::new();
        for tick in 1..=50u64 {
            completed.extend(engine.process_tick(tick));
        }
        assert_eq!(completed.len(), 5);
    }

    #[test]
    fn reset_clears_dynamic_state_preserves_config() {
        let mut engine = NetworkEngine::new(10);
        for i in 0..3 {
            engine.queue_operation(Operation::new(format!("op{i}"), "network_send", 2048, 1)).unwrap();
        }
        for tick in 1..=20u64 {
            engine.process_tick(tick);
        }
        engine.reset();
        let state = engine.get_dynamic_state();
        assert_eq!(state["engine_specific"]["busy_bandwidth_mbps"], 0.0);
        assert_eq!(engine.queue_length(), 0);
    }

    #[test]
    fn invalid_complexity_preserves_level() {
        let mut engine = NetworkEngine::new(10);
        engine.set_complexity_level(3).unwrap();
        assert!(engine.set_complexity_level(9).is_err());
        assert_eq!(engine.get_complexity_level(), 3);
    }

    #[test]
    fn profile_mismatch_rejected() {
        let mut engine = NetworkEngine::new(10);
        let profile = EngineProfile {
            name: "cpu".into(),
            engine_kind: EngineKind::Cpu,
            description: String::new(),
            version: "1".into(),
            baseline_performance: Default::default(),
            technology_specs: Default::default(),
            load_curves: Default::default(),
            engine_specific: Default::default(),
        };
        assert!(engine.load_profile(Some(profile)).is_err());
    }
}
