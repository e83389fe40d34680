//! The network effect pipeline: a fixed sequence of stages (FR §4.5, §9).

use crate::features::NetworkFeatures;
use crate::state::NetworkState;
use rand::{Rng, SeedableRng};
use rand::rngs::StdRng;
use simcore::types::{Operation, Priority};
use simcore::{hash, ComplexityState};
use std::time::Duration;

#[derive(Debug, Clone, Copy)]
pub struct StageInput {
    pub duration: Duration,
    pub tick: u64,
    pub utilization: f64,
}

fn stage_bandwidth_saturation(input: StageInput, op: &Operation, state: &NetworkState) -> (Duration, f64, f64) {
    let u = input.utilization.clamp(0.0, 1.5);
    let (congestion, curve_loss) = if u < 0.70 {
        (1.0, 0.0)
    } else if u < 0.85 {
        (lerp(1.0, 1.5, (u - 0.70) / 0.15), 0.0)
    } else if u < 0.95 {
        (lerp(1.5, 3.0, (u - 0.85) / 0.10), 0.0)
    } else {
        let t = ((u - 0.95) / 0.05).clamp(0.0, 1.0);
        (3.0 * (10.0f64 / 3.0).powf(t), lerp(0.0, 0.05, t))
    };
    let loss_rate = state.packet_loss_override.unwrap_or(curve_loss).clamp(0.0, 1.0);
    (input.duration.mul_f64(congestion), congestion, loss_rate)
}

fn lerp(a: f64, b: f64, t: f64) -> f64 {
    a + (b - a) * t.clamp(0.0, 1.0)
}

fn stage_protocol_overhead(input: StageInput, state: &NetworkState) -> (Duration, f64) {
    let (header_bytes, efficiency, multiplex) = state.protocol.overhead();
    let header_latency = Duration::from_secs_f64(header_bytes * 8.0 / (state.bandwidth_mbps * 1_000_000.0).max(1.0));
    let duration = (input.duration + header_latency).mul_f64(1.0 / efficiency) / multiplex.max(1.0) as u32;
    (duration, efficiency)
}

fn stage_graph_topology_routing(input: StageInput, op: &Operation, state: &NetworkState) -> Duration {
    let Some(topology) = &state.topology else { return input.duration };
    let Some(target) = op.metadata.get("target_node").and_then(|v| v.as_str()) else { return input.duration };
    match topology.shortest_path_ms(&state.origin_node, target) {
        Some((latency_ms, _hops)) => input.duration.max(Duration::from_secs_f64(latency_ms / 1000.0)),
        None => input.duration,
    }
}

fn stage_connection_management(input: StageInput, op: &Operation, state: &NetworkState, pool_size: &mut u32) -> Duration {
    let reuse = state.keep_alive_enabled
        && *pool_size > 0
        && hash::decide(&op.id, op.data_size, op.op_type.len(), input.tick, 40, state.keep_alive_reuse_probability);
    if reuse {
        input.duration
    } else {
        *pool_size = (*pool_size + 1).min(state.max_connections);
        let handshake = Duration::from_secs_f64(state.base_latency_ms / 1000.0).mul_f64(1.5);
        input.duration + handshake
    }
}

fn stage_qos(input: StageInput, op: &Operation) -> Duration {
    match op.priority {
        Priority::High => input.duration.mul_f64(0.8),
        Priority::Low if input.utilization > 0.7 => input.duration.mul_f64(1.3),
        _ => input.duration,
    }
}

fn stage_jitter(input: StageInput, op: &Operation) -> Duration {
    let seed = hash::deterministic_hash(&op.id, op.data_size, op.op_type.len(), input.tick, 41);
    let mut rng = StdRng::seed_from_u64(seed);
    let factor = 1.0 + rng.gen_range(-0.025..=0.025);
    input.duration.mul_f64(factor)
}

fn stage_compression(input: StageInput, state: &NetworkState) -> Duration {
    if state.compression_enabled {
        input.duration.mul_f64(0.7 * 1.05)
    } else {
        input.duration
    }
}

fn stage_tls_security(input: StageInput, state: &NetworkState) -> Duration {
    if state.tls_enabled {
        input.duration.mul_f64(1.08)
    } else {
        input.duration
    }
}

#[derive(Debug, Clone, Copy)]
pub struct PipelineOutcome {
    pub duration: Duration,
    pub congestion_factor: f64,
    pub latency_penalty: f64,
    pub packet_loss_rate: f64,
    pub protocol_efficiency: f64,
    pub packet_lost: bool,
}

pub fn run(
    base_duration: Duration,
    op: &Operation,
    state: &NetworkState,
    complexity: &ComplexityState<NetworkFeatures>,
    tick: u64,
    utilization: f64,
    pool_size: &mut u32,
) -> PipelineOutcome {
    let mut duration = base_duration;
    let input = |d: Duration| StageInput { duration: d, tick, utilization };

    let mut congestion_factor = 1.0;
    let mut latency_penalty = 1.0;
    let mut packet_loss_rate = 0.0;
    let mut protocol_efficiency = 1.0;

    if complexity.should_enable(NetworkFeatures::BANDWIDTH_SATURATION) {
        let (d, congestion, loss) = stage_bandwidth_saturation(input(duration), op, state);
        duration = d;
        congestion_factor = congestion;
        packet_loss_rate = loss;
    }
    if complexity.should_enable(NetworkFeatures::PROTOCOL_OVERHEAD) {
        let (d, efficiency) = stage_protocol_overhead(input(duration), state);
        duration = d;
        protocol_efficiency = efficiency;
        latency_penalty *= 1.0 / efficiency;
    }
    if complexity.should_enable(NetworkFeatures::GRAPH_TOPOLOGY_ROUTING) {
        duration = stage_graph_topology_routing(input(duration), op, state);
    }
    if complexity.should_enable(NetworkFeatures::CONNECTION_MANAGEMENT) {
        duration = stage_connection_management(input(duration), op, state, pool_size);
    }
    if complexity.should_enable(NetworkFeatures::QOS) {
        duration = stage_qos(input(duration), op);
    }
    if complexity.should_enable(NetworkFeatures::JITTER) {
        duration = stage_jitter(input(duration), op);
        latency_penalty *= 1.025;
    }
    if complexity.should_enable(NetworkFeatures::COMPRESSION) {
        duration = stage_compression(input(duration), state);
    }
    if complexity.should_enable(NetworkFeatures::TLS_SECURITY) {
        duration = stage_tls_security(input(duration), state);
        if state.tls_enabled {
            latency_penalty *= 1.08;
        }
    }

    let packet_lost = packet_loss_rate > 0.0
        && hash::decide(&op.id, op.data_size, op.op_type.len(), tick, 42, packet_loss_rate);

    PipelineOutcome { duration, congestion_factor, latency_penalty, packet_loss_rate, protocol_efficiency, packet_lost }
}

#[cfg(test)]
mod tests {
    use super::*;
    use simcore::ComplexityLevel;

    #[test]
    fn low_utilization_no_congestion_no_loss() {
        let state = NetworkState::default();
        let complexity = ComplexityState::<NetworkFeatures>::new(ComplexityLevel::Basic);
        let op = Operation::new("n1", "network_request", 1024, 0);
        let mut pool = 0u32;
        let out = run(Duration::from_millis(1), &op, &state, &complexity, 1, 0.2, &mut pool);
        assert_eq!(out.congestion_factor, 1.0);
        assert_eq!(out.packet_loss_rate, 0.0);
    }

    #[test]
    fn high_utilization_produces_congestion_and_loss() {
        let state = NetworkState::default();
        let complexity = ComplexityState::<NetworkFeatures>::new(ComplexityLevel::Basic);
        let op = Operation::new("n2", "network_request", 1024, 0);
        let mut pool = 0u32;
        let out = run(Duration::from_millis(1), &op, &state, &complexity, 1, 0.99, &mut pool);
        assert!(out.congestion_factor > 3.0);
        assert!(out.packet_loss_rate > 0.0);
    }

    #[test]
    fn pipeline_result_always_positive_and_finite() {
        let state = NetworkState::default();
        let complexity = ComplexityState::<NetworkFeatures>::new(ComplexityLevel::Maximum);
        let op = Operation::new("n3", "network_request", 4096, 0);
        let mut pool = 0u32;
        let out = run(Duration::from_micros(500), &op, &state, &complexity, 10, 0.5, &mut pool);
        assert!(out.duration.as_secs_f64() > 0.0);
        assert!(out.duration.as_secs_f64().is_finite());
    }
}
