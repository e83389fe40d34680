//! Network-specific physical state and topology graph (FR §4.5).

use simcore::types::EngineProfile;
use std::cmp::Ordering;
use std::collections::{BTreeMap, BinaryHeap};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NetworkProtocol {
    #[default]
    Tcp,
    Udp,
    Http1_1,
    Http2,
    Grpc,
}

impl NetworkProtocol {
    fn from_str(s: &str) -> Option<Self> {
        match s {
            "tcp" => Some(Self::Tcp),
            "udp" => Some(Self::Udp),
            "http1_1" | "http/1.1" => Some(Self::Http1_1),
            "http2" | "http/2" => Some(Self::Http2),
            "grpc" => Some(Self::Grpc),
            _ => None,
        }
    }

    /// Header overhead in bytes, steady-state efficiency, and multiplexing
    /// factor (FR §4.5: "HTTP/2 multiplex 4x, gRPC 8x").
    pub fn overhead(self) -> (f64, f64, f64) {
        match self {
            Self::Tcp => (40.0, 0.95, 1.0),
            Self::Udp => (8.0, 0.98, 1.0),
            Self::Http1_1 => (200.0, 0.85, 1.0),
            Self::Http2 => (120.0, 0.90, 4.0),
            Self::Grpc => (100.0, 0.92, 8.0),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NetworkType {
    Lan,
    #[default]
    Wan,
    Internet,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LinkKind {
    #[default]
    Fiber,
    Satellite,
    Wireless,
    Ethernet,
}

#[derive(Debug, Clone, Copy)]
pub struct TopologyEdge {
    pub distance_km: f64,
    pub measured_latency_ms: f64,
    pub bandwidth_mbps: f64,
    pub hop_count: u32,
    pub link_kind: LinkKind,
    pub quality: f64,
}

/// Adjacency list keyed by node name; Dijkstra over `measured_latency_ms`.
#[derive(Debug, Clone, Default)]
pub struct TopologyGraph {
    pub edges: BTreeMap<String, Vec<(String, TopologyEdge)>>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct HeapEntry(f64, u32);
impl Eq for HeapEntry {}
impl Ord for HeapEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        other.0.total_cmp(&self.0)
    }
}
impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl TopologyGraph {
    /// Shortest-path latency (ms) and hop count from `from` to `to`, `None`
    /// if unreachable or either node is absent (FR §4.5: "shortest-path
    /// sum of edge latencies when a target node is present").
    pub fn shortest_path_ms(&self, from: &str, to: &str) -> Option<(f64, u32)> {
        if from == to {
            return Some((0.0, 0));
        }
        let mut best: BTreeMap<String, (f64, u32)> = BTreeMap::new();
        best.insert(from.to_string(), (0.0, 0));
        let mut heap = BinaryHeap::new();
        heap.push((HeapEntry(0.0, 0), from.to_string()));
        while let Some((HeapEntry(cost, hops), node)) = heap.pop() {
            if node == to {
                return Some((cost, hops));
            }
            if best.get(&node).map(|(c, _)| *c < cost).unwrap_or(false) {
                continue;
            }
            let Some(neighbors) = self.edges.get(&node) else { continue };
            for (next, edge) in neighbors {
                let next_cost = cost + edge.measured_latency_ms;
                let next_hops = hops + edge.hop_count.max(1);
                let better = best.get(next).map(|(c, _)| next_cost < *c).unwrap_or(true);
                if better {
                    best.insert(next.clone(), (next_cost, next_hops));
                    heap.push((HeapEntry(next_cost, next_hops), next.clone()));
                }
            }
        }
        None
    }
}

pub const SPEED_OF_LIGHT_M_S: f64 = 299_792_458.0;
pub const FIBER_REFRACTIVE_INDEX: f64 = 0.67;
pub const ROUTING_OVERHEAD_DEFAULT: f64 = 1.3;

pub const DEFAULT_BANDWIDTH_MBPS: f64 = 100.0;
pub const DEFAULT_BASE_LATENCY_MS: f64 = 10.0;
pub const DEFAULT_MAX_CONNECTIONS: u32 = 100;
pub const DEFAULT_DISTANCE_KM: f64 = 10.0;
pub const DEFAULT_KEEP_ALIVE_REUSE_PROBABILITY: f64 = 0.8;
pub const DEFAULT_ROUTING_OVERHEAD: f64 = ROUTING_OVERHEAD_DEFAULT;

pub struct NetworkState {
    pub bandwidth_mbps: f64,
    pub base_latency_ms: f64,
    pub max_connections: u32,
    pub protocol: NetworkProtocol,
    pub distance_km: f64,
    pub network_type: NetworkType,
    pub routing_overhead: f64,
    pub topology: Option<TopologyGraph>,
    pub origin_node: String,
    pub connection_pool_size: u32,
    pub keep_alive_enabled: bool,
    pub keep_alive_reuse_probability: f64,
    pub packet_loss_override: Option<f64>,
    pub compression_enabled: bool,
    pub tls_enabled: bool,
}

impl Default for NetworkState {
    fn default() -> Self {
        Self {
            bandwidth_mbps: DEFAULT_BANDWIDTH_MBPS,
            base_latency_ms: DEFAULT_BASE_LATENCY_MS,
            max_connections: DEFAULT_MAX_CONNECTIONS,
            protocol: NetworkProtocol::default(),
            distance_km: DEFAULT_DISTANCE_KM,
            network_type: NetworkType::default(),
            routing_overhead: DEFAULT_ROUTING_OVERHEAD,
            topology: None,
            origin_node: "origin".to_string(),
            connection_pool_size: 0,
            keep_alive_enabled: true,
            keep_alive_reuse_probability: DEFAULT_KEEP_ALIVE_REUSE_PROBABILITY,
            packet_loss_override: None,
            compression_enabled: false,
            tls_enabled: false,
        }
    }
}

impl NetworkState {
    /// Hard lower bound on latency from propagation physics alone (FR
    /// §4.5). Additive, never scaled down by any stage.
    pub fn physics_floor_ms(&self) -> f64 {
        let distance_m = self.distance_km * 1000.0;
        (distance_m / (SPEED_OF_LIGHT_M_S * FIBER_REFRACTIVE_INDEX)) * self.routing_overhead * 1000.0
    }

    pub fn apply_profile(&mut self, profile: &EngineProfile) {
        if let Some(v) = profile.baseline("bandwidth_mbps") {
            self.bandwidth_mbps = v;
        }
        if let Some(v) = profile.baseline("base_latency_ms") {
            self.base_latency_ms = v;
        }
        if let Some(v) = profile.specific_f64("connection", "max_connections") {
            self.max_connections = v as u32;
        }
        if let Some(v) = profile.specific_str("protocol", "type").and_then(NetworkProtocol::from_str) {
            self.protocol = v;
        }
        if let Some(v) = profile.specific_f64("topology", "distance_km") {
            self.distance_km = v;
        }
        if let Some(v) = profile.specific_f64("topology", "routing_overhead") {
            self.routing_overhead = v;
        }
        if let Some(v) = profile.specific_str("connection", "keep_alive_enabled") {
            self.keep_alive_enabled = v == "true";
        }
        if let Some(v) = profile.specific_f64("network", "packet_loss_probability") {
            self.packet_loss_override = Some(v);
        }
        if let Some(v) = profile.specific_str("compression", "enabled") {
            self.compression_enabled = v == "true";
        }
        if let Some(v) = profile.specific_str("security", "tls_enabled") {
            self.tls_enabled = v == "true";
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shortest_path_sums_two_hops() {
        let mut graph = TopologyGraph::default();
        let edge_a = TopologyEdge { distance_km: 1.0, measured_latency_ms: 2.0, bandwidth_mbps: 1000.0, hop_count: 1, link_kind: LinkKind::Fiber, quality: 1.0 };
        let edge_b = TopologyEdge { distance_km: 1.0, measured_latency_ms: 3.0, bandwidth_mbps: 1000.0, hop_count: 1, link_kind: LinkKind::Fiber, quality: 1.0 };
        graph.edges.insert("origin".into(), vec![("mid".into(), edge_a)]);
        graph.edges.insert("mid".into(), vec![("dest".into(), edge_b)]);
        let (latency, hops) = graph.shortest_path_ms("origin", "dest").unwrap();
        assert_eq!(latency, 5.0);
        assert_eq!(hops, 2);
    }

    #[test]
    fn unreachable_node_returns_none() {
        let graph = TopologyGraph::default();
        assert!(graph.shortest_path_ms("origin", "nowhere").is_none());
    }
}
