//! Network feature-flag set gated by the complexity dial (FR §4.6).

use bitflags::bitflags;
use simcore::{ComplexityLevel, LeveledFeatures};

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct NetworkFeatures: u32 {
        /// Four-band congestion curve with packet-loss probability.
        const BANDWIDTH_SATURATION = 1 << 0;
        /// Per-protocol header/efficiency/multiplexing overhead.
        const PROTOCOL_OVERHEAD    = 1 << 1;
        /// Shortest-path routing over the topology graph when present.
        const GRAPH_TOPOLOGY_ROUTING = 1 << 2;
        /// Keep-alive reuse vs TCP-handshake cost, bounded connection pool.
        const CONNECTION_MANAGEMENT  = 1 << 3;
        /// Priority-aware bandwidth shaping under contention.
        const QOS                    = 1 << 4;
        /// Seeded ±2.5% latency jitter.
        const JITTER                 = 1 << 5;
        /// Payload compression trade-off.
        const COMPRESSION            = 1 << 6;
        /// TLS overhead.
        const TLS_SECURITY           = 1 << 7;
    }
}

impl LeveledFeatures for NetworkFeatures {
    fn for_level(level: ComplexityLevel) -> Self {
        let mut flags = Self::empty();
        if level >= ComplexityLevel::Basic {
            flags |= Self::BANDWIDTH_SATURATION | Self::PROTOCOL_OVERHEAD;
        }
        if level >= ComplexityLevel::Advanced {
            flags |= Self::GRAPH_TOPOLOGY_ROUTING | Self::CONNECTION_MANAGEMENT | Self::QOS;
        }
        if level >= ComplexityLevel::Maximum {
            flags |= Self::JITTER | Self::COMPRESSION | Self::TLS_SECURITY;
        }
        flags
    }
}
