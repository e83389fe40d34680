//! Health metrics (FR §3 "HealthMetrics", §4.1 "Health update").

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HealthMetrics {
    /// Composite score in `[0.0, 1.0]`; 1.0 is perfectly healthy.
    pub score: f64,
    pub utilization: f64,
    pub queue_utilization: f64,
    pub error_rate: f64,
    pub average_latency_ms: f64,
    pub throughput_ops_per_sec: f64,
    pub last_updated_tick: u64,
}

impl Default for HealthMetrics {
    fn default() -> Self {
        Self {
            score: 1.0,
            utilization: 0.0,
            queue_utilization: 0.0,
            error_rate: 0.0,
            average_latency_ms: 0.0,
            throughput_ops_per_sec: 0.0,
            last_updated_tick: 0,
        }
    }
}
