//! Penalty-information protocol (FR §3, §4.7).

use super::engine_kind::{EngineId, EngineKind};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Engine-specific penalty sub-record (FR §3 table).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "engine", rename_all = "snake_case")]
pub enum EngineDetail {
    Cpu {
        cache_hit_ratio: f64,
        vectorization_ratio: f64,
        thermal_throttling: f64,
        core_utilization: f64,
        memory_contention: f64,
    },
    Memory {
        bandwidth_utilization: f64,
        numa_penalty: f64,
        row_buffer_hit_rate: f64,
        memory_pressure: f64,
        channel_contention: f64,
    },
    Storage {
        iops_utilization: f64,
        queue_depth: u32,
        access_pattern: AccessPattern,
        thermal_throttling: f64,
        power_state_impact: f64,
    },
    Network {
        bandwidth_utilization: f64,
        congestion_factor: f64,
        packet_loss_rate: f64,
        latency_penalty: f64,
        protocol_efficiency: f64,
    },
}

/// Storage access-pattern classification (FR §3, §4.3, §4.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessPattern {
    Sequential,
    Random,
    Stride,
}

/// Letter grade derived from the total penalty factor (FR §4.7).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PerformanceGrade {
    A,
    B,
    C,
    D,
    F,
}

/// Action a caller is advised to take given the grade (FR §4.7).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendedAction {
    Continue,
    Throttle,
    Redirect,
}

/// The upper two grade-boundary thresholds differ between CPU/Memory and
/// Storage/Network per §4.7; the lower two (1.2, 1.5) are shared by all.
#[derive(Debug, Clone, Copy)]
pub struct GradingBands {
    pub c_upper: f64,
    pub d_upper: f64,
}

impl GradingBands {
    /// CPU and Memory engines: C ≤ 2.0, D ≤ 3.0.
    pub const CPU_MEMORY: Self = Self { c_upper: 2.0, d_upper: 3.0 };
    /// Storage and Network engines: same bands in this spec, named
    /// separately so a future divergence has a single place to change.
    pub const STORAGE_NETWORK: Self = Self { c_upper: 2.0, d_upper: 3.0 };

    /// Grade and recommended action for a total penalty factor.
    ///
    /// Invalid totals (NaN or ≤ 0) are treated as `1.0` (grade A) per §4.7.
    pub fn grade(self, total: f64) -> (PerformanceGrade, RecommendedAction) {
        let t = sanitize_total(total);
        if t <= 1.2 {
            (PerformanceGrade::A, RecommendedAction::Continue)
        } else if t <= 1.5 {
            (PerformanceGrade::B, RecommendedAction::Continue)
        } else if t <= self.c_upper {
            (PerformanceGrade::C, RecommendedAction::Throttle)
        } else if t <= self.d_upper {
            (PerformanceGrade::D, RecommendedAction::Throttle)
        } else {
            (PerformanceGrade::F, RecommendedAction::Redirect)
        }
    }
}

/// Replace a non-finite or non-positive penalty total with the neutral
/// value `1.0` (FR §3, §4.7).
pub fn sanitize_total(total: f64) -> f64 {
    if total.is_finite() && total > 0.0 { total } else { 1.0 }
}

/// Clamp a single penalty component to the valid range `[1.0, +inf)`,
/// replacing non-finite values with `1.0` (FR §3 invariant v).
pub fn sanitize_factor(factor: f64) -> f64 {
    if factor.is_finite() && factor >= 1.0 { factor } else { 1.0 }
}

/// The six dimensionless penalty factors plus engine identity and timing
/// (FR §3 "PenaltyInformation").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PenaltyInformation {
    pub engine_kind: EngineKind,
    pub engine_id: EngineId,
    pub base_processing_time: Duration,
    pub actual_processing_time: Duration,
    pub load_factor: f64,
    pub queue_factor: f64,
    pub thermal_factor: f64,
    pub contention_factor: f64,
    pub health_factor: f64,
    pub total_factor: f64,
    pub detail: EngineDetail,
    pub grade: PerformanceGrade,
    pub recommended_action: RecommendedAction,
}

impl PenaltyInformation {
    /// Build a `PenaltyInformation`, sanitizing every factor and deriving
    /// grade/action from the (sanitized) total.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        engine_kind: EngineKind,
        engine_id: EngineId,
        base_processing_time: Duration,
        actual_processing_time: Duration,
        load_factor: f64,
        queue_factor: f64,
        thermal_factor: f64,
        contention_factor: f64,
        health_factor: f64,
        total_factor: f64,
        detail: EngineDetail,
        bands: GradingBands,
    ) -> Self {
        let total_factor = sanitize_total(total_factor);
        let (grade, recommended_action) = bands.grade(total_factor);
        Self {
            engine_kind,
            engine_id,
            base_processing_time,
            actual_processing_time,
            load_factor: sanitize_factor(load_factor),
            queue_factor: sanitize_factor(queue_factor),
            thermal_factor: sanitize_factor(thermal_factor),
            contention_factor: sanitize_factor(contention_factor),
            health_factor: sanitize_factor(health_factor),
            total_factor,
            detail,
            grade,
            recommended_action,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grading_boundaries_cpu_memory() {
        let bands = GradingBands::CPU_MEMORY;
        assert_eq!(bands.grade(1.2).0, PerformanceGrade::A);
        assert_eq!(bands.grade(1.2001).0, PerformanceGrade::B);
        assert_eq!(bands.grade(1.5).0, PerformanceGrade::B);
        assert_eq!(bands.grade(1.5001).0, PerformanceGrade::C);
        assert_eq!(bands.grade(2.0).0, PerformanceGrade::C);
        assert_eq!(bands.grade(2.0001).0, PerformanceGrade::D);
        assert_eq!(bands.grade(3.0).0, PerformanceGrade::D);
        assert_eq!(bands.grade(3.0001).0, PerformanceGrade::F);
    }

    #[test]
    fn invalid_totals_become_one() {
        assert_eq!(sanitize_total(f64::NAN), 1.0);
        assert_eq!(sanitize_total(0.0), 1.0);
        assert_eq!(sanitize_total(-5.0), 1.0);
        assert_eq!(sanitize_total(2.5), 2.5);
    }

    #[test]
    fn actions_follow_grade() {
        let bands = GradingBands::STORAGE_NETWORK;
        assert_eq!(bands.grade(1.0).1, RecommendedAction::Continue);
        assert_eq!(bands.grade(1.8).1, RecommendedAction::Throttle);
        assert_eq!(bands.grade(5.0).1, RecommendedAction::Redirect);
    }
}
