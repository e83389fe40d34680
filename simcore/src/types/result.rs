//! Operation results (FR §3 "OperationResult").

use super::operation::{OperationId, OperationType};
use super::penalty::PenaltyInformation;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// The outcome of a completed operation, consumed once by the external
/// scheduler (FR §3, §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationResult {
    pub operation_id: OperationId,
    pub operation_type: OperationType,
    pub processing_time: Duration,
    pub completion_tick: u64,
    pub success: bool,
    pub error: Option<String>,
    pub next_component: Option<String>,
    pub penalty: Option<PenaltyInformation>,
    #[serde(default)]
    pub metrics: BTreeMap<String, serde_json::Value>,
}

impl OperationResult {
    /// Record a modeled-failure metric on the result (FR §4.8, §7): ordinary
    /// capacity/physical conditions are reported here, never raised as
    /// `EngineError`.
    pub fn with_metric(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.metrics.insert(key.into(), value.into());
        self
    }
}
