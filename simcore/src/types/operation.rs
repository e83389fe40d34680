//! Operation records (component 1: data model, FR §3).

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Algorithmic complexity tag carried by an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComplexityTag {
    /// O(1)
    Constant,
    /// O(log n)
    Logarithmic,
    /// O(n)
    Linear,
    /// O(n log n)
    Linearithmic,
    /// O(n²)
    Quadratic,
}

impl ComplexityTag {
    /// Multiplier applied to base processing time; `n` is derived from the
    /// operation's data size (in elements, approximated by byte count).
    pub fn factor(self, n: f64) -> f64 {
        let n = n.max(1.0);
        match self {
            Self::Constant => 1.0,
            Self::Logarithmic => n.ln().max(1.0),
            Self::Linear => n,
            Self::Linearithmic => n * n.ln().max(1.0),
            Self::Quadratic => n * n,
        }
        // Normalized so a 4 KiB operation doesn't dominate every pipeline;
        // callers scale the raw factor, they don't use it as an absolute duration.
        .min(1.0e6)
    }
}

/// Priority of an operation, used by QoS-aware stages (storage/network).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    #[default]
    Normal,
    High,
}

/// Stable operation identifier.
pub type OperationId = String;

/// A free-form operation-type tag (e.g. `cpu_compute`, `memory_read`,
/// `storage_write`, `network_send`, `memory_barrier`). Engines switch on
/// well-known prefixes/substrings but never reject an unrecognized tag.
pub type OperationType = String;

/// An immutable unit of simulated work (FR §3 "Operation").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Operation {
    pub id: OperationId,
    pub op_type: OperationType,
    pub data_size: u64,
    pub complexity: ComplexityTag,
    /// Originating-language tag (e.g. `"rust"`, `"python"`, `"go"`); drives
    /// CPU's language multiplier and memory's GC-pause stage.
    pub language: String,
    pub priority: Priority,
    #[serde(default)]
    pub metadata: BTreeMap<String, serde_json::Value>,
    pub start_tick: u64,
    pub deadline: Option<u64>,
    /// Routing hint for the component the scheduler should send this
    /// operation to next; recorded but never acted on internally.
    pub next_component: Option<String>,
}

impl Operation {
    /// Minimal builder for tests/demos; all non-defaulted fields must be set.
    pub fn new(id: impl Into<OperationId>, op_type: impl Into<OperationType>, data_size: u64, start_tick: u64) -> Self {
        Self {
            id: id.into(),
            op_type: op_type.into(),
            data_size,
            complexity: ComplexityTag::Linear,
            language: "rust".to_string(),
            priority: Priority::Normal,
            metadata: BTreeMap::new(),
            start_tick,
            deadline: None,
            next_component: None,
        }
    }

    pub fn with_complexity(mut self, complexity: ComplexityTag) -> Self {
        self.complexity = complexity;
        self
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_deadline(mut self, deadline: u64) -> Self {
        self.deadline = Some(deadline);
        self
    }
}

/// An [`Operation`] plus the tick at which it entered the input queue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueuedOperation {
    pub operation: Operation,
    pub enqueued_tick: u64,
}
