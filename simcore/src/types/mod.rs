//! The engine taxonomy and data model (component 1, FR §3).

pub mod convergence;
pub mod dynamic;
pub mod engine_kind;
pub mod health;
pub mod operation;
pub mod penalty;
pub mod profile;
pub mod result;

pub use convergence::{ConvergenceMetrics, ConvergenceState, StatisticalModel};
pub use dynamic::DynamicState;
pub use engine_kind::{EngineId, EngineKind};
pub use health::HealthMetrics;
pub use operation::{ComplexityTag, Operation, OperationId, OperationType, Priority, QueuedOperation};
pub use penalty::{AccessPattern, EngineDetail, GradingBands, PenaltyInformation, PerformanceGrade, RecommendedAction};
pub use profile::{EngineProfile, LoadCurvePoints};
pub use result::OperationResult;
