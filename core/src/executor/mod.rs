//! Level-by-level execution of a unit dependency graph (DAG)
//!
//! This module provides:
//! - Dependency graph construction and validation (unresolved ids, duplicates, cycles)
//! - Kahn leveling into dependency-independent batches
//! - A bounded worker pool per level with stack timeout and cooperative cancellation
//! - Per-unit retry with pluggable delay curves
//! - A write-once result aggregator producing the final report
//!
//! # Architecture
//!
//! ```text
//! Vec<Unit>
//!   ↓
//! DependencyGraph::from_units() → DuplicateUnitId / UnresolvedDependency / CyclicDependency
//!   ↓
//! DependencyGraph { units, index, edges, dependents, levels }
//!   ↓
//! ExecutionEngine::execute_graph()
//!   ├─ per level: execute_level() (worker pool, deadline, cancel grace)
//!   │     └─ per unit: RetryController::run() (attempts, delays, per-unit timeout)
//!   └─ ResultAggregator::finish() → StackExecutionReport
//! ```

mod aggregate;
mod engine;
mod graph;
mod output;
mod retry;
mod scheduler;
pub mod traits;
pub mod types;

pub use aggregate::{ResultAggregator, RunSummary};
pub use engine::{execute_units, ExecutionEngine, ExecutionEngineBuilder};
pub use graph::{DependencyGraph, GraphEdge, GraphSnapshot};
pub use output::EventEmitter;
pub use retry::{FixedDelay, RetryController, UnitRun};
pub use scheduler::{execute_level, LevelLimits, LevelOutcome};
pub use types::{ExecutionPolicy, ExecutionResult, StackExecutionReport};
