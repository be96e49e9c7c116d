//! Dependency-aware parallel execution of infrastructure stacks.
//!
//! A stack is a flat list of [`Unit`]s that declare which other units they
//! wait on. The engine levels them into dependency batches, runs each batch
//! through a bounded worker pool with per-unit retry, and returns a
//! [`StackExecutionReport`] that accounts for every unit.

pub mod config;
pub mod error;
pub mod executor;
pub mod logging;

pub use error::{ExecutorError, UnitError};
pub use executor::types::{
    ExecutionPolicy, ExecutionResult, OverallStatus, StackExecutionReport, Unit, UnitContext,
    UnitExecutor, UnitOutput, UnitStatus,
};
pub use executor::{execute_units, DependencyGraph, ExecutionEngine};
