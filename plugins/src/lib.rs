//! Pluggable pieces for the stackrun engine: retry delay curves, output
//! renderers, failure classification and config-driven wiring.

pub mod executor;
pub mod factory;
