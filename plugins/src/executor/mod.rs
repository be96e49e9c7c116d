pub mod classify;
pub mod renderers;
pub mod strategies;

pub use classify::FailureClassifier;
pub use renderers::{JsonlRendererPlugin, ProgressBarRendererPlugin, TextRendererPlugin};
pub use strategies::{ExponentialBackoffPlugin, LinearRetryPlugin};
