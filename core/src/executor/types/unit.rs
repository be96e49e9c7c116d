use std::fmt;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::UnitError;

/// What a unit executor gets to see for one attempt.
#[derive(Debug, Clone)]
pub struct UnitContext {
    pub run_id: String,
    pub unit_id: String,
    /// 1-based attempt number.
    pub attempt: u32,
    /// Preview only; the executor must not mutate infrastructure.
    pub dry_run: bool,
    /// Fires on stack timeout or caller cancellation.
    pub cancel: CancellationToken,
}

/// Successful result of an attempt.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UnitOutput {
    pub summary: String,
    pub data: Option<serde_json::Value>,
}

impl UnitOutput {
    pub fn new(summary: impl Into<String>) -> Self {
        Self {
            summary: summary.into(),
            data: None,
        }
    }

    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }
}

/// Capability that performs a unit's action (plan, apply, validate...).
///
/// Implementations are called concurrently with other units' executors and
/// must serialize access to anything they share.
#[async_trait]
pub trait UnitExecutor: Send + Sync {
    async fn run(&self, ctx: UnitContext) -> Result<UnitOutput, UnitError>;
}

/// Adapter that lets a closure act as a [`UnitExecutor`].
pub struct FnExecutor<F> {
    f: F,
}

#[async_trait]
impl<F, Fut> UnitExecutor for FnExecutor<F>
where
    F: Fn(UnitContext) -> Fut + Send + Sync,
    Fut: Future<Output = Result<UnitOutput, UnitError>> + Send,
{
    async fn run(&self, ctx: UnitContext) -> Result<UnitOutput, UnitError> {
        (self.f)(ctx).await
    }
}

/// One schedulable node of a stack.
#[derive(Clone)]
pub struct Unit {
    id: String,
    dependency_ids: Vec<String>,
    executor: Arc<dyn UnitExecutor>,
}

impl Unit {
    pub fn new<I, S>(id: impl Into<String>, dependency_ids: I, executor: Arc<dyn UnitExecutor>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut deps: Vec<String> = Vec::new();
        for dep in dependency_ids {
            let dep = dep.into();
            if !deps.contains(&dep) {
                deps.push(dep);
            }
        }

        Self {
            id: id.into(),
            dependency_ids: deps,
            executor,
        }
    }

    pub fn from_fn<I, S, F, Fut>(id: impl Into<String>, dependency_ids: I, f: F) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
        F: Fn(UnitContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<UnitOutput, UnitError>> + Send + 'static,
    {
        Self::new(id, dependency_ids, Arc::new(FnExecutor { f }))
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn dependency_ids(&self) -> &[String] {
        &self.dependency_ids
    }

    pub fn executor(&self) -> &Arc<dyn UnitExecutor> {
        &self.executor
    }
}

impl fmt::Debug for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Unit")
            .field("id", &self.id)
            .field("dependency_ids", &self.dependency_ids)
            .finish_non_exhaustive()
    }
}
