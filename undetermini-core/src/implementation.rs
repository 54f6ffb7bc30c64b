//! One candidate under benchmark.
//!
//! An [`Implementation`] pairs a display name with an [`Execute`] strategy,
//! the method slots it was built from, and a [`CostLedger`]. Every call to
//! [`Implementation::run`] opens its own ledger bucket under a fresh
//! [`CallTag`], hands a [`RunContext`] bound to that tag to the candidate, and
//! reads back only that bucket. Concurrent runs of the same implementation
//! therefore never see each other's cost.

use crate::cost::{CallTag, Cost, CostLedger};
use crate::error::ExecutionError;
use crate::hasher;
use crate::method::MethodSet;
use async_trait::async_trait;
use serde_json::{Value, json};
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Candidate logic: turn one input into one output.
#[async_trait]
pub trait Execute: Send + Sync {
    async fn execute(&self, input: &Value, ctx: &RunContext) -> Result<Value, ExecutionError>;
}

/// Adapter turning an async closure into an [`Execute`] strategy.
pub struct ExecuteFn<F>(F);

/// Wrap `f` so it can be used where an [`Execute`] is expected.
pub fn execute_fn<F, Fut>(f: F) -> ExecuteFn<F>
where
    F: Fn(Value, RunContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value, ExecutionError>> + Send + 'static,
{
    ExecuteFn(f)
}

#[async_trait]
impl<F, Fut> Execute for ExecuteFn<F>
where
    F: Fn(Value, RunContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value, ExecutionError>> + Send + 'static,
{
    async fn execute(&self, input: &Value, ctx: &RunContext) -> Result<Value, ExecutionError> {
        (self.0)(input.clone(), ctx.clone()).await
    }
}

/// Handle given to a candidate for the duration of one run.
#[derive(Clone)]
pub struct RunContext {
    tag: CallTag,
    ledger: CostLedger,
    methods: Arc<MethodSet>,
}

impl RunContext {
    /// Add to this run's cost.
    pub fn add_cost(&self, amount: impl Into<Cost>) {
        self.ledger.add(&self.tag, amount.into());
    }

    /// Cost accumulated by this run so far.
    pub fn current_cost(&self) -> Cost {
        self.ledger.current(&self.tag)
    }

    pub fn call_tag(&self) -> &CallTag {
        &self.tag
    }

    pub fn methods(&self) -> &MethodSet {
        &self.methods
    }
}

impl fmt::Debug for RunContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunContext")
            .field("tag", &self.tag)
            .field("methods", &self.methods.len())
            .finish()
    }
}

/// Outcome of a single execution attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct RunOutcome {
    pub result: Option<Value>,
    pub error: Option<ExecutionError>,
    pub latency_ms: u64,
    pub cost: Cost,
}

impl RunOutcome {
    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

/// A fully configured candidate strategy.
#[derive(Clone)]
pub struct Implementation {
    name: String,
    source_id: String,
    execute: Arc<dyn Execute>,
    methods: Arc<MethodSet>,
    resource: Option<String>,
    ledger: CostLedger,
}

impl Implementation {
    /// `source_id` must change whenever the execute logic changes; it is what
    /// the implementation identity is derived from.
    pub fn new(
        name: impl Into<String>,
        source_id: impl Into<String>,
        execute: impl Execute + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            source_id: source_id.into(),
            execute: Arc::new(execute),
            methods: Arc::new(MethodSet::new()),
            resource: None,
            ledger: CostLedger::new(),
        }
    }

    /// Build from an async closure.
    pub fn from_fn<F, Fut>(name: impl Into<String>, source_id: impl Into<String>, f: F) -> Self
    where
        F: Fn(Value, RunContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, ExecutionError>> + Send + 'static,
    {
        Self::new(name, source_id, execute_fn(f))
    }

    pub(crate) fn from_shared(
        name: String,
        source_id: String,
        execute: Arc<dyn Execute>,
        methods: MethodSet,
    ) -> Self {
        Self {
            name,
            source_id,
            execute,
            methods: Arc::new(methods),
            resource: None,
            ledger: CostLedger::new(),
        }
    }

    pub fn with_methods(mut self, methods: MethodSet) -> Self {
        self.methods = Arc::new(methods);
        self
    }

    /// Tag this implementation with the external resource it consumes (for
    /// example a model name), used for throttling.
    pub fn with_resource(mut self, resource: impl Into<String>) -> Self {
        self.resource = Some(resource.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn source_id(&self) -> &str {
        &self.source_id
    }

    pub fn methods(&self) -> &MethodSet {
        &self.methods
    }

    pub fn resource(&self) -> Option<&str> {
        self.resource.as_deref()
    }

    /// Slot name to slot-value hash.
    pub fn method_hashes(&self) -> Value {
        self.methods.hashes()
    }

    /// Identity of this candidate, independent of input.
    pub fn implementation_identity(&self) -> String {
        hasher::hash_value(&json!({
            "methods": self.method_hashes(),
            "execute": hasher::hash_source(&self.source_id),
        }))
    }

    /// Identity of an input, independent of candidate.
    pub fn input_identity(input: &Value) -> String {
        hasher::hash_value(input)
    }

    /// Cache key for this candidate against `input`.
    pub fn run_identity(&self, input: &Value) -> String {
        hasher::hash_value(&json!({
            "implementation": self.implementation_identity(),
            "input": Self::input_identity(input),
        }))
    }

    /// Add cost to the bucket for `tag`, or to the shared default bucket.
    pub fn add_cost(&self, amount: impl Into<Cost>, tag: Option<&CallTag>) {
        match tag {
            Some(tag) => self.ledger.add(tag, amount.into()),
            None => self.ledger.add(&CallTag::default_tag(), amount.into()),
        }
    }

    /// Cost currently held for `tag` (default bucket when `None`).
    pub fn current_cost(&self, tag: Option<&CallTag>) -> Cost {
        match tag {
            Some(tag) => self.ledger.current(tag),
            None => self.ledger.current(&CallTag::default_tag()),
        }
    }

    /// Number of in-flight cost buckets, including the default one if used.
    pub fn open_cost_buckets(&self) -> usize {
        self.ledger.open_buckets()
    }

    /// Execute once. Failures are captured in the outcome, never returned.
    pub async fn run(&self, input: &Value) -> RunOutcome {
        self.run_with_deadline(input, None).await
    }

    /// Execute once, giving up after `deadline` if one is set. A timed-out run
    /// reports an error, its elapsed latency, and the cost added before expiry.
    pub async fn run_with_deadline(&self, input: &Value, deadline: Option<Duration>) -> RunOutcome {
        let tag = CallTag::generate();
        self.ledger.open(&tag);
        let ctx = RunContext {
            tag: tag.clone(),
            ledger: self.ledger.clone(),
            methods: self.methods.clone(),
        };

        let start = Instant::now();
        let outcome = match deadline {
            Some(limit) => {
                match tokio::time::timeout(limit, self.execute.execute(input, &ctx)).await {
                    Ok(outcome) => outcome,
                    Err(_) => Err(ExecutionError::new(format!(
                        "timed out after {}ms",
                        limit.as_millis()
                    ))),
                }
            }
            None => self.execute.execute(input, &ctx).await,
        };
        let latency_ms = start.elapsed().as_millis() as u64;
        let cost = self.ledger.take(&tag);

        match outcome {
            Ok(result) => {
                debug!(
                    implementation = self.name.as_str(),
                    call_tag = tag.as_str(),
                    latency_ms,
                    cost = %cost,
                    "Run completed"
                );
                RunOutcome {
                    result: Some(result),
                    error: None,
                    latency_ms,
                    cost,
                }
            }
            Err(error) => {
                warn!(
                    implementation = self.name.as_str(),
                    call_tag = tag.as_str(),
                    error = %error,
                    "Run failed"
                );
                RunOutcome {
                    result: None,
                    error: Some(error),
                    latency_ms,
                    cost,
                }
            }
        }
    }
}

impl fmt::Debug for Implementation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Implementation")
            .field("name", &self.name)
            .field("source_id", &self.source_id)
            .field("methods", &self.methods)
            .field("resource", &self.resource)
            .finish_non_exhaustive()
    }
}
