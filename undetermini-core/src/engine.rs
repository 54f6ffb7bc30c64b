//! Benchmark engine.
//!
//! For every implementation the engine reconciles what the store already
//! holds with what the caller asked for, executes only the missing runs, and
//! folds fresh and cached records into one [`MetricsRow`].
//!
//! Each implementation moves through three steps:
//!
//! 1. [`BatchPlan`]: run identity, cached count and deficit.
//! 2. Fan-out of the deficit; every outcome is persisted as soon as it settles.
//! 3. Aggregation over the `times` most recent records, the first `deficit`
//!    of which count as fresh.

use crate::accuracy::{AccuracyFn, AccuracySpec, ErrorAccuracyPolicy};
use crate::cost::Cost;
use crate::error::{Result, StorageError};
use crate::implementation::Implementation;
use crate::presenter::{Presenter, PresenterOptions};
use crate::store::{JsonResultStore, ResultStore, RunRecord, StoreOptions};
use crate::throttle::{Throttle, ThrottleConfig};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Aggregated metrics for one implementation. Recomputed on every run, never
/// persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsRow {
    pub name: String,
    pub average_cost: Cost,
    /// Milliseconds.
    pub average_latency: f64,
    /// Percentage in `[0, 100]`.
    pub average_accuracy: f64,
    /// Percentage of records carrying an error.
    pub average_error_rate: f64,
    pub real_call_count: usize,
    pub call_from_cache_count: usize,
    /// Cost summed over every satisfying record, cached or not.
    pub results_full_price: Cost,
    /// Cost summed over the freshly executed records only.
    pub results_current_price: Cost,
}

/// Engine-wide behaviour that is not part of a single request.
#[derive(Debug, Clone)]
pub struct EngineSettings {
    /// Per-run deadline; expired runs are recorded as errors.
    pub run_timeout: Option<Duration>,
    /// Run implementation batches concurrently rather than one after another.
    pub parallel_implementations: bool,
    pub error_accuracy: ErrorAccuracyPolicy,
    pub presenter: PresenterOptions,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            run_timeout: None,
            parallel_implementations: true,
            error_accuracy: ErrorAccuracyPolicy::default(),
            presenter: PresenterOptions::default(),
        }
    }
}

/// One benchmark invocation.
pub struct RunRequest {
    pub input: Value,
    pub implementations: Vec<Implementation>,
    pub times: usize,
    pub use_cache: bool,
    pub expected_output: Option<Value>,
    pub evaluate_accuracy: Option<Arc<AccuracyFn>>,
    pub presenter: Option<Arc<dyn Presenter>>,
}

impl RunRequest {
    pub fn new(input: Value, implementations: Vec<Implementation>) -> Self {
        Self {
            input,
            implementations,
            times: 1,
            use_cache: false,
            expected_output: None,
            evaluate_accuracy: None,
            presenter: None,
        }
    }

    pub fn times(mut self, times: usize) -> Self {
        self.times = times;
        self
    }

    pub fn use_cache(mut self, use_cache: bool) -> Self {
        self.use_cache = use_cache;
        self
    }

    pub fn expected_output(mut self, expected: Value) -> Self {
        self.expected_output = Some(expected);
        self
    }

    pub fn evaluate_accuracy<F>(mut self, evaluator: F) -> Self
    where
        F: Fn(&Value) -> f64 + Send + Sync + 'static,
    {
        self.evaluate_accuracy = Some(Arc::new(evaluator));
        self
    }

    pub fn presenter(mut self, presenter: Arc<dyn Presenter>) -> Self {
        self.presenter = Some(presenter);
        self
    }
}

/// Work needed to bring one implementation up to `times` records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchPlan {
    pub run_id: String,
    pub times: usize,
    pub cached: usize,
    pub deficit: usize,
}

impl BatchPlan {
    pub fn new(run_id: String, times: usize, cached: usize) -> Self {
        Self {
            run_id,
            times,
            cached,
            deficit: times.saturating_sub(cached),
        }
    }
}

/// The benchmark engine.
pub struct Undetermini {
    store: Arc<dyn ResultStore>,
    throttle: Throttle,
    settings: EngineSettings,
}

impl Undetermini {
    pub fn new(store: Arc<dyn ResultStore>) -> Self {
        Self {
            store,
            throttle: Throttle::unlimited(),
            settings: EngineSettings::default(),
        }
    }

    /// Open a [`JsonResultStore`] and build an engine on top of it.
    pub async fn create(options: StoreOptions) -> Result<Self> {
        let store = JsonResultStore::create(options).await?;
        Ok(Self::new(Arc::new(store)))
    }

    pub fn with_settings(mut self, settings: EngineSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_throttle(mut self, config: ThrottleConfig) -> Self {
        self.throttle = Throttle::new(config);
        self
    }

    pub fn store(&self) -> &Arc<dyn ResultStore> {
        &self.store
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// Benchmark every implementation in `request` against its input.
    ///
    /// Returns one row per implementation, in request order. Candidate
    /// failures end up in the rows; configuration and storage failures abort.
    pub async fn run(&self, request: RunRequest) -> Result<Vec<MetricsRow>> {
        let RunRequest {
            input,
            implementations,
            times,
            use_cache,
            expected_output,
            evaluate_accuracy,
            presenter,
        } = request;

        let accuracy = AccuracySpec::resolve(expected_output, evaluate_accuracy)?;

        info!(
            implementations = implementations.len(),
            times, use_cache, "Starting benchmark"
        );

        let rows = if self.settings.parallel_implementations {
            join_all(
                implementations
                    .iter()
                    .map(|imp| self.run_implementation(imp, &input, times, use_cache, &accuracy)),
            )
            .await
            .into_iter()
            .collect::<std::result::Result<Vec<_>, _>>()?
        } else {
            let mut rows = Vec::with_capacity(implementations.len());
            for imp in &implementations {
                rows.push(
                    self.run_implementation(imp, &input, times, use_cache, &accuracy)
                        .await?,
                );
            }
            rows
        };

        if let Some(presenter) = presenter.filter(|p| p.is_active()) {
            presenter.present(&rows, times, &self.settings.presenter);
        }

        Ok(rows)
    }

    /// Compute what `implementation` still needs for `times` records.
    pub async fn plan(
        &self,
        implementation: &Implementation,
        input: &Value,
        times: usize,
        use_cache: bool,
    ) -> std::result::Result<BatchPlan, StorageError> {
        let run_id = implementation.run_identity(input);
        let cached = if use_cache {
            self.store.count_run_results(&run_id).await?
        } else {
            0
        };
        Ok(BatchPlan::new(run_id, times, cached))
    }

    async fn run_implementation(
        &self,
        implementation: &Implementation,
        input: &Value,
        times: usize,
        use_cache: bool,
        accuracy: &AccuracySpec,
    ) -> std::result::Result<MetricsRow, StorageError> {
        let plan = self.plan(implementation, input, times, use_cache).await?;
        debug!(
            implementation = implementation.name(),
            run_id = %plan.run_id,
            cached = plan.cached,
            deficit = plan.deficit,
            "Planned batch"
        );

        self.execute_deficit(implementation, input, plan.deficit)
            .await?;

        let records = self
            .store
            .get_last_run_results(&plan.run_id, plan.times)
            .await?;
        if records.len() < plan.times {
            warn!(
                implementation = implementation.name(),
                expected = plan.times,
                found = records.len(),
                "Store returned fewer records than requested"
            );
        }

        let row = aggregate(
            implementation.name(),
            &records,
            &plan,
            accuracy,
            self.settings.error_accuracy,
        );
        info!(
            implementation = %row.name,
            real_calls = row.real_call_count,
            cached_calls = row.call_from_cache_count,
            accuracy = row.average_accuracy,
            error_rate = row.average_error_rate,
            "Batch complete"
        );
        Ok(row)
    }

    /// Launch `deficit` runs at once and wait for all of them. Every outcome
    /// is persisted on its own; the first write failure is returned once all
    /// runs have settled.
    async fn execute_deficit(
        &self,
        implementation: &Implementation,
        input: &Value,
        deficit: usize,
    ) -> std::result::Result<(), StorageError> {
        if deficit == 0 {
            return Ok(());
        }
        let writes = join_all((0..deficit).map(|_| async {
            let _permit = self.throttle.acquire(implementation.resource()).await;
            let outcome = implementation
                .run_with_deadline(input, self.settings.run_timeout)
                .await;
            let record = RunRecord::from_outcome(implementation, input, outcome);
            self.store.add_run_result(record).await
        }))
        .await;
        writes.into_iter().collect()
    }
}

/// Fold records into a metrics row. `records` must be newest first; the first
/// `plan.deficit` of them are the fresh ones.
pub fn aggregate(
    name: &str,
    records: &[RunRecord],
    plan: &BatchPlan,
    accuracy: &AccuracySpec,
    policy: ErrorAccuracyPolicy,
) -> MetricsRow {
    let count = records.len();
    let costs: Vec<Cost> = records.iter().map(|r| r.cost).collect();
    let fresh = plan.deficit.min(count);

    let (average_latency, average_accuracy, average_error_rate) = if count == 0 {
        (0.0, policy.score(), 0.0)
    } else {
        let n = count as f64;
        let latency = records.iter().map(|r| r.latency_ms as f64).sum::<f64>() / n;
        let accuracy = records
            .iter()
            .map(|r| accuracy.score_record(r, policy))
            .sum::<f64>()
            / n;
        let errors = records.iter().filter(|r| r.is_error()).count();
        (latency, accuracy, errors as f64 / n * 100.0)
    };

    MetricsRow {
        name: name.to_string(),
        average_cost: Cost::mean(&costs),
        average_latency,
        average_accuracy,
        average_error_rate,
        real_call_count: plan.deficit,
        call_from_cache_count: plan.times - plan.deficit,
        results_full_price: costs.iter().sum(),
        results_current_price: costs[..fresh].iter().sum(),
    }
}
