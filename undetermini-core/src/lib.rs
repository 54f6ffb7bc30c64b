//! # Undetermini Core
//!
//! Benchmarking harness for nondeterministic implementations.
//! Runs candidate implementations repeatedly against the same input, caches
//! every run in a result store keyed by content hashes, and aggregates
//! accuracy, latency, cost and error rate per candidate.

pub mod accuracy;
pub mod config;
pub mod cost;
pub mod engine;
pub mod error;
pub mod factory;
pub mod hasher;
pub mod implementation;
pub mod method;
pub mod persistence;
pub mod presenter;
pub mod pricing;
pub mod store;
pub mod throttle;

// Re-export commonly used types at the crate root.
pub use accuracy::{AccuracyFn, AccuracySpec, ErrorAccuracyPolicy, default_accuracy};
pub use config::{UndeterminiConfig, config_exists, load_config};
pub use cost::{CallTag, Cost, CostLedger};
pub use engine::{BatchPlan, EngineSettings, MetricsRow, RunRequest, Undetermini};
pub use error::{ConfigError, ExecutionError, Result, StorageError, UndeterminiError};
pub use factory::{ImplementationFactory, Method, cartesian_product};
pub use hasher::{hash_source, hash_value};
pub use implementation::{Execute, Implementation, RunContext, RunOutcome, execute_fn};
pub use method::{MethodSet, MethodValue};
pub use presenter::{AccuracyBand, Column, Presenter, PresenterOptions, SortOrder, sort_rows};
pub use pricing::{ModelCatalog, ModelInfo};
pub use store::{JsonResultStore, ResultStore, RunRecord, StoreOptions};
pub use throttle::{Throttle, ThrottleConfig};
