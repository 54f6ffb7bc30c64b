//! Optional limit on in-flight runs per external resource.
//!
//! Implementations tagged with the same resource (typically a model name)
//! share one semaphore, so a batch against a rate-limited backend never has
//! more than the configured number of calls outstanding. Untagged
//! implementations, and resources with no configured limit, run unthrottled.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Limits on concurrent runs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThrottleConfig {
    /// Limit applied to every tagged resource without its own entry.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_in_flight: Option<usize>,
    /// Per-resource limits.
    #[serde(default)]
    pub per_resource: HashMap<String, usize>,
}

/// Semaphores keyed by resource, created lazily.
#[derive(Debug, Default)]
pub struct Throttle {
    config: ThrottleConfig,
    semaphores: Mutex<HashMap<String, Arc<Semaphore>>>,
}

impl Throttle {
    pub fn new(config: ThrottleConfig) -> Self {
        Self {
            config,
            semaphores: Mutex::new(HashMap::new()),
        }
    }

    /// A throttle that never blocks.
    pub fn unlimited() -> Self {
        Self::default()
    }

    /// Effective limit for `resource`. A configured zero is treated as one.
    pub fn limit_for(&self, resource: &str) -> Option<usize> {
        self.config
            .per_resource
            .get(resource)
            .copied()
            .or(self.config.max_in_flight)
            .map(|limit| limit.max(1))
    }

    fn semaphore(&self, resource: &str, limit: usize) -> Arc<Semaphore> {
        let mut semaphores = self
            .semaphores
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        semaphores
            .entry(resource.to_string())
            .or_insert_with(|| Arc::new(Semaphore::new(limit)))
            .clone()
    }

    /// Wait for a slot on `resource`. Returns `None` when unthrottled; the
    /// slot is released when the returned permit is dropped.
    pub async fn acquire(&self, resource: Option<&str>) -> Option<OwnedSemaphorePermit> {
        let resource = resource?;
        let limit = self.limit_for(resource)?;
        self.semaphore(resource, limit).acquire_owned().await.ok()
    }
}
