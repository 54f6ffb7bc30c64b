//! Combinatorial implementation generator.
//!
//! Register named variants for each method slot, then materialise every
//! combination of active variants as an [`Implementation`]. Slots are ordered
//! by first registration; the first slot varies slowest and the last slot
//! fastest, so the output order is reproducible for a given registration
//! sequence.

use crate::error::{ConfigError, ExecutionError};
use crate::implementation::{Execute, Implementation, RunContext, execute_fn};
use crate::method::{MethodSet, MethodValue};
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use tracing::debug;

/// One registered variant for a method slot.
#[derive(Debug, Clone)]
pub struct Method {
    pub slot: String,
    pub implementation_name: String,
    pub value: MethodValue,
    pub is_active: bool,
}

impl Method {
    /// An active variant named `implementation_name` filling `slot`.
    pub fn new(
        slot: impl Into<String>,
        implementation_name: impl Into<String>,
        value: MethodValue,
    ) -> Self {
        Self {
            slot: slot.into(),
            implementation_name: implementation_name.into(),
            value,
            is_active: true,
        }
    }

    pub fn active(mut self, is_active: bool) -> Self {
        self.is_active = is_active;
        self
    }
}

/// Builds the cross-product of method variants into implementations that all
/// share one execute strategy.
pub struct ImplementationFactory {
    source_id: String,
    execute: Arc<dyn Execute>,
    methods: Vec<Method>,
    resource_slot: Option<String>,
}

impl ImplementationFactory {
    pub fn new(source_id: impl Into<String>, execute: impl Execute + 'static) -> Self {
        Self {
            source_id: source_id.into(),
            execute: Arc::new(execute),
            methods: Vec::new(),
            resource_slot: None,
        }
    }

    pub fn from_fn<F, Fut>(source_id: impl Into<String>, f: F) -> Self
    where
        F: Fn(Value, RunContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, ExecutionError>> + Send + 'static,
    {
        Self::new(source_id, execute_fn(f))
    }

    /// Use the string constant held in `slot` as each implementation's
    /// throttling resource.
    pub fn with_resource_slot(mut self, slot: impl Into<String>) -> Self {
        self.resource_slot = Some(slot.into());
        self
    }

    /// Register a variant. Implementation names are unique across all slots;
    /// a duplicate is rejected and leaves the factory unchanged.
    pub fn add_method(&mut self, method: Method) -> Result<(), ConfigError> {
        if self
            .methods
            .iter()
            .any(|m| m.implementation_name == method.implementation_name)
        {
            return Err(ConfigError::DuplicateImplementation {
                name: method.implementation_name,
            });
        }
        debug!(
            slot = method.slot.as_str(),
            implementation = method.implementation_name.as_str(),
            is_active = method.is_active,
            "Registered method variant"
        );
        self.methods.push(method);
        Ok(())
    }

    /// Toggle a registered variant on or off.
    pub fn set_active(&mut self, implementation_name: &str, is_active: bool) -> bool {
        match self
            .methods
            .iter_mut()
            .find(|m| m.implementation_name == implementation_name)
        {
            Some(method) => {
                method.is_active = is_active;
                true
            }
            None => false,
        }
    }

    pub fn methods(&self) -> &[Method] {
        &self.methods
    }

    /// Slot names in first-registration order.
    pub fn slot_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        for method in &self.methods {
            if !names.contains(&method.slot.as_str()) {
                names.push(&method.slot);
            }
        }
        names
    }

    /// Active variants of `slot`, in registration order.
    pub fn active_variants(&self, slot: &str) -> Vec<&Method> {
        self.methods
            .iter()
            .filter(|m| m.slot == slot && m.is_active)
            .collect()
    }

    /// Every combination of active variants, one per slot. Empty when any
    /// slot has no active variant.
    pub fn implementations(&self) -> Vec<Implementation> {
        let matrix: Vec<Vec<&Method>> = self
            .slot_names()
            .into_iter()
            .map(|slot| self.active_variants(slot))
            .collect();

        let implementations: Vec<Implementation> = cartesian_product(&matrix)
            .into_iter()
            .map(|combination| self.build(&combination))
            .collect();
        debug!(
            count = implementations.len(),
            slots = matrix.len(),
            "Generated implementations"
        );
        implementations
    }

    fn build(&self, combination: &[&Method]) -> Implementation {
        let mut slots = MethodSet::new();
        for method in combination {
            slots.insert(method.slot.clone(), method.value.clone());
        }
        let name = combination
            .iter()
            .map(|m| m.implementation_name.as_str())
            .collect::<Vec<_>>()
            .join(", ");

        let resource = self.resource_slot.as_deref().and_then(|slot| {
            slots
                .get(slot)
                .and_then(MethodValue::as_constant)
                .and_then(Value::as_str)
                .map(str::to_string)
        });

        let implementation =
            Implementation::from_shared(name, self.source_id.clone(), self.execute.clone(), slots);
        match resource {
            Some(resource) => implementation.with_resource(resource),
            None => implementation,
        }
    }
}

/// Cartesian product of `sets`, first set varying slowest. Returns no tuples
/// when `sets` is empty or any set is empty.
pub fn cartesian_product<T: Clone>(sets: &[Vec<T>]) -> Vec<Vec<T>> {
    if sets.is_empty() || sets.iter().any(Vec::is_empty) {
        return Vec::new();
    }
    let mut product: Vec<Vec<T>> = vec![Vec::new()];
    for set in sets {
        product = product
            .into_iter()
            .flat_map(|prefix| {
                set.iter().map(move |item| {
                    let mut tuple = prefix.clone();
                    tuple.push(item.clone());
                    tuple
                })
            })
            .collect();
    }
    product
}
