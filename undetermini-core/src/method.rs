//! Method slots: the named, swappable parts of a composite implementation.
//!
//! A slot (e.g. `"promptTemplate"`, `"parser"`) holds either a constant JSON
//! value or a function. Functions carry a caller-supplied `source_id` that
//! stands in for their source text when computing identities, so bumping the
//! id is how a caller invalidates cached runs after changing a function.

use crate::error::ExecutionError;
use crate::hasher;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// Signature of a function stored in a method slot.
pub type MethodFn = dyn Fn(&Value) -> Result<Value, ExecutionError> + Send + Sync;

/// The concrete value plugged into a method slot.
#[derive(Clone)]
pub enum MethodValue {
    Constant(Value),
    Function {
        source_id: String,
        func: Arc<MethodFn>,
    },
}

impl MethodValue {
    pub fn constant(value: impl Into<Value>) -> Self {
        Self::Constant(value.into())
    }

    pub fn function<F>(source_id: impl Into<String>, func: F) -> Self
    where
        F: Fn(&Value) -> Result<Value, ExecutionError> + Send + Sync + 'static,
    {
        Self::Function {
            source_id: source_id.into(),
            func: Arc::new(func),
        }
    }

    /// Digest identifying this value: canonical JSON for constants, the
    /// source id for functions.
    pub fn content_hash(&self) -> String {
        match self {
            Self::Constant(value) => hasher::hash_value(value),
            Self::Function { source_id, .. } => hasher::hash_source(source_id),
        }
    }

    pub fn as_constant(&self) -> Option<&Value> {
        match self {
            Self::Constant(value) => Some(value),
            Self::Function { .. } => None,
        }
    }

    /// Invoke a function slot. Calling a constant slot is an execution error.
    pub fn call(&self, arg: &Value) -> Result<Value, ExecutionError> {
        match self {
            Self::Function { func, .. } => func(arg),
            Self::Constant(_) => Err(ExecutionError::new(
                "method slot holds a constant, not a function",
            )),
        }
    }
}

impl fmt::Debug for MethodValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Constant(value) => f.debug_tuple("Constant").field(value).finish(),
            Self::Function { source_id, .. } => f
                .debug_struct("Function")
                .field("source_id", source_id)
                .finish_non_exhaustive(),
        }
    }
}

/// Ordered mapping from slot name to slot value.
#[derive(Debug, Clone, Default)]
pub struct MethodSet {
    slots: Vec<(String, MethodValue)>,
}

impl MethodSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a slot, replacing any previous value while keeping its position.
    pub fn insert(&mut self, slot: impl Into<String>, value: MethodValue) {
        let slot = slot.into();
        match self.slots.iter_mut().find(|(name, _)| *name == slot) {
            Some(entry) => entry.1 = value,
            None => self.slots.push((slot, value)),
        }
    }

    pub fn get(&self, slot: &str) -> Option<&MethodValue> {
        self.slots
            .iter()
            .find(|(name, _)| name == slot)
            .map(|(_, value)| value)
    }

    /// Constant value of a slot, or an execution error naming the slot.
    pub fn constant(&self, slot: &str) -> Result<&Value, ExecutionError> {
        self.get(slot)
            .and_then(MethodValue::as_constant)
            .ok_or_else(|| ExecutionError::new(format!("no constant method slot '{slot}'")))
    }

    /// Call the function in a slot.
    pub fn call(&self, slot: &str, arg: &Value) -> Result<Value, ExecutionError> {
        self.get(slot)
            .ok_or_else(|| ExecutionError::new(format!("no method slot '{slot}'")))?
            .call(arg)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &MethodValue)> {
        self.slots.iter().map(|(name, value)| (name.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Slot name to content hash, as a JSON object.
    pub fn hashes(&self) -> Value {
        let map = self
            .slots
            .iter()
            .map(|(name, value)| (name.clone(), Value::String(value.content_hash())))
            .collect::<serde_json::Map<_, _>>();
        Value::Object(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_constant_hash_ignores_key_order() {
        let a = MethodValue::constant(json!({"model": "gpt-4", "temperature": 0}));
        let b = MethodValue::constant(json!({"temperature": 0, "model": "gpt-4"}));
        assert_eq!(a.content_hash(), b.content_hash());
    }

    #[test]
    fn test_function_hash_follows_source_id() {
        let a = MethodValue::function("parser@v1", |v| Ok(v.clone()));
        let b = MethodValue::function("parser@v1", |_| Ok(Value::Null));
        let c = MethodValue::function("parser@v2", |v| Ok(v.clone()));
        assert_eq!(a.content_hash(), b.content_hash());
        assert_ne!(a.content_hash(), c.content_hash());
    }

    #[test]
    fn test_call_function_and_constant() {
        let upper = MethodValue::function("upper", |v| {
            Ok(json!(v.as_str().unwrap_or_default().to_uppercase()))
        });
        assert_eq!(upper.call(&json!("abc")).unwrap(), json!("ABC"));
        assert!(MethodValue::constant(1).call(&Value::Null).is_err());
    }

    #[test]
    fn test_set_keeps_insertion_order_on_replace() {
        let mut set = MethodSet::new();
        set.insert("prompt", MethodValue::constant("a"));
        set.insert("model", MethodValue::constant("gpt-4"));
        set.insert("prompt", MethodValue::constant("b"));
        let names: Vec<_> = set.iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["prompt", "model"]);
        assert_eq!(set.constant("prompt").unwrap(), &json!("b"));
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_missing_slot_errors() {
        let set = MethodSet::new();
        assert!(set.constant("model").is_err());
        assert_eq!(
            set.call("parser", &Value::Null).unwrap_err().message(),
            "no method slot 'parser'"
        );
    }

    #[test]
    fn test_hashes_object() {
        let mut set = MethodSet::new();
        set.insert("model", MethodValue::constant("gpt-4"));
        let hashes = set.hashes();
        assert_eq!(
            hashes["model"],
            json!(MethodValue::constant("gpt-4").content_hash())
        );
    }
}
