//! Model price and rate-limit catalog.
//!
//! Prices are in cents per token. Candidates that call a model use
//! [`ModelCatalog::cost_of_tokens`] to turn token counts into an exact
//! [`Cost`] for [`RunContext::add_cost`](crate::implementation::RunContext::add_cost).

use crate::cost::Cost;
use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const GPT_4_1106_PREVIEW: &str = "gpt-4-1106-preview";
pub const GPT_4_0613: &str = "gpt-4-0613";
pub const GPT_3_5_TURBO_0613: &str = "gpt-3.5-turbo-0613";
pub const GPT_3_5_TURBO_1106: &str = "gpt-3.5-turbo-1106";
pub const COHERE_GENERATE: &str = "cohere-generate";

/// Price per token, in cents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPrice {
    pub input: Cost,
    pub output: Cost,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimit {
    /// Tokens per minute.
    pub tpm: u32,
    /// Requests per minute.
    pub rpm: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelInfo {
    pub name: String,
    pub price_in_cents: TokenPrice,
    pub rate_limit: RateLimit,
}

impl ModelInfo {
    pub fn new(name: impl Into<String>, input: f64, output: f64, tpm: u32, rpm: u32) -> Self {
        Self {
            name: name.into(),
            price_in_cents: TokenPrice {
                input: Cost::from_f64(input),
                output: Cost::from_f64(output),
            },
            rate_limit: RateLimit { tpm, rpm },
        }
    }
}

/// Known models, keyed by name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelCatalog {
    models: BTreeMap<String, ModelInfo>,
}

impl Default for ModelCatalog {
    fn default() -> Self {
        let builtin = [
            // rate limits for cohere are the free tier
            ModelInfo::new(COHERE_GENERATE, 0.00015, 0.0002, 100_000, 10),
            ModelInfo::new(GPT_3_5_TURBO_0613, 0.00015, 0.0002, 40_000, 500),
            ModelInfo::new(GPT_3_5_TURBO_1106, 0.0001, 0.0002, 40_000, 500),
            ModelInfo::new(GPT_4_0613, 0.003, 0.006, 90_000, 3_500),
            ModelInfo::new(GPT_4_1106_PREVIEW, 0.001, 0.003, 90_000, 3_500),
        ];
        Self {
            models: builtin
                .into_iter()
                .map(|info| (info.name.clone(), info))
                .collect(),
        }
    }
}

impl ModelCatalog {
    /// A catalog with no models.
    pub fn empty() -> Self {
        Self {
            models: BTreeMap::new(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&ModelInfo> {
        self.models.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.models.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    /// Register a model. Existing entries are never replaced.
    pub fn add_model_info(&mut self, info: ModelInfo) -> Result<(), ConfigError> {
        if self.models.contains_key(&info.name) {
            return Err(ConfigError::DuplicateModel { name: info.name });
        }
        self.models.insert(info.name.clone(), info);
        Ok(())
    }

    /// Exact cost of one call with the given token counts.
    pub fn cost_of_tokens(
        &self,
        model: &str,
        input_tokens: u64,
        output_tokens: u64,
    ) -> Result<Cost, ConfigError> {
        let info = self.get(model).ok_or_else(|| ConfigError::UnknownModel {
            name: model.to_string(),
        })?;
        Ok(info.price_in_cents.input * input_tokens + info.price_in_cents.output * output_tokens)
    }
}
