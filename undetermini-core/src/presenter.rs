//! Presenter interface for aggregated metrics.
//!
//! The engine hands its [`MetricsRow`]s to a [`Presenter`] and never looks at
//! what it renders. This module also holds the presentation options shared by
//! presenters: row ordering, column visibility and accuracy colour bands.

use crate::engine::MetricsRow;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Renders metrics rows somewhere (terminal, file, ...).
pub trait Presenter: Send + Sync {
    /// Inactive presenters are skipped by the engine.
    fn is_active(&self) -> bool {
        true
    }

    fn present(&self, rows: &[MetricsRow], times: usize, options: &PresenterOptions);
}

/// Row ordering.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    /// Accuracy descending, then latency ascending, then cost ascending.
    #[default]
    AccuracyLatencyCost,
    Name,
    Cost,
    Latency,
}

/// A table column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Column {
    Name,
    Accuracy,
    Latency,
    Cost,
    ErrorRate,
    RealCalls,
    CachedCalls,
    FullPrice,
    CurrentPrice,
}

impl Column {
    pub const ALL: [Column; 9] = [
        Column::Name,
        Column::Accuracy,
        Column::Latency,
        Column::Cost,
        Column::ErrorRate,
        Column::RealCalls,
        Column::CachedCalls,
        Column::FullPrice,
        Column::CurrentPrice,
    ];

    pub fn title(self) -> &'static str {
        match self {
            Column::Name => "Name",
            Column::Accuracy => "Average Accuracy (%)",
            Column::Latency => "Average Latency (ms)",
            Column::Cost => "Average Cost (cents)",
            Column::ErrorRate => "Error Rate (%)",
            Column::RealCalls => "Real Calls",
            Column::CachedCalls => "Cached Calls",
            Column::FullPrice => "Full Price (cents)",
            Column::CurrentPrice => "Current Price (cents)",
        }
    }

    /// Text of this column for `row`.
    pub fn cell(self, row: &MetricsRow) -> String {
        match self {
            Column::Name => row.name.clone(),
            Column::Accuracy => format!("{:.2}", row.average_accuracy),
            Column::Latency => format!("{:.1}", row.average_latency),
            Column::Cost => row.average_cost.to_string(),
            Column::ErrorRate => format!("{:.2}", row.average_error_rate),
            Column::RealCalls => row.real_call_count.to_string(),
            Column::CachedCalls => row.call_from_cache_count.to_string(),
            Column::FullPrice => row.results_full_price.to_string(),
            Column::CurrentPrice => row.results_current_price.to_string(),
        }
    }
}

/// Sort and visibility settings handed to presenters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresenterOptions {
    #[serde(default)]
    pub sort: SortOrder,
    #[serde(default)]
    pub hidden_columns: Vec<Column>,
}

impl PresenterOptions {
    pub fn visible_columns(&self) -> Vec<Column> {
        Column::ALL
            .into_iter()
            .filter(|c| !self.hidden_columns.contains(c))
            .collect()
    }
}

/// Order `rows` in place.
pub fn sort_rows(rows: &mut [MetricsRow], order: SortOrder) {
    match order {
        SortOrder::AccuracyLatencyCost => rows.sort_by(|a, b| {
            b.average_accuracy
                .total_cmp(&a.average_accuracy)
                .then_with(|| a.average_latency.total_cmp(&b.average_latency))
                .then_with(|| a.average_cost.cmp(&b.average_cost))
        }),
        SortOrder::Name => rows.sort_by(|a, b| a.name.cmp(&b.name)),
        SortOrder::Cost => rows.sort_by(|a, b| a.average_cost.cmp(&b.average_cost)),
        SortOrder::Latency => rows.sort_by(|a, b| {
            a.average_latency
                .partial_cmp(&b.average_latency)
                .unwrap_or(Ordering::Equal)
        }),
    }
}

/// Accuracy tiers used for colouring.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccuracyBand {
    Poor,
    Fair,
    Good,
    Perfect,
}

impl AccuracyBand {
    pub fn of(accuracy: f64) -> Self {
        if accuracy < 50.0 {
            Self::Poor
        } else if accuracy < 80.0 {
            Self::Fair
        } else if accuracy < 100.0 {
            Self::Good
        } else {
            Self::Perfect
        }
    }
}
