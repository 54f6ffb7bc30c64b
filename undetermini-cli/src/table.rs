//! Terminal table presenter.

use crossterm::style::Stylize;
use undetermini_core::{
    AccuracyBand, Column, MetricsRow, Presenter, PresenterOptions, sort_rows,
};
use unicode_width::UnicodeWidthStr;

/// Prints metrics as an aligned table on stdout, colouring accuracy by band.
pub struct TablePresenter {
    enabled: bool,
    colored: bool,
}

impl TablePresenter {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            colored: true,
        }
    }

    pub fn plain(mut self) -> Self {
        self.colored = false;
        self
    }

    /// Render the table as text.
    pub fn render(&self, rows: &[MetricsRow], times: usize, options: &PresenterOptions) -> String {
        let mut rows = rows.to_vec();
        sort_rows(&mut rows, options.sort);
        let columns = options.visible_columns();

        let cells: Vec<Vec<String>> = rows
            .iter()
            .map(|row| columns.iter().map(|c| c.cell(row)).collect())
            .collect();
        let widths: Vec<usize> = columns
            .iter()
            .enumerate()
            .map(|(i, column)| {
                cells
                    .iter()
                    .map(|r| r[i].width())
                    .chain(std::iter::once(column.title().width()))
                    .max()
                    .unwrap_or(0)
            })
            .collect();

        let mut out = format!("Results over {times} run(s) per implementation\n");
        let header: Vec<String> = columns
            .iter()
            .zip(&widths)
            .map(|(column, &w)| pad(column.title(), w))
            .collect();
        out.push_str(&self.bold(&header.join(" | ")));
        out.push('\n');
        let rule: Vec<String> = widths.iter().map(|&w| "-".repeat(w)).collect();
        out.push_str(&rule.join("-+-"));
        out.push('\n');

        for (row, row_cells) in rows.iter().zip(&cells) {
            let line: Vec<String> = columns
                .iter()
                .zip(row_cells)
                .zip(&widths)
                .map(|((column, text), &w)| {
                    let padded = pad(text, w);
                    if *column == Column::Accuracy {
                        self.paint_accuracy(padded, row.average_accuracy)
                    } else {
                        padded
                    }
                })
                .collect();
            out.push_str(&line.join(" | "));
            out.push('\n');
        }
        out
    }

    fn bold(&self, text: &str) -> String {
        if self.colored {
            text.to_string().bold().to_string()
        } else {
            text.to_string()
        }
    }

    fn paint_accuracy(&self, text: String, accuracy: f64) -> String {
        if !self.colored {
            return text;
        }
        match AccuracyBand::of(accuracy) {
            AccuracyBand::Poor => text.red().to_string(),
            AccuracyBand::Fair => text.yellow().to_string(),
            AccuracyBand::Good => text.green().to_string(),
            AccuracyBand::Perfect => text.green().bold().to_string(),
        }
    }
}

fn pad(text: &str, width: usize) -> String {
    let fill = width.saturating_sub(text.width());
    format!("{text}{}", " ".repeat(fill))
}

impl Presenter for TablePresenter {
    fn is_active(&self) -> bool {
        self.enabled
    }

    fn present(&self, rows: &[MetricsRow], times: usize, options: &PresenterOptions) {
        println!("{}", self.render(rows, times, options));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use undetermini_core::{Cost, SortOrder};

    fn row(name: &str, accuracy: f64, latency: f64) -> MetricsRow {
        MetricsRow {
            name: name.to_string(),
            average_cost: Cost::from_f64(0.25),
            average_latency: latency,
            average_accuracy: accuracy,
            average_error_rate: 0.0,
            real_call_count: 2,
            call_from_cache_count: 1,
            results_full_price: Cost::from_f64(0.75),
            results_current_price: Cost::from_f64(0.5),
        }
    }

    #[test]
    fn test_render_sorts_and_aligns() {
        let presenter = TablePresenter::new(true).plain();
        let rows = vec![row("slow, gpt-4", 100.0, 300.0), row("fast, gpt-3.5", 100.0, 50.0)];
        let text = presenter.render(&rows, 3, &PresenterOptions::default());
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines[0], "Results over 3 run(s) per implementation");
        assert!(lines[1].starts_with("Name "));
        assert!(lines[3].starts_with("fast, gpt-3.5"));
        assert!(lines[4].starts_with("slow, gpt-4"));
        assert_eq!(lines[3].len(), lines[4].len());
    }

    #[test]
    fn test_hidden_columns_are_not_rendered() {
        let presenter = TablePresenter::new(true).plain();
        let options = PresenterOptions {
            sort: SortOrder::Name,
            hidden_columns: vec![Column::FullPrice, Column::CurrentPrice],
        };
        let text = presenter.render(&[row("a", 40.0, 1.0)], 1, &options);
        assert!(!text.contains("Full Price"));
        assert!(text.contains("Average Accuracy"));
    }

    #[test]
    fn test_inactive_presenter() {
        assert!(!TablePresenter::new(false).is_active());
    }
}
