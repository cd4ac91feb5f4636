//! Spending reports over an extracted batch.
//!
//! Two views are offered: the receipts falling inside an inclusive date range, and
//! totals grouped by category.

use std::collections::BTreeMap;
use std::fmt::Write;

use rust_decimal::Decimal;
use time::Date;

use crate::models::ReceiptBatch;

const RULE_WIDTH: usize = 60;

/// One receipt selected for an expense report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpenseRow {
    pub file_name: String,
    pub date: Date,
    pub amount: Decimal,
    pub vendor: Option<String>,
    pub category: Option<String>,
}

/// Selects receipts dated within `start..=end` that carry a total.
///
/// Receipts without a `YYYY-MM-DD` date or without a total are skipped, as are
/// error markers. Rows are ordered by date, then file name.
pub fn expenses_in_range(batch: &ReceiptBatch, start: Date, end: Date) -> Vec<ExpenseRow> {
    let mut rows: Vec<ExpenseRow> = batch
        .records()
        .filter_map(|(name, record)| {
            let date = record.iso_date()?;
            let amount = record.total()?;
            (start <= date && date <= end).then(|| ExpenseRow {
                file_name: name.to_string(),
                date,
                amount,
                vendor: record.vendor().map(str::to_string),
                category: record.category().map(str::to_string),
            })
        })
        .collect();

    rows.sort_by(|a, b| (a.date, &a.file_name).cmp(&(b.date, &b.file_name)));
    rows
}

/// Renders an expense report with a grand total.
pub fn render_expenses(rows: &[ExpenseRow], start: Date, end: Date) -> String {
    let rule = "-".repeat(RULE_WIDTH);
    let total: Decimal = rows.iter().map(|r| r.amount).sum();

    let mut out = String::new();
    let _ = writeln!(out, "Expenses from {start} to {end}");
    let _ = writeln!(out, "{rule}");
    for row in rows {
        let _ = writeln!(
            out,
            "{}  ${}  {:16}  {}  ({})",
            row.date,
            money(row.amount),
            row.category.as_deref().unwrap_or(""),
            row.vendor.as_deref().unwrap_or(""),
            row.file_name
        );
    }
    let _ = writeln!(out, "{rule}");
    let _ = writeln!(out, "TOTAL: ${}", money(total));
    out
}

/// Sums totals per category, ordered by category name.
///
/// Only records with both a total and a category contribute.
pub fn category_totals(batch: &ReceiptBatch) -> BTreeMap<String, Decimal> {
    let mut sums = BTreeMap::new();
    for (_, record) in batch.records() {
        if let (Some(category), Some(total)) = (record.category(), record.total()) {
            *sums.entry(category.to_string()).or_insert(Decimal::ZERO) += total;
        }
    }
    sums
}

/// Renders per-category totals with each category's share of overall spending.
pub fn render_category_summary(totals: &BTreeMap<String, Decimal>) -> String {
    let grand: Decimal = totals.values().copied().sum();
    if totals.is_empty() {
        return "No categorized spending to summarize.\n".to_string();
    }

    let mut out = String::new();
    let _ = writeln!(out, "Spending by category");
    let _ = writeln!(out, "{}", "-".repeat(RULE_WIDTH));
    for (category, amount) in totals {
        let share = if grand.is_zero() {
            Decimal::ZERO
        } else {
            *amount * Decimal::ONE_HUNDRED / grand
        };
        let _ = writeln!(out, "{:16}  ${:>10}  {:>5.1}%", category, money(*amount), share);
    }
    let _ = writeln!(out, "{}", "-".repeat(RULE_WIDTH));
    let _ = writeln!(out, "TOTAL: ${}", money(grand));
    out
}

fn money(amount: Decimal) -> String {
    format!("{:.2}", amount.round_dp(2))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ReceiptError;
    use crate::models::{ReceiptRecord, parse_iso_date};

    fn record(date: Option<&str>, total: Option<i64>, category: Option<&str>) -> ReceiptRecord {
        ReceiptRecord::new(
            Some("Shop".to_string()),
            date.map(str::to_string),
            total.map(|cents| Decimal::new(cents, 2)),
            category.map(str::to_string),
        )
        .unwrap()
    }

    fn date(s: &str) -> Date {
        parse_iso_date(s).unwrap()
    }

    fn sample_batch() -> ReceiptBatch {
        let mut batch = ReceiptBatch::new();
        batch.insert_record("c.jpg", record(Some("2026-01-10"), Some(1000), Some("Meals")));
        batch.insert_record("a.jpg", record(Some("2026-01-05"), Some(250), Some("Transport")));
        batch.insert_record("b.jpg", record(Some("2026-01-10"), Some(500), Some("Meals")));
        batch.insert_record("d.jpg", record(Some("2026-02-01"), Some(999), Some("Meals")));
        batch.insert_record("e.jpg", record(Some("Jan 7"), Some(100), Some("Meals")));
        batch.insert_record("f.jpg", record(Some("2026-01-07"), None, Some("Other")));
        batch.insert_error("g.jpg", &ReceiptError::malformed("bad"));
        batch
    }

    #[test]
    fn expenses_are_filtered_inclusively_and_sorted() {
        let rows = expenses_in_range(&sample_batch(), date("2026-01-05"), date("2026-01-10"));
        let names: Vec<&str> = rows.iter().map(|r| r.file_name.as_str()).collect();
        assert_eq!(names, vec!["a.jpg", "b.jpg", "c.jpg"]);
    }

    #[test]
    fn expense_report_lists_rows_and_total() {
        let start = date("2026-01-01");
        let end = date("2026-01-31");
        let rows = expenses_in_range(&sample_batch(), start, end);

        let report = render_expenses(&rows, start, end);

        assert!(report.starts_with("Expenses from 2026-01-01 to 2026-01-31\n"));
        assert!(report.contains("2026-01-05  $2.50  Transport         Shop  (a.jpg)"));
        assert!(report.ends_with("TOTAL: $17.50\n"));
    }

    #[test]
    fn empty_range_reports_zero_total() {
        let start = date("2025-01-01");
        let rows = expenses_in_range(&sample_batch(), start, start);
        assert!(rows.is_empty());
        assert!(render_expenses(&rows, start, start).ends_with("TOTAL: $0.00\n"));
    }

    #[test]
    fn category_totals_skip_incomplete_records() {
        let totals = category_totals(&sample_batch());
        assert_eq!(totals.len(), 2);
        assert_eq!(totals["Meals"], Decimal::new(2599, 2));
        assert_eq!(totals["Transport"], Decimal::new(250, 2));
    }

    #[test]
    fn category_summary_shows_shares() {
        let mut batch = ReceiptBatch::new();
        batch.insert_record("a.jpg", record(None, Some(7500), Some("Meals")));
        batch.insert_record("b.jpg", record(None, Some(2500), Some("Lodging")));

        let summary = render_category_summary(&category_totals(&batch));

        assert!(summary.contains("Lodging"));
        assert!(summary.contains("25.0%"));
        assert!(summary.contains("75.0%"));
        assert!(summary.ends_with("TOTAL: $100.00\n"));
    }

    #[test]
    fn largest_accepted_totals_sum_without_overflow() {
        let mut batch = ReceiptBatch::new();
        for i in 0..1000 {
            let category = if i % 2 == 0 { "Meals" } else { "Lodging" };
            batch.insert_record(
                format!("{i:04}.jpg"),
                record(Some("2026-01-15"), Some(999_999_999_999_999), Some(category)),
            );
        }

        let start = date("2026-01-01");
        let end = date("2026-01-31");
        let rows = expenses_in_range(&batch, start, end);
        assert_eq!(rows.len(), 1000);
        assert!(render_expenses(&rows, start, end).ends_with("TOTAL: $9999999999999990.00\n"));

        let totals = category_totals(&batch);
        assert_eq!(totals["Meals"], Decimal::new(499_999_999_999_999_500, 2));
        let summary = render_category_summary(&totals);
        assert!(summary.contains("50.0%"));
        assert!(summary.ends_with("TOTAL: $9999999999999990.00\n"));
    }

    #[test]
    fn category_summary_without_data() {
        let summary = render_category_summary(&BTreeMap::new());
        assert_eq!(summary, "No categorized spending to summarize.\n");
    }
}
