//! Read-only summary of the claim log.

use colored::*;
use core_logic::database::StoredClaim;
use std::collections::BTreeMap;
use std::fmt::Write;

pub const DEFAULT_LAST_ENTRIES: usize = 10;
pub const UNKNOWN_DATE: &str = "unknown";

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Summary {
    /// (date, coin) → total amount
    pub by_date_coin: BTreeMap<(String, String), f64>,
    /// faucet → total amount
    pub by_faucet: BTreeMap<String, f64>,
    pub status_counts: BTreeMap<String, u64>,
}

impl Summary {
    pub fn is_empty(&self) -> bool {
        self.status_counts.is_empty()
    }
}

/// Aggregates rows. Amounts that do not parse count as 0, timestamps that do
/// not parse land under the `unknown` date.
pub fn summarize(rows: &[StoredClaim]) -> Summary {
    let mut summary = Summary::default();
    for row in rows {
        let amount = row.amount_value();
        let date = row
            .date()
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| UNKNOWN_DATE.to_string());

        *summary
            .by_date_coin
            .entry((date, row.coin.clone()))
            .or_insert(0.0) += amount;
        *summary.by_faucet.entry(row.faucet.clone()).or_insert(0.0) += amount;
        *summary.status_counts.entry(row.status.clone()).or_insert(0) += 1;
    }
    summary
}

/// Text report: the three summaries followed by the `last` most recent rows.
pub fn render(summary: &Summary, recent: &[StoredClaim], last: usize) -> String {
    let mut out = String::new();

    section(&mut out, "Summary by Date & Coin");
    if summary.by_date_coin.is_empty() {
        no_data(&mut out);
    }
    for ((date, coin), total) in &summary.by_date_coin {
        let _ = writeln!(out, "{}  |  {}: {}", date, coin.cyan(), total);
    }

    section(&mut out, "Summary by Faucet (Total Amount)");
    if summary.by_faucet.is_empty() {
        no_data(&mut out);
    }
    for (faucet, total) in &summary.by_faucet {
        let _ = writeln!(out, "{}: {}", faucet, total);
    }

    section(&mut out, "Status Counts");
    if summary.status_counts.is_empty() {
        no_data(&mut out);
    }
    for (status, count) in &summary.status_counts {
        let _ = writeln!(out, "{}: {}", paint_status(status), count);
    }

    section(&mut out, &format!("Last {} Entries", last));
    let skip = recent.len().saturating_sub(last);
    let shown = &recent[skip..];
    if shown.is_empty() {
        let _ = writeln!(out, "No entries.");
    }
    for row in shown {
        let _ = writeln!(
            out,
            "{} | {} | {} | {} | {} | {}",
            row.timestamp,
            row.faucet,
            row.coin,
            row.amount,
            paint_status(&row.status),
            row.message
        );
    }

    out
}

fn section(out: &mut String, title: &str) {
    let _ = writeln!(out, "\n{}", format!("=== {} ===", title).bold());
}

fn no_data(out: &mut String) {
    let _ = writeln!(out, "No data.");
}

fn paint_status(status: &str) -> ColoredString {
    match status {
        "success" => status.green(),
        "fail" => status.yellow(),
        "error" | "driver_error" => status.red(),
        other => other.normal(),
    }
}
