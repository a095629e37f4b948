//! Month-by-month KPI decomposition over a flat posting stream.
//!
//! Given opening balances and postings, every calendar month touching the
//! requested period gets its own KPI snapshot: balance-sheet values are the
//! opening balance plus a running total of postings through that month's end,
//! income-statement values are that month's postings alone. Months are
//! processed chronologically because the running balance and month-over-month
//! growth both depend on the previous month.

use crate::accounts::{account_type, AccountKind, MONTH_NAMES};
use crate::document::Posting;
use crate::kpi::{compute_kpis, Annualization, BalanceView, EquityPolicy, KpiResult};
use chrono::{Datelike, Days, NaiveDate};
use log::{debug, info};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct MonthlyKpi {
    pub year: i32,
    pub month: u32,
    /// Swedish display label, e.g. "januari 2023".
    pub label: String,
    pub kpis: KpiResult,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct MonthlySeries {
    pub months: Vec<MonthlyKpi>,
    /// Income-statement flows summed across the period; balance sheet taken
    /// from the last month's snapshot.
    pub aggregate: KpiResult,
}

fn last_day_of_month(year: i32, month: u32) -> NaiveDate {
    let (next_year, next_month) = if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    };
    NaiveDate::from_ymd_opt(next_year, next_month, 1)
        .unwrap_or(NaiveDate::MAX)
        .checked_sub_days(Days::new(1))
        .unwrap_or(NaiveDate::MAX)
}

/// Every (year, month) pair whose calendar month overlaps [start, end].
fn enumerate_months(start: NaiveDate, end: NaiveDate) -> Vec<(i32, u32)> {
    let mut months = Vec::new();
    let mut year = start.year();
    let mut month = start.month();
    while (year, month) <= (end.year(), end.month()) {
        months.push((year, month));
        if month == 12 {
            year += 1;
            month = 1;
        } else {
            month += 1;
        }
    }
    months
}

fn postings_in<'a>(
    postings: &'a [Posting],
    start: NaiveDate,
    end: NaiveDate,
) -> impl Iterator<Item = &'a Posting> {
    postings
        .iter()
        .filter(move |p| matches!(p.date, Some(d) if d >= start && d <= end))
}

/// Decomposes a posting stream into per-calendar-month KPI snapshots plus a
/// period aggregate. `opening_balances` holds balance-sheet account values as
/// of `period_start`, in the source sign convention. Postings without a date
/// cannot be placed in a month and are skipped.
pub fn calculate_monthly_kpis(
    opening_balances: &BTreeMap<String, f64>,
    postings: &[Posting],
    period_start: NaiveDate,
    period_end: NaiveDate,
    policy: &EquityPolicy,
) -> MonthlySeries {
    info!(
        "Calculating monthly KPIs for {} postings between {} and {}",
        postings.len(),
        period_start,
        period_end
    );

    let months = enumerate_months(period_start, period_end);
    let mut results = Vec::with_capacity(months.len());
    let mut previous_view: Option<BalanceView> = None;
    let mut running = opening_balances.clone();

    for &(year, month) in &months {
        // The first month's window is clipped at the period start: the
        // opening balances are stated as of that date, so earlier postings
        // in the same calendar month must not be added on top of them.
        let month_start = NaiveDate::from_ymd_opt(year, month, 1)
            .unwrap_or(period_start)
            .max(period_start);
        let month_end = last_day_of_month(year, month);

        let mut closing = running.clone();
        let mut movement: BTreeMap<String, f64> = BTreeMap::new();
        for posting in postings_in(postings, month_start, month_end) {
            match account_type(&posting.account) {
                AccountKind::BalanceSheet => {
                    *closing.entry(posting.account.clone()).or_insert(0.0) += posting.amount;
                }
                AccountKind::IncomeStatement => {
                    *movement.entry(posting.account.clone()).or_insert(0.0) += posting.amount;
                }
                AccountKind::Unknown => {}
            }
        }

        let view = BalanceView {
            opening: running.clone(),
            closing: closing.clone(),
            movement,
        };

        let days_in_month = (month_end - month_start).num_days() + 1;
        let kpis = compute_kpis(
            &view,
            previous_view.as_ref(),
            Annualization::monthly(days_in_month),
            policy,
        );

        debug!(
            "Month {}-{:02}: net sales {:.2}, total assets {:.2}",
            year, month, kpis.net_sales, kpis.total_assets
        );

        results.push(MonthlyKpi {
            year,
            month,
            label: format!("{} {}", MONTH_NAMES[(month - 1) as usize], year),
            kpis,
        });

        previous_view = Some(view);
        running = closing;
    }

    // The aggregate sums income-statement flows over the covered months and
    // carries the last month's balance-sheet snapshot; balance-sheet fields
    // are never re-summed across months.
    let aggregate = {
        let movement = match (months.first(), months.last()) {
            (Some(&(fy, fm)), Some(&(ly, lm))) => {
                let span_start = NaiveDate::from_ymd_opt(fy, fm, 1)
                    .unwrap_or(period_start)
                    .max(period_start);
                let span_end = last_day_of_month(ly, lm);
                postings_in(postings, span_start, span_end)
                    .filter(|p| account_type(&p.account) == AccountKind::IncomeStatement)
                    .fold(BTreeMap::new(), |mut acc, p| {
                        *acc.entry(p.account.clone()).or_insert(0.0) += p.amount;
                        acc
                    })
            }
            _ => BTreeMap::new(),
        };
        let view = BalanceView {
            opening: opening_balances.clone(),
            closing: running,
            movement,
        };
        compute_kpis(
            &view,
            None,
            Annualization::from_period(period_start, period_end),
            policy,
        )
    };

    MonthlySeries {
        months: results,
        aggregate,
    }
}
