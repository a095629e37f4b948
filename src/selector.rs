//! Chooses which balance representation feeds the KPI calculators.
//!
//! Synced provider data arrives in two shapes: accounts that carry their own
//! opening/closing balances (authoritative, taken as ground truth) and
//! journal vouchers whose entries must be folded into balances. The selector
//! always prefers the authoritative path when at least one account has both
//! figures; otherwise it reconstructs balances from postings and gates the
//! result behind a debit=credit reconciliation check. The two paths are
//! never mixed within one calculation.

use crate::accounts::{account_type, AccountKind};
use crate::document::Posting;
use crate::kpi::{
    accumulate_postings, compute_kpis, Annualization, BalanceView, EquityPolicy, KpiResult,
};
use crate::monthly::{calculate_monthly_kpis, MonthlySeries};
use chrono::NaiveDate;
use log::{debug, info, warn};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Rounding tolerance for the debit=credit reconciliation, in currency units.
pub const RECONCILIATION_TOLERANCE: f64 = 0.01;

/// A ledger account as delivered by a data-sync collaborator. The balance
/// fields are only present when the provider supplies them directly.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SyncedAccount {
    pub number: String,
    pub name: String,
    pub opening_balance: Option<f64>,
    pub closing_balance: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct VoucherEntry {
    pub account: String,
    pub debit: f64,
    pub credit: f64,
    pub date: Option<NaiveDate>,
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Voucher {
    pub series: String,
    pub number: String,
    pub entries: Vec<VoucherEntry>,
}

impl VoucherEntry {
    /// Signed amount: debit positive, credit negative.
    pub fn signed_amount(&self) -> f64 {
        self.debit - self.credit
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub enum BalanceSource {
    /// Balances taken straight from the provider's account records.
    Authoritative,
    /// Balances rebuilt from journal postings; subject to reconciliation.
    Reconstructed,
}

/// The balance set one of the two paths produced, plus its trust metadata.
#[derive(Debug, Clone)]
pub struct SelectedBalances {
    pub source: BalanceSource,
    pub opening: BTreeMap<String, f64>,
    pub closing: BTreeMap<String, f64>,
    pub movement: BTreeMap<String, f64>,
    pub unreconciled: bool,
    pub drift: Option<f64>,
}

fn has_authoritative_balances(accounts: &[SyncedAccount]) -> bool {
    accounts
        .iter()
        .any(|a| a.opening_balance.is_some() && a.closing_balance.is_some())
}

/// Sums debit and credit legs across the entire voucher history and returns
/// the absolute difference.
fn reconciliation_drift(vouchers: &[Voucher]) -> f64 {
    let (debits, credits) = vouchers
        .iter()
        .flat_map(|v| &v.entries)
        .fold((0.0, 0.0), |(d, c), e| (d + e.debit, c + e.credit));
    (debits - credits).abs()
}

/// Picks the balance source for the period and builds the balance set.
pub fn select_balances(
    accounts: &[SyncedAccount],
    vouchers: &[Voucher],
    period_start: NaiveDate,
    period_end: NaiveDate,
) -> SelectedBalances {
    if has_authoritative_balances(accounts) {
        info!("Using authoritative account balances from the data source");
        let mut opening = BTreeMap::new();
        let mut closing = BTreeMap::new();
        let mut movement = BTreeMap::new();

        for account in accounts {
            match account_type(&account.number) {
                AccountKind::BalanceSheet => {
                    if let Some(ib) = account.opening_balance {
                        opening.insert(account.number.clone(), ib);
                    }
                    if let Some(ub) = account.closing_balance {
                        closing.insert(account.number.clone(), ub);
                    }
                }
                AccountKind::IncomeStatement => {
                    // For income-statement accounts the provider balance is a
                    // period total: the movement is closing less opening.
                    let flow = account.closing_balance.unwrap_or(0.0)
                        - account.opening_balance.unwrap_or(0.0);
                    if flow != 0.0 {
                        movement.insert(account.number.clone(), flow);
                    }
                }
                AccountKind::Unknown => {}
            }
        }

        return SelectedBalances {
            source: BalanceSource::Authoritative,
            opening,
            closing,
            movement,
            unreconciled: false,
            drift: None,
        };
    }

    info!("No authoritative balances available; reconstructing from postings");
    let drift = reconciliation_drift(vouchers);
    let unreconciled = drift > RECONCILIATION_TOLERANCE;
    if unreconciled {
        warn!(
            "Posting set does not balance: debits and credits differ by {:.2}",
            drift
        );
    }

    let opening: BTreeMap<String, f64> = accounts
        .iter()
        .filter(|a| account_type(&a.number) == AccountKind::BalanceSheet)
        .filter_map(|a| a.opening_balance.map(|ib| (a.number.clone(), ib)))
        .collect();

    // Closing balance-sheet values: opening plus every dated posting up to
    // the period end. Income-statement flows: in-period postings only.
    let mut closing = opening.clone();
    let cumulative = accumulate_postings(
        vouchers
            .iter()
            .flat_map(|v| &v.entries)
            .filter(|e| matches!(e.date, Some(d) if d <= period_end))
            .filter(|e| account_type(&e.account) == AccountKind::BalanceSheet)
            .map(|e| (e.account.as_str(), e.signed_amount())),
    );
    for (account, amount) in cumulative {
        *closing.entry(account).or_insert(0.0) += amount;
    }

    let movement = accumulate_postings(
        vouchers
            .iter()
            .flat_map(|v| &v.entries)
            .filter(|e| matches!(e.date, Some(d) if d >= period_start && d <= period_end))
            .filter(|e| account_type(&e.account) == AccountKind::IncomeStatement)
            .map(|e| (e.account.as_str(), e.signed_amount())),
    );

    debug!(
        "Reconstructed {} closing and {} movement accounts",
        closing.len(),
        movement.len()
    );

    SelectedBalances {
        source: BalanceSource::Reconstructed,
        opening,
        closing,
        movement,
        unreconciled,
        drift: if unreconciled { Some(drift) } else { None },
    }
}

/// End-to-end annual KPI calculation over synced provider data. A drifting
/// fallback-path posting set still produces a result; it is merely flagged.
pub fn calculate_kpis_from_sync(
    accounts: &[SyncedAccount],
    vouchers: &[Voucher],
    period_start: NaiveDate,
    period_end: NaiveDate,
    policy: &EquityPolicy,
) -> KpiResult {
    let selected = select_balances(accounts, vouchers, period_start, period_end);
    let view = BalanceView {
        opening: selected.opening,
        closing: selected.closing,
        movement: selected.movement,
    };

    let mut result = compute_kpis(
        &view,
        None,
        Annualization::from_period(period_start, period_end),
        policy,
    );
    result.unreconciled = selected.unreconciled;
    result.reconciliation_drift = selected.drift;
    result
}

/// Flattens vouchers into postings for the monthly engine.
pub fn vouchers_to_postings(vouchers: &[Voucher]) -> Vec<Posting> {
    vouchers
        .iter()
        .flat_map(|v| {
            v.entries.iter().map(move |e| Posting {
                series: v.series.clone(),
                number: v.number.clone(),
                account: e.account.clone(),
                amount: e.signed_amount(),
                date: e.date,
                text: e.description.clone(),
                quantity: None,
                cost_centre: None,
                project: None,
            })
        })
        .collect()
}

/// Monthly decomposition over synced data, using the fallback posting path
/// with the same reconciliation gate as the annual calculation.
pub fn calculate_monthly_kpis_from_sync(
    accounts: &[SyncedAccount],
    vouchers: &[Voucher],
    period_start: NaiveDate,
    period_end: NaiveDate,
    policy: &EquityPolicy,
) -> MonthlySeries {
    let drift = reconciliation_drift(vouchers);
    let unreconciled = drift > RECONCILIATION_TOLERANCE;
    if unreconciled {
        warn!(
            "Posting set does not balance: debits and credits differ by {:.2}",
            drift
        );
    }

    let mut opening: BTreeMap<String, f64> = accounts
        .iter()
        .filter(|a| account_type(&a.number) == AccountKind::BalanceSheet)
        .filter_map(|a| a.opening_balance.map(|ib| (a.number.clone(), ib)))
        .collect();

    // Postings dated before the period fall outside every month window, so
    // they are folded into the opening balances here. This keeps the monthly
    // aggregate's balance sheet consistent with the annual fallback path,
    // which accumulates the full dated history up to the period end.
    let pre_period = accumulate_postings(
        vouchers
            .iter()
            .flat_map(|v| &v.entries)
            .filter(|e| matches!(e.date, Some(d) if d < period_start))
            .filter(|e| account_type(&e.account) == AccountKind::BalanceSheet)
            .map(|e| (e.account.as_str(), e.signed_amount())),
    );
    for (account, amount) in pre_period {
        *opening.entry(account).or_insert(0.0) += amount;
    }

    let postings = vouchers_to_postings(vouchers);
    let mut series = calculate_monthly_kpis(&opening, &postings, period_start, period_end, policy);

    for month in &mut series.months {
        month.kpis.unreconciled = unreconciled;
        month.kpis.reconciliation_drift = if unreconciled { Some(drift) } else { None };
    }
    series.aggregate.unreconciled = unreconciled;
    series.aggregate.reconciliation_drift = if unreconciled { Some(drift) } else { None };

    series
}
