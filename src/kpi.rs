//! Financial KPI derivation over BAS account balances.
//!
//! All aggregation runs through one shared core: a [`BalanceView`] holds the
//! opening, closing and period-movement value per account, and
//! [`compute_kpis`] turns a view into a [`KpiResult`]. The annual calculator
//! builds views from a parsed [`Document`]'s #IB/#UB/#RES balances; the
//! monthly engine builds them from posting folds. That keeps the ~45 formulas
//! in exactly one place.
//!
//! Sign conventions follow the source format: assets and costs are stored
//! positive, while liabilities, equity and revenue are stored as negative
//! magnitudes and are negated here before entering any formula.

use crate::accounts::ranges;
use crate::document::{BalanceKind, Document};
use chrono::NaiveDate;
use log::{debug, info, warn};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::ops::RangeInclusive;

/// Swedish statutory corporate tax rate since 2021.
pub const DEFAULT_CORPORATE_TAX_RATE: f64 = 0.206;

/// Policy knobs for the adjusted-equity computation.
///
/// Reclassifying non-interest-bearing long-term liabilities (owner and
/// related-party loans) as quasi-equity is a small-company reporting
/// convention, not an accounting requirement, so it can be switched off.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct EquityPolicy {
    pub corporate_tax_rate: f64,
    pub reclassify_owner_loans: bool,
}

impl Default for EquityPolicy {
    fn default() -> Self {
        Self {
            corporate_tax_rate: DEFAULT_CORPORATE_TAX_RATE,
            reclassify_owner_loans: true,
        }
    }
}

/// Scaling applied to period flows when the period is not a full year.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Annualization {
    pub factor: f64,
    pub period_days: i64,
    pub is_partial_year: bool,
}

impl Annualization {
    pub fn full_year() -> Self {
        Self {
            factor: 1.0,
            period_days: 365,
            is_partial_year: false,
        }
    }

    /// Fiscal periods within 350-380 days count as full years; anything else
    /// scales flows by 365/days.
    pub fn from_period(start: NaiveDate, end: NaiveDate) -> Self {
        let days = (end - start).num_days() + 1;
        if (350..=380).contains(&days) {
            Self {
                factor: 1.0,
                period_days: days,
                is_partial_year: false,
            }
        } else {
            Self {
                factor: 365.0 / days as f64,
                period_days: days,
                is_partial_year: true,
            }
        }
    }

    /// A single calendar month: flows annualize by a fixed x12.
    pub fn monthly(days_in_month: i64) -> Self {
        Self {
            factor: 12.0,
            period_days: days_in_month,
            is_partial_year: true,
        }
    }
}

/// One KPI snapshot. Amount fields are plain sums in the report currency;
/// ratio and percentage fields are `None` when their denominator is missing
/// or non-positive, never NaN or infinite.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct KpiResult {
    // Balance sheet snapshot (closing values)
    pub fixed_assets: f64,
    pub inventory: f64,
    pub customer_receivables: f64,
    pub other_receivables: f64,
    pub short_term_investments: f64,
    pub cash_and_bank: f64,
    pub current_assets: f64,
    pub total_assets: f64,
    pub equity: f64,
    pub untaxed_reserves: f64,
    pub provisions: f64,
    pub long_term_liabilities: f64,
    pub long_term_interest_bearing: f64,
    pub long_term_non_interest_bearing: f64,
    pub current_liabilities: f64,
    pub accounts_payable: f64,
    pub short_term_interest_bearing: f64,
    pub total_liabilities: f64,
    pub adjusted_equity: f64,
    pub deferred_tax_liability: f64,

    // Income statement (period movements)
    pub net_sales: f64,
    pub other_operating_income: f64,
    pub total_operating_income: f64,
    pub cost_of_goods_sold: f64,
    pub external_costs: f64,
    pub personnel_costs: f64,
    pub write_downs: f64,
    pub depreciation: f64,
    pub gross_profit: f64,
    pub ebitda: f64,
    pub ebit: f64,
    pub financial_income: f64,
    pub financial_expense: f64,
    pub financial_net: f64,
    pub pre_tax_result: f64,
    pub tax: f64,
    pub net_income: f64,

    // Margins, % of net sales
    pub gross_margin: Option<f64>,
    pub ebitda_margin: Option<f64>,
    pub operating_margin: Option<f64>,
    pub pre_tax_margin: Option<f64>,
    pub net_margin: Option<f64>,

    // Returns, annualized over averaged denominators
    pub return_on_assets: Option<f64>,
    pub return_on_equity: Option<f64>,
    pub return_on_capital_employed: Option<f64>,

    // Leverage
    pub equity_ratio: Option<f64>,
    pub debt_to_equity: Option<f64>,
    pub interest_bearing_debt_to_equity: Option<f64>,
    pub net_debt_to_ebitda: Option<f64>,
    pub interest_coverage: Option<f64>,

    // Liquidity
    pub cash_ratio: Option<f64>,
    pub quick_ratio: Option<f64>,
    pub current_ratio: Option<f64>,
    pub working_capital: f64,
    pub working_capital_to_sales: Option<f64>,

    // Efficiency, 365-day conventions
    pub days_inventory_outstanding: Option<f64>,
    pub days_sales_outstanding: Option<f64>,
    pub days_payables_outstanding: Option<f64>,
    pub cash_conversion_cycle: Option<f64>,
    pub asset_turnover: Option<f64>,

    // Growth vs the prior period
    pub revenue_growth: Option<f64>,
    pub asset_growth: Option<f64>,
    pub equity_growth: Option<f64>,

    // Period metadata
    pub annualization_factor: f64,
    pub period_days: i64,
    pub is_partial_year: bool,

    // Set by the source selector when KPIs were reconstructed from postings
    // whose debits and credits do not balance.
    pub unreconciled: bool,
    pub reconciliation_drift: Option<f64>,
}

/// Per-account balance values for one period: opening and closing for
/// balance-sheet accounts, movement for income-statement accounts.
#[derive(Debug, Clone, Default)]
pub struct BalanceView {
    pub opening: BTreeMap<String, f64>,
    pub closing: BTreeMap<String, f64>,
    pub movement: BTreeMap<String, f64>,
}

impl BalanceView {
    pub fn from_document(document: &Document, year_index: i32) -> Self {
        let mut view = Self::default();
        for balance in &document.balances {
            if balance.year_index != year_index {
                continue;
            }
            let slot = match balance.kind {
                BalanceKind::Opening => &mut view.opening,
                BalanceKind::Closing => &mut view.closing,
                BalanceKind::Result => &mut view.movement,
            };
            *slot.entry(balance.account.clone()).or_insert(0.0) += balance.amount;
        }
        view
    }

    pub fn is_empty(&self) -> bool {
        self.opening.is_empty() && self.closing.is_empty() && self.movement.is_empty()
    }
}

/// Folds a posting stream into per-account accumulated amounts.
pub fn accumulate_postings<'a, I>(postings: I) -> BTreeMap<String, f64>
where
    I: IntoIterator<Item = (&'a str, f64)>,
{
    postings
        .into_iter()
        .fold(BTreeMap::new(), |mut acc, (account, amount)| {
            *acc.entry(account.to_string()).or_insert(0.0) += amount;
            acc
        })
}

fn sum_range(map: &BTreeMap<String, f64>, range: &RangeInclusive<u32>) -> f64 {
    map.iter()
        .filter(|(account, _)| crate::accounts::is_in_range(account, range))
        .map(|(_, amount)| amount)
        .sum()
}

/// Divides as a percentage; `None` unless the denominator is positive.
fn pct(numerator: f64, denominator: f64) -> Option<f64> {
    if denominator > 0.0 {
        Some(numerator / denominator * 100.0)
    } else {
        None
    }
}

fn ratio(numerator: f64, denominator: f64) -> Option<f64> {
    if denominator > 0.0 {
        Some(numerator / denominator)
    } else {
        None
    }
}

/// Balance-sheet aggregates from one side (opening or closing) of a view.
#[derive(Debug, Clone, Copy, Default)]
struct BsSnapshot {
    fixed_assets: f64,
    inventory: f64,
    customer_receivables: f64,
    other_receivables: f64,
    short_term_investments: f64,
    cash_and_bank: f64,
    current_assets: f64,
    total_assets: f64,
    equity: f64,
    untaxed_reserves: f64,
    provisions: f64,
    long_term_liabilities: f64,
    long_term_interest_bearing: f64,
    long_term_non_interest_bearing: f64,
    current_liabilities: f64,
    accounts_payable: f64,
    short_term_interest_bearing: f64,
}

impl BsSnapshot {
    fn from_map(map: &BTreeMap<String, f64>) -> Self {
        let fixed_assets = sum_range(map, &ranges::FIXED_ASSETS);
        let current_assets = sum_range(map, &ranges::CURRENT_ASSETS);
        Self {
            fixed_assets,
            inventory: sum_range(map, &ranges::INVENTORY),
            customer_receivables: sum_range(map, &ranges::CUSTOMER_RECEIVABLES),
            other_receivables: sum_range(map, &ranges::OTHER_RECEIVABLES),
            short_term_investments: sum_range(map, &ranges::SHORT_TERM_INVESTMENTS),
            cash_and_bank: sum_range(map, &ranges::CASH_AND_BANK),
            current_assets,
            total_assets: fixed_assets + current_assets,
            equity: -sum_range(map, &ranges::EQUITY),
            untaxed_reserves: -sum_range(map, &ranges::UNTAXED_RESERVES),
            provisions: -sum_range(map, &ranges::PROVISIONS),
            long_term_liabilities: -sum_range(map, &ranges::LONG_TERM_LIABILITIES),
            long_term_interest_bearing: -sum_range(map, &ranges::LONG_TERM_INTEREST_BEARING),
            long_term_non_interest_bearing: -sum_range(
                map,
                &ranges::LONG_TERM_NON_INTEREST_BEARING,
            ),
            current_liabilities: -sum_range(map, &ranges::CURRENT_LIABILITIES),
            accounts_payable: -sum_range(map, &ranges::ACCOUNTS_PAYABLE),
            short_term_interest_bearing: -sum_range(map, &ranges::SHORT_TERM_INTEREST_BEARING),
        }
    }

    fn interest_bearing_debt(&self) -> f64 {
        self.long_term_interest_bearing + self.short_term_interest_bearing
    }

    /// Reported equity plus untaxed reserves net of deferred tax, optionally
    /// plus owner loans, plus the period result to date.
    fn adjusted_equity(&self, result_to_date: f64, policy: &EquityPolicy) -> f64 {
        let owner_loans = if policy.reclassify_owner_loans {
            self.long_term_non_interest_bearing
        } else {
            0.0
        };
        self.equity
            + self.untaxed_reserves * (1.0 - policy.corporate_tax_rate)
            + owner_loans
            + result_to_date
    }
}

/// Income-statement aggregates from a movement map.
#[derive(Debug, Clone, Copy, Default)]
struct IsSnapshot {
    net_sales: f64,
    other_operating_income: f64,
    total_operating_income: f64,
    cost_of_goods_sold: f64,
    external_costs: f64,
    personnel_costs: f64,
    write_downs: f64,
    depreciation: f64,
    gross_profit: f64,
    ebitda: f64,
    ebit: f64,
    financial_income: f64,
    financial_expense: f64,
    financial_net: f64,
    pre_tax_result: f64,
    tax: f64,
    net_income: f64,
}

impl IsSnapshot {
    fn from_map(map: &BTreeMap<String, f64>) -> Self {
        let net_sales = -sum_range(map, &ranges::NET_SALES);
        let other_operating_income = -sum_range(map, &ranges::OTHER_OPERATING_INCOME);
        let total_operating_income = net_sales + other_operating_income;
        let cost_of_goods_sold = sum_range(map, &ranges::COST_OF_GOODS_SOLD);
        let external_costs = sum_range(map, &ranges::EXTERNAL_COSTS);
        let personnel_costs = sum_range(map, &ranges::PERSONNEL_COSTS);
        let write_downs = sum_range(map, &ranges::WRITE_DOWNS);
        let depreciation = sum_range(map, &ranges::DEPRECIATION);
        let other_operating_costs = sum_range(map, &ranges::OTHER_OPERATING_COSTS);

        let gross_profit = net_sales - cost_of_goods_sold;
        let ebitda = total_operating_income
            - cost_of_goods_sold
            - external_costs
            - personnel_costs
            - other_operating_costs;
        let ebit = ebitda - depreciation - write_downs;

        let financial_income = -sum_range(map, &ranges::FINANCIAL_INCOME);
        let financial_expense = sum_range(map, &ranges::FINANCIAL_EXPENSE);
        let financial_net = financial_income - financial_expense;
        let appropriations = sum_range(map, &ranges::APPROPRIATIONS);
        let pre_tax_result = ebit + financial_net - appropriations;
        let tax = sum_range(map, &ranges::TAX);
        let net_income = pre_tax_result - tax;

        Self {
            net_sales,
            other_operating_income,
            total_operating_income,
            cost_of_goods_sold,
            external_costs,
            personnel_costs,
            write_downs,
            depreciation,
            gross_profit,
            ebitda,
            ebit,
            financial_income,
            financial_expense,
            financial_net,
            pre_tax_result,
            tax,
            net_income,
        }
    }
}

/// Runs the full formula set over one balance view. `prior` supplies the
/// previous period (previous fiscal year or previous month) for growth.
pub fn compute_kpis(
    view: &BalanceView,
    prior: Option<&BalanceView>,
    annualization: Annualization,
    policy: &EquityPolicy,
) -> KpiResult {
    let closing = BsSnapshot::from_map(&view.closing);
    let opening = BsSnapshot::from_map(&view.opening);
    let is = IsSnapshot::from_map(&view.movement);

    let factor = annualization.factor;
    let adjusted_equity = closing.adjusted_equity(is.net_income, policy);
    let opening_adjusted_equity = opening.adjusted_equity(0.0, policy);
    let deferred_tax_liability = closing.untaxed_reserves * policy.corporate_tax_rate;
    let total_liabilities =
        closing.provisions + closing.long_term_liabilities + closing.current_liabilities;

    // Averaged denominators for return ratios. When there is no opening
    // data the closing value stands in for the whole period.
    let avg = |open: f64, close: f64| {
        if view.opening.is_empty() {
            close
        } else {
            (open + close) / 2.0
        }
    };
    let avg_total_assets = avg(opening.total_assets, closing.total_assets);
    let avg_adjusted_equity = avg(opening_adjusted_equity, adjusted_equity);
    let avg_capital_employed = avg(
        opening_adjusted_equity + opening.interest_bearing_debt(),
        adjusted_equity + closing.interest_bearing_debt(),
    );

    let liquid_funds = closing.cash_and_bank + closing.short_term_investments;
    let interest_bearing_debt = closing.interest_bearing_debt();
    let net_debt = interest_bearing_debt - liquid_funds;
    let working_capital = closing.current_assets - closing.current_liabilities;

    let annualized_sales = is.net_sales * factor;
    let annualized_cogs = is.cost_of_goods_sold * factor;

    let days_inventory_outstanding = ratio(closing.inventory * 365.0, annualized_cogs);
    let days_sales_outstanding = ratio(closing.customer_receivables * 365.0, annualized_sales);
    let days_payables_outstanding = ratio(closing.accounts_payable * 365.0, annualized_cogs);
    let cash_conversion_cycle = match (
        days_inventory_outstanding,
        days_sales_outstanding,
        days_payables_outstanding,
    ) {
        (Some(dio), Some(dso), Some(dpo)) => Some(dio + dso - dpo),
        _ => None,
    };

    let prior_is = prior.map(|p| IsSnapshot::from_map(&p.movement));
    let prior_bs = prior.map(|p| BsSnapshot::from_map(&p.closing));

    let growth = |current: f64, prior_value: Option<f64>| match prior_value {
        Some(p) if p > 0.0 => Some((current - p) / p * 100.0),
        _ => None,
    };

    let result = KpiResult {
        fixed_assets: closing.fixed_assets,
        inventory: closing.inventory,
        customer_receivables: closing.customer_receivables,
        other_receivables: closing.other_receivables,
        short_term_investments: closing.short_term_investments,
        cash_and_bank: closing.cash_and_bank,
        current_assets: closing.current_assets,
        total_assets: closing.total_assets,
        equity: closing.equity,
        untaxed_reserves: closing.untaxed_reserves,
        provisions: closing.provisions,
        long_term_liabilities: closing.long_term_liabilities,
        long_term_interest_bearing: closing.long_term_interest_bearing,
        long_term_non_interest_bearing: closing.long_term_non_interest_bearing,
        current_liabilities: closing.current_liabilities,
        accounts_payable: closing.accounts_payable,
        short_term_interest_bearing: closing.short_term_interest_bearing,
        total_liabilities,
        adjusted_equity,
        deferred_tax_liability,

        net_sales: is.net_sales,
        other_operating_income: is.other_operating_income,
        total_operating_income: is.total_operating_income,
        cost_of_goods_sold: is.cost_of_goods_sold,
        external_costs: is.external_costs,
        personnel_costs: is.personnel_costs,
        write_downs: is.write_downs,
        depreciation: is.depreciation,
        gross_profit: is.gross_profit,
        ebitda: is.ebitda,
        ebit: is.ebit,
        financial_income: is.financial_income,
        financial_expense: is.financial_expense,
        financial_net: is.financial_net,
        pre_tax_result: is.pre_tax_result,
        tax: is.tax,
        net_income: is.net_income,

        gross_margin: pct(is.gross_profit, is.net_sales),
        ebitda_margin: pct(is.ebitda, is.net_sales),
        operating_margin: pct(is.ebit, is.net_sales),
        pre_tax_margin: pct(is.pre_tax_result, is.net_sales),
        net_margin: pct(is.net_income, is.net_sales),

        return_on_assets: pct(is.ebit * factor, avg_total_assets),
        return_on_equity: pct(is.net_income * factor, avg_adjusted_equity),
        return_on_capital_employed: pct(is.ebit * factor, avg_capital_employed),

        equity_ratio: pct(adjusted_equity, closing.total_assets),
        debt_to_equity: ratio(total_liabilities, adjusted_equity),
        interest_bearing_debt_to_equity: ratio(interest_bearing_debt, adjusted_equity),
        net_debt_to_ebitda: ratio(net_debt, is.ebitda * factor),
        interest_coverage: ratio(is.ebitda, is.financial_expense),

        cash_ratio: pct(liquid_funds, closing.current_liabilities),
        quick_ratio: ratio(
            closing.current_assets - closing.inventory,
            closing.current_liabilities,
        ),
        current_ratio: ratio(closing.current_assets, closing.current_liabilities),
        working_capital,
        working_capital_to_sales: pct(working_capital, annualized_sales),

        days_inventory_outstanding,
        days_sales_outstanding,
        days_payables_outstanding,
        cash_conversion_cycle,
        asset_turnover: ratio(annualized_sales, avg_total_assets),

        revenue_growth: growth(is.net_sales, prior_is.map(|p| p.net_sales)),
        asset_growth: growth(closing.total_assets, prior_bs.map(|p| p.total_assets)),
        equity_growth: growth(
            adjusted_equity,
            prior.map(|p| {
                let prior_closing = BsSnapshot::from_map(&p.closing);
                let prior_movement = IsSnapshot::from_map(&p.movement);
                prior_closing.adjusted_equity(prior_movement.net_income, policy)
            }),
        ),

        annualization_factor: factor,
        period_days: annualization.period_days,
        is_partial_year: annualization.is_partial_year,

        unreconciled: false,
        reconciliation_drift: None,
    };

    debug!(
        "Computed KPIs: net sales {:.2}, EBIT {:.2}, total assets {:.2}",
        result.net_sales, result.ebit, result.total_assets
    );

    result
}

/// One KPI snapshot for the fiscal year at `year_index` (0 = current,
/// negative = prior years). Closing balances feed the balance sheet, result
/// movements feed the income statement, and the prior year's balances feed
/// growth. Absence of data yields a result with all ratios `None`.
pub fn calculate_annual_kpis(
    document: &Document,
    year_index: i32,
    policy: &EquityPolicy,
) -> KpiResult {
    info!(
        "Calculating annual KPIs for '{}', year index {}",
        document.metadata.company_name, year_index
    );

    let view = BalanceView::from_document(document, year_index);
    if view.is_empty() {
        debug!("No balances for year index {}", year_index);
    }
    let prior = BalanceView::from_document(document, year_index - 1);
    let prior = if prior.is_empty() { None } else { Some(prior) };

    let annualization = match document.metadata.fiscal_year(year_index) {
        Some((start, end)) => {
            let a = Annualization::from_period(start, end);
            if a.is_partial_year {
                warn!(
                    "Fiscal year {} spans {} days; annualizing flows by {:.4}",
                    year_index, a.period_days, a.factor
                );
            }
            a
        }
        None => Annualization::full_year(),
    };

    compute_kpis(&view, prior.as_ref(), annualization, policy)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Balance;

    fn balance(kind: BalanceKind, year_index: i32, account: &str, amount: f64) -> Balance {
        Balance {
            kind,
            year_index,
            account: account.to_string(),
            amount,
            quantity: None,
        }
    }

    fn minimal_document() -> Document {
        let mut doc = Document::new();
        doc.metadata.fiscal_year_start = NaiveDate::from_ymd_opt(2023, 1, 1);
        doc.metadata.fiscal_year_end = NaiveDate::from_ymd_opt(2023, 12, 31);
        doc.balances.push(balance(BalanceKind::Opening, 0, "1930", 100000.0));
        doc.balances.push(balance(BalanceKind::Closing, 0, "1930", 150000.0));
        doc.balances.push(balance(BalanceKind::Result, 0, "3010", -500000.0));
        doc.balances.push(balance(BalanceKind::Result, 0, "5010", 400000.0));
        doc
    }

    #[test]
    fn test_minimal_scenario() {
        let doc = minimal_document();
        let kpis = calculate_annual_kpis(&doc, 0, &EquityPolicy::default());

        assert!((kpis.net_sales - 500000.0).abs() < 0.01);
        assert!((kpis.ebit - 100000.0).abs() < 0.01);
        assert!((kpis.total_assets - 150000.0).abs() < 0.01);
        assert_eq!(kpis.current_ratio, None);
        assert!((kpis.net_income - 100000.0).abs() < 0.01);
        assert!((kpis.operating_margin.unwrap() - 20.0).abs() < 1e-9);
    }

    #[test]
    fn test_sign_conventions() {
        let mut doc = Document::new();
        doc.balances.push(balance(BalanceKind::Closing, 0, "2081", -200000.0));
        doc.balances.push(balance(BalanceKind::Closing, 0, "2440", -50000.0));
        doc.balances.push(balance(BalanceKind::Closing, 0, "1930", 250000.0));

        let kpis = calculate_annual_kpis(&doc, 0, &EquityPolicy::default());
        assert!((kpis.equity - 200000.0).abs() < 0.01);
        assert!((kpis.accounts_payable - 50000.0).abs() < 0.01);
        assert!((kpis.current_liabilities - 50000.0).abs() < 0.01);
        assert!((kpis.total_assets - 250000.0).abs() < 0.01);
    }

    #[test]
    fn test_margins_null_safe_on_zero_sales() {
        let mut doc = Document::new();
        doc.balances.push(balance(BalanceKind::Result, 0, "5010", 1000.0));

        let kpis = calculate_annual_kpis(&doc, 0, &EquityPolicy::default());
        assert_eq!(kpis.gross_margin, None);
        assert_eq!(kpis.ebitda_margin, None);
        assert_eq!(kpis.operating_margin, None);
        assert_eq!(kpis.pre_tax_margin, None);
        assert_eq!(kpis.net_margin, None);
    }

    #[test]
    fn test_empty_year_yields_none_ratios_not_error() {
        let doc = minimal_document();
        let kpis = calculate_annual_kpis(&doc, -5, &EquityPolicy::default());
        assert_eq!(kpis.total_assets, 0.0);
        assert_eq!(kpis.net_sales, 0.0);
        assert_eq!(kpis.return_on_assets, None);
        assert_eq!(kpis.current_ratio, None);
    }

    #[test]
    fn test_adjusted_equity_policy() {
        let mut doc = Document::new();
        doc.balances.push(balance(BalanceKind::Closing, 0, "2081", -100000.0));
        doc.balances.push(balance(BalanceKind::Closing, 0, "2150", -50000.0));
        doc.balances.push(balance(BalanceKind::Closing, 0, "2393", -30000.0));

        let default_policy = EquityPolicy::default();
        let kpis = calculate_annual_kpis(&doc, 0, &default_policy);
        let expected = 100000.0 + 50000.0 * (1.0 - 0.206) + 30000.0;
        assert!((kpis.adjusted_equity - expected).abs() < 0.01);
        assert!((kpis.deferred_tax_liability - 50000.0 * 0.206).abs() < 0.01);

        let no_reclass = EquityPolicy {
            reclassify_owner_loans: false,
            ..EquityPolicy::default()
        };
        let kpis = calculate_annual_kpis(&doc, 0, &no_reclass);
        let expected = 100000.0 + 50000.0 * (1.0 - 0.206);
        assert!((kpis.adjusted_equity - expected).abs() < 0.01);
    }

    #[test]
    fn test_returns_use_averaged_denominators() {
        let mut doc = Document::new();
        doc.metadata.fiscal_year_start = NaiveDate::from_ymd_opt(2023, 1, 1);
        doc.metadata.fiscal_year_end = NaiveDate::from_ymd_opt(2023, 12, 31);
        doc.balances.push(balance(BalanceKind::Opening, 0, "1930", 100000.0));
        doc.balances.push(balance(BalanceKind::Closing, 0, "1930", 300000.0));
        doc.balances.push(balance(BalanceKind::Result, 0, "3010", -100000.0));
        doc.balances.push(balance(BalanceKind::Result, 0, "4010", 60000.0));

        let kpis = calculate_annual_kpis(&doc, 0, &EquityPolicy::default());
        // EBIT 40000 over average assets (100000+300000)/2 = 200000
        assert!((kpis.return_on_assets.unwrap() - 20.0).abs() < 1e-9);
    }

    #[test]
    fn test_annualization_boundaries() {
        let full = Annualization::from_period(
            NaiveDate::from_ymd_opt(2023, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2023, 12, 31).unwrap(),
        );
        assert_eq!(full.factor, 1.0);
        assert_eq!(full.period_days, 365);
        assert!(!full.is_partial_year);

        let half = Annualization::from_period(
            NaiveDate::from_ymd_opt(2023, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2023, 6, 29).unwrap(),
        );
        assert_eq!(half.period_days, 180);
        assert!((half.factor - 2.0278).abs() < 0.001);
        assert!(half.is_partial_year);
    }

    #[test]
    fn test_partial_year_annualizes_returns_not_margins() {
        let mut doc = Document::new();
        // Half-year period: flows double before entering return ratios.
        doc.metadata.fiscal_year_start = NaiveDate::from_ymd_opt(2023, 1, 1);
        doc.metadata.fiscal_year_end = NaiveDate::from_ymd_opt(2023, 6, 29);
        doc.balances.push(balance(BalanceKind::Opening, 0, "1930", 100000.0));
        doc.balances.push(balance(BalanceKind::Closing, 0, "1930", 100000.0));
        doc.balances.push(balance(BalanceKind::Result, 0, "3010", -50000.0));
        doc.balances.push(balance(BalanceKind::Result, 0, "4010", 30000.0));

        let kpis = calculate_annual_kpis(&doc, 0, &EquityPolicy::default());
        assert!(kpis.is_partial_year);
        // EBIT 20000 * (365/180) over avg assets 100000
        let expected_roa = 20000.0 * (365.0 / 180.0) / 100000.0 * 100.0;
        assert!((kpis.return_on_assets.unwrap() - expected_roa).abs() < 0.01);
        // Margins never annualize: 20000/50000
        assert!((kpis.operating_margin.unwrap() - 40.0).abs() < 1e-9);
    }

    #[test]
    fn test_growth_against_prior_year() {
        let mut doc = Document::new();
        doc.balances.push(balance(BalanceKind::Closing, 0, "1930", 240000.0));
        doc.balances.push(balance(BalanceKind::Result, 0, "3010", -120000.0));
        doc.balances.push(balance(BalanceKind::Closing, -1, "1930", 200000.0));
        doc.balances.push(balance(BalanceKind::Result, -1, "3010", -100000.0));

        let kpis = calculate_annual_kpis(&doc, 0, &EquityPolicy::default());
        assert!((kpis.revenue_growth.unwrap() - 20.0).abs() < 1e-9);
        assert!((kpis.asset_growth.unwrap() - 20.0).abs() < 1e-9);
    }

    #[test]
    fn test_growth_none_without_prior_data() {
        let doc = minimal_document();
        let kpis = calculate_annual_kpis(&doc, 0, &EquityPolicy::default());
        assert_eq!(kpis.revenue_growth, None);
        assert_eq!(kpis.asset_growth, None);
        assert_eq!(kpis.equity_growth, None);
    }

    #[test]
    fn test_liquidity_ratios() {
        let mut doc = Document::new();
        doc.balances.push(balance(BalanceKind::Closing, 0, "1460", 50000.0));
        doc.balances.push(balance(BalanceKind::Closing, 0, "1510", 30000.0));
        doc.balances.push(balance(BalanceKind::Closing, 0, "1930", 20000.0));
        doc.balances.push(balance(BalanceKind::Closing, 0, "2440", -40000.0));

        let kpis = calculate_annual_kpis(&doc, 0, &EquityPolicy::default());
        assert_eq!(kpis.current_ratio, Some(2.5));
        assert_eq!(kpis.quick_ratio, Some(1.25));
        assert_eq!(kpis.cash_ratio, Some(50.0));
        assert!((kpis.working_capital - 60000.0).abs() < 0.01);
    }

    #[test]
    fn test_efficiency_days() {
        let mut doc = Document::new();
        doc.metadata.fiscal_year_start = NaiveDate::from_ymd_opt(2023, 1, 1);
        doc.metadata.fiscal_year_end = NaiveDate::from_ymd_opt(2023, 12, 31);
        doc.balances.push(balance(BalanceKind::Closing, 0, "1460", 36500.0));
        doc.balances.push(balance(BalanceKind::Result, 0, "4010", 365000.0));
        doc.balances.push(balance(BalanceKind::Result, 0, "3010", -730000.0));
        doc.balances.push(balance(BalanceKind::Closing, 0, "1510", 73000.0));
        doc.balances.push(balance(BalanceKind::Closing, 0, "2440", -18250.0));

        let kpis = calculate_annual_kpis(&doc, 0, &EquityPolicy::default());
        assert!((kpis.days_inventory_outstanding.unwrap() - 36.5).abs() < 0.01);
        assert!((kpis.days_sales_outstanding.unwrap() - 36.5).abs() < 0.01);
        assert!((kpis.days_payables_outstanding.unwrap() - 18.25).abs() < 0.01);
        assert!((kpis.cash_conversion_cycle.unwrap() - 54.75).abs() < 0.01);
    }

    #[test]
    fn test_year_end_result_account_excluded() {
        let mut doc = Document::new();
        doc.balances.push(balance(BalanceKind::Result, 0, "3010", -100000.0));
        doc.balances.push(balance(BalanceKind::Result, 0, "8999", 100000.0));

        let kpis = calculate_annual_kpis(&doc, 0, &EquityPolicy::default());
        assert!((kpis.net_income - 100000.0).abs() < 0.01);
        assert_eq!(kpis.tax, 0.0);
    }
}
