//! BAS chart-of-accounts classification.
//!
//! The Swedish BAS standard assigns meaning to 4-digit account numbers by
//! range: the 1000s are assets, the 2000s equity and liabilities, 3000-8999
//! the income statement. All KPI aggregation sums accounts over these closed
//! ranges, so the tables here are the single source of truth for which
//! account lands in which financial-statement line.

use serde::{Deserialize, Serialize};
use std::ops::RangeInclusive;

/// Named BAS ranges used by the KPI aggregation. All ranges are closed
/// integer intervals over the 4-digit account number.
pub mod ranges {
    use std::ops::RangeInclusive;

    // Balance sheet: assets
    pub const INTANGIBLE_ASSETS: RangeInclusive<u32> = 1000..=1099;
    pub const BUILDINGS_AND_LAND: RangeInclusive<u32> = 1100..=1199;
    pub const MACHINERY_EQUIPMENT: RangeInclusive<u32> = 1200..=1299;
    pub const FINANCIAL_FIXED_ASSETS: RangeInclusive<u32> = 1300..=1399;
    pub const FIXED_ASSETS: RangeInclusive<u32> = 1000..=1399;
    pub const INVENTORY: RangeInclusive<u32> = 1400..=1499;
    pub const CUSTOMER_RECEIVABLES: RangeInclusive<u32> = 1500..=1599;
    pub const OTHER_RECEIVABLES: RangeInclusive<u32> = 1600..=1799;
    pub const SHORT_TERM_INVESTMENTS: RangeInclusive<u32> = 1800..=1899;
    pub const CASH_AND_BANK: RangeInclusive<u32> = 1900..=1999;
    pub const CURRENT_ASSETS: RangeInclusive<u32> = 1400..=1999;

    // Balance sheet: equity and liabilities
    pub const EQUITY: RangeInclusive<u32> = 2000..=2099;
    pub const UNTAXED_RESERVES: RangeInclusive<u32> = 2100..=2199;
    pub const PROVISIONS: RangeInclusive<u32> = 2200..=2299;
    pub const LONG_TERM_LIABILITIES: RangeInclusive<u32> = 2300..=2399;
    /// Bond and credit-institution loans within the long-term range.
    pub const LONG_TERM_INTEREST_BEARING: RangeInclusive<u32> = 2300..=2359;
    /// Group, associate and owner loans: typically interest-free.
    pub const LONG_TERM_NON_INTEREST_BEARING: RangeInclusive<u32> = 2360..=2399;
    pub const CURRENT_LIABILITIES: RangeInclusive<u32> = 2400..=2999;
    pub const SHORT_TERM_INTEREST_BEARING: RangeInclusive<u32> = 2400..=2439;
    pub const ACCOUNTS_PAYABLE: RangeInclusive<u32> = 2440..=2449;

    // Income statement
    pub const GROSS_SALES: RangeInclusive<u32> = 3000..=3699;
    pub const SALES_DISCOUNTS: RangeInclusive<u32> = 3700..=3799;
    pub const NET_SALES: RangeInclusive<u32> = 3000..=3799;
    pub const OTHER_OPERATING_INCOME: RangeInclusive<u32> = 3800..=3999;
    pub const OPERATING_INCOME: RangeInclusive<u32> = 3000..=3999;
    pub const COST_OF_GOODS_SOLD: RangeInclusive<u32> = 4000..=4999;
    pub const EXTERNAL_COSTS: RangeInclusive<u32> = 5000..=6999;
    pub const PERSONNEL_COSTS: RangeInclusive<u32> = 7000..=7699;
    pub const WRITE_DOWNS: RangeInclusive<u32> = 7700..=7799;
    pub const DEPRECIATION: RangeInclusive<u32> = 7800..=7899;
    pub const OTHER_OPERATING_COSTS: RangeInclusive<u32> = 7900..=7999;
    pub const FINANCIAL_INCOME: RangeInclusive<u32> = 8000..=8399;
    pub const FINANCIAL_EXPENSE: RangeInclusive<u32> = 8400..=8799;
    pub const APPROPRIATIONS: RangeInclusive<u32> = 8800..=8899;
    pub const TAX: RangeInclusive<u32> = 8900..=8989;
    /// "Årets resultat" accounts: excluded from all sums to avoid double
    /// counting the computed result.
    pub const YEAR_END_RESULT: RangeInclusive<u32> = 8990..=8999;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccountCategory {
    FixedAsset,
    Inventory,
    CustomerReceivable,
    OtherReceivable,
    ShortTermInvestment,
    CashAndBank,
    Equity,
    UntaxedReserve,
    Provision,
    LongTermLiability,
    CurrentLiability,
    Revenue,
    OtherOperatingIncome,
    CostOfGoodsSold,
    ExternalCost,
    PersonnelCost,
    WriteDown,
    Depreciation,
    OtherOperatingCost,
    FinancialIncome,
    FinancialExpense,
    Appropriation,
    Tax,
    YearEndResult,
}

impl AccountCategory {
    /// Swedish display label, as used by the reporting layer.
    pub fn label(&self) -> &'static str {
        match self {
            AccountCategory::FixedAsset => "Anläggningstillgångar",
            AccountCategory::Inventory => "Varulager",
            AccountCategory::CustomerReceivable => "Kundfordringar",
            AccountCategory::OtherReceivable => "Övriga fordringar",
            AccountCategory::ShortTermInvestment => "Kortfristiga placeringar",
            AccountCategory::CashAndBank => "Kassa och bank",
            AccountCategory::Equity => "Eget kapital",
            AccountCategory::UntaxedReserve => "Obeskattade reserver",
            AccountCategory::Provision => "Avsättningar",
            AccountCategory::LongTermLiability => "Långfristiga skulder",
            AccountCategory::CurrentLiability => "Kortfristiga skulder",
            AccountCategory::Revenue => "Nettoomsättning",
            AccountCategory::OtherOperatingIncome => "Övriga rörelseintäkter",
            AccountCategory::CostOfGoodsSold => "Varukostnader",
            AccountCategory::ExternalCost => "Övriga externa kostnader",
            AccountCategory::PersonnelCost => "Personalkostnader",
            AccountCategory::WriteDown => "Nedskrivningar",
            AccountCategory::Depreciation => "Avskrivningar",
            AccountCategory::OtherOperatingCost => "Övriga rörelsekostnader",
            AccountCategory::FinancialIncome => "Finansiella intäkter",
            AccountCategory::FinancialExpense => "Finansiella kostnader",
            AccountCategory::Appropriation => "Bokslutsdispositioner",
            AccountCategory::Tax => "Skatt",
            AccountCategory::YearEndResult => "Årets resultat",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccountKind {
    BalanceSheet,
    IncomeStatement,
    Unknown,
}

fn parse_account_number(account: &str) -> Option<u32> {
    account.trim().parse::<u32>().ok()
}

/// Maps a BAS account number to its category. Non-numeric or out-of-range
/// numbers return `None`; callers exclude such accounts from every sum.
pub fn classify(account: &str) -> Option<AccountCategory> {
    let n = parse_account_number(account)?;
    let category = match n {
        1000..=1399 => AccountCategory::FixedAsset,
        1400..=1499 => AccountCategory::Inventory,
        1500..=1599 => AccountCategory::CustomerReceivable,
        1600..=1799 => AccountCategory::OtherReceivable,
        1800..=1899 => AccountCategory::ShortTermInvestment,
        1900..=1999 => AccountCategory::CashAndBank,
        2000..=2099 => AccountCategory::Equity,
        2100..=2199 => AccountCategory::UntaxedReserve,
        2200..=2299 => AccountCategory::Provision,
        2300..=2399 => AccountCategory::LongTermLiability,
        2400..=2999 => AccountCategory::CurrentLiability,
        3000..=3799 => AccountCategory::Revenue,
        3800..=3999 => AccountCategory::OtherOperatingIncome,
        4000..=4999 => AccountCategory::CostOfGoodsSold,
        5000..=6999 => AccountCategory::ExternalCost,
        7000..=7699 => AccountCategory::PersonnelCost,
        7700..=7799 => AccountCategory::WriteDown,
        7800..=7899 => AccountCategory::Depreciation,
        7900..=7999 => AccountCategory::OtherOperatingCost,
        8000..=8399 => AccountCategory::FinancialIncome,
        8400..=8799 => AccountCategory::FinancialExpense,
        8800..=8899 => AccountCategory::Appropriation,
        8900..=8989 => AccountCategory::Tax,
        8990..=8999 => AccountCategory::YearEndResult,
        _ => return None,
    };
    Some(category)
}

/// Balance sheet vs income statement, by the 1000-2999 / 3000-8999 boundary.
pub fn account_type(account: &str) -> AccountKind {
    match parse_account_number(account) {
        Some(1000..=2999) => AccountKind::BalanceSheet,
        Some(3000..=8999) => AccountKind::IncomeStatement,
        _ => AccountKind::Unknown,
    }
}

pub fn is_in_range(account: &str, range: &RangeInclusive<u32>) -> bool {
    parse_account_number(account)
        .map(|n| range.contains(&n))
        .unwrap_or(false)
}

/// Swedish month names, indexed by calendar month - 1.
pub const MONTH_NAMES: [&str; 12] = [
    "januari",
    "februari",
    "mars",
    "april",
    "maj",
    "juni",
    "juli",
    "augusti",
    "september",
    "oktober",
    "november",
    "december",
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_assets() {
        assert_eq!(classify("1220"), Some(AccountCategory::FixedAsset));
        assert_eq!(classify("1460"), Some(AccountCategory::Inventory));
        assert_eq!(classify("1510"), Some(AccountCategory::CustomerReceivable));
        assert_eq!(classify("1930"), Some(AccountCategory::CashAndBank));
    }

    #[test]
    fn test_classify_liabilities_and_equity() {
        assert_eq!(classify("2081"), Some(AccountCategory::Equity));
        assert_eq!(classify("2150"), Some(AccountCategory::UntaxedReserve));
        assert_eq!(classify("2350"), Some(AccountCategory::LongTermLiability));
        assert_eq!(classify("2440"), Some(AccountCategory::CurrentLiability));
        assert_eq!(classify("2611"), Some(AccountCategory::CurrentLiability));
    }

    #[test]
    fn test_classify_income_statement() {
        assert_eq!(classify("3010"), Some(AccountCategory::Revenue));
        assert_eq!(classify("3730"), Some(AccountCategory::Revenue));
        assert_eq!(classify("3960"), Some(AccountCategory::OtherOperatingIncome));
        assert_eq!(classify("4010"), Some(AccountCategory::CostOfGoodsSold));
        assert_eq!(classify("5010"), Some(AccountCategory::ExternalCost));
        assert_eq!(classify("7010"), Some(AccountCategory::PersonnelCost));
        assert_eq!(classify("7830"), Some(AccountCategory::Depreciation));
        assert_eq!(classify("8310"), Some(AccountCategory::FinancialIncome));
        assert_eq!(classify("8410"), Some(AccountCategory::FinancialExpense));
        assert_eq!(classify("8910"), Some(AccountCategory::Tax));
        assert_eq!(classify("8999"), Some(AccountCategory::YearEndResult));
    }

    #[test]
    fn test_classify_unknown() {
        assert_eq!(classify("9999"), None);
        assert_eq!(classify("0999"), None);
        assert_eq!(classify("abc"), None);
        assert_eq!(classify(""), None);
    }

    #[test]
    fn test_account_type_totality() {
        for n in 1000..=8999u32 {
            let kind = account_type(&n.to_string());
            if n <= 2999 {
                assert_eq!(kind, AccountKind::BalanceSheet, "account {}", n);
            } else {
                assert_eq!(kind, AccountKind::IncomeStatement, "account {}", n);
            }
        }
        assert_eq!(account_type("9999"), AccountKind::Unknown);
        assert_eq!(account_type("999"), AccountKind::Unknown);
        assert_eq!(account_type("not-a-number"), AccountKind::Unknown);
    }

    #[test]
    fn test_is_in_range() {
        assert!(is_in_range("1500", &ranges::CUSTOMER_RECEIVABLES));
        assert!(is_in_range("1599", &ranges::CUSTOMER_RECEIVABLES));
        assert!(!is_in_range("1600", &ranges::CUSTOMER_RECEIVABLES));
        assert!(!is_in_range("x", &ranges::CUSTOMER_RECEIVABLES));
    }

    #[test]
    fn test_long_term_split_covers_whole_range() {
        for n in ranges::LONG_TERM_LIABILITIES.clone() {
            let s = n.to_string();
            assert!(
                is_in_range(&s, &ranges::LONG_TERM_INTEREST_BEARING)
                    ^ is_in_range(&s, &ranges::LONG_TERM_NON_INTEREST_BEARING)
            );
        }
    }

    #[test]
    fn test_category_labels() {
        assert_eq!(classify("1930").unwrap().label(), "Kassa och bank");
        assert_eq!(classify("3010").unwrap().label(), "Nettoomsättning");
    }
}
