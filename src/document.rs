//! The in-memory model of one SIE document: metadata, chart of accounts,
//! dimension objects, verification postings and per-year balances.
//!
//! A `Document` is produced once by the parser (or assembled by a caller
//! feeding the KPI engine from synced provider data) and is read-only from
//! then on; the writer and both calculators take it by shared reference.

use crate::accounts::{classify, AccountCategory};
use crate::error::{Result, SieError};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    pub company_name: String,
    /// Report currency; SIE defaults to SEK when no #VALUTA record is present.
    pub currency: String,
    /// SIE type code from #SIETYP (1-4).
    pub format_type: Option<u32>,
    pub organization_number: Option<String>,
    pub generated_date: Option<NaiveDate>,
    pub fiscal_year_start: Option<NaiveDate>,
    pub fiscal_year_end: Option<NaiveDate>,
    /// Closing cut-off from #OMFATTN.
    pub scope_date: Option<NaiveDate>,
    /// Prior fiscal years from #RAR records with negative indices.
    pub prior_fiscal_years: Vec<FiscalYear>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FiscalYear {
    /// 0 = current year, -1 = previous, and so on.
    pub year_index: i32,
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl Metadata {
    pub fn new() -> Self {
        Self {
            currency: "SEK".to_string(),
            ..Default::default()
        }
    }

    /// Fiscal year bounds for a given index, current year from the top-level
    /// fields and prior years from the #RAR list.
    pub fn fiscal_year(&self, year_index: i32) -> Option<(NaiveDate, NaiveDate)> {
        if year_index == 0 {
            return match (self.fiscal_year_start, self.fiscal_year_end) {
                (Some(s), Some(e)) => Some((s, e)),
                _ => None,
            };
        }
        self.prior_fiscal_years
            .iter()
            .find(|fy| fy.year_index == year_index)
            .map(|fy| (fy.start, fy.end))
    }

    pub fn validate(&self) -> Result<()> {
        if let (Some(start), Some(end)) = (self.fiscal_year_start, self.fiscal_year_end) {
            if start > end {
                return Err(SieError::InvalidFiscalYear {
                    start: start.to_string(),
                    end: end.to_string(),
                });
            }
        }
        for fy in &self.prior_fiscal_years {
            if fy.start > fy.end {
                return Err(SieError::InvalidFiscalYear {
                    start: fy.start.to_string(),
                    end: fy.end.to_string(),
                });
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub number: String,
    pub name: String,
    /// Informational BAS classification label, filled in at parse time.
    pub category: String,
    /// SRU tax code, attached from a #SRU record when present.
    pub sru_code: Option<String>,
}

impl Account {
    pub fn new(number: impl Into<String>, name: impl Into<String>) -> Self {
        let number = number.into();
        let category = classify(&number)
            .map(|c| c.label().to_string())
            .unwrap_or_default();
        Self {
            number,
            name: name.into(),
            category,
            sru_code: None,
        }
    }

    pub fn classification(&self) -> Option<AccountCategory> {
        classify(&self.number)
    }
}

/// One object on a dimension axis, e.g. cost centre "100" on dimension 1.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dimension {
    pub dimension_type: u32,
    pub code: String,
    pub name: String,
}

/// SIE reserved dimension number for cost centres.
pub const DIMENSION_COST_CENTRE: u32 = 1;
/// SIE reserved dimension number for projects.
pub const DIMENSION_PROJECT: u32 = 6;

/// One transaction row inside a verification. Amounts are signed in the
/// report currency: debit positive, credit negative.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Posting {
    pub series: String,
    pub number: String,
    pub account: String,
    pub amount: f64,
    pub date: Option<NaiveDate>,
    pub text: String,
    pub quantity: Option<f64>,
    pub cost_centre: Option<String>,
    pub project: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum BalanceKind {
    /// #IB, balance at fiscal year start.
    Opening,
    /// #UB, balance at fiscal year end.
    Closing,
    /// #RES, period movement for income-statement accounts.
    Result,
}

/// One balance record. Sign convention follows the source format: assets
/// positive; liabilities, equity and revenue carried as negative magnitudes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Balance {
    pub kind: BalanceKind,
    /// 0 = current fiscal year, negative = prior years.
    pub year_index: i32,
    pub account: String,
    pub amount: f64,
    pub quantity: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub metadata: Metadata,
    pub accounts: Vec<Account>,
    pub dimensions: Vec<Dimension>,
    pub postings: Vec<Posting>,
    pub balances: Vec<Balance>,
}

impl Document {
    pub fn new() -> Self {
        Self {
            metadata: Metadata::new(),
            ..Default::default()
        }
    }

    pub fn account(&self, number: &str) -> Option<&Account> {
        self.accounts.iter().find(|a| a.number == number)
    }

    /// Balances of one kind for one fiscal year index.
    pub fn balances_for(
        &self,
        kind: BalanceKind,
        year_index: i32,
    ) -> impl Iterator<Item = &Balance> {
        self.balances
            .iter()
            .filter(move |b| b.kind == kind && b.year_index == year_index)
    }

    /// Verification identifiers in first-seen order.
    pub fn verification_ids(&self) -> Vec<(String, String)> {
        let mut ids: Vec<(String, String)> = Vec::new();
        for p in &self.postings {
            let id = (p.series.clone(), p.number.clone());
            if !ids.contains(&id) {
                ids.push(id);
            }
        }
        ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metadata_defaults_to_sek() {
        let meta = Metadata::new();
        assert_eq!(meta.currency, "SEK");
    }

    #[test]
    fn test_metadata_validate_rejects_inverted_range() {
        let mut meta = Metadata::new();
        meta.fiscal_year_start = NaiveDate::from_ymd_opt(2023, 12, 31);
        meta.fiscal_year_end = NaiveDate::from_ymd_opt(2023, 1, 1);
        assert!(meta.validate().is_err());

        meta.fiscal_year_start = NaiveDate::from_ymd_opt(2023, 1, 1);
        meta.fiscal_year_end = NaiveDate::from_ymd_opt(2023, 12, 31);
        assert!(meta.validate().is_ok());
    }

    #[test]
    fn test_metadata_validate_rejects_inverted_prior_year() {
        let mut meta = Metadata::new();
        meta.prior_fiscal_years.push(FiscalYear {
            year_index: -1,
            start: NaiveDate::from_ymd_opt(2022, 12, 31).unwrap(),
            end: NaiveDate::from_ymd_opt(2022, 1, 1).unwrap(),
        });
        assert!(meta.validate().is_err());
    }

    #[test]
    fn test_fiscal_year_lookup() {
        let mut meta = Metadata::new();
        meta.fiscal_year_start = NaiveDate::from_ymd_opt(2023, 1, 1);
        meta.fiscal_year_end = NaiveDate::from_ymd_opt(2023, 12, 31);
        meta.prior_fiscal_years.push(FiscalYear {
            year_index: -1,
            start: NaiveDate::from_ymd_opt(2022, 1, 1).unwrap(),
            end: NaiveDate::from_ymd_opt(2022, 12, 31).unwrap(),
        });

        let (start, _) = meta.fiscal_year(0).unwrap();
        assert_eq!(start, NaiveDate::from_ymd_opt(2023, 1, 1).unwrap());

        let (start, end) = meta.fiscal_year(-1).unwrap();
        assert_eq!(start, NaiveDate::from_ymd_opt(2022, 1, 1).unwrap());
        assert_eq!(end, NaiveDate::from_ymd_opt(2022, 12, 31).unwrap());

        assert!(meta.fiscal_year(-2).is_none());
    }

    #[test]
    fn test_account_gets_category_label() {
        let account = Account::new("1930", "Företagskonto");
        assert_eq!(account.category, "Kassa och bank");
        let unknown = Account::new("9999", "Internt");
        assert_eq!(unknown.category, "");
    }

    #[test]
    fn test_verification_ids_first_seen_order() {
        let mut doc = Document::new();
        for (series, number) in [("A", "2"), ("A", "1"), ("A", "2"), ("B", "1")] {
            doc.postings.push(Posting {
                series: series.to_string(),
                number: number.to_string(),
                account: "1930".to_string(),
                amount: 0.0,
                date: None,
                text: String::new(),
                quantity: None,
                cost_centre: None,
                project: None,
            });
        }
        let ids = doc.verification_ids();
        assert_eq!(
            ids,
            vec![
                ("A".to_string(), "2".to_string()),
                ("A".to_string(), "1".to_string()),
                ("B".to_string(), "1".to_string()),
            ]
        );
    }
}
