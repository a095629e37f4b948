//! # SIE Insight
//!
//! A library for parsing Swedish SIE accounting interchange files and
//! deriving financial KPI snapshots (margins, returns, liquidity, leverage,
//! efficiency, growth) for dashboards and query layers.
//!
//! ## Core Concepts
//!
//! - **Document**: the parsed SIE file, with metadata, chart of accounts,
//!   dimension objects, verification postings and per-year balances
//! - **BAS classification**: account meaning derived from the 4-digit number
//!   (1000s assets, 2000s equity/liabilities, 3000-8999 income statement)
//! - **IB/UB/RES**: opening balance, closing balance and period movement,
//!   carried per account per fiscal year
//! - **Verification**: a balanced group of postings identified by
//!   (series, number); debits and credits sum to zero
//! - **KPI snapshot**: one immutable result of ~45 derived figures, with
//!   annualization applied to period flows when the fiscal year is partial
//!
//! ## Example
//!
//! ```rust,ignore
//! use sie_insight::*;
//!
//! let text = decode_bytes(&raw_bytes)?;
//! let document = parse(&text)?;
//! let kpis = calculate_annual_kpis(&document, 0, &EquityPolicy::default());
//! println!("Net sales: {:.0} {}", kpis.net_sales, document.metadata.currency);
//! let round_tripped = write(&document, &WriteOptions::default());
//! ```

pub mod accounts;
pub mod document;
pub mod encoding;
pub mod error;
pub mod kpi;
pub mod monthly;
pub mod parser;
pub mod selector;
pub mod writer;

pub use accounts::{account_type, classify, is_in_range, AccountCategory, AccountKind};
pub use document::{
    Account, Balance, BalanceKind, Dimension, Document, FiscalYear, Metadata, Posting,
};
pub use encoding::{decode_bytes, detect_encoding, DetectedEncoding};
pub use error::{Result, SieError};
pub use kpi::{calculate_annual_kpis, Annualization, EquityPolicy, KpiResult};
pub use monthly::{calculate_monthly_kpis, MonthlyKpi, MonthlySeries};
pub use parser::{parse, Field, Parser};
pub use selector::{
    calculate_kpis_from_sync, calculate_monthly_kpis_from_sync, select_balances, BalanceSource,
    SelectedBalances, SyncedAccount, Voucher, VoucherEntry,
};
pub use writer::{write, WriteOptions};
