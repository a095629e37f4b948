//! Canonical SIE writer, the inverse of [`crate::parser`].
//!
//! Output is deterministic: identification records first, then the chart of
//! accounts with SRU codes, dimension objects, balances sorted by kind/year/
//! account, and finally verification blocks in first-seen order. Parsing the
//! output reproduces an equivalent document; only formatting artifacts such
//! as trailing-zero stripping differ from arbitrary input.

use crate::document::{BalanceKind, Document, Posting};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt::Write as FmtWrite;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WriteOptions {
    /// Producer name emitted in the #PROGRAM record.
    pub program: String,
    pub program_version: String,
    /// Whether to emit the `#FLAGGA 0` boilerplate record.
    pub include_flag_record: bool,
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self {
            program: "sie-insight".to_string(),
            program_version: env!("CARGO_PKG_VERSION").to_string(),
            include_flag_record: true,
        }
    }
}

/// Two decimals, then trailing zeros and a bare decimal point stripped;
/// negative zero normalizes to `0`.
fn format_amount(amount: f64) -> String {
    let amount = if amount == 0.0 { 0.0 } else { amount };
    let mut s = format!("{:.2}", amount);
    if s == "-0.00" {
        s = "0.00".to_string();
    }
    while s.ends_with('0') {
        s.pop();
    }
    if s.ends_with('.') {
        s.pop();
    }
    s
}

/// Text fields are always quoted, internal quotes escaped by doubling.
fn quote(text: &str) -> String {
    format!("\"{}\"", text.replace('"', "\"\""))
}

fn format_date(date: NaiveDate) -> String {
    date.format("%Y%m%d").to_string()
}

fn balance_label(kind: BalanceKind) -> &'static str {
    match kind {
        BalanceKind::Opening => "#IB",
        BalanceKind::Closing => "#UB",
        BalanceKind::Result => "#RES",
    }
}

fn dimension_tags(posting: &Posting) -> String {
    let mut inner = String::new();
    if let Some(cc) = &posting.cost_centre {
        let _ = write!(inner, "1 {}", quote(cc));
    }
    if let Some(project) = &posting.project {
        if !inner.is_empty() {
            inner.push(' ');
        }
        let _ = write!(inner, "6 {}", quote(project));
    }
    format!("{{{}}}", inner)
}

/// Serializes a document to SIE text.
pub fn write(document: &Document, options: &WriteOptions) -> String {
    let mut out = String::new();
    let meta = &document.metadata;

    if options.include_flag_record {
        out.push_str("#FLAGGA 0\n");
    }
    let _ = writeln!(
        out,
        "#PROGRAM {} {}",
        quote(&options.program),
        options.program_version
    );
    out.push_str("#FORMAT PC8\n");
    if let Some(date) = meta.generated_date {
        let _ = writeln!(out, "#GEN {}", format_date(date));
    }
    if let Some(format_type) = meta.format_type {
        let _ = writeln!(out, "#SIETYP {}", format_type);
    }
    if let Some(orgnr) = &meta.organization_number {
        let _ = writeln!(out, "#ORGNR {}", orgnr);
    }
    let _ = writeln!(out, "#FNAMN {}", quote(&meta.company_name));

    if let (Some(start), Some(end)) = (meta.fiscal_year_start, meta.fiscal_year_end) {
        let _ = writeln!(out, "#RAR 0 {} {}", format_date(start), format_date(end));
    }
    let mut prior_years = meta.prior_fiscal_years.clone();
    prior_years.sort_by_key(|fy| std::cmp::Reverse(fy.year_index));
    for fy in &prior_years {
        let _ = writeln!(
            out,
            "#RAR {} {} {}",
            fy.year_index,
            format_date(fy.start),
            format_date(fy.end)
        );
    }
    let _ = writeln!(out, "#VALUTA {}", meta.currency);
    if let Some(date) = meta.scope_date {
        let _ = writeln!(out, "#OMFATTN {}", format_date(date));
    }

    for account in &document.accounts {
        let _ = writeln!(out, "#KONTO {} {}", account.number, quote(&account.name));
        if let Some(sru) = &account.sru_code {
            let _ = writeln!(out, "#SRU {} {}", account.number, sru);
        }
    }

    for dim in &document.dimensions {
        let _ = writeln!(
            out,
            "#OBJEKT {} {} {}",
            dim.dimension_type,
            quote(&dim.code),
            quote(&dim.name)
        );
    }

    let mut balances: Vec<_> = document.balances.iter().collect();
    balances.sort_by(|a, b| {
        a.kind
            .cmp(&b.kind)
            .then(b.year_index.cmp(&a.year_index))
            .then(a.account.cmp(&b.account))
    });
    for balance in balances {
        let mut line = format!(
            "{} {} {} {}",
            balance_label(balance.kind),
            balance.year_index,
            balance.account,
            format_amount(balance.amount)
        );
        if let Some(quantity) = balance.quantity {
            let _ = write!(line, " {}", format_amount(quantity));
        }
        out.push_str(&line);
        out.push('\n');
    }

    for (series, number) in document.verification_ids() {
        let rows: Vec<&Posting> = document
            .postings
            .iter()
            .filter(|p| p.series == series && p.number == number)
            .collect();
        let first = match rows.first() {
            Some(first) => first,
            None => continue,
        };

        let date = first.date.map(format_date).unwrap_or_default();
        let _ = writeln!(
            out,
            "#VER {} {} {} {}",
            series,
            number,
            date,
            quote(&first.text)
        );
        out.push_str("{\n");
        for row in rows {
            let mut line = format!(
                "#TRANS {} {} {}",
                row.account,
                dimension_tags(row),
                format_amount(row.amount)
            );
            if let Some(row_date) = row.date {
                let _ = write!(line, " {}", format_date(row_date));
            }
            let _ = write!(line, " {}", quote(&row.text));
            if let Some(quantity) = row.quantity {
                let _ = write!(line, " {}", format_amount(quantity));
            }
            out.push_str(&line);
            out.push('\n');
        }
        out.push_str("}\n");
    }

    out
}
