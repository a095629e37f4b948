//! Parser for the SIE interchange format.
//!
//! SIE is line oriented: every record line starts with a `#` label followed
//! by whitespace-separated fields, where double-quoted substrings form one
//! field (with `""` escaping a literal quote) and `{...}` groups are captured
//! whole for dimension tags. Verifications span multiple lines between
//! literal `{` / `}` lines.
//!
//! Real-world exports are frequently slightly non-conformant, so only
//! structural problems (unterminated quote or brace, unclosed verification
//! block) abort the parse. Missing or malformed optional fields fall back to
//! documented defaults, and unknown record labels are skipped for forward
//! compatibility.

use crate::document::{
    Account, Balance, BalanceKind, Dimension, Document, FiscalYear, Posting,
    DIMENSION_COST_CENTRE, DIMENSION_PROJECT,
};
use crate::error::{Result, SieError};
use chrono::NaiveDate;
use log::{debug, info};

/// One tokenized field of a record line. Keeping the token kind explicit lets
/// the posting-row heuristics distinguish a quoted empty text from absent
/// fields and a bare numeric token from quoted text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Field {
    Quoted(String),
    Braced(String),
    Bare(String),
}

impl Field {
    pub fn text(&self) -> &str {
        match self {
            Field::Quoted(s) | Field::Braced(s) | Field::Bare(s) => s,
        }
    }
}

/// Splits one record line into fields. Whitespace separates fields except
/// inside `"..."` (where `""` decodes to one `"`) and inside `{...}`.
pub fn tokenize_line(line: &str, line_no: usize) -> Result<Vec<Field>> {
    let mut fields = Vec::new();
    let mut chars = line.chars().peekable();

    while let Some(&c) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
            continue;
        }

        if c == '"' {
            chars.next();
            let mut value = String::new();
            let mut closed = false;
            while let Some(ch) = chars.next() {
                if ch == '"' {
                    if chars.peek() == Some(&'"') {
                        chars.next();
                        value.push('"');
                    } else {
                        closed = true;
                        break;
                    }
                } else {
                    value.push(ch);
                }
            }
            if !closed {
                return Err(SieError::Parse {
                    line: line_no,
                    message: "unterminated quoted field".to_string(),
                });
            }
            fields.push(Field::Quoted(value));
        } else if c == '{' {
            chars.next();
            let mut value = String::new();
            let mut closed = false;
            for ch in chars.by_ref() {
                if ch == '}' {
                    closed = true;
                    break;
                }
                value.push(ch);
            }
            if !closed {
                return Err(SieError::Parse {
                    line: line_no,
                    message: "unterminated brace group".to_string(),
                });
            }
            fields.push(Field::Braced(value.trim().to_string()));
        } else {
            let mut value = String::new();
            while let Some(&ch) = chars.peek() {
                if ch.is_whitespace() || ch == '"' || ch == '{' {
                    break;
                }
                value.push(ch);
                chars.next();
            }
            fields.push(Field::Bare(value));
        }
    }

    Ok(fields)
}

/// Signed amount with the format's lenient numeric rules: empty or
/// unparsable amounts read as zero, and negative zero folds to zero.
fn parse_amount(raw: &str) -> f64 {
    let value = raw.trim().replace(',', ".").parse::<f64>().unwrap_or(0.0);
    if value == 0.0 {
        0.0
    } else {
        value
    }
}

/// SIE dates are 8-digit YYYYMMDD tokens.
fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if raw.len() != 8 || !raw.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    NaiveDate::parse_from_str(raw, "%Y%m%d").ok()
}

fn is_date_token(raw: &str) -> bool {
    raw.len() == 8 && raw.chars().all(|c| c.is_ascii_digit())
}

/// Short bare integers in posting trailing fields are column padding, not a
/// quantity or date. The cutoff of 100 matches the format's installed base.
fn is_filler_token(raw: &str) -> bool {
    match raw.trim().parse::<f64>() {
        Ok(v) => v.fract() == 0.0 && v.abs() <= 100.0,
        Err(_) => false,
    }
}

struct VerificationContext {
    series: String,
    number: String,
    date: Option<NaiveDate>,
    text: String,
}

pub struct Parser {
    document: Document,
    // SRU records may precede or follow the matching #KONTO; reconciled in a
    // post-pass over this list.
    pending_sru: Vec<(String, String)>,
    verification: Option<VerificationContext>,
    verification_line: usize,
    in_block: bool,
}

impl Parser {
    pub fn new() -> Self {
        Self {
            document: Document::new(),
            pending_sru: Vec::new(),
            verification: None,
            verification_line: 0,
            in_block: false,
        }
    }

    pub fn parse(mut self, text: &str) -> Result<Document> {
        for (idx, raw_line) in text.lines().enumerate() {
            let line_no = idx + 1;
            let line = raw_line.trim();

            if line == "{" {
                if self.verification.is_some() {
                    self.in_block = true;
                }
                continue;
            }
            if line == "}" {
                self.in_block = false;
                self.verification = None;
                continue;
            }
            if !line.starts_with('#') {
                continue;
            }

            let fields = tokenize_line(line, line_no)?;
            self.handle_record(&fields, line_no)?;
        }

        if self.verification.is_some() && self.in_block {
            return Err(SieError::Parse {
                line: self.verification_line,
                message: "verification block is never closed".to_string(),
            });
        }

        self.attach_sru_codes();
        self.document.metadata.validate()?;

        info!(
            "Parsed SIE document for '{}': {} accounts, {} balances, {} postings",
            self.document.metadata.company_name,
            self.document.accounts.len(),
            self.document.balances.len(),
            self.document.postings.len()
        );

        Ok(self.document)
    }

    fn handle_record(&mut self, fields: &[Field], line_no: usize) -> Result<()> {
        let label = fields[0].text().trim_start_matches('#').to_uppercase();

        match label.as_str() {
            "FNAMN" => {
                self.document.metadata.company_name = field_text(fields, 1);
            }
            "VALUTA" => {
                let currency = field_text(fields, 1);
                if !currency.is_empty() {
                    self.document.metadata.currency = currency;
                }
            }
            "GEN" => {
                self.document.metadata.generated_date =
                    fields.get(1).and_then(|f| parse_date(f.text()));
            }
            "SIETYP" => {
                self.document.metadata.format_type =
                    fields.get(1).and_then(|f| f.text().trim().parse().ok());
            }
            "ORGNR" => {
                let orgnr = field_text(fields, 1);
                if !orgnr.is_empty() {
                    self.document.metadata.organization_number = Some(orgnr);
                }
            }
            "OMFATTN" => {
                self.document.metadata.scope_date =
                    fields.get(1).and_then(|f| parse_date(f.text()));
            }
            "RAR" => self.handle_fiscal_year(fields),
            "KONTO" => {
                let number = field_text(fields, 1);
                if !number.is_empty() {
                    self.document
                        .accounts
                        .push(Account::new(number, field_text(fields, 2)));
                }
            }
            "SRU" => {
                let account = field_text(fields, 1);
                let code = field_text(fields, 2);
                if !account.is_empty() && !code.is_empty() {
                    self.pending_sru.push((account, code));
                }
            }
            "OBJEKT" => {
                let dimension_type = fields
                    .get(1)
                    .and_then(|f| f.text().trim().parse().ok())
                    .unwrap_or(0);
                self.document.dimensions.push(Dimension {
                    dimension_type,
                    code: field_text(fields, 2),
                    name: field_text(fields, 3),
                });
            }
            "IB" => self.handle_balance(fields, BalanceKind::Opening),
            "UB" => self.handle_balance(fields, BalanceKind::Closing),
            "RES" => self.handle_balance(fields, BalanceKind::Result),
            "VER" => {
                self.verification = Some(VerificationContext {
                    series: field_text(fields, 1),
                    number: field_text(fields, 2),
                    date: fields.get(3).and_then(|f| parse_date(f.text())),
                    text: field_text(fields, 4),
                });
                self.verification_line = line_no;
                self.in_block = false;
            }
            "TRANS" => {
                if self.in_block {
                    self.handle_posting(fields);
                } else {
                    debug!("Ignoring #TRANS outside a verification block on line {}", line_no);
                }
            }
            // Unknown labels are ignored rather than rejected so newer
            // producers do not break older consumers.
            _ => {
                debug!("Skipping unrecognized record #{} on line {}", label, line_no);
            }
        }

        Ok(())
    }

    fn handle_fiscal_year(&mut self, fields: &[Field]) {
        let year_index: i32 = fields
            .get(1)
            .and_then(|f| f.text().trim().parse().ok())
            .unwrap_or(0);
        let start = fields.get(2).and_then(|f| parse_date(f.text()));
        let end = fields.get(3).and_then(|f| parse_date(f.text()));

        if year_index == 0 {
            self.document.metadata.fiscal_year_start = start;
            self.document.metadata.fiscal_year_end = end;
        } else if let (Some(start), Some(end)) = (start, end) {
            self.document.metadata.prior_fiscal_years.push(FiscalYear {
                year_index,
                start,
                end,
            });
        }
    }

    fn handle_balance(&mut self, fields: &[Field], kind: BalanceKind) {
        let year_index: i32 = fields
            .get(1)
            .and_then(|f| f.text().trim().parse().ok())
            .unwrap_or(0);
        let account = field_text(fields, 2);
        if account.is_empty() {
            return;
        }
        let amount = parse_amount(fields.get(3).map(|f| f.text()).unwrap_or(""));
        let quantity = fields.get(4).and_then(|f| f.text().trim().parse().ok());

        self.document.balances.push(Balance {
            kind,
            year_index,
            account,
            amount,
            quantity,
        });
    }

    fn handle_posting(&mut self, fields: &[Field]) {
        let context = match &self.verification {
            Some(context) => context,
            None => return,
        };

        let account = field_text(fields, 1);
        if account.is_empty() {
            return;
        }

        // The object list field is optional in the wild; when present it is
        // always the braced field directly after the account number.
        let (cost_centre, project, amount_idx) = match fields.get(2) {
            Some(Field::Braced(inner)) => {
                let (cc, proj) = parse_dimension_tags(inner);
                (cc, proj, 3)
            }
            _ => (None, None, 2),
        };

        let amount = parse_amount(fields.get(amount_idx).map(|f| f.text()).unwrap_or(""));

        let mut date = None;
        let mut text = None;
        let mut quantity = None;
        for field in fields.iter().skip(amount_idx + 1) {
            match field {
                Field::Quoted(s) => {
                    if text.is_none() && !s.is_empty() {
                        text = Some(s.clone());
                    }
                }
                Field::Bare(s) => {
                    if date.is_none() && is_date_token(s) {
                        date = parse_date(s);
                    } else if is_filler_token(s) {
                        // Padding column, not a value.
                    } else if quantity.is_none() {
                        if let Ok(q) = s.trim().parse::<f64>() {
                            quantity = Some(q);
                        }
                    }
                }
                Field::Braced(_) => {}
            }
        }

        self.document.postings.push(Posting {
            series: context.series.clone(),
            number: context.number.clone(),
            account,
            amount,
            date: date.or(context.date),
            text: text.unwrap_or_else(|| context.text.clone()),
            quantity,
            cost_centre,
            project,
        });
    }

    fn attach_sru_codes(&mut self) {
        for (account, code) in self.pending_sru.drain(..) {
            if let Some(entry) = self
                .document
                .accounts
                .iter_mut()
                .find(|a| a.number == account)
            {
                entry.sru_code = Some(code);
            }
        }
    }
}

impl Default for Parser {
    fn default() -> Self {
        Self::new()
    }
}

fn field_text(fields: &[Field], idx: usize) -> String {
    fields.get(idx).map(|f| f.text().to_string()).unwrap_or_default()
}

/// Decodes the `{dim code dim code ...}` object list on a posting row into
/// the two dimension axes the KPI layer cares about.
fn parse_dimension_tags(inner: &str) -> (Option<String>, Option<String>) {
    let fields = match tokenize_line(inner, 0) {
        Ok(fields) => fields,
        Err(_) => return (None, None),
    };

    let mut cost_centre = None;
    let mut project = None;
    let mut pairs = fields.chunks_exact(2);
    for pair in &mut pairs {
        let dim: u32 = match pair[0].text().trim().parse() {
            Ok(d) => d,
            Err(_) => continue,
        };
        let code = pair[1].text().to_string();
        match dim {
            DIMENSION_COST_CENTRE => cost_centre = Some(code),
            DIMENSION_PROJECT => project = Some(code),
            _ => {}
        }
    }

    (cost_centre, project)
}

/// Parses SIE text into a [`Document`].
pub fn parse(text: &str) -> Result<Document> {
    Parser::new().parse(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokenize_bare_and_quoted() {
        let fields = tokenize_line("#KONTO 1930 \"Företagskonto\"", 1).unwrap();
        assert_eq!(
            fields,
            vec![
                Field::Bare("#KONTO".to_string()),
                Field::Bare("1930".to_string()),
                Field::Quoted("Företagskonto".to_string()),
            ]
        );
    }

    #[test]
    fn test_tokenize_doubled_quote_escape() {
        let fields = tokenize_line("#FNAMN \"Bolaget \"\"Alfa\"\" AB\"", 1).unwrap();
        assert_eq!(fields[1], Field::Quoted("Bolaget \"Alfa\" AB".to_string()));
    }

    #[test]
    fn test_tokenize_braced_group_keeps_whitespace() {
        let fields = tokenize_line("#TRANS 3010 {1 \"100\" 6 \"P1\"} -500", 1).unwrap();
        assert_eq!(fields[2], Field::Braced("1 \"100\" 6 \"P1\"".to_string()));
    }

    #[test]
    fn test_tokenize_unterminated_quote_fails() {
        let err = tokenize_line("#FNAMN \"Oavslutat", 7).unwrap_err();
        match err {
            SieError::Parse { line, .. } => assert_eq!(line, 7),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_tokenize_unterminated_brace_fails() {
        assert!(tokenize_line("#TRANS 3010 {1 \"100\" -500", 3).is_err());
    }

    #[test]
    fn test_parse_amount_defaults() {
        assert_eq!(parse_amount("100.50"), 100.5);
        assert_eq!(parse_amount("-0.00"), 0.0);
        assert_eq!(parse_amount(""), 0.0);
        assert_eq!(parse_amount("garbage"), 0.0);
    }

    #[test]
    fn test_parse_metadata_records() {
        let text = "\
#FLAGGA 0
#FNAMN \"Exempelbolaget AB\"
#ORGNR 556677-8899
#VALUTA SEK
#SIETYP 4
#GEN 20240115
#RAR 0 20230101 20231231
#RAR -1 20220101 20221231
#OMFATTN 20231231
";
        let doc = parse(text).unwrap();
        assert_eq!(doc.metadata.company_name, "Exempelbolaget AB");
        assert_eq!(doc.metadata.organization_number.as_deref(), Some("556677-8899"));
        assert_eq!(doc.metadata.format_type, Some(4));
        assert_eq!(
            doc.metadata.fiscal_year_start,
            NaiveDate::from_ymd_opt(2023, 1, 1)
        );
        assert_eq!(
            doc.metadata.fiscal_year_end,
            NaiveDate::from_ymd_opt(2023, 12, 31)
        );
        assert_eq!(doc.metadata.prior_fiscal_years.len(), 1);
        assert_eq!(doc.metadata.prior_fiscal_years[0].year_index, -1);
        assert_eq!(
            doc.metadata.scope_date,
            NaiveDate::from_ymd_opt(2023, 12, 31)
        );
    }

    #[test]
    fn test_parse_accounts_with_sru_in_either_order() {
        let text = "\
#SRU 1930 7281
#KONTO 1930 \"Företagskonto\"
#KONTO 3010 \"Försäljning\"
#SRU 3010 7410
";
        let doc = parse(text).unwrap();
        assert_eq!(doc.account("1930").unwrap().sru_code.as_deref(), Some("7281"));
        assert_eq!(doc.account("3010").unwrap().sru_code.as_deref(), Some("7410"));
    }

    #[test]
    fn test_parse_balances() {
        let text = "\
#IB 0 1930 100000.00
#UB 0 1930 150000.00
#RES 0 3010 -500000.00
#UB -1 1930 100000.00 2.5
";
        let doc = parse(text).unwrap();
        assert_eq!(doc.balances.len(), 4);
        let ib = &doc.balances[0];
        assert_eq!(ib.kind, BalanceKind::Opening);
        assert_eq!(ib.year_index, 0);
        assert_eq!(ib.amount, 100000.0);
        let prior = &doc.balances[3];
        assert_eq!(prior.year_index, -1);
        assert_eq!(prior.quantity, Some(2.5));
    }

    #[test]
    fn test_parse_verification_block() {
        let text = "\
#VER A 1 20230315 \"Kundfaktura 1001\"
{
#TRANS 1510 {} 125000.00
#TRANS 3010 {} -100000.00
#TRANS 2611 {} -25000.00
}
";
        let doc = parse(text).unwrap();
        assert_eq!(doc.postings.len(), 3);
        let first = &doc.postings[0];
        assert_eq!(first.series, "A");
        assert_eq!(first.number, "1");
        assert_eq!(first.account, "1510");
        assert_eq!(first.amount, 125000.0);
        assert_eq!(first.date, NaiveDate::from_ymd_opt(2023, 3, 15));
        assert_eq!(first.text, "Kundfaktura 1001");

        let sum: f64 = doc.postings.iter().map(|p| p.amount).sum();
        assert!(sum.abs() < 0.01);
    }

    #[test]
    fn test_posting_overrides_and_filler_heuristic() {
        let text = "\
#VER A 7 20230601 \"Lön juni\"
{
#TRANS 7010 {1 \"100\"} 30000.00 20230625 \"Lön Anna\"
#TRANS 1930 {} -30000.00 0
#TRANS 5010 {} 0 3 250.5
}
";
        let doc = parse(text).unwrap();

        let wages = &doc.postings[0];
        assert_eq!(wages.date, NaiveDate::from_ymd_opt(2023, 6, 25));
        assert_eq!(wages.text, "Lön Anna");
        assert_eq!(wages.cost_centre.as_deref(), Some("100"));

        // Bare `0` is padding: the row keeps the verification defaults.
        let bank = &doc.postings[1];
        assert_eq!(bank.date, NaiveDate::from_ymd_opt(2023, 6, 1));
        assert_eq!(bank.text, "Lön juni");
        assert_eq!(bank.quantity, None);

        // `3` is filler but `250.5` is a real quantity.
        let other = &doc.postings[2];
        assert_eq!(other.quantity, Some(250.5));
    }

    #[test]
    fn test_unknown_labels_ignored() {
        let text = "\
#PROGRAM \"Bokföringsprogrammet\" 1.2
#FNAMN \"AB\"
#NYTTFALT foo bar
";
        let doc = parse(text).unwrap();
        assert_eq!(doc.metadata.company_name, "AB");
    }

    #[test]
    fn test_unclosed_verification_block_fails() {
        let text = "\
#VER A 1 20230315 \"Halvfärdig\"
{
#TRANS 1930 {} 100.00
";
        let err = parse(text).unwrap_err();
        match err {
            SieError::Parse { line, .. } => assert_eq!(line, 1),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_inverted_fiscal_year_fails() {
        let text = "#RAR 0 20231231 20230101\n";
        assert!(matches!(
            parse(text),
            Err(SieError::InvalidFiscalYear { .. })
        ));

        let text = "#RAR 0 20230101 20231231\n#RAR -1 20221231 20220101\n";
        assert!(matches!(
            parse(text),
            Err(SieError::InvalidFiscalYear { .. })
        ));
    }

    #[test]
    fn test_project_dimension_tag() {
        let text = "\
#VER B 12 20230901 \"Projektinköp\"
{
#TRANS 4010 {6 \"P42\"} 8000.00
#TRANS 1930 {6 \"P42\"} -8000.00
}
";
        let doc = parse(text).unwrap();
        assert_eq!(doc.postings[0].project.as_deref(), Some("P42"));
        assert_eq!(doc.postings[0].cost_centre, None);
    }
}
