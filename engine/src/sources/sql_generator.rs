//! Natural language to SQL for the fund database
//!
//! The model is asked for a single SQLite SELECT over the N-PORT fund schema.
//! Replies are cleaned of markdown fences and checked to be read-only before
//! they ever reach the database.

use super::SourceError;
use crate::llm::router::LLMRouter;
use crate::llm::{extract_fenced_block, Message};
use regex::Regex;
use std::sync::{Arc, LazyLock};

const SCHEMA_PROMPT: &str = r#"You are an expert SQL generator for a mutual fund database built from SEC N-PORT filings.
Generate one SQLite-compatible SELECT statement that answers the question.

## Schema

fund_reported_info (accession_number PK, series_name, series_id, series_lei, total_assets,
  total_liabilities, net_assets, assets_invested, credit_spread_*_invest, credit_spread_*_noninvest,
  sales_flow_mon1..3, reinvestment_flow_mon1..3, redemption_flow_mon1..3)
registrant (accession_number PK/FK, cik, registrant_name, file_num, lei, city, state, country)
submission (accession_number PK, filing_date, sub_type, report_ending_period, report_date)
fund_reported_holding (accession_number FK, holding_id, issuer_name, issuer_lei, issuer_title,
  issuer_cusip, balance, unit, currency_code, currency_value, percentage (decimal 0-1),
  payoff_profile, asset_cat (EC, EP, DBT, ABS-MBS, ABS-CBDO, ABS-O, STIV, LON, RA, RE, COMM),
  issuer_type, investment_country, fair_value_level, derivative_cat)
identifiers (holding_id FK, identifiers_id, identifier_isin, identifier_ticker, other_identifier)
debt_security (holding_id PK/FK, maturity_date, coupon_type, annualized_rate, is_default)
interest_rate_risk (accession_number FK, interest_rate_risk_id, currency_code,
  intrst_rate_change_{3mon,1yr,5yr,10yr,30yr}_dv01, intrst_rate_change_{3mon,1yr,5yr,10yr,30yr}_dv100)
monthly_total_return (accession_number FK, class_id, monthly_total_return1..3)
securities_lending (holding_id PK/FK, is_loan_by_fund, loan_value)
borrower (accession_number FK, borrower_id, name, lei, aggregate_value)
explanatory_note (accession_number FK, explanatory_note_id, item_no, explanatory_note)
fund_summary VIEW (accession_number, series_name, registrant_name, total_assets, net_assets, holding_count)

Numeric columns are stored as TEXT: use CAST(column AS REAL) for comparisons and ordering.
Join fund tables USING (accession_number) and holding tables ON holding_id.

## Rules
1. Return ONLY the SQL query, no explanations.
2. Always select accession_number and series_name for fund-level rows.
3. Also select holding_id for holding-level rows.
4. Include registrant_name when the manager is relevant.
5. percentage is a decimal (0.05 = 5%); multiply by 100 for display.
6. Use ORDER BY and LIMIT for "top N" questions; otherwise LIMIT 20.
7. Never modify data.

## Examples

Q: Top 5 largest funds
SELECT f.accession_number, f.series_name, r.registrant_name, CAST(f.total_assets AS REAL) AS total_assets
FROM fund_reported_info f
JOIN registrant r USING (accession_number)
ORDER BY CAST(f.total_assets AS REAL) DESC
LIMIT 5

Q: Funds holding Apple stock
SELECT f.accession_number, f.series_name, h.holding_id, h.issuer_name, CAST(h.percentage AS REAL) * 100 AS pct
FROM fund_reported_holding h
JOIN fund_reported_info f USING (accession_number)
WHERE h.issuer_name LIKE '%Apple%' OR h.issuer_cusip = '037833100'
ORDER BY CAST(h.percentage AS REAL) DESC
LIMIT 20

Q: Bond funds with the highest interest rate risk
SELECT f.accession_number, f.series_name, CAST(ir.intrst_rate_change_5yr_dv01 AS REAL) AS dv01_5yr
FROM fund_reported_info f
JOIN interest_rate_risk ir USING (accession_number)
WHERE ir.currency_code = 'USD'
ORDER BY CAST(ir.intrst_rate_change_5yr_dv01 AS REAL) DESC
LIMIT 10

Q: Maturity profile of bonds in PIMCO Income Fund
SELECT f.accession_number, f.series_name, h.holding_id, h.issuer_name, d.maturity_date, CAST(d.annualized_rate AS REAL) AS rate
FROM fund_reported_holding h
JOIN fund_reported_info f USING (accession_number)
JOIN debt_security d ON h.holding_id = d.holding_id
WHERE f.series_name LIKE '%PIMCO Income%'
ORDER BY d.maturity_date
LIMIT 20"#;

/// Statements that can change the database or its connection
static WRITE_KEYWORDS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(insert|update|delete|drop|alter|create|attach|detach|pragma|vacuum|reindex|truncate|grant|revoke)\b")
        .expect("valid write keyword pattern")
});

/// Quoted string literals and identifiers, with SQL's doubled-quote escapes
static QUOTED_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"'(?:[^']|'')*'|"(?:[^"]|"")*""#).expect("valid quoted literal pattern")
});

static READ_PREFIX_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^\s*(select|with)\b").expect("valid read prefix pattern"));

/// Turns questions into read-only SQL via the LLM router
pub struct QueryGenerator {
    router: Arc<LLMRouter>,
}

impl QueryGenerator {
    pub fn new(router: Arc<LLMRouter>) -> Self {
        Self { router }
    }

    /// Generate a single read-only SELECT for the question.
    ///
    /// `hints` come from earlier retrieval stages and are passed to the model
    /// as extra guidance, never spliced into the SQL.
    pub async fn generate(&self, question: &str, hints: &[String]) -> Result<String, SourceError> {
        let mut prompt = question.to_string();
        if !hints.is_empty() {
            prompt.push_str("\nHint: ");
            prompt.push_str(&hints.join("; "));
        }

        let messages = [Message::system(SCHEMA_PROMPT), Message::user(prompt)];
        let (reply, provider) = self
            .router
            .call(&messages)
            .await
            .map_err(|e| SourceError::QueryGeneration(e.to_string()))?;
        tracing::debug!("SQL generated by {}", provider);

        let sql = clean_sql(&reply);
        ensure_read_only(&sql)?;
        Ok(sql)
    }
}

/// Strip markdown fences, surrounding whitespace and a trailing semicolon
pub fn clean_sql(reply: &str) -> String {
    let body = extract_fenced_block(reply).unwrap_or(reply);
    body.trim()
        .trim_start_matches("```sql")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim()
        .trim_end_matches(';')
        .trim()
        .to_string()
}

/// Reject anything that is not a single SELECT / WITH statement
pub fn ensure_read_only(sql: &str) -> Result<(), SourceError> {
    if sql.is_empty() {
        return Err(SourceError::QueryGeneration("empty query".to_string()));
    }
    let code = QUOTED_RE.replace_all(sql, "''");
    if !READ_PREFIX_RE.is_match(&code) || code.contains(';') || WRITE_KEYWORDS_RE.is_match(&code) {
        return Err(SourceError::WriteQueryNotAllowed);
    }
    Ok(())
}
