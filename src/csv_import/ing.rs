//! Parses CSV statements exported from ING internet banking.
//!
//! The export has a header row naming at least `Date` and `Description`, and
//! usually `Credit` and `Debit`. Columns may appear in any order and unknown
//! columns are ignored.

use csv::{ReaderBuilder, StringRecord};
use time::Date;

use crate::{
    Error,
    dates::parse_dd_mm_yyyy,
    transaction::{Transaction, TransactionBuilder},
};

/// The transactions read from one statement.
#[derive(Debug, PartialEq)]
pub struct IngParseResult {
    /// One builder per readable row, in file order. None of them have an account yet.
    pub transactions: Vec<TransactionBuilder>,
    /// Rows that were dropped because the date or description was missing or unreadable.
    pub skipped_rows: usize,
}

impl IngParseResult {
    /// The earliest and latest transaction dates, or `None` if there are no transactions.
    pub fn date_range(&self) -> Option<(Date, Date)> {
        let dates = self.transactions.iter().map(|transaction| transaction.date);
        let start = dates.clone().min()?;
        let end = dates.max()?;

        Some((start, end))
    }
}

/// Column positions found in the header row.
struct IngColumns {
    date: usize,
    description: usize,
    credit: Option<usize>,
    debit: Option<usize>,
}

impl IngColumns {
    fn from_headers(headers: &StringRecord) -> Result<Self, Error> {
        let position = |name: &str| headers.iter().position(|header| header.trim() == name);

        let date = position("Date")
            .ok_or_else(|| Error::InvalidCSV("missing the \"Date\" column".to_owned()))?;
        let description = position("Description")
            .ok_or_else(|| Error::InvalidCSV("missing the \"Description\" column".to_owned()))?;

        Ok(Self {
            date,
            description,
            credit: position("Credit"),
            debit: position("Debit"),
        })
    }
}

/// Parse an ING CSV statement.
///
/// Rows without a date or description, or with a date that is not `DD-MM-YYYY`,
/// are skipped and counted in [IngParseResult::skipped_rows].
///
/// # Errors
/// Returns [Error::InvalidCSV] if the header row lacks `Date` or `Description`,
/// or if the text is not valid CSV.
pub fn parse_ing_csv(text: &str) -> Result<IngParseResult, Error> {
    let mut reader = ReaderBuilder::new()
        .flexible(true)
        .from_reader(text.as_bytes());

    let headers = reader
        .headers()
        .map_err(|error| Error::InvalidCSV(error.to_string()))?
        .clone();
    let columns = IngColumns::from_headers(&headers)?;

    let mut transactions = Vec::new();
    let mut skipped_rows = 0;

    for (row_index, record) in reader.records().enumerate() {
        let record = record.map_err(|error| Error::InvalidCSV(error.to_string()))?;

        match parse_row(&record, &columns) {
            Some(transaction) => transactions.push(transaction),
            None => {
                tracing::warn!("Skipping row {} of ING statement: {record:?}", row_index + 1);
                skipped_rows += 1;
            }
        }
    }

    Ok(IngParseResult {
        transactions,
        skipped_rows,
    })
}

fn parse_row(record: &StringRecord, columns: &IngColumns) -> Option<TransactionBuilder> {
    let field = |index: usize| record.get(index).map(str::trim).unwrap_or_default();

    let raw_date = field(columns.date);
    let description = field(columns.description);

    if raw_date.is_empty() || description.is_empty() {
        return None;
    }

    let date = parse_dd_mm_yyyy(raw_date).ok()?;
    let amount = |column: Option<usize>| column.and_then(|index| parse_amount(field(index)));

    Some(
        Transaction::build(date, description)
            .credit(amount(columns.credit))
            .debit(amount(columns.debit)),
    )
}

/// Blank, unreadable and zero amounts are treated as absent.
///
/// ING writes debits with a leading minus sign, the sign is dropped because the
/// column already says which way the money went.
fn parse_amount(text: &str) -> Option<f64> {
    let amount: f64 = text.replace(',', "").parse().ok()?;

    if !amount.is_finite() || amount == 0.0 {
        return None;
    }

    Some(amount.abs())
}
