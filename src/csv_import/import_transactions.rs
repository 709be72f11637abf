use std::sync::{Arc, Mutex};

use axum::{
    extract::{FromRef, Multipart, State, multipart::Field},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use rusqlite::Connection;

use crate::{
    AppState, Error,
    account::AccountId,
    alert::Alert,
    csv_import::ing::{IngParseResult, parse_ing_csv},
    transaction::{create_transactions, get_transactions_in_date_range, is_duplicate_transaction},
};

/// The state needed for importing transactions.
#[derive(Debug, Clone)]
pub struct ImportState {
    /// The database connection for managing transactions.
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for ImportState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
        }
    }
}

/// What happened to the rows of an upload.
#[derive(Debug, Default, PartialEq)]
struct ImportSummary {
    imported: usize,
    duplicates: usize,
    unreadable: usize,
}

impl ImportSummary {
    fn message(&self) -> String {
        let mut message = format!("Successfully imported {} new transactions.", self.imported);

        if self.duplicates > 0 {
            message.push_str(&format!(" {} duplicates were skipped.", self.duplicates));
        }

        if self.unreadable > 0 {
            message.push_str(&format!(" {} rows could not be read.", self.unreadable));
        }

        message
    }
}

/// Route handler for importing ING CSV statements into the selected account.
///
/// Every file is checked for duplicates against the transactions already stored
/// for its date range, including those added by earlier files in the same upload.
/// Either all files are imported or none are.
pub async fn import_transactions(
    State(state): State<ImportState>,
    mut multipart: Multipart,
) -> Result<Response, Response> {
    let start_time = std::time::Instant::now();
    let mut account_id: Option<AccountId> = None;
    let mut statements = Vec::new();

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(error) => {
                tracing::error!("Could not read multipart field: {error}");
                return Err(Error::MultipartError(error.to_string()).into_alert_response());
            }
        };

        match field.name() {
            Some("account_id") => {
                account_id = parse_account_field(field)
                    .await
                    .map_err(Error::into_alert_response)?;
            }
            Some("files") => {
                let csv_data = parse_multipart_field(field)
                    .await
                    .inspect_err(|error| tracing::warn!("Rejected uploaded file: {error}"))
                    .map_err(Error::into_alert_response)?;

                let statement = parse_ing_csv(&csv_data)
                    .inspect_err(|error| tracing::debug!("Failed to parse CSV: {error}"))
                    .map_err(Error::into_alert_response)?;

                statements.push(statement);
            }
            name => tracing::debug!("Ignoring unexpected multipart field {name:?}"),
        }
    }

    let Some(account_id) = account_id else {
        tracing::warn!("Rejected import without an account");
        return Err(Error::NoAccountSelected.into_alert_response());
    };

    let connection = state.db_connection.lock().map_err(|error| {
        tracing::error!("could not acquire database lock: {error}");
        Error::DatabaseLockError.into_alert_response()
    })?;

    let tx = connection
        .unchecked_transaction()
        .inspect_err(|error| tracing::error!("could not start transaction: {error}"))
        .map_err(|_| {
            Alert::ErrorSimple {
                message: "Could not import transactions".to_owned(),
            }
            .into_response()
        })?;

    let summary = import_statements(statements, account_id, &tx).map_err(|error| match error {
        Error::InvalidAccount(_) => error.into_alert_response(),
        error => {
            tracing::error!("Failed to import transactions: {error}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Alert::Error {
                    message: "Import failed".to_owned(),
                    details: "An unexpected error occurred, please try again later".to_owned(),
                }
                .into_html(),
            )
                .into_response()
        }
    })?;

    tx.commit()
        .inspect_err(|error| tracing::error!("could not commit transaction: {error}"))
        .map_err(|_| {
            Alert::ErrorSimple {
                message: "Could not import transactions".to_owned(),
            }
            .into_response()
        })?;

    tracing::info!(
        "Imported {} transactions into account {account_id} in {}ms ({} duplicates, {} unreadable rows)",
        summary.imported,
        start_time.elapsed().as_millis(),
        summary.duplicates,
        summary.unreadable,
    );

    Ok((
        StatusCode::CREATED,
        Alert::SuccessSimple {
            message: summary.message(),
        }
        .into_html(),
    )
        .into_response())
}

async fn parse_account_field(field: Field<'_>) -> Result<Option<AccountId>, Error> {
    let text = field.text().await.map_err(|error| {
        tracing::error!("Could not read account from multipart form: {error}");
        Error::MultipartError("Could not read the selected account.".to_owned())
    })?;
    let text = text.trim();

    if text.is_empty() {
        return Ok(None);
    }

    text.parse().map(Some).map_err(|_| {
        tracing::warn!("Rejected import with account ID {text:?}");
        Error::InvalidAccount(None)
    })
}

async fn parse_multipart_field(field: Field<'_>) -> Result<String, Error> {
    if field.content_type() != Some("text/csv") {
        return Err(Error::NotCSV);
    }

    let file_name = field.file_name().unwrap_or("<unnamed>").to_owned();
    let data = field.text().await.map_err(|error| {
        tracing::error!("Could not read data from multipart form field: {error}");
        Error::MultipartError("Could not read data from multipart form field.".to_owned())
    })?;

    tracing::debug!("Received file '{}' that is {} bytes", file_name, data.len());

    Ok(data)
}

/// Insert the rows of each statement in order, skipping rows that duplicate stored transactions.
///
/// Rows in the same statement are never compared with each other.
///
/// **Note**: pass in a transaction for `connection` to get all-or-nothing semantics.
fn import_statements(
    statements: Vec<IngParseResult>,
    account_id: AccountId,
    connection: &Connection,
) -> Result<ImportSummary, Error> {
    let mut summary = ImportSummary::default();

    for statement in statements {
        summary.unreadable += statement.skipped_rows;

        let Some((start, end)) = statement.date_range() else {
            continue;
        };
        let existing = get_transactions_in_date_range(start, end, connection)?;

        let (duplicates, new_transactions): (Vec<_>, Vec<_>) = statement
            .transactions
            .into_iter()
            .map(|transaction| transaction.account_id(Some(account_id)))
            .partition(|transaction| is_duplicate_transaction(transaction, existing.as_slice()));

        summary.duplicates += duplicates.len();
        summary.imported += create_transactions(new_transactions, connection)?.len();
    }

    Ok(summary)
}
