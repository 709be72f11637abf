//! The page and endpoint for editing a transaction.

use std::sync::{Arc, Mutex};

use axum::{
    extract::{FromRef, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use axum_extra::extract::Form;
use axum_htmx::HxRedirect;
use maud::{Markup, html};
use rusqlite::Connection;
use time::Date;

use crate::{
    AppState, Error, endpoints,
    html::{BUTTON_PRIMARY_STYLE, FORM_CONTAINER_STYLE, base, dollar_input_styles},
    navigation::NavBar,
    transaction::{
        Transaction, TransactionId,
        core::{get_transaction, update_transaction},
        form::{
            FormOptions, TransactionFormData, TransactionFormValues, is_form_error, local_today,
            transaction_form_fields, validate_transaction_form,
        },
    },
};

/// The state needed to edit a transaction.
#[derive(Debug, Clone)]
pub struct EditTransactionState {
    /// The local timezone as a canonical timezone name, e.g. "Pacific/Auckland".
    pub local_timezone: String,
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for EditTransactionState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            local_timezone: state.local_timezone.clone(),
            db_connection: state.db_connection.clone(),
        }
    }
}

/// Renders the edit form filled in with the stored transaction.
pub async fn get_edit_transaction_page(
    Path(transaction_id): Path<TransactionId>,
    State(state): State<EditTransactionState>,
) -> Result<Response, Error> {
    let today = local_today(&state.local_timezone)?;

    let connection = state
        .db_connection
        .lock()
        .inspect_err(|error| tracing::error!("could not acquire database lock: {error}"))
        .map_err(|_| Error::DatabaseLockError)?;

    let options = FormOptions::load(&connection)
        .inspect_err(|error| tracing::error!("Failed to load accounts and categories: {error}"))?;

    let edit_endpoint = endpoints::format_endpoint(endpoints::EDIT_TRANSACTION_VIEW, transaction_id);
    let update_endpoint = endpoints::format_endpoint(endpoints::TRANSACTION, transaction_id);

    let (values, error_message, can_submit) = match get_transaction(transaction_id, &connection) {
        Ok(transaction) if has_split_amount(&transaction) => (
            TransactionFormValues::from(&transaction),
            "This transaction has both a debit and a credit, so it cannot be edited.",
            false,
        ),
        Ok(transaction) => (TransactionFormValues::from(&transaction), "", true),
        Err(error) => {
            let error_message = match error {
                Error::NotFound => "Transaction not found",
                _ => {
                    tracing::error!("Failed to retrieve transaction {transaction_id}: {error}");
                    "Failed to load transaction"
                }
            };

            (TransactionFormValues::blank(today), error_message, true)
        }
    };

    let form = edit_transaction_form_view(
        &update_endpoint,
        &values,
        &options,
        today,
        error_message,
        can_submit,
    );
    let nav_bar = NavBar::new(&edit_endpoint).into_html();
    let content = html! {
        (nav_bar)
        div class=(FORM_CONTAINER_STYLE) { (form) }
    };

    Ok(base("Edit Transaction", &[dollar_input_styles()], &content).into_response())
}

fn has_split_amount(transaction: &Transaction) -> bool {
    transaction.debit.is_some() && transaction.credit.is_some()
}

/// Fails unless the stored transaction fits in the edit form.
fn ensure_editable(transaction_id: TransactionId, connection: &Connection) -> Result<(), Error> {
    match get_transaction(transaction_id, connection) {
        Ok(transaction) if has_split_amount(&transaction) => Err(Error::SplitAmountTransaction),
        Ok(_) => Ok(()),
        Err(Error::NotFound) => Err(Error::UpdateMissingTransaction),
        Err(error) => Err(error),
    }
}

/// Replaces every field of the transaction with the submitted form.
pub async fn update_transaction_endpoint(
    Path(transaction_id): Path<TransactionId>,
    State(state): State<EditTransactionState>,
    Form(form): Form<TransactionFormData>,
) -> Response {
    let today = match local_today(&state.local_timezone) {
        Ok(today) => today,
        Err(error) => return error.into_alert_response(),
    };

    let connection = match state.db_connection.lock() {
        Ok(connection) => connection,
        Err(error) => {
            tracing::error!("could not acquire database lock: {error}");
            return Error::DatabaseLockError.into_alert_response();
        }
    };

    let result = ensure_editable(transaction_id, &connection)
        .and_then(|()| validate_transaction_form(&form, today, true, &connection))
        .and_then(|builder| update_transaction(transaction_id, builder, &connection));

    match result {
        Ok(_) => (
            HxRedirect(endpoints::TRANSACTIONS_VIEW.to_owned()),
            StatusCode::SEE_OTHER,
        )
            .into_response(),
        Err(error) if is_form_error(&error) => match FormOptions::load(&connection) {
            Ok(options) => edit_transaction_form_view(
                &endpoints::format_endpoint(endpoints::TRANSACTION, transaction_id),
                &TransactionFormValues::from(&form),
                &options,
                today,
                &format!("Error: {error}"),
                true,
            )
            .into_response(),
            Err(error) => {
                tracing::error!("Failed to load accounts and categories: {error}");
                error.into_alert_response()
            }
        },
        Err(
            error @ (Error::UpdateMissingTransaction
            | Error::SplitAmountTransaction
            | Error::FutureDate(_)
            | Error::InvalidAccount(_)
            | Error::InvalidCategory(_)),
        ) => {
            tracing::warn!("Rejected update to transaction {transaction_id}: {error}");
            error.into_alert_response()
        }
        Err(error) => {
            tracing::error!(
                "An unexpected error occurred while updating transaction {transaction_id}: {error}"
            );
            error.into_alert_response()
        }
    }
}

fn edit_transaction_form_view(
    update_endpoint: &str,
    values: &TransactionFormValues,
    options: &FormOptions,
    max_date: Date,
    error_message: &str,
    can_submit: bool,
) -> Markup {
    html! {
        form
            hx-put=(update_endpoint)
            hx-target-error="#alert-container"
            hx-swap="outerHTML"
            class="w-full space-y-4 md:space-y-6"
        {
            (transaction_form_fields(values, options, max_date, true))

            @if !error_message.is_empty() {
                p class="text-red-600 dark:text-red-400"
                {
                    (error_message)
                }
            }

            button type="submit" disabled[!can_submit] class=(BUTTON_PRIMARY_STYLE)
            {
                "Update Transaction"
            }
        }
    }
}
