//! The page and endpoint for entering a transaction by hand.

use std::sync::{Arc, Mutex};

use axum::{
    extract::{FromRef, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
// Must use axum_extra's Form since that parses an empty string as None instead
// of crashing like axum::Form.
use axum_extra::extract::Form;
use axum_htmx::HxRedirect;
use maud::{Markup, html};
use rusqlite::Connection;
use time::Date;

use crate::{
    AppState, Error, endpoints,
    html::{BUTTON_PRIMARY_STYLE, FORM_CONTAINER_STYLE, LINK_STYLE, base, dollar_input_styles},
    navigation::NavBar,
    transaction::{
        core::create_transaction,
        form::{
            FormOptions, TransactionFormData, TransactionFormValues, is_form_error, local_today,
            transaction_form_fields, validate_transaction_form,
        },
    },
};

/// The state needed for the new transaction page and endpoint.
#[derive(Debug, Clone)]
pub struct CreateTransactionState {
    /// The local timezone as a canonical timezone name, e.g. "Pacific/Auckland".
    pub local_timezone: String,
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for CreateTransactionState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            local_timezone: state.local_timezone.clone(),
            db_connection: state.db_connection.clone(),
        }
    }
}

/// Renders the page for creating a transaction.
pub async fn get_new_transaction_page(
    State(state): State<CreateTransactionState>,
) -> Result<Response, Error> {
    let today = local_today(&state.local_timezone)?;

    let connection = state
        .db_connection
        .lock()
        .inspect_err(|error| tracing::error!("could not acquire database lock: {error}"))
        .map_err(|_| Error::DatabaseLockError)?;

    let options = FormOptions::load(&connection)
        .inspect_err(|error| tracing::error!("Failed to load accounts and categories: {error}"))?;

    Ok(new_transaction_view(&options, today).into_response())
}

/// A route handler for creating a new transaction, redirects to transactions view on success.
pub async fn create_transaction_endpoint(
    State(state): State<CreateTransactionState>,
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

    let result = validate_transaction_form(&form, today, false, &connection)
        .and_then(|builder| create_transaction(builder, &connection));

    match result {
        Ok(_) => (
            HxRedirect(endpoints::TRANSACTIONS_VIEW.to_owned()),
            StatusCode::SEE_OTHER,
        )
            .into_response(),
        Err(error) if is_form_error(&error) => match FormOptions::load(&connection) {
            Ok(options) => new_transaction_form_view(
                &TransactionFormValues::from(&form),
                &options,
                today,
                &format!("Error: {error}"),
            )
            .into_response(),
            Err(error) => {
                tracing::error!("Failed to load accounts and categories: {error}");
                error.into_alert_response()
            }
        },
        Err(
            error @ (Error::FutureDate(_) | Error::InvalidAccount(_) | Error::InvalidCategory(_)),
        ) => {
            tracing::warn!("Rejected new transaction: {error}");
            error.into_alert_response()
        }
        Err(error) => {
            tracing::error!("An unexpected error occurred while creating a transaction: {error}");
            error.into_alert_response()
        }
    }
}

fn new_transaction_view(options: &FormOptions, today: Date) -> Markup {
    let nav_bar = NavBar::new(endpoints::NEW_TRANSACTION_VIEW).into_html();
    let form = new_transaction_form_view(&TransactionFormValues::blank(today), options, today, "");

    let content = html! {
        (nav_bar)

        div class=(FORM_CONTAINER_STYLE)
        {
            @if options.accounts.is_empty() {
                div class="mb-4 text-sm text-gray-600 dark:text-gray-400"
                {
                    "You need an account before adding transactions. "
                    a href=(endpoints::NEW_ACCOUNT_VIEW) class=(LINK_STYLE) { "Add an account" }
                }
            }

            (form)
        }
    };

    base("Add Transaction", &[dollar_input_styles()], &content)
}

fn new_transaction_form_view(
    values: &TransactionFormValues,
    options: &FormOptions,
    max_date: Date,
    error_message: &str,
) -> Markup {
    html! {
        form
            hx-post=(endpoints::TRANSACTIONS_API)
            hx-target-error="#alert-container"
            hx-swap="outerHTML"
            class="w-full space-y-4 md:space-y-6"
        {
            (transaction_form_fields(values, options, max_date, false))

            @if !error_message.is_empty() {
                p class="text-red-600 dark:text-red-400"
                {
                    (error_message)
                }
            }

            button type="submit" class=(BUTTON_PRIMARY_STYLE) { "Add Transaction" }
        }
    }
}


#[cfg(test)]
mod create_transaction_endpoint_tests {
    use std::sync::{Arc, Mutex};

    use axum::{extract::State, http::StatusCode, response::IntoResponse};
    use axum_extra::extract::Form;
    use rusqlite::Connection;
    use time::{Duration, OffsetDateTime};

    use crate::{
        account::{NewAccountMap, create_account_map},
        db::initialize,
        endpoints,
        test_utils::{
            assert_form_error_message, assert_hx_redirect, assert_valid_html, must_get_form,
            parse_html_fragment,
        },
        transaction::{
            Transaction, count_transactions, create_transaction_endpoint,
            form::{TransactionFormData, TransactionType},
            get_transaction,
        },
    };

    use super::CreateTransactionState;

    fn get_state() -> (CreateTransactionState, i64) {
        let connection = Connection::open_in_memory().unwrap();
        initialize(&connection).unwrap();
        let account =
            create_account_map(&NewAccountMap::new("1234", "Everyday").unwrap(), &connection)
                .unwrap();

        (
            CreateTransactionState {
                local_timezone: "Etc/UTC".to_owned(),
                db_connection: Arc::new(Mutex::new(connection)),
            },
            account.id,
        )
    }

    fn form(account_id: i64) -> TransactionFormData {
        TransactionFormData {
            date: OffsetDateTime::now_utc().date(),
            description: "Coffee".to_owned(),
            amount: 4.5,
            transaction_type: TransactionType::Debit,
            account_id: Some(account_id),
            category_1_id: None,
            category_2_id: None,
            is_work: true,
            notes: None,
        }
    }

    #[tokio::test]
    async fn can_create_transaction() {
        let (state, account_id) = get_state();

        let response = create_transaction_endpoint(State(state.clone()), Form(form(account_id)))
            .await
            .into_response();

        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_hx_redirect(&response, endpoints::TRANSACTIONS_VIEW);
        let got = get_transaction(1, &state.db_connection.lock().unwrap()).unwrap();
        assert_eq!(
            got,
            Transaction {
                id: 1,
                date: OffsetDateTime::now_utc().date(),
                description: "Coffee".to_owned(),
                debit: Some(4.5),
                credit: None,
                account_id: Some(account_id),
                category_1_id: None,
                category_2_id: None,
                is_work: true,
                notes: None,
            }
        );
    }

    #[tokio::test]
    async fn missing_account_renders_form_error() {
        let (state, account_id) = get_state();
        let form = TransactionFormData {
            account_id: None,
            ..form(account_id)
        };

        let response = create_transaction_endpoint(State(state.clone()), Form(form))
            .await
            .into_response();

        assert_eq!(response.status(), StatusCode::OK);
        let html = parse_html_fragment(response).await;
        assert_valid_html(&html);
        let form = must_get_form(&html);
        assert_form_error_message(&form, "Error: Account is required.");
        assert_eq!(count_transactions(&state.db_connection.lock().unwrap()), Ok(0));
    }

    #[tokio::test]
    async fn future_date_is_bad_request() {
        let (state, account_id) = get_state();
        let form = TransactionFormData {
            date: OffsetDateTime::now_utc().date() + Duration::days(2),
            ..form(account_id)
        };

        let response = create_transaction_endpoint(State(state.clone()), Form(form))
            .await
            .into_response();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(count_transactions(&state.db_connection.lock().unwrap()), Ok(0));
    }

    #[tokio::test]
    async fn unknown_account_is_bad_request() {
        let (state, _) = get_state();

        let response = create_transaction_endpoint(State(state), Form(form(999)))
            .await
            .into_response();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
