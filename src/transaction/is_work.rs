//! The work expense toggle in the transactions table.

use std::sync::{Arc, Mutex};

use axum::{
    extract::{FromRef, Path, State},
    response::{IntoResponse, Response},
};
use maud::{Markup, html};
use rusqlite::Connection;

use crate::{
    AppState, Error, endpoints,
    transaction::{TransactionId, core::toggle_is_work},
};

/// The state needed to toggle the work flag.
#[derive(Debug, Clone)]
pub struct ToggleIsWorkState {
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for ToggleIsWorkState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
        }
    }
}

/// A button that flips the work flag and swaps itself for the new state.
pub(super) fn is_work_toggle(transaction_id: TransactionId, is_work: bool) -> Markup {
    let endpoint = endpoints::format_endpoint(endpoints::TRANSACTION_IS_WORK, transaction_id);
    let (label, style) = if is_work {
        (
            "Work",
            "bg-blue-100 text-blue-800 dark:bg-blue-900 dark:text-blue-300",
        )
    } else {
        (
            "Personal",
            "bg-gray-100 text-gray-600 dark:bg-gray-700 dark:text-gray-300",
        )
    };

    html! {
        button
            type="button"
            hx-put=(endpoint)
            hx-target="this"
            hx-swap="outerHTML"
            hx-target-error="#alert-container"
            aria-pressed=(is_work)
            data-is-work=(is_work)
            class={ "rounded px-2.5 py-0.5 text-xs font-medium " (style) }
        {
            (label)
        }
    }
}

/// Flip the work flag and return the re-rendered toggle.
pub async fn toggle_is_work_endpoint(
    Path(transaction_id): Path<TransactionId>,
    State(state): State<ToggleIsWorkState>,
) -> Response {
    let connection = match state.db_connection.lock() {
        Ok(connection) => connection,
        Err(error) => {
            tracing::error!("could not acquire database lock: {error}");
            return Error::DatabaseLockError.into_alert_response();
        }
    };

    match toggle_is_work(transaction_id, &connection) {
        Ok(is_work) => is_work_toggle(transaction_id, is_work).into_response(),
        Err(Error::UpdateMissingTransaction) => {
            Error::UpdateMissingTransaction.into_alert_response()
        }
        Err(error) => {
            tracing::error!("Could not toggle work flag of transaction {transaction_id}: {error}");
            error.into_alert_response()
        }
    }
}

#[cfg(test)]
mod toggle_is_work_tests {
    use std::sync::{Arc, Mutex};

    use axum::{
        extract::{Path, State},
        http::StatusCode,
        response::IntoResponse,
    };
    use rusqlite::Connection;
    use scraper::Selector;
    use time::macros::date;

    use crate::{
        db::initialize,
        endpoints,
        test_utils::{assert_valid_html, parse_html_fragment},
        transaction::{Transaction, create_transaction, get_transaction},
    };

    use super::{ToggleIsWorkState, toggle_is_work_endpoint};

    #[tokio::test]
    async fn toggle_flips_flag_and_renders_button() {
        let connection = Connection::open_in_memory().unwrap();
        initialize(&connection).unwrap();
        let transaction = create_transaction(
            Transaction::build(date!(2025 - 01 - 01), "Laptop").debit(Some(2000.0)),
            &connection,
        )
        .unwrap();
        let state = ToggleIsWorkState {
            db_connection: Arc::new(Mutex::new(connection)),
        };

        let response = toggle_is_work_endpoint(Path(transaction.id), State(state.clone()))
            .await
            .into_response();

        assert_eq!(response.status(), StatusCode::OK);
        let html = parse_html_fragment(response).await;
        assert_valid_html(&html);
        let button = html
            .select(&Selector::parse("button").unwrap())
            .next()
            .expect("No button found");
        assert_eq!(button.value().attr("data-is-work"), Some("true"));
        assert_eq!(
            button.value().attr("hx-put"),
            Some(endpoints::format_endpoint(endpoints::TRANSACTION_IS_WORK, transaction.id).as_str())
        );
        let got = get_transaction(transaction.id, &state.db_connection.lock().unwrap()).unwrap();
        assert!(got.is_work);
    }

    #[tokio::test]
    async fn toggle_missing_transaction_returns_not_found() {
        let connection = Connection::open_in_memory().unwrap();
        initialize(&connection).unwrap();
        let state = ToggleIsWorkState {
            db_connection: Arc::new(Mutex::new(connection)),
        };

        let response = toggle_is_work_endpoint(Path(7), State(state))
            .await
            .into_response();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
