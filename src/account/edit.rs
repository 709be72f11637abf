//! Account editing page and endpoint.

use std::sync::{Arc, Mutex};

use axum::{
    Form,
    extract::{FromRef, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use axum_htmx::HxRedirect;
use maud::{Markup, html};
use rusqlite::Connection;

use crate::{
    AppState, Error,
    account::{
        AccountId, NewAccountMap, core::AccountFormData, form::account_form_fields,
        get_account_map, update_account_map,
    },
    endpoints,
    html::{BUTTON_PRIMARY_STYLE, FORM_CONTAINER_STYLE, base},
    navigation::NavBar,
};

/// The state needed for the edit account page and endpoint.
#[derive(Debug, Clone)]
pub struct EditAccountState {
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for EditAccountState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
        }
    }
}

/// Render the account editing page.
pub async fn get_edit_account_page(
    Path(account_id): Path<AccountId>,
    State(state): State<EditAccountState>,
) -> Result<Response, Error> {
    let connection = state
        .db_connection
        .lock()
        .inspect_err(|error| tracing::error!("could not acquire database lock: {error}"))
        .map_err(|_| Error::DatabaseLockError)?;

    let edit_endpoint = endpoints::format_endpoint(endpoints::EDIT_ACCOUNT_VIEW, account_id);
    let update_endpoint = endpoints::format_endpoint(endpoints::ACCOUNT, account_id);

    let (form_data, error_message) = match get_account_map(account_id, &connection) {
        Ok(account) => (
            AccountFormData {
                account_number: account.account_number,
                display_name: account.display_name,
            },
            "",
        ),
        Err(error) => {
            let error_message = match error {
                Error::NotFound => "Account not found",
                _ => {
                    tracing::error!("Failed to retrieve account {account_id}: {error}");
                    "Failed to load account"
                }
            };

            (
                AccountFormData {
                    account_number: String::new(),
                    display_name: String::new(),
                },
                error_message,
            )
        }
    };

    Ok(edit_account_view(&edit_endpoint, &update_endpoint, &form_data, error_message).into_response())
}

/// Handle account update form submission.
pub async fn update_account_endpoint(
    Path(account_id): Path<AccountId>,
    State(state): State<EditAccountState>,
    Form(form_data): Form<AccountFormData>,
) -> Response {
    let update_endpoint = endpoints::format_endpoint(endpoints::ACCOUNT, account_id);

    let account = match NewAccountMap::new(&form_data.account_number, &form_data.display_name) {
        Ok(account) => account,
        Err(error) => {
            return edit_account_form_view(&update_endpoint, &form_data, &format!("Error: {error}"))
                .into_response();
        }
    };

    let connection = match state.db_connection.lock() {
        Ok(connection) => connection,
        Err(error) => {
            tracing::error!("could not acquire database lock: {error}");
            return Error::DatabaseLockError.into_alert_response();
        }
    };

    match update_account_map(account_id, &account, &connection) {
        Ok(_) => (
            HxRedirect(endpoints::ACCOUNTS_VIEW.to_owned()),
            StatusCode::SEE_OTHER,
        )
            .into_response(),
        Err(error @ (Error::UpdateMissingAccount | Error::DuplicateAccountNumber(_))) => {
            error.into_alert_response()
        }
        Err(error) => {
            tracing::error!(
                "An unexpected error occurred while updating account {account_id}: {error}"
            );
            error.into_alert_response()
        }
    }
}

fn edit_account_view(
    edit_endpoint: &str,
    update_endpoint: &str,
    form_data: &AccountFormData,
    error_message: &str,
) -> Markup {
    let nav_bar = NavBar::new(edit_endpoint).into_html();
    let form = edit_account_form_view(update_endpoint, form_data, error_message);

    let content = html! {
        (nav_bar)
        div class=(FORM_CONTAINER_STYLE) { (form) }
    };

    base("Edit Account", &[], &content)
}

fn edit_account_form_view(
    update_endpoint: &str,
    form_data: &AccountFormData,
    error_message: &str,
) -> Markup {
    html! {
        form
            hx-put=(update_endpoint)
            hx-target-error="#alert-container"
            class="w-full space-y-4 md:space-y-6"
        {
            (account_form_fields(form_data))

            @if !error_message.is_empty() {
                p
                {
                    (error_message)
                }
            }

            button type="submit" class=(BUTTON_PRIMARY_STYLE) { "Update Account" }
        }
    }
}

#[cfg(test)]
mod edit_account_tests {
    use std::sync::{Arc, Mutex};

    use axum::{
        Form,
        extract::{Path, State},
        http::StatusCode,
        response::IntoResponse,
    };
    use rusqlite::Connection;

    use crate::{
        account::{
            NewAccountMap, core::AccountFormData, create_account_map, edit::EditAccountState,
            get_account_map, get_edit_account_page, update_account_endpoint,
        },
        db::initialize,
        endpoints,
        test_utils::{
            assert_form_error_message, assert_form_input_with_value,
            assert_form_submit_button_with_text, assert_hx_endpoint, assert_hx_redirect,
            assert_valid_html, must_get_form, parse_html_document, parse_html_fragment,
        },
    };

    fn get_edit_account_state() -> EditAccountState {
        let connection =
            Connection::open_in_memory().expect("Could not open in-memory SQLite database");
        initialize(&connection).expect("Could not initialize database");

        EditAccountState {
            db_connection: Arc::new(Mutex::new(connection)),
        }
    }

    #[tokio::test]
    async fn get_edit_account_page_succeeds() {
        let state = get_edit_account_state();
        let account = create_account_map(
            &NewAccountMap::new("1234", "Everyday").unwrap(),
            &state.db_connection.lock().unwrap(),
        )
        .unwrap();

        let response = get_edit_account_page(Path(account.id), State(state))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let html = parse_html_document(response).await;
        assert_valid_html(&html);
        let form = must_get_form(&html);
        assert_hx_endpoint(
            &form,
            &endpoints::format_endpoint(endpoints::ACCOUNT, account.id),
            "hx-put",
        );
        assert_form_input_with_value(&form, "account_number", "text", "1234");
        assert_form_input_with_value(&form, "display_name", "text", "Everyday");
        assert_form_submit_button_with_text(&form, "Update Account");
    }

    #[tokio::test]
    async fn get_edit_account_page_with_invalid_id_shows_error() {
        let state = get_edit_account_state();

        let response = get_edit_account_page(Path(999999), State(state))
            .await
            .unwrap();

        let html = parse_html_document(response).await;
        let form = must_get_form(&html);
        assert_form_error_message(&form, "Account not found");
    }

    #[tokio::test]
    async fn update_account_endpoint_succeeds() {
        let state = get_edit_account_state();
        let account = create_account_map(
            &NewAccountMap::new("1234", "Everyday").unwrap(),
            &state.db_connection.lock().unwrap(),
        )
        .unwrap();
        let form = AccountFormData {
            account_number: "1234".to_owned(),
            display_name: "Bills".to_owned(),
        };

        let response = update_account_endpoint(Path(account.id), State(state.clone()), Form(form))
            .await
            .into_response();

        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_hx_redirect(&response, endpoints::ACCOUNTS_VIEW);
        let got = get_account_map(account.id, &state.db_connection.lock().unwrap()).unwrap();
        assert_eq!(got.display_name, "Bills");
    }

    #[tokio::test]
    async fn update_account_endpoint_with_invalid_id_returns_not_found() {
        let state = get_edit_account_state();
        let form = AccountFormData {
            account_number: "1234".to_owned(),
            display_name: "Bills".to_owned(),
        };

        let response = update_account_endpoint(Path(999999), State(state), Form(form))
            .await
            .into_response();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn update_account_endpoint_with_empty_number_returns_error() {
        let state = get_edit_account_state();
        let form = AccountFormData {
            account_number: "".to_owned(),
            display_name: "Bills".to_owned(),
        };

        let response = update_account_endpoint(Path(1), State(state), Form(form))
            .await
            .into_response();

        assert_eq!(response.status(), StatusCode::OK);
        let html = parse_html_fragment(response).await;
        let form = must_get_form(&html);
        assert_form_error_message(&form, "Error: Account number cannot be empty");
    }
}
