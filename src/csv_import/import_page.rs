use std::sync::{Arc, Mutex};

use axum::{
    extract::{FromRef, State},
    response::{IntoResponse, Response},
};
use maud::{Markup, html};
use rusqlite::Connection;

use crate::{
    AppState, Error,
    account::{AccountMap, get_all_account_maps},
    endpoints,
    html::{
        BUTTON_PRIMARY_STYLE, FORM_CONTAINER_STYLE, FORM_LABEL_STYLE, FORM_TEXT_INPUT_STYLE,
        LINK_STYLE, base, loading_spinner,
    },
    navigation::NavBar,
};

/// The state needed for the import page.
#[derive(Debug, Clone)]
pub struct ImportPageState {
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for ImportPageState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
        }
    }
}

/// Route handler for the import CSV page.
pub async fn get_import_page(State(state): State<ImportPageState>) -> Result<Response, Error> {
    let connection = state
        .db_connection
        .lock()
        .inspect_err(|error| tracing::error!("could not acquire database lock: {error}"))
        .map_err(|_| Error::DatabaseLockError)?;

    let accounts = get_all_account_maps(&connection)
        .inspect_err(|error| tracing::error!("could not get accounts: {error}"))?;

    Ok(import_view(&accounts).into_response())
}

fn import_form_view(accounts: &[AccountMap]) -> Markup {
    let spinner = loading_spinner();

    html! {
        form
            hx-post=(endpoints::IMPORT)
            enctype="multipart/form-data"
            hx-disabled-elt="#account_id, #files, #submit-button"
            hx-indicator="#indicator"
            hx-swap="none"
            hx-target-error="#alert-container"
            class="w-full space-y-4 md:space-y-6"
        {
            div
            {
                label for="account_id" class=(FORM_LABEL_STYLE) { "Account" }

                select id="account_id" name="account_id" required class=(FORM_TEXT_INPUT_STYLE)
                {
                    option value="" disabled selected { "Choose an account" }

                    @for account in accounts {
                        option value=(account.id)
                        {
                            (account.display_name) " (" (account.account_number) ")"
                        }
                    }
                }
            }

            div
            {
                label for="files" class=(FORM_LABEL_STYLE) { "Choose ING CSV file(s) to upload" }

                input
                    id="files"
                    type="file"
                    name="files"
                    accept=".csv,text/csv"
                    multiple
                    required
                    class=(FORM_TEXT_INPUT_STYLE);

                span class="block mt-2 text-sm text-gray-500 dark:text-gray-400"
                {
                    "Export your statements from ING as CSV. Transactions that were already imported are skipped."
                }
            }

            button type="submit" id="submit-button" class=(BUTTON_PRIMARY_STYLE)
            {
                span class="inline htmx-indicator" id="indicator" { (spinner) }
                " Upload Files"
            }
        }
    }
}

fn import_view(accounts: &[AccountMap]) -> Markup {
    let nav_bar = NavBar::new(endpoints::IMPORT_VIEW).into_html();

    let content = html! {
        (nav_bar)

        div class=(FORM_CONTAINER_STYLE)
        {
            h1 class="mb-4 text-xl font-bold" { "Import Transactions" }

            @if accounts.is_empty() {
                p data-no-accounts="true"
                {
                    "You need an account before you can import transactions. "
                    a href=(endpoints::NEW_ACCOUNT_VIEW) class=(LINK_STYLE) { "Add an account" }
                    " first."
                }
            } @else {
                (import_form_view(accounts))
            }
        }
    };

    base("Import Transactions", &[], &content)
}
