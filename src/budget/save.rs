//! Saving the budget settings form.

use std::{
    collections::HashSet,
    sync::{Arc, Mutex},
};

use axum::{
    extract::{FromRef, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use axum_extra::extract::Form;
use rusqlite::Connection;
use serde::Deserialize;
use time::OffsetDateTime;

use crate::{
    AppState, Error,
    alert::Alert,
    budget::{get_all_budgets, upsert_budget},
    category::CategoryId,
};

/// The state needed for saving budgets.
#[derive(Debug, Clone)]
pub struct SaveBudgetsState {
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for SaveBudgetsState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
        }
    }
}

/// The budget form: one `category_id` and one `monthly_limit` per row, in the same order.
#[derive(Debug, Deserialize)]
pub struct BudgetFormData {
    #[serde(default)]
    pub category_id: Vec<CategoryId>,
    /// Raw input values. Blank means the row has no limit.
    #[serde(default)]
    pub monthly_limit: Vec<String>,
}

/// What to do with one row of the form.
#[derive(Debug, PartialEq)]
enum BudgetChange {
    Set(CategoryId, f64),
    /// The limit was cleared. Existing budgets drop to zero, otherwise nothing is stored.
    Clear(CategoryId),
}

/// Read the form rows, rejecting the whole form if any limit is negative.
fn parse_budget_form(form: &BudgetFormData) -> Result<Vec<BudgetChange>, Response> {
    if form.category_id.len() != form.monthly_limit.len() {
        tracing::warn!(
            "Rejected budget form with {} categories and {} limits",
            form.category_id.len(),
            form.monthly_limit.len()
        );
        return Err((
            StatusCode::BAD_REQUEST,
            Alert::ErrorSimple {
                message: "Every category needs a limit field.".to_owned(),
            }
            .into_html(),
        )
            .into_response());
    }

    form.category_id
        .iter()
        .zip(&form.monthly_limit)
        .map(|(&category_id, raw_limit)| {
            let raw_limit = raw_limit.trim();

            if raw_limit.is_empty() {
                return Ok(BudgetChange::Clear(category_id));
            }

            match raw_limit.parse::<f64>() {
                Ok(limit) if limit.is_finite() && limit >= 0.0 => {
                    Ok(BudgetChange::Set(category_id, limit))
                }
                Ok(_) => Err(Error::NegativeBudgetLimit.into_alert_response()),
                Err(_) => {
                    tracing::warn!("Rejected budget limit {raw_limit:?}");
                    Err((
                        StatusCode::BAD_REQUEST,
                        Alert::ErrorSimple {
                            message: "Limit must be a number.".to_owned(),
                        }
                        .into_html(),
                    )
                        .into_response())
                }
            }
        })
        .collect()
}

fn save_budget_changes(
    changes: &[BudgetChange],
    now: OffsetDateTime,
    connection: &Connection,
) -> Result<(), Error> {
    let budgeted: HashSet<CategoryId> = get_all_budgets(connection)?
        .into_iter()
        .map(|budget| budget.category_id)
        .collect();

    for change in changes {
        match *change {
            BudgetChange::Set(category_id, limit) => {
                upsert_budget(category_id, limit, now, connection)?;
            }
            BudgetChange::Clear(category_id) if budgeted.contains(&category_id) => {
                upsert_budget(category_id, 0.0, now, connection)?;
            }
            BudgetChange::Clear(_) => {}
        }
    }

    Ok(())
}

/// Save every row of the budget form in one database transaction.
pub async fn save_budgets_endpoint(
    State(state): State<SaveBudgetsState>,
    Form(form): Form<BudgetFormData>,
) -> Response {
    let changes = match parse_budget_form(&form) {
        Ok(changes) => changes,
        Err(response) => return response,
    };

    let connection = match state.db_connection.lock() {
        Ok(connection) => connection,
        Err(error) => {
            tracing::error!("could not acquire database lock: {error}");
            return Error::DatabaseLockError.into_alert_response();
        }
    };

    let result = connection.unchecked_transaction().map_err(Error::from).and_then(|tx| {
        save_budget_changes(&changes, OffsetDateTime::now_utc(), &tx)?;
        tx.commit().map_err(Error::from)
    });

    match result {
        Ok(()) => Alert::SuccessSimple {
            message: "Budgets saved".to_owned(),
        }
        .into_response(),
        Err(error @ Error::InvalidBudgetCategory(_)) => {
            tracing::warn!("Rejected budget form: {error}");
            error.into_alert_response()
        }
        Err(error) => {
            tracing::error!("Could not save budgets: {error}");
            error.into_alert_response()
        }
    }
}
