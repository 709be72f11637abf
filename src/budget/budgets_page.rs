//! The budget settings page: one monthly limit per primary category.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use axum::{
    extract::{FromRef, State},
    response::{IntoResponse, Response},
};
use maud::{Markup, html};
use rusqlite::Connection;

use crate::{
    AppState, Error,
    budget::get_all_budgets,
    category::{Category, CategoryId, get_primary_categories},
    endpoints,
    html::{
        BUTTON_PRIMARY_STYLE, CATEGORY_BADGE_STYLE, FORM_TEXT_INPUT_STYLE, LINK_STYLE,
        PAGE_CONTAINER_STYLE, base, dollar_input_styles, loading_spinner,
    },
    navigation::NavBar,
};

/// The state needed for the budgets page.
#[derive(Debug, Clone)]
pub struct BudgetsPageState {
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for BudgetsPageState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
        }
    }
}

/// A primary category and its current limit, if it has one.
struct BudgetRow {
    category: Category,
    monthly_limit: Option<f64>,
}

/// Render the budget settings page.
pub async fn get_budgets_page(State(state): State<BudgetsPageState>) -> Result<Response, Error> {
    let connection = state
        .db_connection
        .lock()
        .inspect_err(|error| tracing::error!("could not acquire database lock: {error}"))
        .map_err(|_| Error::DatabaseLockError)?;

    let categories = get_primary_categories(&connection)
        .inspect_err(|error| tracing::error!("could not get primary categories: {error}"))?;
    let limits: HashMap<CategoryId, f64> = get_all_budgets(&connection)
        .inspect_err(|error| tracing::error!("could not get budgets: {error}"))?
        .into_iter()
        .map(|budget| (budget.category_id, budget.monthly_limit))
        .collect();

    let rows = categories
        .into_iter()
        .map(|category| BudgetRow {
            monthly_limit: limits.get(&category.id).copied(),
            category,
        })
        .collect::<Vec<_>>();

    Ok(budgets_view(&rows).into_response())
}

fn budget_form_view(rows: &[BudgetRow]) -> Markup {
    html! {
        form
            hx-post=(endpoints::BUDGETS_API)
            hx-swap="none"
            hx-target-error="#alert-container"
            hx-disabled-elt="#submit-button"
            hx-indicator="#indicator"
            class="w-full max-w-xl space-y-4"
        {
            @for row in rows {
                @let input_id = format!("monthly-limit-{}", row.category.id);

                div class="flex items-center justify-between gap-4" data-budget-row="true"
                {
                    label for=(input_id) class="min-w-0 flex-1"
                    {
                        span class=(CATEGORY_BADGE_STYLE) { (row.category.name) }
                    }

                    input type="hidden" name="category_id" value=(row.category.id);

                    div class="input-wrapper w-40"
                    {
                        input
                            id=(input_id)
                            type="number"
                            name="monthly_limit"
                            min="0"
                            step="0.01"
                            placeholder="No limit"
                            value=[row.monthly_limit.map(|limit| format!("{limit:.2}"))]
                            class=(FORM_TEXT_INPUT_STYLE);
                    }
                }
            }

            button type="submit" id="submit-button" class=(BUTTON_PRIMARY_STYLE)
            {
                span class="inline htmx-indicator" id="indicator" { (loading_spinner()) }
                " Save Budgets"
            }
        }
    }
}

fn budgets_view(rows: &[BudgetRow]) -> Markup {
    let nav_bar = NavBar::new(endpoints::BUDGETS_VIEW).into_html();

    let content = html! {
        (nav_bar)

        main class=(PAGE_CONTAINER_STYLE)
        {
            section class="flex flex-col items-center space-y-4"
            {
                header class="w-full max-w-xl"
                {
                    h1 class="text-xl font-bold" { "Budgets" }
                    span class="text-sm text-gray-500 dark:text-gray-400"
                    {
                        "Set a monthly spending limit for each primary category. Leave a limit blank for no budget."
                    }
                }

                @if rows.is_empty() {
                    p class="text-gray-500 dark:text-gray-400" data-empty-state="true"
                    {
                        "No primary categories found. Please add some categories first. "
                        a href=(endpoints::NEW_CATEGORY_VIEW) class=(LINK_STYLE) { "Add a category" }
                    }
                } @else {
                    (budget_form_view(rows))
                }
            }
        }
    };

    base("Budgets", &[dollar_input_styles()], &content)
}
