//! Categories listing page.

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
    category::{Category, CategoryId, get_all_categories},
    endpoints,
    html::{
        CATEGORY_BADGE_STYLE, LINK_STYLE, PAGE_CONTAINER_STYLE, TABLE_CELL_STYLE,
        TABLE_HEADER_STYLE, TABLE_ROW_STYLE, base, edit_delete_action_links,
    },
    navigation::NavBar,
};

/// The state needed for the categories listing page.
#[derive(Debug, Clone)]
pub struct CategoriesPageState {
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for CategoriesPageState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
        }
    }
}

/// A category with the URLs and counts needed to render it.
#[derive(Debug, Clone)]
struct CategoryRow {
    category: Category,
    edit_url: String,
    delete_url: String,
    transaction_count: u32,
}

impl CategoryRow {
    fn confirm_message(&self) -> String {
        match self.category.parent_id {
            None => format!(
                "Are you sure you want to delete '{}'? Its sub-categories will also be deleted \
                and {} transaction(s) will lose this category.",
                self.category.name, self.transaction_count
            ),
            Some(_) => format!(
                "Are you sure you want to delete '{}'? {} transaction(s) will lose this category.",
                self.category.name, self.transaction_count
            ),
        }
    }
}

/// A primary category followed by its sub-categories.
#[derive(Debug, Clone)]
struct CategoryGroup {
    primary: CategoryRow,
    subs: Vec<CategoryRow>,
}

/// Render the categories listing page with transaction counts.
pub async fn get_categories_page(
    State(state): State<CategoriesPageState>,
) -> Result<Response, Error> {
    let connection = state
        .db_connection
        .lock()
        .inspect_err(|error| tracing::error!("could not acquire database lock: {error}"))
        .map_err(|_| Error::DatabaseLockError)?;

    let categories = get_all_categories(&connection)
        .inspect_err(|error| tracing::error!("Failed to retrieve categories: {error}"))?;

    let transactions_per_category = count_transactions_per_category(&connection).inspect_err(
        |error| tracing::error!("Could not count transactions per category: {error}"),
    )?;

    let groups = group_categories(categories, &transactions_per_category);

    Ok(categories_view(&groups).into_response())
}

/// Count the transactions that use a category in either category slot.
fn count_transactions_per_category(
    connection: &Connection,
) -> Result<HashMap<CategoryId, u32>, Error> {
    let result: Result<HashMap<CategoryId, u32>, rusqlite::Error> = connection
        .prepare(
            "SELECT category_id, COUNT(1) FROM (
                SELECT category_1_id AS category_id FROM \"transaction\"
                    WHERE category_1_id IS NOT NULL
                UNION ALL
                SELECT category_2_id AS category_id FROM \"transaction\"
                    WHERE category_2_id IS NOT NULL
            ) GROUP BY category_id",
        )?
        .query_map((), |row| {
            let category_id = row.get(0)?;
            let count = row.get(1)?;

            Ok((category_id, count))
        })?
        .collect();

    result.map_err(Error::from)
}

fn group_categories(
    categories: Vec<Category>,
    transactions_per_category: &HashMap<CategoryId, u32>,
) -> Vec<CategoryGroup> {
    let to_row = |category: Category| CategoryRow {
        edit_url: endpoints::format_endpoint(endpoints::EDIT_CATEGORY_VIEW, category.id),
        delete_url: endpoints::format_endpoint(endpoints::CATEGORY, category.id),
        transaction_count: *transactions_per_category.get(&category.id).unwrap_or(&0),
        category,
    };

    let (primaries, subs): (Vec<_>, Vec<_>) = categories
        .into_iter()
        .partition(|category| category.parent_id.is_none());

    let mut groups: Vec<CategoryGroup> = primaries
        .into_iter()
        .map(|primary| CategoryGroup {
            primary: to_row(primary),
            subs: Vec::new(),
        })
        .collect();

    for sub in subs {
        match groups
            .iter_mut()
            .find(|group| Some(group.primary.category.id) == sub.parent_id)
        {
            Some(group) => group.subs.push(to_row(sub)),
            None => tracing::warn!("Sub-category {} has no parent, skipping it.", sub.id),
        }
    }

    groups
}

fn categories_view(groups: &[CategoryGroup]) -> Markup {
    let new_category_route = endpoints::NEW_CATEGORY_VIEW;
    let nav_bar = NavBar::new(endpoints::CATEGORIES_VIEW).into_html();

    let table_row = |row: &CategoryRow, delete_target: &str| {
        let is_sub = row.category.parent_id.is_some();

        html!(
            tr class=(TABLE_ROW_STYLE)
            {
                td class=(TABLE_CELL_STYLE)
                {
                    @if is_sub {
                        span class="pl-6 text-gray-400" { "↳ " }
                        (row.category.name)
                    } @else {
                        span class=(CATEGORY_BADGE_STYLE) { (row.category.name) }
                    }
                }

                td class=(TABLE_CELL_STYLE) { (row.transaction_count) }

                td class=(TABLE_CELL_STYLE)
                {
                    div class="flex gap-4"
                    {
                        (edit_delete_action_links(
                            &row.edit_url,
                            &row.delete_url,
                            &row.confirm_message(),
                            delete_target,
                            "delete",
                        ))
                    }
                }
            }
        )
    };

    let content = html!(
        (nav_bar)

        main class=(PAGE_CONTAINER_STYLE)
        {
            section class="space-y-4"
            {
                header class="flex justify-between flex-wrap items-end"
                {
                    h1 class="text-xl font-bold" { "Categories" }

                    a href=(new_category_route) class=(LINK_STYLE)
                    {
                        "Create Category"
                    }
                }

                (categories_cards_view(groups, new_category_route))

                section class="hidden lg:block dark:bg-gray-800 lg:max-w-5xl lg:w-full lg:mx-auto"
                {
                    table class="w-full text-sm text-left rtl:text-right
                        text-gray-500 dark:text-gray-400"
                    {
                        thead class=(TABLE_HEADER_STYLE)
                        {
                            tr
                            {
                                th scope="col" class=(TABLE_CELL_STYLE) { "Name" }
                                th scope="col" class=(TABLE_CELL_STYLE) { "Transactions" }
                                th scope="col" class=(TABLE_CELL_STYLE) { "Actions" }
                            }
                        }

                        // One tbody per primary so deleting it also removes its children.
                        @for group in groups {
                            tbody
                            {
                                (table_row(&group.primary, "closest tbody"))

                                @for sub in &group.subs {
                                    (table_row(sub, "closest tr"))
                                }
                            }
                        }

                        @if groups.is_empty() {
                            tbody
                            {
                                tr
                                {
                                    td
                                        colspan="3"
                                        class="px-6 py-4 text-center
                                            text-gray-500 dark:text-gray-400"
                                    {
                                        "No categories created yet. "
                                        a href=(new_category_route) class=(LINK_STYLE)
                                        {
                                            "Create your first category"
                                        }
                                    }
                                }
                            }
                        }
                    }
                }
            }
        }
    );

    base("Categories", &[], &content)
}

fn categories_cards_view(groups: &[CategoryGroup], new_category_route: &str) -> Markup {
    html!(
        ul class="lg:hidden space-y-4"
        {
            @for group in groups {
                li class="rounded border border-gray-200 bg-white px-4 py-3 shadow-sm dark:border-gray-700 dark:bg-gray-800"
                    data-category-card="true"
                {
                    div class="flex items-start justify-between gap-3"
                    {
                        span class=(CATEGORY_BADGE_STYLE) { (group.primary.category.name) }
                        span class="text-sm tabular-nums text-gray-900 dark:text-white"
                        { (group.primary.transaction_count) }
                    }

                    div class="mt-2 flex items-center gap-4 text-sm"
                    {
                        (edit_delete_action_links(
                            &group.primary.edit_url,
                            &group.primary.delete_url,
                            &group.primary.confirm_message(),
                            "closest [data-category-card='true']",
                            "outerHTML",
                        ))
                    }

                    @if !group.subs.is_empty() {
                        ul class="mt-3 space-y-2 border-l border-gray-200 pl-4 dark:border-gray-700"
                        {
                            @for sub in &group.subs {
                                li data-sub-category-row="true"
                                {
                                    div class="flex items-start justify-between gap-3 text-sm"
                                    {
                                        span class="text-gray-900 dark:text-white" { (sub.category.name) }
                                        span class="tabular-nums text-gray-900 dark:text-white"
                                        { (sub.transaction_count) }
                                    }

                                    div class="mt-1 flex items-center gap-4 text-sm"
                                    {
                                        (edit_delete_action_links(
                                            &sub.edit_url,
                                            &sub.delete_url,
                                            &sub.confirm_message(),
                                            "closest [data-sub-category-row='true']",
                                            "outerHTML",
                                        ))
                                    }
                                }
                            }
                        }
                    }
                }
            }

            @if groups.is_empty() {
                li class="rounded border border-dashed border-gray-300 bg-white px-4 py-6 text-center text-sm text-gray-500 dark:border-gray-700 dark:bg-gray-800 dark:text-gray-400"
                {
                    "No categories created yet. "
                    a href=(new_category_route) class=(LINK_STYLE)
                    {
                        "Create your first category"
                    }
                }
            }
        }
    )
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use axum::extract::State;
    use rusqlite::Connection;
    use scraper::Selector;
    use time::macros::date;

    use crate::{
        category::{CategoryName, create_category},
        db::initialize,
        test_utils::{assert_status_ok, assert_valid_html, parse_html_document},
        transaction::{Transaction, create_transaction},
    };

    use super::{CategoriesPageState, count_transactions_per_category, get_categories_page};

    fn get_test_db_connection() -> Connection {
        let connection = Connection::open_in_memory().unwrap();
        initialize(&connection).expect("Could not initialize database");
        connection
    }

    #[test]
    fn counts_transactions_in_both_category_slots() {
        let connection = get_test_db_connection();
        let food = create_category(CategoryName::new_unchecked("Food"), None, &connection).unwrap();
        let groceries = create_category(
            CategoryName::new_unchecked("Groceries"),
            Some(food.id),
            &connection,
        )
        .unwrap();
        for i in 0..3 {
            create_transaction(
                Transaction::build(date!(2025 - 01 - 01), &i.to_string())
                    .debit(Some(1.0))
                    .category_1_id(Some(food.id))
                    .category_2_id(Some(groceries.id)),
                &connection,
            )
            .unwrap();
        }
        create_transaction(
            Transaction::build(date!(2025 - 01 - 02), "Takeaways")
                .debit(Some(1.0))
                .category_1_id(Some(food.id)),
            &connection,
        )
        .unwrap();
        create_transaction(
            Transaction::build(date!(2025 - 01 - 02), "Uncategorized").debit(Some(1.0)),
            &connection,
        )
        .unwrap();

        let counts = count_transactions_per_category(&connection).unwrap();

        assert_eq!(counts[&food.id], 4);
        assert_eq!(counts[&groceries.id], 3);
        assert_eq!(counts.len(), 2);
    }

    #[tokio::test]
    async fn page_nests_sub_categories_under_their_parent() {
        let connection = get_test_db_connection();
        let food = create_category(CategoryName::new_unchecked("Food"), None, &connection).unwrap();
        let housing =
            create_category(CategoryName::new_unchecked("Housing"), None, &connection).unwrap();
        create_category(CategoryName::new_unchecked("Rent"), Some(housing.id), &connection)
            .unwrap();
        create_category(CategoryName::new_unchecked("Groceries"), Some(food.id), &connection)
            .unwrap();
        let state = CategoriesPageState {
            db_connection: Arc::new(Mutex::new(connection)),
        };

        let response = get_categories_page(State(state)).await.unwrap();

        assert_status_ok(&response);
        let html = parse_html_document(response).await;
        assert_valid_html(&html);
        let tbody_selector = Selector::parse("table tbody").unwrap();
        let td_selector = Selector::parse("tr > td:first-child").unwrap();
        let got: Vec<Vec<String>> = html
            .select(&tbody_selector)
            .map(|tbody| {
                tbody
                    .select(&td_selector)
                    .map(|td| td.text().collect::<String>().replace("↳", "").trim().to_owned())
                    .collect()
            })
            .collect();
        assert_eq!(
            got,
            [vec!["Food", "Groceries"], vec!["Housing", "Rent"]]
        );
    }

    #[tokio::test]
    async fn page_shows_empty_state() {
        let state = CategoriesPageState {
            db_connection: Arc::new(Mutex::new(get_test_db_connection())),
        };

        let response = get_categories_page(State(state)).await.unwrap();

        let html = parse_html_document(response).await;
        let text = html.root_element().text().collect::<String>();
        assert!(text.contains("No categories created yet."));
    }
}
