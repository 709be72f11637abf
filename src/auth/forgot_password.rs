//! Instructions for resetting a forgotten password.

use axum::response::{IntoResponse, Response};
use maud::{Markup, html};

use crate::{
    endpoints,
    html::{LINK_STYLE, base, log_in_register},
};

fn forgot_password_content() -> Markup {
    let instructions = html! {
        div class="space-y-4 text-gray-900 dark:text-white"
        {
            p class="text-justify"
            {
                "There is no email based reset. Stop the server, then run the "
                code { "reset_password" }
                " program from the directory the server runs in, pointing it at
                your database file:"
            }

            pre class="p-2 overflow-x-auto text-sm bg-gray-100 rounded dark:bg-gray-700"
            {
                "reset_password --db-path finance.db"
            }

            p
            {
                "It will ask for a new password. Once done, "
                a href=(endpoints::LOG_IN_VIEW) class=(LINK_STYLE) { "log in" }
                " with the new password."
            }
        }
    };

    log_in_register("Forgot your password?", &instructions)
}

/// Renders a page describing how the user's password can be reset.
pub async fn get_forgot_password_page() -> Response {
    base("Forgot Password", &[], &forgot_password_content()).into_response()
}

#[cfg(test)]
mod forgot_password_tests {
    use axum::http::StatusCode;
    use scraper::Selector;

    use crate::{
        endpoints,
        test_utils::{assert_valid_html, parse_html_document},
    };

    use super::get_forgot_password_page;

    #[tokio::test]
    async fn explains_reset_password_program() {
        let response = get_forgot_password_page().await;
        assert_eq!(response.status(), StatusCode::OK);

        let document = parse_html_document(response).await;
        assert_valid_html(&document);

        let code = document
            .select(&Selector::parse("code").unwrap())
            .next()
            .expect("No code element found")
            .text()
            .collect::<String>();
        assert_eq!(code, "reset_password");

        let has_log_in_link = document
            .select(&Selector::parse("a[href]").unwrap())
            .any(|link| link.value().attr("href") == Some(endpoints::LOG_IN_VIEW));
        assert!(has_log_in_link, "want a link to the log-in page");
    }
}
