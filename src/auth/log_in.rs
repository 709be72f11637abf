//! The log-in page and the endpoint that checks the password.

use std::sync::{Arc, Mutex};

use axum::{
    Form,
    extract::{FromRef, Query, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::{PrivateCookieJar, cookie::Key};
use axum_htmx::HxRedirect;
use maud::{Markup, html};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use time::Duration;

use crate::{
    AppState, Error,
    app_state::create_cookie_key,
    auth::{
        UserID,
        cookie::{DEFAULT_COOKIE_DURATION, get_token_from_cookies, invalidate_auth_cookie, set_auth_cookie},
        get_user_by_id,
        redirect::normalize_redirect_url,
    },
    endpoints,
    html::{BUTTON_PRIMARY_STYLE, FORM_CHECKBOX_STYLE, LINK_STYLE, base, loading_spinner, log_in_register, password_input},
    timezone::get_local_offset,
};

/// How long the auth cookie lasts when the user ticks "remember me".
pub const REMEMBER_ME_COOKIE_DURATION: Duration = Duration::days(7);

pub const INVALID_CREDENTIALS_ERROR_MSG: &str = "Incorrect password.";

fn log_in_form(password: &str, error_message: Option<&str>, redirect_url: Option<&str>) -> Markup {
    html! {
        form
            hx-post=(endpoints::LOG_IN_API)
            hx-indicator="#indicator"
            hx-disabled-elt="#password, #submit-button"
            class="space-y-4 md:space-y-6"
        {
            @if let Some(redirect_url) = redirect_url {
                input type="hidden" name="redirect_url" value=(redirect_url);
            }

            (password_input(password, 0, error_message))

            div class="flex items-center gap-x-3"
            {
                input
                    type="checkbox"
                    name="remember_me"
                    id="remember_me"
                    tabindex="0"
                    class=(FORM_CHECKBOX_STYLE);

                label
                    for="remember_me"
                    class="block text-sm font-medium text-gray-900 dark:text-white"
                {
                    "Keep me logged in for one week"
                }
            }

            button type="submit" id="submit-button" tabindex="0" class=(BUTTON_PRIMARY_STYLE)
            {
                span class="inline htmx-indicator" id="indicator" { (loading_spinner()) }
                "Log in"
            }

            p class="text-sm font-light text-gray-500 dark:text-gray-400"
            {
                "Forgot your password? "
                a href=(endpoints::FORGOT_PASSWORD_VIEW) tabindex="0" class=(LINK_STYLE)
                {
                    "Reset it here"
                }
            }

            p class="text-sm font-light text-gray-500 dark:text-gray-400"
            {
                "Don't have a password? "
                a href=(endpoints::REGISTER_VIEW) tabindex="0" class=(LINK_STYLE)
                {
                    "Register here"
                }
            }
        }
    }
}

fn parse_redirect_url(raw_url: Option<&str>, source: &str) -> Option<String> {
    let redirect_url = raw_url.and_then(normalize_redirect_url);

    if let (None, Some(raw_url)) = (&redirect_url, raw_url) {
        tracing::warn!("Invalid redirect URL from {source}: {raw_url}");
    }

    redirect_url
}

#[derive(Deserialize)]
pub struct RedirectQuery {
    pub redirect_url: Option<String>,
}

/// Display the log-in page, or send users who are already logged in to the home page.
pub async fn get_log_in_page(jar: PrivateCookieJar, Query(query): Query<RedirectQuery>) -> Response {
    if get_token_from_cookies(&jar).is_ok() {
        return Redirect::to(endpoints::ROOT).into_response();
    }

    let redirect_url = parse_redirect_url(query.redirect_url.as_deref(), "log-in query");
    let form = log_in_form("", None, redirect_url.as_deref());
    let content = log_in_register("Log in to your account", &form);

    base("Log In", &[], &content).into_response()
}

/// The state needed to perform a login.
#[derive(Debug, Clone)]
pub struct LoginState {
    /// The key to be used for signing and encrypting private cookies.
    pub cookie_key: Key,
    /// The duration for which cookies used for authentication are valid.
    pub cookie_duration: Duration,
    /// The local timezone as a canonical timezone name, e.g. "Pacific/Auckland".
    pub local_timezone: String,
    pub db_connection: Arc<Mutex<Connection>>,
}

impl LoginState {
    /// Create the cookie key from a string and use the default cookie duration.
    pub fn new(
        cookie_secret: &str,
        local_timezone: &str,
        db_connection: Arc<Mutex<Connection>>,
    ) -> Self {
        Self {
            cookie_key: create_cookie_key(cookie_secret),
            cookie_duration: DEFAULT_COOKIE_DURATION,
            local_timezone: local_timezone.to_owned(),
            db_connection,
        }
    }
}

impl FromRef<AppState> for LoginState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            cookie_key: state.cookie_key.clone(),
            cookie_duration: state.cookie_duration,
            local_timezone: state.local_timezone.clone(),
            db_connection: state.db_connection.clone(),
        }
    }
}

impl FromRef<LoginState> for Key {
    fn from_ref(state: &LoginState) -> Self {
        state.cookie_key.clone()
    }
}

/// The raw data entered by the user in the log-in form.
#[derive(Clone, Serialize, Deserialize)]
pub struct LogInData {
    pub password: String,

    /// A checkbox, so any value means it was ticked.
    pub remember_me: Option<String>,

    /// Where to go after logging in. Only local paths are honoured.
    pub redirect_url: Option<String>,
}

/// Check the password and set the auth cookie.
///
/// On success the client is sent to the requested page, or the transactions
/// page if there was none. Otherwise the form is returned with an error message.
pub async fn post_log_in(
    State(state): State<LoginState>,
    jar: PrivateCookieJar,
    Form(user_data): Form<LogInData>,
) -> Response {
    let redirect_url = parse_redirect_url(user_data.redirect_url.as_deref(), "log-in form");
    let redirect_url = redirect_url.as_deref();
    let internal_error_form = || {
        log_in_form(
            "",
            Some("An internal error occurred. Please try again later."),
            redirect_url,
        )
        .into_response()
    };

    let user = {
        let connection = match state.db_connection.lock() {
            Ok(connection) => connection,
            Err(error) => {
                tracing::error!("could not acquire database lock: {error}");
                return internal_error_form();
            }
        };

        match get_user_by_id(UserID::new(1), &connection) {
            Ok(user) => user,
            Err(Error::NotFound) => {
                return log_in_form(
                    "",
                    Some("Password not set, go to the registration page and set your password"),
                    redirect_url,
                )
                .into_response();
            }
            Err(error) => {
                tracing::error!("Unhandled error while verifying credentials: {error}");
                return internal_error_form();
            }
        }
    };

    match user.password_hash.verify(&user_data.password) {
        Ok(true) => {}
        Ok(false) => {
            return log_in_form("", Some(INVALID_CREDENTIALS_ERROR_MSG), redirect_url)
                .into_response();
        }
        Err(error) => {
            tracing::error!("Unhandled error while verifying credentials: {error}");
            return internal_error_form();
        }
    }

    let cookie_duration = if user_data.remember_me.is_some() {
        REMEMBER_ME_COOKIE_DURATION
    } else {
        state.cookie_duration
    };

    let Some(local_offset) = get_local_offset(&state.local_timezone) else {
        return Error::InvalidTimezoneError(state.local_timezone).into_response();
    };

    let redirect_url = redirect_url.unwrap_or(endpoints::TRANSACTIONS_VIEW);

    match set_auth_cookie(jar.clone(), user.id, cookie_duration, local_offset) {
        Ok(jar) => (
            StatusCode::SEE_OTHER,
            HxRedirect(redirect_url.to_owned()),
            jar,
        )
            .into_response(),
        Err(error) => {
            tracing::error!("Error setting auth cookie: {error}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                HxRedirect(endpoints::INTERNAL_ERROR_VIEW.to_owned()),
                invalidate_auth_cookie(jar),
            )
                .into_response()
        }
    }
}

#[cfg(test)]
mod log_in_page_tests {
    use axum::{
        extract::Query,
        http::{StatusCode, header::LOCATION},
    };
    use axum_extra::extract::{PrivateCookieJar, cookie::Key};
    use scraper::Selector;
    use time::UtcOffset;

    use crate::{
        auth::{UserID, cookie::{DEFAULT_COOKIE_DURATION, set_auth_cookie}},
        endpoints,
        test_utils::{assert_content_type, assert_hx_endpoint, assert_valid_html, must_get_form, parse_html_document},
    };

    use super::{RedirectQuery, get_log_in_page};

    fn get_jar() -> PrivateCookieJar {
        PrivateCookieJar::new(Key::generate())
    }

    #[tokio::test]
    async fn displays_form() {
        let response = get_log_in_page(get_jar(), Query(RedirectQuery { redirect_url: None })).await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_content_type(&response, "text/html; charset=utf-8");

        let document = parse_html_document(response).await;
        assert_valid_html(&document);

        let form = must_get_form(&document);
        assert_hx_endpoint(&form, endpoints::LOG_IN_API, "hx-post");
        assert_eq!(
            form.select(&Selector::parse("input[type=password]").unwrap()).count(),
            1
        );

        let links = form
            .select(&Selector::parse("a[href]").unwrap())
            .filter_map(|link| link.value().attr("href"))
            .collect::<Vec<_>>();
        assert_eq!(links, [endpoints::FORGOT_PASSWORD_VIEW, endpoints::REGISTER_VIEW]);
    }

    #[tokio::test]
    async fn preserves_redirect_url() {
        let redirect_url = "/transactions?month=202510";

        let response = get_log_in_page(
            get_jar(),
            Query(RedirectQuery {
                redirect_url: Some(redirect_url.to_owned()),
            }),
        )
        .await;

        let document = parse_html_document(response).await;
        let input = document
            .select(&Selector::parse("input[name=redirect_url]").unwrap())
            .next()
            .expect("No redirect_url input found");
        assert_eq!(input.value().attr("value"), Some(redirect_url));
    }

    #[tokio::test]
    async fn drops_external_redirect_url() {
        let response = get_log_in_page(
            get_jar(),
            Query(RedirectQuery {
                redirect_url: Some("https://example.com".to_owned()),
            }),
        )
        .await;

        let document = parse_html_document(response).await;
        assert_eq!(
            document
                .select(&Selector::parse("input[name=redirect_url]").unwrap())
                .count(),
            0
        );
    }

    #[tokio::test]
    async fn logged_in_user_is_sent_home() {
        let jar = set_auth_cookie(get_jar(), UserID::new(1), DEFAULT_COOKIE_DURATION, UtcOffset::UTC)
            .unwrap();

        let response = get_log_in_page(jar, Query(RedirectQuery { redirect_url: None })).await;

        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(response.headers().get(LOCATION).unwrap(), endpoints::ROOT);
    }
}

#[cfg(test)]
mod post_log_in_tests {
    use std::sync::{Arc, Mutex};

    use axum::{
        Form, Router,
        body::Body,
        extract::State,
        http::{Response, StatusCode},
        routing::post,
    };
    use axum_extra::extract::PrivateCookieJar;
    use axum_test::TestServer;
    use rusqlite::Connection;
    use scraper::Selector;
    use time::{Duration, OffsetDateTime};

    use crate::{
        auth::{COOKIE_TOKEN, PasswordHash, ValidatedPassword, create_user, create_user_table},
        endpoints,
        test_utils::{assert_hx_redirect, parse_html_fragment},
    };

    use super::{INVALID_CREDENTIALS_ERROR_MSG, LogInData, LoginState, REMEMBER_ME_COOKIE_DURATION, post_log_in};

    fn get_state(with_user: bool) -> LoginState {
        let connection =
            Connection::open_in_memory().expect("Could not open in-memory SQLite database");
        create_user_table(&connection).expect("Could not create user table");

        if with_user {
            let hash = PasswordHash::new(ValidatedPassword::new_unchecked("test"), 4)
                .expect("Could not hash test password");
            create_user(hash, &connection).expect("Could not create test user");
        }

        LoginState::new("foobar", "Etc/UTC", Arc::new(Mutex::new(connection)))
    }

    async fn log_in(state: LoginState, password: &str, redirect_url: Option<&str>) -> Response<Body> {
        let jar = PrivateCookieJar::new(state.cookie_key.clone());
        let form = LogInData {
            password: password.to_owned(),
            remember_me: None,
            redirect_url: redirect_url.map(str::to_owned),
        };

        post_log_in(State(state), jar, Form(form)).await
    }

    #[track_caller]
    fn assert_token_cookie_set(response: &Response<Body>) {
        let has_token = response
            .headers()
            .get_all("set-cookie")
            .iter()
            .any(|value| value.to_str().unwrap().starts_with(&format!("{COOKIE_TOKEN}=")));

        assert!(has_token, "want a {COOKIE_TOKEN} cookie to be set");
    }

    async fn get_error_message(response: Response<Body>) -> String {
        let fragment = parse_html_fragment(response).await;

        fragment
            .select(&Selector::parse("p.text-red-500").unwrap())
            .next()
            .expect("No error message found")
            .text()
            .collect::<String>()
            .trim()
            .to_owned()
    }

    #[tokio::test]
    async fn valid_password_redirects_to_transactions() {
        let response = log_in(get_state(true), "test", None).await;

        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_hx_redirect(&response, endpoints::TRANSACTIONS_VIEW);
        assert_token_cookie_set(&response);
    }

    #[tokio::test]
    async fn redirects_to_requested_url() {
        let response = log_in(get_state(true), "test", Some("/budgets")).await;

        assert_hx_redirect(&response, "/budgets");
    }

    #[tokio::test]
    async fn ignores_external_redirect_url() {
        let response = log_in(get_state(true), "test", Some("https://example.com")).await;

        assert_hx_redirect(&response, endpoints::TRANSACTIONS_VIEW);
    }

    #[tokio::test]
    async fn wrong_password_shows_error() {
        let response = log_in(get_state(true), "wrongpassword", None).await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(get_error_message(response).await, INVALID_CREDENTIALS_ERROR_MSG);
    }

    #[tokio::test]
    async fn missing_user_points_to_registration() {
        let response = log_in(get_state(false), "test", None).await;

        assert_eq!(
            get_error_message(response).await,
            "Password not set, go to the registration page and set your password"
        );
    }

    #[tokio::test]
    async fn missing_password_is_rejected() {
        let app = Router::new()
            .route(endpoints::LOG_IN_API, post(post_log_in))
            .with_state(get_state(false));
        let server = TestServer::try_new(app).expect("Could not create test server.");

        server
            .post(endpoints::LOG_IN_API)
            .content_type("application/x-www-form-urlencoded")
            .await
            .assert_status(StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn remember_me_keeps_cookie_for_a_week() {
        let app = Router::new()
            .route(endpoints::LOG_IN_API, post(post_log_in))
            .with_state(get_state(true));
        let server = TestServer::try_new(app).expect("Could not create test server.");

        let response = server
            .post(endpoints::LOG_IN_API)
            .form(&[("password", "test"), ("remember_me", "on")])
            .await;

        assert_eq!(response.status_code(), StatusCode::SEE_OTHER);
        let expires = response.cookie(COOKIE_TOKEN).expires_datetime().unwrap();
        let want = OffsetDateTime::now_utc() + REMEMBER_ME_COOKIE_DURATION;
        assert!((expires - want).abs() < Duration::seconds(2));
    }
}
