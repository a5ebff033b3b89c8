//! Signup, login, logout and password change pages.

use axum::{
    Form,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::CookieJar;
use metrics::counter;
use serde::Deserialize;

use crate::{
    application::{
        accounts::{AccountError, IssuedSession, LoginForm, PasswordChangeForm, SignupForm},
        error::HttpError,
    },
    presentation::views::{
        LayoutContext, LoggedOutTemplate, LoginContext, LoginTemplate, NavView,
        PasswordChangeContext, PasswordChangeDoneTemplate, PasswordChangeTemplate, SignupContext,
        SignupTemplate, render_template_response,
    },
};

use super::{
    auth::{RequireUser, Viewer, expired_session_cookie, safe_next, session_cookie},
    public::HttpState,
    repo_error_to_http,
};

const PASSWORD_CHANGE_DONE: &str = "/auth/password_change/done/";

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(super) struct SignupPayload {
    first_name: String,
    last_name: String,
    username: String,
    email: String,
    password1: String,
    password2: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(super) struct LoginPayload {
    username: String,
    password: String,
    next: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(super) struct NextQuery {
    next: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(super) struct PasswordChangePayload {
    old_password: String,
    new_password1: String,
    new_password2: String,
}

pub(super) async fn signup_page(viewer: Viewer) -> Response {
    render_signup(NavView::for_viewer(viewer.user()), SignupContext::default())
}

pub(super) async fn signup_submit(
    State(state): State<HttpState>,
    jar: CookieJar,
    Form(payload): Form<SignupPayload>,
) -> Response {
    const SOURCE: &str = "infra::http::accounts::signup_submit";

    let form = SignupForm {
        first_name: payload.first_name.clone(),
        last_name: payload.last_name.clone(),
        username: payload.username.clone(),
        email: payload.email.clone(),
        password1: payload.password1,
        password2: payload.password2,
    };

    let user = match state.accounts.register(form).await {
        Ok(user) => user,
        Err(AccountError::Invalid(errors)) => {
            let context = SignupContext {
                first_name: payload.first_name,
                last_name: payload.last_name,
                username: payload.username,
                email: payload.email,
                errors,
            };
            return render_signup(NavView::anonymous(), context);
        }
        Err(err) => return account_error_response(SOURCE, err),
    };

    match state.accounts.issue_session(user).await {
        Ok(session) => sign_in(&state, jar, session, "/"),
        Err(err) => account_error_response(SOURCE, err),
    }
}

pub(super) async fn login_page(viewer: Viewer, Query(query): Query<NextQuery>) -> Response {
    let context = LoginContext {
        next: safe_next(query.next.as_deref()).map(str::to_string),
        ..LoginContext::default()
    };
    render_login(NavView::for_viewer(viewer.user()), context)
}

pub(super) async fn login_submit(
    State(state): State<HttpState>,
    jar: CookieJar,
    Query(query): Query<NextQuery>,
    Form(payload): Form<LoginPayload>,
) -> Response {
    let next = safe_next(payload.next.as_deref().or(query.next.as_deref())).map(str::to_string);
    let form = LoginForm {
        username: payload.username.clone(),
        password: payload.password,
    };

    match state.accounts.login(form).await {
        Ok(session) => sign_in(&state, jar, session, next.as_deref().unwrap_or("/")),
        Err(AccountError::Invalid(errors)) => render_login(
            NavView::anonymous(),
            LoginContext {
                username: payload.username,
                next,
                errors,
            },
        ),
        Err(err) => account_error_response("infra::http::accounts::login_submit", err),
    }
}

pub(super) async fn logout(State(state): State<HttpState>, jar: CookieJar) -> Response {
    if let Some(cookie) = jar.get(&state.auth.cookie_name)
        && let Err(err) = state.accounts.logout(cookie.value()).await
    {
        return account_error_response("infra::http::accounts::logout", err);
    }

    let jar = jar.remove(expired_session_cookie(&state.auth));
    let view = LayoutContext::new(NavView::anonymous(), "Signed out", ());
    (
        jar,
        render_template_response(LoggedOutTemplate { view }, StatusCode::OK),
    )
        .into_response()
}

pub(super) async fn password_change_page(RequireUser(auth): RequireUser) -> Response {
    render_password_change(
        NavView::for_viewer(Some(&auth.user)),
        PasswordChangeContext::default(),
    )
}

pub(super) async fn password_change_submit(
    State(state): State<HttpState>,
    RequireUser(auth): RequireUser,
    Form(payload): Form<PasswordChangePayload>,
) -> Response {
    let form = PasswordChangeForm {
        old_password: payload.old_password,
        new_password1: payload.new_password1,
        new_password2: payload.new_password2,
    };

    match state.accounts.change_password(&auth, form).await {
        Ok(()) => Redirect::to(PASSWORD_CHANGE_DONE).into_response(),
        Err(AccountError::Invalid(errors)) => render_password_change(
            NavView::for_viewer(Some(&auth.user)),
            PasswordChangeContext { errors },
        ),
        Err(err) => {
            account_error_response("infra::http::accounts::password_change_submit", err)
        }
    }
}

pub(super) async fn password_change_done(RequireUser(auth): RequireUser) -> Response {
    let view = LayoutContext::new(
        NavView::for_viewer(Some(&auth.user)),
        "Password changed",
        (),
    );
    render_template_response(PasswordChangeDoneTemplate { view }, StatusCode::OK)
}

fn sign_in(state: &HttpState, jar: CookieJar, session: IssuedSession, target: &str) -> Response {
    counter!("yatube_logins_total").increment(1);
    let jar = jar.add(session_cookie(
        &state.auth,
        session.token,
        session.expires_at,
    ));
    (jar, Redirect::to(target)).into_response()
}

fn render_signup(nav: NavView, context: SignupContext) -> Response {
    let view = LayoutContext::new(nav, "Sign up", context);
    render_template_response(SignupTemplate { view }, StatusCode::OK)
}

fn render_login(nav: NavView, context: LoginContext) -> Response {
    let view = LayoutContext::new(nav, "Log in", context);
    render_template_response(LoginTemplate { view }, StatusCode::OK)
}

fn render_password_change(nav: NavView, context: PasswordChangeContext) -> Response {
    let view = LayoutContext::new(nav, "Change password", context);
    render_template_response(PasswordChangeTemplate { view }, StatusCode::OK)
}

fn account_error_response(source: &'static str, err: AccountError) -> Response {
    match err {
        AccountError::Repo(err) => repo_error_to_http(source, err).into_response(),
        AccountError::Invalid(errors) => HttpError::new(
            source,
            StatusCode::BAD_REQUEST,
            "Invalid form submission",
            errors.to_string(),
        )
        .into_response(),
        other => HttpError::internal(source, &other).into_response(),
    }
}

