//! Session cookies on the public surface.
//!
//! `resolve_session` runs before every handler and stores the
//! [`Authenticated`] session in the request extensions; the extractors only
//! read it back.

use std::convert::Infallible;

use axum::{
    body::Body,
    extract::{FromRequestParts, State},
    http::{Request, request::Parts},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use time::OffsetDateTime;
use tracing::debug;

use crate::{
    application::accounts::{Authenticated, SessionError},
    config::AuthSettings,
};

use super::{public::HttpState, repo_error_to_http};

pub(super) async fn resolve_session(
    State(state): State<HttpState>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let jar = CookieJar::from_headers(request.headers());
    if let Some(cookie) = jar.get(&state.auth.cookie_name) {
        match state.accounts.authenticate(cookie.value()).await {
            Ok(auth) => {
                request.extensions_mut().insert(auth);
            }
            Err(SessionError::Repo(err)) => {
                return repo_error_to_http("infra::http::auth::resolve_session", err)
                    .into_response();
            }
            Err(err) => {
                debug!(
                    target = "yatube::http::auth",
                    error = %err,
                    "ignoring unusable session cookie"
                );
            }
        }
    }

    next.run(request).await
}

/// The signed-in user, if any.
#[derive(Debug, Clone)]
pub struct Viewer(pub Option<Authenticated>);

impl Viewer {
    pub fn user(&self) -> Option<&crate::domain::entities::UserRecord> {
        self.0.as_ref().map(|auth| &auth.user)
    }
}

impl<S> FromRequestParts<S> for Viewer
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self(parts.extensions.get::<Authenticated>().cloned()))
    }
}

/// A signed-in user; anonymous requests are redirected to the login page.
#[derive(Debug, Clone)]
pub struct RequireUser(pub Authenticated);

impl FromRequestParts<HttpState> for RequireUser {
    type Rejection = Redirect;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &HttpState,
    ) -> Result<Self, Self::Rejection> {
        match parts.extensions.get::<Authenticated>() {
            Some(auth) => Ok(Self(auth.clone())),
            None => {
                let next = parts
                    .uri
                    .path_and_query()
                    .map(|value| value.as_str())
                    .unwrap_or("/");
                Err(Redirect::to(&login_redirect_target(
                    &state.auth.login_url,
                    next,
                )))
            }
        }
    }
}

/// `<login_url>?next=<target>` with the target form-encoded except for `/`.
pub fn login_redirect_target(login_url: &str, next: &str) -> String {
    let encoded: String = url::form_urlencoded::byte_serialize(next.as_bytes()).collect();
    format!("{login_url}?next={}", encoded.replace("%2F", "/"))
}

/// Only same-site absolute paths are honoured as post-login targets.
pub(super) fn safe_next(next: Option<&str>) -> Option<&str> {
    next.map(str::trim)
        .filter(|value| value.starts_with('/') && !value.starts_with("//") && !value.contains('\\'))
}

pub(super) fn session_cookie(
    settings: &AuthSettings,
    token: String,
    expires_at: OffsetDateTime,
) -> Cookie<'static> {
    Cookie::build((settings.cookie_name.clone(), token))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(settings.cookie_secure)
        .expires(expires_at)
        .build()
}

pub(super) fn expired_session_cookie(settings: &AuthSettings) -> Cookie<'static> {
    Cookie::build(settings.cookie_name.clone()).path("/").build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn login_target_keeps_slashes() {
        assert_eq!(
            login_redirect_target("/auth/login/", "/create/"),
            "/auth/login/?next=/create/"
        );
        assert_eq!(
            login_redirect_target("/auth/login/", "/follow/?page=2"),
            "/auth/login/?next=/follow/%3Fpage%3D2"
        );
    }

    #[test]
    fn next_must_stay_on_site() {
        assert_eq!(safe_next(Some("/posts/1/")), Some("/posts/1/"));
        assert_eq!(safe_next(Some("//evil.example")), None);
        assert_eq!(safe_next(Some("https://evil.example")), None);
        assert_eq!(safe_next(None), None);
    }
}
