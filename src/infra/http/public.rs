use std::{io::ErrorKind, sync::Arc};

use axum::{
    Router,
    body::Body,
    extract::{DefaultBodyLimit, Path, Query, State},
    http::{
        HeaderValue, StatusCode,
        header::{CACHE_CONTROL, CONTENT_LENGTH, CONTENT_TYPE},
    },
    middleware,
    response::{IntoResponse, Redirect, Response},
    routing::get,
};
use bytes::Bytes;
use serde::Deserialize;
use tracing::error;

use crate::{
    application::{
        accounts::AccountService,
        error::{ErrorReport, HttpError},
        follows::{FollowError, FollowService},
        listing::{ListingError, ListingService},
        posts::PostService,
    },
    cache::{FeedCache, index_cache_layer},
    config::AuthSettings,
    infra::uploads::{UploadStorage, UploadStorageError},
    presentation::views::{
        FollowContext, FollowTemplate, GroupContext, GroupTemplate, IndexContext, IndexTemplate,
        LayoutContext, NavView, PostList, ProfileContext, ProfileTemplate,
        render_not_found_response, render_template_response,
    },
};

use super::{
    accounts,
    auth::{RequireUser, Viewer, resolve_session},
    middleware::{log_responses, set_request_context},
    posts, repo_error_to_http,
};

#[derive(Clone)]
pub struct HttpState {
    pub listing: Arc<ListingService>,
    pub posts: Arc<PostService>,
    pub follows: Arc<FollowService>,
    pub accounts: Arc<AccountService>,
    pub upload_storage: Arc<UploadStorage>,
    pub feed_cache: Arc<FeedCache>,
    pub auth: Arc<AuthSettings>,
    pub upload_limit_bytes: usize,
}

pub fn build_router(state: HttpState) -> Router {
    // Only the home listing goes through the feed cache.
    let cached_routes = Router::new()
        .route("/", get(index))
        .layer(middleware::from_fn_with_state(
            state.feed_cache.clone(),
            index_cache_layer,
        ));

    let upload_routes = Router::new()
        .route(
            "/create/",
            get(posts::create_form).post(posts::create_submit),
        )
        .route(
            "/posts/{id}/edit/",
            get(posts::edit_form).post(posts::edit_submit),
        )
        .layer(DefaultBodyLimit::max(state.upload_limit_bytes));

    let routes = Router::new()
        .route("/group/{slug}/", get(group_posts))
        .route("/profile/{username}/", get(profile))
        .route("/profile/{username}/follow/", get(profile_follow))
        .route("/profile/{username}/unfollow/", get(profile_unfollow))
        .route("/follow/", get(follow_index))
        .route("/posts/{id}/", get(posts::post_detail))
        .route(
            "/posts/{id}/comment/",
            get(posts::comment_redirect).post(posts::add_comment),
        )
        .route(
            "/auth/signup/",
            get(accounts::signup_page).post(accounts::signup_submit),
        )
        .route(
            "/auth/login/",
            get(accounts::login_page).post(accounts::login_submit),
        )
        .route(
            "/auth/logout/",
            get(accounts::logout).post(accounts::logout),
        )
        .route(
            "/auth/password_change/",
            get(accounts::password_change_page).post(accounts::password_change_submit),
        )
        .route(
            "/auth/password_change/done/",
            get(accounts::password_change_done),
        )
        .route("/media/{*path}", get(serve_media))
        .fallback(fallback);

    cached_routes
        .merge(upload_routes)
        .merge(routes)
        .with_state(state.clone())
        .layer(middleware::from_fn(log_responses))
        .layer(middleware::from_fn_with_state(state, resolve_session))
        .layer(middleware::from_fn(set_request_context))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct PageQuery {
    page: Option<String>,
}

/// Rendered identically for every viewer: the response is cached under a
/// single key and replayed to anonymous and signed-in users alike, so the
/// header carries no sign-in state.
async fn index(State(state): State<HttpState>, Query(query): Query<PageQuery>) -> Response {
    let nav = NavView::shared();
    match state.listing.index(query.page.as_deref()).await {
        Ok(page) => {
            let content = IndexContext {
                list: PostList::from(&page),
            };
            let view = LayoutContext::new(nav, "Latest updates", content);
            render_template_response(IndexTemplate { view }, StatusCode::OK)
        }
        Err(err) => listing_error_response("infra::http::public::index", err, nav),
    }
}

async fn group_posts(
    State(state): State<HttpState>,
    viewer: Viewer,
    Path(slug): Path<String>,
    Query(query): Query<PageQuery>,
) -> Response {
    let nav = NavView::for_viewer(viewer.user());
    match state.listing.group(&slug, query.page.as_deref()).await {
        Ok(listing) => {
            let content = GroupContext::new(&listing.group, PostList::from(&listing.page));
            let view = LayoutContext::new(nav, listing.group.title.clone(), content);
            render_template_response(GroupTemplate { view }, StatusCode::OK)
        }
        Err(err) => listing_error_response("infra::http::public::group_posts", err, nav),
    }
}

async fn profile(
    State(state): State<HttpState>,
    viewer: Viewer,
    Path(username): Path<String>,
    Query(query): Query<PageQuery>,
) -> Response {
    let nav = NavView::for_viewer(viewer.user());
    match state
        .listing
        .profile(&username, viewer.user(), query.page.as_deref())
        .await
    {
        Ok(listing) => {
            let author = &listing.author;
            let content = ProfileContext {
                username: author.username.clone(),
                display_name: author.display_name(),
                followers: listing.followers,
                follows: listing.follows,
                following: listing.following,
                can_follow: viewer.user().is_some_and(|user| user.id != author.id),
                list: PostList::from(&listing.page),
            };
            let title = format!("Profile of {}", author.display_name());
            let view = LayoutContext::new(nav, title, content);
            render_template_response(ProfileTemplate { view }, StatusCode::OK)
        }
        Err(err) => listing_error_response("infra::http::public::profile", err, nav),
    }
}

async fn follow_index(
    State(state): State<HttpState>,
    RequireUser(auth): RequireUser,
    Query(query): Query<PageQuery>,
) -> Response {
    let nav = NavView::for_viewer(Some(&auth.user));
    match state.follows.feed(&auth.user, query.page.as_deref()).await {
        Ok(page) => {
            let content = FollowContext {
                list: PostList::from(&page),
            };
            let view = LayoutContext::new(nav, "Following", content);
            render_template_response(FollowTemplate { view }, StatusCode::OK)
        }
        Err(err) => follow_error_response("infra::http::public::follow_index", err, nav),
    }
}

async fn profile_follow(
    State(state): State<HttpState>,
    RequireUser(auth): RequireUser,
    Path(username): Path<String>,
) -> Response {
    match state.follows.follow_username(&auth.user, &username).await {
        Ok(_) => Redirect::to(&format!("/profile/{username}/")).into_response(),
        Err(err) => follow_error_response(
            "infra::http::public::profile_follow",
            err,
            NavView::for_viewer(Some(&auth.user)),
        ),
    }
}

async fn profile_unfollow(
    State(state): State<HttpState>,
    RequireUser(auth): RequireUser,
    Path(username): Path<String>,
) -> Response {
    match state.follows.unfollow_username(&auth.user, &username).await {
        Ok(_) => Redirect::to(&format!("/profile/{username}/")).into_response(),
        Err(err) => follow_error_response(
            "infra::http::public::profile_unfollow",
            err,
            NavView::for_viewer(Some(&auth.user)),
        ),
    }
}

async fn serve_media(State(state): State<HttpState>, Path(path): Path<String>) -> Response {
    const SOURCE: &str = "infra::http::public::serve_media";

    match state.upload_storage.read(&path).await {
        Ok(bytes) => build_media_response(&path, bytes),
        Err(UploadStorageError::InvalidPath) => HttpError::new(
            SOURCE,
            StatusCode::NOT_FOUND,
            "File not found",
            "The requested file is not available",
        )
        .into_response(),
        Err(UploadStorageError::Io(err)) if err.kind() == ErrorKind::NotFound => HttpError::new(
            SOURCE,
            StatusCode::NOT_FOUND,
            "File not found",
            "The requested file is not available",
        )
        .into_response(),
        Err(err) => {
            error!(
                target = SOURCE,
                path = %path,
                error = %err,
                "failed to read stored image"
            );
            HttpError::internal(SOURCE, &err).into_response()
        }
    }
}

fn build_media_response(path: &str, bytes: Bytes) -> Response {
    let length = bytes.len();
    let mut response = Response::new(Body::from(bytes));
    *response.status_mut() = StatusCode::OK;

    let headers = response.headers_mut();
    let mime = mime_guess::from_path(path).first_or_octet_stream();
    if let Ok(value) = HeaderValue::from_str(mime.as_ref()) {
        headers.insert(CONTENT_TYPE, value);
    }
    if let Ok(value) = HeaderValue::from_str(&length.to_string()) {
        headers.insert(CONTENT_LENGTH, value);
    }
    headers.insert(
        CACHE_CONTROL,
        HeaderValue::from_static("public, max-age=31536000, immutable"),
    );

    response
}

async fn fallback(viewer: Viewer) -> Response {
    render_not_found_response(NavView::for_viewer(viewer.user()))
}

fn listing_error_response(source: &'static str, err: ListingError, nav: NavView) -> Response {
    match err {
        ListingError::UnknownGroup | ListingError::UnknownAuthor => {
            let mut response = render_not_found_response(nav);
            ErrorReport::from_error(source, StatusCode::NOT_FOUND, &err).attach(&mut response);
            response
        }
        ListingError::Repo(err) => repo_error_to_http(source, err).into_response(),
    }
}

fn follow_error_response(source: &'static str, err: FollowError, nav: NavView) -> Response {
    match err {
        FollowError::UnknownAuthor => {
            let mut response = render_not_found_response(nav);
            ErrorReport::from_error(source, StatusCode::NOT_FOUND, &err).attach(&mut response);
            response
        }
        FollowError::Repo(err) => repo_error_to_http(source, err).into_response(),
    }
}
