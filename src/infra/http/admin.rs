//! Administrative listener: health, feed cache control and group management.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    middleware,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;

use crate::{
    application::{
        error::ErrorReport,
        groups::{CreateGroupCommand, GroupError, GroupService},
    },
    cache::FeedCache,
    domain::entities::GroupRecord,
    infra::db::PostgresRepositories,
};

use super::{
    db_health_response,
    middleware::{log_responses, set_request_context},
    repo_error_to_http,
};

#[derive(Clone)]
pub struct AdminState {
    pub db: Arc<PostgresRepositories>,
    pub feed_cache: Arc<FeedCache>,
    pub groups: Arc<GroupService>,
}

pub fn build_admin_router(state: AdminState) -> Router {
    Router::new()
        .route("/_health/db", get(admin_health))
        .route("/cache/clear", post(clear_feed_cache))
        .route("/groups", get(list_groups).post(create_group))
        .route("/groups/{slug}", delete(delete_group))
        .with_state(state)
        .layer(middleware::from_fn(log_responses))
        .layer(middleware::from_fn(set_request_context))
}

#[derive(Debug, Deserialize)]
struct CreateGroupRequest {
    title: String,
    #[serde(default)]
    slug: Option<String>,
    #[serde(default)]
    description: String,
}

#[derive(Debug, Serialize)]
struct GroupResponse {
    id: i64,
    title: String,
    slug: String,
    description: String,
}

impl From<GroupRecord> for GroupResponse {
    fn from(group: GroupRecord) -> Self {
        Self {
            id: group.id,
            title: group.title,
            slug: group.slug,
            description: group.description,
        }
    }
}

async fn admin_health(State(state): State<AdminState>) -> Response {
    db_health_response(state.db.health_check().await)
}

async fn clear_feed_cache(State(state): State<AdminState>) -> Response {
    let cleared = state.feed_cache.clear();
    info!(
        target = "yatube::http::admin",
        key = state.feed_cache.key(),
        cleared,
        "feed cache cleared"
    );
    Json(json!({ "key": state.feed_cache.key(), "cleared": cleared })).into_response()
}

async fn list_groups(State(state): State<AdminState>) -> Response {
    match state.groups.list().await {
        Ok(groups) => {
            let body: Vec<GroupResponse> = groups.into_iter().map(GroupResponse::from).collect();
            Json(body).into_response()
        }
        Err(err) => group_error_response("infra::http::admin::list_groups", err),
    }
}

async fn create_group(
    State(state): State<AdminState>,
    Json(payload): Json<CreateGroupRequest>,
) -> Response {
    let command = CreateGroupCommand {
        title: payload.title,
        slug: payload.slug,
        description: payload.description,
    };

    match state.groups.create(command).await {
        Ok(group) => (StatusCode::CREATED, Json(GroupResponse::from(group))).into_response(),
        Err(err) => group_error_response("infra::http::admin::create_group", err),
    }
}

async fn delete_group(State(state): State<AdminState>, Path(slug): Path<String>) -> Response {
    match state.groups.delete(&slug).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => group_error_response("infra::http::admin::delete_group", err),
    }
}

fn group_error_response(source: &'static str, err: GroupError) -> Response {
    if let GroupError::Repo(repo) = err {
        return repo_error_to_http(source, repo).into_response();
    }

    let status = match &err {
        GroupError::Invalid { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        GroupError::SlugTaken(_) => StatusCode::CONFLICT,
        GroupError::NotFound => StatusCode::NOT_FOUND,
        GroupError::Repo(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };

    let mut response = (status, Json(json!({ "error": err.to_string() }))).into_response();
    ErrorReport::from_error(source, status, &err).attach(&mut response);
    response
}
