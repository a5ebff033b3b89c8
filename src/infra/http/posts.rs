//! Post detail, post create/edit forms and comments.

use axum::{
    Form,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::{Multipart, multipart::MultipartError};
use metrics::counter;
use serde::Deserialize;
use tracing::{debug, error};

use crate::{
    application::{
        error::HttpError,
        forms::FormErrors,
        posts::{
            CommentOutcome, EditAccess, EditOutcome, ImageUpload, PostDetail, PostError, PostForm,
        },
    },
    domain::entities::PostRecord,
    presentation::views::{
        CommentView, LayoutContext, NavView, PostCard, PostDetailContext, PostDetailTemplate,
        PostFormContext, PostFormTemplate, render_not_found_response, render_template_response,
    },
};

use super::{
    auth::{RequireUser, Viewer},
    public::HttpState,
    repo_error_to_http,
};

const SOURCE_BASE: &str = "infra::http::posts";

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(super) struct CommentForm {
    text: String,
}

/// Route ids are matched as integers; anything else is a missing page.
fn parse_post_id(raw: &str) -> Option<i64> {
    raw.parse::<i64>().ok().filter(|id| *id > 0)
}

fn detail_path(post_id: i64) -> String {
    format!("/posts/{post_id}/")
}

pub(super) async fn post_detail(
    State(state): State<HttpState>,
    viewer: Viewer,
    Path(raw_id): Path<String>,
) -> Response {
    let nav = NavView::for_viewer(viewer.user());
    let Some(post_id) = parse_post_id(&raw_id) else {
        return render_not_found_response(nav);
    };

    match state.posts.post_detail(post_id).await {
        Ok(detail) => render_detail(&viewer, nav, detail),
        Err(err) => post_error_response("infra::http::posts::post_detail", err, nav),
    }
}

pub(super) async fn add_comment(
    State(state): State<HttpState>,
    RequireUser(auth): RequireUser,
    Path(raw_id): Path<String>,
    Form(form): Form<CommentForm>,
) -> Response {
    const SOURCE: &str = "infra::http::posts::add_comment";
    let nav = NavView::for_viewer(Some(&auth.user));
    let Some(post_id) = parse_post_id(&raw_id) else {
        return render_not_found_response(nav);
    };

    match state
        .posts
        .create_comment(&auth.user, post_id, &form.text)
        .await
    {
        Ok(CommentOutcome::Created(_)) => {
            counter!("yatube_comments_created_total").increment(1);
            Redirect::to(&detail_path(post_id)).into_response()
        }
        Ok(CommentOutcome::Rejected(errors)) => {
            debug!(target = SOURCE, post_id, errors = %errors, "comment rejected");
            Redirect::to(&detail_path(post_id)).into_response()
        }
        Err(err) => post_error_response(SOURCE, err, nav),
    }
}

/// A GET on the comment target, typically the `next` hop after logging in,
/// leads back to the post.
pub(super) async fn comment_redirect(
    State(state): State<HttpState>,
    RequireUser(auth): RequireUser,
    Path(raw_id): Path<String>,
) -> Response {
    let nav = NavView::for_viewer(Some(&auth.user));
    let Some(post_id) = parse_post_id(&raw_id) else {
        return render_not_found_response(nav);
    };

    match state.posts.post_detail(post_id).await {
        Ok(_) => Redirect::to(&detail_path(post_id)).into_response(),
        Err(err) => post_error_response("infra::http::posts::comment_redirect", err, nav),
    }
}

pub(super) async fn create_form(
    State(state): State<HttpState>,
    RequireUser(auth): RequireUser,
) -> Response {
    let nav = NavView::for_viewer(Some(&auth.user));
    render_post_form(
        &state,
        nav,
        None,
        String::new(),
        None,
        None,
        FormErrors::new(),
    )
    .await
}

pub(super) async fn create_submit(
    State(state): State<HttpState>,
    RequireUser(auth): RequireUser,
    mut multipart: Multipart,
) -> Response {
    const SOURCE: &str = "infra::http::posts::create_submit";
    let nav = NavView::for_viewer(Some(&auth.user));

    let form = match read_post_form(&mut multipart).await {
        Ok(form) => form,
        Err(err) => return err.into_response(),
    };
    let (text, group) = (form.text.clone(), form.group.clone());

    match state.posts.create_post(&auth.user, form).await {
        Ok(_) => {
            counter!("yatube_posts_created_total").increment(1);
            Redirect::to(&format!("/profile/{}/", auth.user.username)).into_response()
        }
        Err(PostError::Invalid(errors)) => {
            render_post_form(
                &state,
                nav,
                None,
                text,
                group.as_deref(),
                None,
                errors,
            )
            .await
        }
        Err(err) => post_error_response(SOURCE, err, nav),
    }
}

pub(super) async fn edit_form(
    State(state): State<HttpState>,
    RequireUser(auth): RequireUser,
    Path(raw_id): Path<String>,
) -> Response {
    let nav = NavView::for_viewer(Some(&auth.user));
    let Some(post_id) = parse_post_id(&raw_id) else {
        return render_not_found_response(nav);
    };

    match state.posts.edit_access(&auth.user, post_id).await {
        Ok(EditAccess::Allowed(post)) => {
            let group = post.group_id.map(|id| id.to_string());
            render_post_form(
                &state,
                nav,
                Some(post.id),
                post.text.clone(),
                group.as_deref(),
                post.image.as_deref(),
                FormErrors::new(),
            )
            .await
        }
        Ok(EditAccess::Forbidden) => Redirect::to(&detail_path(post_id)).into_response(),
        Err(err) => post_error_response("infra::http::posts::edit_form", err, nav),
    }
}

pub(super) async fn edit_submit(
    State(state): State<HttpState>,
    RequireUser(auth): RequireUser,
    Path(raw_id): Path<String>,
    mut multipart: Multipart,
) -> Response {
    const SOURCE: &str = "infra::http::posts::edit_submit";
    let nav = NavView::for_viewer(Some(&auth.user));
    let Some(post_id) = parse_post_id(&raw_id) else {
        return render_not_found_response(nav);
    };

    let current: PostRecord = match state.posts.edit_access(&auth.user, post_id).await {
        Ok(EditAccess::Allowed(post)) => post,
        Ok(EditAccess::Forbidden) => return Redirect::to(&detail_path(post_id)).into_response(),
        Err(err) => return post_error_response(SOURCE, err, nav),
    };

    let form = match read_post_form(&mut multipart).await {
        Ok(form) => form,
        Err(err) => return err.into_response(),
    };
    let (text, group) = (form.text.clone(), form.group.clone());

    match state.posts.edit_post(&auth.user, post_id, form).await {
        Ok(EditOutcome::Updated(post)) => Redirect::to(&detail_path(post.id)).into_response(),
        Ok(EditOutcome::Forbidden) => Redirect::to(&detail_path(post_id)).into_response(),
        Err(PostError::Invalid(errors)) => {
            render_post_form(
                &state,
                nav,
                Some(current.id),
                text,
                group.as_deref(),
                current.image.as_deref(),
                errors,
            )
            .await
        }
        Err(err) => post_error_response(SOURCE, err, nav),
    }
}

fn render_detail(viewer: &Viewer, nav: NavView, detail: PostDetail) -> Response {
    let PostDetail {
        post,
        comments,
        author_posts,
    } = detail;

    let can_edit = viewer.user().is_some_and(|user| user.id == post.author_id);
    let content = PostDetailContext {
        post: PostCard::from(&post),
        author_posts,
        comments: comments.iter().map(CommentView::from).collect(),
        can_edit,
        can_comment: viewer.user().is_some(),
    };
    let view = LayoutContext::new(nav, format!("Post {}", post.short()), content);
    render_template_response(PostDetailTemplate { view }, StatusCode::OK)
}

async fn render_post_form(
    state: &HttpState,
    nav: NavView,
    post_id: Option<i64>,
    text: String,
    group: Option<&str>,
    current_image: Option<&str>,
    errors: FormErrors,
) -> Response {
    let groups = match state.listing.groups().await {
        Ok(groups) => groups,
        Err(err) => {
            return HttpError::internal("infra::http::posts::render_post_form", &err)
                .into_response();
        }
    };

    let content = PostFormContext::new(post_id, text, &groups, group, current_image, errors);
    let title = if content.is_edit() {
        "Edit post"
    } else {
        "New post"
    };
    let view = LayoutContext::new(nav, title, content);
    render_template_response(PostFormTemplate { view }, StatusCode::OK)
}

/// Collect the `text`, `group`, `image` and `image-clear` parts of a post form.
async fn read_post_form(multipart: &mut Multipart) -> Result<PostForm, HttpError> {
    let mut form = PostForm::default();

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        match field.name() {
            Some("text") => {
                form.text = field.text().await.map_err(multipart_error)?;
            }
            Some("group") => {
                form.group = Some(field.text().await.map_err(multipart_error)?);
            }
            Some("image-clear") => {
                let value = field.text().await.map_err(multipart_error)?;
                form.clear_image = matches!(
                    value.trim().to_ascii_lowercase().as_str(),
                    "on" | "true" | "1" | "yes"
                );
            }
            Some("image") => {
                let filename = field
                    .file_name()
                    .map(|value| value.trim().to_string())
                    .filter(|value| !value.is_empty());
                let bytes = field.bytes().await.map_err(multipart_error)?;
                // Browsers send an empty part when no file was chosen.
                if let Some(filename) = filename
                    && !bytes.is_empty()
                {
                    form.image = Some(ImageUpload { filename, bytes });
                }
            }
            _ => {}
        }
    }

    Ok(form)
}

fn multipart_error(err: MultipartError) -> HttpError {
    HttpError::from_error(
        "infra::http::posts::read_post_form",
        err.status(),
        "Invalid form submission",
        &err,
    )
}

fn post_error_response(source: &'static str, err: PostError, nav: NavView) -> Response {
    match err {
        PostError::NotFound => render_not_found_response(nav),
        PostError::Repo(err) => repo_error_to_http(source, err).into_response(),
        PostError::Invalid(errors) => HttpError::new(
            source,
            StatusCode::BAD_REQUEST,
            "Invalid form submission",
            errors.to_string(),
        )
        .into_response(),
        other => {
            error!(target = SOURCE_BASE, source, error = %other, "post operation failed");
            HttpError::internal(source, &other).into_response()
        }
    }
}
