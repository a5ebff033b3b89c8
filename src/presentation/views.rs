use crate::{
    application::{
        error::{ErrorReport, HttpError},
        forms::FormErrors,
        pagination::Page,
    },
    domain::entities::{CommentRecord, GroupRecord, PostRecord, UserRecord},
};
use askama::{Error as AskamaError, Template};
use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use thiserror::Error;
use time::{OffsetDateTime, format_description::BorrowedFormatItem, macros::format_description};

const DISPLAY_DATE: &[BorrowedFormatItem<'static>] =
    format_description!("[day] [month repr:short] [year], [hour]:[minute]");

#[derive(Debug, Error)]
#[error("{public_message}")]
pub struct TemplateRenderError {
    pub(crate) source: &'static str,
    pub(crate) public_message: &'static str,
    #[source]
    pub(crate) error: AskamaError,
}

impl TemplateRenderError {
    pub fn new(source: &'static str, public_message: &'static str, error: AskamaError) -> Self {
        Self {
            source,
            public_message,
            error,
        }
    }
}

impl From<TemplateRenderError> for HttpError {
    fn from(err: TemplateRenderError) -> Self {
        let TemplateRenderError {
            source,
            public_message,
            error,
        } = err;

        HttpError::from_error(
            source,
            StatusCode::INTERNAL_SERVER_ERROR,
            public_message,
            &error,
        )
    }
}

pub fn render_template<T: Template>(template: T) -> Result<Html<String>, HttpError> {
    template.render().map(Html).map_err(|err| {
        TemplateRenderError::new(
            "presentation::views::render_template",
            "Template rendering failed",
            err,
        )
        .into()
    })
}

pub fn render_template_response<T: Template>(template: T, status: StatusCode) -> Response {
    match render_template(template) {
        Ok(html) => (status, html).into_response(),
        Err(err) => err.into_response(),
    }
}

pub fn render_not_found_response(nav: NavView) -> Response {
    let view = LayoutContext::new(nav, "Page not found", ErrorPageView::not_found());
    let mut response = render_template_response(ErrorTemplate { view }, StatusCode::NOT_FOUND);
    ErrorReport::from_message(
        "presentation::views::render_not_found_response",
        StatusCode::NOT_FOUND,
        "Resource not found",
    )
    .attach(&mut response);
    response
}

pub fn format_date(value: OffsetDateTime) -> String {
    value
        .format(DISPLAY_DATE)
        .unwrap_or_else(|_| value.date().to_string())
}

/// Header links. The home listing is cached under one key for every viewer,
/// so it renders with [`NavView::shared`], which carries no sign-in state.
#[derive(Clone, Default)]
pub struct NavView {
    pub username: Option<String>,
    pub display_name: Option<String>,
    pub shared: bool,
}

impl NavView {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn shared() -> Self {
        Self {
            shared: true,
            ..Self::default()
        }
    }

    pub fn for_viewer(viewer: Option<&UserRecord>) -> Self {
        match viewer {
            Some(user) => Self {
                username: Some(user.username.clone()),
                display_name: Some(user.display_name()),
                shared: false,
            },
            None => Self::anonymous(),
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.username.is_some()
    }
}

#[derive(Clone)]
pub struct LayoutContext<T> {
    pub nav: NavView,
    pub title: String,
    pub content: T,
}

impl<T> LayoutContext<T> {
    pub fn new(nav: NavView, title: impl Into<String>, content: T) -> Self {
        Self {
            nav,
            title: title.into(),
            content,
        }
    }
}

#[derive(Clone)]
pub struct PostCard {
    pub id: i64,
    pub text: String,
    pub short: String,
    pub author_username: String,
    pub author_name: String,
    pub group_slug: Option<String>,
    pub group_title: Option<String>,
    pub image_url: Option<String>,
    pub published: String,
}

impl From<&PostRecord> for PostCard {
    fn from(post: &PostRecord) -> Self {
        Self {
            id: post.id,
            text: post.text.clone(),
            short: post.short().to_string(),
            author_username: post.author_username.clone(),
            author_name: post.author_name.clone(),
            group_slug: post.group_slug.clone(),
            group_title: post.group_title.clone(),
            image_url: post.image.as_deref().map(media_url),
            published: format_date(post.created_at),
        }
    }
}

pub fn media_url(stored_path: &str) -> String {
    format!("/media/{stored_path}")
}

/// Page controls rendered by `includes/paginator.html`.
#[derive(Clone)]
pub struct PaginatorView {
    pub number: u64,
    pub num_pages: u64,
    pub count: u64,
    pub previous: Option<u64>,
    pub next: Option<u64>,
    pub links: Vec<PageLink>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PageLink {
    pub number: u64,
    pub current: bool,
}

impl PaginatorView {
    pub fn has_other_pages(&self) -> bool {
        self.num_pages > 1
    }
}

pub struct PostList {
    pub posts: Vec<PostCard>,
    pub paginator: PaginatorView,
}

impl From<&Page<PostRecord>> for PostList {
    fn from(page: &Page<PostRecord>) -> Self {
        Self {
            posts: page.items.iter().map(PostCard::from).collect(),
            paginator: PaginatorView {
                number: page.number,
                num_pages: page.num_pages,
                count: page.count,
                previous: page.has_previous().then(|| page.previous_page_number()),
                next: page.has_next().then(|| page.next_page_number()),
                links: page
                    .page_range()
                    .into_iter()
                    .map(|number| PageLink {
                        number,
                        current: number == page.number,
                    })
                    .collect(),
            },
        }
    }
}

pub struct IndexContext {
    pub list: PostList,
}

#[derive(Template)]
#[template(path = "index.html")]
pub struct IndexTemplate {
    pub view: LayoutContext<IndexContext>,
}

pub struct GroupContext {
    pub title: String,
    pub slug: String,
    pub description: String,
    pub list: PostList,
}

impl GroupContext {
    pub fn new(group: &GroupRecord, list: PostList) -> Self {
        Self {
            title: group.title.clone(),
            slug: group.slug.clone(),
            description: group.description.clone(),
            list,
        }
    }
}

#[derive(Template)]
#[template(path = "group_list.html")]
pub struct GroupTemplate {
    pub view: LayoutContext<GroupContext>,
}

pub struct ProfileContext {
    pub username: String,
    pub display_name: String,
    pub followers: u64,
    pub follows: u64,
    pub following: bool,
    /// Signed in and looking at someone else's profile.
    pub can_follow: bool,
    pub list: PostList,
}

#[derive(Template)]
#[template(path = "profile.html")]
pub struct ProfileTemplate {
    pub view: LayoutContext<ProfileContext>,
}

pub struct CommentView {
    pub author_username: String,
    pub text: String,
    pub published: String,
}

impl From<&CommentRecord> for CommentView {
    fn from(comment: &CommentRecord) -> Self {
        Self {
            author_username: comment.author_username.clone(),
            text: comment.text.clone(),
            published: format_date(comment.created_at),
        }
    }
}

pub struct PostDetailContext {
    pub post: PostCard,
    pub author_posts: u64,
    pub comments: Vec<CommentView>,
    pub can_edit: bool,
    pub can_comment: bool,
}

#[derive(Template)]
#[template(path = "post_detail.html")]
pub struct PostDetailTemplate {
    pub view: LayoutContext<PostDetailContext>,
}

pub struct GroupOption {
    pub id: i64,
    pub title: String,
    pub selected: bool,
}

pub struct PostFormContext {
    /// Present when editing an existing post.
    pub post_id: Option<i64>,
    pub text: String,
    pub groups: Vec<GroupOption>,
    pub current_image: Option<String>,
    pub errors: FormErrors,
}

impl PostFormContext {
    pub fn new(
        post_id: Option<i64>,
        text: String,
        groups: &[GroupRecord],
        selected: Option<&str>,
        current_image: Option<&str>,
        errors: FormErrors,
    ) -> Self {
        let selected = selected.map(str::trim).unwrap_or_default();
        Self {
            post_id,
            text,
            groups: groups
                .iter()
                .map(|group| GroupOption {
                    id: group.id,
                    title: group.title.clone(),
                    selected: group.id.to_string() == selected,
                })
                .collect(),
            current_image: current_image.map(media_url),
            errors,
        }
    }

    pub fn is_edit(&self) -> bool {
        self.post_id.is_some()
    }

    pub fn action(&self) -> String {
        match self.post_id {
            Some(id) => format!("/posts/{id}/edit/"),
            None => "/create/".to_string(),
        }
    }
}

#[derive(Template)]
#[template(path = "create_post.html")]
pub struct PostFormTemplate {
    pub view: LayoutContext<PostFormContext>,
}

pub struct FollowContext {
    pub list: PostList,
}

#[derive(Template)]
#[template(path = "follow.html")]
pub struct FollowTemplate {
    pub view: LayoutContext<FollowContext>,
}

#[derive(Default)]
pub struct SignupContext {
    pub first_name: String,
    pub last_name: String,
    pub username: String,
    pub email: String,
    pub errors: FormErrors,
}

#[derive(Template)]
#[template(path = "users/signup.html")]
pub struct SignupTemplate {
    pub view: LayoutContext<SignupContext>,
}

#[derive(Default)]
pub struct LoginContext {
    pub username: String,
    pub next: Option<String>,
    pub errors: FormErrors,
}

#[derive(Template)]
#[template(path = "users/login.html")]
pub struct LoginTemplate {
    pub view: LayoutContext<LoginContext>,
}

#[derive(Default)]
pub struct PasswordChangeContext {
    pub errors: FormErrors,
}

#[derive(Template)]
#[template(path = "users/password_change.html")]
pub struct PasswordChangeTemplate {
    pub view: LayoutContext<PasswordChangeContext>,
}

#[derive(Template)]
#[template(path = "users/password_change_done.html")]
pub struct PasswordChangeDoneTemplate {
    pub view: LayoutContext<()>,
}

#[derive(Template)]
#[template(path = "users/logged_out.html")]
pub struct LoggedOutTemplate {
    pub view: LayoutContext<()>,
}

pub struct ErrorPageView {
    pub title: String,
    pub message: String,
}

impl ErrorPageView {
    pub fn not_found() -> Self {
        Self {
            title: "Page not found".to_string(),
            message: "The page you requested does not exist.".to_string(),
        }
    }
}

#[derive(Template)]
#[template(path = "not_found.html")]
pub struct ErrorTemplate {
    pub view: LayoutContext<ErrorPageView>,
}
