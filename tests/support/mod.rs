//! In-memory repositories and application wiring shared by integration tests.

#![allow(dead_code)]

use std::{
    num::NonZeroU32,
    sync::{Arc, Mutex, MutexGuard},
    time::Duration,
};

use async_trait::async_trait;
use axum::{Router, body::Body, http::Request, response::Response};
use http_body_util::BodyExt;
use sqlx::postgres::PgPoolOptions;
use tempfile::TempDir;
use time::OffsetDateTime;
use tower::ServiceExt;
use uuid::Uuid;

use yatube::{
    application::{
        accounts::{AccountService, Authenticated, SignupForm},
        follows::FollowService,
        groups::{CreateGroupCommand, GroupService},
        listing::ListingService,
        pagination::PageWindow,
        posts::{PostForm, PostService},
        repos::{
            CommentsRepo, CreateCommentParams, CreateGroupParams, CreatePostParams,
            CreateSessionParams, CreateUserParams, FollowsRepo, GroupsRepo, PostFilter,
            PostsRepo, PostsWriteRepo, RepoError, SessionsRepo, UpdatePostParams, UsersRepo,
        },
    },
    cache::{FeedCache, FeedCacheConfig, ManualClock},
    config::AuthSettings,
    domain::entities::{
        CommentRecord, FollowRecord, GroupRecord, PostRecord, SessionRecord, UserRecord,
        display_name,
    },
    infra::{
        db::PostgresRepositories,
        http::{AdminState, HttpState, build_admin_router, build_router},
        uploads::UploadStorage,
    },
};

pub const PASSWORD: &str = "s3cure-passphrase";
pub const COOKIE_NAME: &str = "yatube_session";
pub const LOGIN_URL: &str = "/auth/login/";

#[derive(Debug, Clone)]
struct StoredPost {
    id: i64,
    text: String,
    author_id: i64,
    group_id: Option<i64>,
    image: Option<String>,
    created_at: OffsetDateTime,
}

#[derive(Debug, Clone)]
struct StoredComment {
    id: i64,
    post_id: i64,
    author_id: i64,
    text: String,
    created_at: OffsetDateTime,
}

#[derive(Default)]
struct Tables {
    next_id: i64,
    users: Vec<UserRecord>,
    groups: Vec<GroupRecord>,
    posts: Vec<StoredPost>,
    comments: Vec<StoredComment>,
    follows: Vec<FollowRecord>,
    sessions: Vec<SessionRecord>,
}

impl Tables {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn materialize(&self, post: &StoredPost) -> Result<PostRecord, RepoError> {
        let author = self
            .users
            .iter()
            .find(|user| user.id == post.author_id)
            .ok_or_else(|| RepoError::Integrity {
                message: format!("post {} has no author", post.id),
            })?;
        let group = post
            .group_id
            .and_then(|id| self.groups.iter().find(|group| group.id == id));

        Ok(PostRecord {
            id: post.id,
            text: post.text.clone(),
            author_id: author.id,
            author_username: author.username.clone(),
            author_name: display_name(&author.first_name, &author.last_name, &author.username),
            group_id: group.map(|group| group.id),
            group_slug: group.map(|group| group.slug.clone()),
            group_title: group.map(|group| group.title.clone()),
            image: post.image.clone(),
            created_at: post.created_at,
        })
    }

    fn matches(&self, post: &StoredPost, filter: PostFilter) -> bool {
        match filter {
            PostFilter::All => true,
            PostFilter::Group(id) => post.group_id == Some(id),
            PostFilter::Author(id) => post.author_id == id,
            PostFilter::FollowedBy(user_id) => self
                .follows
                .iter()
                .any(|edge| edge.user_id == user_id && edge.author_id == post.author_id),
        }
    }

    /// Newest first, id breaking timestamp ties.
    fn filtered(&self, filter: PostFilter) -> Vec<&StoredPost> {
        let mut posts: Vec<&StoredPost> = self
            .posts
            .iter()
            .filter(|post| self.matches(post, filter))
            .collect();
        posts.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.id.cmp(&a.id))
        });
        posts
    }
}

/// Every repository trait over one set of in-memory tables.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn lock(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().expect("memory store poisoned")
    }

    pub fn post_count(&self) -> usize {
        self.lock().posts.len()
    }

    pub fn comment_count(&self) -> usize {
        self.lock().comments.len()
    }

    pub fn follow_count(&self) -> usize {
        self.lock().follows.len()
    }

    pub fn session_count(&self, user_id: i64) -> usize {
        self.lock()
            .sessions
            .iter()
            .filter(|session| session.user_id == user_id)
            .count()
    }

    /// Insert a post bypassing the service, with an explicit timestamp.
    pub fn insert_post_at(
        &self,
        author_id: i64,
        text: &str,
        group_id: Option<i64>,
        created_at: OffsetDateTime,
    ) -> i64 {
        let mut tables = self.lock();
        let id = tables.next_id();
        tables.posts.push(StoredPost {
            id,
            text: text.to_string(),
            author_id,
            group_id,
            image: None,
            created_at,
        });
        id
    }
}

#[async_trait]
impl UsersRepo for MemoryStore {
    async fn create_user(&self, params: CreateUserParams) -> Result<UserRecord, RepoError> {
        let mut tables = self.lock();
        if tables
            .users
            .iter()
            .any(|user| user.username == params.username)
        {
            return Err(RepoError::Duplicate {
                constraint: "users_username_key".to_string(),
            });
        }
        let user = UserRecord {
            id: tables.next_id(),
            username: params.username,
            first_name: params.first_name,
            last_name: params.last_name,
            email: params.email,
            password_hash: params.password_hash,
            created_at: OffsetDateTime::now_utc(),
        };
        tables.users.push(user.clone());
        Ok(user)
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<UserRecord>, RepoError> {
        Ok(self.lock().users.iter().find(|user| user.id == id).cloned())
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<UserRecord>, RepoError> {
        Ok(self
            .lock()
            .users
            .iter()
            .find(|user| user.username == username)
            .cloned())
    }

    async fn update_password(&self, id: i64, password_hash: &str) -> Result<(), RepoError> {
        let mut tables = self.lock();
        let user = tables
            .users
            .iter_mut()
            .find(|user| user.id == id)
            .ok_or(RepoError::NotFound)?;
        user.password_hash = password_hash.to_string();
        Ok(())
    }
}

#[async_trait]
impl GroupsRepo for MemoryStore {
    async fn create_group(&self, params: CreateGroupParams) -> Result<GroupRecord, RepoError> {
        let mut tables = self.lock();
        if tables.groups.iter().any(|group| group.slug == params.slug) {
            return Err(RepoError::Duplicate {
                constraint: "groups_slug_key".to_string(),
            });
        }
        let group = GroupRecord {
            id: tables.next_id(),
            title: params.title,
            slug: params.slug,
            description: params.description,
            created_at: OffsetDateTime::now_utc(),
        };
        tables.groups.push(group.clone());
        Ok(group)
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<GroupRecord>, RepoError> {
        Ok(self.lock().groups.iter().find(|group| group.id == id).cloned())
    }

    async fn find_by_slug(&self, slug: &str) -> Result<Option<GroupRecord>, RepoError> {
        Ok(self
            .lock()
            .groups
            .iter()
            .find(|group| group.slug == slug)
            .cloned())
    }

    async fn list_groups(&self) -> Result<Vec<GroupRecord>, RepoError> {
        let mut groups = self.lock().groups.clone();
        groups.sort_by(|a, b| a.title.cmp(&b.title));
        Ok(groups)
    }

    async fn delete_group(&self, id: i64) -> Result<bool, RepoError> {
        let mut tables = self.lock();
        let before = tables.groups.len();
        tables.groups.retain(|group| group.id != id);
        if tables.groups.len() == before {
            return Ok(false);
        }
        for post in tables.posts.iter_mut() {
            if post.group_id == Some(id) {
                post.group_id = None;
            }
        }
        Ok(true)
    }
}

#[async_trait]
impl PostsRepo for MemoryStore {
    async fn list_posts(
        &self,
        filter: PostFilter,
        window: PageWindow,
    ) -> Result<Vec<PostRecord>, RepoError> {
        let tables = self.lock();
        let offset = usize::try_from(window.offset).map_err(RepoError::from_persistence)?;
        let limit = usize::try_from(window.limit).map_err(RepoError::from_persistence)?;
        tables
            .filtered(filter)
            .into_iter()
            .skip(offset)
            .take(limit)
            .map(|post| tables.materialize(post))
            .collect()
    }

    async fn count_posts(&self, filter: PostFilter) -> Result<u64, RepoError> {
        Ok(self.lock().filtered(filter).len() as u64)
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<PostRecord>, RepoError> {
        let tables = self.lock();
        tables
            .posts
            .iter()
            .find(|post| post.id == id)
            .map(|post| tables.materialize(post))
            .transpose()
    }
}

#[async_trait]
impl PostsWriteRepo for MemoryStore {
    async fn create_post(&self, params: CreatePostParams) -> Result<PostRecord, RepoError> {
        let mut tables = self.lock();
        let post = StoredPost {
            id: tables.next_id(),
            text: params.text,
            author_id: params.author_id,
            group_id: params.group_id,
            image: params.image,
            created_at: OffsetDateTime::now_utc(),
        };
        tables.posts.push(post.clone());
        tables.materialize(&post)
    }

    async fn update_post(&self, params: UpdatePostParams) -> Result<PostRecord, RepoError> {
        let mut tables = self.lock();
        let post = tables
            .posts
            .iter_mut()
            .find(|post| post.id == params.id)
            .ok_or(RepoError::NotFound)?;
        post.text = params.text;
        post.group_id = params.group_id;
        post.image = params.image;
        let updated = post.clone();
        tables.materialize(&updated)
    }
}

#[async_trait]
impl CommentsRepo for MemoryStore {
    async fn create_comment(
        &self,
        params: CreateCommentParams,
    ) -> Result<CommentRecord, RepoError> {
        let mut tables = self.lock();
        let author_username = tables
            .users
            .iter()
            .find(|user| user.id == params.author_id)
            .map(|user| user.username.clone())
            .ok_or(RepoError::NotFound)?;
        let comment = StoredComment {
            id: tables.next_id(),
            post_id: params.post_id,
            author_id: params.author_id,
            text: params.text,
            created_at: OffsetDateTime::now_utc(),
        };
        tables.comments.push(comment.clone());
        Ok(CommentRecord {
            id: comment.id,
            post_id: comment.post_id,
            author_id: comment.author_id,
            author_username,
            text: comment.text,
            created_at: comment.created_at,
        })
    }

    async fn list_for_post(&self, post_id: i64) -> Result<Vec<CommentRecord>, RepoError> {
        let tables = self.lock();
        let mut comments: Vec<CommentRecord> = tables
            .comments
            .iter()
            .filter(|comment| comment.post_id == post_id)
            .map(|comment| CommentRecord {
                id: comment.id,
                post_id: comment.post_id,
                author_id: comment.author_id,
                author_username: tables
                    .users
                    .iter()
                    .find(|user| user.id == comment.author_id)
                    .map(|user| user.username.clone())
                    .unwrap_or_default(),
                text: comment.text.clone(),
                created_at: comment.created_at,
            })
            .collect();
        comments.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.id.cmp(&a.id))
        });
        Ok(comments)
    }
}

#[async_trait]
impl FollowsRepo for MemoryStore {
    async fn create_follow(
        &self,
        user_id: i64,
        author_id: i64,
    ) -> Result<Option<FollowRecord>, RepoError> {
        let mut tables = self.lock();
        if tables
            .follows
            .iter()
            .any(|edge| edge.user_id == user_id && edge.author_id == author_id)
        {
            return Ok(None);
        }
        let edge = FollowRecord {
            id: tables.next_id(),
            user_id,
            author_id,
            created_at: OffsetDateTime::now_utc(),
        };
        tables.follows.push(edge.clone());
        Ok(Some(edge))
    }

    async fn delete_follow(&self, user_id: i64, author_id: i64) -> Result<bool, RepoError> {
        let mut tables = self.lock();
        let before = tables.follows.len();
        tables
            .follows
            .retain(|edge| !(edge.user_id == user_id && edge.author_id == author_id));
        Ok(tables.follows.len() != before)
    }

    async fn exists(&self, user_id: i64, author_id: i64) -> Result<bool, RepoError> {
        Ok(self
            .lock()
            .follows
            .iter()
            .any(|edge| edge.user_id == user_id && edge.author_id == author_id))
    }

    async fn count_followers(&self, author_id: i64) -> Result<u64, RepoError> {
        Ok(self
            .lock()
            .follows
            .iter()
            .filter(|edge| edge.author_id == author_id)
            .count() as u64)
    }

    async fn count_following(&self, user_id: i64) -> Result<u64, RepoError> {
        Ok(self
            .lock()
            .follows
            .iter()
            .filter(|edge| edge.user_id == user_id)
            .count() as u64)
    }
}

#[async_trait]
impl SessionsRepo for MemoryStore {
    async fn create_session(
        &self,
        params: CreateSessionParams,
    ) -> Result<SessionRecord, RepoError> {
        let session = SessionRecord {
            id: Uuid::new_v4(),
            prefix: params.prefix,
            hashed_secret: params.hashed_secret,
            user_id: params.user_id,
            expires_at: params.expires_at,
            created_at: OffsetDateTime::now_utc(),
        };
        self.lock().sessions.push(session.clone());
        Ok(session)
    }

    async fn find_by_prefix(&self, prefix: &str) -> Result<Option<SessionRecord>, RepoError> {
        Ok(self
            .lock()
            .sessions
            .iter()
            .find(|session| session.prefix == prefix)
            .cloned())
    }

    async fn delete_session(&self, id: Uuid) -> Result<(), RepoError> {
        self.lock().sessions.retain(|session| session.id != id);
        Ok(())
    }

    async fn delete_other_sessions(&self, user_id: i64, keep: Uuid) -> Result<u64, RepoError> {
        let mut tables = self.lock();
        let before = tables.sessions.len();
        tables
            .sessions
            .retain(|session| session.user_id != user_id || session.id == keep);
        Ok((before - tables.sessions.len()) as u64)
    }
}

/// Services and routers wired over a [`MemoryStore`].
pub struct TestApp {
    pub store: Arc<MemoryStore>,
    pub clock: Arc<ManualClock>,
    pub feed_cache: Arc<FeedCache>,
    pub accounts: Arc<AccountService>,
    pub listing: Arc<ListingService>,
    pub posts: Arc<PostService>,
    pub follows: Arc<FollowService>,
    pub groups: Arc<GroupService>,
    pub state: HttpState,
    pub admin: AdminState,
    _uploads: TempDir,
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with_page_size(10).await
    }

    pub async fn with_page_size(page_size: u32) -> Self {
        let store = MemoryStore::new();
        let uploads_dir = tempfile::tempdir().expect("tempdir");
        let upload_storage =
            Arc::new(UploadStorage::new(uploads_dir.path().to_path_buf()).expect("storage"));
        let page_size = NonZeroU32::new(page_size).expect("non-zero page size");

        let listing = Arc::new(ListingService::new(
            store.clone(),
            store.clone(),
            store.clone(),
            store.clone(),
            page_size,
        ));
        let posts = Arc::new(PostService::new(
            store.clone(),
            store.clone(),
            store.clone(),
            store.clone(),
            upload_storage.clone(),
        ));
        let follows = Arc::new(FollowService::new(
            store.clone(),
            store.clone(),
            store.clone(),
            page_size,
        ));
        let accounts = Arc::new(AccountService::new(
            store.clone(),
            store.clone(),
            time::Duration::hours(24),
        ));
        let groups = Arc::new(GroupService::new(store.clone()));

        let clock = Arc::new(ManualClock::new());
        let feed_cache = Arc::new(FeedCache::new(FeedCacheConfig::default(), clock.clone()));

        let state = HttpState {
            listing: listing.clone(),
            posts: posts.clone(),
            follows: follows.clone(),
            accounts: accounts.clone(),
            upload_storage,
            feed_cache: feed_cache.clone(),
            auth: Arc::new(AuthSettings {
                session_ttl: Duration::from_secs(24 * 60 * 60),
                cookie_name: COOKIE_NAME.to_string(),
                cookie_secure: false,
                login_url: LOGIN_URL.to_string(),
            }),
            upload_limit_bytes: 1024 * 1024,
        };

        // Never connected; only the admin health probe would touch it.
        let pool = PgPoolOptions::new()
            .connect_lazy("postgres://yatube@127.0.0.1:1/yatube")
            .expect("lazy pool");
        let admin = AdminState {
            db: Arc::new(PostgresRepositories::new(pool)),
            feed_cache: feed_cache.clone(),
            groups: groups.clone(),
        };

        Self {
            store,
            clock,
            feed_cache,
            accounts,
            listing,
            posts,
            follows,
            groups,
            state,
            admin,
            _uploads: uploads_dir,
        }
    }

    pub fn router(&self) -> Router {
        build_router(self.state.clone())
    }

    pub fn admin_router(&self) -> Router {
        build_admin_router(self.admin.clone())
    }

    pub async fn user(&self, username: &str) -> UserRecord {
        self.accounts
            .register(SignupForm {
                first_name: String::new(),
                last_name: String::new(),
                username: username.to_string(),
                email: format!("{username}@example.com"),
                password1: PASSWORD.to_string(),
                password2: PASSWORD.to_string(),
            })
            .await
            .expect("register user")
    }

    pub async fn group(&self, title: &str, slug: &str) -> GroupRecord {
        self.groups
            .create(CreateGroupCommand {
                title: title.to_string(),
                slug: Some(slug.to_string()),
                description: format!("{title} description"),
            })
            .await
            .expect("create group")
    }

    pub async fn post(
        &self,
        author: &UserRecord,
        text: &str,
        group: Option<&GroupRecord>,
    ) -> PostRecord {
        self.posts
            .create_post(
                author,
                PostForm {
                    text: text.to_string(),
                    group: group.map(|group| group.id.to_string()),
                    ..PostForm::default()
                },
            )
            .await
            .expect("create post")
    }

    /// Cookie header value for a fresh session of `user`.
    pub async fn cookie(&self, user: &UserRecord) -> String {
        let session = self
            .accounts
            .issue_session(user.clone())
            .await
            .expect("issue session");
        format!("{COOKIE_NAME}={}", session.token)
    }

    pub async fn authenticated(&self, user: &UserRecord) -> Authenticated {
        let session = self
            .accounts
            .issue_session(user.clone())
            .await
            .expect("issue session");
        self.accounts
            .authenticate(&session.token)
            .await
            .expect("authenticate")
    }
}

pub async fn send(router: Router, request: Request<Body>) -> Response {
    router.oneshot(request).await.expect("router response")
}

pub fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .body(Body::empty())
        .expect("request")
}

pub fn get_as(uri: &str, cookie: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header("cookie", cookie)
        .body(Body::empty())
        .expect("request")
}

pub fn post_form(uri: &str, cookie: Option<&str>, body: &str) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/x-www-form-urlencoded");
    if let Some(cookie) = cookie {
        builder = builder.header("cookie", cookie);
    }
    builder.body(Body::from(body.to_string())).expect("request")
}

pub async fn body_bytes(response: Response) -> bytes::Bytes {
    response
        .into_body()
        .collect()
        .await
        .expect("collect body")
        .to_bytes()
}

pub async fn body_text(response: Response) -> String {
    String::from_utf8(body_bytes(response).await.to_vec()).expect("utf-8 body")
}

pub fn location(response: &Response) -> &str {
    response
        .headers()
        .get("location")
        .and_then(|value| value.to_str().ok())
        .expect("location header")
}

pub fn hours_ago(hours: i64) -> OffsetDateTime {
    OffsetDateTime::now_utc() - time::Duration::hours(hours)
}
