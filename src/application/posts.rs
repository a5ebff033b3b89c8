//! Post and comment mutations plus the post detail read.

use std::sync::Arc;

use bytes::Bytes;
use thiserror::Error;
use tracing::{info, warn};

use crate::{
    application::{
        forms::FormErrors,
        repos::{
            CommentsRepo, CreateCommentParams, CreatePostParams, GroupsRepo, PostFilter,
            PostsRepo, PostsWriteRepo, RepoError, UpdatePostParams,
        },
    },
    domain::{
        entities::{CommentRecord, PostRecord, UserRecord},
        error::DomainError,
        posts::{validate_comment_text, validate_post_text},
        uploads::{POST_IMAGE_PREFIX, inspect_image},
    },
    infra::uploads::{UploadStorage, UploadStorageError},
};

const INVALID_GROUP: &str =
    "Select a valid choice. That choice is not one of the available choices.";
const IMAGE_CONTRADICTION: &str =
    "Please either submit a file or check the clear checkbox, not both.";

#[derive(Debug, Error)]
pub enum PostError {
    #[error("post not found")]
    NotFound,
    #[error("invalid post form: {0}")]
    Invalid(FormErrors),
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error("failed to store image")]
    Storage(#[from] UploadStorageError),
    #[error(transparent)]
    Repo(#[from] RepoError),
}

#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub filename: String,
    pub bytes: Bytes,
}

/// Submitted post fields. `group` is the raw select value; empty means no group.
#[derive(Debug, Clone, Default)]
pub struct PostForm {
    pub text: String,
    pub group: Option<String>,
    pub image: Option<ImageUpload>,
    pub clear_image: bool,
}

#[derive(Debug)]
pub enum EditAccess {
    Allowed(PostRecord),
    /// The editor is not the author; nothing was changed.
    Forbidden,
}

#[derive(Debug)]
pub enum EditOutcome {
    Updated(PostRecord),
    Forbidden,
}

#[derive(Debug)]
pub enum CommentOutcome {
    Created(CommentRecord),
    Rejected(FormErrors),
}

#[derive(Debug)]
pub struct PostDetail {
    pub post: PostRecord,
    pub comments: Vec<CommentRecord>,
    pub author_posts: u64,
}

struct ValidPost {
    text: String,
    group_id: Option<i64>,
}

#[derive(Clone)]
pub struct PostService {
    reader: Arc<dyn PostsRepo>,
    writer: Arc<dyn PostsWriteRepo>,
    groups: Arc<dyn GroupsRepo>,
    comments: Arc<dyn CommentsRepo>,
    uploads: Arc<UploadStorage>,
}

impl PostService {
    pub fn new(
        reader: Arc<dyn PostsRepo>,
        writer: Arc<dyn PostsWriteRepo>,
        groups: Arc<dyn GroupsRepo>,
        comments: Arc<dyn CommentsRepo>,
        uploads: Arc<UploadStorage>,
    ) -> Self {
        Self {
            reader,
            writer,
            groups,
            comments,
            uploads,
        }
    }

    pub async fn create_post(
        &self,
        author: &UserRecord,
        form: PostForm,
    ) -> Result<PostRecord, PostError> {
        let valid = self.validate(&form).await?;
        let image = match form.image {
            Some(upload) => Some(self.store_image(upload).await?),
            None => None,
        };

        let post = self
            .writer
            .create_post(CreatePostParams {
                author_id: author.id,
                text: valid.text,
                group_id: valid.group_id,
                image,
            })
            .await?;

        info!(
            target = "yatube::application::posts",
            post_id = post.id,
            author = %author.username,
            group_id = ?post.group_id,
            "post created"
        );
        Ok(post)
    }

    pub async fn edit_access(
        &self,
        editor: &UserRecord,
        post_id: i64,
    ) -> Result<EditAccess, PostError> {
        let post = self
            .reader
            .find_by_id(post_id)
            .await?
            .ok_or(PostError::NotFound)?;

        if post.author_id != editor.id {
            return Ok(EditAccess::Forbidden);
        }
        Ok(EditAccess::Allowed(post))
    }

    pub async fn edit_post(
        &self,
        editor: &UserRecord,
        post_id: i64,
        form: PostForm,
    ) -> Result<EditOutcome, PostError> {
        let current = match self.edit_access(editor, post_id).await? {
            EditAccess::Allowed(post) => post,
            EditAccess::Forbidden => {
                warn!(
                    target = "yatube::application::posts",
                    post_id,
                    editor = %editor.username,
                    "edit refused for non-author"
                );
                return Ok(EditOutcome::Forbidden);
            }
        };

        let valid = self.validate(&form).await?;
        let image = match (form.image, form.clear_image) {
            (Some(upload), false) => Some(self.store_image(upload).await?),
            (None, true) => None,
            (None, false) => current.image.clone(),
            (Some(_), true) => {
                return Err(PostError::Invalid(FormErrors::single(
                    "image",
                    IMAGE_CONTRADICTION,
                )));
            }
        };

        let post = self
            .writer
            .update_post(UpdatePostParams {
                id: current.id,
                text: valid.text,
                group_id: valid.group_id,
                image,
            })
            .await?;

        info!(
            target = "yatube::application::posts",
            post_id = post.id,
            "post updated"
        );
        Ok(EditOutcome::Updated(post))
    }

    pub async fn post_detail(&self, post_id: i64) -> Result<PostDetail, PostError> {
        let post = self
            .reader
            .find_by_id(post_id)
            .await?
            .ok_or(PostError::NotFound)?;
        let comments = self.comments.list_for_post(post.id).await?;
        let author_posts = self
            .reader
            .count_posts(PostFilter::Author(post.author_id))
            .await?;

        Ok(PostDetail {
            post,
            comments,
            author_posts,
        })
    }

    pub async fn create_comment(
        &self,
        author: &UserRecord,
        post_id: i64,
        text: &str,
    ) -> Result<CommentOutcome, PostError> {
        let post = self
            .reader
            .find_by_id(post_id)
            .await?
            .ok_or(PostError::NotFound)?;

        let text = match validate_comment_text(text) {
            Ok(text) => text,
            Err(err) => {
                let mut errors = FormErrors::new();
                errors.absorb(err)?;
                return Ok(CommentOutcome::Rejected(errors));
            }
        };

        let comment = self
            .comments
            .create_comment(CreateCommentParams {
                post_id: post.id,
                author_id: author.id,
                text,
            })
            .await?;

        info!(
            target = "yatube::application::posts",
            post_id = post.id,
            comment_id = comment.id,
            author = %author.username,
            "comment created"
        );
        Ok(CommentOutcome::Created(comment))
    }

    async fn validate(&self, form: &PostForm) -> Result<ValidPost, PostError> {
        let mut errors = FormErrors::new();

        let text = match validate_post_text(&form.text) {
            Ok(text) => text,
            Err(err) => {
                errors.absorb(err)?;
                String::new()
            }
        };

        let group_id = match form.group.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(raw) => {
                let found = match raw.parse::<i64>() {
                    Ok(id) => self.groups.find_by_id(id).await?.map(|group| group.id),
                    Err(_) => None,
                };
                if found.is_none() {
                    errors.push("group", INVALID_GROUP);
                }
                found
            }
        };

        if let Some(image) = form.image.as_ref()
            && let Err(rejection) = inspect_image(&image.bytes)
        {
            errors.push("image", rejection.to_string());
        }

        if !errors.is_empty() {
            return Err(PostError::Invalid(errors));
        }
        Ok(ValidPost { text, group_id })
    }

    async fn store_image(&self, upload: ImageUpload) -> Result<String, PostError> {
        let stored = self
            .uploads
            .store(POST_IMAGE_PREFIX, &upload.filename, upload.bytes)
            .await?;

        info!(
            target = "yatube::application::posts",
            path = %stored.stored_path,
            size_bytes = stored.size_bytes,
            checksum = %stored.checksum,
            "post image stored"
        );
        Ok(stored.stored_path)
    }
}
