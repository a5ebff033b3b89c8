//! Follow graph: who reads whom, and the feed that results.

use std::{num::NonZeroU32, sync::Arc};

use thiserror::Error;
use tracing::info;

use crate::{
    application::{
        listing::load_page,
        pagination::Page,
        repos::{FollowsRepo, PostFilter, PostsRepo, RepoError, UsersRepo},
    },
    domain::entities::{PostRecord, UserRecord},
};

#[derive(Debug, Error)]
pub enum FollowError {
    #[error("unknown author")]
    UnknownAuthor,
    #[error(transparent)]
    Repo(#[from] RepoError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FollowOutcome {
    Created,
    AlreadyFollowing,
    /// Following yourself is refused without an error.
    SelfFollowIgnored,
}

#[derive(Clone)]
pub struct FollowService {
    follows: Arc<dyn FollowsRepo>,
    users: Arc<dyn UsersRepo>,
    posts: Arc<dyn PostsRepo>,
    page_size: NonZeroU32,
}

impl FollowService {
    pub fn new(
        follows: Arc<dyn FollowsRepo>,
        users: Arc<dyn UsersRepo>,
        posts: Arc<dyn PostsRepo>,
        page_size: NonZeroU32,
    ) -> Self {
        Self {
            follows,
            users,
            posts,
            page_size,
        }
    }

    pub async fn follow(
        &self,
        follower: &UserRecord,
        author: &UserRecord,
    ) -> Result<FollowOutcome, FollowError> {
        if follower.id == author.id {
            return Ok(FollowOutcome::SelfFollowIgnored);
        }

        match self.follows.create_follow(follower.id, author.id).await? {
            Some(_) => {
                info!(
                    target = "yatube::application::follows",
                    follower = %follower.username,
                    author = %author.username,
                    "follow created"
                );
                Ok(FollowOutcome::Created)
            }
            None => Ok(FollowOutcome::AlreadyFollowing),
        }
    }

    /// Returns whether an edge existed and was removed.
    pub async fn unfollow(
        &self,
        follower: &UserRecord,
        author: &UserRecord,
    ) -> Result<bool, FollowError> {
        let removed = self.follows.delete_follow(follower.id, author.id).await?;
        if removed {
            info!(
                target = "yatube::application::follows",
                follower = %follower.username,
                author = %author.username,
                "follow removed"
            );
        }
        Ok(removed)
    }

    pub async fn follow_username(
        &self,
        follower: &UserRecord,
        username: &str,
    ) -> Result<FollowOutcome, FollowError> {
        let author = self.author(username).await?;
        self.follow(follower, &author).await
    }

    pub async fn unfollow_username(
        &self,
        follower: &UserRecord,
        username: &str,
    ) -> Result<bool, FollowError> {
        let author = self.author(username).await?;
        self.unfollow(follower, &author).await
    }

    pub async fn is_following(
        &self,
        follower: Option<&UserRecord>,
        author: &UserRecord,
    ) -> Result<bool, FollowError> {
        match follower {
            Some(follower) => Ok(self.follows.exists(follower.id, author.id).await?),
            None => Ok(false),
        }
    }

    /// Posts by every author `follower` follows, newest first.
    pub async fn feed(
        &self,
        follower: &UserRecord,
        raw_page: Option<&str>,
    ) -> Result<Page<PostRecord>, FollowError> {
        Ok(load_page(
            self.posts.as_ref(),
            PostFilter::FollowedBy(follower.id),
            self.page_size,
            raw_page,
        )
        .await?)
    }

    async fn author(&self, username: &str) -> Result<UserRecord, FollowError> {
        self.users
            .find_by_username(username)
            .await?
            .ok_or(FollowError::UnknownAuthor)
    }
}
