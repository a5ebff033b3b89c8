//! Read-side listings: home feed, group pages and author profiles.

use std::{num::NonZeroU32, sync::Arc};

use thiserror::Error;
use tracing::{debug, instrument};

use crate::{
    application::{
        pagination::{Page, Paginator},
        repos::{FollowsRepo, GroupsRepo, PostFilter, PostsRepo, RepoError, UsersRepo},
    },
    domain::entities::{GroupRecord, PostRecord, UserRecord},
};

#[derive(Debug, Error)]
pub enum ListingError {
    #[error("unknown group")]
    UnknownGroup,
    #[error("unknown author")]
    UnknownAuthor,
    #[error(transparent)]
    Repo(#[from] RepoError),
}

pub struct GroupListing {
    pub group: GroupRecord,
    pub page: Page<PostRecord>,
}

pub struct ProfileListing {
    pub author: UserRecord,
    pub page: Page<PostRecord>,
    /// Whether the viewer follows this author; false for anonymous viewers.
    pub following: bool,
    pub followers: u64,
    pub follows: u64,
}

/// Count the filtered posts, resolve the requested page and load it.
pub(crate) async fn load_page(
    posts: &dyn PostsRepo,
    filter: PostFilter,
    page_size: NonZeroU32,
    raw_page: Option<&str>,
) -> Result<Page<PostRecord>, RepoError> {
    let count = posts.count_posts(filter).await?;
    let paginator = Paginator::new(page_size, count);
    let number = paginator.resolve(raw_page);
    let items = posts.list_posts(filter, paginator.window(number)).await?;
    debug!(
        target = "yatube::application::listing",
        ?filter,
        count,
        number,
        "loaded listing page"
    );
    Ok(paginator.page(number, items))
}

#[derive(Clone)]
pub struct ListingService {
    posts: Arc<dyn PostsRepo>,
    groups: Arc<dyn GroupsRepo>,
    users: Arc<dyn UsersRepo>,
    follows: Arc<dyn FollowsRepo>,
    page_size: NonZeroU32,
}

impl ListingService {
    pub fn new(
        posts: Arc<dyn PostsRepo>,
        groups: Arc<dyn GroupsRepo>,
        users: Arc<dyn UsersRepo>,
        follows: Arc<dyn FollowsRepo>,
        page_size: NonZeroU32,
    ) -> Self {
        Self {
            posts,
            groups,
            users,
            follows,
            page_size,
        }
    }

    pub fn page_size(&self) -> NonZeroU32 {
        self.page_size
    }

    #[instrument(skip(self))]
    pub async fn index(&self, raw_page: Option<&str>) -> Result<Page<PostRecord>, ListingError> {
        Ok(load_page(self.posts.as_ref(), PostFilter::All, self.page_size, raw_page).await?)
    }

    #[instrument(skip(self))]
    pub async fn group(
        &self,
        slug: &str,
        raw_page: Option<&str>,
    ) -> Result<GroupListing, ListingError> {
        let group = self
            .groups
            .find_by_slug(slug)
            .await?
            .ok_or(ListingError::UnknownGroup)?;

        let page = load_page(
            self.posts.as_ref(),
            PostFilter::Group(group.id),
            self.page_size,
            raw_page,
        )
        .await?;

        Ok(GroupListing { group, page })
    }

    #[instrument(skip(self, viewer))]
    pub async fn profile(
        &self,
        username: &str,
        viewer: Option<&UserRecord>,
        raw_page: Option<&str>,
    ) -> Result<ProfileListing, ListingError> {
        let author = self
            .users
            .find_by_username(username)
            .await?
            .ok_or(ListingError::UnknownAuthor)?;

        let page = load_page(
            self.posts.as_ref(),
            PostFilter::Author(author.id),
            self.page_size,
            raw_page,
        )
        .await?;

        let following = match viewer {
            Some(viewer) if viewer.id != author.id => {
                self.follows.exists(viewer.id, author.id).await?
            }
            _ => false,
        };
        let followers = self.follows.count_followers(author.id).await?;
        let follows = self.follows.count_following(author.id).await?;

        Ok(ProfileListing {
            author,
            page,
            following,
            followers,
            follows,
        })
    }

    pub async fn groups(&self) -> Result<Vec<GroupRecord>, ListingError> {
        Ok(self.groups.list_groups().await?)
    }
}
