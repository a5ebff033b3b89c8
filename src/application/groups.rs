//! Administrative group management.

use std::sync::Arc;

use thiserror::Error;
use tracing::info;

use crate::{
    application::repos::{CreateGroupParams, GroupsRepo, RepoError},
    domain::{
        entities::GroupRecord,
        slug::{SlugAsyncError, SlugError, generate_unique_slug_async, validate_slug},
    },
};

pub const GROUP_TITLE_MAX_CHARS: usize = 200;
pub const GROUP_DESCRIPTION_MAX_CHARS: usize = 200;

#[derive(Debug, Error)]
pub enum GroupError {
    #[error("invalid `{field}`: {message}")]
    Invalid {
        field: &'static str,
        message: String,
    },
    #[error("group slug `{0}` is already taken")]
    SlugTaken(String),
    #[error("group not found")]
    NotFound,
    #[error(transparent)]
    Repo(#[from] RepoError),
}

impl GroupError {
    fn invalid(field: &'static str, message: impl Into<String>) -> Self {
        Self::Invalid {
            field,
            message: message.into(),
        }
    }
}

impl From<SlugError> for GroupError {
    fn from(err: SlugError) -> Self {
        Self::invalid("slug", err.to_string())
    }
}

#[derive(Debug, Clone)]
pub struct CreateGroupCommand {
    pub title: String,
    /// Derived from the title when absent.
    pub slug: Option<String>,
    pub description: String,
}

#[derive(Clone)]
pub struct GroupService {
    groups: Arc<dyn GroupsRepo>,
}

impl GroupService {
    pub fn new(groups: Arc<dyn GroupsRepo>) -> Self {
        Self { groups }
    }

    pub async fn create(&self, command: CreateGroupCommand) -> Result<GroupRecord, GroupError> {
        let title = command.title.trim().to_string();
        if title.is_empty() {
            return Err(GroupError::invalid("title", "This field is required."));
        }
        if title.chars().count() > GROUP_TITLE_MAX_CHARS {
            return Err(GroupError::invalid(
                "title",
                format!("Ensure this value has at most {GROUP_TITLE_MAX_CHARS} characters."),
            ));
        }

        let description = command.description.trim().to_string();
        if description.is_empty() {
            return Err(GroupError::invalid("description", "This field is required."));
        }
        if description.chars().count() > GROUP_DESCRIPTION_MAX_CHARS {
            return Err(GroupError::invalid(
                "description",
                format!(
                    "Ensure this value has at most {GROUP_DESCRIPTION_MAX_CHARS} characters."
                ),
            ));
        }

        let slug = match command.slug.map(|slug| slug.trim().to_string()) {
            Some(slug) if !slug.is_empty() => {
                validate_slug(&slug)?;
                if self.groups.find_by_slug(&slug).await?.is_some() {
                    return Err(GroupError::SlugTaken(slug));
                }
                slug
            }
            _ => {
                let groups = self.groups.clone();
                generate_unique_slug_async(&title, move |candidate| {
                    let groups = groups.clone();
                    async move {
                        groups
                            .find_by_slug(&candidate)
                            .await
                            .map(|found| found.is_none())
                    }
                })
                .await
                .map_err(|err| match err {
                    SlugAsyncError::Slug(err) => GroupError::from(err),
                    SlugAsyncError::Predicate(err) => GroupError::Repo(err),
                })?
            }
        };

        let group = match self
            .groups
            .create_group(CreateGroupParams {
                title,
                slug: slug.clone(),
                description,
            })
            .await
        {
            Ok(group) => group,
            Err(RepoError::Duplicate { .. }) => return Err(GroupError::SlugTaken(slug)),
            Err(err) => return Err(err.into()),
        };

        info!(
            target = "yatube::application::groups",
            group_id = group.id,
            slug = %group.slug,
            "group created"
        );
        Ok(group)
    }

    pub async fn list(&self) -> Result<Vec<GroupRecord>, GroupError> {
        Ok(self.groups.list_groups().await?)
    }

    /// Delete by slug; posts of the group survive without a group.
    pub async fn delete(&self, slug: &str) -> Result<(), GroupError> {
        let group = self
            .groups
            .find_by_slug(slug)
            .await?
            .ok_or(GroupError::NotFound)?;

        if !self.groups.delete_group(group.id).await? {
            return Err(GroupError::NotFound);
        }

        info!(
            target = "yatube::application::groups",
            group_id = group.id,
            slug = %group.slug,
            "group deleted"
        );
        Ok(())
    }
}
