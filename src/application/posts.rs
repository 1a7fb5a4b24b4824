//! Write paths that change what listings show.
//!
//! Neither service touches the page cache: new posts and follow changes become
//! visible in cached listings once the affected entries expire.

use std::sync::Arc;

use thiserror::Error;
use tracing::info;
use uuid::Uuid;

use crate::application::repos::{
    CreatePostParams, FollowsRepo, GroupsRepo, PostsWriteRepo, RepoError, UsersRepo,
};
use crate::domain::entities::PostRecord;
use crate::domain::error::DomainError;
use crate::domain::posts::{title_preview, validate_post_text};

#[derive(Debug, Error)]
pub enum PostServiceError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error(transparent)]
    Repo(#[from] RepoError),
}

#[derive(Debug, Clone)]
pub struct PublishPostCommand {
    pub author_id: Uuid,
    pub text: String,
    /// Slug of the group to post into.
    pub group: Option<String>,
    pub image: Option<String>,
}

#[derive(Clone)]
pub struct PostService {
    writer: Arc<dyn PostsWriteRepo>,
    groups: Arc<dyn GroupsRepo>,
    users: Arc<dyn UsersRepo>,
}

impl PostService {
    pub fn new(
        writer: Arc<dyn PostsWriteRepo>,
        groups: Arc<dyn GroupsRepo>,
        users: Arc<dyn UsersRepo>,
    ) -> Self {
        Self {
            writer,
            groups,
            users,
        }
    }

    pub async fn publish(&self, command: PublishPostCommand) -> Result<PostRecord, PostServiceError> {
        self.publish_at(command, None).await
    }

    /// Publish with an explicit publication time. Used when loading fixtures.
    pub async fn publish_at(
        &self,
        command: PublishPostCommand,
        pub_date: Option<time::OffsetDateTime>,
    ) -> Result<PostRecord, PostServiceError> {
        let text = validate_post_text(&command.text)?;

        let author = self
            .users
            .find_by_id(command.author_id)
            .await?
            .ok_or_else(|| DomainError::not_found("user"))?;

        if let Some(slug) = command.group.as_deref() {
            if self.groups.find_group(slug).await?.is_none() {
                return Err(DomainError::not_found("group").into());
            }
        }

        let post = self
            .writer
            .create_post(CreatePostParams {
                author_id: author.id,
                text,
                group: command.group,
                image: command.image,
                pub_date,
            })
            .await?;

        info!(
            target = "yatube::application::posts",
            post_id = %post.id,
            author = %post.author,
            group = post.group.as_deref().unwrap_or("-"),
            preview = %title_preview(&post.text),
            "Post published"
        );

        Ok(post)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FollowOutcome {
    Followed,
    AlreadyFollowing,
    SelfFollow,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnfollowOutcome {
    Unfollowed,
    NotFollowing,
}

#[derive(Clone)]
pub struct FollowService {
    follows: Arc<dyn FollowsRepo>,
    users: Arc<dyn UsersRepo>,
}

impl FollowService {
    pub fn new(follows: Arc<dyn FollowsRepo>, users: Arc<dyn UsersRepo>) -> Self {
        Self { follows, users }
    }

    /// Subscribe `user_id` to the author named `author`.
    pub async fn follow(
        &self,
        user_id: Uuid,
        author: &str,
    ) -> Result<FollowOutcome, PostServiceError> {
        let author = self.find_author(author).await?;
        if author.id == user_id {
            return Ok(FollowOutcome::SelfFollow);
        }

        if self.follows.add_follow(user_id, author.id).await? {
            info!(
                target = "yatube::application::posts",
                user_id = %user_id,
                author = %author.username,
                "Follow added"
            );
            Ok(FollowOutcome::Followed)
        } else {
            Ok(FollowOutcome::AlreadyFollowing)
        }
    }

    pub async fn unfollow(
        &self,
        user_id: Uuid,
        author: &str,
    ) -> Result<UnfollowOutcome, PostServiceError> {
        let author = self.find_author(author).await?;
        if self.follows.remove_follow(user_id, author.id).await? {
            Ok(UnfollowOutcome::Unfollowed)
        } else {
            Ok(UnfollowOutcome::NotFollowing)
        }
    }

    async fn find_author(
        &self,
        username: &str,
    ) -> Result<crate::domain::entities::UserRecord, PostServiceError> {
        self.users
            .find_by_username(username)
            .await?
            .ok_or_else(|| DomainError::not_found("user").into())
    }
}
