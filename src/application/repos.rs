//! Repository traits describing persistence adapters.

use async_trait::async_trait;
use thiserror::Error;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::domain::entities::{GroupRecord, PostRecord, UserRecord};

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("duplicate record violates unique constraint `{constraint}`")]
    Duplicate { constraint: String },
    #[error("resource not found")]
    NotFound,
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
}

impl RepoError {
    pub fn from_persistence(err: impl std::fmt::Display) -> Self {
        Self::Persistence(err.to_string())
    }

    pub fn duplicate(constraint: impl Into<String>) -> Self {
        Self::Duplicate {
            constraint: constraint.into(),
        }
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }
}

/// Which posts a listing shows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PostListScope {
    /// Every post, for the home feed.
    All,
    /// Posts published into the group with this slug.
    Group(String),
    /// Posts written by the user with this username.
    Author(String),
    /// Posts by every author the given user follows.
    FollowedBy(Uuid),
}

#[derive(Debug, Clone)]
pub struct CreatePostParams {
    pub author_id: Uuid,
    pub text: String,
    pub group: Option<String>,
    pub image: Option<String>,
    /// Defaults to the time of insertion.
    pub pub_date: Option<OffsetDateTime>,
}

#[derive(Debug, Clone)]
pub struct CreateUserParams {
    pub username: String,
    pub full_name: String,
}

#[derive(Debug, Clone)]
pub struct CreateGroupParams {
    pub title: String,
    /// Derived from the title when absent.
    pub slug: Option<String>,
    pub description: String,
}

/// Read access to posts. Listings are ordered newest first.
#[async_trait]
pub trait PostsRepo: Send + Sync {
    async fn count_posts(&self, scope: &PostListScope) -> Result<u64, RepoError>;

    async fn list_posts(
        &self,
        scope: &PostListScope,
        offset: u64,
        limit: u64,
    ) -> Result<Vec<PostRecord>, RepoError>;
}

#[async_trait]
pub trait PostsWriteRepo: Send + Sync {
    async fn create_post(&self, params: CreatePostParams) -> Result<PostRecord, RepoError>;
}

#[async_trait]
pub trait GroupsRepo: Send + Sync {
    async fn find_group(&self, slug: &str) -> Result<Option<GroupRecord>, RepoError>;

    async fn create_group(&self, params: CreateGroupParams) -> Result<GroupRecord, RepoError>;
}

#[async_trait]
pub trait UsersRepo: Send + Sync {
    async fn find_by_username(&self, username: &str) -> Result<Option<UserRecord>, RepoError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<UserRecord>, RepoError>;

    async fn create_user(&self, params: CreateUserParams) -> Result<UserRecord, RepoError>;
}

#[async_trait]
pub trait FollowsRepo: Send + Sync {
    async fn is_following(&self, user_id: Uuid, author_id: Uuid) -> Result<bool, RepoError>;

    /// Returns `false` when the relation already existed.
    async fn add_follow(&self, user_id: Uuid, author_id: Uuid) -> Result<bool, RepoError>;

    /// Returns `false` when there was nothing to remove.
    async fn remove_follow(&self, user_id: Uuid, author_id: Uuid) -> Result<bool, RepoError>;
}
