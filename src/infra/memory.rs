//! In-memory repository implementations.
//!
//! Everything lives behind one async `RwLock`, so each repository call sees a
//! consistent snapshot of users, groups, posts, and follows.

use std::collections::{BTreeMap, HashMap, HashSet};

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::application::repos::{
    CreateGroupParams, CreatePostParams, CreateUserParams, FollowsRepo, GroupsRepo,
    PostListScope, PostsRepo, PostsWriteRepo, RepoError, UsersRepo,
};
use crate::domain::entities::{FollowRecord, GroupRecord, PostRecord, UserRecord};
use crate::domain::slug::{SlugError, generate_unique_slug, validate_slug};

#[derive(Default)]
struct MemoryState {
    users: HashMap<Uuid, UserRecord>,
    usernames: HashMap<String, Uuid>,
    groups: BTreeMap<String, GroupRecord>,
    /// Newest first; see [`MemoryState::insert_post`].
    posts: Vec<PostRecord>,
    follows: HashSet<FollowRecord>,
}

impl MemoryState {
    /// Keep `posts` ordered by publication time, newest first. A post inserted
    /// later goes ahead of earlier posts with the same timestamp.
    fn insert_post(&mut self, post: PostRecord) {
        let position = self
            .posts
            .partition_point(|existing| existing.pub_date > post.pub_date);
        self.posts.insert(position, post);
    }

    fn in_scope(&self, post: &PostRecord, scope: &PostListScope) -> bool {
        match scope {
            PostListScope::All => true,
            PostListScope::Group(slug) => post.group.as_deref() == Some(slug.as_str()),
            PostListScope::Author(username) => &post.author == username,
            PostListScope::FollowedBy(user_id) => self
                .usernames
                .get(&post.author)
                .is_some_and(|author_id| {
                    self.follows.contains(&FollowRecord {
                        user_id: *user_id,
                        author_id: *author_id,
                    })
                }),
        }
    }
}

/// Repository set backed by process memory. Contents are lost on restart.
#[derive(Default)]
pub struct MemoryRepositories {
    state: RwLock<MemoryState>,
}

impl MemoryRepositories {
    pub fn new() -> Self {
        Self::default()
    }
}

fn slug_error_to_repo(err: SlugError) -> RepoError {
    RepoError::invalid_input(err.to_string())
}

#[async_trait]
impl PostsRepo for MemoryRepositories {
    async fn count_posts(&self, scope: &PostListScope) -> Result<u64, RepoError> {
        let state = self.state.read().await;
        let count = state
            .posts
            .iter()
            .filter(|post| state.in_scope(post, scope))
            .count();
        Ok(count as u64)
    }

    async fn list_posts(
        &self,
        scope: &PostListScope,
        offset: u64,
        limit: u64,
    ) -> Result<Vec<PostRecord>, RepoError> {
        let offset = usize::try_from(offset)
            .map_err(|_| RepoError::invalid_input("offset exceeds addressable range"))?;
        let limit = usize::try_from(limit).unwrap_or(usize::MAX);

        let state = self.state.read().await;
        Ok(state
            .posts
            .iter()
            .filter(|post| state.in_scope(post, scope))
            .skip(offset)
            .take(limit)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl PostsWriteRepo for MemoryRepositories {
    async fn create_post(&self, params: CreatePostParams) -> Result<PostRecord, RepoError> {
        let mut state = self.state.write().await;

        let author = state
            .users
            .get(&params.author_id)
            .map(|user| user.username.clone())
            .ok_or(RepoError::NotFound)?;
        if let Some(slug) = params.group.as_deref() {
            if !state.groups.contains_key(slug) {
                return Err(RepoError::NotFound);
            }
        }

        let post = PostRecord {
            id: Uuid::new_v4(),
            text: params.text,
            pub_date: params.pub_date.unwrap_or_else(OffsetDateTime::now_utc),
            author,
            group: params.group,
            image: params.image,
        };
        state.insert_post(post.clone());
        Ok(post)
    }
}

#[async_trait]
impl GroupsRepo for MemoryRepositories {
    async fn find_group(&self, slug: &str) -> Result<Option<GroupRecord>, RepoError> {
        let state = self.state.read().await;
        Ok(state.groups.get(slug).cloned())
    }

    async fn create_group(&self, params: CreateGroupParams) -> Result<GroupRecord, RepoError> {
        let mut state = self.state.write().await;

        let slug = match params.slug {
            Some(slug) => {
                validate_slug(&slug).map_err(slug_error_to_repo)?;
                if state.groups.contains_key(&slug) {
                    return Err(RepoError::duplicate("groups_slug_key"));
                }
                slug
            }
            None => generate_unique_slug(&params.title, |candidate| {
                !state.groups.contains_key(candidate)
            })
            .map_err(slug_error_to_repo)?,
        };

        let group = GroupRecord {
            id: Uuid::new_v4(),
            slug: slug.clone(),
            title: params.title,
            description: params.description,
        };
        state.groups.insert(slug, group.clone());
        Ok(group)
    }
}

#[async_trait]
impl UsersRepo for MemoryRepositories {
    async fn find_by_username(&self, username: &str) -> Result<Option<UserRecord>, RepoError> {
        let state = self.state.read().await;
        Ok(state
            .usernames
            .get(username)
            .and_then(|id| state.users.get(id))
            .cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<UserRecord>, RepoError> {
        let state = self.state.read().await;
        Ok(state.users.get(&id).cloned())
    }

    async fn create_user(&self, params: CreateUserParams) -> Result<UserRecord, RepoError> {
        if params.username.trim().is_empty() {
            return Err(RepoError::invalid_input("username must not be empty"));
        }

        let mut state = self.state.write().await;
        if state.usernames.contains_key(&params.username) {
            return Err(RepoError::duplicate("users_username_key"));
        }

        let user = UserRecord {
            id: Uuid::new_v4(),
            username: params.username,
            full_name: params.full_name,
        };
        state.usernames.insert(user.username.clone(), user.id);
        state.users.insert(user.id, user.clone());
        Ok(user)
    }
}

#[async_trait]
impl FollowsRepo for MemoryRepositories {
    async fn is_following(&self, user_id: Uuid, author_id: Uuid) -> Result<bool, RepoError> {
        let state = self.state.read().await;
        Ok(state.follows.contains(&FollowRecord { user_id, author_id }))
    }

    async fn add_follow(&self, user_id: Uuid, author_id: Uuid) -> Result<bool, RepoError> {
        let mut state = self.state.write().await;
        if !state.users.contains_key(&user_id) || !state.users.contains_key(&author_id) {
            return Err(RepoError::NotFound);
        }
        Ok(state.follows.insert(FollowRecord { user_id, author_id }))
    }

    async fn remove_follow(&self, user_id: Uuid, author_id: Uuid) -> Result<bool, RepoError> {
        let mut state = self.state.write().await;
        Ok(state.follows.remove(&FollowRecord { user_id, author_id }))
    }
}
