//! Seed fixtures for the in-memory store.
//!
//! ```toml
//! [[users]]
//! username = "leo"
//! full_name = "Leo Tolstoy"
//!
//! [[groups]]
//! title = "Cats"
//! slug = "cats"            # derived from the title when omitted
//! description = "All about cats"
//!
//! [[posts]]
//! author = "leo"
//! text = "First post"
//! group = "cats"
//! pub_date = "2024-01-01T12:00:00Z"   # defaults to load time
//!
//! [[follows]]
//! user = "anna"
//! author = "leo"
//! ```

use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;
use time::OffsetDateTime;
use tracing::{info, warn};

use crate::application::posts::{
    FollowOutcome, FollowService, PostService, PostServiceError, PublishPostCommand,
};
use crate::application::repos::{
    CreateGroupParams, CreateUserParams, GroupsRepo, RepoError, UsersRepo,
};

#[derive(Debug, Error)]
pub enum SeedError {
    #[error("failed to read seed file `{path}`: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse seed file: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("seed references unknown user `{0}`")]
    UnknownUser(String),
    #[error(transparent)]
    Repo(#[from] RepoError),
    #[error(transparent)]
    Post(#[from] PostServiceError),
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SeedFile {
    pub users: Vec<SeedUser>,
    pub groups: Vec<SeedGroup>,
    pub posts: Vec<SeedPost>,
    pub follows: Vec<SeedFollow>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SeedUser {
    pub username: String,
    #[serde(default)]
    pub full_name: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SeedGroup {
    pub title: String,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SeedPost {
    pub author: String,
    pub text: String,
    #[serde(default)]
    pub group: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub pub_date: Option<OffsetDateTime>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SeedFollow {
    pub user: String,
    pub author: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SeedSummary {
    pub users: usize,
    pub groups: usize,
    pub posts: usize,
    pub follows: usize,
}

impl SeedFile {
    pub fn parse(input: &str) -> Result<Self, SeedError> {
        Ok(toml::from_str(input)?)
    }

    pub async fn read(path: &Path) -> Result<Self, SeedError> {
        let input = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| SeedError::Read {
                path: path.to_path_buf(),
                source,
            })?;
        Self::parse(&input)
    }
}

/// Handles the seed loader writes through.
pub struct SeedTargets<'a> {
    pub users: &'a dyn UsersRepo,
    pub groups: &'a dyn GroupsRepo,
    pub posts: &'a PostService,
    pub follows: &'a FollowService,
}

/// Insert users, then groups, then posts, then follows.
///
/// Posts go through [`PostService`] so fixtures obey the same rules as
/// published posts. Self-follows and repeated follows are skipped with a warning.
pub async fn apply(seed: SeedFile, targets: SeedTargets<'_>) -> Result<SeedSummary, SeedError> {
    let mut summary = SeedSummary::default();

    for user in seed.users {
        targets
            .users
            .create_user(CreateUserParams {
                username: user.username,
                full_name: user.full_name,
            })
            .await?;
        summary.users += 1;
    }

    for group in seed.groups {
        targets
            .groups
            .create_group(CreateGroupParams {
                title: group.title,
                slug: group.slug,
                description: group.description,
            })
            .await?;
        summary.groups += 1;
    }

    for post in seed.posts {
        let author = targets
            .users
            .find_by_username(&post.author)
            .await?
            .ok_or_else(|| SeedError::UnknownUser(post.author.clone()))?;
        targets
            .posts
            .publish_at(
                PublishPostCommand {
                    author_id: author.id,
                    text: post.text,
                    group: post.group,
                    image: post.image,
                },
                post.pub_date,
            )
            .await?;
        summary.posts += 1;
    }

    for follow in seed.follows {
        let user = targets
            .users
            .find_by_username(&follow.user)
            .await?
            .ok_or_else(|| SeedError::UnknownUser(follow.user.clone()))?;
        match targets.follows.follow(user.id, &follow.author).await? {
            FollowOutcome::Followed => summary.follows += 1,
            outcome => warn!(
                target = "yatube::infra::seed",
                user = %follow.user,
                author = %follow.author,
                outcome = ?outcome,
                "Seed follow skipped"
            ),
        }
    }

    info!(
        target = "yatube::infra::seed",
        users = summary.users,
        groups = summary.groups,
        posts = summary.posts,
        follows = summary.follows,
        "Seed applied"
    );

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::application::repos::{PostListScope, PostsRepo};
    use crate::infra::memory::MemoryRepositories;

    const FIXTURE: &str = r#"
        [[users]]
        username = "leo"
        full_name = "Leo Tolstoy"

        [[users]]
        username = "anna"

        [[groups]]
        title = "Cats"

        [[posts]]
        author = "leo"
        text = "older"
        group = "cats"
        pub_date = "2024-01-01T12:00:00Z"

        [[posts]]
        author = "leo"
        text = "newer"
        pub_date = "2024-01-02T12:00:00Z"

        [[follows]]
        user = "anna"
        author = "leo"

        [[follows]]
        user = "leo"
        author = "leo"
    "#;

    async fn apply_to(repos: &Arc<MemoryRepositories>, seed: SeedFile) -> Result<SeedSummary, SeedError> {
        let posts = PostService::new(repos.clone(), repos.clone(), repos.clone());
        let follows = FollowService::new(repos.clone(), repos.clone());
        apply(
            seed,
            SeedTargets {
                users: repos.as_ref(),
                groups: repos.as_ref(),
                posts: &posts,
                follows: &follows,
            },
        )
        .await
    }

    #[tokio::test]
    async fn fixture_populates_the_store() {
        let repos = Arc::new(MemoryRepositories::new());
        let seed = SeedFile::parse(FIXTURE).expect("parse");

        let summary = apply_to(&repos, seed).await.expect("apply");

        assert_eq!(
            summary,
            SeedSummary {
                users: 2,
                groups: 1,
                posts: 2,
                follows: 1,
            }
        );
        let listed = repos
            .list_posts(&PostListScope::All, 0, 10)
            .await
            .expect("list");
        assert_eq!(listed[0].text, "newer");
        assert_eq!(listed[1].group.as_deref(), Some("cats"));
    }

    #[tokio::test]
    async fn unknown_post_author_fails() {
        let repos = Arc::new(MemoryRepositories::new());
        let seed = SeedFile::parse(
            r#"
            [[posts]]
            author = "ghost"
            text = "boo"
            "#,
        )
        .expect("parse");

        let err = apply_to(&repos, seed).await.expect_err("unknown author");
        assert!(matches!(err, SeedError::UnknownUser(name) if name == "ghost"));
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let err = SeedFile::parse(
            r#"
            [[users]]
            username = "leo"
            password = "secret"
            "#,
        )
        .expect_err("unknown field");
        assert!(matches!(err, SeedError::Parse(_)));
    }

    #[tokio::test]
    async fn missing_file_reports_path() {
        let err = SeedFile::read(Path::new("/nonexistent/seed.toml"))
            .await
            .expect_err("missing file");
        assert!(matches!(err, SeedError::Read { path, .. } if path.ends_with("seed.toml")));
    }
}
