use std::io::Write;
use std::sync::Arc;

use tempfile::NamedTempFile;
use yatube::application::posts::{FollowService, PostService};
use yatube::application::repos::{FollowsRepo, GroupsRepo, PostListScope, PostsRepo, UsersRepo};
use yatube::infra::memory::MemoryRepositories;
use yatube::infra::seed::{self, SeedError, SeedFile, SeedSummary, SeedTargets};

const FIXTURE: &str = r#"
[[users]]
username = "leo"
full_name = "Leo Tolstoy"

[[users]]
username = "anna"
full_name = "Anna"

[[groups]]
title = "Кошки"
description = "Всё о кошках"

[[posts]]
author = "leo"
text = "Первый пост"
group = "koshki"
pub_date = "2024-03-01T10:00:00Z"

[[posts]]
author = "leo"
text = "Второй пост"
pub_date = "2024-03-02T10:00:00Z"

[[follows]]
user = "anna"
author = "leo"

[[follows]]
user = "anna"
author = "leo"
"#;

fn write_fixture(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("temp file");
    file.write_all(contents.as_bytes()).expect("write fixture");
    file
}

async fn load(repos: &Arc<MemoryRepositories>, path: &std::path::Path) -> Result<SeedSummary, SeedError> {
    let file = SeedFile::read(path).await?;
    let posts = PostService::new(repos.clone(), repos.clone(), repos.clone());
    let follows = FollowService::new(repos.clone(), repos.clone());
    seed::apply(
        file,
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
async fn seed_file_populates_listings() {
    let fixture = write_fixture(FIXTURE);
    let repos = Arc::new(MemoryRepositories::new());

    let summary = load(&repos, fixture.path()).await.expect("seed applied");
    assert_eq!(
        summary,
        SeedSummary {
            users: 2,
            groups: 1,
            posts: 2,
            follows: 1,
        }
    );

    let group = repos
        .find_group("koshki")
        .await
        .expect("lookup")
        .expect("group with transliterated slug");
    assert_eq!(group.title, "Кошки");

    let anna = repos
        .find_by_username("anna")
        .await
        .expect("lookup")
        .expect("anna");
    let feed = repos
        .list_posts(&PostListScope::FollowedBy(anna.id), 0, 10)
        .await
        .expect("follow feed");
    assert_eq!(feed.len(), 2);
    assert_eq!(feed[0].text, "Второй пост");

    let leo = repos
        .find_by_username("leo")
        .await
        .expect("lookup")
        .expect("leo");
    assert!(repos.is_following(anna.id, leo.id).await.expect("lookup"));
}

#[tokio::test]
async fn malformed_seed_file_is_a_parse_error() {
    let fixture = write_fixture("[[users]]\nusername = 42\n");
    let repos = Arc::new(MemoryRepositories::new());

    let err = load(&repos, fixture.path()).await.expect_err("parse error");
    assert!(matches!(err, SeedError::Parse(_)));
}

#[tokio::test]
async fn post_into_unknown_group_is_rejected() {
    let fixture = write_fixture(
        r#"
[[users]]
username = "leo"

[[posts]]
author = "leo"
text = "lost"
group = "nowhere"
"#,
    );
    let repos = Arc::new(MemoryRepositories::new());

    let err = load(&repos, fixture.path()).await.expect_err("unknown group");
    assert!(matches!(err, SeedError::Post(_)));
}
