use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::application::pagination::{
    InvalidPage, ItemSource, Page, PaginationError, Paginator, parse_page_number,
};
use crate::application::repos::{
    FollowsRepo, GroupsRepo, PostListScope, PostsRepo, RepoError, UsersRepo,
};
use crate::cache::{CachedListing, CachedPaginator, PageCache};
use crate::domain::entities::{GroupRecord, PostRecord, UserRecord};

const DEFAULT_PAGE_SIZE: u32 = 10;
const DEFAULT_PAGE_TTL_SECS: u64 = 20;

#[derive(Debug, Clone, Copy)]
pub struct FeedOptions {
    pub page_size: NonZeroU32,
    pub page_ttl: Duration,
}

impl Default for FeedOptions {
    fn default() -> Self {
        Self {
            page_size: NonZeroU32::new(DEFAULT_PAGE_SIZE).unwrap_or(NonZeroU32::MIN),
            page_ttl: Duration::from_secs(DEFAULT_PAGE_TTL_SECS),
        }
    }
}

#[derive(Debug, Error)]
pub enum FeedError {
    #[error(transparent)]
    InvalidPage(#[from] InvalidPage),
    #[error("unknown group `{0}`")]
    UnknownGroup(String),
    #[error("unknown user `{0}`")]
    UnknownUser(String),
    #[error(transparent)]
    Repo(#[from] RepoError),
}

impl From<PaginationError> for FeedError {
    fn from(error: PaginationError) -> Self {
        match error {
            PaginationError::InvalidPage(err) => FeedError::InvalidPage(err),
            PaginationError::Repo(err) => FeedError::Repo(err),
        }
    }
}

#[derive(Debug, Clone)]
pub struct IndexView {
    pub page: Page<PostRecord>,
}

#[derive(Debug, Clone)]
pub struct GroupView {
    pub group: GroupRecord,
    pub page: Page<PostRecord>,
}

#[derive(Debug, Clone)]
pub struct ProfileView {
    pub author: UserRecord,
    pub page: Page<PostRecord>,
    /// `None` for anonymous viewers.
    pub following: Option<bool>,
    pub is_author: bool,
}

#[derive(Debug, Clone)]
pub struct FollowView {
    pub page: Page<PostRecord>,
}

/// Posts in one listing scope, read fresh from the repository.
struct ScopedPosts {
    repo: Arc<dyn PostsRepo>,
    scope: PostListScope,
}

#[async_trait]
impl ItemSource<PostRecord> for ScopedPosts {
    async fn count(&self) -> Result<u64, RepoError> {
        self.repo.count_posts(&self.scope).await
    }

    async fn slice(&self, offset: u64, limit: u64) -> Result<Vec<PostRecord>, RepoError> {
        self.repo.list_posts(&self.scope, offset, limit).await
    }
}

#[derive(Clone)]
pub struct FeedService {
    posts: Arc<dyn PostsRepo>,
    groups: Arc<dyn GroupsRepo>,
    users: Arc<dyn UsersRepo>,
    follows: Arc<dyn FollowsRepo>,
    cache: Arc<dyn PageCache>,
    options: FeedOptions,
}

impl FeedService {
    pub fn new(
        posts: Arc<dyn PostsRepo>,
        groups: Arc<dyn GroupsRepo>,
        users: Arc<dyn UsersRepo>,
        follows: Arc<dyn FollowsRepo>,
        cache: Arc<dyn PageCache>,
        options: FeedOptions,
    ) -> Self {
        Self {
            posts,
            groups,
            users,
            follows,
            cache,
            options,
        }
    }

    pub fn options(&self) -> FeedOptions {
        self.options
    }

    /// Home feed: every post, newest first.
    pub async fn index(&self, page: Option<&str>) -> Result<IndexView, FeedError> {
        let page = self
            .cached_page(CachedListing::Index, PostListScope::All, page)
            .await?;
        Ok(IndexView { page })
    }

    pub async fn group(&self, slug: &str, page: Option<&str>) -> Result<GroupView, FeedError> {
        let group = self
            .groups
            .find_group(slug)
            .await?
            .ok_or_else(|| FeedError::UnknownGroup(slug.to_string()))?;

        let page = self
            .cached_page(
                CachedListing::Group(group.slug.clone()),
                PostListScope::Group(group.slug.clone()),
                page,
            )
            .await?;
        Ok(GroupView { group, page })
    }

    pub async fn profile(
        &self,
        username: &str,
        viewer: Option<Uuid>,
        page: Option<&str>,
    ) -> Result<ProfileView, FeedError> {
        let author = self
            .users
            .find_by_username(username)
            .await?
            .ok_or_else(|| FeedError::UnknownUser(username.to_string()))?;

        let page = self
            .cached_page(
                CachedListing::Profile(author.username.clone()),
                PostListScope::Author(author.username.clone()),
                page,
            )
            .await?;

        let following = match viewer {
            Some(viewer_id) => Some(self.follows.is_following(viewer_id, author.id).await?),
            None => None,
        };
        let is_author = viewer == Some(author.id);

        Ok(ProfileView {
            author,
            page,
            following,
            is_author,
        })
    }

    /// Posts by the authors `viewer` follows.
    ///
    /// Never cached; out-of-range or malformed page numbers fall back to the
    /// nearest valid page instead of failing.
    pub async fn follow(&self, viewer: Uuid, page: Option<&str>) -> Result<FollowView, FeedError> {
        let paginator = Paginator::new(
            ScopedPosts {
                repo: Arc::clone(&self.posts),
                scope: PostListScope::FollowedBy(viewer),
            },
            self.options.page_size,
        );
        let page = paginator.get_page(page).await?;
        Ok(FollowView { page })
    }

    async fn cached_page(
        &self,
        listing: CachedListing,
        scope: PostListScope,
        raw_page: Option<&str>,
    ) -> Result<Page<PostRecord>, FeedError> {
        let number = parse_page_number(raw_page)?;
        let paginator = Paginator::new(
            ScopedPosts {
                repo: Arc::clone(&self.posts),
                scope,
            },
            self.options.page_size,
        );

        let paginator = CachedPaginator::new(
            paginator,
            Arc::clone(&self.cache),
            listing.namespace(),
            self.options.page_ttl,
        );
        Ok(paginator.page(number).await?)
    }
}

#[cfg(test)]
mod tests {
    use time::macros::datetime;
    use time::{Duration as TimeDuration, OffsetDateTime};

    use super::*;
    use crate::application::repos::{
        CreateGroupParams, CreatePostParams, CreateUserParams, PostsWriteRepo,
    };
    use crate::cache::MemoryPageCache;
    use crate::infra::memory::MemoryRepositories;

    struct Fixture {
        repos: Arc<MemoryRepositories>,
        cache: Arc<MemoryPageCache>,
        feed: FeedService,
        leo: UserRecord,
        anna: UserRecord,
    }

    const BASE: OffsetDateTime = datetime!(2024-01-01 0:00 UTC);

    async fn fixture() -> Fixture {
        let repos = Arc::new(MemoryRepositories::new());
        let cache = Arc::new(MemoryPageCache::with_capacity(
            std::num::NonZeroUsize::new(64).expect("non-zero"),
        ));
        let leo = repos
            .create_user(CreateUserParams {
                username: "leo".into(),
                full_name: "Leo".into(),
            })
            .await
            .expect("user");
        let anna = repos
            .create_user(CreateUserParams {
                username: "anna".into(),
                full_name: "Anna".into(),
            })
            .await
            .expect("user");
        repos
            .create_group(CreateGroupParams {
                title: "Cats".into(),
                slug: Some("cats".into()),
                description: String::new(),
            })
            .await
            .expect("group");

        let feed = FeedService::new(
            repos.clone(),
            repos.clone(),
            repos.clone(),
            repos.clone(),
            cache.clone(),
            FeedOptions::default(),
        );
        Fixture {
            repos,
            cache,
            feed,
            leo,
            anna,
        }
    }

    async fn add_posts(fx: &Fixture, author: Uuid, group: Option<&str>, count: i64) {
        for n in 0..count {
            fx.repos
                .create_post(CreatePostParams {
                    author_id: author,
                    text: format!("post {n}"),
                    group: group.map(str::to_string),
                    image: None,
                    pub_date: Some(BASE + TimeDuration::minutes(n)),
                })
                .await
                .expect("post");
        }
    }

    #[tokio::test]
    async fn index_pages_newest_first() {
        let fx = fixture().await;
        add_posts(&fx, fx.leo.id, None, 13).await;

        let first = fx.feed.index(None).await.expect("page 1");
        assert_eq!(first.page.len(), 10);
        assert_eq!(first.page.items()[0].text, "post 12");
        assert!(first.page.has_next());

        let second = fx.feed.index(Some("2")).await.expect("page 2");
        assert_eq!(second.page.len(), 3);
        assert_eq!(second.page.number(), 2);
    }

    #[tokio::test]
    async fn index_rejects_bad_page_numbers() {
        let fx = fixture().await;
        add_posts(&fx, fx.leo.id, None, 3).await;

        for raw in ["0", "2", "abc", "-1"] {
            let err = fx.feed.index(Some(raw)).await.expect_err("invalid page");
            assert!(matches!(err, FeedError::InvalidPage(_)), "page {raw}");
        }
    }

    #[tokio::test]
    async fn empty_index_serves_an_empty_first_page() {
        let fx = fixture().await;
        let view = fx.feed.index(None).await.expect("empty page");
        assert!(view.page.is_empty());
        assert_eq!(view.page.number(), 1);
    }

    #[tokio::test]
    async fn group_listing_is_scoped_and_cached_under_its_slug() {
        let fx = fixture().await;
        add_posts(&fx, fx.leo.id, Some("cats"), 2).await;
        add_posts(&fx, fx.anna.id, None, 5).await;

        let view = fx.feed.group("cats", None).await.expect("group");
        assert_eq!(view.group.slug, "cats");
        assert_eq!(view.page.count(), 2);
        assert!(
            fx.cache
                .get("group_page_cats:10:1")
                .await
                .expect("get")
                .is_some()
        );
    }

    #[tokio::test]
    async fn unknown_group_and_user_are_reported() {
        let fx = fixture().await;
        assert!(matches!(
            fx.feed.group("dogs", None).await,
            Err(FeedError::UnknownGroup(slug)) if slug == "dogs"
        ));
        assert!(matches!(
            fx.feed.profile("ghost", None, None).await,
            Err(FeedError::UnknownUser(name)) if name == "ghost"
        ));
    }

    #[tokio::test]
    async fn profile_reports_follow_state_for_viewer() {
        let fx = fixture().await;
        add_posts(&fx, fx.leo.id, None, 1).await;

        let anonymous = fx.feed.profile("leo", None, None).await.expect("profile");
        assert_eq!(anonymous.following, None);
        assert!(!anonymous.is_author);

        let own = fx
            .feed
            .profile("leo", Some(fx.leo.id), None)
            .await
            .expect("profile");
        assert!(own.is_author);
        assert_eq!(own.following, Some(false));

        fx.repos
            .add_follow(fx.anna.id, fx.leo.id)
            .await
            .expect("follow");
        let follower = fx
            .feed
            .profile("leo", Some(fx.anna.id), None)
            .await
            .expect("profile");
        assert_eq!(follower.following, Some(true));
        assert_eq!(follower.page.count(), 1);
    }

    #[tokio::test]
    async fn follow_feed_is_lenient_and_uncached() {
        let fx = fixture().await;
        add_posts(&fx, fx.leo.id, None, 12).await;
        fx.repos
            .add_follow(fx.anna.id, fx.leo.id)
            .await
            .expect("follow");

        let last = fx
            .feed
            .follow(fx.anna.id, Some("99"))
            .await
            .expect("clamped");
        assert_eq!(last.page.number(), 2);

        let first = fx
            .feed
            .follow(fx.anna.id, Some("nope"))
            .await
            .expect("fallback");
        assert_eq!(first.page.number(), 1);

        assert!(fx.cache.is_empty());
    }
}
