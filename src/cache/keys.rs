//! Cache key namespaces for the post listings.

use std::num::NonZeroU32;

/// A post listing served through the page cache.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CachedListing {
    /// Home feed, shared by every visitor.
    Index,
    /// One group's posts, by group slug.
    Group(String),
    /// One author's posts, by username.
    Profile(String),
}

impl CachedListing {
    pub fn namespace(&self) -> String {
        match self {
            CachedListing::Index => "index_page".to_string(),
            CachedListing::Group(slug) => format!("group_page_{slug}"),
            CachedListing::Profile(username) => format!("profile_page_{username}"),
        }
    }
}

/// Any post listing.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ListingKey {
    Cached(CachedListing),
    /// The viewer's following feed.
    Follow,
}

impl ListingKey {
    /// Cache namespace for this listing, or `None` when it must not be cached.
    ///
    /// The following feed differs per viewer and is never cached.
    pub fn namespace(&self) -> Option<String> {
        match self {
            ListingKey::Cached(listing) => Some(listing.namespace()),
            ListingKey::Follow => None,
        }
    }
}

/// Join a namespace, page size, and page number into one cache key.
pub fn build_page_key(namespace: &str, per_page: NonZeroU32, number: u64) -> String {
    format!("{namespace}:{per_page}:{number}")
}
