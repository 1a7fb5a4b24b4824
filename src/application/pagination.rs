//! Numbered pagination over an ordered item source.
//!
//! A [`Paginator`] is built per request around a live [`ItemSource`]. It counts
//! the source once, validates 1-based page numbers against that count, and
//! slices out the requested page. Out-of-range numbers are errors, never
//! silently clamped; [`Paginator::get_page`] is the lenient variant for
//! listings that prefer to fall back instead.

use std::marker::PhantomData;
use std::num::NonZeroU32;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::OnceCell;

use crate::application::repos::RepoError;

/// An ordered collection that can be counted and sliced.
#[async_trait]
pub trait ItemSource<T>: Send + Sync {
    async fn count(&self) -> Result<u64, RepoError>;

    async fn slice(&self, offset: u64, limit: u64) -> Result<Vec<T>, RepoError>;
}

#[async_trait]
impl<T> ItemSource<T> for Vec<T>
where
    T: Clone + Send + Sync + 'static,
{
    async fn count(&self) -> Result<u64, RepoError> {
        Ok(self.len() as u64)
    }

    async fn slice(&self, offset: u64, limit: u64) -> Result<Vec<T>, RepoError> {
        let start = usize::try_from(offset)
            .unwrap_or(usize::MAX)
            .min(self.len());
        let end = start
            .saturating_add(usize::try_from(limit).unwrap_or(usize::MAX))
            .min(self.len());
        Ok(self[start..end].to_vec())
    }
}

#[async_trait]
impl<T, S> ItemSource<T> for Arc<S>
where
    T: Send + 'static,
    S: ItemSource<T> + ?Sized,
{
    async fn count(&self) -> Result<u64, RepoError> {
        (**self).count().await
    }

    async fn slice(&self, offset: u64, limit: u64) -> Result<Vec<T>, RepoError> {
        (**self).slice(offset, limit).await
    }
}

/// Why a requested page number cannot be served.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidPage {
    #[error("page number `{0}` is not an integer")]
    NotAnInteger(String),
    #[error("page number {0} is less than 1")]
    LessThanOne(i64),
    #[error("page {0} contains no results")]
    Empty(u64),
}

#[derive(Debug, Error)]
pub enum PaginationError {
    #[error("invalid page: {0}")]
    InvalidPage(#[from] InvalidPage),
    #[error(transparent)]
    Repo(#[from] RepoError),
}

/// Parse the caller's optional `page` query value.
///
/// `None` stays `None`; anything present must be an integer (surrounding
/// whitespace is ignored).
pub fn parse_page_number(raw: Option<&str>) -> Result<Option<i64>, InvalidPage> {
    match raw {
        None => Ok(None),
        Some(value) => value
            .trim()
            .parse::<i64>()
            .map(Some)
            .map_err(|_| InvalidPage::NotAnInteger(value.to_string())),
    }
}

/// Paginator state a page is rendered against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageMeta {
    pub count: u64,
    pub per_page: u64,
    pub num_pages: u64,
}

/// One page of items plus navigation metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    items: Vec<T>,
    number: u64,
    meta: PageMeta,
}

impl<T> Page<T> {
    pub(crate) fn new(items: Vec<T>, number: u64, meta: PageMeta) -> Self {
        Self {
            items,
            number,
            meta,
        }
    }

    pub fn items(&self) -> &[T] {
        &self.items
    }

    pub fn into_items(self) -> Vec<T> {
        self.items
    }

    pub fn number(&self) -> u64 {
        self.number
    }

    pub fn meta(&self) -> PageMeta {
        self.meta
    }

    pub fn num_pages(&self) -> u64 {
        self.meta.num_pages
    }

    pub fn count(&self) -> u64 {
        self.meta.count
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn has_next(&self) -> bool {
        self.number < self.meta.num_pages
    }

    pub fn has_previous(&self) -> bool {
        self.number > 1
    }

    pub fn has_other_pages(&self) -> bool {
        self.has_next() || self.has_previous()
    }

    pub fn next_page_number(&self) -> Result<u64, InvalidPage> {
        if self.has_next() {
            Ok(self.number + 1)
        } else {
            Err(InvalidPage::Empty(self.number + 1))
        }
    }

    pub fn previous_page_number(&self) -> Result<u64, InvalidPage> {
        if self.has_previous() {
            Ok(self.number - 1)
        } else {
            Err(InvalidPage::LessThanOne(0))
        }
    }

    /// 1-based index of the first item on this page, 0 for an empty collection.
    pub fn start_index(&self) -> u64 {
        if self.meta.count == 0 {
            return 0;
        }
        self.meta.per_page * self.number.saturating_sub(1) + 1
    }

    /// 1-based index of the last item on this page.
    pub fn end_index(&self) -> u64 {
        if self.number == self.meta.num_pages {
            return self.meta.count;
        }
        self.number * self.meta.per_page
    }
}

/// Splits an [`ItemSource`] into numbered pages.
pub struct Paginator<T, S> {
    source: S,
    per_page: NonZeroU32,
    orphans: u32,
    allow_empty_first_page: bool,
    count: OnceCell<u64>,
    _items: PhantomData<fn() -> T>,
}

impl<T, S> Paginator<T, S>
where
    T: Send,
    S: ItemSource<T>,
{
    pub fn new(source: S, per_page: NonZeroU32) -> Self {
        Self {
            source,
            per_page,
            orphans: 0,
            allow_empty_first_page: true,
            count: OnceCell::new(),
            _items: PhantomData,
        }
    }

    /// Let the last page absorb up to `orphans` trailing items instead of
    /// starting a page of its own.
    pub fn with_orphans(mut self, orphans: u32) -> Self {
        self.orphans = orphans;
        self
    }

    pub fn allow_empty_first_page(mut self, allow: bool) -> Self {
        self.allow_empty_first_page = allow;
        self
    }

    pub fn per_page(&self) -> NonZeroU32 {
        self.per_page
    }

    /// Size of the source, queried once per paginator.
    pub async fn count(&self) -> Result<u64, RepoError> {
        self.count
            .get_or_try_init(|| self.source.count())
            .await
            .copied()
    }

    pub async fn meta(&self) -> Result<PageMeta, RepoError> {
        let count = self.count().await?;
        let per_page = u64::from(self.per_page.get());
        let num_pages = if count == 0 && !self.allow_empty_first_page {
            0
        } else {
            let hits = count.saturating_sub(u64::from(self.orphans)).max(1);
            hits.div_ceil(per_page)
        };
        Ok(PageMeta {
            count,
            per_page,
            num_pages,
        })
    }

    pub async fn num_pages(&self) -> Result<u64, RepoError> {
        Ok(self.meta().await?.num_pages)
    }

    /// Check that `number` names an existing page.
    pub async fn validate_number(&self, number: i64) -> Result<u64, PaginationError> {
        if number < 1 {
            return Err(InvalidPage::LessThanOne(number).into());
        }
        let number = number.unsigned_abs();
        if number > self.num_pages().await? {
            return Err(InvalidPage::Empty(number).into());
        }
        Ok(number)
    }

    /// Fetch page `number`, failing for numbers outside `1..=num_pages`.
    pub async fn page(&self, number: i64) -> Result<Page<T>, PaginationError> {
        let number = self.validate_number(number).await?;
        self.fetch_page(number).await
    }

    /// Lenient lookup: a missing or malformed number yields the first page and
    /// an out-of-range number yields the last one.
    pub async fn get_page(&self, raw: Option<&str>) -> Result<Page<T>, PaginationError> {
        let number = parse_page_number(raw).ok().flatten().unwrap_or(1);
        match self.page(number).await {
            Err(PaginationError::InvalidPage(_)) => {
                let last = self.num_pages().await?;
                self.page(i64::try_from(last).unwrap_or(i64::MAX)).await
            }
            result => result,
        }
    }

    /// Offset and length of an already validated page.
    pub(crate) fn bounds(&self, meta: &PageMeta, number: u64) -> (u64, u64) {
        let bottom = (number - 1).saturating_mul(meta.per_page);
        let mut top = bottom.saturating_add(meta.per_page);
        if top.saturating_add(u64::from(self.orphans)) >= meta.count {
            top = meta.count;
        }
        (bottom, top.saturating_sub(bottom))
    }

    /// Slice an already validated page out of the source.
    pub(crate) async fn fetch_page(&self, number: u64) -> Result<Page<T>, PaginationError> {
        let meta = self.meta().await?;
        let (offset, limit) = self.bounds(&meta, number);
        let items = if limit == 0 {
            Vec::new()
        } else {
            self.source.slice(offset, limit).await?
        };
        Ok(Page::new(items, number, meta))
    }
}
