//! Listing side of a small blogging platform.
//!
//! Posts are paginated per listing (home feed, group, author profile, and the
//! following feed) and the shared listings are served through a page-level
//! cache with a fixed time-to-live. See [`cache`] for the caching contract.

pub mod application;
pub mod cache;
pub mod config;
pub mod domain;
pub mod infra;
