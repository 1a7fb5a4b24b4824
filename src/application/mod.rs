//! Application layer: listing services, pagination, and the write paths that
//! change what listings show.

pub mod error;
pub mod feed;
pub mod pagination;
pub mod posts;
pub mod repos;
