//! Read-only collaborators the feed engine composes from.
//!
//! - `ContentStore<T>`: one item collection (posts or listings)
//! - `FollowGraph`: who a viewer follows
//!
//! The engine never writes through these traits and never retries; retry
//! policy, if any, belongs to the implementation.

mod memory;
mod postgres;

use crate::error::StoreError;
use crate::models::AuthorId;
use async_trait::async_trait;
use std::collections::HashSet;

pub use memory::{InMemoryContentStore, InMemoryFollowGraph};
pub use postgres::{PgFollowGraph, PgListingStore, PgPostStore};

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Ordering applied to `created_at`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    #[default]
    NewestFirst,
    OldestFirst,
}

#[async_trait]
pub trait ContentStore<T>: Send + Sync {
    /// Items written by any of `authors`, ordered by `created_at`.
    /// `limit` caps the total across all authors, not per author.
    async fn items_by_authors(
        &self,
        authors: &HashSet<AuthorId>,
        order: SortOrder,
        limit: Option<usize>,
    ) -> StoreResult<Vec<T>>;

    /// Every author with at least one item, in a stable order.
    async fn distinct_author_ids(&self) -> StoreResult<Vec<AuthorId>>;

    /// The whole collection, newest first.
    async fn all_items_by_recency(&self) -> StoreResult<Vec<T>>;

    /// Items `author` has replied to, newest first.
    async fn items_replied_by(&self, author: AuthorId) -> StoreResult<Vec<T>>;
}

#[async_trait]
pub trait FollowGraph: Send + Sync {
    async fn following(&self, viewer: AuthorId) -> StoreResult<Vec<AuthorId>>;
}
