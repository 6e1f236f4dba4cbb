use super::{ContentStore, FollowGraph, SortOrder, StoreResult};
use crate::models::{AuthorId, FeedItem};
use async_trait::async_trait;
use std::cmp::Reverse;
use std::collections::{BTreeSet, HashMap, HashSet};

/// Snapshot-backed store for local runs and tests.
///
/// Ties on `created_at` resolve to insertion order so repeated reads of the
/// same snapshot are identical.
#[derive(Debug, Clone, Default)]
pub struct InMemoryContentStore<T> {
    items: Vec<T>,
}

impl<T: FeedItem> InMemoryContentStore<T> {
    pub fn new(items: Vec<T>) -> Self {
        Self { items }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    fn sorted(&self, order: SortOrder, filter: impl Fn(&T) -> bool) -> Vec<T> {
        let mut selected: Vec<T> = self.items.iter().filter(|i| filter(i)).cloned().collect();
        match order {
            SortOrder::NewestFirst => selected.sort_by_key(|i| Reverse(i.created_at())),
            SortOrder::OldestFirst => selected.sort_by_key(|i| i.created_at()),
        }
        selected
    }
}

#[async_trait]
impl<T: FeedItem> ContentStore<T> for InMemoryContentStore<T> {
    async fn items_by_authors(
        &self,
        authors: &HashSet<AuthorId>,
        order: SortOrder,
        limit: Option<usize>,
    ) -> StoreResult<Vec<T>> {
        if authors.is_empty() {
            return Ok(Vec::new());
        }

        let mut items = self.sorted(order, |i| authors.contains(&i.author_id()));
        if let Some(limit) = limit {
            items.truncate(limit);
        }
        Ok(items)
    }

    async fn distinct_author_ids(&self) -> StoreResult<Vec<AuthorId>> {
        let authors: BTreeSet<AuthorId> = self.items.iter().map(|i| i.author_id()).collect();
        Ok(authors.into_iter().collect())
    }

    async fn all_items_by_recency(&self) -> StoreResult<Vec<T>> {
        Ok(self.sorted(SortOrder::NewestFirst, |_| true))
    }

    async fn items_replied_by(&self, author: AuthorId) -> StoreResult<Vec<T>> {
        Ok(self.sorted(SortOrder::NewestFirst, |i| i.replied_by(author)))
    }
}

#[derive(Debug, Clone, Default)]
pub struct InMemoryFollowGraph {
    following: HashMap<AuthorId, Vec<AuthorId>>,
}

impl InMemoryFollowGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn follow(mut self, follower: AuthorId, followee: AuthorId) -> Self {
        let list = self.following.entry(follower).or_default();
        if !list.contains(&followee) {
            list.push(followee);
        }
        self
    }
}

#[async_trait]
impl FollowGraph for InMemoryFollowGraph {
    async fn following(&self, viewer: AuthorId) -> StoreResult<Vec<AuthorId>> {
        Ok(self.following.get(&viewer).cloned().unwrap_or_default())
    }
}
