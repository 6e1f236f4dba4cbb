//! Fixtures shared by the integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use feed_service::error::StoreError;
use feed_service::models::{AuthorId, Listing, Post, Reply};
use feed_service::store::{ContentStore, FollowGraph, SortOrder, StoreResult};
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use uuid::Uuid;

pub fn author(n: u128) -> AuthorId {
    AuthorId(Uuid::from_u128(n))
}

pub fn ts(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
}

pub fn post(id: u128, by: u128, at: i64) -> Post {
    Post {
        id: Uuid::from_u128(id),
        author_id: author(by),
        author_username: String::new(),
        text: format!("post {}", id),
        image_url: None,
        summary: None,
        likes: Vec::new(),
        replies: Vec::new(),
        created_at: ts(at),
    }
}

pub fn listing(id: u128, by: u128, at: i64) -> Listing {
    Listing {
        id: Uuid::from_u128(id),
        author_id: author(by),
        author_username: String::new(),
        title: format!("listing {}", id),
        category: "misc".to_string(),
        description: String::new(),
        price: 10.0,
        image_urls: Vec::new(),
        available: true,
        likes: Vec::new(),
        replies: Vec::new(),
        created_at: ts(at),
    }
}

pub fn reply(by: u128) -> Reply {
    Reply {
        user_id: author(by),
        text: format!("reply from {}", by),
        username: format!("user{}", by),
        user_profile_pic: None,
    }
}

/// One listing per entry, newest first in slice order.
pub fn listings_by_recency(authors: &[u128]) -> Vec<Listing> {
    let n = authors.len() as i64;
    authors
        .iter()
        .enumerate()
        .map(|(i, &by)| listing(i as u128 + 1, by, n - i as i64))
        .collect()
}

/// Store that fails every call.
#[derive(Debug, Default)]
pub struct UnavailableStore;

#[async_trait]
impl<T: Send + 'static> ContentStore<T> for UnavailableStore {
    async fn items_by_authors(
        &self,
        _authors: &HashSet<AuthorId>,
        _order: SortOrder,
        _limit: Option<usize>,
    ) -> StoreResult<Vec<T>> {
        Err(StoreError::Unavailable("connection refused".to_string()))
    }

    async fn distinct_author_ids(&self) -> StoreResult<Vec<AuthorId>> {
        Err(StoreError::Unavailable("connection refused".to_string()))
    }

    async fn all_items_by_recency(&self) -> StoreResult<Vec<T>> {
        Err(StoreError::Unavailable("connection refused".to_string()))
    }

    async fn items_replied_by(&self, _author: AuthorId) -> StoreResult<Vec<T>> {
        Err(StoreError::Unavailable("connection refused".to_string()))
    }
}

/// Counts every call before delegating.
pub struct CountingStore<T> {
    inner: Arc<dyn ContentStore<T>>,
    calls: Arc<AtomicUsize>,
}

impl<T> CountingStore<T> {
    pub fn new(inner: Arc<dyn ContentStore<T>>) -> (Self, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        (
            Self {
                inner,
                calls: calls.clone(),
            },
            calls,
        )
    }
}

#[async_trait]
impl<T: Send + 'static> ContentStore<T> for CountingStore<T> {
    async fn items_by_authors(
        &self,
        authors: &HashSet<AuthorId>,
        order: SortOrder,
        limit: Option<usize>,
    ) -> StoreResult<Vec<T>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.items_by_authors(authors, order, limit).await
    }

    async fn distinct_author_ids(&self) -> StoreResult<Vec<AuthorId>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.distinct_author_ids().await
    }

    async fn all_items_by_recency(&self) -> StoreResult<Vec<T>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.all_items_by_recency().await
    }

    async fn items_replied_by(&self, author: AuthorId) -> StoreResult<Vec<T>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.items_replied_by(author).await
    }
}

/// Follow graph that counts lookups.
pub struct CountingFollowGraph {
    inner: Arc<dyn FollowGraph>,
    calls: Arc<AtomicUsize>,
}

impl CountingFollowGraph {
    pub fn new(inner: Arc<dyn FollowGraph>) -> (Self, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        (
            Self {
                inner,
                calls: calls.clone(),
            },
            calls,
        )
    }
}

#[async_trait]
impl FollowGraph for CountingFollowGraph {
    async fn following(&self, viewer: AuthorId) -> StoreResult<Vec<AuthorId>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.following(viewer).await
    }
}
