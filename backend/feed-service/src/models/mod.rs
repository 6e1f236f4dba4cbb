use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use uuid::Uuid;

use crate::error::FeedError;

/// Opaque author identifier; the grouping key for every diversity rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AuthorId(pub Uuid);

impl AuthorId {
    pub fn new(id: Uuid) -> Self {
        Self(id)
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl From<Uuid> for AuthorId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

impl fmt::Display for AuthorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Authors a viewer follows.
pub type FollowSet = HashSet<AuthorId>;

/// Common view over anything the engine can put in a feed.
pub trait FeedItem: Clone + Send + Sync + 'static {
    fn id(&self) -> Uuid;
    fn author_id(&self) -> AuthorId;
    fn created_at(&self) -> DateTime<Utc>;

    fn replies(&self) -> &[Reply] {
        &[]
    }

    /// Whether `author` has replied to this item.
    fn replied_by(&self, author: AuthorId) -> bool {
        self.replies().iter().any(|reply| reply.user_id == author)
    }
}

/// A reply left on a post or listing. The author's display fields are
/// copied in at write time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reply {
    pub user_id: AuthorId,
    pub text: String,
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_profile_pic: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    pub id: Uuid,
    pub author_id: AuthorId,
    pub author_username: String,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    /// Short machine-generated resume of the post, when one exists
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    /// Users who liked the post
    #[serde(default)]
    pub likes: Vec<AuthorId>,
    #[serde(default)]
    pub replies: Vec<Reply>,
    pub created_at: DateTime<Utc>,
}

impl FeedItem for Post {
    fn id(&self) -> Uuid {
        self.id
    }

    fn author_id(&self) -> AuthorId {
        self.author_id
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    fn replies(&self) -> &[Reply] {
        &self.replies
    }
}

/// Marketplace listing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Listing {
    pub id: Uuid,
    pub author_id: AuthorId,
    pub author_username: String,
    pub title: String,
    pub category: String,
    pub description: String,
    pub price: f64,
    #[serde(default)]
    pub image_urls: Vec<String>,
    pub available: bool,
    #[serde(default)]
    pub likes: Vec<AuthorId>,
    #[serde(default)]
    pub replies: Vec<Reply>,
    pub created_at: DateTime<Utc>,
}

impl FeedItem for Listing {
    fn id(&self) -> Uuid {
        self.id
    }

    fn author_id(&self) -> AuthorId {
        self.author_id
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    fn replies(&self) -> &[Reply] {
        &self.replies
    }
}

/// Validated 1-based page window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    page: usize,
    page_size: usize,
}

impl PageRequest {
    /// Accepts signed input so callers can hand over raw query values;
    /// anything below 1 is rejected.
    pub fn new(page: i64, page_size: i64) -> Result<Self, FeedError> {
        if page < 1 {
            return Err(FeedError::InvalidRequest(format!(
                "page must be >= 1, got {}",
                page
            )));
        }
        if page_size < 1 {
            return Err(FeedError::InvalidRequest(format!(
                "page_size must be >= 1, got {}",
                page_size
            )));
        }

        Ok(Self {
            page: usize::try_from(page).unwrap_or(usize::MAX),
            page_size: usize::try_from(page_size).unwrap_or(usize::MAX),
        })
    }

    pub fn page(&self) -> usize {
        self.page
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Number of items before this page.
    pub fn offset(&self) -> usize {
        (self.page - 1).saturating_mul(self.page_size)
    }
}

/// Personalized feed request.
#[derive(Debug, Clone)]
pub struct FeedRequest {
    pub viewer_id: AuthorId,
    pub follow_set: FollowSet,
    pub page: PageRequest,
}

impl FeedRequest {
    pub fn new(viewer_id: AuthorId, follow_set: FollowSet, page: PageRequest) -> Self {
        Self {
            viewer_id,
            follow_set,
            page,
        }
    }

    /// Follow set plus the viewer; self-authored items count as followed.
    pub fn followed_authors(&self) -> FollowSet {
        let mut authors = self.follow_set.clone();
        authors.insert(self.viewer_id);
        authors
    }
}

/// One page of a composed feed.
#[derive(Debug, Clone)]
pub struct FeedPage<T> {
    pub items: Vec<T>,
    pub page: PageRequest,
    /// Size of the ordered pool before pagination
    pub total_candidates: usize,
}

impl<T> FeedPage<T> {
    pub fn has_more(&self) -> bool {
        self.page
            .offset()
            .saturating_add(self.items.len())
            < self.total_candidates
    }
}

/// Wire shape for every feed endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedResponse<T> {
    pub items: Vec<T>,
    pub page: usize,
    pub page_size: usize,
    pub has_more: bool,
    pub total_candidates: usize,
}

impl<T> From<FeedPage<T>> for FeedResponse<T> {
    fn from(page: FeedPage<T>) -> Self {
        let has_more = page.has_more();
        Self {
            page: page.page.page(),
            page_size: page.page.page_size(),
            has_more,
            total_candidates: page.total_candidates,
            items: page.items,
        }
    }
}
