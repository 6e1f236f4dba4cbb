use std::collections::HashSet;
use std::sync::Arc;

use rand::Rng;
use tracing::{info, warn};

use crate::config::FeedTuning;
use crate::error::FeedError;
use crate::metrics;
use crate::models::{AuthorId, FeedItem, FeedPage, FeedRequest, Listing, PageRequest, Post};
use crate::services::diversity::{AuthorCapLayer, RunLengthInterleaver};
use crate::services::pagination::paginate;
use crate::services::recall::CandidateSelector;
use crate::store::{ContentStore, SortOrder};

/// Feed variants, used as log and metric labels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedKind {
    Posts,
    Listings,
    FollowedListings,
    AuthorPosts,
    AuthorListings,
    RepliedPosts,
    RepliedListings,
}

impl FeedKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FeedKind::Posts => "posts",
            FeedKind::Listings => "listings",
            FeedKind::FollowedListings => "followed_listings",
            FeedKind::AuthorPosts => "author_posts",
            FeedKind::AuthorListings => "author_listings",
            FeedKind::RepliedPosts => "replied_posts",
            FeedKind::RepliedListings => "replied_listings",
        }
    }
}

/// Composes paginated feeds on top of the post and listing stores.
///
/// Stateless between calls; every intermediate collection is request
/// scoped. A store failure fails the whole composition.
#[derive(Clone)]
pub struct FeedEngine {
    posts: Arc<dyn ContentStore<Post>>,
    listings: Arc<dyn ContentStore<Listing>>,
    tuning: FeedTuning,
}

impl FeedEngine {
    pub fn new(
        posts: Arc<dyn ContentStore<Post>>,
        listings: Arc<dyn ContentStore<Listing>>,
        tuning: FeedTuning,
    ) -> Self {
        Self {
            posts,
            listings,
            tuning,
        }
    }

    pub fn tuning(&self) -> &FeedTuning {
        &self.tuning
    }

    /// Post feed: followed authors (viewer included) blended with a random
    /// sample of other authors, at most `post_author_cap` posts per author.
    pub async fn followed_discovery_feed<R>(
        &self,
        request: &FeedRequest,
        rng: &mut R,
    ) -> Result<FeedPage<Post>, FeedError>
    where
        R: Rng + Send + ?Sized,
    {
        let result = self
            .compose_followed_discovery(
                self.posts.as_ref(),
                request,
                self.tuning.post_author_cap,
                FeedKind::Posts,
                rng,
            )
            .await;
        record(FeedKind::Posts, &result);
        result
    }

    /// Listing feed over the whole catalogue, newest first, with same-author
    /// runs bounded by `listing_max_run`.
    pub async fn global_interleaved_feed(
        &self,
        page: PageRequest,
    ) -> Result<FeedPage<Listing>, FeedError> {
        let result = async {
            let all = self.listings.all_items_by_recency().await?;
            let fetched = all.len();

            let interleaver = RunLengthInterleaver::new(
                self.tuning.listing_max_run,
                self.tuning.listing_cooldown_drain,
            );
            let ordered = interleaver.interleave(all);

            info!(
                "Composed listings feed: pool={}, page={}, page_size={}",
                fetched,
                page.page(),
                page.page_size()
            );

            Ok(into_page(ordered, page))
        }
        .await;

        record(FeedKind::Listings, &result);
        result
    }

    /// Listing counterpart of the post feed, capped at
    /// `listing_author_cap` listings per author.
    pub async fn followed_discovery_listing_feed<R>(
        &self,
        request: &FeedRequest,
        rng: &mut R,
    ) -> Result<FeedPage<Listing>, FeedError>
    where
        R: Rng + Send + ?Sized,
    {
        let result = self
            .compose_followed_discovery(
                self.listings.as_ref(),
                request,
                self.tuning.listing_author_cap,
                FeedKind::FollowedListings,
                rng,
            )
            .await;
        record(FeedKind::FollowedListings, &result);
        result
    }

    pub async fn author_posts(
        &self,
        author: AuthorId,
        page: PageRequest,
    ) -> Result<FeedPage<Post>, FeedError> {
        let result = author_timeline(self.posts.as_ref(), author, page, FeedKind::AuthorPosts).await;
        record(FeedKind::AuthorPosts, &result);
        result
    }

    pub async fn author_listings(
        &self,
        author: AuthorId,
        page: PageRequest,
    ) -> Result<FeedPage<Listing>, FeedError> {
        let result =
            author_timeline(self.listings.as_ref(), author, page, FeedKind::AuthorListings).await;
        record(FeedKind::AuthorListings, &result);
        result
    }

    /// Posts `author` has replied to, newest first.
    pub async fn posts_replied_by(
        &self,
        author: AuthorId,
        page: PageRequest,
    ) -> Result<FeedPage<Post>, FeedError> {
        let result =
            replied_timeline(self.posts.as_ref(), author, page, FeedKind::RepliedPosts).await;
        record(FeedKind::RepliedPosts, &result);
        result
    }

    pub async fn listings_replied_by(
        &self,
        author: AuthorId,
        page: PageRequest,
    ) -> Result<FeedPage<Listing>, FeedError> {
        let result =
            replied_timeline(self.listings.as_ref(), author, page, FeedKind::RepliedListings)
                .await;
        record(FeedKind::RepliedListings, &result);
        result
    }

    async fn compose_followed_discovery<T, R>(
        &self,
        store: &dyn ContentStore<T>,
        request: &FeedRequest,
        per_author_cap: usize,
        kind: FeedKind,
        rng: &mut R,
    ) -> Result<FeedPage<T>, FeedError>
    where
        T: FeedItem,
        R: Rng + Send + ?Sized,
    {
        let followed_authors = request.followed_authors();
        let selector = CandidateSelector::from_tuning(&self.tuning);

        let candidates = selector.select(store, &followed_authors, rng).await?;
        let stats = candidates.stats.clone();

        let pool = AuthorCapLayer::new(per_author_cap).apply(candidates.into_combined());

        info!(
            "Composed {} feed for viewer {}: following={}, followed_items={}, discovery_items={}, pool={}, page={}, page_size={}",
            kind.as_str(),
            request.viewer_id,
            request.follow_set.len(),
            stats.followed_count,
            stats.discovery_count,
            pool.len(),
            request.page.page(),
            request.page.page_size()
        );

        Ok(into_page(pool, request.page))
    }
}

async fn author_timeline<T: FeedItem>(
    store: &dyn ContentStore<T>,
    author: AuthorId,
    page: PageRequest,
    kind: FeedKind,
) -> Result<FeedPage<T>, FeedError> {
    let authors: HashSet<AuthorId> = HashSet::from([author]);
    let items = store
        .items_by_authors(&authors, SortOrder::NewestFirst, None)
        .await?;

    info!(
        "Composed {} feed for author {}: items={}, page={}",
        kind.as_str(),
        author,
        items.len(),
        page.page()
    );

    Ok(into_page(items, page))
}

async fn replied_timeline<T: FeedItem>(
    store: &dyn ContentStore<T>,
    author: AuthorId,
    page: PageRequest,
    kind: FeedKind,
) -> Result<FeedPage<T>, FeedError> {
    let items = store.items_replied_by(author).await?;

    info!(
        "Composed {} feed for author {}: items={}, page={}",
        kind.as_str(),
        author,
        items.len(),
        page.page()
    );

    Ok(into_page(items, page))
}

fn into_page<T: Clone>(pool: Vec<T>, page: PageRequest) -> FeedPage<T> {
    FeedPage {
        items: paginate(&pool, page).to_vec(),
        page,
        total_candidates: pool.len(),
    }
}

fn record<T>(kind: FeedKind, result: &Result<FeedPage<T>, FeedError>) {
    match result {
        Ok(page) => metrics::record_feed_composition(kind.as_str(), page.total_candidates),
        Err(e) => {
            warn!("Failed to compose {} feed: {}", kind.as_str(), e);
            metrics::record_feed_failure(kind.as_str());
        }
    }
}
