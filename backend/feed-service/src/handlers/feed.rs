use actix_web::{get, web, HttpResponse};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Deserialize;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::middleware::ViewerId;
use crate::models::{AuthorId, FeedRequest, FeedResponse, FollowSet, PageRequest};
use crate::services::FeedEngine;
use crate::store::FollowGraph;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedQueryParams {
    #[serde(default = "default_page")]
    pub page: i64,
    /// Falls back to the configured default page size
    pub page_size: Option<i64>,
}

fn default_page() -> i64 {
    1
}

impl FeedQueryParams {
    fn page_request(&self, default_page_size: usize) -> Result<PageRequest> {
        let page_size = self
            .page_size
            .unwrap_or_else(|| i64::try_from(default_page_size).unwrap_or(i64::MAX));
        Ok(PageRequest::new(self.page, page_size)?)
    }
}

pub struct FeedHandlerState {
    pub engine: Arc<FeedEngine>,
    pub follow_graph: Arc<dyn FollowGraph>,
}

impl FeedHandlerState {
    fn page_request(&self, query: &FeedQueryParams) -> Result<PageRequest> {
        query.page_request(self.engine.tuning().default_page_size)
    }

    async fn feed_request(&self, viewer: ViewerId, page: PageRequest) -> Result<FeedRequest> {
        let following: FollowSet = self
            .follow_graph
            .following(viewer.0)
            .await?
            .into_iter()
            .collect();

        debug!("Viewer {} follows {} authors", viewer.0, following.len());

        Ok(FeedRequest::new(viewer.0, following, page))
    }
}

fn parse_author(raw: &str) -> Result<AuthorId> {
    Uuid::parse_str(raw)
        .map(AuthorId)
        .map_err(|_| AppError::BadRequest(format!("invalid author id: {}", raw)))
}

/// Followed and discovery posts for the calling viewer
#[get("/posts/feed")]
pub async fn get_post_feed(
    query: web::Query<FeedQueryParams>,
    viewer: ViewerId,
    state: web::Data<FeedHandlerState>,
) -> Result<HttpResponse> {
    let page = state.page_request(&query)?;
    let request = state.feed_request(viewer, page).await?;

    let mut rng = StdRng::from_entropy();
    let feed = state
        .engine
        .followed_discovery_feed(&request, &mut rng)
        .await?;

    Ok(HttpResponse::Ok().json(FeedResponse::from(feed)))
}

/// All listings, newest first with bounded same-seller runs. Not
/// personalized, but only served to identified viewers.
#[get("/listings/feed")]
pub async fn get_listing_feed(
    query: web::Query<FeedQueryParams>,
    viewer: ViewerId,
    state: web::Data<FeedHandlerState>,
) -> Result<HttpResponse> {
    let page = state.page_request(&query)?;
    debug!("Listing feed page {} for viewer {}", page.page(), viewer.0);
    let feed = state.engine.global_interleaved_feed(page).await?;

    Ok(HttpResponse::Ok().json(FeedResponse::from(feed)))
}

#[get("/listings/feed/following")]
pub async fn get_followed_listing_feed(
    query: web::Query<FeedQueryParams>,
    viewer: ViewerId,
    state: web::Data<FeedHandlerState>,
) -> Result<HttpResponse> {
    let page = state.page_request(&query)?;
    let request = state.feed_request(viewer, page).await?;

    let mut rng = StdRng::from_entropy();
    let feed = state
        .engine
        .followed_discovery_listing_feed(&request, &mut rng)
        .await?;

    Ok(HttpResponse::Ok().json(FeedResponse::from(feed)))
}

#[get("/users/{author_id}/posts")]
pub async fn get_author_posts(
    path: web::Path<String>,
    query: web::Query<FeedQueryParams>,
    state: web::Data<FeedHandlerState>,
) -> Result<HttpResponse> {
    let page = state.page_request(&query)?;
    let author = parse_author(&path)?;
    let feed = state.engine.author_posts(author, page).await?;

    Ok(HttpResponse::Ok().json(FeedResponse::from(feed)))
}

#[get("/users/{author_id}/listings")]
pub async fn get_author_listings(
    path: web::Path<String>,
    query: web::Query<FeedQueryParams>,
    state: web::Data<FeedHandlerState>,
) -> Result<HttpResponse> {
    let page = state.page_request(&query)?;
    let author = parse_author(&path)?;
    let feed = state.engine.author_listings(author, page).await?;

    Ok(HttpResponse::Ok().json(FeedResponse::from(feed)))
}

/// Posts the user has replied to
#[get("/users/{author_id}/replies")]
pub async fn get_author_replies(
    path: web::Path<String>,
    query: web::Query<FeedQueryParams>,
    state: web::Data<FeedHandlerState>,
) -> Result<HttpResponse> {
    let page = state.page_request(&query)?;
    let author = parse_author(&path)?;
    let feed = state.engine.posts_replied_by(author, page).await?;

    Ok(HttpResponse::Ok().json(FeedResponse::from(feed)))
}

/// Listings the user has replied to
#[get("/users/{author_id}/listings/replies")]
pub async fn get_author_listing_replies(
    path: web::Path<String>,
    query: web::Query<FeedQueryParams>,
    state: web::Data<FeedHandlerState>,
) -> Result<HttpResponse> {
    let page = state.page_request(&query)?;
    let author = parse_author(&path)?;
    let feed = state.engine.listings_replied_by(author, page).await?;

    Ok(HttpResponse::Ok().json(FeedResponse::from(feed)))
}
