pub mod feed;

use actix_web::{web, HttpResponse};

pub use feed::{
    get_author_listing_replies, get_author_listings, get_author_posts, get_author_replies,
    get_followed_listing_feed, get_listing_feed, get_post_feed, FeedHandlerState,
    FeedQueryParams,
};

pub async fn health() -> HttpResponse {
    HttpResponse::Ok().body("OK")
}

/// Mounts the `/api/v1` routes. `FeedHandlerState` must be registered as
/// app data.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/v1")
            .route("/health", web::get().to(health))
            .service(get_post_feed)
            .service(get_followed_listing_feed)
            .service(get_listing_feed)
            .service(get_author_posts)
            .service(get_author_listings)
            .service(get_author_replies)
            .service(get_author_listing_replies),
    );
}
