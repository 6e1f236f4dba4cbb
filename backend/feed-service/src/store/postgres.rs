/// PostgreSQL-backed collaborators
///
/// Read-only queries over the `posts`, `listings` and `follows` tables.
/// Secondary ordering on `id` keeps equal timestamps in a stable order.
/// `likes` is a `uuid[]` column and `replies` a `jsonb` array of camelCase
/// reply objects.
use super::{ContentStore, FollowGraph, SortOrder, StoreResult};
use crate::models::{AuthorId, Listing, Post, Reply};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::types::Json;
use sqlx::{FromRow, PgPool};
use std::collections::HashSet;
use tracing::error;
use uuid::Uuid;

const POST_COLUMNS: &str =
    "id, author_id, author_username, text, image_url, summary, likes, replies, created_at";
const LISTING_COLUMNS: &str = "id, author_id, author_username, title, category, description, \
     price, image_urls, available, likes, replies, created_at";

#[derive(Debug, FromRow)]
struct PostRow {
    id: Uuid,
    author_id: Uuid,
    author_username: String,
    text: String,
    image_url: Option<String>,
    summary: Option<String>,
    likes: Vec<Uuid>,
    replies: Json<Vec<Reply>>,
    created_at: DateTime<Utc>,
}

impl From<PostRow> for Post {
    fn from(row: PostRow) -> Self {
        Post {
            id: row.id,
            author_id: AuthorId(row.author_id),
            author_username: row.author_username,
            text: row.text,
            image_url: row.image_url,
            summary: row.summary,
            likes: row.likes.into_iter().map(AuthorId).collect(),
            replies: row.replies.0,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, FromRow)]
struct ListingRow {
    id: Uuid,
    author_id: Uuid,
    author_username: String,
    title: String,
    category: String,
    description: String,
    price: f64,
    image_urls: Vec<String>,
    available: bool,
    likes: Vec<Uuid>,
    replies: Json<Vec<Reply>>,
    created_at: DateTime<Utc>,
}

impl From<ListingRow> for Listing {
    fn from(row: ListingRow) -> Self {
        Listing {
            id: row.id,
            author_id: AuthorId(row.author_id),
            author_username: row.author_username,
            title: row.title,
            category: row.category,
            description: row.description,
            price: row.price,
            image_urls: row.image_urls,
            available: row.available,
            likes: row.likes.into_iter().map(AuthorId).collect(),
            replies: row.replies.0,
            created_at: row.created_at,
        }
    }
}

fn direction(order: SortOrder) -> &'static str {
    match order {
        SortOrder::NewestFirst => "DESC",
        SortOrder::OldestFirst => "ASC",
    }
}

async fn select_by_authors<R>(
    pool: &PgPool,
    table: &str,
    columns: &str,
    authors: &HashSet<AuthorId>,
    order: SortOrder,
    limit: Option<usize>,
) -> StoreResult<Vec<R>>
where
    R: for<'r> FromRow<'r, PgRow> + Send + Unpin,
{
    if authors.is_empty() {
        return Ok(Vec::new());
    }

    let author_ids: Vec<Uuid> = authors.iter().map(AuthorId::as_uuid).collect();
    let dir = direction(order);
    // LIMIT NULL is LIMIT ALL
    let limit = limit.map(|l| i64::try_from(l).unwrap_or(i64::MAX));

    let sql = format!(
        "SELECT {columns} FROM {table} \
         WHERE author_id = ANY($1) \
         ORDER BY created_at {dir}, id {dir} \
         LIMIT $2"
    );

    sqlx::query_as::<_, R>(&sql)
        .bind(author_ids)
        .bind(limit)
        .fetch_all(pool)
        .await
        .map_err(|e| {
            error!("Failed to fetch {} by authors: {}", table, e);
            e.into()
        })
}

async fn select_distinct_authors(pool: &PgPool, table: &str) -> StoreResult<Vec<AuthorId>> {
    let sql = format!("SELECT DISTINCT author_id FROM {table} ORDER BY author_id");

    let rows = sqlx::query_scalar::<_, Uuid>(&sql)
        .fetch_all(pool)
        .await
        .map_err(|e| {
            error!("Failed to fetch distinct authors of {}: {}", table, e);
            e
        })?;

    Ok(rows.into_iter().map(AuthorId).collect())
}

async fn select_all<R>(pool: &PgPool, table: &str, columns: &str) -> StoreResult<Vec<R>>
where
    R: for<'r> FromRow<'r, PgRow> + Send + Unpin,
{
    let sql = format!("SELECT {columns} FROM {table} ORDER BY created_at DESC, id DESC");

    sqlx::query_as::<_, R>(&sql)
        .fetch_all(pool)
        .await
        .map_err(|e| {
            error!("Failed to fetch all rows of {}: {}", table, e);
            e.into()
        })
}

async fn select_replied_by<R>(
    pool: &PgPool,
    table: &str,
    columns: &str,
    author: AuthorId,
) -> StoreResult<Vec<R>>
where
    R: for<'r> FromRow<'r, PgRow> + Send + Unpin,
{
    let sql = format!(
        "SELECT {columns} FROM {table} \
         WHERE replies @> jsonb_build_array(jsonb_build_object('userId', $1::text)) \
         ORDER BY created_at DESC, id DESC"
    );

    sqlx::query_as::<_, R>(&sql)
        .bind(author.to_string())
        .fetch_all(pool)
        .await
        .map_err(|e| {
            error!("Failed to fetch {} replied by {}: {}", table, author, e);
            e.into()
        })
}

#[derive(Clone)]
pub struct PgPostStore {
    pool: PgPool,
}

impl PgPostStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ContentStore<Post> for PgPostStore {
    async fn items_by_authors(
        &self,
        authors: &HashSet<AuthorId>,
        order: SortOrder,
        limit: Option<usize>,
    ) -> StoreResult<Vec<Post>> {
        let rows: Vec<PostRow> =
            select_by_authors(&self.pool, "posts", POST_COLUMNS, authors, order, limit).await?;
        Ok(rows.into_iter().map(Post::from).collect())
    }

    async fn distinct_author_ids(&self) -> StoreResult<Vec<AuthorId>> {
        select_distinct_authors(&self.pool, "posts").await
    }

    async fn all_items_by_recency(&self) -> StoreResult<Vec<Post>> {
        let rows: Vec<PostRow> = select_all(&self.pool, "posts", POST_COLUMNS).await?;
        Ok(rows.into_iter().map(Post::from).collect())
    }

    async fn items_replied_by(&self, author: AuthorId) -> StoreResult<Vec<Post>> {
        let rows: Vec<PostRow> =
            select_replied_by(&self.pool, "posts", POST_COLUMNS, author).await?;
        Ok(rows.into_iter().map(Post::from).collect())
    }
}

#[derive(Clone)]
pub struct PgListingStore {
    pool: PgPool,
}

impl PgListingStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ContentStore<Listing> for PgListingStore {
    async fn items_by_authors(
        &self,
        authors: &HashSet<AuthorId>,
        order: SortOrder,
        limit: Option<usize>,
    ) -> StoreResult<Vec<Listing>> {
        let rows: Vec<ListingRow> =
            select_by_authors(&self.pool, "listings", LISTING_COLUMNS, authors, order, limit)
                .await?;
        Ok(rows.into_iter().map(Listing::from).collect())
    }

    async fn distinct_author_ids(&self) -> StoreResult<Vec<AuthorId>> {
        select_distinct_authors(&self.pool, "listings").await
    }

    async fn all_items_by_recency(&self) -> StoreResult<Vec<Listing>> {
        let rows: Vec<ListingRow> = select_all(&self.pool, "listings", LISTING_COLUMNS).await?;
        Ok(rows.into_iter().map(Listing::from).collect())
    }

    async fn items_replied_by(&self, author: AuthorId) -> StoreResult<Vec<Listing>> {
        let rows: Vec<ListingRow> =
            select_replied_by(&self.pool, "listings", LISTING_COLUMNS, author).await?;
        Ok(rows.into_iter().map(Listing::from).collect())
    }
}

/// `follows(follower_id, followee_id)`
#[derive(Clone)]
pub struct PgFollowGraph {
    pool: PgPool,
}

impl PgFollowGraph {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl FollowGraph for PgFollowGraph {
    async fn following(&self, viewer: AuthorId) -> StoreResult<Vec<AuthorId>> {
        let rows = sqlx::query_scalar::<_, Uuid>(
            r#"
            SELECT followee_id
            FROM follows
            WHERE follower_id = $1
            ORDER BY followee_id
            "#,
        )
        .bind(viewer.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            error!("Failed to fetch following list for {}: {}", viewer, e);
            e
        })?;

        Ok(rows.into_iter().map(AuthorId).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FeedItem;

    #[test]
    fn test_direction() {
        assert_eq!(direction(SortOrder::NewestFirst), "DESC");
        assert_eq!(direction(SortOrder::OldestFirst), "ASC");
    }

    #[test]
    fn test_listing_row_conversion() {
        let id = Uuid::from_u128(7);
        let author = Uuid::from_u128(9);
        let liker = Uuid::from_u128(11);
        let listing = Listing::from(ListingRow {
            id,
            author_id: author,
            author_username: "mia".into(),
            title: "Bike".into(),
            category: "sports".into(),
            description: "Barely used".into(),
            price: 120.0,
            image_urls: vec!["a.jpg".into()],
            available: true,
            likes: vec![liker],
            replies: Json(vec![Reply {
                user_id: AuthorId(liker),
                text: "Still for sale?".into(),
                username: "lee".into(),
                user_profile_pic: None,
            }]),
            created_at: Utc::now(),
        });

        assert_eq!(listing.id, id);
        assert_eq!(listing.author_id, AuthorId(author));
        assert_eq!(listing.author_username, "mia");
        assert_eq!(listing.image_urls.len(), 1);
        assert_eq!(listing.likes, vec![AuthorId(liker)]);
        assert!(listing.replied_by(AuthorId(liker)));
    }

    #[test]
    fn test_column_lists_match_row_fields() {
        for column in ["author_username", "likes", "replies"] {
            assert!(POST_COLUMNS.contains(column), "posts missing {}", column);
            assert!(LISTING_COLUMNS.contains(column), "listings missing {}", column);
        }
    }
}
