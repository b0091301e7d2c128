use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use rusqlite::{params, OptionalExtension, TransactionBehavior};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::db::models::AuthorSummary;
use crate::error::{AppError, AppResult};
use crate::extractors::CurrentUser;
use crate::forum::{excerpt, guard};
use crate::state::AppState;

// --- View structs ---

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategorySummary {
    pub id: i64,
    pub name: String,
    pub slug: String,
    pub color: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubcategorySummary {
    pub id: i64,
    pub name: String,
    pub slug: String,
}

/// Post shape for list responses: excerpt instead of full content.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostSummary {
    pub id: i64,
    pub title: String,
    pub excerpt: Option<String>,
    pub deal_url: Option<String>,
    pub deal_price: Option<String>,
    pub original_price: Option<String>,
    pub store_name: Option<String>,
    pub is_online: bool,
    pub upvotes: i64,
    pub downvotes: i64,
    pub comment_count: i64,
    pub is_pinned: bool,
    pub created_at: String,
    pub author: AuthorSummary,
    pub category: CategorySummary,
    pub subcategory: Option<SubcategorySummary>,
}

/// Full post shape for single-post responses.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostDetail {
    pub id: i64,
    pub title: String,
    pub content: String,
    pub excerpt: Option<String>,
    pub deal_url: Option<String>,
    pub deal_price: Option<String>,
    pub original_price: Option<String>,
    pub store_name: Option<String>,
    pub is_online: bool,
    pub upvotes: i64,
    pub downvotes: i64,
    pub comment_count: i64,
    pub is_pinned: bool,
    pub created_at: String,
    pub updated_at: String,
    pub author: AuthorSummary,
    pub category: CategorySummary,
    pub subcategory: Option<SubcategorySummary>,
}

// --- Request types ---

#[derive(Deserialize)]
pub struct ListPostsQuery {
    pub category: Option<String>,
    pub subcategory: Option<String>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePostRequest {
    pub title: Option<String>,
    pub content: Option<String>,
    pub category_id: Option<i64>,
    pub subcategory_id: Option<i64>,
    pub deal_url: Option<String>,
    pub deal_price: Option<String>,
    pub original_price: Option<String>,
    pub store_name: Option<String>,
    pub is_online: Option<bool>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePostRequest {
    pub title: Option<String>,
    pub content: Option<String>,
    pub category_id: Option<i64>,
    pub subcategory_id: Option<i64>,
    pub deal_url: Option<String>,
    pub deal_price: Option<String>,
    pub original_price: Option<String>,
    pub store_name: Option<String>,
    pub is_online: Option<bool>,
}

// --- Router ---

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/posts", get(list_posts).post(create_post))
        .route(
            "/api/posts/{id}",
            get(get_post).put(update_post).delete(delete_post),
        )
}

// --- Handlers ---

async fn list_posts(
    State(state): State<AppState>,
    Query(query): Query<ListPostsQuery>,
) -> AppResult<Json<serde_json::Value>> {
    let (limit, offset) = page_window(query.page, query.limit);

    let conn = state.db.get()?;

    // Unknown slugs are ignored rather than rejected; the filter just
    // doesn't apply.
    let category_id: Option<i64> = match &query.category {
        Some(slug) => conn
            .query_row(
                "SELECT id FROM categories WHERE slug = ?1",
                params![slug],
                |row| row.get(0),
            )
            .optional()?,
        None => None,
    };
    let subcategory_id: Option<i64> = match &query.subcategory {
        Some(slug) => conn
            .query_row(
                "SELECT id FROM subcategories WHERE slug = ?1",
                params![slug],
                |row| row.get(0),
            )
            .optional()?,
        None => None,
    };

    let posts = query_posts(&conn, category_id, subcategory_id, limit, offset)?;
    Ok(Json(json!({ "posts": posts })))
}

async fn get_post(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<Json<serde_json::Value>> {
    let conn = state.db.get()?;
    let post = query_post_detail(&conn, id)?.ok_or(AppError::NotFound)?;
    Ok(Json(json!({ "post": post })))
}

async fn create_post(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(req): Json<CreatePostRequest>,
) -> AppResult<Response> {
    let title = req.title.as_deref().unwrap_or("").trim().to_string();
    let content = req.content.as_deref().unwrap_or("").trim().to_string();

    let category_id = match req.category_id {
        Some(id) if !title.is_empty() && !content.is_empty() => id,
        _ => {
            return Err(AppError::BadRequest(
                "Title, content, and category are required".into(),
            ))
        }
    };

    let conn = state.db.get()?;

    let category_exists: bool = conn.query_row(
        "SELECT COUNT(*) > 0 FROM categories WHERE id = ?1",
        params![category_id],
        |row| row.get(0),
    )?;
    if !category_exists {
        return Err(AppError::NotFound);
    }

    let derived_excerpt = excerpt::derive(&content);

    conn.execute(
        "INSERT INTO posts (title, content, excerpt, author_id, category_id, subcategory_id,
                            deal_url, deal_price, original_price, store_name, is_online)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        params![
            title,
            content,
            derived_excerpt,
            user.id,
            category_id,
            req.subcategory_id,
            req.deal_url,
            req.deal_price,
            req.original_price,
            req.store_name,
            req.is_online.unwrap_or(true),
        ],
    )?;
    let post_id = conn.last_insert_rowid();

    let post = query_post_detail(&conn, post_id)?
        .ok_or_else(|| AppError::Internal("created post not readable".into()))?;

    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "Post created successfully", "post": post })),
    )
        .into_response())
}

async fn update_post(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<i64>,
    Json(req): Json<UpdatePostRequest>,
) -> AppResult<Json<serde_json::Value>> {
    let mut conn = state.db.get()?;
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    let author_id: i64 = tx
        .query_row(
            "SELECT author_id FROM posts WHERE id = ?1 AND is_active = 1",
            params![id],
            |row| row.get(0),
        )
        .optional()?
        .ok_or(AppError::NotFound)?;

    guard::ensure_owner(user.id, author_id, "posts")?;

    // Only provided fields change; the excerpt follows the content.
    if let Some(content) = &req.content {
        let derived_excerpt = excerpt::derive(content);
        tx.execute(
            "UPDATE posts SET content = ?1, excerpt = ?2 WHERE id = ?3",
            params![content, derived_excerpt, id],
        )?;
    }
    tx.execute(
        "UPDATE posts SET
            title = COALESCE(?1, title),
            category_id = COALESCE(?2, category_id),
            subcategory_id = COALESCE(?3, subcategory_id),
            deal_url = COALESCE(?4, deal_url),
            deal_price = COALESCE(?5, deal_price),
            original_price = COALESCE(?6, original_price),
            store_name = COALESCE(?7, store_name),
            is_online = COALESCE(?8, is_online),
            updated_at = datetime('now')
         WHERE id = ?9",
        params![
            req.title,
            req.category_id,
            req.subcategory_id,
            req.deal_url,
            req.deal_price,
            req.original_price,
            req.store_name,
            req.is_online,
            id,
        ],
    )?;
    tx.commit()?;

    let post = query_post_detail(&conn, id)?.ok_or(AppError::NotFound)?;
    Ok(Json(json!({
        "message": "Post updated successfully",
        "post": post,
    })))
}

async fn delete_post(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<i64>,
) -> AppResult<Json<serde_json::Value>> {
    let mut conn = state.db.get()?;
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    let author_id: i64 = tx
        .query_row(
            "SELECT author_id FROM posts WHERE id = ?1 AND is_active = 1",
            params![id],
            |row| row.get(0),
        )
        .optional()?
        .ok_or(AppError::NotFound)?;

    guard::ensure_owner(user.id, author_id, "posts")?;
    guard::ensure_post_deletable(&tx, id)?;

    tx.execute(
        "UPDATE posts SET is_active = 0, updated_at = datetime('now') WHERE id = ?1",
        params![id],
    )?;
    tx.commit()?;

    Ok(Json(json!({ "message": "Post deleted successfully" })))
}

// --- Query helpers ---

/// Clamp pagination inputs and compute the row offset. The multiplication is
/// done in u64 so a huge page number cannot wrap.
fn page_window(page: Option<u32>, limit: Option<u32>) -> (u32, u64) {
    let page = page.unwrap_or(1).max(1);
    let limit = limit.unwrap_or(20).clamp(1, 100);
    let offset = u64::from(page - 1) * u64::from(limit);
    (limit, offset)
}

const POST_COLUMNS: &str = "p.id, p.title, p.excerpt, p.deal_url, p.deal_price, p.original_price,
       p.store_name, p.is_online, p.upvotes, p.downvotes, p.comment_count, p.is_pinned,
       p.created_at,
       u.id, u.username, u.display_name, u.avatar,
       c.id, c.name, c.slug, c.color,
       s.id, s.name, s.slug";

fn row_author(row: &rusqlite::Row, base: usize) -> rusqlite::Result<AuthorSummary> {
    Ok(AuthorSummary {
        id: row.get(base)?,
        username: row.get(base + 1)?,
        display_name: row.get(base + 2)?,
        avatar: row.get(base + 3)?,
    })
}

fn row_category(row: &rusqlite::Row, base: usize) -> rusqlite::Result<CategorySummary> {
    Ok(CategorySummary {
        id: row.get(base)?,
        name: row.get(base + 1)?,
        slug: row.get(base + 2)?,
        color: row.get(base + 3)?,
    })
}

fn row_subcategory(row: &rusqlite::Row, base: usize) -> rusqlite::Result<Option<SubcategorySummary>> {
    let id: Option<i64> = row.get(base)?;
    Ok(match id {
        Some(id) => Some(SubcategorySummary {
            id,
            name: row.get(base + 1)?,
            slug: row.get(base + 2)?,
        }),
        None => None,
    })
}

fn query_posts(
    conn: &rusqlite::Connection,
    category_id: Option<i64>,
    subcategory_id: Option<i64>,
    limit: u32,
    offset: u64,
) -> Result<Vec<PostSummary>, AppError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {POST_COLUMNS}
         FROM posts p
         JOIN users u ON u.id = p.author_id
         JOIN categories c ON c.id = p.category_id
         LEFT JOIN subcategories s ON s.id = p.subcategory_id
         WHERE p.is_active = 1
           AND (?1 IS NULL OR p.category_id = ?1)
           AND (?2 IS NULL OR p.subcategory_id = ?2)
         ORDER BY p.is_pinned DESC, p.created_at DESC, p.id DESC
         LIMIT ?3 OFFSET ?4"
    ))?;

    let posts = stmt
        .query_map(
            params![category_id, subcategory_id, limit, offset],
            |row| {
                Ok(PostSummary {
                    id: row.get(0)?,
                    title: row.get(1)?,
                    excerpt: row.get(2)?,
                    deal_url: row.get(3)?,
                    deal_price: row.get(4)?,
                    original_price: row.get(5)?,
                    store_name: row.get(6)?,
                    is_online: row.get(7)?,
                    upvotes: row.get(8)?,
                    downvotes: row.get(9)?,
                    comment_count: row.get(10)?,
                    is_pinned: row.get(11)?,
                    created_at: row.get(12)?,
                    author: row_author(row, 13)?,
                    category: row_category(row, 17)?,
                    subcategory: row_subcategory(row, 21)?,
                })
            },
        )?
        .filter_map(|r| r.ok())
        .collect();

    Ok(posts)
}

fn query_post_detail(
    conn: &rusqlite::Connection,
    id: i64,
) -> Result<Option<PostDetail>, AppError> {
    let post = conn
        .query_row(
            &format!(
                "SELECT {POST_COLUMNS}, p.content, p.updated_at
                 FROM posts p
                 JOIN users u ON u.id = p.author_id
                 JOIN categories c ON c.id = p.category_id
                 LEFT JOIN subcategories s ON s.id = p.subcategory_id
                 WHERE p.id = ?1 AND p.is_active = 1"
            ),
            params![id],
            |row| {
                Ok(PostDetail {
                    id: row.get(0)?,
                    title: row.get(1)?,
                    excerpt: row.get(2)?,
                    deal_url: row.get(3)?,
                    deal_price: row.get(4)?,
                    original_price: row.get(5)?,
                    store_name: row.get(6)?,
                    is_online: row.get(7)?,
                    upvotes: row.get(8)?,
                    downvotes: row.get(9)?,
                    comment_count: row.get(10)?,
                    is_pinned: row.get(11)?,
                    created_at: row.get(12)?,
                    author: row_author(row, 13)?,
                    category: row_category(row, 17)?,
                    subcategory: row_subcategory(row, 21)?,
                    content: row.get(24)?,
                    updated_at: row.get(25)?,
                })
            },
        )
        .optional()?;

    Ok(post)
}

// --- Tests ---
