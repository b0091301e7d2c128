use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, put};
use axum::{Json, Router};
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use serde::Deserialize;
use serde_json::json;

use crate::db::models::AuthorSummary;
use crate::error::{AppError, AppResult};
use crate::extractors::CurrentUser;
use crate::forum::guard;
use crate::forum::tree::{self, CommentNode};
use crate::state::AppState;

// --- Request types ---

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListCommentsQuery {
    pub post_id: Option<i64>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCommentRequest {
    pub content: Option<String>,
    pub post_id: Option<i64>,
    pub parent_id: Option<i64>,
}

#[derive(Deserialize)]
pub struct UpdateCommentRequest {
    pub content: Option<String>,
}

// --- Router ---

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/comments", get(list_comments).post(create_comment))
        .route(
            "/api/comments/{id}",
            put(update_comment).delete(delete_comment),
        )
}

// --- Handlers ---

/// Active comments of a post, newest roots first, replies nested.
async fn list_comments(
    State(state): State<AppState>,
    Query(query): Query<ListCommentsQuery>,
) -> AppResult<Json<serde_json::Value>> {
    let post_id = query
        .post_id
        .ok_or_else(|| AppError::BadRequest("Post ID is required".into()))?;

    let conn = state.db.get()?;
    let flat = query_flat_comments(&conn, post_id)?;
    let comments = tree::build(flat);

    Ok(Json(json!({ "comments": comments })))
}

async fn create_comment(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(req): Json<CreateCommentRequest>,
) -> AppResult<Response> {
    let content = req.content.as_deref().unwrap_or("").trim().to_string();
    let post_id = match (req.post_id, content.is_empty()) {
        (Some(id), false) => id,
        _ => {
            return Err(AppError::BadRequest(
                "Content and post ID are required".into(),
            ))
        }
    };

    let mut conn = state.db.get()?;
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    let post_exists: bool = tx.query_row(
        "SELECT COUNT(*) > 0 FROM posts WHERE id = ?1 AND is_active = 1",
        params![post_id],
        |row| row.get(0),
    )?;
    if !post_exists {
        return Err(AppError::NotFound);
    }

    if let Some(parent_id) = req.parent_id {
        let parent_post: Option<i64> = tx
            .query_row(
                "SELECT post_id FROM comments WHERE id = ?1 AND is_active = 1",
                params![parent_id],
                |row| row.get(0),
            )
            .optional()?;
        match parent_post {
            None => return Err(AppError::NotFound),
            Some(pid) if pid != post_id => {
                return Err(AppError::BadRequest(
                    "Parent comment belongs to a different post".into(),
                ))
            }
            Some(_) => {}
        }
    }

    tx.execute(
        "INSERT INTO comments (content, author_id, post_id, parent_id) VALUES (?1, ?2, ?3, ?4)",
        params![content, user.id, post_id, req.parent_id],
    )?;
    let comment_id = tx.last_insert_rowid();

    recount_post_comments(&tx, post_id)?;
    tx.commit()?;

    let comment = query_comment(&conn, comment_id)?
        .ok_or_else(|| AppError::Internal("created comment not readable".into()))?;

    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "Comment created successfully", "comment": comment })),
    )
        .into_response())
}

async fn update_comment(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<i64>,
    Json(req): Json<UpdateCommentRequest>,
) -> AppResult<Json<serde_json::Value>> {
    let content = req.content.as_deref().unwrap_or("").trim().to_string();
    if content.is_empty() {
        return Err(AppError::BadRequest("Content is required".into()));
    }

    let conn = state.db.get()?;

    let author_id: i64 = conn
        .query_row(
            "SELECT author_id FROM comments WHERE id = ?1 AND is_active = 1",
            params![id],
            |row| row.get(0),
        )
        .optional()?
        .ok_or(AppError::NotFound)?;

    guard::ensure_owner(user.id, author_id, "comments")?;

    conn.execute(
        "UPDATE comments SET content = ?1, updated_at = datetime('now') WHERE id = ?2",
        params![content, id],
    )?;

    let comment = query_comment(&conn, id)?.ok_or(AppError::NotFound)?;
    Ok(Json(json!({
        "message": "Comment updated successfully",
        "comment": comment,
    })))
}

async fn delete_comment(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<i64>,
) -> AppResult<Json<serde_json::Value>> {
    let mut conn = state.db.get()?;
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    let row: Option<(i64, i64)> = tx
        .query_row(
            "SELECT author_id, post_id FROM comments WHERE id = ?1 AND is_active = 1",
            params![id],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()?;
    let (author_id, post_id) = row.ok_or(AppError::NotFound)?;

    guard::ensure_owner(user.id, author_id, "comments")?;

    tx.execute(
        "UPDATE comments SET is_active = 0, updated_at = datetime('now') WHERE id = ?1",
        params![id],
    )?;
    recount_post_comments(&tx, post_id)?;
    tx.commit()?;

    Ok(Json(json!({ "message": "Comment deleted successfully" })))
}

// --- Query helpers ---

fn query_flat_comments(
    conn: &Connection,
    post_id: i64,
) -> Result<Vec<CommentNode>, AppError> {
    let mut stmt = conn.prepare(
        "SELECT c.id, c.content, c.parent_id, c.upvotes, c.downvotes, c.created_at, c.updated_at,
                u.id, u.username, u.display_name, u.avatar
         FROM comments c
         JOIN users u ON u.id = c.author_id
         WHERE c.post_id = ?1 AND c.is_active = 1
         ORDER BY c.created_at DESC, c.id DESC",
    )?;

    let comments = stmt
        .query_map(params![post_id], |row| {
            Ok(CommentNode {
                id: row.get(0)?,
                content: row.get(1)?,
                parent_id: row.get(2)?,
                upvotes: row.get(3)?,
                downvotes: row.get(4)?,
                created_at: row.get(5)?,
                updated_at: row.get(6)?,
                author: Some(AuthorSummary {
                    id: row.get(7)?,
                    username: row.get(8)?,
                    display_name: row.get(9)?,
                    avatar: row.get(10)?,
                }),
                replies: Vec::new(),
            })
        })?
        .filter_map(|r| r.ok())
        .collect();

    Ok(comments)
}

fn query_comment(conn: &Connection, id: i64) -> Result<Option<CommentNode>, AppError> {
    let comment = conn
        .query_row(
            "SELECT c.id, c.content, c.parent_id, c.upvotes, c.downvotes, c.created_at,
                    c.updated_at, u.id, u.username, u.display_name, u.avatar
             FROM comments c
             JOIN users u ON u.id = c.author_id
             WHERE c.id = ?1 AND c.is_active = 1",
            params![id],
            |row| {
                Ok(CommentNode {
                    id: row.get(0)?,
                    content: row.get(1)?,
                    parent_id: row.get(2)?,
                    upvotes: row.get(3)?,
                    downvotes: row.get(4)?,
                    created_at: row.get(5)?,
                    updated_at: row.get(6)?,
                    author: Some(AuthorSummary {
                        id: row.get(7)?,
                        username: row.get(8)?,
                        display_name: row.get(9)?,
                        avatar: row.get(10)?,
                    }),
                    replies: Vec::new(),
                })
            },
        )
        .optional()?;

    Ok(comment)
}

/// Recompute the post's comment counter as the number of active comments
/// (recompute-don't-patch, same policy as the vote ledger).
fn recount_post_comments(conn: &Connection, post_id: i64) -> Result<i64, AppError> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM comments WHERE post_id = ?1 AND is_active = 1",
        params![post_id],
        |row| row.get(0),
    )?;
    conn.execute(
        "UPDATE posts SET comment_count = ?1 WHERE id = ?2",
        params![count, post_id],
    )?;
    Ok(count)
}

// --- Tests ---
