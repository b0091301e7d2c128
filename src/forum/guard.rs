use rusqlite::{params, Connection};

use crate::error::{AppError, AppResult};

/// The acting user may mutate a post or comment iff they are its author.
/// Identity is compared by numeric id only; username or email must never
/// grant access on their own.
pub fn can_mutate(actor_id: i64, owner_id: i64) -> bool {
    actor_id == owner_id
}

/// Ownership check that maps a mismatch to a 403.
pub fn ensure_owner(actor_id: i64, owner_id: i64, what: &str) -> AppResult<()> {
    if can_mutate(actor_id, owner_id) {
        Ok(())
    } else {
        tracing::warn!(
            actor_id,
            owner_id,
            "rejected mutation of {} owned by another user",
            what
        );
        Err(AppError::Forbidden(format!(
            "You can only modify your own {}",
            what
        )))
    }
}

/// A post with active comments cannot be deleted; refusing keeps the
/// discussion thread from being silently orphaned.
pub fn ensure_post_deletable(conn: &Connection, post_id: i64) -> AppResult<()> {
    let active_comments: i64 = conn.query_row(
        "SELECT COUNT(*) FROM comments WHERE post_id = ?1 AND is_active = 1",
        params![post_id],
        |row| row.get(0),
    )?;

    if active_comments > 0 {
        return Err(AppError::Conflict(
            "Cannot delete a post that has comments".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;

    #[test]
    fn owner_can_mutate() {
        assert!(can_mutate(7, 7));
    }

    #[test]
    fn non_owner_cannot_mutate() {
        assert!(!can_mutate(7, 8));
        assert!(ensure_owner(7, 8, "posts").is_err());
    }

    #[test]
    fn post_without_comments_is_deletable() {
        let pool = db::test_pool();
        let conn = pool.get().unwrap();
        conn.execute(
            "INSERT INTO users (username, email, display_name) VALUES ('u', 'u@x.io', 'U')",
            [],
        )
        .unwrap();
        conn.execute(
            "INSERT INTO posts (title, content, author_id, category_id) VALUES ('t', 'c', 1, 1)",
            [],
        )
        .unwrap();

        assert!(ensure_post_deletable(&conn, 1).is_ok());
    }

    #[test]
    fn post_with_active_comment_is_not_deletable() {
        let pool = db::test_pool();
        let conn = pool.get().unwrap();
        conn.execute(
            "INSERT INTO users (username, email, display_name) VALUES ('u', 'u@x.io', 'U')",
            [],
        )
        .unwrap();
        conn.execute(
            "INSERT INTO posts (title, content, author_id, category_id) VALUES ('t', 'c', 1, 1)",
            [],
        )
        .unwrap();
        conn.execute(
            "INSERT INTO comments (content, author_id, post_id) VALUES ('hi', 1, 1)",
            [],
        )
        .unwrap();

        let err = ensure_post_deletable(&conn, 1).unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[test]
    fn soft_deleted_comments_do_not_block_deletion() {
        let pool = db::test_pool();
        let conn = pool.get().unwrap();
        conn.execute(
            "INSERT INTO users (username, email, display_name) VALUES ('u', 'u@x.io', 'U')",
            [],
        )
        .unwrap();
        conn.execute(
            "INSERT INTO posts (title, content, author_id, category_id) VALUES ('t', 'c', 1, 1)",
            [],
        )
        .unwrap();
        conn.execute(
            "INSERT INTO comments (content, author_id, post_id, is_active) VALUES ('hi', 1, 1, 0)",
            [],
        )
        .unwrap();

        assert!(ensure_post_deletable(&conn, 1).is_ok());
    }
}
