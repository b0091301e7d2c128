use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use serde::Serialize;

use crate::error::{AppError, AppResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteType {
    Up,
    Down,
}

impl VoteType {
    pub fn as_str(self) -> &'static str {
        match self {
            VoteType::Up => "up",
            VoteType::Down => "down",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "up" => Some(VoteType::Up),
            "down" => Some(VoteType::Down),
            _ => None,
        }
    }
}

/// The post or comment a vote applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    Post(i64),
    Comment(i64),
}

impl Target {
    fn table(self) -> &'static str {
        match self {
            Target::Post(_) => "posts",
            Target::Comment(_) => "comments",
        }
    }

    fn column(self) -> &'static str {
        match self {
            Target::Post(_) => "post_id",
            Target::Comment(_) => "comment_id",
        }
    }

    fn id(self) -> i64 {
        match self {
            Target::Post(id) | Target::Comment(id) => id,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Created,
    Updated,
    Removed,
}

impl Outcome {
    pub fn message(self) -> &'static str {
        match self {
            Outcome::Created => "Vote created",
            Outcome::Updated => "Vote updated",
            Outcome::Removed => "Vote removed",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct VoteCounts {
    pub upvotes: i64,
    pub downvotes: i64,
}

/// Cast a vote: create it if the user has none on this target, remove it if
/// they cast the same type again, switch it if they cast the other type.
/// The target's denormalized counters are then recomputed from the vote rows
/// (never incremented in place). The whole sequence runs in one transaction
/// so concurrent casts on the same target cannot recount from a stale read.
pub fn cast(
    conn: &mut Connection,
    user_id: i64,
    target: Target,
    vote: VoteType,
) -> AppResult<(Outcome, VoteCounts)> {
    // Immediate so a concurrent cast on the same target waits on the busy
    // timeout instead of failing the deferred read-to-write upgrade.
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    let target_exists: bool = tx.query_row(
        &format!(
            "SELECT COUNT(*) > 0 FROM {} WHERE id = ?1 AND is_active = 1",
            target.table()
        ),
        params![target.id()],
        |row| row.get(0),
    )?;
    if !target_exists {
        return Err(AppError::NotFound);
    }

    let existing: Option<(i64, String)> = tx
        .query_row(
            &format!(
                "SELECT id, type FROM votes WHERE user_id = ?1 AND {} = ?2",
                target.column()
            ),
            params![user_id, target.id()],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()?;

    let outcome = match existing {
        None => {
            tx.execute(
                &format!(
                    "INSERT INTO votes (user_id, {}, type) VALUES (?1, ?2, ?3)",
                    target.column()
                ),
                params![user_id, target.id(), vote.as_str()],
            )?;
            Outcome::Created
        }
        Some((vote_id, ref existing_type)) if existing_type == vote.as_str() => {
            tx.execute("DELETE FROM votes WHERE id = ?1", params![vote_id])?;
            Outcome::Removed
        }
        Some((vote_id, _)) => {
            tx.execute(
                "UPDATE votes SET type = ?1 WHERE id = ?2",
                params![vote.as_str(), vote_id],
            )?;
            Outcome::Updated
        }
    };

    let counts = recount(&tx, target)?;
    tx.commit()?;

    Ok((outcome, counts))
}

/// Recompute a target's vote counters from the vote rows and persist them.
fn recount(conn: &Connection, target: Target) -> AppResult<VoteCounts> {
    let upvotes: i64 = conn.query_row(
        &format!(
            "SELECT COUNT(*) FROM votes WHERE {} = ?1 AND type = 'up'",
            target.column()
        ),
        params![target.id()],
        |row| row.get(0),
    )?;
    let downvotes: i64 = conn.query_row(
        &format!(
            "SELECT COUNT(*) FROM votes WHERE {} = ?1 AND type = 'down'",
            target.column()
        ),
        params![target.id()],
        |row| row.get(0),
    )?;

    conn.execute(
        &format!(
            "UPDATE {} SET upvotes = ?1, downvotes = ?2 WHERE id = ?3",
            target.table()
        ),
        params![upvotes, downvotes, target.id()],
    )?;

    Ok(VoteCounts { upvotes, downvotes })
}
