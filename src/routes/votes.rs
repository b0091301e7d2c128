use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;

use crate::error::{AppError, AppResult};
use crate::extractors::CurrentUser;
use crate::forum::ledger::{self, Outcome, Target, VoteType};
use crate::state::AppState;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CastVoteRequest {
    #[serde(alias = "type")]
    pub vote_type: Option<String>,
    pub post_id: Option<i64>,
    pub comment_id: Option<i64>,
}

pub fn router() -> Router<AppState> {
    Router::new().route("/api/votes", post(cast_vote))
}

async fn cast_vote(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(req): Json<CastVoteRequest>,
) -> AppResult<Response> {
    let (vote, target) = resolve_request(&req)?;

    let mut conn = state.db.get()?;
    let (outcome, counts) = ledger::cast(&mut conn, user.id, target, vote)?;

    let status = match outcome {
        Outcome::Created => StatusCode::CREATED,
        Outcome::Updated | Outcome::Removed => StatusCode::OK,
    };

    Ok((
        status,
        Json(json!({
            "message": outcome.message(),
            "upvotes": counts.upvotes,
            "downvotes": counts.downvotes,
        })),
    )
        .into_response())
}

/// Validate a vote request into a vote type and exactly one target.
fn resolve_request(req: &CastVoteRequest) -> Result<(VoteType, Target), AppError> {
    let vote = req
        .vote_type
        .as_deref()
        .and_then(VoteType::parse)
        .ok_or_else(|| AppError::BadRequest("Vote type must be \"up\" or \"down\"".into()))?;

    let target = match (req.post_id, req.comment_id) {
        (Some(post_id), None) => Target::Post(post_id),
        (None, Some(comment_id)) => Target::Comment(comment_id),
        _ => {
            return Err(AppError::BadRequest(
                "Exactly one of postId or commentId is required".into(),
            ))
        }
    };

    Ok((vote, target))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(vote_type: Option<&str>, post_id: Option<i64>, comment_id: Option<i64>) -> CastVoteRequest {
        CastVoteRequest {
            vote_type: vote_type.map(|s| s.to_string()),
            post_id,
            comment_id,
        }
    }

    #[test]
    fn post_vote_resolves_to_post_target() {
        let (vote, target) = resolve_request(&request(Some("up"), Some(7), None)).unwrap();
        assert_eq!(vote, VoteType::Up);
        assert_eq!(target, Target::Post(7));
    }

    #[test]
    fn comment_vote_resolves_to_comment_target() {
        let (vote, target) = resolve_request(&request(Some("down"), None, Some(9))).unwrap();
        assert_eq!(vote, VoteType::Down);
        assert_eq!(target, Target::Comment(9));
    }

    #[test]
    fn missing_vote_type_is_rejected() {
        let err = resolve_request(&request(None, Some(7), None)).unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[test]
    fn unknown_vote_type_is_rejected() {
        let err = resolve_request(&request(Some("sideways"), Some(7), None)).unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[test]
    fn neither_target_is_rejected() {
        let err = resolve_request(&request(Some("up"), None, None)).unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[test]
    fn both_targets_are_rejected() {
        let err = resolve_request(&request(Some("up"), Some(7), Some(9))).unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }
}
