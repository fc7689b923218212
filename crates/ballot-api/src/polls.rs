use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use axum_extra::extract::WithRejection;
use tracing::info;

use ballot_db::models::{PollTally, VoteRow};
use ballot_types::api::{
    CreatePollRequest, PollAuthor, PollEnvelope, PollOptionResponse, PollResponse, PollsEnvelope,
    UpdatePollRequest, VoteEnvelope, VoteRequest, VoteResponse,
};
use ballot_types::models::{VoteOutcome, vote_percentage};

use crate::auth::AppState;
use crate::error::ApiError;
use crate::identity::{AuthUser, Viewer};
use crate::validate::{MAX_QUESTION_LEN, max_len, option_labels};
use crate::with_db;

fn vote_response(vote: &VoteRow) -> VoteResponse {
    VoteResponse {
        id: vote.id,
        user_id: vote.user_id,
        poll_id: vote.poll_id,
        option_id: vote.option_id,
        created_at: vote.created_at,
    }
}

/// Shape a tally for callers. Options stay in insertion order.
pub(crate) fn poll_response(tally: &PollTally) -> PollResponse {
    PollResponse {
        id: tally.poll.id,
        question: tally.poll.question.clone(),
        author_id: tally.poll.author_id,
        author: PollAuthor {
            id: tally.author.id,
            name: tally.author.name.clone(),
            email: tally.author.email.clone(),
            is_guest: tally.author.is_guest,
        },
        options: tally
            .options
            .iter()
            .map(|o| PollOptionResponse {
                id: o.id,
                text: o.text.clone(),
                poll_id: o.poll_id,
                created_at: o.created_at,
                vote_count: o.votes,
                percentage: vote_percentage(o.votes, tally.total_votes),
            })
            .collect(),
        total_votes: tally.total_votes,
        user_vote: tally.viewer_vote.as_ref().map(vote_response),
        created_at: tally.poll.created_at,
        updated_at: tally.poll.updated_at,
    }
}

fn poll_not_found() -> ApiError {
    ApiError::NotFound("Poll not found".into())
}

pub async fn list_polls(
    State(state): State<AppState>,
    viewer: Viewer,
) -> Result<impl IntoResponse, ApiError> {
    let viewer_id = viewer.user_id();
    let polls = with_db(&state, move |db| db.list_polls(viewer_id)).await?;

    Ok(Json(PollsEnvelope {
        polls: polls.iter().map(poll_response).collect(),
    }))
}

pub async fn get_poll(
    State(state): State<AppState>,
    viewer: Viewer,
    WithRejection(Path(poll_id), _): WithRejection<Path<i64>, ApiError>,
) -> Result<impl IntoResponse, ApiError> {
    let viewer_id = viewer.user_id();
    let poll = with_db(&state, move |db| db.get_poll(poll_id, viewer_id))
        .await?
        .ok_or_else(poll_not_found)?;

    Ok(Json(PollEnvelope {
        poll: poll_response(&poll),
    }))
}

pub async fn create_poll(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    WithRejection(Json(req), _): WithRejection<Json<CreatePollRequest>, ApiError>,
) -> Result<impl IntoResponse, ApiError> {
    let question = req.question.trim().to_string();
    if question.is_empty() || req.options.len() < 2 {
        return Err(ApiError::validation(
            "Question and at least 2 options are required",
        ));
    }
    max_len("Question", &question, MAX_QUESTION_LEN)?;
    let options = option_labels(&req.options)?;

    let author_id = claims.user_id;
    let poll = with_db(&state, move |db| db.create_poll(author_id, &question, &options)).await?;

    Ok((
        StatusCode::CREATED,
        Json(PollEnvelope {
            poll: poll_response(&poll),
        }),
    ))
}

/// Only the author may edit. Supplying `options` replaces the whole option
/// list and discards every vote cast so far.
pub async fn update_poll(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    WithRejection(Path(poll_id), _): WithRejection<Path<i64>, ApiError>,
    WithRejection(Json(req), _): WithRejection<Json<UpdatePollRequest>, ApiError>,
) -> Result<impl IntoResponse, ApiError> {
    let question = match req.question {
        Some(q) => {
            let q = q.trim().to_string();
            if q.is_empty() {
                return Err(ApiError::validation("Question cannot be empty"));
            }
            max_len("Question", &q, MAX_QUESTION_LEN)?;
            Some(q)
        }
        None => None,
    };
    let options = match req.options {
        Some(options) if options.len() < 2 => {
            return Err(ApiError::validation("A poll needs at least 2 options"));
        }
        Some(options) => Some(option_labels(&options)?),
        None => None,
    };

    let editor_id = claims.user_id;
    let poll = with_db(&state, move |db| {
        db.update_poll(poll_id, editor_id, question.as_deref(), options.as_deref())
    })
    .await?;

    Ok(Json(PollEnvelope {
        poll: poll_response(&poll),
    }))
}

pub async fn delete_poll(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    WithRejection(Path(poll_id), _): WithRejection<Path<i64>, ApiError>,
) -> Result<StatusCode, ApiError> {
    let requester_id = claims.user_id;
    with_db(&state, move |db| db.delete_poll(poll_id, requester_id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Cast or move the caller's vote. 201 for a first vote, 200 when an
/// existing vote was re-pointed.
pub async fn vote(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    WithRejection(Path(poll_id), _): WithRejection<Path<i64>, ApiError>,
    WithRejection(Json(req), _): WithRejection<Json<VoteRequest>, ApiError>,
) -> Result<impl IntoResponse, ApiError> {
    let option_id = req
        .option_id
        .filter(|&id| id != 0)
        .ok_or_else(|| ApiError::validation("Option ID is required"))?;

    let user_id = claims.user_id;
    let cast = with_db(&state, move |db| db.cast_vote(user_id, poll_id, option_id)).await?;

    let status = match cast.outcome {
        VoteOutcome::Created => StatusCode::CREATED,
        VoteOutcome::Updated => StatusCode::OK,
    };
    info!(
        "User {} voted on poll {} for option {} ({:?})",
        user_id, poll_id, option_id, cast.outcome
    );

    Ok((
        status,
        Json(VoteEnvelope {
            vote: vote_response(&cast.vote),
            outcome: cast.outcome,
            message: cast.outcome.message().to_string(),
        }),
    ))
}
