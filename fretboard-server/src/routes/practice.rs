use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json,
};
use fretboard_collab::PracticeInput;

use crate::{
    auth::Session,
    errors::{ErrorBody, ServerResult},
    schemas::{ExerciseSchema, PracticeQuery, PracticeSchema, ValidatedJson},
    serialized::{ExerciseProgress, ExerciseSummary, PracticeSession, PracticeStats, ToSerialized},
    Router, ServerContext,
};

#[utoipa::path(
    get,
    path = "/v1/practice",
    tag = "practice",
    params(PracticeQuery),
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = Vec<PracticeSession>, description = "Sessions, most recent first")
    )
)]
async fn sessions(
    State(context): State<ServerContext>,
    session: Session,
    Query(query): Query<PracticeQuery>,
) -> ServerResult<Json<Vec<PracticeSession>>> {
    let sessions = context
        .collab
        .practice
        .sessions(session.user.id, query.since)
        .await?;

    Ok(Json(sessions.to_serialized()))
}

#[utoipa::path(
    post,
    path = "/v1/practice",
    tag = "practice",
    request_body = PracticeSchema,
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 201, body = PracticeSession),
        (status = 400, body = ErrorBody),
        (status = 404, body = ErrorBody, description = "The song isn't in the user's library")
    )
)]
async fn record(
    State(context): State<ServerContext>,
    session: Session,
    ValidatedJson(body): ValidatedJson<PracticeSchema>,
) -> ServerResult<(StatusCode, Json<PracticeSession>)> {
    let practice = context
        .collab
        .practice
        .record(
            session.user.id,
            PracticeInput {
                song_id: body.song_id,
                duration_minutes: body.duration_minutes,
                notes: body.notes,
                practiced_at: body.practiced_at,
            },
        )
        .await?;

    Ok((StatusCode::CREATED, Json(practice.to_serialized())))
}

#[utoipa::path(
    get,
    path = "/v1/practice/stats",
    tag = "practice",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = PracticeStats)
    )
)]
async fn stats(
    State(context): State<ServerContext>,
    session: Session,
) -> ServerResult<Json<PracticeStats>> {
    let stats = context.collab.practice.stats(session.user.id).await?;

    Ok(Json(stats.to_serialized()))
}

#[utoipa::path(
    get,
    path = "/v1/exercises",
    tag = "practice",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = Vec<ExerciseSummary>)
    )
)]
async fn exercise_summaries(
    State(context): State<ServerContext>,
    session: Session,
) -> ServerResult<Json<Vec<ExerciseSummary>>> {
    let summaries = context
        .collab
        .practice
        .exercise_summaries(session.user.id)
        .await?;

    Ok(Json(summaries.to_serialized()))
}

#[utoipa::path(
    post,
    path = "/v1/exercises",
    tag = "practice",
    request_body = ExerciseSchema,
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 201, body = ExerciseProgress),
        (status = 400, body = ErrorBody)
    )
)]
async fn record_exercise(
    State(context): State<ServerContext>,
    session: Session,
    ValidatedJson(body): ValidatedJson<ExerciseSchema>,
) -> ServerResult<(StatusCode, Json<ExerciseProgress>)> {
    let progress = context
        .collab
        .practice
        .record_exercise(session.user.id, body.exercise_id, body.bpm, body.completed)
        .await?;

    Ok((StatusCode::CREATED, Json(progress.to_serialized())))
}

#[utoipa::path(
    get,
    path = "/v1/exercises/{exercise_id}",
    tag = "practice",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = Vec<ExerciseProgress>, description = "Every attempt, oldest first")
    )
)]
async fn exercise_history(
    State(context): State<ServerContext>,
    session: Session,
    Path(exercise_id): Path<String>,
) -> ServerResult<Json<Vec<ExerciseProgress>>> {
    let history = context
        .collab
        .practice
        .exercise_history(session.user.id, &exercise_id)
        .await?;

    Ok(Json(history.to_serialized()))
}

pub fn router() -> Router {
    Router::new()
        .route("/practice", get(sessions).post(record))
        .route("/practice/stats", get(stats))
        .route("/exercises", get(exercise_summaries).post(record_exercise))
        .route("/exercises/:exercise_id", get(exercise_history))
}
