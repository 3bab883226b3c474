use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json,
};
use fretboard_collab::PrimaryKey;

use crate::{
    auth::Session,
    errors::{ErrorBody, ServerResult},
    schemas::{JamMessageSchema, JamSchema, ValidatedJson},
    serialized::{Jam, JamDetails, JamMessage, JamParticipant, ToSerialized},
    sse::jam_events,
    Router, ServerContext,
};

#[utoipa::path(
    get,
    path = "/v1/jams",
    tag = "jams",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = Vec<Jam>, description = "Active jams the user can take part in")
    )
)]
async fn jams(State(context): State<ServerContext>, session: Session) -> ServerResult<Json<Vec<Jam>>> {
    let jams = context.collab.jams.jams(session.user.id).await?;

    Ok(Json(jams.to_serialized()))
}

#[utoipa::path(
    post,
    path = "/v1/jams",
    tag = "jams",
    request_body = JamSchema,
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 201, body = Jam),
        (status = 400, body = ErrorBody),
        (status = 403, body = ErrorBody, description = "The user isn't in the band")
    )
)]
async fn start_jam(
    State(context): State<ServerContext>,
    session: Session,
    ValidatedJson(body): ValidatedJson<JamSchema>,
) -> ServerResult<(StatusCode, Json<Jam>)> {
    let jam = context
        .collab
        .jams
        .start(session.user.id, body.title, body.band_id)
        .await?;

    Ok((StatusCode::CREATED, Json(jam.to_serialized())))
}

#[utoipa::path(
    get,
    path = "/v1/jams/{id}",
    tag = "jams",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = JamDetails, description = "The jam, which the user joins if it's still running"),
        (status = 403, body = ErrorBody),
        (status = 404, body = ErrorBody)
    )
)]
async fn jam(
    State(context): State<ServerContext>,
    session: Session,
    Path(jam_id): Path<PrimaryKey>,
) -> ServerResult<Json<JamDetails>> {
    let details = context.collab.jams.jam(session.user.id, jam_id).await?;

    Ok(Json(details.to_serialized()))
}

#[utoipa::path(
    get,
    path = "/v1/jams/{id}/participants",
    tag = "jams",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = Vec<JamParticipant>),
        (status = 404, body = ErrorBody)
    )
)]
async fn participants(
    State(context): State<ServerContext>,
    session: Session,
    Path(jam_id): Path<PrimaryKey>,
) -> ServerResult<Json<Vec<JamParticipant>>> {
    let participants = context
        .collab
        .jams
        .participants(session.user.id, jam_id)
        .await?;

    Ok(Json(participants.to_serialized()))
}

#[utoipa::path(
    post,
    path = "/v1/jams/{id}/leave",
    tag = "jams",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 204, description = "The user left the jam"),
        (status = 404, body = ErrorBody)
    )
)]
async fn leave(
    State(context): State<ServerContext>,
    session: Session,
    Path(jam_id): Path<PrimaryKey>,
) -> ServerResult<StatusCode> {
    context.collab.jams.leave(session.user.id, jam_id).await?;

    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    post,
    path = "/v1/jams/{id}/end",
    tag = "jams",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = Jam),
        (status = 403, body = ErrorBody, description = "Only the host can end a jam")
    )
)]
async fn end(
    State(context): State<ServerContext>,
    session: Session,
    Path(jam_id): Path<PrimaryKey>,
) -> ServerResult<Json<Jam>> {
    let jam = context.collab.jams.end(session.user.id, jam_id).await?;

    Ok(Json(jam.to_serialized()))
}

#[utoipa::path(
    get,
    path = "/v1/jams/{id}/messages",
    tag = "jams",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = Vec<JamMessage>, description = "The latest messages, oldest first"),
        (status = 404, body = ErrorBody)
    )
)]
async fn messages(
    State(context): State<ServerContext>,
    session: Session,
    Path(jam_id): Path<PrimaryKey>,
) -> ServerResult<Json<Vec<JamMessage>>> {
    let messages = context.collab.jams.messages(session.user.id, jam_id).await?;

    Ok(Json(messages.to_serialized()))
}

#[utoipa::path(
    post,
    path = "/v1/jams/{id}/messages",
    tag = "jams",
    request_body = JamMessageSchema,
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 201, body = JamMessage),
        (status = 400, body = ErrorBody, description = "The message is empty, too long, or the jam has ended"),
        (status = 403, body = ErrorBody, description = "Only participants can post")
    )
)]
async fn post_message(
    State(context): State<ServerContext>,
    session: Session,
    Path(jam_id): Path<PrimaryKey>,
    ValidatedJson(body): ValidatedJson<JamMessageSchema>,
) -> ServerResult<(StatusCode, Json<JamMessage>)> {
    let message = context
        .collab
        .jams
        .post_message(session.user.id, jam_id, body.content)
        .await?;

    Ok((StatusCode::CREATED, Json(message.to_serialized())))
}

pub fn router() -> Router {
    Router::new()
        .route("/jams", get(jams).post(start_jam))
        .route("/jams/:id", get(jam))
        .route("/jams/:id/participants", get(participants))
        .route("/jams/:id/leave", post(leave))
        .route("/jams/:id/end", post(end))
        .route("/jams/:id/messages", get(messages).post(post_message))
        .route("/jams/:id/events", get(jam_events))
}
