use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, put},
    Json,
};
use fretboard_collab::PrimaryKey;

use crate::{
    auth::Session,
    errors::{ErrorBody, ServerResult},
    schemas::{SetlistSchema, SetlistSongsSchema, SetlistUpdateSchema, ValidatedJson},
    serialized::{Setlist, SetlistDetails, ToSerialized},
    Router, ServerContext,
};

#[utoipa::path(
    get,
    path = "/v1/setlists",
    tag = "setlists",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = Vec<Setlist>, description = "The user's setlists and those of their bands")
    )
)]
async fn setlists(
    State(context): State<ServerContext>,
    session: Session,
) -> ServerResult<Json<Vec<Setlist>>> {
    let setlists = context.collab.setlists.setlists(session.user.id).await?;

    Ok(Json(setlists.to_serialized()))
}

#[utoipa::path(
    post,
    path = "/v1/setlists",
    tag = "setlists",
    request_body = SetlistSchema,
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 201, body = Setlist),
        (status = 400, body = ErrorBody),
        (status = 403, body = ErrorBody, description = "The user isn't in the band")
    )
)]
async fn create_setlist(
    State(context): State<ServerContext>,
    session: Session,
    ValidatedJson(body): ValidatedJson<SetlistSchema>,
) -> ServerResult<(StatusCode, Json<Setlist>)> {
    let setlist = context
        .collab
        .setlists
        .create(session.user.id, body.title, body.band_id)
        .await?;

    Ok((StatusCode::CREATED, Json(setlist.to_serialized())))
}

#[utoipa::path(
    get,
    path = "/v1/setlists/{id}",
    tag = "setlists",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = SetlistDetails),
        (status = 404, body = ErrorBody)
    )
)]
async fn setlist(
    State(context): State<ServerContext>,
    session: Session,
    Path(setlist_id): Path<PrimaryKey>,
) -> ServerResult<Json<SetlistDetails>> {
    let details = context.collab.setlists.setlist(session.user.id, setlist_id).await?;

    Ok(Json(details.to_serialized()))
}

#[utoipa::path(
    patch,
    path = "/v1/setlists/{id}",
    tag = "setlists",
    request_body = SetlistUpdateSchema,
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = Setlist),
        (status = 404, body = ErrorBody)
    )
)]
async fn rename_setlist(
    State(context): State<ServerContext>,
    session: Session,
    Path(setlist_id): Path<PrimaryKey>,
    ValidatedJson(body): ValidatedJson<SetlistUpdateSchema>,
) -> ServerResult<Json<Setlist>> {
    let setlist = context
        .collab
        .setlists
        .rename(session.user.id, setlist_id, body.title)
        .await?;

    Ok(Json(setlist.to_serialized()))
}

#[utoipa::path(
    delete,
    path = "/v1/setlists/{id}",
    tag = "setlists",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 204, description = "The setlist was deleted"),
        (status = 403, body = ErrorBody, description = "Only the creator or the band owner can delete it")
    )
)]
async fn delete_setlist(
    State(context): State<ServerContext>,
    session: Session,
    Path(setlist_id): Path<PrimaryKey>,
) -> ServerResult<StatusCode> {
    context.collab.setlists.delete(session.user.id, setlist_id).await?;

    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    put,
    path = "/v1/setlists/{id}/songs",
    tag = "setlists",
    request_body = SetlistSongsSchema,
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = SetlistDetails, description = "The setlist with its songs in the new order"),
        (status = 404, body = ErrorBody, description = "A song isn't in the user's library")
    )
)]
async fn set_songs(
    State(context): State<ServerContext>,
    session: Session,
    Path(setlist_id): Path<PrimaryKey>,
    ValidatedJson(body): ValidatedJson<SetlistSongsSchema>,
) -> ServerResult<Json<SetlistDetails>> {
    let details = context
        .collab
        .setlists
        .set_songs(session.user.id, setlist_id, body.song_ids)
        .await?;

    Ok(Json(details.to_serialized()))
}

pub fn router() -> Router {
    Router::new()
        .route("/setlists", get(setlists).post(create_setlist))
        .route(
            "/setlists/:id",
            get(setlist).patch(rename_setlist).delete(delete_setlist),
        )
        .route("/setlists/:id/songs", put(set_songs))
}
