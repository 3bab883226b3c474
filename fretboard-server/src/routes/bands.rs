use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get, post},
    Json,
};
use fretboard_collab::PrimaryKey;

use crate::{
    auth::Session,
    errors::{ErrorBody, ServerResult},
    schemas::{BandSchema, UsernameSchema, ValidatedJson},
    serialized::{Band, BandMember, ToSerialized},
    Router, ServerContext,
};

#[utoipa::path(
    get,
    path = "/v1/bands",
    tag = "bands",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = Vec<Band>, description = "Bands the user is a member of")
    )
)]
async fn bands(State(context): State<ServerContext>, session: Session) -> ServerResult<Json<Vec<Band>>> {
    let bands = context.collab.bands.bands_of(session.user.id).await?;

    Ok(Json(bands.to_serialized()))
}

#[utoipa::path(
    post,
    path = "/v1/bands",
    tag = "bands",
    request_body = BandSchema,
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 201, body = Band, description = "The band, with the creator as its owner"),
        (status = 400, body = ErrorBody)
    )
)]
async fn create_band(
    State(context): State<ServerContext>,
    session: Session,
    ValidatedJson(body): ValidatedJson<BandSchema>,
) -> ServerResult<(StatusCode, Json<Band>)> {
    let band = context.collab.bands.create(session.user.id, body.name).await?;

    Ok((StatusCode::CREATED, Json(band.to_serialized())))
}

#[utoipa::path(
    get,
    path = "/v1/bands/{id}",
    tag = "bands",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = Band),
        (status = 403, body = ErrorBody, description = "The user isn't a member"),
        (status = 404, body = ErrorBody)
    )
)]
async fn band(
    State(context): State<ServerContext>,
    session: Session,
    Path(band_id): Path<PrimaryKey>,
) -> ServerResult<Json<Band>> {
    let band = context.collab.bands.band(session.user.id, band_id).await?;

    Ok(Json(band.to_serialized()))
}

#[utoipa::path(
    delete,
    path = "/v1/bands/{id}",
    tag = "bands",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 204, description = "The band was deleted"),
        (status = 403, body = ErrorBody, description = "Only the owner can delete a band")
    )
)]
async fn delete_band(
    State(context): State<ServerContext>,
    session: Session,
    Path(band_id): Path<PrimaryKey>,
) -> ServerResult<StatusCode> {
    context.collab.bands.delete(session.user.id, band_id).await?;

    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    post,
    path = "/v1/bands/{id}/members",
    tag = "bands",
    request_body = UsernameSchema,
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 201, body = BandMember),
        (status = 403, body = ErrorBody, description = "Only the owner can add members"),
        (status = 404, body = ErrorBody, description = "No user has this username"),
        (status = 409, body = ErrorBody, description = "The user is already a member")
    )
)]
async fn add_member(
    State(context): State<ServerContext>,
    session: Session,
    Path(band_id): Path<PrimaryKey>,
    ValidatedJson(body): ValidatedJson<UsernameSchema>,
) -> ServerResult<(StatusCode, Json<BandMember>)> {
    let member = context
        .collab
        .bands
        .add_member(session.user.id, band_id, &body.username)
        .await?;

    Ok((StatusCode::CREATED, Json(member.to_serialized())))
}

#[utoipa::path(
    delete,
    path = "/v1/bands/{id}/members/{user_id}",
    tag = "bands",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 204, description = "The member was removed"),
        (status = 400, body = ErrorBody, description = "The owner tried to leave"),
        (status = 403, body = ErrorBody)
    )
)]
async fn remove_member(
    State(context): State<ServerContext>,
    session: Session,
    Path((band_id, user_id)): Path<(PrimaryKey, PrimaryKey)>,
) -> ServerResult<StatusCode> {
    context
        .collab
        .bands
        .remove_member(session.user.id, band_id, user_id)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

pub fn router() -> Router {
    Router::new()
        .route("/bands", get(bands).post(create_band))
        .route("/bands/:id", get(band).delete(delete_band))
        .route("/bands/:id/members", post(add_member))
        .route("/bands/:id/members/:user_id", delete(remove_member))
}
