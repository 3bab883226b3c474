use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    routing::{delete, get},
    Json,
};
use fretboard_collab::{CoverUpload, PrimaryKey};

use crate::{
    auth::Session,
    errors::{ErrorBody, ServerError, ServerResult},
    schemas::{read_form, CoverUploadForm},
    serialized::{Cover, ToSerialized},
    Router, ServerContext,
};

#[utoipa::path(
    get,
    path = "/v1/covers",
    tag = "covers",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = Vec<Cover>, description = "The user's own covers")
    )
)]
async fn own_covers(
    State(context): State<ServerContext>,
    session: Session,
) -> ServerResult<Json<Vec<Cover>>> {
    let covers = context.collab.covers.covers_of(session.user.id).await?;

    Ok(Json(covers.to_serialized()))
}

#[utoipa::path(
    get,
    path = "/v1/covers/users/{user_id}",
    tag = "covers",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = Vec<Cover>),
        (status = 404, body = ErrorBody, description = "The user doesn't exist")
    )
)]
async fn user_covers(
    State(context): State<ServerContext>,
    _session: Session,
    Path(user_id): Path<PrimaryKey>,
) -> ServerResult<Json<Vec<Cover>>> {
    let covers = context.collab.covers.covers_of(user_id).await?;

    Ok(Json(covers.to_serialized()))
}

#[utoipa::path(
    post,
    path = "/v1/covers",
    tag = "covers",
    request_body(content = CoverUploadForm, content_type = "multipart/form-data"),
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 201, body = Cover),
        (status = 400, body = ErrorBody, description = "Missing title or file, or the file isn't audio or video")
    )
)]
async fn upload(
    State(context): State<ServerContext>,
    session: Session,
    multipart: Multipart,
) -> ServerResult<(StatusCode, Json<Cover>)> {
    let (mut fields, file) = read_form(multipart).await?;
    let file = file.ok_or_else(|| ServerError::BadRequest("Aucun fichier fourni".to_string()))?;

    let song_id = match fields.remove("songId").filter(|s| !s.trim().is_empty()) {
        Some(raw) => Some(
            raw.trim()
                .parse::<PrimaryKey>()
                .map_err(|_| ServerError::BadRequest("Morceau invalide".to_string()))?,
        ),
        None => None,
    };

    let cover = context
        .collab
        .covers
        .upload(
            session.user.id,
            CoverUpload {
                title: fields.remove("title").unwrap_or_default(),
                song_id,
                filename: file.filename,
                content_type: file.content_type,
                data: file.data,
            },
        )
        .await?;

    Ok((StatusCode::CREATED, Json(cover.to_serialized())))
}

#[utoipa::path(
    delete,
    path = "/v1/covers/{id}",
    tag = "covers",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 204, description = "The cover and its file were deleted"),
        (status = 403, body = ErrorBody, description = "The cover belongs to someone else"),
        (status = 404, body = ErrorBody)
    )
)]
async fn delete_cover(
    State(context): State<ServerContext>,
    session: Session,
    Path(cover_id): Path<PrimaryKey>,
) -> ServerResult<StatusCode> {
    context.collab.covers.delete(session.user.id, cover_id).await?;

    Ok(StatusCode::NO_CONTENT)
}

pub fn router() -> Router {
    Router::new()
        .route("/covers", get(own_covers).post(upload))
        .route("/covers/users/:user_id", get(user_covers))
        .route("/covers/:id", delete(delete_cover))
}
