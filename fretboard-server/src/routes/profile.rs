use axum::{extract::State, routing::get, Json};
use fretboard_collab::ProfileChanges;

use crate::{
    auth::Session,
    errors::{ErrorBody, ServerResult},
    schemas::{ProfileUpdateSchema, ValidatedJson},
    serialized::{Profile, ToSerialized},
    Router, ServerContext,
};

#[utoipa::path(
    get,
    path = "/v1/profile",
    tag = "profile",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = Profile),
        (status = 401, body = ErrorBody)
    )
)]
async fn profile(State(context): State<ServerContext>, session: Session) -> ServerResult<Json<Profile>> {
    let profile = context.collab.profiles.profile(session.user.id).await?;

    Ok(Json(profile.to_serialized()))
}

#[utoipa::path(
    patch,
    path = "/v1/profile",
    tag = "profile",
    request_body = ProfileUpdateSchema,
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = Profile),
        (status = 400, body = ErrorBody)
    )
)]
async fn update_profile(
    State(context): State<ServerContext>,
    session: Session,
    ValidatedJson(body): ValidatedJson<ProfileUpdateSchema>,
) -> ServerResult<Json<Profile>> {
    let profile = context
        .collab
        .profiles
        .update(
            session.user.id,
            ProfileChanges {
                display_name: body.display_name,
                avatar_url: body.avatar_url,
            },
        )
        .await?;

    Ok(Json(profile.to_serialized()))
}

pub fn router() -> Router {
    Router::new().route("/profile", get(profile).patch(update_profile))
}
