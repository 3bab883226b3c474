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
    schemas::{UsernameSchema, ValidatedJson},
    serialized::{FeedItem, FriendRequest, PendingRequests, ToSerialized, User},
    Router, ServerContext,
};

#[utoipa::path(
    get,
    path = "/v1/friends",
    tag = "social",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = Vec<User>)
    )
)]
async fn friends(State(context): State<ServerContext>, session: Session) -> ServerResult<Json<Vec<User>>> {
    let friends = context.collab.social.friends(session.user.id).await?;

    Ok(Json(friends.to_serialized()))
}

#[utoipa::path(
    delete,
    path = "/v1/friends/{user_id}",
    tag = "social",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 204, description = "The two users are no longer friends"),
        (status = 404, body = ErrorBody)
    )
)]
async fn remove_friend(
    State(context): State<ServerContext>,
    session: Session,
    Path(friend_id): Path<PrimaryKey>,
) -> ServerResult<StatusCode> {
    context
        .collab
        .social
        .remove_friend(session.user.id, friend_id)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    path = "/v1/friends/requests",
    tag = "social",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = PendingRequests)
    )
)]
async fn requests(
    State(context): State<ServerContext>,
    session: Session,
) -> ServerResult<Json<PendingRequests>> {
    let requests = context.collab.social.requests(session.user.id).await?;

    Ok(Json(requests.to_serialized()))
}

#[utoipa::path(
    post,
    path = "/v1/friends/requests",
    tag = "social",
    request_body = UsernameSchema,
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 201, body = FriendRequest),
        (status = 400, body = ErrorBody, description = "The user tried to befriend themselves"),
        (status = 404, body = ErrorBody, description = "No user has this username"),
        (status = 409, body = ErrorBody, description = "Already friends, or a request is pending")
    )
)]
async fn send_request(
    State(context): State<ServerContext>,
    session: Session,
    ValidatedJson(body): ValidatedJson<UsernameSchema>,
) -> ServerResult<(StatusCode, Json<FriendRequest>)> {
    let request = context
        .collab
        .social
        .send_request(session.user.id, &body.username)
        .await?;

    Ok((StatusCode::CREATED, Json(request.to_serialized())))
}

#[utoipa::path(
    post,
    path = "/v1/friends/requests/{id}/accept",
    tag = "social",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = FriendRequest),
        (status = 400, body = ErrorBody, description = "The request was already answered"),
        (status = 403, body = ErrorBody, description = "Only the recipient can answer")
    )
)]
async fn accept(
    State(context): State<ServerContext>,
    session: Session,
    Path(request_id): Path<PrimaryKey>,
) -> ServerResult<Json<FriendRequest>> {
    let request = context.collab.social.accept(session.user.id, request_id).await?;

    Ok(Json(request.to_serialized()))
}

#[utoipa::path(
    post,
    path = "/v1/friends/requests/{id}/decline",
    tag = "social",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = FriendRequest),
        (status = 400, body = ErrorBody, description = "The request was already answered"),
        (status = 403, body = ErrorBody, description = "Only the recipient can answer")
    )
)]
async fn decline(
    State(context): State<ServerContext>,
    session: Session,
    Path(request_id): Path<PrimaryKey>,
) -> ServerResult<Json<FriendRequest>> {
    let request = context.collab.social.decline(session.user.id, request_id).await?;

    Ok(Json(request.to_serialized()))
}

#[utoipa::path(
    get,
    path = "/v1/feed",
    tag = "social",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = Vec<FeedItem>, description = "What friends did recently, newest first")
    )
)]
async fn feed(State(context): State<ServerContext>, session: Session) -> ServerResult<Json<Vec<FeedItem>>> {
    let feed = context.collab.social.feed(session.user.id).await?;

    Ok(Json(feed.to_serialized()))
}

pub fn router() -> Router {
    Router::new()
        .route("/friends", get(friends))
        .route("/friends/requests", get(requests).post(send_request))
        .route("/friends/requests/:id/accept", post(accept))
        .route("/friends/requests/:id/decline", post(decline))
        .route("/friends/:user_id", delete(remove_friend))
        .route("/feed", get(feed))
}
