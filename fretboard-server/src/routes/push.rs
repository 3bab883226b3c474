use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json,
};
use fretboard_collab::SubscriptionInput;

use crate::{
    auth::Session,
    errors::{ErrorBody, ServerResult},
    schemas::{PushEndpointSchema, PushSubscriptionSchema, ValidatedJson},
    serialized::{NotificationLog, PushKey, ToSerialized},
    Router, ServerContext,
};

#[utoipa::path(
    get,
    path = "/v1/push/key",
    tag = "push",
    responses(
        (status = 200, body = PushKey, description = "The VAPID public key to subscribe with")
    )
)]
async fn public_key(State(context): State<ServerContext>) -> Json<PushKey> {
    Json(PushKey::new(context.collab.push.public_key()))
}

#[utoipa::path(
    post,
    path = "/v1/push/subscriptions",
    tag = "push",
    request_body = PushSubscriptionSchema,
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 204, description = "The device will receive notifications"),
        (status = 400, body = ErrorBody)
    )
)]
async fn subscribe(
    State(context): State<ServerContext>,
    session: Session,
    ValidatedJson(body): ValidatedJson<PushSubscriptionSchema>,
) -> ServerResult<StatusCode> {
    context
        .collab
        .push
        .subscribe(
            session.user.id,
            SubscriptionInput {
                endpoint: body.endpoint,
                p256dh: body.keys.p256dh,
                auth: body.keys.auth,
            },
        )
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    delete,
    path = "/v1/push/subscriptions",
    tag = "push",
    request_body = PushEndpointSchema,
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 204, description = "The device won't receive notifications anymore"),
        (status = 404, body = ErrorBody)
    )
)]
async fn unsubscribe(
    State(context): State<ServerContext>,
    session: Session,
    ValidatedJson(body): ValidatedJson<PushEndpointSchema>,
) -> ServerResult<StatusCode> {
    context
        .collab
        .push
        .unsubscribe(session.user.id, &body.endpoint)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    post,
    path = "/v1/push/test",
    tag = "push",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = NotificationLog, description = "How many devices the test reached")
    )
)]
async fn send_test(
    State(context): State<ServerContext>,
    session: Session,
) -> ServerResult<Json<NotificationLog>> {
    let log = context.collab.push.send_test(session.user.id).await?;

    Ok(Json(log.to_serialized()))
}

#[utoipa::path(
    get,
    path = "/v1/notifications",
    tag = "push",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = Vec<NotificationLog>, description = "Recent notifications, newest first")
    )
)]
async fn notifications(
    State(context): State<ServerContext>,
    session: Session,
) -> ServerResult<Json<Vec<NotificationLog>>> {
    let logs = context.collab.push.notifications(session.user.id).await?;

    Ok(Json(logs.to_serialized()))
}

pub fn router() -> Router {
    Router::new()
        .route("/push/key", get(public_key))
        .route("/push/subscriptions", post(subscribe).delete(unsubscribe))
        .route("/push/test", post(send_test))
        .route("/notifications", get(notifications))
}
