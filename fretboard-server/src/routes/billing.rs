use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Json,
};
use fretboard_core::Plan;

use crate::{
    auth::Session,
    errors::{ErrorBody, ServerError, ServerResult},
    schemas::{PlanSchema, ValidatedJson},
    serialized::{BillingStatus, PlanSelection, RedirectUrl, ToSerialized},
    Router, ServerContext,
};

const SIGNATURE_HEADER: &str = "stripe-signature";

#[utoipa::path(
    get,
    path = "/v1/billing/subscription",
    tag = "billing",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = BillingStatus)
    )
)]
async fn subscription(
    State(context): State<ServerContext>,
    session: Session,
) -> ServerResult<Json<BillingStatus>> {
    let status = context.collab.billing.status(session.user.id).await?;

    Ok(Json(status.to_serialized()))
}

#[utoipa::path(
    post,
    path = "/v1/billing/plan",
    tag = "billing",
    request_body = PlanSchema,
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = PlanSelection, description = "Either the updated plan or a checkout URL to redirect to"),
        (status = 400, body = ErrorBody, description = "Unknown plan, the free plan, or the current plan")
    )
)]
async fn select_plan(
    State(context): State<ServerContext>,
    session: Session,
    ValidatedJson(body): ValidatedJson<PlanSchema>,
) -> ServerResult<Json<PlanSelection>> {
    let plan: Plan = body
        .plan
        .parse()
        .map_err(|_| ServerError::BadRequest("Plan inconnu".to_string()))?;

    let selection = context
        .collab
        .billing
        .select_plan(session.user.id, plan)
        .await?;

    Ok(Json(selection.to_serialized()))
}

#[utoipa::path(
    post,
    path = "/v1/billing/portal",
    tag = "billing",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = RedirectUrl, description = "A link to the hosted billing portal"),
        (status = 400, body = ErrorBody, description = "The user never subscribed")
    )
)]
async fn portal(State(context): State<ServerContext>, session: Session) -> ServerResult<Json<RedirectUrl>> {
    let url = context.collab.billing.portal(session.user.id).await?;

    Ok(Json(RedirectUrl { url }))
}

#[utoipa::path(
    post,
    path = "/v1/billing/webhook",
    tag = "billing",
    request_body(content = String, description = "The raw Stripe event", content_type = "application/json"),
    params(
        ("Stripe-Signature" = String, Header, description = "Signature of the payload")
    ),
    responses(
        (status = 200, description = "The event was applied or ignored"),
        (status = 400, body = ErrorBody, description = "The signature doesn't match")
    )
)]
async fn webhook(
    State(context): State<ServerContext>,
    headers: HeaderMap,
    body: Bytes,
) -> ServerResult<StatusCode> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ServerError::BadRequest("Signature manquante".to_string()))?;

    context
        .collab
        .billing
        .handle_webhook(&body, signature)
        .await?;

    Ok(StatusCode::OK)
}

pub fn router() -> Router {
    Router::new()
        .route("/billing/subscription", get(subscription))
        .route("/billing/plan", post(select_plan))
        .route("/billing/portal", post(portal))
        .route("/billing/webhook", post(webhook))
}
