use axum::{
    extract::{Multipart, Query, State},
    routing::{get, post},
    Json,
};

use crate::{
    auth::PaidSession,
    errors::{ErrorBody, ServerError, ServerResult},
    schemas::{read_form, RecognizeForm, SearchQuery},
    serialized::{RecognitionResult, TabResult, ToSerialized},
    Router, ServerContext,
};

#[utoipa::path(
    post,
    path = "/v1/recognize",
    tag = "discovery",
    request_body(content = RecognizeForm, content_type = "multipart/form-data"),
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = RecognitionResult),
        (status = 400, body = ErrorBody, description = "No audio was sent"),
        (status = 403, body = ErrorBody, description = "The user is on the free plan"),
        (status = 502, body = ErrorBody, description = "The recognition service failed")
    )
)]
async fn recognize(
    session: PaidSession,
    State(context): State<ServerContext>,
    multipart: Multipart,
) -> ServerResult<Json<RecognitionResult>> {
    let (_, file) = read_form(multipart).await?;
    let file = file.ok_or_else(|| ServerError::BadRequest("Aucun fichier audio fourni".to_string()))?;

    let filename = file.filename.unwrap_or_else(|| "sample.webm".to_string());

    let result = context
        .collab
        .discovery
        .recognize(session.user.id, file.data, &filename)
        .await?;

    Ok(Json(RecognitionResult::new(result)))
}

#[utoipa::path(
    get,
    path = "/v1/tabs/search",
    tag = "discovery",
    params(SearchQuery),
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = Vec<TabResult>, description = "Results of every source that answered, in source order"),
        (status = 400, body = ErrorBody, description = "The query is empty"),
        (status = 403, body = ErrorBody, description = "The user is on the free plan"),
        (status = 502, body = ErrorBody, description = "Every source failed")
    )
)]
async fn search_tabs(
    session: PaidSession,
    State(context): State<ServerContext>,
    Query(query): Query<SearchQuery>,
) -> ServerResult<Json<Vec<TabResult>>> {
    let results = context
        .collab
        .discovery
        .search_tabs(session.user.id, query.q.as_deref().unwrap_or_default())
        .await?;

    Ok(Json(results.to_serialized()))
}

pub fn router() -> Router {
    Router::new()
        .route("/recognize", post(recognize))
        .route("/tabs/search", get(search_tabs))
}
