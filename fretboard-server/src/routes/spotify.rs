use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Redirect},
    routing::{get, post},
    Json,
};
use axum_extra::extract::{
    cookie::{Cookie, SameSite},
    CookieJar,
};
use fretboard_collab::{SPOTIFY_STATE_COOKIE, SPOTIFY_STATE_MAX_AGE_SECONDS};
use log::info;

use crate::{
    auth::{PaidSession, Session},
    errors::{ErrorBody, ServerError, ServerResult},
    schemas::{SearchQuery, SpotifyCallbackQuery},
    serialized::{ExternalPlaylist, ExternalTrack, ToSerialized, TrackFeatures, TrackSuggestion},
    Router, ServerContext,
};

fn settings_url(context: &ServerContext, outcome: &str) -> String {
    format!(
        "{}/settings?spotify={}",
        context.config.server.public_url.trim_end_matches('/'),
        outcome
    )
}

#[utoipa::path(
    get,
    path = "/v1/spotify/connect",
    tag = "spotify",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 303, description = "Redirects to the Spotify consent page, the state is kept in a cookie"),
        (status = 403, body = ErrorBody, description = "The user is on the free plan")
    )
)]
async fn connect(
    State(context): State<ServerContext>,
    session: Session,
    jar: CookieJar,
) -> ServerResult<impl IntoResponse> {
    let connect = context.collab.spotify.connect(session.user.id).await?;

    let cookie = Cookie::build((SPOTIFY_STATE_COOKIE, connect.state))
        .http_only(true)
        .path("/")
        .same_site(SameSite::Lax)
        .secure(context.config.server.secure_cookies)
        .max_age(time::Duration::seconds(SPOTIFY_STATE_MAX_AGE_SECONDS));

    Ok((jar.add(cookie), Redirect::to(&connect.url)))
}

#[utoipa::path(
    get,
    path = "/v1/spotify/callback",
    tag = "spotify",
    params(SpotifyCallbackQuery),
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 303, description = "Redirects back to the settings page"),
        (status = 400, body = ErrorBody, description = "The state doesn't match the one handed out")
    )
)]
async fn callback(
    State(context): State<ServerContext>,
    session: Session,
    jar: CookieJar,
    Query(query): Query<SpotifyCallbackQuery>,
) -> ServerResult<impl IntoResponse> {
    let expected_state = jar.get(SPOTIFY_STATE_COOKIE).map(|c| c.value().to_string());
    let jar = jar.remove(Cookie::build(SPOTIFY_STATE_COOKIE).path("/"));

    if let Some(error) = query.error {
        info!("User {} refused Spotify access: {}", session.user.id, error);
        return Ok((jar, Redirect::to(&settings_url(&context, "denied"))));
    }

    let code = query
        .code
        .ok_or_else(|| ServerError::BadRequest("Code d'autorisation manquant".to_string()))?;

    context
        .collab
        .spotify
        .callback(
            session.user.id,
            &code,
            query.state.as_deref().unwrap_or_default(),
            expected_state.as_deref(),
        )
        .await?;

    Ok((jar, Redirect::to(&settings_url(&context, "connected"))))
}

#[utoipa::path(
    post,
    path = "/v1/spotify/disconnect",
    tag = "spotify",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 204, description = "The stored tokens were deleted")
    )
)]
async fn disconnect(State(context): State<ServerContext>, session: Session) -> ServerResult<StatusCode> {
    context.collab.spotify.disconnect(session.user.id).await?;

    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    path = "/v1/spotify/search",
    tag = "spotify",
    params(SearchQuery),
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = Vec<ExternalTrack>),
        (status = 400, body = ErrorBody, description = "The query is empty or Spotify isn't connected"),
        (status = 403, body = ErrorBody, description = "The user is on the free plan")
    )
)]
async fn search(
    session: PaidSession,
    State(context): State<ServerContext>,
    Query(query): Query<SearchQuery>,
) -> ServerResult<Json<Vec<ExternalTrack>>> {
    let tracks = context
        .collab
        .spotify
        .search(session.user.id, query.q.as_deref().unwrap_or_default())
        .await?;

    Ok(Json(tracks.to_serialized()))
}

#[utoipa::path(
    get,
    path = "/v1/spotify/playlists",
    tag = "spotify",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = Vec<ExternalPlaylist>),
        (status = 403, body = ErrorBody, description = "The user is on the free plan")
    )
)]
async fn playlists(
    session: PaidSession,
    State(context): State<ServerContext>,
) -> ServerResult<Json<Vec<ExternalPlaylist>>> {
    let playlists = context.collab.spotify.playlists(session.user.id).await?;

    Ok(Json(playlists.to_serialized()))
}

#[utoipa::path(
    get,
    path = "/v1/spotify/recently-played",
    tag = "spotify",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = Vec<TrackSuggestion>, description = "Each track once, most recent first"),
        (status = 403, body = ErrorBody, description = "The user is on the free plan")
    )
)]
async fn recently_played(
    session: PaidSession,
    State(context): State<ServerContext>,
) -> ServerResult<Json<Vec<TrackSuggestion>>> {
    let suggestions = context.collab.spotify.recently_played(session.user.id).await?;

    Ok(Json(suggestions.to_serialized()))
}

#[utoipa::path(
    get,
    path = "/v1/spotify/audio-features/{track_id}",
    tag = "spotify",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = TrackFeatures),
        (status = 403, body = ErrorBody, description = "The user is on the free plan")
    )
)]
async fn audio_features(
    session: PaidSession,
    State(context): State<ServerContext>,
    Path(track_id): Path<String>,
) -> ServerResult<Json<TrackFeatures>> {
    let features = context
        .collab
        .spotify
        .audio_features(session.user.id, &track_id)
        .await?;

    Ok(Json(features.to_serialized()))
}

pub fn router() -> Router {
    Router::new()
        .route("/spotify/connect", get(connect))
        .route("/spotify/callback", get(callback))
        .route("/spotify/disconnect", post(disconnect))
        .route("/spotify/search", get(search))
        .route("/spotify/playlists", get(playlists))
        .route("/spotify/recently-played", get(recently_played))
        .route("/spotify/audio-features/:track_id", get(audio_features))
}
