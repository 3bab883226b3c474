use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get, post},
    Json,
};
use fretboard_collab::{PrimaryKey, SongChanges, SongInput, WishlistInput};

use crate::{
    auth::Session,
    errors::{ErrorBody, ServerResult},
    schemas::{
        PlaylistSchema, PlaylistSongSchema, SongSchema, SongUpdateSchema, ValidatedJson,
        WishlistSchema,
    },
    serialized::{Playlist, Song, ToSerialized, WishlistSong},
    Router, ServerContext,
};

#[utoipa::path(
    get,
    path = "/v1/songs",
    tag = "library",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = Vec<Song>)
    )
)]
async fn songs(State(context): State<ServerContext>, session: Session) -> ServerResult<Json<Vec<Song>>> {
    let songs = context.collab.library.songs(session.user.id).await?;

    Ok(Json(songs.to_serialized()))
}

#[utoipa::path(
    post,
    path = "/v1/songs",
    tag = "library",
    request_body = SongSchema,
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 201, body = Song),
        (status = 400, body = ErrorBody)
    )
)]
async fn create_song(
    State(context): State<ServerContext>,
    session: Session,
    ValidatedJson(body): ValidatedJson<SongSchema>,
) -> ServerResult<(StatusCode, Json<Song>)> {
    let song = context
        .collab
        .library
        .create_song(
            session.user.id,
            SongInput {
                title: body.title,
                artist: body.artist,
                status: body.status,
                difficulty: body.difficulty,
                tuning: body.tuning,
                tab_url: body.tab_url,
                spotify_id: body.spotify_id,
                notes: body.notes,
            },
        )
        .await?;

    Ok((StatusCode::CREATED, Json(song.to_serialized())))
}

#[utoipa::path(
    get,
    path = "/v1/songs/{id}",
    tag = "library",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = Song),
        (status = 404, body = ErrorBody)
    )
)]
async fn song(
    State(context): State<ServerContext>,
    session: Session,
    Path(song_id): Path<PrimaryKey>,
) -> ServerResult<Json<Song>> {
    let song = context.collab.library.song(session.user.id, song_id).await?;

    Ok(Json(song.to_serialized()))
}

#[utoipa::path(
    patch,
    path = "/v1/songs/{id}",
    tag = "library",
    request_body = SongUpdateSchema,
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = Song),
        (status = 404, body = ErrorBody)
    )
)]
async fn update_song(
    State(context): State<ServerContext>,
    session: Session,
    Path(song_id): Path<PrimaryKey>,
    ValidatedJson(body): ValidatedJson<SongUpdateSchema>,
) -> ServerResult<Json<Song>> {
    let song = context
        .collab
        .library
        .update_song(
            session.user.id,
            song_id,
            SongChanges {
                title: body.title,
                artist: body.artist,
                status: body.status,
                difficulty: body.difficulty,
                tuning: body.tuning,
                tab_url: body.tab_url,
                notes: body.notes,
            },
        )
        .await?;

    Ok(Json(song.to_serialized()))
}

#[utoipa::path(
    delete,
    path = "/v1/songs/{id}",
    tag = "library",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 204, description = "The song was deleted"),
        (status = 404, body = ErrorBody)
    )
)]
async fn delete_song(
    State(context): State<ServerContext>,
    session: Session,
    Path(song_id): Path<PrimaryKey>,
) -> ServerResult<StatusCode> {
    context.collab.library.delete_song(session.user.id, song_id).await?;

    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    path = "/v1/wishlist",
    tag = "library",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = Vec<WishlistSong>)
    )
)]
async fn wishlist(
    State(context): State<ServerContext>,
    session: Session,
) -> ServerResult<Json<Vec<WishlistSong>>> {
    let wishlist = context.collab.library.wishlist(session.user.id).await?;

    Ok(Json(wishlist.to_serialized()))
}

#[utoipa::path(
    post,
    path = "/v1/wishlist",
    tag = "library",
    request_body = WishlistSchema,
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 201, body = WishlistSong),
        (status = 400, body = ErrorBody)
    )
)]
async fn add_to_wishlist(
    State(context): State<ServerContext>,
    session: Session,
    ValidatedJson(body): ValidatedJson<WishlistSchema>,
) -> ServerResult<(StatusCode, Json<WishlistSong>)> {
    let wish = context
        .collab
        .library
        .add_to_wishlist(
            session.user.id,
            WishlistInput {
                title: body.title,
                artist: body.artist,
                spotify_id: body.spotify_id,
                notes: body.notes,
            },
        )
        .await?;

    Ok((StatusCode::CREATED, Json(wish.to_serialized())))
}

#[utoipa::path(
    delete,
    path = "/v1/wishlist/{id}",
    tag = "library",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 204, description = "The entry was removed"),
        (status = 404, body = ErrorBody)
    )
)]
async fn remove_from_wishlist(
    State(context): State<ServerContext>,
    session: Session,
    Path(wishlist_id): Path<PrimaryKey>,
) -> ServerResult<StatusCode> {
    context
        .collab
        .library
        .remove_from_wishlist(session.user.id, wishlist_id)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    post,
    path = "/v1/wishlist/{id}/promote",
    tag = "library",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 201, body = Song, description = "The entry moved into the library"),
        (status = 404, body = ErrorBody)
    )
)]
async fn promote(
    State(context): State<ServerContext>,
    session: Session,
    Path(wishlist_id): Path<PrimaryKey>,
) -> ServerResult<(StatusCode, Json<Song>)> {
    let song = context.collab.library.promote(session.user.id, wishlist_id).await?;

    Ok((StatusCode::CREATED, Json(song.to_serialized())))
}

#[utoipa::path(
    get,
    path = "/v1/playlists",
    tag = "library",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = Vec<Playlist>)
    )
)]
async fn playlists(
    State(context): State<ServerContext>,
    session: Session,
) -> ServerResult<Json<Vec<Playlist>>> {
    let playlists = context.collab.library.playlists(session.user.id).await?;

    Ok(Json(playlists.to_serialized()))
}

#[utoipa::path(
    post,
    path = "/v1/playlists",
    tag = "library",
    request_body = PlaylistSchema,
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 201, body = Playlist),
        (status = 400, body = ErrorBody)
    )
)]
async fn create_playlist(
    State(context): State<ServerContext>,
    session: Session,
    ValidatedJson(body): ValidatedJson<PlaylistSchema>,
) -> ServerResult<(StatusCode, Json<Playlist>)> {
    let playlist = context
        .collab
        .library
        .create_playlist(session.user.id, body.name, body.description)
        .await?;

    Ok((StatusCode::CREATED, Json(playlist.to_serialized())))
}

#[utoipa::path(
    get,
    path = "/v1/playlists/{id}",
    tag = "library",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = Playlist),
        (status = 404, body = ErrorBody)
    )
)]
async fn playlist(
    State(context): State<ServerContext>,
    session: Session,
    Path(playlist_id): Path<PrimaryKey>,
) -> ServerResult<Json<Playlist>> {
    let playlist = context.collab.library.playlist(session.user.id, playlist_id).await?;

    Ok(Json(playlist.to_serialized()))
}

#[utoipa::path(
    delete,
    path = "/v1/playlists/{id}",
    tag = "library",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 204, description = "The playlist was deleted"),
        (status = 404, body = ErrorBody)
    )
)]
async fn delete_playlist(
    State(context): State<ServerContext>,
    session: Session,
    Path(playlist_id): Path<PrimaryKey>,
) -> ServerResult<StatusCode> {
    context
        .collab
        .library
        .delete_playlist(session.user.id, playlist_id)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    post,
    path = "/v1/playlists/{id}/songs",
    tag = "library",
    request_body = PlaylistSongSchema,
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = Playlist),
        (status = 404, body = ErrorBody, description = "The playlist or the song doesn't exist")
    )
)]
async fn add_to_playlist(
    State(context): State<ServerContext>,
    session: Session,
    Path(playlist_id): Path<PrimaryKey>,
    ValidatedJson(body): ValidatedJson<PlaylistSongSchema>,
) -> ServerResult<Json<Playlist>> {
    let playlist = context
        .collab
        .library
        .add_to_playlist(session.user.id, playlist_id, body.song_id)
        .await?;

    Ok(Json(playlist.to_serialized()))
}

#[utoipa::path(
    delete,
    path = "/v1/playlists/{id}/songs/{song_id}",
    tag = "library",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = Playlist),
        (status = 404, body = ErrorBody)
    )
)]
async fn remove_from_playlist(
    State(context): State<ServerContext>,
    session: Session,
    Path((playlist_id, song_id)): Path<(PrimaryKey, PrimaryKey)>,
) -> ServerResult<Json<Playlist>> {
    let playlist = context
        .collab
        .library
        .remove_from_playlist(session.user.id, playlist_id, song_id)
        .await?;

    Ok(Json(playlist.to_serialized()))
}

pub fn router() -> Router {
    Router::new()
        .route("/songs", get(songs).post(create_song))
        .route("/songs/:id", get(song).patch(update_song).delete(delete_song))
        .route("/wishlist", get(wishlist).post(add_to_wishlist))
        .route("/wishlist/:id", delete(remove_from_wishlist))
        .route("/wishlist/:id/promote", post(promote))
        .route("/playlists", get(playlists).post(create_playlist))
        .route("/playlists/:id", get(playlist).delete(delete_playlist))
        .route("/playlists/:id/songs", post(add_to_playlist))
        .route("/playlists/:id/songs/:song_id", delete(remove_from_playlist))
}
