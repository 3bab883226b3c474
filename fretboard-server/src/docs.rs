use std::borrow::BorrowMut;

use axum::{response::IntoResponse, Json};
use utoipa::{
    openapi::security::{ApiKey, ApiKeyValue, HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};

use crate::{auth, errors, routes, schemas, serialized, sse};

#[derive(OpenApi)]
#[openapi(
    modifiers(&Security),
    info(
        title = "fretboard API",
        description = "fretboard-server exposes endpoints to practice, jam and share with other guitarists"
    ),
    paths(
        auth::register,
        auth::login,
        auth::logout,
        auth::user,
        routes::profile::profile,
        routes::profile::update_profile,
        routes::library::songs,
        routes::library::create_song,
        routes::library::song,
        routes::library::update_song,
        routes::library::delete_song,
        routes::library::wishlist,
        routes::library::add_to_wishlist,
        routes::library::remove_from_wishlist,
        routes::library::promote,
        routes::library::playlists,
        routes::library::create_playlist,
        routes::library::playlist,
        routes::library::delete_playlist,
        routes::library::add_to_playlist,
        routes::library::remove_from_playlist,
        routes::practice::sessions,
        routes::practice::record,
        routes::practice::stats,
        routes::practice::exercise_summaries,
        routes::practice::record_exercise,
        routes::practice::exercise_history,
        routes::covers::own_covers,
        routes::covers::user_covers,
        routes::covers::upload,
        routes::covers::delete_cover,
        routes::bands::bands,
        routes::bands::create_band,
        routes::bands::band,
        routes::bands::delete_band,
        routes::bands::add_member,
        routes::bands::remove_member,
        routes::setlists::setlists,
        routes::setlists::create_setlist,
        routes::setlists::setlist,
        routes::setlists::rename_setlist,
        routes::setlists::delete_setlist,
        routes::setlists::set_songs,
        routes::jams::jams,
        routes::jams::start_jam,
        routes::jams::jam,
        routes::jams::participants,
        routes::jams::leave,
        routes::jams::end,
        routes::jams::messages,
        routes::jams::post_message,
        sse::jam_events,
        routes::social::friends,
        routes::social::remove_friend,
        routes::social::requests,
        routes::social::send_request,
        routes::social::accept,
        routes::social::decline,
        routes::social::feed,
        routes::push::public_key,
        routes::push::subscribe,
        routes::push::unsubscribe,
        routes::push::send_test,
        routes::push::notifications,
        routes::discovery::recognize,
        routes::discovery::search_tabs,
        routes::spotify::connect,
        routes::spotify::callback,
        routes::spotify::disconnect,
        routes::spotify::search,
        routes::spotify::playlists,
        routes::spotify::recently_played,
        routes::spotify::audio_features,
        routes::billing::subscription,
        routes::billing::select_plan,
        routes::billing::portal,
        routes::billing::webhook,
    ),
    components(schemas(
        errors::ErrorBody,
        schemas::LoginSchema,
        schemas::RegisterSchema,
        schemas::ProfileUpdateSchema,
        schemas::SongSchema,
        schemas::SongUpdateSchema,
        schemas::WishlistSchema,
        schemas::PlaylistSchema,
        schemas::PlaylistSongSchema,
        schemas::PracticeSchema,
        schemas::ExerciseSchema,
        schemas::BandSchema,
        schemas::UsernameSchema,
        schemas::SetlistSchema,
        schemas::SetlistUpdateSchema,
        schemas::SetlistSongsSchema,
        schemas::JamSchema,
        schemas::JamMessageSchema,
        schemas::PushSubscriptionSchema,
        schemas::PushKeysSchema,
        schemas::PushEndpointSchema,
        schemas::PlanSchema,
        schemas::CoverUploadForm,
        schemas::RecognizeForm,
        serialized::User,
        serialized::LoginResult,
        serialized::CurrentUser,
        serialized::Profile,
        serialized::Song,
        serialized::WishlistSong,
        serialized::Playlist,
        serialized::PracticeSession,
        serialized::PracticeStats,
        serialized::DayMinutes,
        serialized::ExerciseProgress,
        serialized::ExerciseSummary,
        serialized::Cover,
        serialized::Band,
        serialized::BandMember,
        serialized::Setlist,
        serialized::SetlistDetails,
        serialized::Jam,
        serialized::JamDetails,
        serialized::JamParticipant,
        serialized::JamMessage,
        serialized::FriendRequest,
        serialized::PendingRequests,
        serialized::FeedItem,
        serialized::PushKey,
        serialized::NotificationLog,
        serialized::Recognition,
        serialized::RecognitionResult,
        serialized::TabResult,
        serialized::ExternalTrack,
        serialized::ExternalPlaylist,
        serialized::TrackSuggestion,
        serialized::TrackFeatures,
        serialized::BillingStatus,
        serialized::PlanSelection,
        serialized::RedirectUrl,
        sse::ServerEvent,
    ))
)]
pub struct ApiDoc;

struct Security;

impl Modify for Security {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.borrow_mut() {
            let scheme = HttpBuilder::new()
                .scheme(HttpAuthScheme::Bearer)
                .bearer_format("Bearer <token>")
                .build();

            components.add_security_scheme("BearerAuth", SecurityScheme::Http(scheme));
            components.add_security_scheme(
                "SessionCookie",
                SecurityScheme::ApiKey(ApiKey::Cookie(ApiKeyValue::new(auth::SESSION_COOKIE))),
            );
        }
    }
}

pub async fn docs() -> impl IntoResponse {
    Json(ApiDoc::openapi())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn documents_every_area() {
        let doc = ApiDoc::openapi();

        for path in [
            "/v1/auth/login",
            "/v1/songs/{id}",
            "/v1/jams/{id}/events",
            "/v1/spotify/recently-played",
            "/v1/billing/webhook",
        ] {
            assert!(doc.paths.paths.contains_key(path), "{path} is missing");
        }
    }
}
