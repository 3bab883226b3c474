use std::{collections::HashSet, sync::Arc};

use chrono::{Duration, Utc};
use fretboard_core::{ExternalPlaylist, ExternalTrack, MusicProvider, PlayedTrack};
use log::info;

use crate::{
    util::{non_blank, random_string},
    ArcedDatabase, CollabContext, CollabError, CollabResult, PlanGate, PrimaryKey, SpotifyLink,
};

/// Name of the cookie holding the OAuth state between connect and callback
pub const SPOTIFY_STATE_COOKIE: &str = "spotify_oauth_state";
/// How long the user has to complete the consent screen
pub const SPOTIFY_STATE_MAX_AGE_SECONDS: i64 = 600;

const KEY_NAMES: [&str; 12] = [
    "C", "C♯/D♭", "D", "D♯/E♭", "E", "F", "F♯/G♭", "G", "G♯/A♭", "A", "A♯/B♭", "B",
];

/// Linking a Spotify account and browsing it
pub struct SpotifyManager {
    db: ArcedDatabase,
    music: Arc<dyn MusicProvider>,
    gate: PlanGate,
}

/// Where to send the user, and the state to check when they come back
#[derive(Debug, Clone)]
pub struct SpotifyConnect {
    pub state: String,
    pub url: String,
}

/// A track shaped like a song of the library, ready to be added to it
#[derive(Debug, Clone, PartialEq)]
pub struct TrackSuggestion {
    pub title: String,
    pub artist: String,
    pub spotify_id: String,
    pub album: Option<String>,
    pub artwork: Option<String>,
    pub url: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrackFeatures {
    pub track_id: String,
    pub tempo: f32,
    /// Like "F♯/G♭", `None` when no key was detected
    pub key: Option<String>,
    pub mode: &'static str,
    pub time_signature: i32,
    pub energy: f32,
    pub danceability: f32,
}

impl SpotifyManager {
    const STATE_LENGTH: usize = 24;
    const REFRESH_MARGIN_SECONDS: i64 = 60;

    pub fn new(context: &CollabContext) -> Self {
        Self {
            db: context.database.clone(),
            music: context.providers.music.clone(),
            gate: PlanGate::new(context),
        }
    }

    pub async fn connect(&self, user_id: PrimaryKey) -> CollabResult<SpotifyConnect> {
        self.gate.check(user_id).await?;

        let state = random_string(Self::STATE_LENGTH);
        let url = self.music.authorize_url(&state);

        Ok(SpotifyConnect { state, url })
    }

    /// Completes the OAuth flow, the state has to match the one handed out by [Self::connect]
    pub async fn callback(
        &self,
        user_id: PrimaryKey,
        code: &str,
        state: &str,
        expected_state: Option<&str>,
    ) -> CollabResult<()> {
        if expected_state != Some(state) || state.is_empty() {
            return Err(CollabError::invalid("État OAuth invalide"));
        }

        let tokens = self.music.exchange_code(code).await?;

        let refresh_token = tokens
            .refresh_token
            .ok_or_else(|| CollabError::invalid("Spotify n'a pas fourni de jeton"))?;

        self.db
            .set_spotify_link(
                user_id,
                Some(SpotifyLink {
                    access_token: tokens.access_token,
                    refresh_token,
                    expires_at: tokens.expires_at,
                }),
            )
            .await?;

        info!("User {} connected Spotify", user_id);
        Ok(())
    }

    pub async fn disconnect(&self, user_id: PrimaryKey) -> CollabResult<()> {
        Ok(self.db.set_spotify_link(user_id, None).await?)
    }

    /// A valid access token, refreshed and stored back when about to expire
    pub async fn access_token(&self, user_id: PrimaryKey) -> CollabResult<String> {
        let profile = self.db.profile_by_user_id(user_id).await?;

        let link = profile
            .spotify
            .ok_or_else(|| CollabError::invalid("Spotify n'est pas connecté"))?;

        let margin = Duration::seconds(Self::REFRESH_MARGIN_SECONDS);

        if link.expires_at - margin > Utc::now() {
            return Ok(link.access_token);
        }

        let tokens = self.music.refresh(&link.refresh_token).await?;

        self.db
            .set_spotify_link(
                user_id,
                Some(SpotifyLink {
                    access_token: tokens.access_token.clone(),
                    refresh_token: tokens.refresh_token.unwrap_or(link.refresh_token),
                    expires_at: tokens.expires_at,
                }),
            )
            .await?;

        Ok(tokens.access_token)
    }

    pub async fn search(&self, user_id: PrimaryKey, query: &str) -> CollabResult<Vec<ExternalTrack>> {
        self.gate.check(user_id).await?;

        let query = non_blank(Some(query.to_string()))
            .ok_or_else(|| CollabError::invalid("La recherche est vide"))?;

        let token = self.access_token(user_id).await?;
        Ok(self.music.search_tracks(&token, &query).await?)
    }

    pub async fn playlists(&self, user_id: PrimaryKey) -> CollabResult<Vec<ExternalPlaylist>> {
        self.gate.check(user_id).await?;

        let token = self.access_token(user_id).await?;
        Ok(self.music.playlists(&token).await?)
    }

    /// Recently played tracks, each track only once
    pub async fn recently_played(&self, user_id: PrimaryKey) -> CollabResult<Vec<TrackSuggestion>> {
        self.gate.check(user_id).await?;

        let token = self.access_token(user_id).await?;
        let played = self.music.recently_played(&token).await?;

        Ok(dedupe_recently_played(played))
    }

    pub async fn audio_features(
        &self,
        user_id: PrimaryKey,
        track_id: &str,
    ) -> CollabResult<TrackFeatures> {
        self.gate.check(user_id).await?;

        let token = self.access_token(user_id).await?;
        let features = self.music.audio_features(&token, track_id).await?;

        Ok(TrackFeatures {
            track_id: features.track_id,
            tempo: features.tempo,
            key: key_name(features.key).map(String::from),
            mode: if features.mode == 1 { "major" } else { "minor" },
            time_signature: features.time_signature,
            energy: features.energy,
            danceability: features.danceability,
        })
    }
}

/// Keeps the first occurrence of every track, in the order they were played
pub fn dedupe_recently_played(played: Vec<PlayedTrack>) -> Vec<TrackSuggestion> {
    let mut seen = HashSet::new();

    played
        .into_iter()
        .filter(|p| seen.insert(p.track.id.clone()))
        .map(|p| TrackSuggestion {
            title: p.track.title,
            artist: p.track.artist,
            spotify_id: p.track.id,
            album: p.track.album,
            artwork: p.track.artwork,
            url: p.track.url,
        })
        .collect()
}

/// The name of a pitch class, `None` for -1 or anything out of range
pub fn key_name(pitch_class: i32) -> Option<&'static str> {
    usize::try_from(pitch_class)
        .ok()
        .and_then(|index| KEY_NAMES.get(index))
        .copied()
}

#[cfg(test)]
mod tests {
    use fretboard_core::Plan;

    use crate::testing::{track, TestCollab};

    use super::*;

    fn played(id: &str) -> PlayedTrack {
        PlayedTrack {
            track: track(id),
            played_at: Utc::now(),
        }
    }

    #[test]
    fn dedupes_keeping_first_occurrence() {
        let suggestions =
            dedupe_recently_played(vec![played("a"), played("b"), played("a"), played("c")]);

        let ids: Vec<_> = suggestions.iter().map(|s| s.spotify_id.as_str()).collect();
        assert_eq!(ids, ["a", "b", "c"]);
    }

    #[test]
    fn names_keys() {
        assert_eq!(key_name(0), Some("C"));
        assert_eq!(key_name(6), Some("F♯/G♭"));
        assert_eq!(key_name(-1), None);
        assert_eq!(key_name(12), None);
    }

    #[tokio::test]
    async fn callback_checks_state() {
        let test = TestCollab::new();
        let user = test.user_with_plan("django", Plan::Pro).await;
        let spotify = &test.collab.spotify;

        let connect = spotify.connect(user.user.id).await.unwrap();
        assert!(connect.url.contains(&connect.state));

        let wrong = spotify
            .callback(user.user.id, "code", "forged", Some(&connect.state))
            .await;
        assert!(matches!(wrong, Err(CollabError::Invalid(_))));

        spotify
            .callback(user.user.id, "code", &connect.state, Some(&connect.state))
            .await
            .unwrap();

        let profile = test.collab.profiles.profile(user.user.id).await.unwrap();
        assert!(profile.spotify.is_some());
    }

    #[tokio::test]
    async fn refreshes_expired_tokens() {
        let test = TestCollab::new();
        let user = test.user_with_plan("django", Plan::Pro).await;

        test.link_spotify(&user, Utc::now() + Duration::seconds(30)).await;

        let token = test.collab.spotify.access_token(user.user.id).await.unwrap();

        assert_eq!(token, "refreshed-token");
        assert_eq!(test.music.refresh_count(), 1);

        let profile = test.collab.profiles.profile(user.user.id).await.unwrap();
        let link = profile.spotify.unwrap();
        assert_eq!(link.access_token, "refreshed-token");
        assert_eq!(link.refresh_token, "refresh-token");
    }

    #[tokio::test]
    async fn free_users_cannot_search() {
        let test = TestCollab::new();
        let user = test.user("django").await;

        let result = test.collab.spotify.search(user.user.id, "nuages").await;
        assert!(matches!(result, Err(CollabError::PlanRequired)));
    }
}
