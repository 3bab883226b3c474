use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use fretboard_core::Plan;
use thiserror::Error;

mod data;
pub use data::*;

mod pg;
pub use pg::*;

#[cfg(any(test, feature = "test-support"))]
mod memory;
#[cfg(any(test, feature = "test-support"))]
pub use memory::*;

pub type Result<T> = std::result::Result<T, DatabaseError>;
pub type ArcedDatabase = Arc<dyn Database>;

#[derive(Debug, Error)]
pub enum DatabaseError {
    /// An unknown or internal error happened with the database
    #[error(transparent)]
    Internal(Box<dyn std::error::Error + Send + Sync>),
    /// A resource already exists
    #[error("{resource} with {field} of value {value} already exists")]
    Conflict {
        /// The resource in question
        resource: &'static str,
        /// The field that is conflicting
        field: &'static str,
        /// The conflicting value
        value: String,
    },
    /// A resource in the database doesn't exist
    #[error("{resource}:{identifier} doesn't exist")]
    NotFound {
        resource: &'static str,
        identifier: &'static str,
    },
}

/// Helper trait to reduce boilerplate
pub trait IntoDatabaseError {
    fn not_found_or(self, resource: &'static str, identifier: &'static str) -> DatabaseError;
    fn any(self) -> DatabaseError;
}

/// Helper trait to reduce boilerplate
pub trait DatabaseResult {
    /// Turns the Result into a conflict error if it's Ok()
    fn conflict_or_ok(self, resource: &'static str, field: &'static str, value: &str)
        -> Result<()>;
}

impl<T> DatabaseResult for Result<T> {
    fn conflict_or_ok(
        self,
        resource: &'static str,
        field: &'static str,
        value: &str,
    ) -> Result<()> {
        match self {
            Ok(_) => Err(DatabaseError::Conflict {
                resource,
                field,
                value: value.to_string(),
            }),
            Err(DatabaseError::NotFound { .. }) => Ok(()),
            Err(e) => Err(e),
        }
    }
}

/// Represents a type that can fetch fretboard data from a database.
///
/// Everything owned by a user is looked up together with the owner, so another
/// user's rows read as not found.
#[async_trait]
pub trait Database: Send + Sync {
    async fn user_by_id(&self, user_id: PrimaryKey) -> Result<UserData>;
    async fn user_by_username(&self, username: &str) -> Result<UserData>;
    /// Creates the user along with an empty profile on the free plan
    async fn create_user(&self, new_user: NewUser) -> Result<UserData>;

    async fn session_by_token(&self, token: &str) -> Result<SessionData>;
    async fn create_session(&self, new_session: NewSession) -> Result<SessionData>;
    async fn delete_session_by_token(&self, token: &str) -> Result<()>;
    async fn clear_expired_sessions(&self) -> Result<()>;

    async fn profile_by_user_id(&self, user_id: PrimaryKey) -> Result<ProfileData>;
    async fn profile_by_customer_id(&self, customer_id: &str) -> Result<ProfileData>;
    async fn update_profile(&self, updated: UpdatedProfile) -> Result<ProfileData>;
    async fn update_plan(&self, user_id: PrimaryKey, plan: Plan) -> Result<()>;
    async fn update_billing(&self, user_id: PrimaryKey, billing: BillingRefs) -> Result<()>;
    async fn set_spotify_link(&self, user_id: PrimaryKey, link: Option<SpotifyLink>)
        -> Result<()>;

    async fn list_songs(&self, user_id: PrimaryKey) -> Result<Vec<SongData>>;
    async fn song_by_id(&self, user_id: PrimaryKey, song_id: PrimaryKey) -> Result<SongData>;
    async fn create_song(&self, new_song: NewSong) -> Result<SongData>;
    async fn update_song(&self, updated_song: UpdatedSong) -> Result<SongData>;
    async fn delete_song(&self, user_id: PrimaryKey, song_id: PrimaryKey) -> Result<()>;

    async fn list_wishlist(&self, user_id: PrimaryKey) -> Result<Vec<WishlistSongData>>;
    async fn wishlist_song_by_id(
        &self,
        user_id: PrimaryKey,
        wishlist_id: PrimaryKey,
    ) -> Result<WishlistSongData>;
    async fn create_wishlist_song(&self, new_song: NewWishlistSong) -> Result<WishlistSongData>;
    async fn delete_wishlist_song(&self, user_id: PrimaryKey, wishlist_id: PrimaryKey)
        -> Result<()>;

    async fn list_playlists(&self, user_id: PrimaryKey) -> Result<Vec<PlaylistData>>;
    async fn playlist_by_id(&self, user_id: PrimaryKey, playlist_id: PrimaryKey)
        -> Result<PlaylistData>;
    async fn create_playlist(&self, new_playlist: NewPlaylist) -> Result<PlaylistData>;
    async fn delete_playlist(&self, user_id: PrimaryKey, playlist_id: PrimaryKey) -> Result<()>;
    /// Adding a song that is already in the playlist does nothing
    async fn add_playlist_song(&self, playlist_id: PrimaryKey, song_id: PrimaryKey) -> Result<()>;
    async fn remove_playlist_song(&self, playlist_id: PrimaryKey, song_id: PrimaryKey)
        -> Result<()>;

    /// Sessions newest first, optionally only those after `since`
    async fn list_practice_sessions(
        &self,
        user_id: PrimaryKey,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<PracticeSessionData>>;
    async fn create_practice_session(
        &self,
        new_session: NewPracticeSession,
    ) -> Result<PracticeSessionData>;
    /// Recent sessions of several users at once, newest first
    async fn practice_sessions_for_users(
        &self,
        user_ids: &[PrimaryKey],
        limit: i64,
    ) -> Result<Vec<PracticeSessionData>>;

    /// Attempts oldest first, optionally for a single exercise
    async fn list_exercise_progress(
        &self,
        user_id: PrimaryKey,
        exercise_id: Option<&str>,
    ) -> Result<Vec<ExerciseProgressData>>;
    async fn create_exercise_progress(
        &self,
        new_progress: NewExerciseProgress,
    ) -> Result<ExerciseProgressData>;

    async fn list_covers(&self, user_id: PrimaryKey) -> Result<Vec<CoverData>>;
    async fn cover_by_id(&self, cover_id: PrimaryKey) -> Result<CoverData>;
    async fn create_cover(&self, new_cover: NewCover) -> Result<CoverData>;
    async fn delete_cover(&self, cover_id: PrimaryKey) -> Result<()>;
    async fn covers_for_users(&self, user_ids: &[PrimaryKey], limit: i64) -> Result<Vec<CoverData>>;

    async fn list_bands_for_user(&self, user_id: PrimaryKey) -> Result<Vec<BandData>>;
    async fn band_by_id(&self, band_id: PrimaryKey) -> Result<BandData>;
    /// Creates the band with the creator as its owner
    async fn create_band(&self, new_band: NewBand) -> Result<BandData>;
    async fn create_band_member(&self, new_member: NewBandMember) -> Result<BandMemberData>;
    async fn delete_band_member(&self, band_id: PrimaryKey, user_id: PrimaryKey) -> Result<()>;
    async fn delete_band(&self, band_id: PrimaryKey) -> Result<()>;

    /// Setlists created by the user or belonging to one of their bands
    async fn list_setlists(&self, user_id: PrimaryKey) -> Result<Vec<SetlistData>>;
    async fn setlist_by_id(&self, setlist_id: PrimaryKey) -> Result<SetlistData>;
    async fn create_setlist(&self, new_setlist: NewSetlist) -> Result<SetlistData>;
    async fn rename_setlist(&self, setlist_id: PrimaryKey, title: &str) -> Result<SetlistData>;
    /// Replaces the songs of the setlist, keeping the given order
    async fn set_setlist_songs(&self, setlist_id: PrimaryKey, song_ids: &[PrimaryKey])
        -> Result<SetlistData>;
    async fn delete_setlist(&self, setlist_id: PrimaryKey) -> Result<()>;

    /// Jams that haven't ended and that the user hosts, participates in, or whose band they're in
    async fn list_active_jams(&self, user_id: PrimaryKey) -> Result<Vec<JamData>>;
    async fn jam_by_id(&self, jam_id: PrimaryKey) -> Result<JamData>;
    async fn create_jam(&self, new_jam: NewJam) -> Result<JamData>;
    async fn end_jam(&self, jam_id: PrimaryKey) -> Result<JamData>;
    /// Adds the user to the jam, returns false if they were already in it
    async fn join_jam(&self, jam_id: PrimaryKey, user_id: PrimaryKey) -> Result<bool>;
    async fn leave_jam(&self, jam_id: PrimaryKey, user_id: PrimaryKey) -> Result<()>;
    async fn jam_participants(&self, jam_id: PrimaryKey) -> Result<Vec<JamParticipantData>>;
    /// The latest messages, in the order they were sent
    async fn jam_messages(&self, jam_id: PrimaryKey, limit: i64) -> Result<Vec<JamMessageData>>;
    async fn create_jam_message(&self, new_message: NewJamMessage) -> Result<JamMessageData>;

    async fn friends_of(&self, user_id: PrimaryKey) -> Result<Vec<UserData>>;
    async fn are_friends(&self, user_id: PrimaryKey, other_id: PrimaryKey) -> Result<bool>;
    async fn delete_friendship(&self, user_id: PrimaryKey, other_id: PrimaryKey) -> Result<()>;
    async fn friend_request_by_id(&self, request_id: PrimaryKey) -> Result<FriendRequestData>;
    /// A pending request in either direction between the two users
    async fn pending_request_between(
        &self,
        user_id: PrimaryKey,
        other_id: PrimaryKey,
    ) -> Result<FriendRequestData>;
    /// Pending requests sent to or by the user
    async fn pending_friend_requests(&self, user_id: PrimaryKey) -> Result<Vec<FriendRequestData>>;
    async fn create_friend_request(
        &self,
        from_id: PrimaryKey,
        to_id: PrimaryKey,
    ) -> Result<FriendRequestData>;
    /// Marks the request as accepted and creates the friendship
    async fn accept_friend_request(&self, request_id: PrimaryKey) -> Result<FriendRequestData>;
    async fn decline_friend_request(&self, request_id: PrimaryKey) -> Result<FriendRequestData>;

    /// Inserts the subscription, or replaces owner and keys of an existing endpoint
    async fn upsert_push_subscription(
        &self,
        new_subscription: NewPushSubscription,
    ) -> Result<PushSubscriptionData>;
    async fn push_subscriptions_for(&self, user_id: PrimaryKey)
        -> Result<Vec<PushSubscriptionData>>;
    async fn delete_push_subscription(&self, endpoint: &str) -> Result<()>;

    async fn create_notification_log(&self, new_log: NewNotificationLog)
        -> Result<NotificationLogData>;
    /// Newest first
    async fn list_notification_logs(
        &self,
        user_id: PrimaryKey,
        limit: i64,
    ) -> Result<Vec<NotificationLogData>>;
}

#[derive(Debug)]
pub struct NewUser {
    pub username: String,
    pub password: String,
    pub display_name: String,
}

#[derive(Debug)]
pub struct NewSession {
    pub token: String,
    pub user_id: PrimaryKey,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
pub struct UpdatedProfile {
    pub user_id: PrimaryKey,
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
}

/// References to the payment provider's objects, `None` leaves a field untouched
#[derive(Debug, Default)]
pub struct BillingRefs {
    pub customer_id: Option<String>,
    pub subscription_id: Option<String>,
}

#[derive(Debug)]
pub struct NewSong {
    pub user_id: PrimaryKey,
    pub title: String,
    pub artist: String,
    pub status: SongStatus,
    pub difficulty: Option<i32>,
    pub tuning: Option<String>,
    pub tab_url: Option<String>,
    pub spotify_id: Option<String>,
    pub notes: Option<String>,
}

/// A partial update, `None` leaves a field untouched
#[derive(Debug, Default)]
pub struct UpdatedSong {
    pub id: PrimaryKey,
    pub user_id: PrimaryKey,
    pub title: Option<String>,
    pub artist: Option<String>,
    pub status: Option<SongStatus>,
    pub difficulty: Option<i32>,
    pub tuning: Option<String>,
    pub tab_url: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug)]
pub struct NewWishlistSong {
    pub user_id: PrimaryKey,
    pub title: String,
    pub artist: String,
    pub spotify_id: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug)]
pub struct NewPlaylist {
    pub user_id: PrimaryKey,
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug)]
pub struct NewPracticeSession {
    pub user_id: PrimaryKey,
    pub song_id: Option<PrimaryKey>,
    pub duration_minutes: i32,
    pub notes: Option<String>,
    pub practiced_at: DateTime<Utc>,
}

#[derive(Debug)]
pub struct NewExerciseProgress {
    pub user_id: PrimaryKey,
    pub exercise_id: String,
    pub bpm: i32,
    pub completed: bool,
}

#[derive(Debug)]
pub struct NewCover {
    pub user_id: PrimaryKey,
    pub song_id: Option<PrimaryKey>,
    pub title: String,
    pub media_kind: MediaKind,
    pub url: String,
    pub storage_key: String,
}

#[derive(Debug)]
pub struct NewBand {
    pub name: String,
    /// The owner of the new band
    pub user_id: PrimaryKey,
}

#[derive(Debug)]
pub struct NewBandMember {
    pub band_id: PrimaryKey,
    pub user_id: PrimaryKey,
    pub owner: bool,
}

#[derive(Debug)]
pub struct NewSetlist {
    pub user_id: PrimaryKey,
    pub band_id: Option<PrimaryKey>,
    pub title: String,
}

#[derive(Debug)]
pub struct NewJam {
    pub host_id: PrimaryKey,
    pub band_id: Option<PrimaryKey>,
    pub title: String,
}

#[derive(Debug)]
pub struct NewJamMessage {
    pub jam_id: PrimaryKey,
    pub user_id: PrimaryKey,
    pub content: String,
}

#[derive(Debug)]
pub struct NewPushSubscription {
    pub user_id: PrimaryKey,
    pub endpoint: String,
    pub p256dh: String,
    pub auth: String,
}

#[derive(Debug)]
pub struct NewNotificationLog {
    pub user_id: PrimaryKey,
    pub title: String,
    pub body: String,
    pub delivered: i32,
    pub failed: i32,
}
