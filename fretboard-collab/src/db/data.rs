use std::str::FromStr;

use chrono::{DateTime, Utc};
use fretboard_core::Plan;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// The type used for primary keys in the database.
pub type PrimaryKey = i32;

/// A fretboard account
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct UserData {
    pub id: PrimaryKey,
    pub username: String,
    /// The argon2 hash of the password
    pub password: String,
    pub display_name: String,
    pub created_at: DateTime<Utc>,
}

/// Login session data for authentication
#[derive(Debug, Clone)]
pub struct SessionData {
    pub id: PrimaryKey,
    /// The session token, or key if you will
    pub token: String,
    pub expires_at: DateTime<Utc>,
    /// The user that is logged in
    pub user: UserData,
}

/// Everything about a user that isn't needed to authenticate them
#[derive(Debug, Clone)]
pub struct ProfileData {
    pub user: UserData,
    pub avatar_url: Option<String>,
    pub plan: Plan,
    pub stripe_customer_id: Option<String>,
    pub stripe_subscription_id: Option<String>,
    pub spotify: Option<SpotifyLink>,
}

/// Tokens of a linked Spotify account
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpotifyLink {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SongStatus {
    #[default]
    Learning,
    Practicing,
    Mastered,
}

/// A song in a user's repertoire
#[derive(Debug, Clone, PartialEq)]
pub struct SongData {
    pub id: PrimaryKey,
    pub user_id: PrimaryKey,
    pub title: String,
    pub artist: String,
    pub status: SongStatus,
    /// From 1 (easy) to 5 (hard)
    pub difficulty: Option<i32>,
    pub tuning: Option<String>,
    pub tab_url: Option<String>,
    pub spotify_id: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A song the user wants to learn some day
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct WishlistSongData {
    pub id: PrimaryKey,
    pub user_id: PrimaryKey,
    pub title: String,
    pub artist: String,
    pub spotify_id: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlaylistData {
    pub id: PrimaryKey,
    pub user_id: PrimaryKey,
    pub name: String,
    pub description: Option<String>,
    /// Songs in the order they were added
    pub song_ids: Vec<PrimaryKey>,
    pub created_at: DateTime<Utc>,
}

/// A single stretch of practice
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct PracticeSessionData {
    pub id: PrimaryKey,
    pub user_id: PrimaryKey,
    pub song_id: Option<PrimaryKey>,
    pub duration_minutes: i32,
    pub notes: Option<String>,
    pub practiced_at: DateTime<Utc>,
}

/// One attempt at an exercise, these are never updated
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct ExerciseProgressData {
    pub id: PrimaryKey,
    pub user_id: PrimaryKey,
    /// Exercises are defined by the client, this is their slug
    pub exercise_id: String,
    pub bpm: i32,
    pub completed: bool,
    pub recorded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Audio,
    Video,
}

/// An uploaded recording of the user playing something
#[derive(Debug, Clone, PartialEq)]
pub struct CoverData {
    pub id: PrimaryKey,
    pub user_id: PrimaryKey,
    pub song_id: Option<PrimaryKey>,
    pub title: String,
    pub media_kind: MediaKind,
    /// Public URL of the media
    pub url: String,
    /// Where the media lives in object storage
    pub storage_key: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BandData {
    pub id: PrimaryKey,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub members: Vec<BandMemberData>,
}

/// A member of a band
#[derive(Debug, Clone, PartialEq)]
pub struct BandMemberData {
    pub id: PrimaryKey,
    pub band_id: PrimaryKey,
    /// If this is true, the member has full control over the band
    pub owner: bool,
    pub user: UserData,
    pub joined_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SetlistData {
    pub id: PrimaryKey,
    /// The creator of the setlist
    pub user_id: PrimaryKey,
    pub band_id: Option<PrimaryKey>,
    pub title: String,
    /// Songs in performance order
    pub song_ids: Vec<PrimaryKey>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A live practice session that several users can join
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct JamData {
    pub id: PrimaryKey,
    pub host_id: PrimaryKey,
    pub band_id: Option<PrimaryKey>,
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct JamParticipantData {
    pub id: PrimaryKey,
    pub jam_id: PrimaryKey,
    pub user: UserData,
    pub joined_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct JamMessageData {
    pub id: PrimaryKey,
    pub jam_id: PrimaryKey,
    pub user: UserData,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FriendRequestStatus {
    Pending,
    Accepted,
    Declined,
}

/// A directed request, which turns into an undirected friendship when accepted
#[derive(Debug, Clone, PartialEq)]
pub struct FriendRequestData {
    pub id: PrimaryKey,
    pub from: UserData,
    pub to: UserData,
    pub status: FriendRequestStatus,
    pub created_at: DateTime<Utc>,
}

/// A device registered for web push.
/// Note: `endpoint` is unique, a device re-subscribing replaces its keys.
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct PushSubscriptionData {
    pub id: PrimaryKey,
    pub user_id: PrimaryKey,
    pub endpoint: String,
    pub p256dh: String,
    pub auth: String,
    pub created_at: DateTime<Utc>,
}

/// Audit record of one notification fan-out
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct NotificationLogData {
    pub id: PrimaryKey,
    pub user_id: PrimaryKey,
    pub title: String,
    pub body: String,
    pub delivered: i32,
    pub failed: i32,
    pub created_at: DateTime<Utc>,
}

macro_rules! text_enum {
    ($name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $text),+
                }
            }
        }

        impl FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok(Self::$variant),)+
                    other => Err(format!("unknown {}: {}", stringify!($name), other)),
                }
            }
        }
    };
}

text_enum!(SongStatus {
    Learning => "learning",
    Practicing => "practicing",
    Mastered => "mastered",
});

text_enum!(MediaKind {
    Audio => "audio",
    Video => "video",
});

text_enum!(FriendRequestStatus {
    Pending => "pending",
    Accepted => "accepted",
    Declined => "declined",
});

impl MediaKind {
    /// Figures out the kind from a mime type, only audio and video are accepted
    pub fn from_content_type(content_type: &str) -> Option<Self> {
        let top_level = content_type.split('/').next()?;

        match top_level {
            "audio" => Some(Self::Audio),
            "video" => Some(Self::Video),
            _ => None,
        }
    }
}

impl ProfileData {
    pub fn id(&self) -> PrimaryKey {
        self.user.id
    }
}

impl BandData {
    pub fn member(&self, user_id: PrimaryKey) -> Option<&BandMemberData> {
        self.members.iter().find(|m| m.user.id == user_id)
    }

    pub fn is_owner(&self, user_id: PrimaryKey) -> bool {
        self.member(user_id).is_some_and(|m| m.owner)
    }
}

impl JamData {
    pub fn is_active(&self) -> bool {
        self.ended_at.is_none()
    }
}
