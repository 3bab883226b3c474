//! All schemas that are exposed from endpoints are defined here
//! along with the ToSerialized impls

use chrono::{DateTime, NaiveDate, Utc};
use fretboard_collab::{
    BandData, BandMemberData, BillingStatus as CollabBillingStatus, CoverData,
    DayMinutes as CollabDayMinutes, ExerciseProgressData, ExerciseSummary as CollabExerciseSummary,
    FeedItem as CollabFeedItem, FriendRequestData, FriendRequestStatus, JamData, JamDetails as CollabJamDetails,
    JamMessageData, JamParticipantData, MediaKind, NotificationLogData, PendingRequests as CollabPendingRequests,
    PlanSelection as CollabPlanSelection, PlaylistData, PracticeSessionData,
    PracticeStats as CollabPracticeStats, ProfileData, SessionData, SetlistData,
    SetlistDetails as CollabSetlistDetails, SongData, SongStatus, TrackFeatures as CollabTrackFeatures,
    TrackSuggestion as CollabTrackSuggestion, UserData, WishlistSongData,
};
use fretboard_core::{
    ExternalPlaylist as CoreExternalPlaylist, ExternalTrack as CoreExternalTrack, Plan,
    RecognitionMatch, SubscriptionStatus, TabResult as CoreTabResult,
};
use serde::Serialize;
use utoipa::ToSchema;

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct User {
    id: i32,
    username: String,
    display_name: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct LoginResult {
    token: String,
    user: User,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct Profile {
    user: User,
    avatar_url: Option<String>,
    #[schema(value_type = String, example = "free")]
    plan: Plan,
    spotify_connected: bool,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct Song {
    id: i32,
    title: String,
    artist: String,
    #[schema(value_type = String, example = "learning")]
    status: SongStatus,
    difficulty: Option<i32>,
    tuning: Option<String>,
    tab_url: Option<String>,
    spotify_id: Option<String>,
    notes: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct WishlistSong {
    id: i32,
    title: String,
    artist: String,
    spotify_id: Option<String>,
    notes: Option<String>,
    created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct Playlist {
    id: i32,
    name: String,
    description: Option<String>,
    song_ids: Vec<i32>,
    created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PracticeSession {
    id: i32,
    song_id: Option<i32>,
    duration_minutes: i32,
    notes: Option<String>,
    practiced_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PracticeStats {
    total_minutes: i64,
    session_count: usize,
    average_minutes: f64,
    /// Consecutive days with practice, ending today or yesterday
    current_streak: u32,
    last_seven_days: Vec<DayMinutes>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct DayMinutes {
    date: NaiveDate,
    minutes: i64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ExerciseProgress {
    id: i32,
    exercise_id: String,
    bpm: i32,
    completed: bool,
    recorded_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ExerciseSummary {
    exercise_id: String,
    best_bpm: i32,
    last_bpm: i32,
    attempts: usize,
    completed: bool,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct Cover {
    id: i32,
    user_id: i32,
    song_id: Option<i32>,
    title: String,
    #[schema(value_type = String, example = "video")]
    media_kind: MediaKind,
    url: String,
    created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct Band {
    id: i32,
    name: String,
    created_at: DateTime<Utc>,
    members: Vec<BandMember>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct BandMember {
    id: i32,
    owner: bool,
    user: User,
    joined_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct Setlist {
    id: i32,
    user_id: i32,
    band_id: Option<i32>,
    title: String,
    song_ids: Vec<i32>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SetlistDetails {
    setlist: Setlist,
    /// The songs in setlist order
    songs: Vec<Song>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct Jam {
    id: i32,
    host_id: i32,
    band_id: Option<i32>,
    title: String,
    created_at: DateTime<Utc>,
    ended_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct JamDetails {
    jam: Jam,
    participants: Vec<JamParticipant>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct JamParticipant {
    id: i32,
    user: User,
    joined_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct JamMessage {
    id: i32,
    jam_id: i32,
    user: User,
    content: String,
    created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct FriendRequest {
    id: i32,
    from: User,
    to: User,
    #[schema(value_type = String, example = "pending")]
    status: FriendRequestStatus,
    created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PendingRequests {
    incoming: Vec<FriendRequest>,
    outgoing: Vec<FriendRequest>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "kebab-case", tag = "type")]
pub enum FeedItem {
    /// A friend logged a practice session
    Practice {
        user: User,
        session: PracticeSession,
    },
    /// A friend uploaded a cover
    Cover { user: User, cover: Cover },
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PushKey {
    public_key: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct NotificationLog {
    id: i32,
    title: String,
    body: String,
    delivered: i32,
    failed: i32,
    created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct Recognition {
    title: String,
    artist: String,
    album: Option<String>,
    release_date: Option<String>,
    timecode: Option<String>,
    song_link: Option<String>,
    spotify_id: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RecognitionResult {
    /// Empty when nothing matched
    result: Option<Recognition>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TabResult {
    source: String,
    title: String,
    artist: Option<String>,
    url: String,
    has_chords: Option<bool>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ExternalTrack {
    id: String,
    title: String,
    artist: String,
    album: Option<String>,
    artwork: Option<String>,
    duration_ms: Option<u32>,
    url: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ExternalPlaylist {
    id: String,
    name: String,
    track_count: u32,
    artwork: Option<String>,
    url: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TrackSuggestion {
    title: String,
    artist: String,
    spotify_id: String,
    album: Option<String>,
    artwork: Option<String>,
    url: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TrackFeatures {
    track_id: String,
    tempo: f32,
    #[schema(example = "A")]
    key: Option<String>,
    #[schema(example = "minor")]
    mode: String,
    time_signature: i32,
    energy: f32,
    danceability: f32,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct BillingStatus {
    #[schema(value_type = String, example = "pro")]
    plan: Plan,
    #[schema(value_type = Option<String>, example = "active")]
    status: Option<SubscriptionStatus>,
    current_period_end: Option<DateTime<Utc>>,
    cancel_at_period_end: bool,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "kebab-case", tag = "type")]
pub enum PlanSelection {
    /// The existing subscription now carries the new plan
    Updated {
        #[schema(value_type = String, example = "band")]
        plan: Plan,
    },
    /// The client should redirect to this checkout page
    Checkout { url: String },
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RedirectUrl {
    pub url: String,
}

/// Helper trait to convert any type into a serialized version
pub trait ToSerialized<T>
where
    T: Serialize,
{
    fn to_serialized(&self) -> T;
}

impl<I, O> ToSerialized<Vec<O>> for Vec<I>
where
    I: ToSerialized<O>,
    O: Serialize,
{
    fn to_serialized(&self) -> Vec<O> {
        self.iter().map(|x| x.to_serialized()).collect()
    }
}

impl<I, O> ToSerialized<Option<O>> for Option<I>
where
    I: ToSerialized<O>,
    O: Serialize,
{
    fn to_serialized(&self) -> Option<O> {
        self.as_ref().map(|x| x.to_serialized())
    }
}

impl ToSerialized<User> for UserData {
    fn to_serialized(&self) -> User {
        User {
            id: self.id,
            username: self.username.clone(),
            display_name: self.display_name.clone(),
        }
    }
}

impl ToSerialized<LoginResult> for SessionData {
    fn to_serialized(&self) -> LoginResult {
        LoginResult {
            token: self.token.clone(),
            user: self.user.to_serialized(),
        }
    }
}

impl ToSerialized<Profile> for ProfileData {
    fn to_serialized(&self) -> Profile {
        Profile {
            user: self.user.to_serialized(),
            avatar_url: self.avatar_url.clone(),
            plan: self.plan,
            spotify_connected: self.spotify.is_some(),
        }
    }
}

impl ToSerialized<Song> for SongData {
    fn to_serialized(&self) -> Song {
        Song {
            id: self.id,
            title: self.title.clone(),
            artist: self.artist.clone(),
            status: self.status,
            difficulty: self.difficulty,
            tuning: self.tuning.clone(),
            tab_url: self.tab_url.clone(),
            spotify_id: self.spotify_id.clone(),
            notes: self.notes.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

impl ToSerialized<WishlistSong> for WishlistSongData {
    fn to_serialized(&self) -> WishlistSong {
        WishlistSong {
            id: self.id,
            title: self.title.clone(),
            artist: self.artist.clone(),
            spotify_id: self.spotify_id.clone(),
            notes: self.notes.clone(),
            created_at: self.created_at,
        }
    }
}

impl ToSerialized<Playlist> for PlaylistData {
    fn to_serialized(&self) -> Playlist {
        Playlist {
            id: self.id,
            name: self.name.clone(),
            description: self.description.clone(),
            song_ids: self.song_ids.clone(),
            created_at: self.created_at,
        }
    }
}

impl ToSerialized<PracticeSession> for PracticeSessionData {
    fn to_serialized(&self) -> PracticeSession {
        PracticeSession {
            id: self.id,
            song_id: self.song_id,
            duration_minutes: self.duration_minutes,
            notes: self.notes.clone(),
            practiced_at: self.practiced_at,
        }
    }
}

impl ToSerialized<PracticeStats> for CollabPracticeStats {
    fn to_serialized(&self) -> PracticeStats {
        PracticeStats {
            total_minutes: self.total_minutes,
            session_count: self.session_count,
            average_minutes: self.average_minutes,
            current_streak: self.current_streak,
            last_seven_days: self.last_seven_days.to_serialized(),
        }
    }
}

impl ToSerialized<DayMinutes> for CollabDayMinutes {
    fn to_serialized(&self) -> DayMinutes {
        DayMinutes {
            date: self.date,
            minutes: self.minutes,
        }
    }
}

impl ToSerialized<ExerciseProgress> for ExerciseProgressData {
    fn to_serialized(&self) -> ExerciseProgress {
        ExerciseProgress {
            id: self.id,
            exercise_id: self.exercise_id.clone(),
            bpm: self.bpm,
            completed: self.completed,
            recorded_at: self.recorded_at,
        }
    }
}

impl ToSerialized<ExerciseSummary> for CollabExerciseSummary {
    fn to_serialized(&self) -> ExerciseSummary {
        ExerciseSummary {
            exercise_id: self.exercise_id.clone(),
            best_bpm: self.best_bpm,
            last_bpm: self.last_bpm,
            attempts: self.attempts,
            completed: self.completed,
        }
    }
}

impl ToSerialized<Cover> for CoverData {
    fn to_serialized(&self) -> Cover {
        Cover {
            id: self.id,
            user_id: self.user_id,
            song_id: self.song_id,
            title: self.title.clone(),
            media_kind: self.media_kind,
            url: self.url.clone(),
            created_at: self.created_at,
        }
    }
}

impl ToSerialized<Band> for BandData {
    fn to_serialized(&self) -> Band {
        Band {
            id: self.id,
            name: self.name.clone(),
            created_at: self.created_at,
            members: self.members.to_serialized(),
        }
    }
}

impl ToSerialized<BandMember> for BandMemberData {
    fn to_serialized(&self) -> BandMember {
        BandMember {
            id: self.id,
            owner: self.owner,
            user: self.user.to_serialized(),
            joined_at: self.joined_at,
        }
    }
}

impl ToSerialized<Setlist> for SetlistData {
    fn to_serialized(&self) -> Setlist {
        Setlist {
            id: self.id,
            user_id: self.user_id,
            band_id: self.band_id,
            title: self.title.clone(),
            song_ids: self.song_ids.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

impl ToSerialized<SetlistDetails> for CollabSetlistDetails {
    fn to_serialized(&self) -> SetlistDetails {
        SetlistDetails {
            setlist: self.setlist.to_serialized(),
            songs: self.songs.to_serialized(),
        }
    }
}

impl ToSerialized<Jam> for JamData {
    fn to_serialized(&self) -> Jam {
        Jam {
            id: self.id,
            host_id: self.host_id,
            band_id: self.band_id,
            title: self.title.clone(),
            created_at: self.created_at,
            ended_at: self.ended_at,
        }
    }
}

impl ToSerialized<JamDetails> for CollabJamDetails {
    fn to_serialized(&self) -> JamDetails {
        JamDetails {
            jam: self.jam.to_serialized(),
            participants: self.participants.to_serialized(),
        }
    }
}

impl ToSerialized<JamParticipant> for JamParticipantData {
    fn to_serialized(&self) -> JamParticipant {
        JamParticipant {
            id: self.id,
            user: self.user.to_serialized(),
            joined_at: self.joined_at,
        }
    }
}

impl ToSerialized<JamMessage> for JamMessageData {
    fn to_serialized(&self) -> JamMessage {
        JamMessage {
            id: self.id,
            jam_id: self.jam_id,
            user: self.user.to_serialized(),
            content: self.content.clone(),
            created_at: self.created_at,
        }
    }
}

impl ToSerialized<FriendRequest> for FriendRequestData {
    fn to_serialized(&self) -> FriendRequest {
        FriendRequest {
            id: self.id,
            from: self.from.to_serialized(),
            to: self.to.to_serialized(),
            status: self.status,
            created_at: self.created_at,
        }
    }
}

impl ToSerialized<PendingRequests> for CollabPendingRequests {
    fn to_serialized(&self) -> PendingRequests {
        PendingRequests {
            incoming: self.incoming.to_serialized(),
            outgoing: self.outgoing.to_serialized(),
        }
    }
}

impl ToSerialized<FeedItem> for CollabFeedItem {
    fn to_serialized(&self) -> FeedItem {
        match self {
            CollabFeedItem::Practice { user, session } => FeedItem::Practice {
                user: user.to_serialized(),
                session: session.to_serialized(),
            },
            CollabFeedItem::Cover { user, cover } => FeedItem::Cover {
                user: user.to_serialized(),
                cover: cover.to_serialized(),
            },
        }
    }
}

impl ToSerialized<NotificationLog> for NotificationLogData {
    fn to_serialized(&self) -> NotificationLog {
        NotificationLog {
            id: self.id,
            title: self.title.clone(),
            body: self.body.clone(),
            delivered: self.delivered,
            failed: self.failed,
            created_at: self.created_at,
        }
    }
}

impl ToSerialized<Recognition> for RecognitionMatch {
    fn to_serialized(&self) -> Recognition {
        Recognition {
            title: self.title.clone(),
            artist: self.artist.clone(),
            album: self.album.clone(),
            release_date: self.release_date.clone(),
            timecode: self.timecode.clone(),
            song_link: self.song_link.clone(),
            spotify_id: self.spotify_id.clone(),
        }
    }
}

impl ToSerialized<TabResult> for CoreTabResult {
    fn to_serialized(&self) -> TabResult {
        TabResult {
            source: self.source.clone(),
            title: self.title.clone(),
            artist: self.artist.clone(),
            url: self.url.clone(),
            has_chords: self.has_chords,
        }
    }
}

impl ToSerialized<ExternalTrack> for CoreExternalTrack {
    fn to_serialized(&self) -> ExternalTrack {
        ExternalTrack {
            id: self.id.clone(),
            title: self.title.clone(),
            artist: self.artist.clone(),
            album: self.album.clone(),
            artwork: self.artwork.clone(),
            duration_ms: self.duration_ms,
            url: self.url.clone(),
        }
    }
}

impl ToSerialized<ExternalPlaylist> for CoreExternalPlaylist {
    fn to_serialized(&self) -> ExternalPlaylist {
        ExternalPlaylist {
            id: self.id.clone(),
            name: self.name.clone(),
            track_count: self.track_count,
            artwork: self.artwork.clone(),
            url: self.url.clone(),
        }
    }
}

impl ToSerialized<TrackSuggestion> for CollabTrackSuggestion {
    fn to_serialized(&self) -> TrackSuggestion {
        TrackSuggestion {
            title: self.title.clone(),
            artist: self.artist.clone(),
            spotify_id: self.spotify_id.clone(),
            album: self.album.clone(),
            artwork: self.artwork.clone(),
            url: self.url.clone(),
        }
    }
}

impl ToSerialized<TrackFeatures> for CollabTrackFeatures {
    fn to_serialized(&self) -> TrackFeatures {
        TrackFeatures {
            track_id: self.track_id.clone(),
            tempo: self.tempo,
            key: self.key.clone(),
            mode: self.mode.to_string(),
            time_signature: self.time_signature,
            energy: self.energy,
            danceability: self.danceability,
        }
    }
}

impl ToSerialized<BillingStatus> for CollabBillingStatus {
    fn to_serialized(&self) -> BillingStatus {
        BillingStatus {
            plan: self.plan,
            status: self.status,
            current_period_end: self.current_period_end,
            cancel_at_period_end: self.cancel_at_period_end,
        }
    }
}

impl ToSerialized<PlanSelection> for CollabPlanSelection {
    fn to_serialized(&self) -> PlanSelection {
        match self {
            CollabPlanSelection::Updated { plan } => PlanSelection::Updated { plan: *plan },
            CollabPlanSelection::Checkout { url } => PlanSelection::Checkout { url: url.clone() },
        }
    }
}

impl PushKey {
    pub fn new(public_key: &str) -> Self {
        Self {
            public_key: public_key.to_string(),
        }
    }
}

impl RecognitionResult {
    pub fn new(result: Option<RecognitionMatch>) -> Self {
        Self {
            result: result.to_serialized(),
        }
    }
}

/// The current user along with their profile
#[derive(Debug, Serialize, ToSchema)]
pub struct CurrentUser {
    #[serde(flatten)]
    user: User,
    profile: Profile,
}

impl CurrentUser {
    pub fn new(profile: &ProfileData) -> Self {
        Self {
            user: profile.user.to_serialized(),
            profile: profile.to_serialized(),
        }
    }
}
