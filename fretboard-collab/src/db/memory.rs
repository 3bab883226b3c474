use std::collections::{BTreeSet, HashMap};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use fretboard_core::Plan;
use parking_lot::Mutex;

use crate::{
    BandData, BandMemberData, BillingRefs, CoverData, Database, DatabaseError, DatabaseResult,
    ExerciseProgressData, FriendRequestData, FriendRequestStatus, JamData, JamMessageData,
    JamParticipantData, NewBand, NewBandMember, NewCover, NewExerciseProgress, NewJam,
    NewJamMessage, NewNotificationLog, NewPlaylist, NewPracticeSession, NewPushSubscription,
    NewSession, NewSetlist, NewSong, NewUser, NewWishlistSong, NotificationLogData, PlaylistData,
    PracticeSessionData, PrimaryKey, ProfileData, PushSubscriptionData, Result, SessionData,
    SetlistData, SongData, SpotifyLink, UpdatedProfile, UpdatedSong, UserData, WishlistSongData,
};

/// An in-memory database with the same semantics as [`crate::PgDatabase`], for tests
#[derive(Default)]
pub struct MemoryDatabase {
    state: Mutex<State>,
}

#[derive(Default)]
struct State {
    last_id: PrimaryKey,
    users: Vec<UserData>,
    sessions: Vec<SessionRecord>,
    profiles: HashMap<PrimaryKey, ProfileRecord>,
    songs: Vec<SongData>,
    wishlist: Vec<WishlistSongData>,
    playlists: Vec<PlaylistData>,
    practice_sessions: Vec<PracticeSessionData>,
    exercise_progress: Vec<ExerciseProgressData>,
    covers: Vec<CoverData>,
    bands: Vec<BandRecord>,
    members: Vec<MemberRecord>,
    setlists: Vec<SetlistData>,
    jams: Vec<JamData>,
    participants: Vec<ParticipantRecord>,
    messages: Vec<MessageRecord>,
    friend_requests: Vec<RequestRecord>,
    friendships: BTreeSet<(PrimaryKey, PrimaryKey)>,
    push_subscriptions: Vec<PushSubscriptionData>,
    notification_logs: Vec<NotificationLogData>,
}

struct SessionRecord {
    id: PrimaryKey,
    token: String,
    user_id: PrimaryKey,
    expires_at: DateTime<Utc>,
}

#[derive(Default, Clone)]
struct ProfileRecord {
    avatar_url: Option<String>,
    plan: Plan,
    stripe_customer_id: Option<String>,
    stripe_subscription_id: Option<String>,
    spotify: Option<SpotifyLink>,
}

struct BandRecord {
    id: PrimaryKey,
    name: String,
    created_at: DateTime<Utc>,
}

struct MemberRecord {
    id: PrimaryKey,
    band_id: PrimaryKey,
    user_id: PrimaryKey,
    owner: bool,
    joined_at: DateTime<Utc>,
}

struct ParticipantRecord {
    id: PrimaryKey,
    jam_id: PrimaryKey,
    user_id: PrimaryKey,
    joined_at: DateTime<Utc>,
}

struct MessageRecord {
    id: PrimaryKey,
    jam_id: PrimaryKey,
    user_id: PrimaryKey,
    content: String,
    created_at: DateTime<Utc>,
}

struct RequestRecord {
    id: PrimaryKey,
    from: PrimaryKey,
    to: PrimaryKey,
    status: FriendRequestStatus,
    created_at: DateTime<Utc>,
}

impl MemoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the plan of a user directly, handy for arranging tests
    pub fn set_plan(&self, user_id: PrimaryKey, plan: Plan) {
        let mut state = self.state.lock();
        state.profiles.entry(user_id).or_default().plan = plan;
    }
}

fn not_found(resource: &'static str, identifier: &'static str) -> DatabaseError {
    DatabaseError::NotFound {
        resource,
        identifier,
    }
}

fn ordered_pair(a: PrimaryKey, b: PrimaryKey) -> (PrimaryKey, PrimaryKey) {
    (a.min(b), a.max(b))
}

impl State {
    fn next_id(&mut self) -> PrimaryKey {
        self.last_id += 1;
        self.last_id
    }

    fn user(&self, user_id: PrimaryKey) -> Result<UserData> {
        self.users
            .iter()
            .find(|u| u.id == user_id)
            .cloned()
            .ok_or(not_found("user", "id"))
    }

    fn profile(&self, user_id: PrimaryKey) -> Result<ProfileData> {
        let user = self.user(user_id)?;
        let record = self
            .profiles
            .get(&user_id)
            .cloned()
            .ok_or(not_found("profile", "user_id"))?;

        Ok(ProfileData {
            user,
            avatar_url: record.avatar_url,
            plan: record.plan,
            stripe_customer_id: record.stripe_customer_id,
            stripe_subscription_id: record.stripe_subscription_id,
            spotify: record.spotify,
        })
    }

    fn profile_record(&mut self, user_id: PrimaryKey) -> Result<&mut ProfileRecord> {
        self.profiles
            .get_mut(&user_id)
            .ok_or(not_found("profile", "user_id"))
    }

    fn song_index(&self, user_id: PrimaryKey, song_id: PrimaryKey) -> Result<usize> {
        self.songs
            .iter()
            .position(|s| s.id == song_id && s.user_id == user_id)
            .ok_or(not_found("song", "id"))
    }

    fn member(&self, record: &MemberRecord) -> Result<BandMemberData> {
        Ok(BandMemberData {
            id: record.id,
            band_id: record.band_id,
            owner: record.owner,
            user: self.user(record.user_id)?,
            joined_at: record.joined_at,
        })
    }

    fn band(&self, band_id: PrimaryKey) -> Result<BandData> {
        let band = self
            .bands
            .iter()
            .find(|b| b.id == band_id)
            .ok_or(not_found("band", "id"))?;

        let mut members: Vec<&MemberRecord> = self
            .members
            .iter()
            .filter(|m| m.band_id == band_id)
            .collect();

        members.sort_by_key(|m| (!m.owner, m.joined_at, m.id));

        Ok(BandData {
            id: band.id,
            name: band.name.clone(),
            created_at: band.created_at,
            members: members
                .into_iter()
                .map(|m| self.member(m))
                .collect::<Result<_>>()?,
        })
    }

    fn is_band_member(&self, band_id: Option<PrimaryKey>, user_id: PrimaryKey) -> bool {
        band_id.is_some_and(|band_id| {
            self.members
                .iter()
                .any(|m| m.band_id == band_id && m.user_id == user_id)
        })
    }

    fn friend_request(&self, record: &RequestRecord) -> Result<FriendRequestData> {
        Ok(FriendRequestData {
            id: record.id,
            from: self.user(record.from)?,
            to: self.user(record.to)?,
            status: record.status,
            created_at: record.created_at,
        })
    }

    fn request_record(&mut self, request_id: PrimaryKey) -> Result<&mut RequestRecord> {
        self.friend_requests
            .iter_mut()
            .find(|r| r.id == request_id)
            .ok_or(not_found("friend request", "id"))
    }

    fn message(&self, record: &MessageRecord) -> Result<JamMessageData> {
        Ok(JamMessageData {
            id: record.id,
            jam_id: record.jam_id,
            user: self.user(record.user_id)?,
            content: record.content.clone(),
            created_at: record.created_at,
        })
    }
}

#[async_trait]
impl Database for MemoryDatabase {
    async fn user_by_id(&self, user_id: PrimaryKey) -> Result<UserData> {
        self.state.lock().user(user_id)
    }

    async fn user_by_username(&self, username: &str) -> Result<UserData> {
        self.state
            .lock()
            .users
            .iter()
            .find(|u| u.username == username)
            .cloned()
            .ok_or(not_found("user", "username"))
    }

    async fn create_user(&self, new_user: NewUser) -> Result<UserData> {
        self.user_by_username(&new_user.username)
            .await
            .conflict_or_ok("user", "username", &new_user.username)?;

        let mut state = self.state.lock();
        let user = UserData {
            id: state.next_id(),
            username: new_user.username,
            password: new_user.password,
            display_name: new_user.display_name,
            created_at: Utc::now(),
        };

        state.profiles.insert(user.id, ProfileRecord::default());
        state.users.push(user.clone());

        Ok(user)
    }

    async fn session_by_token(&self, token: &str) -> Result<SessionData> {
        let state = self.state.lock();
        let session = state
            .sessions
            .iter()
            .find(|s| s.token == token)
            .ok_or(not_found("session", "token"))?;

        Ok(SessionData {
            id: session.id,
            token: session.token.clone(),
            expires_at: session.expires_at,
            user: state.user(session.user_id)?,
        })
    }

    async fn create_session(&self, new_session: NewSession) -> Result<SessionData> {
        self.session_by_token(&new_session.token)
            .await
            .conflict_or_ok("session", "token", &new_session.token)?;

        {
            let mut state = self.state.lock();
            state.user(new_session.user_id)?;

            let id = state.next_id();
            state.sessions.push(SessionRecord {
                id,
                token: new_session.token.clone(),
                user_id: new_session.user_id,
                expires_at: new_session.expires_at,
            });
        }

        self.session_by_token(&new_session.token).await
    }

    async fn delete_session_by_token(&self, token: &str) -> Result<()> {
        let mut state = self.state.lock();
        let index = state
            .sessions
            .iter()
            .position(|s| s.token == token)
            .ok_or(not_found("session", "token"))?;

        state.sessions.remove(index);
        Ok(())
    }

    async fn clear_expired_sessions(&self) -> Result<()> {
        let now = Utc::now();
        self.state.lock().sessions.retain(|s| s.expires_at >= now);
        Ok(())
    }

    async fn profile_by_user_id(&self, user_id: PrimaryKey) -> Result<ProfileData> {
        self.state.lock().profile(user_id)
    }

    async fn profile_by_customer_id(&self, customer_id: &str) -> Result<ProfileData> {
        let state = self.state.lock();
        let user_id = state
            .profiles
            .iter()
            .find(|(_, p)| p.stripe_customer_id.as_deref() == Some(customer_id))
            .map(|(id, _)| *id)
            .ok_or(not_found("profile", "stripe_customer_id"))?;

        state.profile(user_id)
    }

    async fn update_profile(&self, updated: UpdatedProfile) -> Result<ProfileData> {
        let mut state = self.state.lock();

        if let Some(avatar_url) = updated.avatar_url {
            state.profile_record(updated.user_id)?.avatar_url = Some(avatar_url);
        }

        if let Some(display_name) = updated.display_name {
            let user = state
                .users
                .iter_mut()
                .find(|u| u.id == updated.user_id)
                .ok_or(not_found("user", "id"))?;

            user.display_name = display_name;
        }

        state.profile(updated.user_id)
    }

    async fn update_plan(&self, user_id: PrimaryKey, plan: Plan) -> Result<()> {
        self.state.lock().profile_record(user_id)?.plan = plan;
        Ok(())
    }

    async fn update_billing(&self, user_id: PrimaryKey, billing: BillingRefs) -> Result<()> {
        let mut state = self.state.lock();
        let record = state.profile_record(user_id)?;

        if let Some(customer_id) = billing.customer_id {
            record.stripe_customer_id = Some(customer_id);
        }
        if let Some(subscription_id) = billing.subscription_id {
            record.stripe_subscription_id = Some(subscription_id);
        }

        Ok(())
    }

    async fn set_spotify_link(
        &self,
        user_id: PrimaryKey,
        link: Option<SpotifyLink>,
    ) -> Result<()> {
        self.state.lock().profile_record(user_id)?.spotify = link;
        Ok(())
    }

    async fn list_songs(&self, user_id: PrimaryKey) -> Result<Vec<SongData>> {
        let state = self.state.lock();
        let mut songs: Vec<SongData> = state
            .songs
            .iter()
            .filter(|s| s.user_id == user_id)
            .cloned()
            .collect();

        songs.sort_by(|a, b| (&a.artist, &a.title).cmp(&(&b.artist, &b.title)));
        Ok(songs)
    }

    async fn song_by_id(&self, user_id: PrimaryKey, song_id: PrimaryKey) -> Result<SongData> {
        let state = self.state.lock();
        let index = state.song_index(user_id, song_id)?;
        Ok(state.songs[index].clone())
    }

    async fn create_song(&self, new_song: NewSong) -> Result<SongData> {
        let mut state = self.state.lock();
        let now = Utc::now();
        let song = SongData {
            id: state.next_id(),
            user_id: new_song.user_id,
            title: new_song.title,
            artist: new_song.artist,
            status: new_song.status,
            difficulty: new_song.difficulty,
            tuning: new_song.tuning,
            tab_url: new_song.tab_url,
            spotify_id: new_song.spotify_id,
            notes: new_song.notes,
            created_at: now,
            updated_at: now,
        };

        state.songs.push(song.clone());
        Ok(song)
    }

    async fn update_song(&self, updated_song: UpdatedSong) -> Result<SongData> {
        let mut state = self.state.lock();
        let index = state.song_index(updated_song.user_id, updated_song.id)?;
        let song = &mut state.songs[index];

        if let Some(title) = updated_song.title {
            song.title = title;
        }
        if let Some(artist) = updated_song.artist {
            song.artist = artist;
        }
        if let Some(status) = updated_song.status {
            song.status = status;
        }
        if updated_song.difficulty.is_some() {
            song.difficulty = updated_song.difficulty;
        }
        if updated_song.tuning.is_some() {
            song.tuning = updated_song.tuning;
        }
        if updated_song.tab_url.is_some() {
            song.tab_url = updated_song.tab_url;
        }
        if updated_song.notes.is_some() {
            song.notes = updated_song.notes;
        }
        song.updated_at = Utc::now();

        Ok(song.clone())
    }

    async fn delete_song(&self, user_id: PrimaryKey, song_id: PrimaryKey) -> Result<()> {
        let mut state = self.state.lock();
        let index = state.song_index(user_id, song_id)?;
        state.songs.remove(index);

        // Mirrors the foreign keys
        for playlist in state.playlists.iter_mut() {
            playlist.song_ids.retain(|id| *id != song_id);
        }
        for setlist in state.setlists.iter_mut() {
            setlist.song_ids.retain(|id| *id != song_id);
        }
        for session in state.practice_sessions.iter_mut() {
            if session.song_id == Some(song_id) {
                session.song_id = None;
            }
        }
        for cover in state.covers.iter_mut() {
            if cover.song_id == Some(song_id) {
                cover.song_id = None;
            }
        }

        Ok(())
    }

    async fn list_wishlist(&self, user_id: PrimaryKey) -> Result<Vec<WishlistSongData>> {
        let state = self.state.lock();
        Ok(state
            .wishlist
            .iter()
            .rev()
            .filter(|w| w.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn wishlist_song_by_id(
        &self,
        user_id: PrimaryKey,
        wishlist_id: PrimaryKey,
    ) -> Result<WishlistSongData> {
        self.state
            .lock()
            .wishlist
            .iter()
            .find(|w| w.id == wishlist_id && w.user_id == user_id)
            .cloned()
            .ok_or(not_found("wishlist song", "id"))
    }

    async fn create_wishlist_song(&self, new_song: NewWishlistSong) -> Result<WishlistSongData> {
        let mut state = self.state.lock();
        let song = WishlistSongData {
            id: state.next_id(),
            user_id: new_song.user_id,
            title: new_song.title,
            artist: new_song.artist,
            spotify_id: new_song.spotify_id,
            notes: new_song.notes,
            created_at: Utc::now(),
        };

        state.wishlist.push(song.clone());
        Ok(song)
    }

    async fn delete_wishlist_song(
        &self,
        user_id: PrimaryKey,
        wishlist_id: PrimaryKey,
    ) -> Result<()> {
        let mut state = self.state.lock();
        let index = state
            .wishlist
            .iter()
            .position(|w| w.id == wishlist_id && w.user_id == user_id)
            .ok_or(not_found("wishlist song", "id"))?;

        state.wishlist.remove(index);
        Ok(())
    }

    async fn list_playlists(&self, user_id: PrimaryKey) -> Result<Vec<PlaylistData>> {
        let state = self.state.lock();
        let mut playlists: Vec<PlaylistData> = state
            .playlists
            .iter()
            .filter(|p| p.user_id == user_id)
            .cloned()
            .collect();

        playlists.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(playlists)
    }

    async fn playlist_by_id(
        &self,
        user_id: PrimaryKey,
        playlist_id: PrimaryKey,
    ) -> Result<PlaylistData> {
        self.state
            .lock()
            .playlists
            .iter()
            .find(|p| p.id == playlist_id && p.user_id == user_id)
            .cloned()
            .ok_or(not_found("playlist", "id"))
    }

    async fn create_playlist(&self, new_playlist: NewPlaylist) -> Result<PlaylistData> {
        let mut state = self.state.lock();
        let playlist = PlaylistData {
            id: state.next_id(),
            user_id: new_playlist.user_id,
            name: new_playlist.name,
            description: new_playlist.description,
            song_ids: vec![],
            created_at: Utc::now(),
        };

        state.playlists.push(playlist.clone());
        Ok(playlist)
    }

    async fn delete_playlist(&self, user_id: PrimaryKey, playlist_id: PrimaryKey) -> Result<()> {
        let mut state = self.state.lock();
        let index = state
            .playlists
            .iter()
            .position(|p| p.id == playlist_id && p.user_id == user_id)
            .ok_or(not_found("playlist", "id"))?;

        state.playlists.remove(index);
        Ok(())
    }

    async fn add_playlist_song(&self, playlist_id: PrimaryKey, song_id: PrimaryKey) -> Result<()> {
        let mut state = self.state.lock();
        let playlist = state
            .playlists
            .iter_mut()
            .find(|p| p.id == playlist_id)
            .ok_or(not_found("playlist", "id"))?;

        if !playlist.song_ids.contains(&song_id) {
            playlist.song_ids.push(song_id);
        }

        Ok(())
    }

    async fn remove_playlist_song(
        &self,
        playlist_id: PrimaryKey,
        song_id: PrimaryKey,
    ) -> Result<()> {
        let mut state = self.state.lock();
        let playlist = state
            .playlists
            .iter_mut()
            .find(|p| p.id == playlist_id)
            .ok_or(not_found("playlist", "id"))?;

        let index = playlist
            .song_ids
            .iter()
            .position(|id| *id == song_id)
            .ok_or(not_found("playlist song", "playlist_id:song_id"))?;

        playlist.song_ids.remove(index);
        Ok(())
    }

    async fn list_practice_sessions(
        &self,
        user_id: PrimaryKey,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<PracticeSessionData>> {
        let state = self.state.lock();
        let mut sessions: Vec<PracticeSessionData> = state
            .practice_sessions
            .iter()
            .filter(|s| s.user_id == user_id)
            .filter(|s| since.map_or(true, |since| s.practiced_at >= since))
            .cloned()
            .collect();

        sessions.sort_by(|a, b| (b.practiced_at, b.id).cmp(&(a.practiced_at, a.id)));
        Ok(sessions)
    }

    async fn create_practice_session(
        &self,
        new_session: NewPracticeSession,
    ) -> Result<PracticeSessionData> {
        let mut state = self.state.lock();
        let session = PracticeSessionData {
            id: state.next_id(),
            user_id: new_session.user_id,
            song_id: new_session.song_id,
            duration_minutes: new_session.duration_minutes,
            notes: new_session.notes,
            practiced_at: new_session.practiced_at,
        };

        state.practice_sessions.push(session.clone());
        Ok(session)
    }

    async fn practice_sessions_for_users(
        &self,
        user_ids: &[PrimaryKey],
        limit: i64,
    ) -> Result<Vec<PracticeSessionData>> {
        let state = self.state.lock();
        let mut sessions: Vec<PracticeSessionData> = state
            .practice_sessions
            .iter()
            .filter(|s| user_ids.contains(&s.user_id))
            .cloned()
            .collect();

        sessions.sort_by(|a, b| (b.practiced_at, b.id).cmp(&(a.practiced_at, a.id)));
        sessions.truncate(limit.max(0) as usize);
        Ok(sessions)
    }

    async fn list_exercise_progress(
        &self,
        user_id: PrimaryKey,
        exercise_id: Option<&str>,
    ) -> Result<Vec<ExerciseProgressData>> {
        let state = self.state.lock();
        Ok(state
            .exercise_progress
            .iter()
            .filter(|p| p.user_id == user_id)
            .filter(|p| exercise_id.map_or(true, |id| p.exercise_id == id))
            .cloned()
            .collect())
    }

    async fn create_exercise_progress(
        &self,
        new_progress: NewExerciseProgress,
    ) -> Result<ExerciseProgressData> {
        let mut state = self.state.lock();
        let progress = ExerciseProgressData {
            id: state.next_id(),
            user_id: new_progress.user_id,
            exercise_id: new_progress.exercise_id,
            bpm: new_progress.bpm,
            completed: new_progress.completed,
            recorded_at: Utc::now(),
        };

        state.exercise_progress.push(progress.clone());
        Ok(progress)
    }

    async fn list_covers(&self, user_id: PrimaryKey) -> Result<Vec<CoverData>> {
        self.covers_for_users(&[user_id], i64::MAX).await
    }

    async fn cover_by_id(&self, cover_id: PrimaryKey) -> Result<CoverData> {
        self.state
            .lock()
            .covers
            .iter()
            .find(|c| c.id == cover_id)
            .cloned()
            .ok_or(not_found("cover", "id"))
    }

    async fn create_cover(&self, new_cover: NewCover) -> Result<CoverData> {
        let mut state = self.state.lock();
        let cover = CoverData {
            id: state.next_id(),
            user_id: new_cover.user_id,
            song_id: new_cover.song_id,
            title: new_cover.title,
            media_kind: new_cover.media_kind,
            url: new_cover.url,
            storage_key: new_cover.storage_key,
            created_at: Utc::now(),
        };

        state.covers.push(cover.clone());
        Ok(cover)
    }

    async fn delete_cover(&self, cover_id: PrimaryKey) -> Result<()> {
        let mut state = self.state.lock();
        let index = state
            .covers
            .iter()
            .position(|c| c.id == cover_id)
            .ok_or(not_found("cover", "id"))?;

        state.covers.remove(index);
        Ok(())
    }

    async fn covers_for_users(
        &self,
        user_ids: &[PrimaryKey],
        limit: i64,
    ) -> Result<Vec<CoverData>> {
        let state = self.state.lock();
        let mut covers: Vec<CoverData> = state
            .covers
            .iter()
            .filter(|c| user_ids.contains(&c.user_id))
            .cloned()
            .collect();

        covers.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));
        covers.truncate(limit.max(0) as usize);
        Ok(covers)
    }

    async fn list_bands_for_user(&self, user_id: PrimaryKey) -> Result<Vec<BandData>> {
        let state = self.state.lock();
        let mut bands = state
            .members
            .iter()
            .filter(|m| m.user_id == user_id)
            .map(|m| state.band(m.band_id))
            .collect::<Result<Vec<_>>>()?;

        bands.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(bands)
    }

    async fn band_by_id(&self, band_id: PrimaryKey) -> Result<BandData> {
        self.state.lock().band(band_id)
    }

    async fn create_band(&self, new_band: NewBand) -> Result<BandData> {
        let mut state = self.state.lock();
        state.user(new_band.user_id)?;

        let now = Utc::now();
        let band_id = state.next_id();
        let member_id = state.next_id();

        state.bands.push(BandRecord {
            id: band_id,
            name: new_band.name,
            created_at: now,
        });
        state.members.push(MemberRecord {
            id: member_id,
            band_id,
            user_id: new_band.user_id,
            owner: true,
            joined_at: now,
        });

        state.band(band_id)
    }

    async fn create_band_member(&self, new_member: NewBandMember) -> Result<BandMemberData> {
        let mut state = self.state.lock();
        state.band(new_member.band_id)?;
        state.user(new_member.user_id)?;

        let exists = state
            .members
            .iter()
            .any(|m| m.band_id == new_member.band_id && m.user_id == new_member.user_id);

        if exists {
            return Err(DatabaseError::Conflict {
                resource: "band member",
                field: "band:user",
                value: format!("{}:{}", new_member.band_id, new_member.user_id),
            });
        }

        let record = MemberRecord {
            id: state.next_id(),
            band_id: new_member.band_id,
            user_id: new_member.user_id,
            owner: new_member.owner,
            joined_at: Utc::now(),
        };

        let member = state.member(&record)?;
        state.members.push(record);

        Ok(member)
    }

    async fn delete_band_member(&self, band_id: PrimaryKey, user_id: PrimaryKey) -> Result<()> {
        let mut state = self.state.lock();
        let index = state
            .members
            .iter()
            .position(|m| m.band_id == band_id && m.user_id == user_id)
            .ok_or(not_found("band member", "band_id:user_id"))?;

        state.members.remove(index);
        Ok(())
    }

    async fn delete_band(&self, band_id: PrimaryKey) -> Result<()> {
        let mut state = self.state.lock();
        let index = state
            .bands
            .iter()
            .position(|b| b.id == band_id)
            .ok_or(not_found("band", "id"))?;

        state.bands.remove(index);
        state.members.retain(|m| m.band_id != band_id);
        state.setlists.retain(|s| s.band_id != Some(band_id));

        let removed_jams: Vec<PrimaryKey> = state
            .jams
            .iter()
            .filter(|j| j.band_id == Some(band_id))
            .map(|j| j.id)
            .collect();

        state.jams.retain(|j| j.band_id != Some(band_id));
        state
            .participants
            .retain(|p| !removed_jams.contains(&p.jam_id));
        state.messages.retain(|m| !removed_jams.contains(&m.jam_id));

        Ok(())
    }

    async fn list_setlists(&self, user_id: PrimaryKey) -> Result<Vec<SetlistData>> {
        let state = self.state.lock();
        let mut setlists: Vec<SetlistData> = state
            .setlists
            .iter()
            .filter(|s| s.user_id == user_id || state.is_band_member(s.band_id, user_id))
            .cloned()
            .collect();

        setlists.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(setlists)
    }

    async fn setlist_by_id(&self, setlist_id: PrimaryKey) -> Result<SetlistData> {
        self.state
            .lock()
            .setlists
            .iter()
            .find(|s| s.id == setlist_id)
            .cloned()
            .ok_or(not_found("setlist", "id"))
    }

    async fn create_setlist(&self, new_setlist: NewSetlist) -> Result<SetlistData> {
        let mut state = self.state.lock();
        let now = Utc::now();
        let setlist = SetlistData {
            id: state.next_id(),
            user_id: new_setlist.user_id,
            band_id: new_setlist.band_id,
            title: new_setlist.title,
            song_ids: vec![],
            created_at: now,
            updated_at: now,
        };

        state.setlists.push(setlist.clone());
        Ok(setlist)
    }

    async fn rename_setlist(&self, setlist_id: PrimaryKey, title: &str) -> Result<SetlistData> {
        let mut state = self.state.lock();
        let setlist = state
            .setlists
            .iter_mut()
            .find(|s| s.id == setlist_id)
            .ok_or(not_found("setlist", "id"))?;

        setlist.title = title.to_string();
        setlist.updated_at = Utc::now();

        Ok(setlist.clone())
    }

    async fn set_setlist_songs(
        &self,
        setlist_id: PrimaryKey,
        song_ids: &[PrimaryKey],
    ) -> Result<SetlistData> {
        let mut state = self.state.lock();
        let setlist = state
            .setlists
            .iter_mut()
            .find(|s| s.id == setlist_id)
            .ok_or(not_found("setlist", "id"))?;

        setlist.song_ids = song_ids.to_vec();
        setlist.updated_at = Utc::now();

        Ok(setlist.clone())
    }

    async fn delete_setlist(&self, setlist_id: PrimaryKey) -> Result<()> {
        let mut state = self.state.lock();
        let index = state
            .setlists
            .iter()
            .position(|s| s.id == setlist_id)
            .ok_or(not_found("setlist", "id"))?;

        state.setlists.remove(index);
        Ok(())
    }

    async fn list_active_jams(&self, user_id: PrimaryKey) -> Result<Vec<JamData>> {
        let state = self.state.lock();
        let mut jams: Vec<JamData> = state
            .jams
            .iter()
            .filter(|j| j.is_active())
            .filter(|j| {
                j.host_id == user_id
                    || state
                        .participants
                        .iter()
                        .any(|p| p.jam_id == j.id && p.user_id == user_id)
                    || state.is_band_member(j.band_id, user_id)
            })
            .cloned()
            .collect();

        jams.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));
        Ok(jams)
    }

    async fn jam_by_id(&self, jam_id: PrimaryKey) -> Result<JamData> {
        self.state
            .lock()
            .jams
            .iter()
            .find(|j| j.id == jam_id)
            .cloned()
            .ok_or(not_found("jam", "id"))
    }

    async fn create_jam(&self, new_jam: NewJam) -> Result<JamData> {
        let mut state = self.state.lock();
        let jam = JamData {
            id: state.next_id(),
            host_id: new_jam.host_id,
            band_id: new_jam.band_id,
            title: new_jam.title,
            created_at: Utc::now(),
            ended_at: None,
        };

        state.jams.push(jam.clone());
        Ok(jam)
    }

    async fn end_jam(&self, jam_id: PrimaryKey) -> Result<JamData> {
        let mut state = self.state.lock();
        let jam = state
            .jams
            .iter_mut()
            .find(|j| j.id == jam_id)
            .ok_or(not_found("jam", "id"))?;

        jam.ended_at.get_or_insert_with(Utc::now);
        Ok(jam.clone())
    }

    async fn join_jam(&self, jam_id: PrimaryKey, user_id: PrimaryKey) -> Result<bool> {
        let mut state = self.state.lock();

        let joined = state
            .participants
            .iter()
            .any(|p| p.jam_id == jam_id && p.user_id == user_id);

        if joined {
            return Ok(false);
        }

        let id = state.next_id();
        state.participants.push(ParticipantRecord {
            id,
            jam_id,
            user_id,
            joined_at: Utc::now(),
        });

        Ok(true)
    }

    async fn leave_jam(&self, jam_id: PrimaryKey, user_id: PrimaryKey) -> Result<()> {
        let mut state = self.state.lock();
        let index = state
            .participants
            .iter()
            .position(|p| p.jam_id == jam_id && p.user_id == user_id)
            .ok_or(not_found("jam participant", "jam_id:user_id"))?;

        state.participants.remove(index);
        Ok(())
    }

    async fn jam_participants(&self, jam_id: PrimaryKey) -> Result<Vec<JamParticipantData>> {
        let state = self.state.lock();
        state
            .participants
            .iter()
            .filter(|p| p.jam_id == jam_id)
            .map(|p| {
                Ok(JamParticipantData {
                    id: p.id,
                    jam_id: p.jam_id,
                    user: state.user(p.user_id)?,
                    joined_at: p.joined_at,
                })
            })
            .collect()
    }

    async fn jam_messages(&self, jam_id: PrimaryKey, limit: i64) -> Result<Vec<JamMessageData>> {
        let state = self.state.lock();
        let messages: Vec<&MessageRecord> = state
            .messages
            .iter()
            .filter(|m| m.jam_id == jam_id)
            .collect();

        let skip = messages.len().saturating_sub(limit.max(0) as usize);

        messages
            .into_iter()
            .skip(skip)
            .map(|m| state.message(m))
            .collect()
    }

    async fn create_jam_message(&self, new_message: NewJamMessage) -> Result<JamMessageData> {
        let mut state = self.state.lock();
        let record = MessageRecord {
            id: state.next_id(),
            jam_id: new_message.jam_id,
            user_id: new_message.user_id,
            content: new_message.content,
            created_at: Utc::now(),
        };

        let message = state.message(&record)?;
        state.messages.push(record);

        Ok(message)
    }

    async fn friends_of(&self, user_id: PrimaryKey) -> Result<Vec<UserData>> {
        let state = self.state.lock();
        let mut friends = state
            .friendships
            .iter()
            .filter_map(|(a, b)| match user_id {
                id if id == *a => Some(*b),
                id if id == *b => Some(*a),
                _ => None,
            })
            .map(|id| state.user(id))
            .collect::<Result<Vec<_>>>()?;

        friends.sort_by(|a, b| a.display_name.cmp(&b.display_name));
        Ok(friends)
    }

    async fn are_friends(&self, user_id: PrimaryKey, other_id: PrimaryKey) -> Result<bool> {
        let pair = ordered_pair(user_id, other_id);
        Ok(self.state.lock().friendships.contains(&pair))
    }

    async fn delete_friendship(&self, user_id: PrimaryKey, other_id: PrimaryKey) -> Result<()> {
        let pair = ordered_pair(user_id, other_id);

        if self.state.lock().friendships.remove(&pair) {
            Ok(())
        } else {
            Err(not_found("friendship", "user:user"))
        }
    }

    async fn friend_request_by_id(&self, request_id: PrimaryKey) -> Result<FriendRequestData> {
        let state = self.state.lock();
        let record = state
            .friend_requests
            .iter()
            .find(|r| r.id == request_id)
            .ok_or(not_found("friend request", "id"))?;

        state.friend_request(record)
    }

    async fn pending_request_between(
        &self,
        user_id: PrimaryKey,
        other_id: PrimaryKey,
    ) -> Result<FriendRequestData> {
        let state = self.state.lock();
        let record = state
            .friend_requests
            .iter()
            .filter(|r| r.status == FriendRequestStatus::Pending)
            .find(|r| {
                (r.from == user_id && r.to == other_id) || (r.from == other_id && r.to == user_id)
            })
            .ok_or(not_found("friend request", "user:user"))?;

        state.friend_request(record)
    }

    async fn pending_friend_requests(&self, user_id: PrimaryKey) -> Result<Vec<FriendRequestData>> {
        let state = self.state.lock();
        state
            .friend_requests
            .iter()
            .rev()
            .filter(|r| r.status == FriendRequestStatus::Pending)
            .filter(|r| r.from == user_id || r.to == user_id)
            .map(|r| state.friend_request(r))
            .collect()
    }

    async fn create_friend_request(
        &self,
        from_id: PrimaryKey,
        to_id: PrimaryKey,
    ) -> Result<FriendRequestData> {
        self.pending_request_between(from_id, to_id)
            .await
            .conflict_or_ok("friend request", "user:user", &format!("{from_id}:{to_id}"))?;

        let mut state = self.state.lock();
        let record = RequestRecord {
            id: state.next_id(),
            from: from_id,
            to: to_id,
            status: FriendRequestStatus::Pending,
            created_at: Utc::now(),
        };

        let request = state.friend_request(&record)?;
        state.friend_requests.push(record);

        Ok(request)
    }

    async fn accept_friend_request(&self, request_id: PrimaryKey) -> Result<FriendRequestData> {
        let mut state = self.state.lock();
        let record = state.request_record(request_id)?;
        record.status = FriendRequestStatus::Accepted;

        let pair = ordered_pair(record.from, record.to);
        state.friendships.insert(pair);

        let record = state.request_record(request_id)?;
        let (from, to, created_at) = (record.from, record.to, record.created_at);

        Ok(FriendRequestData {
            id: request_id,
            from: state.user(from)?,
            to: state.user(to)?,
            status: FriendRequestStatus::Accepted,
            created_at,
        })
    }

    async fn decline_friend_request(&self, request_id: PrimaryKey) -> Result<FriendRequestData> {
        let mut state = self.state.lock();
        let record = state.request_record(request_id)?;
        record.status = FriendRequestStatus::Declined;

        let (from, to, created_at) = (record.from, record.to, record.created_at);

        Ok(FriendRequestData {
            id: request_id,
            from: state.user(from)?,
            to: state.user(to)?,
            status: FriendRequestStatus::Declined,
            created_at,
        })
    }

    async fn upsert_push_subscription(
        &self,
        new_subscription: NewPushSubscription,
    ) -> Result<PushSubscriptionData> {
        let mut state = self.state.lock();

        let existing = state
            .push_subscriptions
            .iter_mut()
            .find(|s| s.endpoint == new_subscription.endpoint);

        if let Some(subscription) = existing {
            subscription.user_id = new_subscription.user_id;
            subscription.p256dh = new_subscription.p256dh;
            subscription.auth = new_subscription.auth;

            return Ok(subscription.clone());
        }

        let subscription = PushSubscriptionData {
            id: state.next_id(),
            user_id: new_subscription.user_id,
            endpoint: new_subscription.endpoint,
            p256dh: new_subscription.p256dh,
            auth: new_subscription.auth,
            created_at: Utc::now(),
        };

        state.push_subscriptions.push(subscription.clone());
        Ok(subscription)
    }

    async fn push_subscriptions_for(
        &self,
        user_id: PrimaryKey,
    ) -> Result<Vec<PushSubscriptionData>> {
        Ok(self
            .state
            .lock()
            .push_subscriptions
            .iter()
            .filter(|s| s.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn delete_push_subscription(&self, endpoint: &str) -> Result<()> {
        let mut state = self.state.lock();
        let index = state
            .push_subscriptions
            .iter()
            .position(|s| s.endpoint == endpoint)
            .ok_or(not_found("push subscription", "endpoint"))?;

        state.push_subscriptions.remove(index);
        Ok(())
    }

    async fn create_notification_log(
        &self,
        new_log: NewNotificationLog,
    ) -> Result<NotificationLogData> {
        let mut state = self.state.lock();
        let log = NotificationLogData {
            id: state.next_id(),
            user_id: new_log.user_id,
            title: new_log.title,
            body: new_log.body,
            delivered: new_log.delivered,
            failed: new_log.failed,
            created_at: Utc::now(),
        };

        state.notification_logs.push(log.clone());
        Ok(log)
    }

    async fn list_notification_logs(
        &self,
        user_id: PrimaryKey,
        limit: i64,
    ) -> Result<Vec<NotificationLogData>> {
        Ok(self
            .state
            .lock()
            .notification_logs
            .iter()
            .rev()
            .filter(|l| l.user_id == user_id)
            .take(limit.max(0) as usize)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn user(db: &MemoryDatabase, username: &str) -> UserData {
        db.create_user(NewUser {
            username: username.to_string(),
            password: "hash".to_string(),
            display_name: username.to_string(),
        })
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn usernames_are_unique() {
        let db = MemoryDatabase::new();
        user(&db, "django").await;

        let result = db
            .create_user(NewUser {
                username: "django".to_string(),
                password: "hash".to_string(),
                display_name: "Other".to_string(),
            })
            .await;

        assert!(matches!(result, Err(DatabaseError::Conflict { .. })));
    }

    #[tokio::test]
    async fn new_users_start_on_the_free_plan() {
        let db = MemoryDatabase::new();
        let user = user(&db, "django").await;

        let profile = db.profile_by_user_id(user.id).await.unwrap();
        assert_eq!(profile.plan, Plan::Free);
        assert!(profile.spotify.is_none());
    }

    #[tokio::test]
    async fn push_subscriptions_upsert_by_endpoint() {
        let db = MemoryDatabase::new();
        let first = user(&db, "first").await;
        let second = user(&db, "second").await;

        let subscribe = |user_id, p256dh: &str| NewPushSubscription {
            user_id,
            endpoint: "https://push.example/device".to_string(),
            p256dh: p256dh.to_string(),
            auth: "auth".to_string(),
        };

        let original = db
            .upsert_push_subscription(subscribe(first.id, "old"))
            .await
            .unwrap();
        let updated = db
            .upsert_push_subscription(subscribe(second.id, "new"))
            .await
            .unwrap();

        assert_eq!(original.id, updated.id);
        assert_eq!(updated.p256dh, "new");
        assert!(db.push_subscriptions_for(first.id).await.unwrap().is_empty());
        assert_eq!(db.push_subscriptions_for(second.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn joining_a_jam_twice_keeps_one_participant() {
        let db = MemoryDatabase::new();
        let host = user(&db, "host").await;

        let jam = db
            .create_jam(NewJam {
                host_id: host.id,
                band_id: None,
                title: "Blues in A".to_string(),
            })
            .await
            .unwrap();

        assert!(db.join_jam(jam.id, host.id).await.unwrap());
        assert!(!db.join_jam(jam.id, host.id).await.unwrap());
        assert_eq!(db.jam_participants(jam.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn accepted_requests_become_friendships() {
        let db = MemoryDatabase::new();
        let a = user(&db, "a").await;
        let b = user(&db, "b").await;

        let request = db.create_friend_request(b.id, a.id).await.unwrap();
        let duplicate = db.create_friend_request(a.id, b.id).await;
        assert!(matches!(duplicate, Err(DatabaseError::Conflict { .. })));

        db.accept_friend_request(request.id).await.unwrap();

        assert!(db.are_friends(a.id, b.id).await.unwrap());
        assert!(db.are_friends(b.id, a.id).await.unwrap());
        assert_eq!(db.friends_of(a.id).await.unwrap()[0].id, b.id);
        assert!(db.pending_friend_requests(a.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn jam_messages_keep_the_latest_in_order() {
        let db = MemoryDatabase::new();
        let host = user(&db, "host").await;
        let jam = db
            .create_jam(NewJam {
                host_id: host.id,
                band_id: None,
                title: "Jam".to_string(),
            })
            .await
            .unwrap();

        for content in ["one", "two", "three"] {
            db.create_jam_message(NewJamMessage {
                jam_id: jam.id,
                user_id: host.id,
                content: content.to_string(),
            })
            .await
            .unwrap();
        }

        let messages = db.jam_messages(jam.id, 2).await.unwrap();
        let contents: Vec<_> = messages.iter().map(|m| m.content.as_str()).collect();

        assert_eq!(contents, ["two", "three"]);
    }
}
