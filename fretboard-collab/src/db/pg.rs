use async_trait::async_trait;
use chrono::{DateTime, Utc};
use fretboard_core::Plan;
use sqlx::{
    migrate::Migrator, postgres::PgPoolOptions, query, query_as, query_scalar, Error as SqlxError,
    FromRow, PgPool,
};

use crate::{
    BandData, BandMemberData, BillingRefs, CoverData, Database, DatabaseError, DatabaseResult,
    ExerciseProgressData, FriendRequestData, IntoDatabaseError, JamData, JamMessageData,
    JamParticipantData, NewBand, NewBandMember, NewCover, NewExerciseProgress, NewJam,
    NewJamMessage, NewNotificationLog, NewPlaylist, NewPracticeSession, NewPushSubscription,
    NewSession, NewSetlist, NewSong, NewUser, NewWishlistSong, NotificationLogData, PlaylistData,
    PracticeSessionData, PrimaryKey, ProfileData, PushSubscriptionData, Result, SessionData,
    SetlistData, SongData, SpotifyLink, UpdatedProfile, UpdatedSong, UserData, WishlistSongData,
};

static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

/// Postgres error code for unique constraint violations
const UNIQUE_VIOLATION: &str = "23505";

// Joined user columns, shared by every query that embeds a user
macro_rules! user_columns {
    ($table:literal, $prefix:literal) => {
        concat!(
            $table, ".id AS ", $prefix, "id, ",
            $table, ".username AS ", $prefix, "username, ",
            $table, ".password AS ", $prefix, "password, ",
            $table, ".display_name AS ", $prefix, "display_name, ",
            $table, ".created_at AS ", $prefix, "created_at"
        )
    };
}

macro_rules! profile_select {
    () => {
        concat!(
            "SELECT ",
            user_columns!("u", "user_"),
            ", p.avatar_url, p.plan, p.stripe_customer_id, p.stripe_subscription_id,
            p.spotify_access_token, p.spotify_refresh_token, p.spotify_expires_at
            FROM profiles p
                INNER JOIN users u ON p.user_id = u.id "
        )
    };
}

macro_rules! member_select {
    () => {
        concat!(
            "SELECT m.id, m.band_id, m.owner, m.joined_at, ",
            user_columns!("u", "user_"),
            " FROM band_members m
                INNER JOIN users u ON m.user_id = u.id "
        )
    };
}

macro_rules! friend_request_select {
    () => {
        concat!(
            "SELECT r.id, r.status, r.created_at, ",
            user_columns!("f", "from_"),
            ", ",
            user_columns!("t", "to_"),
            " FROM friend_requests r
                INNER JOIN users f ON r.from_user_id = f.id
                INNER JOIN users t ON r.to_user_id = t.id "
        )
    };
}

/// A postgres database implementation for fretboard
pub struct PgDatabase {
    pool: PgPool,
}

impl PgDatabase {
    pub async fn new(url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await
            .map_err(|e| e.any())?;

        Ok(Self { pool })
    }

    /// Brings the schema up to date
    pub async fn migrate(&self) -> Result<()> {
        MIGRATOR
            .run(&self.pool)
            .await
            .map_err(|e| DatabaseError::Internal(Box::new(e)))
    }

    async fn band_members(&self, band_id: PrimaryKey) -> Result<Vec<BandMemberData>> {
        let rows: Vec<MemberRow> = query_as(concat!(
            member_select!(),
            "WHERE m.band_id = $1 ORDER BY m.owner DESC, m.joined_at"
        ))
        .bind(band_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| e.any())?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn playlist_song_ids(&self, playlist_id: PrimaryKey) -> Result<Vec<PrimaryKey>> {
        query_scalar("SELECT song_id FROM playlist_songs WHERE playlist_id = $1 ORDER BY id")
            .bind(playlist_id)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| e.any())
    }

    async fn setlist_song_ids(&self, setlist_id: PrimaryKey) -> Result<Vec<PrimaryKey>> {
        query_scalar("SELECT song_id FROM setlist_songs WHERE setlist_id = $1 ORDER BY position")
            .bind(setlist_id)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| e.any())
    }

    async fn with_song_ids(&self, row: SetlistRow) -> Result<SetlistData> {
        let song_ids = self.setlist_song_ids(row.id).await?;
        Ok(row.into_data(song_ids))
    }
}

#[async_trait]
impl Database for PgDatabase {
    async fn user_by_id(&self, user_id: PrimaryKey) -> Result<UserData> {
        query_as("SELECT * FROM users WHERE id = $1")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| e.not_found_or("user", "id"))
    }

    async fn user_by_username(&self, username: &str) -> Result<UserData> {
        query_as("SELECT * FROM users WHERE username = $1")
            .bind(username)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| e.not_found_or("user", "username"))
    }

    async fn create_user(&self, new_user: NewUser) -> Result<UserData> {
        self.user_by_username(&new_user.username)
            .await
            .conflict_or_ok("user", "username", &new_user.username)?;

        query_as(
            "
            WITH new_user AS (
                INSERT INTO users (username, password, display_name)
                VALUES ($1, $2, $3)
                RETURNING *
            ), new_profile AS (
                INSERT INTO profiles (user_id) SELECT id FROM new_user
            )
            SELECT * FROM new_user",
        )
        .bind(&new_user.username)
        .bind(&new_user.password)
        .bind(&new_user.display_name)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| e.conflict_or("user", "username", &new_user.username))
    }

    async fn session_by_token(&self, token: &str) -> Result<SessionData> {
        let row: SessionRow = query_as(concat!(
            "SELECT s.id, s.token, s.expires_at, ",
            user_columns!("u", "user_"),
            " FROM sessions s
                INNER JOIN users u ON s.user_id = u.id
            WHERE s.token = $1"
        ))
        .bind(token)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| e.not_found_or("session", "token"))?;

        Ok(row.into())
    }

    async fn create_session(&self, new_session: NewSession) -> Result<SessionData> {
        self.session_by_token(&new_session.token)
            .await
            .conflict_or_ok("session", "token", &new_session.token)?;

        query("INSERT INTO sessions (token, user_id, expires_at) VALUES ($1, $2, $3)")
            .bind(&new_session.token)
            .bind(new_session.user_id)
            .bind(new_session.expires_at)
            .execute(&self.pool)
            .await
            .map_err(|e| e.any())?;

        self.session_by_token(&new_session.token).await
    }

    async fn delete_session_by_token(&self, token: &str) -> Result<()> {
        // Ensure session exists
        let _ = self.session_by_token(token).await?;

        query("DELETE FROM sessions WHERE token = $1")
            .bind(token)
            .execute(&self.pool)
            .await
            .map_err(|e| e.any())
            .map(|_| ())
    }

    async fn clear_expired_sessions(&self) -> Result<()> {
        query("DELETE FROM sessions WHERE now() > expires_at")
            .execute(&self.pool)
            .await
            .map_err(|e| e.any())
            .map(|_| ())
    }

    async fn profile_by_user_id(&self, user_id: PrimaryKey) -> Result<ProfileData> {
        let row: ProfileRow = query_as(concat!(profile_select!(), "WHERE p.user_id = $1"))
            .bind(user_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| e.not_found_or("profile", "user_id"))?;

        row.try_into()
    }

    async fn profile_by_customer_id(&self, customer_id: &str) -> Result<ProfileData> {
        let row: ProfileRow =
            query_as(concat!(profile_select!(), "WHERE p.stripe_customer_id = $1"))
                .bind(customer_id)
                .fetch_one(&self.pool)
                .await
                .map_err(|e| e.not_found_or("profile", "stripe_customer_id"))?;

        row.try_into()
    }

    async fn update_profile(&self, updated: UpdatedProfile) -> Result<ProfileData> {
        let profile = self.profile_by_user_id(updated.user_id).await?;

        query("UPDATE users SET display_name = $1 WHERE id = $2")
            .bind(updated.display_name.unwrap_or(profile.user.display_name))
            .bind(updated.user_id)
            .execute(&self.pool)
            .await
            .map_err(|e| e.any())?;

        query("UPDATE profiles SET avatar_url = $1 WHERE user_id = $2")
            .bind(updated.avatar_url.or(profile.avatar_url))
            .bind(updated.user_id)
            .execute(&self.pool)
            .await
            .map_err(|e| e.any())?;

        self.profile_by_user_id(updated.user_id).await
    }

    async fn update_plan(&self, user_id: PrimaryKey, plan: Plan) -> Result<()> {
        let result = query("UPDATE profiles SET plan = $1 WHERE user_id = $2")
            .bind(plan.as_str())
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(|e| e.any())?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::NotFound {
                resource: "profile",
                identifier: "user_id",
            });
        }

        Ok(())
    }

    async fn update_billing(&self, user_id: PrimaryKey, billing: BillingRefs) -> Result<()> {
        let profile = self.profile_by_user_id(user_id).await?;

        query(
            "UPDATE profiles SET
                stripe_customer_id = $1,
                stripe_subscription_id = $2
            WHERE user_id = $3",
        )
        .bind(billing.customer_id.or(profile.stripe_customer_id))
        .bind(billing.subscription_id.or(profile.stripe_subscription_id))
        .bind(user_id)
        .execute(&self.pool)
        .await
        .map_err(|e| e.any())
        .map(|_| ())
    }

    async fn set_spotify_link(
        &self,
        user_id: PrimaryKey,
        link: Option<SpotifyLink>,
    ) -> Result<()> {
        let (access, refresh, expires) = match link {
            Some(link) => (
                Some(link.access_token),
                Some(link.refresh_token),
                Some(link.expires_at),
            ),
            None => (None, None, None),
        };

        query(
            "UPDATE profiles SET
                spotify_access_token = $1,
                spotify_refresh_token = $2,
                spotify_expires_at = $3
            WHERE user_id = $4",
        )
        .bind(access)
        .bind(refresh)
        .bind(expires)
        .bind(user_id)
        .execute(&self.pool)
        .await
        .map_err(|e| e.any())
        .map(|_| ())
    }

    async fn list_songs(&self, user_id: PrimaryKey) -> Result<Vec<SongData>> {
        let rows: Vec<SongRow> =
            query_as("SELECT * FROM songs WHERE user_id = $1 ORDER BY artist, title")
                .bind(user_id)
                .fetch_all(&self.pool)
                .await
                .map_err(|e| e.any())?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn song_by_id(&self, user_id: PrimaryKey, song_id: PrimaryKey) -> Result<SongData> {
        let row: SongRow = query_as("SELECT * FROM songs WHERE id = $1 AND user_id = $2")
            .bind(song_id)
            .bind(user_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| e.not_found_or("song", "id"))?;

        row.try_into()
    }

    async fn create_song(&self, new_song: NewSong) -> Result<SongData> {
        let row: SongRow = query_as(
            "
            INSERT INTO songs (user_id, title, artist, status, difficulty, tuning, tab_url, spotify_id, notes)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING *",
        )
        .bind(new_song.user_id)
        .bind(new_song.title)
        .bind(new_song.artist)
        .bind(new_song.status.as_str())
        .bind(new_song.difficulty)
        .bind(new_song.tuning)
        .bind(new_song.tab_url)
        .bind(new_song.spotify_id)
        .bind(new_song.notes)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| e.any())?;

        row.try_into()
    }

    async fn update_song(&self, updated_song: UpdatedSong) -> Result<SongData> {
        let song = self
            .song_by_id(updated_song.user_id, updated_song.id)
            .await?;

        let row: SongRow = query_as(
            "UPDATE songs SET
                title = $1,
                artist = $2,
                status = $3,
                difficulty = $4,
                tuning = $5,
                tab_url = $6,
                notes = $7,
                updated_at = now()
            WHERE id = $8
            RETURNING *",
        )
        .bind(updated_song.title.unwrap_or(song.title))
        .bind(updated_song.artist.unwrap_or(song.artist))
        .bind(updated_song.status.unwrap_or(song.status).as_str())
        .bind(updated_song.difficulty.or(song.difficulty))
        .bind(updated_song.tuning.or(song.tuning))
        .bind(updated_song.tab_url.or(song.tab_url))
        .bind(updated_song.notes.or(song.notes))
        .bind(song.id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| e.any())?;

        row.try_into()
    }

    async fn delete_song(&self, user_id: PrimaryKey, song_id: PrimaryKey) -> Result<()> {
        // Ensure song exists and is owned
        let _ = self.song_by_id(user_id, song_id).await?;

        query("DELETE FROM songs WHERE id = $1")
            .bind(song_id)
            .execute(&self.pool)
            .await
            .map_err(|e| e.any())
            .map(|_| ())
    }

    async fn list_wishlist(&self, user_id: PrimaryKey) -> Result<Vec<WishlistSongData>> {
        query_as("SELECT * FROM wishlist_songs WHERE user_id = $1 ORDER BY created_at DESC")
            .bind(user_id)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| e.any())
    }

    async fn wishlist_song_by_id(
        &self,
        user_id: PrimaryKey,
        wishlist_id: PrimaryKey,
    ) -> Result<WishlistSongData> {
        query_as("SELECT * FROM wishlist_songs WHERE id = $1 AND user_id = $2")
            .bind(wishlist_id)
            .bind(user_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| e.not_found_or("wishlist song", "id"))
    }

    async fn create_wishlist_song(&self, new_song: NewWishlistSong) -> Result<WishlistSongData> {
        query_as(
            "
            INSERT INTO wishlist_songs (user_id, title, artist, spotify_id, notes)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *",
        )
        .bind(new_song.user_id)
        .bind(new_song.title)
        .bind(new_song.artist)
        .bind(new_song.spotify_id)
        .bind(new_song.notes)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| e.any())
    }

    async fn delete_wishlist_song(
        &self,
        user_id: PrimaryKey,
        wishlist_id: PrimaryKey,
    ) -> Result<()> {
        let _ = self.wishlist_song_by_id(user_id, wishlist_id).await?;

        query("DELETE FROM wishlist_songs WHERE id = $1")
            .bind(wishlist_id)
            .execute(&self.pool)
            .await
            .map_err(|e| e.any())
            .map(|_| ())
    }

    async fn list_playlists(&self, user_id: PrimaryKey) -> Result<Vec<PlaylistData>> {
        let rows: Vec<PlaylistRow> =
            query_as("SELECT * FROM playlists WHERE user_id = $1 ORDER BY name")
                .bind(user_id)
                .fetch_all(&self.pool)
                .await
                .map_err(|e| e.any())?;

        let mut playlists = Vec::with_capacity(rows.len());

        for row in rows {
            let song_ids = self.playlist_song_ids(row.id).await?;
            playlists.push(row.into_data(song_ids));
        }

        Ok(playlists)
    }

    async fn playlist_by_id(
        &self,
        user_id: PrimaryKey,
        playlist_id: PrimaryKey,
    ) -> Result<PlaylistData> {
        let row: PlaylistRow = query_as("SELECT * FROM playlists WHERE id = $1 AND user_id = $2")
            .bind(playlist_id)
            .bind(user_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| e.not_found_or("playlist", "id"))?;

        let song_ids = self.playlist_song_ids(row.id).await?;
        Ok(row.into_data(song_ids))
    }

    async fn create_playlist(&self, new_playlist: NewPlaylist) -> Result<PlaylistData> {
        let row: PlaylistRow = query_as(
            "INSERT INTO playlists (user_id, name, description) VALUES ($1, $2, $3) RETURNING *",
        )
        .bind(new_playlist.user_id)
        .bind(new_playlist.name)
        .bind(new_playlist.description)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| e.any())?;

        Ok(row.into_data(vec![]))
    }

    async fn delete_playlist(&self, user_id: PrimaryKey, playlist_id: PrimaryKey) -> Result<()> {
        let _ = self.playlist_by_id(user_id, playlist_id).await?;

        query("DELETE FROM playlists WHERE id = $1")
            .bind(playlist_id)
            .execute(&self.pool)
            .await
            .map_err(|e| e.any())
            .map(|_| ())
    }

    async fn add_playlist_song(&self, playlist_id: PrimaryKey, song_id: PrimaryKey) -> Result<()> {
        query(
            "
            INSERT INTO playlist_songs (playlist_id, song_id) VALUES ($1, $2)
            ON CONFLICT (playlist_id, song_id) DO NOTHING",
        )
        .bind(playlist_id)
        .bind(song_id)
        .execute(&self.pool)
        .await
        .map_err(|e| e.any())
        .map(|_| ())
    }

    async fn remove_playlist_song(
        &self,
        playlist_id: PrimaryKey,
        song_id: PrimaryKey,
    ) -> Result<()> {
        let result = query("DELETE FROM playlist_songs WHERE playlist_id = $1 AND song_id = $2")
            .bind(playlist_id)
            .bind(song_id)
            .execute(&self.pool)
            .await
            .map_err(|e| e.any())?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::NotFound {
                resource: "playlist song",
                identifier: "playlist_id:song_id",
            });
        }

        Ok(())
    }

    async fn list_practice_sessions(
        &self,
        user_id: PrimaryKey,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<PracticeSessionData>> {
        query_as(
            "
            SELECT * FROM practice_sessions
            WHERE user_id = $1 AND ($2::timestamptz IS NULL OR practiced_at >= $2)
            ORDER BY practiced_at DESC",
        )
        .bind(user_id)
        .bind(since)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| e.any())
    }

    async fn create_practice_session(
        &self,
        new_session: NewPracticeSession,
    ) -> Result<PracticeSessionData> {
        query_as(
            "
            INSERT INTO practice_sessions (user_id, song_id, duration_minutes, notes, practiced_at)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *",
        )
        .bind(new_session.user_id)
        .bind(new_session.song_id)
        .bind(new_session.duration_minutes)
        .bind(new_session.notes)
        .bind(new_session.practiced_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| e.any())
    }

    async fn practice_sessions_for_users(
        &self,
        user_ids: &[PrimaryKey],
        limit: i64,
    ) -> Result<Vec<PracticeSessionData>> {
        query_as(
            "
            SELECT * FROM practice_sessions
            WHERE user_id = ANY($1)
            ORDER BY practiced_at DESC
            LIMIT $2",
        )
        .bind(user_ids)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| e.any())
    }

    async fn list_exercise_progress(
        &self,
        user_id: PrimaryKey,
        exercise_id: Option<&str>,
    ) -> Result<Vec<ExerciseProgressData>> {
        query_as(
            "
            SELECT * FROM exercise_progress
            WHERE user_id = $1 AND ($2::text IS NULL OR exercise_id = $2)
            ORDER BY recorded_at, id",
        )
        .bind(user_id)
        .bind(exercise_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| e.any())
    }

    async fn create_exercise_progress(
        &self,
        new_progress: NewExerciseProgress,
    ) -> Result<ExerciseProgressData> {
        query_as(
            "
            INSERT INTO exercise_progress (user_id, exercise_id, bpm, completed)
            VALUES ($1, $2, $3, $4)
            RETURNING *",
        )
        .bind(new_progress.user_id)
        .bind(new_progress.exercise_id)
        .bind(new_progress.bpm)
        .bind(new_progress.completed)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| e.any())
    }

    async fn list_covers(&self, user_id: PrimaryKey) -> Result<Vec<CoverData>> {
        let rows: Vec<CoverRow> =
            query_as("SELECT * FROM covers WHERE user_id = $1 ORDER BY created_at DESC")
                .bind(user_id)
                .fetch_all(&self.pool)
                .await
                .map_err(|e| e.any())?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn cover_by_id(&self, cover_id: PrimaryKey) -> Result<CoverData> {
        let row: CoverRow = query_as("SELECT * FROM covers WHERE id = $1")
            .bind(cover_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| e.not_found_or("cover", "id"))?;

        row.try_into()
    }

    async fn create_cover(&self, new_cover: NewCover) -> Result<CoverData> {
        let row: CoverRow = query_as(
            "
            INSERT INTO covers (user_id, song_id, title, media_kind, url, storage_key)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *",
        )
        .bind(new_cover.user_id)
        .bind(new_cover.song_id)
        .bind(new_cover.title)
        .bind(new_cover.media_kind.as_str())
        .bind(new_cover.url)
        .bind(new_cover.storage_key)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| e.any())?;

        row.try_into()
    }

    async fn delete_cover(&self, cover_id: PrimaryKey) -> Result<()> {
        let _ = self.cover_by_id(cover_id).await?;

        query("DELETE FROM covers WHERE id = $1")
            .bind(cover_id)
            .execute(&self.pool)
            .await
            .map_err(|e| e.any())
            .map(|_| ())
    }

    async fn covers_for_users(
        &self,
        user_ids: &[PrimaryKey],
        limit: i64,
    ) -> Result<Vec<CoverData>> {
        let rows: Vec<CoverRow> = query_as(
            "SELECT * FROM covers WHERE user_id = ANY($1) ORDER BY created_at DESC LIMIT $2",
        )
        .bind(user_ids)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| e.any())?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn list_bands_for_user(&self, user_id: PrimaryKey) -> Result<Vec<BandData>> {
        let rows: Vec<BandRow> = query_as(
            "
            SELECT bands.* FROM bands
                INNER JOIN band_members ON band_members.band_id = bands.id
            WHERE band_members.user_id = $1
            ORDER BY bands.name",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| e.any())?;

        let mut bands = Vec::with_capacity(rows.len());

        for row in rows {
            let members = self.band_members(row.id).await?;
            bands.push(row.into_data(members));
        }

        Ok(bands)
    }

    async fn band_by_id(&self, band_id: PrimaryKey) -> Result<BandData> {
        let row: BandRow = query_as("SELECT * FROM bands WHERE id = $1")
            .bind(band_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| e.not_found_or("band", "id"))?;

        let members = self.band_members(band_id).await?;
        Ok(row.into_data(members))
    }

    async fn create_band(&self, new_band: NewBand) -> Result<BandData> {
        let user = self.user_by_id(new_band.user_id).await?;

        let band_id: PrimaryKey = query_scalar(
            "
            WITH new_band AS (
                INSERT INTO bands (name) VALUES ($1) RETURNING id
            ), owner AS (
                INSERT INTO band_members (band_id, user_id, owner)
                SELECT id, $2, true FROM new_band
            )
            SELECT id FROM new_band",
        )
        .bind(new_band.name)
        .bind(user.id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| e.any())?;

        self.band_by_id(band_id).await
    }

    async fn create_band_member(&self, new_member: NewBandMember) -> Result<BandMemberData> {
        let member_id: PrimaryKey = query_scalar(
            "
            INSERT INTO band_members (band_id, user_id, owner)
            VALUES ($1, $2, $3)
            RETURNING id",
        )
        .bind(new_member.band_id)
        .bind(new_member.user_id)
        .bind(new_member.owner)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            e.conflict_or(
                "band member",
                "band:user",
                &format!("{}:{}", new_member.band_id, new_member.user_id),
            )
        })?;

        let row: MemberRow = query_as(concat!(member_select!(), "WHERE m.id = $1"))
            .bind(member_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| e.any())?;

        Ok(row.into())
    }

    async fn delete_band_member(&self, band_id: PrimaryKey, user_id: PrimaryKey) -> Result<()> {
        let result = query("DELETE FROM band_members WHERE band_id = $1 AND user_id = $2")
            .bind(band_id)
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(|e| e.any())?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::NotFound {
                resource: "band member",
                identifier: "band_id:user_id",
            });
        }

        Ok(())
    }

    async fn delete_band(&self, band_id: PrimaryKey) -> Result<()> {
        // Ensure band exists
        let _ = self.band_by_id(band_id).await?;

        query("DELETE FROM bands WHERE id = $1")
            .bind(band_id)
            .execute(&self.pool)
            .await
            .map_err(|e| e.any())
            .map(|_| ())
    }

    async fn list_setlists(&self, user_id: PrimaryKey) -> Result<Vec<SetlistData>> {
        let rows: Vec<SetlistRow> = query_as(
            "
            SELECT DISTINCT setlists.* FROM setlists
                LEFT JOIN band_members ON band_members.band_id = setlists.band_id
            WHERE setlists.user_id = $1 OR band_members.user_id = $1
            ORDER BY setlists.updated_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| e.any())?;

        let mut setlists = Vec::with_capacity(rows.len());

        for row in rows {
            setlists.push(self.with_song_ids(row).await?);
        }

        Ok(setlists)
    }

    async fn setlist_by_id(&self, setlist_id: PrimaryKey) -> Result<SetlistData> {
        let row: SetlistRow = query_as("SELECT * FROM setlists WHERE id = $1")
            .bind(setlist_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| e.not_found_or("setlist", "id"))?;

        self.with_song_ids(row).await
    }

    async fn create_setlist(&self, new_setlist: NewSetlist) -> Result<SetlistData> {
        let row: SetlistRow = query_as(
            "INSERT INTO setlists (user_id, band_id, title) VALUES ($1, $2, $3) RETURNING *",
        )
        .bind(new_setlist.user_id)
        .bind(new_setlist.band_id)
        .bind(new_setlist.title)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| e.any())?;

        Ok(row.into_data(vec![]))
    }

    async fn rename_setlist(&self, setlist_id: PrimaryKey, title: &str) -> Result<SetlistData> {
        let row: SetlistRow = query_as(
            "UPDATE setlists SET title = $1, updated_at = now() WHERE id = $2 RETURNING *",
        )
        .bind(title)
        .bind(setlist_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| e.not_found_or("setlist", "id"))?;

        self.with_song_ids(row).await
    }

    async fn set_setlist_songs(
        &self,
        setlist_id: PrimaryKey,
        song_ids: &[PrimaryKey],
    ) -> Result<SetlistData> {
        let mut tx = self.pool.begin().await.map_err(|e| e.any())?;

        query("DELETE FROM setlist_songs WHERE setlist_id = $1")
            .bind(setlist_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| e.any())?;

        for (position, song_id) in song_ids.iter().enumerate() {
            query("INSERT INTO setlist_songs (setlist_id, song_id, position) VALUES ($1, $2, $3)")
                .bind(setlist_id)
                .bind(song_id)
                .bind(position as i32)
                .execute(&mut *tx)
                .await
                .map_err(|e| e.any())?;
        }

        query("UPDATE setlists SET updated_at = now() WHERE id = $1")
            .bind(setlist_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| e.any())?;

        tx.commit().await.map_err(|e| e.any())?;

        self.setlist_by_id(setlist_id).await
    }

    async fn delete_setlist(&self, setlist_id: PrimaryKey) -> Result<()> {
        let _ = self.setlist_by_id(setlist_id).await?;

        query("DELETE FROM setlists WHERE id = $1")
            .bind(setlist_id)
            .execute(&self.pool)
            .await
            .map_err(|e| e.any())
            .map(|_| ())
    }

    async fn list_active_jams(&self, user_id: PrimaryKey) -> Result<Vec<JamData>> {
        query_as(
            "
            SELECT DISTINCT jams.* FROM jams
                LEFT JOIN jam_participants ON jam_participants.jam_id = jams.id
                LEFT JOIN band_members ON band_members.band_id = jams.band_id
            WHERE jams.ended_at IS NULL AND (
                jams.host_id = $1
                OR jam_participants.user_id = $1
                OR band_members.user_id = $1
            )
            ORDER BY jams.created_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| e.any())
    }

    async fn jam_by_id(&self, jam_id: PrimaryKey) -> Result<JamData> {
        query_as("SELECT * FROM jams WHERE id = $1")
            .bind(jam_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| e.not_found_or("jam", "id"))
    }

    async fn create_jam(&self, new_jam: NewJam) -> Result<JamData> {
        query_as("INSERT INTO jams (host_id, band_id, title) VALUES ($1, $2, $3) RETURNING *")
            .bind(new_jam.host_id)
            .bind(new_jam.band_id)
            .bind(new_jam.title)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| e.any())
    }

    async fn end_jam(&self, jam_id: PrimaryKey) -> Result<JamData> {
        query_as(
            "UPDATE jams SET ended_at = COALESCE(ended_at, now()) WHERE id = $1 RETURNING *",
        )
        .bind(jam_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| e.not_found_or("jam", "id"))
    }

    async fn join_jam(&self, jam_id: PrimaryKey, user_id: PrimaryKey) -> Result<bool> {
        // The unique (jam_id, user_id) constraint makes concurrent joins harmless
        let inserted: Option<PrimaryKey> = query_scalar(
            "
            INSERT INTO jam_participants (jam_id, user_id) VALUES ($1, $2)
            ON CONFLICT (jam_id, user_id) DO NOTHING
            RETURNING id",
        )
        .bind(jam_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| e.any())?;

        Ok(inserted.is_some())
    }

    async fn leave_jam(&self, jam_id: PrimaryKey, user_id: PrimaryKey) -> Result<()> {
        let result = query("DELETE FROM jam_participants WHERE jam_id = $1 AND user_id = $2")
            .bind(jam_id)
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(|e| e.any())?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::NotFound {
                resource: "jam participant",
                identifier: "jam_id:user_id",
            });
        }

        Ok(())
    }

    async fn jam_participants(&self, jam_id: PrimaryKey) -> Result<Vec<JamParticipantData>> {
        let rows: Vec<ParticipantRow> = query_as(concat!(
            "SELECT p.id, p.jam_id, p.joined_at, ",
            user_columns!("u", "user_"),
            " FROM jam_participants p
                INNER JOIN users u ON p.user_id = u.id
            WHERE p.jam_id = $1
            ORDER BY p.joined_at"
        ))
        .bind(jam_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| e.any())?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn jam_messages(&self, jam_id: PrimaryKey, limit: i64) -> Result<Vec<JamMessageData>> {
        let rows: Vec<MessageRow> = query_as(concat!(
            "SELECT * FROM (
                SELECT m.id, m.jam_id, m.content, m.created_at, ",
            user_columns!("u", "user_"),
            " FROM jam_messages m
                    INNER JOIN users u ON m.user_id = u.id
                WHERE m.jam_id = $1
                ORDER BY m.created_at DESC, m.id DESC
                LIMIT $2
            ) recent
            ORDER BY created_at, id"
        ))
        .bind(jam_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| e.any())?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn create_jam_message(&self, new_message: NewJamMessage) -> Result<JamMessageData> {
        let message_id: PrimaryKey = query_scalar(
            "INSERT INTO jam_messages (jam_id, user_id, content) VALUES ($1, $2, $3) RETURNING id",
        )
        .bind(new_message.jam_id)
        .bind(new_message.user_id)
        .bind(new_message.content)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| e.any())?;

        let row: MessageRow = query_as(concat!(
            "SELECT m.id, m.jam_id, m.content, m.created_at, ",
            user_columns!("u", "user_"),
            " FROM jam_messages m
                INNER JOIN users u ON m.user_id = u.id
            WHERE m.id = $1"
        ))
        .bind(message_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| e.any())?;

        Ok(row.into())
    }

    async fn friends_of(&self, user_id: PrimaryKey) -> Result<Vec<UserData>> {
        query_as(
            "
            SELECT users.* FROM friendships
                INNER JOIN users ON users.id = CASE
                    WHEN friendships.user_a = $1 THEN friendships.user_b
                    ELSE friendships.user_a
                END
            WHERE friendships.user_a = $1 OR friendships.user_b = $1
            ORDER BY users.display_name",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| e.any())
    }

    async fn are_friends(&self, user_id: PrimaryKey, other_id: PrimaryKey) -> Result<bool> {
        let (a, b) = ordered_pair(user_id, other_id);

        query_scalar("SELECT EXISTS (SELECT 1 FROM friendships WHERE user_a = $1 AND user_b = $2)")
            .bind(a)
            .bind(b)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| e.any())
    }

    async fn delete_friendship(&self, user_id: PrimaryKey, other_id: PrimaryKey) -> Result<()> {
        let (a, b) = ordered_pair(user_id, other_id);

        let result = query("DELETE FROM friendships WHERE user_a = $1 AND user_b = $2")
            .bind(a)
            .bind(b)
            .execute(&self.pool)
            .await
            .map_err(|e| e.any())?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::NotFound {
                resource: "friendship",
                identifier: "user:user",
            });
        }

        Ok(())
    }

    async fn friend_request_by_id(&self, request_id: PrimaryKey) -> Result<FriendRequestData> {
        let row: FriendRequestRow = query_as(concat!(friend_request_select!(), "WHERE r.id = $1"))
            .bind(request_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| e.not_found_or("friend request", "id"))?;

        row.try_into()
    }

    async fn pending_request_between(
        &self,
        user_id: PrimaryKey,
        other_id: PrimaryKey,
    ) -> Result<FriendRequestData> {
        let row: FriendRequestRow = query_as(concat!(
            friend_request_select!(),
            "WHERE r.status = 'pending' AND (
                (r.from_user_id = $1 AND r.to_user_id = $2)
                OR (r.from_user_id = $2 AND r.to_user_id = $1)
            )
            LIMIT 1"
        ))
        .bind(user_id)
        .bind(other_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| e.not_found_or("friend request", "user:user"))?;

        row.try_into()
    }

    async fn pending_friend_requests(&self, user_id: PrimaryKey) -> Result<Vec<FriendRequestData>> {
        let rows: Vec<FriendRequestRow> = query_as(concat!(
            friend_request_select!(),
            "WHERE r.status = 'pending' AND (r.from_user_id = $1 OR r.to_user_id = $1)
            ORDER BY r.created_at DESC"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| e.any())?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn create_friend_request(
        &self,
        from_id: PrimaryKey,
        to_id: PrimaryKey,
    ) -> Result<FriendRequestData> {
        self.pending_request_between(from_id, to_id)
            .await
            .conflict_or_ok("friend request", "user:user", &format!("{from_id}:{to_id}"))?;

        let request_id: PrimaryKey = query_scalar(
            "INSERT INTO friend_requests (from_user_id, to_user_id) VALUES ($1, $2) RETURNING id",
        )
        .bind(from_id)
        .bind(to_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| e.any())?;

        self.friend_request_by_id(request_id).await
    }

    async fn accept_friend_request(&self, request_id: PrimaryKey) -> Result<FriendRequestData> {
        let request = self.friend_request_by_id(request_id).await?;
        let (a, b) = ordered_pair(request.from.id, request.to.id);

        let mut tx = self.pool.begin().await.map_err(|e| e.any())?;

        query("UPDATE friend_requests SET status = 'accepted' WHERE id = $1")
            .bind(request_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| e.any())?;

        query(
            "
            INSERT INTO friendships (user_a, user_b) VALUES ($1, $2)
            ON CONFLICT (user_a, user_b) DO NOTHING",
        )
        .bind(a)
        .bind(b)
        .execute(&mut *tx)
        .await
        .map_err(|e| e.any())?;

        tx.commit().await.map_err(|e| e.any())?;

        self.friend_request_by_id(request_id).await
    }

    async fn decline_friend_request(&self, request_id: PrimaryKey) -> Result<FriendRequestData> {
        let _ = self.friend_request_by_id(request_id).await?;

        query("UPDATE friend_requests SET status = 'declined' WHERE id = $1")
            .bind(request_id)
            .execute(&self.pool)
            .await
            .map_err(|e| e.any())?;

        self.friend_request_by_id(request_id).await
    }

    async fn upsert_push_subscription(
        &self,
        new_subscription: NewPushSubscription,
    ) -> Result<PushSubscriptionData> {
        query_as(
            "
            INSERT INTO push_subscriptions (user_id, endpoint, p256dh, auth)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (endpoint) DO UPDATE SET
                user_id = EXCLUDED.user_id,
                p256dh = EXCLUDED.p256dh,
                auth = EXCLUDED.auth
            RETURNING *",
        )
        .bind(new_subscription.user_id)
        .bind(new_subscription.endpoint)
        .bind(new_subscription.p256dh)
        .bind(new_subscription.auth)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| e.any())
    }

    async fn push_subscriptions_for(
        &self,
        user_id: PrimaryKey,
    ) -> Result<Vec<PushSubscriptionData>> {
        query_as("SELECT * FROM push_subscriptions WHERE user_id = $1 ORDER BY id")
            .bind(user_id)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| e.any())
    }

    async fn delete_push_subscription(&self, endpoint: &str) -> Result<()> {
        let result = query("DELETE FROM push_subscriptions WHERE endpoint = $1")
            .bind(endpoint)
            .execute(&self.pool)
            .await
            .map_err(|e| e.any())?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::NotFound {
                resource: "push subscription",
                identifier: "endpoint",
            });
        }

        Ok(())
    }

    async fn create_notification_log(
        &self,
        new_log: NewNotificationLog,
    ) -> Result<NotificationLogData> {
        query_as(
            "
            INSERT INTO notification_logs (user_id, title, body, delivered, failed)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *",
        )
        .bind(new_log.user_id)
        .bind(new_log.title)
        .bind(new_log.body)
        .bind(new_log.delivered)
        .bind(new_log.failed)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| e.any())
    }

    async fn list_notification_logs(
        &self,
        user_id: PrimaryKey,
        limit: i64,
    ) -> Result<Vec<NotificationLogData>> {
        query_as(
            "
            SELECT * FROM notification_logs
            WHERE user_id = $1
            ORDER BY created_at DESC, id DESC
            LIMIT $2",
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| e.any())
    }
}

impl IntoDatabaseError for SqlxError {
    fn any(self) -> DatabaseError {
        DatabaseError::Internal(Box::new(self))
    }

    fn not_found_or(self, resource: &'static str, identifier: &'static str) -> DatabaseError {
        match self {
            SqlxError::RowNotFound => DatabaseError::NotFound {
                resource,
                identifier,
            },
            e => Self::any(e),
        }
    }
}

trait IntoConflict {
    /// Maps unique violations to a conflict, anything else to an internal error
    fn conflict_or(self, resource: &'static str, field: &'static str, value: &str)
        -> DatabaseError;
}

impl IntoConflict for SqlxError {
    fn conflict_or(
        self,
        resource: &'static str,
        field: &'static str,
        value: &str,
    ) -> DatabaseError {
        let is_unique_violation = self
            .as_database_error()
            .and_then(|e| e.code())
            .is_some_and(|code| code == UNIQUE_VIOLATION);

        if is_unique_violation {
            DatabaseError::Conflict {
                resource,
                field,
                value: value.to_string(),
            }
        } else {
            self.any()
        }
    }
}

/// Friendships are stored once, with the lowest id first
fn ordered_pair(a: PrimaryKey, b: PrimaryKey) -> (PrimaryKey, PrimaryKey) {
    (a.min(b), a.max(b))
}

fn parse_column<T>(value: &str) -> Result<T>
where
    T: std::str::FromStr<Err = String>,
{
    value
        .parse()
        .map_err(|e: String| DatabaseError::Internal(e.into()))
}

// Rows of joined queries, converted into the public data types

macro_rules! joined_user {
    ($row:ident) => {
        UserData {
            id: $row.user_id,
            username: $row.user_username,
            password: $row.user_password,
            display_name: $row.user_display_name,
            created_at: $row.user_created_at,
        }
    };
}

#[derive(FromRow)]
struct SessionRow {
    id: PrimaryKey,
    token: String,
    expires_at: DateTime<Utc>,
    user_id: PrimaryKey,
    user_username: String,
    user_password: String,
    user_display_name: String,
    user_created_at: DateTime<Utc>,
}

impl From<SessionRow> for SessionData {
    fn from(row: SessionRow) -> Self {
        Self {
            id: row.id,
            token: row.token,
            expires_at: row.expires_at,
            user: joined_user!(row),
        }
    }
}

#[derive(FromRow)]
struct ProfileRow {
    user_id: PrimaryKey,
    user_username: String,
    user_password: String,
    user_display_name: String,
    user_created_at: DateTime<Utc>,
    avatar_url: Option<String>,
    plan: String,
    stripe_customer_id: Option<String>,
    stripe_subscription_id: Option<String>,
    spotify_access_token: Option<String>,
    spotify_refresh_token: Option<String>,
    spotify_expires_at: Option<DateTime<Utc>>,
}

impl TryFrom<ProfileRow> for ProfileData {
    type Error = DatabaseError;

    fn try_from(row: ProfileRow) -> Result<Self> {
        let plan: Plan = row
            .plan
            .parse()
            .map_err(|e: fretboard_core::UnknownPlan| DatabaseError::Internal(Box::new(e)))?;

        let spotify = match (
            row.spotify_access_token,
            row.spotify_refresh_token,
            row.spotify_expires_at,
        ) {
            (Some(access_token), Some(refresh_token), Some(expires_at)) => Some(SpotifyLink {
                access_token,
                refresh_token,
                expires_at,
            }),
            _ => None,
        };

        Ok(Self {
            user: joined_user!(row),
            avatar_url: row.avatar_url,
            plan,
            stripe_customer_id: row.stripe_customer_id,
            stripe_subscription_id: row.stripe_subscription_id,
            spotify,
        })
    }
}

#[derive(FromRow)]
struct SongRow {
    id: PrimaryKey,
    user_id: PrimaryKey,
    title: String,
    artist: String,
    status: String,
    difficulty: Option<i32>,
    tuning: Option<String>,
    tab_url: Option<String>,
    spotify_id: Option<String>,
    notes: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<SongRow> for SongData {
    type Error = DatabaseError;

    fn try_from(row: SongRow) -> Result<Self> {
        Ok(Self {
            id: row.id,
            user_id: row.user_id,
            title: row.title,
            artist: row.artist,
            status: parse_column(&row.status)?,
            difficulty: row.difficulty,
            tuning: row.tuning,
            tab_url: row.tab_url,
            spotify_id: row.spotify_id,
            notes: row.notes,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(FromRow)]
struct PlaylistRow {
    id: PrimaryKey,
    user_id: PrimaryKey,
    name: String,
    description: Option<String>,
    created_at: DateTime<Utc>,
}

impl PlaylistRow {
    fn into_data(self, song_ids: Vec<PrimaryKey>) -> PlaylistData {
        PlaylistData {
            id: self.id,
            user_id: self.user_id,
            name: self.name,
            description: self.description,
            song_ids,
            created_at: self.created_at,
        }
    }
}

#[derive(FromRow)]
struct CoverRow {
    id: PrimaryKey,
    user_id: PrimaryKey,
    song_id: Option<PrimaryKey>,
    title: String,
    media_kind: String,
    url: String,
    storage_key: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<CoverRow> for CoverData {
    type Error = DatabaseError;

    fn try_from(row: CoverRow) -> Result<Self> {
        Ok(Self {
            id: row.id,
            user_id: row.user_id,
            song_id: row.song_id,
            title: row.title,
            media_kind: parse_column(&row.media_kind)?,
            url: row.url,
            storage_key: row.storage_key,
            created_at: row.created_at,
        })
    }
}

#[derive(FromRow)]
struct BandRow {
    id: PrimaryKey,
    name: String,
    created_at: DateTime<Utc>,
}

impl BandRow {
    fn into_data(self, members: Vec<BandMemberData>) -> BandData {
        BandData {
            id: self.id,
            name: self.name,
            created_at: self.created_at,
            members,
        }
    }
}

#[derive(FromRow)]
struct MemberRow {
    id: PrimaryKey,
    band_id: PrimaryKey,
    owner: bool,
    joined_at: DateTime<Utc>,
    user_id: PrimaryKey,
    user_username: String,
    user_password: String,
    user_display_name: String,
    user_created_at: DateTime<Utc>,
}

impl From<MemberRow> for BandMemberData {
    fn from(row: MemberRow) -> Self {
        Self {
            id: row.id,
            band_id: row.band_id,
            owner: row.owner,
            joined_at: row.joined_at,
            user: joined_user!(row),
        }
    }
}

#[derive(FromRow)]
struct SetlistRow {
    id: PrimaryKey,
    user_id: PrimaryKey,
    band_id: Option<PrimaryKey>,
    title: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl SetlistRow {
    fn into_data(self, song_ids: Vec<PrimaryKey>) -> SetlistData {
        SetlistData {
            id: self.id,
            user_id: self.user_id,
            band_id: self.band_id,
            title: self.title,
            song_ids,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[derive(FromRow)]
struct ParticipantRow {
    id: PrimaryKey,
    jam_id: PrimaryKey,
    joined_at: DateTime<Utc>,
    user_id: PrimaryKey,
    user_username: String,
    user_password: String,
    user_display_name: String,
    user_created_at: DateTime<Utc>,
}

impl From<ParticipantRow> for JamParticipantData {
    fn from(row: ParticipantRow) -> Self {
        Self {
            id: row.id,
            jam_id: row.jam_id,
            joined_at: row.joined_at,
            user: joined_user!(row),
        }
    }
}

#[derive(FromRow)]
struct MessageRow {
    id: PrimaryKey,
    jam_id: PrimaryKey,
    content: String,
    created_at: DateTime<Utc>,
    user_id: PrimaryKey,
    user_username: String,
    user_password: String,
    user_display_name: String,
    user_created_at: DateTime<Utc>,
}

impl From<MessageRow> for JamMessageData {
    fn from(row: MessageRow) -> Self {
        Self {
            id: row.id,
            jam_id: row.jam_id,
            content: row.content,
            created_at: row.created_at,
            user: joined_user!(row),
        }
    }
}

#[derive(FromRow)]
struct FriendRequestRow {
    id: PrimaryKey,
    status: String,
    created_at: DateTime<Utc>,
    from_id: PrimaryKey,
    from_username: String,
    from_password: String,
    from_display_name: String,
    from_created_at: DateTime<Utc>,
    to_id: PrimaryKey,
    to_username: String,
    to_password: String,
    to_display_name: String,
    to_created_at: DateTime<Utc>,
}

impl TryFrom<FriendRequestRow> for FriendRequestData {
    type Error = DatabaseError;

    fn try_from(row: FriendRequestRow) -> Result<Self> {
        Ok(Self {
            id: row.id,
            status: parse_column(&row.status)?,
            created_at: row.created_at,
            from: UserData {
                id: row.from_id,
                username: row.from_username,
                password: row.from_password,
                display_name: row.from_display_name,
                created_at: row.from_created_at,
            },
            to: UserData {
                id: row.to_id,
                username: row.to_username,
                password: row.to_password,
                display_name: row.to_display_name,
                created_at: row.to_created_at,
            },
        })
    }
}
