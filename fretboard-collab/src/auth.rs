use argon2::{
    password_hash::{Encoding, SaltString},
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
};
use chrono::{Duration, Utc};
use log::warn;
use rand::rngs::OsRng;
use thiserror::Error;

use crate::{
    util::random_string, ArcedDatabase, CollabContext, DatabaseError, NewSession, NewUser,
    SessionData, UserData,
};

pub struct Auth {
    db: ArcedDatabase,
    argon: Argon2<'static>,
}

#[derive(Debug, Error)]
pub enum AuthError {
    /// Username or password is incorrect
    #[error("Invalid credentials")]
    InvalidCredentials,
    /// The session doesn't exist or has expired
    #[error("Invalid session")]
    InvalidSession,
    #[error("Username is taken")]
    UsernameTaken,
    /// Something else went wrong with the database
    #[error(transparent)]
    Db(DatabaseError),
    #[error("HashError: {0}")]
    HashError(String),
}

impl Auth {
    const SESSION_DURATION_IN_DAYS: i64 = 7;
    const TOKEN_LENGTH: usize = 32;

    pub fn new(context: &CollabContext) -> Self {
        Self {
            db: context.database.clone(),
            argon: Argon2::default(),
        }
    }

    /// Creates a user on the free plan and logs them in
    pub async fn register(&self, new_user: NewPlainUser) -> Result<SessionData, AuthError> {
        let salt = SaltString::generate(&mut OsRng);
        let hashed_password = self
            .argon
            .hash_password(new_user.password.as_bytes(), &salt)
            .map_err(|e| AuthError::HashError(e.to_string()))?
            .to_string();

        let user = self
            .db
            .create_user(NewUser {
                username: new_user.username,
                password: hashed_password,
                display_name: new_user.display_name,
            })
            .await
            .map_err(|e| match e {
                DatabaseError::Conflict { .. } => AuthError::UsernameTaken,
                err => AuthError::Db(err),
            })?;

        self.create_session(&user).await
    }

    /// Logs in a user, returning a new session
    pub async fn login(&self, credentials: Credentials) -> Result<SessionData, AuthError> {
        self.clear_expired().await;

        let user = self
            .db
            .user_by_username(&credentials.username)
            .await
            .map_err(|e| match e {
                DatabaseError::NotFound { .. } => AuthError::InvalidCredentials,
                err => AuthError::Db(err),
            })?;

        let stored_password = PasswordHash::parse(&user.password, Encoding::default())
            .map_err(|e| AuthError::HashError(e.to_string()))?;

        self.argon
            .verify_password(credentials.password.as_bytes(), &stored_password)
            .map_err(|_| AuthError::InvalidCredentials)?;

        self.create_session(&user).await
    }

    /// Deletes the associated session, if it exists
    pub async fn logout(&self, token: &str) -> Result<(), DatabaseError> {
        match self.db.delete_session_by_token(token).await {
            Err(DatabaseError::NotFound { .. }) => Ok(()),
            result => result,
        }
    }

    /// Returns a session if it exists and hasn't expired
    pub async fn session(&self, token: &str) -> Result<SessionData, AuthError> {
        let session = self.db.session_by_token(token).await.map_err(|e| match e {
            DatabaseError::NotFound { .. } => AuthError::InvalidSession,
            err => AuthError::Db(err),
        })?;

        if session.expires_at < Utc::now() {
            return Err(AuthError::InvalidSession);
        }

        Ok(session)
    }

    async fn create_session(&self, user: &UserData) -> Result<SessionData, AuthError> {
        let expires_at = Utc::now() + Duration::days(Self::SESSION_DURATION_IN_DAYS);

        let new_session = NewSession {
            token: random_string(Self::TOKEN_LENGTH),
            user_id: user.id,
            expires_at,
        };

        self.db
            .create_session(new_session)
            .await
            .map_err(AuthError::Db)
    }

    async fn clear_expired(&self) {
        if let Err(e) = self.db.clear_expired_sessions().await {
            warn!("Failed to clear expired sessions: {}", e);
        }
    }
}

#[derive(Debug)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

#[derive(Debug)]
pub struct NewPlainUser {
    pub username: String,
    pub password: String,
    pub display_name: String,
}

#[cfg(test)]
mod tests {
    use crate::testing::TestCollab;

    use super::*;

    fn django() -> NewPlainUser {
        NewPlainUser {
            username: "django".to_string(),
            password: "minor swing".to_string(),
            display_name: "Django".to_string(),
        }
    }

    #[tokio::test]
    async fn registers_and_logs_in() {
        let test = TestCollab::new();

        let registered = test.collab.auth.register(django()).await.unwrap();
        assert_eq!(registered.user.username, "django");
        assert_ne!(registered.user.password, "minor swing");

        let session = test
            .collab
            .auth
            .login(Credentials {
                username: "django".to_string(),
                password: "minor swing".to_string(),
            })
            .await
            .unwrap();

        assert_ne!(session.token, registered.token);
        assert_eq!(session.user.id, registered.user.id);
    }

    #[tokio::test]
    async fn rejects_wrong_passwords_and_taken_usernames() {
        let test = TestCollab::new();
        test.collab.auth.register(django()).await.unwrap();

        let login = test
            .collab
            .auth
            .login(Credentials {
                username: "django".to_string(),
                password: "wrong".to_string(),
            })
            .await;
        assert!(matches!(login, Err(AuthError::InvalidCredentials)));

        let again = test.collab.auth.register(django()).await;
        assert!(matches!(again, Err(AuthError::UsernameTaken)));
    }

    #[tokio::test]
    async fn logged_out_sessions_are_invalid() {
        let test = TestCollab::new();
        let session = test.collab.auth.register(django()).await.unwrap();

        test.collab.auth.logout(&session.token).await.unwrap();

        let result = test.collab.auth.session(&session.token).await;
        assert!(matches!(result, Err(AuthError::InvalidSession)));
    }
}
