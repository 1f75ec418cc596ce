use argon2::{
    password_hash::{Encoding, SaltString},
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
};
use chrono::{Duration, Utc};
use log::{info, warn};
use rand::rngs::OsRng;
use std::sync::Arc;
use thiserror::Error;

use crate::{
    util::{random_string, TOKEN_LENGTH},
    Database, DatabaseError, NewSession, NewUser, ProfileData, SessionData, UserData,
};

pub struct Auth {
    db: Arc<dyn Database>,
    argon: Argon2<'static>,
}

#[derive(Debug, Error)]
pub enum AuthError {
    /// Username or password is incorrect
    #[error("Invalid credentials")]
    InvalidCredentials,
    #[error("A user with the username {0} already exists")]
    UsernameTaken(String),
    /// Something else went wrong with the database
    #[error(transparent)]
    Db(DatabaseError),
    #[error("HashError: {0}")]
    HashError(String),
}

impl Auth {
    const SESSION_DURATION_IN_DAYS: i64 = 7;

    pub fn new(db: &Arc<dyn Database>) -> Self {
        Self {
            db: db.clone(),
            argon: Argon2::default(),
        }
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

        self.begin_session(&user).await
    }

    /// Starts a session for a user whose identity is already established
    pub async fn begin_session(&self, user: &UserData) -> Result<SessionData, AuthError> {
        let expires_at = Utc::now() + Duration::days(Self::SESSION_DURATION_IN_DAYS);

        let new_session = NewSession {
            token: random_string(TOKEN_LENGTH),
            user_id: user.id,
            expires_at,
        };

        let session = self
            .db
            .create_session(new_session)
            .await
            .map_err(AuthError::Db)?;

        info!("{} logged in", user.username);
        Ok(session)
    }

    /// Deletes the associated session, if it exists
    pub async fn logout(&self, token: &str) -> Result<(), DatabaseError> {
        self.db.delete_session_by_token(token).await
    }

    /// Creates a user together with its profile
    pub async fn register(
        &self,
        new_user: NewPlainUser,
    ) -> Result<(UserData, ProfileData), AuthError> {
        let salt = SaltString::generate(&mut OsRng);
        let hashed_password = self
            .argon
            .hash_password(new_user.password.as_bytes(), &salt)
            .map_err(|e| AuthError::HashError(e.to_string()))?
            .to_string();

        let (user, profile) = self
            .db
            .create_user_with_profile(NewUser {
                username: new_user.username,
                password: hashed_password,
            })
            .await
            .map_err(|e| match e {
                DatabaseError::Conflict { value, .. } => AuthError::UsernameTaken(value),
                err => AuthError::Db(err),
            })?;

        info!("Registered user {}", user.username);
        Ok((user, profile))
    }

    /// Returns a session if it exists
    pub async fn session(&self, token: &str) -> Result<SessionData, DatabaseError> {
        self.db.session_by_token(token).await
    }

    async fn clear_expired(&self) {
        if let Err(e) = self.db.clear_expired_sessions().await {
            warn!("Could not clear expired sessions: {}", e)
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
}
