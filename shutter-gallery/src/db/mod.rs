use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

mod data;
pub use data::*;

mod memory;
pub use memory::*;

mod pg;
pub use pg::*;

pub type Result<T> = std::result::Result<T, DatabaseError>;

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

impl DatabaseError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
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

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn user_by_id(&self, user_id: PrimaryKey) -> Result<UserData>;
    async fn user_by_username(&self, username: &str) -> Result<UserData>;
    /// Inserts the user and its blank profile in one transaction
    async fn create_user_with_profile(&self, new_user: NewUser)
        -> Result<(UserData, ProfileData)>;
}

#[async_trait]
pub trait SessionRepository: Send + Sync {
    /// Returns the session if it exists and has not expired
    async fn session_by_token(&self, token: &str) -> Result<SessionData>;
    async fn create_session(&self, new_session: NewSession) -> Result<SessionData>;
    async fn delete_session_by_token(&self, token: &str) -> Result<()>;
    async fn clear_expired_sessions(&self) -> Result<()>;
}

#[async_trait]
pub trait ProfileRepository: Send + Sync {
    async fn profile_by_user(&self, user_id: PrimaryKey) -> Result<ProfileData>;
    /// Updates the profile of the user, creating it if it is missing
    async fn upsert_profile(&self, profile: UpsertProfile) -> Result<ProfileData>;
}

#[async_trait]
pub trait AlbumRepository: Send + Sync {
    async fn album_by_id(&self, album_id: PrimaryKey) -> Result<AlbumData>;
    /// Albums of the owner, most recent first
    async fn list_albums_by_owner(&self, owner_id: PrimaryKey) -> Result<Vec<AlbumData>>;
    async fn create_album(&self, new_album: NewAlbum) -> Result<AlbumData>;
    async fn rename_album(&self, album_id: PrimaryKey, name: &str) -> Result<AlbumData>;
    /// Deletes the photos of the album and then the album in one transaction,
    /// returning the photos that were removed
    async fn delete_album(&self, album_id: PrimaryKey) -> Result<Vec<PhotoData>>;
}

#[async_trait]
pub trait PhotoRepository: Send + Sync {
    /// Photos of the album, most recent first
    async fn list_photos_by_album(&self, album_id: PrimaryKey) -> Result<Vec<PhotoData>>;
    /// The most recent photo of each given album that has any
    async fn cover_photos(&self, album_ids: &[PrimaryKey]) -> Result<Vec<PhotoData>>;
    /// The most recent photos across every album of the owner
    async fn recent_photos_by_owner(
        &self,
        owner_id: PrimaryKey,
        limit: i64,
    ) -> Result<Vec<PhotoData>>;
    async fn count_photos_by_album(&self, album_id: PrimaryKey) -> Result<i64>;
    async fn create_photo(&self, new_photo: NewPhoto) -> Result<PhotoData>;
}

/// Represents a type that can fetch shutter data from a database
pub trait Database:
    UserRepository + SessionRepository + ProfileRepository + AlbumRepository + PhotoRepository
{
}

impl<T> Database for T where
    T: UserRepository + SessionRepository + ProfileRepository + AlbumRepository + PhotoRepository
{
}

#[derive(Debug)]
pub struct NewUser {
    pub username: String,
    /// Already hashed
    pub password: String,
}

#[derive(Debug)]
pub struct NewSession {
    pub token: String,
    pub user_id: PrimaryKey,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug)]
pub struct UpsertProfile {
    pub user_id: PrimaryKey,
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<i64>,
    pub image: String,
}

#[derive(Debug)]
pub struct NewAlbum {
    pub name: String,
    /// The owner of the new album
    pub owner_id: PrimaryKey,
}

#[derive(Debug)]
pub struct NewPhoto {
    pub image: String,
    pub album_id: PrimaryKey,
}
